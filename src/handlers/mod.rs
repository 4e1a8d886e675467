// src/handlers/mod.rs

pub mod admin;
pub mod analytics;
pub mod health;
pub mod profile;
pub mod questions;
pub mod simulations;
