// src/models/mod.rs

pub mod achievement;
pub mod answer;
pub mod profile;
pub mod question;
pub mod report;
pub mod simulation;
