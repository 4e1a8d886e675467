// src/utils/mod.rs

pub mod html;
pub mod jwt;
pub mod rate_limit;
pub mod retry;
