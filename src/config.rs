// src/config.rs

use std::env;
use std::str::FromStr;

use dotenvy::dotenv;

/// Sliding-window limits per user, one per rate-limited scope.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub disabled: bool,
    pub answers_per_minute: u32,
    pub simulations_per_hour: u32,
    pub next_question_per_10s: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            disabled: false,
            answers_per_minute: 100,
            simulations_per_hour: 3,
            next_question_per_10s: 10,
        }
    }
}

/// About a century; keeps lookback date arithmetic in range.
pub const MAX_LOOKBACK_DAYS: i64 = 36_500;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub jwt_expiration: u64,
    pub rust_log: String,
    pub bind_addr: String,
    /// Days of answer history that de-prioritize a question in sampling.
    pub lookback_days: i64,
    pub profile_retry_attempts: usize,
    pub gamification_queue_capacity: usize,
    pub rate_limits: RateLimitConfig,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        let database_url = env::var("DATABASE_URL")
            .expect("DATABASE_URL must be set");

        let jwt_secret = env::var("JWT_SECRET")
            .expect("JWT_SECRET must be set");

        let rust_log = env::var("RUST_LOG")
            .unwrap_or_else(|_| "info".to_string());

        let bind_addr = env::var("BIND_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:3000".to_string());

        let rate_limits = RateLimitConfig {
            disabled: env::var("RATE_LIMIT_DISABLED").is_ok_and(|v| parse_flag(&v)),
            answers_per_minute: env_or("RATE_LIMIT_ANSWERS_PER_MINUTE", 100),
            simulations_per_hour: env_or("RATE_LIMIT_SIMULATIONS_PER_HOUR", 3),
            next_question_per_10s: env_or("RATE_LIMIT_NEXT_PER_10S", 10),
        };

        Self {
            database_url,
            jwt_secret,
            jwt_expiration: env_or("JWT_EXPIRATION", 86_400),
            rust_log,
            bind_addr,
            lookback_days: env_or("LOOKBACK_DAYS", 90).clamp(0, MAX_LOOKBACK_DAYS),
            profile_retry_attempts: env_or("PROFILE_RETRY_ATTEMPTS", 5),
            gamification_queue_capacity: env_or("GAMIFICATION_QUEUE_CAPACITY", 1024),
            rate_limits,
        }
    }
}

/// Reads an optional numeric variable, falling back when unset or malformed.
fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

/// `1`, `true`, `yes` and `on`, in any case.
fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_accept_common_truthy_spellings() {
        for on in ["1", "true", "TRUE", " True ", "yes", "on"] {
            assert!(parse_flag(on), "{on:?} should enable");
        }
        for off in ["", "0", "false", "no", "disabled"] {
            assert!(!parse_flag(off), "{off:?} should not enable");
        }
    }
}
