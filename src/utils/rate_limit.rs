// src/utils/rate_limit.rs

use std::{
    collections::{HashMap, VecDeque},
    time::{Duration, Instant},
};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::{config::RateLimitConfig, error::AppError};

/// Operations throttled per user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RateScope {
    Answer,
    Simulation,
    NextQuestion,
}

impl RateScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            RateScope::Answer => "answer",
            RateScope::Simulation => "simulation",
            RateScope::NextQuestion => "next_question",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RateRule {
    pub limit: u32,
    pub window: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed,
    Denied { retry_after: Duration },
}

#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Counts the hit when allowed. `Err` means the limiter itself failed,
    /// not that the user is over the limit.
    async fn check(&self, scope: RateScope, user_id: i64) -> Result<RateDecision, AppError>;
}

/// In-process sliding window keyed by `(scope, user_id)`.
pub struct SlidingWindowLimiter {
    rules: HashMap<RateScope, RateRule>,
    hits: Mutex<HashMap<(RateScope, i64), VecDeque<Instant>>>,
}

impl SlidingWindowLimiter {
    pub fn new(rules: HashMap<RateScope, RateRule>) -> Self {
        Self {
            rules,
            hits: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        let rules = HashMap::from([
            (
                RateScope::Answer,
                RateRule {
                    limit: config.answers_per_minute,
                    window: Duration::from_secs(60),
                },
            ),
            (
                RateScope::Simulation,
                RateRule {
                    limit: config.simulations_per_hour,
                    window: Duration::from_secs(3600),
                },
            ),
            (
                RateScope::NextQuestion,
                RateRule {
                    limit: config.next_question_per_10s,
                    window: Duration::from_secs(10),
                },
            ),
        ]);
        Self::new(rules)
    }

    /// Forgets users whose every hit has left its window. Run periodically;
    /// `check` alone never shrinks the map.
    pub async fn retain_recent(&self) {
        self.retain_at(Instant::now()).await;
    }

    async fn retain_at(&self, now: Instant) {
        let mut hits = self.hits.lock().await;
        hits.retain(|(scope, _), window| match self.rules.get(scope) {
            Some(rule) => window
                .back()
                .is_some_and(|&newest| now.duration_since(newest) < rule.window),
            None => false,
        });
    }

    /// Number of `(scope, user)` keys currently held.
    pub async fn len(&self) -> usize {
        self.hits.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

/// Drops hits older than the window, then admits or denies `now`.
fn slide(hits: &mut VecDeque<Instant>, rule: RateRule, now: Instant) -> RateDecision {
    while let Some(&oldest) = hits.front() {
        if now.duration_since(oldest) >= rule.window {
            hits.pop_front();
        } else {
            break;
        }
    }

    if hits.len() >= rule.limit as usize {
        let retry_after = hits
            .front()
            .map(|&oldest| rule.window.saturating_sub(now.duration_since(oldest)))
            .unwrap_or(rule.window);
        return RateDecision::Denied { retry_after };
    }

    hits.push_back(now);
    RateDecision::Allowed
}

#[async_trait]
impl RateLimiter for SlidingWindowLimiter {
    async fn check(&self, scope: RateScope, user_id: i64) -> Result<RateDecision, AppError> {
        let Some(&rule) = self.rules.get(&scope) else {
            return Ok(RateDecision::Allowed);
        };

        let mut hits = self.hits.lock().await;
        let window = hits.entry((scope, user_id)).or_default();
        Ok(slide(window, rule, Instant::now()))
    }
}

/// Used when `RATE_LIMIT_DISABLED` is set.
pub struct Unlimited;

#[async_trait]
impl RateLimiter for Unlimited {
    async fn check(&self, _scope: RateScope, _user_id: i64) -> Result<RateDecision, AppError> {
        Ok(RateDecision::Allowed)
    }
}

/// Consults the limiter before any side effect.
///
/// A denial becomes `TooManyRequests`. A failing limiter is logged and the
/// request proceeds.
pub async fn enforce(limiter: &dyn RateLimiter, scope: RateScope, user_id: i64) -> Result<(), AppError> {
    match limiter.check(scope, user_id).await {
        Ok(RateDecision::Allowed) => Ok(()),
        Ok(RateDecision::Denied { retry_after }) => {
            tracing::warn!(user_id, scope = scope.as_str(), "Rate limit exceeded");
            Err(AppError::TooManyRequests(format!(
                "Too many {} requests, retry in {}s",
                scope.as_str(),
                retry_after.as_secs().max(1)
            )))
        }
        Err(e) => {
            tracing::warn!(user_id, scope = scope.as_str(), error = %e, "Rate limiter unavailable, allowing request");
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(limit: u32, secs: u64) -> RateRule {
        RateRule {
            limit,
            window: Duration::from_secs(secs),
        }
    }

    #[test]
    fn window_admits_up_to_limit_then_denies() {
        let mut hits = VecDeque::new();
        let start = Instant::now();
        for _ in 0..3 {
            assert_eq!(slide(&mut hits, rule(3, 60), start), RateDecision::Allowed);
        }
        assert!(matches!(
            slide(&mut hits, rule(3, 60), start + Duration::from_secs(1)),
            RateDecision::Denied { .. }
        ));
    }

    #[test]
    fn old_hits_slide_out_of_the_window() {
        let mut hits = VecDeque::new();
        let start = Instant::now();
        slide(&mut hits, rule(1, 10), start);
        assert!(matches!(
            slide(&mut hits, rule(1, 10), start + Duration::from_secs(5)),
            RateDecision::Denied { .. }
        ));
        assert_eq!(
            slide(&mut hits, rule(1, 10), start + Duration::from_secs(10)),
            RateDecision::Allowed
        );
    }

    #[tokio::test]
    async fn users_and_scopes_are_counted_separately() {
        let limiter = SlidingWindowLimiter::new(HashMap::from([
            (RateScope::Simulation, rule(1, 3600)),
            (RateScope::Answer, rule(1, 60)),
        ]));

        assert!(enforce(&limiter, RateScope::Simulation, 1).await.is_ok());
        assert!(matches!(
            enforce(&limiter, RateScope::Simulation, 1).await,
            Err(AppError::TooManyRequests(_))
        ));
        assert!(enforce(&limiter, RateScope::Simulation, 2).await.is_ok());
        assert!(enforce(&limiter, RateScope::Answer, 1).await.is_ok());
        // No rule configured for this scope.
        assert!(enforce(&limiter, RateScope::NextQuestion, 1).await.is_ok());
    }

    #[tokio::test]
    async fn retain_drops_users_whose_window_has_passed() {
        let limiter = SlidingWindowLimiter::new(HashMap::from([
            (RateScope::Answer, rule(100, 60)),
            (RateScope::Simulation, rule(3, 3600)),
        ]));
        for user_id in 0..1_000 {
            enforce(&limiter, RateScope::Answer, user_id).await.unwrap();
        }
        enforce(&limiter, RateScope::Simulation, 7).await.unwrap();
        assert_eq!(limiter.len().await, 1_001);

        // Still inside both windows: nothing is dropped.
        limiter.retain_recent().await;
        assert_eq!(limiter.len().await, 1_001);

        // Past the answer window but inside the simulation one.
        limiter.retain_at(Instant::now() + Duration::from_secs(61)).await;
        assert_eq!(limiter.len().await, 1);

        limiter.retain_at(Instant::now() + Duration::from_secs(3601)).await;
        assert!(limiter.is_empty().await);

        // A forgotten user starts with a fresh window.
        assert!(enforce(&limiter, RateScope::Answer, 0).await.is_ok());
    }

    struct Broken;

    #[async_trait]
    impl RateLimiter for Broken {
        async fn check(&self, _: RateScope, _: i64) -> Result<RateDecision, AppError> {
            Err(AppError::UpstreamUnavailable("limiter store down".into()))
        }
    }

    #[tokio::test]
    async fn failing_limiter_fails_open() {
        assert!(enforce(&Broken, RateScope::Answer, 1).await.is_ok());
    }
}
