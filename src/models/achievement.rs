// src/models/achievement.rs

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

/// Static catalog entry. Persisted lazily on first unlock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AchievementDefinition {
    pub key: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub icon: &'static str,
    /// Bonus points awarded once on unlock.
    pub points: i64,
}

/// Represents the 'achievements' table in the database.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Achievement {
    pub id: i64,
    pub key: String,
    pub name: String,
    pub description: String,
    pub icon: String,
    pub points: i64,
}

/// An achievement held by a user, joined with its catalog row.
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnlockedAchievement {
    pub key: String,
    pub name: String,
    pub description: String,
    pub icon: String,
    pub points: i64,
    pub unlocked_at: DateTime<Utc>,
}

/// Result of an atomic unlock-and-award attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnlockOutcome {
    /// Join row created and bonus points applied.
    Unlocked,
    /// The user already holds it; nothing written.
    AlreadyHeld,
    /// The profile changed since it was read; nothing written.
    VersionConflict,
}
