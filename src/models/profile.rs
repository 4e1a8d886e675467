// src/models/profile.rs

use chrono::NaiveDate;
use serde::Serialize;
use sqlx::FromRow;

use crate::models::achievement::UnlockedAchievement;

/// Gamification state, one row per user.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub user_id: i64,
    pub total_points: i64,
    pub level: i32,
    /// Consecutive calendar days with at least one answer.
    pub streak: i32,
    pub total_questions: i64,
    pub correct_answers: i64,
    pub last_study_date: Option<NaiveDate>,
    /// Bumped on every write; used for optimistic concurrency.
    #[serde(skip)]
    pub version: i64,
}

impl UserProfile {
    pub fn new(user_id: i64) -> Self {
        Self {
            user_id,
            total_points: 0,
            level: 1,
            streak: 0,
            total_questions: 0,
            correct_answers: 0,
            last_study_date: None,
            version: 0,
        }
    }

    /// Overall accuracy as a rounded percentage.
    pub fn accuracy(&self) -> i64 {
        if self.total_questions == 0 {
            return 0;
        }
        ((self.correct_answers as f64 / self.total_questions as f64) * 100.0).round() as i64
    }
}

/// A conditional profile write. Counters are applied as increments,
/// the remaining fields are absolute values computed from the prior snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileUpdate {
    pub total_questions_delta: i64,
    pub correct_answers_delta: i64,
    pub total_points: i64,
    pub level: i32,
    pub streak: i32,
    pub last_study_date: Option<NaiveDate>,
}

impl ProfileUpdate {
    /// Applies the update in memory the same way the store does.
    pub fn apply_to(&self, profile: &mut UserProfile) {
        profile.total_questions += self.total_questions_delta;
        profile.correct_answers += self.correct_answers_delta;
        profile.total_points = self.total_points;
        profile.level = self.level;
        profile.streak = self.streak;
        profile.last_study_date = self.last_study_date;
        profile.version += 1;
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelProgress {
    pub level: i32,
    pub points_to_next_level: i64,
    pub max_level: i32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeResponse {
    pub profile: UserProfile,
    pub accuracy: i64,
    pub level_progress: LevelProgress,
    pub achievements: Vec<UnlockedAchievement>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub rank: usize,
    pub user_id: i64,
    pub total_points: i64,
    pub level: i32,
    pub streak: i32,
}
