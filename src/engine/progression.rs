// src/engine/progression.rs

//! Points, streak and level arithmetic, plus the versioned profile write that
//! applies them.

use chrono::NaiveDate;
use serde::Serialize;

use crate::{
    error::AppError,
    models::{
        answer::AnswerOutcome,
        profile::{ProfileUpdate, UserProfile},
        question::Difficulty,
    },
    store::ProfileRepository,
    utils::retry::{RetryConfig, retry_when},
};

pub const BASE_POINTS: i64 = 100;
pub const SPEED_BONUS: i64 = 50;
pub const SPEED_THRESHOLD_SECONDS: i32 = 30;
pub const STREAK_BONUS_PER_DAY: i64 = 10;
pub const POINTS_PER_LEVEL_STEP: i64 = 1000;
pub const MAX_LEVEL: i32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PointsBreakdown {
    pub base_points: i64,
    pub speed_bonus: i64,
    pub difficulty_multiplier: f64,
    pub streak_bonus: i64,
    pub total_points: i64,
}

/// Points for one answer. Incorrect answers are always worth zero.
pub fn calculate_points(
    is_correct: bool,
    time_spent: i32,
    difficulty: Option<Difficulty>,
    current_streak: i32,
) -> PointsBreakdown {
    if !is_correct {
        return PointsBreakdown {
            base_points: 0,
            speed_bonus: 0,
            difficulty_multiplier: 1.0,
            streak_bonus: 0,
            total_points: 0,
        };
    }

    let speed_bonus = if time_spent <= SPEED_THRESHOLD_SECONDS { SPEED_BONUS } else { 0 };
    let difficulty_multiplier = difficulty.map(|d| d.multiplier()).unwrap_or(1.0);
    let streak_bonus = i64::from(current_streak.max(0)) * STREAK_BONUS_PER_DAY;
    let total_points =
        ((BASE_POINTS + speed_bonus) as f64 * difficulty_multiplier + streak_bonus as f64).round() as i64;

    PointsBreakdown {
        base_points: BASE_POINTS,
        speed_bonus,
        difficulty_multiplier,
        streak_bonus,
        total_points,
    }
}

/// `floor(sqrt(points / 1000)) + 1`, clamped to [`MAX_LEVEL`].
///
/// Integer square root of the truncated quotient gives the same floor as the
/// real-valued formula without float error at perfect squares.
pub fn calculate_level(total_points: i64) -> i32 {
    let steps = (total_points.max(0) / POINTS_PER_LEVEL_STEP).isqrt();
    (steps + 1).min(i64::from(MAX_LEVEL)) as i32
}

/// Points still missing for the next level; zero once the cap is reached.
pub fn points_to_next_level(total_points: i64) -> i64 {
    let level = calculate_level(total_points);
    if level >= MAX_LEVEL {
        return 0;
    }
    let next_threshold = i64::from(level) * i64::from(level) * POINTS_PER_LEVEL_STEP;
    next_threshold - total_points.max(0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StreakTransition {
    /// First study day ever.
    Start,
    /// Already studied today.
    Unchanged,
    /// Studied yesterday.
    Increment,
    /// Gap of two or more days.
    Reset,
}

impl StreakTransition {
    pub fn apply(self, current: i32) -> i32 {
        match self {
            StreakTransition::Start | StreakTransition::Reset => 1,
            StreakTransition::Unchanged => current,
            StreakTransition::Increment => current + 1,
        }
    }
}

/// Compares calendar dates only. A last study date in the future (clock skew)
/// counts as today.
pub fn update_streak(last_study_date: Option<NaiveDate>, today: NaiveDate) -> StreakTransition {
    let Some(last) = last_study_date else {
        return StreakTransition::Start;
    };

    match (today - last).num_days() {
        days if days <= 0 => StreakTransition::Unchanged,
        1 => StreakTransition::Increment,
        _ => StreakTransition::Reset,
    }
}

/// Result of applying one answer to a profile snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Progression {
    pub points: PointsBreakdown,
    pub streak_transition: StreakTransition,
    pub new_streak: i32,
    pub new_total_points: i64,
    pub new_level: i32,
    pub level_up: bool,
}

impl Progression {
    pub fn points_awarded(&self) -> i64 {
        self.points.total_points
    }
}

/// Pure progression step. The streak bonus uses the streak held before this
/// answer.
pub fn progress(outcome: &AnswerOutcome, profile: &UserProfile, today: NaiveDate) -> Progression {
    let points = calculate_points(
        outcome.is_correct,
        outcome.time_spent,
        outcome.difficulty,
        profile.streak,
    );
    let streak_transition = update_streak(profile.last_study_date, today);
    let new_total_points = profile.total_points + points.total_points;
    let new_level = calculate_level(new_total_points);

    Progression {
        points,
        streak_transition,
        new_streak: streak_transition.apply(profile.streak),
        new_total_points,
        new_level,
        level_up: new_level > profile.level,
    }
}

fn answer_update(outcome: &AnswerOutcome, result: &Progression, today: NaiveDate) -> ProfileUpdate {
    ProfileUpdate {
        total_questions_delta: 1,
        correct_answers_delta: i64::from(outcome.is_correct),
        total_points: result.new_total_points,
        level: result.new_level,
        streak: result.new_streak,
        last_study_date: Some(today),
    }
}

/// Profile write that adds achievement bonus points and nothing else.
pub fn bonus_update(profile: &UserProfile, points: i64) -> ProfileUpdate {
    let total_points = profile.total_points + points;
    ProfileUpdate {
        total_questions_delta: 0,
        correct_answers_delta: 0,
        total_points,
        level: calculate_level(total_points),
        streak: profile.streak,
        last_study_date: profile.last_study_date,
    }
}

#[derive(Debug, Clone)]
pub struct AppliedProgression {
    /// The profile as written.
    pub profile: UserProfile,
    pub progression: Progression,
}

/// Reads the profile, computes the progression and writes it guarded by the
/// profile version. A lost race re-reads and recomputes from the fresh
/// snapshot; exhausting the retries surfaces `RaceLoss`.
pub async fn apply_answer<S>(
    store: &S,
    user_id: i64,
    outcome: AnswerOutcome,
    today: NaiveDate,
    retry: &RetryConfig,
) -> Result<AppliedProgression, AppError>
where
    S: ProfileRepository + ?Sized,
{
    retry_when(retry, AppError::is_race_loss, || async move {
        let mut profile = store.load_profile(user_id).await?;
        let progression = progress(&outcome, &profile, today);
        let update = answer_update(&outcome, &progression, today);

        if !store.update_profile(user_id, profile.version, &update).await? {
            tracing::debug!(user_id, version = profile.version, "Profile version moved, retrying");
            return Err(AppError::RaceLoss(format!(
                "profile of user {} changed concurrently",
                user_id
            )));
        }

        update.apply_to(&mut profile);
        Ok(AppliedProgression {
            profile,
            progression,
        })
    })
    .await
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::store::memory::MemoryStore;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, d).unwrap()
    }

    fn outcome(is_correct: bool, time_spent: i32, difficulty: Option<Difficulty>) -> AnswerOutcome {
        AnswerOutcome {
            is_correct,
            time_spent,
            difficulty,
        }
    }

    #[test]
    fn level_boundaries() {
        assert_eq!(calculate_level(0), 1);
        assert_eq!(calculate_level(999), 1);
        assert_eq!(calculate_level(1000), 2);
        assert_eq!(calculate_level(3999), 2);
        assert_eq!(calculate_level(4000), 3);
        assert_eq!(calculate_level(9000), 4);
    }

    #[test]
    fn level_is_clamped() {
        assert_eq!(calculate_level(9_801_000), MAX_LEVEL);
        assert_eq!(calculate_level(i64::MAX), MAX_LEVEL);
        assert_eq!(points_to_next_level(i64::MAX), 0);
    }

    #[test]
    fn points_to_next_level_uses_squared_thresholds() {
        assert_eq!(points_to_next_level(0), 1000);
        assert_eq!(points_to_next_level(1500), 2500);
        assert_eq!(points_to_next_level(4000), 5000);
    }

    #[test]
    fn streak_transitions() {
        assert_eq!(update_streak(None, day(10)), StreakTransition::Start);
        assert_eq!(update_streak(Some(day(10)), day(10)), StreakTransition::Unchanged);
        assert_eq!(update_streak(Some(day(9)), day(10)), StreakTransition::Increment);
        assert_eq!(update_streak(Some(day(7)), day(10)), StreakTransition::Reset);

        assert_eq!(StreakTransition::Increment.apply(4), 5);
        assert_eq!(StreakTransition::Reset.apply(4), 1);
        assert_eq!(StreakTransition::Unchanged.apply(4), 4);
    }

    #[test]
    fn incorrect_answers_award_nothing() {
        for d in [None, Some(Difficulty::Easy), Some(Difficulty::VeryHard)] {
            let mut profile = UserProfile::new(1);
            profile.total_points = 2500;
            profile.level = calculate_level(2500);
            profile.streak = 6;
            profile.last_study_date = Some(day(9));

            let result = progress(&outcome(false, 5, d), &profile, day(10));
            assert_eq!(result.points_awarded(), 0);
            assert_eq!(result.new_total_points, 2500);
            assert_eq!(result.new_level, profile.level);
            assert!(!result.level_up);
        }
    }

    #[test]
    fn first_correct_medium_answer_scores_150() {
        let profile = UserProfile::new(1);
        let result = progress(&outcome(true, 20, Some(Difficulty::Medium)), &profile, day(10));

        assert_eq!(result.points_awarded(), 150);
        assert_eq!(result.new_streak, 1);
        assert_eq!(result.new_level, 1);
    }

    #[test]
    fn second_day_hard_answer_scores_160() {
        let mut profile = UserProfile::new(1);
        profile.total_points = 150;
        profile.streak = 1;
        profile.last_study_date = Some(day(10));

        let result = progress(&outcome(true, 40, Some(Difficulty::Hard)), &profile, day(11));

        assert_eq!(result.points.speed_bonus, 0);
        assert_eq!(result.points_awarded(), 160);
        assert_eq!(result.new_streak, 2);
        assert_eq!(result.new_total_points, 310);
    }

    #[test]
    fn unknown_difficulty_counts_as_medium() {
        let breakdown = calculate_points(true, 31, None, 0);
        assert_eq!(breakdown.total_points, 100);
        let easy = calculate_points(true, 10, Some(Difficulty::Easy), 2);
        assert_eq!(easy.total_points, 140);
    }

    #[tokio::test]
    async fn apply_answer_updates_counters() {
        let store = MemoryStore::new();
        let retry = RetryConfig::immediate(3);

        apply_answer(&store, 7, outcome(true, 10, None), day(10), &retry).await.unwrap();
        let applied = apply_answer(&store, 7, outcome(false, 10, None), day(10), &retry)
            .await
            .unwrap();

        assert_eq!(applied.profile.total_questions, 2);
        assert_eq!(applied.profile.correct_answers, 1);
        assert_eq!(applied.profile.total_points, 150);
        assert_eq!(applied.profile.streak, 1);
        assert_eq!(store.load_profile(7).await.unwrap(), applied.profile);
    }

    #[tokio::test]
    async fn concurrent_answers_lose_no_updates() {
        let store = Arc::new(MemoryStore::new());
        let retry = RetryConfig::immediate(50);

        let mut tasks = Vec::new();
        for _ in 0..20 {
            let store = store.clone();
            let retry = retry.clone();
            tasks.push(tokio::spawn(async move {
                apply_answer(&*store, 3, outcome(true, 100, None), day(10), &retry).await
            }));
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let profile = store.load_profile(3).await.unwrap();
        assert_eq!(profile.total_questions, 20);
        assert_eq!(profile.correct_answers, 20);
        // First answer starts the streak at 0 bonus, later ones see streak 1.
        assert_eq!(profile.total_points, 100 + 19 * 110);
    }
}
