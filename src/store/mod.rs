// src/store/mod.rs

//! Persistence collaborators of the practice engine.
//!
//! Each concern is a narrow async trait so the engine can run against
//! Postgres in production and against [`memory::MemoryStore`] in tests.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    error::AppError,
    models::{
        achievement::{AchievementDefinition, UnlockOutcome, UnlockedAchievement},
        answer::{AnswerFact, NewAnswer, QuestionAggregate, UserAnswer},
        profile::{ProfileUpdate, UserProfile},
        question::{Alternative, ImportQuestion, Question, QuestionFilter, QuestionRef},
        simulation::{NewSimulation, Simulation},
    },
};

pub mod memory;
pub mod postgres;

#[async_trait]
pub trait QuestionRepository: Send + Sync {
    /// Candidate pool for the sampler; nullified questions never appear.
    async fn find_questions(&self, filter: &QuestionFilter) -> Result<Vec<QuestionRef>, AppError>;

    /// One random match for `filter`, preferring ids outside `avoid`. Only
    /// the chosen row is fetched.
    async fn random_question(
        &self,
        filter: &QuestionFilter,
        avoid: &HashSet<i64>,
    ) -> Result<Option<QuestionRef>, AppError>;

    async fn find_question(&self, id: i64) -> Result<Option<Question>, AppError>;

    async fn find_questions_by_ids(&self, ids: &[i64]) -> Result<Vec<Question>, AppError>;

    async fn find_alternatives(&self, question_id: i64) -> Result<Vec<Alternative>, AppError>;

    async fn find_alternatives_for(&self, question_ids: &[i64]) -> Result<Vec<Alternative>, AppError>;

    /// Returns `false` when `(exam_id, question_number)` already exists.
    async fn import_question(&self, question: &ImportQuestion) -> Result<bool, AppError>;
}

#[async_trait]
pub trait AnswerRepository: Send + Sync {
    /// Appends one entry to the answer log. An answer that names a
    /// simulation is only written while that simulation is still CREATED,
    /// checked in the same statement; otherwise `Conflict`.
    async fn record_answer(&self, answer: NewAnswer) -> Result<UserAnswer, AppError>;

    /// Removes an answer whose progression could not be applied, so the
    /// failed request leaves no trace.
    async fn retract_answer(&self, answer_id: i64) -> Result<(), AppError>;

    /// Distinct question ids the user answered at or after `since`.
    async fn answered_since(
        &self,
        user_id: i64,
        since: DateTime<Utc>,
    ) -> Result<HashSet<i64>, AppError>;

    /// Distinct question ids the user ever answered incorrectly.
    async fn incorrect_question_ids(&self, user_id: i64) -> Result<Vec<i64>, AppError>;

    /// Aggregates across all users' answers to one question.
    async fn question_aggregate(&self, question_id: i64) -> Result<QuestionAggregate, AppError>;

    /// Every answer of the user joined with its question, newest first.
    async fn answer_facts(&self, user_id: i64) -> Result<Vec<AnswerFact>, AppError>;

    /// Answers recorded inside a simulation, oldest first.
    async fn simulation_answers(&self, simulation_id: i64) -> Result<Vec<UserAnswer>, AppError>;

    /// The most recent incorrect attempt per question, newest first.
    async fn latest_wrong_answers(&self, user_id: i64) -> Result<Vec<UserAnswer>, AppError>;
}

#[async_trait]
pub trait ProfileRepository: Send + Sync {
    /// Loads the profile, creating an empty one on first use.
    async fn load_profile(&self, user_id: i64) -> Result<UserProfile, AppError>;

    /// Applies `update` only if the stored version still equals
    /// `expected_version`. Returns `false` when another writer got there first.
    async fn update_profile(
        &self,
        user_id: i64,
        expected_version: i64,
        update: &ProfileUpdate,
    ) -> Result<bool, AppError>;

    async fn top_profiles(&self, limit: i64) -> Result<Vec<UserProfile>, AppError>;
}

#[async_trait]
pub trait SimulationRepository: Send + Sync {
    async fn create_simulation(&self, simulation: NewSimulation) -> Result<Simulation, AppError>;

    async fn find_simulation(&self, id: i64) -> Result<Option<Simulation>, AppError>;

    /// The user's simulations, newest first.
    async fn list_simulations(&self, user_id: i64) -> Result<Vec<Simulation>, AppError>;

    /// Moves a CREATED simulation to COMPLETED. Returns `false` if it was
    /// already completed.
    async fn complete_simulation(
        &self,
        id: i64,
        score: f64,
        time_spent: i64,
        completed_at: DateTime<Utc>,
    ) -> Result<bool, AppError>;

    /// Scores of the user's completed simulations.
    async fn completed_scores(&self, user_id: i64) -> Result<Vec<f64>, AppError>;
}

#[async_trait]
pub trait AchievementRepository: Send + Sync {
    async fn unlocked_keys(&self, user_id: i64) -> Result<Vec<String>, AppError>;

    /// Atomically creates the catalog row if absent, the user join if absent,
    /// and applies `bonus` to the profile guarded by `expected_version`.
    async fn unlock_and_award(
        &self,
        user_id: i64,
        definition: &AchievementDefinition,
        expected_version: i64,
        bonus: &ProfileUpdate,
    ) -> Result<UnlockOutcome, AppError>;

    async fn user_achievements(&self, user_id: i64) -> Result<Vec<UnlockedAchievement>, AppError>;
}

#[async_trait]
pub trait HealthRepository: Send + Sync {
    /// Round trip to the backing store.
    async fn ping(&self) -> Result<(), AppError>;
}

/// Everything the engine needs from persistence.
pub trait Store:
    QuestionRepository
    + AnswerRepository
    + ProfileRepository
    + SimulationRepository
    + AchievementRepository
    + HealthRepository
{
}

impl<T> Store for T where
    T: QuestionRepository
        + AnswerRepository
        + ProfileRepository
        + SimulationRepository
        + AchievementRepository
        + HealthRepository
{
}
