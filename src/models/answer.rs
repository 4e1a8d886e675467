// src/models/answer.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::models::{
    achievement::AchievementDefinition,
    question::{Difficulty, Subject},
};

/// One entry of the append-only answer log.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserAnswer {
    pub id: i64,
    pub user_id: i64,
    pub question_id: i64,
    pub alternative_id: i64,
    pub simulation_id: Option<i64>,
    /// Derived from the stored alternative, never from the client.
    pub is_correct: bool,
    pub time_spent: i32,
    pub confidence: Option<i16>,
    pub created_at: DateTime<Utc>,
}

/// Insert payload for the answer log.
#[derive(Debug, Clone)]
pub struct NewAnswer {
    pub user_id: i64,
    pub question_id: i64,
    pub alternative_id: i64,
    pub simulation_id: Option<i64>,
    pub is_correct: bool,
    pub time_spent: i32,
    pub confidence: Option<i16>,
}

/// An answer joined with the question data analytics needs.
#[derive(Debug, Clone)]
pub struct AnswerFact {
    pub question_id: i64,
    pub alternative_id: i64,
    pub subject: Subject,
    pub difficulty: Option<Difficulty>,
    pub is_correct: bool,
    pub time_spent: i32,
    pub created_at: DateTime<Utc>,
}

/// Aggregates across every user's answers to one question.
#[derive(Debug, Clone, Copy, Default, FromRow)]
pub struct QuestionAggregate {
    pub total: i64,
    pub correct: i64,
    pub average_time: f64,
}

/// DTO for submitting an answer.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AnswerRequest {
    pub question_id: i64,
    pub alternative_id: i64,
    #[validate(range(min = 0, max = 7200))]
    pub time_spent: i32,
    #[validate(range(min = 1, max = 5))]
    pub confidence: Option<i16>,
    pub simulation_id: Option<i64>,
}

/// What the progression engine needs to know about an evaluated answer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnswerOutcome {
    pub is_correct: bool,
    pub time_spent: i32,
    pub difficulty: Option<Difficulty>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerStatistics {
    /// Percentage of all recorded answers that were correct, one decimal.
    pub success_rate: f64,
    /// Seconds, rounded.
    pub average_time: i64,
    pub your_time: i32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSummary {
    pub points_awarded: i64,
    pub total_points: i64,
    pub streak: i32,
    pub level: i32,
    pub level_up: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerResponse {
    pub answer_id: i64,
    pub is_correct: bool,
    pub correct_alternative_id: i64,
    pub explanation: Option<String>,
    /// Skipped while answering inside a simulation.
    pub statistics: Option<AnswerStatistics>,
    /// Present in practice mode only.
    pub progress: Option<ProgressSummary>,
    pub new_achievements: Vec<AchievementDefinition>,
    /// Set when gamification was handed to the background queue.
    pub deferred_job_id: Option<u64>,
}

/// One entry of the wrong-answer review list.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WrongQuestion {
    pub question_id: i64,
    pub subject: Subject,
    pub exam_year: i32,
    pub exam_phase: i32,
    pub question_number: i32,
    pub statement: String,
    pub chosen_alternative_id: i64,
    pub correct_alternative_id: Option<i64>,
    pub time_spent: i32,
    pub answered_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WrongQuestionsResponse {
    pub questions: Vec<WrongQuestion>,
    pub total: usize,
    pub by_subject: std::collections::BTreeMap<Subject, usize>,
}
