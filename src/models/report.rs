// src/models/report.rs

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::models::{
    question::{Difficulty, Subject},
    simulation::SimulationType,
};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectPerformance {
    pub subject: Subject,
    pub subject_label: &'static str,
    pub total: i64,
    pub correct: i64,
    pub percentage: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Overview {
    pub total_questions: i64,
    pub correct_answers: i64,
    pub success_rate: f64,
    pub average_time: i64,
    pub streak: i32,
}

/// Recent accuracy against all-time accuracy, in percentage points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Trend {
    pub window: usize,
    pub recent_accuracy: f64,
    pub overall_accuracy: f64,
    pub trend: f64,
}

/// A subject's latest answers against its own all-time accuracy.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectTrend {
    pub subject: Subject,
    pub subject_label: &'static str,
    pub total: i64,
    pub accuracy: f64,
    pub recent_accuracy: f64,
    pub trend: f64,
}

/// Optimistic extrapolations of overall accuracy, both percentages.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Predictions {
    pub exam_score: f64,
    pub approval_probability: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyPerformance {
    pub date: NaiveDate,
    pub correct: i64,
    pub total: i64,
    pub percentage: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyActivity {
    pub date: NaiveDate,
    pub questions_answered: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DifficultyPerformance {
    pub difficulty: Difficulty,
    pub correct: i64,
    pub total: i64,
    pub percentage: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserAnalytics {
    pub overview: Overview,
    pub subject_performance: Vec<SubjectPerformance>,
    pub weak_areas: Vec<SubjectPerformance>,
    pub trend: Trend,
    pub subject_trends: Vec<SubjectTrend>,
    pub predictions: Predictions,
    pub performance_over_time: Vec<DailyPerformance>,
    pub recent_activity: Vec<DailyActivity>,
    pub difficulty_analysis: Vec<DifficultyPerformance>,
}

/// One wrongly answered simulation question, for review screens.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WrongAnswerDetail {
    pub question_id: i64,
    pub subject: Subject,
    pub subject_label: &'static str,
    pub statement: String,
    pub user_answer: Option<String>,
    pub correct_answer: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationOverview {
    pub id: i64,
    #[serde(rename = "type")]
    pub simulation_type: SimulationType,
    pub score: Option<f64>,
    pub total_questions: i32,
    pub answered: i64,
    pub correct_answers: i64,
    pub success_rate: f64,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Seconds between start and completion, 0 while running.
    pub duration: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationAnalytics {
    pub simulation: SimulationOverview,
    pub subject_performance: Vec<SubjectPerformance>,
    pub wrong_answers: Vec<WrongAnswerDetail>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinishReport {
    pub simulation_id: i64,
    pub score: f64,
    pub total_questions: i32,
    pub correct_answers: i64,
    pub time_spent: i64,
    pub by_subject: Vec<SubjectPerformance>,
    pub weak_areas: Vec<Subject>,
    pub recommendations: Vec<String>,
    pub achievements_job_id: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub status: &'static str,
    pub database: bool,
    pub timestamp: DateTime<Utc>,
    pub version: &'static str,
}
