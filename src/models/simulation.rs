// src/models/simulation.rs

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::question::{Difficulty, PublicQuestion, Subject};

/// Official first-phase distribution, 80 questions.
pub const FULL_EXAM_DISTRIBUTION: [(Subject, usize); 16] = [
    (Subject::Ethics, 8),
    (Subject::Constitutional, 7),
    (Subject::Civil, 7),
    (Subject::CivilProcedure, 6),
    (Subject::Criminal, 6),
    (Subject::CriminalProcedure, 6),
    (Subject::Labour, 6),
    (Subject::LabourProcedure, 5),
    (Subject::Administrative, 5),
    (Subject::Taxes, 5),
    (Subject::Business, 5),
    (Subject::Consumer, 5),
    (Subject::Environmental, 4),
    (Subject::Children, 3),
    (Subject::International, 2),
    (Subject::HumanRights, 0),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SimulationType {
    FullExam,
    Adaptive,
    QuickPractice,
    ErrorReview,
    BySubject,
}

impl SimulationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SimulationType::FullExam => "FULL_EXAM",
            SimulationType::Adaptive => "ADAPTIVE",
            SimulationType::QuickPractice => "QUICK_PRACTICE",
            SimulationType::ErrorReview => "ERROR_REVIEW",
            SimulationType::BySubject => "BY_SUBJECT",
        }
    }

    pub fn default_count(&self) -> usize {
        match self {
            SimulationType::FullExam => 80,
            SimulationType::Adaptive => 40,
            SimulationType::QuickPractice => 20,
            SimulationType::ErrorReview => 30,
            SimulationType::BySubject => 50,
        }
    }

    /// Fixed per-subject quotas, if the type has one.
    pub fn distribution(&self) -> Option<&'static [(Subject, usize)]> {
        match self {
            SimulationType::FullExam => Some(&FULL_EXAM_DISTRIBUTION),
            _ => None,
        }
    }
}

impl fmt::Display for SimulationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SimulationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "FULL_EXAM" => Ok(SimulationType::FullExam),
            "ADAPTIVE" => Ok(SimulationType::Adaptive),
            "QUICK_PRACTICE" => Ok(SimulationType::QuickPractice),
            "ERROR_REVIEW" => Ok(SimulationType::ErrorReview),
            "BY_SUBJECT" => Ok(SimulationType::BySubject),
            other => Err(format!("Unknown simulation type '{}'", other)),
        }
    }
}

/// One-way lifecycle: CREATED -> COMPLETED.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SimulationStatus {
    Created,
    Completed,
}

impl SimulationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SimulationStatus::Created => "CREATED",
            SimulationStatus::Completed => "COMPLETED",
        }
    }
}

impl FromStr for SimulationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CREATED" => Ok(SimulationStatus::Created),
            "COMPLETED" => Ok(SimulationStatus::Completed),
            other => Err(format!("Unknown simulation status '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationQuestion {
    pub question_id: i64,
    /// 1-based presentation order, fixed at creation.
    pub order: i32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Simulation {
    pub id: i64,
    pub user_id: i64,
    #[serde(rename = "type")]
    pub simulation_type: SimulationType,
    pub total_questions: i32,
    pub subjects: Vec<Subject>,
    pub target_difficulty: Option<Difficulty>,
    pub status: SimulationStatus,
    pub score: Option<f64>,
    pub time_spent: Option<i64>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub questions: Vec<SimulationQuestion>,
}

impl Simulation {
    pub fn contains_question(&self, question_id: i64) -> bool {
        self.questions.iter().any(|q| q.question_id == question_id)
    }
}

/// Insert payload for a simulation; question order follows `question_ids`.
#[derive(Debug, Clone)]
pub struct NewSimulation {
    pub user_id: i64,
    pub simulation_type: SimulationType,
    pub subjects: Vec<Subject>,
    pub target_difficulty: Option<Difficulty>,
    pub question_ids: Vec<i64>,
}

/// DTO for creating a simulation.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateSimulationRequest {
    #[serde(rename = "type")]
    pub simulation_type: SimulationType,
    #[serde(default)]
    pub subjects: Vec<Subject>,
    pub target_difficulty: Option<Difficulty>,
    #[validate(range(min = 1, max = 200))]
    pub question_count: Option<usize>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationSummary {
    pub id: i64,
    #[serde(rename = "type")]
    pub simulation_type: SimulationType,
    pub status: SimulationStatus,
    pub total_questions: i32,
    pub score: Option<f64>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<&Simulation> for SimulationSummary {
    fn from(s: &Simulation) -> Self {
        Self {
            id: s.id,
            simulation_type: s.simulation_type,
            status: s.status,
            total_questions: s.total_questions,
            score: s.score,
            started_at: s.started_at,
            completed_at: s.completed_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSimulationResponse {
    pub simulation: SimulationSummary,
    pub requested_questions: usize,
    /// Subjects whose pool could not fill the quota, with the missing count.
    pub shortfall: Vec<(Subject, usize)>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationQuestionView {
    pub order: i32,
    pub question: PublicQuestion,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationDetail {
    pub simulation: SimulationSummary,
    pub questions: Vec<SimulationQuestionView>,
}
