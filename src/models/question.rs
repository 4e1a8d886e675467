// src/models/question.rs

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Legal practice areas covered by the exam, plus a catch-all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Subject {
    Ethics,
    Constitutional,
    Civil,
    CivilProcedure,
    Criminal,
    CriminalProcedure,
    Labour,
    LabourProcedure,
    Administrative,
    Taxes,
    Business,
    Consumer,
    Environmental,
    Children,
    International,
    HumanRights,
    General,
}

impl Subject {
    pub const ALL: [Subject; 17] = [
        Subject::Ethics,
        Subject::Constitutional,
        Subject::Civil,
        Subject::CivilProcedure,
        Subject::Criminal,
        Subject::CriminalProcedure,
        Subject::Labour,
        Subject::LabourProcedure,
        Subject::Administrative,
        Subject::Taxes,
        Subject::Business,
        Subject::Consumer,
        Subject::Environmental,
        Subject::Children,
        Subject::International,
        Subject::HumanRights,
        Subject::General,
    ];

    /// Column representation in the `questions.subject` TEXT column.
    pub fn as_str(&self) -> &'static str {
        match self {
            Subject::Ethics => "ETHICS",
            Subject::Constitutional => "CONSTITUTIONAL",
            Subject::Civil => "CIVIL",
            Subject::CivilProcedure => "CIVIL_PROCEDURE",
            Subject::Criminal => "CRIMINAL",
            Subject::CriminalProcedure => "CRIMINAL_PROCEDURE",
            Subject::Labour => "LABOUR",
            Subject::LabourProcedure => "LABOUR_PROCEDURE",
            Subject::Administrative => "ADMINISTRATIVE",
            Subject::Taxes => "TAXES",
            Subject::Business => "BUSINESS",
            Subject::Consumer => "CONSUMER",
            Subject::Environmental => "ENVIRONMENTAL",
            Subject::Children => "CHILDREN",
            Subject::International => "INTERNATIONAL",
            Subject::HumanRights => "HUMAN_RIGHTS",
            Subject::General => "GENERAL",
        }
    }

    /// Display label used by dashboards.
    pub fn label(&self) -> &'static str {
        match self {
            Subject::Ethics => "Ética",
            Subject::Constitutional => "Constitucional",
            Subject::Civil => "Civil",
            Subject::CivilProcedure => "Processo Civil",
            Subject::Criminal => "Penal",
            Subject::CriminalProcedure => "Processo Penal",
            Subject::Labour => "Trabalho",
            Subject::LabourProcedure => "Processo do Trabalho",
            Subject::Administrative => "Administrativo",
            Subject::Taxes => "Tributário",
            Subject::Business => "Empresarial",
            Subject::Consumer => "Consumidor",
            Subject::Environmental => "Ambiental",
            Subject::Children => "ECA",
            Subject::International => "Internacional",
            Subject::HumanRights => "Direitos Humanos",
            Subject::General => "Geral",
        }
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Subject {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Subject::ALL
            .iter()
            .copied()
            .find(|subject| subject.as_str() == s)
            .ok_or_else(|| format!("Unknown subject '{}'", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
    VeryHard,
}

impl Difficulty {
    pub const ALL: [Difficulty; 4] = [
        Difficulty::Easy,
        Difficulty::Medium,
        Difficulty::Hard,
        Difficulty::VeryHard,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "EASY",
            Difficulty::Medium => "MEDIUM",
            Difficulty::Hard => "HARD",
            Difficulty::VeryHard => "VERY_HARD",
        }
    }

    /// Point multiplier applied to correct answers.
    pub fn multiplier(&self) -> f64 {
        match self {
            Difficulty::Easy => 0.8,
            Difficulty::Medium => 1.0,
            Difficulty::Hard => 1.5,
            Difficulty::VeryHard => 2.0,
        }
    }
}

impl FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Difficulty::ALL
            .iter()
            .copied()
            .find(|d| d.as_str() == s)
            .ok_or_else(|| format!("Unknown difficulty '{}'", s))
    }
}

/// An imported exam item. Never mutated by the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: i64,
    pub exam_id: String,
    pub question_number: i32,
    pub subject: Subject,
    pub exam_year: i32,
    pub exam_phase: i32,
    pub statement: String,
    pub explanation: Option<String>,
    pub nullified: bool,
    pub difficulty: Option<Difficulty>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alternative {
    pub id: i64,
    pub question_id: i64,
    /// Single uppercase letter, e.g. "A".
    pub label: String,
    pub text: String,
    pub is_correct: bool,
}

/// The minimal projection the sampler works on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuestionRef {
    pub id: i64,
    pub subject: Subject,
    pub exam_year: i32,
}

impl From<&Question> for QuestionRef {
    fn from(q: &Question) -> Self {
        Self {
            id: q.id,
            subject: q.subject,
            exam_year: q.exam_year,
        }
    }
}

/// Typed question filter. Nullified questions are always excluded.
#[derive(Debug, Clone, Default)]
pub struct QuestionFilter {
    /// Empty means every subject.
    pub subjects: Vec<Subject>,
    pub difficulty: Option<Difficulty>,
    /// Restrict the pool to these ids (e.g. the user's wrong answers).
    pub only_ids: Option<Vec<i64>>,
    pub exclude_ids: Vec<i64>,
}

impl QuestionFilter {
    pub fn matches(&self, q: &Question) -> bool {
        !q.nullified
            && (self.subjects.is_empty() || self.subjects.contains(&q.subject))
            && self.difficulty.is_none_or(|d| q.difficulty == Some(d))
            && self.only_ids.as_ref().is_none_or(|ids| ids.contains(&q.id))
            && !self.exclude_ids.contains(&q.id)
    }
}

/// DTO for sending an alternative to the client (correctness stripped).
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicAlternative {
    pub id: i64,
    pub label: String,
    pub text: String,
}

/// DTO for sending a question to the client (no answer key).
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicQuestion {
    pub id: i64,
    pub subject: Subject,
    pub subject_label: &'static str,
    pub exam_id: String,
    pub exam_year: i32,
    pub exam_phase: i32,
    pub question_number: i32,
    pub statement: String,
    pub difficulty: Option<Difficulty>,
    pub alternatives: Vec<PublicAlternative>,
}

impl PublicQuestion {
    pub fn new(question: Question, mut alternatives: Vec<Alternative>) -> Self {
        alternatives.sort_by(|a, b| a.label.cmp(&b.label));
        Self {
            id: question.id,
            subject: question.subject,
            subject_label: question.subject.label(),
            exam_id: question.exam_id,
            exam_year: question.exam_year,
            exam_phase: question.exam_phase,
            question_number: question.question_number,
            statement: question.statement,
            difficulty: question.difficulty,
            alternatives: alternatives
                .into_iter()
                .map(|a| PublicAlternative {
                    id: a.id,
                    label: a.label,
                    text: a.text,
                })
                .collect(),
        }
    }
}

/// Query parameters for fetching the next practice question.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NextQuestionParams {
    pub subject: Option<Subject>,
    pub difficulty: Option<Difficulty>,
    #[serde(default)]
    pub exclude_answered: bool,
}

/// DTO for one alternative inside an import batch.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ImportAlternative {
    #[validate(length(equal = 1))]
    pub label: String,
    #[validate(length(min = 1, max = 5000))]
    pub text: String,
    pub is_correct: bool,
}

/// DTO for importing a question.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = validate_alternative_set))]
pub struct ImportQuestion {
    #[validate(length(min = 1, max = 100))]
    pub exam_id: String,
    #[validate(range(min = 1))]
    pub question_number: i32,
    pub subject: Subject,
    #[validate(range(min = 1990, max = 2100))]
    pub exam_year: i32,
    #[validate(range(min = 1))]
    pub exam_phase: i32,
    #[validate(length(min = 1, max = 20000))]
    pub statement: String,
    #[validate(length(max = 20000))]
    pub explanation: Option<String>,
    pub difficulty: Option<Difficulty>,
    #[serde(default)]
    pub nullified: bool,
    #[validate(length(min = 2, max = 6))]
    pub alternatives: Vec<ImportAlternative>,
}

/// Each alternative valid on its own, exactly one correct, unique uppercase
/// letter labels.
fn validate_alternative_set(q: &ImportQuestion) -> Result<(), validator::ValidationError> {
    if q.alternatives.iter().any(|a| a.validate().is_err()) {
        return Err(validator::ValidationError::new("invalid_alternative"));
    }

    let correct = q.alternatives.iter().filter(|a| a.is_correct).count();
    if correct != 1 {
        return Err(validator::ValidationError::new("exactly_one_correct_alternative"));
    }

    let mut labels = std::collections::HashSet::new();
    for alt in &q.alternatives {
        let is_letter = alt.label.chars().all(|c| c.is_ascii_uppercase());
        if !is_letter || !labels.insert(alt.label.as_str()) {
            return Err(validator::ValidationError::new("invalid_or_duplicate_label"));
        }
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct ImportQuestionsRequest {
    pub questions: Vec<ImportQuestion>,
}

#[derive(Debug, Serialize)]
pub struct ImportRejection {
    pub index: usize,
    pub reason: String,
}

#[derive(Debug, Default, Serialize)]
pub struct ImportSummary {
    pub imported: usize,
    pub skipped: usize,
    pub rejected: Vec<ImportRejection>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn import(alts: &[(&str, bool)]) -> ImportQuestion {
        ImportQuestion {
            exam_id: "OAB-XXXV".into(),
            question_number: 1,
            subject: Subject::Civil,
            exam_year: 2022,
            exam_phase: 1,
            statement: "Statement".into(),
            explanation: None,
            difficulty: None,
            nullified: false,
            alternatives: alts
                .iter()
                .map(|(label, is_correct)| ImportAlternative {
                    label: label.to_string(),
                    text: format!("text {}", label),
                    is_correct: *is_correct,
                })
                .collect(),
        }
    }

    #[test]
    fn subject_round_trips_through_column_text() {
        for subject in Subject::ALL {
            assert_eq!(subject.as_str().parse::<Subject>(), Ok(subject));
        }
        assert!("PHILOSOPHY".parse::<Subject>().is_err());
    }

    #[test]
    fn import_requires_exactly_one_correct_alternative() {
        assert!(import(&[("A", true), ("B", false)]).validate().is_ok());
        assert!(import(&[("A", true), ("B", true)]).validate().is_err());
        assert!(import(&[("A", false), ("B", false)]).validate().is_err());
    }

    #[test]
    fn import_rejects_duplicate_or_lowercase_labels() {
        assert!(import(&[("A", true), ("A", false)]).validate().is_err());
        assert!(import(&[("a", true), ("B", false)]).validate().is_err());
    }

    #[test]
    fn import_rejects_multi_letter_labels_and_empty_text() {
        assert!(import(&[("AB", true), ("C", false)]).validate().is_err());

        let mut blank = import(&[("A", true), ("B", false)]);
        blank.alternatives[1].text.clear();
        assert!(blank.validate().is_err());
    }

    #[test]
    fn filter_never_matches_nullified_questions() {
        let q = Question {
            id: 7,
            exam_id: "X".into(),
            question_number: 1,
            subject: Subject::Taxes,
            exam_year: 2020,
            exam_phase: 1,
            statement: String::new(),
            explanation: None,
            nullified: true,
            difficulty: None,
        };
        assert!(!QuestionFilter::default().matches(&q));
    }
}
