// src/engine/achievements.rs

use std::collections::HashMap;

use crate::{
    engine::progression::bonus_update,
    error::AppError,
    models::{
        achievement::{AchievementDefinition, UnlockOutcome},
        answer::AnswerFact,
        profile::UserProfile,
        question::Subject,
    },
    store::Store,
    utils::retry::{RetryConfig, retry_when},
};

/// Answers needed in a subject before its accuracy counts towards mastery.
pub const MASTERY_MIN_ANSWERS: i64 = 20;
/// Correct answers faster than this count as speed runs.
pub const SPEED_RUN_SECONDS: i32 = 30;

/// Derived statistics the rules are evaluated against.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserStats {
    pub total_questions: i64,
    pub correct_answers: i64,
    pub streak: i32,
    pub total_simulations: usize,
    pub perfect_simulations: usize,
    /// Accuracy percentage, only for subjects with enough answers.
    pub subject_mastery: HashMap<Subject, f64>,
    pub speed_runs: usize,
}

impl UserStats {
    /// Builds the snapshot from the freshly written profile, the answer log
    /// and the scores of completed simulations.
    pub fn from_parts(profile: &UserProfile, facts: &[AnswerFact], completed_scores: &[f64]) -> Self {
        let mut per_subject: HashMap<Subject, (i64, i64)> = HashMap::new();
        for fact in facts {
            let entry = per_subject.entry(fact.subject).or_default();
            entry.0 += 1;
            if fact.is_correct {
                entry.1 += 1;
            }
        }

        let subject_mastery = per_subject
            .into_iter()
            .filter(|(_, (total, _))| *total >= MASTERY_MIN_ANSWERS)
            .map(|(subject, (total, correct))| (subject, correct as f64 / total as f64 * 100.0))
            .collect();

        Self {
            total_questions: profile.total_questions,
            correct_answers: profile.correct_answers,
            streak: profile.streak,
            total_simulations: completed_scores.len(),
            perfect_simulations: completed_scores.iter().filter(|s| **s >= 100.0).count(),
            subject_mastery,
            speed_runs: facts
                .iter()
                .filter(|f| f.is_correct && f.time_spent < SPEED_RUN_SECONDS)
                .count(),
        }
    }

    fn accuracy(&self) -> f64 {
        if self.total_questions == 0 {
            return 0.0;
        }
        self.correct_answers as f64 / self.total_questions as f64 * 100.0
    }
}

pub struct AchievementRule {
    pub definition: AchievementDefinition,
    pub condition: fn(&UserStats) -> bool,
}

const fn rule(
    key: &'static str,
    name: &'static str,
    description: &'static str,
    icon: &'static str,
    points: i64,
    condition: fn(&UserStats) -> bool,
) -> AchievementRule {
    AchievementRule {
        definition: AchievementDefinition {
            key,
            name,
            description,
            icon,
            points,
        },
        condition,
    }
}

pub static ACHIEVEMENTS: [AchievementRule; 11] = [
    rule(
        "FIRST_CORRECT",
        "Primeira Acertada",
        "Responda sua primeira questão corretamente",
        "🎯",
        50,
        |s| s.correct_answers >= 1,
    ),
    rule(
        "STREAK_7",
        "Sequência de 7 Dias",
        "Estude por 7 dias consecutivos",
        "🔥",
        200,
        |s| s.streak >= 7,
    ),
    rule(
        "STREAK_30",
        "Sequência de 30 Dias",
        "Estude por 30 dias consecutivos",
        "🔥",
        1000,
        |s| s.streak >= 30,
    ),
    rule(
        "PERFECT_SIMULATION",
        "Simulado Perfeito",
        "Acerte 100% das questões em um simulado",
        "🏆",
        500,
        |s| s.perfect_simulations >= 1,
    ),
    rule(
        "MASTER_SUBJECT",
        "Mestre da Matéria",
        "Alcance 90% de acerto em uma matéria (mín. 20 questões)",
        "📚",
        300,
        |s| s.subject_mastery.values().any(|accuracy| *accuracy >= 90.0),
    ),
    rule(
        "SPEEDSTER",
        "Velocista",
        "Responda 10 questões em menos de 30 segundos cada",
        "⚡",
        250,
        |s| s.speed_runs >= 10,
    ),
    rule(
        "QUESTIONS_100",
        "Centurião",
        "Responda 100 questões",
        "🎓",
        200,
        |s| s.total_questions >= 100,
    ),
    rule(
        "QUESTIONS_500",
        "Veterano",
        "Responda 500 questões",
        "🎓",
        500,
        |s| s.total_questions >= 500,
    ),
    rule(
        "QUESTIONS_1000",
        "Lenda",
        "Responda 1000 questões",
        "🎓",
        1000,
        |s| s.total_questions >= 1000,
    ),
    rule(
        "SIMULATIONS_10",
        "Maratonista",
        "Complete 10 simulados",
        "📝",
        300,
        |s| s.total_simulations >= 10,
    ),
    rule(
        "ACCURACY_80",
        "Certeiro",
        "Alcance 80% de acerto geral (mín. 50 questões)",
        "🎯",
        400,
        |s| s.total_questions >= 50 && s.accuracy() >= 80.0,
    ),
];

/// Rules that hold for `stats` and whose key is not already unlocked.
pub fn check_achievements(stats: &UserStats, unlocked_keys: &[String]) -> Vec<AchievementDefinition> {
    ACHIEVEMENTS
        .iter()
        .filter(|r| !unlocked_keys.iter().any(|k| k == r.definition.key))
        .filter(|r| (r.condition)(stats))
        .map(|r| r.definition)
        .collect()
}

pub async fn snapshot<S: Store + ?Sized>(store: &S, user_id: i64) -> Result<UserStats, AppError> {
    let profile = store.load_profile(user_id).await?;
    let facts = store.answer_facts(user_id).await?;
    let scores = store.completed_scores(user_id).await?;
    Ok(UserStats::from_parts(&profile, &facts, &scores))
}

/// Evaluates the rules against a fresh snapshot and unlocks what qualifies.
///
/// Must run after the answer's profile update so the snapshot is current.
/// Each unlock creates the join row and applies the bonus in one store call,
/// so a bonus is granted at most once per user and achievement even when
/// two evaluations race.
pub async fn process_achievements<S: Store + ?Sized>(
    store: &S,
    user_id: i64,
    retry: &RetryConfig,
) -> Result<Vec<AchievementDefinition>, AppError> {
    let stats = snapshot(store, user_id).await?;
    let unlocked = store.unlocked_keys(user_id).await?;
    let candidates = check_achievements(&stats, &unlocked);

    let mut awarded = Vec::with_capacity(candidates.len());
    for definition in candidates {
        let outcome = retry_when(retry, AppError::is_race_loss, || async move {
            let profile = store.load_profile(user_id).await?;
            let bonus = bonus_update(&profile, definition.points);
            match store
                .unlock_and_award(user_id, &definition, profile.version, &bonus)
                .await?
            {
                UnlockOutcome::VersionConflict => Err(AppError::RaceLoss(format!(
                    "profile of user {} changed while awarding {}",
                    user_id, definition.key
                ))),
                other => Ok(other),
            }
        })
        .await?;

        if outcome == UnlockOutcome::Unlocked {
            tracing::info!(user_id, key = definition.key, points = definition.points, "Achievement unlocked");
            awarded.push(definition);
        }
    }

    Ok(awarded)
}
