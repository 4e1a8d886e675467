// src/store/memory.rs

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::seq::IndexedRandom;
use tokio::sync::Mutex;

use crate::{
    error::AppError,
    models::{
        achievement::{Achievement, AchievementDefinition, UnlockOutcome, UnlockedAchievement},
        answer::{AnswerFact, NewAnswer, QuestionAggregate, UserAnswer},
        profile::{ProfileUpdate, UserProfile},
        question::{Alternative, ImportQuestion, Question, QuestionFilter, QuestionRef},
        simulation::{NewSimulation, Simulation, SimulationQuestion, SimulationStatus},
    },
    store::{
        AchievementRepository, AnswerRepository, HealthRepository, ProfileRepository,
        QuestionRepository, SimulationRepository,
    },
    utils::html::clean_html,
};

#[derive(Default)]
struct Tables {
    questions: Vec<Question>,
    alternatives: Vec<Alternative>,
    answers: Vec<UserAnswer>,
    profiles: HashMap<i64, UserProfile>,
    simulations: Vec<Simulation>,
    achievements: Vec<Achievement>,
    /// (user_id, achievement_id, unlocked_at)
    user_achievements: Vec<(i64, i64, DateTime<Utc>)>,
    failing: HashSet<Operation>,
    next_id: i64,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn check(&self, operation: Operation) -> Result<(), AppError> {
        if self.failing.contains(&operation) {
            return Err(AppError::UpstreamUnavailable(format!("{:?} is unavailable", operation)));
        }
        Ok(())
    }
}

/// Store calls that can be switched to fail, for outage scenarios.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Ping,
    UpdateProfile,
    UnlockedKeys,
}

/// Process-local store with the same semantics as the Postgres one.
/// One mutex guards every table, which makes each call atomic.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `operation` fail with `UpstreamUnavailable` until `recover`.
    pub async fn fail(&self, operation: Operation) {
        self.tables.lock().await.failing.insert(operation);
    }

    pub async fn recover(&self, operation: Operation) {
        self.tables.lock().await.failing.remove(&operation);
    }

    /// Backdates an answer, for lookback and trend scenarios.
    pub async fn set_answer_time(&self, answer_id: i64, at: DateTime<Utc>) {
        let mut t = self.tables.lock().await;
        if let Some(a) = t.answers.iter_mut().find(|a| a.id == answer_id) {
            a.created_at = at;
        }
    }
}

#[async_trait]
impl QuestionRepository for MemoryStore {
    async fn find_questions(&self, filter: &QuestionFilter) -> Result<Vec<QuestionRef>, AppError> {
        let t = self.tables.lock().await;
        Ok(t.questions
            .iter()
            .filter(|q| filter.matches(q))
            .map(QuestionRef::from)
            .collect())
    }

    async fn random_question(
        &self,
        filter: &QuestionFilter,
        avoid: &HashSet<i64>,
    ) -> Result<Option<QuestionRef>, AppError> {
        let t = self.tables.lock().await;
        let (fresh, seen): (Vec<QuestionRef>, Vec<QuestionRef>) = t
            .questions
            .iter()
            .filter(|q| filter.matches(q))
            .map(QuestionRef::from)
            .partition(|q| !avoid.contains(&q.id));
        let pool = if fresh.is_empty() { seen } else { fresh };
        let picked = pool.choose(&mut rand::rng()).copied();
        Ok(picked)
    }

    async fn find_question(&self, id: i64) -> Result<Option<Question>, AppError> {
        let t = self.tables.lock().await;
        Ok(t.questions.iter().find(|q| q.id == id).cloned())
    }

    async fn find_questions_by_ids(&self, ids: &[i64]) -> Result<Vec<Question>, AppError> {
        let t = self.tables.lock().await;
        Ok(t.questions
            .iter()
            .filter(|q| ids.contains(&q.id))
            .cloned()
            .collect())
    }

    async fn find_alternatives(&self, question_id: i64) -> Result<Vec<Alternative>, AppError> {
        let t = self.tables.lock().await;
        Ok(t.alternatives
            .iter()
            .filter(|a| a.question_id == question_id)
            .cloned()
            .collect())
    }

    async fn find_alternatives_for(&self, question_ids: &[i64]) -> Result<Vec<Alternative>, AppError> {
        let t = self.tables.lock().await;
        Ok(t.alternatives
            .iter()
            .filter(|a| question_ids.contains(&a.question_id))
            .cloned()
            .collect())
    }

    async fn import_question(&self, q: &ImportQuestion) -> Result<bool, AppError> {
        let mut t = self.tables.lock().await;
        let duplicate = t
            .questions
            .iter()
            .any(|e| e.exam_id == q.exam_id && e.question_number == q.question_number);
        if duplicate {
            return Ok(false);
        }

        let id = t.next_id();
        t.questions.push(Question {
            id,
            exam_id: q.exam_id.clone(),
            question_number: q.question_number,
            subject: q.subject,
            exam_year: q.exam_year,
            exam_phase: q.exam_phase,
            statement: clean_html(&q.statement),
            explanation: q.explanation.as_deref().map(clean_html),
            nullified: q.nullified,
            difficulty: q.difficulty,
        });
        for alt in &q.alternatives {
            let alt_id = t.next_id();
            t.alternatives.push(Alternative {
                id: alt_id,
                question_id: id,
                label: alt.label.clone(),
                text: clean_html(&alt.text),
                is_correct: alt.is_correct,
            });
        }
        Ok(true)
    }
}

#[async_trait]
impl AnswerRepository for MemoryStore {
    async fn record_answer(&self, answer: NewAnswer) -> Result<UserAnswer, AppError> {
        let mut t = self.tables.lock().await;
        if let Some(simulation_id) = answer.simulation_id {
            let open = t
                .simulations
                .iter()
                .any(|s| s.id == simulation_id && s.status == SimulationStatus::Created);
            if !open {
                return Err(AppError::Conflict("Simulation already finished".to_string()));
            }
        }
        let record = UserAnswer {
            id: t.next_id(),
            user_id: answer.user_id,
            question_id: answer.question_id,
            alternative_id: answer.alternative_id,
            simulation_id: answer.simulation_id,
            is_correct: answer.is_correct,
            time_spent: answer.time_spent,
            confidence: answer.confidence,
            created_at: Utc::now(),
        };
        t.answers.push(record.clone());
        Ok(record)
    }

    async fn retract_answer(&self, answer_id: i64) -> Result<(), AppError> {
        let mut t = self.tables.lock().await;
        t.answers.retain(|a| a.id != answer_id);
        Ok(())
    }

    async fn answered_since(
        &self,
        user_id: i64,
        since: DateTime<Utc>,
    ) -> Result<HashSet<i64>, AppError> {
        let t = self.tables.lock().await;
        Ok(t.answers
            .iter()
            .filter(|a| a.user_id == user_id && a.created_at >= since)
            .map(|a| a.question_id)
            .collect())
    }

    async fn incorrect_question_ids(&self, user_id: i64) -> Result<Vec<i64>, AppError> {
        let t = self.tables.lock().await;
        let mut seen = HashSet::new();
        Ok(t.answers
            .iter()
            .filter(|a| a.user_id == user_id && !a.is_correct)
            .filter(|a| seen.insert(a.question_id))
            .map(|a| a.question_id)
            .collect())
    }

    async fn question_aggregate(&self, question_id: i64) -> Result<QuestionAggregate, AppError> {
        let t = self.tables.lock().await;
        let answers: Vec<_> = t.answers.iter().filter(|a| a.question_id == question_id).collect();
        if answers.is_empty() {
            return Ok(QuestionAggregate::default());
        }
        let total = answers.len() as i64;
        let correct = answers.iter().filter(|a| a.is_correct).count() as i64;
        let time: i64 = answers.iter().map(|a| a.time_spent as i64).sum();
        Ok(QuestionAggregate {
            total,
            correct,
            average_time: time as f64 / total as f64,
        })
    }

    async fn answer_facts(&self, user_id: i64) -> Result<Vec<AnswerFact>, AppError> {
        let t = self.tables.lock().await;
        let mut facts: Vec<AnswerFact> = t
            .answers
            .iter()
            .rev()
            .filter(|a| a.user_id == user_id)
            .filter_map(|a| {
                let q = t.questions.iter().find(|q| q.id == a.question_id)?;
                Some(AnswerFact {
                    question_id: a.question_id,
                    alternative_id: a.alternative_id,
                    subject: q.subject,
                    difficulty: q.difficulty,
                    is_correct: a.is_correct,
                    time_spent: a.time_spent,
                    created_at: a.created_at,
                })
            })
            .collect();
        facts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(facts)
    }

    async fn simulation_answers(&self, simulation_id: i64) -> Result<Vec<UserAnswer>, AppError> {
        let t = self.tables.lock().await;
        Ok(t.answers
            .iter()
            .filter(|a| a.simulation_id == Some(simulation_id))
            .cloned()
            .collect())
    }

    async fn latest_wrong_answers(&self, user_id: i64) -> Result<Vec<UserAnswer>, AppError> {
        let t = self.tables.lock().await;
        let mut seen = HashSet::new();
        let mut wrong: Vec<UserAnswer> = t
            .answers
            .iter()
            .rev()
            .filter(|a| a.user_id == user_id && !a.is_correct)
            .filter(|a| seen.insert(a.question_id))
            .cloned()
            .collect();
        wrong.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(wrong)
    }
}

#[async_trait]
impl ProfileRepository for MemoryStore {
    async fn load_profile(&self, user_id: i64) -> Result<UserProfile, AppError> {
        let mut t = self.tables.lock().await;
        Ok(t.profiles
            .entry(user_id)
            .or_insert_with(|| UserProfile::new(user_id))
            .clone())
    }

    async fn update_profile(
        &self,
        user_id: i64,
        expected_version: i64,
        update: &ProfileUpdate,
    ) -> Result<bool, AppError> {
        let mut t = self.tables.lock().await;
        t.check(Operation::UpdateProfile)?;
        match t.profiles.get_mut(&user_id) {
            Some(profile) if profile.version == expected_version => {
                update.apply_to(profile);
                Ok(true)
            }
            Some(_) => Ok(false),
            None => Err(AppError::NotFound(format!("Profile for user {} not found", user_id))),
        }
    }

    async fn top_profiles(&self, limit: i64) -> Result<Vec<UserProfile>, AppError> {
        let t = self.tables.lock().await;
        let mut profiles: Vec<UserProfile> = t.profiles.values().cloned().collect();
        profiles.sort_by(|a, b| {
            b.total_points
                .cmp(&a.total_points)
                .then(a.user_id.cmp(&b.user_id))
        });
        profiles.truncate(limit.max(0) as usize);
        Ok(profiles)
    }
}

#[async_trait]
impl SimulationRepository for MemoryStore {
    async fn create_simulation(&self, new: NewSimulation) -> Result<Simulation, AppError> {
        let mut t = self.tables.lock().await;
        let simulation = Simulation {
            id: t.next_id(),
            user_id: new.user_id,
            simulation_type: new.simulation_type,
            total_questions: new.question_ids.len() as i32,
            subjects: new.subjects,
            target_difficulty: new.target_difficulty,
            status: SimulationStatus::Created,
            score: None,
            time_spent: None,
            started_at: Utc::now(),
            completed_at: None,
            questions: new
                .question_ids
                .iter()
                .enumerate()
                .map(|(i, &question_id)| SimulationQuestion {
                    question_id,
                    order: i as i32 + 1,
                })
                .collect(),
        };
        t.simulations.push(simulation.clone());
        Ok(simulation)
    }

    async fn find_simulation(&self, id: i64) -> Result<Option<Simulation>, AppError> {
        let t = self.tables.lock().await;
        Ok(t.simulations.iter().find(|s| s.id == id).cloned())
    }

    async fn list_simulations(&self, user_id: i64) -> Result<Vec<Simulation>, AppError> {
        let t = self.tables.lock().await;
        Ok(t.simulations
            .iter()
            .rev()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn complete_simulation(
        &self,
        id: i64,
        score: f64,
        time_spent: i64,
        completed_at: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let mut t = self.tables.lock().await;
        let simulation = t
            .simulations
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| AppError::NotFound("Simulation not found".to_string()))?;
        if simulation.status == SimulationStatus::Completed {
            return Ok(false);
        }
        simulation.status = SimulationStatus::Completed;
        simulation.score = Some(score);
        simulation.time_spent = Some(time_spent);
        simulation.completed_at = Some(completed_at);
        Ok(true)
    }

    async fn completed_scores(&self, user_id: i64) -> Result<Vec<f64>, AppError> {
        let t = self.tables.lock().await;
        Ok(t.simulations
            .iter()
            .filter(|s| s.user_id == user_id && s.status == SimulationStatus::Completed)
            .filter_map(|s| s.score)
            .collect())
    }
}

#[async_trait]
impl AchievementRepository for MemoryStore {
    async fn unlocked_keys(&self, user_id: i64) -> Result<Vec<String>, AppError> {
        let t = self.tables.lock().await;
        t.check(Operation::UnlockedKeys)?;
        Ok(t.user_achievements
            .iter()
            .filter(|(uid, _, _)| *uid == user_id)
            .filter_map(|(_, aid, _)| t.achievements.iter().find(|a| a.id == *aid))
            .map(|a| a.key.clone())
            .collect())
    }

    async fn unlock_and_award(
        &self,
        user_id: i64,
        definition: &AchievementDefinition,
        expected_version: i64,
        bonus: &ProfileUpdate,
    ) -> Result<UnlockOutcome, AppError> {
        let mut t = self.tables.lock().await;

        let existing = t
            .achievements
            .iter()
            .find(|a| a.key == definition.key)
            .map(|a| a.id);
        let achievement_id = match existing {
            Some(id) => id,
            None => {
                let id = t.next_id();
                t.achievements.push(Achievement {
                    id,
                    key: definition.key.to_string(),
                    name: definition.name.to_string(),
                    description: definition.description.to_string(),
                    icon: definition.icon.to_string(),
                    points: definition.points,
                });
                id
            }
        };

        let held = t
            .user_achievements
            .iter()
            .any(|(uid, aid, _)| *uid == user_id && *aid == achievement_id);
        if held {
            return Ok(UnlockOutcome::AlreadyHeld);
        }

        let profile = t
            .profiles
            .entry(user_id)
            .or_insert_with(|| UserProfile::new(user_id));
        if profile.version != expected_version {
            return Ok(UnlockOutcome::VersionConflict);
        }
        bonus.apply_to(profile);
        t.user_achievements.push((user_id, achievement_id, Utc::now()));
        Ok(UnlockOutcome::Unlocked)
    }

    async fn user_achievements(&self, user_id: i64) -> Result<Vec<UnlockedAchievement>, AppError> {
        let t = self.tables.lock().await;
        Ok(t.user_achievements
            .iter()
            .filter(|(uid, _, _)| *uid == user_id)
            .filter_map(|(_, aid, at)| {
                let a = t.achievements.iter().find(|a| a.id == *aid)?;
                Some(UnlockedAchievement {
                    key: a.key.clone(),
                    name: a.name.clone(),
                    description: a.description.clone(),
                    icon: a.icon.clone(),
                    points: a.points,
                    unlocked_at: *at,
                })
            })
            .collect())
    }
}

#[async_trait]
impl HealthRepository for MemoryStore {
    async fn ping(&self) -> Result<(), AppError> {
        self.tables.lock().await.check(Operation::Ping)
    }
}
