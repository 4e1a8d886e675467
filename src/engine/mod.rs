// src/engine/mod.rs

//! The Practice & Progression Engine.
//!
//! [`PracticeEngine`] is the single entry point the HTTP handlers call. It
//! owns its collaborators explicitly: a [`Store`], a [`RateLimiter`] and the
//! [`GamificationQueue`] worker.

pub mod achievements;
pub mod assembler;
pub mod evaluator;
pub mod progression;
pub mod queue;
pub mod report;
pub mod sampler;

use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use chrono::Utc;
use validator::Validate;

use crate::{
    config::Config,
    engine::{
        achievements::process_achievements,
        assembler::assemble,
        evaluator::evaluate,
        progression::{MAX_LEVEL, apply_answer, points_to_next_level},
        queue::{GamificationQueue, Job},
        sampler::{SampleRequest, sample_one},
    },
    error::AppError,
    models::{
        answer::{AnswerRequest, AnswerResponse, ProgressSummary, WrongQuestion, WrongQuestionsResponse},
        profile::{LeaderboardEntry, LevelProgress, MeResponse},
        question::{
            Alternative, ImportQuestionsRequest, ImportRejection, ImportSummary, NextQuestionParams,
            PublicQuestion, Question, Subject,
        },
        report::{FinishReport, HealthReport, SimulationAnalytics, UserAnalytics},
        simulation::{
            CreateSimulationRequest, CreateSimulationResponse, Simulation, SimulationDetail,
            SimulationQuestionView, SimulationStatus, SimulationSummary,
        },
    },
    store::Store,
    utils::{
        rate_limit::{RateLimiter, RateScope, enforce},
        retry::RetryConfig,
    },
};

pub const LEADERBOARD_SIZE: i64 = 10;

#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub lookback_days: i64,
    pub retry: RetryConfig,
    pub queue_capacity: usize,
}

impl EngineSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            lookback_days: config.lookback_days,
            retry: RetryConfig::with_attempts(config.profile_retry_attempts),
            queue_capacity: config.gamification_queue_capacity,
        }
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            lookback_days: 90,
            retry: RetryConfig::default(),
            queue_capacity: 1024,
        }
    }
}

pub struct PracticeEngine {
    store: Arc<dyn Store>,
    limiter: Arc<dyn RateLimiter>,
    queue: GamificationQueue,
    settings: EngineSettings,
}

impl PracticeEngine {
    /// Starts the gamification worker, so this must run inside a tokio runtime.
    pub fn new(store: Arc<dyn Store>, limiter: Arc<dyn RateLimiter>, settings: EngineSettings) -> Self {
        let queue = GamificationQueue::start(store.clone(), settings.retry.clone(), settings.queue_capacity);
        Self {
            store,
            limiter,
            queue,
            settings,
        }
    }

    pub fn queue(&self) -> &GamificationQueue {
        &self.queue
    }

    /// Database reachability. Never fails; an unreachable store is reported.
    pub async fn health(&self) -> HealthReport {
        let database = match self.store.ping().await {
            Ok(()) => true,
            Err(e) => {
                tracing::error!("Health check failed: {}", e);
                false
            }
        };
        HealthReport {
            status: if database { "healthy" } else { "unhealthy" },
            database,
            timestamp: Utc::now(),
            version: env!("CARGO_PKG_VERSION"),
        }
    }

    /// One practice question from the diversified sampler.
    pub async fn next_question(
        &self,
        user_id: i64,
        params: &NextQuestionParams,
    ) -> Result<PublicQuestion, AppError> {
        enforce(&*self.limiter, RateScope::NextQuestion, user_id).await?;

        let request = SampleRequest {
            user_id,
            subjects: params.subject.into_iter().collect(),
            difficulty: params.difficulty,
            count: 1,
            exclude_answered: params.exclude_answered,
            ..Default::default()
        };
        let question_id = sample_one(&*self.store, &request, self.settings.lookback_days, Utc::now())
            .await?
            .ok_or_else(|| AppError::NotFound("No questions available for this filter".to_string()))?;

        let question = self
            .store
            .find_question(question_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Question not found".to_string()))?;
        let alternatives = self.store.find_alternatives(question_id).await?;

        Ok(PublicQuestion::new(question, alternatives))
    }

    /// Grades and records an answer.
    ///
    /// In practice mode progression and achievements run before responding.
    /// A progression failure retracts the recorded answer before erroring.
    /// Inside a simulation they are queued and the response carries the job id.
    pub async fn submit_answer(
        &self,
        user_id: i64,
        request: &AnswerRequest,
    ) -> Result<AnswerResponse, AppError> {
        enforce(&*self.limiter, RateScope::Answer, user_id).await?;

        let evaluation = evaluate(&*self.store, user_id, request).await?;
        let today = Utc::now().date_naive();

        let mut response = AnswerResponse {
            answer_id: evaluation.answer.id,
            is_correct: evaluation.answer.is_correct,
            correct_alternative_id: evaluation.correct_alternative_id,
            explanation: evaluation.explanation.clone(),
            statistics: evaluation.statistics.clone(),
            progress: None,
            new_achievements: Vec::new(),
            deferred_job_id: None,
        };

        if request.simulation_id.is_some() {
            let ticket = self
                .queue
                .enqueue(Job::Progress {
                    user_id,
                    outcome: evaluation.outcome(),
                    today,
                })
                .await?;
            response.deferred_job_id = Some(ticket.id);
            return Ok(response);
        }

        let applied = match apply_answer(
            &*self.store,
            user_id,
            evaluation.outcome(),
            today,
            &self.settings.retry,
        )
        .await
        {
            Ok(applied) => applied,
            Err(e) => {
                // The log row must not outlive a progression that never happened.
                if let Err(retract) = self.store.retract_answer(evaluation.answer.id).await {
                    tracing::error!(
                        user_id,
                        answer_id = evaluation.answer.id,
                        "Failed to retract answer after progression error: {}",
                        retract
                    );
                }
                return Err(e);
            }
        };
        if applied.progression.level_up {
            tracing::info!(user_id, level = applied.profile.level, "Level up");
        }

        response.new_achievements = match process_achievements(&*self.store, user_id, &self.settings.retry).await {
            Ok(unlocked) => unlocked,
            Err(e) => {
                tracing::error!(user_id, "Achievement evaluation failed: {}", e);
                Vec::new()
            }
        };

        // Bonuses may have moved the totals past the answer's own update.
        let profile = self.store.load_profile(user_id).await?;
        response.progress = Some(ProgressSummary {
            points_awarded: applied.progression.points_awarded(),
            total_points: profile.total_points,
            streak: profile.streak,
            level: profile.level,
            level_up: applied.progression.level_up || profile.level > applied.profile.level,
        });

        Ok(response)
    }

    pub async fn create_simulation(
        &self,
        user_id: i64,
        request: &CreateSimulationRequest,
    ) -> Result<CreateSimulationResponse, AppError> {
        enforce(&*self.limiter, RateScope::Simulation, user_id).await?;

        let (simulation, outcome) = assemble(
            &*self.store,
            user_id,
            request,
            self.settings.lookback_days,
            Utc::now(),
        )
        .await?;

        Ok(CreateSimulationResponse {
            simulation: SimulationSummary::from(&simulation),
            requested_questions: outcome.requested,
            shortfall: outcome.shortfall,
        })
    }

    pub async fn list_simulations(&self, user_id: i64) -> Result<Vec<SimulationSummary>, AppError> {
        let simulations = self.store.list_simulations(user_id).await?;
        Ok(simulations.iter().map(SimulationSummary::from).collect())
    }

    /// Another user's simulation is reported as missing.
    async fn owned_simulation(&self, user_id: i64, simulation_id: i64) -> Result<Simulation, AppError> {
        self.store
            .find_simulation(simulation_id)
            .await?
            .filter(|s| s.user_id == user_id)
            .ok_or_else(|| AppError::NotFound("Simulation not found".to_string()))
    }

    /// The simulation's questions in presentation order, answer keys stripped.
    pub async fn simulation_detail(&self, user_id: i64, simulation_id: i64) -> Result<SimulationDetail, AppError> {
        let simulation = self.owned_simulation(user_id, simulation_id).await?;
        let ids: Vec<i64> = simulation.questions.iter().map(|q| q.question_id).collect();

        let mut questions: HashMap<i64, Question> = self
            .store
            .find_questions_by_ids(&ids)
            .await?
            .into_iter()
            .map(|q| (q.id, q))
            .collect();
        let mut alternatives = group_alternatives(self.store.find_alternatives_for(&ids).await?);

        let mut ordered = simulation.questions.clone();
        ordered.sort_by_key(|q| q.order);
        let views = ordered
            .iter()
            .filter_map(|sq| {
                let question = questions.remove(&sq.question_id)?;
                let alternatives = alternatives.remove(&sq.question_id).unwrap_or_default();
                Some(SimulationQuestionView {
                    order: sq.order,
                    question: PublicQuestion::new(question, alternatives),
                })
            })
            .collect();

        Ok(SimulationDetail {
            simulation: SimulationSummary::from(&simulation),
            questions: views,
        })
    }

    /// Scores the simulation from the recorded answers and completes it.
    pub async fn finish_simulation(&self, user_id: i64, simulation_id: i64) -> Result<FinishReport, AppError> {
        let simulation = self.owned_simulation(user_id, simulation_id).await?;
        if simulation.status == SimulationStatus::Completed {
            return Err(AppError::Conflict("Simulation already finished".to_string()));
        }

        let answers = self.store.simulation_answers(simulation_id).await?;
        let ids: Vec<i64> = simulation.questions.iter().map(|q| q.question_id).collect();
        let subject_of: HashMap<i64, Subject> = self
            .store
            .find_questions_by_ids(&ids)
            .await?
            .into_iter()
            .map(|q| (q.id, q.subject))
            .collect();

        let latest = report::latest_per_question(&answers);
        let time_spent: i64 = latest.values().map(|a| i64::from(a.time_spent)).sum();
        let correct = latest.values().filter(|a| a.is_correct).count() as i64;
        let score = report::simulation_score(correct, i64::from(simulation.total_questions));

        let mut finish = report::finish_report(&simulation, &answers, &subject_of, time_spent);

        // A concurrent finish may have won since the read above.
        if !self
            .store
            .complete_simulation(simulation_id, score, time_spent, Utc::now())
            .await?
        {
            return Err(AppError::Conflict("Simulation already finished".to_string()));
        }

        tracing::info!(user_id, simulation_id, score = finish.score, "Simulation finished");

        finish.achievements_job_id = match self.queue.enqueue(Job::Achievements { user_id }).await {
            Ok(ticket) => Some(ticket.id),
            Err(e) => {
                tracing::error!(user_id, simulation_id, "Could not queue achievement evaluation: {}", e);
                None
            }
        };

        Ok(finish)
    }

    pub async fn simulation_analytics(
        &self,
        user_id: i64,
        simulation_id: i64,
    ) -> Result<SimulationAnalytics, AppError> {
        let simulation = self.owned_simulation(user_id, simulation_id).await?;
        let answers = self.store.simulation_answers(simulation_id).await?;

        let ids: Vec<i64> = simulation.questions.iter().map(|q| q.question_id).collect();
        let questions: HashMap<i64, Question> = self
            .store
            .find_questions_by_ids(&ids)
            .await?
            .into_iter()
            .map(|q| (q.id, q))
            .collect();
        let alternatives = self.store.find_alternatives_for(&ids).await?;

        Ok(report::simulation_analytics(&simulation, &answers, &questions, &alternatives))
    }

    pub async fn user_analytics(&self, user_id: i64) -> Result<UserAnalytics, AppError> {
        let facts = self.store.answer_facts(user_id).await?;
        let profile = self.store.load_profile(user_id).await?;
        let today = Utc::now().date_naive();

        let mut subject_performance = report::subject_performance(facts.iter().map(|f| (f.subject, f.is_correct)));
        subject_performance.sort_by(|a, b| b.percentage.total_cmp(&a.percentage));
        let weak_areas = report::weak_areas(&subject_performance, Some(report::RECOMMENDED_WEAK_AREAS));

        Ok(UserAnalytics {
            overview: report::overview(&facts, profile.streak),
            weak_areas,
            subject_performance,
            trend: report::trend(&facts, report::TREND_WINDOW),
            subject_trends: report::subject_trends(&facts, report::SUBJECT_TREND_WINDOW),
            predictions: report::predictions(
                facts.iter().filter(|f| f.is_correct).count() as i64,
                facts.len() as i64,
            ),
            performance_over_time: report::performance_over_time(&facts, today, report::PERFORMANCE_DAYS),
            recent_activity: report::recent_activity(&facts, today, report::ACTIVITY_DAYS),
            difficulty_analysis: report::difficulty_analysis(&facts),
        })
    }

    /// The latest wrong attempt per question, newest first.
    pub async fn wrong_questions(&self, user_id: i64) -> Result<WrongQuestionsResponse, AppError> {
        let wrong = self.store.latest_wrong_answers(user_id).await?;
        let ids: Vec<i64> = wrong.iter().map(|a| a.question_id).collect();

        let questions: HashMap<i64, Question> = self
            .store
            .find_questions_by_ids(&ids)
            .await?
            .into_iter()
            .map(|q| (q.id, q))
            .collect();
        let correct_of: HashMap<i64, i64> = self
            .store
            .find_alternatives_for(&ids)
            .await?
            .into_iter()
            .filter(|a| a.is_correct)
            .map(|a| (a.question_id, a.id))
            .collect();

        let mut by_subject: BTreeMap<Subject, usize> = BTreeMap::new();
        let mut entries = Vec::with_capacity(wrong.len());
        for answer in wrong {
            let Some(q) = questions.get(&answer.question_id) else {
                continue;
            };
            *by_subject.entry(q.subject).or_default() += 1;
            entries.push(WrongQuestion {
                question_id: q.id,
                subject: q.subject,
                exam_year: q.exam_year,
                exam_phase: q.exam_phase,
                question_number: q.question_number,
                statement: q.statement.clone(),
                chosen_alternative_id: answer.alternative_id,
                correct_alternative_id: correct_of.get(&q.id).copied(),
                time_spent: answer.time_spent,
                answered_at: answer.created_at,
            });
        }

        Ok(WrongQuestionsResponse {
            total: entries.len(),
            questions: entries,
            by_subject,
        })
    }

    pub async fn profile_me(&self, user_id: i64) -> Result<MeResponse, AppError> {
        let profile = self.store.load_profile(user_id).await?;
        let achievements = self.store.user_achievements(user_id).await?;

        Ok(MeResponse {
            accuracy: profile.accuracy(),
            level_progress: LevelProgress {
                level: profile.level,
                points_to_next_level: points_to_next_level(profile.total_points),
                max_level: MAX_LEVEL,
            },
            profile,
            achievements,
        })
    }

    pub async fn leaderboard(&self) -> Result<Vec<LeaderboardEntry>, AppError> {
        let top = self.store.top_profiles(LEADERBOARD_SIZE).await?;
        Ok(top
            .into_iter()
            .enumerate()
            .map(|(i, p)| LeaderboardEntry {
                rank: i + 1,
                user_id: p.user_id,
                total_points: p.total_points,
                level: p.level,
                streak: p.streak,
            })
            .collect())
    }

    /// Validates and imports each item independently. Invalid items are
    /// rejected with a reason, duplicates are skipped.
    pub async fn import_questions(&self, request: &ImportQuestionsRequest) -> Result<ImportSummary, AppError> {
        let mut summary = ImportSummary::default();

        for (index, question) in request.questions.iter().enumerate() {
            if let Err(e) = question.validate() {
                summary.rejected.push(ImportRejection {
                    index,
                    reason: e.to_string(),
                });
                continue;
            }
            if self.store.import_question(question).await? {
                summary.imported += 1;
            } else {
                summary.skipped += 1;
            }
        }

        tracing::info!(
            imported = summary.imported,
            skipped = summary.skipped,
            rejected = summary.rejected.len(),
            "Question import finished"
        );
        Ok(summary)
    }
}

fn group_alternatives(alternatives: Vec<Alternative>) -> HashMap<i64, Vec<Alternative>> {
    let mut grouped: HashMap<i64, Vec<Alternative>> = HashMap::new();
    for alternative in alternatives {
        grouped.entry(alternative.question_id).or_default().push(alternative);
    }
    grouped
}
