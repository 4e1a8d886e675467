// src/engine/queue.rs

//! Background gamification work for simulation answers and finishes.
//!
//! One worker drains a bounded channel, so jobs for a process run in
//! enqueue order. Every job reports through a oneshot so callers and tests
//! can wait for it.

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use chrono::NaiveDate;
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};

use crate::{
    engine::{achievements::process_achievements, progression::apply_answer},
    error::AppError,
    models::answer::AnswerOutcome,
    store::Store,
    utils::retry::RetryConfig,
};

#[derive(Debug, Clone, PartialEq)]
pub enum Job {
    /// Progression for one evaluated answer, then achievements.
    Progress {
        user_id: i64,
        outcome: AnswerOutcome,
        today: NaiveDate,
    },
    /// Achievement evaluation only, e.g. after a simulation finishes.
    Achievements { user_id: i64 },
}

impl Job {
    fn user_id(&self) -> i64 {
        match self {
            Job::Progress { user_id, .. } | Job::Achievements { user_id } => *user_id,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Job::Progress { .. } => "progress",
            Job::Achievements { .. } => "achievements",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobReport {
    Succeeded,
    Failed(String),
}

pub struct JobTicket {
    pub id: u64,
    pub completion: oneshot::Receiver<JobReport>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    pub enqueued: u64,
    pub succeeded: u64,
    pub failed: u64,
}

#[derive(Default)]
struct Counters {
    enqueued: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
}

struct Envelope {
    id: u64,
    job: Job,
    done: oneshot::Sender<JobReport>,
}

#[derive(Clone)]
pub struct GamificationQueue {
    sender: mpsc::Sender<Envelope>,
    next_id: Arc<AtomicU64>,
    counters: Arc<Counters>,
}

impl GamificationQueue {
    /// Spawns the worker on the current tokio runtime.
    pub fn start(store: Arc<dyn Store>, retry: RetryConfig, capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let counters = Arc::new(Counters::default());
        tokio::spawn(worker(store, retry, receiver, counters.clone()));

        Self {
            sender,
            next_id: Arc::new(AtomicU64::new(1)),
            counters,
        }
    }

    /// Waits for channel capacity when the queue is full.
    pub async fn enqueue(&self, job: Job) -> Result<JobTicket, AppError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (done, completion) = oneshot::channel();
        self.sender
            .send(Envelope { id, job, done })
            .await
            .map_err(|_| AppError::InternalServerError("Gamification worker is not running".to_string()))?;
        self.counters.enqueued.fetch_add(1, Ordering::Relaxed);
        Ok(JobTicket { id, completion })
    }

    pub fn stats(&self) -> QueueStats {
        QueueStats {
            enqueued: self.counters.enqueued.load(Ordering::Relaxed),
            succeeded: self.counters.succeeded.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
        }
    }
}

async fn worker(
    store: Arc<dyn Store>,
    retry: RetryConfig,
    mut receiver: mpsc::Receiver<Envelope>,
    counters: Arc<Counters>,
) {
    tracing::info!("Gamification worker started");

    while let Some(Envelope { id, job, done }) = receiver.recv().await {
        let report = match run(&*store, &job, &retry).await {
            Ok(()) => {
                counters.succeeded.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(job_id = id, kind = job.kind(), user_id = job.user_id(), "Job done");
                JobReport::Succeeded
            }
            Err(e) => {
                counters.failed.fetch_add(1, Ordering::Relaxed);
                tracing::error!(
                    job_id = id,
                    kind = job.kind(),
                    user_id = job.user_id(),
                    "Gamification job failed: {}",
                    e
                );
                JobReport::Failed(e.to_string())
            }
        };
        // The caller may have stopped listening.
        let _ = done.send(report);
    }

    tracing::info!("Gamification worker stopped");
}

async fn run(store: &dyn Store, job: &Job, retry: &RetryConfig) -> Result<(), AppError> {
    match *job {
        Job::Progress {
            user_id,
            outcome,
            today,
        } => {
            let applied = apply_answer(store, user_id, outcome, today, retry).await?;
            if applied.progression.level_up {
                tracing::info!(user_id, level = applied.profile.level, "Level up");
            }
            process_achievements(store, user_id, retry).await?;
        }
        Job::Achievements { user_id } => {
            process_achievements(store, user_id, retry).await?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{
        ProfileRepository,
        memory::{MemoryStore, Operation},
    };

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 5, 10).unwrap()
    }

    #[tokio::test]
    async fn progress_jobs_apply_in_order() {
        let store = Arc::new(MemoryStore::new());
        let queue = GamificationQueue::start(store.clone(), RetryConfig::immediate(3), 8);

        let mut tickets = Vec::new();
        for _ in 0..3 {
            let ticket = queue
                .enqueue(Job::Progress {
                    user_id: 9,
                    outcome: AnswerOutcome {
                        is_correct: true,
                        time_spent: 60,
                        difficulty: None,
                    },
                    today: today(),
                })
                .await
                .unwrap();
            tickets.push(ticket);
        }

        let ids: Vec<u64> = tickets.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        for ticket in tickets {
            assert_eq!(ticket.completion.await.unwrap(), JobReport::Succeeded);
        }

        let profile = store.load_profile(9).await.unwrap();
        assert_eq!(profile.total_questions, 3);
        assert_eq!(profile.correct_answers, 3);
        // FIRST_CORRECT (+50) on top of 100, then 110 twice at streak 1.
        assert_eq!(profile.total_points, 100 + 110 + 110 + 50);
        assert_eq!(
            queue.stats(),
            QueueStats {
                enqueued: 3,
                succeeded: 3,
                failed: 0
            }
        );
    }

    #[tokio::test]
    async fn achievements_job_for_fresh_user_awards_nothing() {
        let store = Arc::new(MemoryStore::new());
        let queue = GamificationQueue::start(store.clone(), RetryConfig::immediate(3), 1);

        for _ in 0..2 {
            let ticket = queue.enqueue(Job::Achievements { user_id: 4 }).await.unwrap();
            assert_eq!(ticket.completion.await.unwrap(), JobReport::Succeeded);
        }
        assert_eq!(store.load_profile(4).await.unwrap().total_points, 0);
    }

    #[tokio::test]
    async fn failed_job_is_reported_and_worker_keeps_running() {
        let store = Arc::new(MemoryStore::new());
        let queue = GamificationQueue::start(store.clone(), RetryConfig::immediate(3), 4);

        store.fail(Operation::UnlockedKeys).await;
        let ticket = queue.enqueue(Job::Achievements { user_id: 2 }).await.unwrap();
        assert!(matches!(ticket.completion.await.unwrap(), JobReport::Failed(_)));

        store.recover(Operation::UnlockedKeys).await;
        let ticket = queue.enqueue(Job::Achievements { user_id: 2 }).await.unwrap();
        assert_eq!(ticket.completion.await.unwrap(), JobReport::Succeeded);

        assert_eq!(
            queue.stats(),
            QueueStats {
                enqueued: 2,
                succeeded: 1,
                failed: 1
            }
        );
    }
}
