// src/engine/assembler.rs

use chrono::{DateTime, Utc};

use crate::{
    engine::sampler::{SampleOutcome, SampleRequest, sample},
    error::AppError,
    models::simulation::{CreateSimulationRequest, NewSimulation, Simulation, SimulationType},
    store::Store,
};

/// Resolves type defaults into a sampler request.
///
/// `incorrect_ids` is the user's wrong-answer history and is only consulted
/// for ERROR_REVIEW.
pub fn plan(
    user_id: i64,
    request: &CreateSimulationRequest,
    incorrect_ids: Option<Vec<i64>>,
) -> Result<SampleRequest, AppError> {
    let kind = request.simulation_type;
    let count = request.question_count.unwrap_or_else(|| kind.default_count());

    let mut plan = SampleRequest {
        user_id,
        subjects: request.subjects.clone(),
        difficulty: request.target_difficulty,
        count,
        ..Default::default()
    };

    match kind {
        SimulationType::FullExam => {
            plan.subjects.clear();
            plan.count = kind.default_count();
            plan.distribution = kind.distribution().map(|d| d.to_vec());
        }
        SimulationType::BySubject => {
            if request.subjects.is_empty() {
                return Err(AppError::BadRequest(
                    "BY_SUBJECT simulations need at least one subject".to_string(),
                ));
            }
        }
        SimulationType::ErrorReview => {
            plan.only_ids = Some(incorrect_ids.unwrap_or_default());
        }
        SimulationType::Adaptive | SimulationType::QuickPractice => {}
    }

    Ok(plan)
}

/// Samples and persists a simulation. Question order is the sampler's order
/// and `total_questions` is the number actually sampled, possibly zero.
pub async fn assemble<S: Store + ?Sized>(
    store: &S,
    user_id: i64,
    request: &CreateSimulationRequest,
    lookback_days: i64,
    now: DateTime<Utc>,
) -> Result<(Simulation, SampleOutcome), AppError> {
    let incorrect_ids = match request.simulation_type {
        SimulationType::ErrorReview => Some(store.incorrect_question_ids(user_id).await?),
        _ => None,
    };
    let sample_request = plan(user_id, request, incorrect_ids)?;
    let outcome = sample(store, &sample_request, lookback_days, now).await?;

    let simulation = store
        .create_simulation(NewSimulation {
            user_id,
            simulation_type: request.simulation_type,
            subjects: request.subjects.clone(),
            target_difficulty: request.target_difficulty,
            question_ids: outcome.question_ids.clone(),
        })
        .await?;

    if simulation.total_questions == 0 {
        tracing::warn!(
            user_id,
            simulation_id = simulation.id,
            kind = %request.simulation_type,
            "Created an empty simulation, no questions matched"
        );
    } else {
        tracing::info!(
            user_id,
            simulation_id = simulation.id,
            kind = %request.simulation_type,
            total = simulation.total_questions,
            requested = outcome.requested,
            "Simulation created"
        );
    }

    Ok((simulation, outcome))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::{
        models::{
            answer::NewAnswer,
            question::{Difficulty, ImportAlternative, ImportQuestion, Subject},
            simulation::FULL_EXAM_DISTRIBUTION,
        },
        store::{AnswerRepository, QuestionRepository, memory::MemoryStore},
    };

    fn request(kind: SimulationType) -> CreateSimulationRequest {
        CreateSimulationRequest {
            simulation_type: kind,
            subjects: Vec::new(),
            target_difficulty: None,
            question_count: None,
        }
    }

    async fn seed(store: &MemoryStore, subject: Subject, n: i32, offset: i32) {
        for i in 0..n {
            let imported = store
                .import_question(&ImportQuestion {
                    exam_id: format!("{}-{}", subject, i % 3),
                    question_number: offset + i,
                    subject,
                    exam_year: 2015 + i % 3,
                    exam_phase: 1,
                    statement: format!("{} question {}", subject.label(), i),
                    explanation: None,
                    difficulty: Some(Difficulty::Medium),
                    nullified: false,
                    alternatives: vec![
                        ImportAlternative {
                            label: "A".into(),
                            text: "right".into(),
                            is_correct: true,
                        },
                        ImportAlternative {
                            label: "B".into(),
                            text: "wrong".into(),
                            is_correct: false,
                        },
                    ],
                })
                .await
                .unwrap();
            assert!(imported);
        }
    }

    #[test]
    fn type_defaults() {
        let quick = plan(1, &request(SimulationType::QuickPractice), None).unwrap();
        assert_eq!(quick.count, 20);
        assert!(quick.distribution.is_none());

        let mut full_req = request(SimulationType::FullExam);
        full_req.question_count = Some(10);
        full_req.subjects = vec![Subject::Civil];
        let full = plan(1, &full_req, None).unwrap();
        assert_eq!(full.requested(), 80);
        assert!(full.subjects.is_empty());

        let review = plan(1, &request(SimulationType::ErrorReview), None).unwrap();
        assert_eq!(review.count, 30);
        assert_eq!(review.only_ids, Some(Vec::new()));
    }

    #[test]
    fn by_subject_requires_subjects() {
        assert!(matches!(
            plan(1, &request(SimulationType::BySubject), None),
            Err(AppError::BadRequest(_))
        ));
    }

    #[tokio::test]
    async fn full_exam_assembles_eighty_by_quota() {
        let store = MemoryStore::new();
        for (i, (subject, quota)) in FULL_EXAM_DISTRIBUTION.iter().enumerate() {
            seed(&store, *subject, *quota as i32 + 3, i as i32 * 100).await;
        }

        let (simulation, outcome) =
            assemble(&store, 1, &request(SimulationType::FullExam), 90, Utc::now())
                .await
                .unwrap();

        assert_eq!(simulation.total_questions, 80);
        assert!(outcome.shortfall.is_empty());
        let orders: Vec<i32> = simulation.questions.iter().map(|q| q.order).collect();
        assert_eq!(orders, (1..=80).collect::<Vec<_>>());

        let ids: Vec<i64> = simulation.questions.iter().map(|q| q.question_id).collect();
        let questions = store.find_questions_by_ids(&ids).await.unwrap();
        let mut counts: HashMap<Subject, usize> = HashMap::new();
        for q in questions {
            *counts.entry(q.subject).or_default() += 1;
        }
        for (subject, quota) in FULL_EXAM_DISTRIBUTION {
            assert_eq!(counts.get(&subject).copied().unwrap_or(0), quota);
        }
    }

    #[tokio::test]
    async fn empty_pool_creates_empty_simulation() {
        let store = MemoryStore::new();
        let (simulation, outcome) =
            assemble(&store, 1, &request(SimulationType::Adaptive), 90, Utc::now())
                .await
                .unwrap();
        assert_eq!(simulation.total_questions, 0);
        assert!(simulation.questions.is_empty());
        assert_eq!(outcome.requested, 40);
    }

    #[tokio::test]
    async fn error_review_draws_only_wrong_answers() {
        let store = MemoryStore::new();
        seed(&store, Subject::Criminal, 10, 0).await;
        let pool = store.find_questions(&Default::default()).await.unwrap();

        for q in pool.iter().take(3) {
            let alternatives = store.find_alternatives(q.id).await.unwrap();
            let wrong = alternatives.iter().find(|a| !a.is_correct).unwrap();
            store
                .record_answer(NewAnswer {
                    user_id: 4,
                    question_id: q.id,
                    alternative_id: wrong.id,
                    simulation_id: None,
                    is_correct: false,
                    time_spent: 40,
                    confidence: None,
                })
                .await
                .unwrap();
        }

        let (simulation, _) =
            assemble(&store, 4, &request(SimulationType::ErrorReview), 90, Utc::now())
                .await
                .unwrap();
        let mut got: Vec<i64> = simulation.questions.iter().map(|q| q.question_id).collect();
        got.sort();
        let mut expected: Vec<i64> = pool.iter().take(3).map(|q| q.id).collect();
        expected.sort();
        assert_eq!(got, expected);
    }
}
