// src/engine/evaluator.rs

use crate::{
    error::AppError,
    models::{
        answer::{AnswerOutcome, AnswerRequest, AnswerStatistics, NewAnswer, QuestionAggregate, UserAnswer},
        question::Difficulty,
        simulation::SimulationStatus,
    },
    store::Store,
};

#[derive(Debug, Clone)]
pub struct Evaluation {
    pub answer: UserAnswer,
    pub correct_alternative_id: i64,
    pub explanation: Option<String>,
    pub difficulty: Option<Difficulty>,
    /// Aggregates over every user's answers; skipped inside simulations.
    pub statistics: Option<AnswerStatistics>,
}

impl Evaluation {
    pub fn outcome(&self) -> AnswerOutcome {
        AnswerOutcome {
            is_correct: self.answer.is_correct,
            time_spent: self.answer.time_spent,
            difficulty: self.difficulty,
        }
    }
}

pub fn statistics(aggregate: &QuestionAggregate, your_time: i32) -> AnswerStatistics {
    let success_rate = if aggregate.total > 0 {
        aggregate.correct as f64 / aggregate.total as f64 * 100.0
    } else {
        0.0
    };
    AnswerStatistics {
        success_rate: (success_rate * 10.0).round() / 10.0,
        average_time: aggregate.average_time.round() as i64,
        your_time,
    }
}

/// Grades a submission against the stored answer key and appends it to the
/// answer log. Every check happens before the write.
pub async fn evaluate<S: Store + ?Sized>(
    store: &S,
    user_id: i64,
    request: &AnswerRequest,
) -> Result<Evaluation, AppError> {
    let question = store
        .find_question(request.question_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Question not found".to_string()))?;

    let alternatives = store.find_alternatives(question.id).await?;
    let chosen = alternatives
        .iter()
        .find(|a| a.id == request.alternative_id)
        .ok_or_else(|| AppError::NotFound("Alternative not found".to_string()))?;
    let correct = alternatives.iter().find(|a| a.is_correct).ok_or_else(|| {
        AppError::InternalServerError(format!("Question {} has no correct alternative", question.id))
    })?;

    if let Some(simulation_id) = request.simulation_id {
        let simulation = store
            .find_simulation(simulation_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Simulation not found".to_string()))?;
        if simulation.user_id != user_id {
            return Err(AppError::Forbidden("Simulation belongs to another user".to_string()));
        }
        if simulation.status == SimulationStatus::Completed {
            return Err(AppError::Conflict("Simulation already finished".to_string()));
        }
        if !simulation.contains_question(question.id) {
            return Err(AppError::BadRequest("Question is not part of this simulation".to_string()));
        }
    }

    let answer = store
        .record_answer(NewAnswer {
            user_id,
            question_id: question.id,
            alternative_id: chosen.id,
            simulation_id: request.simulation_id,
            is_correct: chosen.is_correct,
            time_spent: request.time_spent,
            confidence: request.confidence,
        })
        .await?;

    let statistics = match request.simulation_id {
        Some(_) => None,
        None => {
            let aggregate = store.question_aggregate(question.id).await?;
            Some(statistics(&aggregate, request.time_spent))
        }
    };

    tracing::debug!(
        user_id,
        question_id = question.id,
        simulation_id = ?request.simulation_id,
        is_correct = answer.is_correct,
        "Answer recorded"
    );

    Ok(Evaluation {
        correct_alternative_id: correct.id,
        explanation: question.explanation,
        difficulty: question.difficulty,
        answer,
        statistics,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::{
            question::{Alternative, ImportAlternative, ImportQuestion, Subject},
            simulation::{NewSimulation, SimulationType},
        },
        store::{
            AnswerRepository, QuestionRepository, SimulationRepository, memory::MemoryStore,
        },
    };

    async fn seeded() -> (MemoryStore, i64, Vec<Alternative>) {
        let store = MemoryStore::new();
        store
            .import_question(&ImportQuestion {
                exam_id: "OAB-XXXVIII".into(),
                question_number: 12,
                subject: Subject::Constitutional,
                exam_year: 2023,
                exam_phase: 1,
                statement: "Sobre o controle de constitucionalidade...".into(),
                explanation: Some("Art. 102 da CF.".into()),
                difficulty: Some(Difficulty::Hard),
                nullified: false,
                alternatives: ["A", "B", "C", "D"]
                    .iter()
                    .map(|l| ImportAlternative {
                        label: l.to_string(),
                        text: format!("alternativa {}", l),
                        is_correct: *l == "C",
                    })
                    .collect(),
            })
            .await
            .unwrap();
        let q = store.find_questions(&Default::default()).await.unwrap()[0];
        let alternatives = store.find_alternatives(q.id).await.unwrap();
        (store, q.id, alternatives)
    }

    fn req(question_id: i64, alternative_id: i64, time_spent: i32) -> AnswerRequest {
        AnswerRequest {
            question_id,
            alternative_id,
            time_spent,
            confidence: Some(3),
            simulation_id: None,
        }
    }

    fn by_label<'a>(alts: &'a [Alternative], label: &str) -> &'a Alternative {
        alts.iter().find(|a| a.label == label).unwrap()
    }

    #[tokio::test]
    async fn correctness_comes_from_the_stored_key() {
        let (store, qid, alts) = seeded().await;
        let c = by_label(&alts, "C");

        let right = evaluate(&store, 1, &req(qid, c.id, 20)).await.unwrap();
        assert!(right.answer.is_correct);
        assert_eq!(right.correct_alternative_id, c.id);
        assert_eq!(right.explanation.as_deref(), Some("Art. 102 da CF."));

        let wrong = evaluate(&store, 2, &req(qid, by_label(&alts, "A").id, 40)).await.unwrap();
        assert!(!wrong.answer.is_correct);
        let stats = wrong.statistics.unwrap();
        assert_eq!(stats.success_rate, 50.0);
        assert_eq!(stats.average_time, 30);
        assert_eq!(stats.your_time, 40);
    }

    #[tokio::test]
    async fn unknown_ids_are_not_found_and_write_nothing() {
        let (store, qid, _) = seeded().await;

        assert!(matches!(
            evaluate(&store, 1, &req(qid + 1000, 1, 10)).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            evaluate(&store, 1, &req(qid, 99_999, 10)).await,
            Err(AppError::NotFound(_))
        ));
        assert!(store.answer_facts(1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn simulation_answers_are_checked_and_skip_statistics() {
        let (store, qid, alts) = seeded().await;
        let simulation = store
            .create_simulation(NewSimulation {
                user_id: 1,
                simulation_type: SimulationType::QuickPractice,
                subjects: Vec::new(),
                target_difficulty: None,
                question_ids: vec![qid],
            })
            .await
            .unwrap();
        let empty = store
            .create_simulation(NewSimulation {
                user_id: 1,
                simulation_type: SimulationType::QuickPractice,
                subjects: Vec::new(),
                target_difficulty: None,
                question_ids: Vec::new(),
            })
            .await
            .unwrap();

        let mut request = req(qid, by_label(&alts, "C").id, 15);
        request.simulation_id = Some(simulation.id);

        assert!(matches!(
            evaluate(&store, 2, &request).await,
            Err(AppError::Forbidden(_))
        ));

        let evaluation = evaluate(&store, 1, &request).await.unwrap();
        assert!(evaluation.statistics.is_none());
        assert_eq!(evaluation.answer.simulation_id, Some(simulation.id));

        request.simulation_id = Some(empty.id);
        assert!(matches!(
            evaluate(&store, 1, &request).await,
            Err(AppError::BadRequest(_))
        ));

        store
            .complete_simulation(simulation.id, 100.0, 15, chrono::Utc::now())
            .await
            .unwrap();
        request.simulation_id = Some(simulation.id);
        assert!(matches!(
            evaluate(&store, 1, &request).await,
            Err(AppError::Conflict(_))
        ));

        assert_eq!(store.simulation_answers(simulation.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn insert_refuses_answers_for_a_simulation_finished_after_the_check() {
        let (store, qid, alts) = seeded().await;
        let simulation = store
            .create_simulation(NewSimulation {
                user_id: 1,
                simulation_type: SimulationType::QuickPractice,
                subjects: Vec::new(),
                target_difficulty: None,
                question_ids: vec![qid],
            })
            .await
            .unwrap();

        // The status check already passed; a finish lands before the write.
        store
            .complete_simulation(simulation.id, 0.0, 0, chrono::Utc::now())
            .await
            .unwrap();
        let late = store
            .record_answer(NewAnswer {
                user_id: 1,
                question_id: qid,
                alternative_id: by_label(&alts, "C").id,
                simulation_id: Some(simulation.id),
                is_correct: true,
                time_spent: 15,
                confidence: None,
            })
            .await;

        assert!(matches!(late, Err(AppError::Conflict(_))));
        assert!(store.simulation_answers(simulation.id).await.unwrap().is_empty());
        assert!(store.answer_facts(1).await.unwrap().is_empty());
    }
}
