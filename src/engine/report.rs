// src/engine/report.rs

//! Dashboard and simulation report aggregation. Everything here is pure; the
//! engine loads the inputs.

use std::collections::{BTreeMap, HashMap};

use chrono::{Duration, NaiveDate};

use crate::models::{
    answer::{AnswerFact, UserAnswer},
    question::{Alternative, Difficulty, Question, Subject},
    report::{
        DailyActivity, DailyPerformance, DifficultyPerformance, FinishReport, Overview, Predictions,
        SimulationAnalytics, SimulationOverview, SubjectPerformance, SubjectTrend, Trend,
        WrongAnswerDetail,
    },
    simulation::Simulation,
};

/// Subjects strictly below this accuracy are weak areas.
pub const WEAK_AREA_THRESHOLD: i64 = 60;
pub const RECOMMENDED_WEAK_AREAS: usize = 3;
pub const TREND_WINDOW: usize = 20;
pub const PERFORMANCE_DAYS: i64 = 30;
pub const ACTIVITY_DAYS: i64 = 7;
pub const SUBJECT_TREND_WINDOW: usize = 10;
pub const EXAM_SCORE_CAP: f64 = 100.0;
pub const APPROVAL_PROBABILITY_CAP: f64 = 95.0;

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

pub fn percentage(correct: i64, total: i64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    round1(correct as f64 * 100.0 / total as f64)
}

/// Compared on the exact ratio so display rounding cannot move a subject
/// across the threshold.
pub fn is_weak(correct: i64, total: i64) -> bool {
    total > 0 && correct * 100 < WEAK_AREA_THRESHOLD * total
}

/// Per-subject totals in subject order.
pub fn subject_performance<I>(results: I) -> Vec<SubjectPerformance>
where
    I: IntoIterator<Item = (Subject, bool)>,
{
    let mut tally: BTreeMap<Subject, (i64, i64)> = BTreeMap::new();
    for (subject, is_correct) in results {
        let entry = tally.entry(subject).or_default();
        entry.0 += 1;
        if is_correct {
            entry.1 += 1;
        }
    }

    tally
        .into_iter()
        .map(|(subject, (total, correct))| SubjectPerformance {
            subject,
            subject_label: subject.label(),
            total,
            correct,
            percentage: percentage(correct, total),
        })
        .collect()
}

/// Weak subjects, weakest first, optionally capped.
pub fn weak_areas(performance: &[SubjectPerformance], cap: Option<usize>) -> Vec<SubjectPerformance> {
    let mut weak: Vec<SubjectPerformance> = performance
        .iter()
        .filter(|p| is_weak(p.correct, p.total))
        .cloned()
        .collect();
    weak.sort_by(|a, b| {
        a.percentage
            .total_cmp(&b.percentage)
            .then(a.subject.cmp(&b.subject))
    });
    if let Some(cap) = cap {
        weak.truncate(cap);
    }
    weak
}

/// `facts` must be newest first.
pub fn trend(facts: &[AnswerFact], window: usize) -> Trend {
    let correct = |slice: &[AnswerFact]| slice.iter().filter(|f| f.is_correct).count() as i64;

    let recent = &facts[..facts.len().min(window)];
    let recent_accuracy = percentage(correct(recent), recent.len() as i64);
    let overall_accuracy = percentage(correct(facts), facts.len() as i64);

    Trend {
        window: recent.len(),
        recent_accuracy,
        overall_accuracy,
        trend: round1(recent_accuracy - overall_accuracy),
    }
}

/// Per-subject trend over each subject's latest `window` answers, in subject
/// order. `facts` must be newest first.
pub fn subject_trends(facts: &[AnswerFact], window: usize) -> Vec<SubjectTrend> {
    let mut tally: BTreeMap<Subject, (i64, i64, i64, i64)> = BTreeMap::new();
    for fact in facts {
        let (total, correct, recent, recent_correct) = tally.entry(fact.subject).or_default();
        *total += 1;
        *correct += i64::from(fact.is_correct);
        if (*recent as usize) < window {
            *recent += 1;
            *recent_correct += i64::from(fact.is_correct);
        }
    }

    tally
        .into_iter()
        .map(|(subject, (total, correct, recent, recent_correct))| {
            let accuracy = correct as f64 * 100.0 / total as f64;
            let recent_accuracy = if recent > 0 {
                recent_correct as f64 * 100.0 / recent as f64
            } else {
                accuracy
            };
            SubjectTrend {
                subject,
                subject_label: subject.label(),
                total,
                accuracy: round1(accuracy),
                recent_accuracy: round1(recent_accuracy),
                trend: round1(recent_accuracy - accuracy),
            }
        })
        .collect()
}

/// Caps apply to the unrounded accuracy; no answers predict nothing.
pub fn predictions(correct: i64, total: i64) -> Predictions {
    if total == 0 {
        return Predictions {
            exam_score: 0.0,
            approval_probability: 0.0,
        };
    }
    let accuracy = correct as f64 * 100.0 / total as f64;
    Predictions {
        exam_score: round1((accuracy * 1.1).min(EXAM_SCORE_CAP)),
        approval_probability: round1((accuracy * 0.9).min(APPROVAL_PROBABILITY_CAP)),
    }
}

pub fn overview(facts: &[AnswerFact], study_streak: i32) -> Overview {
    let total = facts.len() as i64;
    let correct = facts.iter().filter(|f| f.is_correct).count() as i64;
    let time: i64 = facts.iter().map(|f| i64::from(f.time_spent)).sum();

    Overview {
        total_questions: total,
        correct_answers: correct,
        success_rate: percentage(correct, total),
        average_time: if total == 0 {
            0
        } else {
            (time as f64 / total as f64).round() as i64
        },
        streak: study_streak,
    }
}

fn window_start(today: NaiveDate, days: i64) -> NaiveDate {
    today - Duration::days(days)
}

/// Accuracy per calendar day (UTC) over the trailing window, oldest first.
pub fn performance_over_time(facts: &[AnswerFact], today: NaiveDate, days: i64) -> Vec<DailyPerformance> {
    let since = window_start(today, days);
    let mut by_day: BTreeMap<NaiveDate, (i64, i64)> = BTreeMap::new();
    for fact in facts {
        let date = fact.created_at.date_naive();
        if date < since {
            continue;
        }
        let entry = by_day.entry(date).or_default();
        entry.0 += 1;
        if fact.is_correct {
            entry.1 += 1;
        }
    }

    by_day
        .into_iter()
        .map(|(date, (total, correct))| DailyPerformance {
            date,
            correct,
            total,
            percentage: percentage(correct, total),
        })
        .collect()
}

pub fn recent_activity(facts: &[AnswerFact], today: NaiveDate, days: i64) -> Vec<DailyActivity> {
    let since = window_start(today, days);
    let mut by_day: BTreeMap<NaiveDate, i64> = BTreeMap::new();
    for fact in facts.iter().filter(|f| f.created_at.date_naive() >= since) {
        *by_day.entry(fact.created_at.date_naive()).or_default() += 1;
    }
    by_day
        .into_iter()
        .map(|(date, questions_answered)| DailyActivity {
            date,
            questions_answered,
        })
        .collect()
}

/// One row per difficulty, including empty ones. Unrated questions are left
/// out.
pub fn difficulty_analysis(facts: &[AnswerFact]) -> Vec<DifficultyPerformance> {
    Difficulty::ALL
        .iter()
        .map(|&difficulty| {
            let (total, correct) = facts
                .iter()
                .filter(|f| f.difficulty == Some(difficulty))
                .fold((0, 0), |(t, c), f| (t + 1, c + i64::from(f.is_correct)));
            DifficultyPerformance {
                difficulty,
                correct,
                total,
                percentage: percentage(correct, total),
            }
        })
        .collect()
}

/// The last submission per question wins; `answers` must be oldest first.
pub fn latest_per_question(answers: &[UserAnswer]) -> HashMap<i64, &UserAnswer> {
    let mut latest = HashMap::new();
    for answer in answers {
        latest.insert(answer.question_id, answer);
    }
    latest
}

/// `correct / total × 100`; an empty simulation scores 0.
pub fn simulation_score(correct: i64, total: i64) -> f64 {
    if total <= 0 {
        return 0.0;
    }
    correct as f64 * 100.0 / total as f64
}

pub fn recommendations(score: f64, weak: &[Subject]) -> Vec<String> {
    let mut out = Vec::new();
    if score < 50.0 {
        out.push("Reforce os conceitos básicos de todas as matérias".to_string());
    } else if score < 75.0 {
        out.push("Você está no caminho certo! Continue praticando".to_string());
    } else {
        out.push("Excelente desempenho! Mantenha o ritmo".to_string());
    }

    if !weak.is_empty() {
        let focus: Vec<&str> = weak
            .iter()
            .take(RECOMMENDED_WEAK_AREAS)
            .map(|s| s.label())
            .collect();
        out.push(format!("Foque nos estudos de: {}", focus.join(", ")));
    }
    out
}

/// Scores a simulation from the latest answer per question. Unanswered
/// questions count as wrong.
pub fn finish_report(
    simulation: &Simulation,
    answers: &[UserAnswer],
    subject_of: &HashMap<i64, Subject>,
    time_spent: i64,
) -> FinishReport {
    let latest = latest_per_question(answers);
    let results: Vec<(Subject, bool)> = simulation
        .questions
        .iter()
        .filter_map(|sq| {
            let subject = *subject_of.get(&sq.question_id)?;
            let correct = latest.get(&sq.question_id).is_some_and(|a| a.is_correct);
            Some((subject, correct))
        })
        .collect();

    let correct_answers = latest.values().filter(|a| a.is_correct).count() as i64;
    let score = simulation_score(correct_answers, i64::from(simulation.total_questions));
    let by_subject = subject_performance(results);
    let weak: Vec<Subject> = weak_areas(&by_subject, None).iter().map(|p| p.subject).collect();

    FinishReport {
        simulation_id: simulation.id,
        score: round1(score),
        total_questions: simulation.total_questions,
        correct_answers,
        time_spent,
        recommendations: recommendations(score, &weak),
        weak_areas: weak,
        by_subject,
        achievements_job_id: None,
    }
}

pub fn simulation_analytics(
    simulation: &Simulation,
    answers: &[UserAnswer],
    questions: &HashMap<i64, Question>,
    alternatives: &[Alternative],
) -> SimulationAnalytics {
    let latest = latest_per_question(answers);
    let label_of = |id: i64| {
        alternatives
            .iter()
            .find(|a| a.id == id)
            .map(|a| a.label.clone())
    };
    let correct_label_of = |question_id: i64| {
        alternatives
            .iter()
            .find(|a| a.question_id == question_id && a.is_correct)
            .map(|a| a.label.clone())
    };

    // Presentation order keeps the wrong-answer list stable.
    let answered: Vec<&UserAnswer> = simulation
        .questions
        .iter()
        .filter_map(|sq| latest.get(&sq.question_id).copied())
        .collect();

    let subject_performance = subject_performance(
        answered
            .iter()
            .filter_map(|a| questions.get(&a.question_id).map(|q| (q.subject, a.is_correct))),
    );

    let wrong_answers = answered
        .iter()
        .filter(|a| !a.is_correct)
        .filter_map(|a| {
            let q = questions.get(&a.question_id)?;
            Some(WrongAnswerDetail {
                question_id: q.id,
                subject: q.subject,
                subject_label: q.subject.label(),
                statement: q.statement.clone(),
                user_answer: label_of(a.alternative_id),
                correct_answer: correct_label_of(q.id),
            })
        })
        .collect();

    let correct_answers = answered.iter().filter(|a| a.is_correct).count() as i64;
    let duration = simulation
        .completed_at
        .map(|done| (done - simulation.started_at).num_seconds().max(0))
        .unwrap_or(0);

    SimulationAnalytics {
        simulation: SimulationOverview {
            id: simulation.id,
            simulation_type: simulation.simulation_type,
            score: simulation.score.map(round1),
            total_questions: simulation.total_questions,
            answered: answered.len() as i64,
            correct_answers,
            success_rate: percentage(correct_answers, answered.len() as i64),
            started_at: simulation.started_at,
            completed_at: simulation.completed_at,
            duration,
        },
        subject_performance,
        wrong_answers,
    }
}
