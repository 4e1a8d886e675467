// src/engine/sampler.rs

//! Diversified question sampling.
//!
//! Pools are fetched asynchronously first; selection itself is synchronous and
//! takes the RNG explicitly so it can be seeded in tests.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Duration, Utc};
use rand::{Rng, seq::SliceRandom};

use crate::{
    error::AppError,
    models::question::{Difficulty, QuestionFilter, QuestionRef, Subject},
    store::{AnswerRepository, QuestionRepository},
};

#[derive(Debug, Clone, Default)]
pub struct SampleRequest {
    pub user_id: i64,
    /// Ignored when a distribution is given.
    pub subjects: Vec<Subject>,
    pub difficulty: Option<Difficulty>,
    /// Ignored when a distribution is given; the quotas define the size.
    pub count: usize,
    pub distribution: Option<Vec<(Subject, usize)>>,
    /// Restricts every pool to these ids.
    pub only_ids: Option<Vec<i64>>,
    /// Drop every question the user ever answered instead of merely
    /// de-prioritising recent ones.
    pub exclude_answered: bool,
}

impl SampleRequest {
    pub fn requested(&self) -> usize {
        match &self.distribution {
            Some(dist) => dist.iter().map(|(_, n)| n).sum(),
            None => self.count,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleOutcome {
    pub question_ids: Vec<i64>,
    pub requested: usize,
    /// Subjects whose pool could not fill the quota, with the missing count.
    pub shortfall: Vec<(Subject, usize)>,
}

/// Candidates for one quota. `subject` is `None` for the global pool.
#[derive(Debug, Clone)]
pub struct Pool {
    pub subject: Option<Subject>,
    pub quota: usize,
    pub candidates: Vec<QuestionRef>,
}

/// Start of the lookback window. A window reaching past the representable
/// range covers all history.
pub fn lookback_start(now: DateTime<Utc>, lookback_days: i64) -> DateTime<Utc> {
    Duration::try_days(lookback_days)
        .and_then(|window| now.checked_sub_signed(window))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// A single random question, fresh ones before those answered within the
/// lookback. The store picks it, so the pool is never loaded whole.
pub async fn sample_one<S>(
    store: &S,
    request: &SampleRequest,
    lookback_days: i64,
    now: DateTime<Utc>,
) -> Result<Option<i64>, AppError>
where
    S: QuestionRepository + AnswerRepository + ?Sized,
{
    let exclude_ids: Vec<i64> = if request.exclude_answered {
        store
            .answered_since(request.user_id, DateTime::<Utc>::default())
            .await?
            .into_iter()
            .collect()
    } else {
        Vec::new()
    };
    let avoid = store
        .answered_since(request.user_id, lookback_start(now, lookback_days))
        .await?;

    let filter = QuestionFilter {
        subjects: request.subjects.clone(),
        difficulty: request.difficulty,
        only_ids: request.only_ids.clone(),
        exclude_ids,
    };
    let picked = store.random_question(&filter, &avoid).await?;
    Ok(picked.map(|q| q.id))
}

/// Fetches pools and answer history, then composes the sample.
pub async fn sample<S>(
    store: &S,
    request: &SampleRequest,
    lookback_days: i64,
    now: DateTime<Utc>,
) -> Result<SampleOutcome, AppError>
where
    S: QuestionRepository + AnswerRepository + ?Sized,
{
    let exclude_ids: Vec<i64> = if request.exclude_answered {
        store
            .answered_since(request.user_id, DateTime::<Utc>::default())
            .await?
            .into_iter()
            .collect()
    } else {
        Vec::new()
    };

    let recently_answered = store
        .answered_since(request.user_id, lookback_start(now, lookback_days))
        .await?;

    let mut pools = Vec::new();
    match &request.distribution {
        Some(distribution) => {
            for &(subject, quota) in distribution.iter().filter(|(_, quota)| *quota > 0) {
                let filter = QuestionFilter {
                    subjects: vec![subject],
                    difficulty: request.difficulty,
                    only_ids: request.only_ids.clone(),
                    exclude_ids: exclude_ids.clone(),
                };
                pools.push(Pool {
                    subject: Some(subject),
                    quota,
                    candidates: store.find_questions(&filter).await?,
                });
            }
        }
        None => {
            let filter = QuestionFilter {
                subjects: request.subjects.clone(),
                difficulty: request.difficulty,
                only_ids: request.only_ids.clone(),
                exclude_ids,
            };
            pools.push(Pool {
                subject: None,
                quota: request.count,
                candidates: store.find_questions(&filter).await?,
            });
        }
    }

    let shuffle_across = request.distribution.is_some();
    let outcome = compose(pools, &recently_answered, shuffle_across, &mut rand::rng());

    tracing::debug!(
        user_id = request.user_id,
        requested = outcome.requested,
        sampled = outcome.question_ids.len(),
        "Sampled questions"
    );
    Ok(outcome)
}

/// Selects from each pool independently, concatenates, and optionally
/// shuffles the concatenation so subjects interleave.
pub fn compose<R: Rng + ?Sized>(
    pools: Vec<Pool>,
    recently_answered: &HashSet<i64>,
    shuffle_across: bool,
    rng: &mut R,
) -> SampleOutcome {
    let requested = pools.iter().map(|p| p.quota).sum();
    let mut seen = HashSet::new();
    let mut question_ids = Vec::with_capacity(requested);
    let mut shortfall = Vec::new();

    for pool in pools {
        let picked: Vec<i64> = select_diversified(&pool.candidates, recently_answered, pool.quota, rng)
            .into_iter()
            .filter(|id| seen.insert(*id))
            .collect();

        if picked.len() < pool.quota {
            if let Some(subject) = pool.subject {
                shortfall.push((subject, pool.quota - picked.len()));
            }
        }
        question_ids.extend(picked);
    }

    if shuffle_across {
        question_ids.shuffle(rng);
    }

    SampleOutcome {
        question_ids,
        requested,
        shortfall,
    }
}

/// Prefers questions outside the lookback window, tops up with recently
/// answered ones, then interleaves the result across exam years.
pub fn select_diversified<R: Rng + ?Sized>(
    candidates: &[QuestionRef],
    recently_answered: &HashSet<i64>,
    target: usize,
    rng: &mut R,
) -> Vec<i64> {
    let mut unique = HashSet::new();
    let (mut chosen, mut answered): (Vec<QuestionRef>, Vec<QuestionRef>) = candidates
        .iter()
        .copied()
        .filter(|q| unique.insert(q.id))
        .partition(|q| !recently_answered.contains(&q.id));

    if chosen.len() < target {
        answered.shuffle(rng);
        let missing = target - chosen.len();
        chosen.extend(answered.into_iter().take(missing));
    }

    interleave_by_year(chosen, target, rng)
}

/// Shuffles within each year, then takes one question per year in a random
/// year order until `count` are taken or every year is exhausted.
pub fn interleave_by_year<R: Rng + ?Sized>(
    candidates: Vec<QuestionRef>,
    count: usize,
    rng: &mut R,
) -> Vec<i64> {
    let mut by_year: BTreeMap<i32, Vec<i64>> = BTreeMap::new();
    for q in candidates {
        by_year.entry(q.exam_year).or_default().push(q.id);
    }

    let mut groups: Vec<Vec<i64>> = by_year
        .into_values()
        .map(|mut group| {
            group.shuffle(rng);
            group
        })
        .collect();
    groups.shuffle(rng);

    let mut out = Vec::with_capacity(count);
    while out.len() < count && !groups.is_empty() {
        let mut i = 0;
        while i < groups.len() && out.len() < count {
            if let Some(id) = groups[i].pop() {
                out.push(id);
            }
            if groups[i].is_empty() {
                groups.remove(i);
            } else {
                i += 1;
            }
        }
    }
    out
}
