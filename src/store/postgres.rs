// src/store/postgres.rs

use std::{
    collections::{HashMap, HashSet},
    str::FromStr,
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};

use crate::{
    error::AppError,
    models::{
        achievement::{AchievementDefinition, UnlockOutcome, UnlockedAchievement},
        answer::{AnswerFact, NewAnswer, QuestionAggregate, UserAnswer},
        profile::{ProfileUpdate, UserProfile},
        question::{
            Alternative, Difficulty, ImportQuestion, Question, QuestionFilter, QuestionRef,
            Subject,
        },
        simulation::{NewSimulation, Simulation, SimulationQuestion, SimulationStatus},
    },
    store::{
        AchievementRepository, AnswerRepository, HealthRepository, ProfileRepository,
        QuestionRepository, SimulationRepository,
    },
    utils::html::clean_html,
};

const PROFILE_COLUMNS: &str = "user_id, total_points, level, streak, total_questions, \
     correct_answers, last_study_date, version";

const ANSWER_COLUMNS: &str = "id, user_id, question_id, alternative_id, simulation_id, \
     is_correct, time_spent, confidence, created_at";

const SIMULATION_COLUMNS: &str = "id, user_id, type AS simulation_type, total_questions, \
     subjects, target_difficulty, status, score, time_spent, started_at, completed_at";

/// Enum columns are stored as TEXT; a value we cannot parse means the row was
/// written by something else and is reported as an internal error.
fn parse_column<T: FromStr<Err = String>>(value: &str) -> Result<T, AppError> {
    value.parse().map_err(AppError::InternalServerError)
}

fn parse_optional<T: FromStr<Err = String>>(value: Option<&str>) -> Result<Option<T>, AppError> {
    value.map(parse_column).transpose()
}

#[derive(FromRow)]
struct QuestionRow {
    id: i64,
    exam_id: String,
    question_number: i32,
    subject: String,
    exam_year: i32,
    exam_phase: i32,
    statement: String,
    explanation: Option<String>,
    nullified: bool,
    difficulty: Option<String>,
}

impl TryFrom<QuestionRow> for Question {
    type Error = AppError;

    fn try_from(row: QuestionRow) -> Result<Self, Self::Error> {
        Ok(Question {
            id: row.id,
            subject: parse_column(&row.subject)?,
            difficulty: parse_optional(row.difficulty.as_deref())?,
            exam_id: row.exam_id,
            question_number: row.question_number,
            exam_year: row.exam_year,
            exam_phase: row.exam_phase,
            statement: row.statement,
            explanation: row.explanation,
            nullified: row.nullified,
        })
    }
}

#[derive(FromRow)]
struct QuestionRefRow {
    id: i64,
    subject: String,
    exam_year: i32,
}

impl TryFrom<QuestionRefRow> for QuestionRef {
    type Error = AppError;

    fn try_from(row: QuestionRefRow) -> Result<Self, Self::Error> {
        Ok(QuestionRef {
            id: row.id,
            subject: parse_column(&row.subject)?,
            exam_year: row.exam_year,
        })
    }
}

/// `SELECT` of sampler projections matching `filter`, open for ordering.
fn filtered_refs(filter: &QuestionFilter) -> QueryBuilder<'static, Postgres> {
    let mut builder: QueryBuilder<Postgres> =
        QueryBuilder::new("SELECT id, subject, exam_year FROM questions WHERE nullified = FALSE");

    if !filter.subjects.is_empty() {
        let subjects: Vec<String> = filter.subjects.iter().map(|s| s.as_str().to_string()).collect();
        builder.push(" AND subject = ANY(");
        builder.push_bind(subjects);
        builder.push(")");
    }
    if let Some(difficulty) = filter.difficulty {
        builder.push(" AND difficulty = ");
        builder.push_bind(difficulty.as_str());
    }
    if let Some(ids) = &filter.only_ids {
        builder.push(" AND id = ANY(");
        builder.push_bind(ids.clone());
        builder.push(")");
    }
    if !filter.exclude_ids.is_empty() {
        builder.push(" AND NOT (id = ANY(");
        builder.push_bind(filter.exclude_ids.clone());
        builder.push("))");
    }
    builder
}

#[derive(FromRow)]
struct AnswerFactRow {
    question_id: i64,
    alternative_id: i64,
    subject: String,
    difficulty: Option<String>,
    is_correct: bool,
    time_spent: i32,
    created_at: DateTime<Utc>,
}

#[derive(FromRow)]
struct SimulationRow {
    id: i64,
    user_id: i64,
    simulation_type: String,
    total_questions: i32,
    subjects: Vec<String>,
    target_difficulty: Option<String>,
    status: String,
    score: Option<f64>,
    time_spent: Option<i64>,
    started_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

impl SimulationRow {
    fn into_simulation(self, questions: Vec<SimulationQuestion>) -> Result<Simulation, AppError> {
        Ok(Simulation {
            id: self.id,
            user_id: self.user_id,
            simulation_type: parse_column(&self.simulation_type)?,
            total_questions: self.total_questions,
            subjects: self
                .subjects
                .iter()
                .map(|s| parse_column::<Subject>(s))
                .collect::<Result<_, _>>()?,
            target_difficulty: parse_optional::<Difficulty>(self.target_difficulty.as_deref())?,
            status: parse_column(&self.status)?,
            score: self.score,
            time_spent: self.time_spent,
            started_at: self.started_at,
            completed_at: self.completed_at,
            questions,
        })
    }
}

#[derive(FromRow)]
struct SimulationQuestionRow {
    simulation_id: i64,
    question_id: i64,
    question_order: i32,
}

/// Postgres-backed implementation of every repository.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn simulation_questions(
        &self,
        simulation_ids: &[i64],
    ) -> Result<HashMap<i64, Vec<SimulationQuestion>>, AppError> {
        let rows = sqlx::query_as::<_, SimulationQuestionRow>(
            "SELECT simulation_id, question_id, question_order FROM simulation_questions \
             WHERE simulation_id = ANY($1) ORDER BY simulation_id, question_order",
        )
        .bind(simulation_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut grouped: HashMap<i64, Vec<SimulationQuestion>> = HashMap::new();
        for row in rows {
            grouped.entry(row.simulation_id).or_default().push(SimulationQuestion {
                question_id: row.question_id,
                order: row.question_order,
            });
        }
        Ok(grouped)
    }
}

#[async_trait]
impl QuestionRepository for PgStore {
    async fn find_questions(&self, filter: &QuestionFilter) -> Result<Vec<QuestionRef>, AppError> {
        let mut builder = filtered_refs(filter);
        builder.push(" ORDER BY id");

        let rows: Vec<QuestionRefRow> = builder.build_query_as().fetch_all(&self.pool).await?;
        rows.into_iter().map(QuestionRef::try_from).collect()
    }

    async fn random_question(
        &self,
        filter: &QuestionFilter,
        avoid: &HashSet<i64>,
    ) -> Result<Option<QuestionRef>, AppError> {
        let avoid: Vec<i64> = avoid.iter().copied().collect();
        let mut builder = filtered_refs(filter);
        // FALSE sorts first, so fresh questions win when there are any.
        builder.push(" ORDER BY (id = ANY(");
        builder.push_bind(avoid);
        builder.push(")), random() LIMIT 1");

        let row: Option<QuestionRefRow> = builder.build_query_as().fetch_optional(&self.pool).await?;
        row.map(QuestionRef::try_from).transpose()
    }

    async fn find_question(&self, id: i64) -> Result<Option<Question>, AppError> {
        let row = sqlx::query_as::<_, QuestionRow>(
            "SELECT id, exam_id, question_number, subject, exam_year, exam_phase, statement, \
             explanation, nullified, difficulty FROM questions WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Question::try_from).transpose()
    }

    async fn find_questions_by_ids(&self, ids: &[i64]) -> Result<Vec<Question>, AppError> {
        let rows = sqlx::query_as::<_, QuestionRow>(
            "SELECT id, exam_id, question_number, subject, exam_year, exam_phase, statement, \
             explanation, nullified, difficulty FROM questions WHERE id = ANY($1)",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Question::try_from).collect()
    }

    async fn find_alternatives(&self, question_id: i64) -> Result<Vec<Alternative>, AppError> {
        let alternatives = sqlx::query_as::<_, Alternative>(
            "SELECT id, question_id, label, text, is_correct FROM alternatives \
             WHERE question_id = $1 ORDER BY label",
        )
        .bind(question_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(alternatives)
    }

    async fn find_alternatives_for(&self, question_ids: &[i64]) -> Result<Vec<Alternative>, AppError> {
        let alternatives = sqlx::query_as::<_, Alternative>(
            "SELECT id, question_id, label, text, is_correct FROM alternatives \
             WHERE question_id = ANY($1) ORDER BY question_id, label",
        )
        .bind(question_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(alternatives)
    }

    async fn import_question(&self, q: &ImportQuestion) -> Result<bool, AppError> {
        let mut tx = self.pool.begin().await?;

        let id: Option<i64> = sqlx::query_scalar(
            r#"
            INSERT INTO questions
                (exam_id, question_number, subject, exam_year, exam_phase, statement,
                 explanation, nullified, difficulty)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (exam_id, question_number) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(&q.exam_id)
        .bind(q.question_number)
        .bind(q.subject.as_str())
        .bind(q.exam_year)
        .bind(q.exam_phase)
        .bind(clean_html(&q.statement))
        .bind(q.explanation.as_deref().map(clean_html))
        .bind(q.nullified)
        .bind(q.difficulty.map(|d| d.as_str()))
        .fetch_optional(&mut *tx)
        .await?;

        let Some(question_id) = id else {
            return Ok(false);
        };

        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new("INSERT INTO alternatives (question_id, label, text, is_correct) ");
        builder.push_values(&q.alternatives, |mut b, alt| {
            b.push_bind(question_id)
                .push_bind(alt.label.clone())
                .push_bind(clean_html(&alt.text))
                .push_bind(alt.is_correct);
        });
        builder.build().execute(&mut *tx).await?;

        tx.commit().await?;
        Ok(true)
    }
}

#[async_trait]
impl AnswerRepository for PgStore {
    async fn record_answer(&self, answer: NewAnswer) -> Result<UserAnswer, AppError> {
        // FOR SHARE holds off a concurrent finish until this insert commits,
        // and re-reads the status if the finish committed first.
        let sql = format!(
            "INSERT INTO user_answers \
             (user_id, question_id, alternative_id, simulation_id, is_correct, time_spent, confidence) \
             SELECT $1, $2, $3, $4, $5, $6, $7 \
             WHERE $4::BIGINT IS NULL OR EXISTS ( \
                 SELECT 1 FROM simulations WHERE id = $4 AND status = $8 FOR SHARE) \
             RETURNING {}",
            ANSWER_COLUMNS
        );
        let record = sqlx::query_as::<_, UserAnswer>(&sql)
            .bind(answer.user_id)
            .bind(answer.question_id)
            .bind(answer.alternative_id)
            .bind(answer.simulation_id)
            .bind(answer.is_correct)
            .bind(answer.time_spent)
            .bind(answer.confidence)
            .bind(SimulationStatus::Created.as_str())
            .fetch_optional(&self.pool)
            .await?;

        record.ok_or_else(|| AppError::Conflict("Simulation already finished".to_string()))
    }

    async fn retract_answer(&self, answer_id: i64) -> Result<(), AppError> {
        sqlx::query("DELETE FROM user_answers WHERE id = $1")
            .bind(answer_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn answered_since(
        &self,
        user_id: i64,
        since: DateTime<Utc>,
    ) -> Result<HashSet<i64>, AppError> {
        let ids: Vec<i64> = sqlx::query_scalar(
            "SELECT DISTINCT question_id FROM user_answers WHERE user_id = $1 AND created_at >= $2",
        )
        .bind(user_id)
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids.into_iter().collect())
    }

    async fn incorrect_question_ids(&self, user_id: i64) -> Result<Vec<i64>, AppError> {
        let ids = sqlx::query_scalar(
            "SELECT question_id FROM user_answers WHERE user_id = $1 AND is_correct = FALSE \
             GROUP BY question_id ORDER BY MIN(id)",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }

    async fn question_aggregate(&self, question_id: i64) -> Result<QuestionAggregate, AppError> {
        let aggregate = sqlx::query_as::<_, QuestionAggregate>(
            r#"
            SELECT COUNT(*) AS total,
                   COUNT(*) FILTER (WHERE is_correct) AS correct,
                   COALESCE(AVG(time_spent)::FLOAT8, 0) AS average_time
            FROM user_answers
            WHERE question_id = $1
            "#,
        )
        .bind(question_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(aggregate)
    }

    async fn answer_facts(&self, user_id: i64) -> Result<Vec<AnswerFact>, AppError> {
        let rows = sqlx::query_as::<_, AnswerFactRow>(
            r#"
            SELECT a.question_id, a.alternative_id, q.subject, q.difficulty,
                   a.is_correct, a.time_spent, a.created_at
            FROM user_answers a
            JOIN questions q ON q.id = a.question_id
            WHERE a.user_id = $1
            ORDER BY a.created_at DESC, a.id DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| -> Result<AnswerFact, AppError> {
                Ok(AnswerFact {
                    question_id: row.question_id,
                    alternative_id: row.alternative_id,
                    subject: parse_column(&row.subject)?,
                    difficulty: parse_optional(row.difficulty.as_deref())?,
                    is_correct: row.is_correct,
                    time_spent: row.time_spent,
                    created_at: row.created_at,
                })
            })
            .collect()
    }

    async fn simulation_answers(&self, simulation_id: i64) -> Result<Vec<UserAnswer>, AppError> {
        let sql = format!(
            "SELECT {} FROM user_answers WHERE simulation_id = $1 ORDER BY created_at, id",
            ANSWER_COLUMNS
        );
        let answers = sqlx::query_as::<_, UserAnswer>(&sql)
            .bind(simulation_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(answers)
    }

    async fn latest_wrong_answers(&self, user_id: i64) -> Result<Vec<UserAnswer>, AppError> {
        let sql = format!(
            "SELECT {cols} FROM ( \
                 SELECT DISTINCT ON (question_id) {cols} FROM user_answers \
                 WHERE user_id = $1 AND is_correct = FALSE \
                 ORDER BY question_id, created_at DESC, id DESC \
             ) latest ORDER BY created_at DESC, id DESC",
            cols = ANSWER_COLUMNS
        );
        let answers = sqlx::query_as::<_, UserAnswer>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(answers)
    }
}

#[async_trait]
impl ProfileRepository for PgStore {
    async fn load_profile(&self, user_id: i64) -> Result<UserProfile, AppError> {
        sqlx::query("INSERT INTO user_profiles (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        let sql = format!("SELECT {} FROM user_profiles WHERE user_id = $1", PROFILE_COLUMNS);
        let profile = sqlx::query_as::<_, UserProfile>(&sql)
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(profile)
    }

    async fn update_profile(
        &self,
        user_id: i64,
        expected_version: i64,
        update: &ProfileUpdate,
    ) -> Result<bool, AppError> {
        let applied = apply_profile_update(&self.pool, user_id, expected_version, update).await?;
        Ok(applied)
    }

    async fn top_profiles(&self, limit: i64) -> Result<Vec<UserProfile>, AppError> {
        let sql = format!(
            "SELECT {} FROM user_profiles ORDER BY total_points DESC, user_id LIMIT $1",
            PROFILE_COLUMNS
        );
        let profiles = sqlx::query_as::<_, UserProfile>(&sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        Ok(profiles)
    }
}

/// Version-guarded profile write; `false` means zero rows matched.
async fn apply_profile_update<'e, E>(
    executor: E,
    user_id: i64,
    expected_version: i64,
    update: &ProfileUpdate,
) -> Result<bool, sqlx::Error>
where
    E: sqlx::Executor<'e, Database = Postgres>,
{
    let result = sqlx::query(
        r#"
        UPDATE user_profiles
        SET total_questions = total_questions + $3,
            correct_answers = correct_answers + $4,
            total_points = $5,
            level = $6,
            streak = $7,
            last_study_date = $8,
            version = version + 1,
            updated_at = NOW()
        WHERE user_id = $1 AND version = $2
        "#,
    )
    .bind(user_id)
    .bind(expected_version)
    .bind(update.total_questions_delta)
    .bind(update.correct_answers_delta)
    .bind(update.total_points)
    .bind(update.level)
    .bind(update.streak)
    .bind(update.last_study_date)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() == 1)
}

#[async_trait]
impl SimulationRepository for PgStore {
    async fn create_simulation(&self, new: NewSimulation) -> Result<Simulation, AppError> {
        let mut tx = self.pool.begin().await?;

        let subjects: Vec<String> = new.subjects.iter().map(|s| s.as_str().to_string()).collect();
        let sql = format!(
            "INSERT INTO simulations (user_id, type, total_questions, subjects, target_difficulty, status) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {}",
            SIMULATION_COLUMNS
        );
        let row = sqlx::query_as::<_, SimulationRow>(&sql)
            .bind(new.user_id)
            .bind(new.simulation_type.as_str())
            .bind(new.question_ids.len() as i32)
            .bind(&subjects)
            .bind(new.target_difficulty.map(|d| d.as_str()))
            .bind(SimulationStatus::Created.as_str())
            .fetch_one(&mut *tx)
            .await?;

        let questions: Vec<SimulationQuestion> = new
            .question_ids
            .iter()
            .enumerate()
            .map(|(i, &question_id)| SimulationQuestion {
                question_id,
                order: i as i32 + 1,
            })
            .collect();

        if !questions.is_empty() {
            let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
                "INSERT INTO simulation_questions (simulation_id, question_id, question_order) ",
            );
            builder.push_values(&questions, |mut b, q| {
                b.push_bind(row.id).push_bind(q.question_id).push_bind(q.order);
            });
            builder.build().execute(&mut *tx).await?;
        }

        tx.commit().await?;
        row.into_simulation(questions)
    }

    async fn find_simulation(&self, id: i64) -> Result<Option<Simulation>, AppError> {
        let sql = format!("SELECT {} FROM simulations WHERE id = $1", SIMULATION_COLUMNS);
        let Some(row) = sqlx::query_as::<_, SimulationRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
        else {
            return Ok(None);
        };

        let mut questions = self.simulation_questions(&[row.id]).await?;
        let questions = questions.remove(&row.id).unwrap_or_default();
        row.into_simulation(questions).map(Some)
    }

    async fn list_simulations(&self, user_id: i64) -> Result<Vec<Simulation>, AppError> {
        let sql = format!(
            "SELECT {} FROM simulations WHERE user_id = $1 ORDER BY started_at DESC, id DESC",
            SIMULATION_COLUMNS
        );
        let rows = sqlx::query_as::<_, SimulationRow>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;

        let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
        let mut questions = self.simulation_questions(&ids).await?;
        rows.into_iter()
            .map(|row| {
                let qs = questions.remove(&row.id).unwrap_or_default();
                row.into_simulation(qs)
            })
            .collect()
    }

    async fn complete_simulation(
        &self,
        id: i64,
        score: f64,
        time_spent: i64,
        completed_at: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            "UPDATE simulations SET status = $2, score = $3, time_spent = $4, completed_at = $5 \
             WHERE id = $1 AND status = $6",
        )
        .bind(id)
        .bind(SimulationStatus::Completed.as_str())
        .bind(score)
        .bind(time_spent)
        .bind(completed_at)
        .bind(SimulationStatus::Created.as_str())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 1 {
            return Ok(true);
        }

        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM simulations WHERE id = $1)")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        if !exists {
            return Err(AppError::NotFound("Simulation not found".to_string()));
        }
        Ok(false)
    }

    async fn completed_scores(&self, user_id: i64) -> Result<Vec<f64>, AppError> {
        let scores = sqlx::query_scalar(
            "SELECT score FROM simulations \
             WHERE user_id = $1 AND status = $2 AND score IS NOT NULL ORDER BY completed_at",
        )
        .bind(user_id)
        .bind(SimulationStatus::Completed.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(scores)
    }
}

#[async_trait]
impl AchievementRepository for PgStore {
    async fn unlocked_keys(&self, user_id: i64) -> Result<Vec<String>, AppError> {
        let keys = sqlx::query_scalar(
            "SELECT a.key FROM user_achievements ua \
             JOIN achievements a ON a.id = ua.achievement_id WHERE ua.user_id = $1",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(keys)
    }

    async fn unlock_and_award(
        &self,
        user_id: i64,
        definition: &AchievementDefinition,
        expected_version: i64,
        bonus: &ProfileUpdate,
    ) -> Result<UnlockOutcome, AppError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO achievements (key, name, description, icon, points) \
             VALUES ($1, $2, $3, $4, $5) ON CONFLICT (key) DO NOTHING",
        )
        .bind(definition.key)
        .bind(definition.name)
        .bind(definition.description)
        .bind(definition.icon)
        .bind(definition.points)
        .execute(&mut *tx)
        .await?;

        let achievement_id: i64 = sqlx::query_scalar("SELECT id FROM achievements WHERE key = $1")
            .bind(definition.key)
            .fetch_one(&mut *tx)
            .await?;

        // A concurrent unlock of the same row blocks here until the other
        // transaction finishes, then sees the conflict.
        let inserted = sqlx::query(
            "INSERT INTO user_achievements (user_id, achievement_id) VALUES ($1, $2) \
             ON CONFLICT (user_id, achievement_id) DO NOTHING",
        )
        .bind(user_id)
        .bind(achievement_id)
        .execute(&mut *tx)
        .await?;

        if inserted.rows_affected() == 0 {
            tx.commit().await?;
            return Ok(UnlockOutcome::AlreadyHeld);
        }

        if !apply_profile_update(&mut *tx, user_id, expected_version, bonus).await? {
            tx.rollback().await?;
            return Ok(UnlockOutcome::VersionConflict);
        }

        tx.commit().await?;
        Ok(UnlockOutcome::Unlocked)
    }

    async fn user_achievements(&self, user_id: i64) -> Result<Vec<UnlockedAchievement>, AppError> {
        let achievements = sqlx::query_as::<_, UnlockedAchievement>(
            r#"
            SELECT a.key, a.name, a.description, a.icon, a.points, ua.unlocked_at
            FROM user_achievements ua
            JOIN achievements a ON a.id = ua.achievement_id
            WHERE ua.user_id = $1
            ORDER BY ua.unlocked_at, a.id
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(achievements)
    }
}

#[async_trait]
impl HealthRepository for PgStore {
    async fn ping(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
