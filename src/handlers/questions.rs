// src/handlers/questions.rs

use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Query, State},
    response::IntoResponse,
};
use validator::Validate;

use crate::{
    engine::PracticeEngine,
    error::AppError,
    models::{answer::AnswerRequest, question::NextQuestionParams},
    utils::jwt::Claims,
};

/// Returns one practice question picked by the diversified sampler.
///
/// * `subject` / `difficulty` narrow the pool.
/// * `excludeAnswered=true` drops every question the user already answered.
/// * The answer key is never part of the payload.
pub async fn next_question(
    State(engine): State<Arc<PracticeEngine>>,
    Extension(claims): Extension<Claims>,
    Query(params): Query<NextQuestionParams>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    let question = engine.next_question(user_id, &params).await?;
    Ok(Json(question))
}

/// Grades an answer against the stored key.
///
/// Practice answers return points, streak and unlocked achievements.
/// Simulation answers return the id of the queued gamification job instead.
/// A failed progression retracts the recorded answer and returns the error.
pub async fn submit_answer(
    State(engine): State<Arc<PracticeEngine>>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<AnswerRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let user_id = claims.user_id()?;
    let response = engine.submit_answer(user_id, &payload).await?;
    Ok(Json(response))
}
