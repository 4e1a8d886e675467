// src/handlers/analytics.rs

use std::sync::Arc;

use axum::{Extension, Json, extract::State, response::IntoResponse};

use crate::{engine::PracticeEngine, error::AppError, utils::jwt::Claims};

/// Dashboard for the caller: overview, per-subject accuracy, weak areas,
/// trend and daily activity.
pub async fn get_analytics(
    State(engine): State<Arc<PracticeEngine>>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    Ok(Json(engine.user_analytics(user_id).await?))
}

/// Latest wrong attempt per question, for review sessions.
pub async fn wrong_questions(
    State(engine): State<Arc<PracticeEngine>>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    Ok(Json(engine.wrong_questions(user_id).await?))
}
