// src/handlers/profile.rs

use std::sync::Arc;

use axum::{Extension, Json, extract::State, response::IntoResponse};

use crate::{engine::PracticeEngine, error::AppError, utils::jwt::Claims};

/// Get current user's gamification profile.
/// The profile row is created on first access.
pub async fn get_me(
    State(engine): State<Arc<PracticeEngine>>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    Ok(Json(engine.profile_me(user_id).await?))
}

/// Top profiles by total points.
pub async fn get_leaderboard(State(engine): State<Arc<PracticeEngine>>) -> Result<impl IntoResponse, AppError> {
    Ok(Json(engine.leaderboard().await?))
}
