// src/handlers/simulations.rs

use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use validator::Validate;

use crate::{
    engine::PracticeEngine,
    error::AppError,
    models::simulation::CreateSimulationRequest,
    utils::jwt::Claims,
};

/// Assembles a new simulation for the caller.
///
/// An exhausted pool still creates the simulation; `totalQuestions` and
/// `shortfall` tell the client how much was actually sampled.
pub async fn create_simulation(
    State(engine): State<Arc<PracticeEngine>>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateSimulationRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let user_id = claims.user_id()?;
    let created = engine.create_simulation(user_id, &payload).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Lists the caller's simulations, newest first.
pub async fn list_simulations(
    State(engine): State<Arc<PracticeEngine>>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    Ok(Json(engine.list_simulations(user_id).await?))
}

/// Questions of one simulation in presentation order.
pub async fn get_simulation(
    State(engine): State<Arc<PracticeEngine>>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    Ok(Json(engine.simulation_detail(user_id, id).await?))
}

/// Scores and completes a simulation. A second call is a 409.
pub async fn finish_simulation(
    State(engine): State<Arc<PracticeEngine>>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    Ok(Json(engine.finish_simulation(user_id, id).await?))
}

pub async fn simulation_analytics(
    State(engine): State<Arc<PracticeEngine>>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    Ok(Json(engine.simulation_analytics(user_id, id).await?))
}
