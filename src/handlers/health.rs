// src/handlers/health.rs

use std::sync::Arc;

use axum::{
    Json,
    extract::State,
    http::{StatusCode, header},
    response::IntoResponse,
};

use crate::engine::PracticeEngine;

/// Liveness for load balancers: 200 when the database answers, 503 otherwise.
pub async fn health_check(State(engine): State<Arc<PracticeEngine>>) -> impl IntoResponse {
    let report = engine.health().await;
    let status = if report.database {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (
        status,
        [(header::CACHE_CONTROL, "no-cache, no-store, must-revalidate")],
        Json(report),
    )
}
