// src/handlers/admin.rs

use std::sync::Arc;

use axum::{Extension, Json, extract::State, response::IntoResponse};

use crate::{
    engine::PracticeEngine, error::AppError, models::question::ImportQuestionsRequest,
    utils::jwt::Claims,
};

/// Imports a batch of exam questions.
/// Admin only.
///
/// * Each item is validated on its own; invalid ones are reported by index.
/// * `(examId, questionNumber)` already present is skipped.
/// * Statement, explanation and alternative text are sanitized.
pub async fn import_questions(
    State(engine): State<Arc<PracticeEngine>>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<ImportQuestionsRequest>,
) -> Result<impl IntoResponse, AppError> {
    if payload.questions.is_empty() {
        return Err(AppError::BadRequest("No questions submitted".to_string()));
    }

    tracing::info!(admin = %claims.sub, count = payload.questions.len(), "Importing questions");
    let summary = engine.import_questions(&payload).await?;
    Ok(Json(summary))
}
