// src/handlers/teacher.rs

use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use chrono::Utc;
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        answer::OverrideGradeRequest,
        attempt::{AttemptIdRequest, ReopenRequest},
    },
    services::{grading, lifecycle},
    store::AttemptStore,
    utils::jwt::Claims,
};

/// Force-submits a student's attempt.
/// Teacher only.
pub async fn close_attempt(
    State(store): State<Arc<dyn AttemptStore>>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<AttemptIdRequest>,
) -> Result<impl IntoResponse, AppError> {
    let caller = claims.caller()?;
    let outcome = lifecycle::close(store.as_ref(), &caller, req.attempt_id, Utc::now()).await?;
    Ok(Json(outcome))
}

/// Returns a submitted attempt to in-progress, optionally granting extra time.
/// Teacher only.
pub async fn reopen_attempt(
    State(store): State<Arc<dyn AttemptStore>>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<ReopenRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate()?;
    let caller = claims.caller()?;

    let attempt =
        lifecycle::reopen(store.as_ref(), &caller, req.attempt_id, req.extra_minutes).await?;

    Ok(Json(serde_json::json!({
        "success": true,
        "attempt": attempt
    })))
}

/// Records manual points for long-text questions and recomputes the score.
/// Teacher only.
pub async fn override_grade(
    State(store): State<Arc<dyn AttemptStore>>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<OverrideGradeRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate()?;
    let caller = claims.caller()?;

    let attempt = grading::override_grade(
        store.as_ref(),
        &caller,
        req.attempt_id,
        &req.per_question_points,
        Utc::now(),
    )
    .await?;

    Ok(Json(serde_json::json!({
        "success": true,
        "score": attempt.score,
        "attempt": attempt
    })))
}

/// Lists every attempt of a quiz.
/// Teacher only.
pub async fn list_attempts(
    State(store): State<Arc<dyn AttemptStore>>,
    Extension(claims): Extension<Claims>,
    Path(quiz_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let caller = claims.caller()?;
    let attempts = grading::list_attempts(store.as_ref(), &caller, quiz_id).await?;
    Ok(Json(attempts))
}

/// Attempt detail for grading, answer key included.
/// Teacher only.
pub async fn review_attempt(
    State(store): State<Arc<dyn AttemptStore>>,
    Extension(claims): Extension<Claims>,
    Path(attempt_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let caller = claims.caller()?;
    let review = grading::review_attempt(store.as_ref(), &caller, attempt_id).await?;
    Ok(Json(review))
}
