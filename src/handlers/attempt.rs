// src/handlers/attempt.rs

use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use chrono::Utc;
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        answer::SaveAnswersRequest,
        attempt::{AttemptIdRequest, AttemptQuery, SubmitRequest},
    },
    services::{lifecycle, monitoring},
    store::AttemptStore,
    utils::jwt::Claims,
};

/// Returns the caller's attempt for a quiz, creating it on first access.
///
/// * Question order is drawn once and persisted; option order is reshuffled per call.
/// * Answer keys are never included.
/// * `serverNow` is authoritative; `clientNow` only yields a display offset.
pub async fn get_attempt(
    State(store): State<Arc<dyn AttemptStore>>,
    Extension(claims): Extension<Claims>,
    Path(quiz_id): Path<i64>,
    Query(query): Query<AttemptQuery>,
) -> Result<impl IntoResponse, AppError> {
    let caller = claims.caller()?;
    let view = lifecycle::get_or_create_attempt(
        store.as_ref(),
        &caller,
        quiz_id,
        Utc::now(),
        query.client_now,
    )
    .await?;

    Ok(Json(view))
}

/// Reports `not_started`, `in_progress` or `submitted` for the caller.
pub async fn get_status(
    State(store): State<Arc<dyn AttemptStore>>,
    Extension(claims): Extension<Claims>,
    Path(quiz_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let caller = claims.caller()?;
    let status = lifecycle::quiz_status(store.as_ref(), &caller, quiz_id).await?;
    Ok(Json(status))
}

/// Replaces the attempt's in-progress answers (autosave).
pub async fn save_answers(
    State(store): State<Arc<dyn AttemptStore>>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SaveAnswersRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate()?;
    let caller = claims.caller()?;

    lifecycle::save_answers(store.as_ref(), &caller, req.attempt_id, &req.answers, Utc::now())
        .await?;

    Ok(Json(serde_json::json!({ "success": true })))
}

/// Finalizes the attempt. Safe to retry: later calls report `alreadySubmitted`.
pub async fn submit(
    State(store): State<Arc<dyn AttemptStore>>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SubmitRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate()?;
    let caller = claims.caller()?;

    let outcome = lifecycle::submit(
        store.as_ref(),
        &caller,
        req.attempt_id,
        req.answers.as_deref(),
        Utc::now(),
    )
    .await?;

    Ok(Json(outcome))
}

/// Counts a page visibility/focus loss.
pub async fn record_focus_loss(
    State(store): State<Arc<dyn AttemptStore>>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<AttemptIdRequest>,
) -> Result<impl IntoResponse, AppError> {
    let caller = claims.caller()?;
    let count = monitoring::record_focus_loss(store.as_ref(), &caller, req.attempt_id).await?;

    Ok(Json(serde_json::json!({
        "success": true,
        "focusLossCount": count
    })))
}

/// Score of the caller's submitted attempt.
pub async fn get_result(
    State(store): State<Arc<dyn AttemptStore>>,
    Extension(claims): Extension<Claims>,
    Path(attempt_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let caller = claims.caller()?;
    let result = lifecycle::attempt_result(store.as_ref(), &caller, attempt_id).await?;
    Ok(Json(result))
}
