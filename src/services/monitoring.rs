// src/services/monitoring.rs

use crate::{
    error::AppError,
    models::caller::Caller,
    services::lifecycle::load_attempt,
    store::AttemptStore,
};

/// Bumps the attempt's focus-loss counter and returns the new value.
///
/// No debouncing and no effect on scoring. Rejected once the attempt is terminal.
pub async fn record_focus_loss(
    store: &dyn AttemptStore,
    caller: &Caller,
    attempt_id: i64,
) -> Result<i32, AppError> {
    let attempt = load_attempt(store, attempt_id).await?;
    caller.ensure_owner(attempt.student_id)?;

    let count = store.increment_focus_loss(attempt_id).await?.ok_or_else(|| {
        AppError::AlreadySubmitted(format!("Attempt {} has already been submitted", attempt_id))
    })?;

    tracing::debug!("Focus loss #{} on attempt {}", count, attempt_id);
    Ok(count)
}
