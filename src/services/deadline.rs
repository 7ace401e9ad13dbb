// src/services/deadline.rs

//! Authoritative attempt windows.
//!
//! Everything here is a pure function of persisted quiz/attempt data and the
//! server's `now`. Client clocks only ever feed [`display_offset`].

use chrono::{DateTime, TimeDelta, Utc};

use crate::{
    error::AppError,
    models::{attempt::Attempt, quiz::Quiz},
};

/// The half-open range `[start, end)` during which an attempt may be worked on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Window {
    pub fn has_not_started(&self, now: DateTime<Utc>) -> bool {
        now < self.start
    }

    pub fn has_closed(&self, now: DateTime<Utc>) -> bool {
        now >= self.end
    }

    pub fn remaining(&self, now: DateTime<Utc>) -> TimeDelta {
        remaining(now, self.end)
    }

    /// Fails with the matching deadline error unless `now` is inside the window.
    pub fn ensure_open(&self, now: DateTime<Utc>) -> Result<(), AppError> {
        if self.has_not_started(now) {
            return Err(AppError::NotYetAvailable(format!(
                "Quiz opens at {}",
                self.start.to_rfc3339()
            )));
        }
        if self.has_closed(now) {
            return Err(AppError::WindowClosed(format!(
                "Quiz closed at {}",
                self.end.to_rfc3339()
            )));
        }
        Ok(())
    }
}

pub fn compute_window(start: DateTime<Utc>, duration_minutes: i64) -> Window {
    Window {
        start,
        end: start + TimeDelta::minutes(duration_minutes),
    }
}

/// `max(0, end - now)`.
pub fn remaining(now: DateTime<Utc>, end: DateTime<Utc>) -> TimeDelta {
    (end - now).max(TimeDelta::zero())
}

/// `client_now - server_now`, for shifting the client's countdown display.
pub fn display_offset(client_now: DateTime<Utc>, server_now: DateTime<Utc>) -> TimeDelta {
    client_now - server_now
}

/// Window of the quiz itself, or `NotYetAvailable` if it has no start time.
pub fn quiz_window(quiz: &Quiz) -> Result<Window, AppError> {
    let start = quiz.start_time.ok_or_else(|| {
        AppError::NotYetAvailable(format!("Quiz {} is not scheduled yet", quiz.id))
    })?;
    Ok(compute_window(start, i64::from(quiz.duration_minutes)))
}

/// Window for a specific attempt: the quiz window plus any reopen extension.
pub fn attempt_window(quiz: &Quiz, attempt: Option<&Attempt>) -> Result<Window, AppError> {
    let base = quiz_window(quiz)?;
    let extra = attempt.map(|a| i64::from(a.extra_minutes)).unwrap_or(0);
    Ok(Window {
        start: base.start,
        end: base.end + TimeDelta::minutes(extra),
    })
}
