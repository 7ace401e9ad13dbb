// src/models/attempt.rs

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{
    answer::{Answer, AnswerInput},
    quiz::{PublicQuestion, Question},
};

/// Lifecycle state of a student's run of a quiz.
///
/// `NotStarted` has no row behind it; it is what the status endpoint reports
/// before the first access. Persisted rows are either `InProgress` or `Submitted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptState {
    NotStarted,
    InProgress,
    Submitted,
}

impl AttemptState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, AttemptState::Submitted)
    }
}

impl FromStr for AttemptState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "not_started" => Ok(AttemptState::NotStarted),
            "in_progress" => Ok(AttemptState::InProgress),
            "submitted" => Ok(AttemptState::Submitted),
            other => Err(format!("unknown attempt state '{}'", other)),
        }
    }
}

/// Why the attempt last changed terminal status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SubmissionCause {
    User,
    TimerExpiry,
    TeacherClosed,
    TeacherReopened,
}

impl SubmissionCause {
    /// Column representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionCause::User => "user",
            SubmissionCause::TimerExpiry => "timer_expiry",
            SubmissionCause::TeacherClosed => "teacher_closed",
            SubmissionCause::TeacherReopened => "teacher_reopened",
        }
    }
}

impl FromStr for SubmissionCause {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(SubmissionCause::User),
            "timer_expiry" => Ok(SubmissionCause::TimerExpiry),
            "teacher_closed" => Ok(SubmissionCause::TeacherClosed),
            "teacher_reopened" => Ok(SubmissionCause::TeacherReopened),
            other => Err(format!("unknown submission cause '{}'", other)),
        }
    }
}

/// Represents the 'attempts' table in the database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attempt {
    pub id: i64,
    pub quiz_id: i64,
    pub student_id: i64,

    /// Question ids in presentation order. Immutable once non-empty.
    pub question_order: Vec<i64>,
    pub state: AttemptState,
    pub started_at: DateTime<Utc>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub submission_cause: Option<SubmissionCause>,

    /// `None` until the first finalization.
    pub score: Option<i32>,
    pub focus_loss_count: i32,

    /// Extra time granted by a teacher on reopen.
    pub extra_minutes: i32,
}

/// Response for `GET /api/quizzes/{quiz_id}/attempt`.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptView {
    pub attempt: Attempt,
    pub ordered_questions: Vec<PublicQuestion>,
    pub existing_answers: Vec<Answer>,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub server_now: DateTime<Utc>,
    pub remaining_seconds: i64,

    /// Present only when the client reported its own clock.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clock_offset_ms: Option<i64>,
}

/// Query string for `GET /api/quizzes/{quiz_id}/attempt`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptQuery {
    /// Client wall clock at page load, used for display offset only.
    pub client_now: Option<DateTime<Utc>>,
}

/// Result of a submit call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitOutcome {
    pub success: bool,
    pub score: i32,
    pub already_submitted: bool,
}

/// DTO for `POST /api/attempts/submit`.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SubmitRequest {
    pub attempt_id: i64,

    /// Final answers to store atomically with scoring.
    #[validate(length(max = 500), nested)]
    pub answers: Option<Vec<AnswerInput>>,
}

/// DTO for endpoints that only carry the attempt id.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptIdRequest {
    pub attempt_id: i64,
}

/// DTO for `POST /api/teacher/attempts/reopen`.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ReopenRequest {
    pub attempt_id: i64,
    #[validate(range(min = 0, max = 1440))]
    pub extra_minutes: Option<i32>,
}

/// Response for `GET /api/quizzes/{quiz_id}/status`.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizStatus {
    pub state: AttemptState,
    pub attempt_id: Option<i64>,
    pub score: Option<i32>,
}

/// Response for `GET /api/attempts/{attempt_id}/result`.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptResult {
    pub attempt_id: i64,
    pub quiz_id: i64,
    pub score: i32,
    pub max_score: i32,
    pub submitted_at: Option<DateTime<Utc>>,
    pub submission_cause: Option<SubmissionCause>,
}

/// Row of the teacher roster for a quiz.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptSummary {
    pub attempt_id: i64,
    pub student_id: i64,
    pub state: AttemptState,
    pub score: Option<i32>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub submission_cause: Option<SubmissionCause>,
    pub focus_loss_count: i32,
}

impl From<&Attempt> for AttemptSummary {
    fn from(a: &Attempt) -> Self {
        Self {
            attempt_id: a.id,
            student_id: a.student_id,
            state: a.state,
            score: a.score,
            submitted_at: a.submitted_at,
            submission_cause: a.submission_cause,
            focus_loss_count: a.focus_loss_count,
        }
    }
}

/// Response for `GET /api/teacher/attempts/{attempt_id}`: everything a grader needs.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptReview {
    pub attempt: Attempt,

    /// In the attempt's presentation order, answer key included.
    pub questions: Vec<Question>,
    pub answers: Vec<Answer>,
    pub max_score: i32,
}
