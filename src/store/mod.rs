// src/store/mod.rs

//! Persistence seam for the attempt engine.
//!
//! Everything except finalization is lock-free. Operations that must be
//! serialized per attempt (submit, close, reopen, grade override) go through
//! [`AttemptStore::lock_attempt`], which returns a [`LockedAttempt`] holding an
//! exclusive lock on the attempt until it is committed or dropped.
//! Dropping without `commit` discards every staged write.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    error::AppError,
    models::{
        answer::{Answer, AnswerInput},
        attempt::{Attempt, SubmissionCause},
        quiz::Quiz,
    },
    services::scoring::QuestionGrade,
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[async_trait]
pub trait AttemptStore: Send + Sync {
    /// Quiz with questions and options. `None` if it does not exist.
    async fn load_quiz(&self, quiz_id: i64) -> Result<Option<Quiz>, AppError>;

    async fn get_attempt(&self, attempt_id: i64) -> Result<Option<Attempt>, AppError>;

    async fn find_attempt(&self, student_id: i64, quiz_id: i64)
    -> Result<Option<Attempt>, AppError>;

    /// Returns the (student, quiz) attempt, creating it in progress if absent.
    async fn find_or_create_attempt(
        &self,
        student_id: i64,
        quiz_id: i64,
        now: DateTime<Utc>,
    ) -> Result<Attempt, AppError>;

    /// Stores `order` only if the attempt has none yet. Returns the order that
    /// is persisted afterwards, which is the earlier one if another caller won.
    async fn set_question_order_if_empty(
        &self,
        attempt_id: i64,
        order: &[i64],
    ) -> Result<Vec<i64>, AppError>;

    async fn list_attempts(&self, quiz_id: i64) -> Result<Vec<Attempt>, AppError>;

    async fn load_answers(&self, attempt_id: i64) -> Result<Vec<Answer>, AppError>;

    /// Atomically replaces the attempt's whole answer set.
    async fn replace_answers(
        &self,
        attempt_id: i64,
        answers: &[AnswerInput],
        now: DateTime<Utc>,
    ) -> Result<(), AppError>;

    /// Increments the focus-loss counter of an in-progress attempt.
    /// `None` if the attempt is missing or terminal.
    async fn increment_focus_loss(&self, attempt_id: i64) -> Result<Option<i32>, AppError>;

    /// Blocks until the exclusive lock on the attempt is acquired.
    async fn lock_attempt(&self, attempt_id: i64) -> Result<Box<dyn LockedAttempt>, AppError>;
}

/// An attempt held under its exclusive lock.
#[async_trait]
pub trait LockedAttempt: Send {
    /// Attempt state as read under the lock, including staged changes.
    fn attempt(&self) -> &Attempt;

    async fn answers(&mut self) -> Result<Vec<Answer>, AppError>;

    async fn replace_answers(
        &mut self,
        answers: &[AnswerInput],
        now: DateTime<Utc>,
    ) -> Result<(), AppError>;

    /// Writes per-question correctness onto existing answer rows.
    async fn record_grades(&mut self, grades: &[QuestionGrade]) -> Result<(), AppError>;

    /// Sets a grader's points on a question's answer, creating a blank answer
    /// row if the student never answered it.
    async fn set_manual_points(
        &mut self,
        question_id: i64,
        points: i32,
        is_correct: bool,
        now: DateTime<Utc>,
    ) -> Result<(), AppError>;

    /// Transitions to `Submitted` with the given score and cause.
    async fn finalize(
        &mut self,
        score: i32,
        cause: SubmissionCause,
        now: DateTime<Utc>,
    ) -> Result<(), AppError>;

    /// Back to `InProgress`, clearing `submitted_at`. Keeps answers and score.
    async fn reopen(&mut self, extra_minutes: i32) -> Result<(), AppError>;

    /// Overwrites the aggregate score without touching state or timestamps.
    async fn set_score(&mut self, score: i32) -> Result<(), AppError>;

    /// Persists staged writes and releases the lock.
    async fn commit(self: Box<Self>) -> Result<Attempt, AppError>;
}
