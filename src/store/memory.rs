// src/store/memory.rs

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::OwnedMutexGuard;

use crate::{
    error::AppError,
    models::{
        answer::{Answer, AnswerInput},
        attempt::{Attempt, AttemptState, SubmissionCause},
        quiz::Quiz,
    },
    services::scoring::QuestionGrade,
};

use super::{AttemptStore, LockedAttempt};

#[derive(Default)]
struct Inner {
    quizzes: HashMap<i64, Quiz>,
    attempts: HashMap<i64, Attempt>,
    answers: HashMap<i64, Vec<Answer>>,
    locks: HashMap<i64, Arc<tokio::sync::Mutex<()>>>,
    next_attempt_id: i64,
}

/// In-process store with the same locking contract as [`super::PgStore`].
///
/// Each attempt has its own `tokio::sync::Mutex`; `lock_attempt` waits on it,
/// so concurrent submits on one attempt are serialized.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

fn build_answers(attempt_id: i64, answers: &[AnswerInput], now: DateTime<Utc>) -> Vec<Answer> {
    answers
        .iter()
        .map(|a| Answer {
            attempt_id,
            question_id: a.question_id,
            option_ids: a.option_ids.clone(),
            text: a.text.clone(),
            is_correct: None,
            manual_points: None,
            submitted_at: now,
        })
        .collect()
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn inner(&self) -> Result<MutexGuard<'_, Inner>, AppError> {
        self.inner
            .lock()
            .map_err(|_| AppError::TransientStoreError("memory store poisoned".to_string()))
    }

    /// Registers a quiz in the read model, replacing any quiz with the same id.
    pub fn insert_quiz(&self, quiz: Quiz) -> Result<(), AppError> {
        self.inner()?.quizzes.insert(quiz.id, quiz);
        Ok(())
    }
}

#[async_trait]
impl AttemptStore for MemoryStore {
    async fn load_quiz(&self, quiz_id: i64) -> Result<Option<Quiz>, AppError> {
        Ok(self.inner()?.quizzes.get(&quiz_id).cloned())
    }

    async fn get_attempt(&self, attempt_id: i64) -> Result<Option<Attempt>, AppError> {
        Ok(self.inner()?.attempts.get(&attempt_id).cloned())
    }

    async fn find_attempt(
        &self,
        student_id: i64,
        quiz_id: i64,
    ) -> Result<Option<Attempt>, AppError> {
        Ok(self
            .inner()?
            .attempts
            .values()
            .find(|a| a.student_id == student_id && a.quiz_id == quiz_id)
            .cloned())
    }

    async fn find_or_create_attempt(
        &self,
        student_id: i64,
        quiz_id: i64,
        now: DateTime<Utc>,
    ) -> Result<Attempt, AppError> {
        let mut inner = self.inner()?;
        if let Some(existing) = inner
            .attempts
            .values()
            .find(|a| a.student_id == student_id && a.quiz_id == quiz_id)
        {
            return Ok(existing.clone());
        }

        inner.next_attempt_id += 1;
        let attempt = Attempt {
            id: inner.next_attempt_id,
            quiz_id,
            student_id,
            question_order: vec![],
            state: AttemptState::InProgress,
            started_at: now,
            submitted_at: None,
            submission_cause: None,
            score: None,
            focus_loss_count: 0,
            extra_minutes: 0,
        };
        inner.attempts.insert(attempt.id, attempt.clone());
        Ok(attempt)
    }

    async fn set_question_order_if_empty(
        &self,
        attempt_id: i64,
        order: &[i64],
    ) -> Result<Vec<i64>, AppError> {
        let mut inner = self.inner()?;
        let attempt = inner
            .attempts
            .get_mut(&attempt_id)
            .ok_or_else(|| AppError::NotFound(format!("Attempt {} not found", attempt_id)))?;
        if attempt.question_order.is_empty() {
            attempt.question_order = order.to_vec();
        }
        Ok(attempt.question_order.clone())
    }

    async fn list_attempts(&self, quiz_id: i64) -> Result<Vec<Attempt>, AppError> {
        let mut attempts: Vec<Attempt> = self
            .inner()?
            .attempts
            .values()
            .filter(|a| a.quiz_id == quiz_id)
            .cloned()
            .collect();
        attempts.sort_by_key(|a| a.id);
        Ok(attempts)
    }

    async fn load_answers(&self, attempt_id: i64) -> Result<Vec<Answer>, AppError> {
        Ok(self
            .inner()?
            .answers
            .get(&attempt_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn replace_answers(
        &self,
        attempt_id: i64,
        answers: &[AnswerInput],
        now: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let rows = build_answers(attempt_id, answers, now);
        self.inner()?.answers.insert(attempt_id, rows);
        Ok(())
    }

    async fn increment_focus_loss(&self, attempt_id: i64) -> Result<Option<i32>, AppError> {
        let mut inner = self.inner()?;
        Ok(inner
            .attempts
            .get_mut(&attempt_id)
            .filter(|a| a.state == AttemptState::InProgress)
            .map(|a| {
                a.focus_loss_count += 1;
                a.focus_loss_count
            }))
    }

    async fn lock_attempt(&self, attempt_id: i64) -> Result<Box<dyn LockedAttempt>, AppError> {
        let lock = {
            let mut inner = self.inner()?;
            if !inner.attempts.contains_key(&attempt_id) {
                return Err(AppError::NotFound(format!("Attempt {} not found", attempt_id)));
            }
            inner.locks.entry(attempt_id).or_default().clone()
        };

        let guard = lock.lock_owned().await;

        // Read under the lock so the caller sees every earlier commit.
        let attempt = self
            .inner()?
            .attempts
            .get(&attempt_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Attempt {} not found", attempt_id)))?;

        Ok(Box::new(MemoryLockedAttempt {
            _guard: guard,
            store: self.clone(),
            attempt,
            staged_answers: None,
        }))
    }
}

/// Staged view of an attempt under its mutex. Writes land on `commit`.
pub struct MemoryLockedAttempt {
    _guard: OwnedMutexGuard<()>,
    store: MemoryStore,
    attempt: Attempt,
    staged_answers: Option<Vec<Answer>>,
}

impl MemoryLockedAttempt {
    fn staged_answers(&mut self) -> Result<&mut Vec<Answer>, AppError> {
        if self.staged_answers.is_none() {
            let current = self
                .store
                .inner()?
                .answers
                .get(&self.attempt.id)
                .cloned()
                .unwrap_or_default();
            self.staged_answers = Some(current);
        }
        Ok(self.staged_answers.get_or_insert_with(Vec::new))
    }
}

#[async_trait]
impl LockedAttempt for MemoryLockedAttempt {
    fn attempt(&self) -> &Attempt {
        &self.attempt
    }

    async fn answers(&mut self) -> Result<Vec<Answer>, AppError> {
        Ok(self.staged_answers()?.clone())
    }

    async fn replace_answers(
        &mut self,
        answers: &[AnswerInput],
        now: DateTime<Utc>,
    ) -> Result<(), AppError> {
        self.staged_answers = Some(build_answers(self.attempt.id, answers, now));
        Ok(())
    }

    async fn record_grades(&mut self, grades: &[QuestionGrade]) -> Result<(), AppError> {
        let answers = self.staged_answers()?;
        for grade in grades.iter().filter(|g| g.answered) {
            if let Some(answer) = answers.iter_mut().find(|a| a.question_id == grade.question_id) {
                answer.is_correct = grade.is_correct;
            }
        }
        Ok(())
    }

    async fn set_manual_points(
        &mut self,
        question_id: i64,
        points: i32,
        is_correct: bool,
        now: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let attempt_id = self.attempt.id;
        let answers = self.staged_answers()?;
        match answers.iter_mut().find(|a| a.question_id == question_id) {
            Some(answer) => {
                answer.manual_points = Some(points);
                answer.is_correct = Some(is_correct);
            }
            None => answers.push(Answer {
                attempt_id,
                question_id,
                option_ids: vec![],
                text: Some(String::new()),
                is_correct: Some(is_correct),
                manual_points: Some(points),
                submitted_at: now,
            }),
        }
        Ok(())
    }

    async fn finalize(
        &mut self,
        score: i32,
        cause: SubmissionCause,
        now: DateTime<Utc>,
    ) -> Result<(), AppError> {
        self.attempt.state = AttemptState::Submitted;
        self.attempt.score = Some(score);
        self.attempt.submitted_at = Some(now);
        self.attempt.submission_cause = Some(cause);
        Ok(())
    }

    async fn reopen(&mut self, extra_minutes: i32) -> Result<(), AppError> {
        self.attempt.state = AttemptState::InProgress;
        self.attempt.submitted_at = None;
        self.attempt.submission_cause = Some(SubmissionCause::TeacherReopened);
        self.attempt.extra_minutes = extra_minutes;
        Ok(())
    }

    async fn set_score(&mut self, score: i32) -> Result<(), AppError> {
        self.attempt.score = Some(score);
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<Attempt, AppError> {
        let MemoryLockedAttempt {
            _guard,
            store,
            attempt,
            staged_answers,
        } = *self;

        {
            let mut inner = store.inner()?;
            // Counters bumped outside the lock since it was taken are preserved.
            let focus_loss_count = inner
                .attempts
                .get(&attempt.id)
                .map(|a| a.focus_loss_count)
                .unwrap_or(attempt.focus_loss_count);
            let mut committed = attempt.clone();
            committed.focus_loss_count = focus_loss_count;
            inner.attempts.insert(committed.id, committed);
            if let Some(answers) = staged_answers {
                inner.answers.insert(attempt.id, answers);
            }
        }

        drop(_guard);
        store
            .get_attempt(attempt.id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Attempt {} not found", attempt.id)))
    }
}
