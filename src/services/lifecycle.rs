// src/services/lifecycle.rs

//! Attempt lifecycle: creation, answer saves, and the exactly-once
//! finalization protocol.
//!
//! `NOT_STARTED -> IN_PROGRESS -> SUBMITTED`, plus the teacher-only
//! `SUBMITTED -> IN_PROGRESS` reopen. Every transition into or out of
//! `SUBMITTED` happens while holding the attempt's exclusive lock.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::{
    config::MAX_EXTRA_MINUTES,
    error::AppError,
    models::{
        answer::{Answer, AnswerInput},
        attempt::{
            Attempt, AttemptResult, AttemptState, AttemptView, QuizStatus, SubmissionCause,
            SubmitOutcome,
        },
        caller::Caller,
        quiz::{Question, Quiz},
    },
    services::{deadline, randomization, scoring},
    store::AttemptStore,
};

pub(crate) async fn load_quiz(store: &dyn AttemptStore, quiz_id: i64) -> Result<Quiz, AppError> {
    store
        .load_quiz(quiz_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Quiz {} not found", quiz_id)))
}

pub(crate) async fn load_attempt(
    store: &dyn AttemptStore,
    attempt_id: i64,
) -> Result<Attempt, AppError> {
    store
        .get_attempt(attempt_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Attempt {} not found", attempt_id)))
}

/// The questions an attempt is graded on: those in its persisted order, or the
/// whole quiz if no order has been drawn yet.
pub(crate) fn attempt_questions(quiz: &Quiz, question_order: &[i64]) -> Vec<Question> {
    if question_order.is_empty() {
        return quiz.questions.clone();
    }
    randomization::apply_order(&quiz.questions, question_order)
        .into_iter()
        .cloned()
        .collect()
}

/// Checks a client answer payload against the quiz and canonicalizes it.
///
/// * Every question must belong to the quiz (and to the attempt's order, once drawn).
/// * Option ids must belong to their question; duplicates are collapsed.
/// * Select kinds drop text, text kinds drop option ids.
/// * Repeated entries for one question collapse to the last one.
pub fn normalize_answers(
    quiz: &Quiz,
    attempt: &Attempt,
    answers: &[AnswerInput],
) -> Result<Vec<AnswerInput>, AppError> {
    let mut position: HashMap<i64, usize> = HashMap::new();
    let mut normalized: Vec<AnswerInput> = Vec::with_capacity(answers.len());

    for input in answers {
        let question = quiz.question(input.question_id).ok_or_else(|| {
            AppError::ValidationError(format!(
                "Question {} is not part of quiz {}",
                input.question_id, quiz.id
            ))
        })?;
        if !attempt.question_order.is_empty() && !attempt.question_order.contains(&question.id) {
            return Err(AppError::ValidationError(format!(
                "Question {} is not part of this attempt",
                question.id
            )));
        }

        let entry = if question.kind.is_select() {
            let mut option_ids: Vec<i64> = Vec::with_capacity(input.option_ids.len());
            for option_id in &input.option_ids {
                if !question.has_option(*option_id) {
                    return Err(AppError::ValidationError(format!(
                        "Option {} does not belong to question {}",
                        option_id, question.id
                    )));
                }
                if !option_ids.contains(option_id) {
                    option_ids.push(*option_id);
                }
            }
            AnswerInput {
                question_id: question.id,
                option_ids,
                text: None,
            }
        } else {
            AnswerInput {
                question_id: question.id,
                option_ids: vec![],
                text: input.text.clone(),
            }
        };

        match position.get(&question.id) {
            Some(&idx) => normalized[idx] = entry,
            None => {
                position.insert(question.id, normalized.len());
                normalized.push(entry);
            }
        }
    }

    Ok(normalized)
}

/// Answers as shown to the student: grading data is withheld.
fn student_answers(answers: Vec<Answer>) -> Vec<Answer> {
    answers
        .into_iter()
        .map(|a| Answer {
            is_correct: None,
            manual_points: None,
            ..a
        })
        .collect()
}

/// Finds or creates the caller's attempt for a quiz and returns everything the
/// attempt screen needs.
///
/// Fails with `AlreadySubmitted` if the attempt is terminal, `NotYetAvailable`
/// before the window (or when the quiz is unscheduled), `WindowClosed` after it.
pub async fn get_or_create_attempt(
    store: &dyn AttemptStore,
    caller: &Caller,
    quiz_id: i64,
    now: DateTime<Utc>,
    client_now: Option<DateTime<Utc>>,
) -> Result<AttemptView, AppError> {
    let quiz = load_quiz(store, quiz_id).await?;

    let existing = store.find_attempt(caller.user_id, quiz_id).await?;
    if existing.as_ref().is_some_and(|a| a.state.is_terminal()) {
        return Err(AppError::AlreadySubmitted(format!(
            "Quiz {} has already been submitted",
            quiz_id
        )));
    }

    let window = deadline::attempt_window(&quiz, existing.as_ref())?;
    window.ensure_open(now)?;

    let mut attempt = store
        .find_or_create_attempt(caller.user_id, quiz_id, now)
        .await?;
    if attempt.state.is_terminal() {
        // A concurrent submit finished between the check and the lookup.
        return Err(AppError::AlreadySubmitted(format!(
            "Quiz {} has already been submitted",
            quiz_id
        )));
    }
    if existing.is_none() {
        tracing::info!(
            "Attempt {} started by student {} for quiz {}",
            attempt.id,
            caller.user_id,
            quiz_id
        );
    }

    if attempt.question_order.is_empty() {
        let fresh = randomization::new_order(&quiz.questions);
        attempt.question_order = store
            .set_question_order_if_empty(attempt.id, &fresh)
            .await?;
        tracing::info!(
            "Question order materialized for attempt {} ({} questions)",
            attempt.id,
            attempt.question_order.len()
        );
    }

    let ordered = randomization::apply_order(&quiz.questions, &attempt.question_order);
    let ordered_questions = randomization::present(&ordered);
    let existing_answers = student_answers(store.load_answers(attempt.id).await?);

    Ok(AttemptView {
        attempt,
        ordered_questions,
        existing_answers,
        window_start: window.start,
        window_end: window.end,
        server_now: now,
        remaining_seconds: window.remaining(now).num_seconds(),
        clock_offset_ms: client_now
            .map(|client| deadline::display_offset(client, now).num_milliseconds()),
    })
}

/// Replaces the attempt's answers. Lock-free; last writer wins.
pub async fn save_answers(
    store: &dyn AttemptStore,
    caller: &Caller,
    attempt_id: i64,
    answers: &[AnswerInput],
    now: DateTime<Utc>,
) -> Result<(), AppError> {
    let attempt = load_attempt(store, attempt_id).await?;
    caller.ensure_owner(attempt.student_id)?;

    if attempt.state.is_terminal() {
        return Err(AppError::AlreadySubmitted(format!(
            "Attempt {} has already been submitted",
            attempt_id
        )));
    }

    let quiz = load_quiz(store, attempt.quiz_id).await?;
    deadline::attempt_window(&quiz, Some(&attempt))?.ensure_open(now)?;

    let answers = normalize_answers(&quiz, &attempt, answers)?;
    store.replace_answers(attempt_id, &answers, now).await?;

    tracing::debug!("Saved {} answers for attempt {}", answers.len(), attempt_id);
    Ok(())
}

/// Scores and finalizes under the attempt lock. The first caller to take the
/// lock performs the transition; everyone after observes `already_submitted`.
async fn finalize(
    store: &dyn AttemptStore,
    quiz: &Quiz,
    attempt_id: i64,
    cause: SubmissionCause,
    final_answers: Option<Vec<AnswerInput>>,
    now: DateTime<Utc>,
) -> Result<SubmitOutcome, AppError> {
    let mut locked = store.lock_attempt(attempt_id).await?;

    if locked.attempt().state.is_terminal() {
        let score = locked.attempt().score.unwrap_or(0);
        tracing::info!(
            "Attempt {} already submitted, returning stored score {}",
            attempt_id,
            score
        );
        return Ok(SubmitOutcome {
            success: true,
            score,
            already_submitted: true,
        });
    }

    if let Some(answers) = final_answers {
        locked.replace_answers(&answers, now).await?;
    }

    let questions = attempt_questions(quiz, &locked.attempt().question_order);
    let answers = locked.answers().await?;
    let report = scoring::grade_attempt(&questions, &answers);

    locked.record_grades(&report.grades).await?;
    locked.finalize(report.total, cause, now).await?;
    let attempt = locked.commit().await?;

    tracing::info!(
        "Attempt {} submitted ({:?}) with score {}",
        attempt.id,
        cause,
        report.total
    );

    Ok(SubmitOutcome {
        success: true,
        score: report.total,
        already_submitted: false,
    })
}

/// Student submit. Idempotent: repeated calls report the stored score.
///
/// The cause is derived from server time: at or past the window end the
/// submit is recorded as `timer-expiry`. `final_answers`, when given, replace
/// the stored answers atomically with scoring. They are dropped, and the stored
/// answers scored instead, when the window has closed or the payload names
/// questions or options outside the attempt.
pub async fn submit(
    store: &dyn AttemptStore,
    caller: &Caller,
    attempt_id: i64,
    final_answers: Option<&[AnswerInput]>,
    now: DateTime<Utc>,
) -> Result<SubmitOutcome, AppError> {
    let attempt = load_attempt(store, attempt_id).await?;
    caller.ensure_owner(attempt.student_id)?;

    // Quiz definitions are immutable for the attempt, so read them before locking.
    let quiz = load_quiz(store, attempt.quiz_id).await?;
    let window = deadline::attempt_window(&quiz, Some(&attempt))?;

    let cause = if window.has_closed(now) {
        SubmissionCause::TimerExpiry
    } else {
        SubmissionCause::User
    };

    let final_answers = match final_answers {
        Some(_) if window.has_closed(now) => {
            tracing::warn!(
                "Ignoring final answers for attempt {} received after the deadline",
                attempt_id
            );
            None
        }
        Some(answers) => match normalize_answers(&quiz, &attempt, answers) {
            Ok(answers) => Some(answers),
            Err(e) => {
                tracing::warn!(
                    "Ignoring invalid final answers for attempt {}: {}",
                    attempt_id,
                    e
                );
                None
            }
        },
        None => None,
    };

    finalize(store, &quiz, attempt_id, cause, final_answers, now).await
}

/// Teacher-forced close: the submit path with cause `teacher-closed`.
pub async fn close(
    store: &dyn AttemptStore,
    caller: &Caller,
    attempt_id: i64,
    now: DateTime<Utc>,
) -> Result<SubmitOutcome, AppError> {
    caller.ensure_teacher()?;
    let attempt = load_attempt(store, attempt_id).await?;
    let quiz = load_quiz(store, attempt.quiz_id).await?;

    let outcome = finalize(
        store,
        &quiz,
        attempt_id,
        SubmissionCause::TeacherClosed,
        None,
        now,
    )
    .await?;
    tracing::info!("Attempt {} closed by teacher {}", attempt_id, caller.user_id);
    Ok(outcome)
}

/// Teacher reopen: `SUBMITTED -> IN_PROGRESS`. Answers and score are kept.
///
/// `extra_minutes` replaces the attempt's window extension; `None` keeps it.
pub async fn reopen(
    store: &dyn AttemptStore,
    caller: &Caller,
    attempt_id: i64,
    extra_minutes: Option<i32>,
) -> Result<Attempt, AppError> {
    caller.ensure_teacher()?;

    if let Some(extra) = extra_minutes {
        if !(0..=MAX_EXTRA_MINUTES).contains(&extra) {
            return Err(AppError::ValidationError(format!(
                "extraMinutes must be between 0 and {}",
                MAX_EXTRA_MINUTES
            )));
        }
    }

    let mut locked = store.lock_attempt(attempt_id).await?;
    if locked.attempt().state != AttemptState::Submitted {
        return Err(AppError::ValidationError(format!(
            "Attempt {} is not submitted",
            attempt_id
        )));
    }

    let extra = extra_minutes.unwrap_or(locked.attempt().extra_minutes);
    locked.reopen(extra).await?;
    let attempt = locked.commit().await?;

    tracing::info!(
        "Attempt {} reopened by teacher {} (+{} min)",
        attempt_id,
        caller.user_id,
        extra
    );
    Ok(attempt)
}

/// The caller's state for a quiz, `not_started` when no attempt exists.
pub async fn quiz_status(
    store: &dyn AttemptStore,
    caller: &Caller,
    quiz_id: i64,
) -> Result<QuizStatus, AppError> {
    load_quiz(store, quiz_id).await?;

    Ok(match store.find_attempt(caller.user_id, quiz_id).await? {
        Some(attempt) => QuizStatus {
            state: attempt.state,
            attempt_id: Some(attempt.id),
            score: attempt.score.filter(|_| attempt.state.is_terminal()),
        },
        None => QuizStatus {
            state: AttemptState::NotStarted,
            attempt_id: None,
            score: None,
        },
    })
}

/// Final score of the caller's submitted attempt.
pub async fn attempt_result(
    store: &dyn AttemptStore,
    caller: &Caller,
    attempt_id: i64,
) -> Result<AttemptResult, AppError> {
    let attempt = load_attempt(store, attempt_id).await?;
    caller.ensure_owner(attempt.student_id)?;

    if !attempt.state.is_terminal() {
        return Err(AppError::NotFound(format!(
            "Attempt {} has not been submitted",
            attempt_id
        )));
    }

    let quiz = load_quiz(store, attempt.quiz_id).await?;
    let max_score = attempt_questions(&quiz, &attempt.question_order)
        .iter()
        .map(|q| q.points)
        .sum();

    Ok(AttemptResult {
        attempt_id: attempt.id,
        quiz_id: attempt.quiz_id,
        score: attempt.score.unwrap_or(0),
        max_score,
        submitted_at: attempt.submitted_at,
        submission_cause: attempt.submission_cause,
    })
}
