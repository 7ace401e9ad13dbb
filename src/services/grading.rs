// src/services/grading.rs

//! Teacher-side grading: manual long-text points and attempt review.

use std::collections::HashSet;

use chrono::{DateTime, Utc};

use crate::{
    error::AppError,
    models::{
        answer::ManualGrade,
        attempt::{Attempt, AttemptReview, AttemptState, AttemptSummary},
        caller::Caller,
        quiz::QuestionKind,
    },
    services::{
        lifecycle::{attempt_questions, load_attempt, load_quiz},
        scoring,
    },
    store::AttemptStore,
};

/// Applies a grader's points to long-text questions and rewrites the aggregate.
///
/// Each value must lie in `[0, question.points]`. State and `submitted_at`
/// are left untouched. Runs under the attempt lock so it cannot interleave
/// with a concurrent finalization.
pub async fn override_grade(
    store: &dyn AttemptStore,
    caller: &Caller,
    attempt_id: i64,
    per_question_points: &[ManualGrade],
    now: DateTime<Utc>,
) -> Result<Attempt, AppError> {
    caller.ensure_teacher()?;

    if per_question_points.is_empty() {
        return Err(AppError::ValidationError("No grades supplied".to_string()));
    }

    let attempt = load_attempt(store, attempt_id).await?;
    let quiz = load_quiz(store, attempt.quiz_id).await?;

    let mut seen = HashSet::new();
    for grade in per_question_points {
        let question = quiz.question(grade.question_id).ok_or_else(|| {
            AppError::NotFound(format!(
                "Question {} not found in quiz {}",
                grade.question_id, quiz.id
            ))
        })?;
        if question.kind != QuestionKind::LongText {
            return Err(AppError::ValidationError(format!(
                "Question {} is auto-scored and cannot be graded manually",
                question.id
            )));
        }
        if !(0..=question.points).contains(&grade.points) {
            return Err(AppError::ValidationError(format!(
                "Points for question {} must be between 0 and {}",
                question.id, question.points
            )));
        }
        if !seen.insert(question.id) {
            return Err(AppError::ValidationError(format!(
                "Question {} graded more than once",
                question.id
            )));
        }
    }

    let mut locked = store.lock_attempt(attempt_id).await?;
    if locked.attempt().state != AttemptState::Submitted {
        return Err(AppError::ValidationError(format!(
            "Attempt {} must be submitted before grading",
            attempt_id
        )));
    }

    for grade in per_question_points {
        let max = quiz.question(grade.question_id).map(|q| q.points).unwrap_or(0);
        locked
            .set_manual_points(grade.question_id, grade.points, grade.points == max, now)
            .await?;
    }

    let questions = attempt_questions(&quiz, &locked.attempt().question_order);
    let answers = locked.answers().await?;
    let report = scoring::grade_attempt(&questions, &answers);

    locked.record_grades(&report.grades).await?;
    locked.set_score(report.total).await?;
    let attempt = locked.commit().await?;

    tracing::info!(
        "Teacher {} graded {} question(s) on attempt {}, score now {}",
        caller.user_id,
        per_question_points.len(),
        attempt_id,
        report.total
    );
    Ok(attempt)
}

/// Every attempt of a quiz, for the teacher roster.
pub async fn list_attempts(
    store: &dyn AttemptStore,
    caller: &Caller,
    quiz_id: i64,
) -> Result<Vec<AttemptSummary>, AppError> {
    caller.ensure_teacher()?;
    load_quiz(store, quiz_id).await?;

    let attempts = store.list_attempts(quiz_id).await?;
    Ok(attempts.iter().map(AttemptSummary::from).collect())
}

/// Attempt with answer key and stored grading data.
pub async fn review_attempt(
    store: &dyn AttemptStore,
    caller: &Caller,
    attempt_id: i64,
) -> Result<AttemptReview, AppError> {
    caller.ensure_teacher()?;

    let attempt = load_attempt(store, attempt_id).await?;
    let quiz = load_quiz(store, attempt.quiz_id).await?;
    let questions = attempt_questions(&quiz, &attempt.question_order);
    let answers = store.load_answers(attempt_id).await?;
    let max_score = questions.iter().map(|q| q.points).sum();

    Ok(AttemptReview {
        attempt,
        questions,
        answers,
        max_score,
    })
}
