// src/store/postgres.rs

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder, Transaction};

use crate::{
    error::AppError,
    models::{
        answer::{Answer, AnswerInput},
        attempt::{Attempt, AttemptState, SubmissionCause},
        quiz::{Question, QuestionKind, QuestionOption, Quiz},
    },
    services::scoring::QuestionGrade,
};

use super::{AttemptStore, LockedAttempt};

const ATTEMPT_COLUMNS: &str = "id, quiz_id, student_id, question_order, state, started_at, \
     submitted_at, submission_cause, score, focus_loss_count, extra_minutes";

const ANSWER_COLUMNS: &str =
    "attempt_id, question_id, option_ids, text_answer, is_correct, manual_points, submitted_at";

/// Row of the 'attempts' table before enum decoding.
#[derive(sqlx::FromRow)]
struct AttemptRow {
    id: i64,
    quiz_id: i64,
    student_id: i64,
    question_order: Vec<i64>,
    state: String,
    started_at: DateTime<Utc>,
    submitted_at: Option<DateTime<Utc>>,
    submission_cause: Option<String>,
    score: Option<i32>,
    focus_loss_count: i32,
    extra_minutes: i32,
}

impl TryFrom<AttemptRow> for Attempt {
    type Error = AppError;

    fn try_from(row: AttemptRow) -> Result<Self, Self::Error> {
        let state = row
            .state
            .parse::<AttemptState>()
            .map_err(AppError::TransientStoreError)?;
        let submission_cause = row
            .submission_cause
            .map(|c| c.parse::<SubmissionCause>())
            .transpose()
            .map_err(AppError::TransientStoreError)?;

        Ok(Attempt {
            id: row.id,
            quiz_id: row.quiz_id,
            student_id: row.student_id,
            question_order: row.question_order,
            state,
            started_at: row.started_at,
            submitted_at: row.submitted_at,
            submission_cause,
            score: row.score,
            focus_loss_count: row.focus_loss_count,
            extra_minutes: row.extra_minutes,
        })
    }
}

#[derive(sqlx::FromRow)]
struct QuizRow {
    id: i64,
    title: String,
    start_time: Option<DateTime<Utc>>,
    duration_minutes: i32,
}

#[derive(sqlx::FromRow)]
struct QuestionRow {
    id: i64,
    quiz_id: i64,
    kind: String,
    prompt: String,
    points: i32,
    correct_text: Option<String>,
}

#[derive(sqlx::FromRow)]
struct AnswerRow {
    attempt_id: i64,
    question_id: i64,
    option_ids: Vec<i64>,
    text_answer: Option<String>,
    is_correct: Option<bool>,
    manual_points: Option<i32>,
    submitted_at: DateTime<Utc>,
}

impl From<AnswerRow> for Answer {
    fn from(row: AnswerRow) -> Self {
        Answer {
            attempt_id: row.attempt_id,
            question_id: row.question_id,
            option_ids: row.option_ids,
            text: row.text_answer,
            is_correct: row.is_correct,
            manual_points: row.manual_points,
            submitted_at: row.submitted_at,
        }
    }
}

/// PostgreSQL-backed store. The attempt lock is `SELECT … FOR UPDATE`.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

async fn fetch_answers(conn: &mut PgConnection, attempt_id: i64) -> Result<Vec<Answer>, AppError> {
    let rows = sqlx::query_as::<_, AnswerRow>(&format!(
        "SELECT {} FROM answers WHERE attempt_id = $1 ORDER BY question_id",
        ANSWER_COLUMNS
    ))
    .bind(attempt_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows.into_iter().map(Answer::from).collect())
}

/// Delete-then-insert of the attempt's answer set on an open transaction.
async fn write_answers(
    conn: &mut PgConnection,
    attempt_id: i64,
    answers: &[AnswerInput],
    now: DateTime<Utc>,
) -> Result<(), AppError> {
    sqlx::query("DELETE FROM answers WHERE attempt_id = $1")
        .bind(attempt_id)
        .execute(&mut *conn)
        .await?;

    if answers.is_empty() {
        return Ok(());
    }

    let mut query_builder = QueryBuilder::<Postgres>::new(
        "INSERT INTO answers (attempt_id, question_id, option_ids, text_answer, submitted_at) ",
    );
    query_builder.push_values(answers.iter(), |mut row, answer| {
        row.push_bind(attempt_id)
            .push_bind(answer.question_id)
            .push_bind(answer.option_ids.clone())
            .push_bind(answer.text.clone())
            .push_bind(now);
    });

    query_builder.build().execute(&mut *conn).await?;
    Ok(())
}

#[async_trait]
impl AttemptStore for PgStore {
    async fn load_quiz(&self, quiz_id: i64) -> Result<Option<Quiz>, AppError> {
        let quiz = sqlx::query_as::<_, QuizRow>(
            "SELECT id, title, start_time, duration_minutes FROM quizzes WHERE id = $1",
        )
        .bind(quiz_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(quiz) = quiz else {
            return Ok(None);
        };

        let question_rows = sqlx::query_as::<_, QuestionRow>(
            r#"
            SELECT id, quiz_id, kind, prompt, points, correct_text
            FROM questions
            WHERE quiz_id = $1
            ORDER BY position, id
            "#,
        )
        .bind(quiz_id)
        .fetch_all(&self.pool)
        .await?;

        let option_rows = sqlx::query_as::<_, QuestionOption>(
            r#"
            SELECT o.id, o.question_id, o.label, o.is_correct
            FROM question_options o
            JOIN questions q ON q.id = o.question_id
            WHERE q.quiz_id = $1
            ORDER BY o.position, o.id
            "#,
        )
        .bind(quiz_id)
        .fetch_all(&self.pool)
        .await?;

        let mut options_by_question: HashMap<i64, Vec<QuestionOption>> = HashMap::new();
        for option in option_rows {
            options_by_question
                .entry(option.question_id)
                .or_default()
                .push(option);
        }

        let questions = question_rows
            .into_iter()
            .map(|row| {
                let kind = row
                    .kind
                    .parse::<QuestionKind>()
                    .map_err(AppError::TransientStoreError)?;
                Ok(Question {
                    id: row.id,
                    quiz_id: row.quiz_id,
                    kind,
                    prompt: row.prompt,
                    points: row.points,
                    correct_text: row.correct_text,
                    options: options_by_question.remove(&row.id).unwrap_or_default(),
                })
            })
            .collect::<Result<Vec<_>, AppError>>()?;

        Ok(Some(Quiz {
            id: quiz.id,
            title: quiz.title,
            start_time: quiz.start_time,
            duration_minutes: quiz.duration_minutes,
            questions,
        }))
    }

    async fn get_attempt(&self, attempt_id: i64) -> Result<Option<Attempt>, AppError> {
        sqlx::query_as::<_, AttemptRow>(&format!(
            "SELECT {} FROM attempts WHERE id = $1",
            ATTEMPT_COLUMNS
        ))
        .bind(attempt_id)
        .fetch_optional(&self.pool)
        .await?
        .map(Attempt::try_from)
        .transpose()
    }

    async fn find_attempt(
        &self,
        student_id: i64,
        quiz_id: i64,
    ) -> Result<Option<Attempt>, AppError> {
        sqlx::query_as::<_, AttemptRow>(&format!(
            "SELECT {} FROM attempts WHERE student_id = $1 AND quiz_id = $2",
            ATTEMPT_COLUMNS
        ))
        .bind(student_id)
        .bind(quiz_id)
        .fetch_optional(&self.pool)
        .await?
        .map(Attempt::try_from)
        .transpose()
    }

    async fn find_or_create_attempt(
        &self,
        student_id: i64,
        quiz_id: i64,
        now: DateTime<Utc>,
    ) -> Result<Attempt, AppError> {
        // The unique (student_id, quiz_id) key makes concurrent creators converge.
        sqlx::query(
            r#"
            INSERT INTO attempts (quiz_id, student_id, state, started_at)
            VALUES ($1, $2, 'in_progress', $3)
            ON CONFLICT (student_id, quiz_id) DO NOTHING
            "#,
        )
        .bind(quiz_id)
        .bind(student_id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        self.find_attempt(student_id, quiz_id).await?.ok_or_else(|| {
            AppError::TransientStoreError(format!(
                "attempt for student {} quiz {} vanished after insert",
                student_id, quiz_id
            ))
        })
    }

    async fn set_question_order_if_empty(
        &self,
        attempt_id: i64,
        order: &[i64],
    ) -> Result<Vec<i64>, AppError> {
        let stored: Option<Vec<i64>> = sqlx::query_scalar(
            r#"
            UPDATE attempts SET question_order = $2
            WHERE id = $1 AND cardinality(question_order) = 0
            RETURNING question_order
            "#,
        )
        .bind(attempt_id)
        .bind(order.to_vec())
        .fetch_optional(&self.pool)
        .await?;

        if let Some(order) = stored {
            return Ok(order);
        }

        sqlx::query_scalar("SELECT question_order FROM attempts WHERE id = $1")
            .bind(attempt_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Attempt {} not found", attempt_id)))
    }

    async fn list_attempts(&self, quiz_id: i64) -> Result<Vec<Attempt>, AppError> {
        sqlx::query_as::<_, AttemptRow>(&format!(
            "SELECT {} FROM attempts WHERE quiz_id = $1 ORDER BY id",
            ATTEMPT_COLUMNS
        ))
        .bind(quiz_id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(Attempt::try_from)
        .collect()
    }

    async fn load_answers(&self, attempt_id: i64) -> Result<Vec<Answer>, AppError> {
        let mut conn = self.pool.acquire().await?;
        fetch_answers(&mut conn, attempt_id).await
    }

    async fn replace_answers(
        &self,
        attempt_id: i64,
        answers: &[AnswerInput],
        now: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;
        write_answers(&mut tx, attempt_id, answers, now).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn increment_focus_loss(&self, attempt_id: i64) -> Result<Option<i32>, AppError> {
        let count = sqlx::query_scalar(
            r#"
            UPDATE attempts SET focus_loss_count = focus_loss_count + 1
            WHERE id = $1 AND state = 'in_progress'
            RETURNING focus_loss_count
            "#,
        )
        .bind(attempt_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(count)
    }

    async fn lock_attempt(&self, attempt_id: i64) -> Result<Box<dyn LockedAttempt>, AppError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, AttemptRow>(&format!(
            "SELECT {} FROM attempts WHERE id = $1 FOR UPDATE",
            ATTEMPT_COLUMNS
        ))
        .bind(attempt_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Attempt {} not found", attempt_id)))?;

        Ok(Box::new(PgLockedAttempt {
            tx,
            attempt: Attempt::try_from(row)?,
        }))
    }
}

/// Open transaction holding the attempt row lock.
pub struct PgLockedAttempt {
    tx: Transaction<'static, Postgres>,
    attempt: Attempt,
}

#[async_trait]
impl LockedAttempt for PgLockedAttempt {
    fn attempt(&self) -> &Attempt {
        &self.attempt
    }

    async fn answers(&mut self) -> Result<Vec<Answer>, AppError> {
        fetch_answers(&mut self.tx, self.attempt.id).await
    }

    async fn replace_answers(
        &mut self,
        answers: &[AnswerInput],
        now: DateTime<Utc>,
    ) -> Result<(), AppError> {
        write_answers(&mut self.tx, self.attempt.id, answers, now).await
    }

    async fn record_grades(&mut self, grades: &[QuestionGrade]) -> Result<(), AppError> {
        for grade in grades.iter().filter(|g| g.answered) {
            sqlx::query(
                "UPDATE answers SET is_correct = $3 WHERE attempt_id = $1 AND question_id = $2",
            )
            .bind(self.attempt.id)
            .bind(grade.question_id)
            .bind(grade.is_correct)
            .execute(&mut *self.tx)
            .await?;
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
        sqlx::query(
            r#"
            INSERT INTO answers (attempt_id, question_id, text_answer, manual_points, is_correct, submitted_at)
            VALUES ($1, $2, '', $3, $4, $5)
            ON CONFLICT (attempt_id, question_id) DO UPDATE SET
                manual_points = EXCLUDED.manual_points,
                is_correct = EXCLUDED.is_correct
            "#,
        )
        .bind(self.attempt.id)
        .bind(question_id)
        .bind(points)
        .bind(is_correct)
        .bind(now)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn finalize(
        &mut self,
        score: i32,
        cause: SubmissionCause,
        now: DateTime<Utc>,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE attempts
            SET state = 'submitted', score = $2, submitted_at = $3, submission_cause = $4
            WHERE id = $1
            "#,
        )
        .bind(self.attempt.id)
        .bind(score)
        .bind(now)
        .bind(cause.as_str())
        .execute(&mut *self.tx)
        .await?;

        self.attempt.state = AttemptState::Submitted;
        self.attempt.score = Some(score);
        self.attempt.submitted_at = Some(now);
        self.attempt.submission_cause = Some(cause);
        Ok(())
    }

    async fn reopen(&mut self, extra_minutes: i32) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE attempts
            SET state = 'in_progress', submitted_at = NULL,
                submission_cause = 'teacher_reopened', extra_minutes = $2
            WHERE id = $1
            "#,
        )
        .bind(self.attempt.id)
        .bind(extra_minutes)
        .execute(&mut *self.tx)
        .await?;

        self.attempt.state = AttemptState::InProgress;
        self.attempt.submitted_at = None;
        self.attempt.submission_cause = Some(SubmissionCause::TeacherReopened);
        self.attempt.extra_minutes = extra_minutes;
        Ok(())
    }

    async fn set_score(&mut self, score: i32) -> Result<(), AppError> {
        sqlx::query("UPDATE attempts SET score = $2 WHERE id = $1")
            .bind(self.attempt.id)
            .bind(score)
            .execute(&mut *self.tx)
            .await?;

        self.attempt.score = Some(score);
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<Attempt, AppError> {
        let PgLockedAttempt { tx, attempt } = *self;
        tx.commit().await?;
        Ok(attempt)
    }
}
