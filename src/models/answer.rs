// src/models/answer.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Represents the 'answers' table in the database.
/// At most one live row per (attempt, question).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Answer {
    pub attempt_id: i64,
    pub question_id: i64,

    /// Selected options (select kinds). Empty for text kinds.
    pub option_ids: Vec<i64>,

    /// Free text (text kinds).
    pub text: Option<String>,

    /// Populated at scoring time. `None` = ungraded.
    pub is_correct: Option<bool>,

    /// Points assigned by a human grader (long-text only).
    pub manual_points: Option<i32>,
    pub submitted_at: DateTime<Utc>,
}

/// One answer as sent by the client.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AnswerInput {
    pub question_id: i64,

    #[serde(default)]
    #[validate(length(max = 100))]
    pub option_ids: Vec<i64>,

    #[validate(length(max = 20000))]
    pub text: Option<String>,
}

/// DTO for `POST /api/attempts/save`.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SaveAnswersRequest {
    pub attempt_id: i64,

    #[validate(length(max = 500), nested)]
    pub answers: Vec<AnswerInput>,
}

/// A grader's point value for one long-text question.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManualGrade {
    pub question_id: i64,
    pub points: i32,
}

/// DTO for `POST /api/teacher/attempts/grade`.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct OverrideGradeRequest {
    pub attempt_id: i64,

    #[validate(length(min = 1, max = 500))]
    pub per_question_points: Vec<ManualGrade>,
}
