// src/models/quiz.rs

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// The four question kinds the scoring engine understands.
/// Stored as snake_case text in the `questions.kind` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionKind {
    SingleSelect,
    MultiSelect,
    ShortText,
    LongText,
}

impl QuestionKind {
    /// Select kinds carry options; text kinds carry free text.
    pub fn is_select(&self) -> bool {
        matches!(self, QuestionKind::SingleSelect | QuestionKind::MultiSelect)
    }
}

impl FromStr for QuestionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "single_select" => Ok(QuestionKind::SingleSelect),
            "multi_select" => Ok(QuestionKind::MultiSelect),
            "short_text" => Ok(QuestionKind::ShortText),
            "long_text" => Ok(QuestionKind::LongText),
            other => Err(format!("unknown question kind '{}'", other)),
        }
    }
}

/// Represents the 'question_options' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionOption {
    pub id: i64,
    pub question_id: i64,
    pub label: String,
    pub is_correct: bool,
}

/// A question together with its options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: i64,
    pub quiz_id: i64,
    pub kind: QuestionKind,
    pub prompt: String,

    /// Points awarded for a correct answer. Always positive.
    pub points: i32,

    /// Canonical answer for short-text questions.
    pub correct_text: Option<String>,

    /// Empty for text kinds.
    pub options: Vec<QuestionOption>,
}

impl Question {
    pub fn has_option(&self, option_id: i64) -> bool {
        self.options.iter().any(|o| o.id == option_id)
    }
}

/// The read model of a quiz: schedule plus its questions in authoring order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quiz {
    pub id: i64,
    pub title: String,

    /// `None` means the quiz is not yet scheduled.
    pub start_time: Option<DateTime<Utc>>,
    pub duration_minutes: i32,
    pub questions: Vec<Question>,
}

impl Quiz {
    pub fn question(&self, question_id: i64) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == question_id)
    }
}

/// DTO for an option sent to the student (no correctness flag).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicOption {
    pub id: i64,
    pub label: String,
}

/// DTO for a question sent to the student (no answer key).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicQuestion {
    pub id: i64,
    pub kind: QuestionKind,
    pub prompt: String,
    pub points: i32,
    pub options: Vec<PublicOption>,
}

impl From<&Question> for PublicQuestion {
    fn from(q: &Question) -> Self {
        Self {
            id: q.id,
            kind: q.kind,
            prompt: q.prompt.clone(),
            points: q.points,
            options: q
                .options
                .iter()
                .map(|o| PublicOption {
                    id: o.id,
                    label: o.label.clone(),
                })
                .collect(),
        }
    }
}
