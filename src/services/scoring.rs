// src/services/scoring.rs

//! Pure scoring over a quiz's questions and an attempt's answers.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::models::{
    answer::Answer,
    quiz::{Question, QuestionKind},
};

/// Outcome for one question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionGrade {
    pub question_id: i64,

    /// `None` while a long-text answer awaits a human grader.
    pub is_correct: Option<bool>,
    pub points_awarded: i32,

    /// Whether an answer row exists for this question.
    pub answered: bool,
}

/// Per-question grades plus their sum.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GradeReport {
    pub grades: Vec<QuestionGrade>,
    pub total: i32,
}

/// Case-folded, whitespace-trimmed form used for short-text comparison.
pub fn normalize_text(s: &str) -> String {
    s.trim().to_lowercase()
}

/// Single-select: exactly one option chosen and it is the unique correct one.
fn single_select_correct(question: &Question, selected: &[i64]) -> bool {
    let mut correct = question.options.iter().filter(|o| o.is_correct);
    let (Some(key), None) = (correct.next(), correct.next()) else {
        return false;
    };
    matches!(selected, [only] if *only == key.id)
}

/// Multi-select: selected set equals the correct set, order and duplicates ignored.
fn multi_select_correct(question: &Question, selected: &[i64]) -> bool {
    if selected.is_empty() {
        return false;
    }
    let chosen: HashSet<i64> = selected.iter().copied().collect();
    let key: HashSet<i64> = question
        .options
        .iter()
        .filter(|o| o.is_correct)
        .map(|o| o.id)
        .collect();
    chosen == key
}

fn short_text_correct(question: &Question, text: Option<&str>) -> bool {
    match (question.correct_text.as_deref(), text) {
        (Some(key), Some(given)) => normalize_text(key) == normalize_text(given),
        _ => false,
    }
}

/// Grades a single question. A missing answer to an auto-scored kind scores
/// zero, never an error.
///
/// Long-text questions are never auto-scored: they carry whatever a grader
/// recorded, and are worth full points until graded, answered or not.
pub fn grade_question(question: &Question, answer: Option<&Answer>) -> QuestionGrade {
    let answered = answer.is_some();
    let selected = answer.map(|a| a.option_ids.as_slice()).unwrap_or(&[]);
    let text = answer.and_then(|a| a.text.as_deref());

    let (is_correct, points_awarded) = match question.kind {
        QuestionKind::SingleSelect => {
            let ok = single_select_correct(question, selected);
            (Some(ok), if ok { question.points } else { 0 })
        }
        QuestionKind::MultiSelect => {
            let ok = multi_select_correct(question, selected);
            (Some(ok), if ok { question.points } else { 0 })
        }
        QuestionKind::ShortText => {
            let ok = short_text_correct(question, text);
            (Some(ok), if ok { question.points } else { 0 })
        }
        QuestionKind::LongText => match answer.and_then(|a| a.manual_points) {
            Some(points) => {
                let points = points.clamp(0, question.points);
                (Some(points == question.points), points)
            }
            None => (None, question.points),
        },
    };

    QuestionGrade {
        question_id: question.id,
        is_correct,
        points_awarded,
        answered,
    }
}

/// Grades every question of the quiz against the attempt's answers.
///
/// Answers to questions outside `questions` are ignored. Idempotent: the same
/// inputs always produce the same report.
pub fn grade_attempt(questions: &[Question], answers: &[Answer]) -> GradeReport {
    let by_question: HashMap<i64, &Answer> =
        answers.iter().map(|a| (a.question_id, a)).collect();

    let grades: Vec<QuestionGrade> = questions
        .iter()
        .map(|q| grade_question(q, by_question.get(&q.id).copied()))
        .collect();
    let total = grades.iter().map(|g| g.points_awarded).sum();

    GradeReport { grades, total }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::quiz::QuestionOption;
    use chrono::Utc;

    fn option(id: i64, question_id: i64, is_correct: bool) -> QuestionOption {
        QuestionOption {
            id,
            question_id,
            label: format!("Option {}", id),
            is_correct,
        }
    }

    fn select(id: i64, kind: QuestionKind, correct: &[i64], all: &[i64]) -> Question {
        Question {
            id,
            quiz_id: 1,
            kind,
            prompt: format!("Question {}", id),
            points: 1,
            correct_text: None,
            options: all
                .iter()
                .map(|o| option(*o, id, correct.contains(o)))
                .collect(),
        }
    }

    fn text_question(id: i64, kind: QuestionKind, key: Option<&str>, points: i32) -> Question {
        Question {
            id,
            quiz_id: 1,
            kind,
            prompt: format!("Question {}", id),
            points,
            correct_text: key.map(str::to_string),
            options: vec![],
        }
    }

    fn picked(question_id: i64, option_ids: &[i64]) -> Answer {
        Answer {
            attempt_id: 1,
            question_id,
            option_ids: option_ids.to_vec(),
            text: None,
            is_correct: None,
            manual_points: None,
            submitted_at: Utc::now(),
        }
    }

    fn written(question_id: i64, text: &str) -> Answer {
        Answer {
            text: Some(text.to_string()),
            ..picked(question_id, &[])
        }
    }

    #[test]
    fn test_single_select_correct_option() {
        let q = select(1, QuestionKind::SingleSelect, &[11], &[10, 11, 12]);
        let g = grade_question(&q, Some(&picked(1, &[11])));
        assert_eq!(g.is_correct, Some(true));
        assert_eq!(g.points_awarded, 1);
    }

    #[test]
    fn test_single_select_rejects_extra_selection() {
        let q = select(1, QuestionKind::SingleSelect, &[11], &[10, 11, 12]);
        let g = grade_question(&q, Some(&picked(1, &[11, 12])));
        assert_eq!(g.is_correct, Some(false));
        assert_eq!(g.points_awarded, 0);
    }

    #[test]
    fn test_single_select_missing_answer_scores_zero() {
        let q = select(1, QuestionKind::SingleSelect, &[11], &[10, 11]);
        let g = grade_question(&q, None);
        assert_eq!(g.points_awarded, 0);
        assert!(!g.answered);

        let g = grade_question(&q, Some(&picked(1, &[])));
        assert_eq!(g.points_awarded, 0);
    }

    #[test]
    fn test_multi_select_uses_set_equality() {
        // Correct options {A, C} = {21, 23}
        let q = select(2, QuestionKind::MultiSelect, &[21, 23], &[21, 22, 23]);

        assert_eq!(grade_question(&q, Some(&picked(2, &[23, 21]))).points_awarded, 1);
        assert_eq!(grade_question(&q, Some(&picked(2, &[21, 22, 23]))).points_awarded, 0);
        assert_eq!(grade_question(&q, Some(&picked(2, &[21]))).points_awarded, 0);
        assert_eq!(grade_question(&q, Some(&picked(2, &[]))).points_awarded, 0);
    }

    #[test]
    fn test_short_text_normalizes_case_and_whitespace() {
        let q = text_question(3, QuestionKind::ShortText, Some("Paris"), 2);
        let g = grade_question(&q, Some(&written(3, " paris ")));
        assert_eq!(g.is_correct, Some(true));
        assert_eq!(g.points_awarded, 2);

        let g = grade_question(&q, Some(&written(3, "Pariss")));
        assert_eq!(g.is_correct, Some(false));
    }

    #[test]
    fn test_long_text_defaults_to_full_points_until_graded() {
        let q = text_question(4, QuestionKind::LongText, None, 5);

        let g = grade_question(&q, Some(&written(4, "An essay")));
        assert_eq!(g.is_correct, None);
        assert_eq!(g.points_awarded, 5);

        let mut graded = written(4, "An essay");
        graded.manual_points = Some(3);
        let g = grade_question(&q, Some(&graded));
        assert_eq!(g.is_correct, Some(false));
        assert_eq!(g.points_awarded, 3);

        let g = grade_question(&q, Some(&written(4, "   ")));
        assert_eq!(g.is_correct, None);
        assert_eq!(g.points_awarded, 5);

        let g = grade_question(&q, None);
        assert_eq!(g.is_correct, None);
        assert_eq!(g.points_awarded, 5);
        assert!(!g.answered);
    }

    #[test]
    fn test_grade_attempt_sums_and_is_idempotent() {
        let questions = vec![
            select(1, QuestionKind::SingleSelect, &[11], &[10, 11]),
            select(2, QuestionKind::SingleSelect, &[21], &[20, 21]),
        ];
        let answers = vec![picked(1, &[11]), picked(99, &[1])];

        let first = grade_attempt(&questions, &answers);
        let second = grade_attempt(&questions, &answers);
        assert_eq!(first.total, 1);
        assert_eq!(first, second);
        assert_eq!(first.grades.len(), 2);
    }
}
