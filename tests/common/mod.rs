#![allow(dead_code)]

use attempt_engine::{
    models::{
        answer::AnswerInput,
        quiz::{Question, QuestionKind, QuestionOption, Quiz},
    },
    store::MemoryStore,
};
use chrono::{DateTime, TimeDelta, Utc};

pub fn option(id: i64, question_id: i64, is_correct: bool) -> QuestionOption {
    QuestionOption {
        id,
        question_id,
        label: format!("Option {}", id),
        is_correct,
    }
}

fn question(id: i64, kind: QuestionKind, points: i32) -> Question {
    Question {
        id,
        quiz_id: 0,
        kind,
        prompt: format!("Question {}", id),
        points,
        correct_text: None,
        options: vec![],
    }
}

pub fn single_select(id: i64, correct: i64, wrong: &[i64]) -> Question {
    let mut q = question(id, QuestionKind::SingleSelect, 1);
    q.options.push(option(correct, id, true));
    q.options.extend(wrong.iter().map(|o| option(*o, id, false)));
    q
}

pub fn multi_select(id: i64, correct: &[i64], wrong: &[i64]) -> Question {
    let mut q = question(id, QuestionKind::MultiSelect, 1);
    q.options.extend(correct.iter().map(|o| option(*o, id, true)));
    q.options.extend(wrong.iter().map(|o| option(*o, id, false)));
    q
}

pub fn short_text(id: i64, key: &str) -> Question {
    let mut q = question(id, QuestionKind::ShortText, 1);
    q.correct_text = Some(key.to_string());
    q
}

pub fn long_text(id: i64, points: i32) -> Question {
    question(id, QuestionKind::LongText, points)
}

pub fn quiz(
    id: i64,
    start_time: Option<DateTime<Utc>>,
    duration_minutes: i32,
    questions: Vec<Question>,
) -> Quiz {
    Quiz {
        id,
        title: format!("Quiz {}", id),
        start_time,
        duration_minutes,
        questions: questions
            .into_iter()
            .map(|q| Question { quiz_id: id, ..q })
            .collect(),
    }
}

/// Opened ten minutes before `now`, closes fifty minutes after it.
pub fn open_quiz(id: i64, now: DateTime<Utc>, questions: Vec<Question>) -> Quiz {
    quiz(id, Some(now - TimeDelta::minutes(10)), 60, questions)
}

/// Single-select 101/102, multi-select 103, short-text 104, long-text 105 (5 pts).
pub fn mixed_questions() -> Vec<Question> {
    vec![
        single_select(101, 1011, &[1012, 1013]),
        single_select(102, 1021, &[1022]),
        multi_select(103, &[1031, 1033], &[1032]),
        short_text(104, "Paris"),
        long_text(105, 5),
    ]
}

pub fn store_with(quizzes: Vec<Quiz>) -> MemoryStore {
    let store = MemoryStore::new();
    for q in quizzes {
        store.insert_quiz(q).expect("insert quiz");
    }
    store
}

pub fn pick(question_id: i64, option_ids: &[i64]) -> AnswerInput {
    AnswerInput {
        question_id,
        option_ids: option_ids.to_vec(),
        text: None,
    }
}

pub fn write(question_id: i64, text: &str) -> AnswerInput {
    AnswerInput {
        question_id,
        option_ids: vec![],
        text: Some(text.to_string()),
    }
}
