// src/services/randomization.rs

//! Question and option ordering.
//!
//! Question order is drawn once per attempt and persisted by the caller.
//! Option order is re-shuffled on every read and never persisted, so two
//! loads of the same attempt can show options in different positions.
//! Options keep their ids, so grading is unaffected.

use std::collections::HashMap;

use rand::{Rng, seq::SliceRandom};

use crate::models::quiz::{PublicQuestion, Question};

/// A fresh uniformly random permutation of the quiz's question ids.
pub fn new_order(questions: &[Question]) -> Vec<i64> {
    new_order_with(questions, &mut rand::rng())
}

pub fn new_order_with<R: Rng + ?Sized>(questions: &[Question], rng: &mut R) -> Vec<i64> {
    let mut ids: Vec<i64> = questions.iter().map(|q| q.id).collect();
    ids.shuffle(rng);
    ids
}

/// Questions arranged to match a persisted order.
///
/// Ids in `order` that no longer exist in the quiz are dropped. Questions
/// missing from `order` are not appended.
pub fn apply_order<'a>(questions: &'a [Question], order: &[i64]) -> Vec<&'a Question> {
    let by_id: HashMap<i64, &Question> = questions.iter().map(|q| (q.id, q)).collect();
    order.iter().filter_map(|id| by_id.get(id).copied()).collect()
}

/// Student-facing questions with each question's options shuffled.
pub fn present(questions: &[&Question]) -> Vec<PublicQuestion> {
    present_with(questions, &mut rand::rng())
}

pub fn present_with<R: Rng + ?Sized>(questions: &[&Question], rng: &mut R) -> Vec<PublicQuestion> {
    questions
        .iter()
        .map(|q| {
            let mut public = PublicQuestion::from(*q);
            public.options.shuffle(rng);
            public
        })
        .collect()
}
