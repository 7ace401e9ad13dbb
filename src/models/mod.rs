// src/models/mod.rs

pub mod answer;
pub mod attempt;
pub mod caller;
pub mod quiz;
