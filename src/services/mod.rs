// src/services/mod.rs

pub mod deadline;
pub mod grading;
pub mod lifecycle;
pub mod monitoring;
pub mod randomization;
pub mod scoring;
