//! sqamark-core: exam contract, marking engine, and grade resolution.
//!
//! This crate defines the exam and submission data model, validates both
//! against the exam contract, and turns a submission into an
//! `EvaluationResult` by delegating per-bullet judgments to a `BulletJudge`
//! and aggregating everything else deterministically.

pub mod contract;
pub mod engine;
pub mod error;
pub mod grading;
pub mod mastery;
pub mod matching;
pub mod model;
pub mod parser;
pub mod report;
pub mod results;
pub mod statistics;
pub mod submission;
pub mod traits;

#[cfg(test)]
mod test_support;
