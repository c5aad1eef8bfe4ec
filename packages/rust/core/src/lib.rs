//! Core pipeline orchestration and domain logic for lessongen.
//!
//! This crate ties together the record store, the completion-service
//! generator, and progress reporting into the end-to-end batch run
//! (`run_batch`) and the single-skill flow (`generate_one`).

pub mod generator;
pub mod idempotence;
pub mod pacing;
pub mod pipeline;
pub mod report;
