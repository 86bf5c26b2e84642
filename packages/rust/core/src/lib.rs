//! Core domain logic and pipeline orchestration for the monthly report.
//!
//! This crate ties the source reader, analyzer, narrative generator,
//! publisher and notifier into one linear run (`run_and_report_failure`).

pub mod analyzer;
pub mod narrative;
pub mod pipeline;
pub mod stages;
