//! Shared types, error model, and configuration for the monthly report.
//!
//! This crate is the foundation depended on by all other recruitreport crates.
//! It provides:
//! - [`ReportError`], the unified error type
//! - Domain types ([`Table`], [`Row`], [`TableKind`], [`SourceData`], [`RunId`])
//! - Configuration ([`AppConfig`] and its sections, config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, ConfluenceConfig, GeminiConfig, ReportConfig, SheetNames, SheetsConfig,
    SlackConfig, config_dir, config_file_path, init_config, load_config, load_config_from,
};
pub use error::{ReportError, Result};
pub use types::{Row, RunId, SourceData, Table, TableKind};
