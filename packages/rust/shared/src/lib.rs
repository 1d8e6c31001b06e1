//! Shared types, error model, and configuration for arxivsummary.
//!
//! This crate is the foundation depended on by all other arxivsummary crates.
//! It provides:
//! - [`ArxivSummaryError`]: the unified error type
//! - Domain types ([`Record`], [`Cursor`], [`Batch`], [`SummaryUnit`])
//! - Configuration ([`AppConfig`], [`SearchConfig`], [`GeneratorConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, GeneratorConfig, GeneratorSection, OutputConfig, OutputSection, QueryScope,
    SearchConfig, SearchSection, config_dir, config_file_path, init_config,
    load_config, load_config_from, resolve_api_key,
};
pub use error::{ArxivSummaryError, Result};
pub use types::{Batch, Cursor, Record, RecordId, SummaryUnit};
