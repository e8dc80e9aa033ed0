//! Shared types, error model, and configuration for researchflow.
//!
//! This crate is the foundation depended on by all other researchflow crates.
//! It provides:
//! - [`ResearchError`]: the unified error type
//! - Domain types ([`Topic`], [`ArticleRecord`], [`SummaryRecord`], [`PersistReceipt`])
//! - Configuration ([`AppConfig`], [`Credentials`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, CompletionConfig, Credentials, DefaultsConfig, SearchConfig, config_dir,
    config_file_path, init_config, load_config, load_config_from, validate_config,
};
pub use error::{ResearchError, Result};
pub use types::{ArticleRecord, PersistReceipt, SummaryRecord, Topic};
