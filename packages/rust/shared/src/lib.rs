//! Shared types, error model, and configuration for docketrace.
//!
//! This crate is the foundation depended on by all other docketrace crates.
//! It provides:
//! - [`DocketError`]: the unified error type
//! - Domain types ([`Case`], [`Defendant`], [`SkipTraceRecord`], [`Environment`], [`ScrapeJob`])
//! - Configuration ([`AppConfig`] and its sections, config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, DefaultsConfig, LookupConfig, RegionsConfig, SchedulerConfig, SearchConfig,
    config_dir, config_file_path, init_config, load_config, load_config_from,
};
pub use error::{DocketError, Result};
pub use types::{
    Case, CostLedgerEntry, Defendant, Environment, JobId, JobStatus, PRODUCTION_COST_PER_LOOKUP,
    PhoneType, Region, ScrapeJob, SkipTraceRecord,
};
