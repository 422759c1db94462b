//! Shared types, error model, and configuration for the program collections tools.
//!
//! This crate is the foundation depended on by all other collections crates.
//! It provides:
//! - [`CollectionsError`]: the unified error type
//! - Domain types ([`ProgramRecord`], [`ControlSets`], [`Environment`], [`BuildInfo`], [`RunId`])
//! - Configuration ([`AppConfig`], [`SearchConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    ApiConfig, AppConfig, HistoryConfig, MonitorConfig, PathsConfig, SearchConfig, SourcesConfig,
    config_dir, config_file_path, init_config, load_config, load_config_from,
    locate_corrections_dir,
};
pub use error::{CollectionsError, Result};
pub use types::{
    BuildInfo, ControlSets, Environment, EnvironmentFilter, NOT_FOUND, ProgramRecord,
    RESOURCE_URL_PREFIX, RecordId, RunId,
};
