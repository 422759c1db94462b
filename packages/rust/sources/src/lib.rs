//! Input sources for a generation run.
//!
//! Three collaborators feed the reconciliation engine:
//! - [`MetadataSource`]: the program metadata sheet
//! - [`ControlSetSource`]: the approved-for-production and control-transferred lists
//! - [`CodeTableSource`]: NIH activity and IC code tables
//!
//! Each has a file/HTTP implementation built from [`AppConfig`].

mod codes;
mod control;
mod http;
mod sheet;

use std::path::Path;

use async_trait::async_trait;
use collections_grants::CodeTables;
use collections_shared::{AppConfig, ControlSets, ProgramRecord, Result};

pub use codes::{CodeFileSource, read_code_column};
pub use control::{ControlListSource, ListLocation, parse_control_list};
pub use http::build_client;
pub use sheet::{SheetSource, parse_metadata_csv};

// ---------------------------------------------------------------------------
// Source traits
// ---------------------------------------------------------------------------

/// Supplies the ordered program rows. Failing here is fatal for a run.
#[async_trait]
pub trait MetadataSource: Send + Sync {
    async fn load_programs(&self) -> Result<Vec<ProgramRecord>>;
}

/// Supplies the two `fileName` sets that steer routing.
#[async_trait]
pub trait ControlSetSource: Send + Sync {
    async fn load_control_sets(&self) -> Result<ControlSets>;
}

/// Supplies the activity and IC code tables.
#[async_trait]
pub trait CodeTableSource: Send + Sync {
    async fn load_code_tables(&self) -> Result<CodeTables>;
}

// ---------------------------------------------------------------------------
// Bundle
// ---------------------------------------------------------------------------

/// The file/HTTP sources for one data directory.
#[derive(Debug, Clone)]
pub struct ConfiguredSources {
    pub metadata: SheetSource,
    pub control: ControlListSource,
    pub codes: CodeFileSource,
}

impl ConfiguredSources {
    /// Resolve every source against `data_dir` using the `[sources]` and `[api]` settings.
    pub fn from_config(config: &AppConfig, data_dir: &Path) -> Result<Self> {
        let client = build_client(std::time::Duration::from_secs(config.api.timeout_secs))?;
        let sources = &config.sources;

        Ok(Self {
            metadata: SheetSource::new(
                sources.sheet_url.clone(),
                data_dir.join(&sources.metadata_file),
                client.clone(),
            ),
            control: ControlListSource::new(
                ListLocation::new(
                    data_dir.join(&sources.approved_for_prod_file),
                    sources.approved_for_prod_url.clone(),
                ),
                ListLocation::new(
                    data_dir.join(&sources.control_transferred_file),
                    sources.control_transferred_url.clone(),
                ),
                client,
            ),
            codes: CodeFileSource::new(
                data_dir.join(&sources.activity_codes_file),
                data_dir.join(&sources.ic_codes_file),
                sources.reorder_code_tables,
            ),
        })
    }
}
