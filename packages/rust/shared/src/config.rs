//! Application configuration for the program collections tools.
//!
//! User config lives at `~/.program-collections/collections.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{CollectionsError, Result};
use crate::types::Environment;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "collections.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".program-collections";

/// Directory name of the corrections repository checkout.
const CORRECTIONS_REPO_NAME: &str = "nde-metadata-corrections";

/// Last-resort corrections directory when no checkout is found.
const FALLBACK_CORRECTIONS_DIR: &str = "/tmp/nde-metadata-corrections";

// ---------------------------------------------------------------------------
// Config structs (matching collections.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Local directories.
    #[serde(default)]
    pub paths: PathsConfig,

    /// Catalog API endpoints.
    #[serde(default)]
    pub api: ApiConfig,

    /// Metadata sheet, control lists, and code tables.
    #[serde(default)]
    pub sources: SourcesConfig,

    /// Where previously emitted corrections are read from.
    #[serde(default)]
    pub history: HistoryConfig,

    /// Build monitor settings.
    #[serde(default)]
    pub monitor: MonitorConfig,
}

/// `[paths]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Directory holding control lists, code tables, and the local sheet copy.
    /// Relative paths resolve against the base path.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Checkout of the corrections repository. Located automatically when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub corrections_dir: Option<PathBuf>,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            corrections_dir: None,
        }
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

/// `[api]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Staging API base URL (ends in `/v1`).
    #[serde(default = "default_staging_url")]
    pub staging_url: Url,

    /// Production API base URL (ends in `/v1`).
    #[serde(default = "default_production_url")]
    pub production_url: Url,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Maximum hits requested per query.
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            staging_url: default_staging_url(),
            production_url: default_production_url(),
            timeout_secs: default_timeout_secs(),
            page_size: default_page_size(),
        }
    }
}

fn default_staging_url() -> Url {
    Url::parse("https://api-staging.data.niaid.nih.gov/v1").expect("valid default URL")
}
fn default_production_url() -> Url {
    Url::parse("https://api.data.niaid.nih.gov/v1").expect("valid default URL")
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_page_size() -> u32 {
    500
}

/// `[sources]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcesConfig {
    /// CSV export URL of the program metadata sheet. `""` disables the download.
    #[serde(default = "default_sheet_url", with = "optional_url")]
    pub sheet_url: Option<Url>,

    /// Local copy of the metadata sheet, used when the download fails.
    #[serde(default = "default_metadata_file")]
    pub metadata_file: String,

    /// Programs approved for production, one `fileName` per line.
    #[serde(default = "default_approved_file")]
    pub approved_for_prod_file: String,

    /// Remote copy of the approved list.
    #[serde(default = "default_approved_url", with = "optional_url")]
    pub approved_for_prod_url: Option<Url>,

    /// Programs whose control was transferred, one `fileName` per line.
    #[serde(default = "default_transferred_file")]
    pub control_transferred_file: String,

    /// Remote copy of the control-transferred list.
    #[serde(default = "default_transferred_url", with = "optional_url")]
    pub control_transferred_url: Option<Url>,

    /// NIH activity codes (CSV, `Activity Code` column).
    #[serde(default = "default_activity_codes_file")]
    pub activity_codes_file: String,

    /// NIH institute/center codes (TSV, `Code` column).
    #[serde(default = "default_ic_codes_file")]
    pub ic_codes_file: String,

    /// Reorder code tables longest-first instead of rejecting shadowed codes.
    #[serde(default = "default_true")]
    pub reorder_code_tables: bool,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            sheet_url: default_sheet_url(),
            metadata_file: default_metadata_file(),
            approved_for_prod_file: default_approved_file(),
            approved_for_prod_url: default_approved_url(),
            control_transferred_file: default_transferred_file(),
            control_transferred_url: default_transferred_url(),
            activity_codes_file: default_activity_codes_file(),
            ic_codes_file: default_ic_codes_file(),
            reorder_code_tables: true,
        }
    }
}

/// `Option<Url>` in TOML: an empty string is `None`.
mod optional_url {
    use serde::{Deserialize, Deserializer, Serializer};
    use url::Url;

    pub fn serialize<S: Serializer>(url: &Option<Url>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(url.as_ref().map(Url::as_str).unwrap_or(""))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Url>, D::Error> {
        let raw = String::deserialize(d)?;
        let raw = raw.trim();
        if raw.is_empty() {
            return Ok(None);
        }
        Url::parse(raw).map(Some).map_err(serde::de::Error::custom)
    }
}

const CONTROL_LIST_BASE: &str = "https://raw.githubusercontent.com/NIAID-Data-Ecosystem/nde_research/main/program_collections_generator/data";

fn default_sheet_url() -> Option<Url> {
    Url::parse(
        "https://docs.google.com/spreadsheets/d/16ioasEqMoXuv2tgJs7xlMgD_sPLvrxs7Cp3rwz273YE/export?format=csv&gid=0",
    )
    .ok()
}
fn default_metadata_file() -> String {
    "Program Collections.csv".into()
}
fn default_approved_file() -> String {
    "approved_for_prod.txt".into()
}
fn default_approved_url() -> Option<Url> {
    Url::parse(&format!("{CONTROL_LIST_BASE}/approved_for_prod.txt")).ok()
}
fn default_transferred_file() -> String {
    "control_transferred.txt".into()
}
fn default_transferred_url() -> Option<Url> {
    Url::parse(&format!("{CONTROL_LIST_BASE}/control_transferred.txt")).ok()
}
fn default_activity_codes_file() -> String {
    "NIH_activity_codes.csv".into()
}
fn default_ic_codes_file() -> String {
    "NIH_IC_codes.tsv".into()
}
fn default_true() -> bool {
    true
}

/// `[history]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Read prior records from the local corrections directory instead of `base_url`.
    #[serde(default)]
    pub local: bool,

    /// Raw-content root of the published corrections repository.
    #[serde(default = "default_history_url")]
    pub base_url: Url,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            local: false,
            base_url: default_history_url(),
        }
    }
}

fn default_history_url() -> Url {
    Url::parse(
        "https://raw.githubusercontent.com/NIAID-Data-Ecosystem/nde-metadata-corrections/refs/heads/main/",
    )
    .expect("valid default URL")
}

/// `[monitor]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Seconds between build checks.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
        }
    }
}

fn default_interval_secs() -> u64 {
    300
}

// ---------------------------------------------------------------------------
// Search config (runtime, derived from the [api] section)
// ---------------------------------------------------------------------------

/// Runtime catalog client configuration.
#[derive(Debug, Clone)]
pub struct SearchConfig {
    pub staging_url: Url,
    pub production_url: Url,
    pub timeout: Duration,
    pub page_size: u32,
}

impl SearchConfig {
    /// Base URL for the given environment.
    pub fn base_url(&self, env: Environment) -> &Url {
        match env {
            Environment::Staging => &self.staging_url,
            Environment::Production => &self.production_url,
        }
    }
}

impl From<&AppConfig> for SearchConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            staging_url: config.api.staging_url.clone(),
            production_url: config.api.production_url.clone(),
            timeout: Duration::from_secs(config.api.timeout_secs),
            page_size: config.api.page_size,
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.program-collections/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| CollectionsError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.program-collections/collections.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| CollectionsError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        CollectionsError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| CollectionsError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| CollectionsError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| CollectionsError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Resolve the corrections repository checkout.
///
/// An explicit `corrections_dir` wins. Otherwise the first existing checkout
/// among `<base>/../../`, `<base>/../` and `~/` is used; failing that, a
/// scratch directory under `/tmp` is created with both environment folders.
pub fn locate_corrections_dir(base_path: &Path, paths: &PathsConfig) -> Result<PathBuf> {
    if let Some(dir) = &paths.corrections_dir {
        return Ok(dir.clone());
    }

    let mut candidates = Vec::new();
    if let Some(grandparent) = base_path.parent().and_then(Path::parent) {
        candidates.push(grandparent.join(CORRECTIONS_REPO_NAME));
    }
    if let Some(parent) = base_path.parent() {
        candidates.push(parent.join(CORRECTIONS_REPO_NAME));
    }
    if let Some(home) = dirs::home_dir() {
        candidates.push(home.join(CORRECTIONS_REPO_NAME));
    }

    if let Some(found) = candidates.into_iter().find(|p| p.is_dir()) {
        tracing::info!(path = %found.display(), "found corrections directory");
        return Ok(found);
    }

    let fallback = PathBuf::from(FALLBACK_CORRECTIONS_DIR);
    for env in Environment::ALL {
        let dir = fallback.join(env.corrections_dir_name());
        std::fs::create_dir_all(&dir).map_err(|e| CollectionsError::io(&dir, e))?;
    }
    tracing::warn!(path = %fallback.display(), "using temporary corrections directory");
    Ok(fallback)
}
