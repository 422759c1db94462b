//! Core domain types for program collections.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CollectionsError;

/// Sentinel used by the metadata sheet and by rendered parse results.
pub const NOT_FOUND: &str = "not found";

/// `fileName` placeholder for rows that have no collection yet.
const NO_FILE_NAME: &str = "--";

/// Public landing page prefix for a catalog record; the record id follows.
pub const RESOURCE_URL_PREFIX: &str = "https://data.niaid.nih.gov/resources?id=";

/// Opaque catalog record identifier (e.g. `immport_SDY1234`, `zenodo_123`).
pub type RecordId = String;

// ---------------------------------------------------------------------------
// RunId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper identifying one generation run (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    /// Generate a new time-sortable run identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Environment
// ---------------------------------------------------------------------------

/// A deployment environment of the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Staging,
    Production,
}

impl Environment {
    /// All environments, in output order.
    pub const ALL: [Environment; 2] = [Environment::Staging, Environment::Production];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Staging => "staging",
            Self::Production => "production",
        }
    }

    /// Name of this environment's folder in the corrections repository.
    pub fn corrections_dir_name(&self) -> String {
        format!("collections_corrections_{}", self.as_str())
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = CollectionsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "staging" => Ok(Self::Staging),
            "production" => Ok(Self::Production),
            other => Err(CollectionsError::validation(format!(
                "unknown environment '{other}': expected 'staging' or 'production'"
            ))),
        }
    }
}

/// Which environments a run is allowed to touch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvironmentFilter {
    Staging,
    Production,
    #[default]
    Both,
}

impl EnvironmentFilter {
    /// Whether `env` passes this filter.
    pub fn includes(&self, env: Environment) -> bool {
        match self {
            Self::Both => true,
            Self::Staging => env == Environment::Staging,
            Self::Production => env == Environment::Production,
        }
    }

    /// The environments selected by this filter, in output order.
    pub fn environments(&self) -> Vec<Environment> {
        Environment::ALL
            .into_iter()
            .filter(|env| self.includes(*env))
            .collect()
    }
}

impl fmt::Display for EnvironmentFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Staging => f.write_str("staging"),
            Self::Production => f.write_str("production"),
            Self::Both => f.write_str("both"),
        }
    }
}

impl FromStr for EnvironmentFilter {
    type Err = CollectionsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "staging" => Ok(Self::Staging),
            "production" => Ok(Self::Production),
            "both" => Ok(Self::Both),
            other => Err(CollectionsError::validation(format!(
                "unknown environment '{other}': expected 'staging', 'production', or 'both'"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// ProgramRecord
// ---------------------------------------------------------------------------

/// One row of the program metadata sheet.
///
/// Every cell is optional: blank cells deserialize to `None`. Column names
/// follow the sheet headers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgramRecord {
    /// Unique key; also the stem of every output file name.
    #[serde(rename = "fileName")]
    pub file_name: Option<String>,
    pub name: Option<String>,
    #[serde(rename = "abstract")]
    pub abstract_text: Option<String>,
    pub description: Option<String>,
    pub url: Option<String>,
    #[serde(rename = "niaidURL")]
    pub niaid_url: Option<String>,
    #[serde(rename = "alternateName")]
    pub alternate_name: Option<String>,
    #[serde(rename = "parentOrganization")]
    pub parent_organization: Option<String>,
    #[serde(rename = "fundingIDList")]
    pub funding_id_list: Option<String>,
    #[serde(rename = "PriorProjectGrantIDs")]
    pub prior_project_grant_ids: Option<String>,
}

impl ProgramRecord {
    /// The row's `fileName`, or an empty string when absent.
    pub fn file_name(&self) -> &str {
        self.file_name.as_deref().unwrap_or_default()
    }

    /// A row is processed only when it has a funding list, a program page,
    /// and a real `fileName`.
    pub fn is_valid(&self) -> bool {
        let funding_ok = present(&self.funding_id_list).is_some_and(|f| f != NOT_FOUND);
        let page_ok = present(&self.niaid_url).is_some();
        let name_ok = present(&self.file_name).is_some_and(|f| f != NO_FILE_NAME);
        funding_ok && page_ok && name_ok
    }
}

fn present(cell: &Option<String>) -> Option<&str> {
    cell.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

// ---------------------------------------------------------------------------
// ControlSets
// ---------------------------------------------------------------------------

/// The two externally maintained `fileName` lists that steer routing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ControlSets {
    /// Programs whose collections may be written to production.
    pub approved_for_production: BTreeSet<String>,
    /// Programs whose collections are frozen to their historical records.
    pub control_transferred: BTreeSet<String>,
}

impl ControlSets {
    pub fn new<A, C>(approved: A, transferred: C) -> Self
    where
        A: IntoIterator,
        A::Item: Into<String>,
        C: IntoIterator,
        C::Item: Into<String>,
    {
        Self {
            approved_for_production: approved.into_iter().map(Into::into).collect(),
            control_transferred: transferred.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_approved(&self, file_name: &str) -> bool {
        self.approved_for_production.contains(file_name)
    }

    pub fn is_control_transferred(&self, file_name: &str) -> bool {
        self.control_transferred.contains(file_name)
    }
}

// ---------------------------------------------------------------------------
// BuildInfo
// ---------------------------------------------------------------------------

/// Build information reported by the catalog's metadata endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildInfo {
    pub build_date: String,
    pub build_version: String,
    pub biothing_type: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_row() -> ProgramRecord {
        ProgramRecord {
            file_name: Some("cchi".into()),
            name: Some("Cooperative Centers".into()),
            niaid_url: Some("https://www.niaid.nih.gov/research/cchi".into()),
            funding_id_list: Some("U19AI057229".into()),
            ..Default::default()
        }
    }

    #[test]
    fn valid_row_passes() {
        assert!(valid_row().is_valid());
    }

    #[test]
    fn row_without_funding_is_invalid() {
        let mut row = valid_row();
        row.funding_id_list = None;
        assert!(!row.is_valid());

        row.funding_id_list = Some("not found".into());
        assert!(!row.is_valid());

        row.funding_id_list = Some("   ".into());
        assert!(!row.is_valid());
    }

    #[test]
    fn row_without_page_or_name_is_invalid() {
        let mut row = valid_row();
        row.niaid_url = None;
        assert!(!row.is_valid());

        let mut row = valid_row();
        row.file_name = Some("--".into());
        assert!(!row.is_valid());

        let mut row = valid_row();
        row.file_name = None;
        assert!(!row.is_valid());
    }

    #[test]
    fn environment_parsing() {
        assert_eq!("staging".parse::<Environment>().unwrap(), Environment::Staging);
        assert!("dev".parse::<Environment>().is_err());
        assert_eq!(
            "both".parse::<EnvironmentFilter>().unwrap(),
            EnvironmentFilter::Both
        );
    }

    #[test]
    fn corrections_dir_names() {
        assert_eq!(
            Environment::Production.corrections_dir_name(),
            "collections_corrections_production"
        );
    }

    #[test]
    fn filter_selects_environments() {
        assert_eq!(
            EnvironmentFilter::Both.environments(),
            vec![Environment::Staging, Environment::Production]
        );
        assert_eq!(
            EnvironmentFilter::Production.environments(),
            vec![Environment::Production]
        );
        assert!(!EnvironmentFilter::Staging.includes(Environment::Production));
    }

    #[test]
    fn control_sets_membership() {
        let sets = ControlSets::new(["hiv-vaccine"], ["hiv-vaccine", "tb-centers"]);
        assert!(sets.is_approved("hiv-vaccine"));
        assert!(!sets.is_approved("tb-centers"));
        assert!(sets.is_control_transferred("tb-centers"));
        assert!(!sets.is_control_transferred("TB-centers"));
    }

    #[test]
    fn build_info_tolerates_missing_fields() {
        let info: BuildInfo = serde_json::from_str(r#"{"build_version": "20250101"}"#).unwrap();
        assert_eq!(info.build_version, "20250101");
        assert!(info.build_date.is_empty());
    }
}
