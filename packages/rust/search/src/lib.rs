//! Catalog search and record matching.
//!
//! [`RecordSearch`] is the seam to the catalog: [`ApiClient`] talks to the
//! real API, tests use in-memory fakes. [`RecordMatcher`] turns canonical
//! grant keys into verified record ids, and [`CorrectionsHistory`] reads the
//! record lists published by earlier runs.

mod client;
mod history;
mod matcher;

use std::fmt;

use async_trait::async_trait;
use collections_shared::{BuildInfo, Environment, RecordId, Result};

pub use client::ApiClient;
pub use history::{
    CorrectionsHistory, HttpHistory, LocalHistory, PriorRecords, parse_records_text,
};
pub use matcher::{KeyOutcome, MatchReport, RecordMatch, RecordMatcher};

// ---------------------------------------------------------------------------
// Queries and hits
// ---------------------------------------------------------------------------

/// A funding-identifier lookup.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SearchQuery {
    /// Identifier contains the key anywhere.
    Wildcard(String),
    /// Identifier equals the key.
    Exact(String),
}

impl SearchQuery {
    pub fn key(&self) -> &str {
        match self {
            Self::Wildcard(key) | Self::Exact(key) => key,
        }
    }

    /// The catalog's query-string form.
    pub fn to_query_string(&self) -> String {
        match self {
            Self::Wildcard(key) => format!("funding.identifier:*{key}*"),
            Self::Exact(key) => format!("funding.identifier:{key}"),
        }
    }
}

impl fmt::Display for SearchQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_query_string())
    }
}

/// One catalog record returned by a query, with every funding identifier it carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub record_id: RecordId,
    pub funding_identifiers: Vec<String>,
}

// ---------------------------------------------------------------------------
// Catalog seams
// ---------------------------------------------------------------------------

/// Runs funding-identifier queries against one catalog environment.
#[async_trait]
pub trait RecordSearch: Send + Sync {
    async fn search(&self, env: Environment, query: &SearchQuery) -> Result<Vec<SearchHit>>;
}

/// Reports the catalog's current build.
#[async_trait]
pub trait BuildInfoSource: Send + Sync {
    async fn build_info(&self, env: Environment) -> Result<BuildInfo>;
}
