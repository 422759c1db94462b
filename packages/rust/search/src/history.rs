//! Record lists published by earlier runs.
//!
//! Control-transferred programs keep every record they were ever published
//! with, so the previous `{fileName}_records.txt` is read back before the
//! new one is written.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::LazyLock;

use async_trait::async_trait;
use collections_shared::{
    CollectionsError, Environment, RESOURCE_URL_PREFIX, RecordId, Result,
};
use regex::Regex;
use reqwest::{Client, StatusCode};
use tracing::{info, warn};
use url::Url;

/// Matches one rendered record line and captures the record id.
static RECORD_LINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"^{}(\S+)$", regex::escape(RESOURCE_URL_PREFIX)))
        .expect("record line regex")
});

/// Prior records for one program in one environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PriorRecords {
    Found(BTreeSet<RecordId>),
    /// No records file has been published for the program.
    NotPublished,
    /// The history could not be read; treated as empty.
    Unavailable(String),
}

impl PriorRecords {
    /// The published ids; empty when nothing was published or readable.
    pub fn ids(&self) -> impl Iterator<Item = &RecordId> {
        match self {
            Self::Found(ids) => Some(ids.iter()),
            Self::NotPublished | Self::Unavailable(_) => None,
        }
        .into_iter()
        .flatten()
    }
}

/// Source of previously published record lists.
#[async_trait]
pub trait CorrectionsHistory: Send + Sync {
    async fn prior_records(&self, file_name: &str, env: Environment) -> PriorRecords;
}

/// Record ids from a records file. Lines that are not record URLs are ignored.
pub fn parse_records_text(text: &str) -> BTreeSet<RecordId> {
    text.lines()
        .filter_map(|line| RECORD_LINE_RE.captures(line.trim()))
        .map(|caps| caps[1].to_string())
        .collect()
}

fn records_file_name(file_name: &str) -> String {
    format!("{file_name}_records.txt")
}

// ---------------------------------------------------------------------------
// HttpHistory
// ---------------------------------------------------------------------------

/// Reads the published corrections repository over HTTP.
#[derive(Debug, Clone)]
pub struct HttpHistory {
    base_url: Url,
    client: Client,
}

impl HttpHistory {
    /// `base_url` is the repository root; it should end with `/`.
    pub fn new(base_url: Url, client: Client) -> Self {
        Self { base_url, client }
    }

    fn records_url(&self, file_name: &str, env: Environment) -> Result<Url> {
        let relative = format!("{}/{}", env.corrections_dir_name(), records_file_name(file_name));
        self.base_url
            .join(&relative)
            .map_err(|e| CollectionsError::validation(format!("bad history URL for {file_name}: {e}")))
    }

    async fn fetch(&self, url: &Url) -> Result<Option<String>> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| CollectionsError::Network(format!("{url}: {e}")))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(CollectionsError::Network(format!("{url}: HTTP {status}")));
        }

        let body = response
            .text()
            .await
            .map_err(|e| CollectionsError::Network(format!("{url}: failed to read body: {e}")))?;
        Ok(Some(body))
    }
}

#[async_trait]
impl CorrectionsHistory for HttpHistory {
    async fn prior_records(&self, file_name: &str, env: Environment) -> PriorRecords {
        let result = match self.records_url(file_name, env) {
            Ok(url) => self.fetch(&url).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(Some(body)) => {
                let ids = parse_records_text(&body);
                info!(file_name, environment = %env, records = ids.len(), "found prior records");
                PriorRecords::Found(ids)
            }
            Ok(None) => PriorRecords::NotPublished,
            Err(e) => {
                warn!(file_name, environment = %env, error = %e, "could not fetch prior records");
                PriorRecords::Unavailable(e.to_string())
            }
        }
    }
}

// ---------------------------------------------------------------------------
// LocalHistory
// ---------------------------------------------------------------------------

/// Reads a local checkout of the corrections repository.
#[derive(Debug, Clone)]
pub struct LocalHistory {
    corrections_dir: PathBuf,
}

impl LocalHistory {
    pub fn new(corrections_dir: PathBuf) -> Self {
        Self { corrections_dir }
    }
}

#[async_trait]
impl CorrectionsHistory for LocalHistory {
    async fn prior_records(&self, file_name: &str, env: Environment) -> PriorRecords {
        let path = self
            .corrections_dir
            .join(env.corrections_dir_name())
            .join(records_file_name(file_name));

        if !path.exists() {
            return PriorRecords::NotPublished;
        }

        match std::fs::read_to_string(&path) {
            Ok(text) => {
                let ids = parse_records_text(&text);
                info!(file_name, environment = %env, records = ids.len(), "found prior records");
                PriorRecords::Found(ids)
            }
            Err(e) => {
                let err = CollectionsError::io(&path, e);
                warn!(error = %err, "could not read prior records");
                PriorRecords::Unavailable(err.to_string())
            }
        }
    }
}
