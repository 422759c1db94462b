//! Approved-for-production and control-transferred lists.

use std::collections::BTreeSet;
use std::path::PathBuf;

use async_trait::async_trait;
use collections_shared::{CollectionsError, ControlSets, Result};
use reqwest::Client;
use tracing::{info, warn};
use url::Url;

use crate::ControlSetSource;
use crate::http::fetch_text;

/// Where one list lives: a local file, with an optional remote copy.
#[derive(Debug, Clone)]
pub struct ListLocation {
    pub local_file: PathBuf,
    pub url: Option<Url>,
}

impl ListLocation {
    pub fn new(local_file: PathBuf, url: Option<Url>) -> Self {
        Self { local_file, url }
    }
}

/// Reads both control lists, local file first, remote copy second.
#[derive(Debug, Clone)]
pub struct ControlListSource {
    approved: ListLocation,
    transferred: ListLocation,
    client: Client,
}

impl ControlListSource {
    pub fn new(approved: ListLocation, transferred: ListLocation, client: Client) -> Self {
        Self {
            approved,
            transferred,
            client,
        }
    }

    /// Load one list. A list that cannot be read anywhere is empty.
    async fn load_list(&self, location: &ListLocation) -> BTreeSet<String> {
        if location.local_file.exists() {
            match std::fs::read_to_string(&location.local_file) {
                Ok(content) => {
                    let items = parse_control_list(&content);
                    info!(path = %location.local_file.display(), items = items.len(), "loaded control list");
                    return items;
                }
                Err(e) => {
                    let err = CollectionsError::io(&location.local_file, e);
                    warn!(error = %err, "failed to read local control list");
                }
            }
        }

        let Some(url) = &location.url else {
            warn!(path = %location.local_file.display(), "control list unavailable, treating as empty");
            return BTreeSet::new();
        };

        match fetch_text(&self.client, url).await {
            Ok(body) => {
                let items = parse_control_list(&body);
                info!(%url, items = items.len(), "fetched control list");
                items
            }
            Err(e) => {
                warn!(error = %e, "control list unavailable, treating as empty");
                BTreeSet::new()
            }
        }
    }
}

#[async_trait]
impl ControlSetSource for ControlListSource {
    async fn load_control_sets(&self) -> Result<ControlSets> {
        let approved = self.load_list(&self.approved).await;
        let transferred = self.load_list(&self.transferred).await;
        Ok(ControlSets::new(approved, transferred))
    }
}

/// One `fileName` per line; surrounding whitespace trimmed, blank lines ignored.
pub fn parse_control_list(content: &str) -> BTreeSet<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}
