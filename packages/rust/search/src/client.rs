//! HTTP client for the catalog API.

use async_trait::async_trait;
use collections_shared::{BuildInfo, CollectionsError, Environment, Result, SearchConfig};
use reqwest::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::{BuildInfoSource, RecordSearch, SearchHit, SearchQuery};

/// Fields requested for every hit.
const HIT_FIELDS: &str = "_id,funding.identifier";

/// User-Agent string for catalog requests.
const USER_AGENT: &str = concat!("program-collections/", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    hits: Vec<RawHit>,
}

#[derive(Debug, Deserialize)]
struct RawHit {
    #[serde(rename = "_id")]
    id: String,
    #[serde(default)]
    funding: Option<FundingField>,
}

/// `funding` is a list for most records and a bare object for some.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FundingField {
    Many(Vec<FundingEntry>),
    One(FundingEntry),
}

#[derive(Debug, Default, Deserialize)]
struct FundingEntry {
    #[serde(default)]
    identifier: Option<String>,
}

impl From<RawHit> for SearchHit {
    fn from(hit: RawHit) -> Self {
        let entries = match hit.funding {
            Some(FundingField::Many(entries)) => entries,
            Some(FundingField::One(entry)) => vec![entry],
            None => Vec::new(),
        };
        SearchHit {
            record_id: hit.id,
            funding_identifiers: entries.into_iter().filter_map(|e| e.identifier).collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// ApiClient
// ---------------------------------------------------------------------------

/// Catalog API client for both environments.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    config: SearchConfig,
}

impl ApiClient {
    pub fn new(config: SearchConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.timeout)
            .build()
            .map_err(|e| CollectionsError::Network(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    fn endpoint(&self, env: Environment, path: &str) -> String {
        let base = self.config.base_url(env).as_str().trim_end_matches('/');
        format!("{base}/{path}")
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|e| CollectionsError::Network(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CollectionsError::Network(format!("{url}: HTTP {status}")));
        }

        let body = response
            .text()
            .await
            .map_err(|e| CollectionsError::Network(format!("{url}: failed to read body: {e}")))?;

        serde_json::from_str(&body)
            .map_err(|e| CollectionsError::parse(format!("{url}: invalid response: {e}")))
    }
}

#[async_trait]
impl RecordSearch for ApiClient {
    async fn search(&self, env: Environment, query: &SearchQuery) -> Result<Vec<SearchHit>> {
        let url = self.endpoint(env, "query");
        let params = [
            ("q", query.to_query_string()),
            ("fields", HIT_FIELDS.to_string()),
            ("size", self.config.page_size.to_string()),
        ];

        let response: QueryResponse = self.get_json(&url, &params).await?;
        debug!(environment = %env, %query, hits = response.hits.len(), "query complete");

        Ok(response.hits.into_iter().map(SearchHit::from).collect())
    }
}

#[async_trait]
impl BuildInfoSource for ApiClient {
    async fn build_info(&self, env: Environment) -> Result<BuildInfo> {
        let url = self.endpoint(env, "metadata");
        self.get_json(&url, &[]).await
    }
}
