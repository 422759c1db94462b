//! Program metadata sheet, read as CSV.

use std::path::PathBuf;

use async_trait::async_trait;
use collections_shared::{CollectionsError, ProgramRecord, Result};
use reqwest::Client;
use tracing::{info, instrument, warn};
use url::Url;

use crate::MetadataSource;
use crate::http::fetch_text;

/// Metadata sheet downloaded from its CSV export, with a local copy as fallback.
#[derive(Debug, Clone)]
pub struct SheetSource {
    url: Option<Url>,
    local_file: PathBuf,
    client: Client,
}

impl SheetSource {
    pub fn new(url: Option<Url>, local_file: PathBuf, client: Client) -> Self {
        Self {
            url,
            local_file,
            client,
        }
    }

    async fn download(&self, url: &Url) -> Result<Vec<ProgramRecord>> {
        let body = fetch_text(&self.client, url).await?;
        let rows = parse_metadata_csv(&body)?;
        if rows.is_empty() {
            return Err(CollectionsError::Source(format!("{url}: sheet has no rows")));
        }
        Ok(rows)
    }

    fn read_local(&self) -> Result<Vec<ProgramRecord>> {
        let content = std::fs::read_to_string(&self.local_file)
            .map_err(|e| CollectionsError::io(&self.local_file, e))?;
        parse_metadata_csv(&content)
    }
}

#[async_trait]
impl MetadataSource for SheetSource {
    #[instrument(skip_all)]
    async fn load_programs(&self) -> Result<Vec<ProgramRecord>> {
        if let Some(url) = &self.url {
            match self.download(url).await {
                Ok(rows) => {
                    info!(programs = rows.len(), "downloaded program metadata");
                    return Ok(rows);
                }
                Err(e) => warn!(error = %e, "metadata download failed, trying local copy"),
            }
        }

        if !self.local_file.exists() {
            return Err(CollectionsError::Source(format!(
                "no program metadata available (local copy {} missing)",
                self.local_file.display()
            )));
        }

        let rows = self.read_local()?;
        if rows.is_empty() {
            return Err(CollectionsError::Source(format!(
                "{} has no program rows",
                self.local_file.display()
            )));
        }
        warn!(path = %self.local_file.display(), programs = rows.len(), "using local program metadata");
        Ok(rows)
    }
}

/// Parse the sheet's CSV export. Blank or whitespace-only cells become `None`.
pub fn parse_metadata_csv(content: &str) -> Result<Vec<ProgramRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_reader(content.as_bytes());

    let mut rows = Vec::new();
    for (row_idx, result) in reader.deserialize::<ProgramRecord>().enumerate() {
        let record = result.map_err(|e| {
            CollectionsError::parse(format!("metadata CSV error at row {}: {e}", row_idx + 1))
        })?;
        rows.push(normalize(record));
    }
    Ok(rows)
}

fn normalize(record: ProgramRecord) -> ProgramRecord {
    fn cell(value: Option<String>) -> Option<String> {
        value.filter(|v| !v.trim().is_empty())
    }

    ProgramRecord {
        file_name: cell(record.file_name).map(|f| f.trim().to_string()),
        name: cell(record.name),
        abstract_text: cell(record.abstract_text),
        description: cell(record.description),
        url: cell(record.url),
        niaid_url: cell(record.niaid_url),
        alternate_name: cell(record.alternate_name),
        parent_organization: cell(record.parent_organization),
        funding_id_list: cell(record.funding_id_list),
        prior_project_grant_ids: cell(record.prior_project_grant_ids),
    }
}
