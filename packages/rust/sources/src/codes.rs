//! NIH code table files.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use collections_grants::{CodeTable, CodeTables};
use collections_shared::{CollectionsError, Result};
use tracing::{info, warn};

use crate::CodeTableSource;

/// Header of the code column in the activity codes CSV.
const ACTIVITY_COLUMN: &str = "Activity Code";

/// Header of the code column in the IC codes TSV.
const IC_COLUMN: &str = "Code";

/// Loads the activity codes CSV and the IC codes TSV from disk.
#[derive(Debug, Clone)]
pub struct CodeFileSource {
    activity_file: PathBuf,
    ic_file: PathBuf,
    reorder: bool,
}

impl CodeFileSource {
    /// With `reorder`, tables are sorted longest-first; otherwise file order
    /// is kept and a shadowed code is an error.
    pub fn new(activity_file: PathBuf, ic_file: PathBuf, reorder: bool) -> Self {
        Self {
            activity_file,
            ic_file,
            reorder,
        }
    }

    fn load_table(&self, path: &Path, delimiter: u8, column: &str) -> Result<CodeTable> {
        if !path.exists() {
            warn!(path = %path.display(), "code table file missing, using empty table");
            return Ok(CodeTable::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| CollectionsError::io(path, e))?;
        let codes = read_code_column(&content, delimiter, column)?;

        let table = if self.reorder {
            CodeTable::longest_first(codes)
        } else {
            CodeTable::new(codes)?
        };
        Ok(table)
    }
}

#[async_trait]
impl CodeTableSource for CodeFileSource {
    async fn load_code_tables(&self) -> Result<CodeTables> {
        let activity = self.load_table(&self.activity_file, b',', ACTIVITY_COLUMN)?;
        let ic = self.load_table(&self.ic_file, b'\t', IC_COLUMN)?;
        info!(
            activity_codes = activity.len(),
            ic_codes = ic.len(),
            "loaded code tables"
        );
        Ok(CodeTables::new(activity, ic))
    }
}

/// Values of `column` in file order: trimmed, blanks dropped, first occurrence kept.
pub fn read_code_column(content: &str, delimiter: u8, column: &str) -> Result<Vec<String>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| CollectionsError::parse(format!("code table header: {e}")))?;
    let index = headers
        .iter()
        .position(|h| h == column)
        .ok_or_else(|| CollectionsError::parse(format!("code table has no '{column}' column")))?;

    let mut codes: Vec<String> = Vec::new();
    for (row_idx, result) in reader.records().enumerate() {
        let record = result.map_err(|e| {
            CollectionsError::parse(format!("code table error at row {}: {e}", row_idx + 1))
        })?;
        let Some(code) = record.get(index).filter(|c| !c.is_empty()) else {
            continue;
        };
        if !codes.iter().any(|c| c == code) {
            codes.push(code.to_string());
        }
    }
    Ok(codes)
}
