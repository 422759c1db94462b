//! The metadata correction document.

use collections_shared::{CollectionsError, ProgramRecord, Result};
use serde::{Deserialize, Serialize};
use serde_json::ser::PrettyFormatter;

/// Schema type of every program entry.
const RESEARCH_PROJECT: &str = "ResearchProject";

/// Indentation of metadata files in the corrections repository.
const INDENT: &[u8] = b"    ";

/// `{"sourceOrganization": [ ... ]}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrectionDocument {
    #[serde(rename = "sourceOrganization")]
    pub source_organization: Vec<ProgramMetadata>,
}

/// One program as it appears in the catalog's `sourceOrganization`.
///
/// Field order is the serialized order. Absent sheet cells serialize as `null`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramMetadata {
    #[serde(rename = "@type")]
    pub kind: String,
    pub name: Option<String>,
    #[serde(rename = "abstract")]
    pub abstract_text: Option<String>,
    pub description: String,
    #[serde(rename = "alternateName")]
    pub alternate_name: Vec<String>,
    pub url: Option<String>,
    #[serde(rename = "parentOrganization")]
    pub parent_organization: Vec<String>,
}

impl ProgramMetadata {
    /// Copy the row, appending the program page link to the description.
    pub fn from_program(
        program: &ProgramRecord,
        alternate_name: Vec<String>,
        parent_organization: Vec<String>,
    ) -> Self {
        Self {
            kind: RESEARCH_PROJECT.to_string(),
            name: program.name.clone(),
            abstract_text: program.abstract_text.clone(),
            description: description_with_link(program),
            alternate_name,
            url: program.url.clone(),
            parent_organization,
        }
    }
}

impl CorrectionDocument {
    pub fn single(metadata: ProgramMetadata) -> Self {
        Self {
            source_organization: vec![metadata],
        }
    }
}

fn description_with_link(program: &ProgramRecord) -> String {
    let page = program.niaid_url.as_deref().unwrap_or_default();
    let link = format!("For more information, visit the NIAID program page: {page}");
    match program.description.as_deref() {
        Some(description) => format!("{description} {link}"),
        None => link,
    }
}

/// Pretty JSON with four-space indentation, every non-ASCII character
/// escaped as `\uXXXX`, and no trailing newline.
pub fn to_ascii_json<T: Serialize>(value: &T) -> Result<String> {
    let mut buf = Vec::new();
    let mut ser =
        serde_json::Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(INDENT));
    value
        .serialize(&mut ser)
        .map_err(|e| CollectionsError::Artifact(format!("JSON serialization failed: {e}")))?;

    let json = String::from_utf8(buf)
        .map_err(|e| CollectionsError::Artifact(format!("JSON output is not UTF-8: {e}")))?;
    Ok(escape_non_ascii(&json))
}

/// Non-ASCII (and DEL) only occur inside string literals, so escaping the
/// whole document is safe.
fn escape_non_ascii(json: &str) -> String {
    let mut out = String::with_capacity(json.len());
    let mut units = [0u16; 2];
    for c in json.chars() {
        if c.is_ascii() && c != '\u{7f}' {
            out.push(c);
            continue;
        }
        for unit in c.encode_utf16(&mut units) {
            out.push_str(&format!("\\u{unit:04x}"));
        }
    }
    out
}
