//! Rendering program rows and record sets into artifacts.

use std::collections::BTreeSet;

use collections_grants::split_delimited;
use collections_shared::{Environment, ProgramRecord, RESOURCE_URL_PREFIX, RecordId, Result};
use tracing::info;

use crate::document::{CorrectionDocument, ProgramMetadata, to_ascii_json};
use crate::sink::{ArtifactKind, ArtifactMeta, ArtifactSink, RenderedArtifact};

/// Marker for records whose ids carry a repository prefix in the catalog.
const IMMPORT_MARKER: &str = "immport";
const IMMPORT_PREFIX: &str = "immport_";

/// Render the metadata document for a program.
pub fn render_metadata(program: &ProgramRecord) -> Result<String> {
    let metadata = ProgramMetadata::from_program(
        program,
        split_delimited(program.alternate_name.as_deref()),
        split_delimited(program.parent_organization.as_deref()),
    );
    to_ascii_json(&CorrectionDocument::single(metadata))
}

/// Render record ids as resource URLs, one per line, in ascending id order.
///
/// Ids containing `immport` lose their `immport_` prefix. A line equal to
/// an earlier one is written once.
pub fn render_records(ids: &BTreeSet<RecordId>) -> String {
    let mut seen: BTreeSet<String> = BTreeSet::new();
    let mut out = String::new();
    for id in ids {
        let public_id = if id.contains(IMMPORT_MARKER) {
            id.replace(IMMPORT_PREFIX, "")
        } else {
            id.clone()
        };
        let line = format!("{RESOURCE_URL_PREFIX}{public_id}\n");
        if seen.insert(line.clone()) {
            out.push_str(&line);
        }
    }
    out
}

/// Artifacts written for one program in one environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmittedArtifacts {
    pub metadata: ArtifactMeta,
    pub records: Option<ArtifactMeta>,
}

/// Renders artifacts and hands them to a sink.
pub struct CorrectionEmitter<'a> {
    sink: &'a dyn ArtifactSink,
}

impl<'a> CorrectionEmitter<'a> {
    pub fn new(sink: &'a dyn ArtifactSink) -> Self {
        Self { sink }
    }

    pub fn emit_metadata(&self, program: &ProgramRecord, env: Environment) -> Result<ArtifactMeta> {
        let artifact = RenderedArtifact {
            kind: ArtifactKind::Metadata,
            program: program.file_name().to_string(),
            content: render_metadata(program)?,
        };
        let meta = self.sink.write(env, &artifact)?;
        info!(file_name = program.file_name(), environment = %env, "generated metadata file");
        Ok(meta)
    }

    pub fn emit_records(
        &self,
        file_name: &str,
        ids: &BTreeSet<RecordId>,
        env: Environment,
    ) -> Result<ArtifactMeta> {
        let artifact = RenderedArtifact {
            kind: ArtifactKind::Records,
            program: file_name.to_string(),
            content: render_records(ids),
        };
        let meta = self.sink.write(env, &artifact)?;
        info!(file_name, environment = %env, records = ids.len(), "generated records file");
        Ok(meta)
    }

    /// Metadata always; records only when a record set is given.
    pub fn emit(
        &self,
        program: &ProgramRecord,
        records: Option<&BTreeSet<RecordId>>,
        env: Environment,
    ) -> Result<EmittedArtifacts> {
        let metadata = self.emit_metadata(program, env)?;
        let records = records
            .map(|ids| self.emit_records(program.file_name(), ids, env))
            .transpose()?;
        Ok(EmittedArtifacts { metadata, records })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MemorySink {
        written: Mutex<Vec<(Environment, RenderedArtifact)>>,
    }

    impl ArtifactSink for MemorySink {
        fn write(&self, env: Environment, artifact: &RenderedArtifact) -> Result<ArtifactMeta> {
            self.written.lock().unwrap().push((env, artifact.clone()));
            Ok(ArtifactMeta {
                path: PathBuf::from(artifact.kind.file_name(&artifact.program)),
                sha256: String::new(),
                size_bytes: artifact.content.len(),
            })
        }
    }

    fn ids(items: &[&str]) -> BTreeSet<RecordId> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn immport_prefix_is_stripped() {
        let out = render_records(&ids(&["immport_abc123", "xyz789"]));
        assert_eq!(
            out,
            "https://data.niaid.nih.gov/resources?id=abc123\n\
             https://data.niaid.nih.gov/resources?id=xyz789\n"
        );
    }

    #[test]
    fn duplicate_lines_are_collapsed() {
        let out = render_records(&ids(&["SDY1", "immport_SDY1", "zenodo_2"]));
        assert_eq!(out.lines().count(), 2);
        assert!(out.starts_with("https://data.niaid.nih.gov/resources?id=SDY1\n"));
    }

    #[test]
    fn rendering_is_reproducible() {
        let set = ids(&["b", "immport_a", "c"]);
        assert_eq!(render_records(&set), render_records(&set.clone()));
        assert_eq!(render_records(&BTreeSet::new()), "");
    }

    #[test]
    fn metadata_splits_delimited_fields() {
        let program = ProgramRecord {
            file_name: Some("hvtn".into()),
            name: Some("HIV Vaccine Trials Network".into()),
            niaid_url: Some("https://www.niaid.nih.gov/research/hvtn".into()),
            alternate_name: Some("HVTN|HIV VTN".into()),
            parent_organization: Some("NIAID, DAIDS".into()),
            ..Default::default()
        };
        let json = render_metadata(&program).unwrap();
        let doc: CorrectionDocument = serde_json::from_str(&json).unwrap();
        let meta = &doc.source_organization[0];
        assert_eq!(meta.alternate_name, vec!["HVTN", "HIV VTN"]);
        assert_eq!(meta.parent_organization, vec!["NIAID", "DAIDS"]);
    }

    #[test]
    fn emit_without_records_writes_metadata_only() {
        let sink = MemorySink::default();
        let program = ProgramRecord {
            file_name: Some("cchi".into()),
            niaid_url: Some("https://www.niaid.nih.gov/research/cchi".into()),
            ..Default::default()
        };

        let emitted = CorrectionEmitter::new(&sink)
            .emit(&program, None, Environment::Staging)
            .unwrap();
        assert!(emitted.records.is_none());

        let emitted = CorrectionEmitter::new(&sink)
            .emit(&program, Some(&ids(&["x"])), Environment::Production)
            .unwrap();
        assert_eq!(
            emitted.records.map(|m| m.path),
            Some(PathBuf::from("cchi_records.txt"))
        );

        let written = sink.written.lock().unwrap();
        assert_eq!(written.len(), 3);
        assert_eq!(written[0].1.kind, ArtifactKind::Metadata);
        assert_eq!(written[2].0, Environment::Production);
    }
}
