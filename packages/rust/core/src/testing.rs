//! In-memory collaborators for engine and pipeline tests.

use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use collections_artifacts::{ArtifactKind, ArtifactMeta, ArtifactSink, RenderedArtifact};
use collections_grants::{CodeTable, CodeTables};
use collections_search::{
    BuildInfoSource, CorrectionsHistory, PriorRecords, RecordSearch, SearchHit, SearchQuery,
};
use collections_shared::{
    BuildInfo, CollectionsError, ControlSets, Environment, ProgramRecord, Result,
};
use collections_sources::{CodeTableSource, ControlSetSource, MetadataSource};

pub fn tables() -> CodeTables {
    CodeTables::new(
        CodeTable::new(["R01", "U01", "U19"]).unwrap(),
        CodeTable::new(["AI", "AG"]).unwrap(),
    )
}

pub fn program(file_name: &str, funding: &str) -> ProgramRecord {
    ProgramRecord {
        file_name: Some(file_name.into()),
        name: Some(format!("Program {file_name}")),
        description: Some("Test program.".into()),
        niaid_url: Some(format!("https://www.niaid.nih.gov/research/{file_name}")),
        funding_id_list: Some(funding.into()),
        ..Default::default()
    }
}

// ---------------------------------------------------------------------------
// Search and history
// ---------------------------------------------------------------------------

/// Returns the same canned hits for the wildcard and exact query of a key.
#[derive(Default)]
pub struct FakeSearch {
    hits: HashMap<String, Vec<SearchHit>>,
    calls: AtomicUsize,
}

impl FakeSearch {
    pub fn with_hit(mut self, key: &str, record_id: &str, identifier: &str) -> Self {
        self.hits.entry(key.to_string()).or_default().push(SearchHit {
            record_id: record_id.into(),
            funding_identifiers: vec![identifier.into()],
        });
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RecordSearch for FakeSearch {
    async fn search(&self, _env: Environment, query: &SearchQuery) -> Result<Vec<SearchHit>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.hits.get(query.key()).cloned().unwrap_or_default())
    }
}

/// Unknown programs are `NotPublished`.
#[derive(Default)]
pub struct FakeHistory {
    records: HashMap<(String, Environment), PriorRecords>,
}

impl FakeHistory {
    pub fn with(mut self, file_name: &str, env: Environment, ids: &[&str]) -> Self {
        let ids: BTreeSet<String> = ids.iter().map(|s| s.to_string()).collect();
        self.records
            .insert((file_name.to_string(), env), PriorRecords::Found(ids));
        self
    }

    pub fn unavailable(mut self, file_name: &str, env: Environment) -> Self {
        self.records.insert(
            (file_name.to_string(), env),
            PriorRecords::Unavailable("HTTP 500".into()),
        );
        self
    }
}

#[async_trait]
impl CorrectionsHistory for FakeHistory {
    async fn prior_records(&self, file_name: &str, env: Environment) -> PriorRecords {
        self.records
            .get(&(file_name.to_string(), env))
            .cloned()
            .unwrap_or(PriorRecords::NotPublished)
    }
}

// ---------------------------------------------------------------------------
// Sink
// ---------------------------------------------------------------------------

/// Writes fail for every environment listed in `fail_in`.
#[derive(Default)]
pub struct MemorySink {
    written: Mutex<HashMap<(Environment, ArtifactKind, String), String>>,
    fail_in: Vec<Environment>,
}

impl MemorySink {
    pub fn failing() -> Self {
        Self {
            fail_in: Environment::ALL.to_vec(),
            ..Default::default()
        }
    }

    pub fn failing_in(env: Environment) -> Self {
        Self {
            fail_in: vec![env],
            ..Default::default()
        }
    }

    pub fn has(&self, env: Environment, kind: ArtifactKind, program: &str) -> bool {
        self.written
            .lock()
            .unwrap()
            .contains_key(&(env, kind, program.to_string()))
    }

    pub fn content(&self, env: Environment, kind: ArtifactKind, program: &str) -> String {
        self.written
            .lock()
            .unwrap()
            .get(&(env, kind, program.to_string()))
            .cloned()
            .unwrap_or_else(|| panic!("no {kind:?} artifact for {program} in {env}"))
    }

    pub fn count(&self, kind: ArtifactKind) -> usize {
        self.written
            .lock()
            .unwrap()
            .keys()
            .filter(|(_, k, _)| *k == kind)
            .count()
    }
}

impl ArtifactSink for MemorySink {
    fn write(&self, env: Environment, artifact: &RenderedArtifact) -> Result<ArtifactMeta> {
        if self.fail_in.contains(&env) {
            return Err(CollectionsError::Artifact(format!("{env} disk full")));
        }
        self.written.lock().unwrap().insert(
            (env, artifact.kind, artifact.program.clone()),
            artifact.content.clone(),
        );
        Ok(ArtifactMeta {
            path: PathBuf::from(env.corrections_dir_name())
                .join(artifact.kind.file_name(&artifact.program)),
            sha256: String::new(),
            size_bytes: artifact.content.len(),
        })
    }
}

// ---------------------------------------------------------------------------
// Sources and builds
// ---------------------------------------------------------------------------

pub struct FakeSources {
    pub programs: Option<Vec<ProgramRecord>>,
    pub controls: ControlSets,
    pub tables: CodeTables,
}

#[async_trait]
impl MetadataSource for FakeSources {
    async fn load_programs(&self) -> Result<Vec<ProgramRecord>> {
        self.programs
            .clone()
            .ok_or_else(|| CollectionsError::Source("no program metadata available".into()))
    }
}

#[async_trait]
impl ControlSetSource for FakeSources {
    async fn load_control_sets(&self) -> Result<ControlSets> {
        Ok(self.controls.clone())
    }
}

#[async_trait]
impl CodeTableSource for FakeSources {
    async fn load_code_tables(&self) -> Result<CodeTables> {
        Ok(self.tables.clone())
    }
}

/// Build versions per environment; a missing entry is a failed fetch.
#[derive(Default)]
pub struct FakeBuilds {
    versions: HashMap<Environment, String>,
}

impl FakeBuilds {
    pub fn with(mut self, env: Environment, version: &str) -> Self {
        self.versions.insert(env, version.to_string());
        self
    }
}

#[async_trait]
impl BuildInfoSource for FakeBuilds {
    async fn build_info(&self, env: Environment) -> Result<BuildInfo> {
        self.versions
            .get(&env)
            .map(|v| BuildInfo {
                build_date: "2025-10-01".into(),
                build_version: v.clone(),
                biothing_type: "dataset".into(),
            })
            .ok_or_else(|| CollectionsError::Network(format!("{env}: HTTP 503")))
    }
}
