//! End-to-end generation run: sources → reconciliation → artifacts.

use std::collections::BTreeSet;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, instrument, warn};

use collections_artifacts::ArtifactSink;
use collections_search::{CorrectionsHistory, RecordSearch};
use collections_shared::{EnvironmentFilter, Result, RunId};
use collections_sources::{CodeTableSource, ControlSetSource, MetadataSource};

use crate::reconcile::{ProgramOutcome, ReconciliationEngine};

/// Collaborators for one run.
pub struct RunInputs<'a> {
    pub metadata: &'a dyn MetadataSource,
    pub control: &'a dyn ControlSetSource,
    pub codes: &'a dyn CodeTableSource,
    pub search: &'a dyn RecordSearch,
    pub history: &'a dyn CorrectionsHistory,
    pub sink: &'a dyn ArtifactSink,
}

/// Summary of a generation run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: RunId,
    pub environment: EnvironmentFilter,
    pub started_at: DateTime<Utc>,
    pub programs_total: usize,
    pub programs_valid: usize,
    pub metadata_files: usize,
    pub record_files: usize,
    pub skipped: usize,
    pub errors: usize,
    /// Keys that matched no record, across all programs and environments.
    pub unmatched_keys: BTreeSet<String>,
    pub elapsed: Duration,
    #[serde(skip)]
    pub outcomes: Vec<ProgramOutcome>,
}

impl RunReport {
    fn new(environment: EnvironmentFilter) -> Self {
        Self {
            run_id: RunId::new(),
            environment,
            started_at: Utc::now(),
            programs_total: 0,
            programs_valid: 0,
            metadata_files: 0,
            record_files: 0,
            skipped: 0,
            errors: 0,
            unmatched_keys: BTreeSet::new(),
            elapsed: Duration::ZERO,
            outcomes: Vec::new(),
        }
    }

    /// Count what a program wrote, plus one error if any environment failed.
    fn tally(&mut self, outcome: ProgramOutcome) {
        match &outcome {
            ProgramOutcome::Skipped { .. } => self.skipped += 1,
            ProgramOutcome::Failed { .. } | ProgramOutcome::Partial { .. } => self.errors += 1,
            ProgramOutcome::Emitted { .. } => {}
        }
        for env in outcome.written() {
            self.metadata_files += 1;
            if env.records.is_some() {
                self.record_files += 1;
            }
            self.unmatched_keys.extend(env.unmatched_keys.iter().cloned());
        }
        self.outcomes.push(outcome);
    }
}

/// Progress callback for reporting run status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called after each program is reconciled.
    fn program_done(&self, file_name: &str, current: usize, total: usize);
    /// Called when the run completes.
    fn done(&self, report: &RunReport);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn program_done(&self, _file_name: &str, _current: usize, _total: usize) {}
    fn done(&self, _report: &RunReport) {}
}

/// Run a full generation.
///
/// 1. Load code tables and control lists (degrade to empty)
/// 2. Load program metadata (fatal if unavailable)
/// 3. Reconcile each valid program in sheet order
///
/// Program-level failures are tallied in the report, not returned.
#[instrument(skip_all, fields(environment = %filter))]
pub async fn run_collections(
    inputs: &RunInputs<'_>,
    filter: EnvironmentFilter,
    progress: &dyn ProgressReporter,
) -> Result<RunReport> {
    let start = Instant::now();
    let mut report = RunReport::new(filter);

    info!(run_id = %report.run_id, "starting program collections run");

    // --- Phase 1: Configuration data ---
    progress.phase("Loading code tables and control lists");
    let tables = inputs.codes.load_code_tables().await?;
    let controls = inputs.control.load_control_sets().await?;
    info!(
        approved = controls.approved_for_production.len(),
        control_transferred = controls.control_transferred.len(),
        activity_codes = tables.activity.len(),
        ic_codes = tables.ic.len(),
        "loaded configuration data"
    );

    // --- Phase 2: Program metadata ---
    progress.phase("Loading program metadata");
    let programs = inputs.metadata.load_programs().await?;
    report.programs_total = programs.len();

    let valid: Vec<_> = programs.iter().filter(|p| p.is_valid()).collect();
    report.programs_valid = valid.len();
    info!(
        total = report.programs_total,
        valid = report.programs_valid,
        "processing valid programs"
    );

    // --- Phase 3: Reconcile ---
    progress.phase("Generating correction files");
    let engine = ReconciliationEngine {
        tables: &tables,
        controls: &controls,
        search: inputs.search,
        history: inputs.history,
        sink: inputs.sink,
        filter,
    };

    let total = valid.len();
    for (i, program) in valid.into_iter().enumerate() {
        let outcome = engine.reconcile(program).await;
        progress.program_done(outcome.file_name(), i + 1, total);
        report.tally(outcome);
    }

    report.elapsed = start.elapsed();

    info!(
        metadata_files = report.metadata_files,
        record_files = report.record_files,
        skipped = report.skipped,
        elapsed_ms = report.elapsed.as_millis() as u64,
        "program collections run complete"
    );
    if report.errors > 0 {
        warn!(errors = report.errors, "encountered errors during processing");
    }
    if !report.unmatched_keys.is_empty() {
        warn!(count = report.unmatched_keys.len(), "grant keys without records");
    }

    progress.done(&report);
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeHistory, FakeSearch, FakeSources, MemorySink, program, tables};
    use collections_artifacts::ArtifactKind;
    use collections_shared::{CollectionsError, ControlSets, Environment, ProgramRecord};
    use std::sync::Mutex;

    fn sheet() -> Vec<ProgramRecord> {
        let mut invalid = program("no-page", "R01AI1");
        invalid.niaid_url = None;
        vec![
            program("cchi", "U19AI057229"),
            program("hvtn", "1-R01-AI073685-01, *"),
            program("frozen", "R01AI073685"),
            program("--", "R01AI073685"),
            invalid,
            program("empty", "*"),
        ]
    }

    fn sources(programs: Option<Vec<ProgramRecord>>) -> FakeSources {
        FakeSources {
            programs,
            controls: ControlSets::new(["hvtn"], ["frozen"]),
            tables: tables(),
        }
    }

    #[derive(Default)]
    struct RecordingProgress {
        phases: Mutex<Vec<String>>,
        programs: Mutex<Vec<(String, usize, usize)>>,
    }

    impl ProgressReporter for RecordingProgress {
        fn phase(&self, name: &str) {
            self.phases.lock().unwrap().push(name.to_string());
        }
        fn program_done(&self, file_name: &str, current: usize, total: usize) {
            self.programs
                .lock()
                .unwrap()
                .push((file_name.to_string(), current, total));
        }
        fn done(&self, _report: &RunReport) {}
    }

    #[tokio::test]
    async fn full_run_tallies_outcomes() {
        let sources = sources(Some(sheet()));
        let search = FakeSearch::default()
            .with_hit("AI057229", "immport_SDY2", "U19AI057229")
            .with_hit("AI073685", "zenodo_1", "R01AI073685");
        let history = FakeHistory::default();
        let sink = MemorySink::default();
        let inputs = RunInputs {
            metadata: &sources,
            control: &sources,
            codes: &sources,
            search: &search,
            history: &history,
            sink: &sink,
        };
        let progress = RecordingProgress::default();

        let report = run_collections(&inputs, EnvironmentFilter::Both, &progress)
            .await
            .unwrap();

        assert_eq!(report.programs_total, 6);
        assert_eq!(report.programs_valid, 4);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.errors, 0);
        // cchi: staging; hvtn: staging + production; empty: staging
        assert_eq!(report.metadata_files, 4);
        assert_eq!(report.record_files, 3);
        assert!(report.unmatched_keys.is_empty());

        assert_eq!(
            sink.content(Environment::Production, ArtifactKind::Records, "hvtn"),
            "https://data.niaid.nih.gov/resources?id=zenodo_1\n"
        );
        assert_eq!(
            sink.content(Environment::Staging, ArtifactKind::Records, "cchi"),
            "https://data.niaid.nih.gov/resources?id=SDY2\n"
        );

        assert_eq!(progress.phases.lock().unwrap().len(), 3);
        let done = progress.programs.lock().unwrap();
        assert_eq!(done.len(), 4);
        assert_eq!(done[3], ("empty".to_string(), 4, 4));
    }

    #[tokio::test]
    async fn environment_filter_limits_output() {
        let sources = sources(Some(sheet()));
        let search = FakeSearch::default();
        let history = FakeHistory::default();
        let sink = MemorySink::default();
        let inputs = RunInputs {
            metadata: &sources,
            control: &sources,
            codes: &sources,
            search: &search,
            history: &history,
            sink: &sink,
        };

        let report = run_collections(&inputs, EnvironmentFilter::Production, &SilentProgress)
            .await
            .unwrap();

        assert_eq!(report.metadata_files, 1);
        assert_eq!(report.record_files, 1);
        assert_eq!(
            report.unmatched_keys.iter().cloned().collect::<Vec<_>>(),
            vec!["AI073685".to_string()]
        );
    }

    #[tokio::test]
    async fn missing_metadata_is_fatal() {
        let sources = sources(None);
        let search = FakeSearch::default();
        let history = FakeHistory::default();
        let sink = MemorySink::default();
        let inputs = RunInputs {
            metadata: &sources,
            control: &sources,
            codes: &sources,
            search: &search,
            history: &history,
            sink: &sink,
        };

        let err = run_collections(&inputs, EnvironmentFilter::Both, &SilentProgress)
            .await
            .unwrap_err();
        assert!(matches!(err, CollectionsError::Source(_)));
    }

    #[tokio::test]
    async fn partial_writes_are_counted() {
        let sources = sources(Some(sheet()));
        let search = FakeSearch::default();
        let history = FakeHistory::default();
        let sink = MemorySink::failing_in(Environment::Production);
        let inputs = RunInputs {
            metadata: &sources,
            control: &sources,
            codes: &sources,
            search: &search,
            history: &history,
            sink: &sink,
        };

        let report = run_collections(&inputs, EnvironmentFilter::Both, &SilentProgress)
            .await
            .unwrap();

        // hvtn writes staging, fails production
        assert_eq!(report.errors, 1);
        assert_eq!(report.metadata_files, 3);
        assert_eq!(report.record_files, 2);
        assert!(report.unmatched_keys.contains("AI073685"));
        assert!(matches!(
            report.outcomes[1],
            ProgramOutcome::Partial { ref file_name, .. } if file_name == "hvtn"
        ));
    }

    #[tokio::test]
    async fn report_serializes_summary_fields() {
        let sources = sources(Some(vec![program("cchi", "U19AI057229")]));
        let search = FakeSearch::default();
        let history = FakeHistory::default();
        let sink = MemorySink::default();
        let inputs = RunInputs {
            metadata: &sources,
            control: &sources,
            codes: &sources,
            search: &search,
            history: &history,
            sink: &sink,
        };

        let report = run_collections(&inputs, EnvironmentFilter::Staging, &SilentProgress)
            .await
            .unwrap();
        let json = serde_json::to_value(&report).unwrap();

        assert_eq!(json["environment"], "staging");
        assert_eq!(json["metadata_files"], 1);
        assert_eq!(json["unmatched_keys"], serde_json::json!(["AI057229"]));
        assert!(json["started_at"].as_str().is_some());
        assert!(json.get("outcomes").is_none());
    }

    #[tokio::test]
    async fn failures_are_isolated_per_program() {
        let sources = sources(Some(sheet()));
        let search = FakeSearch::default();
        let history = FakeHistory::default();
        let sink = MemorySink::failing();
        let inputs = RunInputs {
            metadata: &sources,
            control: &sources,
            codes: &sources,
            search: &search,
            history: &history,
            sink: &sink,
        };

        let report = run_collections(&inputs, EnvironmentFilter::Both, &SilentProgress)
            .await
            .unwrap();
        assert_eq!(report.errors, 3);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.outcomes.len(), 4);
    }
}
