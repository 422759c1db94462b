//! Per-program reconciliation: routing, record assembly, emission.

use std::collections::BTreeSet;

use collections_artifacts::{ArtifactMeta, ArtifactSink, CorrectionEmitter};
use collections_grants::{CodeTables, to_canonical_keys};
use collections_search::{
    CorrectionsHistory, MatchReport, PriorRecords, RecordMatcher, RecordSearch,
};
use collections_shared::{
    ControlSets, Environment, EnvironmentFilter, ProgramRecord, RecordId, Result,
};
use tracing::{info, instrument, warn};

// ---------------------------------------------------------------------------
// Routing
// ---------------------------------------------------------------------------

/// Where a program's artifacts go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Write to these environments (possibly none after filtering).
    Active(Vec<Environment>),
    /// Control transferred and not approved: no artifacts at all.
    Skipped,
}

/// Staging always; production too when approved. The filter only removes.
pub fn route(file_name: &str, controls: &ControlSets, filter: EnvironmentFilter) -> Route {
    let approved = controls.is_approved(file_name);
    if controls.is_control_transferred(file_name) && !approved {
        return Route::Skipped;
    }

    let mut targets = vec![Environment::Staging];
    if approved {
        targets.push(Environment::Production);
    }
    Route::Active(targets.into_iter().filter(|env| filter.includes(*env)).collect())
}

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// The record set assembled for one program in one environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordAssembly {
    /// Canonical keys from the funding and prior-grant lists.
    pub keys: BTreeSet<String>,
    pub matches: MatchReport,
    /// Only consulted for control-transferred programs.
    pub prior: Option<PriorRecords>,
    pub records: BTreeSet<RecordId>,
}

/// Artifacts written for one environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentOutcome {
    pub environment: Environment,
    pub metadata: ArtifactMeta,
    /// `None` when the program has no grant keys.
    pub records: Option<ArtifactMeta>,
    pub record_count: usize,
    pub unmatched_keys: Vec<String>,
}

/// An environment whose artifacts could not be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentFailure {
    pub environment: Environment,
    pub error: String,
}

/// What happened to one program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgramOutcome {
    Skipped { file_name: String },
    Emitted {
        file_name: String,
        environments: Vec<EnvironmentOutcome>,
    },
    /// Some environments were written, others failed.
    Partial {
        file_name: String,
        environments: Vec<EnvironmentOutcome>,
        failures: Vec<EnvironmentFailure>,
    },
    Failed { file_name: String, error: String },
}

impl ProgramOutcome {
    pub fn file_name(&self) -> &str {
        match self {
            Self::Skipped { file_name }
            | Self::Emitted { file_name, .. }
            | Self::Partial { file_name, .. }
            | Self::Failed { file_name, .. } => file_name,
        }
    }

    /// Environments whose artifacts were written.
    pub fn written(&self) -> &[EnvironmentOutcome] {
        match self {
            Self::Emitted { environments, .. } | Self::Partial { environments, .. } => {
                environments
            }
            Self::Skipped { .. } | Self::Failed { .. } => &[],
        }
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Read-only run state plus the collaborators a program needs.
pub struct ReconciliationEngine<'a> {
    pub tables: &'a CodeTables,
    pub controls: &'a ControlSets,
    pub search: &'a dyn RecordSearch,
    pub history: &'a dyn CorrectionsHistory,
    pub sink: &'a dyn ArtifactSink,
    pub filter: EnvironmentFilter,
}

impl ReconciliationEngine<'_> {
    pub fn route(&self, program: &ProgramRecord) -> Route {
        route(program.file_name(), self.controls, self.filter)
    }

    /// Keys of `fundingIDList` united with keys of `PriorProjectGrantIDs`.
    pub fn base_grants(&self, program: &ProgramRecord) -> BTreeSet<String> {
        let mut keys = to_canonical_keys(program.funding_id_list.as_deref(), self.tables);
        keys.extend(to_canonical_keys(
            program.prior_project_grant_ids.as_deref(),
            self.tables,
        ));
        keys
    }

    /// Match the program's keys in `env`, adding prior records when control-transferred.
    pub async fn assemble_records(
        &self,
        program: &ProgramRecord,
        keys: BTreeSet<String>,
        env: Environment,
    ) -> RecordAssembly {
        let matches = RecordMatcher::new(self.search).match_keys(&keys, env).await;
        let mut records = matches.record_ids();

        let prior = if self.controls.is_control_transferred(program.file_name()) {
            let prior = self.history.prior_records(program.file_name(), env).await;
            if let PriorRecords::Unavailable(error) = &prior {
                warn!(
                    file_name = program.file_name(),
                    environment = %env,
                    %error,
                    "prior records unavailable, using matched records only"
                );
            }
            records.extend(prior.ids().cloned());
            Some(prior)
        } else {
            None
        };

        RecordAssembly {
            keys,
            matches,
            prior,
            records,
        }
    }

    /// Assemble and write one environment's artifacts. Without grant keys
    /// only the metadata file is written.
    pub async fn reconcile_environment(
        &self,
        program: &ProgramRecord,
        env: Environment,
    ) -> Result<EnvironmentOutcome> {
        let keys = self.base_grants(program);
        let assembly = if keys.is_empty() {
            warn!(file_name = program.file_name(), environment = %env, "no grants found, skipping records file");
            None
        } else {
            Some(self.assemble_records(program, keys, env).await)
        };

        let emitted = CorrectionEmitter::new(self.sink).emit(
            program,
            assembly.as_ref().map(|a| &a.records),
            env,
        )?;

        Ok(EnvironmentOutcome {
            environment: env,
            metadata: emitted.metadata,
            records: emitted.records,
            record_count: assembly.as_ref().map_or(0, |a| a.records.len()),
            unmatched_keys: assembly
                .as_ref()
                .map(|a| {
                    a.matches
                        .unmatched_keys()
                        .into_iter()
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
        })
    }

    /// Route the program and write every applicable environment.
    /// Failures are captured in the outcome, never propagated.
    #[instrument(skip_all, fields(file_name = program.file_name()))]
    pub async fn reconcile(&self, program: &ProgramRecord) -> ProgramOutcome {
        let file_name = program.file_name().to_string();

        let environments = match self.route(program) {
            Route::Skipped => {
                info!("control transferred and not approved for production, skipping");
                return ProgramOutcome::Skipped { file_name };
            }
            Route::Active(environments) => environments,
        };

        let mut outcomes = Vec::with_capacity(environments.len());
        let mut failures = Vec::new();
        for env in environments {
            match self.reconcile_environment(program, env).await {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => {
                    warn!(environment = %env, error = %e, "environment failed");
                    failures.push(EnvironmentFailure {
                        environment: env,
                        error: e.to_string(),
                    });
                }
            }
        }

        match (outcomes.is_empty(), failures.is_empty()) {
            (_, true) => ProgramOutcome::Emitted {
                file_name,
                environments: outcomes,
            },
            (true, false) => ProgramOutcome::Failed {
                file_name,
                error: failures
                    .iter()
                    .map(|f| format!("{}: {}", f.environment, f.error))
                    .collect::<Vec<_>>()
                    .join("; "),
            },
            (false, false) => ProgramOutcome::Partial {
                file_name,
                environments: outcomes,
                failures,
            },
        }
    }
}
