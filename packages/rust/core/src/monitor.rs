//! Check-then-generate, once or on an interval.

use std::time::Duration;

use tokio::sync::watch;
use tracing::{error, info, instrument, warn};

use collections_search::BuildInfoSource;
use collections_shared::{EnvironmentFilter, Result};

use crate::pipeline::{ProgressReporter, RunInputs, RunReport, SilentProgress, run_collections};
use crate::update::{BuildCheck, BuildLedger, any_update, check_builds, record_builds};

/// Intervals below this get a warning.
pub const MIN_RECOMMENDED_INTERVAL: Duration = Duration::from_secs(60);

/// What one check produced.
#[derive(Debug)]
pub enum CheckOutcome {
    /// No environment has a new build.
    UpToDate(Vec<BuildCheck>),
    /// A run happened and its builds were recorded.
    Generated {
        checks: Vec<BuildCheck>,
        report: RunReport,
    },
}

/// A generation run gated on catalog builds.
pub struct Generator<'a> {
    pub inputs: RunInputs<'a>,
    pub builds: &'a dyn BuildInfoSource,
    pub ledger: &'a BuildLedger,
}

impl Generator<'_> {
    /// Check builds for the filtered environments and run when any is new
    /// (or `force`). The ledger is only written after a successful run.
    #[instrument(skip_all, fields(environment = %filter, force = force))]
    pub async fn check_and_run(
        &self,
        filter: EnvironmentFilter,
        force: bool,
        progress: &dyn ProgressReporter,
    ) -> Result<CheckOutcome> {
        let checks = check_builds(self.builds, self.ledger, &filter.environments(), force).await;
        if !any_update(&checks) {
            info!("no new build detected, no update needed");
            return Ok(CheckOutcome::UpToDate(checks));
        }

        let report = run_collections(&self.inputs, filter, progress).await?;
        record_builds(self.ledger, &checks)?;
        Ok(CheckOutcome::Generated { checks, report })
    }

    /// Check immediately, then every `interval` until `shutdown` turns true.
    ///
    /// A shutdown requested during a check takes effect once that check
    /// finishes. Errors inside one check are logged and the loop continues.
    /// Returns the number of checks performed.
    pub async fn monitor(
        &self,
        filter: EnvironmentFilter,
        interval: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) -> usize {
        if interval < MIN_RECOMMENDED_INTERVAL {
            warn!(
                interval_secs = interval.as_secs(),
                "check interval is under 60 seconds, this may be too frequent"
            );
        }
        info!(environment = %filter, interval_secs = interval.as_secs(), "starting build monitor");

        let mut checks = 0;

        loop {
            checks += 1;
            match self.check_and_run(filter, false, &SilentProgress).await {
                Ok(CheckOutcome::Generated { report, .. }) => info!(
                    metadata_files = report.metadata_files,
                    record_files = report.record_files,
                    "program collections updated"
                ),
                Ok(CheckOutcome::UpToDate(_)) => {}
                Err(e) => error!(error = %e, "program collections update failed"),
            }

            if *shutdown.borrow_and_update() {
                break;
            }

            let stop = tokio::select! {
                changed = shutdown.changed() => changed.is_ok() && *shutdown.borrow(),
                _ = tokio::time::sleep(interval) => false,
            };
            if stop {
                break;
            }
        }

        info!(checks, "build monitor stopped");
        checks
    }
}
