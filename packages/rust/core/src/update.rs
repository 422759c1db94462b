//! Build checks: regenerate only when the catalog publishes a new build.
//!
//! The last build each environment was generated against is kept in
//! `<corrections_dir>/last_{environment}_build.json`, next to the artifacts,
//! so it survives between runs on ephemeral machines.

use std::path::{Path, PathBuf};

use tracing::{info, instrument, warn};

use collections_search::BuildInfoSource;
use collections_shared::{BuildInfo, CollectionsError, Environment, Result};

/// Whether a run is due.
///
/// `force` always runs. Without current build info (fetch failed) nothing
/// runs. Without a recorded build (first run) a run is due. Otherwise a run
/// is due when the build versions differ.
pub fn should_update(current: Option<&BuildInfo>, last: Option<&BuildInfo>, force: bool) -> bool {
    if force {
        return true;
    }
    match (current, last) {
        (None, _) => false,
        (Some(_), None) => true,
        (Some(current), Some(last)) => current.build_version != last.build_version,
    }
}

// ---------------------------------------------------------------------------
// BuildLedger
// ---------------------------------------------------------------------------

/// The per-environment record of the last build a run completed against.
#[derive(Debug, Clone)]
pub struct BuildLedger {
    dir: PathBuf,
}

impl BuildLedger {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self, env: Environment) -> PathBuf {
        self.dir.join(format!("last_{env}_build.json"))
    }

    /// The recorded build, or `None` on first run.
    pub fn load(&self, env: Environment) -> Result<Option<BuildInfo>> {
        let path = self.path(env);
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&path).map_err(|e| CollectionsError::io(&path, e))?;
        let info = serde_json::from_str(&content).map_err(|e| {
            CollectionsError::parse(format!("invalid build ledger {}: {e}", path.display()))
        })?;
        Ok(Some(info))
    }

    pub fn record(&self, env: Environment, info: &BuildInfo) -> Result<()> {
        std::fs::create_dir_all(&self.dir).map_err(|e| CollectionsError::io(&self.dir, e))?;
        let path = self.path(env);
        let json = serde_json::to_string_pretty(info).map_err(|e| {
            CollectionsError::validation(format!("JSON serialization failed: {e}"))
        })?;
        std::fs::write(&path, json).map_err(|e| CollectionsError::io(&path, e))?;
        info!(environment = %env, version = %info.build_version, "recorded build");
        Ok(())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

// ---------------------------------------------------------------------------
// Checks
// ---------------------------------------------------------------------------

/// Result of checking one environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildCheck {
    pub environment: Environment,
    pub current: Option<BuildInfo>,
    pub last: Option<BuildInfo>,
    pub update: bool,
}

/// Check each environment. Fetch or ledger errors degrade to "no info".
#[instrument(skip_all, fields(environments = environments.len(), force = force))]
pub async fn check_builds(
    source: &dyn BuildInfoSource,
    ledger: &BuildLedger,
    environments: &[Environment],
    force: bool,
) -> Vec<BuildCheck> {
    let mut checks = Vec::with_capacity(environments.len());

    for &env in environments {
        let current = match source.build_info(env).await {
            Ok(info) => Some(info),
            Err(e) => {
                warn!(environment = %env, error = %e, "could not fetch build info");
                None
            }
        };
        let last = ledger.load(env).unwrap_or_else(|e| {
            warn!(environment = %env, error = %e, "ignoring unreadable build ledger");
            None
        });

        let update = should_update(current.as_ref(), last.as_ref(), force);
        match (&current, &last) {
            (Some(c), Some(l)) if update => info!(
                environment = %env,
                from = %l.build_version,
                to = %c.build_version,
                "new build detected"
            ),
            (Some(_), None) => info!(environment = %env, "first run for environment"),
            _ => info!(environment = %env, update, "build checked"),
        }

        checks.push(BuildCheck {
            environment: env,
            current,
            last,
            update,
        });
    }

    checks
}

/// A run is due when any environment needs one.
pub fn any_update(checks: &[BuildCheck]) -> bool {
    checks.iter().any(|c| c.update)
}

/// Record the current build of every checked environment that reported one.
pub fn record_builds(ledger: &BuildLedger, checks: &[BuildCheck]) -> Result<()> {
    for check in checks {
        if let Some(current) = &check.current {
            ledger.record(check.environment, current)?;
        }
    }
    Ok(())
}
