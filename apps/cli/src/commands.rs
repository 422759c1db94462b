//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use collections_artifacts::FsArtifactSink;
use collections_core::monitor::{CheckOutcome, Generator};
use collections_core::pipeline::{ProgressReporter, RunInputs, RunReport};
use collections_core::update::BuildLedger;
use collections_grants::ParseOutcome;
use collections_search::{ApiClient, CorrectionsHistory, HttpHistory, LocalHistory};
use collections_shared::{
    AppConfig, EnvironmentFilter, NOT_FOUND, SearchConfig, init_config, load_config,
    load_config_from, locate_corrections_dir,
};
use collections_sources::{CodeTableSource, ConfiguredSources, build_client};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::watch;
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// Program collections: link NIAID programs to the datasets their grants funded.
#[derive(Parser)]
#[command(
    name = "program-collections",
    version,
    about = "Generate program collection corrections for the NIAID Data Discovery Portal.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Config file (defaults to ~/.program-collections/collections.toml).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Where the data files and corrections checkout live.
#[derive(Args, Clone, Debug)]
pub(crate) struct LocationArgs {
    /// Directory the data directory is resolved against (defaults to cwd).
    #[arg(long)]
    pub base_path: Option<PathBuf>,

    /// Corrections repository checkout (overrides config and discovery).
    #[arg(long)]
    pub corrections_dir: Option<PathBuf>,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Check for a new catalog build and generate corrections.
    Run {
        /// Environments to generate for: staging, production, or both.
        #[arg(short, long, default_value = "both")]
        environment: EnvironmentFilter,

        /// Generate even when no new build is detected.
        #[arg(long)]
        force_update: bool,

        /// Print the run report as JSON instead of a summary.
        #[arg(long)]
        json: bool,

        #[command(flatten)]
        location: LocationArgs,
    },

    /// Check for new builds periodically and generate when one appears.
    Monitor {
        /// Seconds between checks (defaults to [monitor] interval_secs).
        #[arg(short, long)]
        interval: Option<u64>,

        /// Environments to watch: staging, production, or both.
        #[arg(short, long, default_value = "both")]
        environment: EnvironmentFilter,

        #[command(flatten)]
        location: LocationArgs,
    },

    /// Parse grant identifiers with the configured code tables.
    Parse {
        /// Grant identifiers to parse.
        #[arg(required = true)]
        grants: Vec<String>,

        /// Directory the data directory is resolved against (defaults to cwd).
        #[arg(long)]
        base_path: Option<PathBuf>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "warn,collections=info",
        1 => "warn,collections=debug",
        _ => "warn,collections=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt().with_env_filter(env_filter).with_target(false).init();
        }
        LogFormat::Json => {
            fmt().json().with_env_filter(env_filter).init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };

    match cli.command {
        Command::Run {
            environment,
            force_update,
            json,
            location,
        } => cmd_run(&config, environment, force_update, json, &location).await,
        Command::Monitor {
            interval,
            environment,
            location,
        } => cmd_monitor(&config, interval, environment, &location).await,
        Command::Parse { grants, base_path } => {
            cmd_parse(&config, &grants, base_path.as_deref()).await
        }
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(&config),
        },
    }
}

// ---------------------------------------------------------------------------
// Wiring
// ---------------------------------------------------------------------------

fn resolve_base_path(base_path: Option<&Path>) -> Result<PathBuf> {
    match base_path {
        Some(p) => Ok(p.to_path_buf()),
        None => std::env::current_dir()
            .map_err(|e| eyre!("cannot determine working directory: {e}")),
    }
}

/// The concrete collaborators behind one generator.
struct Wiring {
    sources: ConfiguredSources,
    api: ApiClient,
    history: Box<dyn CorrectionsHistory>,
    sink: FsArtifactSink,
    ledger: BuildLedger,
}

impl Wiring {
    fn new(config: &AppConfig, location: &LocationArgs) -> Result<Self> {
        let base_path = resolve_base_path(location.base_path.as_deref())?;
        let data_dir = base_path.join(&config.paths.data_dir);

        let mut paths = config.paths.clone();
        if let Some(dir) = &location.corrections_dir {
            paths.corrections_dir = Some(dir.clone());
        }
        let corrections_dir = locate_corrections_dir(&base_path, &paths)?;

        let history: Box<dyn CorrectionsHistory> = if config.history.local {
            Box::new(LocalHistory::new(corrections_dir.clone()))
        } else {
            let client = build_client(Duration::from_secs(config.api.timeout_secs))?;
            Box::new(HttpHistory::new(config.history.base_url.clone(), client))
        };

        info!(
            data_dir = %data_dir.display(),
            corrections_dir = %corrections_dir.display(),
            history = if config.history.local { "local" } else { "remote" },
            "resolved locations"
        );

        Ok(Self {
            sources: ConfiguredSources::from_config(config, &data_dir)?,
            api: ApiClient::new(SearchConfig::from(config))?,
            history,
            sink: FsArtifactSink::new(&corrections_dir),
            ledger: BuildLedger::new(corrections_dir),
        })
    }

    fn generator(&self) -> Generator<'_> {
        Generator {
            inputs: RunInputs {
                metadata: &self.sources.metadata,
                control: &self.sources.control,
                codes: &self.sources.codes,
                search: &self.api,
                history: self.history.as_ref(),
                sink: &self.sink,
            },
            builds: &self.api,
            ledger: &self.ledger,
        }
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_run(
    config: &AppConfig,
    environment: EnvironmentFilter,
    force_update: bool,
    json: bool,
    location: &LocationArgs,
) -> Result<()> {
    let wiring = Wiring::new(config, location)?;

    info!(%environment, force_update, "running program collections");

    let reporter = CliProgress::new();
    let outcome = wiring
        .generator()
        .check_and_run(environment, force_update, &reporter)
        .await;
    reporter.spinner.finish_and_clear();
    let outcome = outcome?;

    match outcome {
        CheckOutcome::UpToDate(_) => {
            println!("No new build detected; corrections are up to date.");
            println!("Use --force-update to regenerate anyway.");
        }
        CheckOutcome::Generated { report, .. } if json => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        CheckOutcome::Generated { report, .. } => print_report(&report, wiring.sink.root()),
    }

    Ok(())
}

async fn cmd_monitor(
    config: &AppConfig,
    interval: Option<u64>,
    environment: EnvironmentFilter,
    location: &LocationArgs,
) -> Result<()> {
    let wiring = Wiring::new(config, location)?;
    let interval = Duration::from_secs(interval.unwrap_or(config.monitor.interval_secs));

    let shutdown = shutdown_signal()?;

    println!(
        "Monitoring {environment} builds every {}s (Ctrl-C to stop)",
        interval.as_secs()
    );

    let checks = wiring.generator().monitor(environment, interval, shutdown).await;
    println!("Monitor stopped after {checks} checks.");
    Ok(())
}

/// A flag that turns true on SIGINT or SIGTERM. Handlers are installed
/// before returning, so a signal during the first check is not lost.
#[cfg(unix)]
fn shutdown_signal() -> Result<watch::Receiver<bool>> {
    use tokio::signal::unix::{SignalKind, signal};

    let (stop, shutdown) = watch::channel(false);
    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;

    tokio::spawn(async move {
        let name = tokio::select! {
            _ = interrupt.recv() => "SIGINT",
            _ = terminate.recv() => "SIGTERM",
        };
        info!(signal = name, "shutdown requested, stopping after the current check");
        stop.send_replace(true);
    });

    Ok(shutdown)
}

#[cfg(not(unix))]
fn shutdown_signal() -> Result<watch::Receiver<bool>> {
    let (stop, shutdown) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown requested, stopping after the current check");
            stop.send_replace(true);
        }
    });
    Ok(shutdown)
}

async fn cmd_parse(config: &AppConfig, grants: &[String], base_path: Option<&Path>) -> Result<()> {
    let base_path = resolve_base_path(base_path)?;
    let sources = ConfiguredSources::from_config(config, &base_path.join(&config.paths.data_dir))?;
    let tables = sources.codes.load_code_tables().await?;

    if tables.activity.is_empty() || tables.ic.is_empty() {
        println!(
            "warning: code tables are empty ({} activity, {} IC); components will not resolve",
            tables.activity.len(),
            tables.ic.len()
        );
    }

    for raw in grants {
        let outcome = tables.parse(raw);
        let kind = match &outcome {
            ParseOutcome::Grant(_) => "grant",
            ParseOutcome::Contract(_) => "contract",
            ParseOutcome::Degraded { .. } => "unresolved",
        };
        let grant = outcome.grant();
        let component = |value: Option<&str>| value.unwrap_or(NOT_FOUND).to_string();

        println!();
        println!("  Grant:            {} ({kind})", grant.grant_id);
        println!(
            "  Application type: {}",
            grant
                .application_type_code
                .map(String::from)
                .unwrap_or_else(|| NOT_FOUND.to_string())
        );
        println!("  Activity code:    {}", component(grant.activity_code.as_deref()));
        println!("  IC code:          {}", component(grant.ic_code.as_deref()));
        println!("  Serial number:    {}", component(grant.serial_number.as_deref()));
        println!("  Support year:     {}", component(grant.support_year.as_deref()));
        println!("  Canonical key:    {}", outcome.canonical_key());
    }
    println!();

    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(config: &AppConfig) -> Result<()> {
    let toml_str = toml::to_string_pretty(config)?;
    println!("{toml_str}");
    Ok(())
}

fn print_report(report: &RunReport, corrections_dir: &Path) {
    println!();
    println!("  Program collections generated!");
    println!("  Run:         {}", report.run_id);
    println!(
        "  Started:     {}",
        report.started_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    println!("  Environment: {}", report.environment);
    println!(
        "  Programs:    {} valid of {}",
        report.programs_valid, report.programs_total
    );
    println!("  Metadata:    {}", report.metadata_files);
    println!("  Records:     {}", report.record_files);
    println!("  Skipped:     {}", report.skipped);
    println!("  Errors:      {}", report.errors);
    if !report.unmatched_keys.is_empty() {
        let keys: Vec<&str> = report.unmatched_keys.iter().map(String::as_str).collect();
        println!("  Unmatched:   {}", keys.join(", "));
    }
    println!("  Output:      {}", corrections_dir.display());
    println!("  Time:        {:.1}s", report.elapsed.as_secs_f64());
    println!();
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        spinner.set_style(style);
        spinner.enable_steady_tick(Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn program_done(&self, file_name: &str, current: usize, total: usize) {
        self.spinner
            .set_message(format!("Reconciled [{current}/{total}] {file_name}"));
    }

    fn done(&self, _report: &RunReport) {
        self.spinner.finish_and_clear();
    }
}
