//! Nightwatch - trigger-driven system-test scheduling
//!
//! The `nightwatch` command is the invocation surface: each subcommand is
//! one trigger kind, mapped by the library into a run intent.
//!
//! ## Commands
//!
//! - `scheduled`: timer-driven nightly run (full suite, chains the hourly tier)
//! - `manual`: operator-requested run with optional target/jobs overrides
//! - `change`: code-change-triggered smoke run

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use nightwatch::{
    BazelRunner, FsArtifactSink, SchedulePipeline, SchedulerConfig, TargetRegistry, TriggerEvent,
};
use std::path::PathBuf;
use tracing::{info, Level};

#[derive(Parser)]
#[command(name = "nightwatch")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Trigger-driven CI test scheduling", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Target registry file (JSON list of labels and tags)
    #[arg(long, global = true, default_value = "targets.json")]
    registry: PathBuf,

    /// Scheduler config file (defaults apply when omitted)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Job identity used for archive keys
    #[arg(long, global = true, default_value = "system-tests")]
    job: String,

    /// Directory the artifact sink writes into
    #[arg(long, global = true, default_value = ".nightwatch/archive")]
    archive_dir: PathBuf,

    /// Directory bazel writes build-event and profile output into
    #[arg(long, global = true, default_value = ".nightwatch/out")]
    output_dir: PathBuf,

    /// Bazel binary
    #[arg(long, global = true, default_value = "bazel")]
    bazel: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Timer-driven nightly invocation
    Scheduled,

    /// Operator-requested run
    Manual {
        /// Target expression; empty falls back to the smoke target
        #[arg(long, default_value = "")]
        targets: String,

        /// Job count; non-numeric or non-positive falls back to the default
        #[arg(long, default_value = "")]
        jobs: String,
    },

    /// Code-change invocation
    Change {
        /// Changed paths, for audit
        paths: Vec<String>,
    },
}

impl Commands {
    fn into_event(self) -> TriggerEvent {
        match self {
            Commands::Scheduled => TriggerEvent::Scheduled,
            Commands::Manual { targets, jobs } => TriggerEvent::Manual { targets, jobs },
            Commands::Change { paths } => TriggerEvent::RepositoryChange {
                changed_paths: paths,
            },
        }
    }
}

/// Cluster and registry credentials must be present before dispatch; the
/// scheduler uses them opaquely and never validates their content.
fn require_credentials() -> Result<()> {
    for var in ["KUBECONFIG", "REGISTRY_AUTH_FILE"] {
        std::env::var(var).with_context(|| format!("{} must be set before dispatching runs", var))?;
    }
    Ok(())
}

fn load_config(path: Option<&PathBuf>) -> Result<SchedulerConfig> {
    match path {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config {}", path.display()))?;
            serde_json::from_str(&raw)
                .with_context(|| format!("Failed to parse config {}", path.display()))
        }
        None => Ok(SchedulerConfig::default()),
    }
}

fn load_registry(path: &PathBuf) -> Result<TargetRegistry> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read registry {}", path.display()))?;
    TargetRegistry::from_json(&raw)
        .with_context(|| format!("Failed to parse registry {}", path.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    nightwatch::telemetry::init_tracing(cli.json, level);

    let config = load_config(cli.config.as_ref())?;
    let registry = load_registry(&cli.registry)?;
    require_credentials()?;

    let runner = BazelRunner::new(cli.bazel, ".", cli.output_dir);
    let sink =
        FsArtifactSink::new(&cli.archive_dir).context("Failed to create artifact directory")?;

    let event = cli.command.into_event();
    let report =
        SchedulePipeline::run(&runner, &sink, &registry, &config, &cli.job, event).await?;

    info!(
        primary_run_id = %report.primary.run_id,
        primary_status = ?report.primary.status,
        passed = report.primary.passed_count(),
        failed = report.primary.failed_count(),
        chained = report.secondary.is_some(),
        "Schedule pass complete"
    );
    if let (Some(secondary), Some(link)) = (&report.secondary, &report.link) {
        info!(
            secondary_run_id = %secondary.run_id,
            secondary_status = ?secondary.status,
            primary_run_id = %link.primary_run_id,
            "Hourly tier complete"
        );
    }
    for warning in report
        .primary_archive
        .warnings
        .iter()
        .chain(report.secondary_archive.iter().flat_map(|a| &a.warnings))
    {
        eprintln!("archive warning: {}", warning);
    }

    println!("{}", serde_json::to_string_pretty(&report)?);

    if !report.primary_succeeded() {
        anyhow::bail!("primary run finished {:?}", report.primary.status);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_trigger_subcommands() {
        let cli = Cli::parse_from(["nightwatch", "scheduled"]);
        assert!(matches!(cli.command, Commands::Scheduled));

        let cli = Cli::parse_from([
            "nightwatch",
            "manual",
            "--targets",
            "//a:b",
            "--jobs",
            "7",
        ]);
        match cli.command {
            Commands::Manual { targets, jobs } => {
                assert_eq!(targets, "//a:b");
                assert_eq!(jobs, "7");
            }
            _ => panic!("expected manual"),
        }

        let cli = Cli::parse_from(["nightwatch", "change", "rs/consensus/src/lib.rs"]);
        match cli.command {
            Commands::Change { paths } => assert_eq!(paths.len(), 1),
            _ => panic!("expected change"),
        }
    }

    #[test]
    fn test_manual_defaults_are_empty_strings() {
        let cli = Cli::parse_from(["nightwatch", "manual"]);
        match cli.command {
            Commands::Manual { targets, jobs } => {
                assert!(targets.is_empty());
                assert!(jobs.is_empty());
            }
            _ => panic!("expected manual"),
        }
    }

    #[test]
    fn test_load_config_defaults_when_omitted() {
        let config = load_config(None).expect("load failed");
        assert_eq!(config, SchedulerConfig::default());
    }

    #[test]
    fn test_load_registry_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("targets.json");
        std::fs::write(&path, r#"[{ "label": "//a:b", "tags": ["k8s"] }]"#).unwrap();
        let registry = load_registry(&path).expect("load failed");
        assert_eq!(registry.len(), 1);
    }
}
