//! CLI for following build logs
//!
//! Run `pipeline-logs --help` for usage information.

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use pipeline_logs::config::{parse_duration, DEFAULT_NAMESPACE};
use pipeline_logs::git::current_repository;
use pipeline_logs::{
    detect_model, resolve, BuildFilter, Engine, FailedPodPolicy, KubeCluster, KubeLogTail, LogFollower,
    LogsConfig, NoPicker, Picker, TerminalPicker, TerminalSink,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "pipeline-logs")]
#[command(about = "Display a build log")]
#[command(version)]
#[command(after_help = "Examples:
  # Pick a build to view the log of
  pipeline-logs

  # Pick a pending build on the repo cheese
  pipeline-logs --repo cheese -p

  # Follow the newest build of a pipeline, waiting for it to start
  pipeline-logs -w acme/cheese/PR-1234")]
struct Cli {
    /// Build display name (`owner/repo/branch #build`) or pipeline name
    identifier: Option<String>,

    /// Tails the build log to the current terminal
    #[arg(short, long, default_value_t = true, action = clap::ArgAction::Set)]
    tail: bool,

    /// Waits for the build to start before failing
    #[arg(short, long)]
    wait: bool,

    /// Timeout period waiting for the given pipeline to be created
    #[arg(short = 'd', long, default_value = "5m", value_parser = parse_wait_duration)]
    wait_duration: Duration,

    /// Only display logs which are currently pending to choose from if no build name is supplied
    #[arg(short, long)]
    pending: bool,

    /// Filters all the available jobs by those that contain the given text
    #[arg(short, long, default_value = "")]
    filter: String,

    /// Filters the owner (person/organisation) of the repository
    #[arg(short, long, default_value = "")]
    owner: String,

    /// Filters the build repository
    #[arg(short, long, default_value = "")]
    repo: String,

    /// Filters the branch
    #[arg(long, default_value = "")]
    branch: String,

    /// The build number to view
    #[arg(long, default_value = "")]
    build: String,

    /// Display logs using current folder as repo name, and parent folder as owner
    #[arg(short, long)]
    current: bool,

    /// Namespace builds run in
    #[arg(short, long, env = "PIPELINE_LOGS_NAMESPACE", default_value = DEFAULT_NAMESPACE)]
    namespace: String,

    /// Never prompt; an identifier is required
    #[arg(short, long)]
    batch_mode: bool,

    /// Execution model of the builds
    #[arg(long, value_enum, default_value_t = EngineArg::Auto)]
    engine: EngineArg,

    /// Branch whose newest build is preselected
    #[arg(long, default_value = "master")]
    default_branch: String,

    /// Skip containers that never started in a failed pod instead of asking for their log
    #[arg(long)]
    skip_unstarted: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Clone, Copy, Default, clap::ValueEnum)]
enum EngineArg {
    #[default]
    Auto,
    Legacy,
    PipelineRun,
}

impl From<EngineArg> for Engine {
    fn from(arg: EngineArg) -> Self {
        match arg {
            EngineArg::Auto => Self::Auto,
            EngineArg::Legacy => Self::Legacy,
            EngineArg::PipelineRun => Self::PipelineRun,
        }
    }
}

fn parse_wait_duration(s: &str) -> Result<Duration, String> {
    parse_duration(s).map_err(|e| e.to_string())
}

impl Cli {
    fn into_config(self) -> Result<(Option<String>, LogsConfig)> {
        let mut filter = BuildFilter {
            pending: self.pending,
            filter: self.filter,
            owner: self.owner,
            repository: self.repo,
            branch: self.branch,
            build: self.build,
        };

        if self.current {
            let repo = current_repository(None).context("Failed to read current folder repository")?;
            debug!(owner = %repo.owner, repository = %repo.name, "Using current folder repository");
            filter.owner = repo.owner;
            filter.repository = repo.name;
        }

        let config = LogsConfig {
            namespace: self.namespace,
            filter,
            wait: self.wait,
            wait_timeout: self.wait_duration,
            batch_mode: self.batch_mode,
            tail: self.tail,
            engine: self.engine.into(),
            default_branch: self.default_branch,
            failed_pod_policy: if self.skip_unstarted {
                FailedPodPolicy::Skip
            } else {
                FailedPodPolicy::Attempt
            },
            ..LogsConfig::default()
        };
        Ok((self.identifier, config))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter)
        .init();

    let (identifier, config) = cli.into_config()?;

    let client = kube::Client::try_default()
        .await
        .context("Failed to create Kubernetes client")?;
    let cluster = KubeCluster::new(client.clone(), &config.namespace);
    let tail = KubeLogTail::new(client, &config.namespace);

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted");
            on_interrupt.cancel();
        }
    });

    let model = detect_model(&cluster, config.engine.forced_model()).await?;
    info!(namespace = %cluster.namespace(), model = model.describe(), "Looking for builds");

    let picker: &dyn Picker = if config.batch_mode { &NoPicker } else { &TerminalPicker };
    let resolution = resolve(&cluster, identifier.as_deref(), model, &config, picker).await?;

    let summary = LogFollower::new(&cluster, &tail, &config, cancel)
        .follow(&resolution, &mut TerminalSink)
        .await?;
    debug!(
        units = summary.units,
        skipped = summary.skipped,
        failures = summary.upstream_failures.len(),
        "Finished following build"
    );

    Ok(())
}
