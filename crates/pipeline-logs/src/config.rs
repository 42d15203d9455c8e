//! Settings for one resolve-and-follow invocation.

use std::time::Duration;

use crate::catalog::DEFAULT_BRANCH;
use crate::cluster::ExecutionModel;
use crate::error::{LogsError, Result};
use crate::filter::BuildFilter;
use crate::retry::{POLL_INTERVAL, RETRY_INTERVAL};

/// Default namespace builds run in.
pub const DEFAULT_NAMESPACE: &str = "jx";

/// Default time to wait for a pipeline or stage pod to be created.
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// How to pick the execution model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Engine {
    /// Detect from the installed CRDs
    #[default]
    Auto,
    Legacy,
    PipelineRun,
}

impl Engine {
    /// The forced model, `None` when it must be detected.
    pub fn forced_model(self) -> Option<ExecutionModel> {
        match self {
            Self::Auto => None,
            Self::Legacy => Some(ExecutionModel::Legacy),
            Self::PipelineRun => Some(ExecutionModel::PipelineRun),
        }
    }
}

/// What to do with a container that never started in a failed pod
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailedPodPolicy {
    /// Ask for the log anyway and warn if nothing came back
    #[default]
    Attempt,
    /// Skip the container with a warning
    Skip,
}

/// Everything the engine needs besides its collaborators
#[derive(Debug, Clone)]
pub struct LogsConfig {
    pub namespace: String,
    pub filter: BuildFilter,
    /// Retry while the pipeline or a stage pod does not exist yet
    pub wait: bool,
    pub wait_timeout: Duration,
    /// Never prompt
    pub batch_mode: bool,
    /// Follow logs until each container terminates
    pub tail: bool,
    pub engine: Engine,
    pub default_branch: String,
    pub failed_pod_policy: FailedPodPolicy,
    pub retry_interval: Duration,
    pub poll_interval: Duration,
}

impl Default for LogsConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            filter: BuildFilter::default(),
            wait: false,
            wait_timeout: DEFAULT_WAIT_TIMEOUT,
            batch_mode: false,
            tail: true,
            engine: Engine::Auto,
            default_branch: DEFAULT_BRANCH.to_string(),
            failed_pod_policy: FailedPodPolicy::Attempt,
            retry_interval: RETRY_INTERVAL,
            poll_interval: POLL_INTERVAL,
        }
    }
}

/// Parse a duration such as `5m`, `90s`, `1h`, `2h30m` or `1m30s`.
///
/// A bare number is taken as minutes.
pub fn parse_duration(s: &str) -> Result<Duration> {
    let s = s.trim().to_lowercase();
    if s.is_empty() {
        return Err(LogsError::Config("empty duration".to_string()));
    }
    let overflow = || LogsError::Config(format!("duration {s} is too large"));
    if let Ok(minutes) = s.parse::<u64>() {
        return minutes.checked_mul(60).map(Duration::from_secs).ok_or_else(overflow);
    }

    let mut total = 0u64;
    let mut digits = String::new();
    for c in s.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
            continue;
        }
        let unit = match c {
            'h' => 3600,
            'm' => 60,
            's' => 1,
            _ => return Err(LogsError::Config(format!("invalid duration unit '{c}' in {s}"))),
        };
        let value: u64 = digits
            .parse()
            .map_err(|_| LogsError::Config(format!("invalid duration {s}")))?;
        total = value
            .checked_mul(unit)
            .and_then(|secs| total.checked_add(secs))
            .ok_or_else(overflow)?;
        digits.clear();
    }
    if !digits.is_empty() {
        return Err(LogsError::Config(format!("missing unit in duration {s}")));
    }
    Ok(Duration::from_secs(total))
}
