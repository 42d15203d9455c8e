//! Error types for build resolution and log streaming.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while resolving a build and following its logs.
#[derive(Debug, Error)]
pub enum LogsError {
    /// No builds or pipeline runs matched the current filter.
    #[error("no {model} have been triggered which match the current filter")]
    EmptyCatalog { model: &'static str },

    /// The identifier matched neither the display names nor the pipeline names.
    #[error("no pipeline found for name {name} in values: {}", known.join(", "))]
    NotFound { name: String, known: Vec<String> },

    /// Waited for a pipeline to appear but it never did.
    #[error(
        "timed out after {elapsed:?} waiting for pipeline {name} to start; last seen: {}",
        last_seen.join(", ")
    )]
    ResolutionTimeout {
        name: String,
        elapsed: Duration,
        last_seen: Vec<String>,
    },

    /// Waited for a stage's pod to be scheduled but it never was.
    #[error("timed out after {elapsed:?} waiting for a pod for stage {stage} in build {run}: {last_error}")]
    StagePodTimeout {
        stage: String,
        run: String,
        elapsed: Duration,
        last_error: String,
    },

    /// A resolved pod has nothing to traverse.
    #[error("no init containers for pod {pod} for build: {build}")]
    NoInitContainers { pod: String, build: String },

    /// A cluster read failed.
    #[error("failed to read {object}: {source}")]
    QueryFailure {
        object: String,
        #[source]
        source: kube::Error,
    },

    /// A pod disappeared while it was being followed.
    #[error("pod {pod} no longer exists")]
    PodGone { pod: String },

    /// A cluster object could not be turned into a build.
    #[error("invalid {object}: {reason}")]
    InvalidObject { object: String, reason: String },

    /// Batch mode requires an identifier.
    #[error("missing argument: {0}")]
    MissingArgument(&'static str),

    /// The wait was cancelled by the caller.
    #[error("cancelled while {0}")]
    Cancelled(String),

    /// The interactive picker failed.
    #[error("picker failed: {0}")]
    Picker(String),

    /// Reading a container's log stream failed.
    #[error("failed to stream log of {pod}/{container}: {reason}")]
    LogStream {
        pod: String,
        container: String,
        reason: String,
    },

    /// Working-directory repository metadata could not be read.
    #[error("git error: {0}")]
    Git(String),

    /// Invalid configuration value.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl LogsError {
    /// Wrap a kube error with the identity of the object being read.
    pub fn query(object: impl Into<String>, source: kube::Error) -> Self {
        Self::QueryFailure {
            object: object.into(),
            source,
        }
    }

    /// Whether a failure converting a single catalog item can be skipped
    /// instead of aborting the whole load.
    pub fn is_item_recoverable(&self) -> bool {
        matches!(self, Self::QueryFailure { .. } | Self::InvalidObject { .. })
    }
}

/// Result alias used across the crate.
pub type Result<T, E = LogsError> = std::result::Result<T, E>;
