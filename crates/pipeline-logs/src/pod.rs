//! Simplified pod representation used while walking build containers.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use k8s_openapi::api::core::v1::{ContainerStatus, Pod};

use crate::error::{LogsError, Result};

/// Pod lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PodPhase {
    Pending,
    Running,
    Succeeded,
    Failed,
    #[default]
    Unknown,
}

impl PodPhase {
    fn parse(phase: Option<&str>) -> Self {
        match phase {
            Some("Pending") => Self::Pending,
            Some("Running") => Self::Running,
            Some("Succeeded") => Self::Succeeded,
            Some("Failed") => Self::Failed,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for PodPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "Pending"),
            Self::Running => write!(f, "Running"),
            Self::Succeeded => write!(f, "Succeeded"),
            Self::Failed => write!(f, "Failed"),
            Self::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Final state of a container that has exited
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Terminated {
    pub exit_code: i32,
    pub message: Option<String>,
}

/// Status of one init container
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InitContainerStatus {
    pub name: String,
    pub started: bool,
    pub terminated: Option<Terminated>,
}

impl From<&ContainerStatus> for InitContainerStatus {
    fn from(status: &ContainerStatus) -> Self {
        let state = status.state.as_ref();
        let running = state.is_some_and(|s| s.running.is_some());
        let terminated = state
            .and_then(|s| s.terminated.as_ref())
            .map(|t| Terminated {
                exit_code: t.exit_code,
                message: t.message.clone().filter(|m| !m.is_empty()),
            });

        Self {
            name: status.name.clone(),
            started: status.started.unwrap_or(false) || running || terminated.is_some(),
            terminated,
        }
    }
}

/// Point-in-time view of a build pod
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PodSnapshot {
    pub name: String,
    pub phase: PodPhase,
    /// Declared init container names, in declaration order.
    pub init_containers: Vec<String>,
    pub init_container_statuses: Vec<InitContainerStatus>,
    pub labels: BTreeMap<String, String>,
    pub created: Option<DateTime<Utc>>,
}

impl PodSnapshot {
    /// Build a snapshot from a Kubernetes pod.
    pub fn from_pod(pod: &Pod) -> Result<Self> {
        let name = pod
            .metadata
            .name
            .clone()
            .ok_or_else(|| LogsError::InvalidObject {
                object: "pod".to_string(),
                reason: "missing metadata.name".to_string(),
            })?;

        let init_containers = pod
            .spec
            .as_ref()
            .and_then(|s| s.init_containers.as_ref())
            .map(|containers| containers.iter().map(|c| c.name.clone()).collect())
            .unwrap_or_default();

        let status = pod.status.as_ref();
        let init_container_statuses = status
            .and_then(|s| s.init_container_statuses.as_ref())
            .map(|statuses| statuses.iter().map(InitContainerStatus::from).collect())
            .unwrap_or_default();

        Ok(Self {
            name,
            phase: PodPhase::parse(status.and_then(|s| s.phase.as_deref())),
            init_containers,
            init_container_statuses,
            labels: pod.metadata.labels.clone().unwrap_or_default(),
            created: pod.metadata.creation_timestamp.as_ref().map(|t| t.0),
        })
    }

    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels.get(key).map(String::as_str)
    }

    pub fn is_failed(&self) -> bool {
        self.phase == PodPhase::Failed
    }

    /// Status of the init container at `index`, matched by name.
    ///
    /// The status list may be partial while the pod is initializing, so a
    /// container without a status of its own has none.
    pub fn init_container_status(&self, index: usize) -> Option<&InitContainerStatus> {
        let name = self.init_containers.get(index)?;
        self.init_container_statuses
            .iter()
            .find(|status| &status.name == name)
    }

    pub fn has_init_container_started(&self, index: usize) -> bool {
        self.init_container_status(index).is_some_and(|s| s.started)
    }
}
