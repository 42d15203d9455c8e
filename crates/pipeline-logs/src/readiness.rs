//! Waiting for init containers to start, and reporting upstream failures.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::cluster::ClusterQuery;
use crate::error::{LogsError, Result};
use crate::pod::PodSnapshot;
use crate::retry::poll_until;

/// A container that exited non-zero before the next one was followed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamFailure {
    pub pod: String,
    pub container: String,
    pub exit_code: i32,
    pub message: Option<String>,
}

/// Non-zero exit of the init container at `index`, if it has terminated.
pub fn upstream_failure(pod: &PodSnapshot, index: usize) -> Option<UpstreamFailure> {
    let status = pod.init_container_status(index)?;
    let terminated = status.terminated.as_ref()?;
    (terminated.exit_code != 0).then(|| UpstreamFailure {
        pod: pod.name.clone(),
        container: status.name.clone(),
        exit_code: terminated.exit_code,
        message: terminated.message.clone(),
    })
}

/// Read the current state of a pod, failing if it has gone.
pub async fn read_pod(query: &dyn ClusterQuery, name: &str) -> Result<PodSnapshot> {
    let pod = query
        .get_pod(name)
        .await?
        .ok_or_else(|| LogsError::PodGone {
            pod: name.to_string(),
        })?;
    PodSnapshot::from_pod(&pod)
}

/// Wait until the init container at `index` has started or the pod failed.
///
/// Returns immediately when either is already true of `pod`. Otherwise polls
/// every `interval` with no deadline; `cancel` is the only way out besides
/// the container starting, the pod failing, or a read error.
pub async fn await_start(
    query: &dyn ClusterQuery,
    pod: PodSnapshot,
    index: usize,
    interval: Duration,
    cancel: &CancellationToken,
) -> Result<PodSnapshot> {
    if pod.is_failed() {
        warn!(pod = %pod.name, "Pod has failed");
        return Ok(pod);
    }
    if pod.has_init_container_started(index) {
        return Ok(pod);
    }

    let container = pod.init_containers.get(index).cloned().unwrap_or_default();
    info!(pod = %pod.name, container = %container, "Waiting for init container to start...");

    let name = pod.name.as_str();
    let what = format!("waiting for pod {name} init container {container} to start");
    poll_until(interval, cancel, &what, move || async move {
        let current = read_pod(query, name).await?;
        if current.is_failed() {
            warn!(pod = %name, "Pod has failed");
            return Ok(Some(current));
        }
        Ok(current.has_init_container_started(index).then_some(current))
    })
    .await
}
