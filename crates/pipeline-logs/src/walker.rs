//! Stage and pod discovery for a resolved build.
//!
//! Stage order comes from the pipeline definition and is never re-derived
//! from pod names. Pods of later stages may not exist yet when the walk
//! starts; they are looked up again, bounded by the wait timeout, when the
//! walk reaches them.

use std::time::Duration;

use tracing::info;

use crate::catalog::pipeline_run_descriptor;
use crate::cluster::ClusterQuery;
use crate::descriptor::{find_stage_pod, BuildDescriptor, PipelineRunBuild, Stage};
use crate::error::{LogsError, Result};
use crate::pod::PodSnapshot;
use crate::retry::retry_until;

/// Stage name reported when the pipeline definition itself is not resolved yet.
const UNRESOLVED_STAGES: &str = "(pipeline tasks)";

/// Finds the pods backing each stage of a build
pub struct StageWalker<'a> {
    query: &'a dyn ClusterQuery,
    retry_interval: Duration,
    wait_timeout: Duration,
}

impl<'a> StageWalker<'a> {
    pub fn new(query: &'a dyn ClusterQuery, retry_interval: Duration, wait_timeout: Duration) -> Self {
        Self {
            query,
            retry_interval,
            wait_timeout,
        }
    }

    /// Stages of `run` in declaration order.
    ///
    /// A run whose pipeline definition has not been resolved by the
    /// controller yet is read again until it has.
    pub async fn stages(&self, run: &PipelineRunBuild) -> Result<Vec<Stage>> {
        if !run.stages.is_empty() {
            return Ok(run.stages.clone());
        }
        info!(build = %run.run, "Waiting for the pipeline definition to be resolved");

        let query = self.query;
        let name = run.run.as_str();
        retry_until(self.retry_interval, self.wait_timeout, move || async move {
            let Some(current) = query.get_pipeline_run(name).await.map_err(|e| e.to_string())? else {
                return Err(format!("pipeline run {name} no longer exists"));
            };
            match pipeline_run_descriptor(query, &current).await.map_err(|e| e.to_string())? {
                BuildDescriptor::PipelineRun(b) if !b.stages.is_empty() => Ok(b.stages),
                _ => Err(format!("pipeline run {name} has no tasks yet")),
            }
        })
        .await
        .map_err(|expired| LogsError::StagePodTimeout {
            stage: UNRESOLVED_STAGES.to_string(),
            run: run.run.clone(),
            elapsed: expired.elapsed,
            last_error: expired.last_error,
        })
    }

    /// The pod backing `stage`, waiting for it to be created if needed.
    ///
    /// Returns `None` when the run has already finished without ever
    /// scheduling the stage (for example after an earlier stage failed).
    pub async fn stage_pod(&self, run: &PipelineRunBuild, stage: &Stage) -> Result<Option<PodSnapshot>> {
        if let Some(pod) = &stage.pod {
            return Ok(Some(pod.clone()));
        }
        info!(
            stage = %stage.name_including_parents(),
            build = %run.run,
            "No pod found yet for stage"
        );

        let query = self.query;
        let name = run.run.as_str();
        let task = stage.task.as_str();
        retry_until(self.retry_interval, self.wait_timeout, move || async move {
            let pods = query.list_stage_pods(name).await.map_err(|e| e.to_string())?;
            let snapshots = pods
                .iter()
                .map(PodSnapshot::from_pod)
                .collect::<Result<Vec<_>>>()
                .map_err(|e| e.to_string())?;
            if let Some(pod) = find_stage_pod(task, &snapshots) {
                return Ok(Some(pod.clone()));
            }
            let finished = query
                .get_pipeline_run(name)
                .await
                .map_err(|e| e.to_string())?
                .is_some_and(|r| r.succeeded_condition().is_some_and(|c| c.status != "Unknown"));
            if finished {
                info!(stage = %task, build = %name, "Build finished without running stage");
                return Ok(None);
            }
            Err(format!("no pod for stage {task} in build {name} exists yet"))
        })
        .await
        .map_err(|expired| LogsError::StagePodTimeout {
            stage: stage.name_including_parents(),
            run: run.run.clone(),
            elapsed: expired.elapsed,
            last_error: expired.last_error,
        })
    }
}
