//! Follows the logs of a resolved build, unit by unit, in execution order.

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cluster::ClusterQuery;
use crate::config::{FailedPodPolicy, LogsConfig};
use crate::descriptor::{units_for_pod, BuildDescriptor, PipelineRunBuild};
use crate::error::{LogsError, Result};
use crate::logs::LogTail;
use crate::output::{LogSink, UnitHeader};
use crate::pod::PodSnapshot;
use crate::readiness::{await_start, read_pod, upstream_failure, UpstreamFailure};
use crate::selector::Resolution;
use crate::walker::StageWalker;

/// What a follow visited
#[derive(Debug, Default)]
pub struct FollowSummary {
    /// Units whose log was requested.
    pub units: usize,
    /// Units skipped because their pod failed before they started.
    pub skipped: usize,
    /// Containers reported as having exited non-zero.
    pub upstream_failures: Vec<UpstreamFailure>,
}

/// Streams every unit of a build, one after the other
pub struct LogFollower<'a> {
    query: &'a dyn ClusterQuery,
    tail: &'a dyn LogTail,
    config: &'a LogsConfig,
    cancel: CancellationToken,
}

impl<'a> LogFollower<'a> {
    pub fn new(
        query: &'a dyn ClusterQuery,
        tail: &'a dyn LogTail,
        config: &'a LogsConfig,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            query,
            tail,
            config,
            cancel,
        }
    }

    /// Visit every unit of `resolution` in global visiting order.
    ///
    /// A non-zero exit of an earlier unit is reported to `sink` and does not
    /// stop the walk. Any error aborts before further units are visited.
    pub async fn follow(&self, resolution: &Resolution, sink: &mut dyn LogSink) -> Result<FollowSummary> {
        let title = resolution.title();
        info!(build = %title, "Following build logs");
        sink.build(&title);

        let mut summary = FollowSummary::default();
        match &resolution.build {
            BuildDescriptor::Legacy(build) => {
                self.follow_pod(&title, None, &build.pod, sink, &mut summary)
                    .await?;
            }
            BuildDescriptor::PipelineRun(run) => {
                self.follow_stages(&title, run, sink, &mut summary).await?;
            }
        }
        Ok(summary)
    }

    async fn follow_stages(
        &self,
        title: &str,
        run: &PipelineRunBuild,
        sink: &mut dyn LogSink,
        summary: &mut FollowSummary,
    ) -> Result<()> {
        let walker = StageWalker::new(self.query, self.config.retry_interval, self.config.wait_timeout);
        let mut previous: Option<PodSnapshot> = None;

        for stage in walker.stages(run).await? {
            if let Some(prev) = previous.take() {
                self.check_stage_exit(&prev, sink, summary).await?;
            }
            let Some(pod) = walker.stage_pod(run, &stage).await? else {
                continue;
            };
            let stage_name = stage.name_including_parents();
            self.follow_pod(title, Some(&stage_name), &pod, sink, summary)
                .await?;
            previous = Some(pod);
        }
        Ok(())
    }

    /// Report the last container of a finished stage if it exited non-zero.
    async fn check_stage_exit(
        &self,
        pod: &PodSnapshot,
        sink: &mut dyn LogSink,
        summary: &mut FollowSummary,
    ) -> Result<()> {
        let Some(last) = pod.init_containers.len().checked_sub(1) else {
            return Ok(());
        };
        let current = match read_pod(self.query, &pod.name).await {
            Ok(current) => current,
            Err(LogsError::PodGone { pod }) => {
                debug!(pod = %pod, "Previous stage pod is gone");
                return Ok(());
            }
            Err(e) => return Err(e),
        };
        if let Some(failure) = upstream_failure(&current, last) {
            report(&failure, sink, summary);
        }
        Ok(())
    }

    async fn follow_pod(
        &self,
        title: &str,
        stage: Option<&str>,
        pod: &PodSnapshot,
        sink: &mut dyn LogSink,
        summary: &mut FollowSummary,
    ) -> Result<()> {
        let units = units_for_pod(stage.map(str::to_string), pod, title)?;

        for unit in &units {
            let current = read_pod(self.query, &pod.name).await?;
            if unit.index > 0 {
                if let Some(failure) = upstream_failure(&current, unit.index - 1) {
                    report(&failure, sink, summary);
                }
            }

            let current = await_start(
                self.query,
                current,
                unit.index,
                self.config.poll_interval,
                &self.cancel,
            )
            .await?;

            let started = current.has_init_container_started(unit.index);
            if !started && self.config.failed_pod_policy == FailedPodPolicy::Skip {
                warn!(
                    pod = %pod.name,
                    container = %unit.container,
                    "Skipping container that never started in failed pod"
                );
                summary.skipped += 1;
                continue;
            }

            sink.unit(&UnitHeader {
                build: title,
                stage,
                pod: &pod.name,
                container: &unit.container,
            });
            summary.units += 1;

            let streamed = tokio::select! {
                () = self.cancel.cancelled() => {
                    return Err(LogsError::Cancelled(format!("streaming {}/{}", pod.name, unit.container)));
                }
                result = self.tail.tail(&pod.name, &unit.container, self.config.tail, sink) => result,
            };

            match streamed {
                Ok(0) if !started => {
                    warn!(container = %unit.container, "No log output; container never started");
                }
                Ok(lines) => debug!(container = %unit.container, lines, "Finished container log"),
                Err(e) if !started => {
                    warn!(container = %unit.container, error = %e, "No log available; container never started");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}

fn report(failure: &UpstreamFailure, sink: &mut dyn LogSink, summary: &mut FollowSummary) {
    warn!(
        container = %failure.container,
        exit_code = failure.exit_code,
        termination_message = failure.message.as_deref().unwrap_or_default(),
        "Container failed"
    );
    sink.upstream_failure(failure);
    summary.upstream_failures.push(failure.clone());
}
