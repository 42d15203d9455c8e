//! Build descriptors: one representation for legacy single-pod builds and
//! multi-stage pipeline runs.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};

use crate::crd::{PipelineRun, LABEL_PIPELINE_TASK};
use crate::error::{LogsError, Result};
use crate::pod::{PodPhase, PodSnapshot};

pub const LABEL_OWNER: &str = "owner";
pub const LABEL_REPOSITORY: &str = "repository";
pub const LABEL_BRANCH: &str = "branch";
pub const LABEL_BUILD: &str = "build";
pub const LABEL_CONTEXT: &str = "context";

/// Label selector matching every legacy build pod.
pub const BUILD_POD_SELECTOR: &str = "owner,repository,branch,build";

/// Coarse build state used by the pending filter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
    Unknown,
}

impl BuildStatus {
    pub fn is_pending(self) -> bool {
        matches!(self, Self::Pending | Self::Running)
    }
}

impl From<PodPhase> for BuildStatus {
    fn from(phase: PodPhase) -> Self {
        match phase {
            PodPhase::Pending => Self::Pending,
            PodPhase::Running => Self::Running,
            PodPhase::Succeeded => Self::Succeeded,
            PodPhase::Failed => Self::Failed,
            PodPhase::Unknown => Self::Unknown,
        }
    }
}

impl fmt::Display for BuildStatus {
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

/// Identity of a build, read from its labels
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BuildMeta {
    pub owner: String,
    pub repository: String,
    pub branch: String,
    /// Build number as labelled (may be non-numeric on malformed objects).
    pub build: String,
    pub context: String,
    pub created: Option<DateTime<Utc>>,
}

impl BuildMeta {
    pub fn from_labels(labels: &BTreeMap<String, String>, created: Option<DateTime<Utc>>) -> Self {
        let get = |key: &str| labels.get(key).cloned().unwrap_or_default();
        Self {
            owner: get(LABEL_OWNER),
            repository: get(LABEL_REPOSITORY),
            branch: get(LABEL_BRANCH),
            build: get(LABEL_BUILD),
            context: get(LABEL_CONTEXT),
            created,
        }
    }

    /// `owner/repository/branch`
    pub fn pipeline_name(&self) -> String {
        format!("{}/{}/{}", self.owner, self.repository, self.branch)
    }

    pub fn build_number(&self) -> u64 {
        self.build.parse().unwrap_or(0)
    }
}

/// A build run entirely inside one pod
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyBuild {
    pub meta: BuildMeta,
    pub pod: PodSnapshot,
}

impl LegacyBuild {
    pub fn from_pod(pod: PodSnapshot) -> Self {
        Self {
            meta: BuildMeta::from_labels(&pod.labels, pod.created),
            pod,
        }
    }
}

/// One named phase of a pipeline run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stage {
    /// Pipeline task name; the key used to find the stage's pod.
    pub task: String,
    pub name: String,
    pub parents: Vec<String>,
    /// Unset until the controller schedules the stage.
    pub pod: Option<PodSnapshot>,
}

impl Stage {
    /// `Parent / Child` display name.
    pub fn name_including_parents(&self) -> String {
        let mut parts: Vec<&str> = self.parents.iter().map(String::as_str).collect();
        parts.push(&self.name);
        parts.join(" / ")
    }
}

/// A multi-stage pipeline run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineRunBuild {
    pub meta: BuildMeta,
    /// Name of the `PipelineRun` object.
    pub run: String,
    pub status: BuildStatus,
    /// Stages in declaration order.
    pub stages: Vec<Stage>,
}

impl PipelineRunBuild {
    /// Build from a pipeline run and the pods created for it so far.
    pub fn from_run(run: &PipelineRun, stage_pods: &[PodSnapshot]) -> Result<Self> {
        let name = run
            .metadata
            .name
            .clone()
            .ok_or_else(|| LogsError::InvalidObject {
                object: "pipeline run".to_string(),
                reason: "missing metadata.name".to_string(),
            })?;

        let labels = run.metadata.labels.clone().unwrap_or_default();
        let meta = BuildMeta::from_labels(
            &labels,
            run.metadata.creation_timestamp.as_ref().map(|t| t.0),
        );

        let stages = run
            .resolved_spec()
            .map(|spec| {
                spec.ordered_tasks()
                    .map(|task| stage_for_task(&task.name, task.display_name.as_deref(), stage_pods))
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            meta,
            run: name,
            status: run_status(run),
            stages,
        })
    }
}

fn stage_for_task(task: &str, display_name: Option<&str>, stage_pods: &[PodSnapshot]) -> Stage {
    let mut path: Vec<String> = display_name
        .filter(|d| !d.trim().is_empty())
        .map(|d| d.split(" / ").map(|s| s.trim().to_string()).collect())
        .unwrap_or_default();
    let name = path.pop().unwrap_or_else(|| task.to_string());

    Stage {
        task: task.to_string(),
        name,
        parents: path,
        pod: find_stage_pod(task, stage_pods).cloned(),
    }
}

/// The pod running `task`, if the controller has created it.
pub fn find_stage_pod<'a>(task: &str, stage_pods: &'a [PodSnapshot]) -> Option<&'a PodSnapshot> {
    stage_pods
        .iter()
        .find(|pod| pod.label(LABEL_PIPELINE_TASK) == Some(task))
}

fn run_status(run: &PipelineRun) -> BuildStatus {
    match run.succeeded_condition() {
        None => BuildStatus::Pending,
        Some(c) if c.status == "True" => BuildStatus::Succeeded,
        Some(c) if c.status == "False" => BuildStatus::Failed,
        Some(c) if c.reason.as_deref() == Some("Running") => BuildStatus::Running,
        Some(_) => BuildStatus::Pending,
    }
}

/// Unified build representation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildDescriptor {
    Legacy(LegacyBuild),
    PipelineRun(PipelineRunBuild),
}

impl BuildDescriptor {
    pub fn meta(&self) -> &BuildMeta {
        match self {
            Self::Legacy(b) => &b.meta,
            Self::PipelineRun(b) => &b.meta,
        }
    }

    pub fn pipeline_name(&self) -> String {
        self.meta().pipeline_name()
    }

    pub fn build(&self) -> &str {
        &self.meta().build
    }

    pub fn build_number(&self) -> u64 {
        self.meta().build_number()
    }

    pub fn branch(&self) -> &str {
        &self.meta().branch
    }

    pub fn owner(&self) -> &str {
        &self.meta().owner
    }

    pub fn repository(&self) -> &str {
        &self.meta().repository
    }

    pub fn created(&self) -> Option<DateTime<Utc>> {
        self.meta().created
    }

    pub fn status(&self) -> BuildStatus {
        match self {
            Self::Legacy(b) => b.pod.phase.into(),
            Self::PipelineRun(b) => b.status,
        }
    }

    /// `pipeline #build`
    pub fn display_name(&self) -> String {
        format!("{} #{}", self.pipeline_name(), self.build())
    }

    /// Units known so far, in global visiting order.
    ///
    /// Stops at the first stage that has no pod yet; everything after it is
    /// still unknown. Fails if a known pod has no init containers.
    pub fn visiting_order(&self) -> Result<Vec<Unit>> {
        match self {
            Self::Legacy(b) => units_for_pod(None, &b.pod, &self.display_name()),
            Self::PipelineRun(b) => {
                let mut units = Vec::new();
                for stage in &b.stages {
                    let Some(pod) = &stage.pod else { break };
                    units.extend(units_for_pod(
                        Some(stage.name_including_parents()),
                        pod,
                        &self.display_name(),
                    )?);
                }
                Ok(units)
            }
        }
    }
}

/// One (stage, container) pair to stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unit {
    pub stage: Option<String>,
    pub pod: String,
    pub container: String,
    /// Position of the container in its pod's init containers.
    pub index: usize,
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.stage {
            Some(stage) => write!(f, "{stage}/{}", self.container),
            None => write!(f, "{}", self.container),
        }
    }
}

/// Init containers of `pod` as units, failing when there are none.
pub fn units_for_pod(stage: Option<String>, pod: &PodSnapshot, build: &str) -> Result<Vec<Unit>> {
    if pod.init_containers.is_empty() {
        return Err(LogsError::NoInitContainers {
            pod: pod.name.clone(),
            build: build.to_string(),
        });
    }
    Ok(pod
        .init_containers
        .iter()
        .enumerate()
        .map(|(index, container)| Unit {
            stage: stage.clone(),
            pod: pod.name.clone(),
            container: container.clone(),
            index,
        })
        .collect())
}
