//! Catalog of the builds currently visible in the cluster.
//!
//! A catalog is rebuilt from a fresh cluster read on every resolution
//! attempt and is never cached between invocations.

use std::cmp::Ordering;
use std::collections::HashMap;

use tracing::{debug, warn};

use crate::cluster::{ClusterQuery, ExecutionModel};
use crate::crd::PipelineRun;
use crate::descriptor::{BuildDescriptor, LegacyBuild, PipelineRunBuild};
use crate::error::{LogsError, Result};
use crate::filter::BuildFilter;
use crate::pod::PodSnapshot;

/// Branch whose newest build is preselected in the picker.
pub const DEFAULT_BRANCH: &str = "master";

/// Builds matching a filter, indexed for resolution
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Catalog {
    /// Display names in sort order, newest first.
    pub names: Vec<String>,
    /// Display name of the newest default-branch build, or empty.
    pub default_name: String,
    /// Display name → build.
    pub builds: HashMap<String, BuildDescriptor>,
    /// Pipeline name → newest build of that pipeline.
    pub pipelines: HashMap<String, BuildDescriptor>,
}

impl Catalog {
    /// Filter, sort and index already converted builds.
    pub fn build(
        descriptors: Vec<BuildDescriptor>,
        filter: &BuildFilter,
        model: ExecutionModel,
        default_branch: &str,
    ) -> Result<Self> {
        let mut matching: Vec<BuildDescriptor> =
            descriptors.into_iter().filter(|d| filter.matches(d)).collect();
        if matching.is_empty() {
            return Err(LogsError::EmptyCatalog {
                model: model.describe(),
            });
        }
        matching.sort_by(newest_first);

        let mut catalog = Self::default();
        for build in matching {
            let name = build.display_name();
            if catalog.default_name.is_empty() && build.branch() == default_branch {
                catalog.default_name.clone_from(&name);
            }
            catalog
                .pipelines
                .entry(build.pipeline_name())
                .and_modify(|current| {
                    if is_newer(&build, current) {
                        *current = build.clone();
                    }
                })
                .or_insert_with(|| build.clone());
            catalog.names.push(name.clone());
            catalog.builds.insert(name, build);
        }
        Ok(catalog)
    }

    /// Look up a display name, then a bare pipeline name.
    ///
    /// Pipeline-name hits carry a `" #<build>"` suffix so later output shows
    /// which build was picked.
    pub fn lookup(&self, name: &str) -> Option<(BuildDescriptor, String)> {
        if let Some(build) = self.builds.get(name) {
            return Some((build.clone(), String::new()));
        }
        self.pipelines
            .get(name)
            .map(|build| (build.clone(), format!(" #{}", build.build())))
    }
}

/// Total order: build number descending, then creation time descending,
/// then pipeline name and display name ascending.
fn newest_first(a: &BuildDescriptor, b: &BuildDescriptor) -> Ordering {
    b.build_number()
        .cmp(&a.build_number())
        .then_with(|| b.created().cmp(&a.created()))
        .then_with(|| a.pipeline_name().cmp(&b.pipeline_name()))
        .then_with(|| a.display_name().cmp(&b.display_name()))
}

fn is_newer(candidate: &BuildDescriptor, current: &BuildDescriptor) -> bool {
    (candidate.build_number(), candidate.created()) > (current.build_number(), current.created())
}

/// Read the cluster and build a catalog for `model`.
pub async fn load_catalog(
    query: &dyn ClusterQuery,
    filter: &BuildFilter,
    model: ExecutionModel,
    default_branch: &str,
) -> Result<Catalog> {
    let descriptors = match model {
        ExecutionModel::Legacy => load_legacy_builds(query).await?,
        ExecutionModel::PipelineRun => load_pipeline_runs(query).await?,
    };
    debug!(count = descriptors.len(), model = ?model, "Loaded builds");
    Catalog::build(descriptors, filter, model, default_branch)
}

async fn load_legacy_builds(query: &dyn ClusterQuery) -> Result<Vec<BuildDescriptor>> {
    let pods = query.list_build_pods().await.inspect_err(|e| {
        warn!(error = %e, "Failed to query build pods");
    })?;

    let mut results = Vec::with_capacity(pods.len());
    for pod in &pods {
        let result = PodSnapshot::from_pod(pod).map(|snapshot| {
            // Pods without init containers are not builds.
            (!snapshot.init_containers.is_empty())
                .then(|| BuildDescriptor::Legacy(LegacyBuild::from_pod(snapshot)))
        });
        results.push(result);
    }
    collect_items(results, "build pod")
}

async fn load_pipeline_runs(query: &dyn ClusterQuery) -> Result<Vec<BuildDescriptor>> {
    let runs = query.list_pipeline_runs().await.inspect_err(|e| {
        warn!(error = %e, "Failed to query pipeline runs");
    })?;

    let mut results = Vec::with_capacity(runs.len());
    for run in &runs {
        results.push(pipeline_run_descriptor(query, run).await.map(Some));
    }
    collect_items(results, "pipeline run")
}

/// Convert a pipeline run, reading the pods of its scheduled stages.
pub async fn pipeline_run_descriptor(query: &dyn ClusterQuery, run: &PipelineRun) -> Result<BuildDescriptor> {
    let name = run.metadata.name.as_deref().unwrap_or_default();
    let pods = query.list_stage_pods(name).await?;
    let snapshots = pods
        .iter()
        .map(PodSnapshot::from_pod)
        .collect::<Result<Vec<_>>>()?;
    Ok(BuildDescriptor::PipelineRun(PipelineRunBuild::from_run(
        run, &snapshots,
    )?))
}

/// Drop items that failed to convert, unless every item failed.
fn collect_items(
    results: Vec<Result<Option<BuildDescriptor>>>,
    kind: &str,
) -> Result<Vec<BuildDescriptor>> {
    let total = results.len();
    let mut builds = Vec::new();
    let mut first_error = None;
    let mut failures = 0;

    for result in results {
        match result {
            Ok(Some(build)) => builds.push(build),
            Ok(None) => {}
            Err(e) if e.is_item_recoverable() => {
                warn!(error = %e, "Skipping {kind}");
                failures += 1;
                first_error.get_or_insert(e);
            }
            Err(e) => return Err(e),
        }
    }

    match first_error {
        Some(e) if failures == total => Err(e),
        _ => Ok(builds),
    }
}
