//! Cluster reads needed to resolve builds and walk their pods.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::api::{Api, ListParams};
use kube::Client;
use tracing::debug;

use crate::crd::{PipelineRun, LABEL_PIPELINE_RUN, PIPELINE_RUN_CRD};
use crate::descriptor::BUILD_POD_SELECTOR;
use crate::error::{LogsError, Result};

/// Which execution model the builds in the namespace follow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionModel {
    /// One pod per build, init containers are the steps
    Legacy,
    /// `PipelineRun` objects with one pod per stage
    PipelineRun,
}

impl ExecutionModel {
    /// Plural noun used in messages.
    pub fn describe(self) -> &'static str {
        match self {
            Self::Legacy => "builds",
            Self::PipelineRun => "pipeline runs",
        }
    }
}

/// Read-only view of the build objects in one namespace.
#[async_trait]
pub trait ClusterQuery: Send + Sync {
    /// Whether the pipeline-run CRD is installed.
    async fn pipeline_runs_installed(&self) -> Result<bool>;

    /// All legacy build pods.
    async fn list_build_pods(&self) -> Result<Vec<Pod>>;

    /// All pipeline runs.
    async fn list_pipeline_runs(&self) -> Result<Vec<PipelineRun>>;

    /// One pipeline run, `None` if it does not exist.
    async fn get_pipeline_run(&self, name: &str) -> Result<Option<PipelineRun>>;

    /// Pods created so far for the stages of a pipeline run.
    async fn list_stage_pods(&self, run: &str) -> Result<Vec<Pod>>;

    /// One pod, `None` if it does not exist.
    async fn get_pod(&self, name: &str) -> Result<Option<Pod>>;
}

/// [`ClusterQuery`] backed by the Kubernetes API
#[derive(Clone)]
pub struct KubeCluster {
    client: Client,
    namespace: String,
}

impl KubeCluster {
    pub fn new(client: Client, namespace: impl Into<String>) -> Self {
        Self {
            client,
            namespace: namespace.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    fn pods(&self) -> Api<Pod> {
        Api::namespaced(self.client.clone(), &self.namespace)
    }

    fn pipeline_runs(&self) -> Api<PipelineRun> {
        Api::namespaced(self.client.clone(), &self.namespace)
    }
}

#[async_trait]
impl ClusterQuery for KubeCluster {
    async fn pipeline_runs_installed(&self) -> Result<bool> {
        let crds: Api<CustomResourceDefinition> = Api::all(self.client.clone());
        match crds.get_opt(PIPELINE_RUN_CRD).await {
            Ok(found) => Ok(found.is_some()),
            Err(kube::Error::Api(e)) if e.code == 403 => {
                // Listing CRDs is cluster scoped; fall back to probing the namespace.
                debug!("No access to CRDs, probing for pipeline runs directly");
                match self.pipeline_runs().list(&ListParams::default().limit(1)).await {
                    Ok(_) => Ok(true),
                    Err(kube::Error::Api(e)) if e.code == 404 => Ok(false),
                    Err(e) => Err(LogsError::query(PIPELINE_RUN_CRD, e)),
                }
            }
            Err(e) => Err(LogsError::query(format!("crd {PIPELINE_RUN_CRD}"), e)),
        }
    }

    async fn list_build_pods(&self) -> Result<Vec<Pod>> {
        let lp = ListParams::default().labels(BUILD_POD_SELECTOR);
        let pods = self
            .pods()
            .list(&lp)
            .await
            .map_err(|e| LogsError::query(format!("build pods in {}", self.namespace), e))?;
        Ok(pods.items)
    }

    async fn list_pipeline_runs(&self) -> Result<Vec<PipelineRun>> {
        let runs = self
            .pipeline_runs()
            .list(&ListParams::default())
            .await
            .map_err(|e| LogsError::query(format!("pipeline runs in {}", self.namespace), e))?;
        Ok(runs.items)
    }

    async fn get_pipeline_run(&self, name: &str) -> Result<Option<PipelineRun>> {
        self.pipeline_runs()
            .get_opt(name)
            .await
            .map_err(|e| LogsError::query(format!("pipeline run {name}"), e))
    }

    async fn list_stage_pods(&self, run: &str) -> Result<Vec<Pod>> {
        let lp = ListParams::default().labels(&format!("{LABEL_PIPELINE_RUN}={run}"));
        let pods = self
            .pods()
            .list(&lp)
            .await
            .map_err(|e| LogsError::query(format!("pods of pipeline run {run}"), e))?;
        Ok(pods.items)
    }

    async fn get_pod(&self, name: &str) -> Result<Option<Pod>> {
        self.pods()
            .get_opt(name)
            .await
            .map_err(|e| LogsError::query(format!("pod {name}"), e))
    }
}

/// Pick the execution model, probing the cluster when not forced.
pub async fn detect_model(query: &dyn ClusterQuery, forced: Option<ExecutionModel>) -> Result<ExecutionModel> {
    if let Some(model) = forced {
        return Ok(model);
    }
    let model = if query.pipeline_runs_installed().await? {
        ExecutionModel::PipelineRun
    } else {
        ExecutionModel::Legacy
    };
    debug!(model = ?model, "Detected execution model");
    Ok(model)
}
