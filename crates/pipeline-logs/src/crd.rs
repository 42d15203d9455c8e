//! `PipelineRun` Custom Resource mirror (Tekton `tekton.dev/v1`)
//!
//! Only the fields needed to order stages and locate their pods are modeled;
//! unknown fields are ignored on deserialization.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Label Tekton puts on every pod created for a pipeline run.
pub const LABEL_PIPELINE_RUN: &str = "tekton.dev/pipelineRun";

/// Label Tekton puts on a stage pod naming the pipeline task it runs.
pub const LABEL_PIPELINE_TASK: &str = "tekton.dev/pipelineTask";

/// Name of the CRD whose presence enables the pipeline-run model.
pub const PIPELINE_RUN_CRD: &str = "pipelineruns.tekton.dev";

/// Reference to a named pipeline definition
#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema)]
pub struct PipelineRef {
    pub name: Option<String>,
}

/// A task within a pipeline, in declaration order
#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema)]
pub struct PipelineTask {
    pub name: String,

    /// Human readable name; nested stages use `"Parent / Child"`
    #[serde(rename = "displayName", default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

/// Inline or resolved pipeline definition
#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema)]
pub struct PipelineSpec {
    #[serde(default)]
    pub tasks: Vec<PipelineTask>,

    #[serde(default)]
    pub finally: Vec<PipelineTask>,
}

impl PipelineSpec {
    /// Tasks followed by `finally` tasks, which always run last.
    pub fn ordered_tasks(&self) -> impl Iterator<Item = &PipelineTask> {
        self.tasks.iter().chain(self.finally.iter())
    }
}

#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, Default, JsonSchema)]
#[kube(group = "tekton.dev", version = "v1", kind = "PipelineRun")]
#[kube(namespaced)]
#[kube(status = "PipelineRunStatus")]
pub struct PipelineRunSpec {
    #[serde(rename = "pipelineRef", default, skip_serializing_if = "Option::is_none")]
    pub pipeline_ref: Option<PipelineRef>,

    #[serde(rename = "pipelineSpec", default, skip_serializing_if = "Option::is_none")]
    pub pipeline_spec: Option<PipelineSpec>,
}

/// Knative-style status condition
#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema)]
pub struct Condition {
    #[serde(rename = "type")]
    pub type_: String,
    pub status: String,
    pub reason: Option<String>,
    pub message: Option<String>,
}

/// Status of the `PipelineRun`
#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema)]
pub struct PipelineRunStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,

    /// Pipeline definition resolved by the controller from `pipelineRef`
    #[serde(rename = "pipelineSpec", default, skip_serializing_if = "Option::is_none")]
    pub pipeline_spec: Option<PipelineSpec>,
}

impl PipelineRun {
    /// The pipeline definition, preferring the controller-resolved copy.
    pub fn resolved_spec(&self) -> Option<&PipelineSpec> {
        self.status
            .as_ref()
            .and_then(|s| s.pipeline_spec.as_ref())
            .or(self.spec.pipeline_spec.as_ref())
    }

    /// The `Succeeded` condition, if the controller has reported one.
    pub fn succeeded_condition(&self) -> Option<&Condition> {
        self.status
            .as_ref()
            .and_then(|s| s.conditions.iter().find(|c| c.type_ == "Succeeded"))
    }
}
