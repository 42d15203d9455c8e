//! In-memory cluster, log tail and sink for integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;
use kube::core::ErrorResponse;
use pipeline_logs::crd::{PipelineRun, LABEL_PIPELINE_RUN, LABEL_PIPELINE_TASK};
use pipeline_logs::error::{LogsError, Result};
use pipeline_logs::output::{LogSink, UnitHeader};
use pipeline_logs::readiness::UpstreamFailure;
use pipeline_logs::{ClusterQuery, LogTail, Picker};
use serde_json::{json, Value};

// =============================================================================
// Object builders
// =============================================================================

/// State of one init container in a pod fixture.
#[derive(Debug, Clone, Copy)]
pub enum C {
    Waiting,
    Running,
    Exited(i32),
}

fn container_status(name: &str, state: C) -> Value {
    let state = match state {
        C::Waiting => json!({"waiting": {"reason": "PodInitializing"}}),
        C::Running => json!({"running": {"startedAt": "2024-01-01T12:00:00Z"}}),
        C::Exited(code) => {
            let message = if code == 0 { "" } else { "step failed" };
            json!({"terminated": {"exitCode": code, "message": message}})
        }
    };
    json!({
        "name": name,
        "ready": false,
        "restartCount": 0,
        "image": "builder",
        "imageID": "",
        "state": state
    })
}

/// A pod with the given labels, phase and init containers.
pub fn pod(name: &str, labels: Value, phase: &str, containers: &[(&str, C)]) -> Pod {
    let init: Vec<Value> = containers.iter().map(|(n, _)| json!({"name": n})).collect();
    let statuses: Vec<Value> = containers.iter().map(|(n, s)| container_status(n, *s)).collect();
    serde_json::from_value(json!({
        "apiVersion": "v1",
        "kind": "Pod",
        "metadata": {
            "name": name,
            "labels": labels,
            "creationTimestamp": "2024-01-01T12:00:00Z"
        },
        "spec": {
            "containers": [{"name": "nop"}],
            "initContainers": init
        },
        "status": {
            "phase": phase,
            "initContainerStatuses": statuses
        }
    }))
    .expect("valid pod fixture")
}

/// A legacy build pod for `acme/<repo>/<branch> #<build>`.
pub fn build_pod(repo: &str, branch: &str, build: u32, phase: &str, containers: &[(&str, C)]) -> Pod {
    pod(
        &format!("{repo}-{branch}-{build}").to_lowercase(),
        json!({
            "owner": "acme",
            "repository": repo,
            "branch": branch,
            "build": build.to_string(),
            "context": "release"
        }),
        phase,
        containers,
    )
}

/// A pod backing stage `task` of pipeline run `run`.
pub fn stage_pod(run: &str, task: &str, phase: &str, containers: &[(&str, C)]) -> Pod {
    pod(
        &format!("{run}-{task}-pod").to_lowercase(),
        json!({
            LABEL_PIPELINE_RUN: run,
            LABEL_PIPELINE_TASK: task
        }),
        phase,
        containers,
    )
}

/// Name of the pod [`stage_pod`] creates.
pub fn stage_pod_name(run: &str, task: &str) -> String {
    format!("{run}-{task}-pod").to_lowercase()
}

/// `Succeeded` condition status of a pipeline run fixture.
#[derive(Debug, Clone, Copy)]
pub enum RunState {
    Pending,
    Running,
    Succeeded,
    Failed,
}

/// A pipeline run for `acme/<repo>/<branch> #<build>` with `tasks` in order.
pub fn pipeline_run(repo: &str, branch: &str, build: u32, tasks: &[&str], state: RunState) -> PipelineRun {
    let name = run_name(repo, branch, build);
    let conditions = match state {
        RunState::Pending => json!([]),
        RunState::Running => json!([{"type": "Succeeded", "status": "Unknown", "reason": "Running"}]),
        RunState::Succeeded => json!([{"type": "Succeeded", "status": "True", "reason": "Succeeded"}]),
        RunState::Failed => json!([{"type": "Succeeded", "status": "False", "reason": "Failed"}]),
    };
    let tasks: Vec<Value> = tasks.iter().map(|t| json!({"name": t})).collect();
    serde_json::from_value(json!({
        "apiVersion": "tekton.dev/v1",
        "kind": "PipelineRun",
        "metadata": {
            "name": name,
            "labels": {
                "owner": "acme",
                "repository": repo,
                "branch": branch,
                "build": build.to_string()
            },
            "creationTimestamp": "2024-01-01T12:00:00Z"
        },
        "spec": {"pipelineRef": {"name": repo}},
        "status": {
            "conditions": conditions,
            "pipelineSpec": {"tasks": tasks}
        }
    }))
    .expect("valid pipeline run fixture")
}

pub fn run_name(repo: &str, branch: &str, build: u32) -> String {
    format!("acme-{repo}-{branch}-{build}").to_lowercase()
}

pub fn kube_error(message: &str) -> kube::Error {
    kube::Error::Api(ErrorResponse {
        status: "Failure".to_string(),
        message: message.to_string(),
        reason: "InternalError".to_string(),
        code: 500,
    })
}

// =============================================================================
// Fake cluster
// =============================================================================

#[derive(Default)]
struct State {
    installed: bool,
    build_pod_lists: VecDeque<Vec<Pod>>,
    run_lists: VecDeque<Vec<PipelineRun>>,
    pods: HashMap<String, VecDeque<Pod>>,
    hidden: HashMap<String, usize>,
    failing_stage_lists: HashSet<String>,
    get_pod_calls: HashMap<String, usize>,
    catalog_reads: usize,
}

/// Advance a scripted sequence: return the front, keep the last one forever.
fn next<T: Clone>(seq: &mut VecDeque<T>) -> Option<T> {
    if seq.len() > 1 {
        seq.pop_front()
    } else {
        seq.front().cloned()
    }
}

/// Cluster whose reads follow scripted sequences.
#[derive(Default)]
pub struct FakeCluster {
    state: Mutex<State>,
}

impl FakeCluster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pipeline_runs_installed(self) -> Self {
        self.state.lock().unwrap().installed = true;
        self
    }

    /// Queue the result of the next `list_build_pods` call.
    pub fn push_build_pods(&self, pods: Vec<Pod>) {
        let mut state = self.state.lock().unwrap();
        for pod in &pods {
            let name = pod.metadata.name.clone().unwrap();
            state.pods.entry(name).or_default().push_back(pod.clone());
        }
        state.build_pod_lists.push_back(pods);
    }

    /// Queue the next snapshot of pipeline runs, served by list and get calls.
    pub fn push_runs(&self, runs: Vec<PipelineRun>) {
        self.state.lock().unwrap().run_lists.push_back(runs);
    }

    /// Queue successive states of a pod, returned by consecutive reads.
    pub fn push_pod_states(&self, states: Vec<Pod>) {
        let mut state = self.state.lock().unwrap();
        for pod in states {
            let name = pod.metadata.name.clone().unwrap();
            state.pods.entry(name).or_default().push_back(pod);
        }
    }

    /// Keep a stage pod out of `list_stage_pods` for the next `reads` calls.
    pub fn hide_stage_pod(&self, name: &str, reads: usize) {
        self.state.lock().unwrap().hidden.insert(name.to_string(), reads);
    }

    pub fn fail_stage_listing(&self, run: &str) {
        self.state
            .lock()
            .unwrap()
            .failing_stage_lists
            .insert(run.to_string());
    }

    pub fn get_pod_calls(&self, name: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .get_pod_calls
            .get(name)
            .copied()
            .unwrap_or(0)
    }

    /// Number of catalog-level list calls made so far.
    pub fn catalog_reads(&self) -> usize {
        self.state.lock().unwrap().catalog_reads
    }
}

#[async_trait]
impl ClusterQuery for FakeCluster {
    async fn pipeline_runs_installed(&self) -> Result<bool> {
        Ok(self.state.lock().unwrap().installed)
    }

    async fn list_build_pods(&self) -> Result<Vec<Pod>> {
        let mut state = self.state.lock().unwrap();
        state.catalog_reads += 1;
        Ok(next(&mut state.build_pod_lists).unwrap_or_default())
    }

    async fn list_pipeline_runs(&self) -> Result<Vec<PipelineRun>> {
        let mut state = self.state.lock().unwrap();
        state.catalog_reads += 1;
        Ok(next(&mut state.run_lists).unwrap_or_default())
    }

    async fn get_pipeline_run(&self, name: &str) -> Result<Option<PipelineRun>> {
        let mut state = self.state.lock().unwrap();
        Ok(next(&mut state.run_lists).and_then(|runs| {
            runs.into_iter()
                .find(|r| r.metadata.name.as_deref() == Some(name))
        }))
    }

    async fn list_stage_pods(&self, run: &str) -> Result<Vec<Pod>> {
        let mut state = self.state.lock().unwrap();
        if state.failing_stage_lists.contains(run) {
            return Err(LogsError::query(format!("pods of pipeline run {run}"), kube_error("boom")));
        }

        let mut names: Vec<String> = state
            .pods
            .iter()
            .filter(|(_, seq)| {
                seq.front()
                    .and_then(|p| p.metadata.labels.as_ref())
                    .and_then(|l| l.get(LABEL_PIPELINE_RUN))
                    .is_some_and(|r| r == run)
            })
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();

        let mut pods = Vec::new();
        for name in names {
            if let Some(remaining) = state.hidden.get_mut(&name) {
                if *remaining > 0 {
                    *remaining -= 1;
                    continue;
                }
            }
            if let Some(pod) = state.pods.get(&name).and_then(|seq| seq.front()) {
                pods.push(pod.clone());
            }
        }
        Ok(pods)
    }

    async fn get_pod(&self, name: &str) -> Result<Option<Pod>> {
        let mut state = self.state.lock().unwrap();
        *state.get_pod_calls.entry(name.to_string()).or_default() += 1;
        Ok(state.pods.get_mut(name).and_then(next))
    }
}

// =============================================================================
// Fake log tail and recording sink
// =============================================================================

/// Serves canned log lines and records which containers were tailed.
#[derive(Default)]
pub struct FakeLogTail {
    logs: HashMap<(String, String), Vec<String>>,
    failing: HashSet<(String, String)>,
    calls: Mutex<Vec<String>>,
}

impl FakeLogTail {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_log(mut self, pod: &str, container: &str, lines: &[&str]) -> Self {
        self.logs.insert(
            (pod.to_string(), container.to_string()),
            lines.iter().map(ToString::to_string).collect(),
        );
        self
    }

    pub fn failing(mut self, pod: &str, container: &str) -> Self {
        self.failing.insert((pod.to_string(), container.to_string()));
        self
    }

    /// `pod/container` of every tail call, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl LogTail for FakeLogTail {
    async fn tail(&self, pod: &str, container: &str, _follow: bool, sink: &mut dyn LogSink) -> Result<usize> {
        self.calls.lock().unwrap().push(format!("{pod}/{container}"));
        let key = (pod.to_string(), container.to_string());
        if self.failing.contains(&key) {
            return Err(LogsError::LogStream {
                pod: pod.to_string(),
                container: container.to_string(),
                reason: "container is waiting to start".to_string(),
            });
        }
        let lines = self.logs.get(&key).cloned().unwrap_or_default();
        for line in &lines {
            sink.line(line);
        }
        Ok(lines.len())
    }
}

/// Everything a follow wrote, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Build(String),
    Unit { stage: Option<String>, container: String },
    Line(String),
    Failure { container: String, exit_code: i32 },
}

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<Event>,
}

impl RecordingSink {
    /// `stage/container` (or just `container`) of every unit header.
    pub fn units(&self) -> Vec<String> {
        self.events
            .iter()
            .filter_map(|e| match e {
                Event::Unit {
                    stage: Some(stage),
                    container,
                } => Some(format!("{stage}/{container}")),
                Event::Unit {
                    stage: None,
                    container,
                } => Some(container.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn failures(&self) -> Vec<&Event> {
        self.events
            .iter()
            .filter(|e| matches!(e, Event::Failure { .. }))
            .collect()
    }

    pub fn position(&self, event: &Event) -> Option<usize> {
        self.events.iter().position(|e| e == event)
    }
}

impl LogSink for RecordingSink {
    fn build(&mut self, title: &str) {
        self.events.push(Event::Build(title.to_string()));
    }

    fn unit(&mut self, header: &UnitHeader<'_>) {
        self.events.push(Event::Unit {
            stage: header.stage.map(ToString::to_string),
            container: header.container.to_string(),
        });
    }

    fn line(&mut self, line: &str) {
        self.events.push(Event::Line(line.to_string()));
    }

    fn upstream_failure(&mut self, failure: &UpstreamFailure) {
        self.events.push(Event::Failure {
            container: failure.container.clone(),
            exit_code: failure.exit_code,
        });
    }
}

// =============================================================================
// Picker
// =============================================================================

/// Picks the preselected default, or the first name, and remembers what it saw.
#[derive(Default)]
pub struct DefaultPicker {
    pub seen: Mutex<Option<(Vec<String>, String)>>,
}

impl Picker for DefaultPicker {
    fn pick(&self, names: &[String], _prompt: &str, default: &str) -> Result<String> {
        *self.seen.lock().unwrap() = Some((names.to_vec(), default.to_string()));
        if default.is_empty() {
            Ok(names[0].clone())
        } else {
            Ok(default.to_string())
        }
    }
}
