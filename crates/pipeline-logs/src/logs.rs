//! Container log transport.

use async_trait::async_trait;
use futures::{AsyncBufReadExt, TryStreamExt};
use k8s_openapi::api::core::v1::Pod;
use kube::api::{Api, LogParams};
use kube::Client;

use crate::error::{LogsError, Result};
use crate::output::LogSink;

/// Streams one container's output, line by line.
#[async_trait]
pub trait LogTail: Send + Sync {
    /// Write the log of `container` in `pod` to `sink`.
    ///
    /// With `follow` set, returns only once the container has terminated.
    /// Returns the number of lines written.
    async fn tail(&self, pod: &str, container: &str, follow: bool, sink: &mut dyn LogSink) -> Result<usize>;
}

/// [`LogTail`] over the Kubernetes pod log API
#[derive(Clone)]
pub struct KubeLogTail {
    client: Client,
    namespace: String,
}

impl KubeLogTail {
    pub fn new(client: Client, namespace: impl Into<String>) -> Self {
        Self {
            client,
            namespace: namespace.into(),
        }
    }
}

#[async_trait]
impl LogTail for KubeLogTail {
    async fn tail(&self, pod: &str, container: &str, follow: bool, sink: &mut dyn LogSink) -> Result<usize> {
        let pods: Api<Pod> = Api::namespaced(self.client.clone(), &self.namespace);
        let lp = LogParams {
            container: Some(container.to_string()),
            follow,
            ..LogParams::default()
        };

        let stream_error = |reason: String| LogsError::LogStream {
            pod: pod.to_string(),
            container: container.to_string(),
            reason,
        };

        let reader = pods
            .log_stream(pod, &lp)
            .await
            .map_err(|e| stream_error(e.to_string()))?;
        let mut lines = std::pin::pin!(reader.lines());
        let mut count = 0;
        while let Some(line) = lines.try_next().await.map_err(|e| stream_error(e.to_string()))? {
            sink.line(&line);
            count += 1;
        }
        Ok(count)
    }
}
