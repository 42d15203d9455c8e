//! Resolve a build or pipeline run and stream its logs in execution order.
//!
//! Builds come in two shapes: legacy builds run every step as an init
//! container of a single pod, pipeline runs spread their stages over one pod
//! per stage. Both are loaded into a [`Catalog`], resolved by display name
//! (`owner/repo/branch #build`) or pipeline name, and then followed unit by
//! unit with [`LogFollower`].
//!
//! # Usage
//!
//! ```no_run
//! use pipeline_logs::{
//!     detect_model, resolve, KubeCluster, KubeLogTail, LogFollower, LogsConfig, NoPicker,
//!     TerminalSink,
//! };
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let client = kube::Client::try_default().await?;
//! let config = LogsConfig::default();
//! let cluster = KubeCluster::new(client.clone(), &config.namespace);
//! let tail = KubeLogTail::new(client, &config.namespace);
//!
//! let model = detect_model(&cluster, config.engine.forced_model()).await?;
//! let resolution = resolve(&cluster, Some("acme/api/master"), model, &config, &NoPicker).await?;
//! LogFollower::new(&cluster, &tail, &config, CancellationToken::new())
//!     .follow(&resolution, &mut TerminalSink)
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod catalog;
pub mod cluster;
pub mod config;
pub mod crd;
pub mod descriptor;
pub mod error;
pub mod filter;
pub mod follow;
pub mod git;
pub mod logs;
pub mod output;
pub mod picker;
pub mod pod;
pub mod readiness;
pub mod retry;
pub mod selector;
pub mod walker;

pub use catalog::{load_catalog, Catalog};
pub use cluster::{detect_model, ClusterQuery, ExecutionModel, KubeCluster};
pub use config::{Engine, FailedPodPolicy, LogsConfig};
pub use descriptor::{BuildDescriptor, Unit};
pub use error::LogsError;
pub use filter::BuildFilter;
pub use follow::{FollowSummary, LogFollower};
pub use logs::{KubeLogTail, LogTail};
pub use output::{LogSink, TerminalSink, UnitHeader};
pub use picker::{NoPicker, Picker, TerminalPicker};
pub use pod::PodSnapshot;
pub use selector::{resolve, Resolution};
