//! Maps a build identifier, or an interactive choice, to a build.

use std::fmt;

use tracing::info;

use crate::catalog::{load_catalog, Catalog};
use crate::cluster::{ClusterQuery, ExecutionModel};
use crate::config::LogsConfig;
use crate::descriptor::BuildDescriptor;
use crate::error::{LogsError, Result};
use crate::picker::Picker;
use crate::retry::retry_until;

const PICK_PROMPT: &str = "Which build do you want to view the logs of?: ";

/// A resolved build
#[derive(Debug, Clone)]
pub struct Resolution {
    /// The name that was resolved (display name or pipeline name).
    pub name: String,
    /// `" #<build>"` when `name` was a bare pipeline name.
    pub suffix: String,
    pub build: BuildDescriptor,
}

impl Resolution {
    /// Name used in output headers.
    pub fn title(&self) -> String {
        format!("{}{}", self.name, self.suffix)
    }
}

/// Why one resolution attempt found nothing
enum Miss {
    Absent(Vec<String>),
    Failed(LogsError),
}

impl fmt::Display for Miss {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Absent(names) => write!(f, "no build found in: {}", names.join(", ")),
            Self::Failed(e) => write!(f, "{e}"),
        }
    }
}

/// Resolve `identifier` against a freshly loaded catalog.
///
/// Without an identifier the user picks from the catalog (unless in batch
/// mode). With `wait` set, a missing identifier is retried until
/// `wait_timeout` elapses.
pub async fn resolve(
    query: &dyn ClusterQuery,
    identifier: Option<&str>,
    model: ExecutionModel,
    config: &LogsConfig,
    picker: &dyn Picker,
) -> Result<Resolution> {
    let Some(name) = identifier else {
        if config.batch_mode {
            return Err(LogsError::MissingArgument("pipeline"));
        }
        let catalog = load(query, model, config).await?;
        let name = picker.pick(&catalog.names, PICK_PROMPT, &catalog.default_name)?;
        return lookup(&catalog, &name).ok_or_else(|| LogsError::NotFound {
            name,
            known: catalog.names.clone(),
        });
    };

    if !config.wait {
        let catalog = load(query, model, config).await?;
        return lookup(&catalog, name).ok_or_else(|| LogsError::NotFound {
            name: name.to_string(),
            known: catalog.names,
        });
    }

    // The first load is the first attempt; misses sleep before reloading.
    let found = retry_until(config.retry_interval, config.wait_timeout, move || async move {
        let catalog = load(query, model, config).await.map_err(Miss::Failed)?;
        lookup(&catalog, name).ok_or_else(|| {
            info!(pipeline = %name, "Waiting for pipeline to start; no build found in: {}", catalog.names.join(", "));
            Miss::Absent(catalog.names.clone())
        })
    })
    .await;

    found.map_err(|expired| LogsError::ResolutionTimeout {
        name: name.to_string(),
        elapsed: expired.elapsed,
        last_seen: match expired.last_error {
            Miss::Absent(names) => names,
            Miss::Failed(_) => Vec::new(),
        },
    })
}

async fn load(query: &dyn ClusterQuery, model: ExecutionModel, config: &LogsConfig) -> Result<Catalog> {
    load_catalog(query, &config.filter, model, &config.default_branch).await
}

fn lookup(catalog: &Catalog, name: &str) -> Option<Resolution> {
    catalog.lookup(name).map(|(build, suffix)| Resolution {
        name: name.to_string(),
        suffix,
        build,
    })
}
