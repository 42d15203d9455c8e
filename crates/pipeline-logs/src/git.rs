//! Owner and repository of the working directory's git checkout.

use std::path::Path;
use std::process::Command;

use crate::error::{LogsError, Result};

/// `owner/name` of a git repository
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitRepository {
    pub owner: String,
    pub name: String,
}

/// Read the `origin` remote of the repository in `dir`.
pub fn current_repository(dir: Option<&Path>) -> Result<GitRepository> {
    let mut cmd = Command::new("git");
    cmd.args(["remote", "get-url", "origin"]);
    if let Some(dir) = dir {
        cmd.current_dir(dir);
    }

    let output = cmd
        .output()
        .map_err(|e| LogsError::Git(format!("failed to execute git remote command: {e}")))?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(LogsError::Git(format!(
            "failed to get git repository URL: {}",
            stderr.trim()
        )));
    }

    let url = String::from_utf8_lossy(&output.stdout).trim().to_string();
    parse_remote_url(&url)
}

/// Parse `https://host/owner/repo.git`, `git@host:owner/repo.git` or
/// `ssh://git@host/owner/repo` into owner and name.
///
/// Nested groups keep everything before the last segment as the owner.
pub fn parse_remote_url(url: &str) -> Result<GitRepository> {
    let invalid = || LogsError::Git(format!("could not parse repository URL: {url}"));

    let path = if let Some((_, rest)) = url.split_once("://") {
        rest.split_once('/').map(|(_, path)| path).ok_or_else(invalid)?
    } else if let Some((_, path)) = url.split_once(':') {
        path
    } else {
        return Err(invalid());
    };

    let path = path.trim_matches('/');
    let path = path.strip_suffix(".git").unwrap_or(path);
    let (owner, name) = path.rsplit_once('/').ok_or_else(invalid)?;
    if owner.is_empty() || name.is_empty() {
        return Err(invalid());
    }

    Ok(GitRepository {
        owner: owner.to_string(),
        name: name.to_string(),
    })
}
