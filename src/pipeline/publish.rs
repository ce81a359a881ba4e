// src/pipeline/publish.rs

//! Commit-and-push of one artifact directory.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Local;
use serde::Serialize;
use tokio::process::Command;

use crate::error::{AppError, Result};
use crate::models::{ArtifactKind, Config, DirectoryConfig};

/// What a publish attempt did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PublishOutcome {
    pub pushed: bool,
    /// Why nothing was pushed, when `pushed` is false
    pub reason: Option<String>,
    pub changed_files: usize,
}

impl PublishOutcome {
    pub fn skipped(reason: impl Into<String>) -> Self {
        Self {
            pushed: false,
            reason: Some(reason.into()),
            changed_files: 0,
        }
    }
}

/// Versions a filesystem change as one unit.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, description: &str) -> Result<PublishOutcome>;
}

/// `<Label> update: <local timestamp> - <description>`
pub fn commit_message(label: &str, description: &str) -> String {
    format!(
        "{} update: {} - {}",
        label,
        Local::now().format("%Y-%m-%d %H:%M:%S"),
        description
    )
}

/// One line of `git status --porcelain`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangedFile {
    /// Two-letter porcelain status, e.g. `??` or ` M`
    pub status: String,
    pub path: String,
}

impl ChangedFile {
    fn parse(line: &str) -> Option<Self> {
        if line.len() < 4 || !line.is_char_boundary(2) {
            return None;
        }
        let (status, path) = line.split_at(2);
        Some(Self {
            status: status.to_string(),
            path: path.trim().to_string(),
        })
    }

    /// Log symbol for the change.
    pub fn symbol(&self) -> &'static str {
        if self.status.contains('D') {
            "➖"
        } else if self.status.contains('?') || self.status.contains('A') {
            "➕"
        } else if self.status.contains('M') {
            "📝"
        } else {
            "📄"
        }
    }
}

/// Publishes through the `git` command line.
#[derive(Debug, Clone)]
pub struct GitPublisher {
    repo_root: PathBuf,
    /// Pathspec staged and committed, relative to `repo_root`
    subdir: PathBuf,
    /// Commit message prefix
    label: String,
    remote: String,
    branch: String,
}

impl GitPublisher {
    pub fn new(
        repo_root: impl Into<PathBuf>,
        subdir: impl Into<PathBuf>,
        label: impl Into<String>,
        remote: impl Into<String>,
        branch: impl Into<String>,
    ) -> Self {
        Self {
            repo_root: repo_root.into(),
            subdir: subdir.into(),
            label: label.into(),
            remote: remote.into(),
            branch: branch.into(),
        }
    }

    /// Publisher for one artifact kind's directory.
    pub fn from_config(config: &Config, kind: ArtifactKind) -> Self {
        Self::new(
            &config.paths.repo_root,
            config.artifact_subdir(kind),
            kind.label(),
            &config.publish.remote,
            &config.publish.branch,
        )
    }

    /// Publisher for an extra directory from `publish.directories`.
    pub fn for_directory(config: &Config, dir: &DirectoryConfig) -> Self {
        Self::new(
            &config.paths.repo_root,
            &dir.path,
            &dir.name,
            dir.remote.as_deref().unwrap_or(&config.publish.remote),
            dir.branch.as_deref().unwrap_or(&config.publish.branch),
        )
    }

    pub fn repo_root(&self) -> &Path {
        &self.repo_root
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Run one git step; non-zero exit is an error naming the step.
    async fn git(&self, step: &str, args: &[&str]) -> Result<String> {
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.repo_root)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| AppError::publish(step, e))?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).trim_end().to_string())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(AppError::publish(
                step,
                format!("git {} exited with {}: {}", step, output.status, stderr.trim()),
            ))
        }
    }

    /// Uncommitted changes under the directory, one entry per file.
    pub async fn changes(&self) -> Result<Vec<ChangedFile>> {
        let dir = self.subdir.to_string_lossy().into_owned();
        let status = self
            .git(
                "status",
                &["status", "--porcelain", "--untracked-files=all", "--", &dir],
            )
            .await?;
        Ok(status.lines().filter_map(ChangedFile::parse).collect())
    }
}

#[async_trait]
impl Publisher for GitPublisher {
    async fn publish(&self, description: &str) -> Result<PublishOutcome> {
        let changes = self.changes().await?;
        if changes.is_empty() {
            log::info!("📝 No changes to commit for {}", self.label);
            return Ok(PublishOutcome::skipped("no changes"));
        }

        let dir = self.subdir.to_string_lossy().into_owned();
        log::info!("📝 {} changed file(s) in {dir}", changes.len());
        for change in &changes {
            log::debug!("   {} {}", change.symbol(), change.path);
        }

        self.git("add", &["add", "--", &dir]).await?;

        let message = commit_message(&self.label, description);
        self.git("commit", &["commit", "-m", &message, "--", &dir])
            .await?;
        log::info!("✓ Committed: {message}");

        let refspec = format!("HEAD:{}", self.branch);
        self.git("push", &["push", &self.remote, &refspec]).await?;
        log::info!("🚀 Pushed to {}/{}", self.remote, self.branch);

        Ok(PublishOutcome {
            pushed: true,
            reason: None,
            changed_files: changes.len(),
        })
    }
}
