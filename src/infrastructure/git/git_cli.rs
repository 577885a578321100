//! `git` command line adapter for the [`VersionControl`] port.

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::process::Command;
use tracing::{debug, info, instrument};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::RepoRef;
use crate::domain::ports::VersionControl;

/// Runs the `git` binary in a working copy.
#[derive(Debug, Clone)]
pub struct GitCli {
    program: String,
    /// Clone URL prefix, `https://github.com` unless overridden
    remote_base: String,
}

impl Default for GitCli {
    fn default() -> Self {
        Self {
            program: "git".to_string(),
            remote_base: "https://github.com".to_string(),
        }
    }
}

impl GitCli {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clone from `<remote_base>/<owner>/<repo>.git` instead of GitHub.
    pub fn with_remote_base(mut self, remote_base: impl Into<String>) -> Self {
        self.remote_base = remote_base.into().trim_end_matches('/').to_string();
        self
    }

    fn clone_url(&self, repo: &RepoRef) -> String {
        format!("{}/{}/{}.git", self.remote_base, repo.owner, repo.repo)
    }

    /// Run git and return trimmed stdout; non-zero exit is an error carrying stderr.
    async fn run(&self, dir: Option<&Path>, operation: &str, args: &[&str]) -> DomainResult<String> {
        let mut cmd = Command::new(&self.program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .env("GIT_TERMINAL_PROMPT", "0");
        if let Some(dir) = dir {
            cmd.current_dir(dir);
        }
        debug!(operation, args = ?args, "running git");

        let output = cmd
            .output()
            .await
            .map_err(|e| DomainError::integration(operation, format!("failed to run git: {e}")))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DomainError::integration(
                operation,
                format!("git {} exited with {}: {}", args.join(" "), output.status, stderr.trim()),
            ));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

#[async_trait]
impl VersionControl for GitCli {
    #[instrument(skip(self), fields(repo = %repo, dest = %dest.display()))]
    async fn clone_or_fetch(&self, repo: &RepoRef, dest: &Path) -> DomainResult<()> {
        if dest.join(".git").exists() {
            self.run(Some(dest), "git_fetch", &["fetch", "--prune", "origin"])
                .await?;
            info!("workspace fetched");
            return Ok(());
        }
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let url = self.clone_url(repo);
        let target = dest.to_string_lossy();
        self.run(None, "git_clone", &["clone", &url, &target]).await?;
        info!("workspace cloned");
        Ok(())
    }

    async fn checkout_branch(&self, dir: &Path, branch: &str, base: Option<&str>) -> DomainResult<()> {
        let start = format!("origin/{}", base.unwrap_or(branch));
        self.run(Some(dir), "git_checkout", &["checkout", "-B", branch, &start])
            .await?;
        Ok(())
    }

    async fn last_commit_time(&self, dir: &Path, revision: &str) -> DomainResult<Option<DateTime<Utc>>> {
        let verify = self
            .run(Some(dir), "git_rev_parse", &["rev-parse", "--verify", "--quiet", revision])
            .await;
        if verify.is_err() {
            return Ok(None);
        }
        let stamp = self
            .run(Some(dir), "git_log", &["log", "-1", "--format=%cI", revision])
            .await?;
        if stamp.is_empty() {
            return Ok(None);
        }
        DateTime::parse_from_rfc3339(&stamp)
            .map(|t| Some(t.with_timezone(&Utc)))
            .map_err(|e| DomainError::integration("git_log", format!("bad commit date {stamp:?}: {e}")))
    }

    async fn commit_all(&self, dir: &Path, message: &str) -> DomainResult<bool> {
        self.run(Some(dir), "git_add", &["add", "-A"]).await?;
        let status = self
            .run(Some(dir), "git_status", &["status", "--porcelain"])
            .await?;
        if status.is_empty() {
            return Ok(false);
        }
        self.run(Some(dir), "git_commit", &["commit", "-m", message])
            .await?;
        Ok(true)
    }

    async fn push(&self, dir: &Path, branch: &str) -> DomainResult<()> {
        self.run(Some(dir), "git_push", &["push", "-u", "origin", branch])
            .await?;
        Ok(())
    }

    async fn diff_stat(&self, dir: &Path, base: &str) -> DomainResult<String> {
        let range = format!("origin/{base}...HEAD");
        self.run(Some(dir), "git_diff", &["diff", "--stat", &range]).await
    }
}
