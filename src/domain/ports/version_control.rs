//! Version control port - local working copies.

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::errors::DomainResult;
use crate::domain::models::RepoRef;

#[async_trait]
pub trait VersionControl: Send + Sync {
    /// Clone `repo` into `dest`, or fetch if `dest` already holds a clone.
    async fn clone_or_fetch(&self, repo: &RepoRef, dest: &Path) -> DomainResult<()>;

    /// Check out `branch`, creating it from `base` when `base` is given.
    async fn checkout_branch(&self, dir: &Path, branch: &str, base: Option<&str>)
        -> DomainResult<()>;

    /// Committer date of the tip of `revision`, `None` if the revision is unknown.
    async fn last_commit_time(&self, dir: &Path, revision: &str)
        -> DomainResult<Option<DateTime<Utc>>>;

    /// Stage and commit everything; `false` when there was nothing to commit.
    async fn commit_all(&self, dir: &Path, message: &str) -> DomainResult<bool>;

    async fn push(&self, dir: &Path, branch: &str) -> DomainResult<()>;

    /// `git diff --stat` against `base`.
    async fn diff_stat(&self, dir: &Path, base: &str) -> DomainResult<String>;
}
