//! Work item domain model.
//!
//! A work item is one backlog entry (an issue) identified by a unique string.
//! Items are never destroyed: once terminal they stay in their terminal set
//! for the lifetime of the process so that later discovery cycles do not
//! reprocess them.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::errors::{DomainError, DomainResult};

/// Unique identifier of a work item, usually the issue URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkItemId(String);

impl WorkItemId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorkItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for WorkItemId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for WorkItemId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Where a work item currently sits in the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkItemState {
    Queued,
    Processing,
    Completed,
    Failed,
}

impl WorkItemState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Check if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for WorkItemState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of queue occupancy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    pub queued: usize,
    pub processing: usize,
    pub completed: usize,
    pub failed: usize,
    /// Ids currently held by a worker, sorted
    pub processing_items: Vec<WorkItemId>,
}

impl QueueStats {
    /// Nothing waiting and nothing in flight.
    pub fn is_drained(&self) -> bool {
        self.queued == 0 && self.processing == 0
    }
}

/// Repository coordinates.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepoRef {
    pub owner: String,
    pub repo: String,
}

impl RepoRef {
    pub fn new(owner: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
        }
    }

    pub fn clone_url(&self) -> String {
        format!("https://github.com/{}/{}.git", self.owner, self.repo)
    }
}

impl fmt::Display for RepoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}

/// Parsed reference to a GitHub issue: `owner/repo#N` or an issue URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IssueRef {
    pub owner: String,
    pub repo: String,
    pub number: u64,
}

impl IssueRef {
    /// Parse `owner/repo#N`, `https://github.com/owner/repo/issues/N`
    /// or the `/pull/N` form.
    pub fn parse(input: &str) -> DomainResult<Self> {
        let trimmed = input.trim().trim_end_matches('/');
        let invalid = || DomainError::InvalidItemId(input.to_string());

        if let Some((repo_part, number)) = trimmed.split_once('#') {
            let (owner, repo) = repo_part.split_once('/').ok_or_else(invalid)?;
            let number = number.parse().map_err(|_| invalid())?;
            return Self::checked(owner, repo, number).ok_or_else(invalid);
        }

        let path = trimmed
            .strip_prefix("https://github.com/")
            .or_else(|| trimmed.strip_prefix("http://github.com/"))
            .or_else(|| trimmed.strip_prefix("github.com/"))
            .ok_or_else(invalid)?;
        let segments: Vec<&str> = path.split('/').collect();
        match segments.as_slice() {
            [owner, repo, "issues" | "pull", number] => {
                let number = number.parse().map_err(|_| invalid())?;
                Self::checked(owner, repo, number).ok_or_else(invalid)
            }
            _ => Err(invalid()),
        }
    }

    fn checked(owner: &str, repo: &str, number: u64) -> Option<Self> {
        if owner.is_empty() || repo.is_empty() || number == 0 {
            return None;
        }
        Some(Self {
            owner: owner.to_string(),
            repo: repo.to_string(),
            number,
        })
    }

    pub fn repo_ref(&self) -> RepoRef {
        RepoRef::new(&self.owner, &self.repo)
    }

    /// Canonical issue URL, used as the work item id.
    pub fn url(&self) -> String {
        format!(
            "https://github.com/{}/{}/issues/{}",
            self.owner, self.repo, self.number
        )
    }

    pub fn work_item_id(&self) -> WorkItemId {
        WorkItemId::new(self.url())
    }
}

impl fmt::Display for IssueRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}#{}", self.owner, self.repo, self.number)
    }
}
