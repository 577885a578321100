//! Feedback detection model and the tracker data shapes it reads.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where a feedback signal came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackSource {
    PullRequestComments,
    IssueComments,
    PullRequestDescription,
    IssueDescription,
    TrunkCommits,
    PullRequestState,
    MergeStatus,
    FailedChecks,
    ChangesRequested,
}

/// One positive observation that justifies continuing work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackSignal {
    pub source: FeedbackSource,
    pub detected_at: DateTime<Utc>,
    pub description: String,
}

/// Aggregated result of every feedback check.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackReport {
    pub feedback_detected: bool,
    /// Human-readable lines, one per positive check
    pub lines: Vec<String>,
    pub signals: Vec<FeedbackSignal>,
    /// New comments across pull request and issue
    pub new_comment_count: usize,
}

impl FeedbackReport {
    pub fn push(&mut self, source: FeedbackSource, description: String) {
        self.feedback_detected = true;
        self.lines.push(description.clone());
        self.signals.push(FeedbackSignal {
            source,
            detected_at: Utc::now(),
            description,
        });
    }
}

/// Result of running the detector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedbackOutcome {
    Evaluated(FeedbackReport),
    /// No reference checkpoint could be established
    Skipped { reason: String },
}

/// A comment on an issue or pull request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub author: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

/// State of a pull request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeRequestState {
    Open,
    Closed,
    Merged,
}

impl ChangeRequestState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "OPEN",
            Self::Closed => "CLOSED",
            Self::Merged => "MERGED",
        }
    }
}

impl fmt::Display for ChangeRequestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Merge readiness as reported by the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MergeStatus {
    Clean,
    Dirty,
    Unstable,
    Blocked,
    Behind,
    HasHooks,
    Unknown,
}

impl MergeStatus {
    /// Parse the tracker's `mergeable_state` (case-insensitive).
    pub fn parse(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "clean" => Self::Clean,
            "dirty" => Self::Dirty,
            "unstable" => Self::Unstable,
            "blocked" => Self::Blocked,
            "behind" => Self::Behind,
            "has_hooks" => Self::HasHooks,
            _ => Self::Unknown,
        }
    }

    /// Line reported when the status differs from the clean baseline.
    pub fn description(&self) -> Option<&'static str> {
        match self {
            Self::Clean => None,
            Self::Dirty => Some("Merge status is DIRTY (conflicts detected)"),
            Self::Unstable => Some("Merge status is UNSTABLE (non-passing commit status)"),
            Self::Blocked => Some("Merge status is BLOCKED"),
            Self::Behind => Some("Merge status is BEHIND (head ref is out of date)"),
            Self::HasHooks => Some("Merge status is HAS_HOOKS (has pre-receive hooks)"),
            Self::Unknown => Some("Merge status is UNKNOWN"),
        }
    }
}

/// Details of a pull request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestDetails {
    pub number: u64,
    pub state: ChangeRequestState,
    pub merge_status: MergeStatus,
    pub head_sha: String,
    pub head_ref: String,
    pub draft: bool,
    pub updated_at: DateTime<Utc>,
    /// GraphQL node id, needed to mark the pull request ready
    pub node_id: String,
}

/// A check run on a commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckRun {
    pub name: String,
    pub conclusion: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl CheckRun {
    pub fn is_failure(&self) -> bool {
        self.conclusion.as_deref() == Some("failure")
    }
}

/// A pull request review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    pub state: String,
    pub submitted_at: Option<DateTime<Utc>>,
}

impl Review {
    pub fn requests_changes(&self) -> bool {
        self.state == "CHANGES_REQUESTED"
    }
}

/// Details of an issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueDetails {
    pub number: u64,
    pub title: String,
    pub body: String,
    pub state: String,
    pub html_url: String,
    pub updated_at: DateTime<Utc>,
    pub labels: Vec<String>,
}

/// Repository facts needed before touching it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryInfo {
    pub archived: bool,
    pub default_branch: String,
    pub can_push: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_status_parse() {
        assert_eq!(MergeStatus::parse("DIRTY"), MergeStatus::Dirty);
        assert_eq!(MergeStatus::parse("clean"), MergeStatus::Clean);
        assert_eq!(MergeStatus::parse("has_hooks"), MergeStatus::HasHooks);
        assert_eq!(MergeStatus::parse("draft"), MergeStatus::Unknown);
    }

    #[test]
    fn test_merge_descriptions_are_distinct() {
        let all = [
            MergeStatus::Dirty,
            MergeStatus::Unstable,
            MergeStatus::Blocked,
            MergeStatus::Behind,
            MergeStatus::HasHooks,
            MergeStatus::Unknown,
        ];
        let mut seen = std::collections::HashSet::new();
        for status in all {
            assert!(seen.insert(status.description().unwrap()));
        }
        assert!(MergeStatus::Clean.description().is_none());
    }

    #[test]
    fn test_report_push_sets_detected() {
        let mut report = FeedbackReport::default();
        assert!(!report.feedback_detected);
        report.push(FeedbackSource::MergeStatus, "x".to_string());
        assert!(report.feedback_detected);
        assert_eq!(report.lines, vec!["x".to_string()]);
    }
}
