//! Feedback detection for work already in progress.
//!
//! Given an issue with an open pull request and a working branch, decide
//! whether anything happened since the last commit that justifies resuming
//! the agent. Each signal source is queried independently; a failing source
//! is logged and skipped without hiding the others.

use std::path::Path;
use std::sync::{Arc, LazyLock};

use chrono::{DateTime, Utc};
use regex::Regex;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::domain::errors::DomainResult;
use crate::domain::models::{
    ChangeRequestState, Comment, FeedbackConfig, FeedbackOutcome, FeedbackReport,
    FeedbackSource, IssueRef, PullRequestDetails, RepoRef,
};
use crate::domain::ports::{IssueTracker, VersionControl};

/// Bodies of comments this tool posts itself (log uploads, session
/// markers, cost and failure reports).
static LOG_ARTIFACT_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)📊.*Log file|solution\s+draft.*log",
        r"(?i)🔗.*Link:|💻.*Session:",
        r"(?i)Generated with.*(solve\.mjs|issuehive)",
        r"(?i)Session ID:|Log file available:",
        r"💰\s*Cost estimation",
        r"AI Work Session (Started|Completed)",
        r"Usage Limit Reached",
        r"(?i)AI work session failed",
    ]
    .iter()
    .filter_map(|p| Regex::new(p).ok())
    .collect()
});

/// Whether a comment body is one of our own log artifacts.
pub fn is_log_artifact_comment(body: &str) -> bool {
    LOG_ARTIFACT_PATTERNS.iter().any(|re| re.is_match(body))
}

/// Count comments that are new feedback.
///
/// A comment counts when it was created strictly after `reference`, is not
/// a log artifact, and was not posted by `actor` strictly after
/// `work_started_at`. When either the actor or the work start is unknown,
/// no comment is excluded for its author.
pub fn count_new_comments(
    comments: &[Comment],
    reference: DateTime<Utc>,
    actor: Option<&str>,
    work_started_at: Option<DateTime<Utc>>,
) -> usize {
    comments
        .iter()
        .filter(|c| c.created_at > reference)
        .filter(|c| !is_log_artifact_comment(&c.body))
        .filter(|c| match (actor, work_started_at) {
            (Some(actor), Some(started)) if c.author == actor => c.created_at <= started,
            _ => true,
        })
        .count()
}

/// An item in a continue relationship: issue, open pull request, branch.
#[derive(Debug, Clone)]
pub struct FeedbackRequest<'a> {
    pub issue: &'a IssueRef,
    pub pull_request: &'a PullRequestDetails,
    pub branch: &'a str,
    /// Local clone, when one exists
    pub working_dir: Option<&'a Path>,
    /// When the current work session began
    pub work_started_at: Option<DateTime<Utc>>,
}

/// Queries every feedback source for one item.
pub struct FeedbackDetector {
    tracker: Arc<dyn IssueTracker>,
    vcs: Arc<dyn VersionControl>,
}

fn isolate<T>(source: &str, result: DomainResult<T>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(err) => {
            warn!(source, error = %err, "feedback source unavailable, skipping");
            None
        }
    }
}

impl FeedbackDetector {
    pub fn new(tracker: Arc<dyn IssueTracker>, vcs: Arc<dyn VersionControl>) -> Self {
        Self { tracker, vcs }
    }

    /// Last commit on the working branch: `origin/<branch>`, then the local
    /// branch, then the tracker's view of the pull request.
    #[instrument(skip(self, request), fields(branch = request.branch))]
    pub async fn reference_time(&self, request: &FeedbackRequest<'_>) -> Option<DateTime<Utc>> {
        if let Some(dir) = request.working_dir {
            for revision in [format!("origin/{}", request.branch), request.branch.to_string()] {
                match self.vcs.last_commit_time(dir, &revision).await {
                    Ok(Some(time)) => {
                        debug!(revision = %revision, %time, "reference time from git");
                        return Some(time);
                    }
                    Ok(None) => {}
                    Err(err) => debug!(revision = %revision, error = %err, "git lookup failed"),
                }
            }
        }
        let repo = request.issue.repo_ref();
        match self
            .tracker
            .last_pull_request_commit_time(&repo, request.pull_request.number)
            .await
        {
            Ok(time) => time,
            Err(err) => {
                warn!(error = %err, "could not read last commit time from tracker");
                None
            }
        }
    }

    /// Run every check and aggregate the result.
    #[instrument(skip(self, request), fields(issue = %request.issue, pr = request.pull_request.number))]
    pub async fn detect(&self, request: &FeedbackRequest<'_>) -> FeedbackOutcome {
        let Some(reference) = self.reference_time(request).await else {
            warn!("could not determine last commit time, skipping feedback detection");
            return FeedbackOutcome::Skipped {
                reason: "last commit time unavailable".to_string(),
            };
        };

        let actor = isolate("current_actor", self.tracker.current_actor().await);
        if actor.is_none() || request.work_started_at.is_none() {
            warn!("actor or work start unknown, own comments are not filtered");
        }

        let repo = request.issue.repo_ref();
        let pr = request.pull_request;
        let (pr_comments, issue_comments, pr_edited, issue_edited, trunk, checks, reviews) = tokio::join!(
            self.pull_request_comments(&repo, pr.number, reference, actor.as_deref(), request.work_started_at),
            self.issue_comments(request.issue, reference, actor.as_deref(), request.work_started_at),
            self.pull_request_edited(&repo, pr.number, reference),
            self.issue_edited(request.issue, reference),
            self.trunk_commits(&repo, reference),
            self.failed_checks(&repo, &pr.head_sha, reference),
            self.changes_requested(&repo, pr.number, reference),
        );

        let mut report = FeedbackReport::default();
        if pr_comments > 0 {
            report.push(
                FeedbackSource::PullRequestComments,
                format!("New comments on the pull request: {pr_comments}"),
            );
        }
        if issue_comments > 0 {
            report.push(
                FeedbackSource::IssueComments,
                format!("New comments on the issue: {issue_comments}"),
            );
        }
        report.new_comment_count = pr_comments + issue_comments;

        if pr_edited {
            report.push(
                FeedbackSource::PullRequestDescription,
                "Pull request description was edited after last commit".to_string(),
            );
        }
        if issue_edited {
            report.push(
                FeedbackSource::IssueDescription,
                "Issue description was edited after last commit".to_string(),
            );
        }
        if let Some((branch, count)) = trunk {
            report.push(
                FeedbackSource::TrunkCommits,
                format!("New commits on {branch} branch: {count}"),
            );
        }
        if pr.state != ChangeRequestState::Open {
            report.push(
                FeedbackSource::PullRequestState,
                format!("Pull request state: {}", pr.state),
            );
        }
        if let Some(description) = pr.merge_status.description() {
            report.push(FeedbackSource::MergeStatus, description.to_string());
        }
        if checks > 0 {
            report.push(
                FeedbackSource::FailedChecks,
                format!("Failed pull request checks: {checks}"),
            );
        }
        if reviews > 0 {
            report.push(
                FeedbackSource::ChangesRequested,
                format!("Changes requested in reviews: {reviews}"),
            );
        }

        info!(
            detected = report.feedback_detected,
            signals = report.lines.len(),
            new_comments = report.new_comment_count,
            "feedback detection finished"
        );
        FeedbackOutcome::Evaluated(report)
    }

    async fn pull_request_comments(
        &self,
        repo: &RepoRef,
        number: u64,
        reference: DateTime<Utc>,
        actor: Option<&str>,
        work_started_at: Option<DateTime<Utc>>,
    ) -> usize {
        let (review, conversation) = tokio::join!(
            self.tracker.list_review_comments(repo, number),
            self.tracker.list_issue_comments(repo, number),
        );
        let mut all = isolate("pull_request_review_comments", review).unwrap_or_default();
        all.extend(isolate("pull_request_conversation_comments", conversation).unwrap_or_default());
        count_new_comments(&all, reference, actor, work_started_at)
    }

    async fn issue_comments(
        &self,
        issue: &IssueRef,
        reference: DateTime<Utc>,
        actor: Option<&str>,
        work_started_at: Option<DateTime<Utc>>,
    ) -> usize {
        let comments = self
            .tracker
            .list_issue_comments(&issue.repo_ref(), issue.number)
            .await;
        isolate("issue_comments", comments)
            .map_or(0, |c| count_new_comments(&c, reference, actor, work_started_at))
    }

    async fn pull_request_edited(&self, repo: &RepoRef, number: u64, reference: DateTime<Utc>) -> bool {
        isolate(
            "pull_request_details",
            self.tracker.get_pull_request(repo, number).await,
        )
        .is_some_and(|pr| pr.updated_at > reference)
    }

    async fn issue_edited(&self, issue: &IssueRef, reference: DateTime<Utc>) -> bool {
        isolate("issue_details", self.tracker.get_issue(issue).await)
            .is_some_and(|details| details.updated_at > reference)
    }

    async fn trunk_commits(&self, repo: &RepoRef, reference: DateTime<Utc>) -> Option<(String, usize)> {
        let info = isolate("repository_info", self.tracker.get_repository(repo).await)?;
        let count = isolate(
            "trunk_commits",
            self.tracker
                .count_commits_since(repo, &info.default_branch, reference)
                .await,
        )?;
        (count > 0).then_some((info.default_branch, count))
    }

    async fn failed_checks(&self, repo: &RepoRef, sha: &str, reference: DateTime<Utc>) -> usize {
        isolate("check_runs", self.tracker.list_check_runs(repo, sha).await).map_or(0, |runs| {
            runs.iter()
                .filter(|run| run.is_failure())
                .filter(|run| run.completed_at.is_some_and(|at| at > reference))
                .count()
        })
    }

    async fn changes_requested(&self, repo: &RepoRef, number: u64, reference: DateTime<Utc>) -> usize {
        isolate("reviews", self.tracker.list_reviews(repo, number).await).map_or(0, |reviews| {
            reviews
                .iter()
                .filter(|review| review.requests_changes())
                .filter(|review| review.submitted_at.is_some_and(|at| at > reference))
                .count()
        })
    }
}

/// A feedback gate stopped the run.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FeedbackGateError {
    #[error("no new comments since the last commit")]
    NoNewComments,
}

/// What the caller should do after the gates ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Proceed,
    /// Leave the item alone this time; not a failure
    SkipContinuation,
}

/// Apply the configured gates.
///
/// `require_new_comments` fails the whole run without new comments.
/// `continue_only_on_feedback` only skips the continuation without any
/// feedback. A skipped detection passes both gates.
pub fn apply_gates(
    config: &FeedbackConfig,
    outcome: &FeedbackOutcome,
) -> Result<GateDecision, FeedbackGateError> {
    let FeedbackOutcome::Evaluated(report) = outcome else {
        return Ok(GateDecision::Proceed);
    };
    if config.require_new_comments && report.new_comment_count == 0 {
        return Err(FeedbackGateError::NoNewComments);
    }
    if config.continue_only_on_feedback && !report.feedback_detected {
        return Ok(GateDecision::SkipContinuation);
    }
    Ok(GateDecision::Proceed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    fn comment(author: &str, body: &str, at: DateTime<Utc>) -> Comment {
        Comment {
            author: author.to_string(),
            body: body.to_string(),
            created_at: at,
        }
    }

    #[test]
    fn test_log_artifact_patterns() {
        assert!(is_log_artifact_comment("## 📊 Log file attached"));
        assert!(is_log_artifact_comment("Solution draft log for review"));
        assert!(is_log_artifact_comment("💻 Session: abc"));
        assert!(is_log_artifact_comment("📌 Session ID: 123"));
        assert!(!is_log_artifact_comment("Please also handle the empty case"));
    }

    #[test]
    fn test_own_session_markers_are_artifacts() {
        for body in [
            "## 💰 Cost estimation\n\n- Session: `s-1`",
            "🤖 **AI Work Session Started**\n\nStarting automated work session",
            "🤖 **AI Work Session Completed**\n\nWork session ended",
            "## ⏳ Usage Limit Reached\n\nresets 5am",
            "## ❌ AI work session failed\n\nFailure: `overload`",
        ] {
            assert!(is_log_artifact_comment(body), "{body}");
        }
        assert!(!is_log_artifact_comment("What did the cost estimation say?"));
    }

    #[test]
    fn test_post_run_comments_are_not_feedback() {
        let comments = vec![
            comment("bot", "## 💰 Cost estimation\n\n- Estimated cost: $0.12", t0() + Duration::seconds(30)),
            comment("bot", "🤖 **AI Work Session Completed**", t0() + Duration::seconds(31)),
        ];
        let started = Some(t0() + Duration::hours(1));
        assert_eq!(count_new_comments(&comments, t0(), Some("bot"), started), 0);
        // Unknown actor: the markers are still filtered by content.
        assert_eq!(count_new_comments(&comments, t0(), None, None), 0);
    }

    #[test]
    fn test_counts_only_after_reference() {
        let comments = vec![
            comment("alice", "fix this", t0() + Duration::seconds(1)),
            comment("alice", "old", t0() - Duration::seconds(1)),
            comment("alice", "same instant", t0()),
        ];
        assert_eq!(count_new_comments(&comments, t0(), None, None), 1);
    }

    #[test]
    fn test_self_comment_boundary_is_inclusive() {
        let start = t0() + Duration::minutes(10);
        let comments = vec![
            comment("bot", "at start", start),
            comment("bot", "after start", start + Duration::seconds(1)),
            comment("bot", "before start", start - Duration::seconds(1)),
            comment("alice", "after start", start + Duration::seconds(5)),
        ];
        assert_eq!(count_new_comments(&comments, t0(), Some("bot"), Some(start)), 3);
    }

    #[test]
    fn test_unknown_actor_counts_everything() {
        let start = t0() + Duration::minutes(10);
        let comments = vec![comment("bot", "later", start + Duration::minutes(1))];
        assert_eq!(count_new_comments(&comments, t0(), None, Some(start)), 1);
        assert_eq!(count_new_comments(&comments, t0(), Some("bot"), None), 1);
    }

    fn report(new_comments: usize, detected: bool) -> FeedbackOutcome {
        FeedbackOutcome::Evaluated(FeedbackReport {
            feedback_detected: detected,
            new_comment_count: new_comments,
            ..Default::default()
        })
    }

    #[test]
    fn test_strict_gate_fails_without_comments() {
        let config = FeedbackConfig {
            require_new_comments: true,
            continue_only_on_feedback: false,
        };
        assert_eq!(
            apply_gates(&config, &report(0, true)),
            Err(FeedbackGateError::NoNewComments)
        );
        assert_eq!(apply_gates(&config, &report(2, true)), Ok(GateDecision::Proceed));
    }

    #[test]
    fn test_loose_gate_skips_without_feedback() {
        let config = FeedbackConfig {
            require_new_comments: false,
            continue_only_on_feedback: true,
        };
        assert_eq!(
            apply_gates(&config, &report(0, false)),
            Ok(GateDecision::SkipContinuation)
        );
        assert_eq!(apply_gates(&config, &report(0, true)), Ok(GateDecision::Proceed));
    }

    #[test]
    fn test_skipped_detection_passes_gates() {
        let config = FeedbackConfig {
            require_new_comments: true,
            continue_only_on_feedback: true,
        };
        let outcome = FeedbackOutcome::Skipped {
            reason: "x".to_string(),
        };
        assert_eq!(apply_gates(&config, &outcome), Ok(GateDecision::Proceed));
    }
}
