//! Issue tracker port - interface to the backlog and its pull requests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::errors::DomainResult;
use crate::domain::models::{
    CheckRun, Comment, IssueDetails, IssueRef, PullRequestDetails, RepoRef, RepositoryInfo,
    Review,
};

/// Parameters for opening a pull request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPullRequest {
    pub title: String,
    pub body: String,
    pub head: String,
    pub base: String,
    pub draft: bool,
}

/// Trait for issue tracker implementations.
///
/// Every call is a network round-trip; failures surface as
/// [`DomainError::Integration`](crate::domain::errors::DomainError::Integration).
#[async_trait]
pub trait IssueTracker: Send + Sync {
    /// Open issues carrying `label`. An empty `repo` searches every
    /// repository of the owner.
    async fn list_open_issues(&self, owner: &str, repo: &str, label: &str)
        -> DomainResult<Vec<IssueRef>>;

    async fn get_issue(&self, issue: &IssueRef) -> DomainResult<IssueDetails>;

    /// Conversation comments on an issue or pull request (they share numbering).
    async fn list_issue_comments(&self, repo: &RepoRef, number: u64) -> DomainResult<Vec<Comment>>;

    /// Inline review comments on a pull request.
    async fn list_review_comments(&self, repo: &RepoRef, number: u64)
        -> DomainResult<Vec<Comment>>;

    async fn post_comment(&self, repo: &RepoRef, number: u64, body: &str) -> DomainResult<()>;

    async fn close_issue(&self, issue: &IssueRef) -> DomainResult<()>;

    async fn get_pull_request(&self, repo: &RepoRef, number: u64)
        -> DomainResult<PullRequestDetails>;

    /// The open pull request linked to an issue, if any.
    async fn find_pull_request_for_issue(
        &self,
        issue: &IssueRef,
    ) -> DomainResult<Option<PullRequestDetails>>;

    async fn create_pull_request(
        &self,
        repo: &RepoRef,
        request: &NewPullRequest,
    ) -> DomainResult<PullRequestDetails>;

    async fn mark_ready_for_review(&self, pull_request: &PullRequestDetails) -> DomainResult<()>;

    /// Turn an open pull request back into a draft while work is in progress.
    async fn convert_to_draft(&self, pull_request: &PullRequestDetails) -> DomainResult<()>;

    async fn list_check_runs(&self, repo: &RepoRef, sha: &str) -> DomainResult<Vec<CheckRun>>;

    async fn list_reviews(&self, repo: &RepoRef, number: u64) -> DomainResult<Vec<Review>>;

    /// Commits on `branch` authored after `since`.
    async fn count_commits_since(
        &self,
        repo: &RepoRef,
        branch: &str,
        since: DateTime<Utc>,
    ) -> DomainResult<usize>;

    /// Author date of the last commit of a pull request.
    async fn last_pull_request_commit_time(
        &self,
        repo: &RepoRef,
        number: u64,
    ) -> DomainResult<Option<DateTime<Utc>>>;

    async fn get_repository(&self, repo: &RepoRef) -> DomainResult<RepositoryInfo>;

    /// Login of the identity the tracker calls are made as.
    async fn current_actor(&self) -> DomainResult<String>;
}
