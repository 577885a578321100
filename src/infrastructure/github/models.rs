//! GitHub REST payloads and their conversion into domain types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::models::{
    ChangeRequestState, CheckRun, Comment, IssueDetails, IssueRef, MergeStatus,
    PullRequestDetails, RepositoryInfo, Review,
};

#[derive(Debug, Clone, Deserialize)]
pub struct ApiUser {
    pub login: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiLabel {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiIssue {
    pub number: u64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub html_url: String,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub labels: Vec<ApiLabel>,
    /// Present when the issue is really a pull request
    #[serde(default)]
    pub pull_request: Option<serde_json::Value>,
    /// `https://api.github.com/repos/<owner>/<repo>` in search results
    #[serde(default)]
    pub repository_url: Option<String>,
}

impl ApiIssue {
    pub fn is_pull_request(&self) -> bool {
        self.pull_request.is_some()
    }

    /// Owner and name from `repository_url`.
    pub fn repository(&self) -> Option<(String, String)> {
        let url = self.repository_url.as_deref()?;
        let mut segments = url.trim_end_matches('/').rsplit('/');
        let repo = segments.next()?;
        let owner = segments.next()?;
        Some((owner.to_string(), repo.to_string()))
    }

    pub fn into_ref(self, owner: &str, repo: &str) -> IssueRef {
        IssueRef {
            owner: owner.to_string(),
            repo: repo.to_string(),
            number: self.number,
        }
    }
}

impl From<ApiIssue> for IssueDetails {
    fn from(issue: ApiIssue) -> Self {
        Self {
            number: issue.number,
            title: issue.title,
            body: issue.body.unwrap_or_default(),
            state: issue.state,
            html_url: issue.html_url,
            updated_at: issue.updated_at,
            labels: issue.labels.into_iter().map(|l| l.name).collect(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchResult {
    pub items: Vec<ApiIssue>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiComment {
    pub user: Option<ApiUser>,
    #[serde(default)]
    pub body: String,
    pub created_at: DateTime<Utc>,
}

impl From<ApiComment> for Comment {
    fn from(comment: ApiComment) -> Self {
        Self {
            author: comment.user.map(|u| u.login).unwrap_or_default(),
            body: comment.body,
            created_at: comment.created_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiHead {
    pub sha: String,
    #[serde(rename = "ref")]
    pub git_ref: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiPullRequest {
    pub number: u64,
    pub state: String,
    #[serde(default)]
    pub merged: bool,
    #[serde(default)]
    pub merged_at: Option<DateTime<Utc>>,
    /// Only filled on single-PR responses
    #[serde(default)]
    pub mergeable_state: Option<String>,
    pub head: ApiHead,
    #[serde(default)]
    pub draft: bool,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub node_id: String,
    #[serde(default)]
    pub body: Option<String>,
}

impl ApiPullRequest {
    /// Whether this pull request is linked to issue `number`, either by a
    /// closing keyword in its body or by the branch naming scheme.
    pub fn links_issue(&self, number: u64) -> bool {
        if self.head.git_ref.starts_with(&format!("issue-{number}-")) {
            return true;
        }
        let body = self.body.as_deref().unwrap_or_default().to_ascii_lowercase();
        let reference = format!("#{number}");
        ["fixes", "closes", "resolves"].iter().any(|keyword| {
            body.match_indices(keyword).any(|(idx, _)| {
                body[idx + keyword.len()..]
                    .trim_start()
                    .strip_prefix(&reference)
                    .is_some_and(|rest| !rest.starts_with(|c: char| c.is_ascii_digit()))
            })
        })
    }
}

impl From<ApiPullRequest> for PullRequestDetails {
    fn from(pr: ApiPullRequest) -> Self {
        let state = if pr.merged || pr.merged_at.is_some() {
            ChangeRequestState::Merged
        } else if pr.state.eq_ignore_ascii_case("closed") {
            ChangeRequestState::Closed
        } else {
            ChangeRequestState::Open
        };
        Self {
            number: pr.number,
            state,
            merge_status: pr
                .mergeable_state
                .as_deref()
                .map_or(MergeStatus::Unknown, MergeStatus::parse),
            head_sha: pr.head.sha,
            head_ref: pr.head.git_ref,
            draft: pr.draft,
            updated_at: pr.updated_at,
            node_id: pr.node_id,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CreatePullRequestBody<'a> {
    pub title: &'a str,
    pub body: &'a str,
    pub head: &'a str,
    pub base: &'a str,
    pub draft: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiCheckRun {
    pub name: String,
    pub conclusion: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckRunList {
    pub check_runs: Vec<ApiCheckRun>,
}

impl From<ApiCheckRun> for CheckRun {
    fn from(run: ApiCheckRun) -> Self {
        Self {
            name: run.name,
            conclusion: run.conclusion,
            completed_at: run.completed_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiReview {
    pub state: String,
    pub submitted_at: Option<DateTime<Utc>>,
}

impl From<ApiReview> for Review {
    fn from(review: ApiReview) -> Self {
        Self {
            state: review.state,
            submitted_at: review.submitted_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiCommitter {
    pub date: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiCommitDetail {
    pub committer: ApiCommitter,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiCommit {
    pub commit: ApiCommitDetail,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiPermissions {
    #[serde(default)]
    pub push: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiRepository {
    #[serde(default)]
    pub archived: bool,
    pub default_branch: String,
    #[serde(default)]
    pub permissions: Option<ApiPermissions>,
}

impl From<ApiRepository> for RepositoryInfo {
    fn from(repo: ApiRepository) -> Self {
        Self {
            archived: repo.archived,
            default_branch: repo.default_branch,
            can_push: repo.permissions.unwrap_or_default().push,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GraphQlResponse {
    #[serde(default)]
    pub errors: Vec<GraphQlError>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GraphQlError {
    pub message: String,
}
