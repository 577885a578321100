//! GitHub REST/GraphQL adapter for the [`IssueTracker`] port.

use std::num::NonZeroU32;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use reqwest::{header, Client as ReqwestClient, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde_json::json;
use tokio::sync::OnceCell;
use tokio::time::sleep;
use tracing::{debug, instrument, warn};

use super::errors::GithubApiError;
use super::models::{
    ApiComment, ApiCommit, ApiIssue, ApiPullRequest, ApiRepository, ApiReview, ApiUser,
    CheckRunList, CreatePullRequestBody, GraphQlResponse, SearchResult,
};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    CheckRun, Comment, IssueDetails, IssueRef, PullRequestDetails, RepoRef, RepositoryInfo,
    Review,
};
use crate::domain::ports::{IssueTracker, NewPullRequest};

const PER_PAGE: usize = 100;
const MAX_PAGES: usize = 10;

/// Configuration for the GitHub client
#[derive(Debug, Clone)]
pub struct GithubClientConfig {
    /// Personal access or app token; anonymous when absent
    pub token: Option<String>,
    /// REST base URL, GraphQL lives at `<api_base>/graphql`
    pub api_base: String,
    /// Request budget (GitHub grants 5000/hour to authenticated users)
    pub requests_per_hour: u32,
    pub timeout_secs: u64,
    /// Retries for transient failures (5xx, 429, network)
    pub max_retries: u32,
    pub retry_base_delay: Duration,
}

impl Default for GithubClientConfig {
    fn default() -> Self {
        Self {
            token: None,
            api_base: "https://api.github.com".to_string(),
            requests_per_hour: 5000,
            timeout_secs: 30,
            max_retries: 2,
            retry_base_delay: Duration::from_secs(2),
        }
    }
}

/// HTTP client for the GitHub API
///
/// - Connection pooling via `reqwest::Client`
/// - Request budget enforced with a `governor` rate limiter
/// - Transient failures retried with exponential backoff
/// - Every failure surfaces as [`DomainError::Integration`] naming the call
pub struct GithubClient {
    http_client: ReqwestClient,
    api_base: String,
    token: Option<String>,
    rate_limiter: DefaultDirectRateLimiter,
    max_retries: u32,
    retry_base_delay: Duration,
    actor: OnceCell<String>,
}

impl GithubClient {
    pub fn with_config(config: GithubClientConfig) -> Result<Self> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(
            "X-GitHub-Api-Version",
            header::HeaderValue::from_static("2022-11-28"),
        );
        let http_client = ReqwestClient::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("issuehive/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .pool_max_idle_per_host(10)
            .build()
            .context("Failed to build HTTP client")?;

        let per_hour = NonZeroU32::new(config.requests_per_hour).unwrap_or(NonZeroU32::MIN);
        Ok(Self {
            http_client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            token: config.token.filter(|t| !t.trim().is_empty()),
            rate_limiter: RateLimiter::direct(Quota::per_hour(per_hour)),
            max_retries: config.max_retries,
            retry_base_delay: config.retry_base_delay,
            actor: OnceCell::new(),
        })
    }

    /// Token from `GITHUB_TOKEN` (or `GH_TOKEN`), rooted at `api_base`.
    pub fn from_env(api_base: &str) -> Result<Self> {
        let token = std::env::var("GITHUB_TOKEN")
            .or_else(|_| std::env::var("GH_TOKEN"))
            .ok();
        if token.is_none() {
            warn!("GITHUB_TOKEN not set, using anonymous GitHub access");
        }
        Self::with_config(GithubClientConfig {
            token,
            api_base: api_base.to_string(),
            ..Default::default()
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self
            .http_client
            .request(method, format!("{}{path}", self.api_base));
        match self.token {
            Some(ref token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Send with rate limiting and transient retries; returns the body text.
    async fn send(
        &self,
        build: impl Fn() -> RequestBuilder + Send + Sync,
    ) -> Result<String, GithubApiError> {
        let mut attempt = 0u32;
        loop {
            self.rate_limiter.until_ready().await;
            let err = match build().send().await {
                Ok(response) => {
                    let status = response.status();
                    let body = response.text().await?;
                    if status.is_success() {
                        return Ok(body);
                    }
                    GithubApiError::from_status(status, body)
                }
                Err(err) => GithubApiError::from(err),
            };
            if !err.is_transient() || attempt >= self.max_retries {
                return Err(err);
            }
            attempt += 1;
            let delay = self.retry_base_delay * 2u32.saturating_pow(attempt - 1);
            warn!(attempt, delay_ms = delay.as_millis() as u64, error = %err, "transient GitHub error, retrying");
            sleep(delay).await;
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        operation: &str,
        path: &str,
        query: &[(&str, String)],
    ) -> DomainResult<T> {
        let body = self
            .send(|| self.request(Method::GET, path).query(query))
            .await
            .map_err(|e| e.into_domain(operation))?;
        serde_json::from_str(&body).map_err(|e| DomainError::integration(operation, e))
    }

    /// Follow `page=` until a short page, up to [`MAX_PAGES`].
    async fn get_paged<T: DeserializeOwned>(
        &self,
        operation: &str,
        path: &str,
        query: &[(&str, String)],
    ) -> DomainResult<Vec<T>> {
        let mut all = Vec::new();
        for page in 1..=MAX_PAGES {
            let mut params = query.to_vec();
            params.push(("per_page", PER_PAGE.to_string()));
            params.push(("page", page.to_string()));
            let batch: Vec<T> = self.get_json(operation, path, &params).await?;
            let len = batch.len();
            all.extend(batch);
            if len < PER_PAGE {
                break;
            }
        }
        Ok(all)
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        operation: &str,
        method: Method,
        path: &str,
        payload: &serde_json::Value,
    ) -> DomainResult<T> {
        let body = self
            .send(|| self.request(method.clone(), path).json(payload))
            .await
            .map_err(|e| e.into_domain(operation))?;
        serde_json::from_str(&body).map_err(|e| DomainError::integration(operation, e))
    }

    fn repo_path(repo: &RepoRef) -> String {
        format!("/repos/{}/{}", repo.owner, repo.repo)
    }

    /// GraphQL mutation keyed by the pull request's node id.
    async fn pull_request_mutation(
        &self,
        operation: &'static str,
        mutation: &str,
        pull_request: &PullRequestDetails,
    ) -> DomainResult<()> {
        let payload = json!({
            "query": mutation,
            "variables": { "id": pull_request.node_id },
        });
        let response: GraphQlResponse = self
            .send_json(operation, Method::POST, "/graphql", &payload)
            .await?;
        if let Some(first) = response.errors.into_iter().next() {
            return Err(GithubApiError::GraphQl(first.message).into_domain(operation));
        }
        Ok(())
    }
}

#[async_trait]
impl IssueTracker for GithubClient {
    #[instrument(skip(self))]
    async fn list_open_issues(
        &self,
        owner: &str,
        repo: &str,
        label: &str,
    ) -> DomainResult<Vec<IssueRef>> {
        if repo.is_empty() {
            let query = format!("user:{owner} is:issue is:open label:\"{label}\"");
            let result: SearchResult = self
                .get_json(
                    "search_issues",
                    "/search/issues",
                    &[("q", query), ("per_page", PER_PAGE.to_string())],
                )
                .await?;
            return Ok(result
                .items
                .into_iter()
                .filter(|issue| !issue.is_pull_request())
                .filter_map(|issue| {
                    let (owner, repo) = issue.repository()?;
                    Some(issue.into_ref(&owner, &repo))
                })
                .collect());
        }

        let issues: Vec<ApiIssue> = self
            .get_paged(
                "list_open_issues",
                &format!("/repos/{owner}/{repo}/issues"),
                &[("state", "open".to_string()), ("labels", label.to_string())],
            )
            .await?;
        debug!(count = issues.len(), "issues listed");
        Ok(issues
            .into_iter()
            .filter(|issue| !issue.is_pull_request())
            .map(|issue| issue.into_ref(owner, repo))
            .collect())
    }

    async fn get_issue(&self, issue: &IssueRef) -> DomainResult<IssueDetails> {
        let path = format!("{}/issues/{}", Self::repo_path(&issue.repo_ref()), issue.number);
        let api: ApiIssue = self.get_json("get_issue", &path, &[]).await?;
        Ok(api.into())
    }

    async fn list_issue_comments(&self, repo: &RepoRef, number: u64) -> DomainResult<Vec<Comment>> {
        let path = format!("{}/issues/{number}/comments", Self::repo_path(repo));
        let comments: Vec<ApiComment> = self.get_paged("list_issue_comments", &path, &[]).await?;
        Ok(comments.into_iter().map(Comment::from).collect())
    }

    async fn list_review_comments(&self, repo: &RepoRef, number: u64) -> DomainResult<Vec<Comment>> {
        let path = format!("{}/pulls/{number}/comments", Self::repo_path(repo));
        let comments: Vec<ApiComment> = self.get_paged("list_review_comments", &path, &[]).await?;
        Ok(comments.into_iter().map(Comment::from).collect())
    }

    #[instrument(skip(self, body), fields(repo = %repo))]
    async fn post_comment(&self, repo: &RepoRef, number: u64, body: &str) -> DomainResult<()> {
        let path = format!("{}/issues/{number}/comments", Self::repo_path(repo));
        let _: serde_json::Value = self
            .send_json("post_comment", Method::POST, &path, &json!({ "body": body }))
            .await?;
        Ok(())
    }

    #[instrument(skip(self), fields(issue = %issue))]
    async fn close_issue(&self, issue: &IssueRef) -> DomainResult<()> {
        let path = format!("{}/issues/{}", Self::repo_path(&issue.repo_ref()), issue.number);
        let _: serde_json::Value = self
            .send_json("close_issue", Method::PATCH, &path, &json!({ "state": "closed" }))
            .await?;
        Ok(())
    }

    async fn get_pull_request(&self, repo: &RepoRef, number: u64) -> DomainResult<PullRequestDetails> {
        let path = format!("{}/pulls/{number}", Self::repo_path(repo));
        let pr: ApiPullRequest = self.get_json("get_pull_request", &path, &[]).await?;
        Ok(pr.into())
    }

    async fn find_pull_request_for_issue(
        &self,
        issue: &IssueRef,
    ) -> DomainResult<Option<PullRequestDetails>> {
        let repo = issue.repo_ref();
        let path = format!("{}/pulls", Self::repo_path(&repo));
        let open: Vec<ApiPullRequest> = self
            .get_paged("find_pull_request", &path, &[("state", "open".to_string())])
            .await?;
        match open.into_iter().find(|pr| pr.links_issue(issue.number)) {
            // List responses omit mergeable_state; fetch the full record.
            Some(pr) => self.get_pull_request(&repo, pr.number).await.map(Some),
            None => Ok(None),
        }
    }

    #[instrument(skip(self, request), fields(repo = %repo, head = %request.head))]
    async fn create_pull_request(
        &self,
        repo: &RepoRef,
        request: &NewPullRequest,
    ) -> DomainResult<PullRequestDetails> {
        let path = format!("{}/pulls", Self::repo_path(repo));
        let payload = serde_json::to_value(CreatePullRequestBody {
            title: &request.title,
            body: &request.body,
            head: &request.head,
            base: &request.base,
            draft: request.draft,
        })?;
        let pr: ApiPullRequest = self
            .send_json("create_pull_request", Method::POST, &path, &payload)
            .await?;
        Ok(pr.into())
    }

    #[instrument(skip(self, pull_request), fields(pr = pull_request.number))]
    async fn mark_ready_for_review(&self, pull_request: &PullRequestDetails) -> DomainResult<()> {
        self.pull_request_mutation(
            "mark_ready_for_review",
            "mutation($id: ID!) { markPullRequestReadyForReview(input: {pullRequestId: $id}) { pullRequest { isDraft } } }",
            pull_request,
        )
        .await
    }

    async fn convert_to_draft(&self, pull_request: &PullRequestDetails) -> DomainResult<()> {
        self.pull_request_mutation(
            "convert_to_draft",
            "mutation($id: ID!) { convertPullRequestToDraft(input: {pullRequestId: $id}) { pullRequest { isDraft } } }",
            pull_request,
        )
        .await
    }

    async fn list_check_runs(&self, repo: &RepoRef, sha: &str) -> DomainResult<Vec<CheckRun>> {
        let path = format!("{}/commits/{sha}/check-runs", Self::repo_path(repo));
        let list: CheckRunList = self
            .get_json("list_check_runs", &path, &[("per_page", PER_PAGE.to_string())])
            .await?;
        Ok(list.check_runs.into_iter().map(CheckRun::from).collect())
    }

    async fn list_reviews(&self, repo: &RepoRef, number: u64) -> DomainResult<Vec<Review>> {
        let path = format!("{}/pulls/{number}/reviews", Self::repo_path(repo));
        let reviews: Vec<ApiReview> = self.get_paged("list_reviews", &path, &[]).await?;
        Ok(reviews.into_iter().map(Review::from).collect())
    }

    async fn count_commits_since(
        &self,
        repo: &RepoRef,
        branch: &str,
        since: DateTime<Utc>,
    ) -> DomainResult<usize> {
        let path = format!("{}/commits", Self::repo_path(repo));
        let commits: Vec<serde_json::Value> = self
            .get_paged(
                "count_commits_since",
                &path,
                &[
                    ("sha", branch.to_string()),
                    ("since", since.to_rfc3339_opts(SecondsFormat::Secs, true)),
                ],
            )
            .await?;
        Ok(commits.len())
    }

    async fn last_pull_request_commit_time(
        &self,
        repo: &RepoRef,
        number: u64,
    ) -> DomainResult<Option<DateTime<Utc>>> {
        let path = format!("{}/pulls/{number}/commits", Self::repo_path(repo));
        let commits: Vec<ApiCommit> = self
            .get_paged("last_pull_request_commit_time", &path, &[])
            .await?;
        Ok(commits.last().map(|c| c.commit.committer.date))
    }

    async fn get_repository(&self, repo: &RepoRef) -> DomainResult<RepositoryInfo> {
        let api: ApiRepository = self
            .get_json("get_repository", &Self::repo_path(repo), &[])
            .await?;
        Ok(api.into())
    }

    async fn current_actor(&self) -> DomainResult<String> {
        self.actor
            .get_or_try_init(|| async {
                let user: ApiUser = self.get_json("current_actor", "/user", &[]).await?;
                Ok::<_, DomainError>(user.login)
            })
            .await
            .cloned()
    }
}
