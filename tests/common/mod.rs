//! Common test utilities for integration tests
//!
//! In-memory stand-ins for the tracker, version control and agent ports,
//! plus canned agent streams.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use tokio::sync::{mpsc, oneshot};

use issuehive::application::{ExitReporter, LogPointer};
use issuehive::domain::errors::{DomainError, DomainResult};
use issuehive::domain::models::{
    AgentOutput, ChangeRequestState, CheckRun, Comment, IssueDetails, IssueRef, MergeStatus,
    PullRequestDetails, RepoRef, RepositoryInfo, Review, TaskPayload,
};
use issuehive::domain::ports::{AgentProcess, AgentRun, IssueTracker, NewPullRequest, VersionControl};
use issuehive::infrastructure::agent::parse_output_line;

/// Fixed reference instant used across scenarios.
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
}

/// Setup test logging
#[allow(dead_code)]
pub fn setup_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Exit reporter that writes nowhere.
pub fn quiet_reporter() -> Arc<ExitReporter> {
    Arc::new(ExitReporter::with_sink(
        LogPointer::default(),
        Box::new(std::io::sink()),
    ))
}

pub fn comment(author: &str, body: &str, at: DateTime<Utc>) -> Comment {
    Comment {
        author: author.to_string(),
        body: body.to_string(),
        created_at: at,
    }
}

pub fn open_pull_request(number: u64, updated_at: DateTime<Utc>) -> PullRequestDetails {
    PullRequestDetails {
        number,
        state: ChangeRequestState::Open,
        merge_status: MergeStatus::Clean,
        head_sha: "abc123".to_string(),
        head_ref: format!("issue-{number}-deadbeef"),
        draft: true,
        updated_at,
        node_id: format!("PR_{number}"),
    }
}

/// Tracker backed by plain fields; mutations are recorded.
pub struct StubTracker {
    pub open_issues: Vec<IssueRef>,
    pub issue: IssueDetails,
    pub repository: RepositoryInfo,
    pub pull_request: Option<PullRequestDetails>,
    pub issue_comments: Vec<Comment>,
    pub pull_request_comments: Vec<Comment>,
    pub review_comments: Vec<Comment>,
    pub check_runs: Vec<CheckRun>,
    pub reviews: Vec<Review>,
    pub trunk_commits: usize,
    pub last_pull_request_commit: Option<DateTime<Utc>>,
    pub actor: Option<String>,
    /// Operations that answer with an integration error
    pub failing: HashSet<&'static str>,

    pub list_calls: AtomicUsize,
    pub posted: Mutex<Vec<(u64, String)>>,
    pub created: Mutex<Vec<NewPullRequest>>,
    pub closed: Mutex<Vec<u64>>,
    pub marked_ready: Mutex<Vec<u64>>,
    pub drafted: Mutex<Vec<u64>>,
}

impl StubTracker {
    pub fn new() -> Self {
        Self {
            open_issues: Vec::new(),
            issue: IssueDetails {
                number: 7,
                title: "Widgets crash on empty input".to_string(),
                body: "Steps to reproduce: pass an empty string.".to_string(),
                state: "open".to_string(),
                html_url: "https://github.com/acme/widgets/issues/7".to_string(),
                updated_at: t0() - chrono::Duration::days(1),
                labels: vec!["help wanted".to_string()],
            },
            repository: RepositoryInfo {
                archived: false,
                default_branch: "main".to_string(),
                can_push: true,
            },
            pull_request: None,
            issue_comments: Vec::new(),
            pull_request_comments: Vec::new(),
            review_comments: Vec::new(),
            check_runs: Vec::new(),
            reviews: Vec::new(),
            trunk_commits: 0,
            last_pull_request_commit: None,
            actor: Some("hive-bot".to_string()),
            failing: HashSet::new(),
            list_calls: AtomicUsize::new(0),
            posted: Mutex::new(Vec::new()),
            created: Mutex::new(Vec::new()),
            closed: Mutex::new(Vec::new()),
            marked_ready: Mutex::new(Vec::new()),
            drafted: Mutex::new(Vec::new()),
        }
    }

    fn check(&self, operation: &'static str) -> DomainResult<()> {
        if self.failing.contains(operation) {
            return Err(DomainError::integration(operation, "stubbed failure"));
        }
        Ok(())
    }

    pub fn posted_bodies(&self) -> Vec<String> {
        self.posted
            .lock()
            .unwrap()
            .iter()
            .map(|(_, body)| body.clone())
            .collect()
    }
}

impl Default for StubTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IssueTracker for StubTracker {
    async fn list_open_issues(&self, _owner: &str, _repo: &str, _label: &str) -> DomainResult<Vec<IssueRef>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.check("list_open_issues")?;
        Ok(self.open_issues.clone())
    }

    async fn get_issue(&self, _issue: &IssueRef) -> DomainResult<IssueDetails> {
        self.check("get_issue")?;
        Ok(self.issue.clone())
    }

    async fn list_issue_comments(&self, _repo: &RepoRef, number: u64) -> DomainResult<Vec<Comment>> {
        self.check("list_issue_comments")?;
        if self.pull_request.as_ref().is_some_and(|pr| pr.number == number) {
            return Ok(self.pull_request_comments.clone());
        }
        Ok(self.issue_comments.clone())
    }

    async fn list_review_comments(&self, _repo: &RepoRef, _number: u64) -> DomainResult<Vec<Comment>> {
        self.check("list_review_comments")?;
        Ok(self.review_comments.clone())
    }

    async fn post_comment(&self, _repo: &RepoRef, number: u64, body: &str) -> DomainResult<()> {
        self.check("post_comment")?;
        self.posted.lock().unwrap().push((number, body.to_string()));
        Ok(())
    }

    async fn close_issue(&self, issue: &IssueRef) -> DomainResult<()> {
        self.check("close_issue")?;
        self.closed.lock().unwrap().push(issue.number);
        Ok(())
    }

    async fn get_pull_request(&self, _repo: &RepoRef, number: u64) -> DomainResult<PullRequestDetails> {
        self.check("get_pull_request")?;
        self.pull_request
            .clone()
            .filter(|pr| pr.number == number)
            .ok_or_else(|| DomainError::integration("get_pull_request", "404 Not Found"))
    }

    async fn find_pull_request_for_issue(&self, _issue: &IssueRef) -> DomainResult<Option<PullRequestDetails>> {
        self.check("find_pull_request_for_issue")?;
        Ok(self.pull_request.clone())
    }

    async fn create_pull_request(
        &self,
        _repo: &RepoRef,
        request: &NewPullRequest,
    ) -> DomainResult<PullRequestDetails> {
        self.check("create_pull_request")?;
        self.created.lock().unwrap().push(request.clone());
        Ok(PullRequestDetails {
            head_ref: request.head.clone(),
            draft: request.draft,
            ..open_pull_request(100, Utc::now())
        })
    }

    async fn mark_ready_for_review(&self, pull_request: &PullRequestDetails) -> DomainResult<()> {
        self.check("mark_ready_for_review")?;
        self.marked_ready.lock().unwrap().push(pull_request.number);
        Ok(())
    }

    async fn convert_to_draft(&self, pull_request: &PullRequestDetails) -> DomainResult<()> {
        self.check("convert_to_draft")?;
        self.drafted.lock().unwrap().push(pull_request.number);
        Ok(())
    }

    async fn list_check_runs(&self, _repo: &RepoRef, _sha: &str) -> DomainResult<Vec<CheckRun>> {
        self.check("list_check_runs")?;
        Ok(self.check_runs.clone())
    }

    async fn list_reviews(&self, _repo: &RepoRef, _number: u64) -> DomainResult<Vec<Review>> {
        self.check("list_reviews")?;
        Ok(self.reviews.clone())
    }

    async fn count_commits_since(
        &self,
        _repo: &RepoRef,
        _branch: &str,
        _since: DateTime<Utc>,
    ) -> DomainResult<usize> {
        self.check("count_commits_since")?;
        Ok(self.trunk_commits)
    }

    async fn last_pull_request_commit_time(
        &self,
        _repo: &RepoRef,
        _number: u64,
    ) -> DomainResult<Option<DateTime<Utc>>> {
        self.check("last_pull_request_commit_time")?;
        Ok(self.last_pull_request_commit)
    }

    async fn get_repository(&self, _repo: &RepoRef) -> DomainResult<RepositoryInfo> {
        self.check("get_repository")?;
        Ok(self.repository.clone())
    }

    async fn current_actor(&self) -> DomainResult<String> {
        self.check("current_actor")?;
        self.actor
            .clone()
            .ok_or_else(|| DomainError::integration("current_actor", "401 Unauthorized"))
    }
}

/// Version control that never touches the disk beyond creating the checkout dir.
pub struct StubVcs {
    /// Commit times by revision name
    pub commit_times: HashMap<String, DateTime<Utc>>,
    /// What `commit_all` reports
    pub has_changes: bool,
    pub diff: String,
    pub calls: Mutex<Vec<String>>,
}

impl StubVcs {
    pub fn new() -> Self {
        Self {
            commit_times: HashMap::new(),
            has_changes: true,
            diff: " src/lib.rs | 3 ++-\n 1 file changed".to_string(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_commit(mut self, revision: &str, at: DateTime<Utc>) -> Self {
        self.commit_times.insert(revision.to_string(), at);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

impl Default for StubVcs {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VersionControl for StubVcs {
    async fn clone_or_fetch(&self, repo: &RepoRef, dest: &Path) -> DomainResult<()> {
        tokio::fs::create_dir_all(dest).await?;
        self.record(format!("clone {repo}"));
        Ok(())
    }

    async fn checkout_branch(&self, _dir: &Path, branch: &str, base: Option<&str>) -> DomainResult<()> {
        self.record(format!("checkout {branch} from {}", base.unwrap_or(branch)));
        Ok(())
    }

    async fn last_commit_time(&self, _dir: &Path, revision: &str) -> DomainResult<Option<DateTime<Utc>>> {
        Ok(self.commit_times.get(revision).copied())
    }

    async fn commit_all(&self, _dir: &Path, _message: &str) -> DomainResult<bool> {
        self.record("commit".to_string());
        Ok(self.has_changes)
    }

    async fn push(&self, _dir: &Path, branch: &str) -> DomainResult<()> {
        self.record(format!("push {branch}"));
        Ok(())
    }

    async fn diff_stat(&self, _dir: &Path, _base: &str) -> DomainResult<String> {
        Ok(if self.has_changes {
            self.diff.clone()
        } else {
            String::new()
        })
    }
}

/// Agent that replays one canned stream per spawn.
pub struct ScriptedAgent {
    runs: Mutex<VecDeque<Vec<AgentOutput>>>,
    /// Resume id passed to each spawn
    pub spawns: Mutex<Vec<Option<String>>>,
}

impl ScriptedAgent {
    pub fn new(runs: Vec<Vec<AgentOutput>>) -> Self {
        Self {
            runs: Mutex::new(runs.into()),
            spawns: Mutex::new(Vec::new()),
        }
    }

    pub fn spawn_count(&self) -> usize {
        self.spawns.lock().unwrap().len()
    }
}

#[async_trait]
impl AgentProcess for ScriptedAgent {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn spawn(
        &self,
        _payload: &TaskPayload,
        _working_dir: &Path,
        resume_session_id: Option<&str>,
    ) -> DomainResult<AgentRun> {
        self.spawns
            .lock()
            .unwrap()
            .push(resume_session_id.map(str::to_string));
        let outputs = self
            .runs
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| vec![AgentOutput::Exited { code: Some(0) }]);

        let (tx, rx) = mpsc::channel(outputs.len().max(1));
        for output in outputs {
            tx.try_send(output)
                .map_err(|e| DomainError::AgentProcess(e.to_string()))?;
        }
        let (stop_tx, _stop_rx) = oneshot::channel();
        Ok(AgentRun::new(rx, stop_tx))
    }
}

pub fn line(json: &str) -> AgentOutput {
    parse_output_line(json)
}

/// A run that does some work and exits cleanly.
pub fn success_run(session_id: &str) -> Vec<AgentOutput> {
    vec![
        line(&format!(r#"{{"type":"system","subtype":"init","session_id":"{session_id}"}}"#)),
        line(&format!(
            r#"{{"type":"assistant","session_id":"{session_id}","message":{{"content":[{{"type":"text","text":"Fixed the crash."}},{{"type":"tool_use","name":"Edit"}}]}}}}"#
        )),
        line(&format!(
            r#"{{"type":"result","session_id":"{session_id}","is_error":false,"result":"Done","total_cost_usd":0.12}}"#
        )),
        AgentOutput::Exited { code: Some(0) },
    ]
}

/// A run that streams an overload error and exits non-zero.
pub fn overload_run(session_id: &str) -> Vec<AgentOutput> {
    vec![
        line(&format!(r#"{{"type":"system","session_id":"{session_id}"}}"#)),
        line(&format!(
            r#"{{"type":"assistant","session_id":"{session_id}","message":{{"content":[{{"type":"text","text":"API Error: 500 {{\"type\":\"error\",\"error\":{{\"type\":\"api_error\",\"message\":\"Overloaded\"}}}}"}}]}}}}"#
        )),
        AgentOutput::Exited { code: Some(1) },
    ]
}

/// A run that ends on an exhausted usage quota.
pub fn usage_limit_run(session_id: &str) -> Vec<AgentOutput> {
    vec![
        line(&format!(r#"{{"type":"system","session_id":"{session_id}"}}"#)),
        line(&format!(
            r#"{{"type":"result","session_id":"{session_id}","is_error":true,"result":"Session limit reached ∙ resets 5am"}}"#
        )),
        AgentOutput::Exited { code: Some(1) },
    ]
}

/// A run that hits an upstream 503 and exits non-zero.
pub fn network_run(session_id: &str) -> Vec<AgentOutput> {
    vec![
        line(&format!(r#"{{"type":"system","session_id":"{session_id}"}}"#)),
        line(&format!(
            r#"{{"type":"assistant","session_id":"{session_id}","message":{{"content":[{{"type":"text","text":"API Error: 503 upstream connect error or disconnect/reset before headers"}}]}}}}"#
        )),
        AgentOutput::Exited { code: Some(1) },
    ]
}
