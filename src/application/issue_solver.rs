//! One attempt at one issue, end to end.
//!
//! Repository access is checked first, then an existing pull request puts the
//! attempt in continue mode. The workspace is prepared, feedback gates run,
//! the agent executes, and the outcome is published back to the tracker.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{info, instrument, warn};

use super::execution_controller::{resume_command, truncate, ExecutionController};
use super::exit_handler::ExitReporter;
use super::feedback_detector::{apply_gates, FeedbackDetector, FeedbackRequest, GateDecision};
use super::session_lifecycle::{SessionContext, SessionLifecycle};
use super::usage_limit::format_usage_limit_message;
use super::worker_pool::ItemProcessor;
use crate::domain::errors::DomainError;
use crate::domain::models::{
    ChangeRequestState, Config, ExecutionResult, FeedbackConfig, FeedbackOutcome, IssueDetails,
    IssueRef, ItemContext, PullRequestDetails, RepoRef, TaskPayload, WorkItemId,
};
use crate::domain::ports::{IssueTracker, NewPullRequest, VersionControl};
use crate::infrastructure::logging::SecretScrubber;

const SYSTEM_PROMPT: &str = "You are an AI issue solver working in a prepared git checkout. \
Read the issue and all feedback carefully, make the smallest complete change that resolves it, \
run the project's tests when they exist, and commit your work to the prepared branch. \
Do not switch branches and do not force-push.";

/// Diagnostic text posted to the tracker is cut to this many characters.
const MAX_DIAGNOSTIC_CHARS: usize = 2000;

/// Settings of the per-issue pipeline.
#[derive(Debug, Clone)]
pub struct SolverConfig {
    pub workspace_dir: PathBuf,
    pub session_log_dir: PathBuf,
    pub model: String,
    pub auto_continue: bool,
    pub close_issue_on_success: bool,
    pub feedback: FeedbackConfig,
}

impl From<&Config> for SolverConfig {
    fn from(config: &Config) -> Self {
        Self {
            workspace_dir: PathBuf::from(&config.workspace_dir),
            session_log_dir: PathBuf::from(&config.agent.log_dir),
            model: config.agent.model.clone(),
            auto_continue: config.auto_continue,
            close_issue_on_success: config.close_issue_on_success,
            feedback: config.feedback.clone(),
        }
    }
}

/// Which log pointer a session updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionMode {
    /// The exit reporter prints this session's log (single issue)
    Reporting,
    /// Sessions run side by side; each keeps its own pointer
    Detached,
}

/// How one attempt ended when it did not fail.
#[derive(Debug)]
pub enum SolveOutcome {
    Completed(ExecutionResult),
    /// Continue mode without feedback; nothing was run
    Skipped { reason: String },
}

/// Pipeline for a single issue attempt.
pub struct IssueSolver {
    tracker: Arc<dyn IssueTracker>,
    vcs: Arc<dyn VersionControl>,
    controller: ExecutionController,
    detector: FeedbackDetector,
    exit_reporter: Arc<ExitReporter>,
    scrubber: SecretScrubber,
    config: SolverConfig,
    session_mode: SessionMode,
}

/// Everything the publish step needs after the agent ran.
struct Workspace<'a> {
    issue: &'a IssueRef,
    details: &'a IssueDetails,
    repo: RepoRef,
    default_branch: String,
    branch: String,
    dir: PathBuf,
    pull_request: Option<PullRequestDetails>,
}

impl IssueSolver {
    pub fn new(
        tracker: Arc<dyn IssueTracker>,
        vcs: Arc<dyn VersionControl>,
        controller: ExecutionController,
        exit_reporter: Arc<ExitReporter>,
        config: SolverConfig,
        session_mode: SessionMode,
    ) -> Self {
        let detector = FeedbackDetector::new(Arc::clone(&tracker), Arc::clone(&vcs));
        Self {
            tracker,
            vcs,
            controller,
            detector,
            exit_reporter,
            scrubber: SecretScrubber::new(),
            config,
            session_mode,
        }
    }

    /// Run one attempt for `issue`, resuming `resume_session_id` when given.
    #[instrument(skip(self, issue), fields(issue = %issue), err)]
    pub async fn solve(&self, issue: &IssueRef, resume_session_id: Option<&str>) -> Result<SolveOutcome> {
        let repo = issue.repo_ref();
        let info = self
            .tracker
            .get_repository(&repo)
            .await
            .with_context(|| format!("reading repository {repo}"))?;
        if info.archived {
            return Err(DomainError::AccessDenied {
                repository: repo.to_string(),
                reason: "repository is archived".to_string(),
            }
            .into());
        }
        if !info.can_push {
            return Err(DomainError::AccessDenied {
                repository: repo.to_string(),
                reason: "no push permission".to_string(),
            }
            .into());
        }

        let details = self
            .tracker
            .get_issue(issue)
            .await
            .with_context(|| format!("reading issue {issue}"))?;

        let mut pull_request = if self.config.auto_continue {
            match self.tracker.find_pull_request_for_issue(issue).await {
                Ok(found) => found.filter(|pr| pr.state == ChangeRequestState::Open),
                Err(err) => {
                    warn!(error = %err, "could not look up linked pull request, starting fresh");
                    None
                }
            }
        } else {
            None
        };

        let dir = self
            .config
            .workspace_dir
            .join(&issue.owner)
            .join(&issue.repo)
            .join(format!("issue-{}", issue.number));
        self.vcs
            .clone_or_fetch(&repo, &dir)
            .await
            .with_context(|| format!("preparing workspace {}", dir.display()))?;

        let branch = match pull_request {
            Some(ref pr) => {
                info!(pr = pr.number, branch = %pr.head_ref, "continuing existing pull request");
                self.vcs.checkout_branch(&dir, &pr.head_ref, None).await?;
                pr.head_ref.clone()
            }
            None => {
                let branch = new_branch_name(issue.number, Utc::now());
                self.vcs
                    .checkout_branch(&dir, &branch, Some(&info.default_branch))
                    .await?;
                branch
            }
        };

        let work_started_at = Utc::now();
        let mut feedback_lines = Vec::new();
        if let Some(ref mut pr) = pull_request {
            let outcome = self
                .detector
                .detect(&FeedbackRequest {
                    issue,
                    pull_request: &*pr,
                    branch: &branch,
                    working_dir: Some(&dir),
                    work_started_at: Some(work_started_at),
                })
                .await;
            match apply_gates(&self.config.feedback, &outcome)? {
                GateDecision::SkipContinuation => {
                    info!("no feedback since last commit, leaving pull request alone");
                    return Ok(SolveOutcome::Skipped {
                        reason: "no feedback since the last commit".to_string(),
                    });
                }
                GateDecision::Proceed => {}
            }
            if let FeedbackOutcome::Evaluated(report) = outcome {
                feedback_lines = report.lines;
            }
            // Draft while the agent works; publishing marks it ready again.
            if !pr.draft {
                match self.tracker.convert_to_draft(pr).await {
                    Ok(()) => pr.draft = true,
                    Err(err) => {
                        warn!(pr = pr.number, error = %err, "could not convert pull request to draft")
                    }
                }
            }
            self.comment(&repo, pr.number, &start_comment(work_started_at)).await;
        }

        let workspace = Workspace {
            issue,
            details: &details,
            repo,
            default_branch: info.default_branch,
            branch,
            dir,
            pull_request,
        };
        let result = self
            .execute(&workspace, &feedback_lines, resume_session_id)
            .await?;

        if result.success {
            self.publish(&workspace, &result).await?;
            Ok(SolveOutcome::Completed(result))
        } else {
            self.report_failure(&workspace, &result).await;
            let class = result
                .failure_class
                .map_or("unknown", |class| class.as_str());
            Err(anyhow!("agent run for {issue} failed: {class}"))
        }
    }

    async fn execute(
        &self,
        workspace: &Workspace<'_>,
        feedback_lines: &[String],
        resume_session_id: Option<&str>,
    ) -> Result<ExecutionResult> {
        let context = match self.session_mode {
            SessionMode::Reporting => SessionContext::reporting(
                self.config.session_log_dir.clone(),
                Arc::clone(&self.exit_reporter),
            ),
            SessionMode::Detached => SessionContext::detached(
                self.config.session_log_dir.clone(),
                Arc::clone(&self.exit_reporter),
            ),
        };
        let mut lifecycle = SessionLifecycle::init(&context, resume_session_id)
            .await
            .context("opening session log")?;

        let ctx = ItemContext {
            item_id: workspace.issue.work_item_id(),
            owner: workspace.issue.owner.clone(),
            repo: workspace.issue.repo.clone(),
            item_number: workspace.issue.number,
            branch: workspace.branch.clone(),
            working_dir: workspace.dir.clone(),
            payload: TaskPayload {
                prompt: build_prompt(
                    workspace.issue,
                    &workspace.branch,
                    &workspace.dir,
                    workspace.pull_request.as_ref(),
                    feedback_lines,
                ),
                system_prompt: SYSTEM_PROMPT.to_string(),
                model: self.config.model.clone(),
            },
            resume_session_id: resume_session_id.map(str::to_string),
        };
        info!(log = %lifecycle.log_path().display(), "session started");
        Ok(self.controller.execute(&ctx, &mut lifecycle).await)
    }

    /// Push the work and reflect it on the tracker.
    async fn publish(&self, workspace: &Workspace<'_>, result: &ExecutionResult) -> Result<()> {
        let issue = workspace.issue;
        let committed = self
            .vcs
            .commit_all(&workspace.dir, &format!("Work on #{}", issue.number))
            .await?;
        let diff = self
            .vcs
            .diff_stat(&workspace.dir, &workspace.default_branch)
            .await
            .unwrap_or_default();

        let pr_number = match workspace.pull_request {
            Some(ref pr) => {
                self.vcs.push(&workspace.dir, &workspace.branch).await?;
                if pr.draft {
                    self.tracker.mark_ready_for_review(pr).await?;
                }
                Some(pr.number)
            }
            None if diff.trim().is_empty() && !committed => {
                warn!("agent left no changes, no pull request created");
                None
            }
            None => {
                self.vcs.push(&workspace.dir, &workspace.branch).await?;
                let created = self
                    .tracker
                    .create_pull_request(
                        &workspace.repo,
                        &NewPullRequest {
                            title: workspace.details.title.clone(),
                            body: format!("Fixes #{}\n\n```\n{}\n```", issue.number, diff.trim()),
                            head: workspace.branch.clone(),
                            base: workspace.default_branch.clone(),
                            draft: false,
                        },
                    )
                    .await
                    .context("creating pull request")?;
                info!(pr = created.number, "pull request created");
                Some(created.number)
            }
        };

        let target = pr_number.unwrap_or(issue.number);
        if let Some(comment) = cost_comment(result) {
            self.comment(&workspace.repo, target, &comment).await;
        }
        if self.config.close_issue_on_success {
            self.tracker
                .close_issue(issue)
                .await
                .with_context(|| format!("closing {issue}"))?;
        }
        if workspace.pull_request.is_some() {
            self.comment(&workspace.repo, target, &end_comment(Utc::now())).await;
        }
        Ok(())
    }

    /// Tell the tracker why the attempt failed, unless credentials are broken.
    async fn report_failure(&self, workspace: &Workspace<'_>, result: &ExecutionResult) {
        if result
            .failure_class
            .is_some_and(|class| !class.allows_tracker_comments())
        {
            warn!("authentication failure, not posting to the tracker");
            return;
        }
        let target = workspace
            .pull_request
            .as_ref()
            .map_or(workspace.issue.number, |pr| pr.number);

        let body = if result.limit_reached {
            let resume = result
                .session_id
                .as_deref()
                .map(|id| resume_command(&workspace.issue.work_item_id(), id));
            let lines = format_usage_limit_message(
                &self.controller.config().tool_name,
                result.limit_reset_time.as_deref(),
                result.session_id.as_deref(),
                resume.as_deref(),
            );
            usage_limit_comment(&lines)
        } else {
            let class = result
                .failure_class
                .map_or("unknown", |class| class.as_str());
            let text = result.result_text.as_deref().unwrap_or("no output");
            let scrubbed = self.scrubber.scrub(truncate(text, MAX_DIAGNOSTIC_CHARS));
            failure_comment(class, &scrubbed)
        };
        self.comment(&workspace.repo, target, &body).await;
    }

    async fn comment(&self, repo: &RepoRef, number: u64, body: &str) {
        if let Err(err) = self.tracker.post_comment(repo, number, body).await {
            warn!(number, error = %err, "could not post comment");
        }
    }
}

#[async_trait]
impl ItemProcessor for IssueSolver {
    async fn process(&self, item: &WorkItemId, attempt: u32, total: u32) -> Result<()> {
        let issue = IssueRef::parse(item.as_str())?;
        info!(item = %item, attempt, total, "solving issue");
        match self.solve(&issue, None).await? {
            SolveOutcome::Completed(result) => info!(
                item = %item,
                session_id = ?result.session_id,
                cost_usd = ?result.cost_estimate_usd,
                "issue attempt completed"
            ),
            SolveOutcome::Skipped { reason } => info!(item = %item, %reason, "issue skipped"),
        }
        Ok(())
    }
}

/// `issue-<n>-<8 hex digits>` derived from the clock.
pub fn new_branch_name(number: u64, now: DateTime<Utc>) -> String {
    let millis = u64::try_from(now.timestamp_millis()).unwrap_or_default();
    format!("issue-{number}-{:08x}", millis & 0xffff_ffff)
}

/// Task prompt handed to the agent.
pub fn build_prompt(
    issue: &IssueRef,
    branch: &str,
    working_dir: &std::path::Path,
    pull_request: Option<&PullRequestDetails>,
    feedback_lines: &[String],
) -> String {
    let mut lines = vec![
        format!("Issue to solve: {}", issue.url()),
        format!("Your prepared branch: {branch}"),
        format!("Your prepared working directory: {}", working_dir.display()),
    ];
    if let Some(pr) = pull_request {
        lines.push(format!(
            "Your prepared Pull Request: https://github.com/{}/{}/pull/{}",
            issue.owner, issue.repo, pr.number
        ));
    }
    if !feedback_lines.is_empty() {
        lines.push(String::new());
        lines.push("New feedback since the last commit:".to_string());
        lines.extend(feedback_lines.iter().map(|line| format!("- {line}")));
    }
    lines.push(String::new());
    lines.push(if pull_request.is_some() { "Continue." } else { "Proceed." }.to_string());
    lines.join("\n")
}

fn start_comment(at: DateTime<Utc>) -> String {
    format!(
        "🤖 **AI Work Session Started**\n\nStarting automated work session at {}\n\n\
         _This comment marks the beginning of an AI work session. Please wait for the session to finish before giving feedback._",
        at.to_rfc3339()
    )
}

fn end_comment(at: DateTime<Utc>) -> String {
    format!(
        "🤖 **AI Work Session Completed**\n\nWork session ended at {}\n\n\
         _New comments after this time will be considered as feedback._",
        at.to_rfc3339()
    )
}

fn usage_limit_comment(lines: &[String]) -> String {
    format!("## ⏳ Usage Limit Reached\n\n{}", lines.join("\n"))
}

fn failure_comment(class: &str, diagnostic: &str) -> String {
    format!("## ❌ AI work session failed\n\nFailure: `{class}`\n\n```\n{diagnostic}\n```")
}

fn cost_comment(result: &ExecutionResult) -> Option<String> {
    let cost = result.cost_estimate_usd?;
    let session = result.session_id.as_deref().unwrap_or("unknown");
    Some(format!(
        "## 💰 Cost estimation\n\n- Session: `{session}`\n- Estimated cost: ${cost:.6}\n- Messages: {}, tool uses: {}",
        result.message_count, result.tool_use_count
    ))
}
