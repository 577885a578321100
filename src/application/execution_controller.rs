//! Resilient execution of one agent invocation.
//!
//! ```text
//! Start ──▶ Streaming ──▶ Success
//!   ▲           │
//!   │           ├──▶ Retryable(class) ──▶ backoff wait ──┐
//!   │           │                                        │
//!   └───────────┼────────────────────────────────────────┘
//!               └──▶ Fatal
//! ```
//!
//! The loop is explicit; each retryable class keeps its own counter.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time::{interval_at, sleep_until, Instant};
use tracing::{debug, error, info, instrument, warn};

use super::failure_classifier::{
    classify, is_error_shaped_diagnostic, is_streamed_overload, is_transient_network, AttemptEvidence,
};
use super::session_lifecycle::SessionLifecycle;
use super::usage_limit::{extract_reset_time, format_usage_limit_message};
use crate::domain::models::{
    AgentEventKind, AgentOutput, Attempt, ExecutionResult, FailureClass, ItemContext,
    RetryConfig, WorkItemId,
};
use crate::domain::ports::AgentProcess;

/// Exponential backoff for one failure class.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub enabled: bool,
    pub max_retries: u32,
    pub base_delay: Duration,
    pub multiplier: f64,
}

impl RetryPolicy {
    /// Wait before retry `retry` (1-based): `base * multiplier^(retry-1)`.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exponent = i32::try_from(retry.saturating_sub(1)).unwrap_or(i32::MAX);
        let factor = self.multiplier.max(1.0).powi(exponent);
        self.base_delay.mul_f64(factor.min(1e6))
    }

    pub fn allows(&self, retries_so_far: u32) -> bool {
        self.enabled && retries_so_far < self.max_retries
    }
}

/// Retry configuration of the controller.
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerConfig {
    pub overload: RetryPolicy,
    pub network: RetryPolicy,
    /// Waits longer than this report the remaining time every interval
    pub progress_interval: Duration,
    /// Name of the tool in user-facing messages
    pub tool_name: String,
}

impl From<&RetryConfig> for ControllerConfig {
    fn from(config: &RetryConfig) -> Self {
        Self {
            overload: RetryPolicy {
                enabled: true,
                max_retries: config.overload.max_retries,
                base_delay: Duration::from_millis(config.overload.base_delay_ms),
                multiplier: config.overload.multiplier,
            },
            network: RetryPolicy {
                enabled: config.network.enabled,
                max_retries: config.network.max_retries,
                base_delay: Duration::from_millis(config.network.base_delay_ms),
                multiplier: config.network.multiplier,
            },
            progress_interval: Duration::from_millis(config.network.progress_interval_ms),
            tool_name: "Claude".to_string(),
        }
    }
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

/// What one streamed run looked like.
#[derive(Debug, Default)]
struct RunObservation {
    evidence: AttemptEvidence,
    session_id: Option<String>,
    cost_usd: Option<f64>,
}

/// Drives one agent invocation to a final [`ExecutionResult`].
pub struct ExecutionController {
    agent: Arc<dyn AgentProcess>,
    config: ControllerConfig,
}

impl ExecutionController {
    pub fn new(agent: Arc<dyn AgentProcess>, config: ControllerConfig) -> Self {
        Self { agent, config }
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// Run the agent for `ctx`, retrying retryable failures per class.
    #[instrument(skip_all, fields(item = %ctx.item_id, agent = self.agent.name()))]
    pub async fn execute(&self, ctx: &ItemContext, lifecycle: &mut SessionLifecycle) -> ExecutionResult {
        let mut attempts: Vec<Attempt> = Vec::new();
        let mut overload_retries = 0u32;
        let mut network_retries = 0u32;
        let mut session_id = ctx.resume_session_id.clone();

        loop {
            let attempt_number = u32::try_from(attempts.len()).unwrap_or(u32::MAX) + 1;
            info!(attempt = attempt_number, "starting agent run");
            // Retries pick up the latest durable session.
            let observed = self.run_once(ctx, session_id.as_deref(), lifecycle).await;
            if observed.session_id.is_some() {
                session_id.clone_from(&observed.session_id);
            }
            if let Some(cost) = observed.cost_usd {
                lifecycle.record_cost(cost);
            }

            let class = classify(&observed.evidence);
            let retry = match class {
                Some(FailureClass::Overload) => {
                    Some((&self.config.overload, &mut overload_retries))
                }
                Some(FailureClass::TransientNetwork) => {
                    Some((&self.config.network, &mut network_retries))
                }
                _ => None,
            };

            if let (Some(class), Some((policy, retries))) = (class, retry) {
                if policy.allows(*retries) {
                    *retries += 1;
                    let delay = policy.delay_for(*retries);
                    attempts.push(Attempt {
                        item_id: ctx.item_id.clone(),
                        attempt_number,
                        failure_class: Some(class),
                        backoff_delay_ms: u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    });
                    warn!(
                        class = %class,
                        retry = *retries,
                        max_retries = policy.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        "retryable agent failure, backing off"
                    );
                    self.note(
                        lifecycle,
                        &format!(
                            "⚠️ {class} detected. Retry {}/{} in {}s",
                            *retries,
                            policy.max_retries,
                            delay.as_secs()
                        ),
                    )
                    .await;
                    self.backoff_wait(delay, lifecycle).await;
                    self.note(lifecycle, "🔄 Retrying now...").await;
                    continue;
                }
                error!(class = %class, retries = *retries, "retries exhausted");
                self.note(
                    lifecycle,
                    &format!("❌ {class} persisted after {} retries", *retries),
                )
                .await;
            }

            attempts.push(Attempt {
                item_id: ctx.item_id.clone(),
                attempt_number,
                failure_class: class,
                backoff_delay_ms: 0,
            });
            return self
                .finish(ctx, lifecycle, observed, class, session_id, attempts)
                .await;
        }
    }

    async fn finish(
        &self,
        ctx: &ItemContext,
        lifecycle: &mut SessionLifecycle,
        observed: RunObservation,
        class: Option<FailureClass>,
        session_id: Option<String>,
        attempts: Vec<Attempt>,
    ) -> ExecutionResult {
        let evidence = observed.evidence;
        let limit_reached = class == Some(FailureClass::UsageLimitExceeded);
        let limit_reset_time = if limit_reached {
            evidence
                .result_text
                .as_deref()
                .and_then(extract_reset_time)
                .or_else(|| extract_reset_time(&evidence.last_message))
        } else {
            None
        };

        match class {
            None => info!(
                messages = evidence.message_count,
                tool_uses = evidence.tool_use_count,
                "agent run succeeded"
            ),
            Some(FailureClass::UsageLimitExceeded) => {
                let resume = session_id
                    .as_deref()
                    .map(|id| resume_command(&ctx.item_id, id));
                for line in format_usage_limit_message(
                    &self.config.tool_name,
                    limit_reset_time.as_deref(),
                    session_id.as_deref(),
                    resume.as_deref(),
                ) {
                    self.note(lifecycle, &line).await;
                }
                warn!(reset_time = ?limit_reset_time, "usage limit reached");
            }
            Some(class) => error!(
                class = %class,
                exit_code = ?evidence.exit_code,
                last_message = %truncate(&evidence.last_message, 200),
                "agent run failed"
            ),
        }
        self.note(
            lifecycle,
            &format!(
                "📊 Total messages: {}, Tool uses: {}",
                evidence.message_count, evidence.tool_use_count
            ),
        )
        .await;
        if let Err(err) = lifecycle.finish().await {
            warn!(error = %err, "could not flush session log");
        }

        let result_text = evidence.result_text.clone().or_else(|| {
            (!evidence.last_message.is_empty()).then(|| evidence.last_message.clone())
        });
        ExecutionResult {
            success: class.is_none(),
            session_id,
            limit_reached,
            limit_reset_time,
            message_count: evidence.message_count,
            tool_use_count: evidence.tool_use_count,
            failure_class: class,
            cost_estimate_usd: observed.cost_usd,
            result_text,
            attempts,
            finished_at: Some(Utc::now()),
        }
    }

    /// Spawn the agent and fold its stream into a [`RunObservation`].
    async fn run_once(
        &self,
        ctx: &ItemContext,
        resume_session_id: Option<&str>,
        lifecycle: &mut SessionLifecycle,
    ) -> RunObservation {
        let mut observed = RunObservation::default();
        let mut run = match self
            .agent
            .spawn(&ctx.payload, &ctx.working_dir, resume_session_id)
            .await
        {
            Ok(run) => run,
            Err(err) => {
                error!(error = %err, "could not start agent");
                observed.evidence.failed = true;
                observed.evidence.last_message = err.to_string();
                return observed;
            }
        };

        let evidence = &mut observed.evidence;
        while let Some(output) = run.events.recv().await {
            match output {
                AgentOutput::Event(event) => {
                    self.transcript(lifecycle, &event.raw).await;
                    if let Some(id) = event.session_id.as_deref() {
                        if observed.session_id.is_none() {
                            observed.session_id = Some(id.to_string());
                            self.note(lifecycle, &format!("📌 Session ID: {id}")).await;
                            match lifecycle.on_durable_id_assigned(id).await {
                                Ok(true) => {
                                    let path = lifecycle.log_path().display().to_string();
                                    self.note(lifecycle, &format!("📁 Log renamed to: {path}"))
                                        .await;
                                }
                                Ok(false) => {}
                                Err(err) => {
                                    warn!(session_id = id, error = %err, "could not relocate session log");
                                }
                            }
                        }
                    }
                    if event.kind.is_message() {
                        evidence.message_count += 1;
                    }
                    evidence.tool_use_count += u64::from(event.kind.tool_uses());
                    match event.kind {
                        AgentEventKind::Text(text) => evidence.last_message = text,
                        AgentEventKind::Error(message) => evidence.last_message = message,
                        AgentEventKind::Assistant { texts, .. } => {
                            for text in texts {
                                if is_streamed_overload(&text) || is_transient_network(&text) {
                                    evidence.last_message.clone_from(&text);
                                }
                                evidence.assistant_texts.push(text);
                            }
                        }
                        AgentEventKind::Result(result) => {
                            if result.total_cost_usd.is_some() {
                                observed.cost_usd = result.total_cost_usd;
                            }
                            if result.is_error {
                                evidence.failed = true;
                                evidence.result_is_error = true;
                                evidence.last_message =
                                    result.result.clone().unwrap_or_else(|| event.raw.clone());
                            }
                            evidence.result_text = result.result;
                        }
                        _ => {}
                    }
                }
                AgentOutput::Raw(line) => {
                    self.transcript(lifecycle, &line).await;
                    if !line.trim().is_empty() && !line.contains("node:internal") {
                        evidence.last_message = line;
                    }
                }
                AgentOutput::Diagnostic(line) => {
                    self.transcript(lifecycle, &format!("[stderr] {line}")).await;
                    if is_error_shaped_diagnostic(&line) {
                        evidence.diagnostic_errors.push(line.trim().to_string());
                    }
                }
                AgentOutput::Exited { code } => {
                    debug!(exit_code = ?code, "agent exited");
                    evidence.exit_code = code;
                    if code != Some(0) {
                        evidence.failed = true;
                    }
                    break;
                }
            }
        }
        observed
    }

    /// Sleep for `delay`, reporting the remaining minutes on long waits.
    async fn backoff_wait(&self, delay: Duration, lifecycle: &mut SessionLifecycle) {
        let deadline = Instant::now() + delay;
        let progress = self.config.progress_interval;
        if progress.is_zero() || delay <= progress {
            sleep_until(deadline).await;
            return;
        }

        let mut ticker = interval_at(Instant::now() + progress, progress);
        let sleep = sleep_until(deadline);
        tokio::pin!(sleep);
        loop {
            tokio::select! {
                biased;
                () = &mut sleep => break,
                _ = ticker.tick() => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    if remaining.is_zero() {
                        continue;
                    }
                    let minutes = remaining.as_secs().div_ceil(60);
                    info!(minutes_remaining = minutes, "waiting before retry");
                    self.note(lifecycle, &format!("⏳ {minutes} minutes remaining until retry..."))
                        .await;
                }
            }
        }
    }

    async fn transcript(&self, lifecycle: &mut SessionLifecycle, line: &str) {
        if let Err(err) = lifecycle.log_line(line).await {
            warn!(error = %err, "could not append to session log");
        }
    }

    async fn note(&self, lifecycle: &mut SessionLifecycle, line: &str) {
        self.transcript(lifecycle, line).await;
    }
}

/// Command line that resumes `session_id` for `item`.
pub fn resume_command(item: &WorkItemId, session_id: &str) -> String {
    format!("issuehive solve {item} --resume {session_id}")
}

pub(crate) fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
