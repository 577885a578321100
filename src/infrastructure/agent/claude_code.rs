//! Claude Code CLI backend for the [`AgentProcess`] port.
//!
//! The CLI runs with `--output-format stream-json`; stdout lines are parsed
//! into events and stderr lines forwarded as diagnostics, both through one
//! channel that ends with [`AgentOutput::Exited`].

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use super::stream_parser::parse_output_line;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{AgentConfig, AgentOutput, TaskPayload};
use crate::domain::ports::{AgentProcess, AgentRun};

/// Configuration for the Claude Code backend
#[derive(Debug, Clone)]
pub struct ClaudeCodeConfig {
    /// Path to claude CLI executable (defaults to "claude" in PATH)
    pub binary_path: String,

    /// Flags appended to every invocation
    pub extra_flags: Vec<String>,

    /// Buffered output items before the reader waits for the consumer
    pub channel_capacity: usize,

    /// Time between SIGTERM and SIGKILL
    pub terminate_grace: Duration,
}

impl Default for ClaudeCodeConfig {
    fn default() -> Self {
        Self {
            binary_path: "claude".to_string(),
            extra_flags: Vec::new(),
            channel_capacity: 256,
            terminate_grace: Duration::from_secs(5),
        }
    }
}

impl From<&AgentConfig> for ClaudeCodeConfig {
    fn from(config: &AgentConfig) -> Self {
        Self {
            binary_path: config.binary_path.clone(),
            extra_flags: config.extra_flags.clone(),
            ..Default::default()
        }
    }
}

/// Runs the `claude` CLI as a child process.
#[derive(Debug, Clone, Default)]
pub struct ClaudeCodeAgent {
    config: ClaudeCodeConfig,
}

impl ClaudeCodeAgent {
    pub fn new(config: ClaudeCodeConfig) -> Self {
        Self { config }
    }

    /// Command line arguments for one invocation.
    pub fn build_args(&self, payload: &TaskPayload, resume_session_id: Option<&str>) -> Vec<String> {
        let mut args = vec![
            "--output-format".to_string(),
            "stream-json".to_string(),
            "--verbose".to_string(),
            "--dangerously-skip-permissions".to_string(),
            "--model".to_string(),
            payload.model.clone(),
        ];
        if let Some(id) = resume_session_id {
            args.push("--resume".to_string());
            args.push(id.to_string());
        }
        args.push("-p".to_string());
        args.push(payload.prompt.clone());
        if !payload.system_prompt.is_empty() {
            args.push("--append-system-prompt".to_string());
            args.push(payload.system_prompt.clone());
        }
        args.extend(self.config.extra_flags.iter().cloned());
        args
    }
}

#[async_trait]
impl AgentProcess for ClaudeCodeAgent {
    fn name(&self) -> &'static str {
        "claude-code"
    }

    async fn spawn(
        &self,
        payload: &TaskPayload,
        working_dir: &Path,
        resume_session_id: Option<&str>,
    ) -> DomainResult<AgentRun> {
        let mut child = Command::new(&self.config.binary_path)
            .args(self.build_args(payload, resume_session_id))
            .current_dir(working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .env_remove("CLAUDECODE")
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                DomainError::AgentProcess(format!(
                    "failed to spawn {}: {e}",
                    self.config.binary_path
                ))
            })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| DomainError::AgentProcess("child stdout not captured".into()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| DomainError::AgentProcess("child stderr not captured".into()))?;

        info!(
            pid = child.id(),
            model = %payload.model,
            resume = ?resume_session_id,
            dir = %working_dir.display(),
            "spawned claude"
        );

        let (tx, rx) = mpsc::channel(self.config.channel_capacity.max(1));
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
        let grace = self.config.terminate_grace;

        tokio::spawn(async move {
            // Byte segments: one invalid UTF-8 line must not stop the drain.
            let mut stdout = BufReader::new(stdout).split(b'\n');
            let mut stderr = BufReader::new(stderr).split(b'\n');
            let mut stdout_open = true;
            let mut stderr_open = true;

            while stdout_open || stderr_open {
                let output = tokio::select! {
                    segment = stdout.next_segment(), if stdout_open => match segment {
                        Ok(Some(bytes)) => parse_output_line(&decode_line(&bytes)),
                        Ok(None) => { stdout_open = false; continue; }
                        Err(err) => {
                            warn!(error = %err, "stdout read failed, stopping agent");
                            terminate(&mut child, grace).await;
                            break;
                        }
                    },
                    segment = stderr.next_segment(), if stderr_open => match segment {
                        Ok(Some(bytes)) => AgentOutput::Diagnostic(decode_line(&bytes)),
                        Ok(None) => { stderr_open = false; continue; }
                        Err(err) => {
                            warn!(error = %err, "stderr read failed, stopping agent");
                            terminate(&mut child, grace).await;
                            break;
                        }
                    },
                    // Sent by terminate(), or the run was dropped.
                    _ = &mut stop_rx => {
                        debug!("stop requested");
                        terminate(&mut child, grace).await;
                        break;
                    }
                };
                if tx.send(output).await.is_err() {
                    debug!("consumer gone, stopping agent");
                    terminate(&mut child, grace).await;
                    return;
                }
            }

            let code = match child.wait().await {
                Ok(status) => status.code(),
                Err(err) => {
                    warn!(error = %err, "could not reap agent process");
                    None
                }
            };
            debug!(exit_code = ?code, "agent exited");
            let _ = tx.send(AgentOutput::Exited { code }).await;
        });

        Ok(AgentRun::new(rx, stop_tx))
    }
}

/// One output line without its terminator; invalid UTF-8 is replaced.
fn decode_line(bytes: &[u8]) -> String {
    let line = String::from_utf8_lossy(bytes);
    line.strip_suffix('\r').unwrap_or(&line[..]).to_string()
}

/// SIGTERM, then SIGKILL after `grace`.
async fn terminate(child: &mut Child, grace: Duration) {
    let Some(pid) = child.id().and_then(|id| i32::try_from(id).ok()) else {
        return;
    };
    if let Err(err) = signal::kill(Pid::from_raw(pid), Signal::SIGTERM) {
        warn!(pid, error = %err, "SIGTERM failed");
    }
    if timeout(grace, child.wait()).await.is_err() {
        warn!(pid, "agent ignored SIGTERM, killing");
        let _ = child.kill().await;
    }
}
