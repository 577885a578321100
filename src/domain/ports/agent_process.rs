//! Agent process port - interface for coding agent backends.

use std::path::Path;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};

use crate::domain::errors::DomainResult;
use crate::domain::models::{AgentOutput, TaskPayload};

/// A running agent invocation.
///
/// `events` ends with exactly one [`AgentOutput::Exited`]. Dropping the run
/// (or calling [`AgentRun::terminate`]) asks the backend to stop the process.
pub struct AgentRun {
    pub events: mpsc::Receiver<AgentOutput>,
    stop: Option<oneshot::Sender<()>>,
}

impl AgentRun {
    pub fn new(events: mpsc::Receiver<AgentOutput>, stop: oneshot::Sender<()>) -> Self {
        Self {
            events,
            stop: Some(stop),
        }
    }

    /// Ask the backend to terminate the process.
    pub fn terminate(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
    }
}

impl std::fmt::Debug for AgentRun {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentRun")
            .field("running", &self.stop.is_some())
            .finish_non_exhaustive()
    }
}

/// Trait for coding agent implementations.
#[async_trait]
pub trait AgentProcess: Send + Sync {
    fn name(&self) -> &'static str;

    /// Spawn the agent in `working_dir`, resuming `resume_session_id` when given.
    async fn spawn(
        &self,
        payload: &TaskPayload,
        working_dir: &Path,
        resume_session_id: Option<&str>,
    ) -> DomainResult<AgentRun>;
}
