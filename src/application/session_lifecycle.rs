//! Session log artifact lifecycle.
//!
//! An attempt starts logging to `solve-<timestamp>.log` before the agent has
//! told us who it is. The first durable session id moves the artifact to
//! `<id>.log` exactly once and repoints the shared [`LogPointer`].

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument};

use super::exit_handler::{ExitReporter, LogPointer};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::session::durable_log_path;
use crate::domain::models::{Session, SessionStatus};

/// Explicit per-session context: where the log lives and who reports exit.
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub log_dir: PathBuf,
    pub log_pointer: LogPointer,
    pub exit_reporter: Arc<ExitReporter>,
}

impl SessionContext {
    /// A context whose log pointer is the one the exit reporter prints.
    pub fn reporting(log_dir: PathBuf, exit_reporter: Arc<ExitReporter>) -> Self {
        Self {
            log_dir,
            log_pointer: exit_reporter.log_pointer().clone(),
            exit_reporter,
        }
    }

    /// A context with its own pointer, for sessions running side by side.
    pub fn detached(log_dir: PathBuf, exit_reporter: Arc<ExitReporter>) -> Self {
        Self {
            log_dir,
            log_pointer: LogPointer::default(),
            exit_reporter,
        }
    }
}

/// Owns the log artifact of one running session.
#[derive(Debug)]
pub struct SessionLifecycle {
    session: Session,
    current_path: PathBuf,
    pointer: LogPointer,
    file: File,
}

async fn open_append(path: &Path) -> DomainResult<File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    Ok(OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?)
}

impl SessionLifecycle {
    /// Open the artifact for a new session, or `<id>.log` directly when
    /// resuming a known session.
    #[instrument(skip(context), fields(log_dir = %context.log_dir.display()), err)]
    pub async fn init(context: &SessionContext, resume_session_id: Option<&str>) -> DomainResult<Self> {
        let now = Utc::now();
        let session = match resume_session_id {
            Some(id) => Session::resumed(&context.log_dir, id, now),
            None => Session::provisional(&context.log_dir, now),
        };
        let path = session.provisional_log_handle.clone();
        let file = open_append(&path).await?;
        context.log_pointer.set(path.clone());
        debug!(path = %path.display(), "session log opened");

        Ok(Self {
            session,
            current_path: path,
            pointer: context.log_pointer.clone(),
            file,
        })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn log_path(&self) -> &Path {
        &self.current_path
    }

    pub fn record_cost(&mut self, cost_usd: f64) {
        self.session.cost_estimate = Some(cost_usd);
    }

    /// Append one line to the artifact.
    pub async fn log_line(&mut self, line: &str) -> DomainResult<()> {
        self.file.write_all(line.as_bytes()).await?;
        if !line.ends_with('\n') {
            self.file.write_all(b"\n").await?;
        }
        Ok(())
    }

    /// Relocate the artifact for the first durable id.
    ///
    /// Returns `Ok(true)` when the artifact moved, `Ok(false)` when the id
    /// was already known. A failed move keeps the provisional artifact and
    /// still counts as the one assignment.
    #[instrument(skip(self), fields(from = %self.current_path.display()))]
    pub async fn on_durable_id_assigned(&mut self, durable_id: &str) -> DomainResult<bool> {
        if self.session.status == SessionStatus::Durable {
            return Ok(false);
        }
        self.session.durable_id = Some(durable_id.to_string());
        self.session.status = SessionStatus::Durable;

        let log_dir = self
            .current_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        let target = durable_log_path(&log_dir, durable_id);

        self.file.flush().await?;
        fs::rename(&self.current_path, &target).await.map_err(|e| {
            DomainError::SessionLog(format!(
                "could not rename {} to {}: {e}",
                self.current_path.display(),
                target.display()
            ))
        })?;
        self.file = open_append(&target).await?;
        self.current_path = target;
        self.pointer.set(self.current_path.clone());
        info!(to = %self.current_path.display(), "session log relocated");
        Ok(true)
    }

    /// Flush buffered output.
    pub async fn finish(&mut self) -> DomainResult<()> {
        self.file.flush().await?;
        Ok(())
    }
}
