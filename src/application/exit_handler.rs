//! One-shot exit reporting.
//!
//! Every way the process can end (success, handled failure, panic, SIGINT,
//! SIGTERM) funnels through [`ExitReporter::report`], which prints the
//! location of the active log artifact exactly once.

use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use tracing::{debug, warn};

/// Shared, swappable location of the current log artifact.
///
/// Written by the active session when its artifact is relocated, read by the
/// exit reporter.
#[derive(Debug, Clone, Default)]
pub struct LogPointer(Arc<RwLock<Option<PathBuf>>>);

impl LogPointer {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self(Arc::new(RwLock::new(path)))
    }

    pub fn get(&self) -> Option<PathBuf> {
        self.0
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set(&self, path: PathBuf) {
        *self.0.write().unwrap_or_else(PoisonError::into_inner) = Some(path);
    }
}

/// Why the process is ending.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    Completed,
    Failed,
    Interrupted,
    Terminated,
    Panicked,
}

impl ExitReason {
    /// Conventional process exit code.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Completed => 0,
            Self::Failed | Self::Panicked => 1,
            Self::Interrupted => 130,
            Self::Terminated => 143,
        }
    }
}

/// Prints the final log location at most once.
pub struct ExitReporter {
    reported: AtomicBool,
    log_pointer: LogPointer,
    sink: Mutex<Box<dyn Write + Send>>,
}

impl std::fmt::Debug for ExitReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExitReporter")
            .field("reported", &self.reported.load(Ordering::SeqCst))
            .field("log_pointer", &self.log_pointer)
            .finish_non_exhaustive()
    }
}

impl ExitReporter {
    /// Reporter writing to stderr.
    pub fn new(log_pointer: LogPointer) -> Self {
        Self::with_sink(log_pointer, Box::new(std::io::stderr()))
    }

    pub fn with_sink(log_pointer: LogPointer, sink: Box<dyn Write + Send>) -> Self {
        Self {
            reported: AtomicBool::new(false),
            log_pointer,
            sink: Mutex::new(sink),
        }
    }

    pub fn log_pointer(&self) -> &LogPointer {
        &self.log_pointer
    }

    pub fn has_reported(&self) -> bool {
        self.reported.load(Ordering::SeqCst)
    }

    /// Report the exit. Returns `false` if an earlier path already did.
    pub fn report(&self, reason: ExitReason) -> bool {
        if self.reported.swap(true, Ordering::SeqCst) {
            debug!(?reason, "exit already reported");
            return false;
        }
        let mut sink = self.sink.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(path) = self.log_pointer.get() {
            let _ = writeln!(sink, "\n📁 Full log file: {}", path.display());
        }
        if reason != ExitReason::Completed {
            let _ = writeln!(sink, "Exiting ({reason:?}, code {})", reason.exit_code());
        }
        let _ = sink.flush();
        true
    }

    /// Report through this reporter when a panic unwinds or aborts.
    pub fn install_panic_hook(self: &Arc<Self>) {
        let reporter = Arc::clone(self);
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            previous(info);
            reporter.report(ExitReason::Panicked);
        }));
    }
}

/// Wait for SIGINT or SIGTERM and say which arrived.
pub async fn wait_for_termination() -> ExitReason {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => ExitReason::Interrupted,
                    _ = sigterm.recv() => ExitReason::Terminated,
                }
            }
            Err(err) => {
                warn!(error = %err, "could not install SIGTERM handler");
                let _ = tokio::signal::ctrl_c().await;
                ExitReason::Interrupted
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        ExitReason::Interrupted
    }
}
