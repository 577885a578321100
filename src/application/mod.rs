pub mod execution_controller;
pub mod exit_handler;
pub mod failure_classifier;
pub mod feedback_detector;
pub mod hive;
pub mod issue_solver;
pub mod session_lifecycle;
pub mod usage_limit;
pub mod work_queue;
pub mod worker_pool;

pub use execution_controller::{ControllerConfig, ExecutionController, RetryPolicy};
pub use exit_handler::{wait_for_termination, ExitReason, ExitReporter, LogPointer};
pub use failure_classifier::{classify, AttemptEvidence};
pub use feedback_detector::{apply_gates, FeedbackDetector, FeedbackGateError, FeedbackRequest, GateDecision};
pub use hive::{HiveConfig, HiveMonitor};
pub use issue_solver::{IssueSolver, SessionMode, SolveOutcome, SolverConfig};
pub use session_lifecycle::{SessionContext, SessionLifecycle};
pub use work_queue::WorkQueue;
pub use worker_pool::{ItemProcessor, PoolConfig, PoolStatus, WorkerPool};
