//! issuehive - run a coding agent against labelled GitHub issues
//!
//! issuehive discovers open issues carrying a label, queues them, and lets a
//! bounded pool of workers drive a coding agent (the `claude` CLI) against a
//! fresh checkout of each repository. Results land as pull requests and
//! issue comments.
//!
//! # Architecture
//!
//! This crate follows Hexagonal Architecture principles:
//!
//! - **Domain Layer** (`domain`): work items, execution results, feedback models and ports
//! - **Application Layer** (`application`): queue, worker pool, execution controller, feedback detection
//! - **Infrastructure Layer** (`infrastructure`): GitHub, git, agent process, config and logging adapters
//! - **CLI Layer** (`cli`): Command-line interface
//!
//! # Example
//!
//! ```ignore
//! use issuehive::application::{WorkQueue, WorkerPool, PoolConfig};
//!
//! let queue = std::sync::Arc::new(WorkQueue::new());
//! queue.enqueue("https://github.com/acme/widgets/issues/1".into());
//! let pool = WorkerPool::new(queue, processor, PoolConfig::default());
//! pool.start().await;
//! ```

pub mod application;
pub mod cli;
pub mod domain;
pub mod infrastructure;

pub use application::{
    ExecutionController, ExitReason, ExitReporter, FeedbackDetector, HiveMonitor, IssueSolver,
    ItemProcessor, PoolConfig, WorkQueue, WorkerPool,
};
pub use domain::models::{
    Config, ExecutionResult, FailureClass, IssueRef, QueueStats, WorkItemId, WorkItemState,
};
pub use domain::ports::{AgentProcess, IssueTracker, VersionControl};
pub use domain::{DomainError, DomainResult};
pub use infrastructure::config::{ConfigError, ConfigLoader};
