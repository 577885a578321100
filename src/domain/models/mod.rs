pub mod agent_event;
pub mod config;
pub mod execution;
pub mod feedback;
pub mod session;
pub mod work_item;

pub use agent_event::{AgentEvent, AgentEventKind, AgentOutput, AgentResult};
pub use config::{
    AgentConfig, Config, FeedbackConfig, GithubConfig, LoggingConfig, NetworkRetryConfig,
    OverloadRetryConfig, RetryConfig,
};
pub use execution::{Attempt, ExecutionResult, FailureClass, ItemContext, TaskPayload};
pub use feedback::{
    ChangeRequestState, CheckRun, Comment, FeedbackOutcome, FeedbackReport, FeedbackSignal,
    FeedbackSource, IssueDetails, MergeStatus, PullRequestDetails, RepositoryInfo, Review,
};
pub use session::{Session, SessionStatus};
pub use work_item::{IssueRef, QueueStats, RepoRef, WorkItemId, WorkItemState};
