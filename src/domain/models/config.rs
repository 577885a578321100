use serde::{Deserialize, Serialize};

/// Main configuration structure for issuehive
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Number of concurrent workers (1-64)
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Attempts driven per work item before it is marked completed
    #[serde(default = "default_attempts_per_item")]
    pub attempts_per_item: u32,

    /// Pause between consecutive attempts on the same item, in milliseconds
    #[serde(default = "default_attempt_spacing_ms")]
    pub attempt_spacing_ms: u64,

    /// Interval between discovery polls, in seconds
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Grace period for in-flight attempts on shutdown, in seconds
    #[serde(default = "default_shutdown_grace_secs")]
    pub shutdown_grace_secs: u64,

    /// Directory where repositories are cloned for each attempt
    #[serde(default = "default_workspace_dir")]
    pub workspace_dir: String,

    /// Close the issue after a successful attempt
    #[serde(default)]
    pub close_issue_on_success: bool,

    /// Continue work on issues that already have a linked pull request
    #[serde(default = "default_auto_continue")]
    pub auto_continue: bool,

    /// Retry policies per failure class
    #[serde(default)]
    pub retry: RetryConfig,

    /// Feedback gates for continued work
    #[serde(default)]
    pub feedback: FeedbackConfig,

    /// Coding agent invocation
    #[serde(default)]
    pub agent: AgentConfig,

    /// Issue tracker coordinates
    #[serde(default)]
    pub github: GithubConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

const fn default_workers() -> usize {
    2
}

const fn default_attempts_per_item() -> u32 {
    1
}

const fn default_attempt_spacing_ms() -> u64 {
    10_000
}

const fn default_poll_interval_secs() -> u64 {
    300
}

const fn default_shutdown_grace_secs() -> u64 {
    10
}

fn default_workspace_dir() -> String {
    ".issuehive/workspaces".to_string()
}

const fn default_auto_continue() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            attempts_per_item: default_attempts_per_item(),
            attempt_spacing_ms: default_attempt_spacing_ms(),
            poll_interval_secs: default_poll_interval_secs(),
            shutdown_grace_secs: default_shutdown_grace_secs(),
            workspace_dir: default_workspace_dir(),
            close_issue_on_success: false,
            auto_continue: default_auto_continue(),
            retry: RetryConfig::default(),
            feedback: FeedbackConfig::default(),
            agent: AgentConfig::default(),
            github: GithubConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Retry policies, one per retryable failure class
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RetryConfig {
    /// Agent-side "Overloaded" and 5xx errors
    #[serde(default)]
    pub overload: OverloadRetryConfig,

    /// Transient upstream/network failures
    #[serde(default)]
    pub network: NetworkRetryConfig,
}

/// Retry policy for overload errors
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct OverloadRetryConfig {
    #[serde(default = "default_overload_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_overload_base_delay_ms")]
    pub base_delay_ms: u64,

    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
}

const fn default_overload_max_retries() -> u32 {
    3
}

const fn default_overload_base_delay_ms() -> u64 {
    5_000
}

const fn default_multiplier() -> f64 {
    2.0
}

impl Default for OverloadRetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_overload_max_retries(),
            base_delay_ms: default_overload_base_delay_ms(),
            multiplier: default_multiplier(),
        }
    }
}

/// Retry policy for transient network failures
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct NetworkRetryConfig {
    #[serde(default = "default_network_enabled")]
    pub enabled: bool,

    #[serde(default = "default_network_max_retries")]
    pub max_retries: u32,

    /// Initial wait; five minutes by default
    #[serde(default = "default_network_base_delay_ms")]
    pub base_delay_ms: u64,

    #[serde(default = "default_multiplier")]
    pub multiplier: f64,

    /// How often a long wait reports the remaining time
    #[serde(default = "default_progress_interval_ms")]
    pub progress_interval_ms: u64,
}

const fn default_network_enabled() -> bool {
    true
}

const fn default_network_max_retries() -> u32 {
    5
}

const fn default_network_base_delay_ms() -> u64 {
    300_000
}

const fn default_progress_interval_ms() -> u64 {
    60_000
}

impl Default for NetworkRetryConfig {
    fn default() -> Self {
        Self {
            enabled: default_network_enabled(),
            max_retries: default_network_max_retries(),
            base_delay_ms: default_network_base_delay_ms(),
            multiplier: default_multiplier(),
            progress_interval_ms: default_progress_interval_ms(),
        }
    }
}

/// Feedback gates applied before continuing work on an existing pull request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct FeedbackConfig {
    /// Fail the run when no new comments were posted since the last commit
    #[serde(default)]
    pub require_new_comments: bool,

    /// Skip the continuation when no feedback of any kind was detected
    #[serde(default)]
    pub continue_only_on_feedback: bool,
}

/// Coding agent configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct AgentConfig {
    /// Path to the agent CLI binary
    #[serde(default = "default_binary_path")]
    pub binary_path: String,

    #[serde(default = "default_model")]
    pub model: String,

    /// Extra flags appended to every invocation
    #[serde(default)]
    pub extra_flags: Vec<String>,

    /// Directory holding per-session transcripts
    #[serde(default = "default_session_log_dir")]
    pub log_dir: String,
}

fn default_binary_path() -> String {
    "claude".to_string()
}

fn default_model() -> String {
    "sonnet".to_string()
}

fn default_session_log_dir() -> String {
    ".issuehive/logs".to_string()
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            binary_path: default_binary_path(),
            model: default_model(),
            extra_flags: vec![],
            log_dir: default_session_log_dir(),
        }
    }
}

/// GitHub coordinates for discovery
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct GithubConfig {
    /// Repository owner (user or organization)
    #[serde(default)]
    pub owner: String,

    /// Repository name; empty means every repository of `owner`
    #[serde(default)]
    pub repo: String,

    /// Only issues carrying this label are discovered
    #[serde(default = "default_label")]
    pub label: String,

    #[serde(default = "default_api_base")]
    pub api_base: String,
}

fn default_label() -> String {
    "help wanted".to_string()
}

fn default_api_base() -> String {
    "https://api.github.com".to_string()
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            owner: String::new(),
            repo: String::new(),
            label: default_label(),
            api_base: default_api_base(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Directory for the hive log file; unset disables file logging
    #[serde(default)]
    pub log_dir: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.workers, 2);
        assert_eq!(config.attempts_per_item, 1);
        assert_eq!(config.attempt_spacing_ms, 10_000);
        assert_eq!(config.retry.overload.max_retries, 3);
        assert!(config.retry.network.enabled);
        assert_eq!(config.retry.network.base_delay_ms, 300_000);
        assert!(!config.feedback.require_new_comments);
        assert_eq!(config.agent.binary_path, "claude");
    }

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let yaml = r"
workers: 4
retry:
  overload:
    max_retries: 7
";
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.workers, 4);
        assert_eq!(config.retry.overload.max_retries, 7);
        assert_eq!(config.retry.overload.base_delay_ms, 5_000);
        assert_eq!(config.github.label, "help wanted");
    }
}
