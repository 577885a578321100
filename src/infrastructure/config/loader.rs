use std::path::Path;

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use crate::domain::models::config::Config;

/// Configuration error types
#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("Invalid workers: {0}. Must be between 1 and 64")]
    InvalidWorkers(usize),

    #[error("Invalid attempts_per_item: {0}. Must be at least 1")]
    InvalidAttemptsPerItem(u32),

    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Invalid {policy} multiplier: {value}. Must be at least 1.0")]
    InvalidMultiplier { policy: &'static str, value: f64 },

    #[error("Invalid {0} base_delay_ms: must be positive")]
    InvalidBaseDelay(&'static str),

    #[error("Agent binary path cannot be empty")]
    EmptyAgentBinary,

    #[error("Invalid poll_interval_secs: must be positive")]
    InvalidPollInterval,
}

/// Project-local configuration directory
pub const CONFIG_DIR: &str = ".issuehive";

/// Environment variable prefix; `__` separates nested keys
pub const ENV_PREFIX: &str = "ISSUEHIVE_";

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .issuehive/config.yaml (project config)
    /// 3. .issuehive/local.yaml (local overrides, optional)
    /// 4. Environment variables (ISSUEHIVE_* prefix, highest priority)
    pub fn load() -> Result<Config> {
        Self::load_from_dir(".")
    }

    /// Same as [`ConfigLoader::load`], rooted at `project_dir`.
    pub fn load_from_dir(project_dir: impl AsRef<Path>) -> Result<Config> {
        let config_dir = project_dir.as_ref().join(CONFIG_DIR);
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(config_dir.join("config.yaml")))
            .merge(Yaml::file(config_dir.join("local.yaml")))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .extract()
            .with_context(|| format!("Failed to load config from {}", path.as_ref().display()))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        if config.workers == 0 || config.workers > 64 {
            return Err(ConfigError::InvalidWorkers(config.workers));
        }

        if config.attempts_per_item == 0 {
            return Err(ConfigError::InvalidAttemptsPerItem(config.attempts_per_item));
        }

        if config.poll_interval_secs == 0 {
            return Err(ConfigError::InvalidPollInterval);
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        for (policy, multiplier, base_delay_ms) in [
            ("overload", config.retry.overload.multiplier, config.retry.overload.base_delay_ms),
            ("network", config.retry.network.multiplier, config.retry.network.base_delay_ms),
        ] {
            if multiplier.is_nan() || multiplier < 1.0 {
                return Err(ConfigError::InvalidMultiplier {
                    policy,
                    value: multiplier,
                });
            }
            if base_delay_ms == 0 {
                return Err(ConfigError::InvalidBaseDelay(policy));
            }
        }

        if config.agent.binary_path.trim().is_empty() {
            return Err(ConfigError::EmptyAgentBinary);
        }

        Ok(())
    }
}
