use super::config::{LogConfig, LogFormat};
use anyhow::{Context, Result};
use chrono::Utc;
use std::io;
use std::path::PathBuf;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Process-wide tracing subscriber.
///
/// Holds the appender guard; dropping it flushes the hive log file.
pub struct LoggerImpl {
    _guard: Option<WorkerGuard>,
    log_file: Option<PathBuf>,
}

impl LoggerImpl {
    /// Install the global subscriber.
    ///
    /// With a `log_dir`, every event is also written as JSON to
    /// `<log_dir>/hive-<timestamp>.log`.
    pub fn init(config: &LogConfig) -> Result<Self> {
        let default_level = parse_log_level(&config.level)?;
        let env_filter = || {
            EnvFilter::builder()
                .with_default_directive(default_level.into())
                .from_env_lossy()
        };

        let (file_layer, guard, log_file) = match config.log_dir {
            Some(ref log_dir) => {
                std::fs::create_dir_all(log_dir)
                    .with_context(|| format!("creating log directory {}", log_dir.display()))?;
                let file_name = format!("hive-{}.log", Utc::now().format("%Y-%m-%dT%H-%M-%SZ"));
                let (writer, guard) =
                    tracing_appender::non_blocking(rolling::never(log_dir, &file_name));
                let layer = tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(writer)
                    .with_ansi(false)
                    .with_current_span(true)
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_filter(env_filter());
                (Some(layer), Some(guard), Some(log_dir.join(file_name)))
            }
            None => (None, None, None),
        };

        let stdout_json = (config.enable_stdout && config.format == LogFormat::Json).then(|| {
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(io::stdout)
                .with_current_span(true)
                .with_target(true)
                .with_filter(env_filter())
        });
        let stdout_pretty = (config.enable_stdout && config.format == LogFormat::Pretty).then(|| {
            tracing_subscriber::fmt::layer()
                .pretty()
                .with_writer(io::stdout)
                .with_target(true)
                .with_span_events(FmtSpan::NONE)
                .with_filter(env_filter())
        });

        tracing_subscriber::registry()
            .with(file_layer)
            .with(stdout_json)
            .with(stdout_pretty)
            .try_init()
            .context("installing tracing subscriber")?;

        tracing::info!(
            level = %config.level,
            format = ?config.format,
            log_file = ?log_file,
            "logger initialized"
        );

        Ok(Self {
            _guard: guard,
            log_file,
        })
    }

    /// Path of the hive log file, when file logging is on.
    pub fn log_file(&self) -> Option<&PathBuf> {
        self.log_file.as_ref()
    }
}

/// Parse log level string to Level
pub fn parse_log_level(level: &str) -> Result<Level> {
    match level.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        _ => anyhow::bail!("Invalid log level: {level}"),
    }
}
