//! Discovery loop feeding the worker pool.
//!
//! Polls the tracker for open issues carrying the configured label and
//! enqueues them. The queue deduplicates, so every poll may offer the same
//! issue again. In single-pass mode the loop waits for the queue to drain
//! and stops.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::broadcast;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, instrument, warn};

use super::worker_pool::WorkerPool;
use crate::domain::models::{Config, QueueStats};
use crate::domain::ports::IssueTracker;

/// Discovery settings.
#[derive(Debug, Clone)]
pub struct HiveConfig {
    pub owner: String,
    /// Empty searches every repository of the owner
    pub repo: String,
    pub label: String,
    pub poll_interval: Duration,
    pub shutdown_grace: Duration,
    /// Poll once, drain, stop
    pub once: bool,
}

impl From<&Config> for HiveConfig {
    fn from(config: &Config) -> Self {
        Self {
            owner: config.github.owner.clone(),
            repo: config.github.repo.clone(),
            label: config.github.label.clone(),
            poll_interval: Duration::from_secs(config.poll_interval_secs.max(1)),
            shutdown_grace: Duration::from_secs(config.shutdown_grace_secs),
            once: false,
        }
    }
}

/// Owns the worker pool and the discovery loop.
pub struct HiveMonitor {
    tracker: Arc<dyn IssueTracker>,
    pool: WorkerPool,
    config: HiveConfig,
    shutdown_tx: broadcast::Sender<()>,
}

impl HiveMonitor {
    pub fn new(tracker: Arc<dyn IssueTracker>, pool: WorkerPool, config: HiveConfig) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            tracker,
            pool,
            config,
            shutdown_tx,
        }
    }

    /// Sender that stops [`HiveMonitor::run`] from another task.
    pub fn shutdown_handle(&self) -> broadcast::Sender<()> {
        self.shutdown_tx.clone()
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    /// One discovery pass. Returns how many issues were newly queued.
    #[instrument(skip(self), fields(owner = %self.config.owner, repo = %self.config.repo))]
    pub async fn poll_once(&self) -> Result<usize> {
        let issues = self
            .tracker
            .list_open_issues(&self.config.owner, &self.config.repo, &self.config.label)
            .await
            .context("listing open issues")?;

        let queue = self.pool.queue();
        let added = issues
            .iter()
            .filter(|issue| queue.enqueue(issue.work_item_id()))
            .count();
        info!(found = issues.len(), added, "discovery pass finished");
        Ok(added)
    }

    /// Run discovery until shutdown, then stop the pool.
    ///
    /// Returns the final queue statistics.
    pub async fn run(&self) -> Result<QueueStats> {
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        self.pool.start().await;

        if self.config.once {
            let result = self.poll_once().await;
            if result.is_ok() {
                tokio::select! {
                    () = self.pool.queue().wait_drained() => debug!("queue drained"),
                    _ = shutdown_rx.recv() => info!("shutdown requested while draining"),
                }
            }
            let stats = self.pool.shutdown(self.config.shutdown_grace).await;
            result?;
            return Ok(stats);
        }

        let mut ticker = interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(err) = self.poll_once().await {
                        warn!(error = %format!("{err:#}"), "discovery pass failed, retrying next interval");
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("discovery loop received shutdown signal");
                    break;
                }
            }
        }
        Ok(self.pool.shutdown(self.config.shutdown_grace).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hive_config_from_config() {
        let mut config = Config::default();
        config.github.owner = "acme".to_string();
        config.poll_interval_secs = 0;
        let hive = HiveConfig::from(&config);
        assert_eq!(hive.owner, "acme");
        assert_eq!(hive.label, "help wanted");
        assert_eq!(hive.poll_interval, Duration::from_secs(1));
        assert!(!hive.once);
    }
}
