//! Fixed-size worker pool draining a [`WorkQueue`].
//!
//! ```text
//!   discovery ──enqueue──▶ WorkQueue ──next()──▶ worker 1..N
//!                                                  │
//!                                     attempt 1..K (fail-fast, spaced)
//!                                                  │
//!                                  mark_completed / mark_failed
//! ```

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use super::work_queue::WorkQueue;
use crate::domain::models::{Config, QueueStats, WorkItemId};

/// Runs one attempt of one item.
#[async_trait]
pub trait ItemProcessor: Send + Sync {
    /// `attempt` is 1-based, `total` is the number of attempts planned.
    async fn process(&self, item: &WorkItemId, attempt: u32, total: u32) -> anyhow::Result<()>;
}

/// Configuration for the worker pool.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub workers: usize,
    pub attempts_per_item: u32,
    pub attempt_spacing: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: 2,
            attempts_per_item: 1,
            attempt_spacing: Duration::from_secs(10),
        }
    }
}

impl From<&Config> for PoolConfig {
    fn from(config: &Config) -> Self {
        Self {
            workers: config.workers.max(1),
            attempts_per_item: config.attempts_per_item.max(1),
            attempt_spacing: Duration::from_millis(config.attempt_spacing_ms),
        }
    }
}

/// Pool status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolStatus {
    Idle,
    Running,
    ShuttingDown,
    Stopped,
}

pub struct WorkerPool {
    queue: Arc<WorkQueue>,
    processor: Arc<dyn ItemProcessor>,
    config: PoolConfig,
    workers: Mutex<Vec<JoinHandle<()>>>,
    status: Mutex<PoolStatus>,
}

impl WorkerPool {
    pub fn new(queue: Arc<WorkQueue>, processor: Arc<dyn ItemProcessor>, config: PoolConfig) -> Self {
        Self {
            queue,
            processor,
            config,
            workers: Mutex::new(Vec::new()),
            status: Mutex::new(PoolStatus::Idle),
        }
    }

    pub fn queue(&self) -> &Arc<WorkQueue> {
        &self.queue
    }

    pub async fn status(&self) -> PoolStatus {
        *self.status.lock().await
    }

    /// Spawn the workers. Calling `start` on a running pool is a no-op.
    #[instrument(skip(self), fields(workers = self.config.workers))]
    pub async fn start(&self) {
        let mut status = self.status.lock().await;
        if *status != PoolStatus::Idle {
            return;
        }
        let mut workers = self.workers.lock().await;
        for worker_id in 1..=self.config.workers {
            let queue = self.queue.clone();
            let processor = self.processor.clone();
            let config = self.config.clone();
            workers.push(tokio::spawn(async move {
                worker_loop(worker_id, queue, processor, config).await;
            }));
        }
        *status = PoolStatus::Running;
        info!("worker pool started");
    }

    /// Close the queue, give in-flight attempts `grace` to finish, then
    /// abort whatever is still running.
    #[instrument(skip(self))]
    pub async fn shutdown(&self, grace: Duration) -> QueueStats {
        *self.status.lock().await = PoolStatus::ShuttingDown;
        self.queue.close();

        let mut handles = std::mem::take(&mut *self.workers.lock().await);

        if tokio::time::timeout(grace, join_all(handles.iter_mut()))
            .await
            .is_err()
        {
            warn!(
                grace_secs = grace.as_secs(),
                "workers still busy after grace period, aborting"
            );
            // Finished handles were already consumed by the timed-out join.
            let busy: Vec<_> = handles.into_iter().filter(|h| !h.is_finished()).collect();
            for handle in &busy {
                handle.abort();
            }
            let _ = join_all(busy).await;
        }

        *self.status.lock().await = PoolStatus::Stopped;
        let stats = self.queue.stats();
        info!(
            completed = stats.completed,
            failed = stats.failed,
            "worker pool stopped"
        );
        stats
    }
}

async fn worker_loop(
    worker_id: usize,
    queue: Arc<WorkQueue>,
    processor: Arc<dyn ItemProcessor>,
    config: PoolConfig,
) {
    debug!(worker_id, "worker started");
    while let Some(item) = queue.next().await {
        info!(worker_id, item = %item, "worker picked up item");
        match drive_item(&item, processor.as_ref(), &config).await {
            Ok(()) => queue.mark_completed(&item),
            Err(err) => {
                error!(worker_id, item = %item, error = %format!("{err:#}"), "item failed");
                queue.mark_failed(&item);
            }
        }
    }
    debug!(worker_id, "worker stopped");
}

/// Run up to K attempts; the first failure abandons the rest.
async fn drive_item(
    item: &WorkItemId,
    processor: &dyn ItemProcessor,
    config: &PoolConfig,
) -> anyhow::Result<()> {
    let total = config.attempts_per_item;
    for attempt in 1..=total {
        if attempt > 1 && !config.attempt_spacing.is_zero() {
            tokio::time::sleep(config.attempt_spacing).await;
        }
        debug!(item = %item, attempt, total, "starting attempt");
        processor.process(item, attempt, total).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct CountingProcessor {
        calls: AtomicU32,
        fail_on: Option<u32>,
    }

    #[async_trait]
    impl ItemProcessor for CountingProcessor {
        async fn process(&self, _item: &WorkItemId, attempt: u32, _total: u32) -> anyhow::Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_on == Some(attempt) {
                anyhow::bail!("attempt {attempt} failed");
            }
            Ok(())
        }
    }

    fn config(attempts: u32) -> PoolConfig {
        PoolConfig {
            workers: 1,
            attempts_per_item: attempts,
            attempt_spacing: Duration::from_secs(10),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_attempts_run_on_success() {
        let processor = CountingProcessor {
            calls: AtomicU32::new(0),
            fail_on: None,
        };
        let started = tokio::time::Instant::now();
        drive_item(&WorkItemId::new("a"), &processor, &config(3))
            .await
            .unwrap();
        assert_eq!(processor.calls.load(Ordering::SeqCst), 3);
        assert_eq!(started.elapsed(), Duration::from_secs(20));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fail_fast_abandons_remaining_attempts() {
        let processor = CountingProcessor {
            calls: AtomicU32::new(0),
            fail_on: Some(2),
        };
        let result = drive_item(&WorkItemId::new("a"), &processor, &config(4)).await;
        assert!(result.is_err());
        assert_eq!(processor.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_pool_config_from_config_clamps() {
        let mut cfg = Config::default();
        cfg.workers = 0;
        cfg.attempts_per_item = 0;
        let pool = PoolConfig::from(&cfg);
        assert_eq!(pool.workers, 1);
        assert_eq!(pool.attempts_per_item, 1);
    }
}
