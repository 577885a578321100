//! `issuehive run`: discovery loop plus worker pool.

use std::sync::Arc;

use anyhow::{bail, Result};
use tokio::sync::oneshot;
use tracing::info;

use super::build_solver;
use crate::application::{
    wait_for_termination, ExitReason, ExitReporter, HiveConfig, HiveMonitor, PoolConfig,
    SessionMode, WorkQueue, WorkerPool,
};
use crate::cli::output::TableFormatter;
use crate::cli::types::RunArgs;
use crate::domain::models::Config;
use crate::infrastructure::config::ConfigLoader;

/// Fold command line flags into the loaded configuration.
pub fn apply_overrides(config: &mut Config, args: &RunArgs) {
    if let Some(workers) = args.concurrency {
        config.workers = workers;
    }
    if let Some(attempts) = args.attempts_per_item {
        config.attempts_per_item = attempts;
    }
    if let Some(ref label) = args.label {
        config.github.label.clone_from(label);
    }
    if let Some(ref owner) = args.owner {
        config.github.owner.clone_from(owner);
    }
    if let Some(ref repo) = args.repo {
        config.github.repo.clone_from(repo);
    }
}

pub async fn execute(
    args: RunArgs,
    mut config: Config,
    exit_reporter: Arc<ExitReporter>,
    json: bool,
) -> Result<ExitReason> {
    apply_overrides(&mut config, &args);
    ConfigLoader::validate(&config)?;
    if config.github.owner.is_empty() {
        bail!("no repository owner configured; pass --owner or set github.owner");
    }

    let (tracker, solver) = build_solver(&config, exit_reporter, SessionMode::Detached)?;
    let pool = WorkerPool::new(
        Arc::new(WorkQueue::new()),
        Arc::new(solver),
        PoolConfig::from(&config),
    );
    let hive_config = HiveConfig {
        once: args.once,
        ..HiveConfig::from(&config)
    };
    info!(
        owner = %hive_config.owner,
        repo = %hive_config.repo,
        label = %hive_config.label,
        workers = config.workers,
        once = hive_config.once,
        "starting hive"
    );
    let hive = HiveMonitor::new(tracker, pool, hive_config);

    let shutdown = hive.shutdown_handle();
    let (signal_tx, mut signal_rx) = oneshot::channel();
    let signal_task = tokio::spawn(async move {
        let reason = wait_for_termination().await;
        info!(?reason, "termination signal received, draining workers");
        let _ = signal_tx.send(reason);
        let _ = shutdown.send(());
    });

    let result = hive.run().await;
    let signalled = signal_rx.try_recv().ok();
    signal_task.abort();
    let stats = result?;

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        println!("{}", TableFormatter::new().format_queue_stats(&stats));
    }

    Ok(signalled.unwrap_or(if stats.failed > 0 {
        ExitReason::Failed
    } else {
        ExitReason::Completed
    }))
}
