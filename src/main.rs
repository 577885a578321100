//! issuehive CLI entry point.

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;

use issuehive::application::{ExitReason, ExitReporter, LogPointer};
use issuehive::cli::{commands, handle_error, Cli, Commands};
use issuehive::infrastructure::config::ConfigLoader;
use issuehive::infrastructure::logging::{LogConfig, LoggerImpl};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let loaded = match cli.config {
        Some(ref path) => ConfigLoader::load_from_file(path),
        None => ConfigLoader::load(),
    };
    let mut config = match loaded {
        Ok(config) => config,
        Err(err) => {
            handle_error(&err, cli.json);
            return ExitCode::FAILURE;
        }
    };
    if let Some(ref level) = cli.log_level {
        config.logging.level.clone_from(level);
    }

    let logger = match LoggerImpl::init(&LogConfig::from(&config.logging)) {
        Ok(logger) => logger,
        Err(err) => {
            handle_error(&err, cli.json);
            return ExitCode::FAILURE;
        }
    };

    let reporter = Arc::new(ExitReporter::new(LogPointer::new(logger.log_file().cloned())));
    reporter.install_panic_hook();

    let result = match cli.command {
        Commands::Run(args) => {
            commands::run::execute(args, config, Arc::clone(&reporter), cli.json).await
        }
        Commands::Solve(args) => {
            commands::solve::execute(args, config, Arc::clone(&reporter), cli.json).await
        }
    };

    let reason = result.unwrap_or_else(|err| {
        tracing::error!(error = %format!("{err:#}"), "command failed");
        handle_error(&err, cli.json);
        ExitReason::Failed
    });
    reporter.report(reason);
    drop(logger);
    ExitCode::from(u8::try_from(reason.exit_code()).unwrap_or(1))
}
