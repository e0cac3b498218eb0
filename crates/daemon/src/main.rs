// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! taskrunnerd: the process entry point (C9).
//!
//! Parses a config path, loads and validates it, wires logging and the
//! (placeholder) Queue/verification/upload adapters, then drives the
//! Run-Tasks Controller until the Shutdown Coordinator signals a drain.

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod logging;
mod shutdown;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use taskrunner_adapters::{PlaceholderArtifactUploader, PlaceholderChainOfTrustVerifier, PlaceholderQueueClient};
use taskrunner_core::{Config, TerminalStatus};
use taskrunner_engine::{Controller, RunOutcome, WorkerContext};
use tokio_util::sync::CancellationToken;

use shutdown::{DrainReason, ShutdownCoordinator};

/// A worker process for the task execution core: claims and runs one task
/// at a time against the Queue named in its configuration.
#[derive(Parser, Debug)]
#[command(name = "taskrunnerd")]
struct Cli {
    /// Path to the worker's TOML configuration file.
    config: PathBuf,
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let cli = Cli::parse();

    let config = match Config::load(&cli.config) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("error: failed to load configuration: {err}");
            return std::process::ExitCode::from(1);
        }
    };

    let _log_guard = match logging::init(&config) {
        Ok(guard) => guard,
        Err(err) => {
            eprintln!("error: failed to initialize logging: {err}");
            return std::process::ExitCode::from(1);
        }
    };

    tracing::info!(worker_id = %config.worker_id, worker_type = %config.worker_type, "starting taskrunnerd");

    let ctx = Arc::new(WorkerContext::new(
        config,
        Arc::new(PlaceholderQueueClient),
        Arc::new(PlaceholderChainOfTrustVerifier),
        Arc::new(PlaceholderArtifactUploader),
    ));

    let cancel = CancellationToken::new();
    let controller = Controller::new(ctx, cancel.clone());

    let mut coordinator = match ShutdownCoordinator::install() {
        Ok(coordinator) => coordinator,
        Err(err) => {
            tracing::error!(error = %err, "failed to install signal handlers");
            return std::process::ExitCode::from(1);
        }
    };

    let drain = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        let drain = drain.clone();
        async move {
            loop {
                match coordinator.wait().await {
                    DrainReason::CancelAndDrain => {
                        tracing::info!("received SIGTERM; cancelling in-flight task and draining");
                        cancel.cancel();
                        drain.cancel();
                    }
                    DrainReason::DrainOnly => {
                        tracing::info!("received SIGUSR1; draining without cancelling in-flight task");
                        drain.cancel();
                    }
                }
            }
        }
    });

    let last_status = run_until_drained(&controller, &drain).await;

    tracing::info!("taskrunnerd stopped");
    std::process::ExitCode::from(exit_code_for(last_status))
}

/// Drives the Controller one claim at a time until the Coordinator signals a
/// drain, returning the status of the last reported task (if any).
async fn run_until_drained(controller: &Controller, drain: &CancellationToken) -> Option<TerminalStatus> {
    let mut last_status = None;
    loop {
        let outcome = controller.run_one().await;
        tracing::debug!(?outcome, "run_one finished");
        if let RunOutcome::Reported(status) = outcome {
            last_status = Some(status);
        }
        if drain.is_cancelled() {
            return last_status;
        }
    }
}

/// §6: exit with the status of the last executed task, or 0 on a graceful
/// drain with no task in flight.
fn exit_code_for(last_status: Option<TerminalStatus>) -> u8 {
    match last_status {
        None | Some(TerminalStatus::Completed) => 0,
        Some(_) => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_code_is_zero_with_no_task_run() {
        assert_eq!(exit_code_for(None), 0);
    }

    #[test]
    fn exit_code_is_zero_on_completed() {
        assert_eq!(exit_code_for(Some(TerminalStatus::Completed)), 0);
    }

    #[test]
    fn exit_code_is_nonzero_on_failed_or_exception() {
        assert_eq!(exit_code_for(Some(TerminalStatus::Failed)), 1);
        assert_eq!(
            exit_code_for(Some(TerminalStatus::Exception(
                taskrunner_core::ExceptionReason::WorkerShutdown
            ))),
            1
        );
    }
}
