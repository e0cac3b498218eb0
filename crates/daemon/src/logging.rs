// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Logging & Diagnostics (C8): a non-blocking file appender feeding a
//! `tracing-subscriber` registry, with level overridden by an env var.
//!
//! This is a separate artifact from the live log (the child task's own
//! merged stdout+stderr, written by the Task Process) — the two must never
//! share a sink.

use std::io;
use std::path::Path;

use taskrunner_core::Config;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const LOG_FILE_NAME: &str = "worker.log";

/// Installs the global subscriber and returns the appender guard, which must
/// be held for the lifetime of `main` or buffered log lines are dropped.
pub fn init(config: &Config) -> io::Result<tracing_appender::non_blocking::WorkerGuard> {
    init_at(&config.log_dir)
}

fn init_at(log_dir: &Path) -> io::Result<tracing_appender::non_blocking::WorkerGuard> {
    std::fs::create_dir_all(log_dir)?;

    let file_appender = tracing_appender::rolling::never(log_dir, LOG_FILE_NAME);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_env("TASKRUNNER_LOG").unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(non_blocking))
        .init();

    Ok(guard)
}
