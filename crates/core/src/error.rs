// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error taxonomies.
//!
//! Two separate enums by design: [`RunError`] covers everything that can go
//! wrong between an accepted claim and a terminal report, and is always
//! translated into one; [`ConfigError`] covers config load/validation
//! failures, which abort the process before any claim exists and so never
//! reach the Queue.

use crate::status::ExceptionReason;
use thiserror::Error;

/// Failures arising anywhere in the claim → prepare → verify → execute →
/// upload → report pipeline. Every variant maps to a `TerminalStatus`
/// (see `taskrunner-engine`'s status mapper) except [`RunError::Fatal`],
/// which propagates out of the Controller and ends the worker process.
#[derive(Debug, Error)]
pub enum RunError {
    /// `reclaimTask` returned 409; the server already closed this run.
    /// No report is attempted for this case.
    #[error("lease lost for task {task_id}/{run_id}")]
    ClaimLost { task_id: String, run_id: u32 },

    /// Network/5xx/connection-reset while talking to the Queue.
    #[error("transient transport error: {0}")]
    TransportTransient(String),

    /// Chain-of-Trust verification rejected the claimed task.
    #[error("chain of trust verification failed: {0}")]
    VerifyFailed(String),

    /// The execute-phase watchdog fired before the child exited.
    #[error("task exceeded max timeout")]
    ChildTimeout,

    /// The child was killed by a signal (negative exit code).
    #[error("child terminated by signal {signal}")]
    ChildSignalled { signal: i32 },

    /// The Shutdown Coordinator cancelled the run in progress.
    #[error("run cancelled by shutdown request")]
    ShutdownRequested,

    /// Any otherwise-uncaught failure inside a single run attempt.
    #[error("internal error: {0}")]
    InternalError(String),

    /// Uncaught failure in upload (or similar) that must not be swallowed;
    /// propagates out of the Controller and crashes the worker.
    #[error("fatal error: {0}")]
    Fatal(String),
}

impl RunError {
    /// The exception reason this error maps to at report time, if any.
    /// `ClaimLost` has none: the Controller must not report at all.
    pub fn exception_reason(&self) -> Option<ExceptionReason> {
        match self {
            RunError::ClaimLost { .. } => None,
            RunError::TransportTransient(_) => Some(ExceptionReason::IntermittentTask),
            RunError::VerifyFailed(_) => Some(ExceptionReason::MalformedPayload),
            RunError::ChildTimeout => None, // mapped via task_max_timeout_status, not a fixed reason
            RunError::ChildSignalled { signal } if *signal == 11 => {
                Some(ExceptionReason::MalformedPayload)
            }
            RunError::ChildSignalled { .. } => None, // maps to Failed
            RunError::ShutdownRequested => Some(ExceptionReason::WorkerShutdown),
            RunError::InternalError(_) => Some(ExceptionReason::InternalError),
            RunError::Fatal(_) => None,
        }
    }
}

/// Failures loading or validating the on-disk worker configuration (C7).
/// These never reach the Queue; they're reported on stderr and the process
/// exits before the run loop starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid config: {0}")]
    Invalid(String),

    #[error("failed to create directory {path}: {source}")]
    CreateDir {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
