// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Queue RPC surface consumed by the Controller and Reclaim Loop (§6).
//!
//! This is an interface only — a production HTTP transport (retry/backoff,
//! auth, connection pooling) is out of scope; callers depend solely on
//! [`QueueClient`].

use async_trait::async_trait;
use taskrunner_core::{Credentials, RunId, TaskClaim, TaskDocument, TaskId};
use thiserror::Error;

/// Failures talking to the Queue. `Conflict` carries the HTTP 409 case
/// (`reclaimTask` lease-lost, or a terminal report racing a server-side
/// close) that callers must distinguish from ordinary transport failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QueueError {
    /// HTTP 409 — lease already lost, or the run was already closed.
    #[error("queue conflict (409)")]
    Conflict,

    /// Network failure, connection reset, or 5xx — retryable in principle.
    #[error("transient queue transport error: {0}")]
    Transient(String),

    /// Any other non-2xx status or malformed response.
    #[error("queue request failed: {0}")]
    Other(String),
}

/// One task returned by `claimWork`.
#[derive(Debug, Clone, PartialEq)]
pub struct Claim {
    pub task_id: TaskId,
    pub run_id: RunId,
    pub credentials: Credentials,
    pub task: TaskDocument,
}

impl From<Claim> for TaskClaim {
    fn from(claim: Claim) -> Self {
        TaskClaim {
            task_id: claim.task_id,
            run_id: claim.run_id,
            credentials: claim.credentials,
            task: claim.task,
            status: taskrunner_core::RunStatus::default(),
        }
    }
}

/// Reason attached to `reportException`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExceptionReport {
    pub reason: String,
}

/// The Queue RPC surface. A production implementation wraps an HTTP client;
/// tests use a fake (`taskrunner-adapters::fake::FakeQueueClient`).
#[async_trait]
pub trait QueueClient: Send + Sync + 'static {
    /// Polls for available work. An empty `Vec` means no work is available
    /// right now (the Controller sleeps for `poll_interval` and retries).
    async fn claim_work(
        &self,
        worker_type: &str,
        worker_id: &str,
    ) -> Result<Vec<Claim>, QueueError>;

    /// Extends the lease on a run. `Err(QueueError::Conflict)` means the
    /// lease is lost and the caller must abort the run without reporting.
    async fn reclaim_task(
        &self,
        task_id: &TaskId,
        run_id: RunId,
    ) -> Result<Credentials, QueueError>;

    async fn report_completed(&self, task_id: &TaskId, run_id: RunId) -> Result<(), QueueError>;

    async fn report_failed(&self, task_id: &TaskId, run_id: RunId) -> Result<(), QueueError>;

    async fn report_exception(
        &self,
        task_id: &TaskId,
        run_id: RunId,
        report: ExceptionReport,
    ) -> Result<(), QueueError>;

    /// Fetches a task document directly, bypassing the claim flow. The
    /// Controller retries this once with a bounded backoff on failure (§6).
    async fn get_task(&self, task_id: &TaskId) -> Result<TaskDocument, QueueError>;
}
