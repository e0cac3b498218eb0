// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Reclaim Loop (C2): periodically extends the lease on the current run and
//! reacts to lease loss by stopping the task process.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use taskrunner_core::{Credentials, RunId, TaskId};
use taskrunner_wire::{QueueClient, QueueError};
use tokio_util::sync::CancellationToken;

use crate::task_process::TaskProcessHandle;

/// Shared credential cell for one run. The Reclaim Loop is the only writer;
/// the Controller only reads. Swaps are whole-value replacements under a
/// lock, so no reader ever observes a torn claim (§4.2 ordering guarantee).
#[derive(Clone)]
pub struct SharedCredentials(Arc<RwLock<Credentials>>);

impl SharedCredentials {
    pub fn new(initial: Credentials) -> Self {
        Self(Arc::new(RwLock::new(initial)))
    }

    pub fn read(&self) -> Credentials {
        self.0.read().clone()
    }

    fn swap(&self, credentials: Credentials) {
        *self.0.write() = credentials;
    }
}

/// How the Reclaim Loop stopped running.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReclaimOutcome {
    /// The controller cancelled this run; the loop exited cleanly.
    Cancelled,
    /// `reclaimTask` returned 409 — the lease is lost. The task process has
    /// already been asked to stop; the Controller must not report status
    /// for this run (the server already closed it).
    LeaseLost,
    /// Any other Queue failure. Propagated so the Controller can translate
    /// it into an exception report.
    Failed(QueueError),
}

pub struct ReclaimLoop<Q> {
    queue: Arc<Q>,
    task_id: TaskId,
    run_id: RunId,
    credentials: SharedCredentials,
    process: Arc<TaskProcessHandle>,
    interval: Duration,
}

impl<Q: QueueClient> ReclaimLoop<Q> {
    pub fn new(
        queue: Arc<Q>,
        task_id: TaskId,
        run_id: RunId,
        credentials: SharedCredentials,
        process: Arc<TaskProcessHandle>,
        interval: Duration,
    ) -> Self {
        Self { queue, task_id, run_id, credentials, process, interval }
    }

    /// Runs until cancelled, lease lost, or a non-conflict Queue failure.
    pub async fn run(self, cancel: CancellationToken) -> ReclaimOutcome {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return ReclaimOutcome::Cancelled,
                _ = tokio::time::sleep(self.interval) => {}
            }

            match self.queue.reclaim_task(&self.task_id, self.run_id).await {
                Ok(new_credentials) => {
                    self.credentials.swap(new_credentials);
                    tracing::debug!(task_id = %self.task_id, run_id = %self.run_id, "lease reclaimed");
                }
                Err(QueueError::Conflict) => {
                    tracing::warn!(task_id = %self.task_id, run_id = %self.run_id, "lease lost, stopping task process");
                    self.process.stop();
                    return ReclaimOutcome::LeaseLost;
                }
                Err(err) => {
                    tracing::error!(task_id = %self.task_id, run_id = %self.run_id, error = %err, "reclaim failed");
                    return ReclaimOutcome::Failed(err);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use taskrunner_adapters::FakeQueueClient;

    #[tokio::test]
    async fn successful_reclaim_swaps_credentials() {
        tokio::time::pause();
        let queue = Arc::new(FakeQueueClient::new());
        let mut fields = HashMap::new();
        fields.insert("clientId".to_string(), "renewed".to_string());
        queue.set_reclaim_result(Ok(Credentials::new(fields)));

        let tmp = tempfile::tempdir().unwrap();
        let process = Arc::new(
            crate::task_process::TaskProcessHandle::start(
                &["sleep".to_string(), "30".to_string()],
                &HashMap::new(),
                tmp.path(),
                &tmp.path().join("live.log"),
            )
            .await
            .unwrap(),
        );

        let credentials = SharedCredentials::new(Credentials::new(HashMap::new()));
        let reclaim = ReclaimLoop::new(
            queue,
            TaskId::from("t-1"),
            RunId::new(0),
            credentials.clone(),
            process.clone(),
            Duration::from_secs(30),
        );

        let cancel = CancellationToken::new();
        let cancel_for_loop = cancel.clone();
        let handle = tokio::spawn(reclaim.run(cancel_for_loop));

        tokio::time::advance(Duration::from_secs(31)).await;
        tokio::task::yield_now().await;
        cancel.cancel();
        let outcome = handle.await.unwrap();
        assert_eq!(outcome, ReclaimOutcome::Cancelled);
        assert_eq!(credentials.read().get("clientId"), Some("renewed"));
        process.worker_shutdown_stop();
    }

    #[tokio::test]
    async fn conflict_stops_task_process_and_reports_lease_lost() {
        tokio::time::pause();
        let queue = Arc::new(FakeQueueClient::new());
        queue.set_reclaim_result(Err(QueueError::Conflict));

        let tmp = tempfile::tempdir().unwrap();
        let process = Arc::new(
            crate::task_process::TaskProcessHandle::start(
                &["sleep".to_string(), "30".to_string()],
                &HashMap::new(),
                tmp.path(),
                &tmp.path().join("live.log"),
            )
            .await
            .unwrap(),
        );

        let credentials = SharedCredentials::new(Credentials::new(HashMap::new()));
        let reclaim = ReclaimLoop::new(
            queue,
            TaskId::from("t-1"),
            RunId::new(0),
            credentials,
            process.clone(),
            Duration::from_secs(5),
        );

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(reclaim.run(cancel));
        tokio::time::advance(Duration::from_secs(6)).await;
        let outcome = handle.await.unwrap();
        assert_eq!(outcome, ReclaimOutcome::LeaseLost);
    }
}
