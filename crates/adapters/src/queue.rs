// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Queue client implementations: a placeholder for the real transport, and
//! a scriptable fake for driving the Run Loop deterministically in tests.

use async_trait::async_trait;
use std::collections::VecDeque;
use taskrunner_core::{Credentials, RunId, TaskClaim, TaskDocument, TaskId};
use taskrunner_wire::{Claim, ExceptionReport, QueueClient, QueueError};

/// Real HTTP transport is an external integration seam (§1); this
/// placeholder always reports no work and fails any call that requires a
/// live claim, so a misconfigured build is obviously non-functional rather
/// than silently idle.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaceholderQueueClient;

#[async_trait]
impl QueueClient for PlaceholderQueueClient {
    async fn claim_work(&self, _worker_type: &str, _worker_id: &str) -> Result<Vec<Claim>, QueueError> {
        Ok(Vec::new())
    }

    async fn reclaim_task(&self, _task_id: &TaskId, _run_id: RunId) -> Result<Credentials, QueueError> {
        Err(QueueError::Other("queue transport has no production implementation in this build".into()))
    }

    async fn report_completed(&self, _task_id: &TaskId, _run_id: RunId) -> Result<(), QueueError> {
        Err(QueueError::Other("queue transport has no production implementation in this build".into()))
    }

    async fn report_failed(&self, _task_id: &TaskId, _run_id: RunId) -> Result<(), QueueError> {
        Err(QueueError::Other("queue transport has no production implementation in this build".into()))
    }

    async fn report_exception(
        &self,
        _task_id: &TaskId,
        _run_id: RunId,
        _report: ExceptionReport,
    ) -> Result<(), QueueError> {
        Err(QueueError::Other("queue transport has no production implementation in this build".into()))
    }

    async fn get_task(&self, _task_id: &TaskId) -> Result<TaskDocument, QueueError> {
        Err(QueueError::Other("queue transport has no production implementation in this build".into()))
    }
}

#[cfg(any(test, feature = "test-support"))]
mod fake {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[derive(Debug, Clone, PartialEq)]
    pub enum ReportCall {
        Completed { task_id: TaskId, run_id: RunId },
        Failed { task_id: TaskId, run_id: RunId },
        Exception { task_id: TaskId, run_id: RunId, reason: String },
    }

    #[derive(Default)]
    struct FakeState {
        pending_claims: VecDeque<Claim>,
        reclaim_result: Option<Result<Credentials, QueueError>>,
        reports: Vec<ReportCall>,
        claim_work_calls: u32,
        reclaim_calls: u32,
    }

    /// Scriptable `QueueClient` for driving the Run Loop in tests. Queue one
    /// or more tasks with `push_claim`; `claim_work` returns them one batch
    /// at a time, then empty batches forever after.
    #[derive(Clone, Default)]
    pub struct FakeQueueClient {
        inner: Arc<Mutex<FakeState>>,
    }

    impl FakeQueueClient {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn push_claim(&self, claim: Claim) {
            self.inner.lock().pending_claims.push_back(claim);
        }

        /// Scripts the next (and all subsequent, until re-scripted)
        /// `reclaim_task` outcome. Defaults to issuing fresh empty
        /// credentials on every call.
        pub fn set_reclaim_result(&self, result: Result<Credentials, QueueError>) {
            self.inner.lock().reclaim_result = Some(result);
        }

        pub fn reports(&self) -> Vec<ReportCall> {
            self.inner.lock().reports.clone()
        }

        pub fn claim_work_call_count(&self) -> u32 {
            self.inner.lock().claim_work_calls
        }

        pub fn reclaim_call_count(&self) -> u32 {
            self.inner.lock().reclaim_calls
        }
    }

    #[async_trait]
    impl QueueClient for FakeQueueClient {
        async fn claim_work(
            &self,
            _worker_type: &str,
            _worker_id: &str,
        ) -> Result<Vec<Claim>, QueueError> {
            let mut state = self.inner.lock();
            state.claim_work_calls += 1;
            match state.pending_claims.pop_front() {
                Some(claim) => Ok(vec![claim]),
                None => Ok(Vec::new()),
            }
        }

        async fn reclaim_task(
            &self,
            _task_id: &TaskId,
            _run_id: RunId,
        ) -> Result<Credentials, QueueError> {
            let mut state = self.inner.lock();
            state.reclaim_calls += 1;
            match state.reclaim_result.clone() {
                Some(result) => result,
                None => Ok(Credentials::new(std::collections::HashMap::new())),
            }
        }

        async fn report_completed(&self, task_id: &TaskId, run_id: RunId) -> Result<(), QueueError> {
            self.inner
                .lock()
                .reports
                .push(ReportCall::Completed { task_id: task_id.clone(), run_id });
            Ok(())
        }

        async fn report_failed(&self, task_id: &TaskId, run_id: RunId) -> Result<(), QueueError> {
            self.inner.lock().reports.push(ReportCall::Failed { task_id: task_id.clone(), run_id });
            Ok(())
        }

        async fn report_exception(
            &self,
            task_id: &TaskId,
            run_id: RunId,
            report: ExceptionReport,
        ) -> Result<(), QueueError> {
            self.inner.lock().reports.push(ReportCall::Exception {
                task_id: task_id.clone(),
                run_id,
                reason: report.reason,
            });
            Ok(())
        }

        async fn get_task(&self, task_id: &TaskId) -> Result<TaskDocument, QueueError> {
            let state = self.inner.lock();
            state
                .pending_claims
                .iter()
                .find(|c| &c.task_id == task_id)
                .map(|c| c.task.clone())
                .ok_or_else(|| QueueError::Other(format!("no such task {task_id}")))
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeQueueClient, ReportCall};
