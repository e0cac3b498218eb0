// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Run-Tasks Controller (C3): claim → prepare → verify → execute → upload →
//! report, cancellable at every suspension point (§4.3).

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use taskrunner_adapters::{CotError, UploadError};
use taskrunner_core::{ExceptionReason, RunError, RunId, TaskClaim, TaskId, TerminalStatus};
use taskrunner_wire::{ExceptionReport, QueueError};
use tokio_util::sync::CancellationToken;

use crate::context::WorkerContext;
use crate::reclaim::{ReclaimLoop, ReclaimOutcome, SharedCredentials};
use crate::status_mapper::{map_exit, map_timeout};
use crate::task_process::TaskProcessHandle;

/// What happened during one `run_one` invocation. The daemon's main loop
/// inspects this only for logging/metrics — the Controller itself already
/// did whatever reporting was required.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// `claim_work` returned no tasks; slept and returned.
    NoWork,
    /// Cancelled before or during the idle/empty sleep; no claim was made.
    AbandonedBeforeClaim,
    /// A claim was accepted and driven to a terminal report.
    Reported(TerminalStatus),
    /// A claim was accepted but the lease was lost before a report could be
    /// issued; the server already closed the run, so none was sent.
    LeaseLostNoReport,
}

#[derive(Serialize)]
struct CurrentTaskInfo<'a> {
    #[serde(rename = "taskId")]
    task_id: &'a str,
    #[serde(rename = "runId")]
    run_id: u32,
}

/// The top-level state machine. One instance drives the whole worker
/// lifetime; `run_one` is called in a loop by the process entry point (C9)
/// until the Shutdown Coordinator (C5) requests a drain.
pub struct Controller {
    ctx: Arc<WorkerContext>,
    cancel: CancellationToken,
}

impl Controller {
    pub fn new(ctx: Arc<WorkerContext>, cancel: CancellationToken) -> Self {
        Self { ctx, cancel }
    }

    /// Idempotent; safe to call from any task (§4.3).
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    #[tracing::instrument(skip_all)]
    pub async fn run_one(&self) -> RunOutcome {
        if self.cancel.is_cancelled() {
            return RunOutcome::AbandonedBeforeClaim;
        }

        let claims = tokio::select! {
            _ = self.cancel.cancelled() => return RunOutcome::AbandonedBeforeClaim,
            result = self.ctx.queue.claim_work(&self.ctx.config.worker_type, &self.ctx.config.worker_id) => {
                match result {
                    Ok(claims) => claims,
                    Err(err) => {
                        tracing::error!(error = %err, "claim_work failed");
                        return RunOutcome::NoWork;
                    }
                }
            }
        };

        let Some(claim) = claims.into_iter().next() else {
            tokio::select! {
                _ = self.cancel.cancelled() => {}
                _ = tokio::time::sleep(Duration::from_secs(self.ctx.config.poll_interval)) => {}
            }
            return RunOutcome::NoWork;
        };

        self.run_claim(claim.into()).await
    }

    #[tracing::instrument(skip_all, fields(task_id = %claim.task_id, run_id = %claim.run_id))]
    async fn run_claim(&self, claim: TaskClaim) -> RunOutcome {
        let task_id = claim.task_id.clone();
        let run_id = claim.run_id;

        if let Err(err) = self.prepare_to_run_task(&claim) {
            tracing::error!(error = %err, "failed to write current_task_info.json");
        }
        self.ctx.set_claim(Some(claim.clone()));

        let live_log_path = self.live_log_path(&task_id, run_id);

        let (status, reported) = if self.cancel.is_cancelled() {
            // Cancelled after prepare, before execute starts (§4.3 table).
            self.upload_then(&live_log_path, &[]).await;
            (TerminalStatus::Exception(ExceptionReason::WorkerShutdown), true)
        } else if self.ctx.config.verify_chain_of_trust {
            match self.verify(&claim).await {
                VerifyOutcome::Accepted => self.execute_and_report(&claim, &live_log_path).await,
                VerifyOutcome::Rejected(reason) => {
                    tracing::warn!(reason, "chain of trust rejected claim");
                    self.upload_then(&live_log_path, &[]).await;
                    (TerminalStatus::Exception(ExceptionReason::MalformedPayload), true)
                }
                VerifyOutcome::Transient(reason) => {
                    tracing::warn!(reason, "transient error verifying chain of trust");
                    self.upload_then(&live_log_path, &[]).await;
                    (TerminalStatus::Exception(ExceptionReason::IntermittentTask), true)
                }
                VerifyOutcome::Cancelled => {
                    self.upload_then(&live_log_path, &[]).await;
                    (TerminalStatus::Exception(ExceptionReason::WorkerShutdown), true)
                }
            }
        } else {
            self.execute_and_report(&claim, &live_log_path).await
        };

        let outcome = if reported {
            self.report(&task_id, run_id, &status).await;
            RunOutcome::Reported(status)
        } else {
            RunOutcome::LeaseLostNoReport
        };

        self.cleanup();
        outcome
    }

    async fn verify(&self, claim: &TaskClaim) -> VerifyOutcome {
        tokio::select! {
            _ = self.cancel.cancelled() => VerifyOutcome::Cancelled,
            result = self.ctx.verifier.verify(claim) => match result {
                Ok(()) => VerifyOutcome::Accepted,
                Err(CotError::Rejected(reason)) => VerifyOutcome::Rejected(reason),
                Err(CotError::Transient(reason)) => VerifyOutcome::Transient(reason),
            }
        }
    }

    /// Executes the task, races it against cancellation/timeout/reclaim
    /// failure, uploads artifacts, and returns the status to report plus
    /// whether a report should be sent at all (false on lease loss).
    async fn execute_and_report(
        &self,
        claim: &TaskClaim,
        live_log_path: &Path,
    ) -> (TerminalStatus, bool) {
        let argv = self.ctx.config.task_script.clone();
        let env = self.build_task_env(claim);
        let cwd = self.task_work_dir(&claim.task_id, claim.run_id);
        if let Err(err) = std::fs::create_dir_all(&cwd) {
            tracing::error!(error = %err, "failed to create task work dir");
            return (TerminalStatus::Exception(ExceptionReason::InternalError), true);
        }

        let process = match TaskProcessHandle::start(&argv, &env, &cwd, live_log_path).await {
            Ok(process) => Arc::new(process),
            Err(err) => {
                tracing::error!(error = %err, "failed to spawn task process");
                return (TerminalStatus::Exception(ExceptionReason::MalformedPayload), true);
            }
        };
        self.ctx.set_task_process(Some(process.clone()));

        let credentials = SharedCredentials::new(claim.credentials.clone());
        let reclaim_cancel = CancellationToken::new();
        let reclaim = ReclaimLoop::new(
            self.ctx.queue.clone(),
            claim.task_id.clone(),
            claim.run_id,
            credentials,
            process.clone(),
            Duration::from_secs(self.ctx.config.reclaim_interval),
        );
        let mut reclaim_handle = tokio::spawn(reclaim.run(reclaim_cancel.clone()));

        let timeout = Duration::from_secs(self.ctx.config.task_max_timeout);
        let exec_result = tokio::select! {
            exit_code = process.wait() => ExecResult::Exited(exit_code),
            _ = self.cancel.cancelled() => ExecResult::Cancelled,
            _ = tokio::time::sleep(timeout) => ExecResult::TimedOut,
            reclaim_outcome = &mut reclaim_handle => ExecResult::ReclaimEnded(
                reclaim_outcome.unwrap_or(ReclaimOutcome::Cancelled)
            ),
        };

        let (status, reported) = match exec_result {
            ExecResult::Exited(code) => {
                reclaim_cancel.cancel();
                let _ = reclaim_handle.await;
                let mapped = map_exit(code, false, &self.ctx.config);
                self.write_live_log_line(live_log_path, mapped.live_log_line);
                (mapped.status, true)
            }
            ExecResult::Cancelled => {
                process.worker_shutdown_stop();
                process.wait().await;
                reclaim_cancel.cancel();
                let _ = reclaim_handle.await;
                (TerminalStatus::Exception(ExceptionReason::WorkerShutdown), true)
            }
            ExecResult::TimedOut => {
                process.worker_shutdown_stop();
                process.wait().await;
                reclaim_cancel.cancel();
                let _ = reclaim_handle.await;
                let mapped = map_timeout(&self.ctx.config);
                (mapped.status, true)
            }
            ExecResult::ReclaimEnded(ReclaimOutcome::LeaseLost) => {
                process.wait().await;
                (TerminalStatus::Failed, false)
            }
            ExecResult::ReclaimEnded(ReclaimOutcome::Cancelled) => {
                // Reclaim exits cleanly only when we cancel it ourselves;
                // shouldn't race here, but treat it like a normal exit.
                let code = process.wait().await;
                let mapped = map_exit(code, false, &self.ctx.config);
                (mapped.status, true)
            }
            ExecResult::ReclaimEnded(ReclaimOutcome::Failed(queue_err)) => {
                process.worker_shutdown_stop();
                process.wait().await;
                let run_err = RunError::TransportTransient(queue_err.to_string());
                let reason =
                    run_err.exception_reason().unwrap_or(ExceptionReason::InternalError);
                (TerminalStatus::Exception(reason), true)
            }
        };

        self.ctx.set_task_process(None);
        let upload_err = self.upload_then(live_log_path, &[]).await;
        if reported {
            if let Some(err) = upload_err {
                let reason = match err {
                    UploadError::Transient(_) => ExceptionReason::IntermittentTask,
                    UploadError::Other(_) => ExceptionReason::InternalError,
                };
                return (TerminalStatus::Exception(reason), true);
            }
        }
        (status, reported)
    }

    async fn upload_then(&self, live_log_path: &Path, extra: &[PathBuf]) -> Option<UploadError> {
        let mut files = extra.to_vec();
        if live_log_path.exists() {
            files.push(live_log_path.to_path_buf());
        }
        match self.ctx.uploader.upload(&files).await {
            Ok(()) => None,
            Err(err) => {
                tracing::error!(error = %err, "artifact upload failed");
                Some(err)
            }
        }
    }

    async fn report(&self, task_id: &TaskId, run_id: RunId, status: &TerminalStatus) {
        let result = match status {
            TerminalStatus::Completed => self.ctx.queue.report_completed(task_id, run_id).await,
            TerminalStatus::Failed => self.ctx.queue.report_failed(task_id, run_id).await,
            TerminalStatus::Exception(reason) => {
                self.ctx
                    .queue
                    .report_exception(task_id, run_id, ExceptionReport { reason: reason.to_string() })
                    .await
            }
        };
        match result {
            Ok(()) | Err(QueueError::Conflict) => {}
            Err(err) => tracing::error!(error = %err, "terminal report failed"),
        }
    }

    fn prepare_to_run_task(&self, claim: &TaskClaim) -> std::io::Result<()> {
        let info = CurrentTaskInfo { task_id: claim.task_id.as_str(), run_id: claim.run_id.value() };
        let body = serde_json::to_vec_pretty(&info)?;
        let marker = self.ctx.marker_path();
        let tmp = marker.with_extension("json.tmp");
        std::fs::write(&tmp, body)?;
        std::fs::rename(&tmp, &marker)?;
        Ok(())
    }

    fn cleanup(&self) {
        self.ctx.set_claim(None);
        self.ctx.set_task_process(None);
        let marker = self.ctx.marker_path();
        if marker.exists() {
            if let Err(err) = std::fs::remove_file(&marker) {
                tracing::warn!(error = %err, "failed to remove current_task_info.json");
            }
        }
    }

    fn build_task_env(&self, claim: &TaskClaim) -> HashMap<String, String> {
        let mut env = claim.task.payload.env.clone();
        env.insert("TASK_ID".to_string(), claim.task_id.to_string());
        env.insert("RUN_ID".to_string(), claim.run_id.to_string());
        env.insert("TASKCLUSTER_ROOT_URL".to_string(), self.ctx.config.taskcluster_root_url.clone());
        env
    }

    fn task_work_dir(&self, task_id: &TaskId, run_id: RunId) -> PathBuf {
        self.ctx.config.work_dir.join(format!("{task_id}-{run_id}"))
    }

    fn live_log_path(&self, task_id: &TaskId, run_id: RunId) -> PathBuf {
        self.task_work_dir(task_id, run_id).join("live_backing.log")
    }

    fn write_live_log_line(&self, live_log_path: &Path, line: Option<&str>) {
        let Some(line) = line else { return };
        use std::io::Write;
        let result = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(live_log_path)
            .and_then(|mut f| f.write_all(line.as_bytes()));
        if let Err(err) = result {
            tracing::warn!(error = %err, "failed to append automation-error line to live log");
        }
    }
}

enum VerifyOutcome {
    Accepted,
    Rejected(String),
    Transient(String),
    Cancelled,
}

enum ExecResult {
    Exited(i32),
    Cancelled,
    TimedOut,
    ReclaimEnded(ReclaimOutcome),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::WorkerContext;
    use taskrunner_adapters::{FakeArtifactUploader, FakeChainOfTrustVerifier, FakeQueueClient};
    use taskrunner_core::Config;
    use taskrunner_wire::Claim;
    use tempfile::tempdir;

    fn test_context(
        work_dir: PathBuf,
        log_dir: PathBuf,
        queue: FakeQueueClient,
        verifier: FakeChainOfTrustVerifier,
        uploader: FakeArtifactUploader,
    ) -> Arc<WorkerContext> {
        let config = Config::test_fixture(work_dir, log_dir);
        Arc::new(WorkerContext::new(config, Arc::new(queue), Arc::new(verifier), Arc::new(uploader)))
    }

    fn sample_claim(task_id: &str) -> Claim {
        Claim {
            task_id: TaskId::from(task_id),
            run_id: RunId::new(0),
            credentials: taskrunner_core::Credentials::new(HashMap::new()),
            task: taskrunner_core::TaskDocument {
                payload: taskrunner_core::TaskPayload::default(),
                extra: None,
                metadata: None,
                scopes: vec![],
                scheduler_id: "s".into(),
                worker_type: "test-worker-type".into(),
                dependencies: vec![],
            },
        }
    }

    #[tokio::test]
    async fn happy_path_runs_task_and_reports_completed() {
        let tmp = tempdir().unwrap();
        let queue = FakeQueueClient::new();
        queue.push_claim(sample_claim("t-1"));
        let verifier = FakeChainOfTrustVerifier::new();
        let uploader = FakeArtifactUploader::new();
        let ctx = test_context(
            tmp.path().join("work"),
            tmp.path().join("log"),
            queue.clone(),
            verifier,
            uploader.clone(),
        );
        let controller = Controller::new(ctx, CancellationToken::new());

        let outcome = controller.run_one().await;

        assert_eq!(outcome, RunOutcome::Reported(TerminalStatus::Completed));
        assert_eq!(queue.reports().len(), 1);
        assert!(!uploader.uploads().is_empty());
    }

    #[tokio::test]
    async fn no_work_sleeps_and_returns_no_work() {
        let tmp = tempdir().unwrap();
        let queue = FakeQueueClient::new();
        let ctx = test_context(
            tmp.path().join("work"),
            tmp.path().join("log"),
            queue,
            FakeChainOfTrustVerifier::new(),
            FakeArtifactUploader::new(),
        );
        let controller = Controller::new(ctx, CancellationToken::new());

        let outcome = controller.run_one().await;

        assert_eq!(outcome, RunOutcome::NoWork);
    }

    #[tokio::test]
    async fn cancel_before_claim_abandons_without_reporting() {
        let tmp = tempdir().unwrap();
        let queue = FakeQueueClient::new();
        queue.push_claim(sample_claim("t-1"));
        let ctx = test_context(
            tmp.path().join("work"),
            tmp.path().join("log"),
            queue.clone(),
            FakeChainOfTrustVerifier::new(),
            FakeArtifactUploader::new(),
        );
        let cancel = CancellationToken::new();
        cancel.cancel();
        let controller = Controller::new(ctx, cancel);

        let outcome = controller.run_one().await;

        assert_eq!(outcome, RunOutcome::AbandonedBeforeClaim);
        assert!(queue.reports().is_empty());
    }

    #[tokio::test]
    async fn rejected_chain_of_trust_reports_malformed_payload() {
        let tmp = tempdir().unwrap();
        let queue = FakeQueueClient::new();
        queue.push_claim(sample_claim("t-1"));
        let verifier = FakeChainOfTrustVerifier::new();
        verifier.reject("bad signature");
        let mut config = Config::test_fixture(tmp.path().join("work"), tmp.path().join("log"));
        config.verify_chain_of_trust = true;
        let ctx = Arc::new(WorkerContext::new(
            config,
            Arc::new(queue.clone()),
            Arc::new(verifier),
            Arc::new(FakeArtifactUploader::new()),
        ));
        let controller = Controller::new(ctx, CancellationToken::new());

        let outcome = controller.run_one().await;

        assert_eq!(
            outcome,
            RunOutcome::Reported(TerminalStatus::Exception(ExceptionReason::MalformedPayload))
        );
    }

    #[tokio::test]
    async fn lease_lost_during_execution_reports_nothing() {
        let tmp = tempdir().unwrap();
        let queue = FakeQueueClient::new();
        let mut claim = sample_claim("t-1");
        claim.task.payload.env.insert("_".into(), "_".into());
        queue.push_claim(claim);
        queue.set_reclaim_result(Err(QueueError::Conflict));
        let mut config = Config::test_fixture(tmp.path().join("work"), tmp.path().join("log"));
        config.task_script = vec!["sleep".into(), "30".into()];
        config.reclaim_interval = 1;
        let ctx = Arc::new(WorkerContext::new(
            config,
            Arc::new(queue.clone()),
            Arc::new(FakeChainOfTrustVerifier::new()),
            Arc::new(FakeArtifactUploader::new()),
        ));
        let controller = Controller::new(ctx, CancellationToken::new());

        let outcome = controller.run_one().await;

        assert_eq!(outcome, RunOutcome::LeaseLostNoReport);
        assert!(queue.reports().is_empty());
    }

    #[tokio::test]
    async fn upload_transient_failure_overrides_status_to_intermittent_task() {
        let tmp = tempdir().unwrap();
        let queue = FakeQueueClient::new();
        queue.push_claim(sample_claim("t-1"));
        let uploader = FakeArtifactUploader::new();
        uploader.fail_transient("connection reset");
        let ctx = test_context(
            tmp.path().join("work"),
            tmp.path().join("log"),
            queue.clone(),
            FakeChainOfTrustVerifier::new(),
            uploader,
        );
        let controller = Controller::new(ctx, CancellationToken::new());

        let outcome = controller.run_one().await;

        assert_eq!(
            outcome,
            RunOutcome::Reported(TerminalStatus::Exception(ExceptionReason::IntermittentTask))
        );
    }
}
