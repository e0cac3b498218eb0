// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker Context (C6): process-wide state shared by every stage.
//!
//! Single-writer discipline (§4.6): only the Controller writes `claim` and
//! `task_process`; the Reclaim Loop only touches `claim.credentials` through
//! its own [`SharedCredentials`](crate::reclaim::SharedCredentials) handle,
//! never through this struct.

use std::sync::Arc;

use parking_lot::Mutex;
use taskrunner_adapters::{ArtifactUploader, ChainOfTrustVerifier};
use taskrunner_core::{Config, TaskClaim};
use taskrunner_wire::QueueClient;

use crate::task_process::TaskProcessHandle;

/// One instance per worker process. Built by the process entry point (C9)
/// from a validated [`Config`] and the linked-in adapters.
pub struct WorkerContext {
    pub config: Config,
    pub queue: Arc<dyn QueueClient>,
    pub verifier: Arc<dyn ChainOfTrustVerifier>,
    pub uploader: Arc<dyn ArtifactUploader>,

    claim: Mutex<Option<TaskClaim>>,
    task_process: Mutex<Option<Arc<TaskProcessHandle>>>,
}

impl WorkerContext {
    pub fn new(
        config: Config,
        queue: Arc<dyn QueueClient>,
        verifier: Arc<dyn ChainOfTrustVerifier>,
        uploader: Arc<dyn ArtifactUploader>,
    ) -> Self {
        if let Some(stale) = Self::marker_path_if_present(&config) {
            tracing::warn!(
                path = %stale.display(),
                "found stale current_task_info.json from a prior run; no recovery is attempted"
            );
        }

        Self {
            config,
            queue,
            verifier,
            uploader,
            claim: Mutex::new(None),
            task_process: Mutex::new(None),
        }
    }

    fn marker_path_if_present(config: &Config) -> Option<std::path::PathBuf> {
        let path = config.work_dir.join("current_task_info.json");
        path.exists().then_some(path)
    }

    pub fn marker_path(&self) -> std::path::PathBuf {
        self.config.work_dir.join("current_task_info.json")
    }

    pub fn set_claim(&self, claim: Option<TaskClaim>) {
        *self.claim.lock() = claim;
    }

    pub fn claim(&self) -> Option<TaskClaim> {
        self.claim.lock().clone()
    }

    pub fn set_task_process(&self, process: Option<Arc<TaskProcessHandle>>) {
        *self.task_process.lock() = process;
    }

    pub fn task_process(&self) -> Option<Arc<TaskProcessHandle>> {
        self.task_process.lock().clone()
    }
}
