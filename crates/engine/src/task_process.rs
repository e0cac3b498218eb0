// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task Process (C1): owns a single child process for the duration of one
//! task, exposing cooperative termination to both the Reclaim Loop (on lease
//! loss) and the Shutdown Coordinator (on an operator signal).

use std::collections::HashMap;
use std::os::unix::process::ExitStatusExt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;
use thiserror::Error;
use tokio::process::Command;
use tokio::sync::Mutex as AsyncMutex;

/// Grace window between SIGTERM and the follow-up SIGKILL (§4.1: "≤2s").
const KILL_GRACE: Duration = Duration::from_secs(2);

#[derive(Debug, Error)]
pub enum SpawnError {
    #[error("failed to open live log {path}: {source}")]
    LogOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to spawn child process: {0}")]
    Spawn(std::io::Error),

    #[error("spawned child has no pid")]
    MissingPid,
}

/// A running (or reaped) child process, spawned in its own process group so
/// kill-by-group reaps any descendants it forked.
pub struct TaskProcessHandle {
    pid: u32,
    child: Arc<AsyncMutex<Option<tokio::process::Child>>>,
    stop_requested: Arc<AtomicBool>,
}

impl TaskProcessHandle {
    /// Spawns `argv[0] argv[1..]` with `env` merged over the current
    /// process environment, `cwd` as its working directory, and merged
    /// stdout+stderr appended to `log_path`.
    pub async fn start(
        argv: &[String],
        env: &HashMap<String, String>,
        cwd: &Path,
        log_path: &Path,
    ) -> Result<Self, SpawnError> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| SpawnError::Spawn(std::io::Error::other("empty argv")))?;

        let log_file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_path)
            .map_err(|source| SpawnError::LogOpen { path: log_path.to_path_buf(), source })?;
        let stdout_file =
            log_file.try_clone().map_err(|source| SpawnError::LogOpen {
                path: log_path.to_path_buf(),
                source,
            })?;

        let mut cmd = Command::new(program);
        cmd.args(args)
            .current_dir(cwd)
            .envs(env)
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout_file))
            .stderr(Stdio::from(log_file));

        // New process group so SIGTERM/SIGKILL-by-group reaps descendants.
        cmd.process_group(0);

        let child = cmd.spawn().map_err(SpawnError::Spawn)?;
        let pid = child.id().ok_or(SpawnError::MissingPid)?;

        tracing::info!(pid, log_path = %log_path.display(), "task process spawned");

        Ok(Self {
            pid,
            child: Arc::new(AsyncMutex::new(Some(child))),
            stop_requested: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Suspends until the child exits. A signal-termination is reported as
    /// `-signo`. Cancel-safe: if dropped, the child keeps running — call
    /// `stop`/`worker_shutdown_stop` explicitly to terminate it.
    pub async fn wait(&self) -> i32 {
        let mut guard = self.child.lock().await;
        let Some(child) = guard.as_mut() else {
            return -1; // already reaped by a previous wait()
        };
        let status = match child.wait().await {
            Ok(status) => status,
            Err(err) => {
                tracing::warn!(pid = self.pid, error = %err, "failed to wait on task process");
                *guard = None;
                return -1;
            }
        };
        *guard = None;

        if let Some(code) = status.code() {
            code
        } else if let Some(signal) = status.signal() {
            -signal
        } else {
            -1
        }
    }

    /// Sends SIGTERM to the process group, then SIGKILL after the grace
    /// window if the child hasn't exited. Idempotent — only the first call
    /// sends any signal.
    pub fn worker_shutdown_stop(&self) {
        self.stop_inner();
    }

    /// Used by the Reclaim Loop on lease loss (§4.2 step 4). Same behavior
    /// as `worker_shutdown_stop`; kept as a distinct name to match the
    /// caller's intent at call sites.
    pub fn stop(&self) {
        self.stop_inner();
    }

    fn stop_inner(&self) {
        if self.stop_requested.swap(true, Ordering::SeqCst) {
            return;
        }

        let pgid = Pid::from_raw(self.pid as i32);
        if let Err(err) = killpg(pgid, Signal::SIGTERM) {
            tracing::debug!(pid = self.pid, error = %err, "SIGTERM to process group failed");
            return;
        }
        tracing::info!(pid = self.pid, "sent SIGTERM to task process group");

        let pid = self.pid;
        tokio::spawn(async move {
            tokio::time::sleep(KILL_GRACE).await;
            let pgid = Pid::from_raw(pid as i32);
            if let Err(err) = killpg(pgid, Signal::SIGKILL) {
                tracing::debug!(pid, error = %err, "SIGKILL to process group failed (already exited)");
            } else {
                tracing::warn!(pid, "task process did not exit within grace window, sent SIGKILL");
            }
        });
    }
}
