// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shutdown Coordinator (C5): owns the process signal handlers and decides
//! whether a drain should cancel the in-flight task or let it finish.

use tokio::signal::unix::{signal, Signal, SignalKind};

/// What the main loop should do once it observes a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainReason {
    /// SIGTERM: cancel whatever the Controller is doing, then drain.
    CancelAndDrain,
    /// SIGUSR1: let the in-flight task finish, then drain.
    DrainOnly,
}

/// Installs SIGTERM/SIGUSR1 handlers once at startup. The Coordinator never
/// touches the Queue directly — it only ever reports which kind of drain was
/// requested.
pub struct ShutdownCoordinator {
    sigterm: Signal,
    sigusr1: Signal,
}

impl ShutdownCoordinator {
    pub fn install() -> std::io::Result<Self> {
        Ok(Self {
            sigterm: signal(SignalKind::terminate())?,
            sigusr1: signal(SignalKind::user_defined1())?,
        })
    }

    /// Waits for the next signal. Callers are expected to loop on this so
    /// re-entrant delivery during an already-draining shutdown is a no-op
    /// rather than a panic or a second, conflicting drain decision.
    pub async fn wait(&mut self) -> DrainReason {
        tokio::select! {
            _ = self.sigterm.recv() => DrainReason::CancelAndDrain,
            _ = self.sigusr1.recv() => DrainReason::DrainOnly,
        }
    }
}
