// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Terminal Status Mapper (C4): a pure, total function from an exit code
//! (plus the shutdown flag and config) to the Queue verb the Controller
//! must issue. Duplicate-call prevention is the Controller's job, not this
//! mapper's — see §4.4.

use taskrunner_core::{Config, ExceptionReason, TerminalStatus};

/// The literal line written to the live log for a SIGSEGV exit, preserved
/// verbatim for compatibility with existing log consumers.
pub const AUTOMATION_ERROR_SIGSEGV_LINE: &str = "Automation Error: python exited with signal -11\n";

/// The result of mapping one exit code: the report to issue, plus an
/// optional line that must be appended to the live log first (only ever
/// set for the SIGSEGV case). Keeping the log write here as data, rather
/// than performing it inline, is what keeps this function pure.
pub struct MappedStatus {
    pub status: TerminalStatus,
    pub live_log_line: Option<&'static str>,
}

/// Maps `(exit_code, shutdown_flag, config)` to a terminal status (§4.4).
pub fn map_exit(exit_code: i32, shutdown_flag: bool, config: &Config) -> MappedStatus {
    if shutdown_flag {
        return MappedStatus {
            status: TerminalStatus::Exception(ExceptionReason::WorkerShutdown),
            live_log_line: None,
        };
    }

    match exit_code {
        0 => MappedStatus { status: TerminalStatus::Completed, live_log_line: None },
        1 => MappedStatus { status: TerminalStatus::Failed, live_log_line: None },
        // Legacy convention: exit code 2 has historically meant worker-shutdown.
        // Kept as-is for compatibility rather than "fixed" — see DESIGN.md.
        2 => MappedStatus {
            status: TerminalStatus::Exception(ExceptionReason::WorkerShutdown),
            live_log_line: None,
        },
        -11 => MappedStatus {
            status: TerminalStatus::Exception(ExceptionReason::MalformedPayload),
            live_log_line: Some(AUTOMATION_ERROR_SIGSEGV_LINE),
        },
        other => {
            if let Some(reason) = config.reversed_statuses.get(&other) {
                MappedStatus {
                    status: TerminalStatus::Exception(ExceptionReason::from_config_str(reason)),
                    live_log_line: None,
                }
            } else {
                MappedStatus { status: TerminalStatus::Failed, live_log_line: None }
            }
        }
    }
}

/// Maps a watchdog timeout (§4.1, §4.3) directly to `task_max_timeout_status`,
/// reusing the same rules as an ordinary exit code.
pub fn map_timeout(config: &Config) -> MappedStatus {
    map_exit(config.task_max_timeout_status, false, config)
}
