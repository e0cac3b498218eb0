// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Terminal status tokens produced by the status mapper (C4).

/// Reason code attached to `reportException`. Open-ended: config-supplied
/// `reversed_statuses` entries carry arbitrary reason strings, so this isn't
/// a closed enum at the wire boundary, but the well-known reasons get names.
/// Converts to/from the plain string the Queue actually transports via
/// `Display`/`from_config_str`, rather than deriving `serde` directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExceptionReason {
    WorkerShutdown,
    IntermittentTask,
    MalformedPayload,
    Superseded,
    InternalError,
    /// A reason string from `config.reversed_statuses` that isn't one of the
    /// well-known ones above.
    Other(String),
}

impl std::fmt::Display for ExceptionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ExceptionReason::WorkerShutdown => "worker-shutdown",
            ExceptionReason::IntermittentTask => "intermittent-task",
            ExceptionReason::MalformedPayload => "malformed-payload",
            ExceptionReason::Superseded => "superseded",
            ExceptionReason::InternalError => "internal-error",
            ExceptionReason::Other(s) => s,
        })
    }
}

impl ExceptionReason {
    /// Parses a reason string coming out of `config.reversed_statuses`,
    /// recognizing the well-known spellings and falling back to `Other`.
    pub fn from_config_str(s: &str) -> Self {
        match s {
            "worker-shutdown" => Self::WorkerShutdown,
            "intermittent-task" => Self::IntermittentTask,
            "malformed-payload" => Self::MalformedPayload,
            "superseded" => Self::Superseded,
            "internal-error" => Self::InternalError,
            other => Self::Other(other.to_owned()),
        }
    }
}

/// The terminal verb the Controller will issue against the Queue for a run.
/// Produced once per accepted claim (§3 invariant: exactly one report call).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminalStatus {
    Completed,
    Failed,
    Exception(ExceptionReason),
}

impl TerminalStatus {
    pub fn reason(&self) -> Option<&ExceptionReason> {
        match self {
            TerminalStatus::Exception(reason) => Some(reason),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_reversed_status_reason_is_preserved_verbatim() {
        let reason = ExceptionReason::from_config_str("custom-reason");
        assert_eq!(reason.to_string(), "custom-reason");
    }

    #[test]
    fn well_known_reason_strings_round_trip() {
        for (s, expected) in [
            ("worker-shutdown", ExceptionReason::WorkerShutdown),
            ("intermittent-task", ExceptionReason::IntermittentTask),
            ("malformed-payload", ExceptionReason::MalformedPayload),
        ] {
            assert_eq!(ExceptionReason::from_config_str(s), expected);
            assert_eq!(expected.to_string(), s);
        }
    }
}
