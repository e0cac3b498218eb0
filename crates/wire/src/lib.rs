// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! taskrunner-wire: the Queue RPC surface (`QueueClient`) and its DTOs.
//!
//! This crate defines the interface only; concrete and fake implementations
//! live in `taskrunner-adapters`.

mod client;

pub use client::{Claim, ExceptionReport, QueueClient, QueueError};

#[cfg(test)]
mod tests {
    use super::*;
    use taskrunner_core::{Credentials, RunId, TaskDocument, TaskId, TaskPayload};
    use std::collections::HashMap;

    #[test]
    fn claim_converts_into_task_claim_preserving_fields() {
        let claim = Claim {
            task_id: TaskId::from("t-1"),
            run_id: RunId::new(0),
            credentials: Credentials::new(HashMap::new()),
            task: TaskDocument {
                payload: TaskPayload::default(),
                extra: None,
                metadata: None,
                scopes: vec![],
                scheduler_id: "s".into(),
                worker_type: "w".into(),
                dependencies: vec![],
            },
        };
        let task_claim: taskrunner_core::TaskClaim = claim.clone().into();
        assert_eq!(task_claim.task_id, claim.task_id);
        assert_eq!(task_claim.run_id, claim.run_id);
    }
}
