// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task claim and task document types (§3 Data Model).

use crate::ids::{RunId, TaskId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Opaque credential bag returned by `claimWork`/`reclaimTask`. The
/// Controller never inspects its contents, only passes it back on
/// subsequent Queue calls for the same run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials(HashMap<String, String>);

impl Credentials {
    pub fn new(fields: HashMap<String, String>) -> Self {
        Self(fields)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }
}

/// A structured task record (§3). Treated as immutable once claimed; the
/// Controller reads `payload.env` and `scopes` but never mutates it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDocument {
    pub payload: TaskPayload,
    #[serde(default)]
    pub extra: Option<serde_json::Value>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
    #[serde(default)]
    pub scopes: Vec<String>,
    pub scheduler_id: String,
    pub worker_type: String,
    #[serde(default)]
    pub dependencies: Vec<TaskId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct TaskPayload {
    #[serde(default)]
    pub env: HashMap<String, String>,
}

/// Server-side run metadata returned alongside a claim; opaque to the
/// Controller beyond its presence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct RunStatus {
    #[serde(flatten)]
    pub fields: HashMap<String, serde_json::Value>,
}

/// An accepted lease on one run of one task (§3). Once accepted, every
/// subsequent Queue call for this run must use `credentials` and
/// `(task_id, run_id)` — mixing claims is a bug the type system can't
/// catch on its own, so callers must hold at most one `TaskClaim` live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskClaim {
    pub task_id: TaskId,
    pub run_id: RunId,
    pub credentials: Credentials,
    pub task: TaskDocument,
    pub status: RunStatus,
}

impl TaskClaim {
    /// Replaces credentials in place, as the Reclaim Loop does on a
    /// successful `reclaimTask` call. No other field changes.
    pub fn swap_credentials(&mut self, credentials: Credentials) {
        self.credentials = credentials;
    }
}

#[cfg(any(test, feature = "test-support"))]
impl TaskClaim {
    pub fn test_fixture(task_id: &str, run_id: u32) -> Self {
        Self {
            task_id: TaskId::from(task_id),
            run_id: RunId::new(run_id),
            credentials: Credentials::new(HashMap::new()),
            task: TaskDocument {
                payload: TaskPayload::default(),
                extra: None,
                metadata: None,
                scopes: Vec::new(),
                scheduler_id: "test-scheduler".into(),
                worker_type: "test-worker".into(),
                dependencies: Vec::new(),
            },
            status: RunStatus::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn swap_credentials_replaces_only_that_field() {
        let mut claim = TaskClaim::test_fixture("abc", 0);
        let original_task = claim.task.clone();
        let mut fields = HashMap::new();
        fields.insert("clientId".to_string(), "new-client".to_string());
        claim.swap_credentials(Credentials::new(fields));
        assert_eq!(claim.credentials.get("clientId"), Some("new-client"));
        assert_eq!(claim.task, original_task);
    }

    #[test]
    fn task_document_deserializes_minimal_json() {
        let json = r#"{
            "payload": {"env": {"FOO": "bar"}},
            "scopes": ["queue:get-artifact:*"],
            "schedulerId": "sched-1",
            "workerType": "worker-1"
        }"#;
        let doc: TaskDocument = serde_json::from_str(json).unwrap();
        assert_eq!(doc.payload.env.get("FOO").unwrap(), "bar");
        assert_eq!(doc.scheduler_id, "sched-1");
        assert!(doc.dependencies.is_empty());
    }
}
