// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker configuration: load, validate, and type the on-disk TOML file (C7).

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

fn default_poll_interval() -> u64 {
    5
}

/// Validated worker configuration. Every field here is consumed directly by
/// the Worker Context (C6), the Controller (C3), or the status mapper (C4).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub worker_id: String,
    pub worker_group: String,
    pub worker_type: String,

    pub work_dir: PathBuf,
    pub log_dir: PathBuf,

    #[serde(default = "default_poll_interval")]
    pub poll_interval: u64,
    pub reclaim_interval: u64,

    pub task_max_timeout: u64,
    pub task_max_timeout_status: i32,

    #[serde(default)]
    pub reversed_statuses: HashMap<i32, String>,

    #[serde(default)]
    pub verify_chain_of_trust: bool,

    pub task_script: Vec<String>,

    pub taskcluster_root_url: String,
}

impl Config {
    /// Loads, parses, and validates a config file. Directory creation
    /// (`work_dir`/`log_dir`) happens here too, as §4.7 specifies it's part
    /// of load-time validation, not a separate step.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let path_str = path.display().to_string();

        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path_str.clone(),
            source,
        })?;

        let config: Config = toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path_str.clone(),
            source,
        })?;

        config.validate()?;
        config.ensure_directories()?;

        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.task_script.is_empty() {
            return Err(ConfigError::Invalid("task_script must not be empty".into()));
        }
        if self.poll_interval == 0 {
            return Err(ConfigError::Invalid("poll_interval must be > 0".into()));
        }
        if self.reclaim_interval == 0 {
            return Err(ConfigError::Invalid("reclaim_interval must be > 0".into()));
        }
        if self.task_max_timeout == 0 {
            return Err(ConfigError::Invalid("task_max_timeout must be > 0".into()));
        }
        for reserved in [0, 1, 2] {
            if self.reversed_statuses.contains_key(&reserved) {
                return Err(ConfigError::Invalid(format!(
                    "reversed_statuses must not override reserved exit code {reserved}"
                )));
            }
        }
        Ok(())
    }

    fn ensure_directories(&self) -> Result<(), ConfigError> {
        for dir in [&self.work_dir, &self.log_dir] {
            std::fs::create_dir_all(dir).map_err(|source| ConfigError::CreateDir {
                path: dir.display().to_string(),
                source,
            })?;
        }
        Ok(())
    }
}

#[cfg(any(test, feature = "test-support"))]
impl Config {
    pub fn test_fixture(work_dir: impl Into<PathBuf>, log_dir: impl Into<PathBuf>) -> Self {
        Self {
            worker_id: "test-worker".into(),
            worker_group: "test-group".into(),
            worker_type: "test-worker-type".into(),
            work_dir: work_dir.into(),
            log_dir: log_dir.into(),
            poll_interval: 1,
            reclaim_interval: 30,
            task_max_timeout: 600,
            task_max_timeout_status: 124,
            reversed_statuses: HashMap::new(),
            verify_chain_of_trust: false,
            task_script: vec!["true".to_string()],
            taskcluster_root_url: "https://tc.example.test".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write_toml(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("worker.toml");
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn missing_task_script_fails_validation() {
        let tmp = tempdir().unwrap();
        let path = write_toml(
            tmp.path(),
            &format!(
                r#"
worker_id = "w"
worker_group = "g"
worker_type = "t"
work_dir = "{wd}"
log_dir = "{ld}"
reclaim_interval = 30
task_max_timeout = 600
task_max_timeout_status = 124
taskcluster_root_url = "https://tc.example.test"
task_script = []
"#,
                wd = tmp.path().join("work").display(),
                ld = tmp.path().join("log").display(),
            ),
        );
        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn reversed_status_shadowing_reserved_code_fails_validation() {
        let tmp = tempdir().unwrap();
        let path = write_toml(
            tmp.path(),
            &format!(
                r#"
worker_id = "w"
worker_group = "g"
worker_type = "t"
work_dir = "{wd}"
log_dir = "{ld}"
reclaim_interval = 30
task_max_timeout = 600
task_max_timeout_status = 124
taskcluster_root_url = "https://tc.example.test"
task_script = ["bash", "-c", "exit 0"]

[reversed_statuses]
1 = "intermittent-task"
"#,
                wd = tmp.path().join("work").display(),
                ld = tmp.path().join("log").display(),
            ),
        );
        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn well_formed_config_round_trips_through_toml() {
        let tmp = tempdir().unwrap();
        let config = Config::test_fixture(tmp.path().join("work"), tmp.path().join("log"));
        let serialized = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&serialized).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn load_creates_missing_work_and_log_dirs() {
        let tmp = tempdir().unwrap();
        let work_dir = tmp.path().join("nested").join("work");
        let log_dir = tmp.path().join("nested").join("log");
        let path = write_toml(
            tmp.path(),
            &format!(
                r#"
worker_id = "w"
worker_group = "g"
worker_type = "t"
work_dir = "{wd}"
log_dir = "{ld}"
reclaim_interval = 30
task_max_timeout = 600
task_max_timeout_status = 124
taskcluster_root_url = "https://tc.example.test"
task_script = ["bash", "-c", "exit 0"]
"#,
                wd = work_dir.display(),
                ld = log_dir.display(),
            ),
        );
        Config::load(&path).unwrap();
        assert!(work_dir.is_dir());
        assert!(log_dir.is_dir());
    }
}
