// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Artifact uploader adapter.
//!
//! Storage/transport internals are out of scope for this core; callers
//! depend only on [`ArtifactUploader`] over an ordered file list.

use async_trait::async_trait;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum UploadError {
    /// Network-class failure — maps to `intermittent-task` at report time.
    #[error("transient upload error: {0}")]
    Transient(String),

    /// Any other upload failure — maps to the caller-supplied exit code
    /// per §4.3 (`ScriptWorkerException.exit_code`).
    #[error("upload failed: {0}")]
    Other(String),
}

#[async_trait]
pub trait ArtifactUploader: Send + Sync + 'static {
    /// Uploads the given files, in order. `files` already includes the
    /// live-log path alongside any task-produced artifacts (§4.3).
    async fn upload(&self, files: &[PathBuf]) -> Result<(), UploadError>;
}

/// Real uploading is an external integration seam; this placeholder always
/// fails so a misconfigured build surfaces the gap instead of silently
/// discarding artifacts.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaceholderArtifactUploader;

#[async_trait]
impl ArtifactUploader for PlaceholderArtifactUploader {
    async fn upload(&self, _files: &[PathBuf]) -> Result<(), UploadError> {
        Err(UploadError::Other(
            "artifact upload has no production implementation in this build".into(),
        ))
    }
}

#[cfg(any(test, feature = "test-support"))]
mod fake {
    use super::{ArtifactUploader, UploadError};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::path::PathBuf;
    use std::sync::Arc;

    #[derive(Clone, Debug)]
    enum Verdict {
        Accept,
        Transient(String),
        Other(String),
    }

    struct FakeState {
        verdict: Verdict,
        uploaded: Vec<Vec<PathBuf>>,
    }

    /// Scriptable uploader for tests. Defaults to accepting every upload
    /// and recording the file list it was given.
    #[derive(Clone)]
    pub struct FakeArtifactUploader {
        inner: Arc<Mutex<FakeState>>,
    }

    impl Default for FakeArtifactUploader {
        fn default() -> Self {
            Self {
                inner: Arc::new(Mutex::new(FakeState { verdict: Verdict::Accept, uploaded: vec![] })),
            }
        }
    }

    impl FakeArtifactUploader {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn fail_transient(&self, reason: impl Into<String>) {
            self.inner.lock().verdict = Verdict::Transient(reason.into());
        }

        pub fn fail_other(&self, reason: impl Into<String>) {
            self.inner.lock().verdict = Verdict::Other(reason.into());
        }

        pub fn uploads(&self) -> Vec<Vec<PathBuf>> {
            self.inner.lock().uploaded.clone()
        }
    }

    #[async_trait]
    impl ArtifactUploader for FakeArtifactUploader {
        async fn upload(&self, files: &[PathBuf]) -> Result<(), UploadError> {
            let mut state = self.inner.lock();
            state.uploaded.push(files.to_vec());
            match state.verdict.clone() {
                Verdict::Accept => Ok(()),
                Verdict::Transient(reason) => Err(UploadError::Transient(reason)),
                Verdict::Other(reason) => Err(UploadError::Other(reason)),
            }
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeArtifactUploader;

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fake_uploader_records_file_lists() {
        let uploader = FakeArtifactUploader::new();
        let files = vec![PathBuf::from("/work/live_backing.log")];
        uploader.upload(&files).await.unwrap();
        assert_eq!(uploader.uploads(), vec![files]);
    }

    #[tokio::test]
    async fn fake_uploader_can_be_scripted_to_fail_transient() {
        let uploader = FakeArtifactUploader::new();
        uploader.fail_transient("connection reset");
        let err = uploader.upload(&[]).await.unwrap_err();
        assert!(matches!(err, UploadError::Transient(_)));
    }
}
