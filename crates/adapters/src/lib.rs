// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! taskrunner-adapters: concrete and fake implementations of the external
//! collaborator traits defined in `taskrunner-wire` and here — the Queue
//! client, Chain-of-Trust verifier, and artifact uploader.

pub mod cot;
pub mod queue;
pub mod upload;

pub use cot::{ChainOfTrustVerifier, CotError, PlaceholderChainOfTrustVerifier};
pub use queue::PlaceholderQueueClient;
pub use upload::{ArtifactUploader, PlaceholderArtifactUploader, UploadError};

#[cfg(any(test, feature = "test-support"))]
pub use cot::FakeChainOfTrustVerifier;
#[cfg(any(test, feature = "test-support"))]
pub use queue::{FakeQueueClient, ReportCall};
#[cfg(any(test, feature = "test-support"))]
pub use upload::FakeArtifactUploader;
