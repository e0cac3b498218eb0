// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Chain-of-Trust verification adapter.
//!
//! The cryptographic internals of provenance verification are out of scope
//! for this core; callers depend only on [`ChainOfTrustVerifier`].

use async_trait::async_trait;
use taskrunner_core::TaskClaim;
use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum CotError {
    /// The chain failed to verify — maps to `malformed-payload` at report time.
    #[error("chain of trust rejected: {0}")]
    Rejected(String),

    /// A transport-class failure fetching artifacts needed to verify the
    /// chain — maps to `intermittent-task` at report time.
    #[error("transient error verifying chain of trust: {0}")]
    Transient(String),
}

#[async_trait]
pub trait ChainOfTrustVerifier: Send + Sync + 'static {
    async fn verify(&self, claim: &TaskClaim) -> Result<(), CotError>;
}

/// Real verification is an external integration seam; this placeholder
/// rejects unconditionally so a misconfigured build fails loudly rather
/// than silently skipping verification.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaceholderChainOfTrustVerifier;

#[async_trait]
impl ChainOfTrustVerifier for PlaceholderChainOfTrustVerifier {
    async fn verify(&self, _claim: &TaskClaim) -> Result<(), CotError> {
        Err(CotError::Rejected(
            "chain of trust verification has no production implementation in this build".into(),
        ))
    }
}

#[cfg(any(test, feature = "test-support"))]
mod fake {
    use super::{ChainOfTrustVerifier, CotError};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::sync::Arc;
    use taskrunner_core::TaskClaim;

    #[derive(Clone, Debug, PartialEq)]
    enum Verdict {
        Accept,
        Reject(String),
        Transient(String),
    }

    struct FakeState {
        verdict: Verdict,
        calls: Vec<String>,
    }

    /// Scriptable Chain-of-Trust verifier for tests. Defaults to accepting
    /// every claim; call `reject`/`transient_error` to script a failure.
    #[derive(Clone)]
    pub struct FakeChainOfTrustVerifier {
        inner: Arc<Mutex<FakeState>>,
    }

    impl Default for FakeChainOfTrustVerifier {
        fn default() -> Self {
            Self { inner: Arc::new(Mutex::new(FakeState { verdict: Verdict::Accept, calls: vec![] })) }
        }
    }

    impl FakeChainOfTrustVerifier {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn reject(&self, reason: impl Into<String>) {
            self.inner.lock().verdict = Verdict::Reject(reason.into());
        }

        pub fn transient_error(&self, reason: impl Into<String>) {
            self.inner.lock().verdict = Verdict::Transient(reason.into());
        }

        pub fn calls(&self) -> Vec<String> {
            self.inner.lock().calls.clone()
        }
    }

    #[async_trait]
    impl ChainOfTrustVerifier for FakeChainOfTrustVerifier {
        async fn verify(&self, claim: &TaskClaim) -> Result<(), CotError> {
            let mut state = self.inner.lock();
            state.calls.push(claim.task_id.to_string());
            match state.verdict.clone() {
                Verdict::Accept => Ok(()),
                Verdict::Reject(reason) => Err(CotError::Rejected(reason)),
                Verdict::Transient(reason) => Err(CotError::Transient(reason)),
            }
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeChainOfTrustVerifier;
