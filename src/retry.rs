// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Retry policy attached to every OCI call through [`RequestMetadata`].
//!
//! An operation is retried only when the error classifier reports it as
//! retryable. Rate limiter denials are never retried here; the caller decides.

use std::future::Future;
use std::time::Duration;

use tracing::debug;

use crate::error::Result;

const DEFAULT_MAX_ATTEMPTS: u32 = 2;

/// Bounded retry with exponential spacing of 1s, 2s, 4s, ...
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
}

impl RetryPolicy {
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
        }
    }

    /// Delay before the attempt following `attempt` (1-based).
    pub fn next_duration(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        Duration::from_secs(2u64.pow(exp))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::with_max_attempts(DEFAULT_MAX_ATTEMPTS)
    }
}

/// Metadata shared by every request the client issues.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequestMetadata {
    pub retry_policy: RetryPolicy,
}

impl RequestMetadata {
    pub fn new(retry_policy: RetryPolicy) -> Self {
        Self { retry_policy }
    }
}

/// Run `operation` until it succeeds, fails with a non-retryable error, or
/// exhausts the policy.
pub async fn retry_with_policy<T, F, Fut>(policy: &RetryPolicy, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 1;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < policy.max_attempts && e.is_retryable() => {
                let delay = policy.next_duration(attempt);
                debug!(
                    "Retryable error on attempt {}/{}: {}, retrying in {:?}",
                    attempt, policy.max_attempts, e, delay
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
