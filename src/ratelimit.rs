// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Client-side token buckets gating read and write calls to OCI.

use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use tracing::info;

use crate::config::RateLimiterConfig;
use crate::constants::rate_limit::{BUCKET_DEFAULT, QPS_DEFAULT};

#[derive(Debug)]
struct BucketState {
    tokens: f64,
    last: Instant,
}

/// A token bucket refilled continuously at `qps`, holding at most `burst` tokens.
/// A disabled bucket admits every call.
#[derive(Debug, Clone)]
pub struct TokenBucket {
    qps: f64,
    burst: f64,
    state: Option<Arc<Mutex<BucketState>>>,
}

impl TokenBucket {
    pub fn new(qps: f32, burst: u32) -> Self {
        Self {
            qps: f64::from(qps),
            burst: f64::from(burst),
            state: Some(Arc::new(Mutex::new(BucketState {
                tokens: f64::from(burst),
                last: Instant::now(),
            }))),
        }
    }

    pub fn always_accept() -> Self {
        Self {
            qps: 0.0,
            burst: 0.0,
            state: None,
        }
    }

    /// Take a token if one is available, without waiting.
    pub fn try_accept(&self) -> bool {
        let Some(state) = &self.state else {
            return true;
        };
        let mut state = state.lock();
        let now = Instant::now();
        let elapsed = now.duration_since(state.last).as_secs_f64();
        state.tokens = (state.tokens + elapsed * self.qps).min(self.burst);
        state.last = now;
        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// Separate buckets for reads and writes.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    pub reader: TokenBucket,
    pub writer: TokenBucket,
}

impl RateLimiter {
    /// Build the limiter from config, substituting defaults for zero values.
    pub fn new(config: Option<&RateLimiterConfig>) -> Self {
        let mut config = config.cloned().unwrap_or_default();

        if config.disable_rate_limiter {
            info!("Cloud Provider OCI rateLimiter is disabled");
            return Self::disabled();
        }

        if config.rate_limit_qps_read == 0.0 {
            config.rate_limit_qps_read = QPS_DEFAULT;
        }
        if config.rate_limit_bucket_read == 0 {
            config.rate_limit_bucket_read = BUCKET_DEFAULT;
        }
        if config.rate_limit_qps_write == 0.0 {
            config.rate_limit_qps_write = QPS_DEFAULT;
        }
        if config.rate_limit_bucket_write == 0 {
            config.rate_limit_bucket_write = BUCKET_DEFAULT;
        }

        info!(
            "OCI using read rate limit configuration: QPS={}, bucket={}",
            config.rate_limit_qps_read, config.rate_limit_bucket_read
        );
        info!(
            "OCI using write rate limit configuration: QPS={}, bucket={}",
            config.rate_limit_qps_write, config.rate_limit_bucket_write
        );

        Self {
            reader: TokenBucket::new(config.rate_limit_qps_read, config.rate_limit_bucket_read),
            writer: TokenBucket::new(config.rate_limit_qps_write, config.rate_limit_bucket_write),
        }
    }

    pub fn disabled() -> Self {
        Self {
            reader: TokenBucket::always_accept(),
            writer: TokenBucket::always_accept(),
        }
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(None)
    }
}
