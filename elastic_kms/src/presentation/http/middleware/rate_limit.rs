// /////////////////////////////////////////////////////////////////////////////
// Elastic KMS
// Copyright (c) 2025 Elastic KMS Contributors
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Per-IP Rate Limiting
//!
//! Token bucket per client IP: capacity and refill rate both equal the
//! configured requests-per-second. Buckets live in a concurrent map and a
//! background sweeper drops entries idle for more than ten minutes.

use std::net::IpAddr;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::{Request, State};
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use dashmap::DashMap;
use elastic_kms_bootstrap::CancellationToken;
use elastic_kms_domain::KmsError;
use governor::clock::{Clock, DefaultClock};
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};

use crate::presentation::http::error::ApiError;
use crate::presentation::http::state::RequestContext;

/// Buckets idle longer than this are swept.
pub const BUCKET_IDLE_MAX: Duration = Duration::from_secs(600);

struct IpBucket {
    limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
    last_access: Instant,
}

impl IpBucket {
    fn new(per_second: NonZeroU32) -> Self {
        Self {
            limiter: RateLimiter::direct(Quota::per_second(per_second)),
            last_access: Instant::now(),
        }
    }

    fn check(&mut self) -> Result<(), Duration> {
        self.last_access = Instant::now();
        match self.limiter.check() {
            Ok(_) => Ok(()),
            Err(not_until) => Err(not_until.wait_time_from(DefaultClock::default().now())),
        }
    }
}

/// Shared limiter state for both public contexts.
pub struct RateLimitState {
    buckets: DashMap<IpAddr, IpBucket>,
    per_second: NonZeroU32,
}

impl RateLimitState {
    pub fn new(per_second: u32) -> Result<Self, KmsError> {
        let per_second = NonZeroU32::new(per_second)
            .ok_or_else(|| KmsError::validation("rate_limit_per_ip_per_sec must be at least 1"))?;
        Ok(Self {
            buckets: DashMap::new(),
            per_second,
        })
    }

    /// `Err` carries the suggested wait.
    pub fn check(&self, ip: IpAddr) -> Result<(), Duration> {
        let mut bucket = self
            .buckets
            .entry(ip)
            .or_insert_with(|| IpBucket::new(self.per_second));
        bucket.check()
    }

    pub fn cleanup(&self, max_age: Duration) {
        let now = Instant::now();
        self.buckets
            .retain(|_, bucket| now.duration_since(bucket.last_access) <= max_age);
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }
}

pub async fn rate_limit(
    State(state): State<Arc<RateLimitState>>,
    request: Request,
    next: Next,
) -> Response {
    let ip = request
        .extensions()
        .get::<RequestContext>()
        .map(|ctx| ctx.client_ip)
        .unwrap_or_else(|| super::client_ip(&request));

    match state.check(ip) {
        Ok(()) => next.run(request).await,
        Err(wait) => {
            let retry_secs = wait.as_secs().max(1);
            tracing::warn!(client_ip = %ip, retry_after_secs = retry_secs, "rate limit exceeded");
            let mut response =
                ApiError(KmsError::RateLimited("too many requests from this IP".into())).into_response();
            if let Ok(value) = HeaderValue::from_str(&retry_secs.to_string()) {
                response.headers_mut().insert("retry-after", value);
            }
            response
        }
    }
}

/// Background task dropping idle buckets until shutdown.
pub async fn sweeper_task(state: Arc<RateLimitState>, token: CancellationToken) {
    let mut interval = tokio::time::interval(Duration::from_secs(60));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = interval.tick() => state.cleanup(BUCKET_IDLE_MAX),
        }
    }
}
