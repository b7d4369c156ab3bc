// /////////////////////////////////////////////////////////////////////////////
// Elastic KMS
// Copyright (c) 2025 Elastic KMS Contributors
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Middleware Pipeline
//!
//! The observable order on the public contexts is fixed:
//! panic-recover → request-id → access log → tracing span → IP allowlist
//! → rate limit → cache-control → validator (in the extractors). The
//! browser context appends CORS → security headers → CSRF; the admin
//! plane runs only panic-recover → request-id → access log.

mod csrf;
mod ip_allowlist;
mod rate_limit;
mod security;

pub use csrf::{csrf_guard, issue_csrf_token, CsrfState};
pub use ip_allowlist::{ip_allowlist, IpAllowlist};
pub use rate_limit::{rate_limit, sweeper_task, RateLimitState};
pub use security::{build_cors_layer, security_headers};

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::{ConnectInfo, Request, State};
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use elastic_kms_domain::KmsError;
use uuid::Uuid;

use crate::infrastructure::metrics::KmsMetrics;
use crate::presentation::http::error::ApiError;
use crate::presentation::http::state::{ContextKind, RequestContext};

/// Stamps the per-request context for the public listener; the surface is
/// recognized from the path prefix.
pub async fn public_request_context(request: Request, next: Next) -> Response {
    let kind = if request.uri().path().starts_with("/browser/") {
        ContextKind::Browser
    } else {
        ContextKind::Service
    };
    stamp_context(request, next, kind).await
}

/// Stamps the per-request context for the admin listener.
pub async fn admin_request_context(request: Request, next: Next) -> Response {
    stamp_context(request, next, ContextKind::Admin).await
}

async fn stamp_context(mut request: Request, next: Next, kind: ContextKind) -> Response {
    let context = RequestContext {
        request_id: Uuid::new_v4().to_string(),
        client_ip: client_ip(&request),
        context_kind: kind,
        started_at: Instant::now(),
    };
    request.extensions_mut().insert(context.clone());

    let mut response = next.run(request).await;
    if let Ok(value) = HeaderValue::from_str(&context.request_id) {
        response.headers_mut().insert("x-request-id", value);
    }
    response
}

/// Access log line per request, keyed by request id.
pub async fn access_log(
    State(metrics): State<Arc<KmsMetrics>>,
    request: Request,
    next: Next,
) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let context = request.extensions().get::<RequestContext>().cloned();

    let response = next.run(request).await;

    let status = response.status().as_u16();
    let (request_id, client_ip, kind, elapsed_ms) = match &context {
        Some(ctx) => (
            ctx.request_id.as_str(),
            ctx.client_ip.to_string(),
            ctx.context_kind.as_str(),
            ctx.started_at.elapsed().as_millis() as u64,
        ),
        None => ("", String::new(), "unknown", 0),
    };
    metrics.record_request(kind, status);
    tracing::info!(
        request_id,
        context = kind,
        client_ip = %client_ip,
        method = %method,
        path = %path,
        status,
        elapsed_ms,
        "request"
    );
    response
}

/// API responses must never be cached.
pub async fn cache_control(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    response
        .headers_mut()
        .insert("cache-control", HeaderValue::from_static("no-store"));
    response
}

/// Per-request deadline; expiry maps to the `timeout` error kind (504).
pub async fn request_timeout(
    State(deadline): State<Duration>,
    request: Request,
    next: Next,
) -> Response {
    match tokio::time::timeout(deadline, next.run(request)).await {
        Ok(response) => response,
        Err(_) => ApiError(KmsError::timeout("request exceeded the configured deadline")).into_response(),
    }
}

/// Best-effort client IP: forwarded headers first, then the socket.
pub(crate) fn client_ip(request: &Request) -> IpAddr {
    if let Some(forwarded) = request.headers().get("x-forwarded-for") {
        if let Ok(forwarded) = forwarded.to_str() {
            if let Some(first) = forwarded.split(',').next() {
                if let Ok(ip) = first.trim().parse::<IpAddr>() {
                    return ip;
                }
            }
        }
    }
    if let Some(real_ip) = request.headers().get("x-real-ip") {
        if let Ok(real_ip) = real_ip.to_str() {
            if let Ok(ip) = real_ip.parse::<IpAddr>() {
                return ip;
            }
        }
    }
    if let Some(ConnectInfo(addr)) = request.extensions().get::<ConnectInfo<SocketAddr>>() {
        return addr.ip();
    }
    IpAddr::from([127, 0, 0, 1])
}
