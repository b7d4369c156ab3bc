// /////////////////////////////////////////////////////////////////////////////
// Elastic KMS
// Copyright (c) 2025 Elastic KMS Contributors
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Routers
//!
//! Both public contexts expose the same operations; they differ only in
//! middleware. Layer composition reads outermost-first inside each
//! `ServiceBuilder`, matching the contract order: panic-recover →
//! request-id → (envelope) → access log → tracing span → IP allowlist →
//! rate limit → cache-control → deadline; the browser sub-router then
//! appends CORS → security headers → CSRF before its handlers.

use std::sync::Arc;

use axum::middleware::{from_fn, from_fn_with_state};
use axum::routing::{get, post};
use axum::Router;
use elastic_kms_bootstrap::KmsConfig;
use elastic_kms_domain::KmsError;
use tower::ServiceBuilder;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;

use super::error::error_envelope;
use super::handlers::{self, admin, crypto, elastic_keys, material_keys};
use super::middleware::{
    access_log, admin_request_context, build_cors_layer, cache_control, csrf_guard, ip_allowlist,
    public_request_context, rate_limit, request_timeout, security_headers, IpAllowlist,
    RateLimitState,
};
use super::state::AppState;

/// The business operations shared by both public contexts.
fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/elastickey", post(elastic_keys::create))
        .route(
            "/elastickey/:id",
            get(elastic_keys::get).put(elastic_keys::update).delete(elastic_keys::delete),
        )
        .route("/elastickeys", get(elastic_keys::list))
        .route("/materialkey", post(material_keys::import))
        .route(
            "/materialkey/:id",
            get(material_keys::get).put(material_keys::update).delete(material_keys::delete),
        )
        .route("/materialkeys", get(material_keys::list))
        .route("/crypto/encrypt", post(crypto::encrypt))
        .route("/crypto/decrypt", post(crypto::decrypt))
        .route("/crypto/sign", post(crypto::sign))
        .route("/crypto/verify", post(crypto::verify))
        .route("/crypto/generate", post(crypto::generate))
}

/// Public listener: `/browser/api/v1` and `/service/api/v1`.
pub fn public_router(
    state: AppState,
    config: &KmsConfig,
    limiter: Arc<RateLimitState>,
) -> Result<Router, KmsError> {
    let allowlist = IpAllowlist::new(&config.allowed_ips, &config.allowed_cidrs)?;
    let cors = build_cors_layer(&config.cors)?;

    let browser_api = api_routes()
        .route("/csrf-token", get(handlers::csrf_token))
        .layer(from_fn_with_state(state.csrf.clone(), csrf_guard))
        .layer(from_fn(security_headers))
        .layer(cors);
    let service_api = api_routes();

    let router = Router::new()
        .nest("/browser/api/v1", browser_api)
        .nest("/service/api/v1", service_api)
        .layer(
            ServiceBuilder::new()
                .layer(CatchPanicLayer::new())
                .layer(from_fn(public_request_context))
                .layer(from_fn(error_envelope))
                .layer(from_fn_with_state(state.metrics.clone(), access_log))
                .layer(TraceLayer::new_for_http())
                .layer(from_fn_with_state(allowlist, ip_allowlist))
                .layer(from_fn_with_state(limiter, rate_limit))
                .layer(from_fn(cache_control))
                .layer(from_fn_with_state(config.request_timeout(), request_timeout)),
        )
        .with_state(state);
    Ok(router)
}

/// Private admin listener: health, shutdown, metrics. No IP filter and no
/// rate limit; the bind address is the boundary.
pub fn admin_router(state: AppState) -> Router {
    Router::new()
        .route("/livez", get(admin::livez))
        .route("/readyz", get(admin::readyz))
        .route("/shutdown", post(admin::shutdown))
        .route("/rotate/:level", post(admin::rotate))
        .route("/metrics", get(admin::metrics))
        .layer(
            ServiceBuilder::new()
                .layer(CatchPanicLayer::new())
                .layer(from_fn(admin_request_context))
                .layer(from_fn(error_envelope))
                .layer(from_fn_with_state(state.metrics.clone(), access_log)),
        )
        .with_state(state)
}
