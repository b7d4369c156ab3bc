// /////////////////////////////////////////////////////////////////////////////
// Elastic KMS
// Copyright (c) 2025 Elastic KMS Contributors
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Admin plane handlers: liveness, readiness, shutdown, barrier rotation
//! and metrics.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use elastic_kms_domain::KmsError;
use serde_json::json;

use crate::infrastructure::repositories;
use crate::presentation::http::error::ApiError;
use crate::presentation::http::state::AppState;

/// GET /livez: 200 while the process is alive.
pub async fn livez() -> impl IntoResponse {
    Json(json!({
        "status": "alive",
        "service": "elastic-kms",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// GET /readyz: 200 only when the barrier is unsealed, every pool holds
/// at least one key, and the database answers a ping.
pub async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    let mut reasons = Vec::new();

    let barrier = state.barrier.status();
    if barrier.sealed {
        reasons.push("barrier is sealed");
    }
    if !state.pools.primed() {
        reasons.push("key pools are not primed");
    }
    if repositories::ping(&state.db).await.is_err() {
        reasons.push("database is unreachable");
    }

    if reasons.is_empty() {
        (
            StatusCode::OK,
            Json(json!({
                "status": "ready",
                "barrier": barrier,
            })),
        )
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "status": "unready",
                "reasons": reasons,
            })),
        )
    }
}

/// POST /shutdown: idempotent; 202 and the lifecycle begins draining.
pub async fn shutdown(State(state): State<AppState>) -> impl IntoResponse {
    state.coordinator.initiate_shutdown();
    (StatusCode::ACCEPTED, Json(json!({ "status": "shutting_down" })))
}

/// POST /rotate/{level}: operator hook for barrier rotation. Old
/// ciphertexts stay decryptable through the historical lookup path.
pub async fn rotate(
    State(state): State<AppState>,
    Path(level): Path<String>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    match level.as_str() {
        "content" => state.barrier.rotate_content_key().await?,
        "intermediate" => state.barrier.rotate_intermediate_key().await?,
        "root" => state.barrier.rotate_root_key().await?,
        other => {
            return Err(ApiError(KmsError::validation(format!(
                "unknown barrier level '{other}' (expected content, intermediate or root)"
            ))))
        }
    }
    Ok((
        StatusCode::OK,
        Json(json!({ "rotated": level, "barrier": state.barrier.status() })),
    ))
}

/// GET /metrics: Prometheus text exposition, including live pool depth.
pub async fn metrics(State(state): State<AppState>) -> Result<String, ApiError> {
    for algorithm in state.pools.algorithms() {
        state
            .metrics
            .set_pool_depth(algorithm.name(), state.pools.depth(algorithm));
    }
    Ok(state.metrics.gather()?)
}
