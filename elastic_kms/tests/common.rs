// /////////////////////////////////////////////////////////////////////////////
// Elastic KMS
// Copyright (c) 2025 Elastic KMS Contributors
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Shared helpers for the integration suites: an unsealed in-memory
//! barrier, wired services, and fully built routers driven through
//! `tower::ServiceExt::oneshot`.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Method, Request, Response, StatusCode};
use axum::Router;
use elastic_kms::application::services::{CryptoService, ElasticKeyService, MaterialKeyService};
use elastic_kms::infrastructure::barrier::{unseal, KeyBarrier, UnsealAttempt};
use elastic_kms::infrastructure::codec::RustJoseCodec;
use elastic_kms::infrastructure::keygen::KeyPools;
use elastic_kms::infrastructure::metrics::KmsMetrics;
use elastic_kms::infrastructure::repositories::{
    connect, migrate, SqliteBarrierKeyRepository, SqliteElasticKeyRepository,
    SqliteMaterialKeyRepository,
};
use elastic_kms::presentation::http::middleware::{CsrfState, RateLimitState};
use elastic_kms::presentation::http::{admin_router, public_router, AppState};
use elastic_kms_bootstrap::config::UnsealMode;
use elastic_kms_bootstrap::{KmsConfig, ShutdownCoordinator};
use elastic_kms_domain::KeyAlgorithm;
use http_body_util::BodyExt;
use serde_json::Value;
use sqlx::SqlitePool;
use tower::ServiceExt;

pub const TEST_ALGORITHMS: &[KeyAlgorithm] = &[
    KeyAlgorithm::A256Gcm,
    KeyAlgorithm::A128Gcm,
    KeyAlgorithm::Hs256,
    KeyAlgorithm::Es256,
    KeyAlgorithm::EdDsa,
];

pub struct TestHarness {
    pub state: AppState,
    pub barrier: Arc<KeyBarrier>,
    pub db: SqlitePool,
    pub coordinator: Arc<ShutdownCoordinator>,
}

/// Builds a fully wired, unsealed application over in-memory SQLite.
pub async fn harness() -> TestHarness {
    harness_with_unseal(true).await
}

pub async fn harness_with_unseal(unsealed: bool) -> TestHarness {
    let coordinator = Arc::new(ShutdownCoordinator::default());
    let db = connect("sqlite::memory:").await.unwrap();
    migrate(&db).await.unwrap();

    let codec = Arc::new(RustJoseCodec::new());
    let barrier_repository = Arc::new(SqliteBarrierKeyRepository::new(db.clone()));
    let barrier = Arc::new(KeyBarrier::new(barrier_repository, codec.clone()));
    if unsealed {
        unseal_with_secret(&barrier, "integration-test-secret").await;
    }

    let pools = Arc::new(KeyPools::spawn(TEST_ALGORITHMS, 3, coordinator.token()));

    let elastic_repository = Arc::new(SqliteElasticKeyRepository::new(db.clone()));
    let material_repository = Arc::new(SqliteMaterialKeyRepository::new(db.clone()));
    let elastic_keys = Arc::new(ElasticKeyService::new(elastic_repository.clone()));
    let material_keys = Arc::new(MaterialKeyService::new(material_repository.clone()));
    let crypto = Arc::new(CryptoService::new(
        elastic_repository,
        material_repository,
        barrier.clone(),
        pools.clone(),
        codec,
    ));

    let state = AppState {
        elastic_keys,
        material_keys,
        crypto,
        barrier: barrier.clone(),
        pools,
        db: db.clone(),
        metrics: Arc::new(KmsMetrics::new().unwrap()),
        coordinator: coordinator.clone(),
        csrf: CsrfState::new(Default::default()),
    };

    TestHarness {
        state,
        barrier,
        db,
        coordinator,
    }
}

pub async fn unseal_with_secret(barrier: &KeyBarrier, secret: &str) {
    match unseal::gather(UnsealMode::Direct, &[secret.to_string()], None).unwrap() {
        UnsealAttempt::Ready(material) => barrier.unseal(material).await.unwrap(),
        UnsealAttempt::Pending { .. } => panic!("direct unseal cannot be pending"),
    }
}

/// Minimal config for router construction in tests. CSRF cookies drop the
/// `Secure` attribute so plain-HTTP test requests round-trip.
pub fn test_config() -> KmsConfig {
    let toml = r#"
        public_bind = "127.0.0.1:0"
        private_bind = "127.0.0.1:0"
        database_url = "sqlite::memory:"
        unseal_mode = "direct"
        unseal_inputs = ["integration-test-secret"]
        rate_limit_per_ip_per_sec = 1000

        [csrf_cookie]
        secure = false
    "#;
    let path = write_temp_config(toml);
    KmsConfig::load(&path).unwrap()
}

pub fn write_temp_config(body: &str) -> PathBuf {
    let file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .unwrap();
    std::fs::write(file.path(), body).unwrap();
    // Keep the file alive for the test duration.
    let (_, path) = file.keep().unwrap();
    path
}

pub fn routers(harness: &TestHarness, config: &KmsConfig) -> (Router, Router) {
    let limiter = Arc::new(RateLimitState::new(config.rate_limit_per_ip_per_sec).unwrap());
    let public = public_router(harness.state.clone(), config, limiter).unwrap();
    let admin = admin_router(harness.state.clone());
    (public, admin)
}

pub fn json_request(method: Method, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn get_request(uri: &str) -> Request<Body> {
    Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

pub async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    read_json(response).await
}

pub async fn read_json(response: Response<Body>) -> (StatusCode, Value) {
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}
