// /////////////////////////////////////////////////////////////////////////////
// Elastic KMS
// Copyright (c) 2025 Elastic KMS Contributors
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Shared handler state and the per-request context value.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Instant;

use elastic_kms_bootstrap::ShutdownCoordinator;
use elastic_kms_domain::Barrier;
use sqlx::SqlitePool;

use crate::application::services::{CryptoService, ElasticKeyService, MaterialKeyService};
use crate::infrastructure::keygen::KeyPools;
use crate::infrastructure::metrics::KmsMetrics;
use crate::presentation::http::middleware::CsrfState;

/// Which HTTP surface a request entered through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextKind {
    Browser,
    Service,
    Admin,
}

impl ContextKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContextKind::Browser => "browser",
            ContextKind::Service => "service",
            ContextKind::Admin => "admin",
        }
    }
}

/// Per-request value stamped by the request-id middleware and carried in
/// request extensions for logging and the error envelope.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: String,
    pub client_ip: IpAddr,
    pub context_kind: ContextKind,
    pub started_at: Instant,
}

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub elastic_keys: Arc<ElasticKeyService>,
    pub material_keys: Arc<MaterialKeyService>,
    pub crypto: Arc<CryptoService>,
    pub barrier: Arc<dyn Barrier>,
    pub pools: Arc<KeyPools>,
    pub db: SqlitePool,
    pub metrics: Arc<KmsMetrics>,
    pub coordinator: Arc<ShutdownCoordinator>,
    pub csrf: CsrfState,
}
