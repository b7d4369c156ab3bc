// /////////////////////////////////////////////////////////////////////////////
// Elastic KMS
// Copyright (c) 2025 Elastic KMS Contributors
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Service Metrics
//!
//! A small Prometheus registry: HTTP request counts per context and
//! status class, crypto operation counts, and pool depth gauges. Exposed
//! as text on the admin plane's `/metrics`.

use elastic_kms_domain::KmsError;
use prometheus::{IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder};

pub struct KmsMetrics {
    registry: Registry,
    http_requests: IntCounterVec,
    crypto_operations: IntCounterVec,
    pool_depth: IntGaugeVec,
}

impl KmsMetrics {
    pub fn new() -> Result<Self, KmsError> {
        let registry = Registry::new();
        let internal = |e: prometheus::Error| KmsError::internal(format!("metrics registry: {e}"));

        let http_requests = IntCounterVec::new(
            Opts::new("kms_http_requests_total", "HTTP requests by context and status class"),
            &["context", "status"],
        )
        .map_err(internal)?;
        let crypto_operations = IntCounterVec::new(
            Opts::new("kms_crypto_operations_total", "Crypto operations by kind and outcome"),
            &["operation", "outcome"],
        )
        .map_err(internal)?;
        let pool_depth = IntGaugeVec::new(
            Opts::new("kms_pool_depth", "Buffered keys per generation pool"),
            &["algorithm"],
        )
        .map_err(internal)?;

        registry.register(Box::new(http_requests.clone())).map_err(internal)?;
        registry.register(Box::new(crypto_operations.clone())).map_err(internal)?;
        registry.register(Box::new(pool_depth.clone())).map_err(internal)?;

        Ok(Self {
            registry,
            http_requests,
            crypto_operations,
            pool_depth,
        })
    }

    pub fn record_request(&self, context: &str, status: u16) {
        let class = match status {
            100..=399 => "ok",
            400..=499 => "client_error",
            _ => "server_error",
        };
        self.http_requests.with_label_values(&[context, class]).inc();
    }

    pub fn record_crypto(&self, operation: &str, success: bool) {
        let outcome = if success { "ok" } else { "error" };
        self.crypto_operations.with_label_values(&[operation, outcome]).inc();
    }

    pub fn set_pool_depth(&self, algorithm: &str, depth: usize) {
        self.pool_depth.with_label_values(&[algorithm]).set(depth as i64);
    }

    /// Text exposition for the admin endpoint.
    pub fn gather(&self) -> Result<String, KmsError> {
        TextEncoder::new()
            .encode_to_string(&self.registry.gather())
            .map_err(|e| KmsError::internal(format!("metrics encoding: {e}")))
    }
}
