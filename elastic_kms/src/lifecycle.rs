// /////////////////////////////////////////////////////////////////////////////
// Elastic KMS
// Copyright (c) 2025 Elastic KMS Contributors
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Application Lifecycle
//!
//! Ordered startup: storage (pool + schema) → barrier construction and
//! unseal → key pools → HTTP listeners. Shutdown runs the same chain in
//! reverse: listeners stop accepting and drain within the grace period,
//! pool producers exit, the barrier's in-memory key material is cleared,
//! and the database pool closes.
//!
//! Unsealing runs as a background task so the process can come up sealed:
//! readiness stays false (and barrier operations return `sealed`) until
//! the configured inputs yield a working unseal key. In shared mode the
//! task keeps polling the share sources, which is how a late third share
//! flips the service ready without a restart.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use elastic_kms_bootstrap::config::UnsealMode;
use elastic_kms_bootstrap::{CancellationToken, KmsConfig, ShutdownCoordinator};
use elastic_kms_domain::KmsError;

use crate::application::services::{
    purge_task, CryptoService, ElasticKeyService, MaterialKeyService, PurgeService,
    DEFAULT_PURGE_INTERVAL,
};
use crate::infrastructure::barrier::{unseal, KeyBarrier, UnsealAttempt};
use crate::infrastructure::codec::RustJoseCodec;
use crate::infrastructure::keygen::{resolve_pool_algorithms, KeyPools};
use crate::infrastructure::metrics::KmsMetrics;
use crate::infrastructure::repositories::{
    self, SqliteBarrierKeyRepository, SqliteElasticKeyRepository, SqliteMaterialKeyRepository,
};
use crate::presentation::http::middleware::{sweeper_task, CsrfState, RateLimitState};
use crate::presentation::http::{admin_router, public_router, AppState};

const UNSEAL_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// The wired application, ready to serve.
pub struct Application {
    config: KmsConfig,
    state: AppState,
    barrier: Arc<KeyBarrier>,
    limiter: Arc<RateLimitState>,
    purge: Arc<PurgeService>,
    coordinator: Arc<ShutdownCoordinator>,
}

impl Application {
    /// Wires every component in dependency order. Fails fast on
    /// configuration or storage problems; does not unseal yet.
    pub async fn build(
        config: KmsConfig,
        coordinator: Arc<ShutdownCoordinator>,
    ) -> Result<Self, KmsError> {
        // Storage first: everything else depends on it.
        let db = repositories::connect(&config.database_url).await?;
        repositories::migrate(&db).await?;

        let codec = Arc::new(RustJoseCodec::new());
        let barrier_repository = Arc::new(SqliteBarrierKeyRepository::new(db.clone()));
        let barrier = Arc::new(KeyBarrier::new(barrier_repository, codec.clone()));

        let algorithms = resolve_pool_algorithms(config.pool_algorithms.as_deref())?;
        let pools = Arc::new(KeyPools::spawn(
            &algorithms,
            config.pool_size_per_algorithm,
            coordinator.token(),
        ));

        let elastic_repository = Arc::new(SqliteElasticKeyRepository::new(db.clone()));
        let material_repository = Arc::new(SqliteMaterialKeyRepository::new(db.clone()));
        let elastic_keys = Arc::new(ElasticKeyService::new(elastic_repository.clone()));
        let material_keys = Arc::new(MaterialKeyService::new(material_repository.clone()));
        let crypto = Arc::new(CryptoService::new(
            elastic_repository.clone(),
            material_repository.clone(),
            barrier.clone(),
            pools.clone(),
            codec,
        ));
        let purge = Arc::new(PurgeService::new(elastic_repository, material_repository));

        let metrics = Arc::new(KmsMetrics::new()?);
        let limiter = Arc::new(RateLimitState::new(config.rate_limit_per_ip_per_sec)?);
        let csrf = CsrfState::new(config.csrf_cookie.clone());

        let state = AppState {
            elastic_keys,
            material_keys,
            crypto,
            barrier: barrier.clone(),
            pools,
            db,
            metrics,
            coordinator: coordinator.clone(),
            csrf,
        };

        Ok(Self {
            config,
            state,
            barrier,
            limiter,
            purge,
            coordinator,
        })
    }

    /// Serves until shutdown is initiated, then drains and tears down in
    /// reverse startup order.
    pub async fn run(self) -> Result<(), KmsError> {
        let token = self.coordinator.token();

        tokio::spawn(sweeper_task(self.limiter.clone(), token.clone()));
        tokio::spawn(purge_task(
            self.purge.clone(),
            DEFAULT_PURGE_INTERVAL,
            token.clone(),
        ));
        tokio::spawn(unseal_task(
            self.barrier.clone(),
            self.config.unseal_mode,
            self.config.unseal_inputs.clone(),
            self.config.unseal_shares_required,
            token.clone(),
        ));

        let public = public_router(self.state.clone(), &self.config, self.limiter.clone())?;
        let admin = admin_router(self.state.clone());

        let public_addr = self
            .config
            .public_addr()
            .map_err(|e| KmsError::validation(e.to_string()))?;
        let private_addr = self
            .config
            .private_addr()
            .map_err(|e| KmsError::validation(e.to_string()))?;

        let grace = self.coordinator.grace_period();
        let public_handle = axum_server::Handle::new();
        let admin_handle = axum_server::Handle::new();
        for handle in [public_handle.clone(), admin_handle.clone()] {
            let token = token.clone();
            tokio::spawn(async move {
                token.cancelled().await;
                handle.graceful_shutdown(Some(grace));
            });
        }

        let public_server = match &self.config.tls {
            Some(tls) => {
                let rustls = axum_server::tls_rustls::RustlsConfig::from_pem_file(
                    tls.cert_path.clone(),
                    tls.key_path.clone(),
                )
                .await
                .map_err(|e| KmsError::validation(format!("cannot load TLS material: {e}")))?;
                tracing::info!(addr = %public_addr, "public listener starting (https)");
                tokio::spawn(
                    axum_server::bind_rustls(public_addr, rustls)
                        .handle(public_handle)
                        .serve(public.into_make_service_with_connect_info::<SocketAddr>()),
                )
            }
            None => {
                tracing::info!(addr = %public_addr, "public listener starting (http)");
                tokio::spawn(
                    axum_server::bind(public_addr)
                        .handle(public_handle)
                        .serve(public.into_make_service_with_connect_info::<SocketAddr>()),
                )
            }
        };

        tracing::info!(addr = %private_addr, "admin listener starting");
        let admin_server = tokio::spawn(
            axum_server::bind(private_addr)
                .handle(admin_handle)
                .serve(admin.into_make_service_with_connect_info::<SocketAddr>()),
        );

        // Both servers exit once their handle's graceful shutdown
        // completes (or on a bind error).
        let (public_result, admin_result) = tokio::join!(public_server, admin_server);
        for result in [public_result, admin_result] {
            match result {
                Ok(Ok(())) => {}
                Ok(Err(error)) => return Err(KmsError::internal(format!("listener failed: {error}"))),
                Err(join_error) => {
                    return Err(KmsError::internal(format!("listener task failed: {join_error}")))
                }
            }
        }

        // Reverse teardown: producers have observed the token; clear the
        // barrier's key material, then close storage.
        self.barrier.seal();
        self.state.db.close().await;
        tracing::info!("shutdown complete");
        Ok(())
    }
}

/// Polls the configured unseal inputs until the barrier opens. Keeps the
/// process sealed (readiness false) on failure instead of exiting, so
/// operators can fix inputs without a restart in shared mode.
async fn unseal_task(
    barrier: Arc<KeyBarrier>,
    mode: UnsealMode,
    inputs: Vec<String>,
    shares_required: Option<u32>,
    token: CancellationToken,
) {
    let mut reported_pending = false;
    loop {
        match unseal::gather(mode, &inputs, shares_required) {
            Ok(UnsealAttempt::Ready(material)) => match barrier.unseal(material).await {
                Ok(()) => return,
                Err(error) if mode == UnsealMode::Shared => {
                    // Wrong shares reconstruct a wrong key; stay sealed
                    // and keep watching the share sources.
                    tracing::warn!(%error, "unseal attempt failed, still sealed");
                }
                Err(error) => {
                    tracing::error!(%error, "unseal failed; service stays sealed");
                    return;
                }
            },
            Ok(UnsealAttempt::Pending { have, need }) => {
                if !reported_pending {
                    tracing::info!(have, need, "waiting for unseal inputs");
                    reported_pending = true;
                }
            }
            Err(error) => {
                tracing::error!(%error, "unseal inputs are invalid; service stays sealed");
                return;
            }
        }
        tokio::select! {
            _ = token.cancelled() => return,
            _ = tokio::time::sleep(UNSEAL_POLL_INTERVAL) => {}
        }
    }
}
