// /////////////////////////////////////////////////////////////////////////////
// Elastic KMS
// Copyright (c) 2025 Elastic KMS Contributors
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Scheduled Purge
//!
//! Walks elastic keys through the tail of the delete chain. A DELETE on
//! the API only moves a key to `pending_delete`; this service advances it
//! to `started_delete`, removes its material versions, and finishes with
//! `finished_delete`. Elastic key rows themselves are never hard-deleted,
//! so the container's audit trail survives its material.
//!
//! The sweep is idempotent: a crash mid-purge leaves the key in
//! `started_delete` and the next pass resumes deleting whatever material
//! remains.

use std::sync::Arc;
use std::time::Duration;

use elastic_kms_bootstrap::CancellationToken;
use elastic_kms_domain::repositories::{ElasticKeyRepository, MaterialKeyRepository};
use elastic_kms_domain::{
    ElasticKeyFilter, ElasticKeyStatus, KmsError, MaterialKeyFilter, PageRequest,
};

/// Default interval between purge sweeps.
pub const DEFAULT_PURGE_INTERVAL: Duration = Duration::from_secs(60);

pub struct PurgeService {
    elastic_keys: Arc<dyn ElasticKeyRepository>,
    material_keys: Arc<dyn MaterialKeyRepository>,
}

impl PurgeService {
    pub fn new(
        elastic_keys: Arc<dyn ElasticKeyRepository>,
        material_keys: Arc<dyn MaterialKeyRepository>,
    ) -> Self {
        Self {
            elastic_keys,
            material_keys,
        }
    }

    /// One full sweep. Returns the number of keys that reached
    /// `finished_delete`.
    pub async fn sweep(&self) -> Result<usize, KmsError> {
        let mut finished = 0;
        finished += self.advance(ElasticKeyStatus::PendingDelete).await?;
        finished += self.advance(ElasticKeyStatus::StartedDelete).await?;
        Ok(finished)
    }

    /// Advances every key currently in `from` one step down the chain.
    async fn advance(&self, from: ElasticKeyStatus) -> Result<usize, KmsError> {
        let filter = ElasticKeyFilter {
            status: Some(from),
            ..Default::default()
        };
        let mut finished = 0;
        loop {
            // Re-query from offset zero: each processed key leaves the
            // status this filter matches.
            let page = self.elastic_keys.find(&filter, PageRequest::first()).await?;
            if page.items.is_empty() {
                return Ok(finished);
            }
            for mut key in page.items {
                match from {
                    ElasticKeyStatus::PendingDelete => {
                        key.transition_to(ElasticKeyStatus::StartedDelete)?;
                        self.elastic_keys.update(&key).await?;
                    }
                    ElasticKeyStatus::StartedDelete => {
                        self.delete_material(&key.id).await?;
                        key.transition_to(ElasticKeyStatus::FinishedDelete)?;
                        self.elastic_keys.update(&key).await?;
                        finished += 1;
                        tracing::info!(id = %key.id, "purge finished for elastic key");
                    }
                    _ => unreachable!("advance is only called for the delete chain"),
                }
            }
        }
    }

    async fn delete_material(&self, elastic_key_id: &uuid::Uuid) -> Result<(), KmsError> {
        let filter = MaterialKeyFilter {
            elastic_key_id: Some(*elastic_key_id),
            ..Default::default()
        };
        loop {
            let page = self.material_keys.find(&filter, PageRequest::first()).await?;
            if page.items.is_empty() {
                return Ok(());
            }
            for material in page.items {
                self.material_keys.delete(material.id).await?;
            }
        }
    }
}

/// Background task running sweeps until shutdown.
pub async fn purge_task(service: Arc<PurgeService>, interval: Duration, token: CancellationToken) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = ticker.tick() => {
                if let Err(error) = service.sweep().await {
                    tracing::warn!(%error, "purge sweep failed, will retry");
                }
            }
        }
    }
}
