// /////////////////////////////////////////////////////////////////////////////
// Elastic KMS
// Copyright (c) 2025 Elastic KMS Contributors
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Elastic Key Service
//!
//! CRUD orchestration over elastic keys: lifecycle DAG enforcement,
//! name uniqueness (delegated to the unique constraint), soft deletion
//! through the delete chain.

use std::sync::Arc;

use elastic_kms_domain::repositories::ElasticKeyRepository;
use elastic_kms_domain::{
    ElasticKey, ElasticKeyFilter, ElasticKeyStatus, KeyAlgorithm, KeyProvider, KmsError, Page,
    PageRequest,
};
use uuid::Uuid;

/// Creation command.
#[derive(Debug, Clone)]
pub struct CreateElasticKey {
    pub name: String,
    pub description: String,
    pub provider: KeyProvider,
    pub algorithm: KeyAlgorithm,
    pub versioning_allowed: bool,
    pub import_allowed: bool,
    pub export_allowed: bool,
}

/// Mutation command; absent fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct UpdateElasticKey {
    pub description: Option<String>,
    pub status: Option<ElasticKeyStatus>,
}

pub struct ElasticKeyService {
    elastic_keys: Arc<dyn ElasticKeyRepository>,
}

impl ElasticKeyService {
    pub fn new(elastic_keys: Arc<dyn ElasticKeyRepository>) -> Self {
        Self { elastic_keys }
    }

    pub async fn create(&self, command: CreateElasticKey) -> Result<ElasticKey, KmsError> {
        let key = ElasticKey::new(
            command.name,
            command.description,
            command.provider,
            command.algorithm,
            command.versioning_allowed,
            command.import_allowed,
            command.export_allowed,
        )?;
        self.elastic_keys.add(&key).await?;
        tracing::info!(id = %key.id, name = %key.name, algorithm = %key.algorithm, "created elastic key");
        Ok(key)
    }

    pub async fn get(&self, id: Uuid) -> Result<ElasticKey, KmsError> {
        self.elastic_keys.get(id).await
    }

    pub async fn find(
        &self,
        filter: &ElasticKeyFilter,
        page: PageRequest,
    ) -> Result<Page<ElasticKey>, KmsError> {
        self.elastic_keys.find(filter, page).await
    }

    /// Applies attribute changes and (optionally) one status transition,
    /// both validated against the lifecycle DAG.
    pub async fn update(&self, id: Uuid, command: UpdateElasticKey) -> Result<ElasticKey, KmsError> {
        let mut key = self.elastic_keys.get(id).await?;
        if let Some(description) = command.description {
            key.description = description;
            key.updated_at = chrono::Utc::now();
        }
        if let Some(status) = command.status {
            key.transition_to(status)?;
        }
        self.elastic_keys.update(&key).await?;
        Ok(key)
    }

    /// Soft delete: moves the key into the delete chain. The scheduled
    /// purge advances it to `started_delete`/`finished_delete` later.
    pub async fn delete(&self, id: Uuid) -> Result<ElasticKey, KmsError> {
        let mut key = self.elastic_keys.get(id).await?;
        key.transition_to(ElasticKeyStatus::PendingDelete)?;
        self.elastic_keys.update(&key).await?;
        tracing::info!(id = %key.id, "elastic key marked for deletion");
        Ok(key)
    }
}
