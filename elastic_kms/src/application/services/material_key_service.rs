// /////////////////////////////////////////////////////////////////////////////
// Elastic KMS
// Copyright (c) 2025 Elastic KMS Contributors
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Material Key Service
//!
//! Read and lifecycle operations over stored key versions. Creation goes
//! through the crypto service (generate/import), which is the only path
//! that touches plaintext material.

use std::sync::Arc;

use elastic_kms_domain::repositories::MaterialKeyRepository;
use elastic_kms_domain::{
    KmsError, MaterialKey, MaterialKeyFilter, MaterialKeyStatus, Page, PageRequest,
};
use uuid::Uuid;

pub struct MaterialKeyService {
    material_keys: Arc<dyn MaterialKeyRepository>,
}

impl MaterialKeyService {
    pub fn new(material_keys: Arc<dyn MaterialKeyRepository>) -> Self {
        Self { material_keys }
    }

    pub async fn get(&self, id: Uuid) -> Result<MaterialKey, KmsError> {
        self.material_keys.get(id).await
    }

    pub async fn find(
        &self,
        filter: &MaterialKeyFilter,
        page: PageRequest,
    ) -> Result<Page<MaterialKey>, KmsError> {
        self.material_keys.find(filter, page).await
    }

    /// Moves a version to `expired` or `revoked`. Revocation is terminal;
    /// nothing returns to `active`.
    pub async fn update_status(&self, id: Uuid, status: MaterialKeyStatus) -> Result<MaterialKey, KmsError> {
        let current = self.material_keys.get(id).await?;
        let legal = matches!(
            (current.status, status),
            (MaterialKeyStatus::Active, MaterialKeyStatus::Expired)
                | (MaterialKeyStatus::Active, MaterialKeyStatus::Revoked)
                | (MaterialKeyStatus::Expired, MaterialKeyStatus::Revoked)
        );
        if !legal {
            return Err(KmsError::validation(format!(
                "illegal material status transition {} -> {}",
                current.status.as_str(),
                status.as_str()
            )));
        }
        let at = chrono::Utc::now();
        self.material_keys.update_status(id, status, at).await?;
        tracing::info!(id = %id, status = status.as_str(), "material key status changed");
        self.material_keys.get(id).await
    }

    /// Removes a version row; the purge path for deleted elastic keys.
    pub async fn delete(&self, id: Uuid) -> Result<(), KmsError> {
        self.material_keys.delete(id).await
    }
}
