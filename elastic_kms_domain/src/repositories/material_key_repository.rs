// /////////////////////////////////////////////////////////////////////////////
// Elastic KMS
// Copyright (c) 2025 Elastic KMS Contributors
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Repository port for material key versions.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::entities::{MaterialKey, MaterialKeyStatus, NewMaterialKey};
use crate::error::KmsError;
use crate::value_objects::{MaterialKeyFilter, Page, PageRequest};

/// Persistence operations over material key versions.
#[async_trait]
pub trait MaterialKeyRepository: Send + Sync {
    /// Inserts a new version, assigning `version = max(version) + 1` for
    /// the elastic key inside the same transaction as the insert. A
    /// concurrent insert racing to the same version surfaces as
    /// `Conflict`; callers retry once against the next number.
    async fn add_versioned(&self, key: &NewMaterialKey) -> Result<MaterialKey, KmsError>;

    /// Fetches by id; `NotFound` when absent.
    async fn get(&self, id: Uuid) -> Result<MaterialKey, KmsError>;

    /// The highest-version row for an elastic key, if any.
    async fn get_latest(&self, elastic_key_id: Uuid) -> Result<Option<MaterialKey>, KmsError>;

    /// The highest-version `active` row for an elastic key, if any.
    async fn get_latest_active(&self, elastic_key_id: Uuid) -> Result<Option<MaterialKey>, KmsError>;

    /// AND-filter search with stable offset pagination (ordered by
    /// `elastic_key_id`, `version`, then `id`).
    async fn find(
        &self,
        filter: &MaterialKeyFilter,
        page: PageRequest,
    ) -> Result<Page<MaterialKey>, KmsError>;

    /// Moves a version to a new status, stamping the matching date column
    /// (`expiration_date` / `revocation_date`).
    async fn update_status(
        &self,
        id: Uuid,
        status: MaterialKeyStatus,
        at: DateTime<Utc>,
    ) -> Result<(), KmsError>;

    /// Removes a version row. Used by the purge path only.
    async fn delete(&self, id: Uuid) -> Result<(), KmsError>;
}
