// /////////////////////////////////////////////////////////////////////////////
// Elastic KMS
// Copyright (c) 2025 Elastic KMS Contributors
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Repository port for elastic keys.

use async_trait::async_trait;
use uuid::Uuid;

use crate::entities::ElasticKey;
use crate::error::KmsError;
use crate::value_objects::{ElasticKeyFilter, Page, PageRequest};

/// Persistence operations over elastic keys.
///
/// Implementations map unique violations to `KmsError::Conflict`, missing
/// rows to `KmsError::NotFound`, and retry transient faults once before
/// surfacing `KmsError::Upstream`.
#[async_trait]
pub trait ElasticKeyRepository: Send + Sync {
    /// Inserts a new elastic key. Conflicts on duplicate `id` or `name`.
    async fn add(&self, key: &ElasticKey) -> Result<(), KmsError>;

    /// Fetches by id; `NotFound` when absent.
    async fn get(&self, id: Uuid) -> Result<ElasticKey, KmsError>;

    /// Persists mutable attributes and status of an existing key.
    async fn update(&self, key: &ElasticKey) -> Result<(), KmsError>;

    /// AND-filter search with stable offset pagination (ordered by
    /// `created_at`, then `id`).
    async fn find(
        &self,
        filter: &ElasticKeyFilter,
        page: PageRequest,
    ) -> Result<Page<ElasticKey>, KmsError>;
}
