// /////////////////////////////////////////////////////////////////////////////
// Elastic KMS
// Copyright (c) 2025 Elastic KMS Contributors
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Repository port for the barrier key hierarchy.
//!
//! Every mutation here is a composite transaction: row appends, pointer
//! moves and re-wraps commit together or not at all, so readers never see
//! a half-rotated hierarchy in storage.

use async_trait::async_trait;
use uuid::Uuid;

use crate::entities::{BarrierKeyRecord, BarrierLevel};
use crate::error::KmsError;

/// Persistence operations over the three-level key hierarchy.
#[async_trait]
pub trait BarrierKeyRepository: Send + Sync {
    /// The current record for a level, or `None` before initialization.
    async fn current(&self, level: BarrierLevel) -> Result<Option<BarrierKeyRecord>, KmsError>;

    /// A historical record by id; `NotFound` when absent.
    async fn get(&self, level: BarrierLevel, id: Uuid) -> Result<BarrierKeyRecord, KmsError>;

    /// First-boot initialization: writes all three rows and all three
    /// pointers in one transaction. Conflicts when a root already exists.
    async fn init_hierarchy(
        &self,
        root: &BarrierKeyRecord,
        intermediate: &BarrierKeyRecord,
        content: &BarrierKeyRecord,
    ) -> Result<(), KmsError>;

    /// Content rotation: appends the new content row and moves the
    /// content pointer, in one transaction.
    async fn append_content(&self, content: &BarrierKeyRecord) -> Result<(), KmsError>;

    /// Intermediate rotation: appends the new intermediate row, rewrites
    /// the current content row's `serialized` (re-wrapped under the new
    /// intermediate) and moves the intermediate pointer, in one
    /// transaction.
    async fn rotate_intermediate(
        &self,
        intermediate: &BarrierKeyRecord,
        rewrapped_content: (Uuid, String),
    ) -> Result<(), KmsError>;

    /// Root rotation: appends the new root row, rewrites the current
    /// intermediate row's `serialized` (re-wrapped under the new root)
    /// and moves the root pointer, in one transaction.
    async fn rotate_root(
        &self,
        root: &BarrierKeyRecord,
        rewrapped_intermediate: (Uuid, String),
    ) -> Result<(), KmsError>;
}
