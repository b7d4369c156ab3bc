// /////////////////////////////////////////////////////////////////////////////
// Elastic KMS
// Copyright (c) 2025 Elastic KMS Contributors
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Barrier Service Contract
//!
//! The barrier is the encryption-at-rest boundary: every key blob that
//! reaches persistence is wrapped by it, and nothing it wraps is readable
//! until the process has unsealed. The contract is deliberately narrow:
//! callers see only `encrypt`/`decrypt` over opaque compact-JWE strings,
//! the three rotation operations, and a status snapshot.
//!
//! Invariant: any ciphertext ever produced by a barrier remains
//! decryptable for as long as the hierarchy rows exist and the service is
//! unsealed, across any number of rotations at any level.

use async_trait::async_trait;
use serde::Serialize;
use uuid::Uuid;

use crate::error::KmsError;

/// Snapshot of the barrier's externally observable state.
#[derive(Debug, Clone, Serialize)]
pub struct BarrierStatus {
    pub sealed: bool,
    pub root_key_id: Option<Uuid>,
    pub intermediate_key_id: Option<Uuid>,
    pub content_key_id: Option<Uuid>,
}

impl BarrierStatus {
    pub fn sealed() -> Self {
        Self {
            sealed: true,
            root_key_id: None,
            intermediate_key_id: None,
            content_key_id: None,
        }
    }
}

/// Hierarchical encryption-at-rest service.
///
/// Implementations must be safe for concurrent use from many request
/// tasks; `encrypt`/`decrypt` never observe a partially rotated
/// hierarchy.
#[async_trait]
pub trait Barrier: Send + Sync {
    /// Wraps `plaintext` under the current content key. Returns a compact
    /// JWE whose `kid` names the wrapping content key.
    async fn encrypt(&self, plaintext: &[u8]) -> Result<String, KmsError>;

    /// Unwraps a compact JWE produced by any generation of this barrier,
    /// walking the persisted hierarchy for historical keys when needed.
    async fn decrypt(&self, ciphertext: &str) -> Result<Vec<u8>, KmsError>;

    /// Installs a fresh content key wrapped under the current
    /// intermediate. Cheap; safe to schedule.
    async fn rotate_content_key(&self) -> Result<(), KmsError>;

    /// Installs a fresh intermediate under the current root and re-wraps
    /// the current content key under it.
    async fn rotate_intermediate_key(&self) -> Result<(), KmsError>;

    /// Installs a fresh root under the unseal key and re-wraps the
    /// current intermediate under it.
    async fn rotate_root_key(&self) -> Result<(), KmsError>;

    /// Current state: sealed flag plus the current key id per level.
    fn status(&self) -> BarrierStatus;

    /// Convenience for readiness checks.
    fn is_unsealed(&self) -> bool {
        !self.status().sealed
    }
}
