// /////////////////////////////////////////////////////////////////////////////
// Elastic KMS
// Copyright (c) 2025 Elastic KMS Contributors
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Material Key Entity
//!
//! One concrete key version inside an elastic key. The `material` field is
//! always a barrier-wrapped compact JWE of the serialized JWK; plaintext
//! key bytes never appear on this entity.
//!
//! Versions are monotonic per elastic key starting at 1, with the number
//! assigned inside the transaction that inserts the row, so the set of
//! versions is contiguous and the latest version is unique at any instant
//! a transaction observes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::KmsError;

/// Lifecycle state of a material key version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaterialKeyStatus {
    Active,
    Expired,
    Revoked,
}

impl MaterialKeyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MaterialKeyStatus::Active => "active",
            MaterialKeyStatus::Expired => "expired",
            MaterialKeyStatus::Revoked => "revoked",
        }
    }

    pub fn parse(s: &str) -> Result<Self, KmsError> {
        match s {
            "active" => Ok(Self::Active),
            "expired" => Ok(Self::Expired),
            "revoked" => Ok(Self::Revoked),
            other => Err(KmsError::validation(format!("unknown material status '{other}'"))),
        }
    }

    /// Encrypt and sign require a currently active version.
    pub fn usable_for_protect(&self) -> bool {
        matches!(self, MaterialKeyStatus::Active)
    }

    /// Decrypt and verify accept anything that is not revoked.
    pub fn usable_for_unprotect(&self) -> bool {
        !matches!(self, MaterialKeyStatus::Revoked)
    }
}

/// One stored key version.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaterialKey {
    pub id: Uuid,
    pub elastic_key_id: Uuid,
    pub version: u32,
    /// Barrier-wrapped compact JWE of the serialized JWK.
    pub material: String,
    pub status: MaterialKeyStatus,
    pub created_at: DateTime<Utc>,
    pub generate_date: DateTime<Utc>,
    pub import_date: Option<DateTime<Utc>>,
    pub expiration_date: Option<DateTime<Utc>>,
    pub revocation_date: Option<DateTime<Utc>>,
}

/// Insert payload for a material key; the version is assigned by the
/// repository inside the insert transaction.
#[derive(Debug, Clone)]
pub struct NewMaterialKey {
    pub id: Uuid,
    pub elastic_key_id: Uuid,
    pub material: String,
    pub imported: bool,
}

impl NewMaterialKey {
    pub fn generated(elastic_key_id: Uuid, material: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            elastic_key_id,
            material,
            imported: false,
        }
    }

    pub fn imported(elastic_key_id: Uuid, material: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            elastic_key_id,
            material,
            imported: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_gates_protect_and_unprotect() {
        assert!(MaterialKeyStatus::Active.usable_for_protect());
        assert!(!MaterialKeyStatus::Expired.usable_for_protect());
        assert!(!MaterialKeyStatus::Revoked.usable_for_protect());

        assert!(MaterialKeyStatus::Active.usable_for_unprotect());
        assert!(MaterialKeyStatus::Expired.usable_for_unprotect());
        assert!(!MaterialKeyStatus::Revoked.usable_for_unprotect());
    }

    #[test]
    fn status_parse_round_trip() {
        for s in [MaterialKeyStatus::Active, MaterialKeyStatus::Expired, MaterialKeyStatus::Revoked] {
            assert_eq!(MaterialKeyStatus::parse(s.as_str()).unwrap(), s);
        }
        assert!(MaterialKeyStatus::parse("destroyed").is_err());
    }
}
