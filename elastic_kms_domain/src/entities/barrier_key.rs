// /////////////////////////////////////////////////////////////////////////////
// Elastic KMS
// Copyright (c) 2025 Elastic KMS Contributors
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Barrier Key Records
//!
//! Persisted rows of the three-level wrapping hierarchy. All three levels
//! share one shape: an id, a compact JWE (`serialized`) and a creation
//! timestamp. What differs is the wrapper:
//!
//! - a root row is wrapped by the derived unseal key (never persisted),
//! - an intermediate row by the then-current root,
//! - a content row by the then-current intermediate.
//!
//! Exactly one row per level is *current*, tracked by an explicit pointer
//! row updated in the same transaction as every append.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::KmsError;

/// Level in the wrapping hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BarrierLevel {
    Root,
    Intermediate,
    Content,
}

impl BarrierLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            BarrierLevel::Root => "root",
            BarrierLevel::Intermediate => "intermediate",
            BarrierLevel::Content => "content",
        }
    }

    pub fn parse(s: &str) -> Result<Self, KmsError> {
        match s {
            "root" => Ok(Self::Root),
            "intermediate" => Ok(Self::Intermediate),
            "content" => Ok(Self::Content),
            other => Err(KmsError::internal(format!("unknown barrier level '{other}'"))),
        }
    }
}

/// One persisted hierarchy row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BarrierKeyRecord {
    pub id: Uuid,
    /// Compact JWE of this level's JWK, wrapped by the level above.
    pub serialized: String,
    pub created_at: DateTime<Utc>,
}

impl BarrierKeyRecord {
    pub fn new(id: Uuid, serialized: String) -> Self {
        Self {
            id,
            serialized,
            created_at: Utc::now(),
        }
    }
}
