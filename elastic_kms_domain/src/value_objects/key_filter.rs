// /////////////////////////////////////////////////////////////////////////////
// Elastic KMS
// Copyright (c) 2025 Elastic KMS Contributors
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Search filters for listing endpoints.
//!
//! Filters are conjunctions of per-field predicates over enumerated
//! fields only; a `None` field places no constraint. Free-text search is
//! deliberately absent.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::{ElasticKeyStatus, KeyProvider, MaterialKeyStatus};
use crate::value_objects::KeyAlgorithm;

/// AND-of-fields filter over elastic keys.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ElasticKeyFilter {
    pub name: Option<String>,
    pub provider: Option<KeyProvider>,
    pub algorithm: Option<KeyAlgorithm>,
    pub status: Option<ElasticKeyStatus>,
    pub versioning_allowed: Option<bool>,
    pub import_allowed: Option<bool>,
    pub export_allowed: Option<bool>,
}

impl ElasticKeyFilter {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.provider.is_none()
            && self.algorithm.is_none()
            && self.status.is_none()
            && self.versioning_allowed.is_none()
            && self.import_allowed.is_none()
            && self.export_allowed.is_none()
    }
}

/// AND-of-fields filter over material key versions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MaterialKeyFilter {
    pub elastic_key_id: Option<Uuid>,
    pub status: Option<MaterialKeyStatus>,
    pub version: Option<u32>,
}

impl MaterialKeyFilter {
    pub fn is_empty(&self) -> bool {
        self.elastic_key_id.is_none() && self.status.is_none() && self.version.is_none()
    }
}
