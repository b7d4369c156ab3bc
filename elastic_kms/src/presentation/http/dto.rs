// /////////////////////////////////////////////////////////////////////////////
// Elastic KMS
// Copyright (c) 2025 Elastic KMS Contributors
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Wire Payloads
//!
//! Request and response shapes for both public contexts. Request DTOs
//! reject unknown members (`deny_unknown_fields`) and carry `validator`
//! rules; enum-like fields arrive as strings and are parsed through the
//! domain's closed enums so the rejection message names the offending
//! value. Binary payloads cross the wire as standard base64.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use elastic_kms_domain::{ElasticKey, Jwk, KmsError, MaterialKey, Page};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

pub fn decode_base64(value: &str, field: &str) -> Result<Vec<u8>, KmsError> {
    BASE64
        .decode(value)
        .map_err(|_| KmsError::validation(format!("{field} must be base64")))
}

pub fn encode_base64(value: &[u8]) -> String {
    BASE64.encode(value)
}

// ---------------------------------------------------------------------------
// Elastic keys
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct CreateElasticKeyRequest {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[serde(default)]
    #[validate(length(max = 1024))]
    pub description: String,
    pub algorithm: String,
    pub provider: String,
    #[serde(default)]
    pub versioning_allowed: bool,
    #[serde(default)]
    pub import_allowed: bool,
    #[serde(default)]
    pub export_allowed: bool,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct UpdateElasticKeyRequest {
    #[validate(length(max = 1024))]
    pub description: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ElasticKeyResponse {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub provider: &'static str,
    pub algorithm: &'static str,
    pub versioning_allowed: bool,
    pub import_allowed: bool,
    pub export_allowed: bool,
    pub status: &'static str,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ElasticKey> for ElasticKeyResponse {
    fn from(key: ElasticKey) -> Self {
        Self {
            id: key.id,
            name: key.name.clone(),
            description: key.description.clone(),
            provider: key.provider.as_str(),
            algorithm: key.algorithm.name(),
            versioning_allowed: key.versioning_allowed,
            import_allowed: key.import_allowed,
            export_allowed: key.export_allowed,
            status: key.status.as_str(),
            created_at: key.created_at,
            updated_at: key.updated_at,
        }
    }
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct ListElasticKeysQuery {
    pub offset: Option<u32>,
    pub limit: Option<u32>,
    pub name: Option<String>,
    pub provider: Option<String>,
    pub algorithm: Option<String>,
    pub status: Option<String>,
    pub versioning_allowed: Option<bool>,
    pub import_allowed: Option<bool>,
    pub export_allowed: Option<bool>,
}

// ---------------------------------------------------------------------------
// Material keys
// ---------------------------------------------------------------------------

/// Import request: the only path by which external key bytes enter.
#[derive(Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct ImportMaterialKeyRequest {
    pub elastic_key_id: Uuid,
    pub jwk: Jwk,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct UpdateMaterialKeyRequest {
    pub status: String,
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct ListMaterialKeysQuery {
    pub offset: Option<u32>,
    pub limit: Option<u32>,
    pub elastic_key_id: Option<Uuid>,
    pub status: Option<String>,
    pub version: Option<u32>,
}

/// Export switch on `GET /materialkey/{id}`.
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct GetMaterialKeyQuery {
    #[serde(default)]
    pub material: bool,
}

#[derive(Debug, Serialize)]
pub struct MaterialKeyResponse {
    pub id: Uuid,
    pub elastic_key_id: Uuid,
    pub version: u32,
    pub status: &'static str,
    pub created_at: DateTime<Utc>,
    pub generate_date: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub import_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiration_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revocation_date: Option<DateTime<Utc>>,
    /// Present only when the export policy allows it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jwk: Option<Jwk>,
}

impl MaterialKeyResponse {
    pub fn metadata(key: &MaterialKey) -> Self {
        Self {
            id: key.id,
            elastic_key_id: key.elastic_key_id,
            version: key.version,
            status: key.status.as_str(),
            created_at: key.created_at,
            generate_date: key.generate_date,
            import_date: key.import_date,
            expiration_date: key.expiration_date,
            revocation_date: key.revocation_date,
            jwk: None,
        }
    }

    pub fn with_jwk(key: &MaterialKey, jwk: Jwk) -> Self {
        let mut response = Self::metadata(key);
        response.jwk = Some(jwk);
        response
    }
}

// ---------------------------------------------------------------------------
// Crypto operations
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct EncryptRequest {
    pub elastic_key_id: Uuid,
    #[validate(length(min = 1))]
    pub plaintext: String,
}

#[derive(Debug, Serialize)]
pub struct EncryptResponse {
    pub jwe: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct DecryptRequest {
    pub elastic_key_id: Uuid,
    #[validate(length(min = 1))]
    pub jwe: String,
}

#[derive(Debug, Serialize)]
pub struct DecryptResponse {
    pub plaintext: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct SignRequest {
    pub elastic_key_id: Uuid,
    #[validate(length(min = 1))]
    pub payload: String,
}

#[derive(Debug, Serialize)]
pub struct SignResponse {
    pub jws: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct VerifyRequest {
    pub elastic_key_id: Uuid,
    #[validate(length(min = 1))]
    pub jws: String,
}

#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,
    pub valid: bool,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct GenerateRequest {
    pub elastic_key_id: Uuid,
}

// ---------------------------------------------------------------------------
// Misc
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct CsrfTokenResponse {
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct PageResponse<T> {
    pub items: Vec<T>,
    pub offset: u32,
    pub limit: u32,
    pub total: u64,
}

impl<T> PageResponse<T> {
    pub fn map<U, F: FnMut(U) -> T>(page: Page<U>, mapper: F) -> Self {
        Self {
            items: page.items.into_iter().map(mapper).collect(),
            offset: page.offset,
            limit: page.limit,
            total: page.total,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_request_rejects_unknown_fields() {
        let body = r#"{"name":"k","algorithm":"A256GCM","provider":"internal","surprise":true}"#;
        assert!(serde_json::from_str::<CreateElasticKeyRequest>(body).is_err());
    }

    #[test]
    fn create_request_defaults_flags_off() {
        let body = r#"{"name":"k","algorithm":"A256GCM","provider":"internal"}"#;
        let request: CreateElasticKeyRequest = serde_json::from_str(body).unwrap();
        assert!(!request.versioning_allowed);
        assert!(!request.import_allowed);
        assert!(!request.export_allowed);
    }

    #[test]
    fn base64_round_trip() {
        let encoded = encode_base64(b"Hello");
        assert_eq!(encoded, "SGVsbG8=");
        assert_eq!(decode_base64(&encoded, "plaintext").unwrap(), b"Hello");
        assert!(decode_base64("not//valid!!", "plaintext").is_err());
    }
}
