// /////////////////////////////////////////////////////////////////////////////
// Elastic KMS
// Copyright (c) 2025 Elastic KMS Contributors
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # JOSE Codec
//!
//! Implementation of the domain [`JoseCodec`] contract over the
//! RustCrypto stack: compact JWE ([`jwe`]), compact JWS ([`jws`]) and the
//! JWK material backend ([`keys`]). Everything is synchronous; crypto
//! compute stays in the calling task.

pub(crate) mod jwe;
pub(crate) mod jws;
pub mod keys;

use elastic_kms_domain::{JoseCodec, Jwk, KmsError};
use serde::{Deserialize, Serialize};

use keys::b64_decode;

/// Protected header of a compact JWE/JWS.
///
/// Parsing is lenient about extra members (tokens may carry `typ` etc.),
/// but `alg: none` is rejected at parse time so it can never reach a
/// verification path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct JoseHeader {
    pub alg: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enc: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
}

impl JoseHeader {
    pub fn to_json(&self) -> Result<String, KmsError> {
        serde_json::to_string(self).map_err(|e| KmsError::internal(format!("header serialization: {e}")))
    }

    /// Decodes the base64url protected-header segment.
    pub fn from_protected(segment: &str) -> Result<Self, KmsError> {
        let raw = b64_decode(segment)?;
        let header: JoseHeader = serde_json::from_slice(&raw)
            .map_err(|_| KmsError::validation("malformed protected header"))?;
        if header.alg == "none" {
            return Err(KmsError::validation("algorithm 'none' is not permitted"));
        }
        Ok(header)
    }
}

/// RustCrypto-backed codec.
#[derive(Debug, Default, Clone, Copy)]
pub struct RustJoseCodec;

impl RustJoseCodec {
    pub fn new() -> Self {
        Self
    }
}

impl JoseCodec for RustJoseCodec {
    fn wrap(&self, payload: &[u8], wrapping: &Jwk) -> Result<String, KmsError> {
        jwe::encrypt_compact(payload, wrapping)
    }

    fn unwrap(&self, compact: &str, wrapping: &Jwk) -> Result<Vec<u8>, KmsError> {
        jwe::decrypt_compact(compact, wrapping)
    }

    fn sign(&self, payload: &[u8], signing: &Jwk) -> Result<String, KmsError> {
        jws::sign_compact(payload, signing)
    }

    fn verify(&self, compact: &str, verifying: &Jwk) -> Result<Vec<u8>, KmsError> {
        jws::verify_compact(compact, verifying)
    }

    fn peek_kid(&self, compact: &str) -> Result<Option<String>, KmsError> {
        let first = compact
            .split('.')
            .next()
            .ok_or_else(|| KmsError::validation("empty compact token"))?;
        Ok(JoseHeader::from_protected(first)?.kid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use elastic_kms_domain::KeyAlgorithm;

    #[test]
    fn peek_kid_reads_header_without_key() {
        let codec = RustJoseCodec::new();
        let mut key = keys::generate_jwk(KeyAlgorithm::A256Gcm).unwrap();
        key.kid = Some("the-kid".into());
        let jwe = codec.wrap(b"data", &key).unwrap();
        assert_eq!(codec.peek_kid(&jwe).unwrap().as_deref(), Some("the-kid"));
    }

    #[test]
    fn peek_rejects_alg_none() {
        let codec = RustJoseCodec::new();
        let header = keys::b64(br#"{"alg":"none"}"#);
        let token = format!("{header}.e30.sig");
        assert!(codec.peek_kid(&token).is_err());
    }

    #[test]
    fn header_tolerates_extra_members() {
        let segment = keys::b64(br#"{"alg":"dir","enc":"A256GCM","kid":"k","typ":"JWT"}"#);
        let header = JoseHeader::from_protected(&segment).unwrap();
        assert_eq!(header.kid.as_deref(), Some("k"));
    }
}
