// /////////////////////////////////////////////////////////////////////////////
// Elastic KMS
// Copyright (c) 2025 Elastic KMS Contributors
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # JSON Web Key Value Object
//!
//! The domain's representation of key material. A [`Jwk`] is the unit the
//! pools produce, the barrier wraps, the codec consumes and the export
//! policy filters. Parameters are held in their wire form (base64url
//! strings), so the domain never depends on a crypto backend.
//!
//! Private parameters (`k`, `d`, `p`, `q`) are zeroized when the value is
//! dropped.

use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use crate::error::KmsError;
use crate::value_objects::KeyAlgorithm;

/// A JSON Web Key (RFC 7517 subset: oct, RSA, EC, OKP).
///
/// Fields are optional because their presence depends on `kty`; the
/// invariant checks live in [`Jwk::validate_for`].
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Jwk {
    pub kty: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alg: Option<String>,
    #[serde(rename = "use", skip_serializing_if = "Option::is_none")]
    pub use_: Option<String>,

    /// Symmetric key value (oct).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub k: Option<String>,

    /// RSA public modulus and exponent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub n: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub e: Option<String>,

    /// Private exponent / scalar (RSA and EC/OKP).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub d: Option<String>,

    /// RSA primes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub p: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub q: Option<String>,

    /// Curve name (EC and OKP).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crv: Option<String>,

    /// Curve point coordinates (EC) / public key (OKP).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<String>,
}

impl Jwk {
    /// Parses the serialized JWK form produced by [`Jwk::to_json`].
    pub fn from_json(json: &str) -> Result<Self, KmsError> {
        serde_json::from_str(json).map_err(|e| KmsError::internal(format!("malformed JWK: {e}")))
    }

    /// Serializes to the canonical JSON form stored inside material blobs.
    pub fn to_json(&self) -> Result<String, KmsError> {
        serde_json::to_string(self).map_err(|e| KmsError::internal(format!("JWK serialization: {e}")))
    }

    /// True when the key carries private parameters.
    pub fn is_private(&self) -> bool {
        self.k.is_some() || self.d.is_some()
    }

    /// The public projection of an asymmetric key.
    ///
    /// Returns `None` for symmetric keys: an oct key has no public half
    /// and must never leave the service unless export is allowed.
    pub fn to_public(&self) -> Option<Jwk> {
        if self.kty == "oct" {
            return None;
        }
        Some(Jwk {
            kty: self.kty.clone(),
            kid: self.kid.clone(),
            alg: self.alg.clone(),
            use_: self.use_.clone(),
            k: None,
            n: self.n.clone(),
            e: self.e.clone(),
            d: None,
            p: None,
            q: None,
            crv: self.crv.clone(),
            x: self.x.clone(),
            y: self.y.clone(),
        })
    }

    /// Checks that this key is structurally usable as a key of `algorithm`:
    /// matching `kty`, matching curve, and private material present.
    pub fn validate_for(&self, algorithm: KeyAlgorithm) -> Result<(), KmsError> {
        let expected_kty = algorithm.kty();
        if self.kty != expected_kty {
            return Err(KmsError::validation(format!(
                "key type '{}' does not match algorithm {algorithm} (expected '{expected_kty}')",
                self.kty
            )));
        }
        match expected_kty {
            "oct" => {
                if self.k.is_none() {
                    return Err(KmsError::validation("oct key is missing the 'k' parameter"));
                }
            }
            "RSA" => {
                if self.n.is_none() || self.e.is_none() {
                    return Err(KmsError::validation("RSA key is missing 'n' or 'e'"));
                }
            }
            "EC" => {
                let expected_crv = match algorithm.key_spec() {
                    crate::value_objects::KeySpec::Ec { curve } => curve.crv(),
                    _ => unreachable!("EC kty implies EC spec"),
                };
                match self.crv.as_deref() {
                    Some(crv) if crv == expected_crv => {}
                    Some(crv) => {
                        return Err(KmsError::validation(format!(
                            "curve '{crv}' does not match algorithm {algorithm} (expected '{expected_crv}')"
                        )))
                    }
                    None => return Err(KmsError::validation("EC key is missing 'crv'")),
                }
                if self.x.is_none() || self.y.is_none() {
                    return Err(KmsError::validation("EC key is missing coordinates"));
                }
            }
            "OKP" => {
                if self.crv.as_deref() != Some("Ed25519") {
                    return Err(KmsError::validation("OKP key must use curve Ed25519"));
                }
                if self.x.is_none() {
                    return Err(KmsError::validation("OKP key is missing 'x'"));
                }
            }
            _ => return Err(KmsError::validation(format!("unsupported key type '{}'", self.kty))),
        }
        Ok(())
    }
}

impl Drop for Jwk {
    fn drop(&mut self) {
        self.k.zeroize();
        self.d.zeroize();
        self.p.zeroize();
        self.q.zeroize();
    }
}
