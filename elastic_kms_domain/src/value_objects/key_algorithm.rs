// /////////////////////////////////////////////////////////////////////////////
// Elastic KMS
// Copyright (c) 2025 Elastic KMS Contributors
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Key Algorithm Value Object
//!
//! Closed enumeration of every algorithm an elastic key may carry, using
//! the JOSE registry names that appear on the wire. The enum is the single
//! dispatch point for the four crypto capabilities (encrypt, decrypt,
//! sign, verify), so the business layer can reject mismatched operations
//! (e.g. sign with `A256GCM`) before any key material is touched.
//!
//! Each algorithm also fixes its generation parameters ([`KeySpec`]): the
//! RSA modulus size, the EC curve, or the symmetric key length. Weakened
//! parameters (RSA below 2048 bits, unknown curves) cannot be expressed.
//!
//! `RSA1_5` key encryption and `none` are recognized during parsing and
//! rejected explicitly rather than falling through as unknown names.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::KmsError;

/// One of the four operations an algorithm may support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyCapability {
    Encrypt,
    Decrypt,
    Sign,
    Verify,
}

/// Generation parameters implied by an algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeySpec {
    /// RSA keypair with the given modulus size in bits.
    Rsa { bits: usize },
    /// EC keypair on the named curve.
    Ec { curve: EcCurve },
    /// Ed25519 keypair.
    Ed25519,
    /// Symmetric octet key of the given length in bytes.
    Oct { bytes: usize },
}

/// Supported EC curves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EcCurve {
    P256,
    P384,
    P521,
}

impl EcCurve {
    /// JOSE `crv` parameter value.
    pub fn crv(&self) -> &'static str {
        match self {
            EcCurve::P256 => "P-256",
            EcCurve::P384 => "P-384",
            EcCurve::P521 => "P-521",
        }
    }

    /// Field element size in bytes (signature halves, coordinates).
    pub fn field_len(&self) -> usize {
        match self {
            EcCurve::P256 => 32,
            EcCurve::P384 => 48,
            EcCurve::P521 => 66,
        }
    }
}

/// Every algorithm an elastic key may be created with.
///
/// Serialized with the exact JOSE registry spelling (`RSA-OAEP-256`,
/// `ES384`, `A256GCM`, `dir`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyAlgorithm {
    // RSA key encryption
    #[serde(rename = "RSA-OAEP")]
    RsaOaep,
    #[serde(rename = "RSA-OAEP-256")]
    RsaOaep256,
    #[serde(rename = "RSA-OAEP-384")]
    RsaOaep384,
    #[serde(rename = "RSA-OAEP-512")]
    RsaOaep512,

    // RSA signatures (PKCS#1 v1.5 and PSS)
    #[serde(rename = "RS256")]
    Rs256,
    #[serde(rename = "RS384")]
    Rs384,
    #[serde(rename = "RS512")]
    Rs512,
    #[serde(rename = "PS256")]
    Ps256,
    #[serde(rename = "PS384")]
    Ps384,
    #[serde(rename = "PS512")]
    Ps512,

    // ECDSA signatures
    #[serde(rename = "ES256")]
    Es256,
    #[serde(rename = "ES384")]
    Es384,
    #[serde(rename = "ES512")]
    Es512,

    // Edwards-curve signatures
    #[serde(rename = "EdDSA")]
    EdDsa,

    // HMAC signatures
    #[serde(rename = "HS256")]
    Hs256,
    #[serde(rename = "HS384")]
    Hs384,
    #[serde(rename = "HS512")]
    Hs512,

    // AES content encryption (direct)
    #[serde(rename = "A128GCM")]
    A128Gcm,
    #[serde(rename = "A192GCM")]
    A192Gcm,
    #[serde(rename = "A256GCM")]
    A256Gcm,

    // AES key wrap
    #[serde(rename = "A128KW")]
    A128Kw,
    #[serde(rename = "A192KW")]
    A192Kw,
    #[serde(rename = "A256KW")]
    A256Kw,

    // Direct use of a shared symmetric key
    #[serde(rename = "dir")]
    Dir,
}

impl KeyAlgorithm {
    /// All variants, for pool configuration validation and exhaustive tests.
    pub const ALL: [KeyAlgorithm; 24] = [
        KeyAlgorithm::RsaOaep,
        KeyAlgorithm::RsaOaep256,
        KeyAlgorithm::RsaOaep384,
        KeyAlgorithm::RsaOaep512,
        KeyAlgorithm::Rs256,
        KeyAlgorithm::Rs384,
        KeyAlgorithm::Rs512,
        KeyAlgorithm::Ps256,
        KeyAlgorithm::Ps384,
        KeyAlgorithm::Ps512,
        KeyAlgorithm::Es256,
        KeyAlgorithm::Es384,
        KeyAlgorithm::Es512,
        KeyAlgorithm::EdDsa,
        KeyAlgorithm::Hs256,
        KeyAlgorithm::Hs384,
        KeyAlgorithm::Hs512,
        KeyAlgorithm::A128Gcm,
        KeyAlgorithm::A192Gcm,
        KeyAlgorithm::A256Gcm,
        KeyAlgorithm::A128Kw,
        KeyAlgorithm::A192Kw,
        KeyAlgorithm::A256Kw,
        KeyAlgorithm::Dir,
    ];

    /// JOSE registry name.
    pub fn name(&self) -> &'static str {
        match self {
            KeyAlgorithm::RsaOaep => "RSA-OAEP",
            KeyAlgorithm::RsaOaep256 => "RSA-OAEP-256",
            KeyAlgorithm::RsaOaep384 => "RSA-OAEP-384",
            KeyAlgorithm::RsaOaep512 => "RSA-OAEP-512",
            KeyAlgorithm::Rs256 => "RS256",
            KeyAlgorithm::Rs384 => "RS384",
            KeyAlgorithm::Rs512 => "RS512",
            KeyAlgorithm::Ps256 => "PS256",
            KeyAlgorithm::Ps384 => "PS384",
            KeyAlgorithm::Ps512 => "PS512",
            KeyAlgorithm::Es256 => "ES256",
            KeyAlgorithm::Es384 => "ES384",
            KeyAlgorithm::Es512 => "ES512",
            KeyAlgorithm::EdDsa => "EdDSA",
            KeyAlgorithm::Hs256 => "HS256",
            KeyAlgorithm::Hs384 => "HS384",
            KeyAlgorithm::Hs512 => "HS512",
            KeyAlgorithm::A128Gcm => "A128GCM",
            KeyAlgorithm::A192Gcm => "A192GCM",
            KeyAlgorithm::A256Gcm => "A256GCM",
            KeyAlgorithm::A128Kw => "A128KW",
            KeyAlgorithm::A192Kw => "A192KW",
            KeyAlgorithm::A256Kw => "A256KW",
            KeyAlgorithm::Dir => "dir",
        }
    }

    /// Parses a JOSE algorithm name.
    ///
    /// Explicitly rejected names get a pointed message: `none` is never
    /// acceptable, and `RSA1_5` key encryption is disallowed (PKCS#1 v1.5
    /// survives only as the RS* signature family).
    pub fn parse(name: &str) -> Result<Self, KmsError> {
        match name {
            "none" => Err(KmsError::validation("algorithm 'none' is not permitted")),
            "RSA1_5" => Err(KmsError::validation(
                "RSA1_5 key encryption is not permitted; PKCS#1 v1.5 is accepted for signing only (RS256/RS384/RS512)",
            )),
            other => Self::ALL
                .iter()
                .find(|a| a.name() == other)
                .copied()
                .ok_or_else(|| KmsError::validation(format!("unknown algorithm '{other}'"))),
        }
    }

    /// Generation parameters for this algorithm.
    ///
    /// The RSA modulus follows the hash strength of the variant
    /// (2048 / 3072 / 4096), which keeps every representable RSA key at or
    /// above the 2048-bit floor.
    pub fn key_spec(&self) -> KeySpec {
        match self {
            KeyAlgorithm::RsaOaep | KeyAlgorithm::RsaOaep256 | KeyAlgorithm::Rs256 | KeyAlgorithm::Ps256 => {
                KeySpec::Rsa { bits: 2048 }
            }
            KeyAlgorithm::RsaOaep384 | KeyAlgorithm::Rs384 | KeyAlgorithm::Ps384 => KeySpec::Rsa { bits: 3072 },
            KeyAlgorithm::RsaOaep512 | KeyAlgorithm::Rs512 | KeyAlgorithm::Ps512 => KeySpec::Rsa { bits: 4096 },
            KeyAlgorithm::Es256 => KeySpec::Ec { curve: EcCurve::P256 },
            KeyAlgorithm::Es384 => KeySpec::Ec { curve: EcCurve::P384 },
            KeyAlgorithm::Es512 => KeySpec::Ec { curve: EcCurve::P521 },
            KeyAlgorithm::EdDsa => KeySpec::Ed25519,
            KeyAlgorithm::Hs256 => KeySpec::Oct { bytes: 32 },
            KeyAlgorithm::Hs384 => KeySpec::Oct { bytes: 48 },
            KeyAlgorithm::Hs512 => KeySpec::Oct { bytes: 64 },
            KeyAlgorithm::A128Gcm | KeyAlgorithm::A128Kw => KeySpec::Oct { bytes: 16 },
            KeyAlgorithm::A192Gcm | KeyAlgorithm::A192Kw => KeySpec::Oct { bytes: 24 },
            KeyAlgorithm::A256Gcm | KeyAlgorithm::A256Kw | KeyAlgorithm::Dir => KeySpec::Oct { bytes: 32 },
        }
    }

    /// Whether the algorithm supports the given operation.
    pub fn supports(&self, capability: KeyCapability) -> bool {
        let encryption = matches!(
            self,
            KeyAlgorithm::RsaOaep
                | KeyAlgorithm::RsaOaep256
                | KeyAlgorithm::RsaOaep384
                | KeyAlgorithm::RsaOaep512
                | KeyAlgorithm::A128Gcm
                | KeyAlgorithm::A192Gcm
                | KeyAlgorithm::A256Gcm
                | KeyAlgorithm::A128Kw
                | KeyAlgorithm::A192Kw
                | KeyAlgorithm::A256Kw
                | KeyAlgorithm::Dir
        );
        match capability {
            KeyCapability::Encrypt | KeyCapability::Decrypt => encryption,
            KeyCapability::Sign | KeyCapability::Verify => !encryption,
        }
    }

    /// True for keypair algorithms with a publishable public half.
    pub fn is_asymmetric(&self) -> bool {
        !matches!(self.key_spec(), KeySpec::Oct { .. })
    }

    /// JWE `(alg, enc)` header pair used when encrypting under a key of
    /// this algorithm. `None` for signature-only algorithms.
    pub fn jwe_params(&self) -> Option<(&'static str, &'static str)> {
        match self {
            KeyAlgorithm::RsaOaep => Some(("RSA-OAEP", "A256GCM")),
            KeyAlgorithm::RsaOaep256 => Some(("RSA-OAEP-256", "A256GCM")),
            KeyAlgorithm::RsaOaep384 => Some(("RSA-OAEP-384", "A256GCM")),
            KeyAlgorithm::RsaOaep512 => Some(("RSA-OAEP-512", "A256GCM")),
            KeyAlgorithm::A128Gcm => Some(("dir", "A128GCM")),
            KeyAlgorithm::A192Gcm => Some(("dir", "A192GCM")),
            KeyAlgorithm::A256Gcm | KeyAlgorithm::Dir => Some(("dir", "A256GCM")),
            KeyAlgorithm::A128Kw => Some(("A128KW", "A128GCM")),
            KeyAlgorithm::A192Kw => Some(("A192KW", "A192GCM")),
            KeyAlgorithm::A256Kw => Some(("A256KW", "A256GCM")),
            _ => None,
        }
    }

    /// JWK `kty` parameter for keys of this algorithm.
    pub fn kty(&self) -> &'static str {
        match self.key_spec() {
            KeySpec::Rsa { .. } => "RSA",
            KeySpec::Ec { .. } => "EC",
            KeySpec::Ed25519 => "OKP",
            KeySpec::Oct { .. } => "oct",
        }
    }
}

impl fmt::Display for KeyAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for KeyAlgorithm {
    type Err = KmsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
