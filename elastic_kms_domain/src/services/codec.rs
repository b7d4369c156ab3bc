// /////////////////////////////////////////////////////////////////////////////
// Elastic KMS
// Copyright (c) 2025 Elastic KMS Contributors
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # JOSE Codec Contract
//!
//! Encoding boundary between domain values and the compact JWE/JWS wire
//! forms. The codec derives the header algorithm pair from the key's own
//! `alg` parameter, stamps the key's `kid` into the protected header, and
//! rejects weakened or unknown algorithms outright.
//!
//! Crypto compute is CPU-bound and runs synchronously in the calling
//! task; there is no I/O behind this trait.

use crate::error::KmsError;
use crate::value_objects::Jwk;

/// Compact JWE/JWS encoder-decoder over domain JWKs.
pub trait JoseCodec: Send + Sync {
    /// Encrypts `payload` under `wrapping`, producing a compact JWE whose
    /// protected header carries the key's `alg`-derived pair and `kid`.
    fn wrap(&self, payload: &[u8], wrapping: &Jwk) -> Result<String, KmsError>;

    /// Decrypts a compact JWE with `wrapping`. Fails on header/key
    /// algorithm mismatch and on any authentication failure.
    fn unwrap(&self, compact: &str, wrapping: &Jwk) -> Result<Vec<u8>, KmsError>;

    /// Signs `payload` with `signing`, producing a compact JWS.
    fn sign(&self, payload: &[u8], signing: &Jwk) -> Result<String, KmsError>;

    /// Verifies a compact JWS with `verifying` and returns the payload.
    fn verify(&self, compact: &str, verifying: &Jwk) -> Result<Vec<u8>, KmsError>;

    /// Reads the `kid` from a compact token's protected header without
    /// decrypting or verifying.
    fn peek_kid(&self, compact: &str) -> Result<Option<String>, KmsError>;
}
