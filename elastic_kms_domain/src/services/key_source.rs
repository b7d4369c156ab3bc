// /////////////////////////////////////////////////////////////////////////////
// Elastic KMS
// Copyright (c) 2025 Elastic KMS Contributors
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Key Source Contract
//!
//! Supplier of freshly generated, unwrapped JWKs. The production
//! implementation is the per-algorithm pre-generation pool; tests inject
//! a synchronous generator. Consumers receive plaintext JWKs and are
//! responsible for wrapping them through the barrier before persistence.

use async_trait::async_trait;

use crate::error::KmsError;
use crate::value_objects::{Jwk, KeyAlgorithm};

/// Asynchronous supplier of fresh key material.
#[async_trait]
pub trait KeySource: Send + Sync {
    /// Takes one fresh JWK for `algorithm`. Returns immediately when a
    /// pre-generated key is buffered; otherwise waits, honoring the
    /// request deadline of the caller.
    async fn take(&self, algorithm: KeyAlgorithm) -> Result<Jwk, KmsError>;
}
