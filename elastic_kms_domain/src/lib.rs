// /////////////////////////////////////////////////////////////////////////////
// Elastic KMS
// Copyright (c) 2025 Elastic KMS Contributors
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Elastic KMS Domain Layer
//!
//! Pure domain model for the elastic key-management service. This crate
//! defines the entities (elastic keys, material key versions, barrier key
//! records), the value objects they are built from (algorithms, JWKs,
//! filters, pagination), the service contracts the application layer
//! programs against (barrier, JOSE codec, key source) and the repository
//! ports the persistence gateway implements.
//!
//! The crate is deliberately free of I/O: no database driver, no HTTP
//! framework, no crypto backend. Key material appears only as [`Jwk`]
//! values and protected blobs only as compact-JOSE strings, so every
//! implementation detail of wrapping and storage stays behind the traits
//! in [`services`] and [`repositories`].

pub mod entities;
pub mod error;
pub mod repositories;
pub mod services;
pub mod value_objects;

// Re-export commonly used types for convenient access
pub use entities::{
    BarrierKeyRecord, BarrierLevel, ElasticKey, ElasticKeyStatus, KeyProvider, MaterialKey,
    MaterialKeyStatus, NewMaterialKey,
};
pub use error::{ErrorKind, KmsError};
pub use services::{Barrier, BarrierStatus, JoseCodec, KeySource};
pub use value_objects::{
    ElasticKeyFilter, Jwk, KeyAlgorithm, KeyCapability, KeySpec, MaterialKeyFilter, Page,
    PageRequest,
};
