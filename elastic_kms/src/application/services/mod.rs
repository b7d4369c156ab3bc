// /////////////////////////////////////////////////////////////////////////////
// Elastic KMS
// Copyright (c) 2025 Elastic KMS Contributors
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Application services orchestrating the domain ports.

mod crypto_service;
mod elastic_key_service;
mod material_key_service;
mod purge_service;

pub use crypto_service::{CryptoService, VerifyOutcome};
pub use elastic_key_service::{CreateElasticKey, ElasticKeyService, UpdateElasticKey};
pub use material_key_service::MaterialKeyService;
pub use purge_service::{purge_task, PurgeService, DEFAULT_PURGE_INTERVAL};
