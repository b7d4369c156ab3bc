// /////////////////////////////////////////////////////////////////////////////
// Elastic KMS
// Copyright (c) 2025 Elastic KMS Contributors
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Domain entities: identity-bearing objects with lifecycles.

mod barrier_key;
mod elastic_key;
mod material_key;

pub use barrier_key::{BarrierKeyRecord, BarrierLevel};
pub use elastic_key::{ElasticKey, ElasticKeyStatus, KeyProvider};
pub use material_key::{MaterialKey, MaterialKeyStatus, NewMaterialKey};
