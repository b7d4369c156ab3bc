// /////////////////////////////////////////////////////////////////////////////
// Elastic KMS
// Copyright (c) 2025 Elastic KMS Contributors
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Value objects: immutable, validated domain values.

mod jwk;
mod key_algorithm;
mod key_filter;
mod pagination;

pub use jwk::Jwk;
pub use key_algorithm::{EcCurve, KeyAlgorithm, KeyCapability, KeySpec};
pub use key_filter::{ElasticKeyFilter, MaterialKeyFilter};
pub use pagination::{Page, PageRequest, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
