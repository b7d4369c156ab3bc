// /////////////////////////////////////////////////////////////////////////////
// Elastic KMS
// Copyright (c) 2025 Elastic KMS Contributors
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! The encryption-at-rest barrier: unseal derivation, secret sharing and
//! the hierarchy service.

mod service;
pub mod shamir;
pub mod unseal;

pub use service::KeyBarrier;
pub use unseal::{UnsealAttempt, UnsealMaterial};
