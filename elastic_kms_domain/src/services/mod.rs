// /////////////////////////////////////////////////////////////////////////////
// Elastic KMS
// Copyright (c) 2025 Elastic KMS Contributors
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Domain service contracts implemented by the infrastructure layer.

mod barrier;
mod codec;
mod key_source;

pub use barrier::{Barrier, BarrierStatus};
pub use codec::JoseCodec;
pub use key_source::KeySource;
