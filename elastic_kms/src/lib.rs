// /////////////////////////////////////////////////////////////////////////////
// Elastic KMS
// Copyright (c) 2025 Elastic KMS Contributors
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Elastic KMS
//!
//! Embedded key-management service. Three subsystems do the heavy
//! lifting:
//!
//! - the **barrier** ([`infrastructure::barrier`]): a hierarchical
//!   key-encryption tree (unseal → root → intermediate → content) that
//!   wraps every key blob before it reaches storage;
//! - the **elastic/material key model** ([`application::services`]):
//!   versioned logical key containers fed by per-algorithm
//!   pre-generation pools ([`infrastructure::keygen`]);
//! - the **dual-context request plane** ([`presentation::http`]): a
//!   browser surface and a service surface sharing the same operations
//!   but differing in middleware, plus a private admin plane.
//!
//! Layering follows the usual discipline: `application` orchestrates
//! domain contracts, `infrastructure` implements them, `presentation`
//! translates HTTP, and [`lifecycle`] wires everything in dependency
//! order.

pub mod application;
pub mod infrastructure;
pub mod lifecycle;
pub mod presentation;
