// /////////////////////////////////////////////////////////////////////////////
// Elastic KMS
// Copyright (c) 2025 Elastic KMS Contributors
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Elastic KMS Bootstrap
//!
//! Process-entry concerns, kept apart from the application so they stay
//! testable and swappable: command-line parsing, configuration loading and
//! validation, logger initialization, signal handling and shutdown
//! coordination.
//!
//! Nothing in this crate knows about keys, barriers or HTTP routes; it
//! hands the application a validated [`config::KmsConfig`] and a
//! [`shutdown::ShutdownCoordinator`] and gets out of the way.

pub mod cli;
pub mod config;
pub mod exit_code;
pub mod logger;
pub mod shutdown;
pub mod signals;

pub use cli::KmsArgs;
pub use config::{ConfigError, KmsConfig};
pub use exit_code::ExitCode;
pub use shutdown::{CancellationToken, ShutdownCoordinator};
