// /////////////////////////////////////////////////////////////////////////////
// Elastic KMS
// Copyright (c) 2025 Elastic KMS Contributors
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Logger Initialization
//!
//! Sets up the global `tracing` subscriber once, early in `main`.
//! Precedence for the filter directive: CLI override, then `RUST_LOG`,
//! then the configured `log_filter`, then `info`.

use tracing_subscriber::{fmt, EnvFilter};

/// Initializes the process-wide tracing subscriber.
///
/// Returns an error when a subscriber is already installed (tests install
/// their own); callers at process entry treat that as fatal.
pub fn init_logging(cli_filter: Option<&str>, config_filter: Option<&str>) -> anyhow::Result<()> {
    let filter = match cli_filter {
        Some(directive) => EnvFilter::try_new(directive)?,
        None => match EnvFilter::try_from_default_env() {
            Ok(env) => env,
            Err(_) => EnvFilter::try_new(config_filter.unwrap_or("info"))?,
        },
    };

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {e}"))?;
    Ok(())
}
