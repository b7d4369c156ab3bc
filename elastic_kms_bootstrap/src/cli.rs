// /////////////////////////////////////////////////////////////////////////////
// Elastic KMS
// Copyright (c) 2025 Elastic KMS Contributors
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Command-Line Interface
//!
//! Deliberately tiny: the service is configuration-file driven, so the
//! CLI only locates the file and optionally overrides the log filter.

use std::path::PathBuf;

use clap::Parser;

/// Elastic KMS: embedded key-management service.
#[derive(Debug, Parser)]
#[command(name = "elastic-kms", version, about)]
pub struct KmsArgs {
    /// Path to the configuration file (TOML or YAML).
    #[arg(short, long, value_name = "FILE", default_value = "kms.toml")]
    pub config: PathBuf,

    /// Overrides the configured tracing filter, e.g. "debug".
    #[arg(long, value_name = "FILTER")]
    pub log_filter: Option<String>,
}

impl KmsArgs {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_kms_toml() {
        let args = KmsArgs::parse_from(["elastic-kms"]);
        assert_eq!(args.config, PathBuf::from("kms.toml"));
        assert!(args.log_filter.is_none());
    }

    #[test]
    fn accepts_config_flag() {
        let args = KmsArgs::parse_from(["elastic-kms", "--config", "/etc/kms/prod.yaml"]);
        assert_eq!(args.config, PathBuf::from("/etc/kms/prod.yaml"));
    }
}
