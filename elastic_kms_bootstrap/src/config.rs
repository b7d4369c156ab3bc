// /////////////////////////////////////////////////////////////////////////////
// Elastic KMS
// Copyright (c) 2025 Elastic KMS Contributors
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Service Configuration
//!
//! Deserialized from a TOML or YAML file, then validated before anything
//! else starts. Unknown keys fail deserialization (`deny_unknown_fields`);
//! malformed addresses, IPs, CIDRs or unseal settings fail validation.
//! Configuration is immutable after load and shared by value.

use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use std::time::Duration;

use ipnet::IpNet;
use serde::Deserialize;
use thiserror::Error;

/// Configuration loading and validation failures. All are fatal to
/// startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// How the unseal key material is obtained at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnsealMode {
    /// One secret, used directly as the derivation input.
    Direct,
    /// M-of-N secret shares, reconstructed before derivation.
    Shared,
    /// Canonicalized host identifiers as the derivation input.
    System,
}

/// TLS material for the public listener, provisioned externally.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TlsConfig {
    pub cert_path: String,
    pub key_path: String,
}

/// `SameSite` attribute for the CSRF cookie.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

impl SameSite {
    pub fn as_str(&self) -> &'static str {
        match self {
            SameSite::Strict => "Strict",
            SameSite::Lax => "Lax",
            SameSite::None => "None",
        }
    }
}

/// CSRF double-submit cookie settings (browser context only).
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CsrfCookieConfig {
    #[serde(default = "default_csrf_cookie_name")]
    pub name: String,
    #[serde(default = "default_same_site")]
    pub same_site: SameSite,
    #[serde(default = "default_true")]
    pub secure: bool,
    #[serde(default = "default_true")]
    pub http_only: bool,
    /// When set, a token is invalidated after its first successful
    /// state-changing use. Off by default.
    #[serde(default)]
    pub single_use: bool,
}

impl Default for CsrfCookieConfig {
    fn default() -> Self {
        Self {
            name: default_csrf_cookie_name(),
            same_site: default_same_site(),
            secure: true,
            http_only: true,
            single_use: false,
        }
    }
}

/// CORS settings (browser context only).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CorsConfig {
    #[serde(default)]
    pub origins: Vec<String>,
    #[serde(default)]
    pub methods: Vec<String>,
    #[serde(default)]
    pub headers: Vec<String>,
}

/// Top-level service configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KmsConfig {
    /// Public listener (browser + service contexts). HTTPS when `tls` is
    /// set.
    pub public_bind: String,
    /// Private admin listener; bind to loopback.
    pub private_bind: String,
    #[serde(default)]
    pub tls: Option<TlsConfig>,

    /// Individual client IPs admitted by the public contexts.
    #[serde(default)]
    pub allowed_ips: Vec<String>,
    /// CIDR blocks admitted by the public contexts.
    #[serde(default)]
    pub allowed_cidrs: Vec<String>,

    #[serde(default = "default_rate_limit")]
    pub rate_limit_per_ip_per_sec: u32,

    pub unseal_mode: UnsealMode,
    /// Unseal inputs; `file:` and `env:` prefixes are dereferenced at
    /// startup (and polled in shared mode so late shares can arrive).
    #[serde(default)]
    pub unseal_inputs: Vec<String>,
    /// Share threshold M in shared mode.
    #[serde(default)]
    pub unseal_shares_required: Option<u32>,

    /// Bounded buffer capacity of each key-generation pool.
    #[serde(default = "default_pool_size")]
    pub pool_size_per_algorithm: usize,
    /// Restricts which algorithms get a pool; all supported algorithms
    /// when unset. Names are validated at startup.
    #[serde(default)]
    pub pool_algorithms: Option<Vec<String>>,

    #[serde(default)]
    pub csrf_cookie: CsrfCookieConfig,
    #[serde(default)]
    pub cors: CorsConfig,

    pub database_url: String,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_shutdown_grace_secs")]
    pub shutdown_grace_secs: u64,

    /// `tracing` env-filter directive, e.g. `info,elastic_kms=debug`.
    #[serde(default)]
    pub log_filter: Option<String>,
}

fn default_csrf_cookie_name() -> String {
    "kms-csrf".to_string()
}

fn default_same_site() -> SameSite {
    SameSite::Strict
}

fn default_true() -> bool {
    true
}

fn default_rate_limit() -> u32 {
    50
}

fn default_pool_size() -> usize {
    3
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_shutdown_grace_secs() -> u64 {
    30
}

impl KmsConfig {
    /// Loads and validates configuration from a TOML or YAML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let cfg: KmsConfig = config::Config::builder()
            .add_source(config::File::from(path))
            .build()?
            .try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Structural validation beyond what serde can express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.public_addr()?;
        let private = self.private_addr()?;
        if !private.ip().is_loopback() {
            tracing::warn!(addr = %private, "admin listener is not bound to loopback");
        }

        for ip in &self.allowed_ips {
            ip.parse::<IpAddr>()
                .map_err(|_| ConfigError::Invalid(format!("allowed_ips entry '{ip}' is not an IP address")))?;
        }
        for cidr in &self.allowed_cidrs {
            cidr.parse::<IpNet>()
                .map_err(|_| ConfigError::Invalid(format!("allowed_cidrs entry '{cidr}' is not a CIDR block")))?;
        }

        if self.rate_limit_per_ip_per_sec == 0 {
            return Err(ConfigError::Invalid("rate_limit_per_ip_per_sec must be at least 1".into()));
        }
        if self.pool_size_per_algorithm == 0 {
            return Err(ConfigError::Invalid("pool_size_per_algorithm must be at least 1".into()));
        }

        match self.unseal_mode {
            UnsealMode::Direct => {
                if self.unseal_inputs.len() != 1 {
                    return Err(ConfigError::Invalid(
                        "unseal_mode=direct requires exactly one unseal input".into(),
                    ));
                }
            }
            UnsealMode::Shared => {
                let required = self.unseal_shares_required.ok_or_else(|| {
                    ConfigError::Invalid("unseal_mode=shared requires unseal_shares_required".into())
                })?;
                if required < 2 {
                    return Err(ConfigError::Invalid("unseal_shares_required must be at least 2".into()));
                }
                if self.unseal_inputs.is_empty() {
                    return Err(ConfigError::Invalid(
                        "unseal_mode=shared requires at least one share input source".into(),
                    ));
                }
            }
            UnsealMode::System => {
                if self.unseal_inputs.is_empty() {
                    return Err(ConfigError::Invalid(
                        "unseal_mode=system requires at least one fingerprint source".into(),
                    ));
                }
            }
        }

        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid("request_timeout_secs must be at least 1".into()));
        }
        Ok(())
    }

    pub fn public_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.public_bind
            .parse()
            .map_err(|_| ConfigError::Invalid(format!("public_bind '{}' is not a socket address", self.public_bind)))
    }

    pub fn private_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.private_bind
            .parse()
            .map_err(|_| ConfigError::Invalid(format!("private_bind '{}' is not a socket address", self.private_bind)))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}
