// /////////////////////////////////////////////////////////////////////////////
// Elastic KMS
// Copyright (c) 2025 Elastic KMS Contributors
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Unseal Key Derivation
//!
//! Turns the configured unseal inputs into the in-memory wrapping key for
//! the root row. Three modes:
//!
//! - **direct**: one secret is the derivation input;
//! - **shared**: M-of-N Shamir shares are combined first;
//! - **system**: canonicalized host identifiers are the input.
//!
//! Inputs may be literals or `env:NAME` / `file:PATH` references. A
//! missing reference is not an error: the caller polls until enough
//! inputs are present, which is how late share submission works. The
//! derived key is HKDF-SHA256 output bound to a fixed deployment info
//! string; it exists only in memory and is zeroized on drop.

use elastic_kms_domain::{Jwk, KeyAlgorithm, KmsError};
use elastic_kms_bootstrap::config::UnsealMode;
use hkdf::Hkdf;
use sha2::Sha256;
use zeroize::Zeroize;

use crate::infrastructure::codec::keys::b64;

use super::shamir::{self, Share};

const HKDF_SALT: &[u8] = b"elastic-kms/v1/unseal";
const HKDF_INFO: &[u8] = b"barrier root wrapping key";

/// The derived unseal key, held in RAM while the process is unsealed.
pub struct UnsealMaterial {
    jwk: Jwk,
}

impl UnsealMaterial {
    fn from_ikm(mut ikm: Vec<u8>) -> Result<Self, KmsError> {
        let hk = Hkdf::<Sha256>::new(Some(HKDF_SALT), &ikm);
        let mut okm = [0u8; 32];
        hk.expand(HKDF_INFO, &mut okm)
            .map_err(|_| KmsError::internal("HKDF expansion failed"))?;
        ikm.zeroize();

        let jwk = Jwk {
            kty: "oct".into(),
            kid: None,
            alg: Some(KeyAlgorithm::A256Kw.name().to_string()),
            use_: None,
            k: Some(b64(&okm)),
            n: None,
            e: None,
            d: None,
            p: None,
            q: None,
            crv: None,
            x: None,
            y: None,
        };
        okm.zeroize();
        Ok(Self { jwk })
    }

    /// The wrapping JWK for the root row. Never leaves the barrier.
    pub(crate) fn jwk(&self) -> &Jwk {
        &self.jwk
    }
}

/// Outcome of one gathering pass over the configured inputs.
pub enum UnsealAttempt {
    Ready(UnsealMaterial),
    /// Not enough inputs are present yet; poll again.
    Pending { have: usize, need: usize },
}

/// Gathers the configured inputs and derives the unseal key when enough
/// of them are present.
pub fn gather(
    mode: UnsealMode,
    inputs: &[String],
    shares_required: Option<u32>,
) -> Result<UnsealAttempt, KmsError> {
    match mode {
        UnsealMode::Direct => {
            let input = inputs
                .first()
                .ok_or_else(|| KmsError::validation("direct mode requires one unseal input"))?;
            match resolve_input(input)? {
                Some(secret) => Ok(UnsealAttempt::Ready(UnsealMaterial::from_ikm(secret.into_bytes())?)),
                None => Ok(UnsealAttempt::Pending { have: 0, need: 1 }),
            }
        }
        UnsealMode::Shared => {
            let need = shares_required.unwrap_or(2) as usize;
            let mut shares: Vec<Share> = Vec::new();
            for input in inputs {
                let Some(raw) = resolve_input(input)? else { continue };
                let share = parse_share(&raw)?;
                if !shares.iter().any(|s| s.x == share.x) {
                    shares.push(share);
                }
            }
            if shares.len() < need {
                return Ok(UnsealAttempt::Pending { have: shares.len(), need });
            }
            shares.truncate(need);
            let secret = shamir::combine(&shares)?;
            Ok(UnsealAttempt::Ready(UnsealMaterial::from_ikm(secret)?))
        }
        UnsealMode::System => {
            let mut pairs: Vec<(String, String)> = Vec::with_capacity(inputs.len());
            for source in inputs {
                pairs.push((source.clone(), read_fingerprint(source)?));
            }
            pairs.sort();
            let canonical = pairs
                .iter()
                .map(|(name, value)| format!("{name}={value}"))
                .collect::<Vec<_>>()
                .join("\n");
            Ok(UnsealAttempt::Ready(UnsealMaterial::from_ikm(canonical.into_bytes())?))
        }
    }
}

/// Dereferences an `env:` / `file:` input; `Ok(None)` means the source
/// exists in configuration but has no value yet.
fn resolve_input(input: &str) -> Result<Option<String>, KmsError> {
    if let Some(name) = input.strip_prefix("env:") {
        return Ok(std::env::var(name).ok().filter(|v| !v.is_empty()));
    }
    if let Some(path) = input.strip_prefix("file:") {
        return match std::fs::read_to_string(path) {
            Ok(contents) => {
                let trimmed = contents.trim().to_string();
                Ok(if trimmed.is_empty() { None } else { Some(trimmed) })
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(KmsError::internal(format!("cannot read unseal input '{path}': {e}"))),
        };
    }
    Ok(Some(input.to_string()))
}

/// Shares are written `<index>:<hex>`, index in `1..=255`.
fn parse_share(raw: &str) -> Result<Share, KmsError> {
    let (index, data) = raw
        .split_once(':')
        .ok_or_else(|| KmsError::validation("share must be '<index>:<hex>'"))?;
    let x: u8 = index
        .trim()
        .parse()
        .map_err(|_| KmsError::validation("share index must be 1..=255"))?;
    if x == 0 {
        return Err(KmsError::validation("share index must be 1..=255"));
    }
    let data = hex::decode(data.trim()).map_err(|_| KmsError::validation("share data must be hex"))?;
    Ok(Share { x, data })
}

fn read_fingerprint(source: &str) -> Result<String, KmsError> {
    let value = match source {
        "hostname" => std::fs::read_to_string("/proc/sys/kernel/hostname")
            .or_else(|_| std::env::var("HOSTNAME").map_err(std::io::Error::other))
            .map_err(|_| KmsError::validation("hostname fingerprint source is unavailable"))?,
        "machine-id" => std::fs::read_to_string("/etc/machine-id")
            .map_err(|_| KmsError::validation("machine-id fingerprint source is unavailable"))?,
        "os-release" => std::fs::read_to_string("/etc/os-release")
            .map_err(|_| KmsError::validation("os-release fingerprint source is unavailable"))?,
        other => {
            return Err(KmsError::validation(format!(
                "unknown fingerprint source '{other}' (expected hostname, machine-id or os-release)"
            )))
        }
    };
    Ok(value.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn direct_literal_derives() {
        let attempt = gather(UnsealMode::Direct, &["the secret".to_string()], None).unwrap();
        assert!(matches!(attempt, UnsealAttempt::Ready(_)));
    }

    #[test]
    fn direct_derivation_is_deterministic() {
        let a = match gather(UnsealMode::Direct, &["s".to_string()], None).unwrap() {
            UnsealAttempt::Ready(m) => m.jwk().k.clone(),
            _ => panic!("expected ready"),
        };
        let b = match gather(UnsealMode::Direct, &["s".to_string()], None).unwrap() {
            UnsealAttempt::Ready(m) => m.jwk().k.clone(),
            _ => panic!("expected ready"),
        };
        assert_eq!(a, b);
        let c = match gather(UnsealMode::Direct, &["t".to_string()], None).unwrap() {
            UnsealAttempt::Ready(m) => m.jwk().k.clone(),
            _ => panic!("expected ready"),
        };
        assert_ne!(a, c);
    }

    #[test]
    fn missing_share_file_is_pending() {
        let inputs = vec!["file:/nonexistent/share-1".to_string()];
        let attempt = gather(UnsealMode::Shared, &inputs, Some(2)).unwrap();
        match attempt {
            UnsealAttempt::Pending { have, need } => {
                assert_eq!(have, 0);
                assert_eq!(need, 2);
            }
            UnsealAttempt::Ready(_) => panic!("expected pending"),
        }
    }

    #[test]
    fn shared_mode_completes_when_threshold_reached() {
        let secret = b"shared unseal secret".to_vec();
        let shares = super::super::shamir::split(&secret, 2, 3).unwrap();

        let mut files = Vec::new();
        let mut inputs = Vec::new();
        for share in &shares[..2] {
            let mut file = tempfile::NamedTempFile::new().unwrap();
            writeln!(file, "{}:{}", share.x, hex::encode(&share.data)).unwrap();
            inputs.push(format!("file:{}", file.path().display()));
            files.push(file);
        }

        let attempt = gather(UnsealMode::Shared, &inputs, Some(2)).unwrap();
        assert!(matches!(attempt, UnsealAttempt::Ready(_)));
    }

    #[test]
    fn malformed_share_rejected() {
        let inputs = vec!["not-a-share".to_string()];
        assert!(gather(UnsealMode::Shared, &inputs, Some(2)).is_err());
    }
}
