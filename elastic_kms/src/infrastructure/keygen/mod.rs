// /////////////////////////////////////////////////////////////////////////////
// Elastic KMS
// Copyright (c) 2025 Elastic KMS Contributors
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Background key generation: per-algorithm pools and their startup
//! validation.

mod pool;

pub use pool::KeyPools;

use elastic_kms_domain::value_objects::EcCurve;
use elastic_kms_domain::{KeyAlgorithm, KeySpec, KmsError};

/// Resolves and validates the pooled algorithm set from configuration.
///
/// Parameters are checked against the floor the service accepts: RSA at
/// least 2048 bits, EC on P-256/P-384/P-521, AES at 128/192/256 bits.
/// A violation rejects the configuration and startup aborts.
pub fn resolve_pool_algorithms(configured: Option<&[String]>) -> Result<Vec<KeyAlgorithm>, KmsError> {
    let algorithms = match configured {
        None => KeyAlgorithm::ALL.to_vec(),
        Some(names) => {
            if names.is_empty() {
                return Err(KmsError::validation("pool_algorithms must not be empty when set"));
            }
            names
                .iter()
                .map(|name| KeyAlgorithm::parse(name))
                .collect::<Result<Vec<_>, _>>()?
        }
    };
    for &algorithm in &algorithms {
        validate_key_spec(algorithm)?;
    }
    Ok(algorithms)
}

fn validate_key_spec(algorithm: KeyAlgorithm) -> Result<(), KmsError> {
    match algorithm.key_spec() {
        KeySpec::Rsa { bits } if bits < 2048 => Err(KmsError::validation(format!(
            "{algorithm}: RSA below 2048 bits is not accepted"
        ))),
        KeySpec::Ec { curve } => match curve {
            EcCurve::P256 | EcCurve::P384 | EcCurve::P521 => Ok(()),
        },
        KeySpec::Oct { bytes }
            if algorithm.jwe_params().is_some() && !matches!(bytes, 16 | 24 | 32) =>
        {
            Err(KmsError::validation(format!(
                "{algorithm}: AES keys must be 128, 192 or 256 bits"
            )))
        }
        _ => Ok(()),
    }
}
