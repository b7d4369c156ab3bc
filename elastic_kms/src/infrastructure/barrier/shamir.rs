// /////////////////////////////////////////////////////////////////////////////
// Elastic KMS
// Copyright (c) 2025 Elastic KMS Contributors
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Shamir Secret Sharing over GF(256)
//!
//! M-of-N splitting of the unseal secret, byte-wise over the AES field
//! (reduction polynomial `x^8 + x^4 + x^3 + x + 1`). Shares are
//! `(x, y-bytes)` pairs with `x != 0`; reconstruction is Lagrange
//! interpolation at zero.
//!
//! Combining the wrong shares does not fail here; it yields a different
//! secret, which then fails to open the root key and leaves the service
//! sealed.

use elastic_kms_domain::KmsError;
use rand::RngCore;

/// One share of a split secret.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Share {
    /// Evaluation point, never zero.
    pub x: u8,
    /// One byte per secret byte.
    pub data: Vec<u8>,
}

fn gf_mul(mut a: u8, mut b: u8) -> u8 {
    let mut product = 0u8;
    while b != 0 {
        if b & 1 != 0 {
            product ^= a;
        }
        let carry = a & 0x80;
        a <<= 1;
        if carry != 0 {
            a ^= 0x1b;
        }
        b >>= 1;
    }
    product
}

fn gf_inv(a: u8) -> u8 {
    // a^254 in GF(256); a must be non-zero.
    let mut result = 1u8;
    let mut base = a;
    let mut exp = 254u32;
    while exp != 0 {
        if exp & 1 != 0 {
            result = gf_mul(result, base);
        }
        base = gf_mul(base, base);
        exp >>= 1;
    }
    result
}

/// Evaluates the polynomial with the given coefficients at `x`
/// (constant term first).
fn poly_eval(coefficients: &[u8], x: u8) -> u8 {
    let mut value = 0u8;
    for &coefficient in coefficients.iter().rev() {
        value = gf_mul(value, x) ^ coefficient;
    }
    value
}

/// Splits `secret` into `total` shares, any `threshold` of which
/// reconstruct it.
pub fn split(secret: &[u8], threshold: u8, total: u8) -> Result<Vec<Share>, KmsError> {
    if threshold < 2 || threshold > total {
        return Err(KmsError::validation("share threshold must satisfy 2 <= M <= N"));
    }
    let mut shares: Vec<Share> = (1..=total)
        .map(|x| Share {
            x,
            data: Vec::with_capacity(secret.len()),
        })
        .collect();

    let mut coefficients = vec![0u8; threshold as usize];
    for &byte in secret {
        coefficients[0] = byte;
        rand::rngs::OsRng.fill_bytes(&mut coefficients[1..]);
        for share in &mut shares {
            share.data.push(poly_eval(&coefficients, share.x));
        }
    }
    Ok(shares)
}

/// Reconstructs the secret from the given shares via Lagrange
/// interpolation at zero. All shares must have distinct `x` and equal
/// length.
pub fn combine(shares: &[Share]) -> Result<Vec<u8>, KmsError> {
    let first = shares
        .first()
        .ok_or_else(|| KmsError::validation("no shares provided"))?;
    let length = first.data.len();
    for share in shares {
        if share.x == 0 {
            return Err(KmsError::validation("share index must be non-zero"));
        }
        if share.data.len() != length {
            return Err(KmsError::validation("shares have differing lengths"));
        }
    }
    let mut seen = [false; 256];
    for share in shares {
        if seen[share.x as usize] {
            return Err(KmsError::validation("duplicate share index"));
        }
        seen[share.x as usize] = true;
    }

    let mut secret = vec![0u8; length];
    for (byte_index, byte) in secret.iter_mut().enumerate() {
        let mut accumulator = 0u8;
        for share_i in shares {
            let mut basis = 1u8;
            for share_j in shares {
                if share_j.x != share_i.x {
                    basis = gf_mul(basis, gf_mul(share_j.x, gf_inv(share_j.x ^ share_i.x)));
                }
            }
            accumulator ^= gf_mul(share_i.data[byte_index], basis);
        }
        *byte = accumulator;
    }
    Ok(secret)
}
