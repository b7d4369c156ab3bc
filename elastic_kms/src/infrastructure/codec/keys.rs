// /////////////////////////////////////////////////////////////////////////////
// Elastic KMS
// Copyright (c) 2025 Elastic KMS Contributors
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # JWK Material Backend
//!
//! Conversions between the domain's [`Jwk`] wire form and the RustCrypto
//! key types, plus fresh-key generation for every supported algorithm.
//! All byte parameters cross this boundary base64url-encoded without
//! padding.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use elastic_kms_domain::{Jwk, KeyAlgorithm, KeySpec};
use elastic_kms_domain::value_objects::EcCurve;
use elastic_kms_domain::KmsError;
use rand::RngCore;
use rsa::traits::{PrivateKeyParts, PublicKeyParts};
use rsa::{BigUint, RsaPrivateKey, RsaPublicKey};

pub(crate) fn b64(data: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(data)
}

pub(crate) fn b64_decode(s: &str) -> Result<Vec<u8>, KmsError> {
    URL_SAFE_NO_PAD
        .decode(s)
        .map_err(|_| KmsError::validation("invalid base64url value"))
}

/// Required JWK parameter, base64url-decoded.
pub(crate) fn param(jwk: &Jwk, name: &str, value: &Option<String>) -> Result<Vec<u8>, KmsError> {
    match value {
        Some(v) => b64_decode(v),
        None => Err(KmsError::validation(format!(
            "{} key is missing the '{name}' parameter",
            jwk.kty
        ))),
    }
}

/// Generates a fresh, unwrapped JWK for `algorithm`. The caller assigns
/// `kid`; `alg` is stamped here so the codec can derive headers from the
/// key alone.
pub fn generate_jwk(algorithm: KeyAlgorithm) -> Result<Jwk, KmsError> {
    let mut jwk = match algorithm.key_spec() {
        KeySpec::Oct { bytes } => {
            let mut secret = vec![0u8; bytes];
            rand::rngs::OsRng.fill_bytes(&mut secret);
            Jwk {
                kty: "oct".into(),
                kid: None,
                alg: None,
                use_: None,
                k: Some(b64(&secret)),
                n: None,
                e: None,
                d: None,
                p: None,
                q: None,
                crv: None,
                x: None,
                y: None,
            }
        }
        KeySpec::Rsa { bits } => {
            if bits < 2048 {
                return Err(KmsError::validation("RSA keys below 2048 bits are not permitted"));
            }
            let private = RsaPrivateKey::new(&mut rand::rngs::OsRng, bits)
                .map_err(|e| KmsError::internal(format!("RSA key generation failed: {e}")))?;
            rsa_to_jwk(&private)
        }
        KeySpec::Ec { curve } => generate_ec_jwk(curve),
        KeySpec::Ed25519 => {
            let signing = ed25519_dalek::SigningKey::generate(&mut rand::rngs::OsRng);
            Jwk {
                kty: "OKP".into(),
                kid: None,
                alg: None,
                use_: None,
                k: None,
                n: None,
                e: None,
                d: Some(b64(signing.as_bytes())),
                p: None,
                q: None,
                crv: Some("Ed25519".into()),
                x: Some(b64(signing.verifying_key().as_bytes())),
                y: None,
            }
        }
    };
    jwk.alg = Some(algorithm.name().to_string());
    Ok(jwk)
}

fn generate_ec_jwk(curve: EcCurve) -> Jwk {
    match curve {
        EcCurve::P256 => {
            use p256::elliptic_curve::sec1::ToEncodedPoint;
            let secret = p256::SecretKey::random(&mut rand::rngs::OsRng);
            let point = secret.public_key().to_encoded_point(false);
            ec_jwk(curve, point.x().unwrap(), point.y().unwrap(), &secret.to_bytes())
        }
        EcCurve::P384 => {
            use p384::elliptic_curve::sec1::ToEncodedPoint;
            let secret = p384::SecretKey::random(&mut rand::rngs::OsRng);
            let point = secret.public_key().to_encoded_point(false);
            ec_jwk(curve, point.x().unwrap(), point.y().unwrap(), &secret.to_bytes())
        }
        EcCurve::P521 => {
            use p521::elliptic_curve::sec1::ToEncodedPoint;
            let secret = p521::SecretKey::random(&mut rand::rngs::OsRng);
            let point = secret.public_key().to_encoded_point(false);
            ec_jwk(curve, point.x().unwrap(), point.y().unwrap(), &secret.to_bytes())
        }
    }
}

fn ec_jwk(curve: EcCurve, x: &[u8], y: &[u8], d: &[u8]) -> Jwk {
    Jwk {
        kty: "EC".into(),
        kid: None,
        alg: None,
        use_: None,
        k: None,
        n: None,
        e: None,
        d: Some(b64(d)),
        p: None,
        q: None,
        crv: Some(curve.crv().to_string()),
        x: Some(b64(x)),
        y: Some(b64(y)),
    }
}

fn rsa_to_jwk(private: &RsaPrivateKey) -> Jwk {
    let primes = private.primes();
    Jwk {
        kty: "RSA".into(),
        kid: None,
        alg: None,
        use_: None,
        k: None,
        n: Some(b64(&private.n().to_bytes_be())),
        e: Some(b64(&private.e().to_bytes_be())),
        d: Some(b64(&private.d().to_bytes_be())),
        p: primes.first().map(|p| b64(&p.to_bytes_be())),
        q: primes.get(1).map(|q| b64(&q.to_bytes_be())),
        crv: None,
        x: None,
        y: None,
    }
}

/// Symmetric secret of an oct key.
pub(crate) fn oct_secret(jwk: &Jwk) -> Result<Vec<u8>, KmsError> {
    if jwk.kty != "oct" {
        return Err(KmsError::validation(format!("expected an oct key, got '{}'", jwk.kty)));
    }
    param(jwk, "k", &jwk.k)
}

pub(crate) fn rsa_public_key(jwk: &Jwk) -> Result<RsaPublicKey, KmsError> {
    if jwk.kty != "RSA" {
        return Err(KmsError::validation(format!("expected an RSA key, got '{}'", jwk.kty)));
    }
    let n = BigUint::from_bytes_be(&param(jwk, "n", &jwk.n)?);
    let e = BigUint::from_bytes_be(&param(jwk, "e", &jwk.e)?);
    let key = RsaPublicKey::new(n, e).map_err(|e| KmsError::validation(format!("invalid RSA key: {e}")))?;
    if key.size() * 8 < 2048 {
        return Err(KmsError::validation("RSA keys below 2048 bits are not permitted"));
    }
    Ok(key)
}

pub(crate) fn rsa_private_key(jwk: &Jwk) -> Result<RsaPrivateKey, KmsError> {
    if jwk.kty != "RSA" {
        return Err(KmsError::validation(format!("expected an RSA key, got '{}'", jwk.kty)));
    }
    let n = BigUint::from_bytes_be(&param(jwk, "n", &jwk.n)?);
    let e = BigUint::from_bytes_be(&param(jwk, "e", &jwk.e)?);
    let d = BigUint::from_bytes_be(&param(jwk, "d", &jwk.d)?);
    let p = BigUint::from_bytes_be(&param(jwk, "p", &jwk.p)?);
    let q = BigUint::from_bytes_be(&param(jwk, "q", &jwk.q)?);
    let key = RsaPrivateKey::from_components(n, e, d, vec![p, q])
        .map_err(|e| KmsError::validation(format!("invalid RSA private key: {e}")))?;
    if key.size() * 8 < 2048 {
        return Err(KmsError::validation("RSA keys below 2048 bits are not permitted"));
    }
    Ok(key)
}

/// EC field element, left-padded to the curve's field width so externally
/// produced keys with stripped leading zeros still parse.
pub(crate) fn ec_field(curve: EcCurve, raw: &[u8]) -> Result<Vec<u8>, KmsError> {
    let width = curve.field_len();
    if raw.len() > width {
        return Err(KmsError::validation("EC field element is too long for the curve"));
    }
    let mut padded = vec![0u8; width - raw.len()];
    padded.extend_from_slice(raw);
    Ok(padded)
}

pub(crate) fn curve_of(jwk: &Jwk) -> Result<EcCurve, KmsError> {
    match jwk.crv.as_deref() {
        Some("P-256") => Ok(EcCurve::P256),
        Some("P-384") => Ok(EcCurve::P384),
        Some("P-521") => Ok(EcCurve::P521),
        Some(other) => Err(KmsError::validation(format!("unsupported curve '{other}'"))),
        None => Err(KmsError::validation("EC key is missing 'crv'")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oct_generation_has_exact_length() {
        let jwk = generate_jwk(KeyAlgorithm::Hs384).unwrap();
        assert_eq!(jwk.kty, "oct");
        assert_eq!(oct_secret(&jwk).unwrap().len(), 48);
        assert_eq!(jwk.alg.as_deref(), Some("HS384"));
    }

    #[test]
    fn ec_generation_round_trips_through_jwk() {
        let jwk = generate_jwk(KeyAlgorithm::Es256).unwrap();
        assert_eq!(jwk.kty, "EC");
        assert_eq!(jwk.crv.as_deref(), Some("P-256"));
        assert!(jwk.validate_for(KeyAlgorithm::Es256).is_ok());
    }

    #[test]
    fn ed25519_generation_is_well_formed() {
        let jwk = generate_jwk(KeyAlgorithm::EdDsa).unwrap();
        assert_eq!(jwk.kty, "OKP");
        assert_eq!(b64_decode(jwk.x.as_deref().unwrap()).unwrap().len(), 32);
        assert_eq!(b64_decode(jwk.d.as_deref().unwrap()).unwrap().len(), 32);
    }

    // RSA generation is exercised by the slower integration suite; here we
    // only check the JWK parameter plumbing with a tiny fixed exponent key
    // path going through validation.
    #[test]
    fn rsa_jwk_requires_all_private_parameters() {
        let jwk = Jwk {
            kty: "RSA".into(),
            kid: None,
            alg: None,
            use_: None,
            k: None,
            n: Some(b64(&[1u8; 256])),
            e: Some(b64(&[1, 0, 1])),
            d: None,
            p: None,
            q: None,
            crv: None,
            x: None,
            y: None,
        };
        assert!(rsa_private_key(&jwk).is_err());
    }

    #[test]
    fn ec_field_left_pads() {
        let padded = ec_field(EcCurve::P256, &[0xff; 30]).unwrap();
        assert_eq!(padded.len(), 32);
        assert_eq!(&padded[..2], &[0, 0]);
        assert!(ec_field(EcCurve::P256, &[0u8; 40]).is_err());
    }
}
