// /////////////////////////////////////////////////////////////////////////////
// Elastic KMS
// Copyright (c) 2025 Elastic KMS Contributors
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Compact JWS
//!
//! Three-part compact serialization (`header.payload.signature`) covering
//! the HMAC, RSA (PKCS#1 v1.5 and PSS), ECDSA and Ed25519 families. As in
//! the JWE module, the header algorithm is derived from the key's own
//! `alg` parameter and any disagreement between token and key is rejected
//! before signature bytes are touched.

use elastic_kms_domain::value_objects::EcCurve;
use elastic_kms_domain::{Jwk, KeyAlgorithm, KmsError};
use hmac::{Mac, SimpleHmac};
use sha2::{Sha256, Sha384, Sha512};

use super::keys::{b64, b64_decode, curve_of, ec_field, oct_secret, param, rsa_private_key, rsa_public_key};
use super::JoseHeader;

/// Signs `payload` with `signing`, returning the compact JWS.
pub(crate) fn sign_compact(payload: &[u8], signing: &Jwk) -> Result<String, KmsError> {
    let algorithm = signing_algorithm(signing)?;
    if algorithm.jwe_params().is_some() {
        return Err(KmsError::validation(format!("{algorithm} is not a signing algorithm")));
    }

    let header = JoseHeader {
        alg: algorithm.name().to_string(),
        enc: None,
        kid: signing.kid.clone(),
    };
    let signing_input = format!("{}.{}", b64(header.to_json()?.as_bytes()), b64(payload));
    let signature = raw_sign(algorithm, signing, signing_input.as_bytes())?;
    Ok(format!("{signing_input}.{}", b64(&signature)))
}

/// Verifies a compact JWS with `verifying` and returns the payload.
pub(crate) fn verify_compact(compact: &str, verifying: &Jwk) -> Result<Vec<u8>, KmsError> {
    let parts: Vec<&str> = compact.split('.').collect();
    if parts.len() != 3 {
        return Err(KmsError::validation("malformed compact JWS: expected three parts"));
    }
    let (protected, payload_b64, signature_b64) = (parts[0], parts[1], parts[2]);

    let header = JoseHeader::from_protected(protected)?;
    let algorithm = signing_algorithm(verifying)?;
    if header.alg != algorithm.name() {
        return Err(KmsError::validation(format!(
            "JWS header alg '{}' does not match the presented {} key",
            header.alg, algorithm
        )));
    }

    let signing_input = format!("{protected}.{payload_b64}");
    let signature = b64_decode(signature_b64)?;
    raw_verify(algorithm, verifying, signing_input.as_bytes(), &signature)?;
    b64_decode(payload_b64)
}

fn signing_algorithm(jwk: &Jwk) -> Result<KeyAlgorithm, KmsError> {
    let name = jwk
        .alg
        .as_deref()
        .ok_or_else(|| KmsError::validation("signing key has no 'alg' parameter"))?;
    KeyAlgorithm::parse(name)
}

fn raw_sign(algorithm: KeyAlgorithm, jwk: &Jwk, input: &[u8]) -> Result<Vec<u8>, KmsError> {
    use rsa::signature::{RandomizedSigner, SignatureEncoding, Signer};

    match algorithm {
        KeyAlgorithm::Hs256 => hmac_sign::<Sha256>(jwk, input),
        KeyAlgorithm::Hs384 => hmac_sign::<Sha384>(jwk, input),
        KeyAlgorithm::Hs512 => hmac_sign::<Sha512>(jwk, input),

        KeyAlgorithm::Rs256 => {
            let key = rsa::pkcs1v15::SigningKey::<Sha256>::new(rsa_private_key(jwk)?);
            Ok(key.sign(input).to_vec())
        }
        KeyAlgorithm::Rs384 => {
            let key = rsa::pkcs1v15::SigningKey::<Sha384>::new(rsa_private_key(jwk)?);
            Ok(key.sign(input).to_vec())
        }
        KeyAlgorithm::Rs512 => {
            let key = rsa::pkcs1v15::SigningKey::<Sha512>::new(rsa_private_key(jwk)?);
            Ok(key.sign(input).to_vec())
        }

        KeyAlgorithm::Ps256 => {
            let key = rsa::pss::BlindedSigningKey::<Sha256>::new(rsa_private_key(jwk)?);
            Ok(key.sign_with_rng(&mut rand::rngs::OsRng, input).to_vec())
        }
        KeyAlgorithm::Ps384 => {
            let key = rsa::pss::BlindedSigningKey::<Sha384>::new(rsa_private_key(jwk)?);
            Ok(key.sign_with_rng(&mut rand::rngs::OsRng, input).to_vec())
        }
        KeyAlgorithm::Ps512 => {
            let key = rsa::pss::BlindedSigningKey::<Sha512>::new(rsa_private_key(jwk)?);
            Ok(key.sign_with_rng(&mut rand::rngs::OsRng, input).to_vec())
        }

        KeyAlgorithm::Es256 | KeyAlgorithm::Es384 | KeyAlgorithm::Es512 => ecdsa_sign(jwk, input),

        KeyAlgorithm::EdDsa => {
            use ed25519_dalek::Signer as _;
            let seed = param(jwk, "d", &jwk.d)?;
            let seed: [u8; 32] = seed
                .try_into()
                .map_err(|_| KmsError::validation("Ed25519 private key must be 32 bytes"))?;
            let key = ed25519_dalek::SigningKey::from_bytes(&seed);
            Ok(key.sign(input).to_bytes().to_vec())
        }

        _ => Err(KmsError::validation(format!("{algorithm} is not a signing algorithm"))),
    }
}

fn raw_verify(algorithm: KeyAlgorithm, jwk: &Jwk, input: &[u8], signature: &[u8]) -> Result<(), KmsError> {
    use rsa::signature::Verifier;

    let bad_signature = || KmsError::validation("JWS signature verification failed");

    match algorithm {
        KeyAlgorithm::Hs256 => hmac_verify::<Sha256>(jwk, input, signature),
        KeyAlgorithm::Hs384 => hmac_verify::<Sha384>(jwk, input, signature),
        KeyAlgorithm::Hs512 => hmac_verify::<Sha512>(jwk, input, signature),

        KeyAlgorithm::Rs256 => {
            let key = rsa::pkcs1v15::VerifyingKey::<Sha256>::new(rsa_public_key(jwk)?);
            let sig = rsa::pkcs1v15::Signature::try_from(signature).map_err(|_| bad_signature())?;
            key.verify(input, &sig).map_err(|_| bad_signature())
        }
        KeyAlgorithm::Rs384 => {
            let key = rsa::pkcs1v15::VerifyingKey::<Sha384>::new(rsa_public_key(jwk)?);
            let sig = rsa::pkcs1v15::Signature::try_from(signature).map_err(|_| bad_signature())?;
            key.verify(input, &sig).map_err(|_| bad_signature())
        }
        KeyAlgorithm::Rs512 => {
            let key = rsa::pkcs1v15::VerifyingKey::<Sha512>::new(rsa_public_key(jwk)?);
            let sig = rsa::pkcs1v15::Signature::try_from(signature).map_err(|_| bad_signature())?;
            key.verify(input, &sig).map_err(|_| bad_signature())
        }

        KeyAlgorithm::Ps256 => {
            let key = rsa::pss::VerifyingKey::<Sha256>::new(rsa_public_key(jwk)?);
            let sig = rsa::pss::Signature::try_from(signature).map_err(|_| bad_signature())?;
            key.verify(input, &sig).map_err(|_| bad_signature())
        }
        KeyAlgorithm::Ps384 => {
            let key = rsa::pss::VerifyingKey::<Sha384>::new(rsa_public_key(jwk)?);
            let sig = rsa::pss::Signature::try_from(signature).map_err(|_| bad_signature())?;
            key.verify(input, &sig).map_err(|_| bad_signature())
        }
        KeyAlgorithm::Ps512 => {
            let key = rsa::pss::VerifyingKey::<Sha512>::new(rsa_public_key(jwk)?);
            let sig = rsa::pss::Signature::try_from(signature).map_err(|_| bad_signature())?;
            key.verify(input, &sig).map_err(|_| bad_signature())
        }

        KeyAlgorithm::Es256 | KeyAlgorithm::Es384 | KeyAlgorithm::Es512 => {
            ecdsa_verify(jwk, input, signature)
        }

        KeyAlgorithm::EdDsa => {
            use ed25519_dalek::Verifier as _;
            let x = param(jwk, "x", &jwk.x)?;
            let x: [u8; 32] = x
                .try_into()
                .map_err(|_| KmsError::validation("Ed25519 public key must be 32 bytes"))?;
            let key = ed25519_dalek::VerifyingKey::from_bytes(&x)
                .map_err(|_| KmsError::validation("invalid Ed25519 public key"))?;
            let sig = ed25519_dalek::Signature::from_slice(signature).map_err(|_| bad_signature())?;
            key.verify(input, &sig).map_err(|_| bad_signature())
        }

        _ => Err(KmsError::validation(format!("{algorithm} is not a signing algorithm"))),
    }
}

fn hmac_sign<D>(jwk: &Jwk, input: &[u8]) -> Result<Vec<u8>, KmsError>
where
    D: hmac::digest::Digest + hmac::digest::crypto_common::BlockSizeUser,
{
    let secret = oct_secret(jwk)?;
    let mut mac = <SimpleHmac<D> as Mac>::new_from_slice(&secret)
        .map_err(|_| KmsError::internal("HMAC key rejected"))?;
    mac.update(input);
    Ok(mac.finalize().into_bytes().to_vec())
}

fn hmac_verify<D>(jwk: &Jwk, input: &[u8], signature: &[u8]) -> Result<(), KmsError>
where
    D: hmac::digest::Digest + hmac::digest::crypto_common::BlockSizeUser,
{
    let secret = oct_secret(jwk)?;
    let mut mac = <SimpleHmac<D> as Mac>::new_from_slice(&secret)
        .map_err(|_| KmsError::internal("HMAC key rejected"))?;
    mac.update(input);
    mac.verify_slice(signature)
        .map_err(|_| KmsError::validation("JWS signature verification failed"))
}

fn ecdsa_sign(jwk: &Jwk, input: &[u8]) -> Result<Vec<u8>, KmsError> {
    let curve = curve_of(jwk)?;
    let d = ec_field(curve, &param(jwk, "d", &jwk.d)?)?;
    let invalid = |_| KmsError::validation("invalid EC private key");

    match curve {
        EcCurve::P256 => {
            use p256::ecdsa::signature::Signer;
            let key = p256::ecdsa::SigningKey::from_slice(&d).map_err(invalid)?;
            let signature: p256::ecdsa::Signature = key.sign(input);
            Ok(signature.to_bytes().to_vec())
        }
        EcCurve::P384 => {
            use p384::ecdsa::signature::Signer;
            let key = p384::ecdsa::SigningKey::from_slice(&d).map_err(invalid)?;
            let signature: p384::ecdsa::Signature = key.sign(input);
            Ok(signature.to_bytes().to_vec())
        }
        EcCurve::P521 => {
            use p521::ecdsa::signature::Signer;
            let key = p521::ecdsa::SigningKey::from_slice(&d).map_err(invalid)?;
            let signature: p521::ecdsa::Signature = key.sign(input);
            Ok(signature.to_bytes().to_vec())
        }
    }
}

fn ecdsa_verify(jwk: &Jwk, input: &[u8], signature: &[u8]) -> Result<(), KmsError> {
    let curve = curve_of(jwk)?;
    let x = ec_field(curve, &param(jwk, "x", &jwk.x)?)?;
    let y = ec_field(curve, &param(jwk, "y", &jwk.y)?)?;
    let invalid_key = |_| KmsError::validation("invalid EC public key");
    let bad_signature = || KmsError::validation("JWS signature verification failed");

    match curve {
        EcCurve::P256 => {
            use p256::ecdsa::signature::Verifier;
            use p256::elliptic_curve::generic_array::GenericArray;
            let point = p256::EncodedPoint::from_affine_coordinates(
                GenericArray::from_slice(&x),
                GenericArray::from_slice(&y),
                false,
            );
            let key = p256::ecdsa::VerifyingKey::from_encoded_point(&point).map_err(invalid_key)?;
            let sig = p256::ecdsa::Signature::from_slice(signature).map_err(|_| bad_signature())?;
            key.verify(input, &sig).map_err(|_| bad_signature())
        }
        EcCurve::P384 => {
            use p384::ecdsa::signature::Verifier;
            use p384::elliptic_curve::generic_array::GenericArray;
            let point = p384::EncodedPoint::from_affine_coordinates(
                GenericArray::from_slice(&x),
                GenericArray::from_slice(&y),
                false,
            );
            let key = p384::ecdsa::VerifyingKey::from_encoded_point(&point).map_err(invalid_key)?;
            let sig = p384::ecdsa::Signature::from_slice(signature).map_err(|_| bad_signature())?;
            key.verify(input, &sig).map_err(|_| bad_signature())
        }
        EcCurve::P521 => {
            use p521::ecdsa::signature::Verifier;
            use p521::elliptic_curve::generic_array::GenericArray;
            let point = p521::EncodedPoint::from_affine_coordinates(
                GenericArray::from_slice(&x),
                GenericArray::from_slice(&y),
                false,
            );
            let key = p521::ecdsa::VerifyingKey::from_encoded_point(&point).map_err(invalid_key)?;
            let sig = p521::ecdsa::Signature::from_slice(signature).map_err(|_| bad_signature())?;
            key.verify(input, &sig).map_err(|_| bad_signature())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::codec::keys::generate_jwk;
    use elastic_kms_domain::KeyAlgorithm;

    fn keyed(algorithm: KeyAlgorithm, kid: &str) -> Jwk {
        let mut jwk = generate_jwk(algorithm).unwrap();
        jwk.kid = Some(kid.to_string());
        jwk
    }

    #[test]
    fn hmac_round_trip() {
        for alg in [KeyAlgorithm::Hs256, KeyAlgorithm::Hs384, KeyAlgorithm::Hs512] {
            let key = keyed(alg, "m1");
            let jws = sign_compact(b"claims", &key).unwrap();
            assert_eq!(jws.split('.').count(), 3);
            assert_eq!(verify_compact(&jws, &key).unwrap(), b"claims");
        }
    }

    #[test]
    fn ecdsa_round_trip_verifies_with_public_half() {
        for alg in [KeyAlgorithm::Es256, KeyAlgorithm::Es384, KeyAlgorithm::Es512] {
            let key = keyed(alg, "e1");
            let jws = sign_compact(b"claims", &key).unwrap();
            let public = key.to_public().unwrap();
            assert_eq!(verify_compact(&jws, &public).unwrap(), b"claims");
        }
    }

    #[test]
    fn ed25519_round_trip() {
        let key = keyed(KeyAlgorithm::EdDsa, "ed1");
        let jws = sign_compact(b"claims", &key).unwrap();
        assert_eq!(verify_compact(&jws, &key.to_public().unwrap()).unwrap(), b"claims");
    }

    #[test]
    fn tampered_payload_fails() {
        let key = keyed(KeyAlgorithm::Hs256, "m1");
        let jws = sign_compact(b"claims", &key).unwrap();
        let mut parts: Vec<String> = jws.split('.').map(String::from).collect();
        parts[1] = b64(b"other claims");
        assert!(verify_compact(&parts.join("."), &key).is_err());
    }

    #[test]
    fn wrong_key_fails() {
        let key = keyed(KeyAlgorithm::Hs256, "m1");
        let other = keyed(KeyAlgorithm::Hs256, "m2");
        let jws = sign_compact(b"claims", &key).unwrap();
        assert!(verify_compact(&jws, &other).is_err());
    }

    #[test]
    fn encryption_key_cannot_sign() {
        let key = keyed(KeyAlgorithm::A256Gcm, "c1");
        assert!(sign_compact(b"claims", &key).is_err());
    }

    #[test]
    fn header_alg_mismatch_rejected() {
        let hs = keyed(KeyAlgorithm::Hs256, "m1");
        let jws = sign_compact(b"claims", &hs).unwrap();
        let ed = keyed(KeyAlgorithm::EdDsa, "m1");
        let err = verify_compact(&jws, &ed).unwrap_err();
        assert!(err.to_string().contains("does not match"));
    }
}
