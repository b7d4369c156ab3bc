// /////////////////////////////////////////////////////////////////////////////
// Elastic KMS
// Copyright (c) 2025 Elastic KMS Contributors
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! RSA paths of the codec. Key generation is slow, so one 2048-bit key
//! is reused across the assertions.

use elastic_kms::infrastructure::codec::keys::generate_jwk;
use elastic_kms::infrastructure::codec::RustJoseCodec;
use elastic_kms_domain::{JoseCodec, KeyAlgorithm};

#[test]
fn rsa_oaep_wrap_and_pkcs1v15_pss_signatures() {
    let codec = RustJoseCodec::new();

    let mut wrap_key = generate_jwk(KeyAlgorithm::RsaOaep256).unwrap();
    wrap_key.kid = Some("rsa-wrap".into());
    let jwe = codec.wrap(b"wrapped under RSA", &wrap_key).unwrap();
    assert_eq!(codec.unwrap(&jwe, &wrap_key).unwrap(), b"wrapped under RSA");
    assert_eq!(codec.peek_kid(&jwe).unwrap().as_deref(), Some("rsa-wrap"));

    // The same modulus serves the signature families once relabeled.
    let mut rs_key = wrap_key.clone();
    rs_key.alg = Some(KeyAlgorithm::Rs256.name().to_string());
    let jws = codec.sign(b"claims", &rs_key).unwrap();
    assert_eq!(codec.verify(&jws, &rs_key).unwrap(), b"claims");
    let public = rs_key.to_public().unwrap();
    assert_eq!(codec.verify(&jws, &public).unwrap(), b"claims");

    let mut ps_key = wrap_key.clone();
    ps_key.alg = Some(KeyAlgorithm::Ps256.name().to_string());
    let pss = codec.sign(b"claims", &ps_key).unwrap();
    assert_eq!(codec.verify(&pss, &ps_key).unwrap(), b"claims");

    // A PSS token does not verify as PKCS#1 v1.5.
    assert!(codec.verify(&pss, &rs_key).is_err());
}
