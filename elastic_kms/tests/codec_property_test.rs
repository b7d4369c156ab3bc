// /////////////////////////////////////////////////////////////////////////////
// Elastic KMS
// Copyright (c) 2025 Elastic KMS Contributors
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Property-style coverage of the codec and the secret-sharing module
//! with the fast (symmetric and EC) algorithms.

use elastic_kms::infrastructure::barrier::shamir;
use elastic_kms::infrastructure::codec::keys::generate_jwk;
use elastic_kms::infrastructure::codec::RustJoseCodec;
use elastic_kms_domain::{JoseCodec, KeyAlgorithm};
use proptest::prelude::*;

fn wrap_algorithms() -> impl Strategy<Value = KeyAlgorithm> {
    prop_oneof![
        Just(KeyAlgorithm::A128Gcm),
        Just(KeyAlgorithm::A192Gcm),
        Just(KeyAlgorithm::A256Gcm),
        Just(KeyAlgorithm::A128Kw),
        Just(KeyAlgorithm::A192Kw),
        Just(KeyAlgorithm::A256Kw),
        Just(KeyAlgorithm::Dir),
    ]
}

fn sign_algorithms() -> impl Strategy<Value = KeyAlgorithm> {
    prop_oneof![
        Just(KeyAlgorithm::Hs256),
        Just(KeyAlgorithm::Hs384),
        Just(KeyAlgorithm::Hs512),
        Just(KeyAlgorithm::Es256),
        Just(KeyAlgorithm::EdDsa),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn jwe_round_trips_any_payload(
        algorithm in wrap_algorithms(),
        payload in proptest::collection::vec(any::<u8>(), 0..512),
    ) {
        let codec = RustJoseCodec::new();
        let mut key = generate_jwk(algorithm).unwrap();
        key.kid = Some("prop-key".into());

        let jwe = codec.wrap(&payload, &key).unwrap();
        let decrypted = codec.unwrap(&jwe, &key).unwrap();
        prop_assert_eq!(decrypted, payload);
    }

    #[test]
    fn jws_round_trips_any_payload(
        algorithm in sign_algorithms(),
        payload in proptest::collection::vec(any::<u8>(), 0..512),
    ) {
        let codec = RustJoseCodec::new();
        let mut key = generate_jwk(algorithm).unwrap();
        key.kid = Some("prop-key".into());

        let jws = codec.sign(&payload, &key).unwrap();
        let verified = codec.verify(&jws, &key).unwrap();
        prop_assert_eq!(verified, payload);
    }

    #[test]
    fn shamir_reconstructs_from_any_threshold_subset(
        secret in proptest::collection::vec(any::<u8>(), 1..64),
        seed in any::<u64>(),
    ) {
        let shares = shamir::split(&secret, 3, 5).unwrap();
        // Pick a pseudo-random 3-subset.
        let mut indices: Vec<usize> = (0..5).collect();
        indices.rotate_left((seed % 5) as usize);
        indices.truncate(3);
        let subset: Vec<_> = indices.into_iter().map(|i| shares[i].clone()).collect();
        prop_assert_eq!(shamir::combine(&subset).unwrap(), secret);
    }

    #[test]
    fn re_wrapping_the_same_payload_round_trips_identically(
        payload in proptest::collection::vec(any::<u8>(), 1..256),
    ) {
        // Decode-then-re-encode of a stored blob is byte-stable under the
        // same content key as far as the payload is concerned.
        let codec = RustJoseCodec::new();
        let mut key = generate_jwk(KeyAlgorithm::A256Kw).unwrap();
        key.kid = Some("stable".into());

        let first = codec.wrap(&payload, &key).unwrap();
        let opened = codec.unwrap(&first, &key).unwrap();
        let second = codec.wrap(&opened, &key).unwrap();
        prop_assert_eq!(codec.unwrap(&second, &key).unwrap(), payload);
    }
}
