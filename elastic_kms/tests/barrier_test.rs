// /////////////////////////////////////////////////////////////////////////////
// Elastic KMS
// Copyright (c) 2025 Elastic KMS Contributors
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Barrier integration: round-trips, every rotation preserving old
//! ciphertexts, seal/unseal behavior across process "restarts".

mod common;

use std::sync::Arc;

use elastic_kms::infrastructure::barrier::{unseal, KeyBarrier, UnsealAttempt};
use elastic_kms::infrastructure::codec::RustJoseCodec;
use elastic_kms::infrastructure::repositories::SqliteBarrierKeyRepository;
use elastic_kms_bootstrap::config::UnsealMode;
use elastic_kms_domain::{Barrier, KmsError};

use common::{harness, harness_with_unseal, unseal_with_secret};

fn codec_kid(jwe: &str) -> String {
    use elastic_kms_domain::JoseCodec;
    RustJoseCodec::new().peek_kid(jwe).unwrap().unwrap()
}

#[tokio::test]
async fn encrypt_decrypt_round_trip() {
    let h = harness().await;
    let ciphertext = h.barrier.encrypt(b"some key material").await.unwrap();
    assert_eq!(h.barrier.decrypt(&ciphertext).await.unwrap(), b"some key material");
}

#[tokio::test]
async fn sealed_barrier_refuses_operations() {
    let h = harness_with_unseal(false).await;
    assert!(h.barrier.status().sealed);
    assert!(matches!(h.barrier.encrypt(b"x").await.unwrap_err(), KmsError::Sealed(_)));
    assert!(matches!(h.barrier.rotate_content_key().await.unwrap_err(), KmsError::Sealed(_)));
}

#[tokio::test]
async fn content_rotation_preserves_old_ciphertexts() {
    let h = harness().await;
    let old = h.barrier.encrypt(b"before rotation").await.unwrap();
    let old_kid = codec_kid(&old);

    h.barrier.rotate_content_key().await.unwrap();

    // Old ciphertext still opens; new ciphertexts use the new key.
    assert_eq!(h.barrier.decrypt(&old).await.unwrap(), b"before rotation");
    let new = h.barrier.encrypt(b"after rotation").await.unwrap();
    assert_ne!(codec_kid(&new), old_kid);
    assert_eq!(h.barrier.decrypt(&new).await.unwrap(), b"after rotation");
}

#[tokio::test]
async fn every_rotation_level_preserves_decrypt() {
    let h = harness().await;
    let mut ciphertexts = vec![h.barrier.encrypt(b"generation 0").await.unwrap()];

    h.barrier.rotate_content_key().await.unwrap();
    ciphertexts.push(h.barrier.encrypt(b"generation 1").await.unwrap());

    h.barrier.rotate_intermediate_key().await.unwrap();
    ciphertexts.push(h.barrier.encrypt(b"generation 2").await.unwrap());

    h.barrier.rotate_root_key().await.unwrap();
    ciphertexts.push(h.barrier.encrypt(b"generation 3").await.unwrap());

    h.barrier.rotate_content_key().await.unwrap();
    h.barrier.rotate_intermediate_key().await.unwrap();

    for (generation, ciphertext) in ciphertexts.iter().enumerate() {
        let plaintext = h.barrier.decrypt(ciphertext).await.unwrap();
        assert_eq!(plaintext, format!("generation {generation}").as_bytes());
    }
}

#[tokio::test]
async fn status_reports_current_key_ids() {
    let h = harness().await;
    let before = h.barrier.status();
    assert!(!before.sealed);
    let content_before = before.content_key_id.unwrap();

    h.barrier.rotate_content_key().await.unwrap();
    let after = h.barrier.status();
    assert_ne!(after.content_key_id.unwrap(), content_before);
    assert_eq!(after.root_key_id, before.root_key_id);
}

#[tokio::test]
async fn reopen_with_same_secret_decrypts_old_blobs() {
    let h = harness().await;
    let ciphertext = h.barrier.encrypt(b"survives restart").await.unwrap();
    h.barrier.rotate_content_key().await.unwrap();
    let later = h.barrier.encrypt(b"current generation").await.unwrap();

    // A second barrier over the same store, as after a process restart.
    let repository = Arc::new(SqliteBarrierKeyRepository::new(h.db.clone()));
    let reopened = KeyBarrier::new(repository, Arc::new(RustJoseCodec::new()));
    unseal_with_secret(&reopened, "integration-test-secret").await;

    assert_eq!(reopened.decrypt(&ciphertext).await.unwrap(), b"survives restart");
    assert_eq!(reopened.decrypt(&later).await.unwrap(), b"current generation");
}

#[tokio::test]
async fn wrong_secret_leaves_barrier_sealed() {
    let h = harness().await;

    let repository = Arc::new(SqliteBarrierKeyRepository::new(h.db.clone()));
    let reopened = KeyBarrier::new(repository, Arc::new(RustJoseCodec::new()));
    let material = match unseal::gather(UnsealMode::Direct, &["wrong secret".to_string()], None).unwrap() {
        UnsealAttempt::Ready(material) => material,
        UnsealAttempt::Pending { .. } => unreachable!(),
    };
    let error = reopened.unseal(material).await.unwrap_err();
    assert!(matches!(error, KmsError::Sealed(_)));
    assert!(reopened.status().sealed);

    // The right secret still works afterwards.
    unseal_with_secret(&reopened, "integration-test-secret").await;
    assert!(!reopened.status().sealed);
}

#[tokio::test]
async fn unknown_content_kid_is_rejected() {
    let h = harness().await;
    // Ciphertext from an unrelated barrier (fresh store): its content key
    // id exists nowhere in ours.
    let other = harness().await;
    let foreign = other.barrier.encrypt(b"foreign").await.unwrap();
    let error = h.barrier.decrypt(&foreign).await.unwrap_err();
    assert!(matches!(error, KmsError::Validation(_)));
}

#[tokio::test]
async fn concurrent_encrypts_during_rotation() {
    let h = harness().await;
    let barrier = h.barrier.clone();

    let mut tasks = Vec::new();
    for i in 0..8 {
        let barrier = barrier.clone();
        tasks.push(tokio::spawn(async move {
            let payload = format!("payload {i}");
            let ciphertext = barrier.encrypt(payload.as_bytes()).await?;
            barrier.decrypt(&ciphertext).await
        }));
    }
    for _ in 0..3 {
        barrier.rotate_content_key().await.unwrap();
    }
    for task in tasks {
        assert!(task.await.unwrap().is_ok());
    }
}
