// /////////////////////////////////////////////////////////////////////////////
// Elastic KMS
// Copyright (c) 2025 Elastic KMS Contributors
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Shared-mode unseal: M-of-N shares gathered from file sources, late
//! share arrival, and wrong shares leaving the service sealed.

use std::fs;
use std::sync::Arc;

use elastic_kms::infrastructure::barrier::shamir;
use elastic_kms::infrastructure::barrier::{unseal, KeyBarrier, UnsealAttempt};
use elastic_kms::infrastructure::codec::RustJoseCodec;
use elastic_kms::infrastructure::repositories::{connect, migrate, SqliteBarrierKeyRepository};
use elastic_kms_bootstrap::config::UnsealMode;
use elastic_kms_domain::Barrier;

struct ShareFiles {
    directory: tempfile::TempDir,
    inputs: Vec<String>,
}

impl ShareFiles {
    fn new(count: usize) -> Self {
        let directory = tempfile::tempdir().unwrap();
        let inputs = (0..count)
            .map(|i| format!("file:{}", directory.path().join(format!("share-{i}")).display()))
            .collect();
        Self { directory, inputs }
    }

    fn write(&self, slot: usize, share: &shamir::Share) {
        let path = self.directory.path().join(format!("share-{slot}"));
        fs::write(path, format!("{}:{}", share.x, hex::encode(&share.data))).unwrap();
    }
}

#[tokio::test]
async fn shares_arriving_late_complete_the_unseal() {
    let secret = b"the shared deployment secret".to_vec();
    let shares = shamir::split(&secret, 3, 5).unwrap();
    let files = ShareFiles::new(3);

    // Two of three present: still pending.
    files.write(0, &shares[0]);
    files.write(1, &shares[1]);
    match unseal::gather(UnsealMode::Shared, &files.inputs, Some(3)).unwrap() {
        UnsealAttempt::Pending { have, need } => {
            assert_eq!(have, 2);
            assert_eq!(need, 3);
        }
        UnsealAttempt::Ready(_) => panic!("two shares must not satisfy a threshold of three"),
    }

    // The third share lands (as S3's late submission) and the very next
    // poll derives the key and unseals.
    files.write(2, &shares[4]);
    let material = match unseal::gather(UnsealMode::Shared, &files.inputs, Some(3)).unwrap() {
        UnsealAttempt::Ready(material) => material,
        UnsealAttempt::Pending { .. } => panic!("three shares must be enough"),
    };

    let db = connect("sqlite::memory:").await.unwrap();
    migrate(&db).await.unwrap();
    let barrier = KeyBarrier::new(
        Arc::new(SqliteBarrierKeyRepository::new(db)),
        Arc::new(RustJoseCodec::new()),
    );
    barrier.unseal(material).await.unwrap();
    assert!(!barrier.status().sealed);

    let ciphertext = barrier.encrypt(b"post-unseal").await.unwrap();
    assert_eq!(barrier.decrypt(&ciphertext).await.unwrap(), b"post-unseal");
}

#[tokio::test]
async fn wrong_shares_leave_the_service_sealed() {
    let secret = b"the real secret".to_vec();
    let shares = shamir::split(&secret, 2, 3).unwrap();

    // Initialize a hierarchy under the correct combination.
    let db = connect("sqlite::memory:").await.unwrap();
    migrate(&db).await.unwrap();
    let files = ShareFiles::new(2);
    files.write(0, &shares[0]);
    files.write(1, &shares[1]);
    let material = match unseal::gather(UnsealMode::Shared, &files.inputs, Some(2)).unwrap() {
        UnsealAttempt::Ready(material) => material,
        UnsealAttempt::Pending { .. } => panic!("expected ready"),
    };
    let barrier = KeyBarrier::new(
        Arc::new(SqliteBarrierKeyRepository::new(db.clone())),
        Arc::new(RustJoseCodec::new()),
    );
    barrier.unseal(material).await.unwrap();

    // Shares of a different secret combine fine but open nothing.
    let wrong = shamir::split(b"an impostor secret", 2, 3).unwrap();
    files.write(0, &wrong[0]);
    files.write(1, &wrong[1]);
    let impostor = match unseal::gather(UnsealMode::Shared, &files.inputs, Some(2)).unwrap() {
        UnsealAttempt::Ready(material) => material,
        UnsealAttempt::Pending { .. } => panic!("expected ready"),
    };

    let reopened = KeyBarrier::new(
        Arc::new(SqliteBarrierKeyRepository::new(db)),
        Arc::new(RustJoseCodec::new()),
    );
    assert!(reopened.unseal(impostor).await.is_err());
    assert!(reopened.status().sealed);
}

#[tokio::test]
async fn different_share_subsets_derive_the_same_key() {
    let secret = b"subset independence".to_vec();
    let shares = shamir::split(&secret, 2, 4).unwrap();

    let files_a = ShareFiles::new(2);
    files_a.write(0, &shares[0]);
    files_a.write(1, &shares[3]);
    let files_b = ShareFiles::new(2);
    files_b.write(0, &shares[1]);
    files_b.write(1, &shares[2]);

    let db = connect("sqlite::memory:").await.unwrap();
    migrate(&db).await.unwrap();

    let material_a = match unseal::gather(UnsealMode::Shared, &files_a.inputs, Some(2)).unwrap() {
        UnsealAttempt::Ready(material) => material,
        UnsealAttempt::Pending { .. } => panic!("expected ready"),
    };
    let barrier = KeyBarrier::new(
        Arc::new(SqliteBarrierKeyRepository::new(db.clone())),
        Arc::new(RustJoseCodec::new()),
    );
    barrier.unseal(material_a).await.unwrap();
    let ciphertext = barrier.encrypt(b"cross-subset").await.unwrap();

    let material_b = match unseal::gather(UnsealMode::Shared, &files_b.inputs, Some(2)).unwrap() {
        UnsealAttempt::Ready(material) => material,
        UnsealAttempt::Pending { .. } => panic!("expected ready"),
    };
    let reopened = KeyBarrier::new(
        Arc::new(SqliteBarrierKeyRepository::new(db)),
        Arc::new(RustJoseCodec::new()),
    );
    reopened.unseal(material_b).await.unwrap();
    assert_eq!(reopened.decrypt(&ciphertext).await.unwrap(), b"cross-subset");
}
