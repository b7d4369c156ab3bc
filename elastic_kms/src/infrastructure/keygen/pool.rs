// /////////////////////////////////////////////////////////////////////////////
// Elastic KMS
// Copyright (c) 2025 Elastic KMS Contributors
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Key Generation Pools
//!
//! One producer task per algorithm feeds a bounded channel of fresh,
//! unwrapped JWKs so request handlers never wait on key generation.
//! Producers block while the buffer is full (the channel's backpressure
//! is the high-water mark), refill as consumers drain it, retry
//! generation failures with exponential backoff, and exit only when the
//! shutdown token fires. Buffered keys remain takeable during drain.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use elastic_kms_bootstrap::CancellationToken;
use elastic_kms_domain::{Jwk, KeyAlgorithm, KeySource, KmsError};
use tokio::sync::mpsc;

use crate::infrastructure::codec::keys::generate_jwk;

const BACKOFF_INITIAL: Duration = Duration::from_millis(100);
const BACKOFF_CAP: Duration = Duration::from_secs(2);

struct AlgorithmPool {
    receiver: tokio::sync::Mutex<mpsc::Receiver<Jwk>>,
    depth: Arc<AtomicUsize>,
}

/// Per-algorithm pre-generation pools.
pub struct KeyPools {
    pools: HashMap<KeyAlgorithm, AlgorithmPool>,
}

impl KeyPools {
    /// Spawns one producer per algorithm, each with a buffer of
    /// `capacity` keys, all tied to `token` for cooperative drain.
    pub fn spawn(algorithms: &[KeyAlgorithm], capacity: usize, token: CancellationToken) -> Self {
        let mut pools = HashMap::with_capacity(algorithms.len());
        for &algorithm in algorithms {
            let (sender, receiver) = mpsc::channel(capacity);
            let depth = Arc::new(AtomicUsize::new(0));
            tokio::spawn(producer(algorithm, sender, Arc::clone(&depth), token.clone()));
            pools.insert(
                algorithm,
                AlgorithmPool {
                    receiver: tokio::sync::Mutex::new(receiver),
                    depth,
                },
            );
        }
        Self { pools }
    }

    /// True once every pool holds at least one key. Part of readiness.
    pub fn primed(&self) -> bool {
        self.pools.values().all(|pool| pool.depth.load(Ordering::Relaxed) > 0)
    }

    /// Current buffered depth for an algorithm (metrics).
    pub fn depth(&self, algorithm: KeyAlgorithm) -> usize {
        self.pools
            .get(&algorithm)
            .map(|pool| pool.depth.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    pub fn algorithms(&self) -> impl Iterator<Item = KeyAlgorithm> + '_ {
        self.pools.keys().copied()
    }
}

#[async_trait]
impl KeySource for KeyPools {
    async fn take(&self, algorithm: KeyAlgorithm) -> Result<Jwk, KmsError> {
        let pool = self
            .pools
            .get(&algorithm)
            .ok_or_else(|| KmsError::validation(format!("no key pool configured for {algorithm}")))?;
        let mut receiver = pool.receiver.lock().await;
        match receiver.recv().await {
            Some(jwk) => {
                pool.depth.fetch_sub(1, Ordering::Relaxed);
                Ok(jwk)
            }
            None => Err(KmsError::sealed("key pools are draining for shutdown")),
        }
    }
}

async fn producer(
    algorithm: KeyAlgorithm,
    sender: mpsc::Sender<Jwk>,
    depth: Arc<AtomicUsize>,
    token: CancellationToken,
) {
    let mut backoff = BACKOFF_INITIAL;
    loop {
        // Wait for buffer space first so a full pool costs nothing.
        let permit = tokio::select! {
            _ = token.cancelled() => break,
            permit = sender.reserve() => match permit {
                Ok(permit) => permit,
                Err(_) => break,
            },
        };

        // Asymmetric generation (RSA in particular) is expensive; keep it
        // off the async workers.
        let generated = tokio::task::spawn_blocking(move || generate_jwk(algorithm)).await;
        match generated {
            Ok(Ok(jwk)) => {
                permit.send(jwk);
                depth.fetch_add(1, Ordering::Relaxed);
                backoff = BACKOFF_INITIAL;
            }
            Ok(Err(error)) => {
                drop(permit);
                tracing::warn!(%algorithm, %error, backoff_ms = backoff.as_millis() as u64, "key generation failed, backing off");
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = tokio::time::sleep(backoff) => {}
                }
                backoff = (backoff * 2).min(BACKOFF_CAP);
            }
            Err(join_error) => {
                drop(permit);
                tracing::error!(%algorithm, %join_error, "key generation task panicked, backing off");
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = tokio::time::sleep(backoff) => {}
                }
                backoff = (backoff * 2).min(BACKOFF_CAP);
            }
        }
    }
    tracing::debug!(%algorithm, "key pool producer drained");
}

#[cfg(test)]
mod tests {
    use super::*;
    use elastic_kms_bootstrap::ShutdownCoordinator;

    fn token() -> CancellationToken {
        ShutdownCoordinator::default().token()
    }

    #[tokio::test]
    async fn take_returns_fresh_keys() {
        let pools = KeyPools::spawn(&[KeyAlgorithm::A256Gcm], 3, token());
        let jwk = pools.take(KeyAlgorithm::A256Gcm).await.unwrap();
        assert_eq!(jwk.kty, "oct");
        assert_eq!(jwk.alg.as_deref(), Some("A256GCM"));
    }

    #[tokio::test]
    async fn unconfigured_algorithm_is_rejected() {
        let pools = KeyPools::spawn(&[KeyAlgorithm::A256Gcm], 1, token());
        assert!(pools.take(KeyAlgorithm::Hs256).await.is_err());
    }

    #[tokio::test]
    async fn burst_larger_than_capacity_never_drops() {
        let pools = Arc::new(KeyPools::spawn(&[KeyAlgorithm::Hs256], 1, token()));
        let mut handles = Vec::new();
        for _ in 0..10 {
            let pools = Arc::clone(&pools);
            handles.push(tokio::spawn(async move { pools.take(KeyAlgorithm::Hs256).await }));
        }
        for handle in handles {
            assert!(handle.await.unwrap().is_ok());
        }
    }

    #[tokio::test]
    async fn primed_flips_once_buffered() {
        let pools = KeyPools::spawn(&[KeyAlgorithm::Hs256], 2, token());
        for _ in 0..50 {
            if pools.primed() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("pool never primed");
    }

    #[tokio::test]
    async fn shutdown_drains_buffered_keys_then_closes() {
        let coordinator = ShutdownCoordinator::default();
        let pools = KeyPools::spawn(&[KeyAlgorithm::Hs256], 2, coordinator.token());

        // Let the producer fill the buffer, then stop it.
        for _ in 0..50 {
            if pools.depth(KeyAlgorithm::Hs256) == 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        coordinator.initiate_shutdown();
        tokio::time::sleep(Duration::from_millis(20)).await;

        // Buffered keys are still takeable; afterwards the pool reports
        // drain instead of hanging.
        assert!(pools.take(KeyAlgorithm::Hs256).await.is_ok());
        assert!(pools.take(KeyAlgorithm::Hs256).await.is_ok());
        assert!(pools.take(KeyAlgorithm::Hs256).await.is_err());
    }
}
