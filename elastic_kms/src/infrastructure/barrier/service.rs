// /////////////////////////////////////////////////////////////////////////////
// Elastic KMS
// Copyright (c) 2025 Elastic KMS Contributors
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Barrier Service
//!
//! Owner of the unseal → root → intermediate → content hierarchy.
//!
//! In-memory state is the unwrapped current JWK of each level plus the
//! unseal key, behind an `RwLock`; `None` means sealed. Encrypt/decrypt
//! take the lock shared and only long enough to clone the keys they need,
//! so requests keep flowing against the pre-rotation content key while a
//! rotation's transaction is in flight. Rotations serialize on their own
//! async mutex, commit the database transaction first and swap the cached
//! state after, which is why no request can ever observe a half-rotated
//! hierarchy.
//!
//! Decrypting a blob wrapped by a historical content key walks the
//! persisted rows upward (content → wrapping intermediate → wrapping
//! root, at most one step per tier) and caches the unwrapped content key
//! in a bounded LRU. The cache lives in memory only.

use std::num::NonZeroUsize;
use std::sync::Arc;

use async_trait::async_trait;
use elastic_kms_domain::{
    Barrier, BarrierKeyRecord, BarrierLevel, BarrierStatus, JoseCodec, Jwk, KeyAlgorithm, KmsError,
};
use elastic_kms_domain::repositories::BarrierKeyRepository;
use lru::LruCache;
use parking_lot::{Mutex, RwLock};
use uuid::Uuid;

use crate::infrastructure::codec::keys::generate_jwk;

use super::unseal::UnsealMaterial;

/// Unwrapped historical content keys kept in memory.
const HISTORY_CAPACITY: usize = 64;

struct CachedKey {
    id: Uuid,
    jwk: Jwk,
}

impl CachedKey {
    fn clone_jwk(&self) -> Jwk {
        self.jwk.clone()
    }
}

struct BarrierState {
    unseal_jwk: Jwk,
    root: CachedKey,
    intermediate: CachedKey,
    content: CachedKey,
}

/// Hierarchical encryption-at-rest service over a persisted key tree.
pub struct KeyBarrier {
    repository: Arc<dyn BarrierKeyRepository>,
    codec: Arc<dyn JoseCodec>,
    state: RwLock<Option<BarrierState>>,
    history: Mutex<LruCache<Uuid, Jwk>>,
    /// Serializes rotations against each other (not against requests).
    rotation: tokio::sync::Mutex<()>,
}

impl KeyBarrier {
    pub fn new(repository: Arc<dyn BarrierKeyRepository>, codec: Arc<dyn JoseCodec>) -> Self {
        Self {
            repository,
            codec,
            state: RwLock::new(None),
            history: Mutex::new(LruCache::new(
                NonZeroUsize::new(HISTORY_CAPACITY).expect("capacity is non-zero"),
            )),
            rotation: tokio::sync::Mutex::new(()),
        }
    }

    /// Unseals the barrier: initializes the hierarchy on first boot,
    /// otherwise unwraps the current chain with the derived unseal key.
    ///
    /// A failure to open the root row means the unseal input is wrong (or
    /// the row is corrupt); the barrier stays sealed and the error says
    /// so. A failure further down the chain can only be corruption and is
    /// reported as internal.
    pub async fn unseal(&self, material: UnsealMaterial) -> Result<(), KmsError> {
        if self.state.read().is_some() {
            return Ok(());
        }

        let unseal_jwk = material.jwk().clone();
        let state = match self.repository.current(BarrierLevel::Root).await? {
            None => self.initialize_hierarchy(unseal_jwk).await?,
            Some(root_row) => {
                let root_jwk = self
                    .unwrap_level(&root_row, &unseal_jwk)
                    .map_err(|_| KmsError::sealed("unseal key cannot open the root key"))?;

                let intermediate_row = self
                    .repository
                    .current(BarrierLevel::Intermediate)
                    .await?
                    .ok_or_else(|| KmsError::internal("hierarchy has a root but no intermediate"))?;
                let intermediate_jwk = self
                    .unwrap_level(&intermediate_row, &root_jwk)
                    .map_err(|_| KmsError::internal("intermediate key is not wrapped by the current root"))?;

                let content_row = self
                    .repository
                    .current(BarrierLevel::Content)
                    .await?
                    .ok_or_else(|| KmsError::internal("hierarchy has a root but no content key"))?;
                let content_jwk = self
                    .unwrap_level(&content_row, &intermediate_jwk)
                    .map_err(|_| KmsError::internal("content key is not wrapped by the current intermediate"))?;

                BarrierState {
                    unseal_jwk,
                    root: CachedKey { id: root_row.id, jwk: root_jwk },
                    intermediate: CachedKey { id: intermediate_row.id, jwk: intermediate_jwk },
                    content: CachedKey { id: content_row.id, jwk: content_jwk },
                }
            }
        };

        *self.state.write() = Some(state);
        tracing::info!("barrier unsealed");
        Ok(())
    }

    /// Clears all in-memory key material. The dropped JWKs zeroize their
    /// private parameters.
    pub fn seal(&self) {
        *self.state.write() = None;
        self.history.lock().clear();
        tracing::info!("barrier sealed, in-memory key material cleared");
    }

    async fn initialize_hierarchy(&self, unseal_jwk: Jwk) -> Result<BarrierState, KmsError> {
        let root = fresh_wrapping_key()?;
        let intermediate = fresh_wrapping_key()?;
        let content = fresh_wrapping_key()?;

        let root_row = BarrierKeyRecord::new(parse_kid(&root)?, self.wrap_level(&root, &unseal_jwk)?);
        let intermediate_row =
            BarrierKeyRecord::new(parse_kid(&intermediate)?, self.wrap_level(&intermediate, &root)?);
        let content_row =
            BarrierKeyRecord::new(parse_kid(&content)?, self.wrap_level(&content, &intermediate)?);

        self.repository
            .init_hierarchy(&root_row, &intermediate_row, &content_row)
            .await?;
        tracing::info!(
            root = %root_row.id,
            intermediate = %intermediate_row.id,
            content = %content_row.id,
            "initialized barrier hierarchy"
        );

        Ok(BarrierState {
            unseal_jwk,
            root: CachedKey { id: root_row.id, jwk: root },
            intermediate: CachedKey { id: intermediate_row.id, jwk: intermediate },
            content: CachedKey { id: content_row.id, jwk: content },
        })
    }

    fn wrap_level(&self, jwk: &Jwk, wrapping: &Jwk) -> Result<String, KmsError> {
        self.codec.wrap(jwk.to_json()?.as_bytes(), wrapping)
    }

    fn unwrap_level(&self, row: &BarrierKeyRecord, wrapping: &Jwk) -> Result<Jwk, KmsError> {
        let payload = self.codec.unwrap(&row.serialized, wrapping)?;
        let json = String::from_utf8(payload)
            .map_err(|_| KmsError::internal("unwrapped key payload is not UTF-8"))?;
        Jwk::from_json(&json)
    }

    /// Snapshot of the current keys for request-path use.
    fn current_keys(&self) -> Result<(CachedKey, CachedKey, CachedKey, Jwk), KmsError> {
        let guard = self.state.read();
        let state = guard.as_ref().ok_or_else(|| KmsError::sealed("barrier is sealed"))?;
        Ok((
            CachedKey { id: state.root.id, jwk: state.root.clone_jwk() },
            CachedKey { id: state.intermediate.id, jwk: state.intermediate.clone_jwk() },
            CachedKey { id: state.content.id, jwk: state.content.clone_jwk() },
            state.unseal_jwk.clone(),
        ))
    }

    /// Resolves a (possibly historical) content key by id, walking the
    /// hierarchy at most one level per tier.
    async fn resolve_content_key(&self, kid: Uuid) -> Result<Jwk, KmsError> {
        let (root, intermediate, content, unseal_jwk) = self.current_keys()?;
        if content.id == kid {
            return Ok(content.jwk);
        }
        if let Some(jwk) = self.history.lock().get(&kid) {
            return Ok(jwk.clone());
        }

        let content_row = match self.repository.get(BarrierLevel::Content, kid).await {
            Ok(row) => row,
            Err(KmsError::NotFound(_)) => {
                return Err(KmsError::validation("ciphertext references an unknown content key"))
            }
            Err(e) => return Err(e),
        };

        let intermediate_kid = self.wrapping_kid(&content_row.serialized)?;
        let intermediate_jwk = if intermediate_kid == intermediate.id {
            intermediate.jwk
        } else {
            let intermediate_row = self.repository.get(BarrierLevel::Intermediate, intermediate_kid).await?;
            let root_kid = self.wrapping_kid(&intermediate_row.serialized)?;
            let root_jwk = if root_kid == root.id {
                root.jwk
            } else {
                let root_row = self.repository.get(BarrierLevel::Root, root_kid).await?;
                self.unwrap_level(&root_row, &unseal_jwk)
                    .map_err(|_| KmsError::internal("historical root key cannot be opened"))?
            };
            self.unwrap_level(&intermediate_row, &root_jwk)
                .map_err(|_| KmsError::internal("historical intermediate key cannot be opened"))?
        };

        let content_jwk = self
            .unwrap_level(&content_row, &intermediate_jwk)
            .map_err(|_| KmsError::internal("historical content key cannot be opened"))?;
        self.history.lock().put(kid, content_jwk.clone());
        Ok(content_jwk)
    }

    fn wrapping_kid(&self, serialized: &str) -> Result<Uuid, KmsError> {
        let kid = self
            .codec
            .peek_kid(serialized)?
            .ok_or_else(|| KmsError::internal("hierarchy row has no wrapping kid"))?;
        Uuid::parse_str(&kid).map_err(|_| KmsError::internal("hierarchy kid is not a UUID"))
    }
}

#[async_trait]
impl Barrier for KeyBarrier {
    async fn encrypt(&self, plaintext: &[u8]) -> Result<String, KmsError> {
        let (_, _, content, _) = self.current_keys()?;
        self.codec.wrap(plaintext, &content.jwk)
    }

    async fn decrypt(&self, ciphertext: &str) -> Result<Vec<u8>, KmsError> {
        let kid = self
            .codec
            .peek_kid(ciphertext)?
            .ok_or_else(|| KmsError::validation("ciphertext has no kid"))?;
        let kid = Uuid::parse_str(&kid).map_err(|_| KmsError::validation("ciphertext kid is not a UUID"))?;
        let content_jwk = self.resolve_content_key(kid).await?;
        self.codec.unwrap(ciphertext, &content_jwk)
    }

    async fn rotate_content_key(&self) -> Result<(), KmsError> {
        let _serialized = self.rotation.lock().await;
        let (_, intermediate, old_content, _) = self.current_keys()?;

        let new_content = fresh_wrapping_key()?;
        let row = BarrierKeyRecord::new(parse_kid(&new_content)?, self.wrap_level(&new_content, &intermediate.jwk)?);
        self.repository.append_content(&row).await?;

        {
            let mut guard = self.state.write();
            if let Some(state) = guard.as_mut() {
                state.content = CachedKey { id: row.id, jwk: new_content };
            }
        }
        // Keep the retired key warm: blobs it wrapped are still in flight.
        self.history.lock().put(old_content.id, old_content.jwk);
        tracing::info!(content = %row.id, "rotated content key");
        Ok(())
    }

    async fn rotate_intermediate_key(&self) -> Result<(), KmsError> {
        let _serialized = self.rotation.lock().await;
        let (root, _, content, _) = self.current_keys()?;

        let new_intermediate = fresh_wrapping_key()?;
        let row = BarrierKeyRecord::new(
            parse_kid(&new_intermediate)?,
            self.wrap_level(&new_intermediate, &root.jwk)?,
        );
        let rewrapped_content = self.wrap_level(&content.jwk, &new_intermediate)?;
        self.repository
            .rotate_intermediate(&row, (content.id, rewrapped_content))
            .await?;

        {
            let mut guard = self.state.write();
            if let Some(state) = guard.as_mut() {
                state.intermediate = CachedKey { id: row.id, jwk: new_intermediate };
            }
        }
        tracing::info!(intermediate = %row.id, "rotated intermediate key");
        Ok(())
    }

    async fn rotate_root_key(&self) -> Result<(), KmsError> {
        let _serialized = self.rotation.lock().await;
        let (_, intermediate, _, unseal_jwk) = self.current_keys()?;

        let new_root = fresh_wrapping_key()?;
        let row = BarrierKeyRecord::new(parse_kid(&new_root)?, self.wrap_level(&new_root, &unseal_jwk)?);
        let rewrapped_intermediate = self.wrap_level(&intermediate.jwk, &new_root)?;
        self.repository
            .rotate_root(&row, (intermediate.id, rewrapped_intermediate))
            .await?;

        {
            let mut guard = self.state.write();
            if let Some(state) = guard.as_mut() {
                state.root = CachedKey { id: row.id, jwk: new_root };
            }
        }
        tracing::info!(root = %row.id, "rotated root key");
        Ok(())
    }

    fn status(&self) -> BarrierStatus {
        let guard = self.state.read();
        match guard.as_ref() {
            None => BarrierStatus::sealed(),
            Some(state) => BarrierStatus {
                sealed: false,
                root_key_id: Some(state.root.id),
                intermediate_key_id: Some(state.intermediate.id),
                content_key_id: Some(state.content.id),
            },
        }
    }
}

/// A fresh 256-bit wrapping key whose kid is its own row id.
fn fresh_wrapping_key() -> Result<Jwk, KmsError> {
    let mut jwk = generate_jwk(KeyAlgorithm::A256Kw)?;
    jwk.kid = Some(Uuid::new_v4().to_string());
    Ok(jwk)
}

fn parse_kid(jwk: &Jwk) -> Result<Uuid, KmsError> {
    let kid = jwk.kid.as_deref().ok_or_else(|| KmsError::internal("wrapping key has no kid"))?;
    Uuid::parse_str(kid).map_err(|_| KmsError::internal("wrapping key kid is not a UUID"))
}
