// /////////////////////////////////////////////////////////////////////////////
// Elastic KMS
// Copyright (c) 2025 Elastic KMS Contributors
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Crypto Service
//!
//! The orchestration core for every crypto operation: generate, import,
//! encrypt, decrypt, sign, verify. The flow is always the same: resolve
//! the elastic key, check the capability against the algorithm, resolve
//! material (latest active for protect, `kid`-addressed for unprotect),
//! unwrap it through the barrier, hand the plaintext JWK to the codec.
//!
//! Material selection rules:
//! - encrypt/sign use the latest `active` version;
//! - decrypt accepts `active` and `expired`, never `revoked`;
//! - verify with a revoked `kid` reports `valid: false` instead of
//!   failing.

use std::sync::Arc;

use elastic_kms_domain::repositories::{ElasticKeyRepository, MaterialKeyRepository};
use elastic_kms_domain::{
    Barrier, ElasticKey, ElasticKeyStatus, JoseCodec, Jwk, KeyCapability, KeySource, KmsError,
    MaterialKey, MaterialKeyStatus, NewMaterialKey,
};
use uuid::Uuid;

/// Result of a verify operation.
#[derive(Debug, Clone)]
pub struct VerifyOutcome {
    pub payload: Option<Vec<u8>>,
    pub valid: bool,
}

pub struct CryptoService {
    elastic_keys: Arc<dyn ElasticKeyRepository>,
    material_keys: Arc<dyn MaterialKeyRepository>,
    barrier: Arc<dyn Barrier>,
    key_source: Arc<dyn KeySource>,
    codec: Arc<dyn JoseCodec>,
}

impl CryptoService {
    pub fn new(
        elastic_keys: Arc<dyn ElasticKeyRepository>,
        material_keys: Arc<dyn MaterialKeyRepository>,
        barrier: Arc<dyn Barrier>,
        key_source: Arc<dyn KeySource>,
        codec: Arc<dyn JoseCodec>,
    ) -> Self {
        Self {
            elastic_keys,
            material_keys,
            barrier,
            key_source,
            codec,
        }
    }

    /// Creates the next material version from the generation pool.
    ///
    /// The insert races other generators on the unique version
    /// constraint; the loser retries once against the next number before
    /// surfacing `Conflict`.
    pub async fn generate(&self, elastic_key_id: Uuid) -> Result<MaterialKey, KmsError> {
        let mut key = self.elastic_keys.get(elastic_key_id).await?;
        if !matches!(key.status, ElasticKeyStatus::Active | ElasticKeyStatus::PendingGenerate) {
            return Err(KmsError::validation(format!(
                "elastic key {} cannot generate material in status {}",
                key.id,
                key.status.as_str()
            )));
        }
        self.check_versioning(&key).await?;

        let mut jwk = self.key_source.take(key.algorithm).await?;
        let material_id = Uuid::new_v4();
        jwk.kid = Some(material_id.to_string());
        let wrapped = self.wrap_material(&jwk).await?;

        let new = NewMaterialKey {
            id: material_id,
            elastic_key_id: key.id,
            material: wrapped,
            imported: false,
        };
        let inserted = match self.material_keys.add_versioned(&new).await {
            Err(KmsError::Conflict(_)) => {
                // Lost the version race; the policy may have been spent by
                // the winner.
                self.check_versioning(&key).await?;
                self.material_keys.add_versioned(&new).await?
            }
            other => other?,
        };

        if key.status == ElasticKeyStatus::PendingGenerate {
            key.transition_to(ElasticKeyStatus::Active)?;
            self.elastic_keys.update(&key).await?;
        }
        tracing::info!(elastic_key = %key.id, version = inserted.version, "generated material key");
        Ok(inserted)
    }

    /// Imports externally supplied material as the next version.
    pub async fn import(&self, elastic_key_id: Uuid, mut jwk: Jwk) -> Result<MaterialKey, KmsError> {
        let mut key = self.elastic_keys.get(elastic_key_id).await?;
        if !key.import_allowed {
            return Err(KmsError::forbidden(format!(
                "elastic key {} does not allow material import",
                key.id
            )));
        }
        if !matches!(
            key.status,
            ElasticKeyStatus::Active | ElasticKeyStatus::PendingImport | ElasticKeyStatus::PendingGenerate
        ) {
            return Err(KmsError::validation(format!(
                "elastic key {} cannot import material in status {}",
                key.id,
                key.status.as_str()
            )));
        }
        jwk.validate_for(key.algorithm)?;
        if !jwk.is_private() {
            return Err(KmsError::validation("imported material must include private parameters"));
        }
        self.check_versioning(&key).await?;

        let material_id = Uuid::new_v4();
        jwk.kid = Some(material_id.to_string());
        jwk.alg = Some(key.algorithm.name().to_string());
        let wrapped = self.wrap_material(&jwk).await?;

        let new = NewMaterialKey {
            id: material_id,
            elastic_key_id: key.id,
            material: wrapped,
            imported: true,
        };
        let inserted = match self.material_keys.add_versioned(&new).await {
            Err(KmsError::Conflict(_)) => {
                self.check_versioning(&key).await?;
                self.material_keys.add_versioned(&new).await?
            }
            other => other?,
        };

        if matches!(key.status, ElasticKeyStatus::PendingImport | ElasticKeyStatus::PendingGenerate) {
            key.transition_to(ElasticKeyStatus::Active)?;
            self.elastic_keys.update(&key).await?;
        }
        tracing::info!(elastic_key = %key.id, version = inserted.version, "imported material key");
        Ok(inserted)
    }

    pub async fn encrypt(&self, elastic_key_id: Uuid, plaintext: &[u8]) -> Result<String, KmsError> {
        let key = self.operational_key(elastic_key_id, KeyCapability::Encrypt).await?;
        let material = self.latest_active_material(&key).await?;
        let jwk = self.unwrap_material(&material).await?;
        self.codec.wrap(plaintext, &jwk)
    }

    pub async fn decrypt(&self, elastic_key_id: Uuid, jwe: &str) -> Result<Vec<u8>, KmsError> {
        let key = self.operational_key(elastic_key_id, KeyCapability::Decrypt).await?;
        let material = self.material_by_kid(&key, jwe).await?;
        if !material.status.usable_for_unprotect() {
            return Err(KmsError::forbidden("material key has been revoked"));
        }
        let jwk = self.unwrap_material(&material).await?;
        self.codec.unwrap(jwe, &jwk)
    }

    pub async fn sign(&self, elastic_key_id: Uuid, payload: &[u8]) -> Result<String, KmsError> {
        let key = self.operational_key(elastic_key_id, KeyCapability::Sign).await?;
        let material = self.latest_active_material(&key).await?;
        let jwk = self.unwrap_material(&material).await?;
        self.codec.sign(payload, &jwk)
    }

    pub async fn verify(&self, elastic_key_id: Uuid, jws: &str) -> Result<VerifyOutcome, KmsError> {
        let key = self.operational_key(elastic_key_id, KeyCapability::Verify).await?;
        let material = self.material_by_kid(&key, jws).await?;
        if material.status == MaterialKeyStatus::Revoked {
            return Ok(VerifyOutcome { payload: None, valid: false });
        }
        let jwk = self.unwrap_material(&material).await?;
        match self.codec.verify(jws, &jwk) {
            Ok(payload) => Ok(VerifyOutcome { payload: Some(payload), valid: true }),
            Err(KmsError::Validation(_)) => Ok(VerifyOutcome { payload: None, valid: false }),
            Err(other) => Err(other),
        }
    }

    /// Decrypts a stored material blob back into its plaintext JWK. Used
    /// by the export path; callers enforce the export policy.
    pub async fn unwrap_material(&self, material: &MaterialKey) -> Result<Jwk, KmsError> {
        let payload = self.barrier.decrypt(&material.material).await?;
        let json = String::from_utf8(payload)
            .map_err(|_| KmsError::internal("material blob is not UTF-8"))?;
        Jwk::from_json(&json)
    }

    async fn wrap_material(&self, jwk: &Jwk) -> Result<String, KmsError> {
        self.barrier.encrypt(jwk.to_json()?.as_bytes()).await
    }

    async fn operational_key(
        &self,
        elastic_key_id: Uuid,
        capability: KeyCapability,
    ) -> Result<ElasticKey, KmsError> {
        let key = self.elastic_keys.get(elastic_key_id).await?;
        if !key.status.is_operational() {
            return Err(KmsError::validation(format!(
                "elastic key {} is not active (status {})",
                key.id,
                key.status.as_str()
            )));
        }
        if !key.algorithm.supports(capability) {
            return Err(KmsError::validation(format!(
                "algorithm {} does not support {:?}",
                key.algorithm, capability
            )));
        }
        Ok(key)
    }

    async fn latest_active_material(&self, key: &ElasticKey) -> Result<MaterialKey, KmsError> {
        self.material_keys
            .get_latest_active(key.id)
            .await?
            .ok_or_else(|| KmsError::conflict(format!("elastic key {} has no active material key", key.id)))
    }

    /// Resolves the material version a token's `kid` names, and rejects
    /// tokens whose material belongs to a different elastic key.
    async fn material_by_kid(&self, key: &ElasticKey, compact: &str) -> Result<MaterialKey, KmsError> {
        let kid = self
            .codec
            .peek_kid(compact)?
            .ok_or_else(|| KmsError::validation("token has no kid header"))?;
        let material_id =
            Uuid::parse_str(&kid).map_err(|_| KmsError::validation("token kid is not a material key id"))?;
        let material = match self.material_keys.get(material_id).await {
            Err(KmsError::NotFound(_)) => {
                return Err(KmsError::validation("token kid references an unknown material key"))
            }
            other => other?,
        };
        if material.elastic_key_id != key.id {
            return Err(KmsError::validation(
                "token kid references a material key of a different elastic key",
            ));
        }
        Ok(material)
    }

    async fn check_versioning(&self, key: &ElasticKey) -> Result<(), KmsError> {
        if key.versioning_allowed {
            return Ok(());
        }
        if self.material_keys.get_latest(key.id).await?.is_some() {
            return Err(KmsError::validation(format!(
                "elastic key {} does not allow versioning and already has material",
                key.id
            )));
        }
        Ok(())
    }
}
