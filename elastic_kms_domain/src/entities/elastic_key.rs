// /////////////////////////////////////////////////////////////////////////////
// Elastic KMS
// Copyright (c) 2025 Elastic KMS Contributors
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Elastic Key Entity
//!
//! The logical, policy-bearing key container. An elastic key never holds
//! key bytes itself; concrete material lives in versioned
//! [`MaterialKey`](crate::entities::MaterialKey) rows underneath it.
//!
//! ## Lifecycle
//!
//! Status transitions form a DAG. Keys are born `PendingGenerate` (or
//! `PendingImport` when material will be imported), become `Active`, may
//! oscillate between `Active` and `Disabled`, and leave service through
//! the delete chain `PendingDelete → StartedDelete → FinishedDelete`.
//! Rows are soft-deleted: nothing is removed from storage before the
//! scheduled purge reaches `FinishedDelete`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::KmsError;
use crate::value_objects::KeyAlgorithm;

/// Origin of key material for an elastic key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyProvider {
    /// Keys produced by this service's generator pools.
    Internal,
}

impl KeyProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyProvider::Internal => "internal",
        }
    }

    pub fn parse(s: &str) -> Result<Self, KmsError> {
        match s {
            "internal" => Ok(KeyProvider::Internal),
            other => Err(KmsError::validation(format!("unknown provider '{other}'"))),
        }
    }
}

/// Lifecycle state of an elastic key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElasticKeyStatus {
    PendingGenerate,
    Active,
    PendingImport,
    Disabled,
    PendingDelete,
    StartedDelete,
    FinishedDelete,
}

impl ElasticKeyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ElasticKeyStatus::PendingGenerate => "pending_generate",
            ElasticKeyStatus::Active => "active",
            ElasticKeyStatus::PendingImport => "pending_import",
            ElasticKeyStatus::Disabled => "disabled",
            ElasticKeyStatus::PendingDelete => "pending_delete",
            ElasticKeyStatus::StartedDelete => "started_delete",
            ElasticKeyStatus::FinishedDelete => "finished_delete",
        }
    }

    pub fn parse(s: &str) -> Result<Self, KmsError> {
        match s {
            "pending_generate" => Ok(Self::PendingGenerate),
            "active" => Ok(Self::Active),
            "pending_import" => Ok(Self::PendingImport),
            "disabled" => Ok(Self::Disabled),
            "pending_delete" => Ok(Self::PendingDelete),
            "started_delete" => Ok(Self::StartedDelete),
            "finished_delete" => Ok(Self::FinishedDelete),
            other => Err(KmsError::validation(format!("unknown status '{other}'"))),
        }
    }

    /// Whether the DAG permits moving from `self` to `next`.
    ///
    /// Deletion is reachable from every pre-terminal state, always via
    /// `PendingDelete`.
    pub fn can_transition_to(&self, next: ElasticKeyStatus) -> bool {
        use ElasticKeyStatus::*;
        match (self, next) {
            (PendingGenerate, Active) => true,
            (PendingImport, Active) => true,
            (Active, Disabled) => true,
            (Disabled, Active) => true,
            (PendingGenerate | PendingImport | Active | Disabled, PendingDelete) => true,
            (PendingDelete, StartedDelete) => true,
            (StartedDelete, FinishedDelete) => true,
            _ => false,
        }
    }

    /// Terminal states accept no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ElasticKeyStatus::FinishedDelete)
    }

    /// States in which the key may serve crypto operations.
    pub fn is_operational(&self) -> bool {
        matches!(self, ElasticKeyStatus::Active)
    }
}

/// Logical key container.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElasticKey {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub provider: KeyProvider,
    pub algorithm: KeyAlgorithm,
    pub versioning_allowed: bool,
    pub import_allowed: bool,
    pub export_allowed: bool,
    pub status: ElasticKeyStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ElasticKey {
    /// Creates a new elastic key in its initial lifecycle state.
    ///
    /// Import-enabled keys start `PendingImport`; everything else starts
    /// `PendingGenerate` and activates when the first material version is
    /// generated.
    pub fn new(
        name: String,
        description: String,
        provider: KeyProvider,
        algorithm: KeyAlgorithm,
        versioning_allowed: bool,
        import_allowed: bool,
        export_allowed: bool,
    ) -> Result<Self, KmsError> {
        validate_name(&name)?;
        let now = Utc::now();
        let status = if import_allowed {
            ElasticKeyStatus::PendingImport
        } else {
            ElasticKeyStatus::PendingGenerate
        };
        Ok(Self {
            id: Uuid::new_v4(),
            name,
            description,
            provider,
            algorithm,
            versioning_allowed,
            import_allowed,
            export_allowed,
            status,
            created_at: now,
            updated_at: now,
        })
    }

    /// Applies a status transition, enforcing the DAG.
    pub fn transition_to(&mut self, next: ElasticKeyStatus) -> Result<(), KmsError> {
        if !self.status.can_transition_to(next) {
            return Err(KmsError::validation(format!(
                "illegal status transition {} -> {} for elastic key {}",
                self.status.as_str(),
                next.as_str(),
                self.id
            )));
        }
        self.status = next;
        self.updated_at = Utc::now();
        Ok(())
    }
}

fn validate_name(name: &str) -> Result<(), KmsError> {
    if name.is_empty() || name.len() > 255 {
        return Err(KmsError::validation("name must be 1..=255 characters"));
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')) {
        return Err(KmsError::validation(
            "name may contain only ASCII alphanumerics, '-', '_' and '.'",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> ElasticKey {
        ElasticKey::new(
            "orders-key".into(),
            String::new(),
            KeyProvider::Internal,
            KeyAlgorithm::A256Gcm,
            true,
            false,
            false,
        )
        .unwrap()
    }

    #[test]
    fn new_key_starts_pending_generate() {
        assert_eq!(key().status, ElasticKeyStatus::PendingGenerate);
    }

    #[test]
    fn import_enabled_key_starts_pending_import() {
        let k = ElasticKey::new(
            "imports".into(),
            String::new(),
            KeyProvider::Internal,
            KeyAlgorithm::Rs256,
            false,
            true,
            false,
        )
        .unwrap();
        assert_eq!(k.status, ElasticKeyStatus::PendingImport);
    }

    #[test]
    fn name_validation() {
        assert!(ElasticKey::new(
            String::new(),
            String::new(),
            KeyProvider::Internal,
            KeyAlgorithm::A256Gcm,
            false,
            false,
            false
        )
        .is_err());
        assert!(ElasticKey::new(
            "spaces not ok".into(),
            String::new(),
            KeyProvider::Internal,
            KeyAlgorithm::A256Gcm,
            false,
            false,
            false
        )
        .is_err());
    }

    #[test]
    fn legal_lifecycle_path() {
        let mut k = key();
        k.transition_to(ElasticKeyStatus::Active).unwrap();
        k.transition_to(ElasticKeyStatus::Disabled).unwrap();
        k.transition_to(ElasticKeyStatus::Active).unwrap();
        k.transition_to(ElasticKeyStatus::PendingDelete).unwrap();
        k.transition_to(ElasticKeyStatus::StartedDelete).unwrap();
        k.transition_to(ElasticKeyStatus::FinishedDelete).unwrap();
        assert!(k.status.is_terminal());
    }

    #[test]
    fn illegal_transitions_rejected() {
        let mut k = key();
        assert!(k.transition_to(ElasticKeyStatus::Disabled).is_err());
        assert!(k.transition_to(ElasticKeyStatus::FinishedDelete).is_err());
        k.transition_to(ElasticKeyStatus::PendingDelete).unwrap();
        // no way back out of the delete chain
        assert!(k.transition_to(ElasticKeyStatus::Active).is_err());
        assert!(k.transition_to(ElasticKeyStatus::PendingDelete).is_err());
    }

    #[test]
    fn terminal_state_accepts_nothing() {
        for next in [
            ElasticKeyStatus::PendingGenerate,
            ElasticKeyStatus::Active,
            ElasticKeyStatus::PendingDelete,
        ] {
            assert!(!ElasticKeyStatus::FinishedDelete.can_transition_to(next));
        }
    }
}
