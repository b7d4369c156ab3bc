// /////////////////////////////////////////////////////////////////////////////
// Elastic KMS
// Copyright (c) 2025 Elastic KMS Contributors
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Persistence Gateway
//!
//! sqlx-backed implementations of the domain repository ports over a
//! relational store. Multi-row mutations run inside a single transaction;
//! unique violations map to `Conflict`, missing rows to `NotFound`, and
//! transient faults (pool exhaustion, broken connections) are retried
//! once with jitter before surfacing as `Upstream`.

mod schema;
mod sqlite_barrier_key_repository;
mod sqlite_elastic_key_repository;
mod sqlite_material_key_repository;

pub use schema::migrate;
pub use sqlite_barrier_key_repository::SqliteBarrierKeyRepository;
pub use sqlite_elastic_key_repository::SqliteElasticKeyRepository;
pub use sqlite_material_key_repository::SqliteMaterialKeyRepository;

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use elastic_kms_domain::KmsError;
use rand::Rng;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use uuid::Uuid;

/// Opens the connection pool for `database_url`.
///
/// In-memory SQLite gets a single connection: every pooled connection
/// would otherwise see its own private database.
pub async fn connect(database_url: &str) -> Result<SqlitePool, KmsError> {
    let in_memory = database_url.contains(":memory:");
    let options = if in_memory {
        // One pinned connection: reclaiming it would drop the database.
        SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        SqlitePoolOptions::new().max_connections(5)
    };
    options
        .connect(database_url)
        .await
        .map_err(|e| KmsError::upstream(format!("cannot open database: {e}")))
}

/// Liveness probe used by `/readyz`.
pub async fn ping(pool: &SqlitePool) -> Result<(), KmsError> {
    sqlx::query("SELECT 1")
        .execute(pool)
        .await
        .map(|_| ())
        .map_err(|e| KmsError::upstream(format!("database ping failed: {e}")))
}

pub(crate) fn map_sqlx_error(error: sqlx::Error, what: &str) -> KmsError {
    match &error {
        sqlx::Error::RowNotFound => KmsError::not_found(what.to_string()),
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            KmsError::conflict(format!("{what}: unique constraint violated"))
        }
        sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
            KmsError::transient(format!("{what}: {error}"))
        }
        _ => KmsError::internal(format!("{what}: {error}")),
    }
}

/// Runs `operation`, retrying exactly once (with jitter) on a transient
/// fault. A second transient failure surfaces as `Upstream`.
pub(crate) async fn with_retry<T, F, Fut>(operation: F) -> Result<T, KmsError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, KmsError>>,
{
    match operation().await {
        Err(KmsError::Transient(first)) => {
            let jitter = Duration::from_millis(rand::thread_rng().gen_range(10..60));
            tracing::debug!(error = %first, delay_ms = jitter.as_millis() as u64, "transient persistence fault, retrying");
            tokio::time::sleep(jitter).await;
            operation().await.map_err(|second| match second {
                KmsError::Transient(message) => KmsError::upstream(message),
                other => other,
            })
        }
        other => other,
    }
}

pub(crate) fn parse_uuid(value: &str, what: &str) -> Result<Uuid, KmsError> {
    Uuid::parse_str(value).map_err(|_| KmsError::internal(format!("{what}: stored id is not a UUID")))
}

pub(crate) fn parse_timestamp(value: &str, what: &str) -> Result<DateTime<Utc>, KmsError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| KmsError::internal(format!("{what}: stored timestamp is not RFC 3339")))
}

pub(crate) fn format_timestamp(value: &DateTime<Utc>) -> String {
    value.to_rfc3339()
}
