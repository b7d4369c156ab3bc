// /////////////////////////////////////////////////////////////////////////////
// Elastic KMS
// Copyright (c) 2025 Elastic KMS Contributors
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Storage Schema
//!
//! Table definitions for the relational store. Identifiers and
//! timestamps are TEXT (UUID / RFC 3339); every key blob column holds a
//! compact-JWE string. Applied idempotently at startup.

use elastic_kms_domain::KmsError;
use sqlx::SqlitePool;

use super::map_sqlx_error;

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS elastic_keys (
        id                  TEXT PRIMARY KEY,
        name                TEXT NOT NULL UNIQUE,
        description         TEXT NOT NULL DEFAULT '',
        provider            TEXT NOT NULL,
        algorithm           TEXT NOT NULL,
        versioning_allowed  INTEGER NOT NULL,
        import_allowed      INTEGER NOT NULL,
        export_allowed      INTEGER NOT NULL,
        status              TEXT NOT NULL,
        created_at          TEXT NOT NULL,
        updated_at          TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_elastic_keys_status ON elastic_keys(status)",
    "CREATE INDEX IF NOT EXISTS idx_elastic_keys_created_at ON elastic_keys(created_at)",
    r#"
    CREATE TABLE IF NOT EXISTS material_keys (
        id               TEXT PRIMARY KEY,
        elastic_key_id   TEXT NOT NULL REFERENCES elastic_keys(id),
        version          INTEGER NOT NULL,
        material         TEXT NOT NULL,
        status           TEXT NOT NULL,
        created_at       TEXT NOT NULL,
        generate_date    TEXT NOT NULL,
        import_date      TEXT,
        expiration_date  TEXT,
        revocation_date  TEXT,
        UNIQUE (elastic_key_id, version)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_material_keys_elastic ON material_keys(elastic_key_id)",
    r#"
    CREATE TABLE IF NOT EXISTS root_keys (
        id          TEXT PRIMARY KEY,
        serialized  TEXT NOT NULL,
        created_at  TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS intermediate_keys (
        id          TEXT PRIMARY KEY,
        serialized  TEXT NOT NULL,
        created_at  TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS content_keys (
        id          TEXT PRIMARY KEY,
        serialized  TEXT NOT NULL,
        created_at  TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS barrier_current (
        level   TEXT PRIMARY KEY,
        key_id  TEXT NOT NULL
    )
    "#,
];

/// Creates all tables and indexes if absent.
pub async fn migrate(pool: &SqlitePool) -> Result<(), KmsError> {
    for statement in SCHEMA {
        sqlx::query(statement)
            .execute(pool)
            .await
            .map_err(|e| map_sqlx_error(e, "schema migration"))?;
    }
    Ok(())
}
