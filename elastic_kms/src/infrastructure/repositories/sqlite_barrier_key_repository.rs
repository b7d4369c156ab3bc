// /////////////////////////////////////////////////////////////////////////////
// Elastic KMS
// Copyright (c) 2025 Elastic KMS Contributors
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! sqlx implementation of the barrier-key repository port.
//!
//! The "current" key per level is an explicit pointer row in
//! `barrier_current`, moved in the same transaction as the row append (or
//! re-wrap), so a reader never observes a pointer to a missing row or a
//! half-rotated hierarchy.

use async_trait::async_trait;
use elastic_kms_domain::repositories::BarrierKeyRepository;
use elastic_kms_domain::{BarrierKeyRecord, BarrierLevel, KmsError};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::{format_timestamp, map_sqlx_error, parse_timestamp, parse_uuid, with_retry};

pub struct SqliteBarrierKeyRepository {
    pool: SqlitePool,
}

impl SqliteBarrierKeyRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn table(level: BarrierLevel) -> &'static str {
    match level {
        BarrierLevel::Root => "root_keys",
        BarrierLevel::Intermediate => "intermediate_keys",
        BarrierLevel::Content => "content_keys",
    }
}

fn row_to_record(row: &SqliteRow) -> Result<BarrierKeyRecord, KmsError> {
    let read = |column: &str| -> Result<String, KmsError> {
        row.try_get::<String, _>(column)
            .map_err(|e| KmsError::internal(format!("barrier key column '{column}': {e}")))
    };
    Ok(BarrierKeyRecord {
        id: parse_uuid(&read("id")?, "barrier key")?,
        serialized: read("serialized")?,
        created_at: parse_timestamp(&read("created_at")?, "barrier key")?,
    })
}

async fn insert_record<'e, E>(executor: E, level: BarrierLevel, record: &BarrierKeyRecord) -> Result<(), KmsError>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    sqlx::query(&format!(
        "INSERT INTO {} (id, serialized, created_at) VALUES (?, ?, ?)",
        table(level)
    ))
    .bind(record.id.to_string())
    .bind(&record.serialized)
    .bind(format_timestamp(&record.created_at))
    .execute(executor)
    .await
    .map_err(|e| map_sqlx_error(e, "barrier key insert"))?;
    Ok(())
}

async fn move_pointer<'e, E>(executor: E, level: BarrierLevel, key_id: Uuid) -> Result<(), KmsError>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    sqlx::query("INSERT INTO barrier_current (level, key_id) VALUES (?, ?) ON CONFLICT(level) DO UPDATE SET key_id = excluded.key_id")
        .bind(level.as_str())
        .bind(key_id.to_string())
        .execute(executor)
        .await
        .map_err(|e| map_sqlx_error(e, "barrier pointer"))?;
    Ok(())
}

#[async_trait]
impl BarrierKeyRepository for SqliteBarrierKeyRepository {
    async fn current(&self, level: BarrierLevel) -> Result<Option<BarrierKeyRecord>, KmsError> {
        with_retry(|| async {
            let pointer = sqlx::query("SELECT key_id FROM barrier_current WHERE level = ?")
                .bind(level.as_str())
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| map_sqlx_error(e, "barrier pointer lookup"))?;
            let Some(pointer) = pointer else {
                return Ok(None);
            };
            let key_id: String = pointer
                .try_get("key_id")
                .map_err(|e| KmsError::internal(format!("barrier pointer: {e}")))?;

            let row = sqlx::query(&format!("SELECT * FROM {} WHERE id = ?", table(level)))
                .bind(&key_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| map_sqlx_error(e, "barrier key lookup"))?;
            match row {
                Some(row) => Ok(Some(row_to_record(&row)?)),
                // A dangling pointer means the store was mutilated outside
                // the service.
                None => Err(KmsError::internal(format!(
                    "barrier pointer for {} names a missing row",
                    level.as_str()
                ))),
            }
        })
        .await
    }

    async fn get(&self, level: BarrierLevel, id: Uuid) -> Result<BarrierKeyRecord, KmsError> {
        with_retry(|| async {
            let row = sqlx::query(&format!("SELECT * FROM {} WHERE id = ?", table(level)))
                .bind(id.to_string())
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| map_sqlx_error(e, "barrier key lookup"))?;
            match row {
                Some(row) => row_to_record(&row),
                None => Err(KmsError::not_found(format!("{} key {id}", level.as_str()))),
            }
        })
        .await
    }

    async fn init_hierarchy(
        &self,
        root: &BarrierKeyRecord,
        intermediate: &BarrierKeyRecord,
        content: &BarrierKeyRecord,
    ) -> Result<(), KmsError> {
        with_retry(|| async {
            let mut tx = self
                .pool
                .begin()
                .await
                .map_err(|e| map_sqlx_error(e, "barrier transaction"))?;

            let existing: i64 = sqlx::query("SELECT COUNT(*) AS n FROM root_keys")
                .fetch_one(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error(e, "barrier init"))?
                .try_get("n")
                .map_err(|e| KmsError::internal(format!("barrier init: {e}")))?;
            if existing > 0 {
                return Err(KmsError::conflict("barrier hierarchy is already initialized"));
            }

            insert_record(&mut *tx, BarrierLevel::Root, root).await?;
            insert_record(&mut *tx, BarrierLevel::Intermediate, intermediate).await?;
            insert_record(&mut *tx, BarrierLevel::Content, content).await?;
            move_pointer(&mut *tx, BarrierLevel::Root, root.id).await?;
            move_pointer(&mut *tx, BarrierLevel::Intermediate, intermediate.id).await?;
            move_pointer(&mut *tx, BarrierLevel::Content, content.id).await?;

            tx.commit().await.map_err(|e| map_sqlx_error(e, "barrier transaction"))
        })
        .await
    }

    async fn append_content(&self, content: &BarrierKeyRecord) -> Result<(), KmsError> {
        with_retry(|| async {
            let mut tx = self
                .pool
                .begin()
                .await
                .map_err(|e| map_sqlx_error(e, "barrier transaction"))?;
            insert_record(&mut *tx, BarrierLevel::Content, content).await?;
            move_pointer(&mut *tx, BarrierLevel::Content, content.id).await?;
            tx.commit().await.map_err(|e| map_sqlx_error(e, "barrier transaction"))
        })
        .await
    }

    async fn rotate_intermediate(
        &self,
        intermediate: &BarrierKeyRecord,
        rewrapped_content: (Uuid, String),
    ) -> Result<(), KmsError> {
        with_retry(|| async {
            let (content_id, serialized) = &rewrapped_content;
            let mut tx = self
                .pool
                .begin()
                .await
                .map_err(|e| map_sqlx_error(e, "barrier transaction"))?;

            insert_record(&mut *tx, BarrierLevel::Intermediate, intermediate).await?;
            let updated = sqlx::query("UPDATE content_keys SET serialized = ? WHERE id = ?")
                .bind(serialized)
                .bind(content_id.to_string())
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error(e, "barrier re-wrap"))?;
            if updated.rows_affected() == 0 {
                return Err(KmsError::internal("current content row vanished during rotation"));
            }
            move_pointer(&mut *tx, BarrierLevel::Intermediate, intermediate.id).await?;

            tx.commit().await.map_err(|e| map_sqlx_error(e, "barrier transaction"))
        })
        .await
    }

    async fn rotate_root(
        &self,
        root: &BarrierKeyRecord,
        rewrapped_intermediate: (Uuid, String),
    ) -> Result<(), KmsError> {
        with_retry(|| async {
            let (intermediate_id, serialized) = &rewrapped_intermediate;
            let mut tx = self
                .pool
                .begin()
                .await
                .map_err(|e| map_sqlx_error(e, "barrier transaction"))?;

            insert_record(&mut *tx, BarrierLevel::Root, root).await?;
            let updated = sqlx::query("UPDATE intermediate_keys SET serialized = ? WHERE id = ?")
                .bind(serialized)
                .bind(intermediate_id.to_string())
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error(e, "barrier re-wrap"))?;
            if updated.rows_affected() == 0 {
                return Err(KmsError::internal("current intermediate row vanished during rotation"));
            }
            move_pointer(&mut *tx, BarrierLevel::Root, root.id).await?;

            tx.commit().await.map_err(|e| map_sqlx_error(e, "barrier transaction"))
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::repositories::{connect, migrate};

    async fn repository() -> SqliteBarrierKeyRepository {
        let pool = connect("sqlite::memory:").await.unwrap();
        migrate(&pool).await.unwrap();
        SqliteBarrierKeyRepository::new(pool)
    }

    fn record(serialized: &str) -> BarrierKeyRecord {
        BarrierKeyRecord::new(Uuid::new_v4(), serialized.to_string())
    }

    #[tokio::test]
    async fn init_then_current_per_level() {
        let repo = repository().await;
        assert!(repo.current(BarrierLevel::Root).await.unwrap().is_none());

        let (root, intermediate, content) = (record("r"), record("i"), record("c"));
        repo.init_hierarchy(&root, &intermediate, &content).await.unwrap();

        assert_eq!(repo.current(BarrierLevel::Root).await.unwrap().unwrap().id, root.id);
        assert_eq!(
            repo.current(BarrierLevel::Intermediate).await.unwrap().unwrap().id,
            intermediate.id
        );
        assert_eq!(repo.current(BarrierLevel::Content).await.unwrap().unwrap().id, content.id);
    }

    #[tokio::test]
    async fn double_init_conflicts() {
        let repo = repository().await;
        repo.init_hierarchy(&record("r"), &record("i"), &record("c"))
            .await
            .unwrap();
        let err = repo
            .init_hierarchy(&record("r2"), &record("i2"), &record("c2"))
            .await
            .unwrap_err();
        assert!(matches!(err, KmsError::Conflict(_)));
    }

    #[tokio::test]
    async fn append_content_moves_pointer_and_keeps_history() {
        let repo = repository().await;
        let (root, intermediate, old_content) = (record("r"), record("i"), record("c1"));
        repo.init_hierarchy(&root, &intermediate, &old_content).await.unwrap();

        let new_content = record("c2");
        repo.append_content(&new_content).await.unwrap();

        assert_eq!(
            repo.current(BarrierLevel::Content).await.unwrap().unwrap().id,
            new_content.id
        );
        // Historical row stays readable.
        let historical = repo.get(BarrierLevel::Content, old_content.id).await.unwrap();
        assert_eq!(historical.serialized, "c1");
    }

    #[tokio::test]
    async fn rotate_intermediate_rewraps_content() {
        let repo = repository().await;
        let (root, old_intermediate, content) = (record("r"), record("i1"), record("c1"));
        repo.init_hierarchy(&root, &old_intermediate, &content).await.unwrap();

        let new_intermediate = record("i2");
        repo.rotate_intermediate(&new_intermediate, (content.id, "c1-rewrapped".into()))
            .await
            .unwrap();

        assert_eq!(
            repo.current(BarrierLevel::Intermediate).await.unwrap().unwrap().id,
            new_intermediate.id
        );
        assert_eq!(
            repo.current(BarrierLevel::Content).await.unwrap().unwrap().serialized,
            "c1-rewrapped"
        );
        assert_eq!(
            repo.get(BarrierLevel::Intermediate, old_intermediate.id)
                .await
                .unwrap()
                .serialized,
            "i1"
        );
    }

    #[tokio::test]
    async fn missing_row_is_not_found() {
        let repo = repository().await;
        let err = repo.get(BarrierLevel::Root, Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, KmsError::NotFound(_)));
    }
}
