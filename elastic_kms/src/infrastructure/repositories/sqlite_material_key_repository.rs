// /////////////////////////////////////////////////////////////////////////////
// Elastic KMS
// Copyright (c) 2025 Elastic KMS Contributors
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! sqlx implementation of the material-key repository port.
//!
//! Version assignment happens inside the insert transaction: the next
//! number is `max(version) + 1` as observed by that transaction, and the
//! `(elastic_key_id, version)` unique constraint turns a racing insert
//! into a `Conflict` the caller retries.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use elastic_kms_domain::repositories::MaterialKeyRepository;
use elastic_kms_domain::{
    KmsError, MaterialKey, MaterialKeyFilter, MaterialKeyStatus, NewMaterialKey, Page, PageRequest,
};
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use uuid::Uuid;

use super::{format_timestamp, map_sqlx_error, parse_timestamp, parse_uuid, with_retry};

pub struct SqliteMaterialKeyRepository {
    pool: SqlitePool,
}

impl SqliteMaterialKeyRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn row_to_entity(row: &SqliteRow) -> Result<MaterialKey, KmsError> {
    let read = |column: &str| -> Result<String, KmsError> {
        row.try_get::<String, _>(column)
            .map_err(|e| KmsError::internal(format!("material key column '{column}': {e}")))
    };
    let read_opt = |column: &str| -> Result<Option<DateTime<Utc>>, KmsError> {
        row.try_get::<Option<String>, _>(column)
            .map_err(|e| KmsError::internal(format!("material key column '{column}': {e}")))?
            .map(|value| parse_timestamp(&value, "material key"))
            .transpose()
    };
    Ok(MaterialKey {
        id: parse_uuid(&read("id")?, "material key")?,
        elastic_key_id: parse_uuid(&read("elastic_key_id")?, "material key")?,
        version: row
            .try_get::<i64, _>("version")
            .map_err(|e| KmsError::internal(format!("material key version: {e}")))? as u32,
        material: read("material")?,
        status: MaterialKeyStatus::parse(&read("status")?)?,
        created_at: parse_timestamp(&read("created_at")?, "material key")?,
        generate_date: parse_timestamp(&read("generate_date")?, "material key")?,
        import_date: read_opt("import_date")?,
        expiration_date: read_opt("expiration_date")?,
        revocation_date: read_opt("revocation_date")?,
    })
}

#[async_trait]
impl MaterialKeyRepository for SqliteMaterialKeyRepository {
    async fn add_versioned(&self, key: &NewMaterialKey) -> Result<MaterialKey, KmsError> {
        with_retry(|| async {
            let mut tx = self
                .pool
                .begin()
                .await
                .map_err(|e| map_sqlx_error(e, "material key transaction"))?;

            let next_version: i64 = sqlx::query(
                "SELECT COALESCE(MAX(version), 0) + 1 AS next FROM material_keys WHERE elastic_key_id = ?",
            )
            .bind(key.elastic_key_id.to_string())
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error(e, "material key version"))?
            .try_get("next")
            .map_err(|e| KmsError::internal(format!("material key version: {e}")))?;

            let now = Utc::now();
            let import_date = key.imported.then_some(now);
            sqlx::query(
                r#"
                INSERT INTO material_keys
                    (id, elastic_key_id, version, material, status,
                     created_at, generate_date, import_date,
                     expiration_date, revocation_date)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, NULL, NULL)
                "#,
            )
            .bind(key.id.to_string())
            .bind(key.elastic_key_id.to_string())
            .bind(next_version)
            .bind(&key.material)
            .bind(MaterialKeyStatus::Active.as_str())
            .bind(format_timestamp(&now))
            .bind(format_timestamp(&now))
            .bind(import_date.as_ref().map(format_timestamp))
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error(e, "material key insert"))?;

            tx.commit()
                .await
                .map_err(|e| map_sqlx_error(e, "material key transaction"))?;

            Ok(MaterialKey {
                id: key.id,
                elastic_key_id: key.elastic_key_id,
                version: next_version as u32,
                material: key.material.clone(),
                status: MaterialKeyStatus::Active,
                created_at: now,
                generate_date: now,
                import_date,
                expiration_date: None,
                revocation_date: None,
            })
        })
        .await
    }

    async fn get(&self, id: Uuid) -> Result<MaterialKey, KmsError> {
        with_retry(|| async {
            let row = sqlx::query("SELECT * FROM material_keys WHERE id = ?")
                .bind(id.to_string())
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| map_sqlx_error(e, "material key lookup"))?;
            match row {
                Some(row) => row_to_entity(&row),
                None => Err(KmsError::not_found(format!("material key {id}"))),
            }
        })
        .await
    }

    async fn get_latest(&self, elastic_key_id: Uuid) -> Result<Option<MaterialKey>, KmsError> {
        with_retry(|| async {
            let row = sqlx::query(
                "SELECT * FROM material_keys WHERE elastic_key_id = ? ORDER BY version DESC LIMIT 1",
            )
            .bind(elastic_key_id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error(e, "material key lookup"))?;
            row.as_ref().map(row_to_entity).transpose()
        })
        .await
    }

    async fn get_latest_active(&self, elastic_key_id: Uuid) -> Result<Option<MaterialKey>, KmsError> {
        with_retry(|| async {
            let row = sqlx::query(
                r#"
                SELECT * FROM material_keys
                WHERE elastic_key_id = ? AND status = 'active'
                ORDER BY version DESC LIMIT 1
                "#,
            )
            .bind(elastic_key_id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error(e, "material key lookup"))?;
            row.as_ref().map(row_to_entity).transpose()
        })
        .await
    }

    async fn find(
        &self,
        filter: &MaterialKeyFilter,
        page: PageRequest,
    ) -> Result<Page<MaterialKey>, KmsError> {
        with_retry(|| async {
            let push_filter = |builder: &mut QueryBuilder<'_, Sqlite>| {
                builder.push(" WHERE 1=1");
                if let Some(elastic_key_id) = filter.elastic_key_id {
                    builder.push(" AND elastic_key_id = ").push_bind(elastic_key_id.to_string());
                }
                if let Some(status) = filter.status {
                    builder.push(" AND status = ").push_bind(status.as_str());
                }
                if let Some(version) = filter.version {
                    builder.push(" AND version = ").push_bind(version as i64);
                }
            };

            let mut count_builder = QueryBuilder::new("SELECT COUNT(*) AS n FROM material_keys");
            push_filter(&mut count_builder);
            let total: i64 = count_builder
                .build()
                .fetch_one(&self.pool)
                .await
                .map_err(|e| map_sqlx_error(e, "material key count"))?
                .try_get("n")
                .map_err(|e| KmsError::internal(format!("material key count: {e}")))?;

            let mut builder = QueryBuilder::new("SELECT * FROM material_keys");
            push_filter(&mut builder);
            builder
                .push(" ORDER BY elastic_key_id, version, id LIMIT ")
                .push_bind(page.limit() as i64)
                .push(" OFFSET ")
                .push_bind(page.offset() as i64);
            let rows = builder
                .build()
                .fetch_all(&self.pool)
                .await
                .map_err(|e| map_sqlx_error(e, "material key search"))?;

            let items = rows.iter().map(row_to_entity).collect::<Result<Vec<_>, _>>()?;
            Ok(Page::new(items, page, total as u64))
        })
        .await
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: MaterialKeyStatus,
        at: DateTime<Utc>,
    ) -> Result<(), KmsError> {
        with_retry(|| async {
            let date_column = match status {
                MaterialKeyStatus::Expired => Some("expiration_date"),
                MaterialKeyStatus::Revoked => Some("revocation_date"),
                MaterialKeyStatus::Active => None,
            };
            let sql = match date_column {
                Some(column) => format!("UPDATE material_keys SET status = ?, {column} = ? WHERE id = ?"),
                None => "UPDATE material_keys SET status = ? WHERE id = ?".to_string(),
            };

            let mut query = sqlx::query(&sql).bind(status.as_str());
            if date_column.is_some() {
                query = query.bind(format_timestamp(&at));
            }
            let result = query
                .bind(id.to_string())
                .execute(&self.pool)
                .await
                .map_err(|e| map_sqlx_error(e, "material key status"))?;
            if result.rows_affected() == 0 {
                return Err(KmsError::not_found(format!("material key {id}")));
            }
            Ok(())
        })
        .await
    }

    async fn delete(&self, id: Uuid) -> Result<(), KmsError> {
        with_retry(|| async {
            let result = sqlx::query("DELETE FROM material_keys WHERE id = ?")
                .bind(id.to_string())
                .execute(&self.pool)
                .await
                .map_err(|e| map_sqlx_error(e, "material key delete"))?;
            if result.rows_affected() == 0 {
                return Err(KmsError::not_found(format!("material key {id}")));
            }
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::repositories::{connect, migrate, SqliteElasticKeyRepository};
    use elastic_kms_domain::repositories::ElasticKeyRepository;
    use elastic_kms_domain::{ElasticKey, KeyAlgorithm, KeyProvider};

    async fn setup() -> (SqliteMaterialKeyRepository, Uuid) {
        let pool = connect("sqlite::memory:").await.unwrap();
        migrate(&pool).await.unwrap();
        let elastic_repo = SqliteElasticKeyRepository::new(pool.clone());
        let elastic = ElasticKey::new(
            "owner".into(),
            String::new(),
            KeyProvider::Internal,
            KeyAlgorithm::A256Gcm,
            true,
            false,
            false,
        )
        .unwrap();
        elastic_repo.add(&elastic).await.unwrap();
        (SqliteMaterialKeyRepository::new(pool), elastic.id)
    }

    #[tokio::test]
    async fn versions_are_contiguous_from_one() {
        let (repo, elastic_id) = setup().await;
        for expected in 1..=4u32 {
            let inserted = repo
                .add_versioned(&NewMaterialKey::generated(elastic_id, "jwe".into()))
                .await
                .unwrap();
            assert_eq!(inserted.version, expected);
        }
        let latest = repo.get_latest(elastic_id).await.unwrap().unwrap();
        assert_eq!(latest.version, 4);
    }

    #[tokio::test]
    async fn latest_active_skips_revoked() {
        let (repo, elastic_id) = setup().await;
        let first = repo
            .add_versioned(&NewMaterialKey::generated(elastic_id, "jwe1".into()))
            .await
            .unwrap();
        let second = repo
            .add_versioned(&NewMaterialKey::generated(elastic_id, "jwe2".into()))
            .await
            .unwrap();

        repo.update_status(second.id, MaterialKeyStatus::Revoked, Utc::now())
            .await
            .unwrap();
        let latest_active = repo.get_latest_active(elastic_id).await.unwrap().unwrap();
        assert_eq!(latest_active.id, first.id);

        let revoked = repo.get(second.id).await.unwrap();
        assert_eq!(revoked.status, MaterialKeyStatus::Revoked);
        assert!(revoked.revocation_date.is_some());
    }

    #[tokio::test]
    async fn import_stamps_import_date() {
        let (repo, elastic_id) = setup().await;
        let imported = repo
            .add_versioned(&NewMaterialKey::imported(elastic_id, "jwe".into()))
            .await
            .unwrap();
        assert!(imported.import_date.is_some());
    }

    #[tokio::test]
    async fn find_by_elastic_key_filters() {
        let (repo, elastic_id) = setup().await;
        for _ in 0..3 {
            repo.add_versioned(&NewMaterialKey::generated(elastic_id, "jwe".into()))
                .await
                .unwrap();
        }
        let page = repo
            .find(
                &MaterialKeyFilter {
                    elastic_key_id: Some(elastic_id),
                    ..Default::default()
                },
                PageRequest::first(),
            )
            .await
            .unwrap();
        assert_eq!(page.total, 3);
        let none = repo
            .find(
                &MaterialKeyFilter {
                    elastic_key_id: Some(Uuid::new_v4()),
                    ..Default::default()
                },
                PageRequest::first(),
            )
            .await
            .unwrap();
        assert_eq!(none.total, 0);
    }

    #[tokio::test]
    async fn delete_removes_row() {
        let (repo, elastic_id) = setup().await;
        let key = repo
            .add_versioned(&NewMaterialKey::generated(elastic_id, "jwe".into()))
            .await
            .unwrap();
        repo.delete(key.id).await.unwrap();
        assert!(matches!(repo.get(key.id).await.unwrap_err(), KmsError::NotFound(_)));
    }
}
