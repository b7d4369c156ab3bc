// /////////////////////////////////////////////////////////////////////////////
// Elastic KMS
// Copyright (c) 2025 Elastic KMS Contributors
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! sqlx implementation of the elastic-key repository port.

use async_trait::async_trait;
use elastic_kms_domain::repositories::ElasticKeyRepository;
use elastic_kms_domain::{
    ElasticKey, ElasticKeyFilter, ElasticKeyStatus, KeyAlgorithm, KeyProvider, KmsError, Page,
    PageRequest,
};
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use uuid::Uuid;

use super::{format_timestamp, map_sqlx_error, parse_timestamp, parse_uuid, with_retry};

pub struct SqliteElasticKeyRepository {
    pool: SqlitePool,
}

impl SqliteElasticKeyRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn row_to_entity(row: &SqliteRow) -> Result<ElasticKey, KmsError> {
    let read = |column: &str| -> Result<String, KmsError> {
        row.try_get::<String, _>(column)
            .map_err(|e| KmsError::internal(format!("elastic key column '{column}': {e}")))
    };
    Ok(ElasticKey {
        id: parse_uuid(&read("id")?, "elastic key")?,
        name: read("name")?,
        description: read("description")?,
        provider: KeyProvider::parse(&read("provider")?)?,
        algorithm: KeyAlgorithm::parse(&read("algorithm")?)?,
        versioning_allowed: row
            .try_get::<i64, _>("versioning_allowed")
            .map_err(|e| KmsError::internal(format!("elastic key flags: {e}")))?
            != 0,
        import_allowed: row
            .try_get::<i64, _>("import_allowed")
            .map_err(|e| KmsError::internal(format!("elastic key flags: {e}")))?
            != 0,
        export_allowed: row
            .try_get::<i64, _>("export_allowed")
            .map_err(|e| KmsError::internal(format!("elastic key flags: {e}")))?
            != 0,
        status: ElasticKeyStatus::parse(&read("status")?)?,
        created_at: parse_timestamp(&read("created_at")?, "elastic key")?,
        updated_at: parse_timestamp(&read("updated_at")?, "elastic key")?,
    })
}

fn push_filter(builder: &mut QueryBuilder<'_, Sqlite>, filter: &ElasticKeyFilter) {
    builder.push(" WHERE 1=1");
    if let Some(name) = &filter.name {
        builder.push(" AND name = ").push_bind(name.clone());
    }
    if let Some(provider) = filter.provider {
        builder.push(" AND provider = ").push_bind(provider.as_str());
    }
    if let Some(algorithm) = filter.algorithm {
        builder.push(" AND algorithm = ").push_bind(algorithm.name());
    }
    if let Some(status) = filter.status {
        builder.push(" AND status = ").push_bind(status.as_str());
    }
    if let Some(flag) = filter.versioning_allowed {
        builder.push(" AND versioning_allowed = ").push_bind(flag as i64);
    }
    if let Some(flag) = filter.import_allowed {
        builder.push(" AND import_allowed = ").push_bind(flag as i64);
    }
    if let Some(flag) = filter.export_allowed {
        builder.push(" AND export_allowed = ").push_bind(flag as i64);
    }
}

#[async_trait]
impl ElasticKeyRepository for SqliteElasticKeyRepository {
    async fn add(&self, key: &ElasticKey) -> Result<(), KmsError> {
        with_retry(|| async {
            sqlx::query(
                r#"
                INSERT INTO elastic_keys
                    (id, name, description, provider, algorithm,
                     versioning_allowed, import_allowed, export_allowed,
                     status, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(key.id.to_string())
            .bind(&key.name)
            .bind(&key.description)
            .bind(key.provider.as_str())
            .bind(key.algorithm.name())
            .bind(key.versioning_allowed as i64)
            .bind(key.import_allowed as i64)
            .bind(key.export_allowed as i64)
            .bind(key.status.as_str())
            .bind(format_timestamp(&key.created_at))
            .bind(format_timestamp(&key.updated_at))
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error(e, "elastic key insert"))?;
            Ok(())
        })
        .await
    }

    async fn get(&self, id: Uuid) -> Result<ElasticKey, KmsError> {
        with_retry(|| async {
            let row = sqlx::query("SELECT * FROM elastic_keys WHERE id = ?")
                .bind(id.to_string())
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| map_sqlx_error(e, "elastic key lookup"))?;
            match row {
                Some(row) => row_to_entity(&row),
                None => Err(KmsError::not_found(format!("elastic key {id}"))),
            }
        })
        .await
    }

    async fn update(&self, key: &ElasticKey) -> Result<(), KmsError> {
        with_retry(|| async {
            let result = sqlx::query(
                r#"
                UPDATE elastic_keys
                SET description = ?, versioning_allowed = ?, import_allowed = ?,
                    export_allowed = ?, status = ?, updated_at = ?
                WHERE id = ?
                "#,
            )
            .bind(&key.description)
            .bind(key.versioning_allowed as i64)
            .bind(key.import_allowed as i64)
            .bind(key.export_allowed as i64)
            .bind(key.status.as_str())
            .bind(format_timestamp(&key.updated_at))
            .bind(key.id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error(e, "elastic key update"))?;
            if result.rows_affected() == 0 {
                return Err(KmsError::not_found(format!("elastic key {}", key.id)));
            }
            Ok(())
        })
        .await
    }

    async fn find(
        &self,
        filter: &ElasticKeyFilter,
        page: PageRequest,
    ) -> Result<Page<ElasticKey>, KmsError> {
        with_retry(|| async {
            let mut count_builder = QueryBuilder::new("SELECT COUNT(*) AS n FROM elastic_keys");
            push_filter(&mut count_builder, filter);
            let total: i64 = count_builder
                .build()
                .fetch_one(&self.pool)
                .await
                .map_err(|e| map_sqlx_error(e, "elastic key count"))?
                .try_get("n")
                .map_err(|e| KmsError::internal(format!("elastic key count: {e}")))?;

            let mut builder = QueryBuilder::new("SELECT * FROM elastic_keys");
            push_filter(&mut builder, filter);
            builder
                .push(" ORDER BY created_at, id LIMIT ")
                .push_bind(page.limit() as i64)
                .push(" OFFSET ")
                .push_bind(page.offset() as i64);
            let rows = builder
                .build()
                .fetch_all(&self.pool)
                .await
                .map_err(|e| map_sqlx_error(e, "elastic key search"))?;

            let items = rows.iter().map(row_to_entity).collect::<Result<Vec<_>, _>>()?;
            Ok(Page::new(items, page, total as u64))
        })
        .await
    }
}
