// /////////////////////////////////////////////////////////////////////////////
// Elastic KMS
// Copyright (c) 2025 Elastic KMS Contributors
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Elastic key CRUD handlers, shared by both public contexts.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use elastic_kms_domain::{ElasticKeyFilter, ElasticKeyStatus, KeyAlgorithm, KeyProvider, PageRequest};
use uuid::Uuid;

use crate::application::services::{CreateElasticKey, UpdateElasticKey};
use crate::presentation::http::dto::{
    CreateElasticKeyRequest, ElasticKeyResponse, ListElasticKeysQuery, PageResponse,
    UpdateElasticKeyRequest,
};
use crate::presentation::http::error::ApiError;
use crate::presentation::http::extract::{ApiJson, ApiQuery};
use crate::presentation::http::state::AppState;

pub async fn create(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<CreateElasticKeyRequest>,
) -> Result<(StatusCode, Json<ElasticKeyResponse>), ApiError> {
    let command = CreateElasticKey {
        name: request.name,
        description: request.description,
        provider: KeyProvider::parse(&request.provider)?,
        algorithm: KeyAlgorithm::parse(&request.algorithm)?,
        versioning_allowed: request.versioning_allowed,
        import_allowed: request.import_allowed,
        export_allowed: request.export_allowed,
    };
    let key = state.elastic_keys.create(command).await?;
    Ok((StatusCode::CREATED, Json(key.into())))
}

pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ElasticKeyResponse>, ApiError> {
    let key = state.elastic_keys.get(id).await?;
    Ok(Json(key.into()))
}

pub async fn list(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ListElasticKeysQuery>,
) -> Result<Json<PageResponse<ElasticKeyResponse>>, ApiError> {
    let filter = ElasticKeyFilter {
        name: query.name,
        provider: query.provider.as_deref().map(KeyProvider::parse).transpose()?,
        algorithm: query.algorithm.as_deref().map(KeyAlgorithm::parse).transpose()?,
        status: query.status.as_deref().map(ElasticKeyStatus::parse).transpose()?,
        versioning_allowed: query.versioning_allowed,
        import_allowed: query.import_allowed,
        export_allowed: query.export_allowed,
    };
    let page = PageRequest::new(query.offset.unwrap_or(0), query.limit.unwrap_or(25));
    let result = state.elastic_keys.find(&filter, page).await?;
    Ok(Json(PageResponse::map(result, ElasticKeyResponse::from)))
}

pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    ApiJson(request): ApiJson<UpdateElasticKeyRequest>,
) -> Result<Json<ElasticKeyResponse>, ApiError> {
    let command = UpdateElasticKey {
        description: request.description,
        status: request.status.as_deref().map(ElasticKeyStatus::parse).transpose()?,
    };
    let key = state.elastic_keys.update(id, command).await?;
    Ok(Json(key.into()))
}

pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ElasticKeyResponse>, ApiError> {
    let key = state.elastic_keys.delete(id).await?;
    Ok(Json(key.into()))
}
