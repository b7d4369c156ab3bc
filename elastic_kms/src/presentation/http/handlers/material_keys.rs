// /////////////////////////////////////////////////////////////////////////////
// Elastic KMS
// Copyright (c) 2025 Elastic KMS Contributors
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Material key handlers: import (POST), metadata reads, status
//! transitions, purge deletion, and the export policy.
//!
//! Export rules on `GET /materialkey/{id}?material=true`:
//! - `export_allowed` → the full JWK, private parameters included;
//! - otherwise, asymmetric keys yield their public projection and
//!   symmetric keys are refused with 403. Raw symmetric material never
//!   leaves the service without `export_allowed`.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use elastic_kms_domain::{KmsError, MaterialKeyFilter, MaterialKeyStatus, PageRequest};
use uuid::Uuid;

use crate::presentation::http::dto::{
    GetMaterialKeyQuery, ImportMaterialKeyRequest, ListMaterialKeysQuery, MaterialKeyResponse,
    PageResponse, UpdateMaterialKeyRequest,
};
use crate::presentation::http::error::ApiError;
use crate::presentation::http::extract::{ApiJson, ApiQuery};
use crate::presentation::http::state::AppState;

/// POST /materialkey: import external material as the next version.
pub async fn import(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<ImportMaterialKeyRequest>,
) -> Result<(StatusCode, Json<MaterialKeyResponse>), ApiError> {
    let material = state.crypto.import(request.elastic_key_id, request.jwk).await?;
    Ok((StatusCode::CREATED, Json(MaterialKeyResponse::metadata(&material))))
}

pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    ApiQuery(query): ApiQuery<GetMaterialKeyQuery>,
) -> Result<Json<MaterialKeyResponse>, ApiError> {
    let material = state.material_keys.get(id).await?;
    if !query.material {
        return Ok(Json(MaterialKeyResponse::metadata(&material)));
    }

    let elastic = state.elastic_keys.get(material.elastic_key_id).await?;
    let jwk = state.crypto.unwrap_material(&material).await?;
    let exported = if elastic.export_allowed {
        jwk
    } else {
        jwk.to_public().ok_or_else(|| {
            KmsError::forbidden("symmetric material is not exportable without export_allowed")
        })?
    };
    Ok(Json(MaterialKeyResponse::with_jwk(&material, exported)))
}

pub async fn list(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ListMaterialKeysQuery>,
) -> Result<Json<PageResponse<MaterialKeyResponse>>, ApiError> {
    let filter = MaterialKeyFilter {
        elastic_key_id: query.elastic_key_id,
        status: query.status.as_deref().map(MaterialKeyStatus::parse).transpose()?,
        version: query.version,
    };
    let page = PageRequest::new(query.offset.unwrap_or(0), query.limit.unwrap_or(25));
    let result = state.material_keys.find(&filter, page).await?;
    Ok(Json(PageResponse::map(result, |key| MaterialKeyResponse::metadata(&key))))
}

pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    ApiJson(request): ApiJson<UpdateMaterialKeyRequest>,
) -> Result<Json<MaterialKeyResponse>, ApiError> {
    let status = MaterialKeyStatus::parse(&request.status)?;
    let material = state.material_keys.update_status(id, status).await?;
    Ok(Json(MaterialKeyResponse::metadata(&material)))
}

pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.material_keys.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
