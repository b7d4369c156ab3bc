// /////////////////////////////////////////////////////////////////////////////
// Elastic KMS
// Copyright (c) 2025 Elastic KMS Contributors
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Validated Extractors
//!
//! The request-validator stage of the middleware contract lives in the
//! extractors: bodies are deserialized with `deny_unknown_fields` DTOs
//! (unknown members are a 400), then run through their `validator`
//! derive rules. Rejections surface as the standard envelope.

use async_trait::async_trait;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{FromRequest, FromRequestParts, Json, Query, Request};
use axum::http::request::Parts;
use elastic_kms_domain::KmsError;
use serde::de::DeserializeOwned;
use validator::Validate;

use super::error::ApiError;

/// JSON body validated against the DTO's schema and rules.
pub struct ApiJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ApiJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
{
    type Rejection = ApiError;

    async fn from_request(request: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(request, state)
            .await
            .map_err(|rejection: JsonRejection| {
                ApiError(KmsError::validation(rejection.body_text()))
            })?;
        value
            .validate()
            .map_err(|errors| ApiError(KmsError::validation(errors.to_string())))?;
        Ok(ApiJson(value))
    }
}

/// Query string validated the same way.
pub struct ApiQuery<T>(pub T);

#[async_trait]
impl<S, T> FromRequestParts<S> for ApiQuery<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(|rejection: QueryRejection| {
                ApiError(KmsError::validation(rejection.body_text()))
            })?;
        value
            .validate()
            .map_err(|errors| ApiError(KmsError::validation(errors.to_string())))?;
        Ok(ApiQuery(value))
    }
}
