// /////////////////////////////////////////////////////////////////////////////
// Elastic KMS
// Copyright (c) 2025 Elastic KMS Contributors
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Request handlers per resource.

pub mod admin;
pub mod crypto;
pub mod elastic_keys;
pub mod material_keys;

use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;
use axum::Json;

use super::dto::CsrfTokenResponse;
use super::error::ApiError;
use super::middleware::issue_csrf_token;
use super::state::AppState;

/// GET /browser/api/v1/csrf-token, browser context only.
pub async fn csrf_token(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let (cookie, token) = issue_csrf_token(&state.csrf)?;
    Ok((
        [(header::SET_COOKIE, cookie)],
        Json(CsrfTokenResponse { token }),
    ))
}
