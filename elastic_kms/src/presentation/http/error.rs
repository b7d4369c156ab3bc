// /////////////////////////////////////////////////////////////////////////////
// Elastic KMS
// Copyright (c) 2025 Elastic KMS Contributors
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Error Envelope
//!
//! Every error response on every plane carries the same JSON envelope:
//!
//! ```json
//! {"status":409,"error":"conflict","message":"...",
//!  "timestamp":"...","path":"/service/api/v1/elastickey",
//!  "request_id":"..."}
//! ```
//!
//! Handlers and middleware produce an [`ApiError`] whose response carries
//! an [`ErrorMeta`] extension; the envelope middleware, which knows the
//! request path and id, rewrites the body. Responses that error without
//! an extension (router 404s, panics converted by the catch-panic layer)
//! get a kind derived from their status, so the envelope is deterministic
//! for every failure a client can observe.

use axum::body::Body;
use axum::extract::Request;
use axum::http::{header, HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use elastic_kms_domain::{ErrorKind, KmsError};
use serde::Serialize;

use super::state::RequestContext;

/// Wire form of the envelope.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub status: u16,
    pub error: &'static str,
    pub message: String,
    pub timestamp: String,
    pub path: String,
    pub request_id: String,
}

/// Response extension carrying the domain error until the envelope
/// middleware rewrites the body.
#[derive(Debug, Clone)]
pub struct ErrorMeta {
    pub kind: ErrorKind,
    pub message: String,
}

/// Handler-level error: a thin wrapper over [`KmsError`].
#[derive(Debug)]
pub struct ApiError(pub KmsError);

impl From<KmsError> for ApiError {
    fn from(error: KmsError) -> Self {
        ApiError(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let kind = self.0.kind();
        let status =
            StatusCode::from_u16(kind.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let mut response = status.into_response();
        response.extensions_mut().insert(ErrorMeta {
            kind,
            message: self.0.to_string(),
        });
        response
    }
}

/// Middleware that turns any error response into the canonical envelope.
/// Sits directly inside the request-id middleware so `path` and
/// `request_id` are always available.
pub async fn error_envelope(request: Request, next: Next) -> Response {
    let path = request.uri().path().to_string();
    let request_id = request
        .extensions()
        .get::<RequestContext>()
        .map(|ctx| ctx.request_id.clone())
        .unwrap_or_default();

    let response = next.run(request).await;
    let status = response.status();
    if !(status.is_client_error() || status.is_server_error()) {
        return response;
    }

    let (kind, message) = match response.extensions().get::<ErrorMeta>() {
        Some(meta) => (meta.kind, meta.message.clone()),
        None => {
            let kind = kind_for_status(status);
            (kind, default_message(status))
        }
    };

    let body = ErrorBody {
        status: status.as_u16(),
        error: kind.as_str(),
        message,
        timestamp: Utc::now().to_rfc3339(),
        path,
        request_id,
    };
    let json = serde_json::to_vec(&body).unwrap_or_else(|_| b"{}".to_vec());

    // Keep status and headers (Retry-After, Set-Cookie, ...) but replace
    // the body.
    let (mut parts, _) = response.into_parts();
    parts.headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    parts.headers.remove(header::CONTENT_LENGTH);
    Response::from_parts(parts, Body::from(json))
}

fn kind_for_status(status: StatusCode) -> ErrorKind {
    match status.as_u16() {
        400 | 405 | 413 | 414 | 415 | 422 | 431 => ErrorKind::Validation,
        401 => ErrorKind::Unauthorized,
        403 => ErrorKind::Forbidden,
        404 => ErrorKind::NotFound,
        408 | 504 => ErrorKind::Timeout,
        409 => ErrorKind::Conflict,
        429 => ErrorKind::RateLimited,
        502 => ErrorKind::Upstream,
        503 => ErrorKind::Sealed,
        _ => ErrorKind::Internal,
    }
}

fn default_message(status: StatusCode) -> String {
    status
        .canonical_reason()
        .unwrap_or("request failed")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_error_sets_status_and_meta() {
        let response = ApiError(KmsError::conflict("name taken")).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        let meta = response.extensions().get::<ErrorMeta>().unwrap();
        assert_eq!(meta.kind, ErrorKind::Conflict);
        assert!(meta.message.contains("name taken"));
    }

    #[test]
    fn unknown_statuses_fall_back_to_internal() {
        assert_eq!(kind_for_status(StatusCode::IM_A_TEAPOT), ErrorKind::Internal);
        assert_eq!(kind_for_status(StatusCode::NOT_FOUND), ErrorKind::NotFound);
    }
}
