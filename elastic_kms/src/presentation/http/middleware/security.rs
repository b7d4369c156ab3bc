// /////////////////////////////////////////////////////////////////////////////
// Elastic KMS
// Copyright (c) 2025 Elastic KMS Contributors
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Browser-surface hardening: security headers and the CORS layer built
//! from configuration. The service context gets neither.

use axum::extract::Request;
use axum::http::{HeaderValue, Method};
use axum::middleware::Next;
use axum::response::Response;
use elastic_kms_bootstrap::config::CorsConfig;
use elastic_kms_domain::KmsError;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};

/// Content-Security-Policy and related headers for the browser context.
pub async fn security_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(
        "content-security-policy",
        HeaderValue::from_static("default-src 'none'; frame-ancestors 'none'"),
    );
    headers.insert("x-content-type-options", HeaderValue::from_static("nosniff"));
    headers.insert("x-frame-options", HeaderValue::from_static("DENY"));
    headers.insert("referrer-policy", HeaderValue::from_static("no-referrer"));
    response
}

/// CORS layer from configuration. With no configured origins the layer
/// allows nothing cross-origin, which is the same-origin default.
pub fn build_cors_layer(config: &CorsConfig) -> Result<CorsLayer, KmsError> {
    let origins = config
        .origins
        .iter()
        .map(|origin| {
            HeaderValue::from_str(origin)
                .map_err(|_| KmsError::validation(format!("cors origin '{origin}' is not a header value")))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let methods = if config.methods.is_empty() {
        vec![Method::GET, Method::POST, Method::PUT, Method::DELETE]
    } else {
        config
            .methods
            .iter()
            .map(|method| {
                method
                    .parse::<Method>()
                    .map_err(|_| KmsError::validation(format!("cors method '{method}' is not valid")))
            })
            .collect::<Result<Vec<_>, _>>()?
    };

    let headers = if config.headers.is_empty() {
        AllowHeaders::list([
            axum::http::HeaderName::from_static("content-type"),
            axum::http::HeaderName::from_static("x-csrf-token"),
        ])
    } else {
        let parsed = config
            .headers
            .iter()
            .map(|header| {
                header
                    .parse::<axum::http::HeaderName>()
                    .map_err(|_| KmsError::validation(format!("cors header '{header}' is not valid")))
            })
            .collect::<Result<Vec<_>, _>>()?;
        AllowHeaders::list(parsed)
    };

    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(AllowMethods::list(methods))
        .allow_headers(headers)
        .allow_credentials(true))
}
