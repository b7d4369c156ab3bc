// /////////////////////////////////////////////////////////////////////////////
// Elastic KMS
// Copyright (c) 2025 Elastic KMS Contributors
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # CSRF Protection (browser context)
//!
//! Double-submit cookie: `GET /browser/api/v1/csrf-token` sets the token
//! cookie and returns the same token in the body; every state-changing
//! browser request must then present it in `X-CSRF-Token`. The guard
//! compares header and cookie in constant time. No server-side state is
//! needed unless `single_use` is configured, in which case a token is
//! remembered and refused after its first successful state-changing use.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{header, HeaderValue, Method};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use dashmap::DashSet;
use elastic_kms_bootstrap::config::CsrfCookieConfig;
use elastic_kms_domain::KmsError;
use rand::RngCore;
use subtle::ConstantTimeEq;

use crate::presentation::http::error::ApiError;

#[derive(Clone)]
pub struct CsrfState {
    config: Arc<CsrfCookieConfig>,
    spent_tokens: Arc<DashSet<String>>,
}

impl CsrfState {
    pub fn new(config: CsrfCookieConfig) -> Self {
        Self {
            config: Arc::new(config),
            spent_tokens: Arc::new(DashSet::new()),
        }
    }

    pub fn cookie_name(&self) -> &str {
        &self.config.name
    }

    /// Fresh token plus the `Set-Cookie` value binding it.
    pub fn issue(&self) -> (String, String) {
        let mut bytes = [0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        let token = URL_SAFE_NO_PAD.encode(bytes);

        let mut cookie = format!(
            "{}={}; Path=/; SameSite={}",
            self.config.name,
            token,
            self.config.same_site.as_str()
        );
        if self.config.secure {
            cookie.push_str("; Secure");
        }
        if self.config.http_only {
            cookie.push_str("; HttpOnly");
        }
        (token, cookie)
    }

    fn verify(&self, cookie_token: &str, header_token: &str) -> Result<(), KmsError> {
        let matches: bool = cookie_token.as_bytes().ct_eq(header_token.as_bytes()).into();
        if !matches {
            return Err(KmsError::forbidden("CSRF token mismatch"));
        }
        if self.config.single_use {
            if !self.spent_tokens.insert(header_token.to_string()) {
                return Err(KmsError::forbidden("CSRF token already used"));
            }
        }
        Ok(())
    }
}

/// Rejects state-changing browser requests without a valid token pair.
/// Runs innermost, after the common core, so a CSRF failure never reaches
/// a handler.
pub async fn csrf_guard(State(state): State<CsrfState>, request: Request, next: Next) -> Response {
    if matches!(*request.method(), Method::GET | Method::HEAD | Method::OPTIONS) {
        return next.run(request).await;
    }

    let cookie_token = match cookie_value(&request, state.cookie_name()) {
        Some(token) => token,
        None => {
            return ApiError(KmsError::forbidden("missing CSRF cookie")).into_response();
        }
    };
    let header_token = match request
        .headers()
        .get("x-csrf-token")
        .and_then(|value| value.to_str().ok())
    {
        Some(token) => token.to_string(),
        None => {
            return ApiError(KmsError::forbidden("missing X-CSRF-Token header")).into_response();
        }
    };

    if let Err(error) = state.verify(&cookie_token, &header_token) {
        return ApiError(error).into_response();
    }
    next.run(request).await
}

/// Builds the token response parts for the issuing endpoint.
pub fn issue_csrf_token(state: &CsrfState) -> Result<(HeaderValue, String), KmsError> {
    let (token, cookie) = state.issue();
    let cookie = HeaderValue::from_str(&cookie)
        .map_err(|_| KmsError::internal("CSRF cookie is not a valid header value"))?;
    Ok((cookie, token))
}

fn cookie_value(request: &Request, name: &str) -> Option<String> {
    let header = request.headers().get(header::COOKIE)?.to_str().ok()?;
    for pair in header.split(';') {
        if let Some((key, value)) = pair.trim().split_once('=') {
            if key == name {
                return Some(value.to_string());
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(single_use: bool) -> CsrfState {
        CsrfState::new(CsrfCookieConfig {
            single_use,
            ..Default::default()
        })
    }

    #[test]
    fn issue_binds_token_to_cookie() {
        let state = state(false);
        let (token, cookie) = state.issue();
        assert!(cookie.starts_with(&format!("kms-csrf={token}")));
        assert!(cookie.contains("SameSite=Strict"));
        assert!(cookie.contains("Secure"));
        assert!(cookie.contains("HttpOnly"));
    }

    #[test]
    fn verify_accepts_matching_pair() {
        let state = state(false);
        let (token, _) = state.issue();
        assert!(state.verify(&token, &token).is_ok());
        // Reusable by default.
        assert!(state.verify(&token, &token).is_ok());
    }

    #[test]
    fn verify_rejects_mismatch() {
        let state = state(false);
        let (token, _) = state.issue();
        assert!(state.verify(&token, "forged").is_err());
    }

    #[test]
    fn single_use_spends_tokens() {
        let state = state(true);
        let (token, _) = state.issue();
        assert!(state.verify(&token, &token).is_ok());
        assert!(state.verify(&token, &token).is_err());
    }
}
