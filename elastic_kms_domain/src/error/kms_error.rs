// /////////////////////////////////////////////////////////////////////////////
// Elastic KMS
// Copyright (c) 2025 Elastic KMS Contributors
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Domain Error System
//!
//! A single hierarchical error type for the KMS domain. Every failure the
//! service can surface is one of a closed set of kinds, and each kind has a
//! fixed HTTP status so clients can pattern-match on the error envelope.
//!
//! Kinds and their mapping:
//!
//! | Kind          | Raised by                               | HTTP |
//! |---------------|-----------------------------------------|------|
//! | `Validation`  | request validation, business rules      | 400  |
//! | `Unauthorized`| reserved for future authentication      | 401  |
//! | `Forbidden`   | IP filter, CSRF, export policy          | 403  |
//! | `NotFound`    | persistence lookups                     | 404  |
//! | `Conflict`    | unique violations, version races        | 409  |
//! | `RateLimited` | token-bucket limiter                    | 429  |
//! | `Sealed`      | barrier operations before unseal        | 503  |
//! | `Internal`    | unexpected faults, crypto failures      | 500  |
//! | `Upstream`    | database unreachable                    | 502  |
//! | `Timeout`     | cancellation, slow operations           | 504  |
//!
//! `Transient` never reaches a client: the persistence gateway retries it
//! once and converts a second failure into `Upstream`.

use thiserror::Error;

/// Domain-specific errors for the key-management service.
///
/// Each variant carries a human-readable message. Messages never contain
/// key material; they are safe to log and to return in the error envelope.
#[derive(Error, Debug, Clone)]
pub enum KmsError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("barrier is sealed: {0}")]
    Sealed(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("upstream unavailable: {0}")]
    Upstream(String),

    #[error("timeout: {0}")]
    Timeout(String),

    /// Retryable persistence fault. Internal to the gateway; surfaced as
    /// `Upstream` if the retry also fails.
    #[error("transient error: {0}")]
    Transient(String),
}

/// Closed classification of [`KmsError`] variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    Unauthorized,
    Forbidden,
    NotFound,
    Conflict,
    RateLimited,
    Sealed,
    Internal,
    Upstream,
    Timeout,
}

impl ErrorKind {
    /// Stable wire name used in the `error` field of the envelope.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::RateLimited => "rate_limited",
            ErrorKind::Sealed => "sealed",
            ErrorKind::Internal => "internal",
            ErrorKind::Upstream => "upstream",
            ErrorKind::Timeout => "timeout",
        }
    }

    /// HTTP status code this kind maps to.
    pub fn http_status(&self) -> u16 {
        match self {
            ErrorKind::Validation => 400,
            ErrorKind::Unauthorized => 401,
            ErrorKind::Forbidden => 403,
            ErrorKind::NotFound => 404,
            ErrorKind::Conflict => 409,
            ErrorKind::RateLimited => 429,
            ErrorKind::Sealed => 503,
            ErrorKind::Internal => 500,
            ErrorKind::Upstream => 502,
            ErrorKind::Timeout => 504,
        }
    }
}

impl KmsError {
    /// Creates a new validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Creates a new forbidden error
    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    /// Creates a new not-found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Creates a new conflict error
    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    /// Creates a new sealed error
    pub fn sealed(msg: impl Into<String>) -> Self {
        Self::Sealed(msg.into())
    }

    /// Creates a new internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Creates a new upstream error
    pub fn upstream(msg: impl Into<String>) -> Self {
        Self::Upstream(msg.into())
    }

    /// Creates a new timeout error
    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    /// Creates a new transient (retryable) error
    pub fn transient(msg: impl Into<String>) -> Self {
        Self::Transient(msg.into())
    }

    /// The surfaced classification of this error. `Transient` is reported
    /// as `Upstream` if it escapes the gateway's retry loop.
    pub fn kind(&self) -> ErrorKind {
        match self {
            KmsError::Validation(_) => ErrorKind::Validation,
            KmsError::Unauthorized(_) => ErrorKind::Unauthorized,
            KmsError::Forbidden(_) => ErrorKind::Forbidden,
            KmsError::NotFound(_) => ErrorKind::NotFound,
            KmsError::Conflict(_) => ErrorKind::Conflict,
            KmsError::RateLimited(_) => ErrorKind::RateLimited,
            KmsError::Sealed(_) => ErrorKind::Sealed,
            KmsError::Internal(_) => ErrorKind::Internal,
            KmsError::Upstream(_) | KmsError::Transient(_) => ErrorKind::Upstream,
            KmsError::Timeout(_) => ErrorKind::Timeout,
        }
    }

    /// True for faults the caller may retry without changing the request.
    pub fn is_transient(&self) -> bool {
        matches!(self, KmsError::Transient(_) | KmsError::Upstream(_) | KmsError::Timeout(_))
    }
}
