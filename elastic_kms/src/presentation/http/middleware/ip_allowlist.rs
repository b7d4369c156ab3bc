// /////////////////////////////////////////////////////////////////////////////
// Elastic KMS
// Copyright (c) 2025 Elastic KMS Contributors
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! IP allowlist filter for the public contexts. The admin plane is
//! loopback-bound and carries no filter.

use std::collections::HashSet;
use std::net::IpAddr;
use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use elastic_kms_domain::KmsError;
use ipnet::IpNet;

use crate::presentation::http::error::ApiError;
use crate::presentation::http::state::RequestContext;

/// Compiled allowlist. Empty configuration admits everyone, which is the
/// development default.
#[derive(Debug, Clone)]
pub struct IpAllowlist {
    ips: Arc<HashSet<IpAddr>>,
    cidrs: Arc<Vec<IpNet>>,
    open: bool,
}

impl IpAllowlist {
    pub fn new(ips: &[String], cidrs: &[String]) -> Result<Self, KmsError> {
        let parsed_ips = ips
            .iter()
            .map(|value| {
                value
                    .parse::<IpAddr>()
                    .map_err(|_| KmsError::validation(format!("allowed_ips entry '{value}' is not an IP")))
            })
            .collect::<Result<HashSet<_>, _>>()?;
        let parsed_cidrs = cidrs
            .iter()
            .map(|value| {
                value
                    .parse::<IpNet>()
                    .map_err(|_| KmsError::validation(format!("allowed_cidrs entry '{value}' is not a CIDR")))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let open = parsed_ips.is_empty() && parsed_cidrs.is_empty();
        Ok(Self {
            ips: Arc::new(parsed_ips),
            cidrs: Arc::new(parsed_cidrs),
            open,
        })
    }

    pub fn allows(&self, ip: IpAddr) -> bool {
        self.open || self.ips.contains(&ip) || self.cidrs.iter().any(|net| net.contains(&ip))
    }
}

pub async fn ip_allowlist(
    State(allowlist): State<IpAllowlist>,
    request: Request,
    next: Next,
) -> Response {
    let ip = request
        .extensions()
        .get::<RequestContext>()
        .map(|ctx| ctx.client_ip)
        .unwrap_or_else(|| super::client_ip(&request));

    if !allowlist.allows(ip) {
        tracing::warn!(client_ip = %ip, "client IP not in allowlist");
        return ApiError(KmsError::forbidden("client IP is not allowed")).into_response();
    }
    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_allowlist_admits_everyone() {
        let allowlist = IpAllowlist::new(&[], &[]).unwrap();
        assert!(allowlist.allows("203.0.113.9".parse().unwrap()));
    }

    #[test]
    fn explicit_ip_and_cidr_matching() {
        let allowlist = IpAllowlist::new(
            &["192.0.2.7".to_string()],
            &["10.0.0.0/8".to_string()],
        )
        .unwrap();
        assert!(allowlist.allows("192.0.2.7".parse().unwrap()));
        assert!(allowlist.allows("10.42.0.1".parse().unwrap()));
        assert!(!allowlist.allows("192.0.2.8".parse().unwrap()));
        assert!(!allowlist.allows("203.0.113.9".parse().unwrap()));
    }

    #[test]
    fn bad_entries_are_rejected() {
        assert!(IpAllowlist::new(&["not-an-ip".to_string()], &[]).is_err());
        assert!(IpAllowlist::new(&[], &["10.0.0.0/99".to_string()]).is_err());
    }
}
