// /////////////////////////////////////////////////////////////////////////////
// Elastic KMS
// Copyright (c) 2025 Elastic KMS Contributors
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Request-plane integration over `oneshot` requests: the create →
//! generate → encrypt → decrypt flow, CSRF enforcement on the browser
//! context only, per-IP rate limiting, the IP allowlist, readiness, and
//! the error envelope shape.

mod common;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use serde_json::json;
use tower::ServiceExt;

use common::{get_request, harness, harness_with_unseal, json_request, routers, send, test_config};

#[tokio::test]
async fn service_context_create_generate_encrypt_decrypt() {
    let h = harness().await;
    let (public, _) = routers(&h, &test_config());

    let (status, created) = send(
        &public,
        json_request(
            Method::POST,
            "/service/api/v1/elastickey",
            json!({"name": "k1", "algorithm": "A256GCM", "provider": "internal", "versioning_allowed": true}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let elastic_key_id = created["id"].as_str().unwrap().to_string();
    assert_eq!(created["status"], "pending_generate");

    let (status, material) = send(
        &public,
        json_request(
            Method::POST,
            "/service/api/v1/crypto/generate",
            json!({"elastic_key_id": elastic_key_id}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(material["version"], 1);
    assert!(material.get("jwk").is_none());

    let (status, encrypted) = send(
        &public,
        json_request(
            Method::POST,
            "/service/api/v1/crypto/encrypt",
            json!({"elastic_key_id": elastic_key_id, "plaintext": "SGVsbG8="}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let jwe = encrypted["jwe"].as_str().unwrap();

    let (status, decrypted) = send(
        &public,
        json_request(
            Method::POST,
            "/service/api/v1/crypto/decrypt",
            json!({"elastic_key_id": elastic_key_id, "jwe": jwe}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(decrypted["plaintext"], "SGVsbG8=");
}

#[tokio::test]
async fn browser_context_enforces_csrf_service_does_not() {
    let h = harness().await;
    let (public, _) = routers(&h, &test_config());
    let body = json!({"name": "csrf-key", "algorithm": "A256GCM", "provider": "internal"});

    // S4 step 1: no token on the browser context.
    let (status, envelope) = send(
        &public,
        json_request(Method::POST, "/browser/api/v1/elastickey", body.clone()),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(envelope["error"], "forbidden");

    // Nothing was created.
    let (_, listing) = send(&public, get_request("/service/api/v1/elastickeys")).await;
    assert_eq!(listing["total"], 0);

    // S4 steps 2-3: fetch a token, then retry with cookie + header.
    let response = public
        .clone()
        .oneshot(get_request("/browser/api/v1/csrf-token"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap()
        .split(';')
        .next()
        .unwrap()
        .to_string();
    let (_, token_body) = common::read_json(response).await;
    let token = token_body["token"].as_str().unwrap();

    let request = Request::builder()
        .method(Method::POST)
        .uri("/browser/api/v1/elastickey")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::COOKIE, &cookie)
        .header("x-csrf-token", token)
        .body(Body::from(body.to_string()))
        .unwrap();
    let (status, _) = send(&public, request).await;
    assert_eq!(status, StatusCode::CREATED);

    // S4 step 4: the service context never asks for a token.
    let (status, _) = send(
        &public,
        json_request(
            Method::POST,
            "/service/api/v1/elastickey",
            json!({"name": "service-key", "algorithm": "A256GCM", "provider": "internal"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn mismatched_csrf_token_is_forbidden() {
    let h = harness().await;
    let (public, _) = routers(&h, &test_config());

    let response = public
        .clone()
        .oneshot(get_request("/browser/api/v1/csrf-token"))
        .await
        .unwrap();
    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap()
        .split(';')
        .next()
        .unwrap()
        .to_string();

    let request = Request::builder()
        .method(Method::POST)
        .uri("/browser/api/v1/elastickey")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::COOKIE, &cookie)
        .header("x-csrf-token", "not-the-token")
        .body(Body::from(
            json!({"name": "x", "algorithm": "A256GCM", "provider": "internal"}).to_string(),
        ))
        .unwrap();
    let (status, _) = send(&public, request).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn rate_limit_rejects_burst_then_recovers() {
    let h = harness().await;
    let config_path = common::write_temp_config(
        r#"
        public_bind = "127.0.0.1:0"
        private_bind = "127.0.0.1:0"
        database_url = "sqlite::memory:"
        unseal_mode = "direct"
        unseal_inputs = ["integration-test-secret"]
        rate_limit_per_ip_per_sec = 5
        "#,
    );
    let config = elastic_kms_bootstrap::KmsConfig::load(&config_path).unwrap();
    let (public, _) = routers(&h, &config);

    let mut limited = 0;
    for _ in 0..20 {
        let (status, _) = send(&public, get_request("/service/api/v1/elastickeys")).await;
        if status == StatusCode::TOO_MANY_REQUESTS {
            limited += 1;
        }
    }
    assert!(limited >= 14, "only {limited} requests were limited");

    // After idling, requests flow again.
    tokio::time::sleep(std::time::Duration::from_millis(1100)).await;
    let (status, _) = send(&public, get_request("/service/api/v1/elastickeys")).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn ip_allowlist_guards_public_but_not_admin() {
    let h = harness().await;
    let config_path = common::write_temp_config(
        r#"
        public_bind = "127.0.0.1:0"
        private_bind = "127.0.0.1:0"
        database_url = "sqlite::memory:"
        unseal_mode = "direct"
        unseal_inputs = ["integration-test-secret"]
        allowed_ips = ["198.51.100.7"]
        "#,
    );
    let config = elastic_kms_bootstrap::KmsConfig::load(&config_path).unwrap();
    let (public, admin) = routers(&h, &config);

    // The oneshot client presents no allowed address.
    let (status, envelope) = send(&public, get_request("/service/api/v1/elastickeys")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(envelope["error"], "forbidden");

    // Forwarded allowed address passes.
    let request = Request::builder()
        .method(Method::GET)
        .uri("/service/api/v1/elastickeys")
        .header("x-forwarded-for", "198.51.100.7")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&public, request).await;
    assert_eq!(status, StatusCode::OK);

    // The admin plane carries no IP filter.
    let (status, _) = send(&admin, get_request("/livez")).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn readiness_tracks_unseal_state() {
    let sealed = harness_with_unseal(false).await;
    let (_, admin) = routers(&sealed, &test_config());
    let (status, body) = send(&admin, get_request("/readyz")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(body["reasons"]
        .as_array()
        .unwrap()
        .iter()
        .any(|reason| reason.as_str().unwrap().contains("sealed")));

    let ready = harness().await;
    let (_, admin) = routers(&ready, &test_config());
    // Pools need a moment to prime.
    for _ in 0..100 {
        let (status, _) = send(&admin, get_request("/readyz")).await;
        if status == StatusCode::OK {
            return;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }
    panic!("service never became ready");
}

#[tokio::test]
async fn admin_rotation_keeps_old_ciphertext_decryptable() {
    let h = harness().await;
    let (public, admin) = routers(&h, &test_config());

    let (_, created) = send(
        &public,
        json_request(
            Method::POST,
            "/service/api/v1/elastickey",
            json!({"name": "rotating", "algorithm": "A256GCM", "provider": "internal", "versioning_allowed": true}),
        ),
    )
    .await;
    let elastic_key_id = created["id"].as_str().unwrap().to_string();
    send(
        &public,
        json_request(
            Method::POST,
            "/service/api/v1/crypto/generate",
            json!({"elastic_key_id": elastic_key_id}),
        ),
    )
    .await;
    let (_, encrypted) = send(
        &public,
        json_request(
            Method::POST,
            "/service/api/v1/crypto/encrypt",
            json!({"elastic_key_id": elastic_key_id, "plaintext": "cm90YXRl"}),
        ),
    )
    .await;
    let jwe = encrypted["jwe"].as_str().unwrap().to_string();

    let (status, rotated) = send(
        &admin,
        json_request(Method::POST, "/rotate/content", json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(rotated["rotated"], "content");

    let (status, decrypted) = send(
        &public,
        json_request(
            Method::POST,
            "/service/api/v1/crypto/decrypt",
            json!({"elastic_key_id": elastic_key_id, "jwe": jwe}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(decrypted["plaintext"], "cm90YXRl");

    let (status, envelope) = send(
        &admin,
        json_request(Method::POST, "/rotate/sideways", json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(envelope["error"], "validation");
}

#[tokio::test]
async fn admin_shutdown_is_idempotent_and_accepted() {
    let h = harness().await;
    let (_, admin) = routers(&h, &test_config());

    let (status, _) = send(&admin, json_request(Method::POST, "/shutdown", json!({}))).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert!(h.coordinator.is_shutting_down());

    let (status, _) = send(&admin, json_request(Method::POST, "/shutdown", json!({}))).await;
    assert_eq!(status, StatusCode::ACCEPTED);
}

#[tokio::test]
async fn unknown_body_fields_produce_validation_envelope() {
    let h = harness().await;
    let (public, _) = routers(&h, &test_config());

    let (status, envelope) = send(
        &public,
        json_request(
            Method::POST,
            "/service/api/v1/elastickey",
            json!({"name": "k", "algorithm": "A256GCM", "provider": "internal", "surprise": 1}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(envelope["error"], "validation");
    assert_eq!(envelope["status"], 400);
    assert_eq!(envelope["path"], "/service/api/v1/elastickey");
    assert!(!envelope["request_id"].as_str().unwrap().is_empty());
    assert!(!envelope["timestamp"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn duplicate_name_yields_conflict_envelope() {
    let h = harness().await;
    let (public, _) = routers(&h, &test_config());
    let body = json!({"name": "dup", "algorithm": "A256GCM", "provider": "internal"});

    let (status, _) = send(
        &public,
        json_request(Method::POST, "/service/api/v1/elastickey", body.clone()),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, envelope) = send(
        &public,
        json_request(Method::POST, "/service/api/v1/elastickey", body),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(envelope["error"], "conflict");
}

#[tokio::test]
async fn rejected_algorithms_name_the_problem() {
    let h = harness().await;
    let (public, _) = routers(&h, &test_config());

    for (algorithm, fragment) in [
        ("none", "not permitted"),
        ("RSA1_5", "signing only"),
        ("A512GCM", "unknown algorithm"),
    ] {
        let (status, envelope) = send(
            &public,
            json_request(
                Method::POST,
                "/service/api/v1/elastickey",
                json!({"name": format!("bad-{algorithm}"), "algorithm": algorithm, "provider": "internal"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(envelope["message"].as_str().unwrap().contains(fragment));
    }
}

#[tokio::test]
async fn sealed_barrier_maps_to_503_envelope() {
    let h = harness_with_unseal(false).await;
    let (public, _) = routers(&h, &test_config());

    let (status, created) = send(
        &public,
        json_request(
            Method::POST,
            "/service/api/v1/elastickey",
            json!({"name": "sealed", "algorithm": "A256GCM", "provider": "internal"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, envelope) = send(
        &public,
        json_request(
            Method::POST,
            "/service/api/v1/crypto/generate",
            json!({"elastic_key_id": created["id"]}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(envelope["error"], "sealed");
}

#[tokio::test]
async fn api_responses_are_no_store_and_carry_request_id() {
    let h = harness().await;
    let (public, _) = routers(&h, &test_config());

    let response = public
        .clone()
        .oneshot(get_request("/service/api/v1/elastickeys"))
        .await
        .unwrap();
    assert_eq!(response.headers().get("cache-control").unwrap(), "no-store");
    assert!(response.headers().contains_key("x-request-id"));
}
