// /////////////////////////////////////////////////////////////////////////////
// Elastic KMS
// Copyright (c) 2025 Elastic KMS Contributors
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Crypto operation handlers: encrypt, decrypt, sign, verify, generate.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

use crate::presentation::http::dto::{
    decode_base64, encode_base64, DecryptRequest, DecryptResponse, EncryptRequest, EncryptResponse,
    GenerateRequest, MaterialKeyResponse, SignRequest, SignResponse, VerifyRequest, VerifyResponse,
};
use crate::presentation::http::error::ApiError;
use crate::presentation::http::extract::ApiJson;
use crate::presentation::http::state::AppState;

pub async fn encrypt(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<EncryptRequest>,
) -> Result<Json<EncryptResponse>, ApiError> {
    let plaintext = decode_base64(&request.plaintext, "plaintext")?;
    let result = state.crypto.encrypt(request.elastic_key_id, &plaintext).await;
    state.metrics.record_crypto("encrypt", result.is_ok());
    Ok(Json(EncryptResponse { jwe: result? }))
}

pub async fn decrypt(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<DecryptRequest>,
) -> Result<Json<DecryptResponse>, ApiError> {
    let result = state.crypto.decrypt(request.elastic_key_id, &request.jwe).await;
    state.metrics.record_crypto("decrypt", result.is_ok());
    Ok(Json(DecryptResponse {
        plaintext: encode_base64(&result?),
    }))
}

pub async fn sign(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<SignRequest>,
) -> Result<Json<SignResponse>, ApiError> {
    let payload = decode_base64(&request.payload, "payload")?;
    let result = state.crypto.sign(request.elastic_key_id, &payload).await;
    state.metrics.record_crypto("sign", result.is_ok());
    Ok(Json(SignResponse { jws: result? }))
}

pub async fn verify(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<VerifyRequest>,
) -> Result<Json<VerifyResponse>, ApiError> {
    let result = state.crypto.verify(request.elastic_key_id, &request.jws).await;
    state.metrics.record_crypto("verify", result.is_ok());
    let outcome = result?;
    Ok(Json(VerifyResponse {
        payload: outcome.payload.as_deref().map(encode_base64),
        valid: outcome.valid,
    }))
}

pub async fn generate(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<GenerateRequest>,
) -> Result<(StatusCode, Json<MaterialKeyResponse>), ApiError> {
    let result = state.crypto.generate(request.elastic_key_id).await;
    state.metrics.record_crypto("generate", result.is_ok());
    let material = result?;

    // Per the export contract: the creation response may carry at most
    // the public half, and only when the container allows export.
    let elastic = state.elastic_keys.get(material.elastic_key_id).await?;
    let response = if elastic.export_allowed && elastic.algorithm.is_asymmetric() {
        let jwk = state.crypto.unwrap_material(&material).await?;
        match jwk.to_public() {
            Some(public) => MaterialKeyResponse::with_jwk(&material, public),
            None => MaterialKeyResponse::metadata(&material),
        }
    } else {
        MaterialKeyResponse::metadata(&material)
    };
    Ok((StatusCode::CREATED, Json(response)))
}
