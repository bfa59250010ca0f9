// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Identity attestation relay.

use axum::{extract::State, http::StatusCode, Json};
use tracing::{error, info, warn};

use crate::models::{VerifyRequest, VerifyResponse};
use crate::state::AppState;

/// Check an identity attestation with the configured verifier.
#[utoipa::path(
    post,
    path = "/api/verify",
    tag = "Verification",
    request_body = VerifyRequest,
    responses(
        (status = 200, description = "Attestation verified", body = VerifyResponse),
        (status = 400, description = "Missing fields or verification failed", body = VerifyResponse),
        (status = 500, description = "Verifier error", body = VerifyResponse),
        (status = 503, description = "No verifier configured", body = VerifyResponse)
    )
)]
pub async fn verify_attestation(
    State(state): State<AppState>,
    Json(body): Json<VerifyRequest>,
) -> (StatusCode, Json<VerifyResponse>) {
    let request = match body.into_attestation() {
        Ok(request) => request,
        Err(message) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(VerifyResponse::invalid_request(message)),
            )
        }
    };

    let Some(verifier) = state.attestation.as_ref() else {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(VerifyResponse::failed(
                "VERIFIER_UNAVAILABLE",
                "Attestation verifier is not configured",
            )),
        );
    };

    info!(
        attestation_id = request.attestation_id,
        public_signals = request.public_signals.len(),
        user_context = %request.user_context_data,
        "Verifying identity attestation"
    );

    match verifier.verify(&request).await {
        Ok(verdict) if verdict.is_valid => {
            info!(attestation_id = request.attestation_id, "Attestation verified");
            (StatusCode::OK, Json(VerifyResponse::success(verdict.claims)))
        }
        Ok(verdict) => {
            warn!(
                attestation_id = request.attestation_id,
                reason = verdict.message.as_deref().unwrap_or("unspecified"),
                "Attestation rejected"
            );
            (
                StatusCode::BAD_REQUEST,
                Json(VerifyResponse::failed(
                    "VERIFICATION_FAILED",
                    "Verification failed",
                )),
            )
        }
        Err(e) => {
            error!(error = %e, "Attestation verifier error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(VerifyResponse::failed("UNKNOWN_ERROR", e.to_string())),
            )
        }
    }
}
