// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Identity-attestation collaborator (passport / national-ID verifier).
//!
//! The verifier itself is an external service. This module owns the payload
//! shape, the verification policy sent alongside it, and the HTTP client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};
use utoipa::ToSchema;

/// Policy the verifier enforces on the disclosed document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VerificationPolicy {
    pub minimum_age: u8,
    pub excluded_countries: Vec<String>,
    pub ofac: bool,
    /// Fields the user agrees to disclose
    pub disclosed_fields: Vec<String>,
}

impl Default for VerificationPolicy {
    fn default() -> Self {
        Self {
            minimum_age: 18,
            excluded_countries: Vec::new(),
            ofac: false,
            disclosed_fields: vec!["nationality".to_string(), "gender".to_string()],
        }
    }
}

/// Attestation payload produced by the user's identity app.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AttestationRequest {
    /// Document type (1 = passport, 2 = EU ID card, 3 = Aadhaar)
    pub attestation_id: u32,
    #[schema(value_type = Object)]
    pub proof: Value,
    pub public_signals: Vec<String>,
    /// Hex-encoded user context (binds the proof to the wallet)
    pub user_context_data: String,
}

impl AttestationRequest {
    /// Check that every field the verifier needs is present.
    pub fn validate(&self) -> Result<(), String> {
        let proof_missing = self.proof.is_null()
            || self.proof.as_object().is_some_and(|o| o.is_empty())
            || self.proof.as_str().is_some_and(str::is_empty);
        if self.attestation_id == 0
            || proof_missing
            || self.public_signals.is_empty()
            || self.user_context_data.trim().is_empty()
        {
            return Err(
                "Missing required fields: attestationId, proof, publicSignals, userContextData"
                    .to_string(),
            );
        }
        Ok(())
    }
}

/// Claims the verifier disclosed on a pass verdict.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct DisclosedClaims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nationality: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_of_birth: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub older_than: Option<String>,
    /// Scope-bound nullifier of the attested document
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nullifier: Option<String>,
}

impl DisclosedClaims {
    /// Whether the verifier attested an age of at least 18.
    pub fn is_adult(&self) -> bool {
        self.older_than
            .as_deref()
            .and_then(|v| v.trim().parse::<u32>().ok())
            .is_some_and(|age| age >= 18)
    }
}

/// Pass/fail verdict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttestationVerdict {
    pub is_valid: bool,
    pub claims: DisclosedClaims,
    pub message: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum AttestationError {
    #[error("Attestation request invalid: {0}")]
    InvalidRequest(String),

    #[error("Attestation verifier request failed: {0}")]
    Request(String),

    #[error("Attestation verifier response was invalid: {0}")]
    InvalidResponse(String),
}

#[async_trait]
pub trait AttestationVerifier: Send + Sync {
    async fn verify(
        &self,
        request: &AttestationRequest,
    ) -> Result<AttestationVerdict, AttestationError>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VerifierResponse {
    #[serde(default)]
    result: bool,
    #[serde(default)]
    credential_subject: Option<DisclosedClaims>,
    #[serde(default)]
    message: Option<String>,
}

/// HTTP client for the external attestation verifier.
#[derive(Debug, Clone)]
pub struct HttpAttestationVerifier {
    endpoint: String,
    scope: String,
    policy: VerificationPolicy,
    http: Client,
}

impl HttpAttestationVerifier {
    pub fn new(
        endpoint: impl Into<String>,
        scope: impl Into<String>,
        policy: VerificationPolicy,
    ) -> Result<Self, AttestationError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| AttestationError::Request(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            scope: scope.into(),
            policy,
            http,
        })
    }
}

#[async_trait]
impl AttestationVerifier for HttpAttestationVerifier {
    async fn verify(
        &self,
        request: &AttestationRequest,
    ) -> Result<AttestationVerdict, AttestationError> {
        request.validate().map_err(AttestationError::InvalidRequest)?;

        info!(
            attestation_id = request.attestation_id,
            public_signals = request.public_signals.len(),
            scope = %self.scope,
            "Forwarding attestation to verifier"
        );

        let body = json!({
            "scope": self.scope,
            "policy": self.policy,
            "attestationId": request.attestation_id,
            "proof": request.proof,
            "publicSignals": request.public_signals,
            "userContextData": request.user_context_data,
        });

        let response = self
            .http
            .post(format!("{}/api/verify", self.endpoint))
            .json(&body)
            .send()
            .await
            .map_err(|e| AttestationError::Request(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| AttestationError::Request(e.to_string()))?;

        // The verifier answers 400 with `result: false` for a failed check,
        // so only 5xx is a transport-level failure.
        if status.is_server_error() {
            warn!(status = %status, "Attestation verifier unavailable");
            return Err(AttestationError::Request(format!("verifier returned {status}: {text}")));
        }

        let parsed: VerifierResponse = serde_json::from_str(&text)
            .map_err(|e| AttestationError::InvalidResponse(format!("{e}: {text}")))?;

        Ok(AttestationVerdict {
            is_valid: parsed.result,
            claims: parsed.credential_subject.unwrap_or_default(),
            message: parsed.message,
        })
    }
}
