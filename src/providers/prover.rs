// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Income-proof generation collaborator.
//!
//! The prover takes a signed salary PDF and returns a zkVM proof together
//! with its ABI-encoded public values (declared salary tier, signature
//! validity, document commitment, signer key hash).

use std::str::FromStr;
use std::time::Duration;

use alloy::primitives::{Bytes, B256};
use alloy::sol_types::SolValue;
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::blockchain::contracts::SalaryPublicValues;

/// Marker text the prover searches for on the signed page.
pub const DEFAULT_SUB_STRING: &str = "Sample Signed PDF Document";

#[derive(Debug, thiserror::Error)]
pub enum ProverError {
    #[error("Prover request failed: {0}")]
    Request(String),

    #[error("Prover response was invalid: {0}")]
    InvalidResponse(String),

    #[error("Income proof public values are malformed: {0}")]
    MalformedPublicValues(String),
}

/// What the prover is asked to prove.
#[derive(Debug, Clone, Serialize)]
pub struct ProveRequest {
    pub pdf_bytes: Vec<u8>,
    pub page_number: u32,
    pub sub_string: String,
}

impl ProveRequest {
    pub fn new(pdf_bytes: Vec<u8>) -> Self {
        Self {
            pdf_bytes,
            page_number: 0,
            sub_string: DEFAULT_SUB_STRING.to_string(),
        }
    }
}

/// Public values decoded from an income proof.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclaredIncome {
    pub salary_range: String,
    pub signature_valid: bool,
    pub document_commitment: B256,
    pub public_key_hash: B256,
}

/// An income proof as returned by the prover.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomeProof {
    pub public_values: Bytes,
    pub proof: Bytes,
}

impl IncomeProof {
    /// Decode the public values.
    pub fn declared(&self) -> Result<DeclaredIncome, ProverError> {
        let values = SalaryPublicValues::abi_decode_params(&self.public_values)
            .map_err(|e| ProverError::MalformedPublicValues(e.to_string()))?;
        Ok(DeclaredIncome {
            salary_range: values.salaryRange,
            signature_valid: values.signatureValid,
            document_commitment: values.documentCommitment,
            public_key_hash: values.publicKeyHash,
        })
    }

    /// Same proof with its public values re-encoded around `commitment`.
    pub fn bind(&self, commitment: B256) -> Result<IncomeProof, ProverError> {
        let declared = self.declared()?;
        let values = SalaryPublicValues {
            salaryRange: declared.salary_range,
            signatureValid: declared.signature_valid,
            documentCommitment: commitment,
            publicKeyHash: declared.public_key_hash,
        };
        Ok(IncomeProof {
            public_values: Bytes::from(values.abi_encode_params()),
            proof: self.proof.clone(),
        })
    }
}

#[async_trait]
pub trait IncomeProver: Send + Sync {
    async fn prove(&self, request: &ProveRequest) -> Result<IncomeProof, ProverError>;
}

/// HTTP client for the income prover.
#[derive(Debug, Clone)]
pub struct HttpIncomeProver {
    base_url: String,
    http: Client,
}

impl HttpIncomeProver {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ProverError> {
        // Proving takes minutes on CPU provers.
        let http = Client::builder()
            .timeout(Duration::from_secs(600))
            .build()
            .map_err(|e| ProverError::Request(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        })
    }
}

#[async_trait]
impl IncomeProver for HttpIncomeProver {
    async fn prove(&self, request: &ProveRequest) -> Result<IncomeProof, ProverError> {
        info!(
            pdf_len = request.pdf_bytes.len(),
            page = request.page_number,
            "Requesting income proof"
        );

        let response = self
            .http
            .post(format!("{}/prove", self.base_url))
            .json(request)
            .send()
            .await
            .map_err(|e| ProverError::Request(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ProverError::Request(e.to_string()))?;

        if !status.is_success() {
            warn!(status = %status, "Income prover failed");
            return Err(ProverError::Request(format!(
                "Proof generation failed: {status} - {text}"
            )));
        }

        let body: Value = serde_json::from_str(&text)
            .map_err(|e| ProverError::InvalidResponse(e.to_string()))?;
        parse_proof_response(body)
    }
}

fn parse_proof_response(body: Value) -> Result<IncomeProof, ProverError> {
    // Some prover builds serialize the proof wrapper as a one-element array.
    let body = match body {
        Value::Array(mut items) if !items.is_empty() => items.swap_remove(0),
        other => other,
    };

    let field = |name: &str| -> Result<Bytes, ProverError> {
        let raw = body
            .get(name)
            .and_then(Value::as_str)
            .ok_or_else(|| ProverError::InvalidResponse(format!("missing {name}")))?;
        Bytes::from_str(raw).map_err(|e| ProverError::InvalidResponse(format!("{name}: {e}")))
    };

    Ok(IncomeProof {
        public_values: field("public_values")?,
        proof: field("proof")?,
    })
}
