// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Aggregation relayer client.
//!
//! The relayer accepts a Groth16 proof, verifies it off-ledger and batches it
//! into an aggregation whose Merkle root is published on the settlement
//! ledger. Submission returns a job id; the job is then polled until the
//! relayer reports it aggregated (or failed).

use std::time::Duration;

use alloy::primitives::{B256, U256};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::engine::aggregation::AggregationReceipt;
use crate::engine::proof::IdentityProof;

const PROOF_TYPE: &str = "groth16";
const PROOF_LIBRARY: &str = "snarkjs";
const PROOF_CURVE: &str = "bn128";

/// Relayer job state as observed by a poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    /// Queued, verified or waiting for the aggregation to close
    Pending { status: String },
    Aggregated(AggregationReceipt),
    Failed(String),
}

#[derive(Debug, thiserror::Error)]
pub enum RelayerError {
    #[error("Relayer request failed: {0}")]
    Request(String),

    #[error("Relayer rejected the proof: {0}")]
    Rejected(String),

    #[error("Relayer response was invalid: {0}")]
    InvalidResponse(String),
}

#[async_trait]
pub trait Relayer: Send + Sync {
    /// Submit a proof, returning the relayer's job id.
    async fn submit(&self, proof: &IdentityProof) -> Result<String, RelayerError>;

    async fn job_status(&self, job_id: &str) -> Result<JobStatus, RelayerError>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubmitResponse {
    #[serde(default)]
    job_id: Option<String>,
    #[serde(default)]
    optimistic_verify: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobStatusResponse {
    status: String,
    #[serde(default)]
    aggregation_id: Option<Value>,
    #[serde(default)]
    aggregation_details: Option<AggregationDetails>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AggregationDetails {
    #[serde(default)]
    merkle_proof: Vec<B256>,
    #[serde(default)]
    number_of_leaves: Option<Value>,
    #[serde(default)]
    leaf_index: Option<Value>,
}

/// HTTP client for the aggregation relayer.
#[derive(Debug, Clone)]
pub struct HttpRelayer {
    base_url: String,
    api_key: String,
    http: Client,
}

impl HttpRelayer {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, RelayerError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RelayerError::Request(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            http,
        })
    }

    async fn read_json<T: for<'de> Deserialize<'de>>(
        response: reqwest::Response,
    ) -> Result<T, RelayerError> {
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| RelayerError::Request(e.to_string()))?;

        if status.is_server_error() {
            return Err(RelayerError::Request(format!("relayer returned {status}: {text}")));
        }
        if !status.is_success() {
            return Err(RelayerError::Rejected(format!("{status}: {text}")));
        }

        serde_json::from_str(&text).map_err(|e| RelayerError::InvalidResponse(format!("{e}: {text}")))
    }
}

#[async_trait]
impl Relayer for HttpRelayer {
    async fn submit(&self, proof: &IdentityProof) -> Result<String, RelayerError> {
        let body = json!({
            "proofType": PROOF_TYPE,
            "proofOptions": {
                "library": PROOF_LIBRARY,
                "curve": PROOF_CURVE,
            },
            "proofData": {
                "proof": proof.proof_payload(),
                "publicSignals": proof.relayer_signals(),
            },
        });

        let response = self
            .http
            .post(format!("{}/submit-proof/{}", self.base_url, self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| RelayerError::Request(e.to_string()))?;

        let parsed: SubmitResponse = Self::read_json(response).await?;

        if parsed
            .optimistic_verify
            .as_deref()
            .is_some_and(|v| !v.eq_ignore_ascii_case("success"))
        {
            let reason = parsed
                .message
                .unwrap_or_else(|| "optimistic verification failed".to_string());
            warn!(%reason, "Relayer rejected proof");
            return Err(RelayerError::Rejected(reason));
        }

        let job_id = parsed
            .job_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| RelayerError::InvalidResponse("missing jobId".to_string()))?;

        info!(job_id = %job_id, provider = %proof.kind(), "Proof submitted to relayer");
        Ok(job_id)
    }

    async fn job_status(&self, job_id: &str) -> Result<JobStatus, RelayerError> {
        let response = self
            .http
            .get(format!("{}/job-status/{}/{}", self.base_url, self.api_key, job_id))
            .send()
            .await
            .map_err(|e| RelayerError::Request(e.to_string()))?;

        let parsed: JobStatusResponse = Self::read_json(response).await?;
        debug!(job_id, status = %parsed.status, "Relayer job polled");
        parse_job_status(parsed)
    }
}

fn parse_job_status(parsed: JobStatusResponse) -> Result<JobStatus, RelayerError> {
    match parsed.status.as_str() {
        "Aggregated" => {
            let details = parsed.aggregation_details.ok_or_else(|| {
                RelayerError::InvalidResponse("aggregated job without aggregationDetails".into())
            })?;
            let aggregation_id = parsed
                .aggregation_id
                .as_ref()
                .and_then(numeric)
                .ok_or_else(|| RelayerError::InvalidResponse("missing aggregationId".into()))?;
            // The relayer omits the leaf count for single-leaf aggregations.
            let leaf_count = details
                .number_of_leaves
                .as_ref()
                .and_then(numeric)
                .unwrap_or(U256::from(1));
            let leaf_index = details
                .leaf_index
                .as_ref()
                .and_then(numeric)
                .unwrap_or(U256::ZERO);

            Ok(JobStatus::Aggregated(AggregationReceipt {
                aggregation_id,
                merkle_path: details.merkle_proof,
                leaf_count,
                leaf_index,
            }))
        }
        "Failed" => Ok(JobStatus::Failed(
            parsed.error.unwrap_or_else(|| "relayer job failed".to_string()),
        )),
        _ => Ok(JobStatus::Pending {
            status: parsed.status,
        }),
    }
}

/// Numbers arrive either as JSON numbers or as decimal/hex strings.
fn numeric(value: &Value) -> Option<U256> {
    match value {
        Value::Number(n) => n.as_u64().map(U256::from),
        Value::String(s) => match s.strip_prefix("0x") {
            Some(hex) => U256::from_str_radix(hex, 16).ok(),
            None => U256::from_str_radix(s, 10).ok(),
        },
        _ => None,
    }
}
