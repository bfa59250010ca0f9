// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # API Data Models
//!
//! Request and response bodies of the HTTP surface. All types derive
//! `ToSchema` for the OpenAPI document served at `/docs`.
//!
//! Amounts are rendered in display units of the settlement token and rates
//! as percentages; raw on-chain values stay inside the engine.
//!
//! ## Model Categories
//!
//! - **Verification**: identity attestation relay (`/api/verify`)
//! - **Identity**: cached linked status of a wallet
//! - **Loans**: a borrower's loans and the contract's tier table

use alloy::primitives::U256;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::{IntoParams, ToSchema};

use crate::blockchain::{format_amount, format_bps, ContractStats, LoanPhase, LoanRecord};
use crate::engine::{SalaryTier, TierTerms, VerificationStatus};
use crate::providers::{AttestationRequest, DisclosedClaims};

// =============================================================================
// Verification
// =============================================================================

/// Attestation payload as posted by the identity app.
///
/// Every field is optional on the wire so that incomplete bodies get the
/// documented 400 instead of an extractor rejection.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VerifyRequest {
    /// Document type (1 = passport, 2 = EU ID card, 3 = Aadhaar)
    pub attestation_id: Option<u32>,
    #[schema(value_type = Object)]
    pub proof: Option<Value>,
    pub public_signals: Option<Vec<String>>,
    /// Hex-encoded user context
    pub user_context_data: Option<String>,
}

impl VerifyRequest {
    pub fn into_attestation(self) -> Result<AttestationRequest, String> {
        let request = AttestationRequest {
            attestation_id: self.attestation_id.unwrap_or_default(),
            proof: self.proof.unwrap_or(Value::Null),
            public_signals: self.public_signals.unwrap_or_default(),
            user_context_data: self.user_context_data.unwrap_or_default(),
        };
        request.validate()?;
        Ok(request)
    }
}

/// Outcome of an attestation check.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResponse {
    /// `success` or `error`
    pub status: String,
    /// Absent when the request never reached the verifier
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credential_subject: Option<DisclosedClaims>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(rename = "error_code", skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
}

impl VerifyResponse {
    pub fn success(claims: DisclosedClaims) -> Self {
        Self {
            status: "success".to_string(),
            result: Some(true),
            credential_subject: Some(claims),
            message: None,
            error_code: None,
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            result: None,
            credential_subject: None,
            message: Some(message.into()),
            error_code: None,
        }
    }

    pub fn failed(error_code: &str, message: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            result: Some(false),
            credential_subject: None,
            message: Some(message.into()),
            error_code: Some(error_code.to_string()),
        }
    }
}

// =============================================================================
// Identity
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct IdentityStatusResponse {
    pub wallet: String,
    pub is_linked: bool,
    pub last_checked_at: DateTime<Utc>,
}

impl From<VerificationStatus> for IdentityStatusResponse {
    fn from(status: VerificationStatus) -> Self {
        Self {
            wallet: status.wallet.to_string(),
            is_linked: status.is_linked,
            last_checked_at: status.last_checked_at,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct IdentityQuery {
    /// Bypass the cache and re-read the registry
    #[serde(default)]
    pub refresh: bool,
}

// =============================================================================
// Loans
// =============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LoanPhaseDto {
    PendingApproval,
    Active,
    PaidOff,
}

impl From<LoanPhase> for LoanPhaseDto {
    fn from(phase: LoanPhase) -> Self {
        match phase {
            LoanPhase::PendingApproval => Self::PendingApproval,
            LoanPhase::Active => Self::Active,
            LoanPhase::PaidOff => Self::PaidOff,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoanSummary {
    pub loan_id: String,
    pub amount: String,
    /// Percentage, e.g. `8%`
    pub interest_rate: String,
    pub term_months: String,
    pub monthly_payment: String,
    pub total_amount: String,
    pub remaining_balance: String,
    pub phase: LoanPhaseDto,
    pub salary_range: String,
    pub document_commitment: String,
}

impl LoanSummary {
    pub fn from_record(record: &LoanRecord, decimals: u8) -> Self {
        Self {
            loan_id: record.loan_id.to_string(),
            amount: format_amount(record.amount, decimals),
            interest_rate: format_bps(record.interest_rate_bps),
            term_months: record.term_months.to_string(),
            monthly_payment: format_amount(record.monthly_payment, decimals),
            total_amount: format_amount(record.total_amount, decimals),
            remaining_balance: format_amount(record.remaining_balance, decimals),
            phase: record.phase().into(),
            salary_range: record.salary_range.clone(),
            document_commitment: record.document_commitment.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BorrowerLoansResponse {
    pub borrower: String,
    /// Whether a pending or active loan blocks a new application
    pub has_open_loan: bool,
    pub loans: Vec<LoanSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TierTermsResponse {
    pub tier: String,
    pub credit_limit: String,
    pub interest_rate: String,
}

impl TierTermsResponse {
    pub fn from_terms(terms: &TierTerms, decimals: u8) -> Self {
        Self {
            tier: terms.tier.as_str().to_string(),
            credit_limit: format_amount(terms.credit_limit, decimals),
            interest_rate: format_bps(terms.interest_rate_bps),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    pub network: String,
    pub total_issued: String,
    pub total_active: String,
    /// Loan contract balance of the settlement token
    pub balance: String,
    pub next_loan_id: String,
    pub tiers: Vec<TierTermsResponse>,
}

impl StatsResponse {
    pub fn new(
        network: &str,
        stats: &ContractStats,
        tiers: &[TierTerms],
        decimals: u8,
    ) -> Self {
        Self {
            network: network.to_string(),
            total_issued: stats.total_issued.to_string(),
            total_active: stats.total_active.to_string(),
            balance: format_amount(stats.balance, decimals),
            next_loan_id: stats.next_id.to_string(),
            tiers: tiers
                .iter()
                .map(|t| TierTermsResponse::from_terms(t, decimals))
                .collect(),
        }
    }
}

/// Tier terms with a zero limit are unconfigured on the contract.
pub fn configured_tier(tier: SalaryTier, credit_limit: U256, rate: U256) -> Option<TierTerms> {
    (!credit_limit.is_zero()).then_some(TierTerms {
        tier,
        credit_limit,
        interest_rate_bps: rate,
    })
}
