// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Error taxonomy of the workflow engine.
//!
//! Local rejections ([`Rejection`]) are raised before any ledger write.
//! Ledger failures are classified by matching the revert reasons the loan
//! contract and registry are known to emit; anything else lands in
//! [`EngineError::Unknown`] with the message untouched.

use std::fmt;
use std::time::Duration;

use alloy::primitives::{Address, B256, U256};

use crate::blockchain::{format_amount, LedgerClientError};

/// Known revert reasons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevertReason {
    InvalidIncomeProof,
    DocumentAlreadyVerified,
    DocumentNotVerified,
    DuplicateActiveLoan,
    AmountExceedsTierLimit,
    InsufficientSettlementBalance,
}

/// Substrings emitted by the contracts, in match order.
const REVERT_PATTERNS: &[(&str, RevertReason)] = &[
    ("Invalid proof", RevertReason::InvalidIncomeProof),
    ("Document already verified", RevertReason::DocumentAlreadyVerified),
    ("Document not verified", RevertReason::DocumentNotVerified),
    ("User already has an active loan", RevertReason::DuplicateActiveLoan),
    ("Loan amount exceeds salary-based limit", RevertReason::AmountExceedsTierLimit),
    ("Insufficient USD funds", RevertReason::InsufficientSettlementBalance),
];

const REJECTED_BY_USER: &[&str] = &["User rejected", "user denied", "User denied"];

impl RevertReason {
    /// Classify a raw ledger error message.
    pub fn classify(message: &str) -> Option<Self> {
        REVERT_PATTERNS
            .iter()
            .find(|(pattern, _)| message.contains(pattern))
            .map(|(_, reason)| *reason)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RevertReason::InvalidIncomeProof => "income proof invalid",
            RevertReason::DocumentAlreadyVerified => "document already verified",
            RevertReason::DocumentNotVerified => "document not verified",
            RevertReason::DuplicateActiveLoan => "duplicate active loan",
            RevertReason::AmountExceedsTierLimit => "amount exceeds tier limit",
            RevertReason::InsufficientSettlementBalance => "insufficient settlement-token balance",
        }
    }
}

impl fmt::Display for RevertReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why an application was refused locally, before any ledger write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    MissingAmount,
    MissingTerm,
    InvalidAmount(String),
    ExceedsTierLimit { requested: U256, limit: U256 },
    ExistingActiveLoan { loan_id: U256 },
    ExistingApplicationPending { loan_id: U256 },
    InsufficientLiquidity { requested: U256, available: U256 },
    IdentityNotVerified { wallet: Address },
    TierNotResolved,
    TierMismatch { declared: String, resolved: String },
    SubmissionInFlight,
    MalformedIncomeProof(String),
}

impl Rejection {
    /// Message with amounts in display units of a token with `decimals`.
    /// `Display` prints raw minor units.
    pub fn describe(&self, decimals: u8) -> String {
        match self {
            Rejection::ExceedsTierLimit { requested, limit } => format!(
                "requested {} exceeds the tier limit of {}",
                format_amount(*requested, decimals),
                format_amount(*limit, decimals)
            ),
            Rejection::InsufficientLiquidity {
                requested,
                available,
            } => format!(
                "insufficient contract balance: available {}, requested {}",
                format_amount(*available, decimals),
                format_amount(*requested, decimals)
            ),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::MissingAmount => f.write_str("loan amount must be positive"),
            Rejection::MissingTerm => f.write_str("loan term must be at least one month"),
            Rejection::InvalidAmount(msg) => write!(f, "invalid loan amount: {msg}"),
            Rejection::ExceedsTierLimit { requested, limit } => write!(
                f,
                "requested {requested} exceeds the tier limit of {limit} (minor units)"
            ),
            Rejection::ExistingActiveLoan { loan_id } => {
                write!(f, "existing active loan #{loan_id}")
            }
            Rejection::ExistingApplicationPending { loan_id } => {
                write!(f, "existing application pending (loan #{loan_id})")
            }
            Rejection::InsufficientLiquidity {
                requested,
                available,
            } => write!(
                f,
                "insufficient contract balance: available {available}, requested {requested} (minor units)"
            ),
            Rejection::IdentityNotVerified { wallet } => {
                write!(f, "identity not verified for {wallet}")
            }
            Rejection::TierNotResolved => f.write_str("salary tier has not been resolved"),
            Rejection::TierMismatch { declared, resolved } => write!(
                f,
                "income proof declares tier {declared} but terms were resolved for {resolved}"
            ),
            Rejection::SubmissionInFlight => {
                f.write_str("an application is already being submitted")
            }
            Rejection::MalformedIncomeProof(msg) => write!(f, "malformed income proof: {msg}"),
        }
    }
}

/// Workflow engine errors.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("proof unavailable: {0}")]
    ProofUnavailable(String),

    #[error("relayer error: {0}")]
    Relayer(String),

    #[error("timed out after {waited:?} waiting for {operation}")]
    Timeout {
        operation: &'static str,
        waited: Duration,
    },

    #[error("ledger reverted ({reason}): {message}")]
    LedgerRevert {
        reason: RevertReason,
        message: String,
    },

    #[error("could not decode {0} from the transaction receipt")]
    EventDecodeFailure(&'static str),

    #[error("wallet disconnected")]
    WalletDisconnected,

    #[error("unauthorized signer: {0}")]
    UnauthorizedSigner(String),

    #[error("application rejected: {0}")]
    Rejected(Rejection),

    #[error("invalid aggregation receipt: {0}")]
    InvalidReceipt(String),

    #[error("proof {0} was already submitted for aggregation")]
    DuplicateSubmission(B256),

    #[error("loan id {0} is an unverified placeholder and cannot be read from the ledger")]
    UnverifiedLoanId(U256),

    #[error("{0}")]
    Unknown(String),
}

impl EngineError {
    /// Classify a raw ledger error message.
    pub fn from_ledger_message(message: String) -> Self {
        if let Some(reason) = RevertReason::classify(&message) {
            return EngineError::LedgerRevert { reason, message };
        }
        if REJECTED_BY_USER.iter().any(|p| message.contains(p)) {
            return EngineError::UnauthorizedSigner(message);
        }
        EngineError::Unknown(message)
    }

    /// Whether the user may retry the same step without reconnecting.
    pub fn is_recoverable(&self) -> bool {
        match self {
            EngineError::ProofUnavailable(_)
            | EngineError::Relayer(_)
            | EngineError::Timeout { .. }
            | EngineError::EventDecodeFailure(_)
            | EngineError::Rejected(_) => true,
            EngineError::WalletDisconnected | EngineError::UnauthorizedSigner(_) => false,
            EngineError::LedgerRevert { .. }
            | EngineError::InvalidReceipt(_)
            | EngineError::DuplicateSubmission(_)
            | EngineError::UnverifiedLoanId(_)
            | EngineError::Unknown(_) => false,
        }
    }
}

impl From<LedgerClientError> for EngineError {
    fn from(err: LedgerClientError) -> Self {
        match err {
            LedgerClientError::SignerUnavailable => EngineError::WalletDisconnected,
            LedgerClientError::InvalidPrivateKey(msg) => EngineError::UnauthorizedSigner(msg),
            other => EngineError::from_ledger_message(other.to_string()),
        }
    }
}

impl From<Rejection> for EngineError {
    fn from(rejection: Rejection) -> Self {
        EngineError::Rejected(rejection)
    }
}
