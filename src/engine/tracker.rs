// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Transaction lifecycle tracker.
//!
//! Submits ledger writes and observes them for a bounded time. A transaction
//! outlives any local wait: when the ceiling passes the caller gets its
//! handle back as [`TxObservation::StillPending`] and may [`attach`] to it
//! again later.
//!
//! [`attach`]: TransactionTracker::attach

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::{keccak256, Bytes, B256, U256};
use alloy::sol_types::SolEvent;
use chrono::{DateTime, Utc};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::error::EngineError;
use crate::blockchain::contracts::ISalaryLoan;
use crate::blockchain::{Ledger, LinkArgs, TxHash, TxReceipt};

/// Which ledger write a transaction carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxKind {
    LinkIdentity,
    VerifyIncome,
    ApplyForLoan,
}

impl fmt::Display for TxKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TxKind::LinkIdentity => f.write_str("link_identity"),
            TxKind::VerifyIncome => f.write_str("verify_income"),
            TxKind::ApplyForLoan => f.write_str("apply_for_loan"),
        }
    }
}

/// A ledger write ready to be submitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxPayload {
    Link(LinkArgs),
    VerifyIncome {
        public_values: Bytes,
        proof: Bytes,
    },
    ApplyForLoan {
        amount: U256,
        term_months: U256,
        document_commitment: B256,
    },
}

impl TxPayload {
    pub fn kind(&self) -> TxKind {
        match self {
            TxPayload::Link(_) => TxKind::LinkIdentity,
            TxPayload::VerifyIncome { .. } => TxKind::VerifyIncome,
            TxPayload::ApplyForLoan { .. } => TxKind::ApplyForLoan,
        }
    }
}

/// A submitted transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxHandle {
    pub tx_hash: TxHash,
    pub kind: TxKind,
    pub submitted_at: DateTime<Utc>,
}

/// Result of one bounded observation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxObservation {
    Confirmed(TxReceipt),
    /// Mined but reverted. A receipt carries no revert data, so `reason`
    /// only names the transaction and block and classifies as
    /// `EngineError::Unknown`. Only send-time reverts, caught during gas
    /// estimation, map to a [`RevertReason`](super::error::RevertReason).
    Failed { handle: TxHandle, reason: String },
    StillPending(TxHandle),
}

/// Confirmation wait bounds.
#[derive(Debug, Clone, Copy)]
pub struct ConfirmationSettings {
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for ConfirmationSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            poll_interval: Duration::from_secs(1),
        }
    }
}

pub struct TransactionTracker {
    ledger: Arc<dyn Ledger>,
    settings: ConfirmationSettings,
}

impl TransactionTracker {
    pub fn new(ledger: Arc<dyn Ledger>, settings: ConfirmationSettings) -> Self {
        Self { ledger, settings }
    }

    pub fn settings(&self) -> &ConfirmationSettings {
        &self.settings
    }

    /// Submit a write. Errors here are send-time failures (reverts caught
    /// during gas estimation, missing signer, RPC errors).
    pub async fn submit(&self, payload: TxPayload) -> Result<TxHandle, EngineError> {
        let kind = payload.kind();
        let tx_hash = match payload {
            TxPayload::Link(args) => self.ledger.link_identity(&args).await,
            TxPayload::VerifyIncome {
                public_values,
                proof,
            } => self.ledger.verify_income_proof(public_values, proof).await,
            TxPayload::ApplyForLoan {
                amount,
                term_months,
                document_commitment,
            } => {
                self.ledger
                    .apply_for_loan(amount, term_months, document_commitment)
                    .await
            }
        }
        .map_err(|e| {
            warn!(kind = %kind, error = %e, "Transaction submission failed");
            EngineError::from(e)
        })?;

        info!(kind = %kind, tx_hash = %tx_hash, "Transaction submitted");
        Ok(self.attach(tx_hash, kind))
    }

    /// Handle for a transaction submitted earlier, possibly by another process.
    pub fn attach(&self, tx_hash: TxHash, kind: TxKind) -> TxHandle {
        TxHandle {
            tx_hash,
            kind,
            submitted_at: Utc::now(),
        }
    }

    /// Wait for a receipt up to the configured ceiling.
    ///
    /// A mined revert is reported without the contract's reason string.
    pub async fn observe(&self, handle: &TxHandle) -> TxObservation {
        let deadline = Instant::now() + self.settings.timeout;

        loop {
            match self.ledger.receipt(handle.tx_hash).await {
                Ok(Some(receipt)) if receipt.success => {
                    info!(
                        kind = %handle.kind,
                        tx_hash = %handle.tx_hash,
                        block = receipt.block_number,
                        gas_used = receipt.gas_used,
                        "Transaction confirmed"
                    );
                    return TxObservation::Confirmed(receipt);
                }
                Ok(Some(receipt)) => {
                    warn!(kind = %handle.kind, tx_hash = %handle.tx_hash, "Transaction reverted");
                    return TxObservation::Failed {
                        handle: handle.clone(),
                        reason: format!(
                            "transaction {} reverted in block {}",
                            receipt.tx_hash, receipt.block_number
                        ),
                    };
                }
                Ok(None) => {
                    debug!(kind = %handle.kind, tx_hash = %handle.tx_hash, "Receipt not yet available");
                }
                // Transient RPC trouble does not end the observation.
                Err(e) => {
                    warn!(tx_hash = %handle.tx_hash, error = %e, "Receipt lookup failed");
                }
            }

            let now = Instant::now();
            if now >= deadline {
                info!(
                    kind = %handle.kind,
                    tx_hash = %handle.tx_hash,
                    waited = ?self.settings.timeout,
                    "Transaction still pending"
                );
                return TxObservation::StillPending(handle.clone());
            }
            tokio::time::sleep(self.settings.poll_interval.min(deadline - now)).await;
        }
    }
}

/// A loan id taken from a receipt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoanIdentifier {
    /// Decoded from the `LoanApplied` event
    Decoded(U256),
    /// Derived from the transaction hash; not known to the ledger
    Placeholder(U256),
}

impl LoanIdentifier {
    pub fn value(&self) -> U256 {
        match self {
            LoanIdentifier::Decoded(id) | LoanIdentifier::Placeholder(id) => *id,
        }
    }

    pub fn is_unverified(&self) -> bool {
        matches!(self, LoanIdentifier::Placeholder(_))
    }

    /// Id usable for ledger reads.
    pub fn onchain_id(&self) -> Option<U256> {
        match self {
            LoanIdentifier::Decoded(id) => Some(*id),
            LoanIdentifier::Placeholder(_) => None,
        }
    }
}

impl fmt::Display for LoanIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoanIdentifier::Decoded(id) => write!(f, "{id}"),
            LoanIdentifier::Placeholder(id) => write!(f, "{id} (unverified)"),
        }
    }
}

/// Decode the loan id from a `LoanApplied` log in the receipt.
pub fn decode_loan_applied(receipt: &TxReceipt) -> Result<U256, EngineError> {
    receipt
        .logs
        .iter()
        .find_map(|log| ISalaryLoan::LoanApplied::decode_log_data(&log.data).ok())
        .map(|event| event.loanId)
        .ok_or(EngineError::EventDecodeFailure("LoanApplied event"))
}

/// Loan id of a confirmed application, falling back to a placeholder
/// derived from the transaction hash when the event cannot be decoded.
pub fn extract_loan_id(receipt: &TxReceipt) -> LoanIdentifier {
    match decode_loan_applied(receipt) {
        Ok(id) => LoanIdentifier::Decoded(id),
        Err(e) => {
            let id = placeholder_loan_id(receipt.tx_hash);
            warn!(tx_hash = %receipt.tx_hash, placeholder = %id, error = %e, "Using placeholder loan id");
            LoanIdentifier::Placeholder(id)
        }
    }
}

/// Six-digit id in `100000..1000000`, stable per transaction hash.
fn placeholder_loan_id(tx_hash: TxHash) -> U256 {
    let digest = U256::from_be_bytes(keccak256(tx_hash).0);
    U256::from(100_000u64) + digest % U256::from(900_000u64)
}
