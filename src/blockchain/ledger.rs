// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! The ledger boundary the workflow engine is written against.
//!
//! [`EvmLedger`](super::client::EvmLedger) implements it over JSON-RPC; the
//! engine itself only ever sees `Arc<dyn Ledger>`.

use alloy::primitives::{Address, Bytes, Log, B256, U256};
use async_trait::async_trait;

use super::client::LedgerClientError;
use super::contracts::ISalaryLoan;

/// Transaction hash on the ledger.
pub type TxHash = B256;

/// Arguments of the registry's link entrypoint, in wire order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkArgs {
    /// Public signals as the fixed 9-element numeric tuple
    pub inputs: [U256; 9],
    pub aggregation_id: U256,
    pub domain_id: U256,
    pub merkle_path: Vec<B256>,
    pub leaf_count: U256,
    pub leaf_index: U256,
}

/// Where a loan sits in its on-chain lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoanPhase {
    /// Recorded on-chain, waiting for the external approver
    PendingApproval,
    /// Funds disbursed
    Active,
    /// Fully repaid
    PaidOff,
}

/// A loan as stored by the loan contract. Amounts are in minor units of the
/// settlement token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoanRecord {
    pub loan_id: U256,
    pub borrower: Address,
    pub amount: U256,
    /// Interest rate in basis points
    pub interest_rate_bps: U256,
    pub term_months: U256,
    pub monthly_payment: U256,
    pub total_amount: U256,
    pub remaining_balance: U256,
    /// Unix seconds; zero until disbursed
    pub start_time: U256,
    pub last_payment_time: U256,
    pub is_active: bool,
    pub is_paid_off: bool,
    pub salary_range: String,
    pub document_commitment: B256,
}

impl LoanRecord {
    /// Lifecycle phase derived from the contract flags.
    pub fn phase(&self) -> LoanPhase {
        if self.is_paid_off {
            LoanPhase::PaidOff
        } else if self.is_active {
            LoanPhase::Active
        } else {
            LoanPhase::PendingApproval
        }
    }

    /// Whether this loan prevents its borrower from applying again.
    pub fn blocks_new_application(&self) -> bool {
        matches!(self.phase(), LoanPhase::PendingApproval | LoanPhase::Active)
    }
}

impl From<ISalaryLoan::LoanDetails> for LoanRecord {
    fn from(d: ISalaryLoan::LoanDetails) -> Self {
        Self {
            loan_id: d.loanId,
            borrower: d.borrower,
            amount: d.amount,
            interest_rate_bps: d.interestRate,
            term_months: d.termMonths,
            monthly_payment: d.monthlyPayment,
            total_amount: d.totalAmount,
            remaining_balance: d.remainingBalance,
            start_time: d.startTime,
            last_payment_time: d.lastPaymentTime,
            is_active: d.isActive,
            is_paid_off: d.isPaidOff,
            salary_range: d.salaryRange,
            document_commitment: d.documentCommitment,
        }
    }
}

/// Aggregate counters exposed by the loan contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ContractStats {
    pub total_issued: U256,
    pub total_active: U256,
    pub balance: U256,
    pub next_id: U256,
}

/// Receipt of a mined transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxReceipt {
    pub tx_hash: TxHash,
    pub block_number: u64,
    pub gas_used: u64,
    /// `false` when the transaction reverted
    pub success: bool,
    pub logs: Vec<Log>,
}

/// Read and write surface of the ledger.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Address of the connected signing wallet, if any.
    fn connected_wallet(&self) -> Option<Address>;

    async fn is_linked(&self, wallet: Address) -> Result<bool, LedgerClientError>;
    async fn user_loans(&self, borrower: Address) -> Result<Vec<U256>, LedgerClientError>;
    async fn loan_details(&self, loan_id: U256) -> Result<LoanRecord, LedgerClientError>;
    async fn tier_limit(&self, tier: &str) -> Result<U256, LedgerClientError>;
    async fn tier_rate(&self, tier: &str) -> Result<U256, LedgerClientError>;
    async fn contract_stats(&self) -> Result<ContractStats, LedgerClientError>;
    /// Whether an income document commitment has already been accepted.
    async fn is_document_verified(&self, commitment: B256) -> Result<bool, LedgerClientError>;
    /// Settlement-token balance held by the loan contract.
    async fn settlement_balance(&self) -> Result<U256, LedgerClientError>;

    async fn link_identity(&self, args: &LinkArgs) -> Result<TxHash, LedgerClientError>;
    async fn verify_income_proof(
        &self,
        public_values: Bytes,
        proof: Bytes,
    ) -> Result<TxHash, LedgerClientError>;
    async fn apply_for_loan(
        &self,
        amount: U256,
        term_months: U256,
        document_commitment: B256,
    ) -> Result<TxHash, LedgerClientError>;

    /// Receipt for a transaction, `None` while it is still pending.
    async fn receipt(&self, tx_hash: TxHash) -> Result<Option<TxReceipt>, LedgerClientError>;
}
