// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Identity-gated loan workflow engine.
//!
//! This module provides:
//! - Proof providers and sessions ([`proof`])
//! - Relayer aggregation and registry linking ([`aggregation`], [`identity`])
//! - The linked-status cache ([`cache`])
//! - The loan application state machine ([`loan`])
//! - Transaction submission and confirmation tracking ([`tracker`])

pub mod aggregation;
pub mod cache;
pub mod error;
pub mod identity;
pub mod loan;
pub mod proof;
pub mod tracker;

#[cfg(test)]
mod scenarios;

pub use aggregation::{
    AggregationClient, AggregationReceipt, AggregationSettings, LinkOutcome, DEFAULT_DOMAIN_ID,
};
pub use cache::{VerificationCache, VerificationStatus};
pub use error::{EngineError, Rejection, RevertReason};
pub use identity::IdentityWorkflow;
pub use loan::{
    fetch_borrower_loans, LoanApplicationMachine, LoanDraft, LoanQuote, LoanState, SalaryTier,
    Stage, TierTerms,
};
pub use proof::{
    obtain_proof, AnonProof, AnonProofProvider, AttestationProof, AttestationProofProvider,
    IdentityProof, PollSettings, ProofProvider, ProofSession, ProofStatus, ProviderKind,
    PublicSignals,
};
pub use tracker::{
    extract_loan_id, ConfirmationSettings, LoanIdentifier, TransactionTracker, TxHandle, TxKind,
    TxObservation, TxPayload,
};
