// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Loan application state machine.
//!
//! ```text
//! Uninitialized --prepare--> ReadyToApply --apply--> Submitting
//!     Submitting --> AwaitingConfirmation --> Confirmed(loan_id)
//!     local validation failure        --> Rejected(reason)
//!     ledger revert                   --> ReadyToApply
//! ```
//!
//! An application is two sequential ledger writes: the income proof is
//! verified first and must be observed confirmed before `applyForLoan` is
//! sent. Everything before the first write is checked locally or with
//! read-only ledger calls.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use alloy::primitives::{keccak256, Address, Keccak256, B256, U256};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::cache::VerificationCache;
use super::error::{EngineError, Rejection, RevertReason};
use super::tracker::{
    extract_loan_id, LoanIdentifier, TransactionTracker, TxHandle, TxObservation, TxPayload,
};
use crate::blockchain::{parse_amount, Ledger, LoanPhase, LoanRecord, TxHash};
use crate::providers::prover::{IncomeProof, IncomeProver, ProveRequest};

const BPS_DENOMINATOR: u64 = 10_000;

/// Monthly income band declared by an income proof.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SalaryTier {
    UpTo1000,
    From1000To2000,
    From2000To3000,
    From3000To4000,
    From4000To5000,
    Above5000,
}

impl SalaryTier {
    pub const ALL: [SalaryTier; 6] = [
        SalaryTier::UpTo1000,
        SalaryTier::From1000To2000,
        SalaryTier::From2000To3000,
        SalaryTier::From3000To4000,
        SalaryTier::From4000To5000,
        SalaryTier::Above5000,
    ];

    /// Key used by the loan contract's tier tables.
    pub fn as_str(&self) -> &'static str {
        match self {
            SalaryTier::UpTo1000 => "0-1000",
            SalaryTier::From1000To2000 => "1000-2000",
            SalaryTier::From2000To3000 => "2000-3000",
            SalaryTier::From3000To4000 => "3000-4000",
            SalaryTier::From4000To5000 => "4000-5000",
            SalaryTier::Above5000 => "5000+",
        }
    }
}

impl fmt::Display for SalaryTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SalaryTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SalaryTier::ALL
            .into_iter()
            .find(|tier| tier.as_str() == s.trim())
            .ok_or_else(|| format!("unknown salary tier: {s}"))
    }
}

/// Credit terms of a tier, read from the loan contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierTerms {
    pub tier: SalaryTier,
    /// Maximum principal in minor units
    pub credit_limit: U256,
    pub interest_rate_bps: U256,
}

/// Repayment estimate for a draft against tier terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoanQuote {
    pub amount: U256,
    pub term_months: u32,
    pub interest_rate_bps: U256,
    pub total_amount: U256,
    pub monthly_payment: U256,
}

impl LoanQuote {
    /// Simple-interest estimate: `total = amount * (1 + rate)`, spread evenly.
    pub fn compute(amount: U256, interest_rate_bps: U256, term_months: u32) -> Option<Self> {
        if term_months == 0 {
            return None;
        }
        let denominator = U256::from(BPS_DENOMINATOR);
        let total_amount = amount
            .checked_mul(denominator.checked_add(interest_rate_bps)?)?
            / denominator;
        Some(Self {
            amount,
            term_months,
            interest_rate_bps,
            total_amount,
            monthly_payment: total_amount / U256::from(term_months),
        })
    }
}

/// What the borrower asks for. Amount is in minor units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoanDraft {
    pub amount: U256,
    pub term_months: u32,
}

impl LoanDraft {
    /// Convert a display amount at the input boundary.
    pub fn from_display(amount: &str, term_months: u32, decimals: u8) -> Result<Self, EngineError> {
        let amount = parse_amount(amount, decimals)
            .map_err(|e| Rejection::InvalidAmount(e.to_string()))?;
        Ok(Self {
            amount,
            term_months,
        })
    }

    fn check(&self) -> Result<(), Rejection> {
        if self.amount.is_zero() {
            return Err(Rejection::MissingAmount);
        }
        if self.term_months == 0 {
            return Err(Rejection::MissingTerm);
        }
        Ok(())
    }
}

/// Which of the two writes a pending application is waiting on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stage {
    /// `verifySalaryProof` sent; `applyForLoan` follows once it confirms
    IncomeVerification {
        draft: LoanDraft,
        document_commitment: B256,
    },
    LoanApplication,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoanState {
    Uninitialized,
    ReadyToApply,
    Submitting,
    AwaitingConfirmation { stage: Stage, handle: TxHandle },
    Confirmed { loan_id: LoanIdentifier, tx_hash: TxHash },
    Rejected { reason: Rejection },
}

impl LoanState {
    /// Whether a confirmed application carries a placeholder loan id.
    pub fn is_unverified(&self) -> bool {
        matches!(self, LoanState::Confirmed { loan_id, .. } if loan_id.is_unverified())
    }
}

/// Fresh commitment binding an income proof to one application attempt.
pub fn document_commitment(borrower: Address, proof: &IncomeProof) -> B256 {
    let mut hasher = Keccak256::new();
    hasher.update(b"salary_document");
    hasher.update(borrower);
    hasher.update(keccak256(&proof.proof));
    hasher.update(Uuid::new_v4().as_bytes());
    hasher.update(chrono::Utc::now().timestamp_millis().to_be_bytes());
    hasher.finalize()
}

/// Every loan recorded for `borrower`, oldest first.
pub async fn fetch_borrower_loans(
    ledger: &dyn Ledger,
    borrower: Address,
) -> Result<Vec<LoanRecord>, EngineError> {
    let ids = ledger.user_loans(borrower).await?;
    let mut loans = Vec::with_capacity(ids.len());
    for id in ids {
        loans.push(ledger.loan_details(id).await?);
    }
    Ok(loans)
}

pub struct LoanApplicationMachine {
    ledger: Arc<dyn Ledger>,
    cache: Arc<VerificationCache>,
    tracker: Arc<TransactionTracker>,
    terms: Option<TierTerms>,
    state: LoanState,
}

impl LoanApplicationMachine {
    pub fn new(
        ledger: Arc<dyn Ledger>,
        cache: Arc<VerificationCache>,
        tracker: Arc<TransactionTracker>,
    ) -> Self {
        Self {
            ledger,
            cache,
            tracker,
            terms: None,
            state: LoanState::Uninitialized,
        }
    }

    pub fn state(&self) -> &LoanState {
        &self.state
    }

    pub fn terms(&self) -> Option<&TierTerms> {
        self.terms.as_ref()
    }

    /// Resolve the tier's credit terms from the ledger.
    pub async fn prepare(&mut self, tier: SalaryTier) -> Result<TierTerms, EngineError> {
        if self.in_flight() {
            return Err(Rejection::SubmissionInFlight.into());
        }

        let credit_limit = self.ledger.tier_limit(tier.as_str()).await?;
        let interest_rate_bps = self.ledger.tier_rate(tier.as_str()).await?;
        if credit_limit.is_zero() {
            warn!(tier = %tier, "Tier has no credit limit on the ledger");
            self.terms = None;
            self.transition(LoanState::Uninitialized);
            return Err(Rejection::TierNotResolved.into());
        }

        let terms = TierTerms {
            tier,
            credit_limit,
            interest_rate_bps,
        };
        info!(
            tier = %tier,
            credit_limit = %credit_limit,
            interest_rate_bps = %interest_rate_bps,
            "Tier terms resolved"
        );
        self.terms = Some(terms);
        self.transition(LoanState::ReadyToApply);
        Ok(terms)
    }

    /// Repayment estimate for `draft` under the resolved terms.
    pub fn quote(&self, draft: &LoanDraft) -> Option<LoanQuote> {
        let terms = self.terms.as_ref()?;
        LoanQuote::compute(draft.amount, terms.interest_rate_bps, draft.term_months)
    }

    /// Validate and submit an application.
    ///
    /// Returns the state reached: `Confirmed`, or `AwaitingConfirmation` when
    /// a write outlived the confirmation window (see [`resume`]).
    ///
    /// [`resume`]: LoanApplicationMachine::resume
    pub async fn apply(
        &mut self,
        draft: LoanDraft,
        income_proof: &IncomeProof,
    ) -> Result<LoanState, EngineError> {
        if self.in_flight() {
            return Err(Rejection::SubmissionInFlight.into());
        }
        let terms = match (&self.state, self.terms) {
            (LoanState::Uninitialized, _) | (_, None) => {
                return Err(Rejection::TierNotResolved.into());
            }
            (_, Some(terms)) => terms,
        };

        if let Err(rejection) = self.check_locally(&draft, &terms, income_proof) {
            return Err(self.reject(rejection));
        }

        let borrower = self
            .ledger
            .connected_wallet()
            .ok_or(EngineError::WalletDisconnected)?;

        if let Err(rejection) = self.check_on_ledger(borrower, &draft).await? {
            return Err(self.reject(rejection));
        }

        self.transition(LoanState::Submitting);
        let document_commitment = document_commitment(borrower, income_proof);
        let bound = match income_proof.bind(document_commitment) {
            Ok(bound) => bound,
            Err(e) => return Err(self.reject(Rejection::MalformedIncomeProof(e.to_string()))),
        };

        info!(
            borrower = %borrower,
            amount = %draft.amount,
            term_months = draft.term_months,
            commitment = %document_commitment,
            "Submitting income verification"
        );
        let handle = self
            .submit_or_reset(TxPayload::VerifyIncome {
                public_values: bound.public_values,
                proof: bound.proof,
            })
            .await?;

        self.continue_income_verification(draft, document_commitment, handle)
            .await
    }

    /// Prove a salary document with `prover`, then [`apply`] with the result.
    ///
    /// [`apply`]: LoanApplicationMachine::apply
    pub async fn apply_with_document(
        &mut self,
        draft: LoanDraft,
        prover: &dyn IncomeProver,
        request: &ProveRequest,
    ) -> Result<LoanState, EngineError> {
        if self.in_flight() {
            return Err(Rejection::SubmissionInFlight.into());
        }
        if self.terms.is_none() {
            return Err(Rejection::TierNotResolved.into());
        }
        let proof = prover
            .prove(request)
            .await
            .map_err(|e| EngineError::ProofUnavailable(e.to_string()))?;
        self.apply(draft, &proof).await
    }

    /// Re-attach to a write that was still pending.
    pub async fn resume(&mut self) -> Result<LoanState, EngineError> {
        let LoanState::AwaitingConfirmation { stage, handle } = self.state.clone() else {
            return Ok(self.state.clone());
        };

        info!(tx_hash = %handle.tx_hash, kind = %handle.kind, "Resuming pending application");
        match stage {
            Stage::IncomeVerification {
                draft,
                document_commitment,
            } => {
                self.continue_income_verification(draft, document_commitment, handle)
                    .await
            }
            Stage::LoanApplication => self.continue_loan_application(handle).await,
        }
    }

    /// Ledger record for a confirmed loan. Placeholder ids are refused.
    pub async fn loan_details(&self, loan_id: &LoanIdentifier) -> Result<LoanRecord, EngineError> {
        let id = loan_id
            .onchain_id()
            .ok_or(EngineError::UnverifiedLoanId(loan_id.value()))?;
        Ok(self.ledger.loan_details(id).await?)
    }

    fn check_locally(
        &self,
        draft: &LoanDraft,
        terms: &TierTerms,
        income_proof: &IncomeProof,
    ) -> Result<(), Rejection> {
        draft.check()?;
        if draft.amount > terms.credit_limit {
            return Err(Rejection::ExceedsTierLimit {
                requested: draft.amount,
                limit: terms.credit_limit,
            });
        }

        let declared = income_proof
            .declared()
            .map_err(|e| Rejection::MalformedIncomeProof(e.to_string()))?;
        if !declared.signature_valid {
            return Err(Rejection::MalformedIncomeProof(
                "document signature is not valid".to_string(),
            ));
        }
        if declared.salary_range != terms.tier.as_str() {
            return Err(Rejection::TierMismatch {
                declared: declared.salary_range,
                resolved: terms.tier.to_string(),
            });
        }
        Ok(())
    }

    /// Read-only pre-flight checks. The outer error is a failed ledger read.
    async fn check_on_ledger(
        &self,
        borrower: Address,
        draft: &LoanDraft,
    ) -> Result<Result<(), Rejection>, EngineError> {
        let status = self.cache.check_status(borrower).await?;
        if !status.is_linked {
            return Ok(Err(Rejection::IdentityNotVerified { wallet: borrower }));
        }

        for loan in fetch_borrower_loans(self.ledger.as_ref(), borrower).await? {
            match loan.phase() {
                LoanPhase::Active => {
                    return Ok(Err(Rejection::ExistingActiveLoan {
                        loan_id: loan.loan_id,
                    }));
                }
                LoanPhase::PendingApproval => {
                    return Ok(Err(Rejection::ExistingApplicationPending {
                        loan_id: loan.loan_id,
                    }));
                }
                LoanPhase::PaidOff => {}
            }
        }

        let available = self.ledger.settlement_balance().await?;
        if available < draft.amount {
            return Ok(Err(Rejection::InsufficientLiquidity {
                requested: draft.amount,
                available,
            }));
        }
        Ok(Ok(()))
    }

    async fn continue_income_verification(
        &mut self,
        draft: LoanDraft,
        document_commitment: B256,
        handle: TxHandle,
    ) -> Result<LoanState, EngineError> {
        match self.tracker.observe(&handle).await {
            TxObservation::Confirmed(_) => {
                info!(commitment = %document_commitment, "Income proof verified on ledger");
            }
            TxObservation::Failed { reason, .. } => {
                return Err(self.ledger_failure(EngineError::from_ledger_message(reason)));
            }
            TxObservation::StillPending(handle) => {
                self.transition(LoanState::AwaitingConfirmation {
                    stage: Stage::IncomeVerification {
                        draft,
                        document_commitment,
                    },
                    handle,
                });
                return Ok(self.state.clone());
            }
        }

        // The loan contract only accepts commitments it has recorded.
        match self.ledger.is_document_verified(document_commitment).await {
            Ok(true) => {}
            Ok(false) => {
                return Err(self.ledger_failure(EngineError::LedgerRevert {
                    reason: RevertReason::DocumentNotVerified,
                    message: format!("Document not verified: {document_commitment}"),
                }));
            }
            Err(e) => return Err(self.ledger_failure(e.into())),
        }

        self.transition(LoanState::Submitting);
        let handle = self
            .submit_or_reset(TxPayload::ApplyForLoan {
                amount: draft.amount,
                term_months: U256::from(draft.term_months),
                document_commitment,
            })
            .await?;
        self.continue_loan_application(handle).await
    }

    async fn continue_loan_application(
        &mut self,
        handle: TxHandle,
    ) -> Result<LoanState, EngineError> {
        match self.tracker.observe(&handle).await {
            TxObservation::Confirmed(receipt) => {
                let loan_id = extract_loan_id(&receipt);
                info!(
                    loan_id = %loan_id,
                    tx_hash = %receipt.tx_hash,
                    unverified = loan_id.is_unverified(),
                    "Loan application confirmed"
                );
                self.transition(LoanState::Confirmed {
                    loan_id,
                    tx_hash: receipt.tx_hash,
                });
                Ok(self.state.clone())
            }
            TxObservation::Failed { reason, .. } => {
                Err(self.ledger_failure(EngineError::from_ledger_message(reason)))
            }
            TxObservation::StillPending(handle) => {
                self.transition(LoanState::AwaitingConfirmation {
                    stage: Stage::LoanApplication,
                    handle,
                });
                Ok(self.state.clone())
            }
        }
    }

    async fn submit_or_reset(&mut self, payload: TxPayload) -> Result<TxHandle, EngineError> {
        match self.tracker.submit(payload).await {
            Ok(handle) => Ok(handle),
            Err(e) => Err(self.ledger_failure(e)),
        }
    }

    fn in_flight(&self) -> bool {
        matches!(
            self.state,
            LoanState::Submitting | LoanState::AwaitingConfirmation { .. }
        )
    }

    fn reject(&mut self, rejection: Rejection) -> EngineError {
        info!(reason = %rejection, "Application rejected before submission");
        self.transition(LoanState::Rejected {
            reason: rejection.clone(),
        });
        EngineError::Rejected(rejection)
    }

    /// A write failed; the attempt is over but the terms still hold.
    fn ledger_failure(&mut self, err: EngineError) -> EngineError {
        warn!(error = %err, "Application write failed");
        self.transition(LoanState::ReadyToApply);
        err
    }

    fn transition(&mut self, next: LoanState) {
        debug!(from = ?self.state, to = ?next, "Loan state transition");
        self.state = next;
    }
}
