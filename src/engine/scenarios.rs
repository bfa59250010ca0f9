// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! End-to-end workflow scenarios over in-memory collaborators.

use std::sync::Arc;

use alloy::primitives::U256;

use super::aggregation::{AggregationClient, AggregationSettings, LinkOutcome};
use super::cache::VerificationCache;
use super::error::{EngineError, Rejection};
use super::identity::IdentityWorkflow;
use super::loan::{LoanApplicationMachine, LoanDraft, LoanState, SalaryTier};
use super::proof::{AnonProofProvider, PollSettings, ProofSession};
use super::tracker::{ConfirmationSettings, LoanIdentifier, TransactionTracker};
use crate::providers::relayer::JobStatus;
use crate::testing::{anon_proof, income_proof, receipt, wallet, MockLedger, MockRelayer};

struct Engine {
    ledger: Arc<MockLedger>,
    relayer: Arc<MockRelayer>,
    cache: Arc<VerificationCache>,
    identity: IdentityWorkflow,
    loans: LoanApplicationMachine,
}

fn engine() -> Engine {
    let ledger = Arc::new(MockLedger::with_wallet());
    let relayer = Arc::new(MockRelayer::new());
    let cache = Arc::new(VerificationCache::new(ledger.clone(), 4));
    let tracker = Arc::new(TransactionTracker::new(
        ledger.clone(),
        ConfirmationSettings::default(),
    ));
    let aggregation = Arc::new(AggregationClient::new(
        relayer.clone(),
        ledger.clone(),
        cache.clone(),
        tracker.clone(),
        AggregationSettings::default(),
    ));
    Engine {
        identity: IdentityWorkflow::new(aggregation, PollSettings::default()),
        loans: LoanApplicationMachine::new(ledger.clone(), cache.clone(), tracker),
        ledger,
        relayer,
        cache,
    }
}

fn minor(display: u64) -> U256 {
    U256::from(display) * U256::from(1_000_000u64)
}

#[tokio::test(start_paused = true)]
async fn unlinked_wallet_is_linked_through_aggregation() {
    let e = engine();
    assert!(!e.cache.check_status(wallet()).await.unwrap().is_linked);

    e.relayer.push_status(JobStatus::Pending {
        status: "IncludedInBlock".to_string(),
    });
    e.relayer
        .push_status(JobStatus::Aggregated(receipt(42, 3, 8)));

    let provider = Arc::new(AnonProofProvider::new());
    provider.begin();
    provider.deliver(anon_proof(31337));
    let session = ProofSession::new(provider);

    let outcome = e.identity.verify_and_link(&session, wallet()).await.unwrap();
    assert!(matches!(outcome, LinkOutcome::Linked { .. }));

    let link = e.ledger.state().link_calls[0].clone();
    assert_eq!(link.aggregation_id, U256::from(42));
    assert_eq!(link.leaf_index, U256::from(3));
    assert_eq!(link.leaf_count, U256::from(8));
    assert_eq!(link.merkle_path.len(), 3);
    assert_eq!(link.inputs[1], U256::from(31337));

    assert!(e.cache.check_status(wallet()).await.unwrap().is_linked);
}

#[tokio::test]
async fn pending_application_blocks_a_second_one() {
    let mut e = engine();
    e.ledger.state().linked.insert(wallet());
    e.ledger.add_loan(wallet(), false, false);
    e.loans.prepare(SalaryTier::From3000To4000).await.unwrap();

    let draft = LoanDraft {
        amount: minor(1000),
        term_months: 12,
    };
    let err = e
        .loans
        .apply(draft, &income_proof("3000-4000"))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        EngineError::Rejected(Rejection::ExistingApplicationPending { .. })
    ));
    assert!(err.to_string().contains("existing application pending"));
    assert!(e.ledger.state().writes.is_empty());
}

#[tokio::test]
async fn amount_over_tier_limit_is_refused_without_ledger_calls() {
    let mut e = engine();
    e.ledger.state().linked.insert(wallet());
    let terms = e.loans.prepare(SalaryTier::From3000To4000).await.unwrap();
    assert_eq!(terms.credit_limit, minor(10_000));

    // Any ledger read from here on would fail the application differently.
    e.ledger.state().fail_reads = Some("ledger must not be called".to_string());

    let draft = LoanDraft {
        amount: minor(20_000),
        term_months: 12,
    };
    let err = e
        .loans
        .apply(draft, &income_proof("3000-4000"))
        .await
        .unwrap_err();

    let EngineError::Rejected(rejection) = err else {
        panic!("expected a local rejection");
    };
    assert!(matches!(rejection, Rejection::ExceedsTierLimit { .. }));
    assert!(rejection.describe(6).contains("tier limit of 10000"));
    assert_eq!(e.ledger.state().is_linked_reads, 0);
    assert!(e.ledger.state().writes.is_empty());
}

#[tokio::test]
async fn undecodable_loan_event_yields_unverified_placeholder() {
    let mut e = engine();
    {
        let mut state = e.ledger.state();
        state.linked.insert(wallet());
        state.emit_loan_event = false;
    }
    e.loans.prepare(SalaryTier::From3000To4000).await.unwrap();

    let draft = LoanDraft {
        amount: minor(500),
        term_months: 6,
    };
    let state = e
        .loans
        .apply(draft, &income_proof("3000-4000"))
        .await
        .unwrap();

    assert!(state.is_unverified());
    assert!(e.loans.state().is_unverified());
    let LoanState::Confirmed { loan_id, .. } = state else {
        panic!("unexpected state: {state:?}");
    };
    assert!(matches!(loan_id, LoanIdentifier::Placeholder(_)));
    assert!(matches!(
        e.loans.loan_details(&loan_id).await,
        Err(EngineError::UnverifiedLoanId(_))
    ));
}
