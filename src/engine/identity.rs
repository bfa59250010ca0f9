// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! End-to-end identity linking: obtain a proof, aggregate it, link the
//! wallet, refresh the cached status.

use std::sync::Arc;

use alloy::primitives::Address;
use tracing::info;

use super::aggregation::{AggregationClient, LinkOutcome};
use super::error::EngineError;
use super::proof::{IdentityProof, PollSettings, ProofSession};
use super::tracker::TxHandle;

pub struct IdentityWorkflow {
    aggregation: Arc<AggregationClient>,
    poll: PollSettings,
}

impl IdentityWorkflow {
    pub fn new(aggregation: Arc<AggregationClient>, poll: PollSettings) -> Self {
        Self { aggregation, poll }
    }

    /// Run a linking session for `wallet`.
    ///
    /// A wallet the registry already knows returns `AlreadyLinked` before the
    /// provider is even asked for a proof.
    pub async fn verify_and_link(
        &self,
        session: &ProofSession,
        wallet: Address,
    ) -> Result<LinkOutcome, EngineError> {
        let status = self.aggregation.cache().check_status(wallet).await?;
        if status.is_linked {
            return Ok(LinkOutcome::AlreadyLinked(status));
        }

        info!(session = %session.id(), provider = %session.kind(), wallet = %wallet, "Starting identity link");
        let proof = session.obtain(&self.poll).await?;
        let receipt = self.aggregation.submit_for_aggregation(&proof).await?;
        self.aggregation
            .submit_link_transaction(wallet, proof.public_signals(), &receipt)
            .await
    }

    /// Continue after an aggregation timeout with the same proof.
    pub async fn resume_aggregation(
        &self,
        proof: &IdentityProof,
        wallet: Address,
    ) -> Result<LinkOutcome, EngineError> {
        let receipt = self.aggregation.resume_aggregation(proof).await?;
        self.aggregation
            .submit_link_transaction(wallet, proof.public_signals(), &receipt)
            .await
    }

    /// Continue after the link transaction outlived the confirmation window.
    pub async fn resume_link(
        &self,
        wallet: Address,
        handle: &TxHandle,
    ) -> Result<LinkOutcome, EngineError> {
        self.aggregation.resume_link(wallet, handle).await
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::engine::aggregation::AggregationSettings;
    use crate::engine::cache::VerificationCache;
    use crate::engine::proof::{AnonProofProvider, AttestationProofProvider};
    use crate::engine::tracker::{ConfirmationSettings, TransactionTracker};
    use crate::providers::relayer::JobStatus;
    use crate::testing::{anon_proof, receipt, wallet, MockLedger, MockRelayer, StubVerifier};

    fn workflow(ledger: &Arc<MockLedger>, relayer: &Arc<MockRelayer>) -> IdentityWorkflow {
        let cache = Arc::new(VerificationCache::new(ledger.clone(), 4));
        let tracker = Arc::new(TransactionTracker::new(
            ledger.clone(),
            ConfirmationSettings::default(),
        ));
        let client = AggregationClient::new(
            relayer.clone(),
            ledger.clone(),
            cache,
            tracker,
            AggregationSettings::default(),
        );
        IdentityWorkflow::new(Arc::new(client), PollSettings::default())
    }

    #[tokio::test(start_paused = true)]
    async fn attestation_session_links_wallet() {
        let ledger = Arc::new(MockLedger::with_wallet());
        let relayer = Arc::new(MockRelayer::new());
        relayer.push_status(JobStatus::Aggregated(receipt(5, 0, 4)));

        let provider = AttestationProofProvider::new(Arc::new(StubVerifier::passing()));
        provider.submit(StubVerifier::request()).await;
        let session = ProofSession::new(Arc::new(provider));

        let outcome = workflow(&ledger, &relayer)
            .verify_and_link(&session, wallet())
            .await
            .unwrap();
        assert!(matches!(outcome, LinkOutcome::Linked { status, .. } if status.is_linked));

        let link = ledger.state().link_calls[0].clone();
        // Attestation proofs leave pubkey hash and pincode zero.
        assert!(link.inputs[0].is_zero());
        assert!(link.inputs[5].is_zero());
    }

    #[tokio::test]
    async fn linked_wallet_never_asks_for_a_proof() {
        let ledger = Arc::new(MockLedger::with_wallet());
        ledger.state().linked.insert(wallet());
        let relayer = Arc::new(MockRelayer::new());
        let session = ProofSession::new(Arc::new(AnonProofProvider::new()));

        let outcome = workflow(&ledger, &relayer)
            .verify_and_link(&session, wallet())
            .await
            .unwrap();
        assert!(matches!(outcome, LinkOutcome::AlreadyLinked(_)));
        assert_eq!(relayer.submit_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn declined_provider_leaves_nothing_submitted() {
        let ledger = Arc::new(MockLedger::with_wallet());
        let relayer = Arc::new(MockRelayer::new());
        let provider = AnonProofProvider::new();
        provider.fail("prover window closed");
        let session = ProofSession::new(Arc::new(provider));

        let err = workflow(&ledger, &relayer)
            .verify_and_link(&session, wallet())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::ProofUnavailable(_)));
        assert_eq!(relayer.submit_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn pending_link_can_be_resumed() {
        let ledger = Arc::new(MockLedger::with_wallet());
        ledger.state().hold_receipts = true;
        let relayer = Arc::new(MockRelayer::new());
        relayer.push_status(JobStatus::Aggregated(receipt(42, 3, 8)));

        let provider = AnonProofProvider::new();
        provider.deliver(anon_proof(8));
        let session = ProofSession::new(Arc::new(provider));
        let wf = workflow(&ledger, &relayer);

        let outcome = wf.verify_and_link(&session, wallet()).await.unwrap();
        let LinkOutcome::StillPending(handle) = outcome else {
            panic!("unexpected: {outcome:?}");
        };

        tokio::time::sleep(Duration::from_secs(30)).await;
        ledger.release(handle.tx_hash);
        let outcome = wf.resume_link(wallet(), &handle).await.unwrap();
        assert!(matches!(outcome, LinkOutcome::Linked { status, .. } if status.is_linked));
    }
}
