// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Aggregation and linking client.
//!
//! Takes an identity proof through the relayer until it is part of a
//! published aggregation, then links the wallet on the identity registry
//! with the resulting Merkle receipt.
//!
//! A proof is a leaf: it must never be submitted twice. The client keeps a
//! per-session table keyed by the proof digest; once the relayer has handed
//! out a job id the proof is only ever re-polled.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use alloy::primitives::{Address, B256, U256};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::cache::{VerificationCache, VerificationStatus};
use super::error::EngineError;
use super::proof::{IdentityProof, PublicSignals};
use super::tracker::{TransactionTracker, TxHandle, TxObservation, TxPayload};
use crate::blockchain::{Ledger, LinkArgs, TxHash};
use crate::providers::relayer::{JobStatus, Relayer, RelayerError};

/// Verification domain of the aggregation contract.
pub const DEFAULT_DOMAIN_ID: u64 = 113;

/// Position of a proof inside a published aggregation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregationReceipt {
    pub aggregation_id: U256,
    pub merkle_path: Vec<B256>,
    pub leaf_count: U256,
    pub leaf_index: U256,
}

impl AggregationReceipt {
    /// Structural check done before any link transaction is built.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.leaf_count.is_zero() {
            return Err(EngineError::InvalidReceipt("leaf count is zero".to_string()));
        }
        if self.leaf_index >= self.leaf_count {
            return Err(EngineError::InvalidReceipt(format!(
                "leaf index {} out of range for {} leaves",
                self.leaf_index, self.leaf_count
            )));
        }
        Ok(())
    }
}

/// Relayer polling bounds and the domain the proofs are verified in.
#[derive(Debug, Clone, Copy)]
pub struct AggregationSettings {
    pub poll_interval: Duration,
    pub timeout: Duration,
    pub domain_id: U256,
}

impl Default for AggregationSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            timeout: Duration::from_secs(300),
            domain_id: U256::from(DEFAULT_DOMAIN_ID),
        }
    }
}

#[derive(Debug, Clone)]
enum SubmissionState {
    /// Submit call outstanding, no job id yet
    Submitting,
    InFlight { job_id: String },
    Aggregated(AggregationReceipt),
}

/// Result of a linking attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkOutcome {
    /// The registry already knew the wallet; nothing was sent
    AlreadyLinked(VerificationStatus),
    Linked {
        tx_hash: TxHash,
        status: VerificationStatus,
    },
    /// The link transaction outlived the confirmation window
    StillPending(TxHandle),
}

pub struct AggregationClient {
    relayer: Arc<dyn Relayer>,
    ledger: Arc<dyn Ledger>,
    cache: Arc<VerificationCache>,
    tracker: Arc<TransactionTracker>,
    settings: AggregationSettings,
    submissions: Mutex<HashMap<B256, SubmissionState>>,
}

impl AggregationClient {
    pub fn new(
        relayer: Arc<dyn Relayer>,
        ledger: Arc<dyn Ledger>,
        cache: Arc<VerificationCache>,
        tracker: Arc<TransactionTracker>,
        settings: AggregationSettings,
    ) -> Self {
        Self {
            relayer,
            ledger,
            cache,
            tracker,
            settings,
            submissions: Mutex::new(HashMap::new()),
        }
    }

    pub fn cache(&self) -> &Arc<VerificationCache> {
        &self.cache
    }

    /// Submit a proof and poll until it is aggregated.
    ///
    /// A proof already seen this session is refused. The submit call itself
    /// is retried once, and only when no job id came back. Cancellation is
    /// safe: if the returned future is dropped before the relayer answers,
    /// the proof may be submitted again.
    pub async fn submit_for_aggregation(
        &self,
        proof: &IdentityProof,
    ) -> Result<AggregationReceipt, EngineError> {
        let digest = proof.digest();
        let mut reservation = self.reserve(digest)?;

        // Released on drop until a job id is recorded.
        let job_id = self.submit_once_more_on_transport_error(proof).await?;

        self.record(digest, SubmissionState::InFlight {
            job_id: job_id.clone(),
        });
        reservation.disarm();
        self.poll_job(digest, &job_id).await
    }

    /// Re-poll a proof whose aggregation timed out. Never resubmits.
    pub async fn resume_aggregation(
        &self,
        proof: &IdentityProof,
    ) -> Result<AggregationReceipt, EngineError> {
        let digest = proof.digest();
        match self.lookup(digest) {
            Some(SubmissionState::Aggregated(receipt)) => Ok(receipt),
            Some(SubmissionState::InFlight { job_id }) => {
                info!(job_id = %job_id, proof = %digest, "Resuming relayer job");
                self.poll_job(digest, &job_id).await
            }
            Some(SubmissionState::Submitting) => Err(EngineError::Relayer(format!(
                "proof {digest} is still being submitted"
            ))),
            None => Err(EngineError::Relayer(format!(
                "no aggregation in progress for proof {digest}"
            ))),
        }
    }

    /// Exact argument list of the registry's link entrypoint.
    pub fn build_link_args(
        &self,
        signals: &PublicSignals,
        receipt: &AggregationReceipt,
    ) -> Result<LinkArgs, EngineError> {
        receipt.validate()?;
        Ok(LinkArgs {
            inputs: signals.ordered(),
            aggregation_id: receipt.aggregation_id,
            domain_id: self.settings.domain_id,
            merkle_path: receipt.merkle_path.clone(),
            leaf_count: receipt.leaf_count,
            leaf_index: receipt.leaf_index,
        })
    }

    /// Link `wallet` on the registry. Skips the write when the cache already
    /// reports the wallet linked; re-reads the status after confirmation.
    pub async fn submit_link_transaction(
        &self,
        wallet: Address,
        signals: &PublicSignals,
        receipt: &AggregationReceipt,
    ) -> Result<LinkOutcome, EngineError> {
        let args = self.build_link_args(signals, receipt)?;

        let status = self.cache.check_status(wallet).await?;
        if status.is_linked {
            info!(wallet = %wallet, "Wallet already linked, skipping link transaction");
            return Ok(LinkOutcome::AlreadyLinked(status));
        }

        match self.ledger.connected_wallet() {
            None => return Err(EngineError::WalletDisconnected),
            Some(signer) if signer != wallet => {
                return Err(EngineError::UnauthorizedSigner(format!(
                    "connected signer {signer} cannot link {wallet}"
                )));
            }
            Some(_) => {}
        }

        info!(
            wallet = %wallet,
            aggregation_id = %args.aggregation_id,
            leaf_index = %args.leaf_index,
            leaf_count = %args.leaf_count,
            "Submitting link transaction"
        );
        let handle = self.tracker.submit(TxPayload::Link(args)).await?;
        self.finish_link(wallet, &handle).await
    }

    /// Re-attach to a link transaction that was still pending.
    pub async fn resume_link(
        &self,
        wallet: Address,
        handle: &TxHandle,
    ) -> Result<LinkOutcome, EngineError> {
        self.finish_link(wallet, handle).await
    }

    async fn finish_link(
        &self,
        wallet: Address,
        handle: &TxHandle,
    ) -> Result<LinkOutcome, EngineError> {
        match self.tracker.observe(handle).await {
            TxObservation::Confirmed(receipt) => {
                self.cache.invalidate(wallet);
                let status = self.cache.check_status(wallet).await?;
                info!(wallet = %wallet, is_linked = status.is_linked, "Link transaction confirmed");
                Ok(LinkOutcome::Linked {
                    tx_hash: receipt.tx_hash,
                    status,
                })
            }
            TxObservation::Failed { reason, .. } => Err(EngineError::from_ledger_message(reason)),
            TxObservation::StillPending(handle) => Ok(LinkOutcome::StillPending(handle)),
        }
    }

    async fn submit_once_more_on_transport_error(
        &self,
        proof: &IdentityProof,
    ) -> Result<String, EngineError> {
        match self.relayer.submit(proof).await {
            Ok(job_id) => Ok(job_id),
            Err(RelayerError::Rejected(reason)) => Err(EngineError::Relayer(reason)),
            Err(first) => {
                warn!(error = %first, "Relayer submission returned no job id, retrying once");
                self.relayer
                    .submit(proof)
                    .await
                    .map_err(|e| EngineError::Relayer(e.to_string()))
            }
        }
    }

    async fn poll_job(
        &self,
        digest: B256,
        job_id: &str,
    ) -> Result<AggregationReceipt, EngineError> {
        let deadline = Instant::now() + self.settings.timeout;

        loop {
            match self.relayer.job_status(job_id).await {
                Ok(JobStatus::Aggregated(receipt)) => {
                    receipt.validate()?;
                    info!(
                        job_id,
                        aggregation_id = %receipt.aggregation_id,
                        leaf_index = %receipt.leaf_index,
                        leaf_count = %receipt.leaf_count,
                        "Proof aggregated"
                    );
                    self.record(digest, SubmissionState::Aggregated(receipt.clone()));
                    return Ok(receipt);
                }
                Ok(JobStatus::Failed(reason)) => {
                    warn!(job_id, %reason, "Relayer job failed");
                    self.forget(digest);
                    return Err(EngineError::Relayer(reason));
                }
                Ok(JobStatus::Pending { status }) => {
                    debug!(job_id, %status, "Relayer job pending");
                }
                Err(e) => {
                    warn!(job_id, error = %e, "Relayer status poll failed");
                }
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(EngineError::Timeout {
                    operation: "relayer aggregation",
                    waited: self.settings.timeout,
                });
            }
            tokio::time::sleep(self.settings.poll_interval.min(deadline - now)).await;
        }
    }

    fn reserve(&self, digest: B256) -> Result<Reservation<'_>, EngineError> {
        let mut submissions = self
            .submissions
            .lock()
            .map_err(|_| EngineError::Unknown("submission table poisoned".to_string()))?;
        if submissions.contains_key(&digest) {
            return Err(EngineError::DuplicateSubmission(digest));
        }
        submissions.insert(digest, SubmissionState::Submitting);
        Ok(Reservation {
            submissions: &self.submissions,
            digest,
            armed: true,
        })
    }

    fn record(&self, digest: B256, state: SubmissionState) {
        if let Ok(mut submissions) = self.submissions.lock() {
            submissions.insert(digest, state);
        }
    }

    fn forget(&self, digest: B256) {
        if let Ok(mut submissions) = self.submissions.lock() {
            submissions.remove(&digest);
        }
    }

    fn lookup(&self, digest: B256) -> Option<SubmissionState> {
        self.submissions.lock().ok()?.get(&digest).cloned()
    }
}

/// Holds a `Submitting` entry while the relayer call is outstanding.
///
/// Removed on drop unless disarmed once a job id is recorded.
struct Reservation<'a> {
    submissions: &'a Mutex<HashMap<B256, SubmissionState>>,
    digest: B256,
    armed: bool,
}

impl Reservation<'_> {
    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if let Ok(mut submissions) = self.submissions.lock() {
            if matches!(
                submissions.get(&self.digest),
                Some(SubmissionState::Submitting)
            ) {
                submissions.remove(&self.digest);
                debug!(proof = %self.digest, "Released unsubmitted proof");
            }
        }
    }
}
