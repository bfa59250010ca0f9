// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Proof provider adapter.
//!
//! Two mutually exclusive identity-proof sources sit behind one capability
//! trait: a locally generated nullifier proof ([`AnonProofProvider`]) and a
//! remote passport/ID attestation ([`AttestationProofProvider`]). A
//! [`ProofSession`] binds exactly one of them for a linking attempt.
//!
//! Waiting for a proof is cooperative: [`obtain_proof`] re-checks the
//! provider on a timer and wakes early when the provider pushes a status
//! change through its watch channel.

use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use alloy::primitives::{keccak256, Keccak256, B256, U256};
use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::error::EngineError;
use crate::providers::attestation::{AttestationRequest, AttestationVerifier, DisclosedClaims};

/// The nine public signals the registry's link entrypoint expects.
///
/// Field order here is the wire order; [`PublicSignals::ordered`] is the only
/// place that flattens it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublicSignals {
    pub pubkey_hash: U256,
    pub nullifier: U256,
    pub timestamp: U256,
    pub age_above_18: U256,
    pub gender: U256,
    pub pincode: U256,
    pub state: U256,
    pub nullifier_seed: U256,
    pub signal_hash: U256,
}

impl PublicSignals {
    /// Flatten into the registry's fixed-order tuple.
    pub fn ordered(&self) -> [U256; 9] {
        [
            self.pubkey_hash,
            self.nullifier,
            self.timestamp,
            self.age_above_18,
            self.gender,
            self.pincode,
            self.state,
            self.nullifier_seed,
            self.signal_hash,
        ]
    }

    /// Decimal strings in wire order, as relayers expect them.
    pub fn to_decimal_strings(&self) -> Vec<String> {
        self.ordered().iter().map(U256::to_string).collect()
    }
}

/// Which identity source produced a proof.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    /// Local nullifier-based proof
    Anon,
    /// Remote passport/ID attestation
    Attestation,
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderKind::Anon => f.write_str("anon"),
            ProviderKind::Attestation => f.write_str("attestation"),
        }
    }
}

/// Nullifier proof produced by the local prover.
#[derive(Debug, Clone, PartialEq)]
pub struct AnonProof {
    /// Groth16 proof object as emitted by the prover
    pub proof: Value,
    pub signals: PublicSignals,
}

/// Passport/ID attestation that passed the verifier.
#[derive(Debug, Clone, PartialEq)]
pub struct AttestationProof {
    pub request: AttestationRequest,
    pub claims: DisclosedClaims,
    pub signals: PublicSignals,
}

impl AttestationProof {
    /// Build from a passing verdict. Signals the attestation scheme does not
    /// carry (pubkey hash, gender, pincode, state, nullifier seed) stay zero.
    pub fn from_verdict(request: AttestationRequest, claims: DisclosedClaims) -> Self {
        let nullifier = claims
            .nullifier
            .as_deref()
            .and_then(parse_numeric)
            .unwrap_or_default();
        let signal_hash =
            U256::from_be_bytes(keccak256(request.user_context_data.as_bytes()).0);
        let signals = PublicSignals {
            nullifier,
            timestamp: U256::from(chrono::Utc::now().timestamp().max(0) as u64),
            age_above_18: U256::from(claims.is_adult() as u8),
            signal_hash,
            ..Default::default()
        };
        Self {
            request,
            claims,
            signals,
        }
    }
}

/// An immutable identity proof from exactly one provider.
#[derive(Debug, Clone, PartialEq)]
pub enum IdentityProof {
    Anon(AnonProof),
    Attestation(AttestationProof),
}

impl IdentityProof {
    pub fn kind(&self) -> ProviderKind {
        match self {
            IdentityProof::Anon(_) => ProviderKind::Anon,
            IdentityProof::Attestation(_) => ProviderKind::Attestation,
        }
    }

    pub fn public_signals(&self) -> &PublicSignals {
        match self {
            IdentityProof::Anon(p) => &p.signals,
            IdentityProof::Attestation(p) => &p.signals,
        }
    }

    /// Proof object forwarded to the relayer.
    pub fn proof_payload(&self) -> &Value {
        match self {
            IdentityProof::Anon(p) => &p.proof,
            IdentityProof::Attestation(p) => &p.request.proof,
        }
    }

    /// Public signals forwarded to the relayer, in the provider's own layout.
    pub fn relayer_signals(&self) -> Vec<String> {
        match self {
            IdentityProof::Anon(p) => p.signals.to_decimal_strings(),
            IdentityProof::Attestation(p) => p.request.public_signals.clone(),
        }
    }

    /// Content digest identifying this proof for the whole session.
    pub fn digest(&self) -> B256 {
        let mut hasher = Keccak256::new();
        hasher.update(self.kind().to_string().as_bytes());
        hasher.update(self.proof_payload().to_string().as_bytes());
        for signal in self.relayer_signals() {
            hasher.update(signal.as_bytes());
            hasher.update([0u8]);
        }
        hasher.finalize()
    }
}

fn parse_numeric(raw: &str) -> Option<U256> {
    let raw = raw.trim();
    match raw.strip_prefix("0x") {
        Some(hex) => U256::from_str_radix(hex, 16).ok(),
        None => U256::from_str_radix(raw, 10).ok(),
    }
}

/// Provider progress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProofStatus {
    NotStarted,
    InProgress,
    Ready,
    Failed(String),
}

/// Capability shared by both identity sources.
#[async_trait]
pub trait ProofProvider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    fn status(&self) -> ProofStatus;

    /// Push channel for status changes, when the provider has one.
    fn subscribe(&self) -> Option<watch::Receiver<ProofStatus>> {
        None
    }

    /// Hand over the proof. Fails with `ProofUnavailable` unless `Ready`.
    async fn produce_proof(&self) -> Result<IdentityProof, EngineError>;
}

/// Polling bounds while waiting for a provider.
#[derive(Debug, Clone, Copy)]
pub struct PollSettings {
    pub interval: Duration,
    pub timeout: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(500),
            timeout: Duration::from_secs(300),
        }
    }
}

/// Wait until the provider is `Ready` (then take its proof) or `Failed`.
pub async fn obtain_proof(
    provider: &dyn ProofProvider,
    poll: &PollSettings,
) -> Result<IdentityProof, EngineError> {
    let deadline = Instant::now() + poll.timeout;
    let mut updates = provider.subscribe();

    loop {
        match provider.status() {
            ProofStatus::Ready => return provider.produce_proof().await,
            ProofStatus::Failed(reason) => {
                warn!(provider = %provider.kind(), %reason, "Proof provider failed");
                return Err(EngineError::ProofUnavailable(reason));
            }
            ProofStatus::NotStarted | ProofStatus::InProgress => {}
        }

        let now = Instant::now();
        if now >= deadline {
            return Err(EngineError::ProofUnavailable(format!(
                "{} provider not ready after {:?}",
                provider.kind(),
                poll.timeout
            )));
        }
        let wait = poll.interval.min(deadline - now);

        let closed = match updates.as_mut() {
            Some(rx) => tokio::select! {
                changed = rx.changed() => changed.is_err(),
                _ = tokio::time::sleep(wait) => false,
            },
            None => {
                tokio::time::sleep(wait).await;
                false
            }
        };
        if closed {
            debug!(provider = %provider.kind(), "Status channel closed, falling back to polling");
            updates = None;
        }
    }
}

/// Status plus the proof once produced, shared by both providers.
struct ProofSlot {
    status: watch::Sender<ProofStatus>,
    proof: Mutex<Option<IdentityProof>>,
}

impl ProofSlot {
    fn new() -> Self {
        let (status, _) = watch::channel(ProofStatus::NotStarted);
        Self {
            status,
            proof: Mutex::new(None),
        }
    }

    fn set(&self, status: ProofStatus) {
        self.status.send_replace(status);
    }

    fn fill(&self, proof: IdentityProof) {
        if let Ok(mut slot) = self.proof.lock() {
            *slot = Some(proof);
        }
        self.set(ProofStatus::Ready);
    }

    fn take(&self, kind: ProviderKind) -> Result<IdentityProof, EngineError> {
        if *self.status.borrow() != ProofStatus::Ready {
            return Err(EngineError::ProofUnavailable(format!("{kind} proof is not ready")));
        }
        self.proof
            .lock()
            .ok()
            .and_then(|slot| slot.clone())
            .ok_or_else(|| EngineError::ProofUnavailable(format!("{kind} proof missing")))
    }
}

/// Receives a nullifier proof from the external prover flow.
pub struct AnonProofProvider {
    slot: ProofSlot,
}

impl AnonProofProvider {
    pub fn new() -> Self {
        Self {
            slot: ProofSlot::new(),
        }
    }

    /// The prover flow was opened.
    pub fn begin(&self) {
        self.slot.set(ProofStatus::InProgress);
    }

    /// The prover flow produced a proof.
    pub fn deliver(&self, proof: AnonProof) {
        info!(nullifier = %proof.signals.nullifier, "Anon proof delivered");
        self.slot.fill(IdentityProof::Anon(proof));
    }

    /// The prover flow was declined or crashed.
    pub fn fail(&self, reason: impl Into<String>) {
        self.slot.set(ProofStatus::Failed(reason.into()));
    }
}

impl Default for AnonProofProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProofProvider for AnonProofProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Anon
    }

    fn status(&self) -> ProofStatus {
        self.slot.status.borrow().clone()
    }

    fn subscribe(&self) -> Option<watch::Receiver<ProofStatus>> {
        Some(self.slot.status.subscribe())
    }

    async fn produce_proof(&self) -> Result<IdentityProof, EngineError> {
        self.slot.take(ProviderKind::Anon)
    }
}

/// Verifies a passport/ID attestation with the external verifier.
pub struct AttestationProofProvider {
    verifier: Arc<dyn AttestationVerifier>,
    slot: ProofSlot,
}

impl AttestationProofProvider {
    pub fn new(verifier: Arc<dyn AttestationVerifier>) -> Self {
        Self {
            verifier,
            slot: ProofSlot::new(),
        }
    }

    /// Submit the payload from the identity app. The provider becomes
    /// `Ready` on a pass verdict and `Failed` otherwise.
    pub async fn submit(&self, request: AttestationRequest) {
        self.slot.set(ProofStatus::InProgress);

        match self.verifier.verify(&request).await {
            Ok(verdict) if verdict.is_valid => {
                info!(
                    attestation_id = request.attestation_id,
                    "Attestation passed verification"
                );
                let proof = AttestationProof::from_verdict(request, verdict.claims);
                self.slot.fill(IdentityProof::Attestation(proof));
            }
            Ok(verdict) => {
                let reason = verdict
                    .message
                    .unwrap_or_else(|| "Verification failed".to_string());
                warn!(%reason, "Attestation rejected by verifier");
                self.slot.set(ProofStatus::Failed(reason));
            }
            Err(e) => {
                warn!(error = %e, "Attestation verifier call failed");
                self.slot.set(ProofStatus::Failed(e.to_string()));
            }
        }
    }
}

#[async_trait]
impl ProofProvider for AttestationProofProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Attestation
    }

    fn status(&self) -> ProofStatus {
        self.slot.status.borrow().clone()
    }

    fn subscribe(&self) -> Option<watch::Receiver<ProofStatus>> {
        Some(self.slot.status.subscribe())
    }

    async fn produce_proof(&self) -> Result<IdentityProof, EngineError> {
        self.slot.take(ProviderKind::Attestation)
    }
}

/// One verification session, bound to a single provider.
#[derive(Clone)]
pub struct ProofSession {
    id: Uuid,
    provider: Arc<dyn ProofProvider>,
}

impl ProofSession {
    pub fn new(provider: Arc<dyn ProofProvider>) -> Self {
        Self {
            id: Uuid::new_v4(),
            provider,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn kind(&self) -> ProviderKind {
        self.provider.kind()
    }

    pub fn status(&self) -> ProofStatus {
        self.provider.status()
    }

    /// Wait for this session's provider and take its proof.
    pub async fn obtain(&self, poll: &PollSettings) -> Result<IdentityProof, EngineError> {
        debug!(session = %self.id, provider = %self.kind(), "Waiting for identity proof");
        obtain_proof(self.provider.as_ref(), poll).await
    }
}
