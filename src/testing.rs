// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! In-memory collaborators shared by the unit tests.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard};

use alloy::primitives::{keccak256, Address, Bytes, Log, B256, U256};
use alloy::sol_types::{SolEvent, SolValue};
use async_trait::async_trait;
use serde_json::json;

use crate::blockchain::contracts::{ISalaryLoan, SalaryPublicValues};
use crate::blockchain::{
    ContractStats, Ledger, LedgerClientError, LinkArgs, LoanRecord, TxHash, TxReceipt,
};
use crate::engine::aggregation::AggregationReceipt;
use crate::engine::proof::{AnonProof, IdentityProof, PublicSignals};
use crate::providers::attestation::{
    AttestationError, AttestationRequest, AttestationVerdict, AttestationVerifier,
    DisclosedClaims,
};
use crate::providers::prover::{IncomeProof, IncomeProver, ProveRequest, ProverError};
use crate::providers::relayer::{JobStatus, Relayer, RelayerError};

/// The connected test wallet.
pub fn wallet() -> Address {
    Address::repeat_byte(0x11)
}

pub fn anon_proof(nullifier: u64) -> AnonProof {
    AnonProof {
        proof: json!({
            "pi_a": ["1", "2", "1"],
            "pi_b": [["3", "4"], ["5", "6"], ["1", "0"]],
            "pi_c": ["7", "8", "1"],
            "protocol": "groth16"
        }),
        signals: PublicSignals {
            pubkey_hash: U256::from(0xabcdu64),
            nullifier: U256::from(nullifier),
            timestamp: U256::from(1_700_000_000u64),
            age_above_18: U256::from(1),
            gender: U256::from(77),
            pincode: U256::from(110_001u64),
            state: U256::from(452_723u64),
            nullifier_seed: U256::from(1234),
            signal_hash: U256::from(1),
        },
    }
}

pub fn receipt(aggregation_id: u64, leaf_index: u64, leaf_count: u64) -> AggregationReceipt {
    AggregationReceipt {
        aggregation_id: U256::from(aggregation_id),
        merkle_path: vec![
            B256::repeat_byte(0x01),
            B256::repeat_byte(0x02),
            B256::repeat_byte(0x03),
        ],
        leaf_count: U256::from(leaf_count),
        leaf_index: U256::from(leaf_index),
    }
}

pub fn income_proof(salary_range: &str) -> IncomeProof {
    let values = SalaryPublicValues {
        salaryRange: salary_range.to_string(),
        signatureValid: true,
        documentCommitment: B256::ZERO,
        publicKeyHash: B256::repeat_byte(0x5a),
    };
    IncomeProof {
        public_values: Bytes::from(values.abi_encode_params()),
        proof: Bytes::from_static(&[0x11, 0x22, 0x33, 0x44]),
    }
}

enum Effect {
    Link(Address),
    VerifyDocument { commitment: B256, salary_range: String },
    Loan(LoanRecord),
}

/// Mutable ledger contents; tests reach in through [`MockLedger::state`].
pub struct MockState {
    pub wallet: Option<Address>,
    pub linked: HashSet<Address>,
    pub loans: BTreeMap<U256, LoanRecord>,
    pub tier_limits: HashMap<String, U256>,
    pub tier_rates: HashMap<String, U256>,
    pub balance: U256,
    /// Commitment -> salary range
    pub verified_documents: HashMap<B256, String>,
    /// Keep receipts unavailable until released
    pub hold_receipts: bool,
    /// Mine every transaction as reverted
    pub revert_receipts: bool,
    pub fail_reads: Option<String>,
    pub revert_verify: Option<String>,
    pub revert_apply: Option<String>,
    pub emit_loan_event: bool,
    pub next_loan_id: u64,
    pub is_linked_reads: usize,
    pub link_calls: Vec<LinkArgs>,
    /// Every write in submission order
    pub writes: Vec<&'static str>,
    nonce: u64,
    receipts: HashMap<TxHash, TxReceipt>,
    pending: HashMap<TxHash, (TxReceipt, Effect)>,
}

impl MockState {
    fn read_guard(&self) -> Result<(), LedgerClientError> {
        match &self.fail_reads {
            Some(msg) => Err(LedgerClientError::RpcError(msg.clone())),
            None => Ok(()),
        }
    }

    fn signer(&self) -> Result<Address, LedgerClientError> {
        self.wallet.ok_or(LedgerClientError::SignerUnavailable)
    }

    fn mine(&mut self, logs: Vec<Log>, effect: Effect) -> TxHash {
        self.nonce += 1;
        let tx_hash = keccak256(self.nonce.to_be_bytes());
        let receipt = TxReceipt {
            tx_hash,
            block_number: 1_000 + self.nonce,
            gas_used: 90_000,
            success: !self.revert_receipts,
            logs,
        };
        if self.hold_receipts {
            self.pending.insert(tx_hash, (receipt, effect));
        } else {
            self.settle(receipt, effect);
        }
        tx_hash
    }

    fn settle(&mut self, receipt: TxReceipt, effect: Effect) {
        if receipt.success {
            match effect {
                Effect::Link(wallet) => {
                    self.linked.insert(wallet);
                }
                Effect::VerifyDocument {
                    commitment,
                    salary_range,
                } => {
                    self.verified_documents.insert(commitment, salary_range);
                }
                Effect::Loan(record) => {
                    self.loans.insert(record.loan_id, record);
                }
            }
        }
        self.receipts.insert(receipt.tx_hash, receipt);
    }
}

pub struct MockLedger {
    state: Mutex<MockState>,
}

impl MockLedger {
    /// Ledger without a connected signer.
    pub fn new() -> Self {
        let tiers = [
            ("0-1000", 1_000u64, 1500u64),
            ("1000-2000", 3_000, 1200),
            ("2000-3000", 6_000, 1000),
            ("3000-4000", 10_000, 800),
            ("4000-5000", 15_000, 600),
            ("5000+", 25_000, 500),
        ];
        let tier_limits = tiers
            .iter()
            .map(|(t, limit, _)| (t.to_string(), U256::from(*limit) * U256::from(1_000_000u64)))
            .collect();
        let tier_rates = tiers
            .iter()
            .map(|(t, _, rate)| (t.to_string(), U256::from(*rate)))
            .collect();

        Self {
            state: Mutex::new(MockState {
                wallet: None,
                linked: HashSet::new(),
                loans: BTreeMap::new(),
                tier_limits,
                tier_rates,
                balance: U256::from(1_000_000_000_000u64),
                verified_documents: HashMap::new(),
                hold_receipts: false,
                revert_receipts: false,
                fail_reads: None,
                revert_verify: None,
                revert_apply: None,
                emit_loan_event: true,
                next_loan_id: 1,
                is_linked_reads: 0,
                link_calls: Vec::new(),
                writes: Vec::new(),
                nonce: 0,
                receipts: HashMap::new(),
                pending: HashMap::new(),
            }),
        }
    }

    /// Ledger with [`wallet`] connected as signer.
    pub fn with_wallet() -> Self {
        let ledger = Self::new();
        ledger.state().wallet = Some(wallet());
        ledger
    }

    pub fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    /// Mine a held transaction.
    pub fn release(&self, tx_hash: TxHash) {
        let mut state = self.state();
        if let Some((receipt, effect)) = state.pending.remove(&tx_hash) {
            state.settle(receipt, effect);
        }
    }

    /// Store a loan for `borrower` and return its id.
    pub fn add_loan(&self, borrower: Address, is_active: bool, is_paid_off: bool) -> U256 {
        let mut state = self.state();
        let loan_id = U256::from(state.next_loan_id);
        state.next_loan_id += 1;
        let amount = U256::from(1_000_000_000u64);
        state.loans.insert(
            loan_id,
            LoanRecord {
                loan_id,
                borrower,
                amount,
                interest_rate_bps: U256::from(800),
                term_months: U256::from(12),
                monthly_payment: U256::from(90_000_000u64),
                total_amount: U256::from(1_080_000_000u64),
                remaining_balance: if is_paid_off { U256::ZERO } else { amount },
                start_time: U256::ZERO,
                last_payment_time: U256::ZERO,
                is_active,
                is_paid_off,
                salary_range: "3000-4000".to_string(),
                document_commitment: B256::repeat_byte(0xcc),
            },
        );
        loan_id
    }
}

impl Default for MockLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Ledger for MockLedger {
    fn connected_wallet(&self) -> Option<Address> {
        self.state().wallet
    }

    async fn is_linked(&self, wallet: Address) -> Result<bool, LedgerClientError> {
        let mut state = self.state();
        state.is_linked_reads += 1;
        state.read_guard()?;
        Ok(state.linked.contains(&wallet))
    }

    async fn user_loans(&self, borrower: Address) -> Result<Vec<U256>, LedgerClientError> {
        let state = self.state();
        state.read_guard()?;
        Ok(state
            .loans
            .values()
            .filter(|l| l.borrower == borrower)
            .map(|l| l.loan_id)
            .collect())
    }

    async fn loan_details(&self, loan_id: U256) -> Result<LoanRecord, LedgerClientError> {
        let state = self.state();
        state.read_guard()?;
        state
            .loans
            .get(&loan_id)
            .cloned()
            .ok_or_else(|| LedgerClientError::ContractError("execution reverted: Loan does not exist".into()))
    }

    async fn tier_limit(&self, tier: &str) -> Result<U256, LedgerClientError> {
        let state = self.state();
        state.read_guard()?;
        Ok(state.tier_limits.get(tier).copied().unwrap_or_default())
    }

    async fn tier_rate(&self, tier: &str) -> Result<U256, LedgerClientError> {
        let state = self.state();
        state.read_guard()?;
        Ok(state.tier_rates.get(tier).copied().unwrap_or_default())
    }

    async fn contract_stats(&self) -> Result<ContractStats, LedgerClientError> {
        let state = self.state();
        state.read_guard()?;
        Ok(ContractStats {
            total_issued: U256::from(state.loans.len()),
            total_active: U256::from(state.loans.values().filter(|l| l.is_active).count()),
            balance: state.balance,
            next_id: U256::from(state.next_loan_id),
        })
    }

    async fn is_document_verified(&self, commitment: B256) -> Result<bool, LedgerClientError> {
        let state = self.state();
        state.read_guard()?;
        Ok(state.verified_documents.contains_key(&commitment))
    }

    async fn settlement_balance(&self) -> Result<U256, LedgerClientError> {
        let state = self.state();
        state.read_guard()?;
        Ok(state.balance)
    }

    async fn link_identity(&self, args: &LinkArgs) -> Result<TxHash, LedgerClientError> {
        let mut state = self.state();
        let signer = state.signer()?;
        state.writes.push("link_identity");
        state.link_calls.push(args.clone());
        Ok(state.mine(Vec::new(), Effect::Link(signer)))
    }

    async fn verify_income_proof(
        &self,
        public_values: Bytes,
        _proof: Bytes,
    ) -> Result<TxHash, LedgerClientError> {
        let mut state = self.state();
        state.signer()?;
        state.writes.push("verify_income_proof");
        if let Some(msg) = state.revert_verify.clone() {
            return Err(LedgerClientError::TransactionFailed(msg));
        }
        let values = SalaryPublicValues::abi_decode_params(&public_values).map_err(|_| {
            LedgerClientError::TransactionFailed("execution reverted: Invalid proof".into())
        })?;
        if state
            .verified_documents
            .contains_key(&values.documentCommitment)
        {
            return Err(LedgerClientError::TransactionFailed(
                "execution reverted: Document already verified".into(),
            ));
        }
        let effect = Effect::VerifyDocument {
            commitment: values.documentCommitment,
            salary_range: values.salaryRange,
        };
        Ok(state.mine(Vec::new(), effect))
    }

    async fn apply_for_loan(
        &self,
        amount: U256,
        term_months: U256,
        document_commitment: B256,
    ) -> Result<TxHash, LedgerClientError> {
        let mut state = self.state();
        let borrower = state.signer()?;
        state.writes.push("apply_for_loan");
        if let Some(msg) = state.revert_apply.clone() {
            return Err(LedgerClientError::TransactionFailed(msg));
        }
        let Some(salary_range) = state.verified_documents.get(&document_commitment).cloned()
        else {
            return Err(LedgerClientError::TransactionFailed(
                "execution reverted: Document not verified".into(),
            ));
        };
        if state
            .loans
            .values()
            .any(|l| l.borrower == borrower && l.blocks_new_application())
        {
            return Err(LedgerClientError::TransactionFailed(
                "execution reverted: User already has an active loan".into(),
            ));
        }

        let loan_id = U256::from(state.next_loan_id);
        state.next_loan_id += 1;
        let rate = state
            .tier_rates
            .get(&salary_range)
            .copied()
            .unwrap_or_default();
        let total = amount * (U256::from(10_000) + rate) / U256::from(10_000);

        let logs = if state.emit_loan_event {
            let event = ISalaryLoan::LoanApplied {
                loanId: loan_id,
                borrower,
                amount,
                salaryRange: salary_range.clone(),
                interestRate: rate,
            };
            vec![Log {
                address: Address::repeat_byte(0x99),
                data: event.encode_log_data(),
            }]
        } else {
            Vec::new()
        };

        let record = LoanRecord {
            loan_id,
            borrower,
            amount,
            interest_rate_bps: rate,
            term_months,
            monthly_payment: total / term_months.max(U256::from(1)),
            total_amount: total,
            remaining_balance: total,
            start_time: U256::ZERO,
            last_payment_time: U256::ZERO,
            is_active: false,
            is_paid_off: false,
            salary_range,
            document_commitment,
        };
        Ok(state.mine(logs, Effect::Loan(record)))
    }

    async fn receipt(&self, tx_hash: TxHash) -> Result<Option<TxReceipt>, LedgerClientError> {
        let state = self.state();
        state.read_guard()?;
        if state.pending.contains_key(&tx_hash) {
            return Ok(None);
        }
        Ok(state.receipts.get(&tx_hash).cloned())
    }
}

/// Scripted relayer. Submissions hand out sequential job ids unless an
/// outcome was queued; status polls pop the queue and repeat the last entry.
pub struct MockRelayer {
    submits: Mutex<VecDeque<Result<String, RelayerError>>>,
    statuses: Mutex<VecDeque<JobStatus>>,
    submit_calls: Mutex<usize>,
    status_calls: Mutex<usize>,
    hung_submits: Mutex<usize>,
}

impl MockRelayer {
    pub fn new() -> Self {
        Self {
            submits: Mutex::new(VecDeque::new()),
            statuses: Mutex::new(VecDeque::new()),
            submit_calls: Mutex::new(0),
            status_calls: Mutex::new(0),
            hung_submits: Mutex::new(0),
        }
    }

    /// The next `count` submits never answer.
    pub fn hang_submits(&self, count: usize) {
        *self.hung_submits.lock().unwrap() = count;
    }

    pub fn push_submit(&self, outcome: Result<String, RelayerError>) {
        self.submits.lock().unwrap().push_back(outcome);
    }

    pub fn push_status(&self, status: JobStatus) {
        self.statuses.lock().unwrap().push_back(status);
    }

    pub fn submit_calls(&self) -> usize {
        *self.submit_calls.lock().unwrap()
    }

    pub fn status_calls(&self) -> usize {
        *self.status_calls.lock().unwrap()
    }
}

impl Default for MockRelayer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Relayer for MockRelayer {
    async fn submit(&self, _proof: &IdentityProof) -> Result<String, RelayerError> {
        let call = {
            let mut calls = self.submit_calls.lock().unwrap();
            *calls += 1;
            *calls
        };
        let hang = {
            let mut hung = self.hung_submits.lock().unwrap();
            let hang = *hung > 0;
            *hung = hung.saturating_sub(1);
            hang
        };
        if hang {
            std::future::pending::<()>().await;
        }
        self.submits
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(format!("job-{call}")))
    }

    async fn job_status(&self, _job_id: &str) -> Result<JobStatus, RelayerError> {
        *self.status_calls.lock().unwrap() += 1;
        let mut statuses = self.statuses.lock().unwrap();
        let status = if statuses.len() > 1 {
            statuses.pop_front()
        } else {
            statuses.front().cloned()
        };
        Ok(status.unwrap_or(JobStatus::Pending {
            status: "Queued".to_string(),
        }))
    }
}

/// Attestation verifier with a fixed verdict.
pub struct StubVerifier {
    verdict: AttestationVerdict,
}

impl StubVerifier {
    pub fn passing() -> Self {
        Self {
            verdict: AttestationVerdict {
                is_valid: true,
                claims: DisclosedClaims {
                    nationality: Some("IND".to_string()),
                    older_than: Some("18".to_string()),
                    nullifier: Some("987654321".to_string()),
                    ..Default::default()
                },
                message: None,
            },
        }
    }

    pub fn failing() -> Self {
        Self {
            verdict: AttestationVerdict {
                is_valid: false,
                claims: DisclosedClaims::default(),
                message: Some("Verification failed".to_string()),
            },
        }
    }

    pub fn request() -> AttestationRequest {
        AttestationRequest {
            attestation_id: 1,
            proof: json!({"a": ["1", "2"], "b": [["3", "4"], ["5", "6"]], "c": ["7", "8"]}),
            public_signals: vec!["11".to_string(), "22".to_string()],
            user_context_data: format!("0x{}", "00".repeat(32)),
        }
    }
}

#[async_trait]
impl AttestationVerifier for StubVerifier {
    async fn verify(
        &self,
        request: &AttestationRequest,
    ) -> Result<AttestationVerdict, AttestationError> {
        request.validate().map_err(AttestationError::InvalidRequest)?;
        Ok(self.verdict.clone())
    }
}

/// Income prover answering with a canned proof.
pub struct StubProver {
    salary_range: Option<String>,
    calls: Mutex<usize>,
}

impl StubProver {
    pub fn proving(salary_range: &str) -> Self {
        Self {
            salary_range: Some(salary_range.to_string()),
            calls: Mutex::new(0),
        }
    }

    pub fn unavailable() -> Self {
        Self {
            salary_range: None,
            calls: Mutex::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl IncomeProver for StubProver {
    async fn prove(&self, _request: &ProveRequest) -> Result<IncomeProof, ProverError> {
        *self.calls.lock().unwrap() += 1;
        match &self.salary_range {
            Some(range) => Ok(income_proof(range)),
            None => Err(ProverError::Request("prover offline".to_string())),
        }
    }
}
