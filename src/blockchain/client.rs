// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! JSON-RPC ledger client for the identity registry and loan contract.

use std::str::FromStr;

use alloy::{
    network::EthereumWallet,
    primitives::{Address, Bytes, B256, U256},
    providers::{DynProvider, Provider, ProviderBuilder},
    signers::local::PrivateKeySigner,
};
use async_trait::async_trait;

use super::contracts::{IIdentityRegistry, ISalaryLoan, IERC20};
use super::ledger::{ContractStats, Ledger, LinkArgs, LoanRecord, TxHash, TxReceipt};
use super::types::NetworkConfig;

/// Connection settings resolved from configuration.
#[derive(Debug, Clone)]
pub struct LedgerSettings {
    pub rpc_url: String,
    pub identity_registry: Address,
    pub loan_contract: Address,
    pub settlement_token: Address,
}

impl LedgerSettings {
    /// Settings for a known network's default endpoint and deployment.
    pub fn for_network(network: &NetworkConfig) -> Result<Self, LedgerClientError> {
        Ok(Self {
            rpc_url: network.rpc_url.to_string(),
            identity_registry: parse_address(network.contracts.identity_registry)?,
            loan_contract: parse_address(network.contracts.loan_contract)?,
            settlement_token: parse_address(network.contracts.settlement_token)?,
        })
    }
}

/// EVM ledger client.
pub struct EvmLedger {
    settings: LedgerSettings,
    /// Alloy HTTP provider (with a wallet filler when a signer is configured)
    provider: DynProvider,
    signer: Option<Address>,
}

impl EvmLedger {
    /// Create a client. Without a signer only read functions succeed.
    pub fn new(
        settings: LedgerSettings,
        signer: Option<PrivateKeySigner>,
    ) -> Result<Self, LedgerClientError> {
        let url: url::Url = settings
            .rpc_url
            .parse()
            .map_err(|e: url::ParseError| LedgerClientError::InvalidRpcUrl(e.to_string()))?;

        let (provider, signer) = match signer {
            Some(signer) => {
                let address = signer.address();
                let provider = ProviderBuilder::new()
                    .wallet(EthereumWallet::from(signer))
                    .connect_http(url)
                    .erased();
                (provider, Some(address))
            }
            None => (ProviderBuilder::new().connect_http(url).erased(), None),
        };

        Ok(Self {
            settings,
            provider,
            signer,
        })
    }

    /// Get the connection settings.
    pub fn settings(&self) -> &LedgerSettings {
        &self.settings
    }

    fn registry(&self) -> IIdentityRegistry::IIdentityRegistryInstance<DynProvider> {
        IIdentityRegistry::new(self.settings.identity_registry, self.provider.clone())
    }

    fn loans(&self) -> ISalaryLoan::ISalaryLoanInstance<DynProvider> {
        ISalaryLoan::new(self.settings.loan_contract, self.provider.clone())
    }

    fn require_signer(&self) -> Result<Address, LedgerClientError> {
        self.signer.ok_or(LedgerClientError::SignerUnavailable)
    }
}

#[async_trait]
impl Ledger for EvmLedger {
    fn connected_wallet(&self) -> Option<Address> {
        self.signer
    }

    async fn is_linked(&self, wallet: Address) -> Result<bool, LedgerClientError> {
        self.registry()
            .registeredUsers(wallet)
            .call()
            .await
            .map_err(|e| LedgerClientError::ContractError(e.to_string()))
    }

    async fn user_loans(&self, borrower: Address) -> Result<Vec<U256>, LedgerClientError> {
        self.loans()
            .getUserLoans(borrower)
            .call()
            .await
            .map_err(|e| LedgerClientError::ContractError(e.to_string()))
    }

    async fn loan_details(&self, loan_id: U256) -> Result<LoanRecord, LedgerClientError> {
        let details = self
            .loans()
            .getLoanDetails(loan_id)
            .call()
            .await
            .map_err(|e| LedgerClientError::ContractError(e.to_string()))?;
        Ok(details.into())
    }

    async fn tier_limit(&self, tier: &str) -> Result<U256, LedgerClientError> {
        self.loans()
            .salaryRangeLimits(tier.to_string())
            .call()
            .await
            .map_err(|e| LedgerClientError::ContractError(e.to_string()))
    }

    async fn tier_rate(&self, tier: &str) -> Result<U256, LedgerClientError> {
        self.loans()
            .salaryRangeInterestRates(tier.to_string())
            .call()
            .await
            .map_err(|e| LedgerClientError::ContractError(e.to_string()))
    }

    async fn contract_stats(&self) -> Result<ContractStats, LedgerClientError> {
        let stats = self
            .loans()
            .getContractStats()
            .call()
            .await
            .map_err(|e| LedgerClientError::ContractError(e.to_string()))?;
        Ok(ContractStats {
            total_issued: stats.totalLoansIssued,
            total_active: stats.totalActiveLoans,
            balance: stats.contractBalance,
            next_id: stats.nextLoanId,
        })
    }

    async fn is_document_verified(&self, commitment: B256) -> Result<bool, LedgerClientError> {
        self.loans()
            .verifiedDocuments(commitment)
            .call()
            .await
            .map_err(|e| LedgerClientError::ContractError(e.to_string()))
    }

    async fn settlement_balance(&self) -> Result<U256, LedgerClientError> {
        IERC20::new(self.settings.settlement_token, self.provider.clone())
            .balanceOf(self.settings.loan_contract)
            .call()
            .await
            .map_err(|e| LedgerClientError::ContractError(e.to_string()))
    }

    async fn link_identity(&self, args: &LinkArgs) -> Result<TxHash, LedgerClientError> {
        self.require_signer()?;
        let pending = self
            .registry()
            .checkHash(
                args.inputs.to_vec(),
                args.aggregation_id,
                args.domain_id,
                args.merkle_path.clone(),
                args.leaf_count,
                args.leaf_index,
            )
            .send()
            .await
            .map_err(|e| LedgerClientError::TransactionFailed(e.to_string()))?;
        Ok(*pending.tx_hash())
    }

    async fn verify_income_proof(
        &self,
        public_values: Bytes,
        proof: Bytes,
    ) -> Result<TxHash, LedgerClientError> {
        self.require_signer()?;
        let pending = self
            .loans()
            .verifySalaryProof(public_values, proof)
            .send()
            .await
            .map_err(|e| LedgerClientError::TransactionFailed(e.to_string()))?;
        Ok(*pending.tx_hash())
    }

    async fn apply_for_loan(
        &self,
        amount: U256,
        term_months: U256,
        document_commitment: B256,
    ) -> Result<TxHash, LedgerClientError> {
        self.require_signer()?;
        let pending = self
            .loans()
            .applyForLoan(amount, term_months, document_commitment)
            .send()
            .await
            .map_err(|e| LedgerClientError::TransactionFailed(e.to_string()))?;
        Ok(*pending.tx_hash())
    }

    async fn receipt(&self, tx_hash: TxHash) -> Result<Option<TxReceipt>, LedgerClientError> {
        let receipt = self
            .provider
            .get_transaction_receipt(tx_hash)
            .await
            .map_err(|e| LedgerClientError::RpcError(format!("Failed to get receipt: {}", e)))?;

        Ok(receipt.map(|r| TxReceipt {
            tx_hash,
            block_number: r.block_number.unwrap_or(0),
            gas_used: r.gas_used as u64,
            success: r.status(),
            logs: r.inner.logs().iter().map(|log| log.inner.clone()).collect(),
        }))
    }
}

/// Parse a checksummed or lowercase hex address.
pub fn parse_address(raw: &str) -> Result<Address, LedgerClientError> {
    Address::from_str(raw.trim()).map_err(|e| LedgerClientError::InvalidAddress(e.to_string()))
}

/// Errors that can occur during ledger operations.
#[derive(Debug, thiserror::Error)]
pub enum LedgerClientError {
    #[error("Invalid RPC URL: {0}")]
    InvalidRpcUrl(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Invalid private key: {0}")]
    InvalidPrivateKey(String),

    #[error("No signing wallet connected")]
    SignerUnavailable,

    #[error("RPC error: {0}")]
    RpcError(String),

    #[error("Contract error: {0}")]
    ContractError(String),

    #[error("Transaction failed: {0}")]
    TransactionFailed(String),
}
