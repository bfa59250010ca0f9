// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Environment variable names, defaults and the [`EngineConfig`] loaded from
//! them at startup.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |
//! | `LEDGER_NETWORK` | `horizen`, `celo-sepolia`, `sepolia` or `kadena` | `horizen` |
//! | `LEDGER_RPC_URL` | JSON-RPC endpoint override | Network default |
//! | `IDENTITY_REGISTRY_ADDRESS` | Identity registry override | Network default |
//! | `LOAN_CONTRACT_ADDRESS` | Loan contract override | Network default |
//! | `SETTLEMENT_TOKEN_ADDRESS` | Settlement token override | Network default |
//! | `SETTLEMENT_TOKEN_DECIMALS` | Settlement token decimals | `6` |
//! | `SIGNER_PRIVATE_KEY` | Hex signing key of the borrower wallet | Optional |
//! | `SIGNER_KEY_PEM_PATH` | PEM signing key (used if no hex key) | Optional |
//! | `ATTESTATION_VERIFIER_URL` | Identity attestation verifier | Optional (disables `/api/verify`) |
//! | `ATTESTATION_SCOPE` | Verifier scope, at most 30 chars | `credoraIdentity` |
//! | `STATUS_CACHE_CAPACITY` | Wallets kept in the status cache | `16` |
//!
//! ## Library Driver Settings
//!
//! The HTTP service never aggregates proofs or sends loan transactions, so it
//! does not read these. They are parsed into [`EngineConfig`] for programs
//! that drive the engine as a library: [`EngineConfig::build_relayer`] and
//! [`EngineConfig::build_prover`] construct the clients, while
//! [`EngineConfig::aggregation`] and [`EngineConfig::confirmation`] are passed
//! to `AggregationClient::new` and `TransactionTracker::new`.
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `RELAYER_URL` | Aggregation relayer base URL | Horizen Labs relayer |
//! | `RELAYER_API_KEY` | Relayer API key | Optional (no relayer client) |
//! | `RELAYER_DOMAIN_ID` | Aggregation domain id | `113` |
//! | `RELAYER_TIMEOUT_SECS` | Ceiling on waiting for an aggregation | `300` |
//! | `CONFIRMATION_TIMEOUT_SECS` | Ceiling on waiting for a receipt | `10` |
//! | `CONFIRMATION_POLL_MS` | Receipt poll interval | `1000` |
//! | `PROVER_URL` | Income prover base URL | `http://localhost:3002` |

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use alloy::primitives::U256;

use crate::blockchain::signing::{load_signer, SignerSource};
use crate::blockchain::{
    network_by_key, parse_address, EvmLedger, LedgerSettings, NetworkConfig, HORIZEN_TESTNET,
    SETTLEMENT_TOKEN_DECIMALS,
};
use crate::engine::cache::DEFAULT_CAPACITY;
use crate::engine::{AggregationSettings, ConfirmationSettings, DEFAULT_DOMAIN_ID};
use crate::providers::{
    HttpAttestationVerifier, HttpIncomeProver, HttpRelayer, VerificationPolicy,
};

pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const LEDGER_NETWORK_ENV: &str = "LEDGER_NETWORK";
pub const LEDGER_RPC_URL_ENV: &str = "LEDGER_RPC_URL";
pub const IDENTITY_REGISTRY_ENV: &str = "IDENTITY_REGISTRY_ADDRESS";
pub const LOAN_CONTRACT_ENV: &str = "LOAN_CONTRACT_ADDRESS";
pub const SETTLEMENT_TOKEN_ENV: &str = "SETTLEMENT_TOKEN_ADDRESS";
pub const SETTLEMENT_TOKEN_DECIMALS_ENV: &str = "SETTLEMENT_TOKEN_DECIMALS";
pub const SIGNER_PRIVATE_KEY_ENV: &str = "SIGNER_PRIVATE_KEY";
pub const SIGNER_KEY_PEM_PATH_ENV: &str = "SIGNER_KEY_PEM_PATH";
pub const RELAYER_URL_ENV: &str = "RELAYER_URL";
pub const RELAYER_API_KEY_ENV: &str = "RELAYER_API_KEY";
pub const RELAYER_DOMAIN_ID_ENV: &str = "RELAYER_DOMAIN_ID";
pub const RELAYER_TIMEOUT_SECS_ENV: &str = "RELAYER_TIMEOUT_SECS";
pub const CONFIRMATION_TIMEOUT_SECS_ENV: &str = "CONFIRMATION_TIMEOUT_SECS";
pub const CONFIRMATION_POLL_MS_ENV: &str = "CONFIRMATION_POLL_MS";
pub const ATTESTATION_VERIFIER_URL_ENV: &str = "ATTESTATION_VERIFIER_URL";
pub const ATTESTATION_SCOPE_ENV: &str = "ATTESTATION_SCOPE";
pub const PROVER_URL_ENV: &str = "PROVER_URL";
pub const STATUS_CACHE_CAPACITY_ENV: &str = "STATUS_CACHE_CAPACITY";

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_RELAYER_URL: &str = "https://relayer-api.horizenlabs.io/api/v1";
const DEFAULT_ATTESTATION_SCOPE: &str = "credoraIdentity";
const DEFAULT_PROVER_URL: &str = "http://localhost:3002";
const DEFAULT_RELAYER_TIMEOUT_SECS: u64 = 300;
const DEFAULT_CONFIRMATION_TIMEOUT_SECS: u64 = 10;
const DEFAULT_CONFIRMATION_POLL_MS: u64 = 1_000;
/// The attestation verifier hashes the scope into a 31-byte field element.
const MAX_SCOPE_LEN: usize = 30;
const RELAYER_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable {0}")]
    Missing(&'static str),

    #[error("Invalid value for {name}: {message}")]
    Invalid { name: &'static str, message: String },

    #[error("Failed to build {component}: {message}")]
    Component {
        component: &'static str,
        message: String,
    },
}

/// Aggregation relayer access.
#[derive(Debug, Clone)]
pub struct RelayerConfig {
    pub url: String,
    pub api_key: String,
}

/// Identity attestation verifier access.
#[derive(Debug, Clone)]
pub struct AttestationConfig {
    pub url: Option<String>,
    pub scope: String,
    pub policy: VerificationPolicy,
}

/// Everything the service reads from its environment.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub host: String,
    pub port: u16,
    pub network: NetworkConfig,
    pub ledger: LedgerSettings,
    pub token_decimals: u8,
    pub signer: Option<SignerSource>,
    /// Library drivers only, see [`EngineConfig::build_relayer`].
    pub relayer: Option<RelayerConfig>,
    /// Library drivers only, for `AggregationClient::new`.
    pub aggregation: AggregationSettings,
    /// Library drivers only, for `TransactionTracker::new`.
    pub confirmation: ConfirmationSettings,
    pub attestation: AttestationConfig,
    /// Library drivers only, see [`EngineConfig::build_prover`].
    pub prover_url: String,
    pub cache_capacity: usize,
}

impl EngineConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(lookup);

        let network = match env.optional(LEDGER_NETWORK_ENV) {
            Some(key) => network_by_key(&key).map_err(|message| ConfigError::Invalid {
                name: LEDGER_NETWORK_ENV,
                message,
            })?,
            None => HORIZEN_TESTNET,
        };

        let mut ledger = LedgerSettings::for_network(&network).map_err(|e| ConfigError::Invalid {
            name: LEDGER_NETWORK_ENV,
            message: e.to_string(),
        })?;
        if let Some(url) = env.optional(LEDGER_RPC_URL_ENV) {
            ledger.rpc_url = url;
        }
        if let Some(raw) = env.optional(IDENTITY_REGISTRY_ENV) {
            ledger.identity_registry = address(IDENTITY_REGISTRY_ENV, &raw)?;
        }
        if let Some(raw) = env.optional(LOAN_CONTRACT_ENV) {
            ledger.loan_contract = address(LOAN_CONTRACT_ENV, &raw)?;
        }
        if let Some(raw) = env.optional(SETTLEMENT_TOKEN_ENV) {
            ledger.settlement_token = address(SETTLEMENT_TOKEN_ENV, &raw)?;
        }

        let signer = match (
            env.optional(SIGNER_PRIVATE_KEY_ENV),
            env.optional(SIGNER_KEY_PEM_PATH_ENV),
        ) {
            (Some(hex), _) => Some(SignerSource::Hex(hex)),
            (None, Some(path)) => Some(SignerSource::PemFile(PathBuf::from(path))),
            (None, None) => None,
        };

        let relayer = env.optional(RELAYER_API_KEY_ENV).map(|api_key| RelayerConfig {
            url: env.or_default(RELAYER_URL_ENV, DEFAULT_RELAYER_URL),
            api_key,
        });

        let aggregation = AggregationSettings {
            timeout: Duration::from_secs(
                env.parsed(RELAYER_TIMEOUT_SECS_ENV, DEFAULT_RELAYER_TIMEOUT_SECS)?,
            ),
            domain_id: U256::from(env.parsed(RELAYER_DOMAIN_ID_ENV, DEFAULT_DOMAIN_ID)?),
            ..AggregationSettings::default()
        };

        let confirmation = ConfirmationSettings {
            timeout: Duration::from_secs(
                env.parsed(CONFIRMATION_TIMEOUT_SECS_ENV, DEFAULT_CONFIRMATION_TIMEOUT_SECS)?,
            ),
            poll_interval: Duration::from_millis(
                env.parsed(CONFIRMATION_POLL_MS_ENV, DEFAULT_CONFIRMATION_POLL_MS)?,
            ),
        };

        let scope = env.or_default(ATTESTATION_SCOPE_ENV, DEFAULT_ATTESTATION_SCOPE);
        if scope.is_empty() || scope.len() > MAX_SCOPE_LEN {
            return Err(ConfigError::Invalid {
                name: ATTESTATION_SCOPE_ENV,
                message: format!("must be 1 to {MAX_SCOPE_LEN} characters"),
            });
        }

        let cache_capacity = env.parsed(STATUS_CACHE_CAPACITY_ENV, DEFAULT_CAPACITY)?;
        if cache_capacity == 0 {
            return Err(ConfigError::Invalid {
                name: STATUS_CACHE_CAPACITY_ENV,
                message: "must be at least 1".to_string(),
            });
        }

        Ok(Self {
            host: env.or_default(HOST_ENV, DEFAULT_HOST),
            port: env.parsed(PORT_ENV, DEFAULT_PORT)?,
            network,
            ledger,
            token_decimals: env.parsed(SETTLEMENT_TOKEN_DECIMALS_ENV, SETTLEMENT_TOKEN_DECIMALS)?,
            signer,
            relayer,
            aggregation,
            confirmation,
            attestation: AttestationConfig {
                url: env.optional(ATTESTATION_VERIFIER_URL_ENV),
                scope,
                policy: VerificationPolicy::default(),
            },
            prover_url: env.or_default(PROVER_URL_ENV, DEFAULT_PROVER_URL),
            cache_capacity,
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Relayer client, when an API key is configured. Not used by the HTTP
    /// service.
    pub fn build_relayer(&self) -> Result<Option<HttpRelayer>, ConfigError> {
        self.relayer
            .as_ref()
            .map(|r| {
                HttpRelayer::new(&r.url, &r.api_key, RELAYER_REQUEST_TIMEOUT).map_err(|e| {
                    ConfigError::Component {
                        component: "relayer client",
                        message: e.to_string(),
                    }
                })
            })
            .transpose()
    }

    /// Attestation verifier client, when an endpoint is configured.
    pub fn build_attestation_verifier(
        &self,
    ) -> Result<Option<HttpAttestationVerifier>, ConfigError> {
        self.attestation
            .url
            .as_ref()
            .map(|url| {
                HttpAttestationVerifier::new(
                    url,
                    &self.attestation.scope,
                    self.attestation.policy.clone(),
                )
                .map_err(|e| ConfigError::Component {
                    component: "attestation verifier",
                    message: e.to_string(),
                })
            })
            .transpose()
    }

    /// JSON-RPC ledger, signing with the configured key if there is one.
    pub fn build_ledger(&self) -> Result<EvmLedger, ConfigError> {
        let signer = self
            .signer
            .as_ref()
            .map(load_signer)
            .transpose()
            .map_err(|e| ConfigError::Component {
                component: "signer",
                message: e.to_string(),
            })?;
        EvmLedger::new(self.ledger.clone(), signer).map_err(|e| ConfigError::Component {
            component: "ledger client",
            message: e.to_string(),
        })
    }

    /// Income prover client for document-driven loan applications. Not used
    /// by the HTTP service.
    pub fn build_prover(&self) -> Result<HttpIncomeProver, ConfigError> {
        HttpIncomeProver::new(&self.prover_url).map_err(|e| ConfigError::Component {
            component: "income prover",
            message: e.to_string(),
        })
    }
}

struct Env<F>(F);

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Set and non-blank.
    fn optional(&self, name: &str) -> Option<String> {
        (self.0)(name)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn or_default(&self, name: &str, default: &str) -> String {
        self.optional(name).unwrap_or_else(|| default.to_string())
    }

    fn parsed<T>(&self, name: &'static str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.optional(name) {
            Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
                name,
                message: e.to_string(),
            }),
            None => Ok(default),
        }
    }
}

fn address(name: &'static str, raw: &str) -> Result<alloy::primitives::Address, ConfigError> {
    parse_address(raw).map_err(|e| ConfigError::Invalid {
        name,
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::blockchain::CELO_SEPOLIA;
    use crate::engine::proof::AnonProof;

    fn load(vars: &[(&str, &str)]) -> Result<EngineConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        EngineConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_target_horizen() {
        let config = load(&[]).unwrap();
        assert_eq!(config.network.key, HORIZEN_TESTNET.key);
        assert_eq!(config.bind_address(), "0.0.0.0:8080");
        assert_eq!(config.token_decimals, 6);
        assert_eq!(config.confirmation.timeout, Duration::from_secs(10));
        assert_eq!(config.aggregation.domain_id, U256::from(113));
        assert_eq!(config.cache_capacity, 16);
        assert!(config.signer.is_none());
        assert!(config.relayer.is_none());
        assert!(config.attestation.url.is_none());
        assert!(config.build_relayer().unwrap().is_none());
        assert!(config.build_attestation_verifier().unwrap().is_none());
    }

    #[test]
    fn overrides_apply_on_top_of_network_defaults() {
        let config = load(&[
            ("LEDGER_NETWORK", "celo-sepolia"),
            ("LEDGER_RPC_URL", "http://127.0.0.1:8545"),
            ("LOAN_CONTRACT_ADDRESS", "0x00000000000000000000000000000000000000aa"),
            ("CONFIRMATION_TIMEOUT_SECS", "30"),
            ("RELAYER_API_KEY", "secret"),
        ])
        .unwrap();
        assert_eq!(config.network.key, CELO_SEPOLIA.key);
        assert_eq!(config.ledger.rpc_url, "http://127.0.0.1:8545");
        assert_eq!(
            config.ledger.loan_contract,
            parse_address("0x00000000000000000000000000000000000000aa").unwrap()
        );
        assert_eq!(config.confirmation.timeout, Duration::from_secs(30));
        let relayer = config.relayer.as_ref().unwrap();
        assert_eq!(relayer.url, DEFAULT_RELAYER_URL);
        assert!(config.build_relayer().unwrap().is_some());
    }

    #[test]
    fn hex_key_wins_over_pem_path() {
        let config = load(&[
            ("SIGNER_PRIVATE_KEY", "0xabc"),
            ("SIGNER_KEY_PEM_PATH", "/keys/signer.pem"),
        ])
        .unwrap();
        assert!(matches!(config.signer, Some(SignerSource::Hex(_))));

        let config = load(&[("SIGNER_KEY_PEM_PATH", "/keys/signer.pem")]).unwrap();
        assert!(matches!(config.signer, Some(SignerSource::PemFile(_))));
    }

    #[test]
    fn invalid_values_name_the_variable() {
        let err = load(&[("PORT", "eighty")]).unwrap_err();
        assert!(err.to_string().contains("PORT"));

        let err = load(&[("LEDGER_NETWORK", "mainnet")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: LEDGER_NETWORK_ENV, .. }));

        let err = load(&[("IDENTITY_REGISTRY_ADDRESS", "0x12")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: IDENTITY_REGISTRY_ENV, .. }));
    }

    #[test]
    fn scope_length_is_bounded() {
        let long = "x".repeat(31);
        assert!(load(&[("ATTESTATION_SCOPE", long.as_str())]).is_err());
        assert!(load(&[("ATTESTATION_SCOPE", "credora-identity")]).is_ok());
    }

    #[test]
    fn blank_values_fall_back_to_defaults() {
        let config = load(&[("HOST", "  "), ("STATUS_CACHE_CAPACITY", "")]).unwrap();
        assert_eq!(config.host, DEFAULT_HOST);
        assert_eq!(config.cache_capacity, DEFAULT_CAPACITY);
        assert!(load(&[("STATUS_CACHE_CAPACITY", "0")]).is_err());
    }

    #[test]
    fn configured_verifier_is_built() {
        let config = load(&[("ATTESTATION_VERIFIER_URL", "http://localhost:3001")]).unwrap();
        assert!(config.build_attestation_verifier().unwrap().is_some());
        assert!(config.build_prover().is_ok());
    }

    #[test]
    fn driver_settings_feed_library_clients() {
        use std::sync::Arc;

        use crate::engine::{AggregationClient, TransactionTracker, VerificationCache};
        use crate::testing::MockLedger;

        let config = load(&[
            ("RELAYER_API_KEY", "secret"),
            ("RELAYER_DOMAIN_ID", "175"),
            ("CONFIRMATION_POLL_MS", "250"),
        ])
        .unwrap();
        let ledger = Arc::new(MockLedger::with_wallet());
        let tracker = Arc::new(TransactionTracker::new(
            ledger.clone(),
            config.confirmation,
        ));
        assert_eq!(tracker.settings().poll_interval, Duration::from_millis(250));

        let relayer = config.build_relayer().unwrap().unwrap();
        let client = AggregationClient::new(
            Arc::new(relayer),
            ledger.clone(),
            Arc::new(VerificationCache::new(ledger, config.cache_capacity)),
            tracker,
            config.aggregation,
        );
        let AnonProof { signals, .. } = crate::testing::anon_proof(1);
        let args = client
            .build_link_args(&signals, &crate::testing::receipt(1, 0, 1))
            .unwrap();
        assert_eq!(args.domain_id, U256::from(175));
    }

    #[test]
    fn unreadable_signer_fails_ledger_build() {
        let config = load(&[("SIGNER_PRIVATE_KEY", "not-hex")]).unwrap();
        assert!(matches!(
            config.build_ledger(),
            Err(ConfigError::Component { component: "signer", .. })
        ));
    }
}
