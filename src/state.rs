// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use crate::blockchain::Ledger;
use crate::config::{ConfigError, EngineConfig};
use crate::engine::VerificationCache;
use crate::providers::AttestationVerifier;

#[derive(Clone)]
pub struct AppState {
    pub ledger: Arc<dyn Ledger>,
    pub cache: Arc<VerificationCache>,
    /// `None` disables `/api/verify`
    pub attestation: Option<Arc<dyn AttestationVerifier>>,
    pub network: &'static str,
    pub token_decimals: u8,
}

impl AppState {
    pub fn new(
        ledger: Arc<dyn Ledger>,
        attestation: Option<Arc<dyn AttestationVerifier>>,
        network: &'static str,
        token_decimals: u8,
        cache_capacity: usize,
    ) -> Self {
        Self {
            cache: Arc::new(VerificationCache::new(ledger.clone(), cache_capacity)),
            ledger,
            attestation,
            network,
            token_decimals,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Result<Self, ConfigError> {
        let ledger: Arc<dyn Ledger> = Arc::new(config.build_ledger()?);
        let attestation = config
            .build_attestation_verifier()?
            .map(|v| Arc::new(v) as Arc<dyn AttestationVerifier>);
        Ok(Self::new(
            ledger,
            attestation,
            config.network.key,
            config.token_decimals,
            config.cache_capacity,
        ))
    }
}
