// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Verification status cache.
//!
//! Memoizes the registry's "is this wallet linked" read for the lifetime of
//! the process. Entries are only ever written from a ledger read; callers
//! invalidate after a confirmed link and the next lookup reads through.

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

use alloy::primitives::Address;
use chrono::{DateTime, Utc};
use lru::LruCache;
use tracing::debug;

use super::error::EngineError;
use crate::blockchain::Ledger;

/// Default number of wallets remembered.
pub const DEFAULT_CAPACITY: usize = 16;

/// Linked status of one wallet, as last read from the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationStatus {
    pub wallet: Address,
    pub is_linked: bool,
    pub last_checked_at: DateTime<Utc>,
}

/// Read-through cache over the registry's linked-wallet lookup.
pub struct VerificationCache {
    ledger: Arc<dyn Ledger>,
    entries: Mutex<LruCache<Address, VerificationStatus>>,
}

impl VerificationCache {
    /// Create a cache holding at most `capacity` wallets. Wallets from
    /// earlier sessions fall out once capacity is reached.
    pub fn new(ledger: Arc<dyn Ledger>, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            ledger,
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Cached status, or a fresh registry read on miss.
    pub async fn check_status(&self, wallet: Address) -> Result<VerificationStatus, EngineError> {
        if let Some(status) = self.peek(wallet) {
            return Ok(status);
        }

        let is_linked = self.ledger.is_linked(wallet).await?;
        let status = VerificationStatus {
            wallet,
            is_linked,
            last_checked_at: Utc::now(),
        };
        debug!(wallet = %wallet, is_linked, "Verification status read from registry");

        if let Ok(mut entries) = self.entries.lock() {
            entries.put(wallet, status.clone());
        }
        Ok(status)
    }

    /// Cached status without touching the ledger.
    pub fn peek(&self, wallet: Address) -> Option<VerificationStatus> {
        let mut entries = self.entries.lock().ok()?;
        entries.get(&wallet).cloned()
    }

    /// Drop the cached entry so the next lookup reads the registry.
    pub fn invalidate(&self, wallet: Address) {
        if let Ok(mut entries) = self.entries.lock() {
            if entries.pop(&wallet).is_some() {
                debug!(wallet = %wallet, "Verification status invalidated");
            }
        }
    }

    /// Explicit re-check.
    pub async fn refresh(&self, wallet: Address) -> Result<VerificationStatus, EngineError> {
        self.invalidate(wallet);
        self.check_status(wallet).await
    }
}
