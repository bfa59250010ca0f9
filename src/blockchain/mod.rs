// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Ledger integration.
//!
//! This module provides:
//! - The [`Ledger`] trait the workflow engine is written against
//! - An alloy-backed JSON-RPC implementation ([`EvmLedger`])
//! - Contract bindings, signer loading and amount conversion

pub mod client;
pub mod contracts;
pub mod ledger;
pub mod signing;
pub mod types;
pub mod units;

pub use client::{parse_address, EvmLedger, LedgerClientError, LedgerSettings};
pub use ledger::{ContractStats, Ledger, LinkArgs, LoanPhase, LoanRecord, TxHash, TxReceipt};
pub use types::*;
pub use units::{format_amount, format_bps, parse_amount, AmountError};
