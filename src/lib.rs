// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Credora Loan Engine - Identity-Gated Loan Workflow Service
//!
//! Links a borrower wallet to a zero-knowledge identity proof (aggregated by
//! a relayer and anchored in an on-chain registry), then drives salary-tier
//! loan applications against the loan contract.
//!
//! ## Modules
//!
//! - `engine` - Proof sessions, aggregation, status cache, loan state machine
//! - `blockchain` - EVM ledger integration (alloy)
//! - `providers` - Relayer, attestation verifier and income prover clients
//! - `api` - HTTP attestation relay and read API (Axum)
//! - `config` - Environment configuration

pub mod api;
pub mod blockchain;
pub mod config;
pub mod engine;
pub mod error;
pub mod logging;
pub mod models;
pub mod providers;
pub mod state;

#[cfg(test)]
pub mod testing;
