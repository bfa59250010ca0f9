// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! External collaborators reached over HTTP.

pub mod attestation;
pub mod prover;
pub mod relayer;

pub use attestation::{
    AttestationError, AttestationRequest, AttestationVerdict, AttestationVerifier,
    DisclosedClaims, HttpAttestationVerifier, VerificationPolicy,
};
pub use prover::{HttpIncomeProver, IncomeProof, IncomeProver, ProveRequest, ProverError};
pub use relayer::{HttpRelayer, JobStatus, Relayer, RelayerError};
