// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Signer loading for ledger writes.
//!
//! The signing wallet is the borrower's connected wallet. Keys arrive either
//! as a raw hex string or as a PEM file (SEC1 or PKCS#8).

use std::path::PathBuf;

use alloy::signers::local::PrivateKeySigner;
use k256::SecretKey;

use super::client::LedgerClientError;

/// Where the signing key comes from.
#[derive(Debug, Clone)]
pub enum SignerSource {
    /// Hex-encoded private key, with or without `0x`
    Hex(String),
    /// Path to a PEM-encoded private key
    PemFile(PathBuf),
}

/// Load a signer from its configured source.
pub fn load_signer(source: &SignerSource) -> Result<PrivateKeySigner, LedgerClientError> {
    match source {
        SignerSource::Hex(hex_key) => signer_from_hex(hex_key),
        SignerSource::PemFile(path) => {
            let bytes = std::fs::read(path).map_err(|e| {
                LedgerClientError::InvalidPrivateKey(format!(
                    "Cannot read {}: {}",
                    path.display(),
                    e
                ))
            })?;
            signer_from_pem(&bytes)
        }
    }
}

/// Create a signer from a hex private key.
pub fn signer_from_hex(private_key_hex: &str) -> Result<PrivateKeySigner, LedgerClientError> {
    let trimmed = private_key_hex.trim();
    let key_bytes = alloy::hex::decode(trimmed.strip_prefix("0x").unwrap_or(trimmed))
        .map_err(|e| LedgerClientError::InvalidPrivateKey(e.to_string()))?;

    PrivateKeySigner::from_slice(&key_bytes)
        .map_err(|e| LedgerClientError::InvalidPrivateKey(e.to_string()))
}

/// Parse a private key from PEM format to hex string.
///
/// # Returns
/// * `Ok(String)` - Hex-encoded private key (64 characters, no 0x prefix)
/// * `Err(LedgerClientError)` - If PEM parsing fails
pub fn pem_to_hex(pem_bytes: &[u8]) -> Result<String, LedgerClientError> {
    let pem_str = std::str::from_utf8(pem_bytes)
        .map_err(|e| LedgerClientError::InvalidPrivateKey(format!("Invalid UTF-8: {}", e)))?;

    let pem = pem::parse(pem_str)
        .map_err(|e| LedgerClientError::InvalidPrivateKey(format!("Invalid PEM: {}", e)))?;

    let secret_key = SecretKey::from_sec1_der(pem.contents())
        .or_else(|_| {
            use k256::pkcs8::DecodePrivateKey;
            SecretKey::from_pkcs8_der(pem.contents())
        })
        .map_err(|e| LedgerClientError::InvalidPrivateKey(format!("Invalid key format: {}", e)))?;

    Ok(alloy::hex::encode(secret_key.to_bytes()))
}

/// Create a signer from a PEM-encoded private key.
pub fn signer_from_pem(pem_bytes: &[u8]) -> Result<PrivateKeySigner, LedgerClientError> {
    let hex_key = pem_to_hex(pem_bytes)?;
    signer_from_hex(&hex_key)
}
