// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use alloy::primitives::Address;
use axum::{
    extract::{Path, Query, State},
    Json,
};

use crate::blockchain::parse_address;
use crate::error::ApiError;
use crate::models::{IdentityQuery, IdentityStatusResponse};
use crate::state::AppState;

pub(crate) fn wallet_param(raw: &str) -> Result<Address, ApiError> {
    parse_address(raw).map_err(|_| ApiError::bad_request(format!("Invalid wallet address: {raw}")))
}

/// Linked status of a wallet, served from the status cache.
#[utoipa::path(
    get,
    path = "/v1/identity/{address}",
    tag = "Identity",
    params(
        ("address" = String, Path, description = "Wallet address"),
        IdentityQuery
    ),
    responses(
        (status = 200, description = "Linked status", body = IdentityStatusResponse),
        (status = 400, description = "Invalid address"),
        (status = 500, description = "Ledger read failed")
    )
)]
pub async fn identity_status(
    State(state): State<AppState>,
    Path(address): Path<String>,
    Query(query): Query<IdentityQuery>,
) -> Result<Json<IdentityStatusResponse>, ApiError> {
    let wallet = wallet_param(&address)?;
    let status = if query.refresh {
        state.cache.refresh(wallet).await?
    } else {
        state.cache.check_status(wallet).await?
    };
    Ok(Json(status.into()))
}
