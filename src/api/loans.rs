// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    extract::{Path, State},
    Json,
};

use super::identity::wallet_param;
use crate::engine::{fetch_borrower_loans, EngineError, SalaryTier};
use crate::error::ApiError;
use crate::models::{configured_tier, BorrowerLoansResponse, LoanSummary, StatsResponse};
use crate::state::AppState;

/// Every loan recorded for a borrower.
#[utoipa::path(
    get,
    path = "/v1/loans/{address}",
    tag = "Loans",
    params(("address" = String, Path, description = "Borrower wallet address")),
    responses(
        (status = 200, description = "Borrower loans", body = BorrowerLoansResponse),
        (status = 400, description = "Invalid address")
    )
)]
pub async fn borrower_loans(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Result<Json<BorrowerLoansResponse>, ApiError> {
    let borrower = wallet_param(&address)?;
    let records = fetch_borrower_loans(state.ledger.as_ref(), borrower)
        .await
        .map_err(|e| ApiError::from_engine(e, state.token_decimals))?;

    Ok(Json(BorrowerLoansResponse {
        borrower: borrower.to_string(),
        has_open_loan: records.iter().any(|r| r.blocks_new_application()),
        loans: records
            .iter()
            .map(|r| LoanSummary::from_record(r, state.token_decimals))
            .collect(),
    }))
}

/// Loan contract counters and the configured tier table.
#[utoipa::path(
    get,
    path = "/v1/stats",
    tag = "Loans",
    responses(
        (status = 200, description = "Contract statistics", body = StatsResponse)
    )
)]
pub async fn contract_stats(State(state): State<AppState>) -> Result<Json<StatsResponse>, ApiError> {
    let stats = state
        .ledger
        .contract_stats()
        .await
        .map_err(EngineError::from)?;

    let mut tiers = Vec::with_capacity(SalaryTier::ALL.len());
    for tier in SalaryTier::ALL {
        let limit = state
            .ledger
            .tier_limit(tier.as_str())
            .await
            .map_err(EngineError::from)?;
        let rate = state
            .ledger
            .tier_rate(tier.as_str())
            .await
            .map_err(EngineError::from)?;
        tiers.extend(configured_tier(tier, limit, rate));
    }

    Ok(Json(StatsResponse::new(
        state.network,
        &stats,
        &tiers,
        state.token_decimals,
    )))
}
