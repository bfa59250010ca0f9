// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    models::{
        BorrowerLoansResponse, IdentityStatusResponse, LoanPhaseDto, LoanSummary, StatsResponse,
        TierTermsResponse, VerifyRequest, VerifyResponse,
    },
    providers::DisclosedClaims,
    state::AppState,
};

pub mod health;
pub mod identity;
pub mod loans;
pub mod verify;

pub fn router(state: AppState) -> Router {
    let v1_routes = Router::new()
        .route("/identity/{address}", get(identity::identity_status))
        .route("/loans/{address}", get(loans::borrower_loans))
        .route("/stats", get(loans::contract_stats))
        .with_state(state.clone());

    let root_routes = Router::new()
        .route("/api/verify", post(verify::verify_attestation))
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .with_state(state);

    Router::new()
        .merge(root_routes)
        .nest("/v1", v1_routes)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(CorsLayer::permissive())
}

#[derive(OpenApi)]
#[openapi(
    paths(
        verify::verify_attestation,
        health::health,
        health::liveness,
        identity::identity_status,
        loans::borrower_loans,
        loans::contract_stats
    ),
    components(
        schemas(
            VerifyRequest,
            VerifyResponse,
            DisclosedClaims,
            IdentityStatusResponse,
            LoanPhaseDto,
            LoanSummary,
            BorrowerLoansResponse,
            TierTermsResponse,
            StatsResponse,
            health::ReadyResponse,
            health::HealthChecks,
            health::HealthResponse
        )
    ),
    tags(
        (name = "Verification", description = "Identity attestation relay"),
        (name = "Identity", description = "Wallet link status"),
        (name = "Loans", description = "Borrower loans and contract terms"),
        (name = "Health", description = "Liveness and dependency checks")
    )
)]
struct ApiDoc;
