// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::error;

use crate::engine::EngineError;

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unprocessable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, message)
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, message)
    }

    pub fn bad_gateway(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_GATEWAY, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    /// Map an engine error, rendering rejection amounts for a token with
    /// `decimals`.
    pub fn from_engine(err: EngineError, decimals: u8) -> Self {
        match err {
            EngineError::Rejected(reason) => Self::unprocessable(reason.describe(decimals)),
            other => other.into(),
        }
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        match &err {
            EngineError::Rejected(reason) => Self::unprocessable(reason.to_string()),
            EngineError::UnverifiedLoanId(_) => Self::bad_request(err.to_string()),
            EngineError::DuplicateSubmission(_) => Self::new(StatusCode::CONFLICT, err.to_string()),
            EngineError::WalletDisconnected => Self::service_unavailable(err.to_string()),
            EngineError::Timeout { .. } => Self::new(StatusCode::GATEWAY_TIMEOUT, err.to_string()),
            EngineError::Relayer(_)
            | EngineError::LedgerRevert { .. }
            | EngineError::EventDecodeFailure(_)
            | EngineError::InvalidReceipt(_) => Self::bad_gateway(err.to_string()),
            EngineError::ProofUnavailable(_)
            | EngineError::UnauthorizedSigner(_)
            | EngineError::Unknown(_) => {
                error!(error = %err, "Engine failure");
                Self::internal(err.to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            error: self.message,
        });
        (self.status, body).into_response()
    }
}
