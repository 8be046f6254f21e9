// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mapping from [`SwitchboardError`] to HTTP responses.

use axum::{
    Json,
    http::{HeaderValue, StatusCode, header::RETRY_AFTER},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use switchboard_core::SwitchboardError;

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

/// Handler error wrapper.
#[derive(Debug)]
pub struct ApiError(pub SwitchboardError);

impl From<SwitchboardError> for ApiError {
    fn from(err: SwitchboardError) -> Self {
        Self(err)
    }
}

pub fn status_for(err: &SwitchboardError) -> StatusCode {
    match err {
        SwitchboardError::Authentication(_) => StatusCode::UNAUTHORIZED,
        SwitchboardError::Validation(_) => StatusCode::BAD_REQUEST,
        SwitchboardError::NotFound { .. } => StatusCode::NOT_FOUND,
        SwitchboardError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
        SwitchboardError::Conflict(_) => StatusCode::CONFLICT,
        SwitchboardError::Upstream { .. } => StatusCode::BAD_GATEWAY,
        SwitchboardError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        SwitchboardError::Config(_)
        | SwitchboardError::Storage { .. }
        | SwitchboardError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self.0, "request failed");
            "internal server error".to_string()
        } else {
            tracing::debug!(error = %self.0, status = status.as_u16(), "request rejected");
            self.0.to_string()
        };

        let mut response = (
            status,
            Json(ErrorResponse {
                success: false,
                error: message,
            }),
        )
            .into_response();
        if let SwitchboardError::RateLimited { retry_after_secs } = self.0 {
            response
                .headers_mut()
                .insert(RETRY_AFTER, HeaderValue::from(retry_after_secs));
        }
        response
    }
}
