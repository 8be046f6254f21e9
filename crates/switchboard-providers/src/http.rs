// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shared reqwest plumbing: client construction and error mapping.

use std::time::Duration;

use reqwest::header::HeaderMap;
use switchboard_core::{Provider, SwitchboardError};

/// Longest error body carried into an error message.
const MAX_ERROR_BODY: usize = 512;

/// Build a client with default headers and a bounded request timeout.
pub(crate) fn build_client(
    provider: Provider,
    headers: HeaderMap,
    timeout: Duration,
) -> Result<reqwest::Client, SwitchboardError> {
    reqwest::Client::builder()
        .default_headers(headers)
        .timeout(timeout)
        .build()
        .map_err(|e| SwitchboardError::Upstream {
            provider,
            message: format!("failed to build HTTP client: {e}"),
            source: Some(Box::new(e)),
        })
}

/// Map a transport failure. Timeouts keep their own variant.
pub(crate) fn transport_error(
    provider: Provider,
    timeout: Duration,
    err: reqwest::Error,
) -> SwitchboardError {
    if err.is_timeout() {
        return SwitchboardError::Timeout { duration: timeout };
    }
    SwitchboardError::Upstream {
        provider,
        message: format!("HTTP request failed: {err}"),
        source: Some(Box::new(err)),
    }
}

/// Turn a non-2xx response into an `Upstream` error carrying status and body.
pub(crate) async fn status_error(provider: Provider, response: reqwest::Response) -> SwitchboardError {
    let status = response.status();
    let mut body = response.text().await.unwrap_or_default();
    if body.len() > MAX_ERROR_BODY {
        let cut = (0..=MAX_ERROR_BODY)
            .rev()
            .find(|i| body.is_char_boundary(*i))
            .unwrap_or(0);
        body.truncate(cut);
    }
    SwitchboardError::upstream(provider, format!("API returned {status}: {body}"))
}

/// Status codes worth one more attempt on idempotent requests.
pub(crate) fn is_transient_error(status: reqwest::StatusCode) -> bool {
    matches!(status.as_u16(), 429 | 500 | 502 | 503)
}

/// Decode a JSON response body.
pub(crate) async fn read_json<T: serde::de::DeserializeOwned>(
    provider: Provider,
    response: reqwest::Response,
) -> Result<T, SwitchboardError> {
    let body = response.text().await.map_err(|e| SwitchboardError::Upstream {
        provider,
        message: format!("failed to read response body: {e}"),
        source: Some(Box::new(e)),
    })?;
    serde_json::from_str(&body).map_err(|e| SwitchboardError::Upstream {
        provider,
        message: format!("failed to parse API response: {e}"),
        source: Some(Box::new(e)),
    })
}
