// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Switchboard back office.

use thiserror::Error;

use crate::types::Provider;

/// The primary error type used across all Switchboard crates.
#[derive(Debug, Error)]
pub enum SwitchboardError {
    /// Configuration errors (invalid TOML, missing credentials, bad values).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Missing or mismatched webhook token / API bearer token.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// A required field is missing or malformed in a client request.
    #[error("validation error: {0}")]
    Validation(String),

    /// The requested entity does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Too many requests inside a rate-limit window.
    #[error("rate limit exceeded, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    /// Duplicate create of a uniquely keyed entity.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Vendor API returned non-2xx or the network call failed.
    #[error("{provider} upstream error: {message}")]
    Upstream {
        provider: Provider,
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl SwitchboardError {
    /// Shorthand for a storage error wrapping any boxed error source.
    pub fn storage<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        SwitchboardError::Storage {
            source: Box::new(err),
        }
    }

    /// Shorthand for an upstream error without an underlying source.
    pub fn upstream(provider: Provider, message: impl Into<String>) -> Self {
        SwitchboardError::Upstream {
            provider,
            message: message.into(),
            source: None,
        }
    }

    /// Shorthand for a not-found error.
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        SwitchboardError::NotFound {
            entity,
            id: id.into(),
        }
    }
}
