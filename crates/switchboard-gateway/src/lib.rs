// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP gateway for Switchboard.
//!
//! Vendor webhooks land on `/webhooks/...` and are authenticated by the
//! dispatcher with per-provider shared secrets. The dashboard-facing REST
//! API lives under `/api/...` behind a static bearer token.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod server;

pub use auth::AuthConfig;
pub use error::ApiError;
pub use server::{GatewayState, ServerConfig, router, start_server};
