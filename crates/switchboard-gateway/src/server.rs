// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server built on axum.
//!
//! Sets up routes, middleware, and shared state for the gateway.

use std::sync::Arc;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};
use switchboard_core::{StorageAdapter, SwitchboardError, VoiceAgentApi};
use switchboard_ingest::WebhookDispatcher;
use switchboard_otp::OtpManager;
use switchboard_sync::SyncService;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::auth::{AuthConfig, auth_middleware};
use crate::handlers;

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct GatewayState {
    pub storage: Arc<dyn StorageAdapter>,
    pub dispatcher: Arc<WebhookDispatcher>,
    /// `None` when OTP is not wired (no SMS gateway configured).
    pub otp: Option<Arc<OtpManager>>,
    pub sync: Option<Arc<SyncService>>,
    /// Used to stream call recordings.
    pub voice_api: Option<Arc<dyn VoiceAgentApi>>,
    pub auth: AuthConfig,
    /// Process start time for uptime calculation.
    pub start_time: std::time::Instant,
}

/// Gateway server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Build the router.
///
/// - `GET /health` (public)
/// - `POST /webhooks/...` (webhook tokens checked by the dispatcher)
/// - `/api/...` (bearer token)
pub fn router(state: GatewayState) -> Router {
    let auth_state = state.auth.clone();

    let public_routes = Router::new()
        .route("/health", get(handlers::get_health))
        .with_state(state.clone());

    let webhook_routes = Router::new()
        .route("/webhooks/elevenlabs/call", post(handlers::post_voice_call))
        .route("/webhooks/elevenlabs/call-init", post(handlers::post_call_init))
        .route("/webhooks/builderbot/whatsapp", post(handlers::post_whatsapp))
        .route("/webhooks/twilio/sms/status", post(handlers::post_sms_status))
        .with_state(state.clone());

    let api_routes = Router::new()
        .route("/api/interactions", get(handlers::list_interactions))
        .route("/api/interactions/{id}", get(handlers::get_interaction))
        .route("/api/interactions/{id}/recording", get(handlers::get_recording))
        .route("/api/otp", post(handlers::create_otp))
        .route("/api/otp/verify", post(handlers::verify_otp))
        .route("/api/messages/sms", post(handlers::send_sms))
        .route("/api/messages/whatsapp", post(handlers::send_whatsapp))
        .route("/api/sync", post(handlers::trigger_sync))
        .route_layer(axum_middleware::from_fn_with_state(
            auth_state,
            auth_middleware,
        ))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(webhook_routes)
        .merge(api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Serve until `cancel` fires.
pub async fn start_server(
    config: &ServerConfig,
    state: GatewayState,
    cancel: CancellationToken,
) -> Result<(), SwitchboardError> {
    let app = router(state);
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| SwitchboardError::Config(format!("failed to bind gateway to {addr}: {e}")))?;

    tracing::info!("Gateway server listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await
        .map_err(|e| SwitchboardError::Internal(format!("gateway server error: {e}")))?;

    tracing::info!("Gateway server stopped");
    Ok(())
}
