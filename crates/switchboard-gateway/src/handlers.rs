// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers for webhooks and the REST API.

use std::str::FromStr;

use axum::{
    Json,
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, header::CONTENT_TYPE},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use switchboard_core::types::{CallDetail, Interaction, InteractionEvent, InteractionFilter, Message};
use switchboard_core::{Channel, InteractionStatus, Provider, SwitchboardError};
use switchboard_ingest::{OutboundMessage, SendReceipt, WebhookAck, WebhookSource};
use switchboard_normalize::form_to_json;
use switchboard_otp::{OtpCreated, OtpRequest, VerifyOutcome};
use switchboard_sync::SyncReport;

use crate::error::ApiError;
use crate::server::GatewayState;

/// Header carrying the per-provider webhook shared secret.
pub const WEBHOOK_TOKEN_HEADER: &str = "x-webhook-token";

const MAX_PAGE_LIMIT: i64 = 200;

fn webhook_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(WEBHOOK_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
}

fn parse_json(body: &Bytes) -> Result<Value, String> {
    serde_json::from_slice(body).map_err(|e| format!("invalid JSON body: {e}"))
}

fn ack_response(result: Result<WebhookAck, SwitchboardError>) -> Response {
    match result {
        Ok(ack) => (StatusCode::OK, Json(ack)).into_response(),
        Err(e) => ApiError(e).into_response(),
    }
}

/// Authenticate, then parse. Only a token failure is an HTTP error; an
/// unreadable body is acknowledged with `success: false`.
async fn accept_webhook(
    state: &GatewayState,
    source: WebhookSource,
    headers: &HeaderMap,
    parsed: Result<Value, String>,
) -> Result<Value, Response> {
    if let Err(e) = state.dispatcher.authenticate(source, webhook_token(headers)) {
        return Err(ApiError(e).into_response());
    }
    match parsed {
        Ok(payload) => Ok(payload),
        Err(error) => {
            let ack = state.dispatcher.reject_malformed(source, error).await;
            Err(ack_response(Ok(ack)))
        }
    }
}

// --- Health ---

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_secs: u64,
}

/// GET /health
pub async fn get_health(State(state): State<GatewayState>) -> Response {
    let healthy = state.storage.health_check().await.is_ok();
    let body = HealthResponse {
        status: if healthy { "ok" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: state.start_time.elapsed().as_secs(),
    };
    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(body)).into_response()
}

// --- Webhooks ---

/// POST /webhooks/elevenlabs/call
pub async fn post_voice_call(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let payload =
        match accept_webhook(&state, WebhookSource::Voice, &headers, parse_json(&body)).await {
            Ok(payload) => payload,
            Err(response) => return response,
        };
    ack_response(
        state
            .dispatcher
            .handle_voice_call(webhook_token(&headers), payload)
            .await,
    )
}

/// POST /webhooks/elevenlabs/call-init
///
/// An unreadable body is answered as an unknown caller.
pub async fn post_call_init(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Err(e) = state
        .dispatcher
        .authenticate(WebhookSource::Voice, webhook_token(&headers))
    {
        return ApiError(e).into_response();
    }
    let payload = parse_json(&body).unwrap_or_else(|error| {
        tracing::warn!(error = %error, "malformed call-init body");
        Value::Null
    });
    match state
        .dispatcher
        .handle_call_init(webhook_token(&headers), payload)
        .await
    {
        Ok(response) => Json(response).into_response(),
        Err(e) => ApiError(e).into_response(),
    }
}

/// POST /webhooks/builderbot/whatsapp
pub async fn post_whatsapp(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let payload =
        match accept_webhook(&state, WebhookSource::Whatsapp, &headers, parse_json(&body)).await {
            Ok(payload) => payload,
            Err(response) => return response,
        };
    ack_response(
        state
            .dispatcher
            .handle_whatsapp(webhook_token(&headers), payload)
            .await,
    )
}

/// POST /webhooks/twilio/sms/status
///
/// Accepts the vendor's form encoding as well as JSON.
pub async fn post_sms_status(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let is_json = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.contains("json"));
    let parsed = if is_json {
        parse_json(&body)
    } else {
        form_to_json(&String::from_utf8_lossy(&body)).map_err(|e| format!("invalid form body: {e}"))
    };
    let payload = match accept_webhook(&state, WebhookSource::SmsStatus, &headers, parsed).await {
        Ok(payload) => payload,
        Err(response) => return response,
    };
    ack_response(
        state
            .dispatcher
            .handle_sms_status(webhook_token(&headers), payload)
            .await,
    )
}

// --- Interactions ---

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub channel: Option<String>,
    pub status: Option<String>,
    pub provider: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

fn parse_filter<T: FromStr>(name: &str, raw: Option<&str>) -> Result<Option<T>, SwitchboardError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(value) => T::from_str(value)
            .map(Some)
            .map_err(|_| SwitchboardError::Validation(format!("unknown {name} `{value}`"))),
    }
}

impl ListParams {
    fn into_filter(self) -> Result<InteractionFilter, SwitchboardError> {
        let defaults = InteractionFilter::default();
        Ok(InteractionFilter {
            channel: parse_filter::<Channel>("channel", self.channel.as_deref())?,
            status: parse_filter::<InteractionStatus>("status", self.status.as_deref())?,
            provider: parse_filter::<Provider>("provider", self.provider.as_deref())?,
            limit: self.limit.unwrap_or(defaults.limit).clamp(1, MAX_PAGE_LIMIT),
            offset: self.offset.unwrap_or(0).max(0),
        })
    }
}

#[derive(Debug, Serialize)]
pub struct InteractionList {
    pub interactions: Vec<Interaction>,
    pub limit: i64,
    pub offset: i64,
}

/// GET /api/interactions
pub async fn list_interactions(
    State(state): State<GatewayState>,
    Query(params): Query<ListParams>,
) -> Result<Json<InteractionList>, ApiError> {
    let filter = params.into_filter()?;
    let interactions = state.storage.list_interactions(&filter).await?;
    Ok(Json(InteractionList {
        interactions,
        limit: filter.limit,
        offset: filter.offset,
    }))
}

/// One interaction with its sub-entities.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractionDetail {
    #[serde(flatten)]
    pub interaction: Interaction,
    pub events: Vec<InteractionEvent>,
    pub messages: Vec<Message>,
    pub call_detail: Option<CallDetail>,
}

/// GET /api/interactions/{id}
pub async fn get_interaction(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
) -> Result<Json<InteractionDetail>, ApiError> {
    let interaction = state
        .storage
        .get_interaction(&id)
        .await?
        .ok_or_else(|| SwitchboardError::not_found("interaction", &id))?;
    let events = state.storage.list_events(&id).await?;
    let messages = state.storage.list_messages(&id).await?;
    let call_detail = state.storage.get_call_detail(&id).await?;
    Ok(Json(InteractionDetail {
        interaction,
        events,
        messages,
        call_detail,
    }))
}

/// GET /api/interactions/{id}/recording
pub async fn get_recording(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let interaction = state
        .storage
        .get_interaction(&id)
        .await?
        .ok_or_else(|| SwitchboardError::not_found("interaction", &id))?;
    let conversation_id = interaction
        .provider_conversation_id
        .filter(|_| interaction.provider == Provider::Elevenlabs)
        .ok_or_else(|| SwitchboardError::not_found("recording", &id))?;
    let api = state
        .voice_api
        .as_ref()
        .ok_or_else(|| SwitchboardError::Config("voice API is not configured".into()))?;

    let audio = api.fetch_audio(&conversation_id).await?;
    Ok(([(CONTENT_TYPE, "audio/mpeg")], audio).into_response())
}

// --- OTP ---

/// POST /api/otp
pub async fn create_otp(
    State(state): State<GatewayState>,
    Json(request): Json<OtpRequest>,
) -> Result<(StatusCode, Json<OtpCreated>), ApiError> {
    let otp = state
        .otp
        .as_ref()
        .ok_or_else(|| SwitchboardError::Config("OTP is not configured".into()))?;
    let created = otp.create(request).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyRequest {
    pub correlation_id: String,
    pub code: String,
}

#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    pub success: bool,
    pub status: VerifyOutcome,
    pub message: &'static str,
}

fn verify_status(outcome: VerifyOutcome) -> StatusCode {
    match outcome {
        VerifyOutcome::Verified => StatusCode::OK,
        VerifyOutcome::Invalid => StatusCode::BAD_REQUEST,
        VerifyOutcome::Expired => StatusCode::GONE,
        VerifyOutcome::Locked => StatusCode::LOCKED,
    }
}

/// POST /api/otp/verify
///
/// Failed verifications are business outcomes and answer 4xx with a body,
/// never 5xx.
pub async fn verify_otp(
    State(state): State<GatewayState>,
    Json(request): Json<VerifyRequest>,
) -> Result<(StatusCode, Json<VerifyResponse>), ApiError> {
    if request.correlation_id.trim().is_empty() || request.code.trim().is_empty() {
        return Err(
            SwitchboardError::Validation("`correlationId` and `code` are required".into()).into(),
        );
    }
    let otp = state
        .otp
        .as_ref()
        .ok_or_else(|| SwitchboardError::Config("OTP is not configured".into()))?;
    let outcome = otp
        .verify(request.correlation_id.trim(), &request.code)
        .await?;
    Ok((
        verify_status(outcome),
        Json(VerifyResponse {
            success: outcome.is_verified(),
            status: outcome,
            message: outcome.message(),
        }),
    ))
}

// --- Outbound messages ---

/// POST /api/messages/sms
pub async fn send_sms(
    State(state): State<GatewayState>,
    Json(request): Json<OutboundMessage>,
) -> Result<(StatusCode, Json<SendReceipt>), ApiError> {
    let receipt = state.dispatcher.send_sms(&request).await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

/// POST /api/messages/whatsapp
pub async fn send_whatsapp(
    State(state): State<GatewayState>,
    Json(request): Json<OutboundMessage>,
) -> Result<(StatusCode, Json<SendReceipt>), ApiError> {
    let receipt = state.dispatcher.send_whatsapp(&request).await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

// --- Sync ---

#[derive(Debug, Default, Deserialize)]
pub struct SyncRequest {
    #[serde(default)]
    pub days: Option<i64>,
}

/// POST /api/sync
///
/// The body is optional; `{"days": N}` overrides the configured window.
pub async fn trigger_sync(
    State(state): State<GatewayState>,
    body: Bytes,
) -> Result<Json<SyncReport>, ApiError> {
    let request: SyncRequest = if body.iter().all(u8::is_ascii_whitespace) {
        SyncRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| SwitchboardError::Validation(format!("invalid sync request: {e}")))?
    };
    let sync = state
        .sync
        .as_ref()
        .ok_or_else(|| SwitchboardError::Config("sync is not configured".into()))?;
    Ok(Json(sync.run_full(request.days).await?))
}
