// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-provider webhook handlers and primary outbound sends.
//!
//! Every inbound delivery goes `received -> authenticated -> normalized ->
//! deduplicated -> persisted -> audited -> acknowledged`. Only an
//! authentication failure is returned as an error; anything that goes wrong
//! after that is recorded and acknowledged with `success: false` so the
//! vendor does not retry a delivery that was already received.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use switchboard_core::phone::normalize_phone;
use switchboard_core::types::{
    ActorType, AuditEntry, Channel, Direction, InteractionEvent, InteractionPatch,
    InteractionStatus, InteractionUpsert, MessageDeliveryUpdate, NewEvent, NewMessage, Provider,
    SentMessage, UNKNOWN_PARTY,
};
use switchboard_core::{
    Clock, MessagingBot, SmsGateway, StorageAdapter, SwitchboardError, VoiceAgentApi,
};
use switchboard_normalize::{
    DeliveryState, SmsStatusUpdate, VoiceCall, WhatsappMessage, normalize_call_init,
    normalize_sms_status, normalize_voice, normalize_whatsapp,
};
use tracing::{debug, error, info, warn};

use crate::auth::{TokenPolicy, WebhookSecrets, check_token};
use crate::error::SoftError;
use crate::idempotency::idempotency_key;
use crate::reconcile::reconcile_voice_call;

/// Acknowledgement returned to the webhook caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookAck {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interaction_id: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub duplicate: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl WebhookAck {
    fn duplicate_of(interaction_id: String) -> Self {
        Self {
            success: true,
            interaction_id: Some(interaction_id),
            duplicate: true,
            error: None,
        }
    }

    fn ignored() -> Self {
        Self {
            success: true,
            interaction_id: None,
            duplicate: false,
            error: None,
        }
    }

    fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            interaction_id: None,
            duplicate: false,
            error: Some(error.into()),
        }
    }
}

/// Dynamic variables returned when a voice call starts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CallInitResponse {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub dynamic_variables: CallInitVariables,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CallInitVariables {
    pub caller_id: String,
    pub previous_interactions: usize,
    pub last_outcome: String,
}

/// A primary outbound send requested through the API.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboundMessage {
    pub to: String,
    pub text: String,
    #[serde(default)]
    pub media_url: Option<String>,
    #[serde(default)]
    pub customer_ref: Option<String>,
}

/// What a successful outbound send created.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendReceipt {
    pub interaction_id: String,
    pub message_id: String,
    pub provider_message_id: Option<String>,
    pub status: Option<String>,
}

/// The inbound webhook families, each with its own secret and audit action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookSource {
    Voice,
    Whatsapp,
    SmsStatus,
}

impl WebhookSource {
    fn label(self) -> &'static str {
        match self {
            Self::Voice => "voice",
            Self::Whatsapp => "whatsapp",
            Self::SmsStatus => "sms",
        }
    }

    fn action(self) -> &'static str {
        match self {
            Self::Voice => "webhook.voice_call",
            Self::Whatsapp => "webhook.whatsapp",
            Self::SmsStatus => "webhook.sms_status",
        }
    }

    fn provider(self) -> Provider {
        match self {
            Self::Voice => Provider::Elevenlabs,
            Self::Whatsapp => Provider::Builderbot,
            Self::SmsStatus => Provider::Twilio,
        }
    }

    /// Status callbacks may arrive without a token; the others may not.
    fn policy(self) -> TokenPolicy {
        match self {
            Self::SmsStatus => TokenPolicy::WhenPresent,
            Self::Voice | Self::Whatsapp => TokenPolicy::Required,
        }
    }
}

/// Outcome of the persistence phase of one delivery.
struct Processed {
    interaction_id: Option<String>,
    duplicate: bool,
    detail: Value,
}

/// Routes each provider's deliveries through the shared pipeline.
pub struct WebhookDispatcher {
    storage: Arc<dyn StorageAdapter>,
    secrets: WebhookSecrets,
    clock: Arc<dyn Clock>,
    voice_api: Option<Arc<dyn VoiceAgentApi>>,
    sms_gateway: Option<Arc<dyn SmsGateway>>,
    messaging_bot: Option<Arc<dyn MessagingBot>>,
    bot_number: Option<String>,
}

impl WebhookDispatcher {
    pub fn new(
        storage: Arc<dyn StorageAdapter>,
        secrets: WebhookSecrets,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            storage,
            secrets,
            clock,
            voice_api: None,
            sms_gateway: None,
            messaging_bot: None,
            bot_number: None,
        }
    }

    /// Enables best-effort enrichment of thin voice webhooks.
    pub fn with_voice_api(mut self, api: Arc<dyn VoiceAgentApi>) -> Self {
        self.voice_api = Some(api);
        self
    }

    pub fn with_sms_gateway(mut self, gateway: Arc<dyn SmsGateway>) -> Self {
        self.sms_gateway = Some(gateway);
        self
    }

    pub fn with_messaging_bot(mut self, bot: Arc<dyn MessagingBot>) -> Self {
        let number = normalize_phone(bot.bot_number());
        self.bot_number = (!number.is_empty()).then_some(number);
        self.messaging_bot = Some(bot);
        self
    }

    pub fn storage(&self) -> &Arc<dyn StorageAdapter> {
        &self.storage
    }

    // --- Inbound webhooks ---

    /// Check a delivery's token. Runs before the body is parsed.
    pub fn authenticate(
        &self,
        source: WebhookSource,
        token: Option<&str>,
    ) -> Result<(), SwitchboardError> {
        let secret = match source {
            WebhookSource::Voice => self.secrets.voice.as_deref(),
            WebhookSource::Whatsapp => self.secrets.whatsapp.as_deref(),
            WebhookSource::SmsStatus => self.secrets.sms.as_deref(),
        };
        check_token(source.label(), source.policy(), secret, token)
    }

    /// Record an authenticated delivery whose body could not be parsed.
    pub async fn reject_malformed(&self, source: WebhookSource, error: String) -> WebhookAck {
        warn!(action = source.action(), error = %error, "malformed webhook body");
        let mut entry = AuditEntry::new(ActorType::Webhook, source.action(), "interaction")
            .metadata(json!({"success": false, "error": &error, "malformed": true}));
        entry.actor_id = Some(source.provider().to_string());
        self.audit_quietly(entry).await;
        WebhookAck::failed(error)
    }

    /// Post-call voice webhook.
    pub async fn handle_voice_call(
        &self,
        token: Option<&str>,
        payload: Value,
    ) -> Result<WebhookAck, SwitchboardError> {
        self.authenticate(WebhookSource::Voice, token)?;
        let call = normalize_voice(&payload);
        let key = idempotency_key(
            Provider::Elevenlabs,
            call.event_id.as_deref(),
            call.conversation_id.as_deref(),
            call.event_type.as_deref(),
            &payload,
        );

        let result = match self.prior_delivery(&key).await {
            Ok(Some(prior)) => return Ok(WebhookAck::duplicate_of(prior.interaction_id)),
            Ok(None) => self.ingest_voice(call, &key, &payload).await,
            Err(e) => Err(e),
        };
        Ok(self
            .acknowledge(WebhookSource::Voice, &key, result)
            .await)
    }

    /// WhatsApp bot webhook. Only `message.incoming` is processed.
    pub async fn handle_whatsapp(
        &self,
        token: Option<&str>,
        payload: Value,
    ) -> Result<WebhookAck, SwitchboardError> {
        self.authenticate(WebhookSource::Whatsapp, token)?;
        let message = normalize_whatsapp(&payload, self.clock.now());
        if !message.is_incoming() {
            debug!(event = ?message.event_name, "ignoring non-message whatsapp event");
            return Ok(WebhookAck::ignored());
        }
        let key = idempotency_key(
            Provider::Builderbot,
            message.event_id.as_deref().or(message.message_id.as_deref()),
            None,
            None,
            &payload,
        );

        let result = match self.prior_delivery(&key).await {
            Ok(Some(prior)) => return Ok(WebhookAck::duplicate_of(prior.interaction_id)),
            Ok(None) => self.ingest_whatsapp(message, &key, &payload).await,
            Err(e) => Err(e),
        };
        Ok(self
            .acknowledge(WebhookSource::Whatsapp, &key, result)
            .await)
    }

    /// SMS delivery-status callback.
    pub async fn handle_sms_status(
        &self,
        token: Option<&str>,
        payload: Value,
    ) -> Result<WebhookAck, SwitchboardError> {
        self.authenticate(WebhookSource::SmsStatus, token)?;
        let update = normalize_sms_status(&payload);
        let key = idempotency_key(
            Provider::Twilio,
            None,
            update.message_sid.as_deref(),
            update.status.as_deref(),
            &payload,
        );

        let result = match self.prior_delivery(&key).await {
            Ok(Some(prior)) => return Ok(WebhookAck::duplicate_of(prior.interaction_id)),
            Ok(None) => self.ingest_sms_status(update, &key, &payload).await,
            Err(e) => Err(e),
        };
        Ok(self
            .acknowledge(WebhookSource::SmsStatus, &key, result)
            .await)
    }

    /// Call-start lookup returning templating variables for the voice agent.
    ///
    /// History lookup is best-effort: a storage failure yields empty history.
    pub async fn handle_call_init(
        &self,
        token: Option<&str>,
        payload: Value,
    ) -> Result<CallInitResponse, SwitchboardError> {
        self.authenticate(WebhookSource::Voice, token)?;
        let init = normalize_call_init(&payload);

        let mut previous_interactions = 0;
        let mut last_outcome = None;
        if let Some(caller) = &init.caller_id {
            match self.storage.list_interactions_from(caller, 20).await {
                Ok(history) => {
                    previous_interactions = history.len();
                    last_outcome = history.iter().find_map(|i| i.outcome);
                }
                Err(e) => warn!(error = %e, "caller history lookup failed"),
            }
        }

        Ok(CallInitResponse {
            kind: "conversation_initiation_client_data",
            dynamic_variables: CallInitVariables {
                caller_id: init.caller_id.unwrap_or_else(|| UNKNOWN_PARTY.to_string()),
                previous_interactions,
                last_outcome: last_outcome
                    .map(|o| o.to_string())
                    .unwrap_or_else(|| "NONE".to_string()),
            },
        })
    }

    // --- Outbound sends ---

    /// Send an SMS. Upstream failures mark the interaction FAILED and propagate.
    pub async fn send_sms(&self, request: &OutboundMessage) -> Result<SendReceipt, SwitchboardError> {
        validate_outbound(request)?;
        let gateway = self
            .sms_gateway
            .as_ref()
            .ok_or_else(|| SwitchboardError::Config("SMS gateway is not configured".into()))?;
        let from = normalize_phone(gateway.from_number());
        let interaction_id = self
            .open_outbound(Provider::Twilio, Channel::Sms, from, request)
            .await?;
        let sent = gateway.send_sms(&request.to, &request.text).await;
        self.record_outbound(Provider::Twilio, Channel::Sms, interaction_id, request, sent)
            .await
    }

    /// Send a WhatsApp message through the bot.
    pub async fn send_whatsapp(
        &self,
        request: &OutboundMessage,
    ) -> Result<SendReceipt, SwitchboardError> {
        validate_outbound(request)?;
        let bot = self.messaging_bot.as_ref().ok_or_else(|| {
            SwitchboardError::Config("WhatsApp bot is not configured".into())
        })?;
        let from = self
            .bot_number
            .clone()
            .unwrap_or_else(|| UNKNOWN_PARTY.to_string());
        let interaction_id = self
            .open_outbound(Provider::Builderbot, Channel::Whatsapp, from, request)
            .await?;
        let to = normalize_phone(&request.to);
        let sent = bot
            .send_message(&to, &request.text, request.media_url.as_deref())
            .await;
        self.record_outbound(
            Provider::Builderbot,
            Channel::Whatsapp,
            interaction_id,
            request,
            sent,
        )
        .await
    }

    // --- Pipeline stages ---

    async fn prior_delivery(&self, key: &str) -> Result<Option<InteractionEvent>, SwitchboardError> {
        let prior = self.storage.find_event_by_idempotency_key(key).await?;
        if let Some(event) = &prior {
            info!(
                idempotency_key = %key,
                interaction_id = %event.interaction_id,
                "duplicate webhook delivery, returning prior result"
            );
        }
        Ok(prior)
    }

    async fn ingest_voice(
        &self,
        mut call: VoiceCall,
        key: &str,
        raw: &Value,
    ) -> Result<Processed, SwitchboardError> {
        let mut enrichment_error = None;
        if call.needs_enrichment() {
            if let Some(conversation_id) = call.conversation_id.clone() {
                match self.enrich_voice(&conversation_id).await {
                    Ok(Some(fetched)) => call.fill_from(fetched),
                    Ok(None) => {}
                    Err(soft) => {
                        warn!(
                            conversation_id = %conversation_id,
                            error = %soft,
                            "enrichment failed, continuing with webhook data"
                        );
                        enrichment_error = Some(soft.to_string());
                    }
                }
            }
        }

        let interaction = reconcile_voice_call(self.storage.as_ref(), &call).await?;
        let event = NewEvent {
            interaction_id: interaction.id.clone(),
            event_type: call
                .event_type
                .clone()
                .unwrap_or_else(|| "voice.call".to_string()),
            provider: Provider::Elevenlabs,
            provider_event_id: call.event_id.clone(),
            idempotency_key: Some(key.to_string()),
            payload: json!({
                "raw": raw,
                "normalized": &call,
                "enrichmentError": &enrichment_error,
            }),
        };
        let created = self.storage.create_event(&event).await?;

        Ok(Processed {
            interaction_id: Some(interaction.id),
            duplicate: created.is_none(),
            detail: json!({
                "conversationId": call.conversation_id,
                "enrichmentError": enrichment_error,
            }),
        })
    }

    /// Fetch the full conversation document. `Ok(None)` when no API is configured.
    async fn enrich_voice(&self, conversation_id: &str) -> Result<Option<VoiceCall>, SoftError> {
        let Some(api) = &self.voice_api else {
            return Ok(None);
        };
        let document = api
            .get_conversation(conversation_id)
            .await
            .map_err(|e| SoftError::new("voice enrichment", e))?;
        Ok(Some(normalize_voice(&document)))
    }

    async fn ingest_whatsapp(
        &self,
        message: WhatsappMessage,
        key: &str,
        raw: &Value,
    ) -> Result<Processed, SwitchboardError> {
        let from = message
            .from
            .clone()
            .unwrap_or_else(|| UNKNOWN_PARTY.to_string());
        let to = message
            .to
            .clone()
            .or_else(|| self.bot_number.clone())
            .unwrap_or_else(|| UNKNOWN_PARTY.to_string());
        let interaction = self
            .storage
            .upsert_interaction(&InteractionUpsert {
                provider: Provider::Builderbot,
                channel: Channel::Whatsapp,
                direction: Direction::Inbound,
                provider_conversation_id: None,
                from_number: from.clone(),
                to_number: to,
                fields: InteractionPatch::status(InteractionStatus::InProgress),
            })
            .await?;

        // The event row claims the delivery before the message is written.
        let claimed = self
            .storage
            .create_event(&NewEvent {
                interaction_id: interaction.id.clone(),
                event_type: message
                    .event_name
                    .clone()
                    .unwrap_or_else(|| "message.incoming".to_string()),
                provider: Provider::Builderbot,
                provider_event_id: message.event_id.clone().or(message.message_id.clone()),
                idempotency_key: Some(key.to_string()),
                payload: json!({"raw": raw, "normalized": &message}),
            })
            .await?;
        if claimed.is_none() {
            return Ok(Processed {
                interaction_id: Some(interaction.id),
                duplicate: true,
                detail: json!({"from": from}),
            });
        }

        let stored = self
            .storage
            .create_message(&NewMessage {
                interaction_id: interaction.id.clone(),
                channel: Channel::Whatsapp,
                direction: Direction::Inbound,
                provider_message_id: message.message_id.clone(),
                text: message.body.clone(),
                media_url: message.media_url.clone(),
                provider_status: Some("received".to_string()),
                sent_at: Some(message.timestamp),
            })
            .await?;

        Ok(Processed {
            interaction_id: Some(interaction.id),
            duplicate: false,
            detail: json!({"from": from, "messageId": stored.id}),
        })
    }

    async fn ingest_sms_status(
        &self,
        update: SmsStatusUpdate,
        key: &str,
        raw: &Value,
    ) -> Result<Processed, SwitchboardError> {
        let Some(sid) = update.message_sid.clone() else {
            return Err(SwitchboardError::Validation(
                "status callback carries no message sid".into(),
            ));
        };
        let Some(message) = self.storage.find_message_by_provider_id(&sid).await? else {
            info!(message_sid = %sid, "status callback for unknown message");
            return Ok(Processed {
                interaction_id: None,
                duplicate: false,
                detail: json!({"messageSid": sid, "status": update.status, "matched": false}),
            });
        };

        let claimed = self
            .storage
            .create_event(&NewEvent {
                interaction_id: message.interaction_id.clone(),
                event_type: "sms.status".to_string(),
                provider: Provider::Twilio,
                provider_event_id: None,
                idempotency_key: Some(key.to_string()),
                payload: json!({"raw": raw, "normalized": &update}),
            })
            .await?;
        if claimed.is_none() {
            return Ok(Processed {
                interaction_id: Some(message.interaction_id),
                duplicate: true,
                detail: json!({"messageSid": sid}),
            });
        }

        let now = self.clock.now();
        if let (Some(status), Some(state)) = (&update.status, update.state) {
            self.storage
                .update_message_delivery(
                    &message.id,
                    &MessageDeliveryUpdate {
                        provider_status: status.clone(),
                        delivered_at: (state == DeliveryState::Delivered).then_some(now),
                        read_at: (state == DeliveryState::Read).then_some(now),
                    },
                )
                .await?;

            let terminal = match state {
                DeliveryState::Delivered | DeliveryState::Read => Some(InteractionStatus::Completed),
                DeliveryState::Failed => Some(InteractionStatus::Failed),
                DeliveryState::Pending => None,
            };
            if let Some(status) = terminal {
                self.storage
                    .patch_interaction(
                        &message.interaction_id,
                        &InteractionPatch::finished(status, None, now),
                    )
                    .await?;
            }
        }

        Ok(Processed {
            interaction_id: Some(message.interaction_id),
            duplicate: false,
            detail: json!({
                "messageSid": sid,
                "messageId": message.id,
                "status": update.status,
                "matched": true,
            }),
        })
    }

    /// Audit the delivery and build the acknowledgement. Audit failures are
    /// logged, never surfaced.
    async fn acknowledge(
        &self,
        source: WebhookSource,
        key: &str,
        result: Result<Processed, SwitchboardError>,
    ) -> WebhookAck {
        let action = source.action();
        let (ack, mut entry) = match result {
            Ok(done) => {
                let mut metadata = json!({
                    "success": true,
                    "idempotencyKey": key,
                    "duplicate": done.duplicate,
                });
                merge_into(&mut metadata, done.detail);
                let mut entry = AuditEntry::new(ActorType::Webhook, action, "interaction")
                    .metadata(metadata);
                entry.entity_id = done.interaction_id.clone();
                let ack = WebhookAck {
                    success: true,
                    interaction_id: done.interaction_id,
                    duplicate: done.duplicate,
                    error: None,
                };
                (ack, entry)
            }
            Err(err) => {
                error!(action, idempotency_key = %key, error = %err, "webhook processing failed");
                let entry = AuditEntry::new(ActorType::Webhook, action, "interaction").metadata(
                    json!({"success": false, "idempotencyKey": key, "error": err.to_string()}),
                );
                (WebhookAck::failed(err.to_string()), entry)
            }
        };
        entry.actor_id = Some(source.provider().to_string());
        self.audit_quietly(entry).await;
        ack
    }

    async fn open_outbound(
        &self,
        provider: Provider,
        channel: Channel,
        from: String,
        request: &OutboundMessage,
    ) -> Result<String, SwitchboardError> {
        let interaction = self
            .storage
            .upsert_interaction(&InteractionUpsert {
                provider,
                channel,
                direction: Direction::Outbound,
                provider_conversation_id: None,
                from_number: from,
                to_number: normalize_phone(&request.to),
                fields: InteractionPatch {
                    status: Some(InteractionStatus::InProgress),
                    customer_ref: request.customer_ref.clone(),
                    ..InteractionPatch::default()
                },
            })
            .await?;
        Ok(interaction.id)
    }

    async fn record_outbound(
        &self,
        provider: Provider,
        channel: Channel,
        interaction_id: String,
        request: &OutboundMessage,
        sent: Result<SentMessage, SwitchboardError>,
    ) -> Result<SendReceipt, SwitchboardError> {
        let action = format!("message.{}.send", channel.to_string().to_ascii_lowercase());
        let now = self.clock.now();

        let sent = match sent {
            Ok(sent) => sent,
            Err(err) => {
                error!(interaction_id = %interaction_id, error = %err, "outbound send failed");
                if let Err(e) = self
                    .storage
                    .patch_interaction(
                        &interaction_id,
                        &InteractionPatch::finished(InteractionStatus::Failed, None, now),
                    )
                    .await
                {
                    warn!(error = %e, "failed to mark interaction failed");
                }
                self.audit_quietly(
                    AuditEntry::new(ActorType::Api, action, "interaction")
                        .entity(interaction_id)
                        .metadata(json!({"success": false, "error": err.to_string()})),
                )
                .await;
                return Err(err);
            }
        };

        let message = self
            .storage
            .create_message(&NewMessage {
                interaction_id: interaction_id.clone(),
                channel,
                direction: Direction::Outbound,
                provider_message_id: sent.provider_message_id.clone(),
                text: Some(request.text.clone()),
                media_url: request.media_url.clone(),
                provider_status: sent.status.clone(),
                sent_at: Some(now),
            })
            .await?;
        self.storage
            .create_event(&NewEvent {
                interaction_id: interaction_id.clone(),
                event_type: format!("{}.sent", channel.to_string().to_ascii_lowercase()),
                provider,
                provider_event_id: sent.provider_message_id.clone(),
                idempotency_key: None,
                payload: json!({"response": sent.raw, "messageId": message.id}),
            })
            .await?;
        self.audit_quietly(
            AuditEntry::new(ActorType::Api, action, "interaction")
                .entity(interaction_id.clone())
                .metadata(json!({
                    "success": true,
                    "messageId": message.id,
                    "providerMessageId": sent.provider_message_id,
                })),
        )
        .await;

        Ok(SendReceipt {
            interaction_id,
            message_id: message.id,
            provider_message_id: sent.provider_message_id,
            status: sent.status,
        })
    }

    async fn audit_quietly(&self, entry: AuditEntry) {
        if let Err(e) = self.storage.append_audit(&entry).await {
            warn!(action = %entry.action, error = %e, "failed to write audit entry");
        }
    }
}

fn validate_outbound(request: &OutboundMessage) -> Result<(), SwitchboardError> {
    if normalize_phone(&request.to).is_empty() {
        return Err(SwitchboardError::Validation("`to` is required".into()));
    }
    if request.text.trim().is_empty() {
        return Err(SwitchboardError::Validation("`text` is required".into()));
    }
    Ok(())
}

/// Shallow-merge the keys of `extra` into `target` (both objects).
fn merge_into(target: &mut Value, extra: Value) {
    if let (Value::Object(target), Value::Object(extra)) = (target, extra) {
        target.extend(extra);
    }
}
