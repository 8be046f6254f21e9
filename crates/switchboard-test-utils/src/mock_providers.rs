// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Recording vendor mocks for deterministic testing.
//!
//! Each mock captures what the back office sent it and can be switched into
//! a failing mode to exercise upstream-error paths.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::sync::Mutex;

use switchboard_core::types::{ConversationPage, ConversationQuery, ConversationSummary, SentMessage};
use switchboard_core::{MessagingBot, Provider, SmsGateway, SwitchboardError, VoiceAgentApi};

/// A scripted voice platform.
///
/// Conversations are listed in insertion order; `get_conversation` returns
/// the stored detail document.
#[derive(Default)]
pub struct MockVoiceApi {
    documents: Mutex<BTreeMap<String, Value>>,
    listed: Mutex<Vec<ConversationSummary>>,
    fail_detail: AtomicBool,
    detail_calls: AtomicUsize,
    queries: Mutex<Vec<ConversationQuery>>,
}

impl MockVoiceApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a conversation: listed with `summary`, detailed with `document`.
    pub async fn add_conversation(&self, conversation_id: &str, summary: Value, document: Value) {
        self.listed.lock().await.push(ConversationSummary {
            conversation_id: conversation_id.to_string(),
            raw: summary,
        });
        self.documents
            .lock()
            .await
            .insert(conversation_id.to_string(), document);
    }

    /// Make `get_conversation` fail with an upstream error.
    pub fn fail_detail(&self, fail: bool) {
        self.fail_detail.store(fail, Ordering::SeqCst);
    }

    pub fn detail_calls(&self) -> usize {
        self.detail_calls.load(Ordering::SeqCst)
    }

    /// Every list query received, in order.
    pub async fn queries(&self) -> Vec<ConversationQuery> {
        self.queries.lock().await.clone()
    }
}

#[async_trait]
impl VoiceAgentApi for MockVoiceApi {
    async fn get_conversation(&self, conversation_id: &str) -> Result<Value, SwitchboardError> {
        self.detail_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_detail.load(Ordering::SeqCst) {
            return Err(SwitchboardError::upstream(Provider::Elevenlabs, "HTTP 503"));
        }
        self.documents
            .lock()
            .await
            .get(conversation_id)
            .cloned()
            .ok_or_else(|| SwitchboardError::not_found("conversation", conversation_id))
    }

    async fn list_conversations(
        &self,
        query: &ConversationQuery,
    ) -> Result<ConversationPage, SwitchboardError> {
        self.queries.lock().await.push(query.clone());
        let listed = self.listed.lock().await;
        let start = query
            .cursor
            .as_deref()
            .and_then(|c| c.parse::<usize>().ok())
            .unwrap_or(0);
        let size = (query.page_size.max(1)) as usize;
        let end = (start + size).min(listed.len());
        let conversations = listed.get(start..end).map(<[_]>::to_vec).unwrap_or_default();
        let has_more = end < listed.len();
        Ok(ConversationPage {
            conversations,
            next_cursor: has_more.then(|| end.to_string()),
            has_more,
        })
    }

    async fn fetch_audio(&self, conversation_id: &str) -> Result<Vec<u8>, SwitchboardError> {
        if self.documents.lock().await.contains_key(conversation_id) {
            Ok(b"ID3mock-audio".to_vec())
        } else {
            Err(SwitchboardError::not_found("recording", conversation_id))
        }
    }
}

/// An outbound send captured by a mock.
#[derive(Debug, Clone, PartialEq)]
pub struct SentRecord {
    pub to: String,
    pub text: String,
    pub media_url: Option<String>,
    pub provider_message_id: String,
}

/// Shared capture and failure switch for the outbound mocks.
#[derive(Default)]
struct Outbox {
    sent: Mutex<Vec<SentRecord>>,
    fail: AtomicBool,
    seq: AtomicUsize,
}

impl Outbox {
    async fn push(
        &self,
        provider: Provider,
        prefix: &str,
        to: &str,
        text: &str,
        media_url: Option<&str>,
    ) -> Result<SentMessage, SwitchboardError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(SwitchboardError::upstream(provider, "HTTP 500: mock failure"));
        }
        let n = self.seq.fetch_add(1, Ordering::SeqCst) + 1;
        let id = format!("{prefix}{n:04}");
        self.sent.lock().await.push(SentRecord {
            to: to.to_string(),
            text: text.to_string(),
            media_url: media_url.map(str::to_string),
            provider_message_id: id.clone(),
        });
        Ok(SentMessage {
            provider_message_id: Some(id.clone()),
            status: Some("queued".to_string()),
            raw: json!({"sid": id, "status": "queued"}),
        })
    }
}

/// Captures SMS sends.
pub struct MockSmsGateway {
    from_number: String,
    outbox: Outbox,
}

impl MockSmsGateway {
    pub fn new(from_number: &str) -> Self {
        Self {
            from_number: from_number.to_string(),
            outbox: Outbox::default(),
        }
    }

    pub async fn sent_messages(&self) -> Vec<SentRecord> {
        self.outbox.sent.lock().await.clone()
    }

    pub async fn sent_count(&self) -> usize {
        self.outbox.sent.lock().await.len()
    }

    /// Make every send fail with an upstream error.
    pub fn fail_sends(&self, fail: bool) {
        self.outbox.fail.store(fail, Ordering::SeqCst);
    }
}

impl Default for MockSmsGateway {
    fn default() -> Self {
        Self::new("+15550001111")
    }
}

#[async_trait]
impl SmsGateway for MockSmsGateway {
    fn from_number(&self) -> &str {
        &self.from_number
    }

    async fn send_sms(&self, to: &str, body: &str) -> Result<SentMessage, SwitchboardError> {
        self.outbox.push(Provider::Twilio, "SM", to, body, None).await
    }
}

/// Captures WhatsApp sends.
pub struct MockMessagingBot {
    bot_number: String,
    outbox: Outbox,
}

impl MockMessagingBot {
    pub fn new(bot_number: &str) -> Self {
        Self {
            bot_number: bot_number.to_string(),
            outbox: Outbox::default(),
        }
    }

    pub async fn sent_messages(&self) -> Vec<SentRecord> {
        self.outbox.sent.lock().await.clone()
    }

    pub fn fail_sends(&self, fail: bool) {
        self.outbox.fail.store(fail, Ordering::SeqCst);
    }
}

impl Default for MockMessagingBot {
    fn default() -> Self {
        Self::new("5491100000000")
    }
}

#[async_trait]
impl MessagingBot for MockMessagingBot {
    fn bot_number(&self) -> &str {
        &self.bot_number
    }

    async fn send_message(
        &self,
        to: &str,
        text: &str,
        media_url: Option<&str>,
    ) -> Result<SentMessage, SwitchboardError> {
        self.outbox
            .push(Provider::Builderbot, "wamid.", to, text, media_url)
            .await
    }
}
