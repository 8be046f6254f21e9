// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Outbound vendor API traits.
//!
//! Each vendor client is an opaque network collaborator; these traits are the
//! seams the dispatcher, OTP worker, and sync scheduler depend on.

use async_trait::async_trait;

use crate::error::SwitchboardError;
use crate::types::{ConversationPage, ConversationQuery, Provider, SentMessage};

/// Voice-AI platform REST API.
#[async_trait]
pub trait VoiceAgentApi: Send + Sync + 'static {
    fn provider(&self) -> Provider {
        Provider::Elevenlabs
    }

    /// Fetch the full detail document for one conversation.
    async fn get_conversation(
        &self,
        conversation_id: &str,
    ) -> Result<serde_json::Value, SwitchboardError>;

    /// List conversations inside a time window, one page at a time.
    async fn list_conversations(
        &self,
        query: &ConversationQuery,
    ) -> Result<ConversationPage, SwitchboardError>;

    /// Download the call recording audio.
    async fn fetch_audio(&self, conversation_id: &str) -> Result<Vec<u8>, SwitchboardError>;
}

/// SMS gateway API.
#[async_trait]
pub trait SmsGateway: Send + Sync + 'static {
    fn provider(&self) -> Provider {
        Provider::Twilio
    }

    /// The sender number messages go out from.
    fn from_number(&self) -> &str;

    async fn send_sms(&self, to: &str, body: &str) -> Result<SentMessage, SwitchboardError>;
}

/// WhatsApp messaging bot API.
#[async_trait]
pub trait MessagingBot: Send + Sync + 'static {
    fn provider(&self) -> Provider {
        Provider::Builderbot
    }

    /// The bot's own WhatsApp number.
    fn bot_number(&self) -> &str;

    async fn send_message(
        &self,
        to: &str,
        text: &str,
        media_url: Option<&str>,
    ) -> Result<SentMessage, SwitchboardError>;
}
