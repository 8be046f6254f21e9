// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Client for the voice-AI platform's conversations API.
//!
//! Provides [`ElevenlabsClient`], used for best-effort webhook enrichment,
//! periodic sync, and recording downloads. All calls are GETs, so transient
//! failures are retried once after a short delay.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::Deserialize;
use switchboard_config::model::ElevenlabsConfig;
use switchboard_core::types::{ConversationPage, ConversationQuery, ConversationSummary};
use switchboard_core::{Provider, SwitchboardError, VoiceAgentApi};
use tracing::{debug, warn};

use crate::http::{self, build_client, is_transient_error, status_error, transport_error};

const PROVIDER: Provider = Provider::Elevenlabs;

/// HTTP client for the voice-AI conversations API.
#[derive(Debug, Clone)]
pub struct ElevenlabsClient {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
    max_retries: u32,
}

#[derive(Debug, Deserialize)]
struct ListResponse {
    #[serde(default)]
    conversations: Vec<serde_json::Value>,
    #[serde(default)]
    next_cursor: Option<String>,
    #[serde(default)]
    has_more: bool,
}

impl ElevenlabsClient {
    /// Creates a client from the `[elevenlabs]` section. Requires `api_key`.
    pub fn new(config: &ElevenlabsConfig) -> Result<Self, SwitchboardError> {
        let api_key = config
            .api_key
            .as_deref()
            .ok_or_else(|| SwitchboardError::Config("elevenlabs.api_key is not set".into()))?;
        let mut headers = HeaderMap::new();
        headers.insert(
            "xi-api-key",
            HeaderValue::from_str(api_key).map_err(|e| {
                SwitchboardError::Config(format!("invalid elevenlabs API key header value: {e}"))
            })?,
        );
        let timeout = Duration::from_secs(config.timeout_secs);
        Ok(Self {
            client: build_client(PROVIDER, headers, timeout)?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            timeout,
            max_retries: 1,
        })
    }

    /// Overrides the base URL (for testing with wiremock).
    #[cfg(test)]
    pub fn with_base_url(mut self, url: String) -> Self {
        self.base_url = url;
        self
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response, SwitchboardError> {
        let mut last_error = None;
        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                warn!(attempt, "retrying voice API request after transient error");
                tokio::time::sleep(Duration::from_millis(500)).await;
            }

            let response = self
                .client
                .get(url)
                .send()
                .await
                .map_err(|e| transport_error(PROVIDER, self.timeout, e))?;
            let status = response.status();
            debug!(status = %status, attempt, "voice API response received");

            if status.is_success() {
                return Ok(response);
            }
            if is_transient_error(status) && attempt < self.max_retries {
                last_error = Some(status_error(PROVIDER, response).await);
                continue;
            }
            return Err(status_error(PROVIDER, response).await);
        }
        Err(last_error.unwrap_or_else(|| {
            SwitchboardError::upstream(PROVIDER, "request failed after retries")
        }))
    }
}

fn list_query(query: &ConversationQuery) -> Result<String, SwitchboardError> {
    let mut params: Vec<(&str, String)> = vec![("page_size", query.page_size.clamp(1, 100).to_string())];
    if let Some(agent_id) = &query.agent_id {
        params.push(("agent_id", agent_id.clone()));
    }
    if let Some(after) = query.start_after {
        params.push(("call_start_after_unix", after.timestamp().to_string()));
    }
    if let Some(before) = query.start_before {
        params.push(("call_start_before_unix", before.timestamp().to_string()));
    }
    if let Some(cursor) = &query.cursor {
        params.push(("cursor", cursor.clone()));
    }
    serde_urlencoded::to_string(&params).map_err(|e| SwitchboardError::Internal(e.to_string()))
}

#[async_trait]
impl VoiceAgentApi for ElevenlabsClient {
    async fn get_conversation(
        &self,
        conversation_id: &str,
    ) -> Result<serde_json::Value, SwitchboardError> {
        let url = format!("{}/v1/convai/conversations/{conversation_id}", self.base_url);
        let response = self.get(&url).await?;
        http::read_json(PROVIDER, response).await
    }

    async fn list_conversations(
        &self,
        query: &ConversationQuery,
    ) -> Result<ConversationPage, SwitchboardError> {
        let url = format!("{}/v1/convai/conversations?{}", self.base_url, list_query(query)?);
        let response = self.get(&url).await?;
        let list: ListResponse = http::read_json(PROVIDER, response).await?;

        let conversations = list
            .conversations
            .into_iter()
            .filter_map(|raw| {
                let conversation_id = raw.get("conversation_id")?.as_str()?.to_string();
                Some(ConversationSummary { conversation_id, raw })
            })
            .collect();
        Ok(ConversationPage {
            conversations,
            next_cursor: list.next_cursor,
            has_more: list.has_more,
        })
    }

    async fn fetch_audio(&self, conversation_id: &str) -> Result<Vec<u8>, SwitchboardError> {
        let url = format!("{}/v1/convai/conversations/{conversation_id}/audio", self.base_url);
        let response = self.get(&url).await?;
        let bytes = response.bytes().await.map_err(|e| transport_error(PROVIDER, self.timeout, e))?;
        Ok(bytes.to_vec())
    }
}
