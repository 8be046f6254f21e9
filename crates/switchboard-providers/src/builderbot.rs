// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WhatsApp bot client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::Serialize;
use switchboard_config::model::BuilderbotConfig;
use switchboard_core::types::SentMessage;
use switchboard_core::{MessagingBot, Provider, SwitchboardError};
use tracing::debug;

use crate::http::{build_client, status_error, transport_error};

const PROVIDER: Provider = Provider::Builderbot;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SendRequest<'a> {
    number: &'a str,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    url_media: Option<&'a str>,
}

/// HTTP client for the bot's send endpoint.
#[derive(Debug, Clone)]
pub struct BuilderbotClient {
    client: reqwest::Client,
    base_url: String,
    bot_number: String,
    timeout: Duration,
}

impl BuilderbotClient {
    pub fn new(config: &BuilderbotConfig) -> Result<Self, SwitchboardError> {
        let mut headers = HeaderMap::new();
        if let Some(api_key) = &config.api_key {
            headers.insert(
                "x-api-builderbot",
                HeaderValue::from_str(api_key).map_err(|e| {
                    SwitchboardError::Config(format!("invalid builderbot API key header value: {e}"))
                })?,
            );
        }
        let timeout = Duration::from_secs(config.timeout_secs);
        Ok(Self {
            client: build_client(PROVIDER, headers, timeout)?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            bot_number: config.bot_number.clone().unwrap_or_default(),
            timeout,
        })
    }

    /// Overrides the base URL (for testing with wiremock).
    #[cfg(test)]
    pub fn with_base_url(mut self, url: String) -> Self {
        self.base_url = url;
        self
    }
}

#[async_trait]
impl MessagingBot for BuilderbotClient {
    fn bot_number(&self) -> &str {
        &self.bot_number
    }

    async fn send_message(
        &self,
        to: &str,
        text: &str,
        media_url: Option<&str>,
    ) -> Result<SentMessage, SwitchboardError> {
        let request = SendRequest {
            number: to,
            message: text,
            url_media: media_url,
        };
        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| transport_error(PROVIDER, self.timeout, e))?;

        let status = response.status();
        debug!(status = %status, "bot send response received");
        if !status.is_success() {
            return Err(status_error(PROVIDER, response).await);
        }

        // The bot answers with JSON or a bare acknowledgement string.
        let body = response.text().await.unwrap_or_default();
        let raw = serde_json::from_str::<serde_json::Value>(&body)
            .unwrap_or(serde_json::Value::String(body));
        let provider_message_id = ["id", "messageId", "key.id"].iter().find_map(|key| {
            key.split('.')
                .try_fold(&raw, |node, segment| node.get(segment))
                .and_then(|v| v.as_str())
                .map(str::to_string)
        });
        Ok(SentMessage {
            provider_message_id,
            status: Some("sent".to_string()),
            raw,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_client(base_url: &str) -> BuilderbotClient {
        let config = BuilderbotConfig {
            api_key: Some("bb-key".into()),
            bot_number: Some("5491100000000".into()),
            timeout_secs: 2,
            ..BuilderbotConfig::default()
        };
        BuilderbotClient::new(&config).unwrap().with_base_url(base_url.to_string())
    }

    #[tokio::test]
    async fn send_message_posts_json() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(header("x-api-builderbot", "bb-key"))
            .and(body_json(json!({
                "number": "5491155550000",
                "message": "Hola",
                "urlMedia": "https://cdn/x.jpg"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_string("sended"))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        assert_eq!(client.bot_number(), "5491100000000");
        let sent = client
            .send_message("5491155550000", "Hola", Some("https://cdn/x.jpg"))
            .await
            .unwrap();
        assert_eq!(sent.raw, json!("sended"));
        assert!(sent.provider_message_id.is_none());
    }

    #[tokio::test]
    async fn message_id_extracted_from_json_reply() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"key": {"id": "wamid.OUT"}})),
            )
            .mount(&server)
            .await;

        let sent = test_client(&server.uri()).send_message("1", "x", None).await.unwrap();
        assert_eq!(sent.provider_message_id.as_deref(), Some("wamid.OUT"));
    }

    #[tokio::test]
    async fn failure_is_upstream_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
            .mount(&server)
            .await;

        let err = test_client(&server.uri()).send_message("1", "x", None).await.unwrap_err();
        assert!(matches!(err, SwitchboardError::Upstream { provider: Provider::Builderbot, .. }));
    }
}
