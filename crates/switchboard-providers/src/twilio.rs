// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SMS gateway client (Messages API: form POST with basic auth).
//!
//! Sends are not idempotent, so nothing here retries. Redelivery is left to
//! the job queue.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use switchboard_config::model::TwilioConfig;
use switchboard_core::types::SentMessage;
use switchboard_core::phone::normalize_phone;
use switchboard_core::{Provider, SmsGateway, SwitchboardError};
use tracing::debug;

use crate::http::{self, build_client, status_error, transport_error};

const PROVIDER: Provider = Provider::Twilio;

/// HTTP client for the SMS gateway.
pub struct TwilioClient {
    client: reqwest::Client,
    base_url: String,
    account_sid: String,
    auth_token: String,
    from_number: String,
    status_callback_url: Option<String>,
    timeout: Duration,
}

impl std::fmt::Debug for TwilioClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TwilioClient")
            .field("base_url", &self.base_url)
            .field("account_sid", &self.account_sid)
            .field("auth_token", &"[redacted]")
            .field("from_number", &self.from_number)
            .finish()
    }
}

impl TwilioClient {
    /// Creates a client from the `[twilio]` section.
    ///
    /// `account_sid`, `auth_token` and `from_number` are all required.
    pub fn new(config: &TwilioConfig) -> Result<Self, SwitchboardError> {
        let required = |value: &Option<String>, key: &str| {
            value
                .clone()
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| SwitchboardError::Config(format!("twilio.{key} is not set")))
        };
        let account_sid = required(&config.account_sid, "account_sid")?;
        let auth_token = required(&config.auth_token, "auth_token")?;
        let from_number = required(&config.from_number, "from_number")?;

        let mut headers = HeaderMap::new();
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/x-www-form-urlencoded"),
        );
        let timeout = Duration::from_secs(config.timeout_secs);
        Ok(Self {
            client: build_client(PROVIDER, headers, timeout)?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            account_sid,
            auth_token,
            from_number,
            status_callback_url: config.status_callback_url.clone(),
            timeout,
        })
    }

    /// Overrides the base URL (for testing with wiremock).
    #[cfg(test)]
    pub fn with_base_url(mut self, url: String) -> Self {
        self.base_url = url;
        self
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.base_url, self.account_sid
        )
    }
}

#[async_trait]
impl SmsGateway for TwilioClient {
    fn from_number(&self) -> &str {
        &self.from_number
    }

    async fn send_sms(&self, to: &str, body: &str) -> Result<SentMessage, SwitchboardError> {
        let to = e164(to);
        let mut form = vec![("To", to.as_str()), ("From", self.from_number.as_str()), ("Body", body)];
        if let Some(callback) = &self.status_callback_url {
            form.push(("StatusCallback", callback.as_str()));
        }
        let encoded = serde_urlencoded::to_string(&form)
            .map_err(|e| SwitchboardError::Internal(format!("failed to encode SMS form: {e}")))?;

        let response = self
            .client
            .post(self.messages_url())
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .body(encoded)
            .send()
            .await
            .map_err(|e| transport_error(PROVIDER, self.timeout, e))?;

        let status = response.status();
        debug!(status = %status, "SMS send response received");
        if !status.is_success() {
            return Err(status_error(PROVIDER, response).await);
        }

        let raw: serde_json::Value = http::read_json(PROVIDER, response).await?;
        Ok(SentMessage {
            provider_message_id: raw.get("sid").and_then(|v| v.as_str()).map(str::to_string),
            status: raw.get("status").and_then(|v| v.as_str()).map(str::to_string),
            raw,
        })
    }
}

/// Twilio requires E.164; stored numbers carry no leading `+`.
fn e164(number: &str) -> String {
    let digits = normalize_phone(number);
    format!("+{digits}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, header, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config() -> TwilioConfig {
        TwilioConfig {
            account_sid: Some("AC123".into()),
            auth_token: Some("tok".into()),
            from_number: Some("+15550001111".into()),
            status_callback_url: Some("https://cb.example/webhooks/twilio/sms/status".into()),
            timeout_secs: 2,
            ..TwilioConfig::default()
        }
    }

    fn test_client(base_url: &str) -> TwilioClient {
        TwilioClient::new(&config()).unwrap().with_base_url(base_url.to_string())
    }

    #[test]
    fn all_credentials_required() {
        let mut cfg = config();
        cfg.from_number = None;
        let err = TwilioClient::new(&cfg).unwrap_err();
        assert!(err.to_string().contains("twilio.from_number"));
    }

    #[test]
    fn debug_hides_auth_token() {
        let rendered = format!("{:?}", TwilioClient::new(&config()).unwrap());
        assert!(!rendered.contains("tok\""));
        assert!(rendered.contains("[redacted]"));
    }

    #[tokio::test]
    async fn send_sms_posts_form_with_basic_auth() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/2010-04-01/Accounts/AC123/Messages.json"))
            .and(header_exists("authorization"))
            .and(header("content-type", "application/x-www-form-urlencoded"))
            .and(body_string_contains("To=%2B5491155550000"))
            .and(body_string_contains("Body=Tu+c%C3%B3digo"))
            .and(body_string_contains("StatusCallback="))
            .respond_with(
                ResponseTemplate::new(201).set_body_json(json!({"sid": "SM123", "status": "queued"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let sent = test_client(&server.uri())
            .send_sms("+5491155550000", "Tu código")
            .await
            .unwrap();
        assert_eq!(sent.provider_message_id.as_deref(), Some("SM123"));
        assert_eq!(sent.status.as_deref(), Some("queued"));
    }

    #[tokio::test]
    async fn rejected_send_is_upstream_error_and_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_json(json!({
                "code": 20500, "message": "Internal Server Error"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let err = test_client(&server.uri()).send_sms("1", "x").await.unwrap_err();
        assert!(matches!(err, SwitchboardError::Upstream { provider: Provider::Twilio, .. }));
        assert!(err.to_string().contains("500"));
    }

    #[test]
    fn recipients_are_sent_in_e164() {
        assert_eq!(e164("5491155550000"), "+5491155550000");
        assert_eq!(e164("+54 9 11 5555-0000"), "+5491155550000");
    }
}
