// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Voice-AI post-call payloads.
//!
//! The same normalizer serves the post-call webhook (fields nested under
//! `data`) and the conversation detail / list documents returned by the REST
//! API (fields at the top level), so most tables carry both forms.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use serde_json::Value;
use switchboard_core::phone::normalize_phone;
use switchboard_core::types::{CallDetailPatch, Direction, InteractionStatus, Outcome};

use crate::path::{first_i64, first_text, first_value};
use crate::time::first_instant;
use crate::vendor::{VendorValue, map_outcome, map_status};

const EVENT_ID: &[&str] = &["event_id", "eventId", "data.event_id", "webhook_event_id"];

const EVENT_TYPE: &[&str] = &["type", "event_type", "eventType", "event"];

const CONVERSATION_ID: &[&str] = &[
    "data.conversation_id",
    "conversation_id",
    "conversationId",
    "data.conversationId",
    "call_id",
];

const AGENT_ID: &[&str] = &["data.agent_id", "agent_id", "agentId"];

const FROM: &[&str] = &[
    "data.metadata.phone_call.external_number",
    "metadata.phone_call.external_number",
    "data.conversation_initiation_client_data.dynamic_variables.system__caller_id",
    "conversation_initiation_client_data.dynamic_variables.system__caller_id",
    "data.from",
    "from",
    "from_number",
    "caller_id",
];

const TO: &[&str] = &[
    "data.metadata.phone_call.agent_number",
    "metadata.phone_call.agent_number",
    "data.conversation_initiation_client_data.dynamic_variables.system__called_number",
    "conversation_initiation_client_data.dynamic_variables.system__called_number",
    "data.to",
    "to",
    "to_number",
    "called_number",
];

const DIRECTION: &[&str] = &[
    "data.metadata.phone_call.direction",
    "metadata.phone_call.direction",
    "direction",
];

const STATUS: &[&str] = &["data.status", "status", "call_status"];

const OUTCOME: &[&str] = &[
    "data.outcome",
    "outcome",
    "data.analysis.call_successful",
    "analysis.call_successful",
    "call_successful",
];

const STARTED_AT: &[&str] = &[
    "data.metadata.start_time_unix_secs",
    "metadata.start_time_unix_secs",
    "start_time_unix_secs",
    "data.started_at",
    "started_at",
    "start_time",
];

const ENDED_AT: &[&str] = &["data.ended_at", "ended_at", "end_time"];

const DURATION: &[&str] = &[
    "data.metadata.call_duration_secs",
    "metadata.call_duration_secs",
    "call_duration_secs",
    "duration_seconds",
    "duration",
];

/// Dedicated analysis summary first, then the legacy keys in their
/// historical order.
const SUMMARY: &[&str] = &[
    "data.analysis.transcript_summary",
    "analysis.transcript_summary",
    "summary",
    "data.summary",
    "transcript_summary",
    "call_summary",
];

const TRANSCRIPT: &[&str] = &["data.transcript", "transcript", "transcript_text"];

const TRANSCRIPT_ID: &[&str] = &["data.transcript_id", "transcript_id"];

const RECORDING_URL: &[&str] = &[
    "data.recording_url",
    "recording_url",
    "data.audio_url",
    "audio_url",
];

const VENDOR_CALL_ID: &[&str] = &[
    "data.metadata.phone_call.call_sid",
    "metadata.phone_call.call_sid",
    "call_sid",
    "callSid",
];

const HANGUP_REASON: &[&str] = &[
    "data.metadata.termination_reason",
    "metadata.termination_reason",
    "termination_reason",
    "hangup_reason",
];

const INTENT: &[&str] = &[
    "data.analysis.data_collection_results.intent.value",
    "analysis.data_collection_results.intent.value",
    "data.intent",
    "intent",
];

const ASSIGNED_AGENT: &[&str] = &["data.assigned_agent", "assigned_agent", "agent_name"];

/// Canonical fields of a voice call.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceCall {
    pub event_id: Option<String>,
    pub event_type: Option<String>,
    pub conversation_id: Option<String>,
    pub agent_id: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub direction: Option<Direction>,
    pub status: Option<VendorValue<InteractionStatus>>,
    pub outcome: Option<VendorValue<Outcome>>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub duration_seconds: Option<i64>,
    pub summary: Option<String>,
    pub transcript_text: Option<String>,
    pub transcript_id: Option<String>,
    pub recording_url: Option<String>,
    pub vendor_call_id: Option<String>,
    pub hangup_reason: Option<String>,
    pub intent: Option<String>,
    pub assigned_agent: Option<String>,
}

impl VoiceCall {
    /// The call-detail fields this payload supplies.
    pub fn call_detail(&self) -> CallDetailPatch {
        CallDetailPatch {
            vendor_call_id: self.vendor_call_id.clone(),
            recording_url: self.recording_url.clone(),
            transcript_text: self.transcript_text.clone(),
            transcript_id: self.transcript_id.clone(),
            summary: self.summary.clone(),
            duration_seconds: self.duration_seconds,
            hangup_reason: self.hangup_reason.clone(),
        }
    }

    /// Fill fields this call lacks from `other`. Present fields win.
    pub fn fill_from(&mut self, other: VoiceCall) {
        fn fill<T>(slot: &mut Option<T>, value: Option<T>) {
            if slot.is_none() {
                *slot = value;
            }
        }
        fill(&mut self.conversation_id, other.conversation_id);
        fill(&mut self.agent_id, other.agent_id);
        fill(&mut self.from, other.from);
        fill(&mut self.to, other.to);
        fill(&mut self.direction, other.direction);
        fill(&mut self.status, other.status);
        fill(&mut self.outcome, other.outcome);
        fill(&mut self.started_at, other.started_at);
        fill(&mut self.ended_at, other.ended_at);
        fill(&mut self.duration_seconds, other.duration_seconds);
        fill(&mut self.summary, other.summary);
        fill(&mut self.transcript_text, other.transcript_text);
        fill(&mut self.transcript_id, other.transcript_id);
        fill(&mut self.recording_url, other.recording_url);
        fill(&mut self.vendor_call_id, other.vendor_call_id);
        fill(&mut self.hangup_reason, other.hangup_reason);
        fill(&mut self.intent, other.intent);
        fill(&mut self.assigned_agent, other.assigned_agent);
    }

    /// Whether enrichment from the vendor API could add anything.
    pub fn needs_enrichment(&self) -> bool {
        self.transcript_text.is_none() || self.summary.is_none() || self.recording_url.is_none()
    }
}

/// Normalize a voice-AI webhook body or conversation document.
pub fn normalize_voice(payload: &Value) -> VoiceCall {
    let started_at = first_instant(payload, STARTED_AT);
    let duration_seconds = first_i64(payload, DURATION).filter(|secs| *secs >= 0);
    let ended_at = first_instant(payload, ENDED_AT).or_else(|| {
        let (start, secs) = started_at.zip(duration_seconds)?;
        start.checked_add_signed(Duration::try_seconds(secs)?)
    });

    VoiceCall {
        event_id: first_text(payload, EVENT_ID),
        event_type: first_text(payload, EVENT_TYPE),
        conversation_id: first_text(payload, CONVERSATION_ID),
        agent_id: first_text(payload, AGENT_ID),
        from: first_text(payload, FROM).map(|raw| normalize_phone(&raw)),
        to: first_text(payload, TO).map(|raw| normalize_phone(&raw)),
        direction: first_text(payload, DIRECTION).map(|raw| {
            if raw.eq_ignore_ascii_case("outbound") {
                Direction::Outbound
            } else {
                Direction::Inbound
            }
        }),
        status: first_text(payload, STATUS).map(|raw| map_status(&raw)),
        outcome: first_text(payload, OUTCOME).map(|raw| map_outcome(&raw)),
        started_at,
        ended_at,
        duration_seconds,
        summary: first_text(payload, SUMMARY),
        transcript_text: first_value(payload, TRANSCRIPT).and_then(render_transcript),
        transcript_id: first_text(payload, TRANSCRIPT_ID),
        recording_url: first_text(payload, RECORDING_URL),
        vendor_call_id: first_text(payload, VENDOR_CALL_ID),
        hangup_reason: first_text(payload, HANGUP_REASON),
        intent: first_text(payload, INTENT),
        assigned_agent: first_text(payload, ASSIGNED_AGENT),
    }
}

/// Render a transcript as `role: message` lines.
///
/// Turns without text (tool calls, silence markers) are skipped.
fn render_transcript(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Array(turns) => turns
            .iter()
            .filter_map(|turn| {
                let message = first_text(turn, &["message", "text", "content"])?;
                let role = first_text(turn, &["role", "speaker"])
                    .unwrap_or_else(|| "unknown".to_string());
                Some(format!("{role}: {message}"))
            })
            .collect::<Vec<_>>()
            .join("\n"),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

const CALLER_ID: &[&str] = &["caller_id", "callerId", "from", "from_number"];
const CALLED_NUMBER: &[&str] = &["called_number", "calledNumber", "to", "to_number"];

/// Caller identity sent when a call starts, before any conversation exists.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallInit {
    pub caller_id: Option<String>,
    pub called_number: Option<String>,
    pub agent_id: Option<String>,
    pub call_sid: Option<String>,
}

pub fn normalize_call_init(payload: &Value) -> CallInit {
    CallInit {
        caller_id: first_text(payload, CALLER_ID).map(|raw| normalize_phone(&raw)),
        called_number: first_text(payload, CALLED_NUMBER).map(|raw| normalize_phone(&raw)),
        agent_id: first_text(payload, AGENT_ID),
        call_sid: first_text(payload, VENDOR_CALL_ID),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn post_call() -> Value {
        json!({
            "type": "post_call_transcription",
            "event_id": "evt-1",
            "event_timestamp": 1_739_537_297,
            "data": {
                "agent_id": "agent-7",
                "conversation_id": "conv-1",
                "status": "done",
                "transcript": [
                    {"role": "agent", "message": "Hola, en qué puedo ayudarle?"},
                    {"role": "user", "message": null, "tool_calls": []},
                    {"role": "user", "message": "Quiero mi saldo"}
                ],
                "metadata": {
                    "start_time_unix_secs": 1_739_537_000,
                    "call_duration_secs": 120,
                    "termination_reason": "client disconnected",
                    "phone_call": {
                        "external_number": "+54 11 5555-0000",
                        "agent_number": "+1 (555) 010-0000",
                        "call_sid": "CA123",
                        "direction": "inbound"
                    }
                },
                "analysis": {
                    "call_successful": "success",
                    "transcript_summary": "Customer asked for balance."
                }
            }
        })
    }

    #[test]
    fn post_call_webhook_fields() {
        let call = normalize_voice(&post_call());
        assert_eq!(call.event_id.as_deref(), Some("evt-1"));
        assert_eq!(call.event_type.as_deref(), Some("post_call_transcription"));
        assert_eq!(call.conversation_id.as_deref(), Some("conv-1"));
        assert_eq!(call.from.as_deref(), Some("541155550000"));
        assert_eq!(call.to.as_deref(), Some("15550100000"));
        assert_eq!(call.direction, Some(Direction::Inbound));
        assert_eq!(call.status, Some(VendorValue::Known(InteractionStatus::Completed)));
        assert_eq!(call.outcome.as_ref().and_then(VendorValue::known), Some(Outcome::Resolved));
        assert_eq!(call.vendor_call_id.as_deref(), Some("CA123"));
        assert_eq!(call.duration_seconds, Some(120));
        assert_eq!(call.summary.as_deref(), Some("Customer asked for balance."));
        assert_eq!(
            call.transcript_text.as_deref(),
            Some("agent: Hola, en qué puedo ayudarle?\nuser: Quiero mi saldo")
        );
    }

    #[test]
    fn ended_at_derived_from_start_plus_duration() {
        let call = normalize_voice(&post_call());
        let started = call.started_at.unwrap();
        assert_eq!(started.timestamp(), 1_739_537_000);
        assert_eq!(call.ended_at.unwrap() - started, Duration::seconds(120));
    }

    #[test]
    fn historical_timestamps_never_default_to_now() {
        let call = normalize_voice(&json!({"conversation_id": "c"}));
        assert!(call.started_at.is_none());
        assert!(call.ended_at.is_none());
    }

    #[test]
    fn summary_prefers_analysis_then_legacy_order() {
        let both = json!({
            "summary": "legacy top",
            "data": {"summary": "legacy data", "analysis": {"transcript_summary": "analysis"}}
        });
        assert_eq!(normalize_voice(&both).summary.as_deref(), Some("analysis"));

        let legacy = json!({
            "call_summary": "fourth",
            "transcript_summary": "third",
            "data": {"summary": "second"}
        });
        assert_eq!(normalize_voice(&legacy).summary.as_deref(), Some("second"));

        let last = json!({"call_summary": "only"});
        assert_eq!(normalize_voice(&last).summary.as_deref(), Some("only"));
    }

    #[test]
    fn rest_detail_document_without_data_wrapper() {
        let detail = json!({
            "conversation_id": "conv-9",
            "status": "processing",
            "transcript": "agent: hi",
            "metadata": {"start_time_unix_secs": 1_700_000_000, "call_duration_secs": 5},
            "analysis": {"transcript_summary": "short", "call_successful": "voicemail"}
        });
        let call = normalize_voice(&detail);
        assert_eq!(call.conversation_id.as_deref(), Some("conv-9"));
        assert_eq!(call.status.and_then(|s| s.known()), Some(InteractionStatus::InProgress));
        assert_eq!(call.outcome, Some(VendorValue::Unrecognized("voicemail".into())));
        assert_eq!(call.summary.as_deref(), Some("short"));
        assert_eq!(call.transcript_text.as_deref(), Some("agent: hi"));
        assert!(call.from.is_none());
    }

    #[test]
    fn enrichment_needed_only_when_detail_missing() {
        let mut call = normalize_voice(&post_call());
        assert!(call.needs_enrichment(), "recording url is missing");
        call.recording_url = Some("https://rec".into());
        assert!(!call.needs_enrichment());
        assert_eq!(call.call_detail().recording_url.as_deref(), Some("https://rec"));
    }

    #[test]
    fn fill_keeps_webhook_values() {
        let mut call = normalize_voice(&post_call());
        call.fill_from(VoiceCall {
            summary: Some("api summary".into()),
            recording_url: Some("https://rec".into()),
            ..VoiceCall::default()
        });
        assert_eq!(call.summary.as_deref(), Some("Customer asked for balance."));
        assert_eq!(call.recording_url.as_deref(), Some("https://rec"));
    }

    #[test]
    fn call_init_fields() {
        let init = normalize_call_init(&json!({
            "caller_id": "+54 9 11 5555-0000",
            "agent_id": "agent-7",
            "called_number": "+15550100000",
            "call_sid": "CA9"
        }));
        assert_eq!(init.caller_id.as_deref(), Some("5491155550000"));
        assert_eq!(init.called_number.as_deref(), Some("15550100000"));
        assert_eq!(init.agent_id.as_deref(), Some("agent-7"));
        assert_eq!(init.call_sid.as_deref(), Some("CA9"));
    }
}
