// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Webhook ingestion end to end: idempotency, enrichment, normalization and
//! delivery-status correlation against real SQLite storage.

use serde_json::json;
use switchboard_core::types::{Channel, Direction, InteractionFilter, Provider};
use switchboard_core::{InteractionStatus, Outcome, SwitchboardError};
use switchboard_ingest::OutboundMessage;
use switchboard_test_utils::TestHarness;
use switchboard_test_utils::harness::{SMS_SECRET, VOICE_SECRET, WHATSAPP_SECRET};

fn post_call(event_id: &str, conversation_id: &str) -> serde_json::Value {
    json!({
        "type": "post_call_transcription",
        "event_id": event_id,
        "data": {
            "conversation_id": conversation_id,
            "agent_id": "agent-1",
            "status": "done",
            "metadata": {
                "start_time_unix_secs": 1_772_452_800,
                "call_duration_secs": 95,
                "phone_call": {
                    "external_number": "+54 11 5555-0000",
                    "agent_number": "+54 11 4000-0000",
                    "direction": "inbound",
                    "call_sid": "CA123"
                }
            },
            "analysis": {
                "transcript_summary": "Customer asked about a refund.",
                "call_successful": "success"
            },
            "transcript": [
                {"role": "agent", "message": "Hola, ¿en qué puedo ayudarte?"},
                {"role": "user", "message": "Quiero un reembolso."}
            ],
            "recording_url": "https://cdn.example.com/rec/conv.mp3"
        }
    })
}

#[tokio::test]
async fn duplicate_voice_webhook_is_recorded_once() {
    let harness = TestHarness::new().await.unwrap();
    let payload = post_call("evt-1", "conv-1");

    let first = harness
        .dispatcher
        .handle_voice_call(Some(VOICE_SECRET), payload.clone())
        .await
        .unwrap();
    assert!(first.success);
    assert!(!first.duplicate);
    let interaction_id = first.interaction_id.clone().unwrap();

    let second = harness
        .dispatcher
        .handle_voice_call(Some(VOICE_SECRET), payload)
        .await
        .unwrap();
    assert!(second.success);
    assert!(second.duplicate);
    assert_eq!(second.interaction_id.as_deref(), Some(interaction_id.as_str()));

    let events = harness.storage.list_events(&interaction_id).await.unwrap();
    assert_eq!(events.len(), 1);
    let all = harness
        .storage
        .list_interactions(&InteractionFilter::default())
        .await
        .unwrap();
    assert_eq!(all.len(), 1);

    let interaction = &all[0];
    assert_eq!(interaction.channel, Channel::Call);
    assert_eq!(interaction.provider, Provider::Elevenlabs);
    assert_eq!(interaction.status, InteractionStatus::Completed);
    assert_eq!(interaction.outcome, Some(Outcome::Resolved));
    assert_eq!(interaction.from_number, "541155550000");
    assert_eq!(interaction.direction, Direction::Inbound);
    assert!(interaction.started_at.is_some());
    assert!(interaction.ended_at.is_some());

    let detail = harness
        .storage
        .get_call_detail(&interaction_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(detail.duration_seconds, Some(95));
    assert_eq!(detail.vendor_call_id.as_deref(), Some("CA123"));
    assert!(detail.transcript_text.unwrap().starts_with("agent: Hola"));

    // Complete webhooks need no enrichment.
    assert_eq!(harness.voice.detail_calls(), 0);

    let audits = harness.audit_for("webhook.voice_call").await.unwrap();
    assert_eq!(audits.len(), 1);
    assert_eq!(audits[0].actor_id.as_deref(), Some("ELEVENLABS"));
}

#[tokio::test]
async fn thin_voice_webhook_is_enriched_from_the_api() {
    let harness = TestHarness::new().await.unwrap();
    harness
        .voice
        .add_conversation(
            "conv-thin",
            json!({"conversation_id": "conv-thin"}),
            json!({
                "conversation_id": "conv-thin",
                "status": "done",
                "analysis": {"transcript_summary": "Fetched summary"},
                "transcript": [{"role": "user", "message": "hola"}],
                "metadata": {"phone_call": {"external_number": "5491100001111"}}
            }),
        )
        .await;

    let ack = harness
        .dispatcher
        .handle_voice_call(
            Some(VOICE_SECRET),
            json!({"event_id": "evt-thin", "conversation_id": "conv-thin", "summary": "From webhook"}),
        )
        .await
        .unwrap();
    assert!(ack.success);
    assert_eq!(harness.voice.detail_calls(), 1);

    let id = ack.interaction_id.unwrap();
    let detail = harness.storage.get_call_detail(&id).await.unwrap().unwrap();
    // Webhook fields win; the document only fills gaps.
    assert_eq!(detail.summary.as_deref(), Some("From webhook"));
    assert_eq!(detail.transcript_text.as_deref(), Some("user: hola"));

    let interaction = harness.storage.get_interaction(&id).await.unwrap().unwrap();
    assert_eq!(interaction.from_number, "5491100001111");
    assert_eq!(interaction.status, InteractionStatus::Completed);
}

#[tokio::test]
async fn enrichment_failure_does_not_fail_the_webhook() {
    let harness = TestHarness::new().await.unwrap();
    harness.voice.fail_detail(true);

    let ack = harness
        .dispatcher
        .handle_voice_call(
            Some(VOICE_SECRET),
            json!({"event_id": "evt-2", "conversation_id": "conv-2", "status": "in_progress"}),
        )
        .await
        .unwrap();
    assert!(ack.success);
    assert!(ack.error.is_none());

    let id = ack.interaction_id.unwrap();
    let events = harness.storage.list_events(&id).await.unwrap();
    assert_eq!(events.len(), 1);
    assert!(
        events[0].payload["enrichmentError"]
            .as_str()
            .unwrap()
            .contains("503")
    );
    let interaction = harness.storage.get_interaction(&id).await.unwrap().unwrap();
    assert_eq!(interaction.status, InteractionStatus::InProgress);
}

#[tokio::test]
async fn voice_webhook_requires_the_shared_secret() {
    let harness = TestHarness::new().await.unwrap();

    let missing = harness
        .dispatcher
        .handle_voice_call(None, post_call("evt-3", "conv-3"))
        .await;
    assert!(matches!(missing, Err(SwitchboardError::Authentication(_))));

    let wrong = harness
        .dispatcher
        .handle_voice_call(Some("nope"), post_call("evt-3", "conv-3"))
        .await;
    assert!(matches!(wrong, Err(SwitchboardError::Authentication(_))));

    let all = harness
        .storage
        .list_interactions(&InteractionFilter::default())
        .await
        .unwrap();
    assert!(all.is_empty());
}

#[tokio::test]
async fn call_init_reports_caller_history() {
    let harness = TestHarness::new().await.unwrap();

    let fresh = harness
        .dispatcher
        .handle_call_init(Some(VOICE_SECRET), json!({"caller_id": "+54 11 5555-0000"}))
        .await
        .unwrap();
    assert_eq!(fresh.dynamic_variables.previous_interactions, 0);
    assert_eq!(fresh.dynamic_variables.last_outcome, "NONE");

    harness
        .dispatcher
        .handle_voice_call(Some(VOICE_SECRET), post_call("evt-4", "conv-4"))
        .await
        .unwrap();

    let known = harness
        .dispatcher
        .handle_call_init(Some(VOICE_SECRET), json!({"caller_id": "+54 11 5555-0000"}))
        .await
        .unwrap();
    assert_eq!(known.kind, "conversation_initiation_client_data");
    assert_eq!(known.dynamic_variables.caller_id, "541155550000");
    assert_eq!(known.dynamic_variables.previous_interactions, 1);
    assert_eq!(known.dynamic_variables.last_outcome, "RESOLVED");
}

fn incoming_whatsapp(message_id: &str, from: &str, body: &str) -> serde_json::Value {
    json!({
        "eventName": "message.incoming",
        "data": {
            "messageId": message_id,
            "from": from,
            "name": "Ana",
            "body": body
        }
    })
}

#[tokio::test]
async fn whatsapp_messages_from_one_number_share_an_interaction() {
    let harness = TestHarness::new().await.unwrap();

    let first = harness
        .dispatcher
        .handle_whatsapp(
            Some(WHATSAPP_SECRET),
            incoming_whatsapp("wa-1", "+54 9 11 5555-0000", "hola"),
        )
        .await
        .unwrap();
    let second = harness
        .dispatcher
        .handle_whatsapp(
            Some(WHATSAPP_SECRET),
            incoming_whatsapp("wa-2", "5491155550000@s.whatsapp.net", "¿siguen ahí?"),
        )
        .await
        .unwrap();
    assert!(first.success && second.success);
    assert_eq!(first.interaction_id, second.interaction_id);

    let id = first.interaction_id.unwrap();
    let messages = harness.storage.list_messages(&id).await.unwrap();
    assert_eq!(messages.len(), 2);
    assert!(messages.iter().all(|m| m.direction == Direction::Inbound));
    assert!(messages.iter().all(|m| m.provider_status.as_deref() == Some("received")));

    let interaction = harness.storage.get_interaction(&id).await.unwrap().unwrap();
    assert_eq!(interaction.from_number, "5491155550000");
    // The bot's own number fills the receiving side.
    assert_eq!(interaction.to_number, "5491100000000");
    assert_eq!(interaction.status, InteractionStatus::InProgress);
}

#[tokio::test]
async fn whatsapp_redelivery_does_not_duplicate_the_message() {
    let harness = TestHarness::new().await.unwrap();
    let payload = incoming_whatsapp("wa-9", "5491155550000", "hola");

    harness
        .dispatcher
        .handle_whatsapp(Some(WHATSAPP_SECRET), payload.clone())
        .await
        .unwrap();
    let again = harness
        .dispatcher
        .handle_whatsapp(Some(WHATSAPP_SECRET), payload)
        .await
        .unwrap();
    assert!(again.duplicate);

    let id = again.interaction_id.unwrap();
    assert_eq!(harness.storage.list_messages(&id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn non_message_whatsapp_events_are_ignored() {
    let harness = TestHarness::new().await.unwrap();
    let ack = harness
        .dispatcher
        .handle_whatsapp(
            Some(WHATSAPP_SECRET),
            json!({"eventName": "status.update", "data": {"from": "5491155550000"}}),
        )
        .await
        .unwrap();
    assert!(ack.success);
    assert!(ack.interaction_id.is_none());
    assert!(harness.audit_log().await.unwrap().is_empty());
}

#[tokio::test]
async fn sms_status_callback_updates_the_sent_message() {
    let harness = TestHarness::new().await.unwrap();
    let receipt = harness
        .dispatcher
        .send_sms(&OutboundMessage {
            to: "+54 11 5555-0000".into(),
            text: "Tu turno fue confirmado".into(),
            media_url: None,
            customer_ref: Some("cust-7".into()),
        })
        .await
        .unwrap();
    let sid = receipt.provider_message_id.clone().unwrap();

    let sending = harness.storage.get_interaction(&receipt.interaction_id).await.unwrap().unwrap();
    assert_eq!(sending.direction, Direction::Outbound);
    assert_eq!(sending.status, InteractionStatus::InProgress);
    assert_eq!(sending.customer_ref.as_deref(), Some("cust-7"));

    let ack = harness
        .dispatcher
        .handle_sms_status(
            Some(SMS_SECRET),
            json!({"MessageSid": sid, "MessageStatus": "delivered", "To": "+541155550000"}),
        )
        .await
        .unwrap();
    assert!(ack.success);
    assert_eq!(ack.interaction_id.as_deref(), Some(receipt.interaction_id.as_str()));

    let messages = harness.storage.list_messages(&receipt.interaction_id).await.unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].provider_status.as_deref(), Some("delivered"));
    assert!(messages[0].delivered_at.is_some());

    let done = harness.storage.get_interaction(&receipt.interaction_id).await.unwrap().unwrap();
    assert_eq!(done.status, InteractionStatus::Completed);
    assert!(done.ended_at.is_some());

    let events = harness.storage.list_events(&receipt.interaction_id).await.unwrap();
    let types: Vec<_> = events.iter().map(|e| e.event_type.as_str()).collect();
    assert!(types.contains(&"sms.sent"));
    assert!(types.contains(&"sms.status"));
}

#[tokio::test]
async fn sms_status_for_unknown_sid_is_acknowledged() {
    let harness = TestHarness::new().await.unwrap();
    // No header at all is accepted for status callbacks.
    let ack = harness
        .dispatcher
        .handle_sms_status(None, json!({"MessageSid": "SMunknown", "MessageStatus": "sent"}))
        .await
        .unwrap();
    assert!(ack.success);
    assert!(ack.interaction_id.is_none());

    let missing_sid = harness
        .dispatcher
        .handle_sms_status(None, json!({"MessageStatus": "sent"}))
        .await
        .unwrap();
    assert!(!missing_sid.success);
    assert!(missing_sid.error.unwrap().contains("message sid"));

    let wrong = harness
        .dispatcher
        .handle_sms_status(Some("bad"), json!({"MessageSid": "SMx", "MessageStatus": "sent"}))
        .await;
    assert!(matches!(wrong, Err(SwitchboardError::Authentication(_))));
}

#[tokio::test]
async fn failed_send_marks_the_interaction_failed() {
    let harness = TestHarness::new().await.unwrap();
    harness.bot.fail_sends(true);

    let result = harness
        .dispatcher
        .send_whatsapp(&OutboundMessage {
            to: "5491155550000".into(),
            text: "hola".into(),
            media_url: None,
            customer_ref: None,
        })
        .await;
    assert!(matches!(result, Err(SwitchboardError::Upstream { .. })));

    let all = harness
        .storage
        .list_interactions(&InteractionFilter {
            channel: Some(Channel::Whatsapp),
            ..InteractionFilter::default()
        })
        .await
        .unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].status, InteractionStatus::Failed);
    assert!(harness.storage.list_messages(&all[0].id).await.unwrap().is_empty());
}

#[tokio::test]
async fn outbound_send_validates_the_request() {
    let harness = TestHarness::new().await.unwrap();
    let result = harness
        .dispatcher
        .send_sms(&OutboundMessage {
            to: "  ".into(),
            text: "hola".into(),
            media_url: None,
            customer_ref: None,
        })
        .await;
    assert!(matches!(result, Err(SwitchboardError::Validation(_))));
    assert_eq!(harness.sms.sent_count().await, 0);
}
