// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The one write path for voice calls.
//!
//! Webhooks and the sync scheduler both land here, so a conversation ends
//! in the same state whichever path sees it first.

use switchboard_core::types::{
    Channel, Direction, Interaction, InteractionPatch, InteractionUpsert, Provider, UNKNOWN_PARTY,
};
use switchboard_core::{StorageAdapter, SwitchboardError};
use switchboard_normalize::{VendorValue, VoiceCall};
use tracing::debug;

/// Interaction upsert for a normalized voice call.
pub fn voice_upsert(call: &VoiceCall) -> InteractionUpsert {
    InteractionUpsert {
        provider: Provider::Elevenlabs,
        channel: Channel::Call,
        direction: call.direction.unwrap_or(Direction::Inbound),
        provider_conversation_id: call.conversation_id.clone(),
        from_number: call.from.clone().unwrap_or_else(|| UNKNOWN_PARTY.to_string()),
        to_number: call.to.clone().unwrap_or_else(|| UNKNOWN_PARTY.to_string()),
        fields: InteractionPatch {
            status: call.status.as_ref().and_then(VendorValue::known),
            started_at: call.started_at,
            ended_at: call.ended_at,
            assigned_agent: call.assigned_agent.clone(),
            intent: call.intent.clone(),
            outcome: call.outcome.as_ref().and_then(VendorValue::known),
            customer_ref: None,
            queue: None,
        },
    }
}

/// Upsert the interaction and merge the call detail.
pub async fn reconcile_voice_call(
    storage: &dyn StorageAdapter,
    call: &VoiceCall,
) -> Result<Interaction, SwitchboardError> {
    let interaction = storage.upsert_interaction(&voice_upsert(call)).await?;
    let detail = call.call_detail();
    if !detail.is_empty() {
        storage.upsert_call_detail(&interaction.id, &detail).await?;
    }
    debug!(
        interaction_id = %interaction.id,
        conversation_id = ?call.conversation_id,
        "voice call reconciled"
    );
    Ok(interaction)
}

#[cfg(test)]
mod tests {
    use super::*;
    use switchboard_core::types::{InteractionStatus, Outcome};

    #[test]
    fn unrecognized_vendor_values_leave_columns_untouched() {
        let call = VoiceCall {
            conversation_id: Some("conv-1".into()),
            status: Some(VendorValue::Unrecognized("voicemail".into())),
            outcome: Some(VendorValue::Known(Outcome::Escalated)),
            ..VoiceCall::default()
        };
        let upsert = voice_upsert(&call);
        assert_eq!(upsert.fields.status, None);
        assert_eq!(upsert.fields.outcome, Some(Outcome::Escalated));
        assert_eq!(upsert.from_number, UNKNOWN_PARTY);
        assert_eq!(upsert.direction, Direction::Inbound);
    }

    #[test]
    fn known_status_is_applied() {
        let call = VoiceCall {
            status: Some(VendorValue::Known(InteractionStatus::Completed)),
            direction: Some(Direction::Outbound),
            from: Some("5411".into()),
            ..VoiceCall::default()
        };
        let upsert = voice_upsert(&call);
        assert_eq!(upsert.fields.status, Some(InteractionStatus::Completed));
        assert_eq!(upsert.direction, Direction::Outbound);
        assert_eq!(upsert.from_number, "5411");
        assert!(upsert.provider_conversation_id.is_none());
    }
}
