// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Storage entities. The canonical definitions live in `switchboard-core` so
//! they can cross the adapter trait boundary; re-exported here for the query
//! modules.

pub use switchboard_core::types::{
    AuditEntry, CallDetail, CallDetailPatch, Interaction, InteractionEvent, InteractionFilter,
    InteractionPatch, InteractionUpsert, Message, MessageDeliveryUpdate, NewEvent, NewMessage,
    NewOtpChallenge, OtpChallenge, QueueEntry,
};
