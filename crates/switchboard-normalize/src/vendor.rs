// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Vendor enum strings mapped onto canonical enums.
//!
//! Lookups are case-insensitive and treat `-`, ` ` and `_` alike. Values not
//! in a table are kept verbatim as [`VendorValue::Unrecognized`] so new
//! vendor states pass through instead of being dropped.

use serde::Serialize;
use switchboard_core::types::{InteractionStatus, Outcome};

/// A vendor enum value, either mapped or carried through as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum VendorValue<T> {
    Known(T),
    Unrecognized(String),
}

impl<T: Copy> VendorValue<T> {
    /// The canonical value, if the vendor string was recognized.
    pub fn known(&self) -> Option<T> {
        match self {
            VendorValue::Known(value) => Some(*value),
            VendorValue::Unrecognized(_) => None,
        }
    }
}

/// Voice-call states as reported by the voice-AI platform.
const STATUS_TABLE: &[(&str, InteractionStatus)] = &[
    ("new", InteractionStatus::New),
    ("initiated", InteractionStatus::New),
    ("queued", InteractionStatus::New),
    ("in_progress", InteractionStatus::InProgress),
    ("processing", InteractionStatus::InProgress),
    ("ringing", InteractionStatus::InProgress),
    ("active", InteractionStatus::InProgress),
    ("done", InteractionStatus::Completed),
    ("completed", InteractionStatus::Completed),
    ("ended", InteractionStatus::Completed),
    ("abandoned", InteractionStatus::Abandoned),
    ("no_answer", InteractionStatus::Abandoned),
    ("busy", InteractionStatus::Abandoned),
    ("canceled", InteractionStatus::Abandoned),
    ("cancelled", InteractionStatus::Abandoned),
    ("failed", InteractionStatus::Failed),
    ("error", InteractionStatus::Failed),
];

const OUTCOME_TABLE: &[(&str, Outcome)] = &[
    ("resolved", Outcome::Resolved),
    ("success", Outcome::Resolved),
    ("successful", Outcome::Resolved),
    ("escalated", Outcome::Escalated),
    ("escalation", Outcome::Escalated),
    ("ticketed", Outcome::Ticketed),
    ("ticket_created", Outcome::Ticketed),
    ("transferred", Outcome::Transferred),
    ("transfer", Outcome::Transferred),
    ("unknown", Outcome::Unknown),
];

fn fold(raw: &str) -> String {
    raw.trim()
        .chars()
        .map(|c| match c {
            '-' | ' ' => '_',
            other => other.to_ascii_lowercase(),
        })
        .collect()
}

fn lookup_table<T: Copy>(table: &[(&str, T)], raw: &str) -> VendorValue<T> {
    let folded = fold(raw);
    table
        .iter()
        .find(|(name, _)| *name == folded)
        .map(|(_, value)| VendorValue::Known(*value))
        .unwrap_or_else(|| VendorValue::Unrecognized(raw.to_string()))
}

pub fn map_status(raw: &str) -> VendorValue<InteractionStatus> {
    lookup_table(STATUS_TABLE, raw)
}

pub fn map_outcome(raw: &str) -> VendorValue<Outcome> {
    lookup_table(OUTCOME_TABLE, raw)
}
