// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Query modules for CRUD operations on storage entities, plus the column
//! decoding helpers they share.

pub mod audit;
pub mod call_details;
pub mod events;
pub mod interactions;
pub mod messages;
pub mod otp;
pub mod queue;

use std::str::FromStr;

use chrono::{DateTime, Utc};
use rusqlite::Row;
use rusqlite::types::Type;
use switchboard_core::types::{format_timestamp, parse_timestamp};

fn conversion_error(idx: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, message.into())
}

/// Decode a text column holding a strum enum.
pub(crate) fn enum_col<T: FromStr>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    raw.parse()
        .map_err(|_| conversion_error(idx, format!("unrecognized enum value `{raw}`")))
}

pub(crate) fn opt_enum_col<T: FromStr>(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<T>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|raw| {
        raw.parse()
            .map_err(|_| conversion_error(idx, format!("unrecognized enum value `{raw}`")))
    })
    .transpose()
}

pub(crate) fn ts_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    parse_timestamp(&raw).ok_or_else(|| conversion_error(idx, format!("invalid timestamp `{raw}`")))
}

pub(crate) fn opt_ts_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|raw| {
        parse_timestamp(&raw)
            .ok_or_else(|| conversion_error(idx, format!("invalid timestamp `{raw}`")))
    })
    .transpose()
}

pub(crate) fn json_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<serde_json::Value> {
    let raw: Option<String> = row.get(idx)?;
    match raw {
        Some(raw) => serde_json::from_str(&raw)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))),
        None => Ok(serde_json::Value::Null),
    }
}

/// Persisted form of an optional timestamp parameter.
pub(crate) fn ts_param(ts: Option<&DateTime<Utc>>) -> Option<String> {
    ts.map(format_timestamp)
}

pub(crate) fn now_param() -> String {
    format_timestamp(&Utc::now())
}

/// Whether a rusqlite error is a UNIQUE / PRIMARY KEY constraint violation.
pub(crate) fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                || e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
    )
}

#[cfg(test)]
pub(crate) mod test_support {
    use switchboard_core::types::{Channel, Direction, InteractionPatch, InteractionUpsert, Provider};

    use crate::database::Database;

    pub async fn db() -> Database {
        Database::open_in_memory().await.unwrap()
    }

    pub fn call_upsert(conversation_id: &str) -> InteractionUpsert {
        InteractionUpsert {
            provider: Provider::Elevenlabs,
            channel: Channel::Call,
            direction: Direction::Inbound,
            provider_conversation_id: Some(conversation_id.to_string()),
            from_number: "5491155550000".into(),
            to_number: "5491100000000".into(),
            fields: InteractionPatch::default(),
        }
    }
}
