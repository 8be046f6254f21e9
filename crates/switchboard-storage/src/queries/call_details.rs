// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Call-detail upserts keyed by interaction id.

use rusqlite::{OptionalExtension, Row, params};
use switchboard_core::SwitchboardError;

use super::{now_param, ts_col};
use crate::database::Database;
use crate::models::{CallDetail, CallDetailPatch};

const COLUMNS: &str = "interaction_id, vendor_call_id, recording_url, transcript_text, \
     transcript_id, summary, duration_seconds, hangup_reason, created_at, updated_at";

fn row_to_call_detail(row: &Row<'_>) -> rusqlite::Result<CallDetail> {
    Ok(CallDetail {
        interaction_id: row.get(0)?,
        vendor_call_id: row.get(1)?,
        recording_url: row.get(2)?,
        transcript_text: row.get(3)?,
        transcript_id: row.get(4)?,
        summary: row.get(5)?,
        duration_seconds: row.get(6)?,
        hangup_reason: row.get(7)?,
        created_at: ts_col(row, 8)?,
        updated_at: ts_col(row, 9)?,
    })
}

/// Insert or merge a call detail. Populated columns are never overwritten
/// with NULL.
pub async fn upsert_call_detail(
    db: &Database,
    interaction_id: &str,
    patch: &CallDetailPatch,
) -> Result<CallDetail, SwitchboardError> {
    let interaction_id = interaction_id.to_string();
    let p = patch.clone();
    db.connection()
        .call(move |conn| -> Result<CallDetail, rusqlite::Error> {
            let now = now_param();
            conn.query_row(
                &format!(
                    "INSERT INTO call_details ({COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)
                     ON CONFLICT(interaction_id) DO UPDATE SET
                     vendor_call_id = COALESCE(excluded.vendor_call_id, vendor_call_id),
                     recording_url = COALESCE(excluded.recording_url, recording_url),
                     transcript_text = COALESCE(excluded.transcript_text, transcript_text),
                     transcript_id = COALESCE(excluded.transcript_id, transcript_id),
                     summary = COALESCE(excluded.summary, summary),
                     duration_seconds = COALESCE(excluded.duration_seconds, duration_seconds),
                     hangup_reason = COALESCE(excluded.hangup_reason, hangup_reason),
                     updated_at = excluded.updated_at
                     RETURNING {COLUMNS}"
                ),
                params![
                    interaction_id,
                    p.vendor_call_id,
                    p.recording_url,
                    p.transcript_text,
                    p.transcript_id,
                    p.summary,
                    p.duration_seconds,
                    p.hangup_reason,
                    now,
                ],
                row_to_call_detail,
            )
        })
        .await
        .map_err(crate::database::map_tr_err)
}

pub async fn get_call_detail(
    db: &Database,
    interaction_id: &str,
) -> Result<Option<CallDetail>, SwitchboardError> {
    let interaction_id = interaction_id.to_string();
    db.connection()
        .call(move |conn| -> Result<Option<CallDetail>, rusqlite::Error> {
            conn.query_row(
                &format!("SELECT {COLUMNS} FROM call_details WHERE interaction_id = ?1"),
                params![interaction_id],
                row_to_call_detail,
            )
            .optional()
        })
        .await
        .map_err(crate::database::map_tr_err)
}
