// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Interaction reconciliation.
//!
//! Upserts are single `INSERT ... ON CONFLICT DO UPDATE` statements against
//! the partial unique index matching the upsert's natural key. Every merged
//! column is written as `COALESCE(new, old)` so a caller that omits a field
//! never nulls out a value another entry point already stored.

use rusqlite::{Connection, OptionalExtension, Row, params};
use switchboard_core::SwitchboardError;
use switchboard_core::types::{InteractionKey, Provider};

use super::{
    enum_col, is_unique_violation, now_param, opt_enum_col, opt_ts_col, ts_col, ts_param,
};
use crate::database::Database;
use crate::models::{Interaction, InteractionFilter, InteractionPatch, InteractionUpsert};

pub(crate) const COLUMNS: &str = "id, channel, direction, provider, provider_conversation_id, \
     from_number, to_number, status, started_at, ended_at, assigned_agent, intent, outcome, \
     customer_ref, queue, created_at, updated_at";

pub(crate) fn row_to_interaction(row: &Row<'_>) -> rusqlite::Result<Interaction> {
    Ok(Interaction {
        id: row.get(0)?,
        channel: enum_col(row, 1)?,
        direction: enum_col(row, 2)?,
        provider: enum_col(row, 3)?,
        provider_conversation_id: row.get(4)?,
        from_number: row.get(5)?,
        to_number: row.get(6)?,
        status: enum_col(row, 7)?,
        started_at: opt_ts_col(row, 8)?,
        ended_at: opt_ts_col(row, 9)?,
        assigned_agent: row.get(10)?,
        intent: row.get(11)?,
        outcome: opt_enum_col(row, 12)?,
        customer_ref: row.get(13)?,
        queue: row.get(14)?,
        created_at: ts_col(row, 15)?,
        updated_at: ts_col(row, 16)?,
    })
}

/// Merge assignments shared by the conflict update and the retry update.
/// `?8..=?15` are the patch fields, `?16` is now.
const MERGE_SET: &str = "status = COALESCE(?8, status),
        started_at = COALESCE(?9, started_at),
        ended_at = COALESCE(?10, ended_at),
        assigned_agent = COALESCE(?11, assigned_agent),
        intent = COALESCE(?12, intent),
        outcome = COALESCE(?13, outcome),
        customer_ref = COALESCE(?14, customer_ref),
        queue = COALESCE(?15, queue),
        updated_at = ?16";

/// Fill an `UNKNOWN_PARTY` placeholder once a later payload identifies it.
const PARTY_SET: &str = "from_number = CASE WHEN from_number = 'unknown' THEN ?6 ELSE from_number END,
        to_number = CASE WHEN to_number = 'unknown' THEN ?7 ELSE to_number END";

fn upsert_sql(key: &InteractionKey) -> String {
    let (target, extra) = match key {
        InteractionKey::Conversation { .. } => (
            "(provider, provider_conversation_id) WHERE provider_conversation_id IS NOT NULL",
            format!(",\n        {PARTY_SET}"),
        ),
        InteractionKey::Parties { .. } => (
            "(provider, from_number, to_number, channel) WHERE provider_conversation_id IS NULL",
            String::new(),
        ),
    };
    format!(
        "INSERT INTO interactions ({COLUMNS})
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, COALESCE(?8, 'NEW'), COALESCE(?9, ?16), ?10, ?11,
                 ?12, ?13, ?14, ?15, ?16, ?16)
         ON CONFLICT {target} DO UPDATE SET
         {MERGE_SET}{extra}
         RETURNING {COLUMNS}"
    )
}

/// Keyed update used when the insert still hits a unique violation. Shares
/// the positional parameters of [`upsert_sql`]; unreferenced indices are bound
/// but ignored.
fn update_sql(key: &InteractionKey) -> String {
    let predicate = match key {
        InteractionKey::Conversation { .. } => "provider = ?4 AND provider_conversation_id = ?5",
        InteractionKey::Parties { .. } => {
            "provider = ?4 AND from_number = ?6 AND to_number = ?7 AND channel = ?2 \
             AND provider_conversation_id IS NULL"
        }
    };
    format!(
        "UPDATE interactions SET
         {MERGE_SET}
         WHERE {predicate}
         RETURNING {COLUMNS}"
    )
}

/// Create-if-absent, merge-if-present on the upsert's natural key.
pub async fn upsert_interaction(
    db: &Database,
    upsert: &InteractionUpsert,
) -> Result<Interaction, SwitchboardError> {
    let upsert = upsert.clone();
    db.connection()
        .call(move |conn| -> Result<Interaction, rusqlite::Error> { upsert_in(conn, &upsert) })
        .await
        .map_err(crate::database::map_tr_err)
}

/// [`upsert_interaction`] on an open connection or transaction.
pub(crate) fn upsert_in(
    conn: &Connection,
    upsert: &InteractionUpsert,
) -> rusqlite::Result<Interaction> {
    let key = upsert.key();
    let f = &upsert.fields;
    let id = uuid::Uuid::new_v4().to_string();
    let channel = upsert.channel.to_string();
    let direction = upsert.direction.to_string();
    let provider = upsert.provider.to_string();
    let status = f.status.map(|s| s.to_string());
    let started_at = ts_param(f.started_at.as_ref());
    let ended_at = ts_param(f.ended_at.as_ref());
    let outcome = f.outcome.map(|o| o.to_string());
    let now = now_param();
    let params = params![
        id,
        channel,
        direction,
        provider,
        upsert.provider_conversation_id,
        upsert.from_number,
        upsert.to_number,
        status,
        started_at,
        ended_at,
        f.assigned_agent,
        f.intent,
        outcome,
        f.customer_ref,
        f.queue,
        now,
    ];
    match conn.query_row(&upsert_sql(&key), params, row_to_interaction) {
        Err(e) if is_unique_violation(&e) => {
            // A concurrent writer inserted the same key through a
            // path the conflict target did not cover. Merge into it.
            tracing::debug!(?key, "upsert raced, retrying as update");
            conn.query_row(&update_sql(&key), params, row_to_interaction)
        }
        other => other,
    }
}

pub async fn get_interaction(
    db: &Database,
    id: &str,
) -> Result<Option<Interaction>, SwitchboardError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| -> Result<Option<Interaction>, rusqlite::Error> {
            conn.query_row(
                &format!("SELECT {COLUMNS} FROM interactions WHERE id = ?1"),
                params![id],
                row_to_interaction,
            )
            .optional()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

pub async fn find_by_conversation(
    db: &Database,
    provider: Provider,
    conversation_id: &str,
) -> Result<Option<Interaction>, SwitchboardError> {
    let conversation_id = conversation_id.to_string();
    db.connection()
        .call(move |conn| -> Result<Option<Interaction>, rusqlite::Error> {
            conn.query_row(
                &format!(
                    "SELECT {COLUMNS} FROM interactions
                     WHERE provider = ?1 AND provider_conversation_id = ?2"
                ),
                params![provider.to_string(), conversation_id],
                row_to_interaction,
            )
            .optional()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// List interactions newest first, with optional channel/status/provider filters.
pub async fn list_interactions(
    db: &Database,
    filter: &InteractionFilter,
) -> Result<Vec<Interaction>, SwitchboardError> {
    let channel = filter.channel.map(|c| c.to_string());
    let status = filter.status.map(|s| s.to_string());
    let provider = filter.provider.map(|p| p.to_string());
    let limit = filter.limit.clamp(1, 500);
    let offset = filter.offset.max(0);
    db.connection()
        .call(move |conn| -> Result<Vec<Interaction>, rusqlite::Error> {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM interactions
                 WHERE (?1 IS NULL OR channel = ?1)
                   AND (?2 IS NULL OR status = ?2)
                   AND (?3 IS NULL OR provider = ?3)
                 ORDER BY created_at DESC, id
                 LIMIT ?4 OFFSET ?5"
            ))?;
            let rows = stmt.query_map(
                params![channel, status, provider, limit, offset],
                row_to_interaction,
            )?;
            rows.collect()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

pub async fn list_from(
    db: &Database,
    from_number: &str,
    limit: i64,
) -> Result<Vec<Interaction>, SwitchboardError> {
    let from_number = from_number.to_string();
    db.connection()
        .call(move |conn| -> Result<Vec<Interaction>, rusqlite::Error> {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM interactions
                 WHERE from_number = ?1
                 ORDER BY created_at DESC
                 LIMIT ?2"
            ))?;
            let rows = stmt.query_map(params![from_number, limit], row_to_interaction)?;
            rows.collect()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Merge a patch into an existing interaction. Unknown ids are `NotFound`.
pub async fn patch_interaction(
    db: &Database,
    id: &str,
    patch: &InteractionPatch,
) -> Result<(), SwitchboardError> {
    let id_owned = id.to_string();
    let patch = patch.clone();
    let updated = db
        .connection()
        .call(move |conn| -> Result<usize, rusqlite::Error> {
            conn.execute(
                "UPDATE interactions SET
                 status = COALESCE(?2, status),
                 started_at = COALESCE(?3, started_at),
                 ended_at = COALESCE(?4, ended_at),
                 assigned_agent = COALESCE(?5, assigned_agent),
                 intent = COALESCE(?6, intent),
                 outcome = COALESCE(?7, outcome),
                 customer_ref = COALESCE(?8, customer_ref),
                 queue = COALESCE(?9, queue),
                 updated_at = ?10
                 WHERE id = ?1",
                params![
                    id_owned,
                    patch.status.map(|s| s.to_string()),
                    ts_param(patch.started_at.as_ref()),
                    ts_param(patch.ended_at.as_ref()),
                    patch.assigned_agent,
                    patch.intent,
                    patch.outcome.map(|o| o.to_string()),
                    patch.customer_ref,
                    patch.queue,
                    now_param(),
                ],
            )
        })
        .await
        .map_err(crate::database::map_tr_err)?;
    if updated == 0 {
        return Err(SwitchboardError::not_found("interaction", id));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::test_support::{call_upsert, db};
    use chrono::{TimeZone, Utc};
    use switchboard_core::types::{Channel, Direction, InteractionStatus, Outcome, UNKNOWN_PARTY};

    async fn count(db: &Database) -> i64 {
        db.connection()
            .call(|conn| -> Result<i64, rusqlite::Error> {
                conn.query_row("SELECT COUNT(*) FROM interactions", [], |row| row.get(0))
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn insert_defaults_status_and_started_at() {
        let db = db().await;
        let interaction = upsert_interaction(&db, &call_upsert("conv-1")).await.unwrap();
        assert_eq!(interaction.status, InteractionStatus::New);
        assert!(interaction.started_at.is_some());
        assert_eq!(interaction.provider_conversation_id.as_deref(), Some("conv-1"));
    }

    #[tokio::test]
    async fn second_upsert_merges_without_nulling() {
        let db = db().await;
        let mut first = call_upsert("conv-1");
        first.fields.status = Some(InteractionStatus::Completed);
        first.fields.outcome = Some(Outcome::Resolved);
        let a = upsert_interaction(&db, &first).await.unwrap();

        let started = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let mut second = call_upsert("conv-1");
        second.fields.started_at = Some(started);
        let b = upsert_interaction(&db, &second).await.unwrap();

        assert_eq!(a.id, b.id);
        assert_eq!(b.outcome, Some(Outcome::Resolved));
        assert_eq!(b.status, InteractionStatus::Completed);
        assert_eq!(b.started_at, Some(started));
        assert!(b.updated_at >= a.updated_at);
        assert_eq!(count(&db).await, 1);
    }

    #[tokio::test]
    async fn parties_key_used_without_conversation_id() {
        let db = db().await;
        let mut upsert = call_upsert("ignored");
        upsert.provider_conversation_id = None;
        upsert.channel = Channel::Sms;
        let a = upsert_interaction(&db, &upsert).await.unwrap();
        upsert.fields.intent = Some("billing".into());
        let b = upsert_interaction(&db, &upsert).await.unwrap();
        assert_eq!(a.id, b.id);
        assert_eq!(b.intent.as_deref(), Some("billing"));

        upsert.channel = Channel::Whatsapp;
        let c = upsert_interaction(&db, &upsert).await.unwrap();
        assert_ne!(a.id, c.id);
        assert_eq!(count(&db).await, 2);
    }

    #[tokio::test]
    async fn unknown_party_filled_by_later_payload() {
        let db = db().await;
        let mut upsert = call_upsert("conv-9");
        upsert.from_number = UNKNOWN_PARTY.into();
        upsert_interaction(&db, &upsert).await.unwrap();

        upsert.from_number = "5491122223333".into();
        let merged = upsert_interaction(&db, &upsert).await.unwrap();
        assert_eq!(merged.from_number, "5491122223333");

        upsert.from_number = "999".into();
        let kept = upsert_interaction(&db, &upsert).await.unwrap();
        assert_eq!(kept.from_number, "5491122223333");
    }

    #[tokio::test]
    async fn direction_only_applied_on_insert() {
        let db = db().await;
        let a = upsert_interaction(&db, &call_upsert("conv-1")).await.unwrap();
        let mut again = call_upsert("conv-1");
        again.direction = Direction::Outbound;
        let b = upsert_interaction(&db, &again).await.unwrap();
        assert_eq!(a.direction, Direction::Inbound);
        assert_eq!(b.direction, Direction::Inbound);
    }

    #[tokio::test]
    async fn concurrent_upserts_produce_one_row() {
        let db = std::sync::Arc::new(db().await);
        let mut handles = Vec::new();
        for i in 0..10 {
            let db = db.clone();
            handles.push(tokio::spawn(async move {
                let mut upsert = call_upsert("conv-race");
                upsert.fields.assigned_agent = Some(format!("agent-{i}"));
                upsert_interaction(&db, &upsert).await.unwrap().id
            }));
        }
        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap());
        }
        ids.dedup();
        assert_eq!(ids.len(), 1);
        assert_eq!(count(&db).await, 1);
    }

    #[tokio::test]
    async fn list_filters_and_paginates() {
        let db = db().await;
        for i in 0..3 {
            upsert_interaction(&db, &call_upsert(&format!("c-{i}"))).await.unwrap();
        }
        let mut sms = call_upsert("s-1");
        sms.provider = Provider::Twilio;
        sms.channel = Channel::Sms;
        upsert_interaction(&db, &sms).await.unwrap();

        let calls = list_interactions(
            &db,
            &InteractionFilter {
                channel: Some(Channel::Call),
                ..InteractionFilter::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(calls.len(), 3);

        let page = list_interactions(
            &db,
            &InteractionFilter {
                limit: 2,
                offset: 2,
                ..InteractionFilter::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(page.len(), 2);
    }

    #[tokio::test]
    async fn patch_merges_and_reports_missing() {
        let db = db().await;
        let created = upsert_interaction(&db, &call_upsert("conv-1")).await.unwrap();
        patch_interaction(&db, &created.id, &InteractionPatch::status(InteractionStatus::Failed))
            .await
            .unwrap();
        let after = get_interaction(&db, &created.id).await.unwrap().unwrap();
        assert_eq!(after.status, InteractionStatus::Failed);
        assert_eq!(after.started_at, created.started_at);

        let err = patch_interaction(&db, "nope", &InteractionPatch::default())
            .await
            .unwrap_err();
        assert!(matches!(err, SwitchboardError::NotFound { .. }));
    }

    #[tokio::test]
    async fn find_by_conversation_and_from() {
        let db = db().await;
        let created = upsert_interaction(&db, &call_upsert("conv-7")).await.unwrap();
        let found = find_by_conversation(&db, Provider::Elevenlabs, "conv-7")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, created.id);
        assert!(find_by_conversation(&db, Provider::Twilio, "conv-7").await.unwrap().is_none());

        let history = list_from(&db, "5491155550000", 5).await.unwrap();
        assert_eq!(history.len(), 1);
    }
}
