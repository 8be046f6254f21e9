// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Append-only interaction event log with an idempotency-key guard.

use rusqlite::{OptionalExtension, Row, params};
use switchboard_core::SwitchboardError;

use super::{enum_col, json_col, now_param, ts_col};
use crate::database::Database;
use crate::models::{InteractionEvent, NewEvent};

const COLUMNS: &str =
    "id, interaction_id, event_type, provider, provider_event_id, idempotency_key, payload, created_at";

fn row_to_event(row: &Row<'_>) -> rusqlite::Result<InteractionEvent> {
    Ok(InteractionEvent {
        id: row.get(0)?,
        interaction_id: row.get(1)?,
        event_type: row.get(2)?,
        provider: enum_col(row, 3)?,
        provider_event_id: row.get(4)?,
        idempotency_key: row.get(5)?,
        payload: json_col(row, 6)?,
        created_at: ts_col(row, 7)?,
    })
}

/// Insert an event. Returns `None` when the idempotency key is already taken.
pub async fn create_event(
    db: &Database,
    event: &NewEvent,
) -> Result<Option<InteractionEvent>, SwitchboardError> {
    let event = event.clone();
    let payload = serde_json::to_string(&event.payload).map_err(SwitchboardError::storage)?;
    db.connection()
        .call(move |conn| -> Result<Option<InteractionEvent>, rusqlite::Error> {
            let id = uuid::Uuid::new_v4().to_string();
            let provider = event.provider.to_string();
            let now = now_param();
            conn.query_row(
                &format!(
                    "INSERT INTO interaction_events ({COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                     ON CONFLICT(idempotency_key) DO NOTHING
                     RETURNING {COLUMNS}"
                ),
                params![
                    id,
                    event.interaction_id,
                    event.event_type,
                    provider,
                    event.provider_event_id,
                    event.idempotency_key,
                    payload,
                    now,
                ],
                row_to_event,
            )
            .optional()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

pub async fn find_by_idempotency_key(
    db: &Database,
    key: &str,
) -> Result<Option<InteractionEvent>, SwitchboardError> {
    let key = key.to_string();
    db.connection()
        .call(move |conn| -> Result<Option<InteractionEvent>, rusqlite::Error> {
            conn.query_row(
                &format!("SELECT {COLUMNS} FROM interaction_events WHERE idempotency_key = ?1"),
                params![key],
                row_to_event,
            )
            .optional()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

pub async fn list_events(
    db: &Database,
    interaction_id: &str,
) -> Result<Vec<InteractionEvent>, SwitchboardError> {
    let interaction_id = interaction_id.to_string();
    db.connection()
        .call(move |conn| -> Result<Vec<InteractionEvent>, rusqlite::Error> {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM interaction_events WHERE interaction_id = ?1
                 ORDER BY created_at ASC, rowid ASC"
            ))?;
            let rows = stmt.query_map(params![interaction_id], row_to_event)?;
            rows.collect()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::interactions::upsert_interaction;
    use crate::queries::test_support::{call_upsert, db};
    use serde_json::json;
    use switchboard_core::types::Provider;

    fn event(interaction_id: &str, key: Option<&str>) -> NewEvent {
        NewEvent {
            interaction_id: interaction_id.to_string(),
            event_type: "post_call_transcription".into(),
            provider: Provider::Elevenlabs,
            provider_event_id: key.map(str::to_string),
            idempotency_key: key.map(str::to_string),
            payload: json!({"raw": {"event_id": key}}),
        }
    }

    #[tokio::test]
    async fn duplicate_idempotency_key_is_ignored() {
        let db = db().await;
        let interaction = upsert_interaction(&db, &call_upsert("conv-1")).await.unwrap();

        let first = create_event(&db, &event(&interaction.id, Some("evt-1"))).await.unwrap();
        assert!(first.is_some());
        let second = create_event(&db, &event(&interaction.id, Some("evt-1"))).await.unwrap();
        assert!(second.is_none());

        let events = list_events(&db, &interaction.id).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].payload["raw"]["event_id"], "evt-1");

        let found = find_by_idempotency_key(&db, "evt-1").await.unwrap().unwrap();
        assert_eq!(found.interaction_id, interaction.id);
    }

    #[tokio::test]
    async fn null_keys_never_collide() {
        let db = db().await;
        let interaction = upsert_interaction(&db, &call_upsert("conv-1")).await.unwrap();
        for _ in 0..3 {
            assert!(create_event(&db, &event(&interaction.id, None)).await.unwrap().is_some());
        }
        assert_eq!(list_events(&db, &interaction.id).await.unwrap().len(), 3);
    }
}
