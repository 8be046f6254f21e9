// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message inserts and delivery-status updates.

use rusqlite::{OptionalExtension, Row, params};
use switchboard_core::SwitchboardError;

use super::{enum_col, now_param, opt_ts_col, ts_col, ts_param};
use crate::database::Database;
use crate::models::{Message, MessageDeliveryUpdate, NewMessage};

const COLUMNS: &str = "id, interaction_id, channel, direction, provider_message_id, text, \
     media_url, provider_status, sent_at, delivered_at, read_at, created_at";

fn row_to_message(row: &Row<'_>) -> rusqlite::Result<Message> {
    Ok(Message {
        id: row.get(0)?,
        interaction_id: row.get(1)?,
        channel: enum_col(row, 2)?,
        direction: enum_col(row, 3)?,
        provider_message_id: row.get(4)?,
        text: row.get(5)?,
        media_url: row.get(6)?,
        provider_status: row.get(7)?,
        sent_at: opt_ts_col(row, 8)?,
        delivered_at: opt_ts_col(row, 9)?,
        read_at: opt_ts_col(row, 10)?,
        created_at: ts_col(row, 11)?,
    })
}

/// Insert a message. Each call is a distinct occurrence, never an upsert.
pub async fn create_message(db: &Database, msg: &NewMessage) -> Result<Message, SwitchboardError> {
    let msg = msg.clone();
    db.connection()
        .call(move |conn| -> Result<Message, rusqlite::Error> {
            let id = uuid::Uuid::new_v4().to_string();
            let channel = msg.channel.to_string();
            let direction = msg.direction.to_string();
            let sent_at = ts_param(msg.sent_at.as_ref());
            let now = now_param();
            conn.query_row(
                &format!(
                    "INSERT INTO messages ({COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, NULL, NULL, ?10)
                     RETURNING {COLUMNS}"
                ),
                params![
                    id,
                    msg.interaction_id,
                    channel,
                    direction,
                    msg.provider_message_id,
                    msg.text,
                    msg.media_url,
                    msg.provider_status,
                    sent_at,
                    now,
                ],
                row_to_message,
            )
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Most recent message carrying the vendor's message id.
pub async fn find_by_provider_id(
    db: &Database,
    provider_message_id: &str,
) -> Result<Option<Message>, SwitchboardError> {
    let provider_message_id = provider_message_id.to_string();
    db.connection()
        .call(move |conn| -> Result<Option<Message>, rusqlite::Error> {
            conn.query_row(
                &format!(
                    "SELECT {COLUMNS} FROM messages WHERE provider_message_id = ?1
                     ORDER BY created_at DESC LIMIT 1"
                ),
                params![provider_message_id],
                row_to_message,
            )
            .optional()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Apply a delivery-status webhook to one message.
///
/// Final states are sticky: a late in-flight status never replaces them,
/// and `delivered` never replaces `read`.
pub async fn update_delivery(
    db: &Database,
    id: &str,
    update: &MessageDeliveryUpdate,
) -> Result<(), SwitchboardError> {
    let id_owned = id.to_string();
    let update = update.clone();
    let changed = db
        .connection()
        .call(move |conn| -> Result<usize, rusqlite::Error> {
            conn.execute(
                "UPDATE messages SET
                 provider_status = CASE
                     WHEN lower(provider_status) IN ('delivered', 'read', 'failed', 'undelivered')
                          AND lower(?2) IN ('queued', 'accepted', 'sending', 'sent')
                         THEN provider_status
                     WHEN lower(provider_status) = 'read' AND lower(?2) = 'delivered'
                         THEN provider_status
                     ELSE ?2
                 END,
                 delivered_at = COALESCE(?3, delivered_at),
                 read_at = COALESCE(?4, read_at)
                 WHERE id = ?1",
                params![
                    id_owned,
                    update.provider_status,
                    ts_param(update.delivered_at.as_ref()),
                    ts_param(update.read_at.as_ref()),
                ],
            )
        })
        .await
        .map_err(crate::database::map_tr_err)?;
    if changed == 0 {
        return Err(SwitchboardError::not_found("message", id));
    }
    Ok(())
}

/// Messages of one interaction in arrival order.
pub async fn list_messages(
    db: &Database,
    interaction_id: &str,
) -> Result<Vec<Message>, SwitchboardError> {
    let interaction_id = interaction_id.to_string();
    db.connection()
        .call(move |conn| -> Result<Vec<Message>, rusqlite::Error> {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM messages WHERE interaction_id = ?1
                 ORDER BY created_at ASC, rowid ASC"
            ))?;
            let rows = stmt.query_map(params![interaction_id], row_to_message)?;
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
    use chrono::Utc;
    use switchboard_core::types::{Channel, Direction};

    async fn count_with_status(db: &Database, status: &str) -> i64 {
        let status = status.to_string();
        db.connection()
            .call(move |conn| -> Result<i64, rusqlite::Error> {
                conn.query_row(
                    "SELECT COUNT(*) FROM messages WHERE provider_status = ?1",
                    params![status],
                    |row| row.get(0),
                )
            })
            .await
            .unwrap()
    }

    fn outbound(interaction_id: &str, sid: &str) -> NewMessage {
        NewMessage {
            interaction_id: interaction_id.to_string(),
            channel: Channel::Sms,
            direction: Direction::Outbound,
            provider_message_id: Some(sid.to_string()),
            text: Some("Your code is 123456".into()),
            media_url: None,
            provider_status: Some("queued".into()),
            sent_at: Some(Utc::now()),
        }
    }

    #[tokio::test]
    async fn delivery_update_targets_exact_message() {
        let db = db().await;
        let interaction = upsert_interaction(&db, &call_upsert("conv-1")).await.unwrap();
        let target = create_message(&db, &outbound(&interaction.id, "SM123")).await.unwrap();
        create_message(&db, &outbound(&interaction.id, "SM999")).await.unwrap();

        let found = find_by_provider_id(&db, "SM123").await.unwrap().unwrap();
        assert_eq!(found.id, target.id);

        let delivered_at = Utc::now();
        update_delivery(
            &db,
            &target.id,
            &MessageDeliveryUpdate {
                provider_status: "delivered".into(),
                delivered_at: Some(delivered_at),
                read_at: None,
            },
        )
        .await
        .unwrap();

        let messages = list_messages(&db, &interaction.id).await.unwrap();
        assert_eq!(messages.len(), 2);
        let updated = messages.iter().find(|m| m.id == target.id).unwrap();
        assert_eq!(updated.provider_status.as_deref(), Some("delivered"));
        assert!(updated.delivered_at.is_some());
        assert_eq!(count_with_status(&db, "queued").await, 1);
    }

    #[tokio::test]
    async fn unknown_sid_is_none_and_update_of_missing_is_not_found() {
        let db = db().await;
        assert!(find_by_provider_id(&db, "SMnope").await.unwrap().is_none());
        let err = update_delivery(
            &db,
            "missing",
            &MessageDeliveryUpdate {
                provider_status: "failed".into(),
                delivered_at: None,
                read_at: None,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, SwitchboardError::NotFound { .. }));
    }

    #[tokio::test]
    async fn late_in_flight_status_does_not_regress_delivery() {
        let db = db().await;
        let interaction = upsert_interaction(&db, &call_upsert("conv-2")).await.unwrap();
        let message = create_message(&db, &outbound(&interaction.id, "SM555")).await.unwrap();
        let status = |s: &str| MessageDeliveryUpdate {
            provider_status: s.into(),
            delivered_at: None,
            read_at: None,
        };

        update_delivery(&db, &message.id, &status("sent")).await.unwrap();
        assert_eq!(count_with_status(&db, "sent").await, 1);
        update_delivery(&db, &message.id, &status("read")).await.unwrap();
        update_delivery(&db, &message.id, &status("delivered")).await.unwrap();
        update_delivery(&db, &message.id, &status("sent")).await.unwrap();

        let stored = find_by_provider_id(&db, "SM555").await.unwrap().unwrap();
        assert_eq!(stored.provider_status.as_deref(), Some("read"));
    }
}
