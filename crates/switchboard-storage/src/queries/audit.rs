// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Append-only audit log. Never read back by the service itself.

use rusqlite::params;
use switchboard_core::SwitchboardError;

use super::now_param;
use crate::database::Database;
use crate::models::AuditEntry;

pub async fn append(db: &Database, entry: &AuditEntry) -> Result<(), SwitchboardError> {
    let entry = entry.clone();
    let metadata = if entry.metadata.is_null() {
        None
    } else {
        Some(serde_json::to_string(&entry.metadata).map_err(SwitchboardError::storage)?)
    };
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                "INSERT INTO audit_log
                 (actor_type, actor_id, action, entity_type, entity_id, metadata, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    entry.actor_type.to_string(),
                    entry.actor_id,
                    entry.action,
                    entry.entity_type,
                    entry.entity_id,
                    metadata,
                    now_param(),
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::test_support::db;
    use serde_json::json;
    use switchboard_core::types::ActorType;

    #[tokio::test]
    async fn entries_are_appended() {
        let db = db().await;
        append(
            &db,
            &AuditEntry::new(ActorType::Api, "otp.verify", "otp_challenge")
                .entity("c-1")
                .metadata(json!({"success": false, "reason": "invalid"})),
        )
        .await
        .unwrap();
        append(&db, &AuditEntry::new(ActorType::System, "sync.run", "sync")).await.unwrap();

        let rows: Vec<(String, Option<String>)> = db
            .connection()
            .call(|conn| -> Result<Vec<(String, Option<String>)>, rusqlite::Error> {
                let mut stmt =
                    conn.prepare("SELECT action, metadata FROM audit_log ORDER BY id")?;
                let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
                rows.collect()
            })
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].0, "otp.verify");
        assert!(rows[0].1.as_deref().unwrap().contains("\"reason\":\"invalid\""));
        assert!(rows[1].1.is_none());
    }
}
