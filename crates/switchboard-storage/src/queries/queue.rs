// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Crash-safe job queue: `pending -> processing -> completed | failed`.
//!
//! A dequeued entry holds a five-minute lock. If the consumer dies without
//! acking or failing it, the lock expires and the entry is handed out again,
//! so delivery is at-least-once.

use rusqlite::{OptionalExtension, params};
use switchboard_core::SwitchboardError;

use crate::database::Database;
use crate::models::QueueEntry;

const NOW: &str = "strftime('%Y-%m-%dT%H:%M:%fZ', 'now')";

/// Enqueue a new item. Returns the auto-generated queue entry ID.
pub async fn enqueue(
    db: &Database,
    queue_name: &str,
    payload: &str,
    max_attempts: i32,
) -> Result<i64, SwitchboardError> {
    let queue_name = queue_name.to_string();
    let payload = payload.to_string();
    db.connection()
        .call(move |conn| -> Result<i64, rusqlite::Error> {
            conn.execute(
                "INSERT INTO queue (queue_name, payload, max_attempts) VALUES (?1, ?2, ?3)",
                params![queue_name, payload, max_attempts.max(1)],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Claim the oldest runnable entry of the named queue.
///
/// Runnable means `pending` with `run_after` in the past, or `processing`
/// with an expired lock. The select and the claim are one statement.
pub async fn dequeue(db: &Database, queue_name: &str) -> Result<Option<QueueEntry>, SwitchboardError> {
    let queue_name = queue_name.to_string();
    db.connection()
        .call(move |conn| -> Result<Option<QueueEntry>, rusqlite::Error> {
            conn.query_row(
                &format!(
                    "UPDATE queue SET status = 'processing',
                     locked_until = strftime('%Y-%m-%dT%H:%M:%fZ', 'now', '+5 minutes'),
                     updated_at = {NOW}
                     WHERE id = (
                         SELECT id FROM queue
                         WHERE queue_name = ?1
                           AND ((status = 'pending' AND run_after <= {NOW})
                             OR (status = 'processing' AND locked_until < {NOW}))
                         ORDER BY id ASC
                         LIMIT 1
                     )
                     RETURNING id, queue_name, payload, status, attempts, max_attempts,
                               created_at, updated_at, locked_until"
                ),
                params![queue_name],
                |row| {
                    Ok(QueueEntry {
                        id: row.get(0)?,
                        queue_name: row.get(1)?,
                        payload: row.get(2)?,
                        status: row.get(3)?,
                        attempts: row.get(4)?,
                        max_attempts: row.get(5)?,
                        created_at: row.get(6)?,
                        updated_at: row.get(7)?,
                        locked_until: row.get(8)?,
                    })
                },
            )
            .optional()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Mark an entry completed. The payload is cleared because OTP jobs carry
/// the plaintext code.
pub async fn ack(db: &Database, id: i64) -> Result<(), SwitchboardError> {
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                &format!(
                    "UPDATE queue SET status = 'completed', payload = '', locked_until = NULL,
                     updated_at = {NOW}
                     WHERE id = ?1"
                ),
                params![id],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Record a failed attempt.
///
/// Below `max_attempts` the entry returns to `pending` and becomes runnable
/// after `backoff_secs * attempts` seconds. At the limit it is marked
/// `failed` permanently and its payload cleared.
pub async fn fail(db: &Database, id: i64, backoff_secs: i64) -> Result<(), SwitchboardError> {
    let backoff_secs = backoff_secs.max(0);
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                &format!(
                    "UPDATE queue SET
                     attempts = attempts + 1,
                     status = CASE WHEN attempts + 1 >= max_attempts THEN 'failed' ELSE 'pending' END,
                     payload = CASE WHEN attempts + 1 >= max_attempts THEN '' ELSE payload END,
                     run_after = strftime('%Y-%m-%dT%H:%M:%fZ', 'now',
                                          printf('+%d seconds', ?2 * (attempts + 1))),
                     locked_until = NULL,
                     updated_at = {NOW}
                     WHERE id = ?1"
                ),
                params![id, backoff_secs],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn setup_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        (db, dir)
    }

    async fn row(db: &Database, id: i64) -> (String, i32, String) {
        db.connection()
            .call(move |conn| -> Result<(String, i32, String), rusqlite::Error> {
                conn.query_row(
                    "SELECT status, attempts, payload FROM queue WHERE id = ?1",
                    params![id],
                    |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
                )
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn enqueue_and_dequeue_lifecycle() {
        let (db, _dir) = setup_db().await;

        let id = enqueue(&db, "otp-sms", r#"{"code":"123456"}"#, 5).await.unwrap();
        let entry = dequeue(&db, "otp-sms").await.unwrap().unwrap();
        assert_eq!(entry.id, id);
        assert_eq!(entry.status, "processing");
        assert_eq!(entry.max_attempts, 5);
        assert!(entry.locked_until.is_some());

        // Locked entries are not handed out twice.
        assert!(dequeue(&db, "otp-sms").await.unwrap().is_none());
        assert!(dequeue(&db, "other").await.unwrap().is_none());

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn ack_completes_and_clears_payload() {
        let (db, _dir) = setup_db().await;
        let id = enqueue(&db, "otp-sms", "secret", 3).await.unwrap();
        dequeue(&db, "otp-sms").await.unwrap().unwrap();
        ack(&db, id).await.unwrap();

        let (status, _, payload) = row(&db, id).await;
        assert_eq!(status, "completed");
        assert!(payload.is_empty());
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn fail_without_backoff_is_retried_immediately() {
        let (db, _dir) = setup_db().await;
        let id = enqueue(&db, "otp-sms", "payload", 3).await.unwrap();
        dequeue(&db, "otp-sms").await.unwrap().unwrap();
        fail(&db, id, 0).await.unwrap();

        let (status, attempts, _) = row(&db, id).await;
        assert_eq!(status, "pending");
        assert_eq!(attempts, 1);
        assert_eq!(dequeue(&db, "otp-sms").await.unwrap().unwrap().id, id);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn fail_with_backoff_delays_redelivery() {
        let (db, _dir) = setup_db().await;
        let id = enqueue(&db, "otp-sms", "payload", 3).await.unwrap();
        dequeue(&db, "otp-sms").await.unwrap().unwrap();
        fail(&db, id, 60).await.unwrap();
        assert!(dequeue(&db, "otp-sms").await.unwrap().is_none());
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn fail_marks_permanently_failed_at_max_attempts() {
        let (db, _dir) = setup_db().await;
        let id = enqueue(&db, "otp-sms", "payload", 3).await.unwrap();
        for _ in 0..3 {
            dequeue(&db, "otp-sms").await.unwrap().unwrap();
            fail(&db, id, 0).await.unwrap();
        }
        let (status, attempts, payload) = row(&db, id).await;
        assert_eq!(status, "failed");
        assert_eq!(attempts, 3);
        assert!(payload.is_empty());
        assert!(dequeue(&db, "otp-sms").await.unwrap().is_none());
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn expired_lock_is_reclaimed() {
        let (db, _dir) = setup_db().await;
        let id = enqueue(&db, "otp-sms", "payload", 3).await.unwrap();
        dequeue(&db, "otp-sms").await.unwrap().unwrap();
        db.connection()
            .call(move |conn| -> Result<(), rusqlite::Error> {
                conn.execute(
                    "UPDATE queue SET locked_until = '2000-01-01T00:00:00.000Z' WHERE id = ?1",
                    params![id],
                )?;
                Ok(())
            })
            .await
            .unwrap();
        assert_eq!(dequeue(&db, "otp-sms").await.unwrap().unwrap().id, id);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn concurrent_writers_no_sqlite_busy() {
        let (db, _dir) = setup_db().await;
        let mut handles = Vec::new();
        for i in 0..10 {
            let conn = db.connection().clone();
            handles.push(tokio::spawn(async move {
                conn.call(move |conn| -> Result<(), rusqlite::Error> {
                    conn.execute(
                        "INSERT INTO queue (queue_name, payload) VALUES (?1, ?2)",
                        params![format!("q-{i}"), format!(r#"{{"n":{i}}}"#)],
                    )?;
                    Ok(())
                })
                .await
            }));
        }
        for handle in handles {
            let result = handle.await.unwrap();
            assert!(result.is_ok(), "concurrent write failed: {result:?}");
        }
        db.close().await.unwrap();
    }
}
