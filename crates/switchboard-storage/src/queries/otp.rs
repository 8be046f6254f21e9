// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! OTP challenge rows.

use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, Row, params};
use switchboard_core::SwitchboardError;
use switchboard_core::types::{
    IssuedOtp, OtpPurpose, OtpRateLimit, OtpStatus, format_timestamp, parse_timestamp,
};

use super::interactions::upsert_in;
use super::{enum_col, now_param, opt_ts_col, ts_col, ts_param};
use crate::database::Database;
use crate::models::{InteractionUpsert, NewOtpChallenge, OtpChallenge};

const COLUMNS: &str = "id, phone, purpose, otp_hash, expires_at, max_attempts, attempts, status, \
     correlation_id, interaction_id, verified_at, created_at, updated_at";

fn row_to_challenge(row: &Row<'_>) -> rusqlite::Result<OtpChallenge> {
    Ok(OtpChallenge {
        id: row.get(0)?,
        phone: row.get(1)?,
        purpose: enum_col(row, 2)?,
        otp_hash: row.get(3)?,
        expires_at: ts_col(row, 4)?,
        max_attempts: row.get(5)?,
        attempts: row.get(6)?,
        status: enum_col(row, 7)?,
        correlation_id: row.get(8)?,
        interaction_id: row.get(9)?,
        verified_at: opt_ts_col(row, 10)?,
        created_at: ts_col(row, 11)?,
        updated_at: ts_col(row, 12)?,
    })
}

enum Issue {
    Created(IssuedOtp),
    /// Window full; carries the oldest `created_at` inside it.
    Limited(Option<String>),
}

/// Count the window, then insert the interaction and a PENDING challenge,
/// all in one transaction so concurrent creates cannot overshoot `limit`.
pub async fn create_challenge(
    db: &Database,
    interaction: &InteractionUpsert,
    challenge: &NewOtpChallenge,
    limit: &OtpRateLimit,
) -> Result<IssuedOtp, SwitchboardError> {
    let upsert = interaction.clone();
    let c = challenge.clone();
    let limit = *limit;
    let result = db
        .connection()
        .call(move |conn| -> Result<Issue, rusqlite::Error> {
            let tx = conn.transaction()?;
            let purpose = c.purpose.to_string();
            let since = format_timestamp(&(c.created_at - limit.window));
            let (count, oldest): (i64, Option<String>) = tx.query_row(
                "SELECT COUNT(*), MIN(created_at) FROM otp_challenges
                 WHERE phone = ?1 AND purpose = ?2 AND created_at >= ?3",
                params![c.phone, purpose, since],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )?;
            if count >= limit.max {
                return Ok(Issue::Limited(oldest));
            }

            let interaction = upsert_in(&tx, &upsert)?;
            let id = uuid::Uuid::new_v4().to_string();
            let created_at = format_timestamp(&c.created_at);
            let challenge = tx.query_row(
                &format!(
                    "INSERT INTO otp_challenges ({COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, 'PENDING', ?7, ?8, NULL, ?9, ?9)
                     RETURNING {COLUMNS}"
                ),
                params![
                    id,
                    c.phone,
                    purpose,
                    c.otp_hash,
                    format_timestamp(&c.expires_at),
                    c.max_attempts,
                    c.correlation_id,
                    interaction.id,
                    created_at,
                ],
                row_to_challenge,
            )?;
            tx.commit()?;
            Ok(Issue::Created(IssuedOtp {
                interaction,
                challenge,
            }))
        })
        .await;
    match result {
        Ok(Issue::Created(issued)) => Ok(issued),
        Ok(Issue::Limited(oldest)) => Err(SwitchboardError::RateLimited {
            retry_after_secs: limit
                .retry_after(oldest.as_deref().and_then(parse_timestamp), challenge.created_at),
        }),
        Err(tokio_rusqlite::Error::Error(e)) if super::is_unique_violation(&e) => {
            Err(SwitchboardError::Conflict(format!(
                "correlation id `{}` already used",
                challenge.correlation_id
            )))
        }
        Err(e) => Err(crate::database::map_tr_err(e)),
    }
}

/// Challenges for `(phone, purpose)` created at or after `since`.
pub async fn count_since(
    db: &Database,
    phone: &str,
    purpose: OtpPurpose,
    since: DateTime<Utc>,
) -> Result<i64, SwitchboardError> {
    let phone = phone.to_string();
    db.connection()
        .call(move |conn| -> Result<i64, rusqlite::Error> {
            conn.query_row(
                "SELECT COUNT(*) FROM otp_challenges
                 WHERE phone = ?1 AND purpose = ?2 AND created_at >= ?3",
                params![phone, purpose.to_string(), format_timestamp(&since)],
                |row| row.get(0),
            )
        })
        .await
        .map_err(crate::database::map_tr_err)
}

pub async fn get_by_correlation(
    db: &Database,
    correlation_id: &str,
) -> Result<Option<OtpChallenge>, SwitchboardError> {
    let correlation_id = correlation_id.to_string();
    db.connection()
        .call(move |conn| -> Result<Option<OtpChallenge>, rusqlite::Error> {
            conn.query_row(
                &format!("SELECT {COLUMNS} FROM otp_challenges WHERE correlation_id = ?1"),
                params![correlation_id],
                row_to_challenge,
            )
            .optional()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

pub async fn get(db: &Database, id: &str) -> Result<Option<OtpChallenge>, SwitchboardError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| -> Result<Option<OtpChallenge>, rusqlite::Error> {
            conn.query_row(
                &format!("SELECT {COLUMNS} FROM otp_challenges WHERE id = ?1"),
                params![id],
                row_to_challenge,
            )
            .optional()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Spend one attempt on an open challenge with budget left. `None` otherwise.
pub async fn increment_attempts(db: &Database, id: &str) -> Result<Option<i32>, SwitchboardError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| -> Result<Option<i32>, rusqlite::Error> {
            conn.query_row(
                "UPDATE otp_challenges SET attempts = attempts + 1, updated_at = ?2
                 WHERE id = ?1 AND attempts < max_attempts AND status IN ('PENDING', 'SENT')
                 RETURNING attempts",
                params![id, now_param()],
                |row| row.get(0),
            )
            .optional()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// `status IN (...)` guard for a transition into `status`.
fn from_guard(status: OtpStatus) -> Option<String> {
    let from = status.allowed_from();
    if from.is_empty() {
        return None;
    }
    let list: Vec<String> = from.iter().map(|s| format!("'{s}'")).collect();
    Some(format!("status IN ({})", list.join(", ")))
}

/// Transition a challenge if its current status allows it.
pub async fn update_status(
    db: &Database,
    id: &str,
    status: OtpStatus,
    verified_at: Option<DateTime<Utc>>,
) -> Result<bool, SwitchboardError> {
    let Some(guard) = from_guard(status) else {
        return Ok(false);
    };
    let id = id.to_string();
    let changed = db
        .connection()
        .call(move |conn| -> Result<usize, rusqlite::Error> {
            conn.execute(
                &format!(
                    "UPDATE otp_challenges SET status = ?2,
                     verified_at = COALESCE(?3, verified_at), updated_at = ?4
                     WHERE id = ?1 AND {guard}"
                ),
                params![
                    id,
                    status.to_string(),
                    ts_param(verified_at.as_ref()),
                    now_param()
                ],
            )
        })
        .await
        .map_err(crate::database::map_tr_err)?;
    Ok(changed > 0)
}
