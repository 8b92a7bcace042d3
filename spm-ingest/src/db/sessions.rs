//! Upload session persistence
//!
//! Discovered entities and parsed rows are stored as JSON text columns so a
//! session can be confirmed without re-reading the uploaded file.

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use spm_common::{Error, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Executor, Row, Sqlite, SqlitePool, Transaction};
use uuid::Uuid;

use crate::models::{ParsedUpload, SessionStatus, SessionSummary, UploadKind, UploadSession};

const REPORT_DATE_FORMAT: &str = "%Y-%m-%d";

/// Persist a new session
pub async fn create_session(pool: &SqlitePool, session: &UploadSession) -> Result<()> {
    // Serialize everything before touching the pool
    let discovered_markets = serde_json::to_string(&session.discovered_markets)?;
    let discovered_stores = serde_json::to_string(&session.discovered_stores)?;
    let discovered_advisors = serde_json::to_string(&session.discovered_advisors)?;
    let raw_data = serde_json::to_string(&session.raw_data)?;

    sqlx::query(
        r#"
        INSERT INTO upload_sessions (
            id, filename, file_type, report_date, uploaded_by, market_id,
            discovered_markets, discovered_stores, discovered_advisors, raw_data,
            status, created_at, confirmed_at, processed_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(session.id.to_string())
    .bind(&session.filename)
    .bind(session.file_type.as_str())
    .bind(session.report_date.format(REPORT_DATE_FORMAT).to_string())
    .bind(&session.uploaded_by)
    .bind(session.market_id)
    .bind(discovered_markets)
    .bind(discovered_stores)
    .bind(discovered_advisors)
    .bind(raw_data)
    .bind(session.status.as_str())
    .bind(format_timestamp(session.created_at))
    .bind(session.confirmed_at.map(format_timestamp))
    .bind(session.processed_at.map(format_timestamp))
    .execute(pool)
    .await?;

    tracing::debug!(session_id = %session.id, filename = %session.filename, "Upload session created");

    Ok(())
}

/// Load a session; NULL JSON columns come back as empty collections
///
/// Accepts the pool or an open transaction.
pub async fn get_session<'e, E>(executor: E, session_id: Uuid) -> Result<UploadSession>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query(
        r#"
        SELECT id, filename, file_type, report_date, uploaded_by, market_id,
               discovered_markets, discovered_stores, discovered_advisors, raw_data,
               status, created_at, confirmed_at, processed_at
        FROM upload_sessions
        WHERE id = ?
        "#,
    )
    .bind(session_id.to_string())
    .fetch_optional(executor)
    .await?
    .ok_or_else(|| Error::NotFound(format!("Upload session {} not found", session_id)))?;

    session_from_row(&row)
}

/// Cancel a pending session
///
/// Returns rows affected: 0 when the session is missing or already terminal.
pub async fn cancel_session(pool: &SqlitePool, session_id: Uuid) -> Result<u64> {
    let result = sqlx::query(
        "UPDATE upload_sessions SET status = ? WHERE id = ? AND status = ?",
    )
    .bind(SessionStatus::Cancelled.as_str())
    .bind(session_id.to_string())
    .bind(SessionStatus::PendingReview.as_str())
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

/// Move a pending session to `processed` inside the commit transaction
///
/// Returns rows affected; anything but 1 means another writer got there first.
pub async fn mark_processed(
    tx: &mut Transaction<'_, Sqlite>,
    session_id: Uuid,
    at: DateTime<Utc>,
) -> Result<u64> {
    let at = format_timestamp(at);
    let result = sqlx::query(
        r#"
        UPDATE upload_sessions
        SET status = ?, confirmed_at = ?, processed_at = ?
        WHERE id = ? AND status = ?
        "#,
    )
    .bind(SessionStatus::Processed.as_str())
    .bind(&at)
    .bind(&at)
    .bind(session_id.to_string())
    .bind(SessionStatus::PendingReview.as_str())
    .execute(&mut **tx)
    .await?;

    Ok(result.rows_affected())
}

/// Sessions newest first, optionally filtered by status
pub async fn list_sessions(
    pool: &SqlitePool,
    status: Option<SessionStatus>,
    limit: i64,
) -> Result<Vec<SessionSummary>> {
    let rows = sqlx::query(
        r#"
        SELECT id, filename, file_type, report_date, uploaded_by, market_id,
               status, created_at, processed_at
        FROM upload_sessions
        WHERE (?1 IS NULL OR status = ?1)
        ORDER BY created_at DESC
        LIMIT ?2
        "#,
    )
    .bind(status.map(|s| s.as_str()))
    .bind(limit)
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| {
            Ok(SessionSummary {
                id: parse_uuid(row.get("id"))?,
                filename: row.get("filename"),
                file_type: parse_kind(row.get("file_type"))?,
                report_date: parse_date(row.get("report_date"))?,
                uploaded_by: row.get("uploaded_by"),
                market_id: row.get("market_id"),
                status: parse_status(row.get("status"))?,
                created_at: parse_timestamp(row.get("created_at"))?,
                processed_at: row
                    .get::<Option<String>, _>("processed_at")
                    .map(|s| parse_timestamp(&s))
                    .transpose()?,
            })
        })
        .collect()
}

fn session_from_row(row: &SqliteRow) -> Result<UploadSession> {
    let file_type = parse_kind(row.get("file_type"))?;

    let raw_data = match row.get::<Option<String>, _>("raw_data") {
        Some(json) if !json.trim().is_empty() => serde_json::from_str(&json)?,
        _ => ParsedUpload::empty(file_type),
    };

    Ok(UploadSession {
        id: parse_uuid(row.get("id"))?,
        filename: row.get("filename"),
        file_type,
        report_date: parse_date(row.get("report_date"))?,
        uploaded_by: row.get("uploaded_by"),
        market_id: row.get("market_id"),
        discovered_markets: json_list(row, "discovered_markets")?,
        discovered_stores: json_list(row, "discovered_stores")?,
        discovered_advisors: json_list(row, "discovered_advisors")?,
        raw_data,
        status: parse_status(row.get("status"))?,
        created_at: parse_timestamp(row.get("created_at"))?,
        confirmed_at: row
            .get::<Option<String>, _>("confirmed_at")
            .map(|s| parse_timestamp(&s))
            .transpose()?,
        processed_at: row
            .get::<Option<String>, _>("processed_at")
            .map(|s| parse_timestamp(&s))
            .transpose()?,
    })
}

fn json_list<T: serde::de::DeserializeOwned>(row: &SqliteRow, column: &str) -> Result<Vec<T>> {
    match row.get::<Option<String>, _>(column) {
        Some(json) if !json.trim().is_empty() => Ok(serde_json::from_str(&json)?),
        _ => Ok(Vec::new()),
    }
}

fn parse_uuid(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s).map_err(|e| Error::Internal(format!("Invalid session id '{}': {}", s, e)))
}

fn parse_kind(s: &str) -> Result<UploadKind> {
    UploadKind::parse(s).ok_or_else(|| Error::Internal(format!("Unknown file type '{}'", s)))
}

fn parse_status(s: &str) -> Result<SessionStatus> {
    SessionStatus::parse(s).ok_or_else(|| Error::Internal(format!("Unknown session status '{}'", s)))
}

fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, REPORT_DATE_FORMAT)
        .map_err(|e| Error::Internal(format!("Invalid report date '{}': {}", s, e)))
}

/// Fixed-width RFC 3339 so `ORDER BY created_at` sorts chronologically
fn format_timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("Invalid timestamp '{}': {}", s, e)))
}
