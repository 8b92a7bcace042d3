//! Market-scoped field mapping overrides

use spm_common::Result;
use sqlx::{Row, SqlitePool};
use tracing::warn;

use crate::models::{FieldMapping, FieldSchema, UploadKind, ValueType};

/// Overrides configured for a market and upload kind, in `sort_order`
///
/// Rows with an unknown `value_type` are skipped with a warning.
pub async fn load_overrides(pool: &SqlitePool, market_id: i64, kind: UploadKind) -> Result<Vec<FieldMapping>> {
    let rows = sqlx::query(
        r#"
        SELECT spreadsheet_header, canonical_field, value_type, is_percentage
        FROM field_mapping_overrides
        WHERE market_id = ? AND file_type = ?
        ORDER BY sort_order, id
        "#,
    )
    .bind(market_id)
    .bind(kind.as_str())
    .fetch_all(pool)
    .await?;

    let mut overrides = Vec::with_capacity(rows.len());
    for row in rows {
        let raw_type: String = row.get("value_type");
        let Some(value_type) = ValueType::parse(&raw_type) else {
            warn!(market_id, value_type = %raw_type, "Skipping field override with unknown value type");
            continue;
        };

        overrides.push(FieldMapping {
            spreadsheet_header: row.get("spreadsheet_header"),
            canonical_field: row.get("canonical_field"),
            value_type,
            is_percentage: row.get::<i64, _>("is_percentage") != 0,
        });
    }

    Ok(overrides)
}

/// Built-in schema for `kind` with the market's overrides merged on top
pub async fn load_schema(pool: &SqlitePool, market_id: Option<i64>, kind: UploadKind) -> Result<FieldSchema> {
    let base = FieldSchema::default_for(kind);
    match market_id {
        Some(id) => Ok(base.with_overrides(&load_overrides(pool, id, kind).await?)),
        None => Ok(base),
    }
}

/// Insert or replace one override
pub async fn upsert_override(
    pool: &SqlitePool,
    market_id: i64,
    kind: UploadKind,
    mapping: &FieldMapping,
    sort_order: i64,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO field_mapping_overrides
            (market_id, file_type, spreadsheet_header, canonical_field, value_type, is_percentage, sort_order)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(market_id, file_type, canonical_field) DO UPDATE SET
            spreadsheet_header = excluded.spreadsheet_header,
            value_type = excluded.value_type,
            is_percentage = excluded.is_percentage,
            sort_order = excluded.sort_order
        "#,
    )
    .bind(market_id)
    .bind(kind.as_str())
    .bind(&mapping.spreadsheet_header)
    .bind(&mapping.canonical_field)
    .bind(mapping.value_type.as_str())
    .bind(mapping.is_percentage)
    .bind(sort_order)
    .execute(pool)
    .await?;

    Ok(())
}
