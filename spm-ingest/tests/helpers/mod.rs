//! Shared test helpers for spm-ingest integration tests

#![allow(dead_code)]

use spm_common::db::init_database;
use spm_ingest::models::{UploadKind, UploadMetadata};
use spm_ingest::services::{discover_upload, DiscoveryResponse};
use sqlx::SqlitePool;
use tempfile::TempDir;

/// Fresh database in a temp dir; keep the `TempDir` alive for the test
pub async fn create_test_db() -> (TempDir, SqlitePool) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let pool = init_database(&temp_dir.path().join("spm_test.db"))
        .await
        .expect("Failed to initialize test database");
    (temp_dir, pool)
}

pub const SERVICES_HEADER: &str = "Market,Store,Employee,Sales,Brake Service,Brake Flush,Brake Flush to Service %";

/// Services CSV with one row per `(market, store, employee)`
pub fn services_csv(rows: &[(&str, &str, &str)]) -> Vec<u8> {
    let mut csv = String::from(SERVICES_HEADER);
    for (market, store, employee) in rows {
        csv.push_str(&format!("\n{},{},{},\"$1,250.00\",10,2,20%", market, store, employee));
    }
    csv.into_bytes()
}

pub fn operations_csv(rows: &[(&str, &str)]) -> Vec<u8> {
    let mut csv = String::from("Market,Store,Car Count,Sales");
    for (market, store) in rows {
        csv.push_str(&format!("\n{},{},\"1,024\",5000", market, store));
    }
    csv.into_bytes()
}

pub fn metadata(kind: UploadKind, market_id: Option<i64>) -> UploadMetadata {
    UploadMetadata {
        filename: format!("{}-2024-03-01.csv", kind.as_str()),
        file_kind: kind,
        report_date: chrono::NaiveDate::from_ymd_opt(2024, 3, 1),
        market_id,
        uploaded_by: Some("manager@example.com".to_string()),
    }
}

/// Run discovery on a CSV body
pub async fn discover_csv(pool: &SqlitePool, kind: UploadKind, body: &[u8]) -> DiscoveryResponse {
    discover_upload(pool, metadata(kind, None), None, body)
        .await
        .expect("discovery failed")
}

pub async fn count(pool: &SqlitePool, table: &str) -> i64 {
    sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
        .fetch_one(pool)
        .await
        .expect("count query failed")
}
