//! Database initialization tests

use spm_common::db::init::init_database;
use spm_common::db::settings::{
    get_setting, set_setting, MatchingSettings, MATCH_AUTO_MAP_THRESHOLD_KEY,
    MATCH_SIMILARITY_THRESHOLD_KEY,
};

#[tokio::test]
async fn test_database_creation_when_missing() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("nested").join("spm.db");

    let result = init_database(&db_path).await;

    assert!(result.is_ok(), "Database initialization failed: {:?}", result.err());
    assert!(db_path.exists(), "Database file was not created");
}

#[tokio::test]
async fn test_database_opens_existing() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("spm.db");

    let pool1 = init_database(&db_path).await.unwrap();
    pool1.close().await;

    let pool2 = init_database(&db_path).await;
    assert!(pool2.is_ok(), "Failed to open existing database: {:?}", pool2.err());
}

#[tokio::test]
async fn test_all_tables_created() {
    let dir = tempfile::tempdir().unwrap();
    let pool = init_database(&dir.path().join("spm.db")).await.unwrap();

    let tables: Vec<String> = sqlx::query_scalar(
        "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
    )
    .fetch_all(&pool)
    .await
    .unwrap();

    for expected in [
        "advisor_mappings",
        "field_mapping_overrides",
        "markets",
        "performance_data",
        "settings",
        "stores",
        "upload_sessions",
        "user_market_assignments",
        "user_store_assignments",
        "users",
    ] {
        assert!(tables.iter().any(|t| t == expected), "missing table {}", expected);
    }
}

#[tokio::test]
async fn test_default_settings_initialized() {
    let dir = tempfile::tempdir().unwrap();
    let pool = init_database(&dir.path().join("spm.db")).await.unwrap();

    assert_eq!(
        get_setting(&pool, MATCH_SIMILARITY_THRESHOLD_KEY).await.unwrap().as_deref(),
        Some("0.7")
    );

    let settings = MatchingSettings::load(&pool).await.unwrap();
    assert_eq!(settings, MatchingSettings::default());
}

#[tokio::test]
async fn test_invalid_threshold_falls_back_to_default() {
    let dir = tempfile::tempdir().unwrap();
    let pool = init_database(&dir.path().join("spm.db")).await.unwrap();

    set_setting(&pool, MATCH_AUTO_MAP_THRESHOLD_KEY, "1.7").await.unwrap();
    set_setting(&pool, MATCH_SIMILARITY_THRESHOLD_KEY, "0.65").await.unwrap();

    let settings = MatchingSettings::load(&pool).await.unwrap();
    assert_eq!(settings.auto_map_threshold, 0.8);
    assert_eq!(settings.similarity_threshold, 0.65);
}

#[tokio::test]
async fn test_foreign_keys_enforced() {
    let dir = tempfile::tempdir().unwrap();
    let pool = init_database(&dir.path().join("spm.db")).await.unwrap();

    let result = sqlx::query("INSERT INTO stores (market_id, name) VALUES (999, 'Orphan')")
        .execute(&pool)
        .await;
    assert!(result.is_err(), "store with unknown market should be rejected");
}
