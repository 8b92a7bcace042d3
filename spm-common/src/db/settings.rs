//! Runtime settings stored in the `settings` table
//!
//! Every setting has a built-in default. Missing or NULL rows are (re)seeded
//! on startup so operators can tune values in the database.

use crate::Result;
use sqlx::SqlitePool;
use tracing::{info, warn};

/// Minimum edit-distance similarity for a fuzzy candidate to count at all
pub const MATCH_SIMILARITY_THRESHOLD_KEY: &str = "match_similarity_threshold";

/// Score a store/advisor match must exceed before it is auto-mapped
pub const MATCH_AUTO_MAP_THRESHOLD_KEY: &str = "match_auto_map_threshold";

pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.7;
pub const DEFAULT_AUTO_MAP_THRESHOLD: f64 = 0.8;

/// Thresholds used when annotating discovered entities
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchingSettings {
    pub similarity_threshold: f64,
    pub auto_map_threshold: f64,
}

impl Default for MatchingSettings {
    fn default() -> Self {
        Self {
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            auto_map_threshold: DEFAULT_AUTO_MAP_THRESHOLD,
        }
    }
}

impl MatchingSettings {
    /// Load thresholds from the database, falling back to defaults
    ///
    /// Values outside `[0, 1]` or unparseable values are ignored with a warning.
    pub async fn load(pool: &SqlitePool) -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            similarity_threshold: load_unit_interval(
                pool,
                MATCH_SIMILARITY_THRESHOLD_KEY,
                defaults.similarity_threshold,
            )
            .await?,
            auto_map_threshold: load_unit_interval(
                pool,
                MATCH_AUTO_MAP_THRESHOLD_KEY,
                defaults.auto_map_threshold,
            )
            .await?,
        })
    }
}

async fn load_unit_interval(pool: &SqlitePool, key: &str, default: f64) -> Result<f64> {
    match get_setting(pool, key).await? {
        Some(raw) => match raw.trim().parse::<f64>() {
            Ok(v) if (0.0..=1.0).contains(&v) => Ok(v),
            _ => {
                warn!("Setting '{}' has invalid value '{}', using {}", key, raw, default);
                Ok(default)
            }
        },
        None => Ok(default),
    }
}

/// Read a raw setting value
pub async fn get_setting(pool: &SqlitePool, key: &str) -> Result<Option<String>> {
    let value: Option<Option<String>> = sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
        .bind(key)
        .fetch_optional(pool)
        .await?;

    Ok(value.flatten())
}

/// Insert or replace a setting value
pub async fn set_setting(pool: &SqlitePool, key: &str, value: &str) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO settings (key, value, updated_at) VALUES (?, ?, CURRENT_TIMESTAMP)
        ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(key)
    .bind(value)
    .execute(pool)
    .await?;

    Ok(())
}

/// Seed default settings
pub async fn init_default_settings(pool: &SqlitePool) -> Result<()> {
    ensure_setting(
        pool,
        MATCH_SIMILARITY_THRESHOLD_KEY,
        &DEFAULT_SIMILARITY_THRESHOLD.to_string(),
    )
    .await?;
    ensure_setting(
        pool,
        MATCH_AUTO_MAP_THRESHOLD_KEY,
        &DEFAULT_AUTO_MAP_THRESHOLD.to_string(),
    )
    .await?;

    Ok(())
}

/// Ensure a setting exists and is non-NULL
async fn ensure_setting(pool: &SqlitePool, key: &str, default_value: &str) -> Result<()> {
    // INSERT OR IGNORE tolerates two services seeding at once
    let inserted = sqlx::query("INSERT OR IGNORE INTO settings (key, value) VALUES (?, ?)")
        .bind(key)
        .bind(default_value)
        .execute(pool)
        .await?
        .rows_affected();

    if inserted > 0 {
        info!("Initialized setting '{}' with default value: {}", key, default_value);
        return Ok(());
    }

    let reset = sqlx::query("UPDATE settings SET value = ? WHERE key = ? AND value IS NULL")
        .bind(default_value)
        .bind(key)
        .execute(pool)
        .await?
        .rows_affected();

    if reset > 0 {
        warn!("Setting '{}' was NULL, reset to default: {}", key, default_value);
    }

    Ok(())
}
