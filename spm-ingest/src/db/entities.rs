//! Existing market, store and advisor lookups
//!
//! Read-only queries used to annotate discovered entities and to populate
//! the review screen's dropdowns.

use spm_common::db::{AdvisorMapping, AdvisorUser, Market, Store, ADVISOR_ROLE};
use spm_common::Result;
use sqlx::SqlitePool;

pub async fn list_markets(pool: &SqlitePool) -> Result<Vec<Market>> {
    let markets = sqlx::query_as::<_, Market>("SELECT id, name FROM markets ORDER BY name")
        .fetch_all(pool)
        .await?;

    Ok(markets)
}

pub async fn list_stores(pool: &SqlitePool) -> Result<Vec<Store>> {
    let stores = sqlx::query_as::<_, Store>(
        "SELECT id, market_id, name FROM stores ORDER BY market_id, name",
    )
    .fetch_all(pool)
    .await?;

    Ok(stores)
}

/// Accounts with the advisor role
pub async fn list_advisors(pool: &SqlitePool) -> Result<Vec<AdvisorUser>> {
    let advisors = sqlx::query_as::<_, AdvisorUser>(
        "SELECT id, full_name, external_id FROM users WHERE role = ? ORDER BY full_name",
    )
    .bind(ADVISOR_ROLE)
    .fetch_all(pool)
    .await?;

    Ok(advisors)
}

pub async fn list_advisor_mappings(pool: &SqlitePool) -> Result<Vec<AdvisorMapping>> {
    let mappings = sqlx::query_as::<_, AdvisorMapping>(
        "SELECT spreadsheet_name, user_id FROM advisor_mappings ORDER BY spreadsheet_name",
    )
    .fetch_all(pool)
    .await?;

    Ok(mappings)
}
