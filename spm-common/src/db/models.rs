//! Database models

use serde::{Deserialize, Serialize};

/// Role assigned to accounts created from spreadsheet advisors
pub const ADVISOR_ROLE: &str = "advisor";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Market {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Store {
    pub id: i64,
    pub market_id: i64,
    pub name: String,
}

/// User account with the `advisor` role
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct AdvisorUser {
    pub id: i64,
    pub full_name: String,
    pub external_id: String,
}

/// Persisted spreadsheet-name → user mapping
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct AdvisorMapping {
    pub spreadsheet_name: String,
    pub user_id: i64,
}
