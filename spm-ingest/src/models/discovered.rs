//! Discovered entities and their match annotations

use serde::{Deserialize, Serialize};

/// Which kind of upload a discovered entity came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    ServicesData,
    OperationsData,
}

/// Market/store resolution chosen by the matcher or the reviewer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityAction {
    #[default]
    Create,
    Map,
    Ignore,
}

/// Advisor resolution; `create`/`map` are accepted on input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdvisorAction {
    #[default]
    #[serde(alias = "create")]
    CreateUser,
    #[serde(alias = "map")]
    MapUser,
    Ignore,
}

/// Where a `map` suggestion came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchSource {
    /// Persisted spreadsheet-name mapping from an earlier upload
    ExactMapping,
    /// String-similarity match
    Fuzzy,
    /// Market id taken from the upload's filename
    Filename,
    /// Chosen by the reviewer
    Manual,
}

/// Suggested or confirmed resolution for one discovered entity
///
/// `existing_id` is set iff the action maps; `proposed_id` only accompanies a
/// create. `score` is absent for filename-derived ids.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchAnnotation<A> {
    pub action: A,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub existing_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proposed_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    /// Display name of the matched record, for the review screen
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_source: Option<MatchSource>,
}

impl MatchAnnotation<EntityAction> {
    pub fn create(proposed_id: Option<String>) -> Self {
        Self {
            action: EntityAction::Create,
            proposed_id,
            ..Default::default()
        }
    }

    pub fn map(existing_id: i64, score: Option<f64>, matched_name: String, source: MatchSource) -> Self {
        Self {
            action: EntityAction::Map,
            existing_id: Some(existing_id),
            score,
            matched_name: Some(matched_name),
            match_source: Some(source),
            ..Default::default()
        }
    }
}

impl MatchAnnotation<AdvisorAction> {
    pub fn create_user(proposed_id: Option<String>) -> Self {
        Self {
            action: AdvisorAction::CreateUser,
            proposed_id,
            ..Default::default()
        }
    }

    pub fn map_user(user_id: i64, score: f64, matched_name: String, source: MatchSource) -> Self {
        Self {
            action: AdvisorAction::MapUser,
            existing_id: Some(user_id),
            score: Some(score),
            matched_name: Some(matched_name),
            match_source: Some(source),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveredMarket {
    pub name: String,
    pub natural_key: String,
    pub source: DataSource,
    #[serde(flatten)]
    pub annotation: MatchAnnotation<EntityAction>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveredStore {
    pub name: String,
    /// Parent market name; a store never exists without one
    pub market: String,
    pub natural_key: String,
    pub source: DataSource,
    #[serde(flatten)]
    pub annotation: MatchAnnotation<EntityAction>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveredAdvisor {
    pub name: String,
    pub natural_key: String,
    pub source: DataSource,
    /// Last-seen market, informational only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub market: Option<String>,
    /// Last-seen store, informational only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store: Option<String>,
    #[serde(flatten)]
    pub annotation: MatchAnnotation<AdvisorAction>,
}

/// Natural key of a store: unique per market
pub fn store_natural_key(market: &str, store: &str) -> String {
    format!("{}:{}", market, store)
}

/// Discovery output for one upload, in first-seen order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveredEntities {
    pub markets: Vec<DiscoveredMarket>,
    pub stores: Vec<DiscoveredStore>,
    pub advisors: Vec<DiscoveredAdvisor>,
}
