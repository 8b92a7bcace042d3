//! Reviewer decisions submitted at confirmation time
//!
//! The review UI may send each collection either as an array or as an object
//! keyed by entity name. Both shapes are normalized to an ordered `Vec` here,
//! at deserialization, so the committer only ever sees sequences.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

use super::discovered::{AdvisorAction, EntityAction, MatchSource};

/// Entry that can take its name from the key of a keyed-object payload
pub trait NamedDecision {
    fn name_mut(&mut self) -> &mut String;
}

/// Deserialize an array, or a keyed object whose values lack a name
pub fn array_or_keyed<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + NamedDecision,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Loose<T> {
        List(Vec<T>),
        Keyed(BTreeMap<String, T>),
    }

    Ok(match Option::<Loose<T>>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(Loose::List(items)) => items,
        Some(Loose::Keyed(map)) => map
            .into_iter()
            .map(|(key, mut item)| {
                if item.name_mut().trim().is_empty() {
                    *item.name_mut() = key;
                }
                item
            })
            .collect(),
    })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketDecision {
    #[serde(default)]
    pub name: String,
    pub action: EntityAction,
    #[serde(default, deserialize_with = "lenient_id")]
    pub existing_id: Option<i64>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub proposed_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreDecision {
    #[serde(default)]
    pub name: String,
    /// Parent market name; needed to pick the right store when names repeat
    #[serde(default)]
    pub market: Option<String>,
    pub action: EntityAction,
    #[serde(default, deserialize_with = "lenient_id")]
    pub existing_id: Option<i64>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub proposed_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvisorDecision {
    #[serde(default)]
    pub name: String,
    pub action: AdvisorAction,
    #[serde(default, deserialize_with = "lenient_id", alias = "userId")]
    pub existing_id: Option<i64>,
    /// External employee id for a new account; generated when absent
    #[serde(default, deserialize_with = "lenient_string")]
    pub external_id: Option<String>,
    /// Display name for a new account; defaults to the spreadsheet name
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub match_source: Option<MatchSource>,
}

impl NamedDecision for MarketDecision {
    fn name_mut(&mut self) -> &mut String {
        &mut self.name
    }
}

impl NamedDecision for StoreDecision {
    fn name_mut(&mut self) -> &mut String {
        &mut self.name
    }
}

impl NamedDecision for AdvisorDecision {
    fn name_mut(&mut self) -> &mut String {
        &mut self.name
    }
}

/// Reviewer overrides; entities without an entry keep the stored suggestion
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmationPayload {
    #[serde(default, deserialize_with = "array_or_keyed")]
    pub markets: Vec<MarketDecision>,
    #[serde(default, deserialize_with = "array_or_keyed")]
    pub stores: Vec<StoreDecision>,
    #[serde(default, deserialize_with = "array_or_keyed")]
    pub advisors: Vec<AdvisorDecision>,
}

/// Result of a successful commit, keyed by source name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmationSummary {
    pub processed_count: usize,
    pub market_mappings: BTreeMap<String, i64>,
    /// Keyed by store natural key (`market:storeName`)
    pub store_mappings: BTreeMap<String, i64>,
    pub advisor_mappings: BTreeMap<String, i64>,
}

/// Id fields arrive as numbers, numeric strings, empty strings or null
fn lenient_id<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Int(i64),
        Float(f64),
        Text(String),
    }

    Ok(match Option::<Raw>::deserialize(deserializer)? {
        Some(Raw::Int(i)) => Some(i),
        Some(Raw::Float(f)) if f.fract() == 0.0 => Some(f as i64),
        Some(Raw::Text(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Int(i64),
        Text(String),
    }

    Ok(match Option::<Raw>::deserialize(deserializer)? {
        Some(Raw::Int(i)) => Some(i.to_string()),
        Some(Raw::Text(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    })
}
