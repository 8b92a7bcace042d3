//! Match Annotator
//!
//! Turns fuzzy-match results into suggested actions on discovered entities.
//! Pure over its inputs: the caller loads existing records and settings.
//!
//! **Decision rules:**
//! - Market: any fuzzy match → `map`; else the filename market id (once per
//!   upload) → `map` if it exists, else `create` with that id proposed;
//!   else `create` with a slug proposed
//! - Store: candidates are the existing stores of the matched market only;
//!   `map` iff score > auto-map threshold
//! - Advisor: persisted name mapping → `map_user` (1.0, exact_mapping); else
//!   fuzzy `map_user` iff score > auto-map threshold; else `create_user`

use std::collections::HashMap;

use spm_common::db::{AdvisorMapping, AdvisorUser, Market, MatchingSettings, Store};

use super::fuzzy_matcher::{EntityKind, FuzzyMatcher, EXACT_SCORE};
use crate::models::{DiscoveredEntities, MatchAnnotation, MatchSource};

/// Existing database records, as offered to the review screen
#[derive(Debug, Clone, Default)]
pub struct ExistingEntities {
    pub markets: Vec<Market>,
    pub stores: Vec<Store>,
    pub advisors: Vec<AdvisorUser>,
    pub advisor_mappings: Vec<AdvisorMapping>,
}

impl ExistingEntities {
    fn market_name(&self, id: i64) -> Option<&str> {
        self.markets.iter().find(|m| m.id == id).map(|m| m.name.as_str())
    }

    fn advisor_name(&self, id: i64) -> Option<&str> {
        self.advisors
            .iter()
            .find(|a| a.id == id)
            .map(|a| a.full_name.as_str())
    }
}

/// Lowercase alphanumeric words joined by `-`
pub fn slugify(name: &str) -> String {
    name.split(|c: char| !c.is_alphanumeric())
        .filter(|part| !part.is_empty())
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("-")
}

/// Fill in suggested actions for every discovered entity
pub fn annotate(
    entities: &mut DiscoveredEntities,
    existing: &ExistingEntities,
    settings: MatchingSettings,
    filename_market_id: Option<i64>,
) {
    let matcher = FuzzyMatcher::new(settings.similarity_threshold);
    let auto_map = settings.auto_map_threshold;

    // Resolved market id per discovered market name, for store scoping
    let mut market_ids: HashMap<String, i64> = HashMap::new();
    let mut filename_id = filename_market_id;

    for market in entities.markets.iter_mut() {
        if let Some(found) = matcher.find_best(&market.name, &existing.markets, EntityKind::Market) {
            if filename_id == Some(found.entity.id) {
                filename_id = None;
            }
            market_ids.insert(market.name.clone(), found.entity.id);
            market.annotation = MatchAnnotation::map(
                found.entity.id,
                Some(found.score),
                found.entity.name.clone(),
                MatchSource::Fuzzy,
            );
            continue;
        }

        market.annotation = match filename_id.take() {
            Some(id) => match existing.market_name(id) {
                Some(name) => {
                    market_ids.insert(market.name.clone(), id);
                    MatchAnnotation::map(id, None, name.to_string(), MatchSource::Filename)
                }
                None => MatchAnnotation::create(Some(id.to_string())),
            },
            None => MatchAnnotation::create(Some(slugify(&market.name))),
        };
    }

    for store in entities.stores.iter_mut() {
        let candidates: Vec<Store> = match market_ids.get(&store.market) {
            Some(&market_id) => existing
                .stores
                .iter()
                .filter(|s| s.market_id == market_id)
                .cloned()
                .collect(),
            None => Vec::new(),
        };

        store.annotation = match matcher.find_best(&store.name, &candidates, EntityKind::Store) {
            Some(found) if found.score > auto_map => MatchAnnotation::map(
                found.entity.id,
                Some(found.score),
                found.entity.name.clone(),
                MatchSource::Fuzzy,
            ),
            _ => MatchAnnotation::create(Some(slugify(&store.natural_key))),
        };
    }

    let mappings: HashMap<String, i64> = existing
        .advisor_mappings
        .iter()
        .map(|m| (m.spreadsheet_name.trim().to_lowercase(), m.user_id))
        .collect();

    for advisor in entities.advisors.iter_mut() {
        if let Some(&user_id) = mappings.get(&advisor.name.trim().to_lowercase()) {
            let matched_name = existing
                .advisor_name(user_id)
                .unwrap_or(&advisor.name)
                .to_string();
            advisor.annotation =
                MatchAnnotation::map_user(user_id, EXACT_SCORE, matched_name, MatchSource::ExactMapping);
            continue;
        }

        advisor.annotation = match matcher.find_best(&advisor.name, &existing.advisors, EntityKind::Advisor) {
            Some(found) if found.score > auto_map => MatchAnnotation::map_user(
                found.entity.id,
                found.score,
                found.entity.full_name.clone(),
                MatchSource::Fuzzy,
            ),
            _ => MatchAnnotation::create_user(Some(slugify(&advisor.name))),
        };
    }

    tracing::debug!(
        markets = entities.markets.len(),
        stores = entities.stores.len(),
        advisors = entities.advisors.len(),
        "Match annotation complete"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        store_natural_key, AdvisorAction, DataSource, DiscoveredAdvisor, DiscoveredMarket, DiscoveredStore,
        EntityAction,
    };

    fn discovered(markets: &[&str], stores: &[(&str, &str)], advisors: &[&str]) -> DiscoveredEntities {
        DiscoveredEntities {
            markets: markets
                .iter()
                .map(|m| DiscoveredMarket {
                    name: m.to_string(),
                    natural_key: m.to_string(),
                    source: DataSource::ServicesData,
                    annotation: MatchAnnotation::default(),
                })
                .collect(),
            stores: stores
                .iter()
                .map(|(m, s)| DiscoveredStore {
                    name: s.to_string(),
                    market: m.to_string(),
                    natural_key: store_natural_key(m, s),
                    source: DataSource::ServicesData,
                    annotation: MatchAnnotation::default(),
                })
                .collect(),
            advisors: advisors
                .iter()
                .map(|a| DiscoveredAdvisor {
                    name: a.to_string(),
                    natural_key: a.to_string(),
                    source: DataSource::ServicesData,
                    market: None,
                    store: None,
                    annotation: MatchAnnotation::default(),
                })
                .collect(),
        }
    }

    fn existing() -> ExistingEntities {
        ExistingEntities {
            markets: vec![Market { id: 10, name: "Atlanta".into() }],
            stores: vec![
                Store { id: 100, market_id: 10, name: "Main St".into() },
                Store { id: 200, market_id: 99, name: "Elm".into() },
            ],
            advisors: vec![
                AdvisorUser { id: 5, full_name: "John Smith".into(), external_id: "adv-5".into() },
                AdvisorUser { id: 6, full_name: "Maria Lopez".into(), external_id: "adv-6".into() },
            ],
            advisor_mappings: vec![AdvisorMapping { spreadsheet_name: "J. Smith".into(), user_id: 5 }],
        }
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("North Atlanta"), "north-atlanta");
        assert_eq!(slugify("Atlanta:Main St."), "atlanta-main-st");
    }

    #[test]
    fn test_market_and_scoped_store_mapping() {
        let mut found = discovered(&["atlanta"], &[("atlanta", "Main St"), ("atlanta", "Elm")], &[]);
        annotate(&mut found, &existing(), MatchingSettings::default(), None);

        assert_eq!(found.markets[0].annotation.action, EntityAction::Map);
        assert_eq!(found.markets[0].annotation.existing_id, Some(10));

        assert_eq!(found.stores[0].annotation.action, EntityAction::Map);
        assert_eq!(found.stores[0].annotation.existing_id, Some(100));

        // "Elm" exists, but under another market
        assert_eq!(found.stores[1].annotation.action, EntityAction::Create);
    }

    #[test]
    fn test_new_market_implies_new_stores() {
        let mut found = discovered(&["Denver"], &[("Denver", "Main St")], &[]);
        annotate(&mut found, &existing(), MatchingSettings::default(), None);

        assert_eq!(found.markets[0].annotation.action, EntityAction::Create);
        assert_eq!(found.markets[0].annotation.proposed_id.as_deref(), Some("denver"));
        assert_eq!(found.stores[0].annotation.action, EntityAction::Create);
    }

    #[test]
    fn test_filename_market_id_fallback() {
        let mut found = discovered(&["Denver"], &[], &[]);
        annotate(&mut found, &existing(), MatchingSettings::default(), Some(10));
        let annotation = &found.markets[0].annotation;
        assert_eq!(annotation.action, EntityAction::Map);
        assert_eq!(annotation.existing_id, Some(10));
        assert_eq!(annotation.score, None);
        assert_eq!(annotation.match_source, Some(MatchSource::Filename));

        let mut found = discovered(&["Denver", "Boulder"], &[], &[]);
        annotate(&mut found, &existing(), MatchingSettings::default(), Some(42));
        assert_eq!(found.markets[0].annotation.action, EntityAction::Create);
        assert_eq!(found.markets[0].annotation.proposed_id.as_deref(), Some("42"));
        assert_eq!(found.markets[1].annotation.proposed_id.as_deref(), Some("boulder"));
    }

    #[test]
    fn test_advisor_rules() {
        let mut found = discovered(&[], &[], &["j. smith", "Maria Lopes", "Pat Quinn"]);
        annotate(&mut found, &existing(), MatchingSettings::default(), None);

        let by_mapping = &found.advisors[0].annotation;
        assert_eq!(by_mapping.action, AdvisorAction::MapUser);
        assert_eq!(by_mapping.existing_id, Some(5));
        assert_eq!(by_mapping.score, Some(1.0));
        assert_eq!(by_mapping.match_source, Some(MatchSource::ExactMapping));
        assert_eq!(by_mapping.matched_name.as_deref(), Some("John Smith"));

        // 10 of 11 chars → 0.909 > 0.8
        let fuzzy = &found.advisors[1].annotation;
        assert_eq!(fuzzy.action, AdvisorAction::MapUser);
        assert_eq!(fuzzy.existing_id, Some(6));
        assert_eq!(fuzzy.match_source, Some(MatchSource::Fuzzy));

        assert_eq!(found.advisors[2].annotation.action, AdvisorAction::CreateUser);
    }

    #[test]
    fn test_auto_map_threshold_gates_stores() {
        let mut found = discovered(&["Atlanta"], &[("Atlanta", "Main")], &[]);
        let strict = MatchingSettings {
            similarity_threshold: 0.7,
            auto_map_threshold: 0.95,
        };
        annotate(&mut found, &existing(), strict, None);

        // "main" is a substring of "main st" → 0.9, below the gate
        assert_eq!(found.stores[0].annotation.action, EntityAction::Create);
    }
}
