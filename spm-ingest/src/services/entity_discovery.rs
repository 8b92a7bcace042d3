//! Entity Discovery
//!
//! Scans parsed rows and collects the markets, stores and advisors they name.
//! Read-only over the rows; annotations are left at their defaults for the
//! match annotator to fill in.
//!
//! **Dedup keys:**
//! - Market: name (first occurrence wins)
//! - Store: `market:storeName` (same store name in two markets = two stores)
//! - Advisor: employee name, case-insensitive, services uploads only (first
//!   spelling kept as the name, last-seen market/store kept)

use std::collections::{HashMap, HashSet};

use crate::models::{
    store_natural_key, DiscoveredAdvisor, DiscoveredEntities, DiscoveredMarket, DiscoveredStore,
    MatchAnnotation, ParsedUpload,
};

/// Collect candidate entities from an upload
pub fn discover(upload: &ParsedUpload) -> DiscoveredEntities {
    let source = upload.kind().data_source();
    let rows = upload.rows();

    let mut entities = DiscoveredEntities::default();
    let mut seen_markets: HashSet<String> = HashSet::new();
    let mut seen_stores: HashSet<String> = HashSet::new();
    let mut advisor_index: HashMap<String, usize> = HashMap::new();

    for row in rows {
        let market = row.market();
        let store = row.store_name();

        if let Some(market) = market {
            if seen_markets.insert(market.to_string()) {
                entities.markets.push(DiscoveredMarket {
                    name: market.to_string(),
                    natural_key: market.to_string(),
                    source,
                    annotation: MatchAnnotation::default(),
                });
            }
        }

        if let (Some(market), Some(store)) = (market, store) {
            let key = store_natural_key(market, store);
            if seen_stores.insert(key.clone()) {
                entities.stores.push(DiscoveredStore {
                    name: store.to_string(),
                    market: market.to_string(),
                    natural_key: key,
                    source,
                    annotation: MatchAnnotation::default(),
                });
            }
        }

        if let ParsedUpload::Services(_) = upload {
            if let Some(employee) = row.employee_name() {
                let key = employee.to_lowercase();
                match advisor_index.get(&key) {
                    Some(&idx) => {
                        let advisor = &mut entities.advisors[idx];
                        if market.is_some() {
                            advisor.market = market.map(str::to_string);
                        }
                        if store.is_some() {
                            advisor.store = store.map(str::to_string);
                        }
                    }
                    None => {
                        advisor_index.insert(key, entities.advisors.len());
                        entities.advisors.push(DiscoveredAdvisor {
                            name: employee.to_string(),
                            natural_key: employee.to_string(),
                            source,
                            market: market.map(str::to_string),
                            store: store.map(str::to_string),
                            annotation: MatchAnnotation::default(),
                        });
                    }
                }
            }
        }
    }

    tracing::debug!(
        markets = entities.markets.len(),
        stores = entities.stores.len(),
        advisors = entities.advisors.len(),
        rows = rows.len(),
        "Entity discovery complete"
    );

    entities
}
