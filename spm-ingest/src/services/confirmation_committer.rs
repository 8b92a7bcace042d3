//! Confirmation Committer
//!
//! Applies a reviewed session: resolves every discovered entity to a database
//! id, writes one performance record per parsed row and marks the session
//! processed. Everything happens in one transaction; any error rolls back.
//!
//! **Algorithm:**
//! 1. Load the session inside the transaction; it must be `pending_review`
//! 2. Merge reviewer decisions over the stored suggestions
//! 3. Resolve markets (create or map)
//! 4. Resolve stores; a created store needs its market resolved in step 3
//! 5. Resolve advisors (services uploads) and persist name mappings
//! 6. Insert one performance record per row
//! 7. Services rows with both store and advisor upsert org assignments
//! 8. Conditionally mark the session processed, then commit

use std::collections::HashMap;

use chrono::Utc;
use spm_common::db::ADVISOR_ROLE;
use spm_common::{Error, Result};
use sqlx::{Sqlite, SqlitePool, Transaction};
use uuid::Uuid;

use crate::db::sessions;
use crate::models::{
    store_natural_key, AdvisorAction, AdvisorDecision, ConfirmationPayload, ConfirmationSummary, DiscoveredAdvisor,
    DiscoveredMarket, DiscoveredStore, EntityAction, MarketDecision, MatchSource, ParsedUpload, SessionStatus,
    StoreDecision, UploadSession,
};

/// Commits reviewed upload sessions
pub struct ConfirmationCommitter {
    db: SqlitePool,
}

impl ConfirmationCommitter {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Commit `session_id` with the reviewer's overrides
    ///
    /// Fails with `NotPendingReview` if the session was already confirmed or
    /// cancelled, including by a concurrent request.
    pub async fn confirm(&self, session_id: Uuid, overrides: ConfirmationPayload) -> Result<ConfirmationSummary> {
        let mut tx = self.db.begin().await?;

        let session = sessions::get_session(&mut *tx, session_id).await?;
        if !session.status.can_transition_to(SessionStatus::Processed) {
            return Err(Error::NotPendingReview(session_id));
        }

        let mut summary = ConfirmationSummary::default();

        let market_decisions = merge_markets(&session.discovered_markets, overrides.markets);
        for decision in &market_decisions {
            if let Some(id) = resolve_market(&mut tx, decision).await? {
                summary.market_mappings.insert(decision.name.clone(), id);
            }
        }

        let store_decisions = merge_stores(&session.discovered_stores, overrides.stores);
        for (key, market, decision) in &store_decisions {
            let market_id = summary.market_mappings.get(market).copied();
            if let Some(id) = resolve_store(&mut tx, decision, market, market_id).await? {
                summary.store_mappings.insert(key.clone(), id);
            }
        }

        if let ParsedUpload::Services(_) = session.raw_data {
            let advisor_decisions = merge_advisors(&session.discovered_advisors, overrides.advisors);
            for decision in &advisor_decisions {
                if let Some(id) = resolve_advisor(&mut tx, decision).await? {
                    summary.advisor_mappings.insert(decision.name.clone(), id);
                }
            }
        }

        summary.processed_count = write_records(&mut tx, &session, &summary).await?;

        if sessions::mark_processed(&mut tx, session_id, Utc::now()).await? != 1 {
            return Err(Error::NotPendingReview(session_id));
        }

        tx.commit().await?;

        tracing::info!(
            session_id = %session_id,
            processed = summary.processed_count,
            markets = summary.market_mappings.len(),
            stores = summary.store_mappings.len(),
            advisors = summary.advisor_mappings.len(),
            "Upload session committed"
        );

        Ok(summary)
    }
}

fn same_name(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}

/// Stored suggestions with reviewer entries applied by name; reviewer
/// entries naming no discovered market are appended
fn merge_markets(discovered: &[DiscoveredMarket], overrides: Vec<MarketDecision>) -> Vec<MarketDecision> {
    let mut overrides: Vec<Option<MarketDecision>> = overrides.into_iter().map(Some).collect();

    let mut merged: Vec<MarketDecision> = discovered
        .iter()
        .map(|market| {
            let chosen = overrides
                .iter_mut()
                .find(|o| o.as_ref().is_some_and(|o| same_name(&o.name, &market.name)))
                .and_then(Option::take);

            match chosen {
                Some(decision) => MarketDecision {
                    name: market.name.clone(),
                    ..decision
                },
                None => MarketDecision {
                    name: market.name.clone(),
                    action: market.annotation.action,
                    existing_id: market.annotation.existing_id,
                    proposed_id: market.annotation.proposed_id.clone(),
                },
            }
        })
        .collect();

    merged.extend(overrides.into_iter().flatten());
    merged
}

/// `(natural key, market name, decision)` per store
///
/// A reviewer entry without a market applies to the first store of that name.
fn merge_stores(discovered: &[DiscoveredStore], overrides: Vec<StoreDecision>) -> Vec<(String, String, StoreDecision)> {
    let mut overrides: Vec<Option<StoreDecision>> = overrides.into_iter().map(Some).collect();

    let mut merged: Vec<(String, String, StoreDecision)> = discovered
        .iter()
        .map(|store| {
            let chosen = overrides
                .iter_mut()
                .find(|o| {
                    o.as_ref().is_some_and(|o| {
                        same_name(&o.name, &store.name)
                            && o.market.as_deref().map_or(true, |m| same_name(m, &store.market))
                    })
                })
                .and_then(Option::take);

            let decision = match chosen {
                Some(decision) => StoreDecision {
                    name: store.name.clone(),
                    market: Some(store.market.clone()),
                    ..decision
                },
                None => StoreDecision {
                    name: store.name.clone(),
                    market: Some(store.market.clone()),
                    action: store.annotation.action,
                    existing_id: store.annotation.existing_id,
                    proposed_id: store.annotation.proposed_id.clone(),
                },
            };
            (store.natural_key.clone(), store.market.clone(), decision)
        })
        .collect();

    for extra in overrides.into_iter().flatten() {
        match extra.market.clone() {
            Some(market) => merged.push((store_natural_key(&market, &extra.name), market, extra)),
            None => tracing::warn!(store = %extra.name, "Ignoring store decision with no market"),
        }
    }

    merged
}

/// Advisor decisions; a reviewer entry without a match source counts as manual
fn merge_advisors(discovered: &[DiscoveredAdvisor], overrides: Vec<AdvisorDecision>) -> Vec<AdvisorDecision> {
    let mut overrides: Vec<Option<AdvisorDecision>> = overrides.into_iter().map(Some).collect();

    let mut merged: Vec<AdvisorDecision> = discovered
        .iter()
        .map(|advisor| {
            let chosen = overrides
                .iter_mut()
                .find(|o| o.as_ref().is_some_and(|o| same_name(&o.name, &advisor.name)))
                .and_then(Option::take);

            match chosen {
                Some(decision) => AdvisorDecision {
                    name: advisor.name.clone(),
                    match_source: decision.match_source.or(Some(MatchSource::Manual)),
                    ..decision
                },
                None => AdvisorDecision {
                    name: advisor.name.clone(),
                    action: advisor.annotation.action,
                    existing_id: advisor.annotation.existing_id,
                    external_id: None,
                    full_name: None,
                    match_source: advisor.annotation.match_source,
                },
            }
        })
        .collect();

    merged.extend(overrides.into_iter().flatten().map(|mut extra| {
        extra.match_source = extra.match_source.or(Some(MatchSource::Manual));
        extra
    }));
    merged
}

async fn market_name(tx: &mut Transaction<'_, Sqlite>, id: i64) -> Result<Option<String>> {
    let name: Option<String> = sqlx::query_scalar("SELECT name FROM markets WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut **tx)
        .await?;
    Ok(name)
}

/// Resolved market id, or `None` for `ignore`
async fn resolve_market(tx: &mut Transaction<'_, Sqlite>, decision: &MarketDecision) -> Result<Option<i64>> {
    match decision.action {
        EntityAction::Ignore => Ok(None),
        EntityAction::Map => {
            let id = decision.existing_id.ok_or_else(|| {
                Error::InvalidInput(format!("Market '{}' is mapped without an existing id", decision.name))
            })?;
            if market_name(tx, id).await?.is_none() {
                return Err(Error::NotFound(format!(
                    "Market {} (mapped from '{}') not found",
                    id, decision.name
                )));
            }
            Ok(Some(id))
        }
        EntityAction::Create => {
            let explicit_id = decision
                .proposed_id
                .as_deref()
                .and_then(|p| p.trim().parse::<i64>().ok());

            if let Some(id) = explicit_id {
                match market_name(tx, id).await? {
                    Some(existing) if same_name(&existing, &decision.name) => return Ok(Some(id)),
                    Some(existing) => {
                        return Err(Error::Conflict(format!(
                            "Cannot create market '{}' with id {}: id already belongs to '{}'",
                            decision.name, id, existing
                        )))
                    }
                    None => {}
                }
            }

            let by_name: Option<i64> = sqlx::query_scalar("SELECT id FROM markets WHERE name = ?")
                .bind(decision.name.trim())
                .fetch_optional(&mut **tx)
                .await?;
            if let Some(id) = by_name {
                tracing::debug!(market = %decision.name, market_id = id, "Reusing existing market");
                return Ok(Some(id));
            }

            let result = sqlx::query("INSERT INTO markets (id, name) VALUES (?, ?)")
                .bind(explicit_id)
                .bind(decision.name.trim())
                .execute(&mut **tx)
                .await?;
            let id = result.last_insert_rowid();

            tracing::debug!(market = %decision.name, market_id = id, "Created market");
            Ok(Some(id))
        }
    }
}

/// Resolved store id, or `None` for `ignore`
async fn resolve_store(
    tx: &mut Transaction<'_, Sqlite>,
    decision: &StoreDecision,
    market: &str,
    market_id: Option<i64>,
) -> Result<Option<i64>> {
    match decision.action {
        EntityAction::Ignore => Ok(None),
        EntityAction::Map => {
            let id = decision.existing_id.ok_or_else(|| {
                Error::InvalidInput(format!("Store '{}' is mapped without an existing id", decision.name))
            })?;
            let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM stores WHERE id = ?")
                .bind(id)
                .fetch_optional(&mut **tx)
                .await?;
            if exists.is_none() {
                return Err(Error::NotFound(format!(
                    "Store {} (mapped from '{}') not found",
                    id, decision.name
                )));
            }
            Ok(Some(id))
        }
        EntityAction::Create => {
            let market_id = market_id.ok_or_else(|| {
                Error::InvalidInput(format!(
                    "Cannot create store '{}': market '{}' is not resolved",
                    decision.name, market
                ))
            })?;

            let existing: Option<i64> =
                sqlx::query_scalar("SELECT id FROM stores WHERE market_id = ? AND name = ?")
                    .bind(market_id)
                    .bind(decision.name.trim())
                    .fetch_optional(&mut **tx)
                    .await?;
            if let Some(id) = existing {
                return Ok(Some(id));
            }

            let result = sqlx::query("INSERT INTO stores (market_id, name) VALUES (?, ?)")
                .bind(market_id)
                .bind(decision.name.trim())
                .execute(&mut **tx)
                .await?;
            let id = result.last_insert_rowid();

            tracing::debug!(store = %decision.name, store_id = id, market_id, "Created store");
            Ok(Some(id))
        }
    }
}

fn generate_external_id() -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("adv-{}", &hex[..12])
}

async fn upsert_advisor_mapping(tx: &mut Transaction<'_, Sqlite>, spreadsheet_name: &str, user_id: i64) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO advisor_mappings (spreadsheet_name, user_id)
        VALUES (?, ?)
        ON CONFLICT(spreadsheet_name) DO UPDATE SET
            user_id = excluded.user_id,
            updated_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(spreadsheet_name.trim())
    .bind(user_id)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

/// Resolved user id, or `None` for `ignore`
async fn resolve_advisor(tx: &mut Transaction<'_, Sqlite>, decision: &AdvisorDecision) -> Result<Option<i64>> {
    match decision.action {
        AdvisorAction::Ignore => Ok(None),
        AdvisorAction::MapUser => {
            let id = decision.existing_id.ok_or_else(|| {
                Error::InvalidInput(format!("Advisor '{}' is mapped without a user id", decision.name))
            })?;
            let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM users WHERE id = ?")
                .bind(id)
                .fetch_optional(&mut **tx)
                .await?;
            if exists.is_none() {
                return Err(Error::NotFound(format!(
                    "User {} (mapped from '{}') not found",
                    id, decision.name
                )));
            }

            // Exact mappings already exist; everything else is remembered
            if decision.match_source != Some(MatchSource::ExactMapping) {
                upsert_advisor_mapping(tx, &decision.name, id).await?;
            }
            Ok(Some(id))
        }
        AdvisorAction::CreateUser => {
            let external_id = decision
                .external_id
                .clone()
                .unwrap_or_else(generate_external_id);
            let full_name = decision
                .full_name
                .as_deref()
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .unwrap_or(decision.name.trim());

            let result = sqlx::query("INSERT INTO users (full_name, role, external_id) VALUES (?, ?, ?)")
                .bind(full_name)
                .bind(ADVISOR_ROLE)
                .bind(&external_id)
                .execute(&mut **tx)
                .await?;
            let id = result.last_insert_rowid();

            upsert_advisor_mapping(tx, &decision.name, id).await?;

            tracing::debug!(advisor = %decision.name, user_id = id, external_id = %external_id, "Created advisor");
            Ok(Some(id))
        }
    }
}

/// One performance record per row, plus services org assignments
async fn write_records(
    tx: &mut Transaction<'_, Sqlite>,
    session: &UploadSession,
    resolved: &ConfirmationSummary,
) -> Result<usize> {
    // Rows without a market column fall back to the upload's market, if real
    let fallback_market = match session.market_id {
        Some(id) => market_name(tx, id).await?.map(|_| id),
        None => None,
    };
    let upload_date = session.report_date.format("%Y-%m-%d").to_string();
    let is_services = matches!(session.raw_data, ParsedUpload::Services(_));
    // Spreadsheet spellings of one advisor differ only in case
    let advisor_ids: HashMap<String, i64> = resolved
        .advisor_mappings
        .iter()
        .map(|(name, id)| (name.to_lowercase(), *id))
        .collect();

    let mut assignments: HashMap<(i64, i64), i64> = HashMap::new();
    let mut written = 0;

    for row in session.raw_data.rows() {
        let market_id = match row.market() {
            Some(market) => resolved.market_mappings.get(market).copied(),
            None => fallback_market,
        };
        let store_id = match (row.market(), row.store_name()) {
            (Some(market), Some(store)) => resolved
                .store_mappings
                .get(&store_natural_key(market, store))
                .copied(),
            _ => None,
        };
        let advisor_id = if is_services {
            row.employee_name()
                .and_then(|name| advisor_ids.get(&name.to_lowercase()).copied())
        } else {
            None
        };

        sqlx::query(
            r#"
            INSERT INTO performance_data (
                upload_session_id, upload_date, data_type,
                market_id, store_id, advisor_user_id, data
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(session.id.to_string())
        .bind(&upload_date)
        .bind(session.file_type.as_str())
        .bind(market_id)
        .bind(store_id)
        .bind(advisor_id)
        .bind(serde_json::to_string(row)?)
        .execute(&mut **tx)
        .await?;
        written += 1;

        if let (Some(user_id), Some(store_id), Some(market_id)) = (advisor_id, store_id, market_id) {
            assignments.insert((user_id, store_id), market_id);
        }
    }

    for ((user_id, store_id), market_id) in assignments {
        sqlx::query(
            "INSERT INTO user_store_assignments (user_id, store_id) VALUES (?, ?) ON CONFLICT DO NOTHING",
        )
        .bind(user_id)
        .bind(store_id)
        .execute(&mut **tx)
        .await?;

        sqlx::query(
            "INSERT INTO user_market_assignments (user_id, market_id) VALUES (?, ?) ON CONFLICT DO NOTHING",
        )
        .bind(user_id)
        .bind(market_id)
        .execute(&mut **tx)
        .await?;
    }

    Ok(written)
}
