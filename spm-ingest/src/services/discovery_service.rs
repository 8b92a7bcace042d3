//! Upload discovery
//!
//! Runs one uploaded spreadsheet through extraction, entity discovery and
//! match annotation, then persists the result as a `pending_review` session.
//!
//! **Algorithm:**
//! 1. Validate metadata (report date present, file kind as expected)
//! 2. Build the field schema: built-in defaults plus market overrides
//! 3. Decode the file and extract rows; reject uploads with no data rows
//!    (services uploads count only rows naming an employee)
//! 4. Discover markets, stores and advisors
//! 5. Annotate them against existing records using the stored thresholds
//! 6. Persist the session and return it with the existing-entity lists

use chrono::{NaiveDate, Utc};
use serde::Serialize;
use spm_common::db::{AdvisorUser, Market, MatchingSettings, Store};
use spm_common::{Error, Result};
use sqlx::SqlitePool;
use uuid::Uuid;

use super::entity_discovery::discover;
use super::match_annotator::{annotate, ExistingEntities};
use super::spreadsheet_extractor::{extract, load_table, Anomaly};
use crate::db::{entities, field_mappings, sessions};
use crate::models::{
    DiscoveredAdvisor, DiscoveredMarket, DiscoveredStore, ParsedUpload, SessionStatus, UploadKind, UploadMetadata,
    UploadSession,
};

/// Everything the review screen needs after an upload
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryResponse {
    pub session_id: Uuid,
    pub file_kind: UploadKind,
    pub report_date: NaiveDate,
    pub row_count: usize,
    pub discovered_markets: Vec<DiscoveredMarket>,
    pub discovered_stores: Vec<DiscoveredStore>,
    pub discovered_advisors: Vec<DiscoveredAdvisor>,
    pub existing_markets: Vec<Market>,
    pub existing_stores: Vec<Store>,
    pub existing_advisors: Vec<AdvisorUser>,
    /// Brake-flush corrections applied during extraction
    pub correction_count: usize,
    pub anomalies: Vec<Anomaly>,
}

/// Load every record an upload can be matched against
pub async fn load_existing(pool: &SqlitePool) -> Result<ExistingEntities> {
    Ok(ExistingEntities {
        markets: entities::list_markets(pool).await?,
        stores: entities::list_stores(pool).await?,
        advisors: entities::list_advisors(pool).await?,
        advisor_mappings: entities::list_advisor_mappings(pool).await?,
    })
}

/// Extract, discover, annotate and persist one upload
///
/// `expected_kind` is the kind the caller's upload slot accepts, if any.
pub async fn discover_upload(
    pool: &SqlitePool,
    metadata: UploadMetadata,
    expected_kind: Option<UploadKind>,
    bytes: &[u8],
) -> Result<DiscoveryResponse> {
    let report_date = metadata
        .report_date
        .ok_or_else(|| Error::InvalidInput("Missing report date".to_string()))?;

    if let Some(expected) = expected_kind {
        if expected != metadata.file_kind {
            return Err(Error::InvalidInput(format!(
                "Wrong file kind: expected {} file, got {}",
                expected.as_str(),
                metadata.file_kind.as_str()
            )));
        }
    }

    let kind = metadata.file_kind;
    let schema = field_mappings::load_schema(pool, metadata.market_id, kind).await?;

    let table = load_table(bytes, &metadata.filename, schema.sheet_name.as_deref())
        .map_err(|e| Error::InvalidInput(format!("Could not read {}: {}", metadata.filename, e)))?;
    let extraction = extract(&table, &schema);

    let correction_count = extraction.correction_count();
    let upload = ParsedUpload::from_rows(kind, extraction.rows);

    if upload.rows().is_empty() {
        let message = match kind {
            UploadKind::Services => "No employee data found",
            UploadKind::Operations => "No operations data found",
        };
        return Err(Error::InvalidInput(message.to_string()));
    }

    let mut discovered = discover(&upload);
    let existing = load_existing(pool).await?;
    let settings = MatchingSettings::load(pool).await?;
    annotate(&mut discovered, &existing, settings, metadata.market_id);

    let session = UploadSession {
        id: Uuid::new_v4(),
        filename: metadata.filename,
        file_type: kind,
        report_date,
        uploaded_by: metadata.uploaded_by,
        market_id: metadata.market_id,
        discovered_markets: discovered.markets,
        discovered_stores: discovered.stores,
        discovered_advisors: discovered.advisors,
        raw_data: upload,
        status: SessionStatus::PendingReview,
        created_at: Utc::now(),
        confirmed_at: None,
        processed_at: None,
    };

    sessions::create_session(pool, &session).await?;

    tracing::info!(
        session_id = %session.id,
        file_kind = kind.as_str(),
        rows = session.raw_data.rows().len(),
        markets = session.discovered_markets.len(),
        stores = session.discovered_stores.len(),
        advisors = session.discovered_advisors.len(),
        corrections = correction_count,
        "Upload discovered, awaiting review"
    );

    Ok(DiscoveryResponse {
        session_id: session.id,
        file_kind: kind,
        report_date,
        row_count: session.raw_data.rows().len(),
        discovered_markets: session.discovered_markets,
        discovered_stores: session.discovered_stores,
        discovered_advisors: session.discovered_advisors,
        existing_markets: existing.markets,
        existing_stores: existing.stores,
        existing_advisors: existing.advisors,
        correction_count,
        anomalies: extraction.anomalies,
    })
}
