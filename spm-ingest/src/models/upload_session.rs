//! Upload session state machine
//!
//! An upload session is the durable unit of reconciliation work:
//! PENDING_REVIEW → PROCESSED (confirm) or PENDING_REVIEW → CANCELLED (abort).
//! Sessions are never deleted, only transitioned.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::discovered::{DataSource, DiscoveredAdvisor, DiscoveredMarket, DiscoveredStore};
use super::raw_row::RawRow;

/// Spreadsheet family, derived upstream from the filename
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadKind {
    /// Advisor-level KPIs (one row per employee)
    Services,
    /// Store-level KPIs (one row per store)
    Operations,
}

impl UploadKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            UploadKind::Services => "services",
            UploadKind::Operations => "operations",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "services" | "service" => Some(UploadKind::Services),
            "operations" | "operation" | "ops" => Some(UploadKind::Operations),
            _ => None,
        }
    }

    pub fn data_source(&self) -> DataSource {
        match self {
            UploadKind::Services => DataSource::ServicesData,
            UploadKind::Operations => DataSource::OperationsData,
        }
    }
}

/// Session lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    PendingReview,
    Processed,
    Cancelled,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::PendingReview => "pending_review",
            SessionStatus::Processed => "processed",
            SessionStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending_review" => Some(SessionStatus::PendingReview),
            "processed" => Some(SessionStatus::Processed),
            "cancelled" => Some(SessionStatus::Cancelled),
            _ => None,
        }
    }

    /// Only PENDING_REVIEW may move, and only to a terminal state
    pub fn can_transition_to(&self, next: SessionStatus) -> bool {
        matches!(
            (self, next),
            (SessionStatus::PendingReview, SessionStatus::Processed)
                | (SessionStatus::PendingReview, SessionStatus::Cancelled)
        )
    }
}

/// Employee rows of a services upload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServicesUpload {
    pub employee_rows: Vec<RawRow>,
}

/// Store rows of an operations upload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationsUpload {
    pub rows: Vec<RawRow>,
}

/// Full parsed spreadsheet content, replayed at confirmation time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ParsedUpload {
    Services(ServicesUpload),
    Operations(OperationsUpload),
}

impl ParsedUpload {
    pub fn empty(kind: UploadKind) -> Self {
        match kind {
            UploadKind::Services => ParsedUpload::Services(ServicesUpload::default()),
            UploadKind::Operations => ParsedUpload::Operations(OperationsUpload::default()),
        }
    }

    /// Services uploads keep only rows naming an employee; subtotal and
    /// blank-employee lines are dropped
    pub fn from_rows(kind: UploadKind, rows: Vec<RawRow>) -> Self {
        match kind {
            UploadKind::Services => ParsedUpload::Services(ServicesUpload {
                employee_rows: rows
                    .into_iter()
                    .filter(|row| row.employee_name().is_some())
                    .collect(),
            }),
            UploadKind::Operations => ParsedUpload::Operations(OperationsUpload { rows }),
        }
    }

    pub fn kind(&self) -> UploadKind {
        match self {
            ParsedUpload::Services(_) => UploadKind::Services,
            ParsedUpload::Operations(_) => UploadKind::Operations,
        }
    }

    /// Rows that become performance records
    pub fn rows(&self) -> &[RawRow] {
        match self {
            ParsedUpload::Services(s) => &s.employee_rows,
            ParsedUpload::Operations(o) => &o.rows,
        }
    }
}

/// The `{marketId, reportDate, fileKind}` triple plus upload provenance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadMetadata {
    pub filename: String,
    pub file_kind: UploadKind,
    pub report_date: Option<NaiveDate>,
    #[serde(default)]
    pub market_id: Option<i64>,
    #[serde(default)]
    pub uploaded_by: Option<String>,
}

/// Persisted reconciliation session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadSession {
    pub id: Uuid,
    pub filename: String,
    pub file_type: UploadKind,
    pub report_date: NaiveDate,
    pub uploaded_by: Option<String>,
    pub market_id: Option<i64>,
    pub discovered_markets: Vec<DiscoveredMarket>,
    pub discovered_stores: Vec<DiscoveredStore>,
    pub discovered_advisors: Vec<DiscoveredAdvisor>,
    pub raw_data: ParsedUpload,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub processed_at: Option<DateTime<Utc>>,
}

/// Session row without the heavy JSON payloads, for dashboards
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub id: Uuid,
    pub filename: String,
    pub file_type: UploadKind,
    pub report_date: NaiveDate,
    pub uploaded_by: Option<String>,
    pub market_id: Option<i64>,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_pending_review_transitions() {
        use SessionStatus::*;
        assert!(PendingReview.can_transition_to(Processed));
        assert!(PendingReview.can_transition_to(Cancelled));
        assert!(!Processed.can_transition_to(Cancelled));
        assert!(!Cancelled.can_transition_to(Processed));
        assert!(!PendingReview.can_transition_to(PendingReview));
    }

    #[test]
    fn test_status_string_round_trip() {
        for status in [SessionStatus::PendingReview, SessionStatus::Processed, SessionStatus::Cancelled] {
            assert_eq!(SessionStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(SessionStatus::parse("confirmed"), None);
    }

    #[test]
    fn test_services_upload_keeps_only_employee_rows() {
        use crate::models::raw_row::fields;
        use crate::models::FieldValue;

        let mut employee = RawRow::new(0);
        employee.set(fields::EMPLOYEE_NAME, Some(FieldValue::Text("Jane Doe".into())));
        let mut blank = RawRow::new(1);
        blank.set(fields::EMPLOYEE_NAME, Some(FieldValue::Text("  ".into())));
        let mut subtotal = RawRow::new(2);
        subtotal.set(fields::STORE_NAME, Some(FieldValue::Text("Main St".into())));

        let services = ParsedUpload::from_rows(
            UploadKind::Services,
            vec![employee.clone(), blank.clone(), subtotal.clone()],
        );
        assert_eq!(services.rows(), &[employee.clone()]);

        let operations = ParsedUpload::from_rows(UploadKind::Operations, vec![employee, blank, subtotal]);
        assert_eq!(operations.rows().len(), 3);
    }

    #[test]
    fn test_parsed_upload_is_tagged_by_kind() {
        let upload = ParsedUpload::from_rows(UploadKind::Operations, vec![RawRow::new(0)]);
        let json = serde_json::to_value(&upload).unwrap();
        assert_eq!(json["kind"], "operations");
        assert_eq!(json["rows"].as_array().unwrap().len(), 1);

        let back: ParsedUpload = serde_json::from_value(json).unwrap();
        assert_eq!(back.kind(), UploadKind::Operations);
    }
}
