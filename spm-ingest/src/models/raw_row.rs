//! Parsed spreadsheet rows

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Canonical field names shared by the schema, discovery and commit steps
pub mod fields {
    pub const MARKET: &str = "market";
    pub const STORE_NAME: &str = "storeName";
    pub const EMPLOYEE_NAME: &str = "employeeName";
    pub const BRAKE_FLUSH: &str = "brakeFlush";
    pub const BRAKE_FLUSH_PERCENT: &str = "brakeFlushToServicePercent";
    pub const BRAKE_SERVICE: &str = "brakeService";
}

/// Typed cell value after coercion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Number(f64),
    Text(String),
}

impl FieldValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Number(n) => Some(*n),
            FieldValue::Text(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            FieldValue::Number(_) => None,
        }
    }
}

/// One parsed spreadsheet line
///
/// `fields` holds the schema-mapped values keyed by canonical name; cells that
/// failed coercion are stored as `None`. Numeric columns the schema does not
/// know about land in `other_services`, never in `fields`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawRow {
    /// Zero-based index of the source row in the sheet (header excluded)
    pub row_index: usize,
    pub fields: BTreeMap<String, Option<FieldValue>>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub other_services: BTreeMap<String, f64>,
}

impl RawRow {
    pub fn new(row_index: usize) -> Self {
        Self {
            row_index,
            ..Default::default()
        }
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field).and_then(Option::as_ref)
    }

    pub fn number(&self, field: &str) -> Option<f64> {
        self.get(field).and_then(FieldValue::as_f64)
    }

    /// Trimmed, non-empty text value
    pub fn text(&self, field: &str) -> Option<&str> {
        self.get(field)
            .and_then(FieldValue::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    pub fn set(&mut self, field: impl Into<String>, value: Option<FieldValue>) {
        self.fields.insert(field.into(), value);
    }

    pub fn market(&self) -> Option<&str> {
        self.text(fields::MARKET)
    }

    pub fn store_name(&self) -> Option<&str> {
        self.text(fields::STORE_NAME)
    }

    pub fn employee_name(&self) -> Option<&str> {
        self.text(fields::EMPLOYEE_NAME)
    }
}
