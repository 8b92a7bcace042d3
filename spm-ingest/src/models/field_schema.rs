//! Header-to-field mapping schema for the spreadsheet extractor
//!
//! The schema is always passed to the extractor explicitly. Market-specific
//! overrides are loaded by the caller (see `db::field_mappings`) and merged
//! with [`FieldSchema::with_overrides`].

use serde::{Deserialize, Serialize};

use super::raw_row::fields;
use super::upload_session::UploadKind;

/// How a mapped cell is coerced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    /// Strips `$` and `,` then parses a float
    Number,
    /// Strips `,` then parses an integer
    Integer,
    /// Strips a trailing `%` then parses a float
    Percentage,
    /// Trimmed string
    Text,
}

impl ValueType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueType::Number => "number",
            ValueType::Integer => "integer",
            ValueType::Percentage => "percentage",
            ValueType::Text => "text",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "number" | "currency" | "float" => Some(ValueType::Number),
            "integer" | "int" | "count" => Some(ValueType::Integer),
            "percentage" | "percent" => Some(ValueType::Percentage),
            "text" | "string" => Some(ValueType::Text),
            _ => None,
        }
    }
}

/// One `{spreadsheetHeader, canonicalField, valueType, isPercentage}` entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldMapping {
    pub spreadsheet_header: String,
    pub canonical_field: String,
    pub value_type: ValueType,
    #[serde(default)]
    pub is_percentage: bool,
}

impl FieldMapping {
    pub fn new(header: &str, field: &str, value_type: ValueType) -> Self {
        Self {
            spreadsheet_header: header.to_string(),
            canonical_field: field.to_string(),
            value_type,
            is_percentage: value_type == ValueType::Percentage,
        }
    }

    /// Effective coercion, honoring the percentage flag
    pub fn effective_type(&self) -> ValueType {
        if self.is_percentage {
            ValueType::Percentage
        } else {
            self.value_type
        }
    }
}

/// Ordered field mapping for one sheet
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldSchema {
    /// Preferred sheet name; the first sheet is used when absent from the workbook
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sheet_name: Option<String>,
    pub mappings: Vec<FieldMapping>,
}

impl FieldSchema {
    /// Built-in mapping used when nothing is configured for a market
    pub fn default_for(kind: UploadKind) -> Self {
        use ValueType::*;

        let mut mappings = vec![
            FieldMapping::new("Market", fields::MARKET, Text),
            FieldMapping::new("Store", fields::STORE_NAME, Text),
        ];

        match kind {
            UploadKind::Services => {
                mappings.extend([
                    FieldMapping::new("Employee", fields::EMPLOYEE_NAME, Text),
                    FieldMapping::new("Invoices", "invoices", Integer),
                    FieldMapping::new("Sales", "sales", Number),
                    FieldMapping::new("Gross Profit", "grossProfit", Number),
                    FieldMapping::new("GP %", "grossProfitPercent", Percentage),
                    FieldMapping::new("Avg Ticket", "averageTicket", Number),
                    FieldMapping::new("Oil Changes", "oilChanges", Integer),
                    FieldMapping::new("Brake Service", fields::BRAKE_SERVICE, Integer),
                    FieldMapping::new("Brake Flush", fields::BRAKE_FLUSH, Integer),
                    FieldMapping::new(
                        "Brake Flush to Service %",
                        fields::BRAKE_FLUSH_PERCENT,
                        Percentage,
                    ),
                    FieldMapping::new("Alignments", "alignments", Integer),
                    FieldMapping::new("Tires", "tires", Integer),
                ]);
                Self {
                    sheet_name: Some("Employee".to_string()),
                    mappings,
                }
            }
            UploadKind::Operations => {
                mappings.extend([
                    FieldMapping::new("Car Count", "carCount", Integer),
                    FieldMapping::new("Sales", "sales", Number),
                    FieldMapping::new("Gross Profit", "grossProfit", Number),
                    FieldMapping::new("GP %", "grossProfitPercent", Percentage),
                    FieldMapping::new("Labor Hours", "laborHours", Number),
                    FieldMapping::new("Parts Cost", "partsCost", Number),
                    FieldMapping::new("Labor Cost", "laborCost", Number),
                ]);
                Self {
                    sheet_name: Some("Operations".to_string()),
                    mappings,
                }
            }
        }
    }

    /// Merge overrides on top of this schema
    ///
    /// An override replaces the mapping with the same canonical field in place;
    /// overrides for fields not in the base schema are appended in order.
    pub fn with_overrides(mut self, overrides: &[FieldMapping]) -> Self {
        for ov in overrides {
            match self
                .mappings
                .iter_mut()
                .find(|m| m.canonical_field == ov.canonical_field)
            {
                Some(existing) => *existing = ov.clone(),
                None => self.mappings.push(ov.clone()),
            }
        }
        self
    }
}
