//! Spreadsheet Extractor
//!
//! Reads one sheet into a [`SheetTable`] and maps its columns onto canonical
//! fields using an explicit [`FieldSchema`]. Extraction is best-effort: a bad
//! cell becomes `None` and is reported as an [`Anomaly`], never an error.
//!
//! **Header resolution:**
//! 1. Exact match (trimmed, case-insensitive)
//! 2. Substring fallback: header contains the expected text, among columns
//!    no exact match claimed
//!
//! Unmapped numeric columns are collected into `RawRow::other_services`.

use calamine::{open_workbook_auto_from_rs, Data, Range, Reader};
use serde::Serialize;
use std::io::Cursor;
use thiserror::Error;

use crate::models::raw_row::fields;
use crate::models::{FieldMapping, FieldSchema, FieldValue, RawRow, ValueType};

/// Workbook decoding errors
///
/// Only whole-file problems surface here; cell-level problems are anomalies.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Failed to open workbook: {0}")]
    Workbook(#[from] calamine::Error),

    #[error("Failed to read CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("Workbook contains no sheets")]
    NoSheets,
}

/// Decoded cell, independent of the file format
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Number(f64),
    Text(String),
    Bool(bool),
}

impl Cell {
    pub fn is_blank(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    fn display(&self) -> String {
        match self {
            Cell::Empty => String::new(),
            Cell::Number(n) => format_number(*n),
            Cell::Text(s) => s.clone(),
            Cell::Bool(b) => b.to_string(),
        }
    }
}

impl From<&Data> for Cell {
    fn from(data: &Data) -> Self {
        match data {
            Data::Empty => Cell::Empty,
            Data::Int(i) => Cell::Number(*i as f64),
            Data::Float(f) => Cell::Number(*f),
            Data::String(s) => Cell::Text(s.clone()),
            Data::Bool(b) => Cell::Bool(*b),
            Data::DateTime(dt) => Cell::Number(dt.as_f64()),
            Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::Text(s.clone()),
            Data::Error(_) => Cell::Empty,
        }
    }
}

/// Header row plus data rows of one sheet
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SheetTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl SheetTable {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<Cell>>) -> Self {
        Self { headers, rows }
    }

    /// Build from grid rows; the first non-blank row is the header
    pub fn from_grid(grid: Vec<Vec<Cell>>) -> Self {
        let mut iter = grid.into_iter().skip_while(|row| row.iter().all(Cell::is_blank));
        let headers = match iter.next() {
            Some(row) => row.iter().map(|c| c.display().trim().to_string()).collect(),
            None => return Self::default(),
        };
        Self {
            headers,
            rows: iter.collect(),
        }
    }

    pub fn from_range(range: &Range<Data>) -> Self {
        Self::from_grid(
            range
                .rows()
                .map(|row| row.iter().map(Cell::from).collect())
                .collect(),
        )
    }

    /// Parse CSV bytes; every field is text until coerced
    pub fn from_csv(bytes: &[u8]) -> Result<Self, ExtractError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(bytes);

        let mut grid = Vec::new();
        for record in reader.records() {
            let record = record?;
            grid.push(
                record
                    .iter()
                    .map(|field| {
                        if field.trim().is_empty() {
                            Cell::Empty
                        } else {
                            Cell::Text(field.to_string())
                        }
                    })
                    .collect(),
            );
        }
        Ok(Self::from_grid(grid))
    }
}

/// Read one worksheet from xlsx/xls/ods bytes
///
/// Falls back to the first sheet when `sheet_name` is absent from the workbook.
pub fn load_sheet(bytes: &[u8], sheet_name: Option<&str>) -> Result<SheetTable, ExtractError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))?;
    let names = workbook.sheet_names();

    let chosen = sheet_name
        .and_then(|wanted| {
            names
                .iter()
                .find(|n| n.trim().eq_ignore_ascii_case(wanted.trim()))
                .cloned()
        })
        .or_else(|| {
            if let Some(wanted) = sheet_name {
                tracing::debug!(sheet = %wanted, "Sheet not found, using first sheet");
            }
            names.first().cloned()
        })
        .ok_or(ExtractError::NoSheets)?;

    let range = workbook.worksheet_range(&chosen)?;
    Ok(SheetTable::from_range(&range))
}

/// Load the table for an uploaded file, dispatching on its extension
pub fn load_table(bytes: &[u8], filename: &str, sheet_name: Option<&str>) -> Result<SheetTable, ExtractError> {
    if filename.to_ascii_lowercase().ends_with(".csv") {
        SheetTable::from_csv(bytes)
    } else {
        load_sheet(bytes, sheet_name)
    }
}

/// Recoverable irregularity noticed while extracting
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Anomaly {
    /// Cell present but not coercible to its field's type
    UnparseableCell {
        row_index: usize,
        field: String,
        raw: String,
    },
    /// Expected header missing from the sheet
    UnmappedHeader { field: String, header: String },
    /// Brake-flush count held the percentage value and was recomputed
    BrakeFlushCorrected {
        row_index: usize,
        original: f64,
        corrected: f64,
    },
}

/// Rows plus the anomalies seen producing them
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extraction {
    pub rows: Vec<RawRow>,
    pub anomalies: Vec<Anomaly>,
}

impl Extraction {
    pub fn correction_count(&self) -> usize {
        self.anomalies
            .iter()
            .filter(|a| matches!(a, Anomaly::BrakeFlushCorrected { .. }))
            .count()
    }
}

/// Map `table` onto canonical fields
///
/// Pure function of its inputs; an empty schema means "no mapping loaded" and
/// is not expected here (callers substitute `FieldSchema::default_for`).
pub fn extract(table: &SheetTable, schema: &FieldSchema) -> Extraction {
    let mut anomalies = Vec::new();
    let columns = resolve_columns(&table.headers, &schema.mappings);

    for (mapping, column) in schema.mappings.iter().zip(&columns) {
        if column.is_none() {
            tracing::debug!(
                field = %mapping.canonical_field,
                header = %mapping.spreadsheet_header,
                "No column for mapped field"
            );
            anomalies.push(Anomaly::UnmappedHeader {
                field: mapping.canonical_field.clone(),
                header: mapping.spreadsheet_header.clone(),
            });
        }
    }

    let claimed: Vec<usize> = columns.iter().flatten().copied().collect();
    let extra_columns: Vec<(usize, &str)> = table
        .headers
        .iter()
        .enumerate()
        .filter(|(idx, h)| !claimed.contains(idx) && !h.trim().is_empty())
        .map(|(idx, h)| (idx, h.trim()))
        .collect();

    let mut rows = Vec::new();
    for (row_index, cells) in table.rows.iter().enumerate() {
        if cells.iter().all(Cell::is_blank) {
            continue;
        }

        let mut row = RawRow::new(row_index);
        for (mapping, column) in schema.mappings.iter().zip(&columns) {
            let cell = column.and_then(|c| cells.get(c)).unwrap_or(&Cell::Empty);
            let value = coerce(cell, mapping.effective_type());
            if value.is_none() && !cell.is_blank() {
                tracing::debug!(
                    row = row_index,
                    field = %mapping.canonical_field,
                    raw = %cell.display(),
                    "Unparseable cell"
                );
                anomalies.push(Anomaly::UnparseableCell {
                    row_index,
                    field: mapping.canonical_field.clone(),
                    raw: cell.display(),
                });
            }
            row.set(mapping.canonical_field.clone(), value);
        }

        for (idx, header) in &extra_columns {
            if let Some(n) = cells.get(*idx).and_then(|c| coerce(c, ValueType::Number)).and_then(|v| v.as_f64()) {
                row.other_services.insert(header.to_string(), n);
            }
        }

        if let Some(anomaly) = correct_brake_flush(&mut row) {
            anomalies.push(anomaly);
        }

        rows.push(row);
    }

    Extraction { rows, anomalies }
}

/// Column index per mapping, in schema order
fn resolve_columns(headers: &[String], mappings: &[FieldMapping]) -> Vec<Option<usize>> {
    let normalized: Vec<String> = headers.iter().map(|h| h.trim().to_lowercase()).collect();

    let mut columns: Vec<Option<usize>> = mappings
        .iter()
        .map(|m| {
            let expected = m.spreadsheet_header.trim().to_lowercase();
            normalized.iter().position(|h| *h == expected)
        })
        .collect();

    let mut claimed: Vec<usize> = columns.iter().flatten().copied().collect();
    for (mapping, column) in mappings.iter().zip(columns.iter_mut()) {
        if column.is_some() {
            continue;
        }
        let expected = mapping.spreadsheet_header.trim().to_lowercase();
        if expected.is_empty() {
            continue;
        }
        if let Some(idx) = normalized
            .iter()
            .enumerate()
            .position(|(idx, h)| !claimed.contains(&idx) && h.contains(&expected))
        {
            claimed.push(idx);
            *column = Some(idx);
        }
    }

    columns
}

/// Coerce one cell; `None` for empty or unparseable
pub fn coerce(cell: &Cell, value_type: ValueType) -> Option<FieldValue> {
    match value_type {
        ValueType::Text => match cell {
            Cell::Empty => None,
            Cell::Text(s) => Some(s.trim())
                .filter(|s| !s.is_empty())
                .map(|s| FieldValue::Text(s.to_string())),
            other => Some(FieldValue::Text(other.display())),
        },
        ValueType::Number => numeric(cell, |s| s.replace(['$', ','], "").trim().parse::<f64>().ok()),
        ValueType::Integer => match cell {
            Cell::Number(n) => Some(FieldValue::Number(n.trunc())),
            other => numeric(other, |s| {
                let cleaned = s.replace(',', "");
                let cleaned = cleaned.trim();
                cleaned
                    .parse::<i64>()
                    .map(|i| i as f64)
                    .ok()
                    .or_else(|| cleaned.parse::<f64>().ok().map(f64::trunc))
            }),
        },
        ValueType::Percentage => numeric(cell, |s| {
            let trimmed = s.trim();
            trimmed
                .strip_suffix('%')
                .unwrap_or(trimmed)
                .trim()
                .parse::<f64>()
                .ok()
        }),
    }
}

fn numeric(cell: &Cell, parse_text: impl Fn(&str) -> Option<f64>) -> Option<FieldValue> {
    let n = match cell {
        Cell::Number(n) => Some(*n),
        Cell::Text(s) => parse_text(s),
        Cell::Empty | Cell::Bool(_) => None,
    }?;
    n.is_finite().then_some(FieldValue::Number(n))
}

/// Recompute a brake-flush count that holds the percentage value
///
/// Triggered only when the count exactly equals the percentage column and the
/// brake-service base count is present and positive.
fn correct_brake_flush(row: &mut RawRow) -> Option<Anomaly> {
    let flush = row.number(fields::BRAKE_FLUSH)?;
    let percent = row.number(fields::BRAKE_FLUSH_PERCENT)?;
    let base = row.number(fields::BRAKE_SERVICE)?;

    if flush != percent || base <= 0.0 {
        return None;
    }

    let corrected = (base * percent / 100.0).round();
    tracing::warn!(
        row = row.row_index,
        original = flush,
        corrected,
        "Brake flush count matched its percentage column, recomputed from brake service count"
    );
    row.set(fields::BRAKE_FLUSH, Some(FieldValue::Number(corrected)));

    Some(Anomaly::BrakeFlushCorrected {
        row_index: row.row_index,
        original: flush,
        corrected,
    })
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}
