//! Database access for spm-ingest
//!
//! Schema creation and pool setup live in `spm_common::db`; these modules hold
//! the queries specific to upload reconciliation.

pub mod entities;
pub mod field_mappings;
pub mod sessions;
