//! Upload reconciliation services
//!
//! Extraction, discovery and matching are pure; the discovery service and
//! the confirmation committer own all database writes.

pub mod confirmation_committer;
pub mod discovery_service;
pub mod entity_discovery;
pub mod fuzzy_matcher;
pub mod match_annotator;
pub mod spreadsheet_extractor;

pub use confirmation_committer::ConfirmationCommitter;
pub use discovery_service::{discover_upload, DiscoveryResponse};
pub use fuzzy_matcher::{EntityKind, FuzzyMatcher, MatchResult, Matchable};
pub use match_annotator::ExistingEntities;
pub use spreadsheet_extractor::{Anomaly, ExtractError, Extraction, SheetTable};
