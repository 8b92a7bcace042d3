//! Data models for spm-ingest
//!
//! - Parsed rows and the field schema that produces them
//! - Discovered entities with match annotations
//! - Upload session state machine
//! - Reviewer confirmation payloads

pub mod confirmation;
pub mod discovered;
pub mod field_schema;
pub mod raw_row;
pub mod upload_session;

pub use confirmation::{AdvisorDecision, ConfirmationPayload, ConfirmationSummary, MarketDecision, StoreDecision};
pub use discovered::{
    store_natural_key, AdvisorAction, DataSource, DiscoveredAdvisor, DiscoveredEntities, DiscoveredMarket,
    DiscoveredStore, EntityAction, MatchAnnotation, MatchSource,
};
pub use field_schema::{FieldMapping, FieldSchema, ValueType};
pub use raw_row::{FieldValue, RawRow};
pub use upload_session::{
    OperationsUpload, ParsedUpload, ServicesUpload, SessionStatus, SessionSummary, UploadKind, UploadMetadata,
    UploadSession,
};
