//! Model Module
//!
//! Records and their schemas, with cache-invalidation tokens tied to
//! field-level change detection and an append-only change log.

mod cache_token;
mod change_log;
mod geo;
mod record;
mod record_type;
mod tracker;


use std::collections::BTreeMap;

// Re-export public types
pub use change_log::{format_log_entry, AppendConsistency, AppendOptions, LOG_DELIMITER};
pub use record::{Record, SaveOptions};
pub use record_type::{
    FieldDef, FieldKind, RecordType, RecordTypeBuilder, TokenFormat, CACHE_TOKEN_FIELD,
    COUNTRY_FIELD, CORE_CACHE_FIELDS, CREATED_AT_FIELD, LOG_FIELD, TIMEZONE_FIELD, TOKEN_MAX_LENGTH,
    UPDATED_AT_FIELD,
};
pub use tracker::FieldTracker;

/// Field values of a record, keyed by field name.
pub type Fields = BTreeMap<String, serde_json::Value>;
