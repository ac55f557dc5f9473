//! Response DTOs for the admin API
//!
//! Defines the structure of outgoing HTTP response bodies.

use serde::Serialize;
use serde_json::Value;

use crate::config::SiteConfig;
use crate::model::Record;
use crate::registry::ContentType;
use crate::store::{RecordId, StoreStats};

/// Response body for a single record
#[derive(Debug, Clone, Serialize)]
pub struct RecordResponse {
    pub id: Option<RecordId>,
    pub version: u64,
    /// Table name, `app_label.model`
    pub record_type: String,
    /// Human-readable label
    pub display: String,
    pub cache_token: Option<String>,
    /// Absolute URL of the admin change page
    pub admin_url: Option<String>,
    /// Serialized fields, minus the type's excludes
    pub data: Value,
}

impl RecordResponse {
    pub fn new(record: &Record, site: &SiteConfig) -> Self {
        Self {
            id: record.id(),
            version: record.version(),
            record_type: record.record_type().table(),
            display: record.to_string(),
            cache_token: record.cache_token().map(str::to_string),
            admin_url: record.admin_url(site),
            data: record.serialize(),
        }
    }
}

/// One entry of the content type listing (GET /types)
#[derive(Debug, Clone, Serialize)]
pub struct ContentTypeResponse {
    pub id: u32,
    pub app_label: String,
    pub model: String,
    /// Designated cache fields, empty when the type has no cache token
    pub cache_fields: Vec<String>,
    pub has_log: bool,
    pub tracks_changes: bool,
}

impl ContentTypeResponse {
    /// Builds the listing entry; `None` for a retired content type.
    pub fn from_content_type(ct: &ContentType) -> Option<Self> {
        let record_type = ct.record_type.as_ref()?;
        Some(Self {
            id: ct.id.0,
            app_label: ct.app_label.clone(),
            model: ct.model.clone(),
            cache_fields: record_type.designated_cache_fields().into_iter().collect(),
            has_log: record_type.has_log(),
            tracks_changes: record_type.tracks_changes(),
        })
    }
}

/// Response body for the stats endpoint (GET /stats)
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    #[serde(flatten)]
    pub store: StoreStats,
    /// Rejected conditional writes over all attempted writes
    pub conflict_rate: f64,
    /// Content types currently cached in the registry
    pub content_types: usize,
}

impl StatsResponse {
    pub fn new(store: StoreStats, content_types: usize) -> Self {
        Self {
            conflict_rate: store.conflict_rate(),
            store,
            content_types,
        }
    }
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::model::{FieldKind, RecordType};
    use crate::registry::ContentTypeId;
    use crate::store::MemoryStore;

    fn note_type() -> Arc<RecordType> {
        Arc::new(
            RecordType::builder("core", "note")
                .field("body", FieldKind::Text)
                .cache_token(["body"])
                .with_log()
                .display_field("body")
                .build()
                .unwrap(),
        )
    }

    #[test]
    fn test_record_response() {
        let mut store = MemoryStore::new();
        let mut record = Record::new(note_type());
        record.set("body", "first note").unwrap();
        record.save(&mut store).unwrap();

        let resp = RecordResponse::new(&record, &SiteConfig::default());
        assert_eq!(resp.id, Some(1));
        assert_eq!(resp.record_type, "core.note");
        assert_eq!(resp.display, "first note");
        assert_eq!(
            resp.admin_url.as_deref(),
            Some("http://localhost:3000/admin/core/note/1/change/")
        );
        assert_eq!(resp.data["body"], "first note");
        assert!(resp.cache_token.is_some());
    }

    #[test]
    fn test_content_type_response_skips_retired() {
        let live = ContentType {
            id: ContentTypeId(1),
            app_label: "core".to_string(),
            model: "note".to_string(),
            record_type: Some(note_type()),
        };
        let resp = ContentTypeResponse::from_content_type(&live).unwrap();
        assert_eq!(resp.cache_fields, vec!["body".to_string()]);
        assert!(resp.has_log);

        let retired = ContentType {
            record_type: None,
            ..live
        };
        assert!(ContentTypeResponse::from_content_type(&retired).is_none());
    }

    #[test]
    fn test_stats_response_flattens_store_stats() {
        let mut stats = StoreStats::new();
        stats.record_write();
        stats.record_conflict();

        let resp = StatsResponse::new(stats, 2);
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["writes"], 1);
        assert_eq!(json["conflicts"], 1);
        assert_eq!(json["content_types"], 2);
        assert!((resp.conflict_rate - 0.5).abs() < 0.001);
    }

    #[test]
    fn test_health_response_serialize() {
        let resp = HealthResponse::healthy();
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("healthy"));
        assert!(json.contains("timestamp"));
    }
}
