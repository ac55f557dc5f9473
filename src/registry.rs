//! Content Type Registry
//!
//! Read-through cache of installed record types, keyed by content type id.
//! Built explicitly at startup from a [`ContentTypeSource`] and handed to
//! whatever needs it; [`ContentTypeRegistry::refresh`] reloads it.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{RecordError, Result};
use crate::model::RecordType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContentTypeId(pub u32);

impl fmt::Display for ContentTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "content type #{}", self.0)
    }
}

// == Content Type ==
/// Catalog entry naming a record table.
///
/// `record_type` is `None` once the type has been retired; the entry stays
/// in the catalog but no longer resolves to a schema.
#[derive(Debug, Clone)]
pub struct ContentType {
    pub id: ContentTypeId,
    pub app_label: String,
    pub model: String,
    pub record_type: Option<Arc<RecordType>>,
}

impl ContentType {
    pub fn is_valid(&self) -> bool {
        self.record_type.is_some()
    }

    /// The installed record type, or `UnknownType` for a retired entry.
    pub fn record_type(&self) -> Result<Arc<RecordType>> {
        self.record_type
            .clone()
            .ok_or_else(|| RecordError::UnknownType(format!("{}.{}", self.app_label, self.model)))
    }
}

// == Content Type Source ==
/// Where content types are loaded from.
pub trait ContentTypeSource {
    /// Every catalog entry, retired ones included.
    fn content_types(&self) -> Result<Vec<ContentType>>;

    fn content_type(&self, id: ContentTypeId) -> Result<Option<ContentType>>;

    /// Installed record type for a `app_label.model` table name.
    fn find_type(&self, table: &str) -> Result<Option<Arc<RecordType>>> {
        Ok(self
            .content_types()?
            .into_iter()
            .filter_map(|ct| ct.record_type)
            .find(|rt| rt.table() == table))
    }
}

// == Registry ==
#[derive(Debug, Default)]
pub struct ContentTypeRegistry {
    entries: HashMap<ContentTypeId, ContentType>,
    refreshed_at: Option<DateTime<Utc>>,
}

impl ContentTypeRegistry {
    /// Creates an empty registry; every lookup will read through.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry filled with everything `source` knows about.
    pub fn seeded<S: ContentTypeSource + ?Sized>(source: &S) -> Result<Self> {
        let mut registry = Self::new();
        registry.refresh(source)?;
        Ok(registry)
    }

    // == Refresh ==
    /// Replaces the cached entries with the source's current catalog.
    ///
    /// Returns the number of entries loaded.
    pub fn refresh<S: ContentTypeSource + ?Sized>(&mut self, source: &S) -> Result<usize> {
        let entries: HashMap<_, _> = source
            .content_types()?
            .into_iter()
            .map(|ct| (ct.id, ct))
            .collect();

        let count = entries.len();
        if count != self.entries.len() {
            info!("Content type registry now holds {} entries", count);
        }
        self.entries = entries;
        self.refreshed_at = Some(Utc::now());
        Ok(count)
    }

    // == Get ==
    /// Looks up a content type, loading it from `source` on a miss.
    pub fn get<S: ContentTypeSource + ?Sized>(
        &mut self,
        id: ContentTypeId,
        source: &S,
    ) -> Result<ContentType> {
        if let Some(ct) = self.entries.get(&id) {
            return Ok(ct.clone());
        }

        debug!("Registry miss for {}", id);
        let ct = source
            .content_type(id)?
            .ok_or_else(|| RecordError::UnknownType(id.to_string()))?;
        self.entries.insert(id, ct.clone());
        Ok(ct)
    }

    /// Record type behind a content type id.
    pub fn get_class_by_id<S: ContentTypeSource + ?Sized>(
        &mut self,
        id: ContentTypeId,
        source: &S,
    ) -> Result<Arc<RecordType>> {
        self.get(id, source)?.record_type()
    }

    /// Cached entry for `app_label.model`, without reading through.
    pub fn get_by_model(&self, app_label: &str, model: &str) -> Option<&ContentType> {
        self.entries
            .values()
            .find(|ct| ct.app_label == app_label && ct.model == model)
    }

    // == Resolve ==
    /// Installed record type for `app_label.model`.
    ///
    /// A miss, or a hit on a retired entry, refreshes from `source` once
    /// before giving up.
    pub fn resolve<S: ContentTypeSource + ?Sized>(
        &mut self,
        app_label: &str,
        model: &str,
        source: &S,
    ) -> Result<Arc<RecordType>> {
        if let Some(rt) = self
            .get_by_model(app_label, model)
            .and_then(|ct| ct.record_type.clone())
        {
            return Ok(rt);
        }

        self.refresh(source)?;
        self.get_by_model(app_label, model)
            .ok_or_else(|| RecordError::UnknownType(format!("{}.{}", app_label, model)))?
            .record_type()
    }

    /// Entries that still resolve to an installed record type, by id.
    pub fn valid_content_types(&self) -> impl Iterator<Item = &ContentType> {
        let mut valid: Vec<&ContentType> =
            self.entries.values().filter(|ct| ct.is_valid()).collect();
        valid.sort_by_key(|ct| ct.id);
        valid.into_iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn refreshed_at(&self) -> Option<DateTime<Utc>> {
        self.refreshed_at
    }
}
