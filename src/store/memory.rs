//! Memory Store Module
//!
//! In-memory table storage combining per-table row maps with versioned
//! writes, snapshot-based transactions and a content type catalog.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tracing::debug;

use crate::error::{RecordError, Result};
use crate::model::{Fields, RecordType};
use crate::registry::{ContentType, ContentTypeId, ContentTypeSource};
use crate::store::{RecordId, Storage, StoreStats, StoredRow};

#[derive(Debug, Clone, Default)]
struct Table {
    rows: HashMap<RecordId, StoredRow>,
}

// == Memory Store ==
/// Row storage held entirely in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    /// Rows keyed by table name (`app_label.model`)
    tables: HashMap<String, Table>,
    /// Last id handed out per table. Not part of a transaction snapshot,
    /// so an id is never issued twice.
    sequences: HashMap<String, RecordId>,
    /// Installed record types, keyed by content type id
    catalog: BTreeMap<ContentTypeId, ContentType>,
    /// Performance statistics
    stats: StoreStats,
    /// Current `atomic` nesting depth
    depth: usize,
}

impl MemoryStore {
    // == Constructor ==
    pub fn new() -> Self {
        Self::default()
    }

    // == Register Type ==
    /// Installs a record type in the content type catalog.
    ///
    /// Registering the same `app_label.model` again replaces its definition
    /// and keeps the existing id.
    pub fn register_type(&mut self, record_type: impl Into<Arc<RecordType>>) -> ContentTypeId {
        let record_type = record_type.into();

        if let Some(existing) = self.catalog.values_mut().find(|ct| {
            ct.app_label == record_type.app_label() && ct.model == record_type.model()
        }) {
            existing.record_type = Some(record_type);
            return existing.id;
        }

        let id = ContentTypeId(self.catalog.len() as u32 + 1);
        debug!("Registered content type {} as {}", record_type.table(), id);
        self.catalog.insert(
            id,
            ContentType {
                id,
                app_label: record_type.app_label().to_string(),
                model: record_type.model().to_string(),
                record_type: Some(record_type),
            },
        );
        id
    }

    // == Retire Type ==
    /// Marks a content type as no longer backed by an installed record type.
    ///
    /// The catalog entry and its rows are kept, as they would be for a
    /// removed model whose table was never dropped.
    pub fn retire_type(&mut self, id: ContentTypeId) -> Result<()> {
        let entry = self
            .catalog
            .get_mut(&id)
            .ok_or_else(|| RecordError::UnknownType(id.to_string()))?;
        entry.record_type = None;
        Ok(())
    }

    // == Stats ==
    /// Returns current store statistics.
    pub fn stats(&self) -> StoreStats {
        let mut stats = self.stats.clone();
        stats.set_total_rows(self.len());
        stats
    }

    // == Length ==
    /// Returns the number of rows across all tables.
    pub fn len(&self) -> usize {
        self.tables.values().map(|t| t.rows.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn not_found(table: &str, id: RecordId) -> RecordError {
        RecordError::NotFound {
            table: table.to_string(),
            id,
        }
    }
}

impl Storage for MemoryStore {
    fn insert(&mut self, table: &str, fields: Fields) -> Result<StoredRow> {
        let sequence = self.sequences.entry(table.to_string()).or_default();
        *sequence += 1;

        let row = StoredRow {
            id: *sequence,
            version: 1,
            fields,
        };
        self.tables
            .entry(table.to_string())
            .or_default()
            .rows
            .insert(row.id, row.clone());

        self.stats.record_write();
        Ok(row)
    }

    fn update(
        &mut self,
        table: &str,
        id: RecordId,
        fields: Fields,
        expected_version: Option<u64>,
    ) -> Result<StoredRow> {
        let row = self
            .tables
            .get_mut(table)
            .and_then(|t| t.rows.get_mut(&id))
            .ok_or_else(|| Self::not_found(table, id))?;

        if let Some(expected) = expected_version {
            if row.version != expected {
                let found = row.version;
                self.stats.record_conflict();
                return Err(RecordError::Conflict {
                    table: table.to_string(),
                    id,
                    expected,
                    found,
                });
            }
        }

        row.version += 1;
        row.fields = fields;
        let updated = row.clone();

        self.stats.record_write();
        Ok(updated)
    }

    fn fetch(&mut self, table: &str, id: RecordId) -> Result<StoredRow> {
        let row = self
            .tables
            .get(table)
            .and_then(|t| t.rows.get(&id))
            .cloned()
            .ok_or_else(|| Self::not_found(table, id))?;

        self.stats.record_read();
        Ok(row)
    }

    fn delete(&mut self, table: &str, id: RecordId) -> Result<()> {
        self.tables
            .get_mut(table)
            .and_then(|t| t.rows.remove(&id))
            .map(|_| ())
            .ok_or_else(|| Self::not_found(table, id))
    }

    fn atomic<T, F>(&mut self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Self) -> Result<T>,
    {
        let snapshot = self.tables.clone();
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;

        match &result {
            Ok(_) => {
                if self.depth == 0 {
                    self.stats.record_commit();
                }
            }
            Err(e) => {
                debug!("Rolling back transaction at depth {}: {}", self.depth, e);
                self.tables = snapshot;
                self.stats.record_rollback();
            }
        }

        result
    }
}

impl ContentTypeSource for MemoryStore {
    fn content_types(&self) -> Result<Vec<ContentType>> {
        Ok(self.catalog.values().cloned().collect())
    }

    fn content_type(&self, id: ContentTypeId) -> Result<Option<ContentType>> {
        Ok(self.catalog.get(&id).cloned())
    }
}
