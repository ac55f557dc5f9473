//! Record Module
//!
//! A single row of a record type: its field values, identity and version,
//! plus the load/save cycle and display and serialization helpers.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::config::SiteConfig;
use crate::error::{RecordError, Result};
use crate::model::{
    FieldKind, FieldTracker, Fields, RecordType, CACHE_TOKEN_FIELD, COUNTRY_FIELD,
    CREATED_AT_FIELD, LOG_FIELD, TIMEZONE_FIELD, UPDATED_AT_FIELD,
};
use crate::registry::ContentTypeSource;
use crate::store::{RecordId, Storage, StoredRow};

// == Save Options ==
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveOptions {
    /// Re-evaluate the cache token against changed fields before writing
    pub check_cache_invalidation: bool,
    /// Only write if the stored row is still at this version
    pub expected_version: Option<u64>,
}

impl Default for SaveOptions {
    fn default() -> Self {
        Self {
            check_cache_invalidation: true,
            expected_version: None,
        }
    }
}

// == Record ==
#[derive(Debug, Clone)]
pub struct Record {
    id: Option<RecordId>,
    /// Version of the stored row this record was loaded from or saved as
    version: u64,
    record_type: Arc<RecordType>,
    fields: Fields,
    tracker: FieldTracker,
}

impl Record {
    // == Constructors ==
    /// Creates an unsaved record. The cache token, log and geo fields, if
    /// the type has them, start out blank.
    pub fn new(record_type: Arc<RecordType>) -> Self {
        let mut fields = Fields::new();
        if record_type.uses_cache_token() {
            fields.insert(CACHE_TOKEN_FIELD.to_string(), Value::String(String::new()));
        }
        if record_type.has_log() {
            fields.insert(LOG_FIELD.to_string(), Value::String(String::new()));
        }
        if record_type.has_geo() {
            for name in [TIMEZONE_FIELD, COUNTRY_FIELD] {
                fields.insert(name.to_string(), Value::String(String::new()));
            }
        }

        Self {
            id: None,
            version: 0,
            record_type,
            fields,
            tracker: FieldTracker::new(),
        }
    }

    /// Wraps a stored row; the row becomes the change-tracking baseline.
    pub fn from_row(record_type: Arc<RecordType>, row: StoredRow) -> Self {
        Self {
            id: Some(row.id),
            version: row.version,
            record_type,
            tracker: FieldTracker::armed(&row.fields),
            fields: row.fields,
        }
    }

    /// Loads a record by id.
    pub fn get<S: Storage + ?Sized>(
        store: &mut S,
        record_type: Arc<RecordType>,
        id: RecordId,
    ) -> Result<Self> {
        let row = store.fetch(&record_type.table(), id)?;
        Ok(Self::from_row(record_type, row))
    }

    // == Accessors ==
    pub fn id(&self) -> Option<RecordId> {
        self.id
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn record_type(&self) -> &Arc<RecordType> {
        &self.record_type
    }

    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn field_str(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(Value::as_str)
    }

    pub fn tracker(&self) -> &FieldTracker {
        &self.tracker
    }

    /// Fields whose value differs from the last persisted state.
    pub fn changed_fields(&self) -> BTreeSet<String> {
        self.tracker.changed(&self.fields)
    }

    // == Set ==
    /// Assigns a field declared by the record type. The value must fit the
    /// field's kind.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        self.check_value(name, &value)?;
        self.fields.insert(name.to_string(), value);
        Ok(())
    }

    /// Assigns several fields; nothing is assigned if any of them is
    /// undeclared or does not fit its kind.
    pub fn set_many(&mut self, fields: Fields) -> Result<()> {
        for (name, value) in &fields {
            self.check_value(name, value)?;
        }
        self.fields.extend(fields);
        Ok(())
    }

    pub(crate) fn put_field(&mut self, name: &str, value: Value) {
        self.fields.insert(name.to_string(), value);
    }

    fn check_value(&self, name: &str, value: &Value) -> Result<()> {
        let def = self
            .record_type
            .field(name)
            .ok_or_else(|| RecordError::UnknownField {
                record_type: self.record_type.table(),
                field: name.to_string(),
            })?;

        if def.kind.accepts(value) {
            Ok(())
        } else {
            Err(RecordError::InvalidRequest(format!(
                "Field `{}` of `{}` expects {}, got {}",
                name,
                self.record_type.table(),
                def.kind.describe(),
                value
            )))
        }
    }

    // == Reload ==
    /// Replaces every field with the stored state, discarding unsaved
    /// changes.
    pub fn reload<S: Storage + ?Sized>(&mut self, store: &mut S) -> Result<()> {
        let id = self.id.ok_or_else(|| {
            RecordError::InvalidRequest(format!(
                "Cannot reload an unsaved {}",
                self.record_type.verbose_name()
            ))
        })?;

        let row = store.fetch(&self.record_type.table(), id)?;
        self.apply_row(row);
        Ok(())
    }

    // == Save ==
    pub fn save<S: Storage + ?Sized>(&mut self, store: &mut S) -> Result<()> {
        self.save_with(store, SaveOptions::default())
    }

    /// Writes the record in a single storage call.
    ///
    /// The cache token is settled first: refreshed if a designated field
    /// changed (unless `check_cache_invalidation` is off), then assigned if
    /// still blank. It is written together with the rest of the fields.
    pub fn save_with<S: Storage + ?Sized>(
        &mut self,
        store: &mut S,
        options: SaveOptions,
    ) -> Result<()> {
        self.prepare_cache_token(options.check_cache_invalidation)?;

        let now = Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true));
        if self.id.is_none() {
            self.fields.insert(CREATED_AT_FIELD.to_string(), now.clone());
        }
        self.fields.insert(UPDATED_AT_FIELD.to_string(), now);

        let table = self.record_type.table();
        let row = match self.id {
            None => store.insert(&table, self.fields.clone())?,
            Some(id) => store.update(&table, id, self.fields.clone(), options.expected_version)?,
        };

        debug!("Saved {} {} at version {}", table, row.id, row.version);
        self.apply_row(row);
        Ok(())
    }

    fn apply_row(&mut self, row: StoredRow) {
        self.id = Some(row.id);
        self.version = row.version;
        self.tracker.arm(&row.fields);
        self.fields = row.fields;
    }

    // == Display ==
    /// Human-readable name taken from the type's display field.
    pub fn as_str(&self) -> Result<String> {
        let display_field = self.record_type.display_field();
        display_field
            .and_then(|f| self.fields.get(f))
            .and_then(|v| match v {
                Value::String(s) if !s.is_empty() => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .ok_or_else(|| RecordError::MissingField {
                record_type: self.record_type.table(),
                field: display_field.unwrap_or("display_field").to_string(),
            })
    }

    pub fn as_str_fallback(&self) -> String {
        match self.id {
            Some(id) => format!("{} Id: {}", self.record_type.verbose_name(), id),
            None => format!("Unsaved {}", self.record_type.verbose_name()),
        }
    }

    // == Admin Paths ==
    pub fn meta_info(&self) -> (&str, &str) {
        (self.record_type.app_label(), self.record_type.model())
    }

    pub fn admin_view_info(&self) -> String {
        let (app_label, model) = self.meta_info();
        format!("{}_{}", app_label, model)
    }

    /// Path of the record's admin change page; `None` until saved.
    pub fn admin_uri(&self) -> Option<String> {
        let (app_label, model) = self.meta_info();
        self.id
            .map(|id| format!("/admin/{}/{}/{}/change/", app_label, model, id))
    }

    pub fn admin_url(&self, site: &SiteConfig) -> Option<String> {
        self.admin_uri().map(|uri| site.site_url(&uri, None))
    }

    // == Field Values ==
    /// Value of a field shaped for serialization.
    ///
    /// Relations come back as `{"id": ..}`, or as the related record's full
    /// serialization when `full` is set (`null` if the relation is empty).
    /// Dates and datetimes come back as strings.
    pub fn get_field_value<S>(&self, name: &str, full: bool, store: &mut S) -> Result<Value>
    where
        S: Storage + ContentTypeSource,
    {
        let def = self
            .record_type
            .field(name)
            .ok_or_else(|| RecordError::MissingField {
                record_type: self.record_type.table(),
                field: name.to_string(),
            })?;
        let value = self.fields.get(name).cloned().unwrap_or(Value::Null);

        match &def.kind {
            FieldKind::Relation { to } => {
                if !full {
                    return Ok(json!({ "id": value }));
                }
                let Some(related_id) = value.as_u64() else {
                    return Ok(Value::Null);
                };
                let related_type = store
                    .find_type(to)?
                    .ok_or_else(|| RecordError::UnknownType(to.clone()))?;
                Ok(Record::get(store, related_type, related_id)?.serialize())
            }
            FieldKind::Date | FieldKind::DateTime => Ok(match value {
                Value::Null => Value::String(String::new()),
                Value::String(s) => Value::String(s),
                other => Value::String(other.to_string()),
            }),
            _ => Ok(value),
        }
    }

    // == Serialize ==
    /// JSON object of the record's id and fields, minus the type's
    /// serialization excludes.
    pub fn serialize(&self) -> Value {
        let excludes = self.record_type.serialization_excludes();
        let mut map = Map::new();
        map.insert("id".to_string(), json!(self.id));

        for def in self.record_type.fields() {
            if excludes.contains(&def.name) {
                continue;
            }
            map.insert(
                def.name.clone(),
                self.fields.get(&def.name).cloned().unwrap_or(Value::Null),
            );
        }

        Value::Object(map)
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_str() {
            Ok(name) => f.write_str(&name),
            Err(e) => {
                debug!("Falling back to id display: {}", e);
                f.write_str(&self.as_str_fallback())
            }
        }
    }
}
