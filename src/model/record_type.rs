//! Record Type Module
//!
//! Declares the shape of a record: its fields, which of them invalidate
//! cached representations, and which capabilities (change tracking, cache
//! token, change log) the type opts into.

use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;
use uuid::Uuid;

use crate::error::{RecordError, Result};

// == Reserved Field Names ==
pub const CACHE_TOKEN_FIELD: &str = "cache_token";
pub const LOG_FIELD: &str = "log";
pub const CREATED_AT_FIELD: &str = "created_at";
pub const UPDATED_AT_FIELD: &str = "updated_at";
pub const TIMEZONE_FIELD: &str = "timezone";
pub const COUNTRY_FIELD: &str = "country";

/// Maximum rendered length of a cache token.
pub const TOKEN_MAX_LENGTH: usize = 36;

/// Cache fields every record type invalidates on, on top of its own list.
pub const CORE_CACHE_FIELDS: &[&str] = &[];

const RESERVED_FIELDS: &[&str] = &[
    CACHE_TOKEN_FIELD,
    LOG_FIELD,
    CREATED_AT_FIELD,
    UPDATED_AT_FIELD,
    TIMEZONE_FIELD,
    COUNTRY_FIELD,
    "id",
];

// == Field Kind ==
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldKind {
    Text,
    Integer,
    Boolean,
    DateTime,
    Date,
    /// IANA zone name such as `Europe/Paris`
    TimeZone,
    /// ISO 3166-1 alpha-2 code such as `FR`
    Country,
    /// Holds the id of a row of the `app_label.model` table named by `to`
    Relation { to: String },
}

impl FieldKind {
    /// Whether `value` can be stored in a field of this kind. `null` fits
    /// every kind; the zone and country kinds also take `""` for unset.
    pub fn accepts(&self, value: &Value) -> bool {
        if value.is_null() {
            return true;
        }
        match self {
            FieldKind::Text => value.is_string(),
            FieldKind::Integer => value.is_i64() || value.is_u64(),
            FieldKind::Boolean => value.is_boolean(),
            FieldKind::DateTime => value
                .as_str()
                .is_some_and(|s| DateTime::parse_from_rfc3339(s).is_ok()),
            FieldKind::Date => value
                .as_str()
                .is_some_and(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok()),
            FieldKind::TimeZone => value
                .as_str()
                .is_some_and(|s| s.is_empty() || s.parse::<Tz>().is_ok()),
            FieldKind::Country => value.as_str().is_some_and(|s| {
                s.is_empty() || (s.len() == 2 && s.bytes().all(|b| b.is_ascii_uppercase()))
            }),
            FieldKind::Relation { .. } => value.is_u64(),
        }
    }

    /// Short description used in validation errors.
    pub fn describe(&self) -> String {
        match self {
            FieldKind::Text => "text".to_string(),
            FieldKind::Integer => "an integer".to_string(),
            FieldKind::Boolean => "a boolean".to_string(),
            FieldKind::DateTime => "an RFC 3339 datetime".to_string(),
            FieldKind::Date => "a YYYY-MM-DD date".to_string(),
            FieldKind::TimeZone => "an IANA time zone name".to_string(),
            FieldKind::Country => "a two-letter country code".to_string(),
            FieldKind::Relation { to } => format!("the id of a `{}` row", to),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldDef {
    pub name: String,
    pub kind: FieldKind,
}

// == Token Format ==
/// How a freshly minted cache token is rendered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenFormat {
    /// `xxxxxxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx`, 36 characters
    #[default]
    Hyphenated,
    /// 32 lowercase hex characters
    Simple,
}

impl TokenFormat {
    pub fn render(&self, id: Uuid) -> String {
        match self {
            TokenFormat::Hyphenated => id.hyphenated().to_string(),
            TokenFormat::Simple => id.simple().to_string(),
        }
    }
}

// == Record Type ==
/// Schema of a record table.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordType {
    app_label: String,
    model: String,
    verbose_name: String,
    fields: Vec<FieldDef>,
    cache_fields: BTreeSet<String>,
    tracks_changes: bool,
    cache_token: Option<TokenFormat>,
    display_field: Option<String>,
    serialization_excludes: BTreeSet<String>,
}

impl RecordType {
    pub fn builder(app_label: impl Into<String>, model: impl Into<String>) -> RecordTypeBuilder {
        RecordTypeBuilder::new(app_label.into(), model.into())
    }

    pub fn app_label(&self) -> &str {
        &self.app_label
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn verbose_name(&self) -> &str {
        &self.verbose_name
    }

    /// Table name, `app_label.model`.
    pub fn table(&self) -> String {
        format!("{}.{}", self.app_label, self.model)
    }

    /// All fields, including the bookkeeping and capability fields.
    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    /// Returns the names of all fields on the type.
    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }

    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    /// Whether records of this type keep a baseline to detect changed fields.
    pub fn tracks_changes(&self) -> bool {
        self.tracks_changes
    }

    pub fn uses_cache_token(&self) -> bool {
        self.cache_token.is_some()
    }

    pub fn token_format(&self) -> Option<TokenFormat> {
        self.cache_token
    }

    pub fn has_log(&self) -> bool {
        self.has_field(LOG_FIELD)
    }

    /// Whether the type carries the `timezone` and `country` fields.
    pub fn has_geo(&self) -> bool {
        self.has_field(TIMEZONE_FIELD) && self.has_field(COUNTRY_FIELD)
    }

    pub fn display_field(&self) -> Option<&str> {
        self.display_field.as_deref()
    }

    /// Union of [`CORE_CACHE_FIELDS`] and the fields declared for this type.
    pub fn designated_cache_fields(&self) -> BTreeSet<String> {
        CORE_CACHE_FIELDS
            .iter()
            .map(|f| f.to_string())
            .chain(self.cache_fields.iter().cloned())
            .collect()
    }

    pub fn serialization_excludes(&self) -> &BTreeSet<String> {
        &self.serialization_excludes
    }
}

// == Record Type Builder ==
#[derive(Debug)]
pub struct RecordTypeBuilder {
    app_label: String,
    model: String,
    verbose_name: Option<String>,
    fields: Vec<FieldDef>,
    cache_fields: Vec<String>,
    tracks_changes: bool,
    cache_token: Option<TokenFormat>,
    has_log: bool,
    has_geo: bool,
    display_field: Option<String>,
    serialization_excludes: Vec<String>,
}

impl RecordTypeBuilder {
    fn new(app_label: String, model: String) -> Self {
        Self {
            app_label,
            model,
            verbose_name: None,
            fields: Vec::new(),
            cache_fields: Vec::new(),
            tracks_changes: true,
            cache_token: None,
            has_log: false,
            has_geo: false,
            display_field: None,
            serialization_excludes: Vec::new(),
        }
    }

    pub fn verbose_name(mut self, name: impl Into<String>) -> Self {
        self.verbose_name = Some(name.into());
        self
    }

    pub fn field(mut self, name: impl Into<String>, kind: FieldKind) -> Self {
        self.fields.push(FieldDef {
            name: name.into(),
            kind,
        });
        self
    }

    /// Gives the type a cache token, refreshed whenever one of `fields`
    /// changes.
    pub fn cache_token<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.cache_token = Some(self.cache_token.unwrap_or_default());
        self.cache_fields.extend(fields.into_iter().map(Into::into));
        self
    }

    pub fn token_format(mut self, format: TokenFormat) -> Self {
        self.cache_token = Some(format);
        self
    }

    /// Turns off change tracking. A type with a cache token then treats
    /// every save as invalidating.
    pub fn without_change_tracking(mut self) -> Self {
        self.tracks_changes = false;
        self
    }

    /// Adds the append-only `log` field.
    pub fn with_log(mut self) -> Self {
        self.has_log = true;
        self
    }

    /// Adds the `timezone` and `country` fields.
    pub fn with_geo(mut self) -> Self {
        self.has_geo = true;
        self
    }

    pub fn display_field(mut self, name: impl Into<String>) -> Self {
        self.display_field = Some(name.into());
        self
    }

    pub fn exclude_from_serialization<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.serialization_excludes
            .extend(names.into_iter().map(Into::into));
        self
    }

    pub fn build(self) -> Result<RecordType> {
        let table = format!("{}.{}", self.app_label, self.model);
        if self.app_label.is_empty() || self.model.is_empty() {
            return Err(RecordError::InvalidRecordType(format!(
                "`{}` needs both an app label and a model name",
                table
            )));
        }

        let mut seen = BTreeSet::new();
        for field in &self.fields {
            if RESERVED_FIELDS.contains(&field.name.as_str()) {
                return Err(RecordError::InvalidRecordType(format!(
                    "`{}` redeclares reserved field `{}`",
                    table, field.name
                )));
            }
            if !seen.insert(field.name.clone()) {
                return Err(RecordError::InvalidRecordType(format!(
                    "`{}` declares field `{}` twice",
                    table, field.name
                )));
            }
        }

        let mut fields = self.fields;
        fields.push(FieldDef {
            name: CREATED_AT_FIELD.to_string(),
            kind: FieldKind::DateTime,
        });
        fields.push(FieldDef {
            name: UPDATED_AT_FIELD.to_string(),
            kind: FieldKind::DateTime,
        });
        if self.cache_token.is_some() {
            fields.push(FieldDef {
                name: CACHE_TOKEN_FIELD.to_string(),
                kind: FieldKind::Text,
            });
        }
        if self.has_log {
            fields.push(FieldDef {
                name: LOG_FIELD.to_string(),
                kind: FieldKind::Text,
            });
        }
        if self.has_geo {
            fields.push(FieldDef {
                name: TIMEZONE_FIELD.to_string(),
                kind: FieldKind::TimeZone,
            });
            fields.push(FieldDef {
                name: COUNTRY_FIELD.to_string(),
                kind: FieldKind::Country,
            });
        }

        let declared = |name: &str| fields.iter().any(|f| f.name == name);

        for name in self
            .cache_fields
            .iter()
            .chain(self.serialization_excludes.iter())
            .chain(self.display_field.iter())
        {
            if !declared(name.as_str()) {
                return Err(RecordError::InvalidRecordType(format!(
                    "`{}` refers to undeclared field `{}`",
                    table, name
                )));
            }
        }

        if self.cache_token.is_some() && !self.tracks_changes {
            warn!(
                "`{}` uses a cache token but does not track field changes; every save will refresh it",
                table
            );
        }

        let mut serialization_excludes: BTreeSet<String> = [CREATED_AT_FIELD, UPDATED_AT_FIELD]
            .iter()
            .map(|f| f.to_string())
            .collect();
        serialization_excludes.extend(self.serialization_excludes);

        Ok(RecordType {
            verbose_name: self.verbose_name.unwrap_or_else(|| self.model.clone()),
            app_label: self.app_label,
            model: self.model,
            fields,
            cache_fields: self.cache_fields.into_iter().collect(),
            tracks_changes: self.tracks_changes,
            cache_token: self.cache_token,
            display_field: self.display_field,
            serialization_excludes,
        })
    }
}
