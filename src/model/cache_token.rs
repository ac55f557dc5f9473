//! Cache Token Module
//!
//! Keeps a record's `cache_token` in step with its designated cache fields.
//! Anything that cached a serialized record keyed by its token knows the
//! copy is stale once the token changes.

use std::collections::BTreeSet;

use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{RecordError, Result};
use crate::model::{Record, SaveOptions, TokenFormat, CACHE_TOKEN_FIELD};
use crate::store::Storage;

impl Record {
    /// Fields whose change makes cached representations stale.
    pub fn designated_cache_fields(&self) -> BTreeSet<String> {
        self.record_type().designated_cache_fields()
    }

    // == Has Cache Relevant Change ==
    /// Whether a designated cache field changed since the record was loaded
    /// or last saved.
    ///
    /// A type that does not track changes cannot answer; it is reported on
    /// the warning channel and treated as stale.
    pub fn has_cache_relevant_change(&self) -> bool {
        let record_type = self.record_type();
        if !record_type.uses_cache_token() {
            return false;
        }

        if !record_type.tracks_changes() {
            warn!(
                "`{}` has a cache token but does not track field changes; assuming its cache is stale",
                record_type.table()
            );
            return true;
        }

        self.designated_cache_fields()
            .iter()
            .any(|field| self.tracker().has_changed(self.fields(), field))
    }

    /// The current token, or `None` while blank.
    pub fn cache_token(&self) -> Option<&str> {
        self.field_str(CACHE_TOKEN_FIELD).filter(|t| !t.is_empty())
    }

    // == Refresh Token ==
    /// Assigns a fresh token in memory. The caller's next save persists it.
    pub fn refresh_token(&mut self) -> Result<String> {
        let token = self.token_format()?.render(Uuid::new_v4());
        debug!(
            "Refreshed cache token of {} to {}",
            self.as_str_fallback(),
            token
        );
        self.put_field(CACHE_TOKEN_FIELD, Value::String(token.clone()));
        Ok(token)
    }

    /// Assigns a fresh token and saves right away, without re-checking
    /// designated fields.
    pub fn refresh_token_and_save<S: Storage + ?Sized>(&mut self, store: &mut S) -> Result<()> {
        self.refresh_token()?;
        self.save_with(
            store,
            SaveOptions {
                check_cache_invalidation: false,
                ..Default::default()
            },
        )
    }

    // == Ensure Token ==
    /// Assigns a token only if none is present.
    ///
    /// Returns whether a token was assigned.
    pub fn ensure_token(&mut self) -> Result<bool> {
        self.token_format()?;
        if self.cache_token().is_some() {
            return Ok(false);
        }
        self.refresh_token()?;
        Ok(true)
    }

    /// Save hook: refresh on a relevant change unless suppressed, then make
    /// sure a token is set. No-op for types without a cache token.
    pub(crate) fn prepare_cache_token(&mut self, check_invalidation: bool) -> Result<()> {
        if !self.record_type().uses_cache_token() {
            return Ok(());
        }

        if check_invalidation && self.has_cache_relevant_change() {
            self.refresh_token()?;
        }
        self.ensure_token()?;
        Ok(())
    }

    fn token_format(&self) -> Result<TokenFormat> {
        self.record_type()
            .token_format()
            .ok_or_else(|| RecordError::MissingField {
                record_type: self.record_type().table(),
                field: CACHE_TOKEN_FIELD.to_string(),
            })
    }
}
