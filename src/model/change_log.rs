//! Change Log Module
//!
//! Appends timestamped, optionally titled blocks to a record's `log` field.
//!
//! Block layout, byte for byte:
//!
//! ```text
//! ##################
//! Oct 16, 2026, 03:04:05 PM UTC
//! **Title**
//! text
//! ##################
//! ```
//!
//! The title line is omitted when there is no title. Readers split the log
//! on the delimiter lines, so the layout must not change.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::{RecordError, Result};
use crate::model::{Record, SaveOptions, LOG_FIELD};
use crate::store::Storage;

/// Line that opens and closes every log block.
pub const LOG_DELIMITER: &str = "##################";

const TIMESTAMP_FORMAT: &str = "%b %d, %Y, %I:%M:%S %p UTC";

// == Append Consistency ==
/// Write guarantee for a persisted append.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppendConsistency {
    /// Write the whole log back unconditionally. A concurrent append that
    /// lands between reload and write is lost.
    #[default]
    BestEffort,
    /// Write only if the row is still at the version last read, failing
    /// with `Conflict` otherwise.
    Conditional,
}

impl FromStr for AppendConsistency {
    type Err = RecordError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "best_effort" | "best-effort" => Ok(AppendConsistency::BestEffort),
            "conditional" => Ok(AppendConsistency::Conditional),
            other => Err(RecordError::InvalidRequest(format!(
                "Unknown append consistency `{}`",
                other
            ))),
        }
    }
}

// == Append Options ==
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppendOptions {
    /// Save the record after appending
    pub persist: bool,
    /// Optional bold title line
    pub title: Option<String>,
    /// Run reload, append and save as one transaction
    pub use_transaction: bool,
    /// Re-fetch the record from storage before appending
    pub reload_first: bool,
    pub consistency: AppendConsistency,
}

impl Default for AppendOptions {
    fn default() -> Self {
        Self {
            persist: true,
            title: None,
            use_transaction: true,
            reload_first: true,
            consistency: AppendConsistency::default(),
        }
    }
}

impl AppendOptions {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }
}

// == Format ==
/// Renders one log block for `text` written at `at`.
pub fn format_log_entry(text: &str, title: Option<&str>, at: DateTime<Utc>) -> String {
    let mut entry = format!("{}\n{}\n", LOG_DELIMITER, at.format(TIMESTAMP_FORMAT));
    if let Some(title) = title.filter(|t| !t.is_empty()) {
        entry.push_str(&format!("**{}**\n", title));
    }
    entry.push_str(text);
    entry.push('\n');
    entry.push_str(LOG_DELIMITER);
    entry.push('\n');
    entry
}

impl Record {
    /// The log text, empty if never written.
    pub fn log(&self) -> &str {
        self.field_str(LOG_FIELD).unwrap_or_default()
    }

    // == Append To Log ==
    /// Appends a block to the record's log.
    ///
    /// Fails with `MissingField` before touching anything if the type has
    /// no log field. When `use_transaction` is set and a step fails, the
    /// store is rolled back but this record keeps whatever was already
    /// applied to it in memory.
    pub fn append_to_log<S: Storage + ?Sized>(
        &mut self,
        store: &mut S,
        text: &str,
        options: &AppendOptions,
    ) -> Result<()> {
        if !self.record_type().has_log() {
            return Err(RecordError::MissingField {
                record_type: self.record_type().table(),
                field: LOG_FIELD.to_string(),
            });
        }

        if options.use_transaction {
            store.atomic(|tx| self.append_entry(tx, text, options))
        } else {
            self.append_entry(store, text, options)
        }
    }

    fn append_entry<S: Storage + ?Sized>(
        &mut self,
        store: &mut S,
        text: &str,
        options: &AppendOptions,
    ) -> Result<()> {
        if options.reload_first {
            if self.id().is_some() {
                self.reload(store)?;
            } else {
                debug!("Skipping reload of unsaved {}", self.as_str_fallback());
            }
        }

        let mut log = self.log().to_string();
        log.push_str(&format_log_entry(
            text,
            options.title.as_deref(),
            Utc::now(),
        ));
        self.put_field(LOG_FIELD, Value::String(log));

        if options.persist {
            let expected_version = match options.consistency {
                AppendConsistency::Conditional => self.id().map(|_| self.version()),
                AppendConsistency::BestEffort => None,
            };
            self.save_with(
                store,
                SaveOptions {
                    expected_version,
                    ..Default::default()
                },
            )?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{NaiveDateTime, TimeZone};

    use super::*;
    use crate::model::{FieldKind, Fields, RecordType};
    use crate::store::{MemoryStore, RecordId, StoredRow};

    fn ticket_type() -> Arc<RecordType> {
        Arc::new(
            RecordType::builder("ops", "ticket")
                .field("subject", FieldKind::Text)
                .with_log()
                .build()
                .unwrap(),
        )
    }

    fn saved_ticket(store: &mut MemoryStore) -> Record {
        let mut record = Record::new(ticket_type());
        record.set("subject", "Printer on fire").unwrap();
        record.save(store).unwrap();
        record
    }

    /// Splits a log into blocks, checking each is delimited.
    fn blocks(log: &str) -> Vec<Vec<&str>> {
        let lines: Vec<&str> = log.lines().collect();
        let mut blocks = Vec::new();
        let mut i = 0;
        while i < lines.len() {
            assert_eq!(lines[i], LOG_DELIMITER);
            let end = lines[i + 1..]
                .iter()
                .position(|l| *l == LOG_DELIMITER)
                .map(|p| i + 1 + p)
                .expect("unterminated block");
            blocks.push(lines[i + 1..end].to_vec());
            i = end + 1;
        }
        blocks
    }

    fn parse_timestamp(line: &str) -> DateTime<Utc> {
        let naive = NaiveDateTime::parse_from_str(line, TIMESTAMP_FORMAT).unwrap();
        Utc.from_utc_datetime(&naive)
    }

    #[test]
    fn test_format_log_entry_exact() {
        let at = Utc.with_ymd_and_hms(2026, 10, 16, 15, 4, 5).unwrap();
        let entry = format_log_entry("hello", Some("Note"), at);
        assert_eq!(
            entry,
            "##################\nOct 16, 2026, 03:04:05 PM UTC\n**Note**\nhello\n##################\n"
        );
    }

    #[test]
    fn test_format_log_entry_without_title() {
        let at = Utc.with_ymd_and_hms(2026, 1, 2, 0, 30, 0).unwrap();
        let entry = format_log_entry("done", None, at);
        assert_eq!(
            entry,
            "##################\nJan 02, 2026, 12:30:00 AM UTC\ndone\n##################\n"
        );
        assert_eq!(format_log_entry("done", Some(""), at), entry);
    }

    #[test]
    fn test_append_titled_entry() {
        let mut store = MemoryStore::new();
        let mut record = saved_ticket(&mut store);
        assert_eq!(record.log(), "");

        let before = Utc::now().timestamp();
        record
            .append_to_log(&mut store, "hello", &AppendOptions::titled("Note"))
            .unwrap();
        let after = Utc::now().timestamp();

        let log = record.log();
        let parsed = blocks(log);
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].len(), 3);
        assert_eq!(parsed[0][1], "**Note**");
        assert_eq!(parsed[0][2], "hello");

        let stamped = parse_timestamp(parsed[0][0]).timestamp();
        assert!(stamped >= before && stamped <= after);

        let stored = Record::get(&mut store, ticket_type(), 1).unwrap();
        assert_eq!(stored.log(), log);
    }

    #[test]
    fn test_sequential_appends_keep_order() {
        let mut store = MemoryStore::new();
        let mut record = saved_ticket(&mut store);

        record
            .append_to_log(&mut store, "first", &AppendOptions::default())
            .unwrap();
        record
            .append_to_log(&mut store, "second", &AppendOptions::titled("Two"))
            .unwrap();

        let parsed = blocks(record.log());
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].last(), Some(&"first"));
        assert_eq!(parsed[1][1], "**Two**");
        assert_eq!(parsed[1].last(), Some(&"second"));
    }

    #[test]
    fn test_append_without_log_field_fails_before_mutation() {
        let rt = Arc::new(
            RecordType::builder("core", "tag")
                .field("label", FieldKind::Text)
                .build()
                .unwrap(),
        );
        let mut store = MemoryStore::new();
        let mut record = Record::new(rt);
        record.set("label", "x").unwrap();
        record.save(&mut store).unwrap();
        let fields_before = record.fields().clone();

        let result = record.append_to_log(&mut store, "hello", &AppendOptions::default());

        assert!(matches!(
            result,
            Err(RecordError::MissingField { ref field, .. }) if field == LOG_FIELD
        ));
        assert_eq!(record.fields(), &fields_before);
        assert_eq!(store.stats().commits, 0);
    }

    #[test]
    fn test_append_without_persist_stays_in_memory() {
        let mut store = MemoryStore::new();
        let mut record = saved_ticket(&mut store);

        let options = AppendOptions {
            persist: false,
            ..AppendOptions::default()
        };
        record.append_to_log(&mut store, "draft", &options).unwrap();

        assert!(record.log().contains("draft"));
        let stored = Record::get(&mut store, ticket_type(), 1).unwrap();
        assert_eq!(stored.log(), "");
    }

    #[test]
    fn test_append_to_unsaved_record_creates_it() {
        let mut store = MemoryStore::new();
        let mut record = Record::new(ticket_type());

        record
            .append_to_log(&mut store, "opened", &AppendOptions::default())
            .unwrap();

        assert_eq!(record.id(), Some(1));
        assert!(record.log().contains("opened"));
    }

    #[test]
    fn test_reload_picks_up_concurrent_append() {
        let mut store = MemoryStore::new();
        let mut first = saved_ticket(&mut store);
        let mut second = Record::get(&mut store, ticket_type(), 1).unwrap();

        second
            .append_to_log(&mut store, "from second", &AppendOptions::default())
            .unwrap();
        first
            .append_to_log(&mut store, "from first", &AppendOptions::default())
            .unwrap();

        let parsed = blocks(first.log());
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].last(), Some(&"from second"));
        assert_eq!(parsed[1].last(), Some(&"from first"));
    }

    #[test]
    fn test_best_effort_without_reload_loses_concurrent_append() {
        let mut store = MemoryStore::new();
        let mut first = saved_ticket(&mut store);
        let mut second = Record::get(&mut store, ticket_type(), 1).unwrap();

        second
            .append_to_log(&mut store, "from second", &AppendOptions::default())
            .unwrap();

        let stale = AppendOptions {
            reload_first: false,
            ..AppendOptions::default()
        };
        first.append_to_log(&mut store, "from first", &stale).unwrap();

        let stored = Record::get(&mut store, ticket_type(), 1).unwrap();
        assert!(!stored.log().contains("from second"));
        assert!(stored.log().contains("from first"));
    }

    #[test]
    fn test_conditional_append_rejects_stale_snapshot() {
        let mut store = MemoryStore::new();
        let mut first = saved_ticket(&mut store);
        let mut second = Record::get(&mut store, ticket_type(), 1).unwrap();

        second
            .append_to_log(&mut store, "from second", &AppendOptions::default())
            .unwrap();

        let stale = AppendOptions {
            reload_first: false,
            consistency: AppendConsistency::Conditional,
            ..AppendOptions::default()
        };
        let result = first.append_to_log(&mut store, "from first", &stale);
        assert!(matches!(result, Err(RecordError::Conflict { .. })));

        let stored = Record::get(&mut store, ticket_type(), 1).unwrap();
        assert!(stored.log().contains("from second"));
        assert!(!stored.log().contains("from first"));
    }

    /// Store whose updates are applied but then reported as failed, as when
    /// the connection drops after the write reached storage.
    struct LostAckStore {
        inner: MemoryStore,
    }

    impl Storage for LostAckStore {
        fn insert(&mut self, table: &str, fields: Fields) -> Result<StoredRow> {
            self.inner.insert(table, fields)
        }

        fn update(
            &mut self,
            table: &str,
            id: RecordId,
            fields: Fields,
            expected_version: Option<u64>,
        ) -> Result<StoredRow> {
            self.inner.update(table, id, fields, expected_version)?;
            Err(RecordError::Storage("connection lost after write".to_string()))
        }

        fn fetch(&mut self, table: &str, id: RecordId) -> Result<StoredRow> {
            self.inner.fetch(table, id)
        }

        fn delete(&mut self, table: &str, id: RecordId) -> Result<()> {
            self.inner.delete(table, id)
        }

        fn atomic<T, F>(&mut self, f: F) -> Result<T>
        where
            F: FnOnce(&mut Self) -> Result<T>,
        {
            let snapshot = self.inner.clone();
            let result = f(self);
            if result.is_err() {
                self.inner = snapshot;
            }
            result
        }
    }

    fn lost_ack_store() -> (LostAckStore, Record) {
        let mut inner = MemoryStore::new();
        let record = saved_ticket(&mut inner);
        (LostAckStore { inner }, record)
    }

    #[test]
    fn test_failed_transactional_append_rolls_back_write() {
        let (mut store, mut record) = lost_ack_store();

        let result = record.append_to_log(&mut store, "lost", &AppendOptions::default());

        assert!(matches!(result, Err(RecordError::Storage(_))));
        // In-memory copy still carries the attempted append.
        assert!(record.log().contains("lost"));
        let stored = store.inner.fetch("ops.ticket", 1).unwrap();
        assert_eq!(stored.version, 1);
        assert_eq!(stored.fields[LOG_FIELD], "");
    }

    #[test]
    fn test_failed_append_without_transaction_keeps_write() {
        let (mut store, mut record) = lost_ack_store();

        let options = AppendOptions {
            use_transaction: false,
            ..AppendOptions::default()
        };
        let result = record.append_to_log(&mut store, "landed", &options);

        assert!(matches!(result, Err(RecordError::Storage(_))));
        let stored = store.inner.fetch("ops.ticket", 1).unwrap();
        assert_eq!(stored.version, 2);
        assert!(stored.fields[LOG_FIELD].as_str().unwrap().contains("landed"));
    }

    #[test]
    fn test_record_from_rolled_back_insert_cannot_overwrite_new_row() {
        let mut store = MemoryStore::new();
        let mut orphan = Record::new(ticket_type());
        orphan.set("subject", "orphan").unwrap();

        let result: Result<()> = store.atomic(|tx| {
            orphan.save(tx)?;
            Err(RecordError::Storage("abort".to_string()))
        });
        assert!(result.is_err());
        assert_eq!(orphan.id(), Some(1));

        let mut other = Record::new(ticket_type());
        other.set("subject", "innocent").unwrap();
        other.save(&mut store).unwrap();
        assert_eq!(other.id(), Some(2));

        let stale = AppendOptions {
            reload_first: false,
            ..AppendOptions::default()
        };
        let result = orphan.append_to_log(&mut store, "from orphan", &stale);
        assert!(matches!(result, Err(RecordError::NotFound { .. })));

        let stored = Record::get(&mut store, ticket_type(), 2).unwrap();
        assert_eq!(stored.field_str("subject"), Some("innocent"));
        assert_eq!(stored.log(), "");
    }

    #[test]
    fn test_conflicting_append_rolls_back_enclosing_work() {
        let mut store = MemoryStore::new();
        let mut first = saved_ticket(&mut store);
        let mut second = Record::get(&mut store, ticket_type(), 1).unwrap();
        second
            .append_to_log(&mut store, "from second", &AppendOptions::default())
            .unwrap();

        let stale = AppendOptions {
            reload_first: false,
            consistency: AppendConsistency::Conditional,
            ..AppendOptions::default()
        };
        let result: Result<()> = store.atomic(|tx| {
            let mut other = Record::new(ticket_type());
            other.set("subject", "Side effect")?;
            other.save(tx)?;
            first.append_to_log(tx, "from first", &stale)
        });

        assert!(matches!(result, Err(RecordError::Conflict { .. })));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_append_consistency_from_str() {
        assert_eq!(
            "conditional".parse::<AppendConsistency>().unwrap(),
            AppendConsistency::Conditional
        );
        assert_eq!(
            "Best_Effort".parse::<AppendConsistency>().unwrap(),
            AppendConsistency::BestEffort
        );
        assert!("sometimes".parse::<AppendConsistency>().is_err());
    }
}
