//! Store Module
//!
//! The persistence collaborator behind records: row-level create/update,
//! versioned rows for conditional writes, and transactional grouping.

mod memory;
mod stats;

pub use memory::MemoryStore;
pub use stats::StoreStats;

use crate::error::Result;
use crate::model::Fields;

/// Primary key of a stored row.
pub type RecordId = u64;

// == Stored Row ==
/// A row as persisted, with the version it was written at.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRow {
    pub id: RecordId,
    /// Starts at 1 on insert and increases by one on every update
    pub version: u64,
    pub fields: Fields,
}

// == Storage Trait ==
/// Row storage used by [`crate::model::Record`].
///
/// Tables are addressed by the record type's `app_label.model` name.
pub trait Storage {
    /// Inserts a new row and returns it with its assigned id.
    fn insert(&mut self, table: &str, fields: Fields) -> Result<StoredRow>;

    /// Replaces the fields of an existing row.
    ///
    /// When `expected_version` is set the write only succeeds if the stored
    /// row is still at that version; otherwise it fails with
    /// [`crate::error::RecordError::Conflict`].
    fn update(
        &mut self,
        table: &str,
        id: RecordId,
        fields: Fields,
        expected_version: Option<u64>,
    ) -> Result<StoredRow>;

    /// Fetches a row by id.
    fn fetch(&mut self, table: &str, id: RecordId) -> Result<StoredRow>;

    /// Removes a row.
    fn delete(&mut self, table: &str, id: RecordId) -> Result<()>;

    /// Runs `f` as one unit of work: every write it makes is kept if it
    /// returns `Ok`, and none of them are if it returns `Err`.
    ///
    /// Nested calls behave as savepoints.
    fn atomic<T, F>(&mut self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Self) -> Result<T>;
}
