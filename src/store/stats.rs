//! Store Statistics Module
//!
//! Tracks storage activity: row reads and writes, rejected conditional
//! writes, and transaction outcomes.

use serde::Serialize;

// == Store Stats ==
/// Tracks storage metrics.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StoreStats {
    /// Number of rows fetched
    pub reads: u64,
    /// Number of rows inserted or updated
    pub writes: u64,
    /// Number of conditional writes rejected because the row moved on
    pub conflicts: u64,
    /// Number of outermost transactions committed
    pub commits: u64,
    /// Number of transactions (or savepoints) rolled back
    pub rollbacks: u64,
    /// Current number of rows across all tables
    pub total_rows: usize,
}

impl StoreStats {
    // == Constructor ==
    /// Creates a new StoreStats with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    // == Conflict Rate ==
    /// Fraction of writes attempted that were rejected as conflicts.
    ///
    /// Returns 0.0 if no writes have been attempted.
    pub fn conflict_rate(&self) -> f64 {
        let attempted = self.writes + self.conflicts;
        if attempted == 0 {
            0.0
        } else {
            self.conflicts as f64 / attempted as f64
        }
    }

    pub fn record_read(&mut self) {
        self.reads += 1;
    }

    pub fn record_write(&mut self) {
        self.writes += 1;
    }

    pub fn record_conflict(&mut self) {
        self.conflicts += 1;
    }

    pub fn record_commit(&mut self) {
        self.commits += 1;
    }

    pub fn record_rollback(&mut self) {
        self.rollbacks += 1;
    }

    // == Update Row Count ==
    pub fn set_total_rows(&mut self, count: usize) {
        self.total_rows = count;
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_new() {
        let stats = StoreStats::new();
        assert_eq!(stats.reads, 0);
        assert_eq!(stats.writes, 0);
        assert_eq!(stats.conflicts, 0);
        assert_eq!(stats.commits, 0);
        assert_eq!(stats.rollbacks, 0);
        assert_eq!(stats.total_rows, 0);
    }

    #[test]
    fn test_conflict_rate_no_writes() {
        let stats = StoreStats::new();
        assert_eq!(stats.conflict_rate(), 0.0);
    }

    #[test]
    fn test_conflict_rate_mixed() {
        let mut stats = StoreStats::new();
        stats.record_write();
        stats.record_write();
        stats.record_write();
        stats.record_conflict();
        assert_eq!(stats.conflict_rate(), 0.25);
    }

    #[test]
    fn test_transaction_counters() {
        let mut stats = StoreStats::new();
        stats.record_commit();
        stats.record_rollback();
        stats.record_rollback();
        assert_eq!(stats.commits, 1);
        assert_eq!(stats.rollbacks, 2);
    }

    #[test]
    fn test_set_total_rows() {
        let mut stats = StoreStats::new();
        stats.set_total_rows(42);
        assert_eq!(stats.total_rows, 42);
    }
}
