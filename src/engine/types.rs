//! Engine types
//!
//! Counters reported after a sync run.

/// Statistics from a sync run
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    /// Records written to the sink
    pub records_written: usize,
    /// Pages fetched from the API
    pub pages_fetched: usize,
    /// Top-level streams synced
    pub streams_synced: usize,
    /// Duration in milliseconds
    pub duration_ms: u64,
}

impl SyncStats {
    /// Create new stats
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one written record
    pub fn add_record(&mut self) {
        self.records_written += 1;
    }

    /// Count one fetched page
    pub fn add_page(&mut self) {
        self.pages_fetched += 1;
    }

    /// Count one completed top-level stream
    pub fn add_stream(&mut self) {
        self.streams_synced += 1;
    }

    /// Set duration
    pub fn set_duration(&mut self, ms: u64) {
        self.duration_ms = ms;
    }
}
