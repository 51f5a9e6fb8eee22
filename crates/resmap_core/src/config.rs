//! Index configuration.

/// Configuration for opening a durable index.
#[derive(Debug, Clone)]
pub struct IndexConfig {
    /// Whether to create the index directory if it doesn't exist.
    pub create_if_missing: bool,

    /// Whether to fsync the log after every committed-store write.
    ///
    /// When off, writes reach the OS immediately and the disk on
    /// `flush`/`close`.
    pub sync_on_write: bool,

    /// Minimum number of log records before automatic compaction is
    /// considered (0 disables automatic compaction).
    pub compact_min_records: u64,

    /// Share of dead records, in percent, that triggers automatic compaction.
    pub compact_garbage_percent: u8,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            create_if_missing: true,
            sync_on_write: true,
            compact_min_records: 4096,
            compact_garbage_percent: 50,
        }
    }
}

impl IndexConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether to create the index directory if missing.
    #[must_use]
    pub const fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    /// Sets whether to fsync after every write.
    #[must_use]
    pub const fn sync_on_write(mut self, value: bool) -> Self {
        self.sync_on_write = value;
        self
    }

    /// Sets the record count below which compaction never runs.
    #[must_use]
    pub const fn compact_min_records(mut self, records: u64) -> Self {
        self.compact_min_records = records;
        self
    }

    /// Sets the dead-record percentage that triggers compaction.
    ///
    /// Values above 100 are clamped.
    #[must_use]
    pub const fn compact_garbage_percent(mut self, percent: u8) -> Self {
        self.compact_garbage_percent = if percent > 100 { 100 } else { percent };
        self
    }

    /// Returns `true` if a log with `total` records of which `live` are still
    /// current should be compacted.
    #[must_use]
    pub fn should_compact(&self, total: u64, live: u64) -> bool {
        if self.compact_min_records == 0 || total < self.compact_min_records {
            return false;
        }
        let dead = total.saturating_sub(live);
        dead * 100 >= total * u64::from(self.compact_garbage_percent)
    }
}
