//! Configuration for fragkv
//!
//! Centralized configuration with sensible defaults.

/// Main configuration shared by every store opened through a context
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Write Buffer Configuration
    // -------------------------------------------------------------------------
    /// Staged items per store before the engine flushes on its own.
    /// 0 means flush only on an explicit `flush()` or on `close()`.
    pub max_buffered_items: u64,

    // -------------------------------------------------------------------------
    // Durability Configuration
    // -------------------------------------------------------------------------
    /// fsync fragment files (and their directory) before a flush or
    /// consolidation reports success
    pub sync_on_flush: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_buffered_items: 0,
            sync_on_flush: true,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the number of staged items that triggers an implicit flush
    pub fn max_buffered_items(mut self, count: u64) -> Self {
        self.config.max_buffered_items = count;
        self
    }

    /// Enable or disable fsync on flush
    pub fn sync_on_flush(mut self, sync: bool) -> Self {
        self.config.sync_on_flush = sync;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
