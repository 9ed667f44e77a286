use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for the read-only connection pool used by reporting queries
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadPoolConfig {
    /// Whether pooling is enabled
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Number of read-only connections (default: 4)
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,

    /// Timeout in milliseconds when acquiring a pooled connection (default: 5000)
    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout_ms: u64,
}

impl Default for ReadPoolConfig {
    fn default() -> Self {
        Self::enabled(default_pool_size())
    }
}

impl ReadPoolConfig {
    pub fn enabled(pool_size: usize) -> Self {
        Self {
            enabled: true,
            pool_size,
            acquire_timeout_ms: default_acquire_timeout(),
        }
    }

    /// Reads go through the writer connection instead
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::enabled(1)
        }
    }

    pub fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.acquire_timeout_ms = timeout_ms;
        self
    }
}

/// Configuration for the SQLite stock store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Path to the SQLite database file
    pub path: PathBuf,

    /// Enable WAL mode
    /// Default: true
    #[serde(default = "default_true")]
    pub wal_mode: bool,

    /// SQLite synchronous mode
    #[serde(default)]
    pub synchronous: SynchronousMode,

    /// SQLite cache size (in pages, negative = KB)
    /// Default: -16000 (16MB)
    #[serde(default = "default_cache_size")]
    pub cache_size: i32,

    /// How long a statement waits on a locked database before failing with
    /// `Timeout` (default: 5000)
    #[serde(default = "default_busy_timeout")]
    pub busy_timeout_ms: u64,

    #[serde(default)]
    pub read_pool: ReadPoolConfig,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SynchronousMode {
    /// Full fsync (safest, slowest)
    Full,
    /// fsync at critical moments (good balance)
    #[default]
    Normal,
    /// No fsync (fastest, least safe)
    Off,
}

impl SynchronousMode {
    pub fn as_pragma(&self) -> &'static str {
        match self {
            SynchronousMode::Full => "FULL",
            SynchronousMode::Normal => "NORMAL",
            SynchronousMode::Off => "OFF",
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_pool_size() -> usize {
    4
}

fn default_acquire_timeout() -> u64 {
    5000
}

fn default_cache_size() -> i32 {
    -16000
}

fn default_busy_timeout() -> u64 {
    5000
}

impl StoreConfig {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            wal_mode: default_true(),
            synchronous: SynchronousMode::default(),
            cache_size: default_cache_size(),
            busy_timeout_ms: default_busy_timeout(),
            read_pool: ReadPoolConfig::default(),
        }
    }

    pub fn with_synchronous(mut self, synchronous: SynchronousMode) -> Self {
        self.synchronous = synchronous;
        self
    }

    pub fn with_wal_mode(mut self, enabled: bool) -> Self {
        self.wal_mode = enabled;
        self
    }

    pub fn with_busy_timeout(mut self, timeout_ms: u64) -> Self {
        self.busy_timeout_ms = timeout_ms;
        self
    }

    pub fn with_read_pool(mut self, config: ReadPoolConfig) -> Self {
        self.read_pool = config;
        self
    }
}
