use std::path::PathBuf;

/// Configuration for an Amethyst store.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory path for the database files
    pub dir: PathBuf,

    /// Approximate memtable size that triggers a flush (default: 4MB)
    pub max_memtable_size: usize,

    /// Record-count interval between sparse index samples (default: 16)
    pub sparse_index_stride: usize,

    /// Adaptive compaction thresholds
    pub adaptive: AdaptiveConfig,
}

/// Thresholds for the adaptive per-segment compaction controller.
#[derive(Debug, Clone)]
pub struct AdaptiveConfig {
    /// Segments smaller than this are never rewritten (default: 4KiB)
    pub min_segment_size: u64,

    /// Cooldown since a segment's last rewrite (default: 1s)
    pub min_rewrite_interval_secs: i64,

    /// Tiered -> leveled trigger on read/write ratio (default: 4.0)
    pub read_write_ratio_threshold: f64,

    /// Leveled -> tiered trigger on write churn (default: 100)
    pub write_count_threshold: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("./amethyst"),
            max_memtable_size: 4 * 1024 * 1024, // 4MB
            sparse_index_stride: 16,
            adaptive: AdaptiveConfig::default(),
        }
    }
}

impl Default for AdaptiveConfig {
    fn default() -> Self {
        Self {
            min_segment_size: 4 * 1024, // 4KiB
            min_rewrite_interval_secs: 1,
            read_write_ratio_threshold: 4.0,
            write_count_threshold: 100,
        }
    }
}

impl Config {
    /// Create a new config with the given directory
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            ..Default::default()
        }
    }

    /// Set the memtable flush threshold in bytes
    pub fn max_memtable_size(mut self, size: usize) -> Self {
        self.max_memtable_size = size;
        self
    }

    /// Set the sparse index sampling stride
    pub fn sparse_index_stride(mut self, stride: usize) -> Self {
        self.sparse_index_stride = stride;
        self
    }

    /// Configure adaptive compaction thresholds
    pub fn adaptive(mut self, config: AdaptiveConfig) -> Self {
        self.adaptive = config;
        self
    }
}

impl AdaptiveConfig {
    /// Set the minimum segment size eligible for rewrite
    pub fn min_segment_size(mut self, size: u64) -> Self {
        self.min_segment_size = size;
        self
    }

    /// Set the rewrite cooldown in seconds
    pub fn min_rewrite_interval_secs(mut self, secs: i64) -> Self {
        self.min_rewrite_interval_secs = secs;
        self
    }

    /// Set the tiered -> leveled read/write ratio trigger
    pub fn read_write_ratio_threshold(mut self, ratio: f64) -> Self {
        self.read_write_ratio_threshold = ratio;
        self
    }

    /// Set the leveled -> tiered write count trigger
    pub fn write_count_threshold(mut self, count: u64) -> Self {
        self.write_count_threshold = count;
        self
    }
}
