use std::path::{Path, PathBuf};

use hopperstore_anvil::region::{REGION_EXTENSION, region_path};
use hopperstore_anvil::{CompressionScheme, RecordCodec, RegionPos};

/// Default number of region files kept open at once.
pub const DEFAULT_MAX_OPEN_REGIONS: usize = 256;

/// Default flate2 compression level.
pub const DEFAULT_COMPRESSION_LEVEL: u32 = 6;

#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Directory holding the `r.X.Z.mca` files.
    pub base_dir: PathBuf,
    pub extension: String,
    /// Upper bound on open region handles. Values below 1 are treated as 1.
    pub max_open_regions: usize,
    /// Scheme used by plain saves.
    pub compression: CompressionScheme,
    pub compression_level: u32,
}

impl StoreConfig {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            ..Default::default()
        }
    }

    pub fn with_max_open_regions(mut self, max_open_regions: usize) -> Self {
        self.max_open_regions = max_open_regions;
        self
    }

    pub fn with_compression(mut self, compression: CompressionScheme) -> Self {
        self.compression = compression;
        self
    }

    pub fn with_compression_level(mut self, level: u32) -> Self {
        self.compression_level = level;
        self
    }

    pub fn region_path(&self, pos: RegionPos) -> PathBuf {
        region_path(&self.base_dir, pos.x, pos.z, &self.extension)
    }

    pub fn codec(&self) -> RecordCodec {
        RecordCodec::new(self.compression_level)
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// One-line description for logs and benchmark reports.
    pub fn summary(&self) -> String {
        format!(
            "dir={} cache={} compression={:?} level={}",
            self.base_dir.display(),
            self.max_open_regions,
            self.compression,
            self.compression_level
        )
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("region"),
            extension: REGION_EXTENSION.to_string(),
            max_open_regions: DEFAULT_MAX_OPEN_REGIONS,
            compression: CompressionScheme::Zlib,
            compression_level: DEFAULT_COMPRESSION_LEVEL,
        }
    }
}
