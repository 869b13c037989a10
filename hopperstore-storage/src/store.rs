//! Chunk store facade.
//!
//! Maps global chunk coordinates to a region and a local slot, and forwards
//! to the region cache. This is the only surface the server calls.

use std::fs;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use hopperstore_anvil::{ChunkPos, CompressionScheme, RegionPos, RegionStats, Result};
use hopperstore_benchmark::BenchmarkMetrics;

use crate::cache::RegionCache;
use crate::config::StoreConfig;
use crate::payload::PayloadCodec;

pub struct ChunkStore {
    cache: RegionCache,
    metrics: Option<Arc<BenchmarkMetrics>>,
}

impl ChunkStore {
    /// Create the base directory if needed. Regions are opened lazily.
    pub fn open(config: StoreConfig) -> Result<Self> {
        Self::build(config, None)
    }

    pub fn with_metrics(config: StoreConfig, metrics: Arc<BenchmarkMetrics>) -> Result<Self> {
        Self::build(config, Some(metrics))
    }

    fn build(config: StoreConfig, metrics: Option<Arc<BenchmarkMetrics>>) -> Result<Self> {
        fs::create_dir_all(config.base_dir())?;
        log::info!("Chunk store at {}", config.summary());
        Ok(Self {
            cache: RegionCache::new(config, metrics.clone()),
            metrics,
        })
    }

    pub fn config(&self) -> &StoreConfig {
        self.cache.config()
    }

    pub fn metrics(&self) -> Option<&Arc<BenchmarkMetrics>> {
        self.metrics.as_ref()
    }

    /// Number of region files currently open.
    pub fn open_regions(&self) -> usize {
        self.cache.len()
    }

    /// Raw payload of a chunk, `None` if it was never saved.
    pub fn load_chunk(&self, x: i32, z: i32) -> Result<Option<Vec<u8>>> {
        let pos = ChunkPos::new(x, z);
        let (lx, lz) = pos.local();
        let start = Instant::now();
        let result = self.cache.with_region(pos.region(), |region| region.load(lx, lz));

        if let Some(m) = &self.metrics {
            match &result {
                Ok(data) => m.record_load(start.elapsed(), data.is_some()),
                Err(_) => m.record_error(),
            }
        }
        result
    }

    /// Save with the configured compression scheme.
    pub fn save_chunk(&self, x: i32, z: i32, payload: &[u8]) -> Result<()> {
        self.save_chunk_with(x, z, payload, self.config().compression)
    }

    pub fn save_chunk_with(
        &self,
        x: i32,
        z: i32,
        payload: &[u8],
        scheme: CompressionScheme,
    ) -> Result<()> {
        let pos = ChunkPos::new(x, z);
        let (lx, lz) = pos.local();
        let start = Instant::now();
        let result = self
            .cache
            .with_region(pos.region(), |region| region.save(lx, lz, payload, scheme));

        match result {
            Ok(outcome) => {
                if let Some(m) = &self.metrics {
                    m.record_save(start.elapsed());
                    m.record_chunk_sizes(payload.len(), outcome.framed_bytes);
                    m.record_growth(outcome.grown_sectors);
                }
                Ok(())
            }
            Err(e) => {
                if let Some(m) = &self.metrics {
                    m.record_error();
                }
                Err(e)
            }
        }
    }

    /// Returns whether a chunk was actually removed.
    pub fn delete_chunk(&self, x: i32, z: i32) -> Result<bool> {
        let pos = ChunkPos::new(x, z);
        let (lx, lz) = pos.local();
        let deleted = self
            .cache
            .with_region(pos.region(), |region| region.delete(lx, lz))?;
        if deleted {
            if let Some(m) = &self.metrics {
                m.record_delete();
            }
        }
        Ok(deleted)
    }

    pub fn has_chunk(&self, x: i32, z: i32) -> Result<bool> {
        let pos = ChunkPos::new(x, z);
        let (lx, lz) = pos.local();
        self.cache
            .with_region(pos.region(), |region| Ok(region.has_chunk(lx, lz)))
    }

    /// Load and decode a chunk through a payload codec.
    pub fn load_as<C: PayloadCodec>(&self, codec: &C, x: i32, z: i32) -> anyhow::Result<Option<C::Chunk>> {
        let Some(bytes) = self
            .load_chunk(x, z)
            .with_context(|| format!("Failed to load chunk ({x}, {z})"))?
        else {
            return Ok(None);
        };
        let chunk = codec
            .decode_payload(&bytes)
            .with_context(|| format!("Failed to decode chunk ({x}, {z})"))?;
        Ok(Some(chunk))
    }

    /// Encode a chunk through a payload codec and save it.
    pub fn save_as<C: PayloadCodec>(&self, codec: &C, x: i32, z: i32, chunk: &C::Chunk) -> anyhow::Result<()> {
        let bytes = codec
            .encode_payload(chunk)
            .with_context(|| format!("Failed to encode chunk ({x}, {z})"))?;
        self.save_chunk(x, z, &bytes)
            .with_context(|| format!("Failed to save chunk ({x}, {z})"))
    }

    /// Occupancy of one region file (opens it if needed).
    pub fn region_stats(&self, region_x: i32, region_z: i32) -> Result<RegionStats> {
        self.cache
            .with_region(RegionPos::new(region_x, region_z), |region| Ok(region.stats()))
    }

    /// Global coordinates of every chunk stored in a region.
    pub fn region_chunks(&self, region_x: i32, region_z: i32) -> Result<Vec<ChunkPos>> {
        let pos = RegionPos::new(region_x, region_z);
        let origin = pos.origin();
        self.cache.with_region(pos, |region| {
            Ok(region
                .chunks()
                .into_iter()
                .map(|(lx, lz)| ChunkPos::new(origin.x + lx, origin.z + lz))
                .collect())
        })
    }

    pub fn flush(&self) -> Result<()> {
        self.cache.flush_all()
    }

    /// Flush and release all open region handles. The store can still be
    /// used afterwards; regions reopen on demand.
    pub fn close(&self) -> Result<()> {
        self.cache.close_all()
    }
}
