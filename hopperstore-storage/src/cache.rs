//! Bounded set of open region files.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use hopperstore_anvil::{Region, RegionError, RegionPos, Result};
use hopperstore_benchmark::BenchmarkMetrics;
use lru::LruCache;

use crate::config::StoreConfig;

type SharedRegion = Arc<Mutex<Region>>;

struct OpenRegions {
    lru: LruCache<RegionPos, SharedRegion>,
    /// Evicted regions whose handle may still be open.
    closing: HashMap<RegionPos, SharedRegion>,
}

/// Open region handles keyed by region coordinate, least recently used
/// evicted first.
///
/// The map lock only guards lookups, opens and the eviction decision. Each
/// region has its own lock, held for the duration of one operation. An
/// evicted region is closed after the map lock is released, and its
/// coordinate is not reopened until that close has finished.
pub struct RegionCache {
    config: StoreConfig,
    regions: Mutex<OpenRegions>,
    metrics: Option<Arc<BenchmarkMetrics>>,
}

impl RegionCache {
    pub fn new(config: StoreConfig, metrics: Option<Arc<BenchmarkMetrics>>) -> Self {
        let capacity = NonZeroUsize::new(config.max_open_regions).unwrap_or(NonZeroUsize::MIN);
        Self {
            config,
            regions: Mutex::new(OpenRegions {
                lru: LruCache::new(capacity),
                closing: HashMap::new(),
            }),
            metrics,
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Number of open regions.
    pub fn len(&self) -> usize {
        self.lock_map().lru.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, pos: RegionPos) -> bool {
        self.lock_map().lru.contains(&pos)
    }

    /// Run `f` against the region at `pos`, opening it if needed.
    ///
    /// The region is locked for the whole call and must not escape it.
    pub fn with_region<T>(
        &self,
        pos: RegionPos,
        f: impl FnOnce(&mut Region) -> Result<T>,
    ) -> Result<T> {
        let mut f = Some(f);
        loop {
            let shared = self.get(pos)?;
            let mut region = lock_region(&shared);
            // Evicted between lookup and lock: resolve again
            if region.is_closed() {
                continue;
            }
            let f = f.take().ok_or(RegionError::Closed)?;
            return f(&mut *region);
        }
    }

    fn get(&self, pos: RegionPos) -> Result<SharedRegion> {
        loop {
            let mut regions = self.lock_map();
            if let Some(shared) = regions.lru.get(&pos) {
                if let Some(m) = &self.metrics {
                    m.record_cache_hit();
                }
                return Ok(Arc::clone(shared));
            }
            if let Some(closing) = regions.closing.get(&pos).cloned() {
                drop(regions);
                self.finish_close(pos, &closing);
                continue;
            }
            if let Some(m) = &self.metrics {
                m.record_cache_miss();
            }

            let region = Region::open(self.config.region_path(pos), self.config.codec())?;
            log::debug!("Opened region {pos} ({} open)", regions.lru.len() + 1);

            let evicted = if regions.lru.len() >= regions.lru.cap().get() {
                regions.lru.pop_lru()
            } else {
                None
            };
            if let Some((old_pos, old)) = &evicted {
                regions.closing.insert(*old_pos, Arc::clone(old));
            }

            let shared = Arc::new(Mutex::new(region));
            regions.lru.put(pos, Arc::clone(&shared));
            drop(regions);

            if let Some((old_pos, old)) = evicted {
                self.finish_close(old_pos, &old);
                if let Some(m) = &self.metrics {
                    m.record_cache_eviction();
                }
            }
            return Ok(shared);
        }
    }

    /// Close an evicted region, waiting for in-flight operations, then
    /// allow its coordinate to be opened again.
    fn finish_close(&self, pos: RegionPos, shared: &SharedRegion) {
        close_region(pos, shared);
        let mut regions = self.lock_map();
        if regions
            .closing
            .get(&pos)
            .is_some_and(|c| Arc::ptr_eq(c, shared))
        {
            regions.closing.remove(&pos);
        }
    }

    /// Flush every open region. Stops at the first error.
    pub fn flush_all(&self) -> Result<()> {
        let regions = self.lock_map();
        for (_, shared) in regions.lru.iter() {
            let mut region = lock_region(shared);
            if !region.is_closed() {
                region.flush()?;
            }
        }
        Ok(())
    }

    /// Close and forget every open region. All regions are closed even if
    /// one fails; the first error is returned.
    pub fn close_all(&self) -> Result<()> {
        let mut regions = self.lock_map();
        let mut first_error = None;
        while let Some((pos, shared)) = regions.lru.pop_lru() {
            if let Err(e) = lock_region(&shared).close() {
                log::error!("Failed to close region {pos}: {e}");
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn lock_map(&self) -> MutexGuard<'_, OpenRegions> {
        self.regions.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for RegionCache {
    fn drop(&mut self) {
        if let Err(e) = self.close_all() {
            log::warn!("Error while closing region cache: {e}");
        }
    }
}

fn lock_region(shared: &SharedRegion) -> MutexGuard<'_, Region> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Waits for in-flight operations on the region before closing it.
fn close_region(pos: RegionPos, shared: &SharedRegion) {
    let mut region = lock_region(shared);
    if region.is_closed() {
        return;
    }
    match region.close() {
        Ok(()) => log::debug!("Evicted region {pos}"),
        Err(e) => log::warn!("Failed to close evicted region {pos}: {e}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hopperstore_anvil::CompressionScheme;
    use std::sync::atomic::Ordering;

    fn cache(dir: &std::path::Path, capacity: usize) -> (RegionCache, Arc<BenchmarkMetrics>) {
        let metrics = Arc::new(BenchmarkMetrics::default());
        let config = StoreConfig::new(dir).with_max_open_regions(capacity);
        (RegionCache::new(config, Some(Arc::clone(&metrics))), metrics)
    }

    #[test]
    fn test_opens_lazily() {
        let dir = tempfile::tempdir().unwrap();
        let (cache, metrics) = cache(dir.path(), 4);
        assert!(cache.is_empty());

        let pos = RegionPos::new(0, 0);
        let has = cache.with_region(pos, |r| Ok(r.has_chunk(0, 0))).unwrap();
        assert!(!has);
        assert!(cache.contains(pos));
        assert!(dir.path().join("r.0.0.mca").exists());

        cache.with_region(pos, |_| Ok(())).unwrap();
        assert_eq!(metrics.total_cache_misses.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.total_cache_hits.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_evicts_least_recently_used() {
        let dir = tempfile::tempdir().unwrap();
        let (cache, metrics) = cache(dir.path(), 2);
        let a = RegionPos::new(0, 0);
        let b = RegionPos::new(1, 0);
        let c = RegionPos::new(0, 1);

        cache
            .with_region(a, |r| r.save(0, 0, b"a", CompressionScheme::Zlib).map(|_| ()))
            .unwrap();
        cache.with_region(b, |_| Ok(())).unwrap();
        // Touch a so b becomes the eviction candidate
        cache.with_region(a, |_| Ok(())).unwrap();
        cache.with_region(c, |_| Ok(())).unwrap();

        assert_eq!(cache.len(), 2);
        assert!(cache.contains(a));
        assert!(!cache.contains(b));
        assert!(cache.contains(c));
        assert_eq!(metrics.total_cache_evictions.load(Ordering::Relaxed), 1);

        // Evict a, then reopen it from disk
        cache.with_region(b, |_| Ok(())).unwrap();
        cache.with_region(c, |_| Ok(())).unwrap();
        assert!(!cache.contains(a));
        let data = cache.with_region(a, |r| r.load(0, 0)).unwrap();
        assert_eq!(data, Some(b"a".to_vec()));
    }

    #[test]
    fn test_zero_capacity_holds_one() {
        let dir = tempfile::tempdir().unwrap();
        let (cache, _) = cache(dir.path(), 0);
        cache.with_region(RegionPos::new(0, 0), |_| Ok(())).unwrap();
        cache.with_region(RegionPos::new(5, 5), |_| Ok(())).unwrap();
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_close_all() {
        let dir = tempfile::tempdir().unwrap();
        let (cache, _) = cache(dir.path(), 8);
        for x in 0..3 {
            cache.with_region(RegionPos::new(x, 0), |_| Ok(())).unwrap();
        }
        cache.flush_all().unwrap();
        cache.close_all().unwrap();
        assert!(cache.is_empty());
        // Usable again afterwards
        cache.with_region(RegionPos::new(0, 0), |_| Ok(())).unwrap();
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_parallel_regions() {
        let dir = tempfile::tempdir().unwrap();
        let (cache, _) = cache(dir.path(), 2);
        let cache = Arc::new(cache);

        let handles: Vec<_> = (0..4)
            .map(|t| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || {
                    for i in 0..16 {
                        let pos = RegionPos::new(t % 3, 0);
                        let payload = format!("thread {t} write {i}").into_bytes();
                        cache
                            .with_region(pos, |r| {
                                r.save(t, i, &payload, CompressionScheme::Zlib)?;
                                r.load(t, i)
                            })
                            .map(|loaded| assert_eq!(loaded, Some(payload.clone())))
                            .unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let loaded = cache
            .with_region(RegionPos::new(0, 0), |r| r.load(3, 15))
            .unwrap();
        assert_eq!(loaded, Some(b"thread 3 write 15".to_vec()));
    }

    #[test]
    fn test_eviction_does_not_block_other_regions() {
        use std::sync::mpsc;
        use std::time::Duration;

        let dir = tempfile::tempdir().unwrap();
        let (cache, _) = cache(dir.path(), 1);
        let cache = Arc::new(cache);
        let a = RegionPos::new(0, 0);
        let b = RegionPos::new(1, 0);
        let c = RegionPos::new(2, 0);

        // Hold region a busy until released
        let (started_tx, started_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let busy = {
            let cache = Arc::clone(&cache);
            std::thread::spawn(move || {
                cache
                    .with_region(a, |r| {
                        started_tx.send(()).unwrap();
                        release_rx.recv().unwrap();
                        r.save(0, 0, b"busy", CompressionScheme::Zlib).map(|_| ())
                    })
                    .unwrap();
            })
        };
        started_rx.recv().unwrap();

        // Opening b evicts a and waits for it to finish
        let evictor = {
            let cache = Arc::clone(&cache);
            std::thread::spawn(move || cache.with_region(b, |_| Ok(())).unwrap())
        };
        let mut waited = 0;
        while !cache.contains(b) {
            assert!(waited < 500, "region b was never opened");
            std::thread::sleep(Duration::from_millis(10));
            waited += 1;
        }

        // Other regions stay reachable meanwhile
        cache.with_region(c, |r| r.save(0, 0, b"c", CompressionScheme::Zlib).map(|_| ())).unwrap();

        release_tx.send(()).unwrap();
        busy.join().unwrap();
        evictor.join().unwrap();

        let loaded = cache.with_region(a, |r| r.load(0, 0)).unwrap();
        assert_eq!(loaded, Some(b"busy".to_vec()));
        assert_eq!(cache.with_region(c, |r| r.load(0, 0)).unwrap(), Some(b"c".to_vec()));
    }
}
