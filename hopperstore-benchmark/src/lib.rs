use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
pub struct BenchmarkMetrics {
    // Storage Read
    pub total_chunks_loaded: AtomicUsize,
    pub total_chunks_missing: AtomicUsize,
    pub total_load_time_us: AtomicU64,
    pub max_load_time_us: AtomicU64,

    // Storage Write
    pub total_chunks_saved: AtomicUsize,
    pub total_save_time_us: AtomicU64,
    pub max_save_time_us: AtomicU64,
    pub total_chunks_deleted: AtomicUsize,

    // Record sizes
    pub total_bytes_raw: AtomicUsize,
    pub total_bytes_framed: AtomicUsize,
    pub total_sectors_grown: AtomicUsize,

    pub total_errors: AtomicUsize,

    // Region cache
    pub total_cache_hits: AtomicUsize,
    pub total_cache_misses: AtomicUsize,
    pub total_cache_evictions: AtomicUsize,

    // Session
    pub start_time: Option<Instant>,
    pub config_summary: String,
}

impl BenchmarkMetrics {
    pub fn new(config_summary: String) -> Self {
        Self {
            start_time: Some(Instant::now()),
            config_summary,
            ..Default::default()
        }
    }

    /// `found` is false when the slot was empty.
    pub fn record_load(&self, duration: Duration, found: bool) {
        if found {
            self.total_chunks_loaded.fetch_add(1, Ordering::Relaxed);
        } else {
            self.total_chunks_missing.fetch_add(1, Ordering::Relaxed);
        }
        let us = duration.as_micros() as u64;
        self.total_load_time_us.fetch_add(us, Ordering::Relaxed);
        self.max_load_time_us.fetch_max(us, Ordering::Relaxed);
    }

    pub fn record_save(&self, duration: Duration) {
        self.total_chunks_saved.fetch_add(1, Ordering::Relaxed);
        let us = duration.as_micros() as u64;
        self.total_save_time_us.fetch_add(us, Ordering::Relaxed);
        self.max_save_time_us.fetch_max(us, Ordering::Relaxed);
    }

    pub fn record_delete(&self) {
        self.total_chunks_deleted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_chunk_sizes(&self, raw: usize, framed: usize) {
        self.total_bytes_raw.fetch_add(raw, Ordering::Relaxed);
        self.total_bytes_framed.fetch_add(framed, Ordering::Relaxed);
    }

    pub fn record_growth(&self, sectors: usize) {
        self.total_sectors_grown.fetch_add(sectors, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.total_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_hit(&self) {
        self.total_cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_miss(&self) {
        self.total_cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_eviction(&self) {
        self.total_cache_evictions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn generate_report(&self) -> String {
        let uptime = self.start_time.unwrap_or_else(Instant::now).elapsed();

        let loaded = self.total_chunks_loaded.load(Ordering::Relaxed);
        let missing = self.total_chunks_missing.load(Ordering::Relaxed);
        let load_requests = loaded + missing;
        let load_time = self.total_load_time_us.load(Ordering::Relaxed) as f64 / 1000.0; // ms
        let load_avg = if load_requests > 0 { load_time / load_requests as f64 } else { 0.0 };
        let load_max = self.max_load_time_us.load(Ordering::Relaxed) as f64 / 1000.0;

        let saved = self.total_chunks_saved.load(Ordering::Relaxed);
        let save_time = self.total_save_time_us.load(Ordering::Relaxed) as f64 / 1000.0;
        let save_avg = if saved > 0 { save_time / saved as f64 } else { 0.0 };
        let save_max = self.max_save_time_us.load(Ordering::Relaxed) as f64 / 1000.0;
        let deleted = self.total_chunks_deleted.load(Ordering::Relaxed);

        let raw = self.total_bytes_raw.load(Ordering::Relaxed);
        let framed = self.total_bytes_framed.load(Ordering::Relaxed);
        let avg_raw_kb = if saved > 0 { raw as f64 / saved as f64 / 1024.0 } else { 0.0 };
        let avg_framed_kb = if saved > 0 { framed as f64 / saved as f64 / 1024.0 } else { 0.0 };
        let compression_ratio = if framed > 0 { raw as f64 / framed as f64 } else { 0.0 };
        let grown = self.total_sectors_grown.load(Ordering::Relaxed);

        let write_throughput = if uptime.as_secs_f64() > 0.0 {
            (raw as f64 / 1024.0 / 1024.0) / uptime.as_secs_f64()
        } else { 0.0 };

        let hits = self.total_cache_hits.load(Ordering::Relaxed);
        let misses = self.total_cache_misses.load(Ordering::Relaxed);
        let evictions = self.total_cache_evictions.load(Ordering::Relaxed);
        let total_requests = hits + misses;
        let hit_rate = if total_requests > 0 { (hits as f64 / total_requests as f64) * 100.0 } else { 0.0 };

        let errors = self.total_errors.load(Ordering::Relaxed);

        format!(
            "HopperStore Benchmark Report\n\
             ============================\n\
             Configuration: {}\n\
             Session Duration: {:.2?}\n\n\
             [Storage Read]\n\
             Chunks Loaded: {}\n\
             Chunks Missing: {}\n\
             Avg Time: {:.2} ms/chunk\n\
             Max Time: {:.2} ms\n\n\
             [Storage Write]\n\
             Chunks Saved: {}\n\
             Chunks Deleted: {}\n\
             Avg Time: {:.2} ms/chunk\n\
             Max Time: {:.2} ms\n\
             Throughput: {:.2} MB/s\n\
             Compression Ratio: {:.2}x ({:.1} KB -> {:.1} KB)\n\
             Sectors Appended: {}\n\n\
             [Region Cache]\n\
             Hits: {}\n\
             Misses: {}\n\
             Evictions: {}\n\
             Hit Rate: {:.1}%\n\n\
             Errors: {}\n",
            self.config_summary,
            uptime,
            loaded, missing, load_avg, load_max,
            saved, deleted, save_avg, save_max, write_throughput,
            compression_ratio, avg_raw_kb, avg_framed_kb,
            grown,
            hits, misses, evictions, hit_rate,
            errors
        )
    }
}
