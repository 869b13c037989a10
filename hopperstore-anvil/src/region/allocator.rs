//! Free/used sector tracking for one region file.
//!
//! Never persisted: rebuilt from the location table every time a region is
//! opened.

use super::HEADER_SECTORS;

/// One flag per sector of the backing file. Sectors 0 and 1 (the header)
/// are always used.
#[derive(Debug, Clone)]
pub struct SectorAllocator {
    used: Vec<bool>,
}

impl SectorAllocator {
    /// Track a file of `total_sectors` sectors, all free except the header.
    pub fn new(total_sectors: usize) -> Self {
        let mut used = vec![false; total_sectors.max(HEADER_SECTORS)];
        used[..HEADER_SECTORS].fill(true);
        Self { used }
    }

    pub fn total_sectors(&self) -> usize {
        self.used.len()
    }

    pub fn used_sectors(&self) -> usize {
        self.used.iter().filter(|u| **u).count()
    }

    pub fn free_sectors(&self) -> usize {
        self.total_sectors() - self.used_sectors()
    }

    pub fn is_used(&self, sector: usize) -> bool {
        self.used.get(sector).copied().unwrap_or(false)
    }

    /// True when every sector of the range exists and is free.
    pub fn is_range_free(&self, offset: usize, count: usize) -> bool {
        match self.used.get(offset..offset + count) {
            Some(range) => range.iter().all(|u| !*u),
            None => false,
        }
    }

    pub fn mark_used(&mut self, offset: usize, count: usize) {
        let end = (offset + count).min(self.used.len());
        if offset < end {
            self.used[offset..end].fill(true);
        }
    }

    /// Header sectors stay reserved.
    pub fn mark_free(&mut self, offset: usize, count: usize) {
        let start = offset.max(HEADER_SECTORS);
        let end = (offset + count).min(self.used.len());
        if start < end {
            self.used[start..end].fill(false);
        }
    }

    /// First-fit search: the lowest offset starting `count` contiguous free
    /// sectors, or `None` if the file has to grow.
    pub fn find_free_run(&self, count: usize) -> Option<usize> {
        if count == 0 {
            return None;
        }
        let mut run_start = 0;
        let mut run_len = 0;
        for (sector, used) in self.used.iter().enumerate() {
            if *used {
                run_len = 0;
                continue;
            }
            if run_len == 0 {
                run_start = sector;
            }
            run_len += 1;
            if run_len == count {
                return Some(run_start);
            }
        }
        None
    }

    /// Track `by` more sectors at the end of the file, all free.
    pub fn grow(&mut self, by: usize) {
        self.used.resize(self.used.len() + by, false);
    }
}
