//! Region file header.
//!
//! The header consists of two tables:
//! - Location table: where each chunk is stored
//! - Timestamp table: when each chunk was last saved

use super::{CHUNK_COUNT, HEADER_BYTES, MAX_SECTOR_OFFSET, SECTOR_BYTES};

/// Sectors occupied by one record.
///
/// Stored as `(offset << 8) | count`: 3 bytes offset + 1 byte sector count.
/// A raw value of 0 means the slot is empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SectorRange {
    offset: u32,
    count: u8,
}

impl SectorRange {
    pub const EMPTY: Self = Self { offset: 0, count: 0 };

    pub fn new(offset: usize, count: usize) -> Self {
        debug_assert!(offset as u64 <= MAX_SECTOR_OFFSET as u64);
        debug_assert!(count <= u8::MAX as usize);
        Self {
            offset: offset as u32,
            count: count as u8,
        }
    }

    #[inline]
    pub fn from_raw(raw: u32) -> Self {
        Self {
            offset: raw >> 8,
            count: (raw & 0xFF) as u8,
        }
    }

    #[inline]
    pub fn to_raw(self) -> u32 {
        (self.offset << 8) | self.count as u32
    }

    pub fn offset(self) -> usize {
        self.offset as usize
    }

    pub fn count(self) -> usize {
        self.count as usize
    }

    /// First sector past the record.
    pub fn end(self) -> usize {
        self.offset() + self.count()
    }

    pub fn is_empty(self) -> bool {
        self.to_raw() == 0
    }

    /// Byte position of the record in the file.
    pub fn byte_offset(self) -> u64 {
        self.offset as u64 * SECTOR_BYTES as u64
    }

    /// Bytes available to the record.
    pub fn byte_len(self) -> usize {
        self.count() * SECTOR_BYTES
    }

    pub fn overlaps(self, other: SectorRange) -> bool {
        self.offset() < other.end() && other.offset() < self.end()
    }
}

/// In-memory copy of the location and timestamp tables.
#[derive(Debug, Clone)]
pub struct Header {
    locations: Vec<SectorRange>,
    timestamps: Vec<u32>,
}

impl Header {
    pub fn empty() -> Self {
        Self {
            locations: vec![SectorRange::EMPTY; CHUNK_COUNT],
            timestamps: vec![0; CHUNK_COUNT],
        }
    }

    /// Parse the 8 KiB header. Missing trailing bytes read as zero.
    pub fn parse(bytes: &[u8]) -> Self {
        let entry = |index: usize| -> u32 {
            let start = index * 4;
            match bytes.get(start..start + 4) {
                Some(b) => u32::from_be_bytes([b[0], b[1], b[2], b[3]]),
                None => 0,
            }
        };

        let locations = (0..CHUNK_COUNT).map(|i| SectorRange::from_raw(entry(i))).collect();
        let timestamps = (0..CHUNK_COUNT).map(|i| entry(CHUNK_COUNT + i)).collect();
        Self {
            locations,
            timestamps,
        }
    }

    /// Serialize both tables (8192 bytes).
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut header = Vec::with_capacity(HEADER_BYTES);
        for range in &self.locations {
            header.extend_from_slice(&range.to_raw().to_be_bytes());
        }
        for timestamp in &self.timestamps {
            header.extend_from_slice(&timestamp.to_be_bytes());
        }
        header
    }

    pub fn location(&self, slot: usize) -> SectorRange {
        self.locations[slot]
    }

    pub fn set_location(&mut self, slot: usize, range: SectorRange) {
        self.locations[slot] = range;
    }

    pub fn timestamp(&self, slot: usize) -> u32 {
        self.timestamps[slot]
    }

    pub fn set_timestamp(&mut self, slot: usize, timestamp: u32) {
        self.timestamps[slot] = timestamp;
    }

    /// Occupied slots with their ranges, in slot order.
    pub fn occupied(&self) -> impl Iterator<Item = (usize, SectorRange)> + '_ {
        self.locations
            .iter()
            .enumerate()
            .filter(|(_, range)| !range.is_empty())
            .map(|(slot, range)| (slot, *range))
    }

    /// File offset of a slot's location entry.
    #[inline]
    pub fn location_entry_offset(slot: usize) -> u64 {
        (slot * 4) as u64
    }

    /// File offset of a slot's timestamp entry.
    #[inline]
    pub fn timestamp_entry_offset(slot: usize) -> u64 {
        (SECTOR_BYTES + slot * 4) as u64
    }
}
