//! One region file: 1024 chunk slots backed by 4 KiB sectors.

mod allocator;
mod file;
mod header;

pub use allocator::SectorAllocator;
pub use file::SectorFile;
pub use header::{Header, SectorRange};

use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;

use crate::codec::{CompressionScheme, RECORD_HEADER_BYTES, RecordCodec};
use crate::error::{RegionError, Result};
use crate::pos::{slot_coords, slot_index};

pub const SECTOR_BYTES: usize = 4096; // minecraft uses 4096 bytes per sector
pub const HEADER_SECTORS: usize = 2;
pub const HEADER_BYTES: usize = SECTOR_BYTES * HEADER_SECTORS; // location + timestamp tables

/// Chunks per region edge.
pub const REGION_SIZE: i32 = 32;
pub const REGION_SHIFT: i32 = 5;
pub const REGION_MASK: i32 = REGION_SIZE - 1;
/// Slots per region file.
pub const CHUNK_COUNT: usize = (REGION_SIZE * REGION_SIZE) as usize;

/// The location entry keeps the sector count in a single byte.
pub const MAX_RECORD_SECTORS: usize = 255;
/// The location entry keeps the sector offset in three bytes.
pub const MAX_SECTOR_OFFSET: u32 = 0x00FF_FFFF;

pub const REGION_EXTENSION: &str = "mca";

/// Whole sectors needed for `bytes`.
#[inline]
pub fn sectors_for(bytes: usize) -> usize {
    bytes.div_ceil(SECTOR_BYTES)
}

/// Occupancy summary of a region file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RegionStats {
    pub used_slots: usize,
    pub used_sectors: usize,
    pub free_sectors: usize,
    pub total_sectors: usize,
    pub file_bytes: u64,
}

/// Where a save landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveOutcome {
    pub range: SectorRange,
    /// Framed record size before sector padding.
    pub framed_bytes: usize,
    /// Sectors appended to the file for this save.
    pub grown_sectors: usize,
}

/// An open region file.
///
/// Not thread-safe: callers serialize access (the region cache wraps each
/// region in its own mutex).
pub struct Region<F: SectorFile = File> {
    file: Option<F>,
    header: Header,
    allocator: SectorAllocator,
    codec: RecordCodec,
    label: String,
}

impl Region<File> {
    /// Open `path`, creating an empty region file if it does not exist.
    pub fn open(path: impl AsRef<Path>, codec: RecordCodec) -> Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        Self::with_label(file, codec, path.display().to_string())
    }
}

impl<F: SectorFile> Region<F> {
    /// Open a region over arbitrary storage.
    pub fn from_file(file: F, codec: RecordCodec) -> Result<Self> {
        Self::with_label(file, codec, "<memory>".to_string())
    }

    fn with_label(mut file: F, codec: RecordCodec, label: String) -> Result<Self> {
        let mut len = file.byte_len()?;

        if len < HEADER_BYTES as u64 {
            if len != 0 {
                log::warn!("{label}: file is {len} bytes, shorter than the header; reinitializing");
            }
            file.write_all_at(0, &Header::empty().to_bytes())?;
            file.set_byte_len(HEADER_BYTES as u64)?;
            file.sync()?;
            len = HEADER_BYTES as u64;
        } else if len % SECTOR_BYTES as u64 != 0 {
            let padded = len.div_ceil(SECTOR_BYTES as u64) * SECTOR_BYTES as u64;
            log::warn!("{label}: length {len} is not sector aligned, padding to {padded}");
            file.set_byte_len(padded)?;
            file.sync()?;
            len = padded;
        }

        let mut raw = vec![0u8; HEADER_BYTES];
        file.read_exact_at(0, &mut raw)?;
        let mut header = Header::parse(&raw);

        let total_sectors = (len / SECTOR_BYTES as u64) as usize;
        let mut allocator = SectorAllocator::new(total_sectors);

        // Entries are accepted in slot order; later claims on taken sectors lose.
        for slot in 0..CHUNK_COUNT {
            let range = header.location(slot);
            if range.is_empty() {
                continue;
            }
            let problem = if range.offset() < HEADER_SECTORS {
                Some("points into the header")
            } else if range.count() == 0 {
                Some("has zero sectors")
            } else if range.end() > total_sectors {
                Some("extends past the end of the file")
            } else if !allocator.is_range_free(range.offset(), range.count()) {
                Some("overlaps another record")
            } else {
                None
            };

            match problem {
                Some(reason) => {
                    let (x, z) = slot_coords(slot).unwrap_or_default();
                    log::warn!(
                        "{label}: ignoring location entry for chunk ({x}, {z}): sectors {}..{} {reason}",
                        range.offset(),
                        range.end()
                    );
                    header.set_location(slot, SectorRange::EMPTY);
                }
                None => allocator.mark_used(range.offset(), range.count()),
            }
        }

        log::debug!(
            "{label}: opened with {} chunks in {total_sectors} sectors",
            header.occupied().count()
        );

        Ok(Self {
            file: Some(file),
            header,
            allocator,
            codec,
            label,
        })
    }

    fn file_mut(&mut self) -> Result<&mut F> {
        self.file.as_mut().ok_or(RegionError::Closed)
    }

    pub fn is_closed(&self) -> bool {
        self.file.is_none()
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn has_chunk(&self, local_x: i32, local_z: i32) -> bool {
        !self.header.location(slot_index(local_x, local_z)).is_empty()
    }

    pub fn location(&self, local_x: i32, local_z: i32) -> SectorRange {
        self.header.location(slot_index(local_x, local_z))
    }

    /// Unix seconds of the last save, 0 if never saved.
    pub fn timestamp(&self, local_x: i32, local_z: i32) -> u32 {
        self.header.timestamp(slot_index(local_x, local_z))
    }

    /// Local coordinates of every stored chunk.
    pub fn chunks(&self) -> Vec<(i32, i32)> {
        self.header
            .occupied()
            .filter_map(|(slot, _)| slot_coords(slot))
            .collect()
    }

    pub fn stats(&self) -> RegionStats {
        let total_sectors = self.allocator.total_sectors();
        RegionStats {
            used_slots: self.header.occupied().count(),
            used_sectors: self.allocator.used_sectors(),
            free_sectors: self.allocator.free_sectors(),
            total_sectors,
            file_bytes: (total_sectors * SECTOR_BYTES) as u64,
        }
    }

    /// Read and inflate one chunk. `Ok(None)` means the slot is empty.
    ///
    /// An unreadable record is an error, never `None`; the slot is left as is.
    pub fn load(&mut self, local_x: i32, local_z: i32) -> Result<Option<Vec<u8>>> {
        let range = self.location(local_x, local_z);
        if range.is_empty() {
            return Ok(None);
        }

        let file = self.file_mut()?;
        let mut head = [0u8; RECORD_HEADER_BYTES];
        read_record_bytes(file, range.byte_offset(), &mut head)?;

        let length = u32::from_be_bytes([head[0], head[1], head[2], head[3]]);
        if length == 0 || length as usize + 4 > range.byte_len() {
            return Err(RegionError::InvalidLength {
                length,
                sectors: range.count() as u8,
            });
        }

        let mut framed = vec![0u8; 4 + length as usize];
        framed[..RECORD_HEADER_BYTES].copy_from_slice(&head);
        read_record_bytes(
            file,
            range.byte_offset() + RECORD_HEADER_BYTES as u64,
            &mut framed[RECORD_HEADER_BYTES..],
        )?;

        RecordCodec::decode(&framed).map(Some)
    }

    /// Compress and store one chunk, replacing any previous record.
    ///
    /// The record is reused in place when it needs the same number of
    /// sectors; otherwise it moves to the first free run, growing the file
    /// when none fits. The data is synced before the location entry is
    /// written, and a moved record's old sectors stay reserved until the new
    /// entry is synced too.
    pub fn save(
        &mut self,
        local_x: i32,
        local_z: i32,
        payload: &[u8],
        scheme: CompressionScheme,
    ) -> Result<SaveOutcome> {
        let mut framed = self.codec.encode(payload, scheme)?;
        let framed_bytes = framed.len();
        let needed = sectors_for(framed_bytes);
        if needed > MAX_RECORD_SECTORS {
            return Err(RegionError::OversizedRecord { sectors: needed });
        }

        let slot = slot_index(local_x, local_z);
        let current = self.header.location(slot);
        let total_before = self.allocator.total_sectors();

        let range = if !current.is_empty() && current.count() == needed {
            current
        } else {
            let offset = match self.allocator.find_free_run(needed) {
                Some(offset) => offset,
                None => self.grow(needed)?,
            };
            SectorRange::new(offset, needed)
        };

        framed.resize(needed * SECTOR_BYTES, 0);
        let file = self.file_mut()?;
        file.write_all_at(range.byte_offset(), &framed)?;
        file.sync()?;

        if let Err(e) = self.write_location(slot, range) {
            self.restore_location(slot, current, range);
            return Err(e);
        }
        // The entry on disk may point at the new range from here on
        self.allocator.mark_used(range.offset(), range.count());
        self.header.set_location(slot, range);

        let timestamp = unix_now();
        let file = self.file_mut()?;
        file.write_all_at(Header::timestamp_entry_offset(slot), &timestamp.to_be_bytes())?;
        file.sync()?;
        self.header.set_timestamp(slot, timestamp);

        if range != current && !current.is_empty() {
            self.allocator.mark_free(current.offset(), current.count());
        }

        Ok(SaveOutcome {
            range,
            framed_bytes,
            grown_sectors: self.allocator.total_sectors() - total_before,
        })
    }

    fn write_location(&mut self, slot: usize, range: SectorRange) -> Result<()> {
        self.file_mut()?
            .write_all_at(Header::location_entry_offset(slot), &range.to_raw().to_be_bytes())?;
        Ok(())
    }

    /// Undo a failed location write. If the previous entry cannot be put
    /// back, the attempted range stays reserved until the region is reopened.
    fn restore_location(&mut self, slot: usize, previous: SectorRange, attempted: SectorRange) {
        let restored = self
            .write_location(slot, previous)
            .and_then(|()| Ok(self.file_mut()?.sync()?));
        if let Err(e) = restored {
            log::error!(
                "{}: could not restore location entry for slot {slot}: {e}",
                self.label
            );
            self.allocator.mark_used(attempted.offset(), attempted.count());
        }
    }

    /// Append `sectors` zeroed sectors and return the first new offset.
    fn grow(&mut self, sectors: usize) -> Result<usize> {
        let offset = self.allocator.total_sectors();
        if (offset + sectors) as u64 > MAX_SECTOR_OFFSET as u64 {
            return Err(RegionError::Io(io::Error::new(
                io::ErrorKind::StorageFull,
                "region file exceeds the addressable sector range",
            )));
        }
        let new_len = ((offset + sectors) * SECTOR_BYTES) as u64;
        self.file_mut()?.set_byte_len(new_len)?;
        self.allocator.grow(sectors);
        log::debug!("{}: grew by {sectors} sectors to {new_len} bytes", self.label);
        Ok(offset)
    }

    /// Clear a slot and release its sectors. Returns whether a record was present.
    pub fn delete(&mut self, local_x: i32, local_z: i32) -> Result<bool> {
        let slot = slot_index(local_x, local_z);
        let range = self.header.location(slot);
        if range.is_empty() {
            return Ok(false);
        }

        let file = self.file_mut()?;
        file.write_all_at(Header::location_entry_offset(slot), &0u32.to_be_bytes())?;
        file.write_all_at(Header::timestamp_entry_offset(slot), &0u32.to_be_bytes())?;
        file.sync()?;

        self.header.set_location(slot, SectorRange::EMPTY);
        self.header.set_timestamp(slot, 0);
        self.allocator.mark_free(range.offset(), range.count());
        Ok(true)
    }

    pub fn flush(&mut self) -> Result<()> {
        let file = self.file_mut()?;
        file.flush()?;
        file.sync()?;
        Ok(())
    }

    /// Flush and release the handle. Closing twice is a no-op.
    pub fn close(&mut self) -> Result<()> {
        if let Some(mut file) = self.file.take() {
            file.flush()?;
            file.sync()?;
            log::debug!("{}: closed", self.label);
        }
        Ok(())
    }

    /// Close and hand back the storage.
    pub fn into_file(mut self) -> Result<F> {
        let mut file = self.file.take().ok_or(RegionError::Closed)?;
        file.flush()?;
        file.sync()?;
        Ok(file)
    }
}

/// Read at `pos`, reporting a short file as a truncated record.
fn read_record_bytes<F: SectorFile>(file: &mut F, pos: u64, buf: &mut [u8]) -> Result<()> {
    match file.read_exact_at(pos, buf) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
            let available = file.byte_len()?.saturating_sub(pos);
            Err(RegionError::Truncated {
                expected: buf.len(),
                found: available.min(buf.len() as u64) as usize,
            })
        }
        Err(e) => Err(e.into()),
    }
}

fn unix_now() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as u32)
        .unwrap_or(0)
}

/// Path of a region file inside `dir`.
pub fn region_path(dir: &Path, x: i32, z: i32, extension: &str) -> PathBuf {
    dir.join(crate::pos::RegionPos::new(x, z).file_name(extension))
}
