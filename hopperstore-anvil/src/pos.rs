//! Chunk and region coordinates.

use std::fmt;

use crate::region::{CHUNK_COUNT, REGION_MASK, REGION_SHIFT, REGION_SIZE};

/// Slot index of a chunk inside its region: `x + z * 32`.
///
/// Coordinates are masked to 0..31 first, so global chunk coordinates
/// can be passed directly.
#[inline]
pub fn slot_index(local_x: i32, local_z: i32) -> usize {
    ((local_x & REGION_MASK) + (local_z & REGION_MASK) * REGION_SIZE) as usize
}

/// Reverse of [`slot_index`].
#[inline]
pub fn slot_coords(slot: usize) -> Option<(i32, i32)> {
    if slot >= CHUNK_COUNT {
        return None;
    }
    let x = (slot % REGION_SIZE as usize) as i32;
    let z = (slot / REGION_SIZE as usize) as i32;
    Some((x, z))
}

/// Global chunk coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChunkPos {
    pub x: i32,
    pub z: i32,
}

impl ChunkPos {
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// Region containing this chunk. Arithmetic shift, so `-1` lands in region `-1`.
    pub const fn region(self) -> RegionPos {
        RegionPos::new(self.x >> REGION_SHIFT, self.z >> REGION_SHIFT)
    }

    /// Coordinates inside the region, both in 0..32.
    pub const fn local(self) -> (i32, i32) {
        (self.x & REGION_MASK, self.z & REGION_MASK)
    }

    pub fn slot(self) -> usize {
        slot_index(self.x, self.z)
    }
}

/// Region coordinate, one region per 32x32 chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegionPos {
    pub x: i32,
    pub z: i32,
}

impl RegionPos {
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// File name for this region, e.g. `r.0.-1.mca`.
    pub fn file_name(self, extension: &str) -> String {
        format!("r.{}.{}.{}", self.x, self.z, extension)
    }

    /// Parse a name produced by [`RegionPos::file_name`].
    pub fn from_file_name(name: &str, extension: &str) -> Option<Self> {
        let stem = name.strip_suffix(extension)?.strip_suffix('.')?;
        let mut parts = stem.split('.');
        if parts.next()? != "r" {
            return None;
        }
        let x = parts.next()?.parse().ok()?;
        let z = parts.next()?.parse().ok()?;
        if parts.next().is_some() {
            return None;
        }
        Some(Self { x, z })
    }

    /// Global coordinate of the chunk at local (0, 0).
    pub const fn origin(self) -> ChunkPos {
        ChunkPos::new(self.x << REGION_SHIFT, self.z << REGION_SHIFT)
    }
}

impl fmt::Display for RegionPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.z)
    }
}
