use std::io;

use thiserror::Error;

use crate::region::MAX_RECORD_SECTORS;

/// Errors raised by region file operations.
///
/// Corrupt index entries are not represented here: they are recovered while
/// opening a region and only logged.
#[derive(Debug, Error)]
pub enum RegionError {
    /// An underlying I/O error. Never retried.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// The framed record would need more sectors than a location entry can describe.
    #[error("record needs {sectors} sectors (limit is {max})", max = MAX_RECORD_SECTORS)]
    OversizedRecord { sectors: usize },

    /// The record header names a compression scheme we do not know.
    #[error("unknown compression scheme {0}")]
    UnknownCompression(u8),

    /// Fewer bytes were available than the record header promised.
    #[error("record truncated: expected {expected} bytes, found {found}")]
    Truncated { expected: usize, found: usize },

    /// The length field does not fit the sectors allocated to the record.
    #[error("invalid record length {length} for a {sectors}-sector allocation")]
    InvalidLength { length: u32, sectors: u8 },

    /// The compressed payload could not be inflated.
    #[error("decompression failed: {0}")]
    Decompress(#[source] io::Error),

    /// The region handle was already closed.
    #[error("region is closed")]
    Closed,
}

pub type Result<T> = std::result::Result<T, RegionError>;
