//! Anvil region files: sector allocation, record framing and per-region
//! chunk storage.
//!
//! A region file holds up to 1024 chunk records (a 32x32 grid of chunks).
//! Each record is compressed independently and stored in whole 4 KiB sectors.

pub mod codec;
pub mod error;
pub mod pos;
pub mod region;

pub use codec::{CompressionScheme, RecordCodec};
pub use error::{RegionError, Result};
pub use pos::{ChunkPos, RegionPos};
pub use region::{Region, RegionStats, SaveOutcome, SectorFile, SectorRange};
