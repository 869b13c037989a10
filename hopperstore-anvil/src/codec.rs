//! Record framing.
//!
//! A record on disk is `[length:4 BE][scheme:1][compressed:length-1]`.
//! Framing happens fully in memory so the final size is known before any
//! sectors are allocated.

use std::io::{Read, Write};

use flate2::Compression;
use flate2::read::{GzDecoder, ZlibDecoder};
use flate2::write::{GzEncoder, ZlibEncoder};

use crate::error::{RegionError, Result};

/// Length field plus compression byte.
pub const RECORD_HEADER_BYTES: usize = 5;

/// Compression scheme byte stored in each record header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum CompressionScheme {
    /// Older worlds. Still written when asked for explicitly.
    Gzip = 1,
    #[default]
    Zlib = 2,
}

impl CompressionScheme {
    pub fn id(self) -> u8 {
        self as u8
    }

    pub fn from_id(id: u8) -> Result<Self> {
        match id {
            1 => Ok(Self::Gzip),
            2 => Ok(Self::Zlib),
            other => Err(RegionError::UnknownCompression(other)),
        }
    }
}

impl TryFrom<u8> for CompressionScheme {
    type Error = RegionError;

    fn try_from(id: u8) -> Result<Self> {
        Self::from_id(id)
    }
}

/// Stateless encoder/decoder for framed records.
#[derive(Debug, Clone, Copy)]
pub struct RecordCodec {
    level: Compression,
}

impl RecordCodec {
    /// `level` is a flate2 level, clamped to 0..=9.
    pub fn new(level: u32) -> Self {
        Self {
            level: Compression::new(level.min(9)),
        }
    }

    /// Compress `payload` and wrap it in a record header.
    pub fn encode(&self, payload: &[u8], scheme: CompressionScheme) -> Result<Vec<u8>> {
        // Reserve the header, filled in once the compressed size is known
        let mut buf = Vec::with_capacity(RECORD_HEADER_BYTES + payload.len() / 2);
        buf.extend_from_slice(&[0u8; RECORD_HEADER_BYTES]);

        let mut buf = match scheme {
            CompressionScheme::Gzip => {
                let mut encoder = GzEncoder::new(buf, self.level);
                encoder.write_all(payload)?;
                encoder.finish()?
            }
            CompressionScheme::Zlib => {
                let mut encoder = ZlibEncoder::new(buf, self.level);
                encoder.write_all(payload)?;
                encoder.finish()?
            }
        };

        // length = compressed bytes + 1 scheme byte
        let length = u32::try_from(buf.len() - 4).map_err(|_| RegionError::OversizedRecord {
            sectors: buf.len().div_ceil(crate::region::SECTOR_BYTES),
        })?;
        buf[0..4].copy_from_slice(&length.to_be_bytes());
        buf[4] = scheme.id();
        Ok(buf)
    }

    /// Unwrap a framed record and inflate its payload.
    ///
    /// Trailing bytes past `length` (sector padding) are ignored.
    pub fn decode(framed: &[u8]) -> Result<Vec<u8>> {
        if framed.len() < RECORD_HEADER_BYTES {
            return Err(RegionError::Truncated {
                expected: RECORD_HEADER_BYTES,
                found: framed.len(),
            });
        }
        let length = u32::from_be_bytes([framed[0], framed[1], framed[2], framed[3]]);
        if length == 0 {
            return Err(RegionError::InvalidLength { length, sectors: 0 });
        }
        let scheme = CompressionScheme::from_id(framed[4])?;

        let end = 4 + length as usize;
        if framed.len() < end {
            return Err(RegionError::Truncated {
                expected: end,
                found: framed.len(),
            });
        }
        decompress(scheme, &framed[RECORD_HEADER_BYTES..end])
    }
}

impl Default for RecordCodec {
    fn default() -> Self {
        Self {
            level: Compression::default(),
        }
    }
}

fn decompress(scheme: CompressionScheme, compressed: &[u8]) -> Result<Vec<u8>> {
    let mut payload = Vec::with_capacity(compressed.len() * 4);
    let result = match scheme {
        CompressionScheme::Gzip => GzDecoder::new(compressed).read_to_end(&mut payload),
        CompressionScheme::Zlib => ZlibDecoder::new(compressed).read_to_end(&mut payload),
    };
    result.map_err(RegionError::Decompress)?;
    Ok(payload)
}
