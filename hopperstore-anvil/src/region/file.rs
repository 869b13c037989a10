//! Random-access storage behind a region.
//!
//! `std::fs::File` is used in production; `Cursor<Vec<u8>>` backs the
//! in-memory regions used by tests.

use std::fs::File;
use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};

/// Seekable byte storage with a resizable length.
pub trait SectorFile: Read + Write + Seek {
    fn byte_len(&mut self) -> io::Result<u64>;

    /// Extend (zero-filled) or truncate.
    fn set_byte_len(&mut self, len: u64) -> io::Result<()>;

    /// Force written data to durable storage.
    fn sync(&mut self) -> io::Result<()>;

    fn read_exact_at(&mut self, pos: u64, buf: &mut [u8]) -> io::Result<()> {
        self.seek(SeekFrom::Start(pos))?;
        self.read_exact(buf)
    }

    fn write_all_at(&mut self, pos: u64, buf: &[u8]) -> io::Result<()> {
        self.seek(SeekFrom::Start(pos))?;
        self.write_all(buf)
    }
}

impl SectorFile for File {
    fn byte_len(&mut self) -> io::Result<u64> {
        Ok(self.metadata()?.len())
    }

    fn set_byte_len(&mut self, len: u64) -> io::Result<()> {
        self.set_len(len)
    }

    fn sync(&mut self) -> io::Result<()> {
        self.flush()?;
        self.sync_data()
    }
}

impl SectorFile for Cursor<Vec<u8>> {
    fn byte_len(&mut self) -> io::Result<u64> {
        Ok(self.get_ref().len() as u64)
    }

    fn set_byte_len(&mut self, len: u64) -> io::Result<()> {
        let len = usize::try_from(len)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "length exceeds memory"))?;
        self.get_mut().resize(len, 0);
        Ok(())
    }

    fn sync(&mut self) -> io::Result<()> {
        Ok(())
    }
}
