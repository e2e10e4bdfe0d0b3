//! Read-only memory-mapped streams.
//!
//! Useful when probing a directory of large archives: the file is
//! mapped rather than read, and pages are only faulted in as the
//! format probes touch them. Requires the `mmap` feature.

use std::fs;
use std::path::Path;

use memmap2::Mmap;

use crate::error::{Error, Result};
use crate::stream::{ReadStream, SeekFrom, resolve_seek};

/// A read-only stream over a memory-mapped file.
#[derive(Debug)]
pub struct MmapStream {
    map: Mmap,
    pos: u64,
}

impl MmapStream {
    /// Map `path` read-only.
    ///
    /// The mapping is only sound while no other process truncates the
    /// file underneath us, the usual caveat for file-backed maps.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = fs::File::open(path).map_err(|e| Error::io(0, e))?;
        // SAFETY: the map is read-only and dropped with the stream.
        let map = unsafe { Mmap::map(&file) }.map_err(|e| Error::io(0, e))?;
        Ok(Self { map, pos: 0 })
    }
}

impl ReadStream for MmapStream {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if self.pos >= self.map.len() as u64 {
            return Ok(0);
        }
        let start = self.pos as usize;
        let n = buf.len().min(self.map.len() - start);
        buf[..n].copy_from_slice(&self.map[start..start + n]);
        self.pos += n as u64;
        Ok(n)
    }

    fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        self.pos = resolve_seek(pos, self.pos, self.map.len() as u64)?;
        Ok(self.pos)
    }

    fn len(&self) -> u64 {
        self.map.len() as u64
    }

    fn position(&self) -> u64 {
        self.pos
    }
}
