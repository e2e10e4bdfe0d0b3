//! Bounded, relocatable window over a parent stream.
//!
//! A [`SubStream`] exposes positions `0..len` of itself as positions
//! `offset..offset+len` of its parent. The archive engine hands these
//! out for individual entries and keeps weak references to them so it
//! can move the window when inserts and removes shuffle payloads, or
//! invalidate it when its entry is deleted. Callers never notice
//! either happening.

use std::cell::RefCell;
use std::rc::Rc;

use crate::error::{Error, Result};
use crate::stream::{ReadStream, SeekFrom, SharedStream, Stream};

/// A window into a parent stream.
pub struct SubStream {
    parent: SharedStream,
    offset: u64,
    len: u64,
    pos: u64,
    valid: bool,
}

impl std::fmt::Debug for SubStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubStream")
            .field("parent", &"<stream>")
            .field("offset", &self.offset)
            .field("len", &self.len)
            .field("pos", &self.pos)
            .field("valid", &self.valid)
            .finish()
    }
}

impl SubStream {
    /// Create a window of `len` bytes starting at `offset` in
    /// `parent`, wrapped for sharing with the archive engine.
    pub fn new(parent: SharedStream, offset: u64, len: u64) -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(Self {
            parent,
            offset,
            len,
            pos: 0,
            valid: true,
        }))
    }

    /// Move the window by `delta` bytes in the parent. The window
    /// contents appear unchanged to the caller; only the mapping to
    /// the parent moves. There is no write cache to flush here -
    /// writes go straight through - so relocation is always safe.
    pub fn relocate(&mut self, delta: i64) {
        self.offset = self.offset.wrapping_add_signed(delta);
    }

    /// Change the reported length without touching parent bytes.
    pub fn resize(&mut self, len: u64) {
        self.len = len;
        if self.pos > len {
            self.pos = len;
        }
    }

    /// Offset of the window's first byte in the parent stream.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Mark the window dead. All subsequent I/O fails; the handle
    /// itself stays dereferenceable for identity checks.
    pub fn invalidate(&mut self) {
        self.valid = false;
    }

    fn check_valid(&self) -> Result<()> {
        if self.valid {
            Ok(())
        } else {
            Err(Error::invalid_operation(
                "file has been removed from the archive",
            ))
        }
    }
}

impl ReadStream for SubStream {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.check_valid()?;
        if self.pos >= self.len {
            return Ok(0);
        }
        let n = (buf.len() as u64).min(self.len - self.pos) as usize;
        let mut parent = self.parent.borrow_mut();
        parent.seek(SeekFrom::Start(self.offset + self.pos))?;
        parent.read_exact(&mut buf[..n])?;
        self.pos += n as u64;
        Ok(n)
    }

    fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        self.check_valid()?;
        // Clamp to the window rather than erroring, as a plain file
        // stream would when seeking past EOF.
        let target = match pos {
            SeekFrom::Start(p) => p as i128,
            SeekFrom::Current(d) => self.pos as i128 + d as i128,
            SeekFrom::End(d) => self.len as i128 + d as i128,
        };
        self.pos = target.clamp(0, self.len as i128) as u64;
        Ok(self.pos)
    }

    fn len(&self) -> u64 {
        self.len
    }

    fn position(&self) -> u64 {
        self.pos
    }
}

impl Stream for SubStream {
    fn write(&mut self, buf: &[u8]) -> Result<()> {
        self.check_valid()?;
        if self.pos + buf.len() as u64 > self.len {
            return Err(Error::invalid_argument(
                "write past the end of the archive slot",
            ));
        }
        let mut parent = self.parent.borrow_mut();
        parent.seek(SeekFrom::Start(self.offset + self.pos))?;
        parent.write(buf)?;
        self.pos += buf.len() as u64;
        Ok(())
    }

    fn truncate(&mut self, len: u64) -> Result<()> {
        self.check_valid()?;
        // The window is not ours to grow or shrink; only the archive
        // engine resizes entries.
        if len == self.len {
            Ok(())
        } else {
            Err(Error::invalid_operation(
                "a sub-stream cannot be truncated; resize the entry instead",
            ))
        }
    }

    fn flush(&mut self) -> Result<()> {
        self.check_valid()?;
        self.parent.borrow_mut().flush()
    }
}

// A shared handle doubles as a stream so the engine can keep a weak
// reference to the same object it hands to the caller.
impl ReadStream for Rc<RefCell<SubStream>> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.borrow_mut().read(buf)
    }

    fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        self.borrow_mut().seek(pos)
    }

    fn len(&self) -> u64 {
        self.borrow().len()
    }

    fn position(&self) -> u64 {
        self.borrow().position()
    }
}

impl Stream for Rc<RefCell<SubStream>> {
    fn write(&mut self, buf: &[u8]) -> Result<()> {
        self.borrow_mut().write(buf)
    }

    fn truncate(&mut self, len: u64) -> Result<()> {
        self.borrow_mut().truncate(len)
    }

    fn flush(&mut self) -> Result<()> {
        self.borrow_mut().flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::{MemStream, shared};

    fn parent_abcd() -> SharedStream {
        shared(MemStream::from_vec(b"AAAABBBBCCCCDDDD".to_vec()))
    }

    #[test]
    fn test_read_window() {
        let parent = parent_abcd();
        let sub = SubStream::new(parent, 4, 8);
        let mut sub = sub.borrow_mut();

        let mut buf = [0u8; 32];
        let n = sub.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"BBBBCCCC");
        assert_eq!(sub.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn test_write_through() {
        let parent = parent_abcd();
        let sub = SubStream::new(Rc::clone(&parent), 4, 8);
        sub.borrow_mut().write(b"hello").unwrap();

        let mut p = parent.borrow_mut();
        p.seek(SeekFrom::Start(0)).unwrap();
        assert_eq!(p.read_to_end().unwrap(), b"AAAAhelloCCDDDD");
    }

    #[test]
    fn test_write_past_window_refused() {
        let parent = parent_abcd();
        let sub = SubStream::new(parent, 4, 4);
        let mut sub = sub.borrow_mut();
        sub.seek(SeekFrom::Start(2)).unwrap();
        assert!(sub.write(b"xyz").is_err());
    }

    #[test]
    fn test_relocate() {
        let parent = parent_abcd();
        let sub = SubStream::new(parent, 4, 4);
        {
            let mut s = sub.borrow_mut();
            s.relocate(4);
            assert_eq!(s.offset(), 8);
            let mut buf = [0u8; 4];
            s.read_exact(&mut buf).unwrap();
            assert_eq!(&buf, b"CCCC");
        }
        {
            let mut s = sub.borrow_mut();
            s.relocate(-8);
            assert_eq!(s.offset(), 0);
        }
    }

    #[test]
    fn test_seek_clamps_to_window() {
        let parent = parent_abcd();
        let sub = SubStream::new(parent, 4, 4);
        let mut sub = sub.borrow_mut();
        assert_eq!(sub.seek(SeekFrom::Start(100)).unwrap(), 4);
        assert_eq!(sub.seek(SeekFrom::Current(-100)).unwrap(), 0);
    }

    #[test]
    fn test_invalidate() {
        let parent = parent_abcd();
        let sub = SubStream::new(parent, 0, 4);
        sub.borrow_mut().invalidate();
        let mut buf = [0u8; 4];
        assert!(sub.borrow_mut().read(&mut buf).is_err());
        assert!(sub.borrow_mut().write(b"x").is_err());
    }

    #[test]
    fn test_resize_reports_new_length() {
        let parent = parent_abcd();
        let sub = SubStream::new(parent, 0, 8);
        let mut sub = sub.borrow_mut();
        sub.resize(2);
        assert_eq!(sub.len(), 2);
        let mut buf = [0u8; 8];
        assert_eq!(sub.read(&mut buf).unwrap(), 2);
    }
}
