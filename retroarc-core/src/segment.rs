//! Edit-friendly stream supporting mid-sequence insert and remove.
//!
//! Archive edits routinely add or delete bytes in the middle of a
//! large backing stream. Rewriting every trailing byte on each edit
//! would be slow and dangerous while other views exist on the same
//! stream, so a [`SegStream`] decouples the logical byte sequence
//! from the physical layout: edits are recorded in a recursive tree
//! of three regions and only materialised by an explicit [`commit`].
//!
//! The three regions of a node are:
//!
//! - **First**: a window into the parent stream, the authoritative
//!   source of original bytes.
//! - **Second**: an in-memory buffer of inserted content that
//!   logically follows First.
//! - **Third**: another node (possibly absent) holding everything
//!   logically after Second.
//!
//! Do not modify the parent stream directly while a `SegStream` is
//! layered on it; changes will either be missed or corrupt data.
//!
//! [`commit`]: SegStream::commit

use std::cell::RefCell;
use std::rc::Rc;

use crate::error::{Error, Result};
use crate::stream::{ReadStream, SeekFrom, SharedStream, Stream};

const MOVE_CHUNK: usize = 4096;

/// A segmented stream over a shared parent.
pub struct SegStream {
    parent: SharedStream,
    first_start: u64,
    first_end: u64,
    second: Vec<u8>,
    third: Option<Box<SegStream>>,
    pos: u64,
}

impl std::fmt::Debug for SegStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SegStream")
            .field("parent", &"<stream>")
            .field("first_start", &self.first_start)
            .field("first_end", &self.first_end)
            .field("second", &self.second)
            .field("third", &self.third)
            .field("pos", &self.pos)
            .finish()
    }
}

impl SegStream {
    /// Layer a segmented stream over `parent`, initially covering the
    /// parent's full contents.
    pub fn new(parent: SharedStream) -> Self {
        let end = parent.borrow().len();
        Self {
            parent,
            first_start: 0,
            first_end: end,
            second: Vec::new(),
            third: None,
            pos: 0,
        }
    }

    /// Wrap for sharing with sub-streams.
    pub fn new_shared(parent: SharedStream) -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(Self::new(parent)))
    }

    fn first_len(&self) -> u64 {
        self.first_end - self.first_start
    }

    fn total_len(&self) -> u64 {
        self.first_len()
            + self.second.len() as u64
            + self.third.as_ref().map_or(0, |t| t.total_len())
    }

    /// Insert `n` zero bytes at logical position `at`, shifting the
    /// rest of the data forward. Nothing is written to the parent
    /// until commit.
    pub fn insert(&mut self, at: u64, n: u64) -> Result<()> {
        if at > self.total_len() {
            return Err(Error::invalid_argument(
                "insert past the end of the segmented stream",
            ));
        }
        self.insert_inner(at, n);
        Ok(())
    }

    fn insert_inner(&mut self, at: u64, n: u64) {
        let first_len = self.first_len();
        if at < first_len {
            // Inside First: split there and let the new Second hold
            // the inserted block.
            self.split(at);
            self.second = vec![0; n as usize];
        } else if at <= first_len + self.second.len() as u64 {
            // Inside (or at either edge of) Second.
            let off = (at - first_len) as usize;
            let tail = self.second.split_off(off);
            self.second.extend(std::iter::repeat_n(0u8, n as usize));
            self.second.extend(tail);
        } else {
            let third_at = at - first_len - self.second.len() as u64;
            self.third
                .as_mut()
                .expect("position beyond Second implies Third exists")
                .insert_inner(third_at, n);
        }
    }

    /// Remove `n` bytes at logical position `at`, pulling the rest of
    /// the data back. The bytes are lost.
    pub fn remove(&mut self, at: u64, n: u64) -> Result<()> {
        if at + n > self.total_len() {
            return Err(Error::invalid_argument(
                "remove past the end of the segmented stream",
            ));
        }
        self.remove_inner(at, n);
        Ok(())
    }

    fn remove_inner(&mut self, at: u64, mut n: u64) {
        if n == 0 {
            return;
        }
        let mut first_len = self.first_len();
        if at < first_len {
            if at + n >= first_len {
                // Removal reaches the end of First: trim its tail and
                // carry the remainder into the later regions.
                n -= first_len - at;
                self.first_end = self.first_start + at;
                first_len = at;
            } else if at == 0 {
                // Contained at the front of First: cut it off.
                self.first_start += n;
                return;
            } else {
                // Contained in the interior: split and cut the front
                // off the new Third's window.
                self.split(at);
                let third = self
                    .third
                    .as_mut()
                    .expect("split always creates a third region");
                third.first_start += n;
                return;
            }
            if n == 0 {
                return;
            }
        }

        // Continue in Second.
        let off2 = at - first_len;
        let second_len = self.second.len() as u64;
        if off2 < second_len {
            let in_second = (second_len - off2).min(n);
            self.second
                .drain(off2 as usize..(off2 + in_second) as usize);
            n -= in_second;
        }
        if n == 0 {
            return;
        }

        // Anything left comes out of Third. The bounds check in
        // `remove` guarantees it exists.
        let third_at = off2.saturating_sub(second_len);
        if let Some(third) = self.third.as_mut() {
            third.remove_inner(third_at, n);
        }
    }

    /// Split this node at `at` (which must fall within First): First
    /// ends there, Second empties, and a new Third takes everything
    /// that followed.
    fn split(&mut self, at: u64) {
        debug_assert!(at < self.first_len());
        let child = SegStream {
            parent: Rc::clone(&self.parent),
            first_start: self.first_start + at,
            first_end: self.first_end,
            second: std::mem::take(&mut self.second),
            third: self.third.take(),
            pos: 0,
        };
        self.first_end = self.first_start + at;
        self.third = Some(Box::new(child));
    }

    /// Flatten the tree back into the parent stream. Afterwards the
    /// node is a single window covering the whole (possibly shorter
    /// or longer) parent, Second is empty and Third is gone. The
    /// parent is truncated to the final length.
    pub fn commit(&mut self) -> Result<()> {
        let final_len = self.total_len();
        self.commit_at(0)?;
        debug_assert_eq!(self.first_start, 0);
        debug_assert!(self.second.is_empty());
        debug_assert!(self.third.is_none());
        let mut parent = self.parent.borrow_mut();
        if parent.len() != final_len {
            parent.truncate(final_len)?;
        }
        parent.flush()
    }

    /// Write this node's data so its First region starts at `dest` in
    /// the parent. The order of operations matters: when First moves
    /// forward, Third must be flushed out of the way beforehand so no
    /// source byte is overwritten before it has been consumed; when
    /// First moves backward, Third is handled afterwards.
    fn commit_at(&mut self, dest: u64) -> Result<()> {
        let first_len = self.first_len();
        let second_len = self.second.len() as u64;
        let dest_second = dest + first_len;
        let dest_third = dest_second + second_len;

        if self.first_start > dest {
            // Data before us shrank: move First back, then descend.
            stream_move(&self.parent, self.first_start, dest, first_len)?;
            self.first_start = dest;
            self.first_end = dest + first_len;
            if let Some(third) = self.third.as_mut() {
                third.commit_at(dest_third)?;
            }
        } else if self.first_start < dest {
            // Data was inserted before us: move Third out of the way
            // first, then push First forward.
            if let Some(third) = self.third.as_mut() {
                third.commit_at(dest_third)?;
            }
            stream_move(&self.parent, self.first_start, dest, first_len)?;
            self.first_start = dest;
            self.first_end = dest + first_len;
        } else if let Some(third) = self.third.as_mut() {
            third.commit_at(dest_third)?;
        }

        if second_len > 0 {
            let mut parent = self.parent.borrow_mut();
            parent.seek(SeekFrom::Start(dest_second))?;
            parent.write(&self.second)?;
            drop(parent);
            self.second.clear();
            self.first_end += second_len;
        }

        if let Some(third) = self.third.take() {
            self.first_end += third.total_len();
        }
        Ok(())
    }

    fn read_at(&mut self, at: u64, buf: &mut [u8]) -> Result<usize> {
        let mut pos = at;
        let mut done = 0usize;
        let first_len = self.first_len();

        if pos < first_len && done < buf.len() {
            let n = ((first_len - pos).min((buf.len() - done) as u64)) as usize;
            let mut parent = self.parent.borrow_mut();
            parent.seek(SeekFrom::Start(self.first_start + pos))?;
            parent.read_exact(&mut buf[done..done + n])?;
            drop(parent);
            pos += n as u64;
            done += n;
        }

        let second_len = self.second.len() as u64;
        if done < buf.len() && pos >= first_len && pos < first_len + second_len {
            let off = (pos - first_len) as usize;
            let n = (second_len as usize - off).min(buf.len() - done);
            buf[done..done + n].copy_from_slice(&self.second[off..off + n]);
            pos += n as u64;
            done += n;
        }

        if done < buf.len() && pos >= first_len + second_len {
            if let Some(third) = self.third.as_mut() {
                done += third.read_at(pos - first_len - second_len, &mut buf[done..])?;
            }
        }
        Ok(done)
    }

    fn write_at(&mut self, at: u64, buf: &[u8]) -> Result<()> {
        let mut pos = at;
        let mut done = 0usize;
        let first_len = self.first_len();

        if pos < first_len && done < buf.len() {
            let n = ((first_len - pos).min((buf.len() - done) as u64)) as usize;
            let mut parent = self.parent.borrow_mut();
            parent.seek(SeekFrom::Start(self.first_start + pos))?;
            parent.write(&buf[done..done + n])?;
            drop(parent);
            pos += n as u64;
            done += n;
        }

        let second_len = self.second.len() as u64;
        if done < buf.len() && pos >= first_len && pos < first_len + second_len {
            let off = (pos - first_len) as usize;
            let n = (second_len as usize - off).min(buf.len() - done);
            self.second[off..off + n].copy_from_slice(&buf[done..done + n]);
            pos += n as u64;
            done += n;
        }

        if done < buf.len() {
            match self.third.as_mut() {
                Some(third) if pos >= first_len + second_len => {
                    third.write_at(pos - first_len - second_len, &buf[done..])?;
                }
                _ => {
                    return Err(Error::invalid_argument(
                        "write past the end of the segmented stream",
                    ));
                }
            }
        }
        Ok(())
    }
}

impl ReadStream for SegStream {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let n = self.read_at(self.pos, buf)?;
        self.pos += n as u64;
        Ok(n)
    }

    fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        let total = self.total_len();
        let target = match pos {
            SeekFrom::Start(p) => p as i128,
            SeekFrom::Current(d) => self.pos as i128 + d as i128,
            SeekFrom::End(d) => total as i128 + d as i128,
        };
        self.pos = target.clamp(0, total as i128) as u64;
        Ok(self.pos)
    }

    fn len(&self) -> u64 {
        self.total_len()
    }

    fn position(&self) -> u64 {
        self.pos
    }
}

impl Stream for SegStream {
    fn write(&mut self, buf: &[u8]) -> Result<()> {
        self.write_at(self.pos, buf)?;
        self.pos += buf.len() as u64;
        Ok(())
    }

    fn truncate(&mut self, len: u64) -> Result<()> {
        let total = self.total_len();
        if len > total {
            self.insert(total, len - total)
        } else {
            self.remove(len, total - len)
        }
    }

    fn flush(&mut self) -> Result<()> {
        // Edits are materialised by commit(), not flush().
        Ok(())
    }
}

/// Move `len` bytes within `stream` from `from` to `to`, handling
/// overlapping ranges by choosing the copy direction.
pub fn stream_move(stream: &SharedStream, from: u64, to: u64, len: u64) -> Result<()> {
    if from == to || len == 0 {
        return Ok(());
    }
    let mut buf = [0u8; MOVE_CHUNK];
    let mut stream = stream.borrow_mut();
    if to < from {
        // Copy forwards.
        let mut done = 0u64;
        while done < len {
            let n = ((len - done).min(MOVE_CHUNK as u64)) as usize;
            stream.seek(SeekFrom::Start(from + done))?;
            stream.read_exact(&mut buf[..n])?;
            stream.seek(SeekFrom::Start(to + done))?;
            stream.write(&buf[..n])?;
            done += n as u64;
        }
    } else {
        // Copy backwards so the overlap is read before it is clobbered.
        let mut left = len;
        while left > 0 {
            let n = left.min(MOVE_CHUNK as u64) as usize;
            left -= n as u64;
            stream.seek(SeekFrom::Start(from + left))?;
            stream.read_exact(&mut buf[..n])?;
            stream.seek(SeekFrom::Start(to + left))?;
            stream.write(&buf[..n])?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::{MemStream, shared};

    fn make(data: &[u8]) -> (SharedStream, SegStream) {
        let parent = shared(MemStream::from_vec(data.to_vec()));
        let seg = SegStream::new(Rc::clone(&parent));
        (parent, seg)
    }

    fn contents(seg: &mut SegStream) -> Vec<u8> {
        let mut buf = vec![0u8; seg.len() as usize];
        let n = seg.read_at(0, &mut buf).unwrap();
        assert_eq!(n, buf.len());
        buf
    }

    fn parent_contents(parent: &SharedStream) -> Vec<u8> {
        let mut p = parent.borrow_mut();
        p.seek(SeekFrom::Start(0)).unwrap();
        p.read_to_end().unwrap()
    }

    #[test]
    fn test_insert_in_first() {
        let (_, mut seg) = make(b"AAAABBBB");
        seg.insert(4, 4).unwrap();
        assert_eq!(seg.len(), 12);
        assert_eq!(contents(&mut seg), b"AAAA\0\0\0\0BBBB");
    }

    #[test]
    fn test_insert_then_write_then_commit() {
        let (parent, mut seg) = make(b"AAAABBBB");
        seg.insert(4, 4).unwrap();
        seg.write_at(4, b"XXXX").unwrap();
        assert_eq!(contents(&mut seg), b"AAAAXXXXBBBB");

        seg.commit().unwrap();
        assert_eq!(parent_contents(&parent), b"AAAAXXXXBBBB");
        // Tree flattened; reads still work.
        assert_eq!(contents(&mut seg), b"AAAAXXXXBBBB");
    }

    #[test]
    fn test_insert_in_second() {
        let (_, mut seg) = make(b"AAAABBBB");
        seg.insert(4, 2).unwrap();
        seg.write_at(4, b"XX").unwrap();
        // Grow the middle of the fresh Second region.
        seg.insert(5, 2).unwrap();
        assert_eq!(contents(&mut seg), b"AAAAX\0\0XBBBB");
    }

    #[test]
    fn test_insert_in_third() {
        let (_, mut seg) = make(b"AAAABBBB");
        seg.insert(2, 2).unwrap();
        // Position 8 now falls inside the Third region window (BBBB).
        seg.insert(8, 2).unwrap();
        seg.write_at(2, b"xy").unwrap();
        seg.write_at(8, b"zw").unwrap();
        assert_eq!(contents(&mut seg), b"AAxyAABBzwBB");
    }

    #[test]
    fn test_insert_at_very_end() {
        let (parent, mut seg) = make(b"AAAABBBB");
        seg.insert(8, 3).unwrap();
        seg.write_at(8, b"CCC").unwrap();
        seg.commit().unwrap();
        assert_eq!(parent_contents(&parent), b"AAAABBBBCCC");
    }

    #[test]
    fn test_remove_from_start() {
        let (parent, mut seg) = make(b"XXXXAAAABBBB");
        seg.remove(0, 4).unwrap();
        assert_eq!(contents(&mut seg), b"AAAABBBB");
        seg.commit().unwrap();
        assert_eq!(parent_contents(&parent), b"AAAABBBB");
    }

    #[test]
    fn test_remove_interior_of_first() {
        let (parent, mut seg) = make(b"AAAAXXXXBBBB");
        seg.remove(4, 4).unwrap();
        assert_eq!(contents(&mut seg), b"AAAABBBB");
        seg.commit().unwrap();
        assert_eq!(parent_contents(&parent), b"AAAABBBB");
    }

    #[test]
    fn test_remove_tail_of_first() {
        let (_, mut seg) = make(b"AAAABBBB");
        seg.remove(4, 4).unwrap();
        assert_eq!(contents(&mut seg), b"AAAA");
    }

    #[test]
    fn test_remove_across_regions() {
        let (_, mut seg) = make(b"AAAABBBB");
        seg.insert(4, 4).unwrap();
        seg.write_at(4, b"XXXX").unwrap();
        // Remove the last X plus the first two Bs: crosses Second
        // into Third.
        seg.remove(7, 3).unwrap();
        assert_eq!(contents(&mut seg), b"AAAAXXXBB");
    }

    #[test]
    fn test_remove_entire_second() {
        let (_, mut seg) = make(b"AAAABBBB");
        seg.insert(4, 4).unwrap();
        seg.remove(4, 4).unwrap();
        assert_eq!(contents(&mut seg), b"AAAABBBB");
    }

    #[test]
    fn test_remove_then_commit_truncates_parent() {
        let (parent, mut seg) = make(b"AAAABBBBCCCC");
        seg.remove(4, 4).unwrap();
        seg.commit().unwrap();
        assert_eq!(parent_contents(&parent), b"AAAACCCC");
        assert_eq!(parent.borrow().len(), 8);
    }

    #[test]
    fn test_multiple_edits_one_commit() {
        let (parent, mut seg) = make(b"1111222233334444");
        seg.remove(4, 4).unwrap(); // drop the 2s
        seg.insert(8, 4).unwrap(); // room between 3s and 4s
        seg.write_at(8, b"5555").unwrap();
        seg.insert(0, 2).unwrap();
        seg.write_at(0, b"00").unwrap();
        assert_eq!(contents(&mut seg), b"001111333355554444");
        seg.commit().unwrap();
        assert_eq!(parent_contents(&parent), b"001111333355554444");
    }

    #[test]
    fn test_commit_idempotent_after_flatten() {
        let (parent, mut seg) = make(b"ABCD");
        seg.insert(2, 2).unwrap();
        seg.write_at(2, b"xy").unwrap();
        seg.commit().unwrap();
        seg.commit().unwrap();
        assert_eq!(parent_contents(&parent), b"ABxyCD");
    }

    #[test]
    fn test_stream_trait_cursor() {
        let (_, mut seg) = make(b"AAAABBBB");
        seg.seek(SeekFrom::Start(4)).unwrap();
        let mut buf = [0u8; 2];
        seg.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"BB");
        assert_eq!(seg.position(), 6);

        // Seeks clamp to the logical length.
        assert_eq!(seg.seek(SeekFrom::Start(100)).unwrap(), 8);
    }

    #[test]
    fn test_stream_move_overlapping() {
        let parent = shared(MemStream::from_vec(b"0123456789".to_vec()));
        stream_move(&parent, 0, 2, 8).unwrap();
        assert_eq!(parent_contents(&parent), b"0101234567");

        let parent = shared(MemStream::from_vec(b"0123456789".to_vec()));
        stream_move(&parent, 2, 0, 8).unwrap();
        assert_eq!(&parent_contents(&parent)[..8], b"23456789");
    }

    #[test]
    fn test_remove_past_end_rejected() {
        let (_, mut seg) = make(b"ABCD");
        assert!(seg.remove(2, 10).is_err());
        assert!(seg.insert(10, 1).is_err());
    }
}
