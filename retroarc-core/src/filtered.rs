//! Filtered stream: a logical view over encoded storage.
//!
//! Wraps a child stream (normally an entry's sub-stream) with a
//! decode codec applied on open and an encode codec applied on
//! flush. The decoded view is materialised in memory, so the caller
//! gets free random access; the games' own decoders are streaming,
//! but their files are small.
//!
//! Because the encoder's output size is unknown until it has seen the
//! last byte, flush first encodes, then notifies the owner of the
//! final stored and real sizes through a callback - the FAT engine
//! uses this to resize the entry's slot - and only then writes the
//! encoded bytes into the (now correctly sized) child.

use crate::error::{Error, Result};
use crate::filter::{Filter, run_filter};
use crate::stream::{ReadStream, SeekFrom, Stream};

/// Invoked on flush with `(stored_size, real_size)` of the freshly
/// encoded data, before it is written to the child.
pub type SizeCallback = Box<dyn FnMut(u64, u64) -> Result<()>>;

/// A decoded, editable view over an encoded child stream.
pub struct FilteredStream {
    child: Box<dyn Stream>,
    encoder: Option<Box<dyn Filter>>,
    resize: Option<SizeCallback>,
    buf: Vec<u8>,
    pos: u64,
    dirty: bool,
}

impl FilteredStream {
    /// Decode the child's full contents through `decoder` and present
    /// the result. `real_size` is the expected decoded length when
    /// the directory records one. Writing without an `encoder` fails
    /// with `Unsupported` at flush time.
    pub fn open(
        mut child: Box<dyn Stream>,
        decoder: &mut dyn Filter,
        encoder: Option<Box<dyn Filter>>,
        real_size: Option<u64>,
        resize: Option<SizeCallback>,
    ) -> Result<Self> {
        child.seek(SeekFrom::Start(0))?;
        let raw = child.read_to_end()?;
        let mut buf = run_filter(decoder, &raw, real_size)?;
        // A slot may be larger than the encoded data it holds (fixed
        // archives leave slack); the directory's real size says where
        // the decoder should have stopped.
        if let Some(real) = real_size {
            if buf.len() as u64 > real {
                buf.truncate(real as usize);
            }
        }
        Ok(Self {
            child,
            encoder,
            resize,
            buf,
            pos: 0,
            dirty: false,
        })
    }
}

impl ReadStream for FilteredStream {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if self.pos >= self.buf.len() as u64 {
            return Ok(0);
        }
        let start = self.pos as usize;
        let n = buf.len().min(self.buf.len() - start);
        buf[..n].copy_from_slice(&self.buf[start..start + n]);
        self.pos += n as u64;
        Ok(n)
    }

    fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        let len = self.buf.len() as u64;
        let target = match pos {
            SeekFrom::Start(p) => p as i128,
            SeekFrom::Current(d) => self.pos as i128 + d as i128,
            SeekFrom::End(d) => len as i128 + d as i128,
        };
        if target < 0 {
            return Err(Error::invalid_argument("seek before start of stream"));
        }
        self.pos = target as u64;
        Ok(self.pos)
    }

    fn len(&self) -> u64 {
        self.buf.len() as u64
    }

    fn position(&self) -> u64 {
        self.pos
    }
}

impl Stream for FilteredStream {
    fn write(&mut self, data: &[u8]) -> Result<()> {
        let start = self.pos as usize;
        if start > self.buf.len() {
            self.buf.resize(start, 0);
        }
        let end = start + data.len();
        if end > self.buf.len() {
            self.buf.resize(end, 0);
        }
        self.buf[start..end].copy_from_slice(data);
        self.pos = end as u64;
        self.dirty = true;
        Ok(())
    }

    fn truncate(&mut self, len: u64) -> Result<()> {
        self.buf.resize(len as usize, 0);
        if self.pos > len {
            self.pos = len;
        }
        self.dirty = true;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        if !self.dirty {
            return self.child.flush();
        }
        let encoder = self
            .encoder
            .as_mut()
            .ok_or_else(|| Error::unsupported("this filter has no encoder"))?;
        let real_size = self.buf.len() as u64;
        let encoded = run_filter(encoder.as_mut(), &self.buf, Some(real_size))?;

        // Let the owner resize the slot before the bytes land.
        if let Some(cb) = self.resize.as_mut() {
            cb(encoded.len() as u64, real_size)?;
        }

        self.child.seek(SeekFrom::Start(0))?;
        self.child.write(&encoded)?;
        self.child.flush()?;
        self.dirty = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::MemStream;

    /// XOR with 0x55; self-inverse, size-preserving.
    struct Mask;

    impl Filter for Mask {
        fn reset(&mut self, _decoded_len: Option<u64>) {}

        fn transform(
            &mut self,
            input: &[u8],
            output: &mut [u8],
            _eof: bool,
        ) -> Result<(usize, usize)> {
            let n = input.len().min(output.len());
            for i in 0..n {
                output[i] = input[i] ^ 0x55;
            }
            Ok((n, n))
        }
    }

    /// Doubles every byte on encode, halves on decode; changes size so
    /// the resize callback fires with different stored/real values.
    struct Doubler {
        encode: bool,
    }

    impl Filter for Doubler {
        fn reset(&mut self, _decoded_len: Option<u64>) {}

        fn transform(
            &mut self,
            input: &[u8],
            output: &mut [u8],
            _eof: bool,
        ) -> Result<(usize, usize)> {
            if self.encode {
                let n = input.len().min(output.len() / 2);
                for i in 0..n {
                    output[i * 2] = input[i];
                    output[i * 2 + 1] = input[i];
                }
                Ok((n, n * 2))
            } else {
                let n = (input.len() / 2).min(output.len());
                for i in 0..n {
                    output[i] = input[i * 2];
                }
                Ok((n * 2, n))
            }
        }
    }

    #[test]
    fn test_decode_on_open() {
        let stored: Vec<u8> = b"hello".iter().map(|b| b ^ 0x55).collect();
        let child = Box::new(MemStream::from_vec(stored));
        let mut fs = FilteredStream::open(child, &mut Mask, Some(Box::new(Mask)), None, None)
            .unwrap();
        assert_eq!(fs.read_to_end().unwrap(), b"hello");
    }

    #[test]
    fn test_write_encodes_on_flush() {
        let child = Box::new(MemStream::from_vec(Vec::new()));
        let mut fs =
            FilteredStream::open(child, &mut Mask, Some(Box::new(Mask)), None, None).unwrap();
        fs.write(b"abc").unwrap();
        fs.flush().unwrap();

        fs.child.seek(SeekFrom::Start(0)).unwrap();
        let raw = fs.child.read_to_end().unwrap();
        let expect: Vec<u8> = b"abc".iter().map(|b| b ^ 0x55).collect();
        assert_eq!(raw, expect);
    }

    #[test]
    fn test_resize_callback_reports_both_sizes() {
        use std::cell::RefCell;
        use std::rc::Rc;

        let seen = Rc::new(RefCell::new((0u64, 0u64)));
        let seen2 = Rc::clone(&seen);
        let child = Box::new(MemStream::from_vec(Vec::new()));
        let mut fs = FilteredStream::open(
            child,
            &mut Doubler { encode: false },
            Some(Box::new(Doubler { encode: true })),
            None,
            Some(Box::new(move |stored, real| {
                *seen2.borrow_mut() = (stored, real);
                Ok(())
            })),
        )
        .unwrap();

        fs.write(b"xyz").unwrap();
        fs.flush().unwrap();
        assert_eq!(*seen.borrow(), (6, 3));
    }

    #[test]
    fn test_clean_flush_skips_encoder() {
        let child = Box::new(MemStream::from_vec(vec![0x55; 4]));
        let mut fs = FilteredStream::open(child, &mut Mask, None, None, None).unwrap();
        // No writes; flushing a read-only view must not require an
        // encoder.
        fs.flush().unwrap();
        assert!(fs.write(b"z").is_ok());
        assert!(fs.flush().is_err());
    }
}
