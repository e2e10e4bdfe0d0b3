//! The filter codec contract.
//!
//! A filter is a stateful, chunk-at-a-time byte-stream transform: an
//! RLE expander, an LZW compressor, a stream cipher. Decoder and
//! encoder sides implement the same [`Filter`] trait; which direction
//! an instance runs is fixed by its constructor.
//!
//! A call may consume zero bytes (the codec needs a larger input
//! window) or produce zero bytes (it needs more input before it can
//! emit), but forward progress must be made whenever more input
//! arrives and output space is available.

use crate::error::{Error, Result};

/// A streaming byte transform.
pub trait Filter {
    /// Prepare to process a new stream. `decoded_len` is the length
    /// of the un-filtered data when the caller knows it; codecs that
    /// emit a length header need it on the encode side.
    fn reset(&mut self, decoded_len: Option<u64>);

    /// Consume from `input`, produce into `output`, and return
    /// `(consumed, produced)`. `eof` tells the codec no more input
    /// will ever arrive, so trailing state (pending runs, EOF
    /// codewords, padding bits) must be emitted.
    fn transform(&mut self, input: &[u8], output: &mut [u8], eof: bool) -> Result<(usize, usize)>;
}

/// Reset `filter` and run `input` through it to completion.
pub fn run_filter(
    filter: &mut dyn Filter,
    input: &[u8],
    decoded_len: Option<u64>,
) -> Result<Vec<u8>> {
    filter.reset(decoded_len);
    let mut out = Vec::new();
    let mut buf = [0u8; 4096];
    let mut pos = 0usize;
    loop {
        let eof = pos >= input.len();
        let (consumed, produced) = filter.transform(&input[pos..], &mut buf, eof)?;
        pos += consumed;
        out.extend_from_slice(&buf[..produced]);
        if consumed == 0 && produced == 0 {
            // Done, or a decoder stopping short of trailing padding
            // after its last codeword.
            break;
        }
    }
    Ok(out)
}

/// Two or more filters applied in sequence, presented as one.
///
/// Needed by formats that stack transforms (Monster Bash stores
/// RLE-within-LZW). Input is buffered until end of stream, then run
/// through each stage in order.
pub struct FilterChain {
    stages: Vec<Box<dyn Filter>>,
    buf: Vec<u8>,
    out: Vec<u8>,
    out_pos: usize,
    done: bool,
}

impl FilterChain {
    /// Build a chain; stage 0 sees the raw input, the last stage
    /// produces the final output.
    pub fn new(stages: Vec<Box<dyn Filter>>) -> Self {
        Self {
            stages,
            buf: Vec::new(),
            out: Vec::new(),
            out_pos: 0,
            done: false,
        }
    }
}

impl Filter for FilterChain {
    fn reset(&mut self, _decoded_len: Option<u64>) {
        self.buf.clear();
        self.out.clear();
        self.out_pos = 0;
        self.done = false;
    }

    fn transform(&mut self, input: &[u8], output: &mut [u8], eof: bool) -> Result<(usize, usize)> {
        let mut consumed = 0;
        if !self.done {
            self.buf.extend_from_slice(input);
            consumed = input.len();
            if eof {
                let mut data = std::mem::take(&mut self.buf);
                for stage in &mut self.stages {
                    let len = data.len() as u64;
                    data = run_filter(stage.as_mut(), &data, Some(len))?;
                }
                self.out = data;
                self.done = true;
            }
        }
        let n = (self.out.len() - self.out_pos).min(output.len());
        output[..n].copy_from_slice(&self.out[self.out_pos..self.out_pos + n]);
        self.out_pos += n;
        Ok((consumed, n))
    }
}

/// A filter that rejects all data, standing in for an encoder the
/// project has never implemented (e.g. Stargunner compression).
pub struct UnsupportedFilter {
    what: &'static str,
}

impl UnsupportedFilter {
    /// `what` names the missing direction for the error message.
    pub fn new(what: &'static str) -> Self {
        Self { what }
    }
}

impl Filter for UnsupportedFilter {
    fn reset(&mut self, _decoded_len: Option<u64>) {}

    fn transform(
        &mut self,
        _input: &[u8],
        _output: &mut [u8],
        _eof: bool,
    ) -> Result<(usize, usize)> {
        Err(Error::unsupported(self.what))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Adds one to every byte; trivially invertible for chain tests.
    struct AddOne(i16);

    impl Filter for AddOne {
        fn reset(&mut self, _decoded_len: Option<u64>) {}

        fn transform(
            &mut self,
            input: &[u8],
            output: &mut [u8],
            _eof: bool,
        ) -> Result<(usize, usize)> {
            let n = input.len().min(output.len());
            for i in 0..n {
                output[i] = input[i].wrapping_add_signed(self.0 as i8);
            }
            Ok((n, n))
        }
    }

    #[test]
    fn test_run_filter() {
        let mut f = AddOne(1);
        let out = run_filter(&mut f, b"abc", None).unwrap();
        assert_eq!(out, b"bcd");
    }

    #[test]
    fn test_chain_applies_in_order() {
        let mut chain = FilterChain::new(vec![Box::new(AddOne(1)), Box::new(AddOne(1))]);
        let out = run_filter(&mut chain, b"abc", None).unwrap();
        assert_eq!(out, b"cde");
    }

    #[test]
    fn test_chain_streams_output() {
        let mut chain = FilterChain::new(vec![Box::new(AddOne(1))]);
        chain.reset(None);
        let mut small = [0u8; 2];
        let (c, p) = chain.transform(b"abcd", &mut small, true).unwrap();
        assert_eq!((c, p), (4, 2));
        assert_eq!(&small, b"bc");
        let (c, p) = chain.transform(&[], &mut small, true).unwrap();
        assert_eq!((c, p), (0, 2));
        assert_eq!(&small, b"de");
    }

    #[test]
    fn test_unsupported() {
        let mut f = UnsupportedFilter::new("compression is not implemented");
        assert!(run_filter(&mut f, b"x", None).is_err());
    }
}
