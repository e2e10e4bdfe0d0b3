//! SkyRoads variable-bit LZS.
//!
//! Three header bytes declare the bit widths of the copy count, the
//! short reference distance and the long reference distance. The body
//! is a big-endian bit stream of two-bit flag codes: `0` a short
//! reference, `10` a long reference, `11` a literal byte. Reference
//! distances start at two; a copy longer than the 4 KiB dictionary
//! means the data is corrupt.
//!
//! The compressor emits the width header followed by literal codes
//! only.

use retroarc_core::bits::{BitOrder, BitReader, BitWriter};
use retroarc_core::error::{Error, Result};
use retroarc_core::filter::Filter;

const DICT_SIZE: usize = 4096;

/// Widths the all-literal compressor declares.
const ENC_WIDTHS: [u8; 3] = [6, 8, 12];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DecState {
    ReadWidths,
    ReadFlag1,
    ReadFlag2,
    ShortRef,
    LongRef,
    CopyByte,
    GetCount,
    CopyOffset,
}

/// SkyRoads decompressor.
pub struct SkyRoadsUnlzs {
    reader: BitReader,
    state: DecState,
    width_count: u8,
    width_short: u8,
    width_long: u8,
    dict: Vec<u8>,
    dict_pos: usize,
    dist: usize,
    lzs_len: usize,
    lzs_pos: usize,
    offset: u64,
}

impl SkyRoadsUnlzs {
    /// Create a decoder.
    pub fn new() -> Self {
        Self {
            reader: BitReader::new(BitOrder::MsbFirst),
            state: DecState::ReadWidths,
            width_count: 0,
            width_short: 0,
            width_long: 0,
            dict: vec![0; DICT_SIZE],
            dict_pos: 0,
            dist: 0,
            lzs_len: 0,
            lzs_pos: 0,
            offset: 0,
        }
    }

    fn push_dict(&mut self, byte: u8) {
        self.dict[self.dict_pos] = byte;
        self.dict_pos = (self.dict_pos + 1) % DICT_SIZE;
    }

    /// Pull `bits` bits, topping up from the input as needed.
    fn need(
        reader: &mut BitReader,
        input: &[u8],
        r: &mut usize,
        offset: &mut u64,
        bits: u8,
    ) -> Option<u32> {
        while reader.available() < bits {
            if *r >= input.len() {
                return None;
            }
            reader.push_byte(input[*r]);
            *r += 1;
            *offset += 1;
        }
        reader.try_read(bits)
    }
}

impl Default for SkyRoadsUnlzs {
    fn default() -> Self {
        Self::new()
    }
}

impl Filter for SkyRoadsUnlzs {
    fn reset(&mut self, _decoded_len: Option<u64>) {
        self.reader = BitReader::new(BitOrder::MsbFirst);
        self.state = DecState::ReadWidths;
        self.width_count = 0;
        self.width_short = 0;
        self.width_long = 0;
        self.dict = vec![0; DICT_SIZE];
        self.dict_pos = 0;
        self.dist = 0;
        self.lzs_len = 0;
        self.lzs_pos = 0;
        self.offset = 0;
    }

    fn transform(&mut self, input: &[u8], output: &mut [u8], _eof: bool) -> Result<(usize, usize)> {
        let mut r = 0usize;
        let mut w = 0usize;
        while w < output.len() && (r < input.len() || self.lzs_len > 0 || self.reader.available() > 0)
        {
            match self.state {
                DecState::ReadWidths => {
                    if input.len() - r < 3 {
                        break;
                    }
                    self.width_count = input[r];
                    self.width_short = input[r + 1];
                    self.width_long = input[r + 2];
                    r += 3;
                    self.offset += 3;
                    if self.width_count == 0
                        || self.width_count > 16
                        || self.width_short > 16
                        || self.width_long > 16
                    {
                        return Err(Error::codec(
                            self.offset,
                            "implausible bit widths in LZS header",
                        ));
                    }
                    self.state = DecState::ReadFlag1;
                }
                DecState::ReadFlag1 => {
                    let Some(code) =
                        Self::need(&mut self.reader, input, &mut r, &mut self.offset, 1)
                    else {
                        return Ok((r, w));
                    };
                    self.state = if code == 0 {
                        DecState::ShortRef
                    } else {
                        DecState::ReadFlag2
                    };
                }
                DecState::ReadFlag2 => {
                    let Some(code) =
                        Self::need(&mut self.reader, input, &mut r, &mut self.offset, 1)
                    else {
                        return Ok((r, w));
                    };
                    self.state = if code == 0 {
                        DecState::LongRef
                    } else {
                        DecState::CopyByte
                    };
                }
                DecState::ShortRef => {
                    let Some(code) = Self::need(
                        &mut self.reader,
                        input,
                        &mut r,
                        &mut self.offset,
                        self.width_short,
                    ) else {
                        return Ok((r, w));
                    };
                    self.dist = 2 + code as usize;
                    self.state = DecState::GetCount;
                }
                DecState::LongRef => {
                    let Some(code) = Self::need(
                        &mut self.reader,
                        input,
                        &mut r,
                        &mut self.offset,
                        self.width_long,
                    ) else {
                        return Ok((r, w));
                    };
                    self.dist = 2 + (1usize << self.width_short) + code as usize;
                    self.state = DecState::GetCount;
                }
                DecState::CopyByte => {
                    let Some(code) =
                        Self::need(&mut self.reader, input, &mut r, &mut self.offset, 8)
                    else {
                        return Ok((r, w));
                    };
                    let b = code as u8;
                    self.push_dict(b);
                    output[w] = b;
                    w += 1;
                    self.state = DecState::ReadFlag1;
                }
                DecState::GetCount => {
                    let Some(code) = Self::need(
                        &mut self.reader,
                        input,
                        &mut r,
                        &mut self.offset,
                        self.width_count,
                    ) else {
                        return Ok((r, w));
                    };
                    self.lzs_len = 2 + code as usize;
                    if self.lzs_len > DICT_SIZE {
                        return Err(Error::codec(
                            self.offset,
                            "backreference longer than the dictionary; data is corrupt or not in this format",
                        ));
                    }
                    self.lzs_pos = (DICT_SIZE + self.dict_pos - self.dist) % DICT_SIZE;
                    self.state = DecState::CopyOffset;
                }
                DecState::CopyOffset => {
                    if self.lzs_len == 0 {
                        self.state = DecState::ReadFlag1;
                        continue;
                    }
                    let b = self.dict[self.lzs_pos];
                    self.lzs_pos = (self.lzs_pos + 1) % DICT_SIZE;
                    self.push_dict(b);
                    output[w] = b;
                    w += 1;
                    self.lzs_len -= 1;
                }
            }
        }
        Ok((r, w))
    }
}

/// SkyRoads compressor (all-literal).
pub struct SkyRoadsLzs {
    writer: BitWriter,
    wrote_header: bool,
    pending: Vec<u8>,
    pending_pos: usize,
    finished: bool,
}

impl SkyRoadsLzs {
    /// Create an encoder.
    pub fn new() -> Self {
        Self {
            writer: BitWriter::new(BitOrder::MsbFirst),
            wrote_header: false,
            pending: Vec::new(),
            pending_pos: 0,
            finished: false,
        }
    }

    fn drain(&mut self, output: &mut [u8], w: &mut usize) {
        let n = (self.pending.len() - self.pending_pos).min(output.len() - *w);
        output[*w..*w + n].copy_from_slice(&self.pending[self.pending_pos..self.pending_pos + n]);
        self.pending_pos += n;
        *w += n;
        if self.pending_pos == self.pending.len() {
            self.pending.clear();
            self.pending_pos = 0;
        }
    }
}

impl Default for SkyRoadsLzs {
    fn default() -> Self {
        Self::new()
    }
}

impl Filter for SkyRoadsLzs {
    fn reset(&mut self, _decoded_len: Option<u64>) {
        self.writer = BitWriter::new(BitOrder::MsbFirst);
        self.wrote_header = false;
        self.pending.clear();
        self.pending_pos = 0;
        self.finished = false;
    }

    fn transform(&mut self, input: &[u8], output: &mut [u8], eof: bool) -> Result<(usize, usize)> {
        let mut r = 0usize;
        let mut w = 0usize;
        loop {
            self.drain(output, &mut w);
            if w >= output.len() || self.finished {
                break;
            }
            if !self.wrote_header {
                self.pending.extend_from_slice(&ENC_WIDTHS);
                self.wrote_header = true;
                continue;
            }
            if r < input.len() {
                // Flag `11` then the literal byte.
                self.writer.push(0b11, 2);
                self.writer.push(input[r] as u32, 8);
                r += 1;
                while let Some(b) = self.writer.pop_byte() {
                    self.pending.push(b);
                }
            } else if eof {
                if let Some(b) = self.writer.flush_byte() {
                    self.pending.push(b);
                }
                self.finished = true;
            } else {
                break;
            }
        }
        Ok((r, w))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use retroarc_core::filter::run_filter;

    fn decode(data: &[u8]) -> Vec<u8> {
        run_filter(&mut SkyRoadsUnlzs::new(), data, None).unwrap()
    }

    fn encode(data: &[u8]) -> Vec<u8> {
        run_filter(&mut SkyRoadsLzs::new(), data, None).unwrap()
    }

    #[test]
    fn test_round_trip_literals() {
        let data = b"skyroads road data";
        assert_eq!(decode(&encode(data)), data);
    }

    #[test]
    fn test_round_trip_all_byte_values() {
        let data: Vec<u8> = (0..=255u8).collect();
        assert_eq!(decode(&encode(&data)), data);
    }

    #[test]
    fn test_decode_short_reference() {
        // Header widths 4/4/8. Literals 'a' 'b', then a short ref:
        // flag 0, dist code 0 (=2), count code 2 (=4).
        let mut w = BitWriter::new(BitOrder::MsbFirst);
        let mut bytes = vec![4, 4, 8];
        for &b in b"ab" {
            w.push(0b11, 2);
            w.push(b as u32, 8);
        }
        w.push(0, 1); // short ref flag
        w.push(0, 4); // distance 2
        w.push(2, 4); // count 4
        while let Some(b) = w.pop_byte() {
            bytes.push(b);
        }
        if let Some(b) = w.flush_byte() {
            bytes.push(b);
        }
        assert_eq!(decode(&bytes), b"ababab");
    }

    #[test]
    fn test_decode_rejects_oversize_count() {
        // Header with a 13-bit count width allows counts past the
        // dictionary size.
        let mut w = BitWriter::new(BitOrder::MsbFirst);
        let mut bytes = vec![13, 4, 8];
        w.push(0b11, 2);
        w.push(b'a' as u32, 8);
        w.push(0, 1); // short ref
        w.push(0, 4); // dist 2
        w.push(8000, 13); // count 8002 > 4096
        while let Some(b) = w.pop_byte() {
            bytes.push(b);
        }
        if let Some(b) = w.flush_byte() {
            bytes.push(b);
        }
        assert!(run_filter(&mut SkyRoadsUnlzs::new(), &bytes, None).is_err());
    }

    #[test]
    fn test_decoder_ignores_trailing_pad_bits() {
        let encoded = encode(b"xyz");
        // 3 header bytes + 30 bits of tokens rounded up to 4 bytes.
        assert_eq!(encoded.len(), 3 + 4);
        assert_eq!(decode(&encoded), b"xyz");
    }
}
