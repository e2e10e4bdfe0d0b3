//! God of Thunder LZSS.
//!
//! The stream opens with a u16le decoded length and two reserved
//! bytes, then flag bytes each gating eight tokens: a set bit is a
//! literal, a clear bit a two-byte backreference into a 4 KiB
//! circular dictionary (length in the top nibble plus two, distance
//! in the low twelve bits).
//!
//! The encoder only ever emits literal tokens; the game accepts both
//! spellings and the archive engine cares about sizes, not ratio.

use retroarc_core::error::{Error, Result};
use retroarc_core::filter::Filter;

const DICT_SIZE: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DecState {
    ReadLen,
    ReadFlags,
    Literal,
    GetOffset,
    CopyOffset,
}

/// God of Thunder decompressor.
pub struct GotUnlzss {
    state: DecState,
    flags: u8,
    blocks_left: u8,
    dict: Vec<u8>,
    dict_pos: usize,
    lzss_len: usize,
    lzss_pos: usize,
    len_decomp: u64,
    num_decomp: u64,
}

impl GotUnlzss {
    /// Create a decoder.
    pub fn new() -> Self {
        Self {
            state: DecState::ReadLen,
            flags: 0,
            blocks_left: 0,
            dict: vec![0; DICT_SIZE],
            dict_pos: 0,
            lzss_len: 0,
            lzss_pos: 0,
            len_decomp: 0,
            num_decomp: 0,
        }
    }

    fn push_dict(&mut self, byte: u8) {
        self.dict[self.dict_pos] = byte;
        self.dict_pos = (self.dict_pos + 1) % DICT_SIZE;
    }
}

impl Default for GotUnlzss {
    fn default() -> Self {
        Self::new()
    }
}

impl Filter for GotUnlzss {
    fn reset(&mut self, _decoded_len: Option<u64>) {
        self.state = DecState::ReadLen;
        self.flags = 0;
        self.blocks_left = 0;
        self.dict = vec![0; DICT_SIZE];
        self.dict_pos = 0;
        self.lzss_len = 0;
        self.lzss_pos = 0;
        self.len_decomp = 0;
        self.num_decomp = 0;
    }

    fn transform(&mut self, input: &[u8], output: &mut [u8], _eof: bool) -> Result<(usize, usize)> {
        let mut r = 0usize;
        let mut w = 0usize;
        while w < output.len()
            && (r < input.len() || self.lzss_len > 0)
            && (self.len_decomp == 0 || self.num_decomp < self.len_decomp)
        {
            match self.state {
                DecState::ReadLen => {
                    if input.len() - r < 4 {
                        break;
                    }
                    self.len_decomp = input[r] as u64 | (input[r + 1] as u64) << 8;
                    // Two reserved bytes follow the length.
                    r += 4;
                    self.state = DecState::ReadFlags;
                }
                DecState::ReadFlags => {
                    if self.blocks_left == 0 {
                        self.flags = input[r];
                        r += 1;
                        self.blocks_left = 8;
                    }
                    self.state = if self.flags & 1 != 0 {
                        DecState::Literal
                    } else {
                        DecState::GetOffset
                    };
                    self.flags >>= 1;
                    self.blocks_left -= 1;
                }
                DecState::Literal => {
                    let b = input[r];
                    r += 1;
                    self.push_dict(b);
                    output[w] = b;
                    w += 1;
                    self.num_decomp += 1;
                    self.state = DecState::ReadFlags;
                }
                DecState::GetOffset => {
                    if input.len() - r < 2 {
                        break;
                    }
                    let code = input[r] as usize | (input[r + 1] as usize) << 8;
                    r += 2;
                    self.lzss_len = (code >> 12) + 2;
                    self.lzss_pos = (DICT_SIZE + self.dict_pos - (code & 0x0FFF)) % DICT_SIZE;
                    self.state = DecState::CopyOffset;
                }
                DecState::CopyOffset => {
                    if self.lzss_len == 0 {
                        self.state = DecState::ReadFlags;
                        continue;
                    }
                    let b = self.dict[self.lzss_pos];
                    self.lzss_pos = (self.lzss_pos + 1) % DICT_SIZE;
                    self.push_dict(b);
                    output[w] = b;
                    w += 1;
                    self.num_decomp += 1;
                    self.lzss_len -= 1;
                }
            }
        }
        Ok((r, w))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EncState {
    Header,
    FlagByte,
    Data,
}

/// God of Thunder compressor (all-literal).
pub struct GotLzss {
    state: EncState,
    len_input: u64,
    count: u8,
}

impl GotLzss {
    /// Create an encoder.
    pub fn new() -> Self {
        Self {
            state: EncState::Header,
            len_input: 0,
            count: 0,
        }
    }
}

impl Default for GotLzss {
    fn default() -> Self {
        Self::new()
    }
}

impl Filter for GotLzss {
    fn reset(&mut self, decoded_len: Option<u64>) {
        self.state = EncState::Header;
        self.len_input = decoded_len.unwrap_or(0);
        self.count = 0;
    }

    fn transform(&mut self, input: &[u8], output: &mut [u8], _eof: bool) -> Result<(usize, usize)> {
        if self.len_input > 65535 {
            return Err(Error::invalid_argument(
                "God of Thunder compression only supports files under 64 kB",
            ));
        }
        let mut r = 0usize;
        let mut w = 0usize;
        while w < output.len() && r < input.len() {
            match self.state {
                EncState::Header => {
                    if output.len() - w < 4 {
                        break;
                    }
                    output[w] = (self.len_input & 0xFF) as u8;
                    output[w + 1] = ((self.len_input >> 8) & 0xFF) as u8;
                    output[w + 2] = 0x01;
                    output[w + 3] = 0x00;
                    w += 4;
                    self.state = EncState::FlagByte;
                }
                EncState::FlagByte => {
                    // All eight tokens in this block are literals.
                    output[w] = 0xFF;
                    w += 1;
                    self.count = 8;
                    self.state = EncState::Data;
                }
                EncState::Data => {
                    output[w] = input[r];
                    w += 1;
                    r += 1;
                    self.count -= 1;
                    if self.count == 0 {
                        self.state = EncState::FlagByte;
                    }
                }
            }
        }
        Ok((r, w))
    }
}
