//! Zone 66 compression.
//!
//! A one-pass LZW variant: the stream opens with a u32le decoded
//! length, then alternates codewords (9 to 12 bits, big-endian
//! packing) with 8-bit "next byte" values. The dictionary is rebuilt
//! from `(code, next byte)` pairs as the stream is read; when the
//! width counter overflows past 12 bits it drops back to 9 with the
//! table index rewound to 64 rather than cleared.

use retroarc_core::bits::{BitOrder, BitReader, BitWriter};
use retroarc_core::error::{Error, Result};
use retroarc_core::filter::Filter;

const MAX_NODES: usize = 8192;
const MAX_STACK: usize = 65534;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DecState {
    ReadLen,
    ReadCode,
    Expand,
    ReadByte,
}

/// Zone 66 decompressor.
pub struct Z66Decoder {
    reader: BitReader,
    state: DecState,
    nodes: Vec<(u32, u8)>,
    stack: Vec<u8>,
    code: u32,
    cur_code: u32,
    code_len: u8,
    cur_dic: u32,
    max_dic: u32,
    output_limit: u64,
    total_written: u64,
}

impl Z66Decoder {
    /// Create a decoder.
    pub fn new() -> Self {
        Self {
            reader: BitReader::new(BitOrder::LsbFirst),
            state: DecState::ReadLen,
            nodes: vec![(0, 0); MAX_NODES],
            stack: Vec::new(),
            code: 0,
            cur_code: 0,
            code_len: 9,
            cur_dic: 0,
            max_dic: 255,
            output_limit: 0,
            total_written: 0,
        }
    }

    fn bump_dictionary(&mut self) {
        self.cur_dic += 1;
        if self.cur_dic >= self.max_dic {
            self.code_len += 1;
            if self.code_len == 13 {
                self.code_len = 9;
                self.cur_dic = 64;
                self.max_dic = 255;
            } else {
                self.max_dic = (1 << self.code_len) - 257;
            }
        }
    }
}

impl Default for Z66Decoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Filter for Z66Decoder {
    fn reset(&mut self, _decoded_len: Option<u64>) {
        self.reader = BitReader::new(BitOrder::LsbFirst);
        self.state = DecState::ReadLen;
        self.nodes = vec![(0, 0); MAX_NODES];
        self.stack.clear();
        self.code = 0;
        self.cur_code = 0;
        self.code_len = 9;
        self.cur_dic = 0;
        self.max_dic = 255;
        self.output_limit = 0;
        self.total_written = 0;
    }

    fn transform(&mut self, input: &[u8], output: &mut [u8], _eof: bool) -> Result<(usize, usize)> {
        let mut r = 0usize;
        let mut w = 0usize;
        'outer: while w < output.len() {
            if self.state != DecState::ReadLen && self.total_written >= self.output_limit {
                break;
            }
            match self.state {
                DecState::ReadLen => {
                    while self.reader.available() < 32 {
                        if r >= input.len() {
                            break 'outer;
                        }
                        self.reader.push_byte(input[r]);
                        r += 1;
                    }
                    let limit = self
                        .reader
                        .try_read(32)
                        .expect("32 bits buffered above");
                    self.output_limit = limit as u64;
                    self.reader.set_order(BitOrder::MsbFirst);
                    self.state = DecState::ReadCode;
                }
                DecState::ReadCode => {
                    while self.reader.available() < self.code_len {
                        if r >= input.len() {
                            break 'outer;
                        }
                        self.reader.push_byte(input[r]);
                        r += 1;
                    }
                    self.code = self
                        .reader
                        .try_read(self.code_len)
                        .expect("code bits buffered above");
                    self.cur_code = self.code;
                    self.state = DecState::Expand;
                }
                DecState::Expand => {
                    if self.cur_code < 256 {
                        output[w] = self.cur_code as u8;
                        w += 1;
                        self.total_written += 1;
                        match self.stack.pop() {
                            Some(next) => self.cur_code = next as u32,
                            None => self.state = DecState::ReadByte,
                        }
                    } else {
                        let idx = (self.cur_code - 256) as usize;
                        if idx >= MAX_NODES {
                            return Err(Error::codec(r as u64, "codeword out of range"));
                        }
                        let (code, next) = self.nodes[idx];
                        self.stack.push(next);
                        self.cur_code = code;
                        if self.stack.len() > MAX_STACK {
                            return Err(Error::codec(
                                r as u64,
                                "corrupt data - token stack exceeds 64k",
                            ));
                        }
                    }
                }
                DecState::ReadByte => {
                    while self.reader.available() < 8 {
                        if r >= input.len() {
                            break 'outer;
                        }
                        self.reader.push_byte(input[r]);
                        r += 1;
                    }
                    let value = self
                        .reader
                        .try_read(8)
                        .expect("byte buffered above") as u8;
                    output[w] = value;
                    w += 1;
                    self.total_written += 1;

                    let mut code = self.code;
                    if code >= 0x100 + self.cur_dic {
                        // Codeword not in the dictionary yet; the
                        // game's own data does this (tpal.z66).
                        code = 0x100;
                    }
                    self.nodes[self.cur_dic as usize] = (code, value);
                    self.bump_dictionary();
                    self.state = DecState::ReadCode;
                }
            }
        }
        Ok((r, w))
    }
}

/// Zone 66 compressor.
///
/// One-pass like the original: every input byte pair becomes a
/// codeword-plus-byte token, with the dictionary counters advanced in
/// lockstep with the decoder so the widths line up.
pub struct Z66Encoder {
    writer: BitWriter,
    state: u8,
    code_len: u8,
    cur_dic: u32,
    max_dic: u32,
    output_limit: u64,
    pending: Vec<u8>,
    pending_pos: usize,
    finished: bool,
}

impl Z66Encoder {
    /// Create an encoder.
    pub fn new() -> Self {
        Self {
            writer: BitWriter::new(BitOrder::LsbFirst),
            state: 0,
            code_len: 9,
            cur_dic: 0,
            max_dic: 255,
            output_limit: 0,
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

    fn pop_bytes(&mut self) {
        while let Some(b) = self.writer.pop_byte() {
            self.pending.push(b);
        }
    }
}

impl Default for Z66Encoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Filter for Z66Encoder {
    fn reset(&mut self, decoded_len: Option<u64>) {
        self.writer = BitWriter::new(BitOrder::LsbFirst);
        self.state = 0;
        self.code_len = 9;
        self.cur_dic = 0;
        self.max_dic = 255;
        self.output_limit = decoded_len.unwrap_or(0);
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
            if self.state == 0 {
                // Decoded length header, little-endian bit order.
                self.writer.push(self.output_limit as u32, 32);
                self.pop_bytes();
                self.writer.set_order(BitOrder::MsbFirst);
                self.state = 1;
                continue;
            }
            if r >= input.len() {
                if eof {
                    if let Some(b) = self.writer.flush_byte() {
                        self.pending.push(b);
                    }
                    self.finished = true;
                    continue;
                }
                break;
            }
            if self.state == 1 {
                // Literal codeword.
                self.writer.push(input[r] as u32, self.code_len);
                r += 1;
                self.pop_bytes();
                self.state = 2;
            } else {
                // Dictionary byte; advances the width counters.
                self.writer.push(input[r] as u32, 8);
                r += 1;
                self.pop_bytes();
                self.cur_dic += 1;
                if self.cur_dic >= self.max_dic {
                    self.code_len += 1;
                    if self.code_len == 13 {
                        self.code_len = 9;
                        self.cur_dic = 64;
                        self.max_dic = 255;
                    } else {
                        self.max_dic = (1 << self.code_len) - 257;
                    }
                }
                self.state = 1;
            }
        }
        Ok((r, w))
    }
}
