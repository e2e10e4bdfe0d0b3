//! Parameterised dictionary LZW.
//!
//! One decoder/encoder pair covers every LZW-packing game in the
//! catalogue; each format just turns different dials: codeword
//! widths, where the first free codeword sits, which codewords are
//! reserved for end-of-stream and dictionary reset, how bits are
//! packed into bytes, and what happens to the bit width after a
//! reset.
//!
//! Reserved codewords may be pinned to a fixed value or float at the
//! top of the current code space ("the maximum codeword", "one below
//! the maximum"), which some formats use so the sentinel grows with
//! the bit width.

use retroarc_core::bits::{BitOrder, BitReader, BitWriter};
use retroarc_core::error::{Error, Result};
use retroarc_core::filter::Filter;

use std::collections::HashMap;

/// Placement of a reserved codeword.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeSlot {
    /// No codeword reserved for this role.
    None,
    /// A fixed codeword value.
    Fixed(u16),
    /// `k` below the maximum codeword of the current bit width.
    MaxMinus(u16),
}

impl CodeSlot {
    fn value(self, cur_bits: u8) -> Option<u16> {
        let max = (1u32 << cur_bits) - 1;
        match self {
            CodeSlot::None => None,
            CodeSlot::Fixed(c) => Some(c),
            CodeSlot::MaxMinus(k) => Some((max - k as u32) as u16),
        }
    }

    fn reserves_top(self) -> bool {
        matches!(self, CodeSlot::MaxMinus(_))
    }
}

/// LZW dial settings for one game format.
#[derive(Debug, Clone, Copy)]
pub struct LzwConfig {
    /// Initial codeword width in bits.
    pub init_bits: u8,
    /// Maximum codeword width in bits.
    pub max_bits: u8,
    /// First codeword available for dictionary entries.
    pub first_code: u16,
    /// End-of-stream codeword, if the format has one.
    pub eof_code: CodeSlot,
    /// Dictionary-reset codeword, if the format has one.
    pub reset_code: CodeSlot,
    /// How codeword bits are packed into bytes.
    pub order: BitOrder,
    /// Keep the current bit width across a dictionary reset instead
    /// of dropping back to `init_bits`.
    pub keep_bitsize_on_reset: bool,
    /// Skip to the next byte boundary after a reset codeword.
    pub flush_on_reset: bool,
}

/// Monster Bash: codeword 256 doubles as EOF and reset.
pub const LZW_BASH: LzwConfig = LzwConfig {
    init_bits: 9,
    max_bits: 12,
    first_code: 257,
    eof_code: CodeSlot::Fixed(256),
    reset_code: CodeSlot::Fixed(256),
    order: BitOrder::LsbFirst,
    keep_bitsize_on_reset: false,
    flush_on_reset: false,
};

/// East Point Software EPFS: floating EOF/reset at the top of the
/// code space, big-endian packing, width survives resets.
pub const LZW_EPFS: LzwConfig = LzwConfig {
    init_bits: 9,
    max_bits: 14,
    first_code: 256,
    eof_code: CodeSlot::MaxMinus(0),
    reset_code: CodeSlot::MaxMinus(1),
    order: BitOrder::MsbFirst,
    keep_bitsize_on_reset: true,
    flush_on_reset: false,
};

/// Stellar 7: reset codeword only, byte-aligned after each reset.
pub const LZW_STELLAR7: LzwConfig = LzwConfig {
    init_bits: 9,
    max_bits: 12,
    first_code: 257,
    eof_code: CodeSlot::None,
    reset_code: CodeSlot::Fixed(256),
    order: BitOrder::LsbFirst,
    keep_bitsize_on_reset: false,
    flush_on_reset: true,
};

impl LzwConfig {
    fn reserved_top(&self) -> u16 {
        self.eof_code.reserves_top() as u16 + self.reset_code.reserves_top() as u16
    }

    /// Highest codeword the dictionary may allocate at width `bits`.
    fn cap(&self, bits: u8) -> u16 {
        ((1u32 << bits) - 1) as u16 - self.reserved_top()
    }
}

/// Streaming LZW decoder.
pub struct LzwDecoder {
    config: LzwConfig,
    reader: BitReader,
    // (prefix code, appended byte) per dictionary entry, indexed from
    // first_code.
    dict: Vec<(u16, u8)>,
    prev: Option<u16>,
    cur_bits: u8,
    done: bool,
    pending: Vec<u8>,
    pending_pos: usize,
    offset: u64,
}

impl LzwDecoder {
    /// Create a decoder for the given dials.
    pub fn new(config: LzwConfig) -> Self {
        Self {
            config,
            reader: BitReader::new(config.order),
            dict: Vec::new(),
            prev: None,
            cur_bits: config.init_bits,
            done: false,
            pending: Vec::new(),
            pending_pos: 0,
            offset: 0,
        }
    }

    fn next_code(&self) -> u32 {
        self.config.first_code as u32 + self.dict.len() as u32
    }

    /// Append the expansion of `code` to `pending`.
    fn expand(&mut self, code: u16) -> Result<u8> {
        let start = self.pending.len();
        let mut cur = code;
        loop {
            if (cur as usize) < 256 {
                self.pending.push(cur as u8);
                break;
            }
            let idx = cur
                .checked_sub(self.config.first_code)
                .map(usize::from)
                .filter(|&i| i < self.dict.len())
                .ok_or_else(|| {
                    Error::codec(self.offset, format!("codeword {} used before definition", cur))
                })?;
            let (prefix, byte) = self.dict[idx];
            self.pending.push(byte);
            cur = prefix;
        }
        self.pending[start..].reverse();
        Ok(self.pending[start])
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

impl Filter for LzwDecoder {
    fn reset(&mut self, _decoded_len: Option<u64>) {
        self.reader = BitReader::new(self.config.order);
        self.dict.clear();
        self.prev = None;
        self.cur_bits = self.config.init_bits;
        self.done = false;
        self.pending.clear();
        self.pending_pos = 0;
        self.offset = 0;
    }

    fn transform(&mut self, input: &[u8], output: &mut [u8], _eof: bool) -> Result<(usize, usize)> {
        let mut r = 0usize;
        let mut w = 0usize;
        loop {
            self.drain(output, &mut w);
            if w >= output.len() || self.done {
                break;
            }

            // The encoder is one allocation ahead of us; widen when
            // the code it is about to emit no longer fits.
            while self.cur_bits < self.config.max_bits
                && self.next_code() + 2 > self.config.cap(self.cur_bits) as u32
            {
                self.cur_bits += 1;
            }

            // Top the bit buffer up from the input.
            while self.reader.available() < self.cur_bits && r < input.len() {
                self.reader.push_byte(input[r]);
                r += 1;
                self.offset += 1;
            }
            let Some(code) = self.reader.try_read(self.cur_bits) else {
                break; // starved; stream ends mid-codeword
            };
            let code = code as u16;

            if self.config.eof_code.value(self.cur_bits) == Some(code) {
                self.done = true;
                continue;
            }
            if self.config.reset_code.value(self.cur_bits) == Some(code) {
                self.dict.clear();
                self.prev = None;
                if !self.config.keep_bitsize_on_reset {
                    self.cur_bits = self.config.init_bits;
                }
                if self.config.flush_on_reset {
                    self.reader.align_to_byte();
                }
                continue;
            }

            let first_byte = if (code as u32) < self.next_code() {
                self.expand(code)?
            } else if code as u32 == self.next_code() && self.prev.is_some() {
                // The codeword being defined right now: its expansion
                // is prev + first byte of prev.
                let prev = self.prev.expect("guarded above");
                let first = self.expand(prev)?;
                self.pending.push(first);
                first
            } else {
                return Err(Error::codec(
                    self.offset,
                    format!("codeword {} used before definition", code),
                ));
            };

            if let Some(prev) = self.prev {
                if self.next_code() <= self.config.cap(self.config.max_bits) as u32 {
                    self.dict.push((prev, first_byte));
                }
            }
            self.prev = Some(code);
        }
        Ok((r, w))
    }
}

/// Streaming LZW encoder.
pub struct LzwEncoder {
    config: LzwConfig,
    writer: BitWriter,
    dict: HashMap<(u16, u8), u16>,
    prefix: Option<u16>,
    cur_bits: u8,
    finished: bool,
    pending: Vec<u8>,
    pending_pos: usize,
}

impl LzwEncoder {
    /// Create an encoder for the given dials.
    pub fn new(config: LzwConfig) -> Self {
        Self {
            config,
            writer: BitWriter::new(config.order),
            dict: HashMap::new(),
            prefix: None,
            cur_bits: config.init_bits,
            finished: false,
            pending: Vec::new(),
            pending_pos: 0,
        }
    }

    fn next_code(&self) -> u32 {
        self.config.first_code as u32 + self.dict.len() as u32
    }

    fn emit(&mut self, code: u16) {
        self.writer.push(code as u32, self.cur_bits);
        while let Some(byte) = self.writer.pop_byte() {
            self.pending.push(byte);
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

impl Filter for LzwEncoder {
    fn reset(&mut self, _decoded_len: Option<u64>) {
        self.writer = BitWriter::new(self.config.order);
        self.dict.clear();
        self.prefix = None;
        self.cur_bits = self.config.init_bits;
        self.finished = false;
        self.pending.clear();
        self.pending_pos = 0;
    }

    fn transform(&mut self, input: &[u8], output: &mut [u8], eof: bool) -> Result<(usize, usize)> {
        let mut r = 0usize;
        let mut w = 0usize;
        loop {
            self.drain(output, &mut w);
            if w >= output.len() || self.finished {
                break;
            }
            if r < input.len() {
                let byte = input[r];
                r += 1;
                match self.prefix {
                    None => self.prefix = Some(byte as u16),
                    Some(prefix) => {
                        if let Some(&code) = self.dict.get(&(prefix, byte)) {
                            self.prefix = Some(code);
                        } else {
                            self.emit(prefix);
                            if self.next_code() <= self.config.cap(self.config.max_bits) as u32 {
                                let code = self.next_code() as u16;
                                self.dict.insert((prefix, byte), code);
                            }
                            // Widen once the next code to emit would
                            // not fit the current width.
                            while self.cur_bits < self.config.max_bits
                                && self.next_code() + 1 > self.config.cap(self.cur_bits) as u32
                            {
                                self.cur_bits += 1;
                            }
                            self.prefix = Some(byte as u16);
                        }
                    }
                }
            } else if eof {
                if let Some(prefix) = self.prefix.take() {
                    self.emit(prefix);
                }
                // The decoder widens assuming every code is followed
                // by an allocation; match it for the trailing EOF
                // codeword even though nothing gets allocated here.
                while self.cur_bits < self.config.max_bits
                    && self.next_code() + 2 > self.config.cap(self.cur_bits) as u32
                {
                    self.cur_bits += 1;
                }
                if let Some(code) = self.config.eof_code.value(self.cur_bits) {
                    self.emit(code);
                }
                if let Some(byte) = self.writer.flush_byte() {
                    self.pending.push(byte);
                }
                self.finished = true;
            } else {
                break;
            }
        }
        Ok((r, w))
    }
}
