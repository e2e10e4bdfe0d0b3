//! Monster Bash RLE.
//!
//! A single sentinel byte (0x90) marks a run: the decoder reads
//! `value, 0x90, count` and repeats `value` until `count` is
//! satisfied (the byte written before the sentinel counts as the
//! first repeat). A count of zero encodes a literal 0x90.

use retroarc_core::error::{Error, Result};
use retroarc_core::filter::Filter;

const SENTINEL: u8 = 0x90;

/// Expands Monster Bash RLE.
#[derive(Debug, Default)]
pub struct BashUnrle {
    prev: u8,
    count: u64,
}

impl BashUnrle {
    /// Create a decoder.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Filter for BashUnrle {
    fn reset(&mut self, _decoded_len: Option<u64>) {
        self.prev = 0;
        self.count = 0;
    }

    fn transform(&mut self, input: &[u8], output: &mut [u8], eof: bool) -> Result<(usize, usize)> {
        let mut r = 0usize;
        let mut w = 0usize;
        while w < output.len() && (r < input.len() || self.count > 0) {
            if self.count > 0 {
                output[w] = self.prev;
                w += 1;
                self.count -= 1;
                continue;
            }
            if input[r] == SENTINEL {
                if r + 2 > input.len() {
                    if eof {
                        return Err(Error::codec(
                            r as u64,
                            "data ended on an RLE code byte before giving a count",
                        ));
                    }
                    break;
                }
                let count = input[r + 1];
                r += 2;
                if count == 0 {
                    // Count of zero means a single literal sentinel.
                    self.prev = SENTINEL;
                    output[w] = SENTINEL;
                    w += 1;
                } else {
                    // The byte written before the sentinel is included
                    // in the count.
                    self.count = count as u64 - 1;
                }
            } else {
                self.prev = input[r];
                output[w] = input[r];
                r += 1;
                w += 1;
            }
        }
        Ok((r, w))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EncState {
    Normal,
    Event,
    WroteSentinel,
    Escape,
    RepeatPrev,
}

/// Produces Monster Bash RLE.
///
/// The state machine only emits an RLE event once a run exceeds two
/// repeats, so a run of exactly three stores one byte longer than it
/// strictly needs to. The game's own packer does the same; keep it
/// that way for byte-identical round trips against real archives.
#[derive(Debug)]
pub struct BashRle {
    prev: Option<u8>,
    count: u64,
    state: EncState,
    escape_return: EncState,
}

impl BashRle {
    /// Create an encoder.
    pub fn new() -> Self {
        Self {
            prev: None,
            count: 0,
            state: EncState::Normal,
            escape_return: EncState::Normal,
        }
    }
}

impl Default for BashRle {
    fn default() -> Self {
        Self::new()
    }
}

impl Filter for BashRle {
    fn reset(&mut self, _decoded_len: Option<u64>) {
        self.prev = None;
        self.count = 0;
        self.state = EncState::Normal;
        self.escape_return = EncState::Normal;
    }

    fn transform(&mut self, input: &[u8], output: &mut [u8], _eof: bool) -> Result<(usize, usize)> {
        let mut r = 0usize;
        let mut w = 0usize;
        while w < output.len()
            && (r < input.len() || self.count > 0 || self.state != EncState::Normal)
        {
            match self.state {
                EncState::Normal => {
                    if r >= input.len() {
                        if self.count > 0 {
                            // Input ended with a run still queued.
                            self.state = EncState::Event;
                            continue;
                        }
                        break;
                    }
                    let b = input[r];
                    if Some(b) == self.prev {
                        r += 1;
                        self.count += 1;
                    } else if self.count > 0 {
                        self.state = EncState::Event;
                    } else {
                        self.prev = Some(b);
                        output[w] = b;
                        w += 1;
                        r += 1;
                        if b == SENTINEL {
                            self.escape_return = EncState::Normal;
                            self.state = EncState::Escape;
                        }
                    }
                }
                EncState::Event => {
                    if self.count > 2 {
                        output[w] = SENTINEL;
                        w += 1;
                        self.state = EncState::WroteSentinel;
                    } else {
                        // Not enough repeats to be worth an event.
                        self.state = EncState::RepeatPrev;
                    }
                }
                EncState::WroteSentinel => {
                    if self.count > 254 {
                        output[w] = 255;
                        // One output char counts as input in the next
                        // event, hence 254 rather than 255.
                        self.count -= 254;
                        self.state = EncState::Event;
                    } else {
                        // Count includes the byte already written.
                        output[w] = self.count as u8 + 1;
                        self.count = 0;
                        self.state = EncState::Normal;
                    }
                    w += 1;
                }
                EncState::Escape => {
                    // Zero repeats escapes a literal sentinel.
                    output[w] = 0x00;
                    w += 1;
                    self.state = self.escape_return;
                }
                EncState::RepeatPrev => {
                    let prev = self.prev.unwrap_or(0);
                    output[w] = prev;
                    w += 1;
                    self.count -= 1;
                    if self.count == 0 {
                        self.state = EncState::Normal;
                    }
                    if prev == SENTINEL {
                        self.escape_return = self.state;
                        self.state = EncState::Escape;
                    }
                }
            }
        }
        Ok((r, w))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use retroarc_core::filter::run_filter;

    fn encode(data: &[u8]) -> Vec<u8> {
        run_filter(&mut BashRle::new(), data, None).unwrap()
    }

    fn decode(data: &[u8]) -> Vec<u8> {
        run_filter(&mut BashUnrle::new(), data, None).unwrap()
    }

    #[test]
    fn test_decode_run() {
        assert_eq!(decode(b"ABC\x90\x05D"), b"ABCCCCCD");
    }

    #[test]
    fn test_decode_escaped_sentinel() {
        assert_eq!(decode(b"AB\x90\x00C"), b"AB\x90C");
    }

    #[test]
    fn test_decode_truncated_code_fails() {
        assert!(run_filter(&mut BashUnrle::new(), b"AB\x90", None).is_err());
    }

    #[test]
    fn test_encode_long_run() {
        assert_eq!(encode(b"AAAAAAAA"), b"A\x90\x08");
    }

    #[test]
    fn test_encode_short_run_stays_literal() {
        // Two repeats are below the event threshold.
        assert_eq!(encode(b"AA"), b"AA");
        assert_eq!(encode(b"AAA"), b"AAA");
    }

    #[test]
    fn test_encode_sentinel_escaped() {
        assert_eq!(encode(b"\x90"), b"\x90\x00");
        assert_eq!(encode(b"A\x90B"), b"A\x90\x00B");
    }

    #[test]
    fn test_encode_max_count_chunking() {
        let input = vec![b'X'; 300];
        let out = encode(&input);
        assert_eq!(out, b"X\x90\xFF\x90\x2E");
        assert_eq!(decode(&out), input);
    }

    #[test]
    fn test_round_trip_mixed() {
        let data: Vec<u8> = b"banana\x90\x90\x90anana"
            .iter()
            .chain([b'z'; 17].iter())
            .copied()
            .collect();
        assert_eq!(decode(&encode(&data)), data);
    }

    #[test]
    fn test_round_trip_all_values() {
        let data: Vec<u8> = (0..=255u8).chain((0..=255u8).rev()).collect();
        assert_eq!(decode(&encode(&data)), data);
    }
}
