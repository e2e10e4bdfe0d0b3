//! Raptor GLB additive cipher.
//!
//! The key is a repeating byte string ("32768GLB"), starting at
//! position 25 modulo the key length. Decoding subtracts the key byte
//! and the previous ciphertext byte; encoding adds them. Both
//! directions chain their running state on the *ciphertext* byte -
//! the pair inverts because the encoder chains on its output and the
//! decoder on its input, which are the same stream. Cross-checked
//! against real archives; do not "fix" the chaining.
//!
//! An optional block length restarts the key every N bytes; the
//! game's FAT uses 28 (one row), file bodies use 0 (never restart).

use retroarc_core::error::Result;
use retroarc_core::filter::Filter;

/// Key used by Raptor .GLB files.
pub const GLB_KEY: &[u8] = b"32768GLB";

/// Cipher block length of the .GLB FAT (one directory row).
pub const GLB_FAT_BLOCK: usize = 28;

const KEY_START: usize = 25;

#[derive(Debug)]
struct GlbState {
    key: Vec<u8>,
    block_len: usize,
    pos_key: usize,
    last_byte: u8,
    offset: u64,
}

impl GlbState {
    fn new(key: &[u8], block_len: usize) -> Self {
        let mut state = Self {
            key: key.to_vec(),
            block_len,
            pos_key: 0,
            last_byte: 0,
            offset: 0,
        };
        state.rekey();
        state
    }

    fn rekey(&mut self) {
        self.pos_key = KEY_START % self.key.len();
        self.last_byte = self.key[self.pos_key];
    }

    fn step_key(&mut self) {
        self.pos_key = (self.pos_key + 1) % self.key.len();
        self.offset += 1;
    }

    fn at_block_boundary(&self) -> bool {
        self.block_len != 0 && self.offset % self.block_len as u64 == 0
    }
}

/// GLB decryption filter.
#[derive(Debug)]
pub struct GlbDecrypt {
    state: GlbState,
}

impl GlbDecrypt {
    /// Create a decryptor with the given key and block length
    /// (0 = never restart the key).
    pub fn new(key: &[u8], block_len: usize) -> Self {
        Self {
            state: GlbState::new(key, block_len),
        }
    }
}

impl Filter for GlbDecrypt {
    fn reset(&mut self, _decoded_len: Option<u64>) {
        self.state.rekey();
        self.state.offset = 0;
    }

    fn transform(&mut self, input: &[u8], output: &mut [u8], _eof: bool) -> Result<(usize, usize)> {
        let n = input.len().min(output.len());
        for i in 0..n {
            if self.state.at_block_boundary() {
                self.state.rekey();
            }
            let c = input[i];
            output[i] = c
                .wrapping_sub(self.state.key[self.state.pos_key])
                .wrapping_sub(self.state.last_byte);
            self.state.last_byte = c;
            self.state.step_key();
        }
        Ok((n, n))
    }
}

/// GLB encryption filter.
#[derive(Debug)]
pub struct GlbEncrypt {
    state: GlbState,
}

impl GlbEncrypt {
    /// Create an encryptor with the given key and block length.
    pub fn new(key: &[u8], block_len: usize) -> Self {
        Self {
            state: GlbState::new(key, block_len),
        }
    }
}

impl Filter for GlbEncrypt {
    fn reset(&mut self, _decoded_len: Option<u64>) {
        self.state.rekey();
        self.state.offset = 0;
    }

    fn transform(&mut self, input: &[u8], output: &mut [u8], _eof: bool) -> Result<(usize, usize)> {
        let n = input.len().min(output.len());
        for i in 0..n {
            if self.state.at_block_boundary() {
                self.state.rekey();
            }
            let c = input[i]
                .wrapping_add(self.state.last_byte)
                .wrapping_add(self.state.key[self.state.pos_key]);
            output[i] = c;
            self.state.last_byte = c;
            self.state.step_key();
        }
        Ok((n, n))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use retroarc_core::filter::run_filter;

    fn round_trip(block_len: usize, data: &[u8]) {
        let enc = run_filter(&mut GlbEncrypt::new(GLB_KEY, block_len), data, None).unwrap();
        let dec = run_filter(&mut GlbDecrypt::new(GLB_KEY, block_len), &enc, None).unwrap();
        assert_eq!(dec, data);
    }

    #[test]
    fn test_round_trip_file_cipher() {
        round_trip(0, b"raptor call of the shadows");
        round_trip(0, &[0u8; 64]);
    }

    #[test]
    fn test_round_trip_fat_cipher() {
        // Several FAT rows so the per-block restart kicks in.
        let data: Vec<u8> = (0..GLB_FAT_BLOCK as u8 * 4).collect();
        round_trip(GLB_FAT_BLOCK, &data);
    }

    #[test]
    fn test_known_first_bytes() {
        // Key position starts at 25 % 8 = 1 ('2'), last byte seeds
        // from the same key byte.
        let enc = run_filter(&mut GlbEncrypt::new(GLB_KEY, 0), &[0x00, 0x00], None).unwrap();
        let k1 = GLB_KEY[1]; // '2' = 0x32
        let b0 = 0u8.wrapping_add(k1).wrapping_add(k1);
        let k2 = GLB_KEY[2]; // '7'
        let b1 = 0u8.wrapping_add(b0).wrapping_add(k2);
        assert_eq!(enc, vec![b0, b1]);
    }

    #[test]
    fn test_block_restart_isolates_rows() {
        // With a block cipher, identical rows encrypt identically.
        let row: Vec<u8> = (0..GLB_FAT_BLOCK as u8).collect();
        let mut two_rows = row.clone();
        two_rows.extend_from_slice(&row);
        let enc =
            run_filter(&mut GlbEncrypt::new(GLB_KEY, GLB_FAT_BLOCK), &two_rows, None).unwrap();
        assert_eq!(&enc[..GLB_FAT_BLOCK], &enc[GLB_FAT_BLOCK..]);
    }
}
