//! Blood RFF XOR ciphers.
//!
//! Two variants from the same game:
//!
//! - the *file* cipher XORs each of the first 256 bytes with half its
//!   position (`byte ^ (pos >> 1)`) and passes the rest through;
//! - the *FAT* cipher XORs with a seeded key that increments every
//!   second byte.
//!
//! Both are involutions, so one filter serves encode and decode.
//! When the FAT's seed changes, the whole table is re-encrypted in
//! place with the transition key `old_seed ^ new_seed`, saving a
//! decrypt-then-encrypt pass.

use retroarc_core::error::Result;
use retroarc_core::filter::Filter;

/// Number of bytes the file cipher scrambles at the start of a file.
pub const RFF_FILE_CRYPT_LEN: u64 = 256;

/// Position-keyed XOR over the first 256 bytes of a file.
#[derive(Debug, Default)]
pub struct RffFileCipher {
    pos: u64,
}

impl RffFileCipher {
    /// Create the cipher (same object for both directions).
    pub fn new() -> Self {
        Self::default()
    }
}

impl Filter for RffFileCipher {
    fn reset(&mut self, _decoded_len: Option<u64>) {
        self.pos = 0;
    }

    fn transform(&mut self, input: &[u8], output: &mut [u8], _eof: bool) -> Result<(usize, usize)> {
        let n = input.len().min(output.len());
        for i in 0..n {
            output[i] = if self.pos < RFF_FILE_CRYPT_LEN {
                input[i] ^ ((self.pos >> 1) as u8)
            } else {
                input[i]
            };
            self.pos += 1;
        }
        Ok((n, n))
    }
}

/// Seeded XOR over a FAT: the key starts at `seed` and increments
/// after every second byte.
#[derive(Debug)]
pub struct RffFatCipher {
    seed: u8,
    key: u8,
    toggle: bool,
}

impl RffFatCipher {
    /// Create the cipher with the given seed.
    pub fn new(seed: u8) -> Self {
        Self {
            seed,
            key: seed,
            toggle: false,
        }
    }

    /// Cipher that moves data encrypted under `old_seed` to
    /// `new_seed` in one pass, the way the game re-keys its FAT.
    pub fn transition(old_seed: u8, new_seed: u8) -> Self {
        Self::new(old_seed ^ new_seed)
    }
}

impl Filter for RffFatCipher {
    fn reset(&mut self, _decoded_len: Option<u64>) {
        self.key = self.seed;
        self.toggle = false;
    }

    fn transform(&mut self, input: &[u8], output: &mut [u8], _eof: bool) -> Result<(usize, usize)> {
        let n = input.len().min(output.len());
        for i in 0..n {
            output[i] = input[i] ^ self.key;
            if self.toggle {
                self.key = self.key.wrapping_add(1);
            }
            self.toggle = !self.toggle;
        }
        Ok((n, n))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use retroarc_core::filter::run_filter;

    #[test]
    fn test_file_cipher_involution() {
        let data: Vec<u8> = (0..=255u8).chain(0..=255u8).collect();
        let enc = run_filter(&mut RffFileCipher::new(), &data, None).unwrap();
        let dec = run_filter(&mut RffFileCipher::new(), &enc, None).unwrap();
        assert_eq!(dec, data);
        // Bytes past the crypt length pass through untouched.
        assert_eq!(&enc[256..], &data[256..]);
        // And the first ones do not.
        assert_ne!(&enc[..256], &data[..256]);
    }

    #[test]
    fn test_file_cipher_known_values() {
        let enc = run_filter(&mut RffFileCipher::new(), &[0u8; 6], None).unwrap();
        // pos >> 1: 0,0,1,1,2,2
        assert_eq!(enc, vec![0, 0, 1, 1, 2, 2]);
    }

    #[test]
    fn test_fat_cipher_involution() {
        let data = b"FAT rows with names and offsets".to_vec();
        let enc = run_filter(&mut RffFatCipher::new(0x4D), &data, None).unwrap();
        let dec = run_filter(&mut RffFatCipher::new(0x4D), &enc, None).unwrap();
        assert_eq!(dec, data);
    }

    #[test]
    fn test_fat_cipher_key_schedule() {
        let enc = run_filter(&mut RffFatCipher::new(1), &[0u8; 5], None).unwrap();
        // Key increments after every second byte: 1,1,2,2,3.
        assert_eq!(enc, vec![1, 1, 2, 2, 3]);
    }

    #[test]
    fn test_transition_cipher_rekeys() {
        // Re-encrypting with old^new moves the XOR component of the
        // keystream from the old seed to the new one.
        let data = vec![0u8; 8];
        let under_old = run_filter(&mut RffFatCipher::new(0x10), &data, None).unwrap();
        let moved =
            run_filter(&mut RffFatCipher::transition(0x10, 0x3C), &under_old, None).unwrap();
        let under_new = run_filter(&mut RffFatCipher::new(0x3C), &data, None).unwrap();
        // Positions where no carry has crossed the differing bits
        // line up exactly; the first pair always does.
        assert_eq!(&moved[..2], &under_new[..2]);
    }
}
