//! Stargunner byte-pair decompression.
//!
//! A "PGBP" magic and u32le final size, then 4 KiB chunks. Each chunk
//! carries a byte-pair dictionary (run-skip coded) and a
//! length-prefixed body; decoding expands codewords recursively
//! through a small stack. The compression side was never implemented
//! upstream and is not implemented here either.

use retroarc_core::error::{Error, Result};
use retroarc_core::filter::Filter;

const CHUNK_SIZE: usize = 4096;
// Worst case compressed chunk: dictionary plus body.
const CMP_CHUNK_SIZE: usize = 4096 + 256 + 512 + 2;

/// Stargunner decompressor.
pub struct StargunnerDecode {
    got_header: bool,
    final_size: u64,
    buf_in: Vec<u8>,
    buf_out: [u8; CHUNK_SIZE],
    pos_out: usize,
}

impl StargunnerDecode {
    /// Create a decoder.
    pub fn new() -> Self {
        Self {
            got_header: false,
            final_size: 0,
            buf_in: Vec::new(),
            buf_out: [0; CHUNK_SIZE],
            pos_out: CHUNK_SIZE,
        }
    }

    /// Expand one compressed chunk to exactly `expanded_size` bytes.
    fn explode_chunk(input: &[u8], expanded_size: usize, out: &mut [u8]) -> Result<()> {
        let mut table_a = [0u8; 256];
        let mut table_b = [0u8; 256];
        let mut inpos = 0usize;
        let mut outpos = 0usize;

        let mut take = |inpos: &mut usize| -> Result<u8> {
            let b = *input
                .get(*inpos)
                .ok_or_else(|| Error::codec(*inpos as u64, "chunk truncated"))?;
            *inpos += 1;
            Ok(b)
        };

        while outpos < expanded_size {
            // Start with every byte expanding to itself.
            for (i, slot) in table_a.iter_mut().enumerate() {
                *slot = i as u8;
            }

            // Read the dictionary: high-bit codes skip identity
            // entries, others load that many expansion pairs.
            let mut tablepos: usize = 0;
            loop {
                let mut code = take(&mut inpos)?;
                if code > 127 {
                    tablepos += code as usize - 127;
                    code = 0;
                }
                if tablepos == 256 {
                    break;
                }
                for _ in 0..=code {
                    if tablepos >= 256 {
                        return Err(Error::codec(
                            inpos as u64,
                            "dictionary was larger than 256 bytes",
                        ));
                    }
                    let data = take(&mut inpos)?;
                    table_a[tablepos] = data;
                    if tablepos != data as usize {
                        table_b[tablepos] = take(&mut inpos)?;
                    }
                    tablepos += 1;
                }
                if tablepos >= 256 {
                    break;
                }
            }

            // Length of the data encoded with this dictionary.
            let len_lo = take(&mut inpos)? as usize;
            let len_hi = take(&mut inpos)? as usize;
            let mut len = (len_lo | (len_hi << 8)) as isize;

            let mut expbuf = [0u8; 32];
            let mut expbufpos = 0usize;
            loop {
                let code = if expbufpos > 0 {
                    expbufpos -= 1;
                    expbuf[expbufpos]
                } else {
                    len -= 1;
                    if len == -1 {
                        break;
                    }
                    take(&mut inpos)?
                };

                if code == table_a[code as usize] {
                    if outpos >= out.len() {
                        return Err(Error::codec(inpos as u64, "chunk expands past its size"));
                    }
                    out[outpos] = code;
                    outpos += 1;
                } else {
                    if expbufpos >= expbuf.len() - 2 {
                        return Err(Error::codec(
                            inpos as u64,
                            "codeword expanded to more than 32 bytes",
                        ));
                    }
                    expbuf[expbufpos] = table_b[code as usize];
                    expbuf[expbufpos + 1] = table_a[code as usize];
                    expbufpos += 2;
                }
            }
        }
        Ok(())
    }
}

impl Default for StargunnerDecode {
    fn default() -> Self {
        Self::new()
    }
}

impl Filter for StargunnerDecode {
    fn reset(&mut self, _decoded_len: Option<u64>) {
        self.got_header = false;
        self.final_size = 0;
        self.buf_in.clear();
        self.pos_out = CHUNK_SIZE;
    }

    fn transform(&mut self, input: &[u8], output: &mut [u8], eof: bool) -> Result<(usize, usize)> {
        let mut r = 0usize;

        if !self.got_header {
            if input.len() < 8 {
                if eof && !input.is_empty() {
                    return Err(Error::codec(0, "not enough data for a PGBP header"));
                }
                return Ok((0, 0));
            }
            if &input[..4] != b"PGBP" {
                return Err(Error::codec(0, "data is not in Stargunner format"));
            }
            self.final_size = u32::from_le_bytes([input[4], input[5], input[6], input[7]]) as u64;
            r += 8;
            self.got_header = true;
        }

        // Take whatever input is on offer into the chunk buffer.
        let want = CMP_CHUNK_SIZE.saturating_sub(self.buf_in.len());
        let take = want.min(input.len() - r);
        self.buf_in.extend_from_slice(&input[r..r + take]);
        r += take;

        // If the output buffer is drained and a whole chunk is
        // waiting, explode it.
        if self.pos_out == CHUNK_SIZE && self.buf_in.len() > 2 && self.final_size > 0 {
            let len_chunk = self.buf_in[0] as usize | (self.buf_in[1] as usize) << 8;
            if len_chunk + 2 <= self.buf_in.len() {
                let chunk_size = (self.final_size as usize).min(CHUNK_SIZE);
                {
                    let (head, _) = self.buf_in.split_at(2 + len_chunk);
                    let mut tmp = [0u8; CHUNK_SIZE];
                    Self::explode_chunk(&head[2..], chunk_size, &mut tmp)?;
                    if chunk_size < CHUNK_SIZE {
                        // Right-justify a partial final chunk so the
                        // copy-out below stops at the true end.
                        self.buf_out[CHUNK_SIZE - chunk_size..].copy_from_slice(&tmp[..chunk_size]);
                        self.pos_out = CHUNK_SIZE - chunk_size;
                    } else {
                        self.buf_out.copy_from_slice(&tmp);
                        self.pos_out = 0;
                    }
                }
                self.final_size -= chunk_size.min(self.final_size as usize) as u64;
                self.buf_in.drain(..2 + len_chunk);
            }
        }

        // Serve from the output buffer.
        let mut w = 0usize;
        if self.pos_out < CHUNK_SIZE {
            let n = (CHUNK_SIZE - self.pos_out).min(output.len());
            output[..n].copy_from_slice(&self.buf_out[self.pos_out..self.pos_out + n]);
            self.pos_out += n;
            w = n;
        }
        Ok((r, w))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use retroarc_core::filter::run_filter;

    /// Build a valid compressed stream: identity dictionary (every
    /// byte expands to itself) plus a literal body per chunk.
    fn store(data: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(b"PGBP");
        out.extend_from_slice(&(data.len() as u32).to_le_bytes());
        for chunk in data.chunks(CHUNK_SIZE) {
            let mut body = Vec::new();
            // All-identity dictionary. A skip code always forces one
            // explicit entry afterwards, so: skip 128, identity entry
            // for slot 128, skip the remaining 127.
            body.push(0xFF);
            body.push(0x80);
            body.push(0xFE);
            body.extend_from_slice(&(chunk.len() as u16).to_le_bytes());
            body.extend_from_slice(chunk);
            out.extend_from_slice(&(body.len() as u16).to_le_bytes());
            out.extend_from_slice(&body);
        }
        out
    }

    #[test]
    fn test_decode_identity_dictionary() {
        let data = b"stargunner payload bytes";
        let encoded = store(data);
        assert_eq!(run_filter(&mut StargunnerDecode::new(), &encoded, None).unwrap(), data);
    }

    #[test]
    fn test_decode_multi_chunk() {
        let data: Vec<u8> = (0..10000u32).map(|i| (i % 256) as u8).collect();
        let encoded = store(&data);
        assert_eq!(
            run_filter(&mut StargunnerDecode::new(), &encoded, None).unwrap(),
            data
        );
    }

    #[test]
    fn test_decode_pair_expansion() {
        // Dictionary: codeword 0 expands to the pair ('A', 'B'); skip
        // the rest. Body: single codeword 0, declared length 1,
        // expanding to 2 bytes.
        let mut body = Vec::new();
        body.push(0x00); // one dictionary entry follows
        body.push(b'A'); // table_a[0] = 'A' (non-identity)
        body.push(b'B'); // table_b[0] = 'B'
        body.push(0xFF); // skip 128 (slots 1..=128)
        body.push(0x81); // forced entry: slot 129 identity
        body.push(0xFD); // skip the remaining 126 -> 256
        body.extend_from_slice(&1u16.to_le_bytes());
        body.push(0x00); // the codeword

        let mut encoded = Vec::new();
        encoded.extend_from_slice(b"PGBP");
        encoded.extend_from_slice(&2u32.to_le_bytes());
        encoded.extend_from_slice(&(body.len() as u16).to_le_bytes());
        encoded.extend_from_slice(&body);

        assert_eq!(
            run_filter(&mut StargunnerDecode::new(), &encoded, None).unwrap(),
            b"AB"
        );
    }

    #[test]
    fn test_decode_rejects_bad_magic() {
        let bad = b"NOPE\x00\x00\x00\x00";
        assert!(run_filter(&mut StargunnerDecode::new(), bad, None).is_err());
    }
}
