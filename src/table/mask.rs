//! XOR-multiply obfuscation applied to whole @UTF containers.
//!
//! Byte *i* of a container (counted from its signature) is XORed with
//! `xor * multiplier^i mod 256`.  The cipher is its own inverse.

use std::io::{self, Read, Seek, SeekFrom, Write};

use serde::{Deserialize, Serialize};

use crate::io_stream::DEFAULT_BUFFER_SIZE;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MaskKey {
    pub xor:        u8,
    pub multiplier: u8,
}

impl MaskKey {
    pub const fn new(xor: u8, multiplier: u8) -> Self {
        Self { xor, multiplier }
    }

    /// Brute-force the key that turns `masked` into `expected`.
    ///
    /// The first byte fixes `xor`; every multiplier is then tried against
    /// bytes 1..4.  Returns the first pair that verifies all four bytes.
    pub fn recover(masked: &[u8; 4], expected: &[u8; 4]) -> Option<Self> {
        for x in 0..=255u8 {
            if masked[0] ^ x != expected[0] {
                continue;
            }
            'multiplier: for m in 0..=255u8 {
                let mut k = x.wrapping_mul(m);
                for i in 1..4 {
                    if masked[i] ^ k != expected[i] {
                        continue 'multiplier;
                    }
                    k = k.wrapping_mul(m);
                }
                return Some(Self::new(x, m));
            }
        }
        None
    }

    /// Running keystream starting at container offset 0.
    pub fn keystream(self) -> Keystream {
        Keystream { current: self.xor, multiplier: self.multiplier }
    }

    /// Mask (or unmask) `data`, which must start at container offset 0.
    pub fn apply(self, data: &mut [u8]) {
        self.keystream().apply(data);
    }
}

/// Cipher state carried across buffer boundaries.
#[derive(Debug, Clone)]
pub struct Keystream {
    current:    u8,
    multiplier: u8,
}

impl Keystream {
    pub fn apply(&mut self, data: &mut [u8]) {
        for byte in data {
            *byte ^= self.current;
            self.current = self.current.wrapping_mul(self.multiplier);
        }
    }
}

impl Iterator for Keystream {
    type Item = u8;

    fn next(&mut self) -> Option<u8> {
        let k = self.current;
        self.current = self.current.wrapping_mul(self.multiplier);
        Some(k)
    }
}

/// Mask `length` bytes of `stream` in place, starting at `start`, which is
/// container offset 0.  Leaves the stream positioned at `start + length`.
pub fn mask_in_place<S>(stream: &mut S, start: u64, length: u64, key: MaskKey) -> io::Result<()>
where
    S: Read + Write + Seek + ?Sized,
{
    let mut keystream = key.keystream();
    let mut buf = vec![0u8; DEFAULT_BUFFER_SIZE];
    let mut done = 0u64;
    while done < length {
        let want = (length - done).min(buf.len() as u64) as usize;
        stream.seek(SeekFrom::Start(start + done))?;
        stream.read_exact(&mut buf[..want])?;
        keystream.apply(&mut buf[..want]);
        stream.seek(SeekFrom::Start(start + done))?;
        stream.write_all(&buf[..want])?;
        done += want as u64;
    }
    Ok(())
}
