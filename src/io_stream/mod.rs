//! Binary cursor primitives shared by the table and archive codecs.
//!
//! Fixed-width integers and floats come straight from `byteorder`'s
//! `ReadBytesExt` / `WriteBytesExt`; call sites pick the byte order
//! (`BigEndian` for @UTF tables, `LittleEndian` for AFS2 archives).  This
//! module adds what `byteorder` does not cover:
//!
//! - NUL-terminated string payloads ([`CursorRead`], [`CursorWrite`]).  Text decoding is left to [`crate::text`] so the
//!   cursor never guesses an encoding.
//! - Alignment helpers ([`align_up`], [`checked_align_up`], [`SeekPad::pad_to`]).
//! - Bounded range copies ([`copy_part`]).
//! - [`SubStream`], a non-copying window over a shared stream.

mod substream;

pub use substream::SubStream;

use std::io::{self, Read, Seek, SeekFrom, Write};

/// Default copy buffer size: 4 KiB.
pub const DEFAULT_BUFFER_SIZE: usize = 4096;

/// Round `value` up to the next multiple of `alignment`.
///
/// An alignment of 0 or 1 leaves the value unchanged.
#[inline]
pub fn align_up(value: u64, alignment: u64) -> u64 {
    if alignment <= 1 {
        return value;
    }
    match value % alignment {
        0 => value,
        rem => value + (alignment - rem),
    }
}

/// [`align_up`] for untrusted values: `None` when the result would not fit
/// in a `u64`.
#[inline]
pub fn checked_align_up(value: u64, alignment: u64) -> Option<u64> {
    if alignment <= 1 {
        return Some(value);
    }
    match value % alignment {
        0 => Some(value),
        rem => value.checked_add(alignment - rem),
    }
}

// ── Reading ──────────────────────────────────────────────────────────────────

/// String payload reads on top of [`Read`].
pub trait CursorRead: Read {
    /// Read exactly `N` bytes into a stack array.
    fn read_array<const N: usize>(&mut self) -> io::Result<[u8; N]> {
        let mut buf = [0u8; N];
        self.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// Read bytes up to (and consuming) a NUL terminator.  The terminator is
    /// not included in the result.
    fn read_cstring_bytes(&mut self) -> io::Result<Vec<u8>> {
        let mut out = Vec::new();
        let mut byte = [0u8; 1];
        loop {
            self.read_exact(&mut byte)?;
            if byte[0] == 0 {
                return Ok(out);
            }
            out.push(byte[0]);
        }
    }
}

impl<R: Read + ?Sized> CursorRead for R {}

// ── Writing ──────────────────────────────────────────────────────────────────

/// String payload writes on top of [`Write`].
pub trait CursorWrite: Write {
    /// Write `bytes` followed by a NUL terminator.
    fn write_cstring_bytes(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.write_all(bytes)?;
        self.write_all(&[0])
    }

    /// Write `count` zero bytes.
    fn write_zeros(&mut self, count: usize) -> io::Result<()> {
        const ZEROS: [u8; 64] = [0u8; 64];
        let mut left = count;
        while left > 0 {
            let n = left.min(ZEROS.len());
            self.write_all(&ZEROS[..n])?;
            left -= n;
        }
        Ok(())
    }
}

impl<W: Write + ?Sized> CursorWrite for W {}

/// Zero-padding to an absolute stream alignment.
pub trait SeekPad: Write + Seek {
    /// Write zeros until the stream position is a multiple of `alignment`.
    /// Returns the new position.
    fn pad_to(&mut self, alignment: u64) -> io::Result<u64> {
        let pos = self.stream_position()?;
        let target = align_up(pos, alignment);
        self.write_zeros((target - pos) as usize)?;
        Ok(target)
    }
}

impl<W: Write + Seek + ?Sized> SeekPad for W {}

// ── Copying ──────────────────────────────────────────────────────────────────

/// Copy at most `length` bytes from `source` (starting at `position`) into
/// `destination`, using a buffer of `buffer_size` bytes.
///
/// Stops early when the source runs out.  Returns the number of bytes copied.
pub fn copy_part<R, W>(
    source:      &mut R,
    destination: &mut W,
    position:    u64,
    length:      u64,
    buffer_size: usize,
) -> io::Result<u64>
where
    R: Read + Seek + ?Sized,
    W: Write + ?Sized,
{
    source.seek(SeekFrom::Start(position))?;
    let mut buf = vec![0u8; buffer_size.max(1)];
    let mut copied = 0u64;
    while copied < length {
        let want = (length - copied).min(buf.len() as u64) as usize;
        let n = source.read(&mut buf[..want])?;
        if n == 0 {
            break;
        }
        destination.write_all(&buf[..n])?;
        copied += n as u64;
    }
    Ok(copied)
}

/// Length of a seekable stream, leaving its position untouched.
pub fn stream_len<S: Seek + ?Sized>(stream: &mut S) -> io::Result<u64> {
    let pos = stream.stream_position()?;
    let end = stream.seek(SeekFrom::End(0))?;
    if pos != end {
        stream.seek(SeekFrom::Start(pos))?;
    }
    Ok(end)
}
