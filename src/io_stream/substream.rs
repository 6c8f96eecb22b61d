//! [`SubStream`]: a logical `[base, base + len)` window over another stream.
//!
//! The window keeps its own cursor and seeks the underlying stream before
//! every access, so several windows can share one stream (for example
//! `&File`, or one `&mut` borrow at a time) without fighting over position.
//! Reads and writes are clamped at the window end; crossing it truncates
//! rather than erroring.

use std::io::{self, Read, Seek, SeekFrom, Write};

#[derive(Debug)]
pub struct SubStream<S> {
    inner:  S,
    base:   u64,
    len:    u64,
    pos:    u64,
}

impl<S> SubStream<S> {
    /// Create a window of `len` bytes starting at absolute offset `base`.
    /// The underlying stream is not touched until the first access.
    pub fn new(inner: S, base: u64, len: u64) -> Self {
        Self { inner, base, len, pos: 0 }
    }

    /// Absolute offset of the window start in the underlying stream.
    pub fn base(&self) -> u64 { self.base }

    pub fn len(&self) -> u64 { self.len }

    pub fn is_empty(&self) -> bool { self.len == 0 }

    /// Current position relative to the window start.
    pub fn position(&self) -> u64 { self.pos }

    pub fn get_ref(&self) -> &S { &self.inner }

    pub fn get_mut(&mut self) -> &mut S { &mut self.inner }

    pub fn into_inner(self) -> S { self.inner }

    /// Bytes left between the cursor and the window end.
    fn remaining(&self) -> u64 {
        self.len.saturating_sub(self.pos)
    }
}

impl<S: Read + Seek> SubStream<S> {
    /// Copy the whole window into an owned buffer.
    ///
    /// Neither the window's cursor nor the underlying stream's position is
    /// changed by this call.
    pub fn materialize(&mut self) -> io::Result<Vec<u8>> {
        let saved = self.inner.stream_position()?;
        self.inner.seek(SeekFrom::Start(self.base))?;

        let mut out = Vec::with_capacity(self.len.min(1 << 24) as usize);
        let read = (&mut self.inner).take(self.len).read_to_end(&mut out);

        self.inner.seek(SeekFrom::Start(saved))?;
        read?;
        Ok(out)
    }
}

impl<S: Read + Seek> Read for SubStream<S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let count = (buf.len() as u64).min(self.remaining()) as usize;
        if count == 0 {
            return Ok(0);
        }
        self.inner.seek(SeekFrom::Start(self.base + self.pos))?;
        let n = self.inner.read(&mut buf[..count])?;
        self.pos += n as u64;
        Ok(n)
    }
}

impl<S: Write + Seek> Write for SubStream<S> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let count = (buf.len() as u64).min(self.remaining()) as usize;
        if count == 0 {
            return Ok(0);
        }
        self.inner.seek(SeekFrom::Start(self.base + self.pos))?;
        let n = self.inner.write(&buf[..count])?;
        self.pos += n as u64;
        Ok(n)
    }

    /// Writes past the window end are dropped, not reported as errors.
    fn write_all(&mut self, mut buf: &[u8]) -> io::Result<()> {
        while !buf.is_empty() && self.remaining() > 0 {
            let n = self.write(buf)?;
            if n == 0 {
                return Err(io::ErrorKind::WriteZero.into());
            }
            buf = &buf[n..];
        }
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl<S> Seek for SubStream<S> {
    fn seek(&mut self, target: SeekFrom) -> io::Result<u64> {
        let new_pos = match target {
            SeekFrom::Start(offset) => Some(offset),
            SeekFrom::End(delta)     => self.len.checked_add_signed(delta),
            SeekFrom::Current(delta) => self.pos.checked_add_signed(delta),
        };
        match new_pos {
            Some(p) => {
                self.pos = p;
                Ok(p)
            }
            None => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "invalid seek to a negative or overflowing position",
            )),
        }
    }

    fn stream_position(&mut self) -> io::Result<u64> {
        Ok(self.pos)
    }
}
