use std::fmt;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::PathBuf;

use crate::io_stream::{align_up, stream_len, SeekPad};
use crate::progress::{percent, ProgressFn};

/// A seekable payload source owned by the pool until flush.
pub trait ReadSeek: Read + Seek + Send {}

impl<T: Read + Seek + Send> ReadSeek for T {}

/// One deferred payload.
pub enum PoolItem {
    Bytes(Vec<u8>),
    /// Copied from its start at flush time.
    Stream(Box<dyn ReadSeek>),
    /// Opened only at flush time.
    File(PathBuf),
}

impl fmt::Debug for PoolItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PoolItem::Bytes(b)  => write!(f, "Bytes({} B)", b.len()),
            PoolItem::Stream(_) => f.write_str("Stream(..)"),
            PoolItem::File(p)   => write!(f, "File({})", p.display()),
        }
    }
}

/// Where a `put` landed: pool-relative offset and payload length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PoolSlot {
    pub offset: u64,
    pub length: u64,
}

#[derive(Debug)]
struct Entry {
    offset: u64,
    length: u64,
    item:   PoolItem,
}

/// Variable-length payloads, each starting on an `align` boundary.
///
/// Empty payloads are not stored and report offset 0.
#[derive(Debug)]
pub struct DataPool {
    align:       u64,
    base_length: u64,
    length:      u64,
    position:    u64,
    entries:     Vec<Entry>,
}

impl DataPool {
    pub fn new(align: u64) -> Self {
        Self::with_base(align, 0)
    }

    /// Start the running length at `base_length`, so offsets are relative
    /// to a point `base_length` bytes before the pool (e.g. a header the
    /// caller writes first).
    pub fn with_base(align: u64, base_length: u64) -> Self {
        Self {
            align: align.max(1),
            base_length,
            length: base_length,
            position: 0,
            entries: Vec::new(),
        }
    }

    pub fn align(&self) -> u64 { self.align }

    /// Running length, including the base length and alignment gaps.
    pub fn len(&self) -> u64 { self.length }

    pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    /// Absolute stream offset of the last `write`.
    pub fn position(&self) -> u64 { self.position }

    fn reserve(&mut self, length: u64, item: PoolItem) -> PoolSlot {
        if length == 0 {
            return PoolSlot::default();
        }
        let offset = align_up(self.length, self.align);
        self.length = offset + length;
        self.entries.push(Entry { offset, length, item });
        PoolSlot { offset, length }
    }

    pub fn put_bytes(&mut self, data: Vec<u8>) -> PoolSlot {
        let length = data.len() as u64;
        self.reserve(length, PoolItem::Bytes(data))
    }

    /// Queue a stream; its current end determines the payload length.
    pub fn put_stream<S: ReadSeek + 'static>(&mut self, mut stream: S) -> io::Result<PoolSlot> {
        let length = stream_len(&mut stream)?;
        Ok(self.reserve(length, PoolItem::Stream(Box::new(stream))))
    }

    pub fn put_file<P: Into<PathBuf>>(&mut self, path: P) -> io::Result<PoolSlot> {
        let path = path.into();
        let length = std::fs::metadata(&path)?.len();
        Ok(self.reserve(length, PoolItem::File(path)))
    }

    pub fn put(&mut self, item: PoolItem) -> io::Result<PoolSlot> {
        match item {
            PoolItem::Bytes(data)   => Ok(self.put_bytes(data)),
            PoolItem::Stream(mut s) => {
                let length = stream_len(&mut s)?;
                Ok(self.reserve(length, PoolItem::Stream(s)))
            }
            PoolItem::File(path)    => self.put_file(path),
        }
    }

    /// Materialise every payload at the destination's current position,
    /// padding to `align` (absolute) before each one.
    ///
    /// `progress` is called after each payload with the share of pool bytes
    /// flushed so far.
    pub fn write<W: Write + Seek + ?Sized>(
        &mut self,
        destination:  &mut W,
        mut progress: Option<&mut ProgressFn<'_>>,
    ) -> io::Result<u64> {
        self.position = destination.stream_position()?;
        let total = self.length - self.base_length;

        for entry in &mut self.entries {
            destination.pad_to(self.align)?;
            let copied = match &mut entry.item {
                PoolItem::Bytes(data) => {
                    destination.write_all(data)?;
                    data.len() as u64
                }
                PoolItem::Stream(stream) => {
                    stream.seek(SeekFrom::Start(0))?;
                    io::copy(&mut stream.take(entry.length), destination)?
                }
                PoolItem::File(path) => {
                    let file = File::open(&*path)?;
                    io::copy(&mut file.take(entry.length), destination)?
                }
            };
            if copied != entry.length {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("pool item at {} shrank from {} to {copied} bytes", entry.offset, entry.length),
                ));
            }
            if let Some(cb) = progress.as_deref_mut() {
                let done = destination.stream_position()? - self.position;
                cb(percent(done, total));
            }
        }
        Ok(self.position)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.length = self.base_length;
    }
}
