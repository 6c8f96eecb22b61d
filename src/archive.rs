//! AFS2 archives: id-indexed blobs laid out in an aligned data pool.
//!
//! # Layout (all integers little-endian)
//!
//! ```text
//! "AFS2"  u32 info  u32 count  u16 align  u16 sub_key
//! id[count]                 (id_width bytes each)
//! position[count + 1]       (position_width bytes each, last = total length)
//! payloads, each starting on an `align` boundary
//! ```
//!
//! `info` packs the variant (low byte: 1, or 2 when a sub-key is set), the
//! position width (bits 8..16) and the id width (bits 16..24).  Positions
//! are measured from the archive start and are stored unaligned; readers
//! align them up before use.
//!
//! ```no_run
//! use utftable::archive::{Afs2Archive, ArchiveData};
//! use std::fs::File;
//!
//! let mut archive = Afs2Archive::new();
//! archive.push(7, ArchiveData::Bytes(b"waveform".to_vec()));
//! archive.write(&mut File::create("out.awb")?)?;
//!
//! let mut file = File::open("out.awb")?;
//! let archive = Afs2Archive::read_from(&mut file)?;
//! let data = archive.read_entry(7, &mut file)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::fs::File;
use std::io::{self, Read, Seek, Write};
use std::path::PathBuf;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use thiserror::Error;
use tracing::debug;

use crate::io_stream::{align_up, checked_align_up, CursorRead, SubStream};
use crate::pool::{DataPool, PoolItem};
use crate::progress::ProgressFn;

pub const AFS2_SIGNATURE: &[u8; 4] = b"AFS2";
/// Signature, info, count, align and sub-key.
pub const FIXED_HEADER_SIZE: u64 = 16;
pub const DEFAULT_ALIGN: u16 = 32;

// ── Error type ───────────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("Invalid archive signature {0:02x?}, expected AFS2")]
    InvalidSignature([u8; 4]),
    #[error("Unknown AFS2 variant {0}")]
    UnknownVariant(u32),
    #[error("Unsupported {0}-byte id/position field")]
    UnsupportedFieldWidth(u32),
    #[error("Invalid AFS2 layout: {0}")]
    InvalidLayout(String),
    #[error("No entry with id {0}")]
    EntryNotFound(u32),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

// ── Entries ──────────────────────────────────────────────────────────────────

/// Payload capability every entry shape provides.
pub trait EntrySource {
    /// Payload length in bytes.
    fn length(&self) -> io::Result<u64>;

    /// Readable view of the payload.  `archive` is the stream the archive
    /// was decoded from; sources that own their bytes ignore it.
    fn open<'a, R: Read + Seek>(&'a self, archive: &'a mut R) -> io::Result<Box<dyn Read + 'a>>;

    /// Deferred pool item used when the archive is written.
    fn pool_item(&self) -> io::Result<PoolItem>;
}

/// Where an entry's payload lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveData {
    /// Inside the stream the archive was read from.
    Stored { position: u64, length: u64 },
    Bytes(Vec<u8>),
    /// Opened only when the payload is needed.
    File(PathBuf),
}

impl EntrySource for ArchiveData {
    fn length(&self) -> io::Result<u64> {
        match self {
            ArchiveData::Stored { length, .. } => Ok(*length),
            ArchiveData::Bytes(b) => Ok(b.len() as u64),
            ArchiveData::File(p)  => Ok(std::fs::metadata(p)?.len()),
        }
    }

    fn open<'a, R: Read + Seek>(&'a self, archive: &'a mut R) -> io::Result<Box<dyn Read + 'a>> {
        Ok(match self {
            ArchiveData::Stored { position, length } => Box::new(SubStream::new(archive, *position, *length)),
            ArchiveData::Bytes(b) => Box::new(b.as_slice()),
            ArchiveData::File(p)  => Box::new(File::open(p)?),
        })
    }

    fn pool_item(&self) -> io::Result<PoolItem> {
        match self {
            ArchiveData::Stored { position, .. } => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("entry stored at {position} must be loaded before the archive is rewritten"),
            )),
            ArchiveData::Bytes(b) => Ok(PoolItem::Bytes(b.clone())),
            ArchiveData::File(p)  => Ok(PoolItem::File(p.clone())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry<D = ArchiveData> {
    pub id:   u32,
    pub data: D,
}

/// Field widths chosen for an encoded archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Afs2Layout {
    pub id_width:       u32,
    pub position_width: u32,
    pub header_length:  u64,
}

// ── Archive ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Afs2Archive<D = ArchiveData> {
    entries: Vec<Entry<D>>,
    align:   u16,
    sub_key: u16,
    header:  Vec<u8>,
}

impl<D> Default for Afs2Archive<D> {
    fn default() -> Self {
        Self { entries: Vec::new(), align: DEFAULT_ALIGN, sub_key: 0, header: Vec::new() }
    }
}

impl<D> Afs2Archive<D> {
    pub fn new() -> Self { Self::default() }

    pub fn align(&self) -> u16 { self.align }

    pub fn set_align(&mut self, align: u16) {
        self.align = align;
    }

    pub fn sub_key(&self) -> u16 { self.sub_key }

    pub fn set_sub_key(&mut self, sub_key: u16) {
        self.sub_key = sub_key;
    }

    /// Header bytes produced by the last write (or read).
    pub fn header(&self) -> &[u8] { &self.header }

    pub fn entries(&self) -> &[Entry<D>] { &self.entries }

    pub fn len(&self) -> usize { self.entries.len() }

    pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    pub fn push(&mut self, id: u32, data: D) {
        self.entries.push(Entry { id, data });
    }

    pub fn insert(&mut self, index: usize, id: u32, data: D) {
        let index = index.min(self.entries.len());
        self.entries.insert(index, Entry { id, data });
    }

    /// Remove the first entry with `id`.
    pub fn remove(&mut self, id: u32) -> Option<Entry<D>> {
        let index = self.entries.iter().position(|e| e.id == id)?;
        Some(self.entries.remove(index))
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn entry_by_id(&self, id: u32) -> Option<&Entry<D>> {
        self.entries.iter().find(|e| e.id == id)
    }
}

impl<D: EntrySource> Afs2Archive<D> {
    /// Narrowest id and position widths for the current entries.
    ///
    /// Ids take 2 bytes up to 65535 entries, else 4.  Positions start at 2
    /// bytes and grow to 4, then 8, while the aligned header plus aligned
    /// payloads do not fit.
    pub fn layout(&self) -> io::Result<Afs2Layout> {
        let count = self.entries.len() as u64;
        let align = self.align as u64;
        let id_width: u32 = if count <= u16::MAX as u64 { 2 } else { 4 };

        let mut data_length = 0u64;
        for entry in &self.entries {
            data_length = align_up(data_length, align) + entry.data.length()?;
        }

        let header_length = |width: u32| {
            FIXED_HEADER_SIZE + id_width as u64 * count + width as u64 * (count + 1)
        };
        let fits = |width: u32, limit: u64| align_up(header_length(width), align) + data_length <= limit;

        let position_width = if fits(2, u16::MAX as u64) {
            2
        } else if fits(4, u32::MAX as u64) {
            4
        } else {
            8
        };
        Ok(Afs2Layout { id_width, position_width, header_length: header_length(position_width) })
    }

    pub fn write<W: Write + Seek>(&mut self, destination: &mut W) -> Result<(), ArchiveError> {
        self.write_with_progress(destination, None)
    }

    /// Encode at the destination's current position.  Entries are written
    /// in id order.  `progress` follows the payload copy.
    pub fn write_with_progress<W: Write + Seek>(
        &mut self,
        destination: &mut W,
        progress:    Option<&mut ProgressFn<'_>>,
    ) -> Result<(), ArchiveError> {
        let layout = self.layout()?;
        debug!(
            entries        = self.entries.len(),
            id_width       = layout.id_width,
            position_width = layout.position_width,
            header_length  = layout.header_length,
            "AFS2 field widths selected"
        );

        let mut sorted: Vec<&Entry<D>> = self.entries.iter().collect();
        sorted.sort_by_key(|e| e.id);

        let variant: u32 = if self.sub_key != 0 { 2 } else { 1 };
        let mut header = Vec::with_capacity(layout.header_length as usize);
        header.write_all(AFS2_SIGNATURE)?;
        header.write_u32::<LittleEndian>(variant | layout.position_width << 8 | layout.id_width << 16)?;
        header.write_u32::<LittleEndian>(sorted.len() as u32)?;
        header.write_u16::<LittleEndian>(self.align)?;
        header.write_u16::<LittleEndian>(self.sub_key)?;
        for entry in &sorted {
            write_width(&mut header, layout.id_width, entry.id as u64)?;
        }

        let mut pool = DataPool::with_base(self.align as u64, layout.header_length);
        for entry in &sorted {
            write_width(&mut header, layout.position_width, pool.len())?;
            pool.put(entry.data.pool_item()?)?;
        }
        write_width(&mut header, layout.position_width, pool.len())?;

        // Alignment is relative to the archive start, not the stream origin.
        let start = destination.stream_position()?;
        let mut window = SubStream::new(&mut *destination, start, u64::MAX - start);
        window.write_all(&header)?;
        pool.write(&mut window, progress)?;

        self.header = header;
        Ok(())
    }
}

impl Afs2Archive<ArchiveData> {
    /// Decode the archive starting at the source's current position.
    /// Entries come back as [`ArchiveData::Stored`] with absolute stream
    /// positions.
    pub fn read_from<R: Read + Seek>(source: &mut R) -> Result<Self, ArchiveError> {
        let base = source.stream_position()?;
        let signature: [u8; 4] = source.read_array()?;
        if &signature != AFS2_SIGNATURE {
            return Err(ArchiveError::InvalidSignature(signature));
        }

        let info = source.read_u32::<LittleEndian>()?;
        let variant = info & 0xFF;
        if variant != 1 && variant != 2 {
            return Err(ArchiveError::UnknownVariant(variant));
        }
        let position_width = info >> 8 & 0xFF;
        let id_width = info >> 16 & 0xFF;
        let count = source.read_u32::<LittleEndian>()? as usize;
        let align = source.read_u16::<LittleEndian>()?;
        let sub_key = source.read_u16::<LittleEndian>()?;

        let mut ids = Vec::with_capacity(count.min(1 << 16));
        for _ in 0..count {
            ids.push(read_width(source, id_width)? as u32);
        }
        let mut positions = Vec::with_capacity(count.min(1 << 16) + 1);
        for _ in 0..=count {
            positions.push(read_width(source, position_width)?);
        }

        let mut entries = Vec::with_capacity(count);
        for (i, &id) in ids.iter().enumerate() {
            let (start, end) = (positions[i], positions[i + 1]);
            if end < start {
                return Err(ArchiveError::InvalidLayout(format!(
                    "entry {id} ends at {end} before it starts at {start}"
                )));
            }
            let overflow = || ArchiveError::InvalidLayout(format!("entry {id} position {start} overflows"));
            let aligned = checked_align_up(start, align as u64).ok_or_else(overflow)?;
            let position = base.checked_add(aligned).ok_or_else(overflow)?;
            let length = end.saturating_sub(aligned);
            entries.push(Entry { id, data: ArchiveData::Stored { position, length } });
        }

        let header_length = (source.stream_position()? - base) as usize;
        source.seek(io::SeekFrom::Start(base))?;
        let mut header = vec![0u8; header_length];
        source.read_exact(&mut header)?;

        debug!(entries = count, align, sub_key, id_width, position_width, "read AFS2 archive");
        Ok(Self { entries, align, sub_key, header })
    }

    /// Copy entry `id`'s payload out of `source`.
    pub fn read_entry<R: Read + Seek>(&self, id: u32, source: &mut R) -> Result<Vec<u8>, ArchiveError> {
        let entry = self.entry_by_id(id).ok_or(ArchiveError::EntryNotFound(id))?;
        let mut out = Vec::new();
        entry.data.open(source)?.read_to_end(&mut out)?;
        Ok(out)
    }

    /// Replace every stored entry with an in-memory copy so the archive can
    /// be written elsewhere.
    pub fn load_entries<R: Read + Seek>(&mut self, source: &mut R) -> Result<(), ArchiveError> {
        for entry in &mut self.entries {
            if let ArchiveData::Stored { .. } = entry.data {
                let mut bytes = Vec::new();
                entry.data.open(source)?.read_to_end(&mut bytes)?;
                entry.data = ArchiveData::Bytes(bytes);
            }
        }
        Ok(())
    }
}

fn read_width<R: Read + ?Sized>(source: &mut R, width: u32) -> Result<u64, ArchiveError> {
    Ok(match width {
        2 => source.read_u16::<LittleEndian>()? as u64,
        4 => source.read_u32::<LittleEndian>()? as u64,
        8 => source.read_u64::<LittleEndian>()?,
        other => return Err(ArchiveError::UnsupportedFieldWidth(other)),
    })
}

fn write_width<W: Write + ?Sized>(dest: &mut W, width: u32, value: u64) -> io::Result<()> {
    match width {
        2 => dest.write_u16::<LittleEndian>(value as u16),
        4 => dest.write_u32::<LittleEndian>(value as u32),
        _ => dest.write_u64::<LittleEndian>(value),
    }
}
