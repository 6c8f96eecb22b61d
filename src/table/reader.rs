//! Pull-style @UTF decoder.
//!
//! The header and schema are decoded eagerly by [`TableReader::new`]; row
//! values are decoded lazily, one field at a time, by seeking to
//! `base + rows + row * row_length + field_offset`.  Every pool reference is
//! resolved relative to the container base, so a container embedded as a
//! blob inside another container decodes the same way as a top-level one.

use std::fs::File;
use std::io::{self, BufReader, Cursor, Read, Seek, SeekFrom};
use std::path::Path;

use byteorder::{BigEndian, ReadBytesExt};
use tracing::{debug, warn};
use uuid::Uuid;

use super::field::{Field, StorageMode};
use super::header::{FieldFlags, TableHeader, OFFSET_BIAS, SIGNATURE, TYPE_MASK};
use super::mask::MaskKey;
use super::value::{FieldType, NativeValue, Value};
use super::TableError;
use crate::io_stream::{CursorRead, SubStream};
use crate::pool::BLANK_STRING;
use crate::text::TextEncoding;

/// The stream a reader decodes from: the caller's stream as given, or an
/// unmasked in-memory copy of an obfuscated container.
#[derive(Debug)]
pub enum TableSource<R> {
    Direct(R),
    Unmasked(Cursor<Vec<u8>>),
}

impl<R: Read> Read for TableSource<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            TableSource::Direct(r)   => r.read(buf),
            TableSource::Unmasked(c) => c.read(buf),
        }
    }
}

impl<R: Seek> Seek for TableSource<R> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        match self {
            TableSource::Direct(r)   => r.seek(pos),
            TableSource::Unmasked(c) => c.seek(pos),
        }
    }
}

#[derive(Debug, Clone)]
struct FieldEntry {
    name:       String,
    flags:      FieldFlags,
    field_type: FieldType,
    /// Byte offset inside the row record; meaningful for per-row fields.
    offset:     u64,
    /// Constant value, or the zero sentinel for fields with no storage.
    /// Constant blobs keep their pool slot in `slot` instead.
    constant:   Option<Value>,
    slot:       (u32, u32),
}

impl FieldEntry {
    fn storage(&self) -> StorageMode {
        if self.flags.row_storage() {
            StorageMode::PerRow
        } else if self.flags.has_default() {
            StorageMode::Constant
        } else {
            StorageMode::Absent
        }
    }
}

pub struct TableReader<R> {
    source:      TableSource<R>,
    base:        u64,
    header:      TableHeader,
    encoding:    TextEncoding,
    table_name:  String,
    fields:      Vec<FieldEntry>,
    current_row: Option<u64>,
    mask_key:    Option<MaskKey>,
}

impl TableReader<Cursor<Vec<u8>>> {
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, TableError> {
        Self::new(Cursor::new(bytes))
    }
}

impl TableReader<BufReader<File>> {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, TableError> {
        Self::new(BufReader::new(File::open(path)?))
    }
}

impl<R: Read + Seek> TableReader<R> {
    /// Decode the header and schema of the container starting at the
    /// source's current position.
    ///
    /// A signature other than `@UTF` triggers key recovery; on success the
    /// whole container is unmasked into memory and decoded from there.
    pub fn new(mut source: R) -> Result<Self, TableError> {
        let base = source.stream_position()?;
        let signature: [u8; 4] = source.read_array()?;

        let (mut source, base, mask_key) = if &signature == SIGNATURE {
            (TableSource::Direct(source), base, None)
        } else {
            let key = MaskKey::recover(&signature, SIGNATURE)
                .ok_or(TableError::InvalidSignature { found: signature })?;
            debug!(xor = key.xor, multiplier = key.multiplier, "recovered table mask key");
            let mut unmasked = Cursor::new(unmask(&mut source, signature, key)?);
            unmasked.set_position(SIGNATURE.len() as u64);
            (TableSource::Unmasked(unmasked), 0, Some(key))
        };

        let header = TableHeader::read_after_signature(&mut source)?;
        let encoding = header
            .text_encoding()
            .ok_or(TableError::UnknownEncoding(header.encoding))?;

        let mut reader = Self {
            source,
            base,
            header,
            encoding,
            table_name: String::new(),
            fields: Vec::new(),
            current_row: None,
            mask_key,
        };
        reader.table_name = reader.resolve_string(reader.header.table_name_position, false)?;
        reader.read_schema()?;

        debug!(
            table    = %reader.table_name,
            fields   = reader.fields.len(),
            rows     = reader.header.row_count,
            encoding = reader.encoding.name(),
            masked   = reader.mask_key.is_some(),
            "decoded table header"
        );
        Ok(reader)
    }

    fn read_schema(&mut self) -> Result<(), TableError> {
        let mut row_width = 0u64;
        for _ in 0..self.header.field_count {
            let flags = FieldFlags(self.source.read_u8()?);
            let field_type = flags
                .field_type()
                .ok_or(TableError::UnknownFieldType(flags.0 & TYPE_MASK))?;
            let name = if flags.has_name() { self.read_string()? } else { String::new() };

            let mut entry = FieldEntry {
                name,
                flags,
                field_type,
                offset:   0,
                constant: None,
                slot:     (0, 0),
            };

            if flags.has_default() {
                if field_type == FieldType::Blob {
                    let position = self.source.read_u32::<BigEndian>()?;
                    let length   = self.source.read_u32::<BigEndian>()?;
                    entry.slot = (position, length);
                } else {
                    entry.constant = Some(self.read_inline(field_type)?);
                }
            } else if !flags.row_storage() {
                entry.constant = Some(field_type.zero());
            }

            if flags.row_storage() {
                entry.offset = row_width;
                row_width += field_type.width() as u64;
            }
            self.fields.push(entry);
        }

        if row_width != self.header.row_length as u64 {
            warn!(
                table    = %self.table_name,
                declared = self.header.row_length,
                computed = row_width,
                "row width disagrees with schema"
            );
        }
        Ok(())
    }

    // ── Header / schema accessors ────────────────────────────────────────────

    pub fn table_name(&self) -> &str { &self.table_name }

    pub fn field_count(&self) -> usize { self.fields.len() }

    pub fn row_count(&self) -> u64 { self.header.row_count as u64 }

    /// Row selected by [`advance`](Self::advance) or
    /// [`seek_row`](Self::seek_row); `None` before the first row.
    pub fn current_row(&self) -> Option<u64> { self.current_row }

    /// Key the container was unmasked with, if it was obfuscated.
    pub fn mask_key(&self) -> Option<MaskKey> { self.mask_key }

    pub fn encoding(&self) -> TextEncoding { self.encoding }

    pub fn header(&self) -> &TableHeader { &self.header }

    /// Offset of the container in the decoded stream.
    pub fn base(&self) -> u64 { self.base }

    pub fn field_name(&self, index: usize) -> Option<&str> {
        self.fields.get(index).map(|f| f.name.as_str())
    }

    pub fn field_type(&self, index: usize) -> Option<FieldType> {
        self.fields.get(index).map(|f| f.field_type)
    }

    pub fn storage(&self, index: usize) -> Option<StorageMode> {
        self.fields.get(index).map(FieldEntry::storage)
    }

    /// First field named `name`.
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    pub fn contains_field(&self, name: &str) -> bool {
        self.field_index(name).is_some()
    }

    /// Field definition as a model [`Field`].  Constant fields carry their
    /// stored value as default; per-row and storage-less fields carry none.
    pub fn field(&mut self, index: usize) -> Result<Option<Field>, TableError> {
        let Some(entry) = self.fields.get(index).cloned() else {
            return Ok(None);
        };
        let storage = entry.storage();
        let default = match storage {
            StorageMode::Constant => self.value(index)?,
            _ => None,
        };
        Ok(Some(Field::decoded(entry.name, entry.field_type, default, storage)))
    }

    // ── Row cursor ───────────────────────────────────────────────────────────

    /// Move to the next row.  Returns `false` (and stays put) at the end.
    pub fn advance(&mut self) -> bool {
        let next = self.current_row.map_or(0, |r| r + 1);
        if next >= self.row_count() {
            return false;
        }
        self.current_row = Some(next);
        true
    }

    pub fn seek_row(&mut self, row: u64) -> bool {
        if row >= self.row_count() {
            return false;
        }
        self.current_row = Some(row);
        true
    }

    // ── Values ───────────────────────────────────────────────────────────────

    /// Value of field `index` in the current row.
    ///
    /// `Ok(None)` when the index is out of range, or when the field is
    /// stored per row and no row is selected.
    pub fn value(&mut self, index: usize) -> Result<Option<Value>, TableError> {
        let Some(entry) = self.fields.get(index) else {
            return Ok(None);
        };
        let field_type = entry.field_type;
        if !entry.flags.row_storage() {
            if field_type == FieldType::Blob && entry.flags.has_default() {
                let (position, length) = entry.slot;
                let (start, length) = self.resolve_blob(position, length)?;
                return Ok(Some(Value::Blob(self.read_blob(start, length)?)));
            }
            return Ok(entry.constant.clone());
        }
        if !self.seek_value(index)? {
            return Ok(None);
        }
        self.read_inline(field_type).map(Some)
    }

    pub fn value_by_name(&mut self, name: &str) -> Result<Option<Value>, TableError> {
        match self.field_index(name) {
            Some(index) => self.value(index),
            None => Ok(None),
        }
    }

    /// Every field's value for the current row, in schema order.  `None`
    /// when no row is selected.
    pub fn values(&mut self) -> Result<Option<Vec<Value>>, TableError> {
        if self.current_row.is_none() {
            return Ok(None);
        }
        let mut out = Vec::with_capacity(self.fields.len());
        for index in 0..self.fields.len() {
            let value = self.value(index)?;
            out.push(value.unwrap_or_else(|| self.fields[index].field_type.zero()));
        }
        Ok(Some(out))
    }

    /// Typed value.  Numeric widening and string parsing apply; a value the
    /// target type cannot represent is a [`TableError::TypeMismatch`].
    pub fn get<T: NativeValue>(&mut self, index: usize) -> Result<Option<T>, TableError> {
        let Some(value) = self.value(index)? else {
            return Ok(None);
        };
        let found = value.field_type();
        let converted = value.convert(T::FIELD_TYPE).ok_or_else(|| TableError::TypeMismatch {
            field:    self.fields[index].name.clone(),
            expected: T::FIELD_TYPE,
            found,
        })?;
        T::try_from(converted).map(Some).map_err(|v| TableError::TypeMismatch {
            field:    self.fields[index].name.clone(),
            expected: T::FIELD_TYPE,
            found:    v.field_type(),
        })
    }

    // ── Blob helpers ─────────────────────────────────────────────────────────

    /// Absolute position and length of a blob field's payload in the
    /// decoded stream.  `None` for non-blob fields and unselected rows.
    fn blob_slot(&mut self, index: usize) -> Result<Option<(u64, u64)>, TableError> {
        let Some(entry) = self.fields.get(index) else {
            return Ok(None);
        };
        if entry.field_type != FieldType::Blob {
            return Ok(None);
        }
        let (position, length) = if entry.flags.row_storage() {
            if !self.seek_value(index)? {
                return Ok(None);
            }
            let position = self.source.read_u32::<BigEndian>()?;
            let length   = self.source.read_u32::<BigEndian>()?;
            (position, length)
        } else {
            entry.slot
        };
        self.resolve_blob(position, length).map(Some)
    }

    pub fn blob_position(&mut self, index: usize) -> Result<Option<u64>, TableError> {
        Ok(self.blob_slot(index)?.map(|(position, _)| position))
    }

    pub fn blob_length(&mut self, index: usize) -> Result<Option<u64>, TableError> {
        Ok(self.blob_slot(index)?.map(|(_, length)| length))
    }

    /// Zero-copy window over a blob field's payload.
    pub fn blob_view(&mut self, index: usize) -> Result<Option<SubStream<&mut TableSource<R>>>, TableError> {
        let Some((position, length)) = self.blob_slot(index)? else {
            return Ok(None);
        };
        Ok(Some(SubStream::new(&mut self.source, position, length)))
    }

    /// Decode a table stored inside a blob field.
    pub fn nested_reader(
        &mut self,
        index: usize,
    ) -> Result<Option<TableReader<SubStream<&mut TableSource<R>>>>, TableError> {
        match self.blob_view(index)? {
            Some(view) => TableReader::new(view).map(Some),
            None => Ok(None),
        }
    }

    pub fn into_source(self) -> TableSource<R> {
        self.source
    }

    // ── Decoding primitives ──────────────────────────────────────────────────

    /// Seek to field `index` of the current row.  `false` when no row is
    /// selected.
    fn seek_value(&mut self, index: usize) -> io::Result<bool> {
        let Some(row) = self.current_row else {
            return Ok(false);
        };
        let position = self.base
            + self.header.rows_position
            + row * self.header.row_length as u64
            + self.fields[index].offset;
        self.source.seek(SeekFrom::Start(position))?;
        Ok(true)
    }

    fn read_inline(&mut self, field_type: FieldType) -> Result<Value, TableError> {
        Ok(match field_type {
            FieldType::U8     => Value::U8(self.source.read_u8()?),
            FieldType::I8     => Value::I8(self.source.read_i8()?),
            FieldType::U16    => Value::U16(self.source.read_u16::<BigEndian>()?),
            FieldType::I16    => Value::I16(self.source.read_i16::<BigEndian>()?),
            FieldType::U32    => Value::U32(self.source.read_u32::<BigEndian>()?),
            FieldType::I32    => Value::I32(self.source.read_i32::<BigEndian>()?),
            FieldType::U64    => Value::U64(self.source.read_u64::<BigEndian>()?),
            FieldType::I64    => Value::I64(self.source.read_i64::<BigEndian>()?),
            FieldType::F32    => Value::F32(self.source.read_f32::<BigEndian>()?),
            FieldType::F64    => Value::F64(self.source.read_f64::<BigEndian>()?),
            FieldType::String => Value::String(self.read_string()?),
            FieldType::Blob   => {
                let position = self.source.read_u32::<BigEndian>()?;
                let length   = self.source.read_u32::<BigEndian>()?;
                let (start, length) = self.resolve_blob(position, length)?;
                Value::Blob(self.read_blob(start, length)?)
            }
            FieldType::Guid   => Value::Guid(Uuid::from_bytes_le(self.source.read_array()?)),
        })
    }

    fn read_string(&mut self) -> Result<String, TableError> {
        let offset = self.source.read_u32::<BigEndian>()?;
        self.resolve_string(offset, true)
    }

    /// Decode the pool string at `offset`, restoring the stream position.
    /// The blank-string literal decodes to `""`; with `normalize`, so does
    /// offset 0 when it holds the table name.
    fn resolve_string(&mut self, offset: u32, normalize: bool) -> Result<String, TableError> {
        let back = self.source.stream_position()?;
        self.source.seek(SeekFrom::Start(
            self.base + self.header.string_pool_position + offset as u64,
        ))?;
        let bytes = self.source.read_cstring_bytes()?;
        self.source.seek(SeekFrom::Start(back))?;

        let text = self.encoding.decode(&bytes);
        if text == BLANK_STRING || (normalize && offset == 0 && text == self.table_name) {
            return Ok(String::new());
        }
        Ok(text)
    }

    /// Absolute payload position and true length of a stored blob pair.
    ///
    /// Some producers store length 0 for blobs holding a nested table; the
    /// length is then taken from the nested container's own header.
    fn resolve_blob(&mut self, position: u32, length: u32) -> Result<(u64, u64), TableError> {
        let start = self.base + self.header.data_pool_position + position as u64;
        let mut length = length as u64;
        if length == 0 && position > 0 {
            let back = self.source.stream_position()?;
            self.source.seek(SeekFrom::Start(start))?;
            match self.source.read_array::<4>() {
                Ok(sig) if &sig == SIGNATURE => {
                    length = self.source.read_u32::<BigEndian>()? as u64 + OFFSET_BIAS;
                    warn!(position = start, length, "zero-length blob holds a nested table, using its header length");
                }
                Ok(_) => {}
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {}
                Err(e) => return Err(e.into()),
            }
            self.source.seek(SeekFrom::Start(back))?;
        }
        Ok((start, length))
    }

    fn read_blob(&mut self, start: u64, length: u64) -> Result<Vec<u8>, TableError> {
        self.source.seek(SeekFrom::Start(start))?;
        let mut data = Vec::new();
        (&mut self.source).take(length).read_to_end(&mut data)?;
        if data.len() as u64 != length {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("blob at {start} declares {length} bytes, {} available", data.len()),
            )
            .into());
        }
        Ok(data)
    }
}

/// Read the whole masked container (signature already consumed) and unmask
/// it.  Declared lengths past the end of the source are clamped.
fn unmask<R: Read>(source: &mut R, signature: [u8; 4], key: MaskKey) -> Result<Vec<u8>, TableError> {
    let mut buf = signature.to_vec();
    let mut length_bytes: [u8; 4] = source.read_array()?;
    buf.extend_from_slice(&length_bytes);

    let mut keystream = key.keystream();
    keystream.apply(&mut [0u8; 4]);
    keystream.apply(&mut length_bytes);
    let total = u32::from_be_bytes(length_bytes) as u64 + OFFSET_BIAS;

    source.take(total.saturating_sub(buf.len() as u64)).read_to_end(&mut buf)?;
    key.apply(&mut buf);
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use byteorder::WriteBytesExt;
    use std::io::Write;

    /// Two fields (`A`: per-row u16, `S`: constant string), two rows.
    fn handmade() -> Vec<u8> {
        let mut out = Vec::new();
        out.write_all(b"@UTF").unwrap();
        out.write_u32::<BigEndian>(69 - 8).unwrap();
        out.write_u8(0).unwrap();
        out.write_u8(1).unwrap();
        out.write_u16::<BigEndian>(46 - 8).unwrap();
        out.write_u32::<BigEndian>(50 - 8).unwrap();
        out.write_u32::<BigEndian>(69 - 8).unwrap();
        out.write_u32::<BigEndian>(7).unwrap();
        out.write_u16::<BigEndian>(2).unwrap();
        out.write_u16::<BigEndian>(2).unwrap();
        out.write_u32::<BigEndian>(2).unwrap();

        out.write_u8(0x52).unwrap();
        out.write_u32::<BigEndian>(9).unwrap();
        out.write_u8(0x3A).unwrap();
        out.write_u32::<BigEndian>(11).unwrap();
        out.write_u32::<BigEndian>(13).unwrap();
        assert_eq!(out.len(), 46);

        out.write_all(&[0x00, 0x05, 0x01, 0x00]).unwrap();
        out.write_all(b"<NULL>\0T\0A\0S\0hello\0").unwrap();
        assert_eq!(out.len(), 69);
        out
    }

    #[test]
    fn decodes_handmade_container() {
        let mut r = TableReader::from_bytes(handmade()).unwrap();
        assert_eq!(r.table_name(), "T");
        assert_eq!(r.field_count(), 2);
        assert_eq!(r.row_count(), 2);
        assert_eq!(r.encoding(), TextEncoding::Utf8);
        assert_eq!(r.storage(0), Some(StorageMode::PerRow));
        assert_eq!(r.storage(1), Some(StorageMode::Constant));

        // per-row values need a row
        assert_eq!(r.value(0).unwrap(), None);
        assert_eq!(r.value(1).unwrap(), Some(Value::from("hello")));

        assert!(r.advance());
        assert_eq!(r.get::<u16>(0).unwrap(), Some(5));
        assert!(r.advance());
        assert_eq!(r.value_by_name("A").unwrap(), Some(Value::U16(256)));
        assert_eq!(r.get::<u32>(0).unwrap(), Some(256));
        assert!(!r.advance());
        assert_eq!(r.current_row(), Some(1));

        assert_eq!(r.value(7).unwrap(), None);
        assert_eq!(r.value_by_name("missing").unwrap(), None);
        assert!(!r.seek_row(2));
        assert!(r.seek_row(0));
        assert_eq!(r.values().unwrap(), Some(vec![Value::U16(5), Value::from("hello")]));
    }

    #[test]
    fn typed_get_reports_mismatch() {
        let mut r = TableReader::from_bytes(handmade()).unwrap();
        r.seek_row(1);
        assert!(matches!(r.get::<u8>(0), Err(TableError::TypeMismatch { .. })));
    }

    #[test]
    fn masked_container_is_unmasked() {
        let key = MaskKey::new(0x5F, 0x15);
        let mut bytes = handmade();
        key.apply(&mut bytes);
        let mut r = TableReader::from_bytes(bytes).unwrap();
        assert_eq!(r.mask_key(), Some(key));
        assert_eq!(r.table_name(), "T");
        r.seek_row(0);
        assert_eq!(r.value(0).unwrap(), Some(Value::U16(5)));
    }

    #[test]
    fn rejects_unrecoverable_signature() {
        let mut bytes = handmade();
        bytes[1] = b'X';
        assert!(matches!(
            TableReader::from_bytes(bytes),
            Err(TableError::InvalidSignature { .. })
        ));
    }

    #[test]
    fn container_at_nonzero_offset() {
        let mut bytes = vec![0xEE; 13];
        bytes.extend(handmade());
        let mut cur = Cursor::new(bytes);
        cur.set_position(13);
        let mut r = TableReader::new(cur).unwrap();
        assert_eq!(r.base(), 13);
        r.seek_row(1);
        assert_eq!(r.value(0).unwrap(), Some(Value::U16(256)));
    }
}
