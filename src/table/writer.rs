//! Incremental @UTF encoder.
//!
//! The writer reserves the 32-byte header, streams the schema and each row
//! record straight to the destination, and collects strings and blobs in
//! pools whose final offsets are known at `put` time.  `end_table` lays the
//! pools out after the rows and backpatches the header.
//!
//! Calls must follow `Begin → Start → FieldCollection → (Row | Idle) → End`;
//! anything else is a [`TableError::InvalidState`].

use std::fmt;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::PathBuf;

use byteorder::{BigEndian, WriteBytesExt};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::header::{FieldFlags, TableHeader, HEADER_SIZE, OFFSET_BIAS};
use super::mask::{mask_in_place, MaskKey};
use super::value::{FieldType, Value};
use super::TableError;
use crate::io_stream::{CursorWrite, SeekPad};
use crate::pool::{DataPool, PoolSlot, ReadSeek, StringPool, BLANK_STRING};
use crate::progress::ProgressFn;
use crate::text::TextEncoding;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriterState {
    Begin,
    Start,
    FieldCollection,
    Row,
    Idle,
    End,
}

impl fmt::Display for WriterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WriterState::Begin           => "begin",
            WriterState::Start           => "start",
            WriterState::FieldCollection => "field collection",
            WriterState::Row             => "row",
            WriterState::Idle            => "idle",
            WriterState::End             => "end",
        };
        f.write_str(name)
    }
}

/// Encoding options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WriterSettings {
    /// Data pool alignment; 0 is treated as 1.
    pub align:                    u32,
    /// Store `<NULL>` at string pool offset 0.
    pub put_blank_string:         bool,
    pub encoding:                 TextEncoding,
    /// Point repeated strings at their first copy.
    pub remove_duplicate_strings: bool,
    /// Obfuscate the finished container with this key.
    pub mask:                     Option<MaskKey>,
}

impl Default for WriterSettings {
    fn default() -> Self {
        Self {
            align:                    1,
            put_blank_string:         true,
            encoding:                 TextEncoding::ShiftJis,
            remove_duplicate_strings: true,
            mask:                     None,
        }
    }
}

impl WriterSettings {
    /// Layout used by ADX-era tools.
    pub fn adx() -> Self {
        Self { align: 8, put_blank_string: true, remove_duplicate_strings: true, ..Self::default() }
    }

    /// Layout used by ADX2 (ACB/AWB) tools.
    pub fn adx2() -> Self {
        Self { align: 32, put_blank_string: false, remove_duplicate_strings: false, ..Self::default() }
    }

    pub fn effective_align(&self) -> u64 {
        self.align.max(1) as u64
    }
}

#[derive(Debug)]
struct WrittenField {
    name:        String,
    field_type:  FieldType,
    row_storage: bool,
    offset:      u64,
}

pub struct TableWriter<W> {
    destination: W,
    settings:    WriterSettings,
    state:       WriterState,
    base:        u64,
    header:      TableHeader,
    table_name:  String,
    fields:      Vec<WrittenField>,
    row_length:  u64,
    strings:     StringPool,
    data:        DataPool,
}

impl<W: Read + Write + Seek> TableWriter<W> {
    pub fn new(destination: W, settings: WriterSettings) -> Self {
        Self {
            destination,
            strings: StringPool::new(settings.encoding),
            data: DataPool::new(settings.effective_align()),
            settings,
            state: WriterState::Begin,
            base: 0,
            header: TableHeader::default(),
            table_name: String::new(),
            fields: Vec::new(),
            row_length: 0,
        }
    }

    pub fn state(&self) -> WriterState { self.state }

    pub fn settings(&self) -> &WriterSettings { &self.settings }

    pub fn get_ref(&self) -> &W { &self.destination }

    pub fn into_inner(self) -> W { self.destination }

    fn expect_state(&self, expected: WriterState, operation: &'static str) -> Result<(), TableError> {
        if self.state != expected {
            return Err(TableError::InvalidState { operation, state: self.state });
        }
        Ok(())
    }

    // ── Table / schema ───────────────────────────────────────────────────────

    /// Begin a container at the destination's current position.
    pub fn start_table(&mut self, name: &str) -> Result<(), TableError> {
        self.expect_state(WriterState::Begin, "start_table")?;
        self.base = self.destination.stream_position()?;

        if self.settings.put_blank_string {
            self.strings.put(BLANK_STRING)?;
        } else if name.is_empty() {
            self.strings.reserve_empty();
        }
        self.header.table_name_position = self.strings.put(name)? as u32;
        self.table_name = name.to_owned();

        self.destination.write_zeros(HEADER_SIZE as usize)?;
        self.state = WriterState::Start;
        Ok(())
    }

    pub fn start_fields(&mut self) -> Result<(), TableError> {
        self.expect_state(WriterState::Start, "start_fields")?;
        self.state = WriterState::FieldCollection;
        Ok(())
    }

    fn begin_field(&mut self) -> Result<(), TableError> {
        if self.state == WriterState::Start {
            self.start_fields()?;
        }
        self.expect_state(WriterState::FieldCollection, "write_field")?;
        if self.header.field_count == u16::MAX {
            return Err(TableError::LayoutOverflow("field count"));
        }
        Ok(())
    }

    /// Declare a field stored in every row record.
    pub fn write_field(&mut self, name: &str, field_type: FieldType) -> Result<(), TableError> {
        self.begin_field()?;
        let row_length = self.row_length + field_type.width() as u64;
        if row_length > u16::MAX as u64 {
            return Err(TableError::LayoutOverflow("row width"));
        }

        let flags = FieldFlags::new(field_type, !name.is_empty(), false, true);
        self.destination.write_u8(flags.0)?;
        if !name.is_empty() {
            self.write_string(name)?;
        }

        self.fields.push(WrittenField {
            name: name.to_owned(),
            field_type,
            row_storage: true,
            offset: self.row_length,
        });
        self.row_length = row_length;
        self.header.field_count += 1;
        Ok(())
    }

    /// Declare a field whose value is stored once in the schema.  With no
    /// value the field has no storage and decodes to the type's zero value.
    pub fn write_constant_field(
        &mut self,
        name:       &str,
        field_type: FieldType,
        value:      Option<&Value>,
    ) -> Result<(), TableError> {
        self.begin_field()?;
        let value = value.map(|v| strict(name, field_type, v)).transpose()?;

        let flags = FieldFlags::new(field_type, !name.is_empty(), value.is_some(), false);
        self.destination.write_u8(flags.0)?;
        if !name.is_empty() {
            self.write_string(name)?;
        }
        if let Some(value) = &value {
            self.encode_value(value)?;
        }

        self.fields.push(WrittenField {
            name: name.to_owned(),
            field_type,
            row_storage: false,
            offset: 0,
        });
        self.header.field_count += 1;
        Ok(())
    }

    /// Fix the start of the row section.
    pub fn end_fields(&mut self) -> Result<(), TableError> {
        self.expect_state(WriterState::FieldCollection, "end_fields")?;
        self.close_schema()?;
        self.state = WriterState::Idle;
        Ok(())
    }

    fn close_schema(&mut self) -> Result<(), TableError> {
        let rows_position = self.destination.stream_position()? - self.base;
        if rows_position - OFFSET_BIAS > u16::MAX as u64 {
            return Err(TableError::LayoutOverflow("row section offset"));
        }
        self.header.rows_position = rows_position;
        self.header.row_length = self.row_length as u16;
        Ok(())
    }

    // ── Rows ─────────────────────────────────────────────────────────────────

    /// Append a zero-filled row record and make it current.
    pub fn start_row(&mut self) -> Result<(), TableError> {
        if self.state == WriterState::FieldCollection {
            self.end_fields()?;
        }
        self.expect_state(WriterState::Idle, "start_row")?;
        self.header.row_count = self
            .header
            .row_count
            .checked_add(1)
            .ok_or(TableError::LayoutOverflow("row count"))?;

        self.destination.seek(SeekFrom::Start(self.row_start(self.header.row_count - 1)))?;
        self.destination.write_zeros(self.row_length as usize)?;
        self.state = WriterState::Row;
        Ok(())
    }

    fn row_start(&self, row: u32) -> u64 {
        self.base + self.header.rows_position + row as u64 * self.row_length
    }

    /// Seek to field `index` of the current row.  `false` for unknown
    /// indices and fields without per-row storage.
    fn seek_value(&mut self, index: usize, operation: &'static str) -> Result<bool, TableError> {
        self.expect_state(WriterState::Row, operation)?;
        let Some(field) = self.fields.get(index) else {
            return Ok(false);
        };
        if !field.row_storage {
            return Ok(false);
        }
        let position = self.row_start(self.header.row_count - 1) + field.offset;
        self.destination.seek(SeekFrom::Start(position))?;
        Ok(true)
    }

    /// Store `value` in field `index` of the current row.  Unknown indices
    /// and non-per-row fields are ignored; values that do not convert to
    /// the field type are a [`TableError::TypeMismatch`].
    pub fn write_value(&mut self, index: usize, value: &Value) -> Result<(), TableError> {
        if !self.seek_value(index, "write_value")? {
            return Ok(());
        }
        let field = &self.fields[index];
        let value = strict(&field.name, field.field_type, value)?;
        self.encode_value(&value)
    }

    pub fn write_value_by_name(&mut self, name: &str, value: &Value) -> Result<(), TableError> {
        match self.fields.iter().position(|f| f.name == name) {
            Some(index) => self.write_value(index, value),
            None => {
                self.expect_state(WriterState::Row, "write_value")?;
                Ok(())
            }
        }
    }

    /// Store a blob field's payload from a stream, copied at `end_table`.
    pub fn write_stream<S: ReadSeek + 'static>(&mut self, index: usize, stream: S) -> Result<(), TableError> {
        if !self.seek_blob(index, "write_stream")? {
            return Ok(());
        }
        let slot = self.data.put_stream(stream)?;
        self.write_slot(slot)
    }

    /// Store a blob field's payload from a file, opened at `end_table`.
    pub fn write_file<P: Into<PathBuf>>(&mut self, index: usize, path: P) -> Result<(), TableError> {
        if !self.seek_blob(index, "write_file")? {
            return Ok(());
        }
        let slot = self.data.put_file(path)?;
        self.write_slot(slot)
    }

    fn seek_blob(&mut self, index: usize, operation: &'static str) -> Result<bool, TableError> {
        if !self.seek_value(index, operation)? {
            return Ok(false);
        }
        let field = &self.fields[index];
        if field.field_type != FieldType::Blob {
            return Err(TableError::TypeMismatch {
                field:    field.name.clone(),
                expected: field.field_type,
                found:    FieldType::Blob,
            });
        }
        Ok(true)
    }

    pub fn end_row(&mut self) -> Result<(), TableError> {
        self.expect_state(WriterState::Row, "end_row")?;
        self.state = WriterState::Idle;
        Ok(())
    }

    /// Write one complete row.  Values pair with fields in order; `None`
    /// and values past the last field are skipped, leaving zeros.
    pub fn write_row<'v, I, V>(&mut self, values: I) -> Result<(), TableError>
    where
        I: IntoIterator<Item = V>,
        V: Into<Option<&'v Value>>,
    {
        self.start_row()?;
        let count = self.fields.len();
        for (index, value) in values.into_iter().take(count).enumerate() {
            if let Some(value) = value.into() {
                self.write_value(index, value)?;
            }
        }
        self.end_row()
    }

    // ── Finish ───────────────────────────────────────────────────────────────

    pub fn end_table(&mut self) -> Result<(), TableError> {
        self.end_table_with_progress(None)
    }

    /// Lay out both pools after the rows, backpatch the header and apply the
    /// mask.  `progress` follows the data pool flush.  The destination is
    /// left at the end of the container.
    pub fn end_table_with_progress(&mut self, progress: Option<&mut ProgressFn<'_>>) -> Result<(), TableError> {
        match self.state {
            WriterState::FieldCollection => self.end_fields()?,
            WriterState::Row => self.end_row()?,
            WriterState::Start => self.close_schema()?,
            WriterState::Idle => {}
            state => return Err(TableError::InvalidState { operation: "end_table", state }),
        }
        let align = self.settings.effective_align();

        self.destination.seek(SeekFrom::Start(self.row_start(self.header.row_count)))?;
        let strings_at = self.strings.write(&mut self.destination)?;
        self.header.string_pool_position = strings_at - self.base;

        self.destination.pad_to(align)?;
        let data_at = self.data.write(&mut self.destination, progress)?;
        self.header.data_pool_position = data_at - self.base;
        if data_at + self.data.len() - self.base > u32::MAX as u64 {
            return Err(TableError::LayoutOverflow("data pool"));
        }

        let end = self.destination.pad_to(align)?;
        self.header.length = end - self.base;
        self.header.encoding = self.settings.encoding.selector();

        self.destination.seek(SeekFrom::Start(self.base))?;
        self.header.write(&mut self.destination)?;

        if let Some(key) = self.settings.mask {
            mask_in_place(&mut self.destination, self.base, self.header.length, key)?;
        }
        self.destination.seek(SeekFrom::Start(end))?;
        self.state = WriterState::End;

        debug!(
            table   = %self.table_name,
            length  = self.header.length,
            fields  = self.header.field_count,
            rows    = self.header.row_count,
            strings = self.strings.len(),
            data    = self.data.len(),
            masked  = self.settings.mask.is_some(),
            "table written"
        );
        Ok(())
    }

    // ── Encoding ─────────────────────────────────────────────────────────────

    /// Write `value` inline at the current position.
    fn encode_value(&mut self, value: &Value) -> Result<(), TableError> {
        let d = &mut self.destination;
        match value {
            Value::U8(v)     => d.write_u8(*v)?,
            Value::I8(v)     => d.write_i8(*v)?,
            Value::U16(v)    => d.write_u16::<BigEndian>(*v)?,
            Value::I16(v)    => d.write_i16::<BigEndian>(*v)?,
            Value::U32(v)    => d.write_u32::<BigEndian>(*v)?,
            Value::I32(v)    => d.write_i32::<BigEndian>(*v)?,
            Value::U64(v)    => d.write_u64::<BigEndian>(*v)?,
            Value::I64(v)    => d.write_i64::<BigEndian>(*v)?,
            Value::F32(v)    => d.write_f32::<BigEndian>(*v)?,
            Value::F64(v)    => d.write_f64::<BigEndian>(*v)?,
            Value::Guid(g)   => d.write_all(&g.to_bytes_le())?,
            Value::String(s) => self.write_string(s)?,
            Value::Blob(b)   => {
                let slot = self.data.put_bytes(b.clone());
                self.write_slot(slot)?;
            }
        }
        Ok(())
    }

    fn write_slot(&mut self, slot: PoolSlot) -> Result<(), TableError> {
        let offset = u32::try_from(slot.offset).map_err(|_| TableError::LayoutOverflow("data pool"))?;
        let length = u32::try_from(slot.length).map_err(|_| TableError::LayoutOverflow("blob length"))?;
        self.destination.write_u32::<BigEndian>(offset)?;
        self.destination.write_u32::<BigEndian>(length)?;
        Ok(())
    }

    /// Write a string pool reference.  The pool never hands out offset 0
    /// for reuse: it decodes as empty when it holds the table name.
    fn write_string(&mut self, value: &str) -> Result<(), TableError> {
        let offset = if self.settings.remove_duplicate_strings {
            self.strings.put_or_reuse(value)?
        } else {
            self.strings.put(value)?
        };
        let offset = u32::try_from(offset).map_err(|_| TableError::LayoutOverflow("string pool"))?;
        self.destination.write_u32::<BigEndian>(offset)?;
        Ok(())
    }
}

fn strict(field: &str, field_type: FieldType, value: &Value) -> Result<Value, TableError> {
    value.convert(field_type).ok_or_else(|| TableError::TypeMismatch {
        field:    field.to_owned(),
        expected: field_type,
        found:    value.field_type(),
    })
}
