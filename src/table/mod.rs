//! @UTF tables: the in-memory model and its codec.
//!
//! [`Table`] owns an ordered schema and ordered rows.  [`TableReader`] and
//! [`TableWriter`] are the streaming codec underneath; `Table::read` and
//! `Table::write` drive them for whole tables.

pub mod document;
pub mod field;
pub mod header;
pub mod mask;
pub mod reader;
pub mod row;
pub mod value;
pub mod writer;

pub use document::{FieldDocument, TableDocument};
pub use field::{Field, StorageMode};
pub use header::TableHeader;
pub use mask::MaskKey;
pub use reader::{TableReader, TableSource};
pub use row::Row;
pub use value::{FieldType, NativeValue, Value};
pub use writer::{TableWriter, WriterSettings, WriterState};

use std::io::{self, Read, Seek, Write};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::pool::UnencodableText;
use crate::progress::ProgressFn;

// ── Error type ───────────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum TableError {
    #[error("Invalid table signature {found:02x?}: not @UTF and no mask key matches")]
    InvalidSignature { found: [u8; 4] },
    #[error("Reserved header byte is {0:#04x}, expected 0")]
    ReservedByte(u8),
    #[error("Unknown text encoding selector {0}")]
    UnknownEncoding(u8),
    #[error("Unknown field type tag {0}")]
    UnknownFieldType(u8),
    /// Writer call made out of order.
    #[error("{operation} is not allowed in writer state '{state}'")]
    InvalidState { operation: &'static str, state: WriterState },
    #[error("Field '{field}' holds {expected}; a {found} value does not convert")]
    TypeMismatch { field: String, expected: FieldType, found: FieldType },
    #[error("Row has {found} values but the table has {expected} fields")]
    RowLength { expected: usize, found: usize },
    #[error("{0} exceeds the container format's limits")]
    LayoutOverflow(&'static str),
    #[error(transparent)]
    Text(#[from] UnencodableText),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// What [`Table`] does with a value that does not convert to its field's
/// type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConversionMode {
    /// Substitute the field default and log a warning.
    #[default]
    Lenient,
    /// Fail with [`TableError::TypeMismatch`].
    Strict,
}

// ── Table ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    name:     String,
    fields:   Vec<Field>,
    rows:     Vec<Row>,
    settings: WriterSettings,
    mode:     ConversionMode,
}

impl Default for Table {
    fn default() -> Self {
        Self::new("(no name)")
    }
}

impl Table {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name:     name.into(),
            fields:   Vec::new(),
            rows:     Vec::new(),
            settings: WriterSettings::default(),
            mode:     ConversionMode::default(),
        }
    }

    pub fn with_settings(mut self, settings: WriterSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn name(&self) -> &str { &self.name }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn settings(&self) -> &WriterSettings { &self.settings }

    pub fn settings_mut(&mut self) -> &mut WriterSettings { &mut self.settings }

    pub fn mode(&self) -> ConversionMode { self.mode }

    pub fn set_mode(&mut self, mode: ConversionMode) {
        self.mode = mode;
    }

    pub fn fields(&self) -> &[Field] { &self.fields }

    pub fn rows(&self) -> &[Row] { &self.rows }

    pub fn field(&self, index: usize) -> Option<&Field> { self.fields.get(index) }

    pub fn row(&self, index: usize) -> Option<&Row> { self.rows.get(index) }

    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name() == name)
    }

    // ── Schema ───────────────────────────────────────────────────────────────

    /// Append a field; existing rows receive its default.
    pub fn add_field(&mut self, field: Field) -> usize {
        let index = self.fields.len();
        self.insert_field(index, field)
    }

    /// Insert a field at `index` (appended when out of range); existing
    /// rows receive its default.  Returns the field's final index.
    pub fn insert_field(&mut self, index: usize, field: Field) -> usize {
        let index = index.min(self.fields.len());
        let default = field.effective_default();
        for row in &mut self.rows {
            row.insert(index, default.clone());
        }
        self.fields.insert(index, field);
        index
    }

    /// Remove a field and its value from every row.
    pub fn remove_field(&mut self, index: usize) -> Option<Field> {
        if index >= self.fields.len() {
            return None;
        }
        for row in &mut self.rows {
            row.remove(index);
        }
        Some(self.fields.remove(index))
    }

    pub fn clear(&mut self) {
        self.rows.clear();
        self.fields.clear();
    }

    // ── Rows ─────────────────────────────────────────────────────────────────

    /// A detached row holding every field's default.
    pub fn new_row(&self) -> Row {
        Row::from(self.fields.iter().map(Field::effective_default).collect::<Vec<_>>())
    }

    fn convert(&self, field: &Field, value: Value) -> Result<Value, TableError> {
        match self.mode {
            ConversionMode::Lenient => Ok(field.coerce(value)),
            ConversionMode::Strict  => field.try_coerce(value),
        }
    }

    /// Append a row after checking its arity and converting every value to
    /// its field's type.  Returns the row index.
    pub fn add_row(&mut self, row: impl Into<Row>) -> Result<usize, TableError> {
        let row = row.into();
        if row.len() != self.fields.len() {
            return Err(TableError::RowLength { expected: self.fields.len(), found: row.len() });
        }
        let values = row
            .into_values()
            .into_iter()
            .zip(&self.fields)
            .map(|(value, field)| self.convert(field, value))
            .collect::<Result<Vec<_>, _>>()?;
        self.rows.push(Row::from(values));
        Ok(self.rows.len() - 1)
    }

    pub fn remove_row(&mut self, index: usize) -> Option<Row> {
        (index < self.rows.len()).then(|| self.rows.remove(index))
    }

    pub fn value(&self, row: usize, field: usize) -> Option<&Value> {
        self.rows.get(row)?.get(field)
    }

    pub fn value_by_name(&self, row: usize, name: &str) -> Option<&Value> {
        self.value(row, self.field_index(name)?)
    }

    /// Assign a value using the table's [`ConversionMode`].  Returns
    /// `Ok(false)` when the row or field does not exist.
    pub fn set(&mut self, row: usize, field: usize, value: impl Into<Value>) -> Result<bool, TableError> {
        let Some(def) = self.fields.get(field) else {
            return Ok(false);
        };
        if row >= self.rows.len() {
            return Ok(false);
        }
        let value = self.convert(def, value.into())?;
        Ok(self.rows[row].set(field, value))
    }

    /// Assign a value, failing on any conversion error regardless of mode.
    pub fn try_set(&mut self, row: usize, field: usize, value: impl Into<Value>) -> Result<bool, TableError> {
        let Some(def) = self.fields.get(field) else {
            return Ok(false);
        };
        if row >= self.rows.len() {
            return Ok(false);
        }
        let value = def.try_coerce(value.into())?;
        Ok(self.rows[row].set(field, value))
    }

    // ── Codec ────────────────────────────────────────────────────────────────

    /// Decode a whole table from the source's current position.  The
    /// decoded encoding and mask key carry over into the write settings.
    pub fn read<R: Read + Seek>(source: R) -> Result<Self, TableError> {
        let mut reader = TableReader::new(source)?;
        let mut table = Table::new(reader.table_name());
        table.settings.encoding = reader.encoding();
        table.settings.mask = reader.mask_key();

        for index in 0..reader.field_count() {
            if let Some(field) = reader.field(index)? {
                table.fields.push(field);
            }
        }
        while reader.advance() {
            if let Some(values) = reader.values()? {
                table.rows.push(Row::from(values));
            }
        }
        Ok(table)
    }

    /// Storage each field gets on the next write.
    ///
    /// A field whose value is bit-identical in every row is written once
    /// as a constant.  With no rows, a field with a default becomes a constant
    /// and one without has no storage at all.
    pub fn storage_plan(&self) -> Vec<StorageMode> {
        (0..self.fields.len())
            .map(|index| match self.constant_value(index) {
                None => StorageMode::PerRow,
                Some(Some(_)) => StorageMode::Constant,
                Some(None) => StorageMode::Absent,
            })
            .collect()
    }

    /// `None` for per-row storage, `Some(value)` for a compacted field.
    fn constant_value(&self, index: usize) -> Option<Option<&Value>> {
        let Some((first, rest)) = self.rows.split_first() else {
            return Some(self.fields[index].default_value());
        };
        let value = first.get(index)?;
        rest.iter()
            .all(|row| row.get(index).is_some_and(|v| v.is_identical(value)))
            .then_some(Some(value))
    }

    pub fn write<W: Read + Write + Seek>(&self, destination: &mut W) -> Result<(), TableError> {
        self.write_with_progress(destination, None)
    }

    /// Encode the table at the destination's current position.
    /// `progress` follows the data pool flush.
    pub fn write_with_progress<W: Read + Write + Seek>(
        &self,
        destination: &mut W,
        progress:    Option<&mut ProgressFn<'_>>,
    ) -> Result<(), TableError> {
        let mut writer = TableWriter::new(destination, self.settings.clone());
        writer.start_table(&self.name)?;
        writer.start_fields()?;
        for (index, field) in self.fields.iter().enumerate() {
            match self.constant_value(index) {
                None => writer.write_field(field.name(), field.field_type())?,
                Some(value) => writer.write_constant_field(field.name(), field.field_type(), value)?,
            }
        }
        writer.end_fields()?;
        for row in &self.rows {
            writer.write_row(row)?;
        }
        writer.end_table_with_progress(progress)
    }

    // ── JSON ─────────────────────────────────────────────────────────────────

    pub fn to_json(&self) -> Result<String, TableError> {
        Ok(serde_json::to_string_pretty(&TableDocument::from_table(self))?)
    }

    pub fn from_json(json: &str) -> Result<Self, TableError> {
        let document: TableDocument = serde_json::from_str(json)?;
        document.into_table()
    }
}
