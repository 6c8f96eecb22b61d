//! Fixed 32-byte @UTF container header and per-field flag byte.
//!
//! # Layout (all integers big-endian)
//!
//! | Offset | Width | Field |
//! |---|---|---|
//! | 0  | 4 | signature `@UTF` |
//! | 4  | 4 | container length − 8 |
//! | 8  | 1 | reserved, must be 0 |
//! | 9  | 1 | encoding selector |
//! | 10 | 2 | row section offset − 8 |
//! | 12 | 4 | string pool offset − 8 |
//! | 16 | 4 | data pool offset − 8 |
//! | 20 | 4 | table name (string pool offset) |
//! | 24 | 2 | field count |
//! | 26 | 2 | row width in bytes |
//! | 28 | 4 | row count |
//!
//! Stored offsets are relative to the container base and exclude the
//! 8 bytes of signature + length; [`TableHeader`] holds them with the bias
//! already applied.

use std::io::{Read, Write};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use super::value::FieldType;
use super::TableError;
use crate::text::TextEncoding;

pub const SIGNATURE:   &[u8; 4] = b"@UTF";
pub const HEADER_SIZE: u64      = 32;
pub const OFFSET_BIAS: u64      = 8;

pub const FLAG_NAME:        u8 = 0x10;
pub const FLAG_DEFAULT:     u8 = 0x20;
pub const FLAG_ROW_STORAGE: u8 = 0x40;
pub const TYPE_MASK:        u8 = 0x0F;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableHeader {
    /// Full container length, signature included.
    pub length:               u64,
    pub reserved:             u8,
    pub encoding:             u8,
    pub rows_position:        u64,
    pub string_pool_position: u64,
    pub data_pool_position:   u64,
    pub table_name_position:  u32,
    pub field_count:          u16,
    pub row_length:           u16,
    pub row_count:            u32,
}

impl TableHeader {
    /// Read everything after the 4 signature bytes.  Rejects a non-zero
    /// reserved byte and unknown encoding selectors.
    pub fn read_after_signature<R: Read>(mut reader: R) -> Result<Self, TableError> {
        let length   = reader.read_u32::<BigEndian>()? as u64 + OFFSET_BIAS;
        let reserved = reader.read_u8()?;
        let encoding = reader.read_u8()?;
        if reserved != 0 {
            return Err(TableError::ReservedByte(reserved));
        }
        if TextEncoding::from_selector(encoding).is_none() {
            return Err(TableError::UnknownEncoding(encoding));
        }
        Ok(Self {
            length,
            reserved,
            encoding,
            rows_position:        reader.read_u16::<BigEndian>()? as u64 + OFFSET_BIAS,
            string_pool_position: reader.read_u32::<BigEndian>()? as u64 + OFFSET_BIAS,
            data_pool_position:   reader.read_u32::<BigEndian>()? as u64 + OFFSET_BIAS,
            table_name_position:  reader.read_u32::<BigEndian>()?,
            field_count:          reader.read_u16::<BigEndian>()?,
            row_length:           reader.read_u16::<BigEndian>()?,
            row_count:            reader.read_u32::<BigEndian>()?,
        })
    }

    pub fn text_encoding(&self) -> Option<TextEncoding> {
        TextEncoding::from_selector(self.encoding)
    }

    /// Write the full header, signature included.
    pub fn write<W: Write>(&self, mut writer: W) -> Result<(), TableError> {
        writer.write_all(SIGNATURE)?;
        writer.write_u32::<BigEndian>(unbias_u32(self.length, "container length")?)?;
        writer.write_u8(self.reserved)?;
        writer.write_u8(self.encoding)?;
        let rows = unbias_u32(self.rows_position, "row section offset")?;
        let rows = u16::try_from(rows).map_err(|_| TableError::LayoutOverflow("row section offset"))?;
        writer.write_u16::<BigEndian>(rows)?;
        writer.write_u32::<BigEndian>(unbias_u32(self.string_pool_position, "string pool offset")?)?;
        writer.write_u32::<BigEndian>(unbias_u32(self.data_pool_position, "data pool offset")?)?;
        writer.write_u32::<BigEndian>(self.table_name_position)?;
        writer.write_u16::<BigEndian>(self.field_count)?;
        writer.write_u16::<BigEndian>(self.row_length)?;
        writer.write_u32::<BigEndian>(self.row_count)?;
        Ok(())
    }
}

fn unbias_u32(value: u64, what: &'static str) -> Result<u32, TableError> {
    value
        .checked_sub(OFFSET_BIAS)
        .and_then(|v| u32::try_from(v).ok())
        .ok_or(TableError::LayoutOverflow(what))
}

/// The flag byte preceding every field definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldFlags(pub u8);

impl FieldFlags {
    pub fn new(field_type: FieldType, has_name: bool, has_default: bool, row_storage: bool) -> Self {
        let mut bits = field_type.tag();
        if has_name    { bits |= FLAG_NAME; }
        if has_default { bits |= FLAG_DEFAULT; }
        if row_storage { bits |= FLAG_ROW_STORAGE; }
        FieldFlags(bits)
    }

    pub fn has_name(self) -> bool { self.0 & FLAG_NAME != 0 }

    pub fn has_default(self) -> bool { self.0 & FLAG_DEFAULT != 0 }

    pub fn row_storage(self) -> bool { self.0 & FLAG_ROW_STORAGE != 0 }

    pub fn field_type(self) -> Option<FieldType> {
        FieldType::from_tag(self.0 & TYPE_MASK)
    }
}
