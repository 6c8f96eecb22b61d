use std::collections::HashMap;
use std::io::{self, Seek, Write};

use thiserror::Error;

use crate::io_stream::CursorWrite;
use crate::text::TextEncoding;

/// Placeholder some producers store instead of an empty string.  Decodes
/// to `""`.
pub const BLANK_STRING: &str = "<NULL>";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("string {text:?} cannot be encoded as {encoding}")]
pub struct UnencodableText {
    pub text:     String,
    pub encoding: &'static str,
}

#[derive(Debug)]
struct StringItem {
    bytes: Vec<u8>,
}

/// NUL-terminated strings, laid out in insertion order.
///
/// The empty string is never stored: `put("")` returns offset 0, which the
/// writer arranges to decode as empty.  For the same reason offset 0 is
/// never offered for reuse; lookups see the first copy stored after it.
#[derive(Debug)]
pub struct StringPool {
    encoding: TextEncoding,
    items:    Vec<StringItem>,
    first:    HashMap<String, u64>,
    length:   u64,
    position: u64,
}

impl StringPool {
    pub fn new(encoding: TextEncoding) -> Self {
        Self {
            encoding,
            items:    Vec::new(),
            first:    HashMap::new(),
            length:   0,
            position: 0,
        }
    }

    pub fn encoding(&self) -> TextEncoding { self.encoding }

    /// Total encoded size including terminators.
    pub fn len(&self) -> u64 { self.length }

    pub fn is_empty(&self) -> bool { self.items.is_empty() }

    /// Absolute stream offset of the last `write`.
    pub fn position(&self) -> u64 { self.position }

    /// Append `value` and return its pool-relative offset.
    pub fn put(&mut self, value: &str) -> Result<u64, UnencodableText> {
        if value.is_empty() {
            return Ok(0);
        }
        let bytes = self.encoding.encode(value).ok_or_else(|| UnencodableText {
            text:     value.to_owned(),
            encoding: self.encoding.name(),
        })?;
        let position = self.length;
        self.length += bytes.len() as u64 + 1;
        if position != 0 {
            self.first.entry(value.to_owned()).or_insert(position);
        }
        self.items.push(StringItem { bytes });
        Ok(position)
    }

    /// Append a bare terminator so the current offset decodes to `""`.
    pub fn reserve_empty(&mut self) -> u64 {
        let position = self.length;
        self.length += 1;
        self.items.push(StringItem { bytes: Vec::new() });
        position
    }

    pub fn contains(&self, value: &str) -> bool {
        self.first.contains_key(value)
    }

    /// Offset of the first reusable occurrence of `value`.
    pub fn position_of(&self, value: &str) -> Option<u64> {
        self.first.get(value).copied()
    }

    /// Offset of an existing copy of `value` when present, else a new entry.
    pub fn put_or_reuse(&mut self, value: &str) -> Result<u64, UnencodableText> {
        match self.position_of(value) {
            Some(pos) => Ok(pos),
            None      => self.put(value),
        }
    }

    /// Materialise every string at the destination's current position.
    pub fn write<W: Write + Seek + ?Sized>(&mut self, destination: &mut W) -> io::Result<u64> {
        self.position = destination.stream_position()?;
        for item in &self.items {
            destination.write_cstring_bytes(&item.bytes)?;
        }
        Ok(self.position)
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.first.clear();
        self.length = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn offsets_follow_encoded_lengths() {
        let mut pool = StringPool::new(TextEncoding::Utf8);
        assert_eq!(pool.put("<NULL>").unwrap(), 0);
        assert_eq!(pool.put("Cue").unwrap(), 7);
        assert_eq!(pool.put("").unwrap(), 0);
        assert_eq!(pool.put("Cue").unwrap(), 11);
        assert_eq!(pool.len(), 15);

        let mut out = Cursor::new(Vec::new());
        out.write_all(b"xx").unwrap();
        assert_eq!(pool.write(&mut out).unwrap(), 2);
        assert_eq!(&out.get_ref()[2..], b"<NULL>\0Cue\0Cue\0");
    }

    #[test]
    fn duplicate_lookup_skips_offset_zero() {
        let mut pool = StringPool::new(TextEncoding::ShiftJis);
        assert_eq!(pool.put("a").unwrap(), 0);
        assert!(!pool.contains("a"));
        assert_eq!(pool.put("b").unwrap(), 2);
        assert_eq!(pool.put("a").unwrap(), 4);
        assert_eq!(pool.put("a").unwrap(), 6);
        assert!(pool.contains("a"));
        assert!(!pool.contains("c"));
        assert_eq!(pool.position_of("a"), Some(4));
        assert_eq!(pool.put_or_reuse("a").unwrap(), 4);
        assert_eq!(pool.put_or_reuse("b").unwrap(), 2);
        assert_eq!(pool.put_or_reuse("c").unwrap(), 8);
        assert_eq!(pool.len(), 10);
    }

    #[test]
    fn shift_jis_lengths_are_byte_lengths() {
        let mut pool = StringPool::new(TextEncoding::ShiftJis);
        pool.put("音").unwrap();
        assert_eq!(pool.put("x").unwrap(), 3);
    }

    #[test]
    fn unencodable_text_is_reported() {
        let mut pool = StringPool::new(TextEncoding::ShiftJis);
        let err = pool.put("\u{1F600}").unwrap_err();
        assert_eq!(err.encoding, "shift-jis");
        assert!(pool.is_empty());
    }

    #[test]
    fn reserve_empty_occupies_one_byte() {
        let mut pool = StringPool::new(TextEncoding::Utf8);
        assert_eq!(pool.reserve_empty(), 0);
        assert_eq!(pool.put("t").unwrap(), 1);
        let mut out = Cursor::new(Vec::new());
        pool.write(&mut out).unwrap();
        assert_eq!(out.get_ref(), b"\0t\0");
    }
}
