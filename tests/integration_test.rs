use proptest::prelude::*;
use std::fs;
use std::io::{Cursor, Read, Seek, SeekFrom, Write};
use std::sync::Arc;
use tempfile::{tempdir, NamedTempFile};
use utftable::archive::{Afs2Archive, ArchiveData};
use utftable::extract::{ExtractOptions, Extractor};
use utftable::pool::{DataPool, StringPool};
use utftable::table::{
    Field, FieldType, MaskKey, StorageMode, Table, TableError, TableReader, TableWriter, Value, WriterSettings,
    WriterState,
};
use utftable::{Container, SubStream, TextEncoding};
use uuid::Uuid;

// ── helpers ──────────────────────────────────────────────────────────────────

fn row_values(i: u64) -> Vec<Value> {
    vec![
        Value::U8(i as u8),
        Value::I8(-(i as i8)),
        Value::U16(1000 + i as u16),
        Value::I16(-1000 - i as i16),
        Value::U32(70_000 + i as u32),
        Value::I32(-70_000 - i as i32),
        Value::U64(u64::MAX - i),
        Value::I64(i64::MIN + i as i64),
        Value::F32(i as f32 * 0.5),
        Value::F64(-(i as f64) * 0.25),
        Value::String(format!("row{i}")),
        Value::Blob(vec![i as u8; i as usize + 1]),
        Value::Guid(Uuid::from_u128(0x1234_5678 + i as u128)),
    ]
}

fn all_types_table(rows: u64) -> Table {
    let mut table = Table::new("AllTypes");
    for ty in FieldType::ALL {
        table.add_field(Field::new(format!("f_{ty}"), ty));
    }
    for i in 0..rows {
        table.add_row(row_values(i)).unwrap();
    }
    table
}

fn encode(table: &Table) -> Vec<u8> {
    let mut out = Cursor::new(Vec::new());
    table.write(&mut out).unwrap();
    out.into_inner()
}

// ── table round trips ────────────────────────────────────────────────────────

#[test]
fn test_all_types_roundtrip() {
    for rows in [0u64, 1, 5] {
        let table = all_types_table(rows);
        let back = Table::read(Cursor::new(encode(&table))).unwrap();

        assert_eq!(back.name(), "AllTypes");
        assert_eq!(back.fields().len(), 13, "rows = {rows}");
        for (a, b) in table.fields().iter().zip(back.fields()) {
            assert_eq!((a.name(), a.field_type()), (b.name(), b.field_type()));
        }
        assert_eq!(back.rows(), table.rows(), "rows = {rows}");
    }
}

#[test]
fn test_row_cursor_and_typed_getters() {
    let bytes = encode(&all_types_table(5));
    let mut reader = TableReader::new(Cursor::new(bytes)).unwrap();

    assert_eq!(reader.row_count(), 5);
    assert_eq!(reader.current_row(), None);
    assert_eq!(reader.value(0).unwrap(), None);

    assert!(reader.seek_row(3));
    assert_eq!(reader.get::<u16>(2).unwrap(), Some(1003));
    assert_eq!(reader.get::<i64>(0).unwrap(), Some(3));
    assert_eq!(reader.get::<String>(10).unwrap(), Some("row3".to_owned()));
    assert_eq!(reader.value_by_name("f_blob").unwrap(), Some(Value::Blob(vec![3; 4])));
    assert!(matches!(reader.get::<u8>(10), Err(TableError::TypeMismatch { .. })));
    assert_eq!(reader.value(99).unwrap(), None);

    assert!(reader.advance());
    assert!(!reader.advance());
    assert_eq!(reader.current_row(), Some(4));
    assert!(!reader.seek_row(5));
}

#[test]
fn test_compaction_storage_modes() {
    let mut table = Table::new("Compact");
    table.add_field(Field::new("Same", FieldType::U32));
    table.add_field(Field::new("Differs", FieldType::U32));
    table.add_field(Field::new("Text", FieldType::String));
    for i in 0..4u32 {
        table.add_row(vec![Value::U32(7), Value::U32(i), Value::String("x".into())]).unwrap();
    }
    assert_eq!(
        table.storage_plan(),
        vec![StorageMode::Constant, StorageMode::PerRow, StorageMode::Constant]
    );

    let mut reader = TableReader::new(Cursor::new(encode(&table))).unwrap();
    assert_eq!(reader.storage(0), Some(StorageMode::Constant));
    assert_eq!(reader.storage(1), Some(StorageMode::PerRow));
    assert_eq!(reader.header().row_length, 4);
    assert!(reader.seek_row(2));
    assert_eq!(reader.values().unwrap().unwrap(), vec![Value::U32(7), Value::U32(2), Value::String("x".into())]);

    let mut empty = Table::new("Empty");
    empty.add_field(Field::with_default("Gain", FieldType::F32, 1.5f32));
    empty.add_field(Field::new("Plain", FieldType::U8));
    let mut reader = TableReader::new(Cursor::new(encode(&empty))).unwrap();
    assert_eq!(reader.row_count(), 0);
    assert_eq!(reader.storage(0), Some(StorageMode::Constant));
    assert_eq!(reader.storage(1), Some(StorageMode::Absent));
    assert_eq!(reader.field(0).unwrap().unwrap().default_value(), Some(&Value::F32(1.5)));
}

#[test]
fn test_masked_table_recovers_key() {
    let key = MaskKey::new(0x5F, 0x15);
    let table = all_types_table(3).with_settings(WriterSettings { mask: Some(key), ..WriterSettings::default() });
    let bytes = encode(&table);
    assert_ne!(&bytes[..4], b"@UTF");

    let reader = TableReader::new(Cursor::new(bytes.clone())).unwrap();
    assert_eq!(reader.mask_key(), Some(key));
    assert_eq!(reader.table_name(), "AllTypes");

    let back = Table::read(Cursor::new(bytes)).unwrap();
    assert_eq!(back.rows(), table.rows());
    assert_eq!(back.settings().mask, Some(key));
}

#[test]
fn test_unrecoverable_signature_is_rejected() {
    let mut bytes = encode(&all_types_table(1));
    bytes[0] = b'@' ^ 0x01;
    bytes[1] = b'U';
    bytes[2] = b'U';
    bytes[3] = b'U';
    assert!(matches!(
        TableReader::new(Cursor::new(bytes)),
        Err(TableError::InvalidSignature { .. })
    ));
}

#[test]
fn test_blank_string_normalization() {
    let mut table = Table::new("T");
    table.add_field(Field::new("S", FieldType::String));
    table.add_field(Field::new("N", FieldType::U8));
    for (i, s) in ["<NULL>", "", "T", "plain"].iter().enumerate() {
        table.add_row(vec![Value::String(s.to_string()), Value::U8(i as u8)]).unwrap();
    }
    let back = Table::read(Cursor::new(encode(&table))).unwrap();
    let strings: Vec<_> = back.rows().iter().map(|r| r.get(0).cloned()).collect();
    assert_eq!(
        strings,
        vec![
            Some(Value::String(String::new())),
            Some(Value::String(String::new())),
            Some(Value::String("T".into())),
            Some(Value::String("plain".into())),
        ]
    );
}

#[test]
fn test_offset_zero_table_name_decodes_as_blank() {
    let settings = WriterSettings { remove_duplicate_strings: true, ..WriterSettings::adx2() };
    let mut writer = TableWriter::new(Cursor::new(Vec::new()), settings);
    writer.start_table("Cue").unwrap();
    writer.write_field("S", FieldType::String).unwrap();
    writer.write_row([&Value::String("Cue".into())]).unwrap();
    writer.end_table().unwrap();
    let mut bytes = writer.into_inner().into_inner();

    let rows_position = TableReader::new(Cursor::new(bytes.clone())).unwrap().header().rows_position as usize;
    assert_ne!(&bytes[rows_position..rows_position + 4], &[0, 0, 0, 0]);

    let mut reader = TableReader::new(Cursor::new(bytes.clone())).unwrap();
    reader.advance();
    assert_eq!(reader.value(0).unwrap(), Some(Value::String("Cue".into())));

    // Point the row at the table name itself.
    bytes[rows_position..rows_position + 4].copy_from_slice(&[0, 0, 0, 0]);
    let mut reader = TableReader::new(Cursor::new(bytes)).unwrap();
    assert_eq!(reader.table_name(), "Cue");
    reader.advance();
    assert_eq!(reader.value(0).unwrap(), Some(Value::String(String::new())));
}

#[test]
fn test_utf8_encoding_roundtrip() {
    let mut table = Table::new("名前").with_settings(WriterSettings { encoding: TextEncoding::Utf8, ..Default::default() });
    table.add_field(Field::new("Text", FieldType::String));
    table.add_row(vec![Value::String("héllo ✓".into())]).unwrap();
    table.add_row(vec![Value::String("二".into())]).unwrap();

    let back = Table::read(Cursor::new(encode(&table))).unwrap();
    assert_eq!(back.name(), "名前");
    assert_eq!(back.settings().encoding, TextEncoding::Utf8);
    assert_eq!(back.value(0, 0), Some(&Value::String("héllo ✓".into())));
}

#[test]
fn test_shift_jis_rejects_unencodable_text() {
    let mut table = Table::new("T");
    table.add_field(Field::new("Text", FieldType::String));
    table.add_row(vec![Value::String("😀".into())]).unwrap();
    table.add_row(vec![Value::String("x".into())]).unwrap();
    let err = table.write(&mut Cursor::new(Vec::new())).unwrap_err();
    assert!(matches!(err, TableError::Text(_)));
}

// ── nested tables ────────────────────────────────────────────────────────────

fn nested_outer() -> (Vec<u8>, Vec<u8>) {
    let mut inner = Table::new("Inner");
    inner.add_field(Field::new("V", FieldType::U16));
    for v in [10u16, 20, 30] {
        inner.add_row(vec![Value::U16(v)]).unwrap();
    }
    let inner_bytes = inner.to_bytes().unwrap();

    let mut writer = TableWriter::new(Cursor::new(Vec::new()), WriterSettings::default());
    writer.start_table("Outer").unwrap();
    writer.write_field("Pad", FieldType::Blob).unwrap();
    writer.write_field("Inner", FieldType::Blob).unwrap();
    writer.write_row([&Value::Blob(vec![1, 2, 3]), &Value::Blob(inner_bytes.clone())]).unwrap();
    writer.end_table().unwrap();
    (writer.into_inner().into_inner(), inner_bytes)
}

#[test]
fn test_nested_table_in_blob() {
    let (outer, inner_bytes) = nested_outer();
    let mut reader = TableReader::new(Cursor::new(outer)).unwrap();
    assert!(reader.advance());
    assert_eq!(reader.blob_length(1).unwrap(), Some(inner_bytes.len() as u64));

    let mut view = reader.blob_view(1).unwrap().unwrap();
    let mut copied = Vec::new();
    view.read_to_end(&mut copied).unwrap();
    assert_eq!(copied, inner_bytes);

    let mut nested = reader.nested_reader(1).unwrap().unwrap();
    assert_eq!(nested.table_name(), "Inner");
    assert_eq!(nested.row_count(), 3);
    nested.seek_row(2);
    assert_eq!(nested.get::<u16>(0).unwrap(), Some(30));
}

#[test]
fn test_zero_length_nested_blob_uses_inner_header() {
    let (mut outer, inner_bytes) = nested_outer();
    let rows_position = TableReader::new(Cursor::new(outer.clone())).unwrap().header().rows_position as usize;

    // Second blob field: position at +8, length at +12.
    let length_at = rows_position + 12;
    assert_eq!(&outer[length_at..length_at + 4], &(inner_bytes.len() as u32).to_be_bytes());
    outer[length_at..length_at + 4].copy_from_slice(&[0, 0, 0, 0]);

    let mut reader = TableReader::new(Cursor::new(outer)).unwrap();
    reader.advance();
    assert_eq!(reader.blob_length(1).unwrap(), Some(inner_bytes.len() as u64));
    assert_eq!(reader.value(1).unwrap(), Some(Value::Blob(inner_bytes)));
    assert_eq!(reader.nested_reader(1).unwrap().unwrap().row_count(), 3);
}

// ── writer state machine ─────────────────────────────────────────────────────

#[test]
fn test_writer_state_errors() {
    let mut writer = TableWriter::new(Cursor::new(Vec::new()), WriterSettings::default());
    assert!(matches!(writer.start_row(), Err(TableError::InvalidState { state: WriterState::Begin, .. })));
    assert!(matches!(writer.end_table(), Err(TableError::InvalidState { .. })));

    writer.start_table("W").unwrap();
    assert!(matches!(writer.start_table("again"), Err(TableError::InvalidState { .. })));
    writer.write_field("A", FieldType::U8).unwrap();
    assert_eq!(writer.state(), WriterState::FieldCollection);
    writer.start_row().unwrap();
    assert!(matches!(writer.write_field("B", FieldType::U8), Err(TableError::InvalidState { .. })));
    writer.write_value(0, &Value::U8(1)).unwrap();
    writer.end_row().unwrap();
    writer.end_table().unwrap();
    assert_eq!(writer.state(), WriterState::End);
    assert!(matches!(writer.start_row(), Err(TableError::InvalidState { state: WriterState::End, .. })));
}

#[test]
fn test_writer_rejects_wrong_value_type() {
    let mut writer = TableWriter::new(Cursor::new(Vec::new()), WriterSettings::default());
    writer.start_table("W").unwrap();
    writer.write_field("A", FieldType::U8).unwrap();
    writer.start_row().unwrap();
    assert!(matches!(
        writer.write_value(0, &Value::String("nope".into())),
        Err(TableError::TypeMismatch { expected: FieldType::U8, .. })
    ));
}

// ── sub-range view ───────────────────────────────────────────────────────────

#[test]
fn test_substream_isolated_from_outer_stream() {
    let mut backing = Cursor::new((0u8..64).collect::<Vec<u8>>());
    backing.seek(SeekFrom::Start(5)).unwrap();

    let mut view = SubStream::new(&mut backing, 16, 8);
    let mut buf = Vec::new();
    view.read_to_end(&mut buf).unwrap();
    assert_eq!(buf, (16u8..24).collect::<Vec<_>>());

    view.seek(SeekFrom::Start(6)).unwrap();
    let mut two = [0u8; 4];
    assert_eq!(view.read(&mut two).unwrap(), 2);
    view.seek(SeekFrom::Start(0)).unwrap();
    view.write_all(&[0xEE; 20]).unwrap();

    let data = backing.get_ref();
    assert_eq!(&data[15..25], &[15, 0xEE, 0xEE, 0xEE, 0xEE, 0xEE, 0xEE, 0xEE, 0xEE, 24]);
}

#[test]
fn test_table_inside_archive_entry() {
    let mut table = all_types_table(2);
    let mut archive = Afs2Archive::new();
    archive.push(0, ArchiveData::Bytes(vec![0xAA; 7]));
    archive.push(1, ArchiveData::Bytes(table.to_bytes().unwrap()));

    let mut cur = Cursor::new(archive.to_bytes().unwrap());
    let back = Afs2Archive::read_from(&mut cur).unwrap();
    let Some(ArchiveData::Stored { position, length }) = back.entry_by_id(1).map(|e| e.data.clone()) else {
        panic!("entry 1 missing");
    };

    let mut reader = TableReader::new(SubStream::new(&mut cur, position, length)).unwrap();
    assert_eq!(reader.table_name(), "AllTypes");
    assert!(reader.seek_row(1));
    assert_eq!(reader.get::<String>(10).unwrap(), Some("row1".into()));
}

// ── archives ─────────────────────────────────────────────────────────────────

#[test]
fn test_archive_id_width_promotion() {
    let mut ar: Afs2Archive = Afs2Archive::new();
    for id in 0..65_535u32 {
        ar.push(id, ArchiveData::Bytes(Vec::new()));
    }
    assert_eq!(ar.layout().unwrap().id_width, 2);

    ar.push(65_535, ArchiveData::Bytes(vec![9]));
    let layout = ar.layout().unwrap();
    assert_eq!((layout.id_width, layout.position_width), (4, 4));

    let bytes = ar.to_bytes().unwrap();
    assert_eq!((bytes[5], bytes[6]), (4, 4));
    assert_eq!(ar.header().len() as u64, layout.header_length);

    let mut cur = Cursor::new(bytes);
    let back = Afs2Archive::read_from(&mut cur).unwrap();
    assert_eq!(back.len(), 65_536);
    assert_eq!(back.read_entry(65_535, &mut cur).unwrap(), vec![9]);
    assert_eq!(back.read_entry(1234, &mut cur).unwrap(), Vec::<u8>::new());
}

#[test]
fn test_archive_positions_are_archive_relative() {
    let mut ar = Afs2Archive::new();
    ar.set_align(16);
    ar.push(1, ArchiveData::Bytes(vec![1; 20]));
    ar.push(2, ArchiveData::Bytes(vec![2; 3]));
    let bytes = ar.to_bytes().unwrap();

    // header: 16 + 2*2 + 2*3 = 26; entry 1 at 26 (aligned 32), entry 2 at 52 (aligned 64)
    let positions: Vec<u16> = (0..3)
        .map(|i| u16::from_le_bytes([bytes[20 + 2 * i], bytes[21 + 2 * i]]))
        .collect();
    assert_eq!(positions, vec![26, 52, 67]);
    assert_eq!(bytes.len(), 67);
    assert_eq!(&bytes[32..52], &[1; 20]);
    assert_eq!(&bytes[64..67], &[2; 3]);
}

#[test]
fn test_archive_file_entries_and_extraction() {
    let dir = tempdir().unwrap();
    let payload = dir.path().join("payload.bin");
    fs::write(&payload, b"from a file").unwrap();

    let mut ar = Afs2Archive::new();
    ar.push(4, ArchiveData::File(payload));
    ar.push(2, ArchiveData::Bytes(b"in memory".to_vec()));
    let archive_path = dir.path().join("sound.awb");
    ar.save_path(&archive_path).unwrap();

    let back: Afs2Archive = Afs2Archive::load_path(&archive_path).unwrap();
    let mut extractor = Extractor::new(ExtractOptions::default());
    for entry in back.entries() {
        if let ArchiveData::Stored { position, length } = entry.data {
            extractor.add_from_path(&archive_path, dir.path().join(format!("out/{}.bin", entry.id)), position, length);
        }
    }
    let report = extractor.run(None);
    assert!(report.is_success());
    assert_eq!(report.completed, 2);
    assert_eq!(fs::read(dir.path().join("out/4.bin")).unwrap(), b"from a file");
    assert_eq!(fs::read(dir.path().join("out/2.bin")).unwrap(), b"in memory");
}

#[test]
fn test_extraction_from_shared_buffer() {
    let dir = tempdir().unwrap();
    let data: Arc<[u8]> = (0u8..100).collect::<Vec<_>>().into();
    let mut extractor = Extractor::new(ExtractOptions { max_threads: 2, buffer_size: 7, parallel: true });
    for i in 0..10u64 {
        extractor.add_from_bytes(data.clone(), dir.path().join(format!("{i}.bin")), i * 10, 10);
    }
    let mut calls = 0;
    let report = extractor.run(Some(&mut |_| calls += 1));
    assert_eq!(report.completed, 10);
    assert_eq!(report.bytes, 100);
    assert_eq!(calls, 10);
    assert_eq!(fs::read(dir.path().join("9.bin")).unwrap(), (90u8..100).collect::<Vec<_>>());
}

// ── files ────────────────────────────────────────────────────────────────────

#[test]
fn test_table_file_roundtrip_with_file_blob() {
    let mut blob_file = NamedTempFile::new().unwrap();
    blob_file.write_all(&[0x42; 300]).unwrap();
    blob_file.flush().unwrap();

    let out = NamedTempFile::new().unwrap();
    {
        let file = fs::OpenOptions::new().read(true).write(true).open(out.path()).unwrap();
        let mut writer = TableWriter::new(file, WriterSettings::adx());
        writer.start_table("Files").unwrap();
        writer.write_field("Id", FieldType::U32).unwrap();
        writer.write_field("Data", FieldType::Blob).unwrap();
        writer.start_row().unwrap();
        writer.write_value(0, &Value::U32(1)).unwrap();
        writer.write_file(1, blob_file.path()).unwrap();
        writer.end_row().unwrap();
        writer.start_row().unwrap();
        writer.write_value(0, &Value::U32(2)).unwrap();
        writer.write_stream(1, Cursor::new(vec![7u8; 5])).unwrap();
        writer.end_row().unwrap();
        writer.end_table().unwrap();
    }

    let mut reader = TableReader::open(out.path()).unwrap();
    reader.advance();
    assert_eq!(reader.value(1).unwrap(), Some(Value::Blob(vec![0x42; 300])));
    let position = reader.blob_position(1).unwrap().unwrap();
    assert_eq!(position % 8, 0);
    reader.advance();
    assert_eq!(reader.value(1).unwrap(), Some(Value::Blob(vec![7; 5])));
}

#[test]
fn test_json_build_matches_direct_write() {
    let json = r#"{
        "name": "Cue",
        "settings": { "align": 32, "put_blank_string": false, "remove_duplicate_strings": false },
        "fields": [
            { "name": "CueId", "type": "u32" },
            { "name": "Volume", "type": "f32", "default": 1.0 }
        ],
        "rows": [ [0, 1.0], [1, 0.5] ]
    }"#;
    let mut table = Table::from_json(json).unwrap();
    let dir = tempdir().unwrap();
    let path = dir.path().join("cue.utf");
    table.save_path(&path).unwrap();

    let back = Table::load_path(&path).unwrap();
    assert_eq!(back.rows(), table.rows());
    assert_eq!(fs::metadata(&path).unwrap().len() % 32, 0);
}

// ── pools ────────────────────────────────────────────────────────────────────

#[test]
fn test_pool_offsets_are_assigned_at_put() {
    let mut strings = StringPool::new(TextEncoding::Utf8);
    assert_eq!(strings.put("ab").unwrap(), 0);
    assert_eq!(strings.put("").unwrap(), 0);
    assert_eq!(strings.put("c").unwrap(), 3);
    assert_eq!(strings.len(), 5);

    let mut data = DataPool::new(8);
    assert_eq!(data.put_bytes(vec![1; 3]).offset, 0);
    assert_eq!(data.put_bytes(Vec::new()).length, 0);
    assert_eq!(data.put_bytes(vec![2; 5]).offset, 8);
    assert_eq!(data.len(), 13);

    let mut out = Cursor::new(vec![0xFF; 3]);
    out.set_position(3);
    data.write(&mut out, None).unwrap();
    let bytes = out.into_inner();
    assert_eq!(&bytes[8..11], &[1; 3]);
    assert_eq!(&bytes[16..21], &[2; 5]);
}

// ── properties ───────────────────────────────────────────────────────────────

fn arb_row() -> impl Strategy<Value = Vec<Value>> {
    (any::<u32>(), any::<i16>(), -1e6f32..1e6f32, "[a-zA-Z0-9 ]{0,12}", prop::collection::vec(any::<u8>(), 0..24))
        .prop_map(|(a, b, c, s, blob)| {
            vec![Value::U32(a), Value::I16(b), Value::F32(c), Value::String(s), Value::Blob(blob)]
        })
}

proptest! {
    #[test]
    fn prop_table_roundtrip(rows in prop::collection::vec(arb_row(), 0..12), align in 1u32..40, dedup: bool) {
        let settings = WriterSettings { align, remove_duplicate_strings: dedup, ..WriterSettings::default() };
        let mut table = Table::new("Prop").with_settings(settings);
        table.add_field(Field::new("A", FieldType::U32));
        table.add_field(Field::new("B", FieldType::I16));
        table.add_field(Field::new("C", FieldType::F32));
        table.add_field(Field::new("S", FieldType::String));
        table.add_field(Field::new("D", FieldType::Blob));
        for row in rows {
            table.add_row(row).unwrap();
        }
        let bytes = encode(&table);
        prop_assert_eq!(bytes.len() as u64 % align as u64, 0);

        let back = Table::read(Cursor::new(bytes)).unwrap();
        prop_assert_eq!(back.rows(), table.rows());
    }

    #[test]
    fn prop_mask_is_an_involution(data in prop::collection::vec(any::<u8>(), 0..256), xor: u8, mul: u8) {
        let key = MaskKey::new(xor, mul);
        let mut masked = data.clone();
        key.apply(&mut masked);
        key.apply(&mut masked);
        prop_assert_eq!(masked, data);
    }

    #[test]
    fn prop_mask_key_recovered_from_signature(xor in any::<u8>().prop_map(|x| x | 1), mul: u8) {
        let key = MaskKey::new(xor, mul);
        let mut sig = *b"@UTF";
        key.apply(&mut sig);
        let found = MaskKey::recover(&sig, b"@UTF").unwrap();
        let mut check = sig;
        found.apply(&mut check);
        prop_assert_eq!(&check, b"@UTF");
    }

    #[test]
    fn prop_data_pool_offsets_aligned(lengths in prop::collection::vec(0usize..100, 0..20), align in 1u64..64) {
        let mut pool = DataPool::new(align);
        let mut end = 0u64;
        for len in lengths {
            let slot = pool.put_bytes(vec![0xAB; len]);
            if len == 0 {
                prop_assert_eq!(slot.offset, 0);
                continue;
            }
            prop_assert_eq!(slot.offset % align, 0);
            prop_assert!(slot.offset >= end);
            end = slot.offset + slot.length;
        }
        prop_assert_eq!(pool.len(), end);
    }
}
