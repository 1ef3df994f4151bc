use arrayvec::ArrayVec;

use crate::columns::{FieldType, KeyPart};
use crate::config::DEFAULT_MAX_KEY_BYTES;
use crate::error::{CliError, CliResult};

/// Physical capacity of an `EncodedKey`. The default `maxKeyBytes` (256)
/// plus the trailing string sentinel. `RunConfig::max_key_bytes` is a
/// runtime-checked *soft* ceiling inside this fixed buffer — the buffer
/// itself is sized once, at compile time, like the teacher's own
/// `ArrayVec` usages (`moonblade::types::bound_arguments`), since a
/// per-run const generic isn't expressible without monomorphizing the
/// whole pipeline over it.
pub const ENCODED_KEY_CAPACITY: usize = DEFAULT_MAX_KEY_BYTES + 1;

pub type EncodedKey = ArrayVec<u8, ENCODED_KEY_CAPACITY>;

/// Raw material a `KeyPart` is encoded from: the record's own bytes for
/// offset/length based types, plus (for `CsvField`) the already-split CSV
/// fields, since those are addressed by index rather than byte range.
pub struct RecordView<'a> {
    pub raw: &'a [u8],
    pub csv_fields: Option<&'a [&'a [u8]]>,
}

impl<'a> RecordView<'a> {
    pub fn raw(raw: &'a [u8]) -> Self {
        RecordView {
            raw,
            csv_fields: None,
        }
    }

    pub fn csv(fields: &'a [&'a [u8]]) -> Self {
        RecordView {
            raw: fields.first().copied().unwrap_or(b""),
            csv_fields: Some(fields),
        }
    }
}

/// Deterministic, pure translation from typed `KeyPart` declarations to a
/// single byte-comparable `EncodedKey`, so the tournament's hot comparison
/// path is a raw `memcmp` (`EncodedKey`'s `Ord` impl, inherited from
/// `ArrayVec<u8, _>`, IS `memcmp` plus a length tie-break).
pub struct KeyCodec {
    parts: Vec<KeyPart>,
    max_key_bytes: usize,
}

impl KeyCodec {
    pub fn new(parts: Vec<KeyPart>, max_key_bytes: usize) -> Self {
        KeyCodec {
            parts,
            max_key_bytes,
        }
    }

    pub fn parts(&self) -> &[KeyPart] {
        &self.parts
    }

    pub fn encode(&self, view: &RecordView, record_number: u64) -> CliResult<EncodedKey> {
        let mut key = EncodedKey::new();

        for part in &self.parts {
            encode_part(part, view, record_number, &mut key)?;
        }

        if key.len() > self.max_key_bytes {
            return Err(CliError::input_at(
                format!(
                    "encoded key length {} exceeds configured maximum of {} bytes",
                    key.len(),
                    self.max_key_bytes
                ),
                record_number,
                "<key codec>",
            ));
        }

        Ok(key)
    }
}

fn encode_part(
    part: &KeyPart,
    view: &RecordView,
    record_number: u64,
    out: &mut EncodedKey,
) -> CliResult<()> {
    match &part.column.field_type {
        FieldType::String | FieldType::Byte => {
            let bytes = slice_of(view.raw, part.column.offset, part.column.length, record_number)?;
            encode_string_like(bytes, part.column.length, part.direction.is_descending(), out)
        }
        FieldType::CsvField => {
            let idx = part.column.csv_field_number.ok_or_else(|| {
                CliError::Config(format!(
                    "column '{}' is declared CsvField but has no field number",
                    part.column.name
                ))
            })? - 1;
            let fields = view.csv_fields.ok_or_else(|| {
                CliError::input_at(
                    "CsvField key used against a non-CSV input stage",
                    record_number,
                    "<key codec>",
                )
            })?;
            let bytes = fields.get(idx).copied().ok_or_else(|| {
                CliError::input_at(
                    format!("record has no CSV field at 1-relative index {}", idx + 1),
                    record_number,
                    "<key codec>",
                )
            })?;
            let pad_to = if part.column.length > 0 {
                part.column.length
            } else {
                bytes.len()
            };
            encode_string_like(bytes, pad_to, part.direction.is_descending(), out)
        }
        FieldType::Int(n) => {
            let bytes = slice_of(view.raw, part.column.offset, *n as usize, record_number)?;
            let v = read_be_signed(bytes)?;
            encode_signed(
                v,
                *n,
                part.direction.is_absolute(),
                part.direction.is_descending(),
                out,
            )
        }
        FieldType::UInt(n) => {
            let bytes = slice_of(view.raw, part.column.offset, *n as usize, record_number)?;
            let v = read_be_unsigned(bytes)?;
            encode_unsigned(v, *n, part.direction.is_descending(), out)
        }
        FieldType::Float => {
            let bytes = slice_of(view.raw, part.column.offset, 4, record_number)?;
            let f = f32::from_be_bytes(bytes.try_into().unwrap());
            encode_f32(f, part.direction.is_absolute(), part.direction.is_descending(), out)
        }
        FieldType::Double => {
            let bytes = slice_of(view.raw, part.column.offset, 8, record_number)?;
            let f = f64::from_be_bytes(bytes.try_into().unwrap());
            encode_f64(f, part.direction.is_absolute(), part.direction.is_descending(), out)
        }
        FieldType::Date(format) => {
            let bytes = slice_of(view.raw, part.column.offset, part.column.length, record_number)?;
            let text = std::str::from_utf8(bytes).map_err(|_| {
                CliError::input_at("date field is not valid utf-8", record_number, "<key codec>")
            })?;
            let millis = parse_date_to_epoch_millis(text, format, record_number)?;
            encode_signed(
                millis,
                8,
                part.direction.is_absolute(),
                part.direction.is_descending(),
                out,
            )
        }
    }
}

fn slice_of<'a>(
    raw: &'a [u8],
    offset: usize,
    length: usize,
    record_number: u64,
) -> CliResult<&'a [u8]> {
    if offset.checked_add(length).map_or(true, |end| end > raw.len()) {
        return Err(CliError::input_at(
            format!(
                "record too short for key field at offset {} length {} (record has {} bytes)",
                offset,
                length,
                raw.len()
            ),
            record_number,
            "<key codec>",
        ));
    }
    Ok(&raw[offset..offset + length])
}

fn encode_string_like(bytes: &[u8], pad_to: usize, descending: bool, out: &mut EncodedKey) -> CliResult<()> {
    let take = bytes.len().min(pad_to);

    for &b in &bytes[..take] {
        push(out, if descending { !b } else { b })?;
    }
    for _ in take..pad_to {
        push(out, if descending { !0u8 } else { 0u8 })?;
    }
    // 0x00 sentinel, itself flipped under DESC so it still sorts first
    // among bytes that follow (preserving the reversed order through the
    // terminator).
    push(out, if descending { !0u8 } else { 0u8 })?;

    Ok(())
}

fn read_be_signed(bytes: &[u8]) -> CliResult<i64> {
    let mut buf = [0u8; 8];
    let sign_extend = if bytes[0] & 0x80 != 0 { 0xffu8 } else { 0u8 };
    buf.fill(sign_extend);
    buf[8 - bytes.len()..].copy_from_slice(bytes);
    Ok(i64::from_be_bytes(buf))
}

fn read_be_unsigned(bytes: &[u8]) -> CliResult<u64> {
    let mut buf = [0u8; 8];
    buf[8 - bytes.len()..].copy_from_slice(bytes);
    Ok(u64::from_be_bytes(buf))
}

fn encode_signed(
    v: i64,
    width: u8,
    absolute: bool,
    descending: bool,
    out: &mut EncodedKey,
) -> CliResult<()> {
    let mut v = v as i128;
    if absolute {
        v = v.abs();
    }
    if descending {
        v = -v;
    }

    let bytes = (v as i64).to_be_bytes();
    let start = 8 - width as usize;
    for (i, &b) in bytes[start..].iter().enumerate() {
        let b = if i == 0 { b ^ 0x80 } else { b };
        push(out, b)?;
    }
    Ok(())
}

fn encode_unsigned(v: u64, width: u8, descending: bool, out: &mut EncodedKey) -> CliResult<()> {
    let bytes = v.to_be_bytes();
    let start = 8 - width as usize;
    for &b in &bytes[start..] {
        push(out, if descending { !b } else { b })?;
    }
    Ok(())
}

fn encode_f32(f: f32, absolute: bool, descending: bool, out: &mut EncodedKey) -> CliResult<()> {
    let mut f = f;
    if absolute {
        f = f.abs();
    }
    if descending {
        f = -f;
    }

    let bits = if f.is_nan() {
        u32::MAX
    } else {
        let bits = f.to_bits();
        if bits & 0x8000_0000 != 0 {
            !bits
        } else {
            bits | 0x8000_0000
        }
    };

    for b in bits.to_be_bytes() {
        push(out, b)?;
    }
    Ok(())
}

fn encode_f64(f: f64, absolute: bool, descending: bool, out: &mut EncodedKey) -> CliResult<()> {
    let mut f = f;
    if absolute {
        f = f.abs();
    }
    if descending {
        f = -f;
    }

    let bits = if f.is_nan() {
        u64::MAX
    } else {
        let bits = f.to_bits();
        if bits & 0x8000_0000_0000_0000 != 0 {
            !bits
        } else {
            bits | 0x8000_0000_0000_0000
        }
    };

    for b in bits.to_be_bytes() {
        push(out, b)?;
    }
    Ok(())
}

fn parse_date_to_epoch_millis(text: &str, format: &str, record_number: u64) -> CliResult<i64> {
    let tm = jiff::fmt::strtime::parse(format, text).map_err(|e| {
        CliError::input_at(
            format!("could not parse '{}' with format '{}': {}", text, format, e),
            record_number,
            "<key codec>",
        )
    })?;

    let timestamp = tm.to_timestamp().map_err(|e| {
        CliError::input_at(
            format!("date '{}' did not resolve to a timestamp: {}", text, e),
            record_number,
            "<key codec>",
        )
    })?;

    Ok(timestamp.as_millisecond())
}

fn push(out: &mut EncodedKey, byte: u8) -> CliResult<()> {
    out.try_push(byte)
        .map_err(|_| CliError::Internal("encoded key exceeded physical buffer capacity".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::columns::{ColumnDef, Direction};

    fn key_part(name: &str, field_type: FieldType, offset: usize, length: usize, dir: Direction) -> KeyPart {
        KeyPart::new(ColumnDef::new(name, field_type, offset, length).unwrap(), dir)
    }

    #[test]
    fn string_ascending_orders_lexicographically() {
        let codec = KeyCodec::new(
            vec![key_part("name", FieldType::String, 0, 6, Direction::Asc)],
            256,
        );
        let a = codec.encode(&RecordView::raw(b"apple "), 1).unwrap();
        let b = codec.encode(&RecordView::raw(b"banana"), 2).unwrap();
        assert!(a < b);
    }

    #[test]
    fn string_descending_reverses_order() {
        let codec = KeyCodec::new(
            vec![key_part("name", FieldType::String, 0, 6, Direction::Desc)],
            256,
        );
        let a = codec.encode(&RecordView::raw(b"apple "), 1).unwrap();
        let b = codec.encode(&RecordView::raw(b"banana"), 2).unwrap();
        assert!(a > b);
    }

    #[test]
    fn signed_int_descending_orders_by_spec_scenario_s2() {
        // S2: 0x00000001, 0xFFFFFFFF (-1), 0x00000000, DESC over a 4-byte
        // signed field. Expected output order: +1, 0, -1.
        let codec = KeyCodec::new(
            vec![key_part("v", FieldType::Int(4), 0, 4, Direction::Desc)],
            256,
        );
        let pos1 = codec.encode(&RecordView::raw(&1i32.to_be_bytes()), 1).unwrap();
        let neg1 = codec.encode(&RecordView::raw(&(-1i32).to_be_bytes()), 2).unwrap();
        let zero = codec.encode(&RecordView::raw(&0i32.to_be_bytes()), 3).unwrap();

        let mut rows = vec![("+1", pos1), ("-1", neg1), ("0", zero)];
        rows.sort_by(|a, b| a.1.cmp(&b.1));
        let order: Vec<&str> = rows.into_iter().map(|(label, _)| label).collect();
        assert_eq!(order, vec!["+1", "0", "-1"]);
    }

    #[test]
    fn signed_int_ascending_preserves_numeric_order_including_negatives() {
        let codec = KeyCodec::new(
            vec![key_part("v", FieldType::Int(4), 0, 4, Direction::Asc)],
            256,
        );
        let neg = codec.encode(&RecordView::raw(&(-5i32).to_be_bytes()), 1).unwrap();
        let zero = codec.encode(&RecordView::raw(&0i32.to_be_bytes()), 2).unwrap();
        let pos = codec.encode(&RecordView::raw(&5i32.to_be_bytes()), 3).unwrap();
        assert!(neg < zero);
        assert!(zero < pos);
    }

    #[test]
    fn unsigned_int_descending_uses_bitwise_not() {
        let codec = KeyCodec::new(
            vec![key_part("v", FieldType::UInt(2), 0, 2, Direction::Desc)],
            256,
        );
        let small = codec.encode(&RecordView::raw(&1u16.to_be_bytes()), 1).unwrap();
        let large = codec.encode(&RecordView::raw(&1000u16.to_be_bytes()), 2).unwrap();
        assert!(small > large);
    }

    #[test]
    fn float_total_order_matches_numeric_order() {
        let codec = KeyCodec::new(vec![key_part("f", FieldType::Float, 0, 4, Direction::Asc)], 256);
        let neg = codec.encode(&RecordView::raw(&(-1.5f32).to_be_bytes()), 1).unwrap();
        let zero = codec.encode(&RecordView::raw(&(0.0f32).to_be_bytes()), 2).unwrap();
        let pos = codec.encode(&RecordView::raw(&(1.5f32).to_be_bytes()), 3).unwrap();
        assert!(neg < zero);
        assert!(zero < pos);
    }

    #[test]
    fn nan_sorts_as_greatest_ascending() {
        let codec = KeyCodec::new(vec![key_part("f", FieldType::Double, 0, 8, Direction::Asc)], 256);
        let nan = codec.encode(&RecordView::raw(&f64::NAN.to_be_bytes()), 1).unwrap();
        let huge = codec.encode(&RecordView::raw(&f64::MAX.to_be_bytes()), 2).unwrap();
        assert!(nan > huge);
    }

    #[test]
    fn short_record_is_a_fatal_input_error() {
        let codec = KeyCodec::new(
            vec![key_part("v", FieldType::Int(4), 0, 4, Direction::Asc)],
            256,
        );
        assert!(codec.encode(&RecordView::raw(b"ab"), 1).is_err());
    }

    #[test]
    fn csv_field_key_reads_from_split_fields_not_raw_offset() {
        let codec = KeyCodec::new(
            vec![KeyPart::new(ColumnDef::csv("name", 1), Direction::Asc)],
            256,
        );
        let fields: Vec<&[u8]> = vec![b"c", b"a"];
        let a = codec.encode(&RecordView::csv(&fields), 1).unwrap();

        let fields2: Vec<&[u8]> = vec![b"a", b"a"];
        let b = codec.encode(&RecordView::csv(&fields2), 2).unwrap();

        assert!(b < a);
    }
}
