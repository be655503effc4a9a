//! Streaming reader for dBASE III attribute tables.
//!
//! The `dbase` reader bundled with `shapefile` decodes field names as ASCII
//! and parses `N` values into `f64`, so it rejects tables with GBK field
//! names and rounds long numbers. This reader keeps raw bytes instead: text
//! is decoded with the declared encoding when there is one and
//! byte-preserving otherwise, and numbers keep their source digits. Field
//! tags are classified with `dbase`'s [`FieldType`].

use std::io::{self, Read};

use camino::{Utf8Path, Utf8PathBuf};
use encoding_rs::Encoding;
use shapefile::dbase::FieldType;
use shpload_core::encoding::decode_byte_preserving;
use shpload_core::{AttributeValue, Attributes, DbfDate, FieldDefinition, FieldKind, SourceError};

const HEADER_LEN: usize = 32;
const DESCRIPTOR_LEN: usize = 32;
const DESCRIPTOR_TERMINATOR: u8 = 0x0D;
const END_OF_FILE: u8 = 0x1A;
const DELETED: u8 = b'*';

/// Position and type of one field inside a record.
#[derive(Debug, Clone, Copy, PartialEq)]
struct FieldLayout {
    field_type: Option<FieldType>,
    offset: usize,
    length: usize,
}

/// Parsed DBF header.
#[derive(Debug, Clone, PartialEq)]
pub struct DbfHeader {
    /// Declared number of records, deleted ones included.
    pub record_count: u32,
    /// Field definitions in declaration order.
    pub fields: Vec<FieldDefinition>,
    record_len: usize,
    layout: Vec<FieldLayout>,
}

fn malformed(path: &Utf8Path, message: impl Into<String>) -> SourceError {
    SourceError::Malformed {
        path: path.as_std_path().to_path_buf(),
        message: message.into(),
    }
}

fn io_error(path: &Utf8Path, source: io::Error) -> SourceError {
    SourceError::Io {
        path: path.as_std_path().to_path_buf(),
        source,
    }
}

fn le_u16(bytes: &[u8], at: usize) -> Option<u16> {
    let raw = bytes.get(at..at + 2)?;
    Some(u16::from_le_bytes([*raw.first()?, *raw.get(1)?]))
}

fn le_u32(bytes: &[u8], at: usize) -> Option<u32> {
    let raw: [u8; 4] = bytes.get(at..at + 4)?.try_into().ok()?;
    Some(u32::from_le_bytes(raw))
}

fn trim_padding(bytes: &[u8]) -> &[u8] {
    let is_pad = |b: &u8| *b == b' ' || *b == 0;
    let start = bytes.iter().position(|b| !is_pad(b)).unwrap_or(bytes.len());
    let end = bytes.iter().rposition(|b| !is_pad(b)).map_or(start, |i| i + 1);
    bytes.get(start..end).unwrap_or_default()
}

fn decode_text(bytes: &[u8], encoding: Option<&'static Encoding>) -> String {
    match encoding {
        Some(encoding) => encoding.decode_without_bom_handling(bytes).0.into_owned(),
        None => decode_byte_preserving(bytes),
    }
}

impl DbfHeader {
    /// Parse the fixed header and field descriptors.
    ///
    /// Field names are decoded with `name_encoding`.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Malformed`] for truncated or inconsistent
    /// headers and invalid field declarations.
    pub fn parse(
        bytes: &[u8],
        name_encoding: &'static Encoding,
        path: &Utf8Path,
    ) -> Result<Self, SourceError> {
        let truncated = || malformed(path, "truncated header");
        let record_count = le_u32(bytes, 4).ok_or_else(truncated)?;
        let header_len = usize::from(le_u16(bytes, 8).ok_or_else(truncated)?);
        let record_len = usize::from(le_u16(bytes, 10).ok_or_else(truncated)?);
        if header_len < HEADER_LEN + 1 || record_len == 0 {
            return Err(malformed(path, "invalid header or record length"));
        }

        let mut fields = Vec::new();
        let mut layout = Vec::new();
        let mut offset = 1;
        let mut at = HEADER_LEN;
        while at + DESCRIPTOR_LEN <= header_len {
            let descriptor = bytes.get(at..at + DESCRIPTOR_LEN).ok_or_else(truncated)?;
            if descriptor.first() == Some(&DESCRIPTOR_TERMINATOR) {
                break;
            }
            let raw_name = descriptor.get(..11).unwrap_or_default();
            let name_end = raw_name.iter().position(|b| *b == 0).unwrap_or(raw_name.len());
            let name = name_encoding
                .decode_without_bom_handling(raw_name.get(..name_end).unwrap_or_default())
                .0
                .trim()
                .to_owned();
            let tag = descriptor.get(11).copied().unwrap_or(b'C');
            let length = descriptor.get(16).copied().unwrap_or(0);
            let decimals = descriptor.get(17).copied().unwrap_or(0);

            let field = FieldDefinition::new(
                name,
                FieldKind::from_dbf_tag(tag),
                u16::from(length),
                u16::from(decimals),
            )?;
            fields.push(field);
            layout.push(FieldLayout {
                field_type: FieldType::from(char::from(tag.to_ascii_uppercase())),
                offset,
                length: usize::from(length),
            });
            offset += usize::from(length);
            at += DESCRIPTOR_LEN;
        }
        if offset > record_len {
            return Err(malformed(
                path,
                format!("fields span {offset} bytes but records hold {record_len}"),
            ));
        }
        Ok(Self {
            record_count,
            fields,
            record_len,
            layout,
        })
    }

    /// `dbase` type of each field in declaration order; `None` for tags it
    /// does not know.
    pub(crate) fn field_types(&self) -> Vec<Option<FieldType>> {
        self.layout.iter().map(|slot| slot.field_type).collect()
    }

    fn decode_record(&self, record: &[u8], encoding: Option<&'static Encoding>) -> Attributes {
        self.fields
            .iter()
            .zip(&self.layout)
            .map(|(field, slot)| {
                let raw = record
                    .get(slot.offset..slot.offset + slot.length)
                    .unwrap_or_default();
                (field.name(), decode_value(slot.field_type, raw, encoding))
            })
            .collect()
    }
}

fn decode_number(trimmed: &[u8]) -> AttributeValue {
    std::str::from_utf8(trimmed)
        .ok()
        .filter(|text| text.parse::<f64>().is_ok())
        .map_or(AttributeValue::Null, AttributeValue::number)
}

fn decode_binary<const N: usize>(
    raw: &[u8],
    render: impl Fn([u8; N]) -> String,
) -> AttributeValue {
    raw.get(..N)
        .and_then(|bytes| <[u8; N]>::try_from(bytes).ok())
        .map_or(AttributeValue::Null, |bytes| AttributeValue::Number(render(bytes)))
}

fn decode_value(
    field_type: Option<FieldType>,
    raw: &[u8],
    encoding: Option<&'static Encoding>,
) -> AttributeValue {
    let trimmed = trim_padding(raw);
    match field_type {
        Some(FieldType::Numeric | FieldType::Float) => decode_number(trimmed),
        Some(FieldType::Integer) => {
            decode_binary(raw, |b: [u8; 4]| i32::from_le_bytes(b).to_string())
        }
        Some(FieldType::Double) => {
            decode_binary(raw, |b: [u8; 8]| f64::from_le_bytes(b).to_string())
        }
        Some(FieldType::Date) => std::str::from_utf8(trimmed)
            .ok()
            .and_then(DbfDate::parse_yyyymmdd)
            .map_or(AttributeValue::Null, AttributeValue::Date),
        Some(FieldType::Logical) => match trimmed.first() {
            Some(b'T' | b't' | b'Y' | b'y') => AttributeValue::Boolean(true),
            Some(b'F' | b'f' | b'N' | b'n') => AttributeValue::Boolean(false),
            _ => AttributeValue::Null,
        },
        _ => AttributeValue::Text(decode_text(trimmed, encoding)),
    }
}

/// Record stream over a DBF file.
///
/// Yields `Ok(None)` for deleted records so callers can keep geometry
/// records aligned.
pub struct DbfReader<R> {
    reader: R,
    header: DbfHeader,
    encoding: Option<&'static Encoding>,
    path: Utf8PathBuf,
    remaining: u32,
    buffer: Vec<u8>,
}

impl<R: Read> DbfReader<R> {
    /// Read the header from `reader` and prepare to stream records.
    ///
    /// Field names are decoded with `encoding` when given and with
    /// `fallback_name_encoding` otherwise; text values are decoded with
    /// `encoding` or byte-preserving.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] when the header cannot be read or parsed.
    pub fn new(
        mut reader: R,
        encoding: Option<&'static Encoding>,
        fallback_name_encoding: &'static Encoding,
        path: &Utf8Path,
    ) -> Result<Self, SourceError> {
        let mut fixed = [0_u8; HEADER_LEN];
        reader
            .read_exact(&mut fixed)
            .map_err(|source| io_error(path, source))?;
        let header_len = usize::from(le_u16(&fixed, 8).unwrap_or(0));
        let mut bytes = fixed.to_vec();
        bytes.resize(header_len.max(HEADER_LEN), 0);
        if let Some(rest) = bytes.get_mut(HEADER_LEN..) {
            reader
                .read_exact(rest)
                .map_err(|source| io_error(path, source))?;
        }
        let header = DbfHeader::parse(
            &bytes,
            encoding.unwrap_or(fallback_name_encoding),
            path,
        )?;
        Ok(Self {
            reader,
            encoding,
            path: path.to_path_buf(),
            remaining: header.record_count,
            buffer: vec![0; header.record_len],
            header,
        })
    }

    /// Consume the reader, returning the header.
    pub fn into_header(self) -> DbfHeader {
        self.header
    }

    fn read_record(&mut self) -> Result<Option<Option<Attributes>>, SourceError> {
        if self.remaining == 0 {
            return Ok(None);
        }
        let mut flag = [0_u8; 1];
        match self.reader.read_exact(&mut flag) {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(err) => return Err(io_error(&self.path, err)),
        }
        let [flag] = flag;
        if flag == END_OF_FILE {
            self.remaining = 0;
            return Ok(None);
        }
        self.remaining -= 1;
        if let Some(body) = self.buffer.get_mut(1..) {
            self.reader
                .read_exact(body)
                .map_err(|source| io_error(&self.path, source))?;
        }
        if flag == DELETED {
            return Ok(Some(None));
        }
        Ok(Some(Some(
            self.header.decode_record(&self.buffer, self.encoding),
        )))
    }
}

impl<R: Read> Iterator for DbfReader<R> {
    type Item = Result<Option<Attributes>, SourceError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.read_record() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => None,
            Err(err) => {
                self.remaining = 0;
                Some(Err(err))
            }
        }
    }
}
