//! Save-state stream format.
//!
//! A stream is a short header followed by named field records. Names make
//! the format self-describing: a loader ignores fields it does not know and
//! fills fields the stream lacks with power-on defaults, so streams written
//! by older or newer revisions of a chip stay loadable. Derived data (the
//! space table) is never written; loading always ends in a re-sync.
//!
//! Record layout, all little-endian:
//! `name_len: u8, name: [u8], kind: u8, payload` where scalar kinds carry
//! their fixed-width value and byte-array fields carry `len: u32, bytes`.

use std::collections::HashMap;

use crate::error::CorruptStateError;

const MAGIC: &[u8; 4] = b"CBST";
const FORMAT_VERSION: u8 = 1;

const KIND_U8: u8 = 0x01;
const KIND_U16: u8 = 0x02;
const KIND_U32: u8 = 0x03;
const KIND_BYTES: u8 = 0x10;

/// Serializes named fields into a fresh stream.
#[derive(Debug)]
pub struct StateWriter {
    buf: Vec<u8>,
}

impl StateWriter {
    pub fn new() -> Self {
        let mut buf = Vec::with_capacity(64);
        buf.extend_from_slice(MAGIC);
        buf.push(FORMAT_VERSION);
        Self { buf }
    }

    fn put_name(&mut self, name: &str) {
        debug_assert!(name.len() <= u8::MAX as usize);
        self.buf.push(name.len() as u8);
        self.buf.extend_from_slice(name.as_bytes());
    }

    pub fn put_u8(&mut self, name: &str, value: u8) {
        self.put_name(name);
        self.buf.push(KIND_U8);
        self.buf.push(value);
    }

    pub fn put_u16(&mut self, name: &str, value: u16) {
        self.put_name(name);
        self.buf.push(KIND_U16);
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn put_u32(&mut self, name: &str, value: u32) {
        self.put_name(name);
        self.buf.push(KIND_U32);
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn put_bytes(&mut self, name: &str, bytes: &[u8]) {
        self.put_name(name);
        self.buf.push(KIND_BYTES);
        self.buf.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
        self.buf.extend_from_slice(bytes);
    }

    pub fn finish(self) -> Vec<u8> {
        self.buf
    }
}

impl Default for StateWriter {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
enum Field {
    Scalar { kind: u8, value: u32 },
    Bytes(Vec<u8>),
}

/// Fully parsed field map. Parsing consumes and validates the entire stream
/// up front, so by the time a reader exists, applying it cannot fail — the
/// all-or-nothing half of the load contract.
#[derive(Debug)]
pub struct StateReader {
    fields: HashMap<String, Field>,
}

impl StateReader {
    pub fn parse(stream: &[u8]) -> Result<Self, CorruptStateError> {
        let header_len = MAGIC.len() + 1;
        if stream.len() < header_len {
            return Err(if stream.starts_with(&MAGIC[..stream.len().min(4)]) {
                CorruptStateError::Truncated
            } else {
                CorruptStateError::BadMagic
            });
        }
        if &stream[..4] != MAGIC {
            return Err(CorruptStateError::BadMagic);
        }
        let version = stream[4];
        if version != FORMAT_VERSION {
            return Err(CorruptStateError::UnsupportedVersion { found: version });
        }

        let mut fields = HashMap::new();
        let mut cursor = header_len;
        while cursor < stream.len() {
            let name_len = stream[cursor] as usize;
            cursor += 1;
            let name_bytes = stream
                .get(cursor..cursor + name_len)
                .ok_or(CorruptStateError::Truncated)?;
            let name = String::from_utf8_lossy(name_bytes).into_owned();
            cursor += name_len;

            let kind = *stream.get(cursor).ok_or(CorruptStateError::Truncated)?;
            cursor += 1;

            let field = match kind {
                KIND_U8 => {
                    let value = *stream.get(cursor).ok_or(CorruptStateError::Truncated)?;
                    cursor += 1;
                    Field::Scalar {
                        kind,
                        value: value as u32,
                    }
                }
                KIND_U16 => {
                    let raw = stream
                        .get(cursor..cursor + 2)
                        .ok_or(CorruptStateError::Truncated)?;
                    cursor += 2;
                    Field::Scalar {
                        kind,
                        value: u16::from_le_bytes([raw[0], raw[1]]) as u32,
                    }
                }
                KIND_U32 => {
                    let raw = stream
                        .get(cursor..cursor + 4)
                        .ok_or(CorruptStateError::Truncated)?;
                    cursor += 4;
                    Field::Scalar {
                        kind,
                        value: u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]),
                    }
                }
                KIND_BYTES => {
                    let raw = stream
                        .get(cursor..cursor + 4)
                        .ok_or(CorruptStateError::Truncated)?;
                    let len = u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]) as usize;
                    cursor += 4;
                    let payload = stream
                        .get(cursor..cursor + len)
                        .ok_or(CorruptStateError::Truncated)?;
                    cursor += len;
                    Field::Bytes(payload.to_vec())
                }
                // Unknown kind: without a length we cannot skip it safely.
                _ => return Err(CorruptStateError::Truncated),
            };
            fields.insert(name, field);
        }

        Ok(Self { fields })
    }

    /// Scalar lookups return `None` for missing fields *and* for fields whose
    /// kind drifted across revisions; callers fall back to power-on defaults
    /// either way.
    pub fn u8(&self, name: &str) -> Option<u8> {
        match self.fields.get(name) {
            Some(Field::Scalar { kind: KIND_U8, value }) => Some(*value as u8),
            _ => None,
        }
    }

    pub fn u16(&self, name: &str) -> Option<u16> {
        match self.fields.get(name) {
            Some(Field::Scalar {
                kind: KIND_U16,
                value,
            }) => Some(*value as u16),
            _ => None,
        }
    }

    pub fn u32(&self, name: &str) -> Option<u32> {
        match self.fields.get(name) {
            Some(Field::Scalar {
                kind: KIND_U32,
                value,
            }) => Some(*value),
            _ => None,
        }
    }

    pub fn bytes(&self, name: &str) -> Option<&[u8]> {
        match self.fields.get(name) {
            Some(Field::Bytes(payload)) => Some(payload.as_slice()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_every_kind() {
        let mut w = StateWriter::new();
        w.put_u8("a", 0xAB);
        w.put_u16("b", 0xBEEF);
        w.put_u32("c", 0xDEAD_BEEF);
        w.put_bytes("d", &[1, 2, 3]);
        let r = StateReader::parse(&w.finish()).unwrap();

        assert_eq!(r.u8("a"), Some(0xAB));
        assert_eq!(r.u16("b"), Some(0xBEEF));
        assert_eq!(r.u32("c"), Some(0xDEAD_BEEF));
        assert_eq!(r.bytes("d"), Some([1, 2, 3].as_slice()));
    }

    #[test]
    fn missing_and_mistyped_fields_read_as_none() {
        let mut w = StateWriter::new();
        w.put_u16("b", 7);
        let r = StateReader::parse(&w.finish()).unwrap();
        assert_eq!(r.u8("a"), None);
        assert_eq!(r.u8("b"), None);
        assert_eq!(r.u16("b"), Some(7));
    }

    #[test]
    fn rejects_foreign_streams() {
        let err = StateReader::parse(b"NOPE\x01").unwrap_err();
        assert!(matches!(err, CorruptStateError::BadMagic));
    }

    #[test]
    fn rejects_future_versions() {
        let err = StateReader::parse(b"CBST\x63").unwrap_err();
        assert!(matches!(
            err,
            CorruptStateError::UnsupportedVersion { found: 0x63 }
        ));
    }

    #[test]
    fn trailing_garbage_is_a_partial_record() {
        let mut w = StateWriter::new();
        w.put_u8("a", 1);
        let mut stream = w.finish();
        // A lone name-length byte promising more than remains.
        stream.push(0x20);
        let err = StateReader::parse(&stream).unwrap_err();
        assert!(matches!(err, CorruptStateError::Truncated));
    }

    #[test]
    fn rejects_truncated_records() {
        let mut w = StateWriter::new();
        w.put_bytes("wram", &[0u8; 64]);
        let stream = w.finish();
        for cut in 6..stream.len() {
            let err = StateReader::parse(&stream[..cut]).unwrap_err();
            assert!(matches!(err, CorruptStateError::Truncated), "cut at {cut}");
        }
    }
}
