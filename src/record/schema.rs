//! Declarative record schemas and the generic cursor that interprets them.
//!
//! A `RecordSchema` is the single source of truth for one account layout:
//! the expected type tag plus an ordered `(name, kind)` field list. Widths
//! follow from the kind. Decoding walks the schema left to right, so offset
//! arithmetic exists in exactly one place.

use crate::error::DecodeError;
use solana_sdk::pubkey::Pubkey;

/// Width of the leading type tag on every ledger record.
pub const TAG_LEN: usize = 8;

/// The wire shape of a single field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Little-endian unsigned 16-bit integer.
    U16,
    /// Little-endian unsigned 64-bit integer.
    U64,
    /// 32-byte identity, copied verbatim.
    Identity,
    /// Single byte that must be exactly 0 or 1.
    Flag,
    /// Single uninterpreted byte (derivation nonces).
    Byte,
}

impl FieldKind {
    pub const fn width(self) -> usize {
        match self {
            FieldKind::U16 => 2,
            FieldKind::U64 => 8,
            FieldKind::Identity => 32,
            FieldKind::Flag => 1,
            FieldKind::Byte => 1,
        }
    }
}

/// One named field in a record layout.
#[derive(Debug, Clone, Copy)]
pub struct Field {
    pub name: &'static str,
    pub kind: FieldKind,
}

impl Field {
    pub const fn new(name: &'static str, kind: FieldKind) -> Self {
        Self { name, kind }
    }
}

/// A complete fixed-width record layout.
#[derive(Debug, Clone, Copy)]
pub struct RecordSchema {
    pub name: &'static str,
    pub tag: [u8; TAG_LEN],
    pub fields: &'static [Field],
}

/// Serialized length of a layout, tag included. Free function so record
/// lengths can be computed in const context from the field list alone.
pub const fn layout_len(fields: &[Field]) -> usize {
    let mut len = TAG_LEN;
    let mut i = 0;
    while i < fields.len() {
        len += fields[i].kind.width();
        i += 1;
    }
    len
}

impl RecordSchema {
    /// Total serialized length, tag included.
    pub const fn record_len(&self) -> usize {
        layout_len(self.fields)
    }

    /// Open a reader over `data`, checking length and tag up front.
    ///
    /// Wrong length or tag is a skip outcome: listing calls filtered only
    /// by size can hand back unrelated account shapes.
    pub fn reader<'a>(&'static self, data: &'a [u8]) -> Result<FieldReader<'a>, DecodeError> {
        let expected = self.record_len();
        if data.len() != expected {
            return Err(DecodeError::Length {
                record: self.name,
                expected,
                actual: data.len(),
            });
        }
        if data[..TAG_LEN] != self.tag {
            return Err(DecodeError::Tag { record: self.name });
        }
        Ok(FieldReader {
            schema: self,
            data,
            offset: TAG_LEN,
            index: 0,
        })
    }

    /// Open a writer that serializes a record of this shape (tag first).
    pub fn writer(&'static self) -> FieldWriter {
        let mut buf = Vec::with_capacity(self.record_len());
        buf.extend_from_slice(&self.tag);
        FieldWriter {
            schema: self,
            buf,
            index: 0,
        }
    }
}

/// Sequential typed reader over a schema-checked buffer.
///
/// Each getter verifies the declared kind of the next field, so a typed
/// decoder that drifts out of sync with its schema fails loudly instead of
/// yielding garbage.
#[derive(Debug)]
pub struct FieldReader<'a> {
    schema: &'static RecordSchema,
    data: &'a [u8],
    offset: usize,
    index: usize,
}

impl<'a> FieldReader<'a> {
    fn take(&mut self, kind: FieldKind) -> Result<(&'static str, &'a [u8]), DecodeError> {
        let field = self
            .schema
            .fields
            .get(self.index)
            .ok_or(DecodeError::Schema {
                record: self.schema.name,
                field: "<past end>",
            })?;
        if field.kind != kind {
            return Err(DecodeError::Schema {
                record: self.schema.name,
                field: field.name,
            });
        }
        let width = kind.width();
        let bytes = &self.data[self.offset..self.offset + width];
        self.offset += width;
        self.index += 1;
        Ok((field.name, bytes))
    }

    pub fn u16(&mut self) -> Result<u16, DecodeError> {
        let (_, bytes) = self.take(FieldKind::U16)?;
        Ok(u16::from_le_bytes(bytes.try_into().unwrap()))
    }

    pub fn u64(&mut self) -> Result<u64, DecodeError> {
        let (_, bytes) = self.take(FieldKind::U64)?;
        Ok(u64::from_le_bytes(bytes.try_into().unwrap()))
    }

    pub fn identity(&mut self) -> Result<Pubkey, DecodeError> {
        let (_, bytes) = self.take(FieldKind::Identity)?;
        Ok(Pubkey::new_from_array(bytes.try_into().unwrap()))
    }

    /// Exact-value check: anything other than 0 or 1 fails the whole
    /// decode rather than being coerced to a boolean.
    pub fn flag(&mut self) -> Result<bool, DecodeError> {
        let (name, bytes) = self.take(FieldKind::Flag)?;
        match bytes[0] {
            0 => Ok(false),
            1 => Ok(true),
            value => Err(DecodeError::Flag {
                record: self.schema.name,
                field: name,
                value,
            }),
        }
    }

    pub fn byte(&mut self) -> Result<u8, DecodeError> {
        let (_, bytes) = self.take(FieldKind::Byte)?;
        Ok(bytes[0])
    }

    /// Assert every declared field was consumed.
    pub fn finish(self) -> Result<(), DecodeError> {
        if self.index != self.schema.fields.len() {
            return Err(DecodeError::Schema {
                record: self.schema.name,
                field: self.schema.fields[self.index].name,
            });
        }
        Ok(())
    }
}

/// Sequential typed writer, the encode counterpart of `FieldReader`.
///
/// Field order is enforced against the schema the same way. Used by tests
/// and tooling; the keeper itself never writes ledger records.
pub struct FieldWriter {
    schema: &'static RecordSchema,
    buf: Vec<u8>,
    index: usize,
}

impl FieldWriter {
    fn push(&mut self, kind: FieldKind, bytes: &[u8]) {
        let field = &self.schema.fields[self.index];
        assert!(
            field.kind == kind,
            "{}: encode order drifted from schema at `{}`",
            self.schema.name,
            field.name
        );
        self.buf.extend_from_slice(bytes);
        self.index += 1;
    }

    pub fn u16(&mut self, value: u16) -> &mut Self {
        self.push(FieldKind::U16, &value.to_le_bytes());
        self
    }

    pub fn u64(&mut self, value: u64) -> &mut Self {
        self.push(FieldKind::U64, &value.to_le_bytes());
        self
    }

    pub fn identity(&mut self, value: &Pubkey) -> &mut Self {
        self.push(FieldKind::Identity, value.as_ref());
        self
    }

    pub fn flag(&mut self, value: bool) -> &mut Self {
        self.push(FieldKind::Flag, &[value as u8]);
        self
    }

    pub fn byte(&mut self, value: u8) -> &mut Self {
        self.push(FieldKind::Byte, &[value]);
        self
    }

    pub fn finish(self) -> Vec<u8> {
        assert!(
            self.index == self.schema.fields.len(),
            "{}: encode stopped after {} of {} fields",
            self.schema.name,
            self.index,
            self.schema.fields.len()
        );
        self.buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static TEST_SCHEMA: RecordSchema = RecordSchema {
        name: "TestRecord",
        tag: [9, 9, 9, 9, 9, 9, 9, 9],
        fields: &[
            Field::new("id", FieldKind::U64),
            Field::new("who", FieldKind::Identity),
            Field::new("rate", FieldKind::U16),
            Field::new("live", FieldKind::Flag),
            Field::new("nonce", FieldKind::Byte),
        ],
    };

    #[test]
    fn record_len_sums_widths() {
        assert_eq!(TEST_SCHEMA.record_len(), 8 + 8 + 32 + 2 + 1 + 1);
    }

    #[test]
    fn roundtrip_through_writer_and_reader() {
        let who = Pubkey::new_unique();
        let mut w = TEST_SCHEMA.writer();
        w.u64(42).identity(&who).u16(500).flag(true).byte(253);
        let buf = w.finish();
        assert_eq!(buf.len(), TEST_SCHEMA.record_len());

        let mut r = TEST_SCHEMA.reader(&buf).unwrap();
        assert_eq!(r.u64().unwrap(), 42);
        assert_eq!(r.identity().unwrap(), who);
        assert_eq!(r.u16().unwrap(), 500);
        assert!(r.flag().unwrap());
        assert_eq!(r.byte().unwrap(), 253);
        r.finish().unwrap();
    }

    #[test]
    fn wrong_length_is_a_length_skip() {
        let err = TEST_SCHEMA.reader(&[0u8; 10]).unwrap_err();
        assert!(matches!(err, DecodeError::Length { actual: 10, .. }));
    }

    #[test]
    fn wrong_tag_is_a_tag_skip() {
        let mut buf = vec![0u8; TEST_SCHEMA.record_len()];
        buf[0] = 1;
        assert!(matches!(
            TEST_SCHEMA.reader(&buf).unwrap_err(),
            DecodeError::Tag { .. }
        ));
    }

    #[test]
    fn flag_byte_outside_zero_one_fails() {
        let who = Pubkey::new_unique();
        let mut w = TEST_SCHEMA.writer();
        w.u64(1).identity(&who).u16(1).flag(false).byte(0);
        let mut buf = w.finish();
        let flag_offset = 8 + 8 + 32 + 2;
        buf[flag_offset] = 7;

        let mut r = TEST_SCHEMA.reader(&buf).unwrap();
        r.u64().unwrap();
        r.identity().unwrap();
        r.u16().unwrap();
        assert_eq!(
            r.flag().unwrap_err(),
            DecodeError::Flag {
                record: "TestRecord",
                field: "live",
                value: 7
            }
        );
    }

    #[test]
    fn out_of_order_read_is_a_schema_error() {
        let who = Pubkey::new_unique();
        let mut w = TEST_SCHEMA.writer();
        w.u64(1).identity(&who).u16(1).flag(false).byte(0);
        let buf = w.finish();

        let mut r = TEST_SCHEMA.reader(&buf).unwrap();
        assert!(matches!(
            r.identity().unwrap_err(),
            DecodeError::Schema { field: "id", .. }
        ));
    }
}
