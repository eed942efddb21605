//! Protocol buffer wire format reader.
//!
//! Note bodies are protobuf messages with no published schema. This reader
//! walks the framing only (tag, wire type, payload) and leaves meaning to the
//! caller's field dictionary, so unknown fields cost nothing but a skip.
//!
//! Reference: <https://protobuf.dev/programming-guides/encoding/>

use thiserror::Error;

/// Longest valid varint encoding of a 64-bit value.
const MAX_VARINT_LEN: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum WireError {
    #[error("unexpected end of data at byte {0}")]
    UnexpectedEof(usize),
    #[error("varint longer than 10 bytes at byte {0}")]
    VarintOverflow(usize),
    #[error("unsupported wire type {wire_type} at byte {pos}")]
    UnsupportedWireType { wire_type: u8, pos: usize },
    #[error("field number 0 at byte {0}")]
    ZeroField(usize),
    #[error("length {len} at byte {pos} exceeds remaining {remaining} bytes")]
    LengthOutOfRange { len: u64, pos: usize, remaining: usize },
}

/// Raw field payload, borrowed from the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldValue<'a> {
    Varint(u64),
    Fixed64(u64),
    Bytes(&'a [u8]),
    Fixed32(u32),
}

impl<'a> FieldValue<'a> {
    #[inline]
    pub fn as_u64(&self) -> Option<u64> {
        match *self {
            FieldValue::Varint(v) | FieldValue::Fixed64(v) => Some(v),
            FieldValue::Fixed32(v) => Some(v as u64),
            FieldValue::Bytes(_) => None,
        }
    }

    /// Varint reinterpreted as a two's complement `int32`/`int64`.
    #[inline]
    pub fn as_i64(&self) -> Option<i64> {
        self.as_u64().map(|v| v as i64)
    }

    #[inline]
    pub fn as_bytes(&self) -> Option<&'a [u8]> {
        match *self {
            FieldValue::Bytes(b) => Some(b),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field<'a> {
    pub number: u32,
    pub value: FieldValue<'a>,
}

/// Iterates the fields of one message.
///
/// Yields `Err` at most once; iteration ends after the first error.
pub struct WireReader<'a> {
    data: &'a [u8],
    pos: usize,
    failed: bool,
}

impl<'a> WireReader<'a> {
    #[inline]
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            failed: false,
        }
    }

    fn read_field(&mut self) -> Result<Field<'a>, WireError> {
        let tag_pos = self.pos;
        let tag = self.read_varint()?;
        let wire_type = (tag & 0x7) as u8;
        let number = u32::try_from(tag >> 3).map_err(|_| WireError::ZeroField(tag_pos))?;
        if number == 0 {
            return Err(WireError::ZeroField(tag_pos));
        }

        let value = match wire_type {
            0 => FieldValue::Varint(self.read_varint()?),
            1 => {
                let bytes = self.read_bytes(8)?;
                let mut buf = [0u8; 8];
                buf.copy_from_slice(bytes);
                FieldValue::Fixed64(u64::from_le_bytes(buf))
            }
            2 => {
                let len_pos = self.pos;
                let len = self.read_varint()?;
                let remaining = self.data.len() - self.pos;
                match usize::try_from(len) {
                    Ok(n) if n <= remaining => FieldValue::Bytes(self.read_bytes(n)?),
                    _ => {
                        return Err(WireError::LengthOutOfRange {
                            len,
                            pos: len_pos,
                            remaining,
                        });
                    }
                }
            }
            5 => {
                let bytes = self.read_bytes(4)?;
                let mut buf = [0u8; 4];
                buf.copy_from_slice(bytes);
                FieldValue::Fixed32(u32::from_le_bytes(buf))
            }
            // 3 and 4 are deprecated groups, 6 and 7 are undefined
            other => {
                return Err(WireError::UnsupportedWireType {
                    wire_type: other,
                    pos: tag_pos,
                });
            }
        };

        Ok(Field { number, value })
    }

    #[inline]
    fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], WireError> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= self.data.len())
            .ok_or(WireError::UnexpectedEof(self.pos))?;
        let bytes = &self.data[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    /// Read a base-128 varint (7 bits per byte, little-endian groups, MSB = continue).
    #[inline]
    fn read_varint(&mut self) -> Result<u64, WireError> {
        let start = self.pos;
        let mut result: u64 = 0;
        for i in 0..MAX_VARINT_LEN {
            let Some(&byte) = self.data.get(self.pos) else {
                return Err(WireError::UnexpectedEof(self.pos));
            };
            self.pos += 1;
            result |= u64::from(byte & 0x7f) << (7 * i);
            if byte & 0x80 == 0 {
                return Ok(result);
            }
        }
        Err(WireError::VarintOverflow(start))
    }
}

impl<'a> Iterator for WireReader<'a> {
    type Item = Result<Field<'a>, WireError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.pos >= self.data.len() {
            return None;
        }
        let field = self.read_field();
        if field.is_err() {
            self.failed = true;
        }
        Some(field)
    }
}

/// Minimal encoder, the inverse of [`WireReader`].
#[derive(Debug, Default, Clone)]
pub struct WireWriter {
    buf: Vec<u8>,
}

impl WireWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn varint(&mut self, number: u32, value: u64) -> &mut Self {
        self.tag(number, 0);
        self.raw_varint(value);
        self
    }

    pub fn bytes(&mut self, number: u32, value: &[u8]) -> &mut Self {
        self.tag(number, 2);
        self.raw_varint(value.len() as u64);
        self.buf.extend_from_slice(value);
        self
    }

    pub fn string(&mut self, number: u32, value: &str) -> &mut Self {
        self.bytes(number, value.as_bytes())
    }

    pub fn fixed32(&mut self, number: u32, value: u32) -> &mut Self {
        self.tag(number, 5);
        self.buf.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn fixed64(&mut self, number: u32, value: u64) -> &mut Self {
        self.tag(number, 1);
        self.buf.extend_from_slice(&value.to_le_bytes());
        self
    }

    /// Encode a nested message built by `build`.
    pub fn message(&mut self, number: u32, build: impl FnOnce(&mut WireWriter)) -> &mut Self {
        let mut inner = WireWriter::new();
        build(&mut inner);
        self.bytes(number, &inner.buf)
    }

    pub fn finish(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.buf)
    }

    fn tag(&mut self, number: u32, wire_type: u8) {
        self.raw_varint((u64::from(number) << 3) | u64::from(wire_type));
    }

    fn raw_varint(&mut self, mut value: u64) {
        while value >= 0x80 {
            self.buf.push((value as u8 & 0x7f) | 0x80);
            value >>= 7;
        }
        self.buf.push(value as u8);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(data: &[u8]) -> Vec<Result<Field<'_>, WireError>> {
        WireReader::new(data).collect()
    }

    #[test]
    fn test_varint_field() {
        // field 1, varint 150 (the canonical example from the encoding guide)
        let data = [0x08, 0x96, 0x01];
        assert_eq!(
            fields(&data),
            vec![Ok(Field {
                number: 1,
                value: FieldValue::Varint(150)
            })]
        );
    }

    #[test]
    fn test_length_delimited() {
        let data = [0x12, 0x03, b'a', b'b', b'c', 0x18, 0x01];
        let parsed = fields(&data);
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].unwrap().value.as_bytes(), Some(&b"abc"[..]));
        assert_eq!(parsed[1].unwrap().value.as_u64(), Some(1));
    }

    #[test]
    fn test_length_past_end_is_error() {
        let data = [0x12, 0x05, b'a'];
        let parsed = fields(&data);
        assert_eq!(parsed.len(), 1);
        assert!(matches!(
            parsed[0],
            Err(WireError::LengthOutOfRange { len: 5, remaining: 1, .. })
        ));
    }

    #[test]
    fn test_truncated_varint() {
        let data = [0x08, 0x96];
        assert_eq!(fields(&data), vec![Err(WireError::UnexpectedEof(2))]);
    }

    #[test]
    fn test_overlong_varint() {
        let mut data = vec![0x08];
        data.extend([0xff; 11]);
        assert_eq!(fields(&data), vec![Err(WireError::VarintOverflow(1))]);
    }

    #[test]
    fn test_group_wire_type_rejected() {
        // field 1, wire type 3 (start group)
        let data = [0x0b];
        assert!(matches!(
            fields(&data)[0],
            Err(WireError::UnsupportedWireType { wire_type: 3, .. })
        ));
    }

    #[test]
    fn test_zero_field_number() {
        let data = [0x00, 0x01];
        assert_eq!(fields(&data), vec![Err(WireError::ZeroField(0))]);
    }

    #[test]
    fn test_iteration_stops_after_error() {
        let data = [0x0b, 0x08, 0x01];
        assert_eq!(fields(&data).len(), 1);
    }

    #[test]
    fn test_fixed_widths() {
        let data = WireWriter::new()
            .fixed32(4, 0xdead_beef)
            .fixed64(5, u64::MAX)
            .finish();
        let parsed = fields(&data);
        assert_eq!(parsed[0].unwrap().value, FieldValue::Fixed32(0xdead_beef));
        assert_eq!(parsed[1].unwrap().value, FieldValue::Fixed64(u64::MAX));
    }

    #[test]
    fn test_writer_nested_message() {
        let data = WireWriter::new()
            .message(2, |m| {
                m.string(2, "hi").varint(1, 300);
            })
            .finish();
        let outer: Vec<_> = WireReader::new(&data).map(Result::unwrap).collect();
        assert_eq!(outer.len(), 1);
        assert_eq!(outer[0].number, 2);
        let inner: Vec<_> = WireReader::new(outer[0].value.as_bytes().unwrap())
            .map(Result::unwrap)
            .collect();
        assert_eq!(inner[0].value.as_bytes(), Some(&b"hi"[..]));
        assert_eq!(inner[1].value.as_u64(), Some(300));
    }

    #[test]
    fn test_large_varint_roundtrip() {
        let data = WireWriter::new().varint(1, u64::MAX).finish();
        assert_eq!(fields(&data)[0].unwrap().value.as_u64(), Some(u64::MAX));
    }
}
