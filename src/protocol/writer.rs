//! Writer for the protocol's field encodings

use bytes::{BufMut, Bytes, BytesMut};

use super::number::{encode_number, CHAR_MAX, INT_MAX, SHORT_MAX, THREE_MAX};
use super::{DataError, DataResult};

/// Accumulates encoded packet fields
#[derive(Debug, Default)]
pub struct EoWriter {
    data: BytesMut,
}

impl EoWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: BytesMut::with_capacity(capacity),
        }
    }

    /// Append a raw, unencoded byte
    pub fn add_byte(&mut self, value: u8) {
        self.data.put_u8(value);
    }

    /// Append raw, unencoded bytes
    pub fn add_bytes(&mut self, bytes: &[u8]) {
        self.data.put_slice(bytes);
    }

    /// Append a one-byte number (`0..253`)
    pub fn add_char(&mut self, value: u32) -> DataResult<()> {
        self.add_number(value, CHAR_MAX, 1)
    }

    /// Append a two-byte number (`0..64009`)
    pub fn add_short(&mut self, value: u32) -> DataResult<()> {
        self.add_number(value, SHORT_MAX, 2)
    }

    /// Append a three-byte number
    pub fn add_three(&mut self, value: u32) -> DataResult<()> {
        self.add_number(value, THREE_MAX, 3)
    }

    /// Append a four-byte number
    pub fn add_int(&mut self, value: u32) -> DataResult<()> {
        self.add_number(value, INT_MAX, 4)
    }

    /// Append a string with no length prefix
    pub fn add_string(&mut self, value: &str) {
        self.data.put_slice(value.as_bytes());
    }

    /// Append a string padded with `0xFF` (or truncated) to exactly `length` bytes
    pub fn add_fixed_string(&mut self, value: &str, length: usize) {
        let bytes = value.as_bytes();
        let written = bytes.len().min(length);
        self.data.put_slice(&bytes[..written]);
        self.data.put_bytes(0xFF, length - written);
    }

    fn add_number(&mut self, value: u32, max: u32, width: usize) -> DataResult<()> {
        if value >= max {
            return Err(DataError::NumberOutOfRange { value, max });
        }
        self.data.put_slice(&encode_number(value)[..width]);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Bytes {
        self.data.freeze()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_number_widths() {
        let mut writer = EoWriter::new();
        writer.add_char(5).unwrap();
        writer.add_short(300).unwrap();
        writer.add_three(0).unwrap();
        assert_eq!(writer.as_slice(), &[6, 48, 2, 1, 0xFE, 0xFE]);
    }

    #[test]
    fn test_out_of_range_is_rejected() {
        let mut writer = EoWriter::new();
        let err = writer.add_char(CHAR_MAX).unwrap_err();
        assert!(matches!(err, DataError::NumberOutOfRange { value: 253, max: 253 }));
        assert!(writer.is_empty());
    }

    #[test]
    fn test_fixed_string_padding() {
        let mut writer = EoWriter::new();
        writer.add_fixed_string("ab", 4);
        writer.add_fixed_string("xyz", 2);
        assert_eq!(writer.as_slice(), b"ab\xFF\xFFxy");
    }
}
