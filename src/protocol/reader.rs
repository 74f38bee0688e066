//! Reader for the protocol's field encodings

use super::number::decode_number;
use super::{DataError, DataResult};

/// Cursor over a received packet payload
#[derive(Debug, Clone)]
pub struct EoReader<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> EoReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, position: 0 }
    }

    /// Bytes left to read
    pub fn remaining(&self) -> usize {
        self.data.len() - self.position
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn get_byte(&mut self) -> DataResult<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn get_bytes(&mut self, length: usize) -> DataResult<&'a [u8]> {
        self.take(length)
    }

    pub fn get_char(&mut self) -> DataResult<u32> {
        self.take(1).map(decode_number)
    }

    pub fn get_short(&mut self) -> DataResult<u32> {
        self.take(2).map(decode_number)
    }

    pub fn get_three(&mut self) -> DataResult<u32> {
        self.take(3).map(decode_number)
    }

    pub fn get_int(&mut self) -> DataResult<u32> {
        self.take(4).map(decode_number)
    }

    /// Read a string of exactly `length` bytes, dropping `0xFF` padding
    pub fn get_fixed_string(&mut self, length: usize) -> DataResult<String> {
        let bytes = self.take(length)?;
        let end = bytes.iter().position(|&b| b == 0xFF).unwrap_or(bytes.len());
        Ok(String::from_utf8_lossy(&bytes[..end]).into_owned())
    }

    /// Read everything left as a string
    pub fn get_string(&mut self) -> DataResult<String> {
        let length = self.remaining();
        self.get_fixed_string(length)
    }

    fn take(&mut self, length: usize) -> DataResult<&'a [u8]> {
        if self.remaining() < length {
            return Err(DataError::Underflow {
                needed: length,
                remaining: self.remaining(),
            });
        }
        let start = self.position;
        self.position += length;
        Ok(&self.data[start..self.position])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_in_order() {
        let data = [6, 48, 2, b'h', b'i'];
        let mut reader = EoReader::new(&data);
        assert_eq!(reader.get_char().unwrap(), 5);
        assert_eq!(reader.get_short().unwrap(), 300);
        assert_eq!(reader.get_string().unwrap(), "hi");
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn test_underflow_does_not_advance() {
        let data = [1];
        let mut reader = EoReader::new(&data);
        let err = reader.get_short().unwrap_err();
        assert!(matches!(err, DataError::Underflow { needed: 2, remaining: 1 }));
        assert_eq!(reader.position(), 0);
        assert_eq!(reader.get_byte().unwrap(), 1);
    }

    #[test]
    fn test_fixed_string_strips_padding() {
        let data = b"ok\xFF\xFF!";
        let mut reader = EoReader::new(data);
        assert_eq!(reader.get_fixed_string(4).unwrap(), "ok");
        assert_eq!(reader.get_byte().unwrap(), b'!');
    }
}
