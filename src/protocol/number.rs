//! Protocol number encoding
//!
//! Integers travel as base-253 digits, least significant first. Every digit
//! is stored plus one so that a zero digit never appears on the wire, and
//! unused high digits are padded with `0xFE`.

/// Exclusive upper bound of a one-byte char
pub const CHAR_MAX: u32 = 253;
/// Exclusive upper bound of a two-byte short
pub const SHORT_MAX: u32 = CHAR_MAX * CHAR_MAX;
/// Exclusive upper bound of a three-byte value
pub const THREE_MAX: u32 = CHAR_MAX * CHAR_MAX * CHAR_MAX;
/// Exclusive upper bound of a four-byte int
pub const INT_MAX: u32 = SHORT_MAX * SHORT_MAX;

/// Padding byte for unused high digits
const PADDING: u8 = 0xFE;

/// Encode a number into its four-byte wire form.
///
/// Callers take the first 1..=4 bytes depending on the field width. Values at
/// or above [`INT_MAX`] do not fit and must be rejected before calling this.
pub fn encode_number(number: u32) -> [u8; 4] {
    let mut value = number;

    let mut d = PADDING;
    if number >= THREE_MAX {
        d = (value / THREE_MAX + 1) as u8;
        value %= THREE_MAX;
    }

    let mut c = PADDING;
    if number >= SHORT_MAX {
        c = (value / SHORT_MAX + 1) as u8;
        value %= SHORT_MAX;
    }

    let mut b = PADDING;
    if number >= CHAR_MAX {
        b = (value / CHAR_MAX + 1) as u8;
        value %= CHAR_MAX;
    }

    let a = (value + 1) as u8;

    [a, b, c, d]
}

/// Decode up to four wire bytes back into a number.
///
/// Both `0xFE` and `0x00` read as a zero digit.
pub fn decode_number(bytes: &[u8]) -> u32 {
    let mut digits = [PADDING; 4];
    for (slot, &byte) in digits.iter_mut().zip(bytes) {
        if byte != 0 {
            *slot = byte;
        }
    }

    let digit = |byte: u8| -> u32 {
        if byte == PADDING {
            0
        } else {
            u32::from(byte) - 1
        }
    };

    digit(digits[3]) * THREE_MAX
        + digit(digits[2]) * SHORT_MAX
        + digit(digits[1]) * CHAR_MAX
        + digit(digits[0])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_encodes_as_one_with_padding() {
        assert_eq!(encode_number(0), [0x01, 0xFE, 0xFE, 0xFE]);
        assert_eq!(decode_number(&[0x01]), 0);
    }

    #[test]
    fn test_digit_boundaries() {
        assert_eq!(encode_number(252), [253, 0xFE, 0xFE, 0xFE]);
        assert_eq!(encode_number(253), [1, 2, 0xFE, 0xFE]);
        assert_eq!(encode_number(SHORT_MAX), [1, 1, 2, 0xFE]);
        assert_eq!(encode_number(THREE_MAX), [1, 1, 1, 2]);
    }

    #[test]
    fn test_known_values() {
        // 300 = 1 * 253 + 47
        assert_eq!(encode_number(300), [48, 2, 0xFE, 0xFE]);
        assert_eq!(decode_number(&[48, 2]), 300);
        assert_eq!(decode_number(&encode_number(64008)[..2]), 64008);
        assert_eq!(decode_number(&encode_number(INT_MAX - 1)), INT_MAX - 1);
    }

    #[test]
    fn test_zero_byte_reads_as_zero_digit() {
        assert_eq!(decode_number(&[0x00, 0x00]), 0);
        assert_eq!(decode_number(&[0x05, 0x00]), 4);
    }
}
