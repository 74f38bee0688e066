//! Packet obfuscation
//!
//! Four in-place, reversible byte transforms and the fixed order in which
//! they are applied to outgoing and incoming packets:
//!
//! ```text
//! encode: swap_multiples(encode_multiple) -> flip_msb -> interleave
//! decode: deinterleave -> flip_msb -> swap_multiples(decode_multiple)
//! ```
//!
//! `flip_msb` and `swap_multiples` are their own inverses, `deinterleave`
//! undoes `interleave`.

/// Positions visited by interleave: even indices ascending, then odd
/// indices descending.
fn interleave_order(len: usize) -> impl Iterator<Item = usize> {
    (0..len).step_by(2).chain((1..len).step_by(2).rev())
}

/// Spread the buffer: the first half lands on even positions, the second
/// half on odd positions from the end backwards.
pub fn interleave(buf: &mut [u8]) {
    let source = buf.to_vec();
    for (target, &byte) in interleave_order(buf.len()).zip(&source) {
        buf[target] = byte;
    }
}

/// Inverse of [`interleave`]
pub fn deinterleave(buf: &mut [u8]) {
    let source = buf.to_vec();
    for (slot, index) in buf.iter_mut().zip(interleave_order(source.len())) {
        *slot = source[index];
    }
}

/// Toggle the high bit of every byte except `0x00` and `0x80`
pub fn flip_msb(buf: &mut [u8]) {
    for byte in buf.iter_mut() {
        if *byte & 0x7F != 0 {
            *byte ^= 0x80;
        }
    }
}

/// Reverse every run of two or more consecutive bytes divisible by `multiple`.
///
/// A multiple of zero leaves the buffer untouched.
pub fn swap_multiples(buf: &mut [u8], multiple: u8) {
    if multiple == 0 {
        return;
    }

    let mut run = 0;
    for i in 0..=buf.len() {
        if i < buf.len() && buf[i] % multiple == 0 {
            run += 1;
            continue;
        }
        if run > 1 {
            buf[i - run..i].reverse();
        }
        run = 0;
    }
}

/// Per-direction multiples negotiated during the handshake.
///
/// Both start at zero until the server supplies real values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Encryption {
    pub encode_multiple: u8,
    pub decode_multiple: u8,
}

impl Encryption {
    pub fn new(encode_multiple: u8, decode_multiple: u8) -> Self {
        Self {
            encode_multiple,
            decode_multiple,
        }
    }

    /// Obfuscate an outgoing packet in place
    pub fn encode(&self, buf: &mut [u8]) {
        swap_multiples(buf, self.encode_multiple);
        flip_msb(buf);
        interleave(buf);
    }

    /// Undo the server's obfuscation of an incoming packet in place
    pub fn decode(&self, buf: &mut [u8]) {
        deinterleave(buf);
        flip_msb(buf);
        swap_multiples(buf, self.decode_multiple);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interleave_even_and_odd_lengths() {
        let mut even = [0, 1, 2, 3, 4, 5];
        interleave(&mut even);
        assert_eq!(even, [0, 5, 1, 4, 2, 3]);

        let mut odd = [0, 1, 2, 3, 4];
        interleave(&mut odd);
        assert_eq!(odd, [0, 4, 1, 3, 2]);
    }

    #[test]
    fn test_deinterleave_inverts() {
        for len in 0..9u8 {
            let original: Vec<u8> = (0..len).collect();
            let mut buf = original.clone();
            interleave(&mut buf);
            deinterleave(&mut buf);
            assert_eq!(buf, original, "length {}", len);
        }
    }

    #[test]
    fn test_flip_msb_skips_zero_and_high_bit_only() {
        let mut buf = [0x00, 0x80, 0x01, 0xFF, 0x7F];
        flip_msb(&mut buf);
        assert_eq!(buf, [0x00, 0x80, 0x81, 0x7F, 0xFF]);
    }

    #[test]
    fn test_swap_multiples_reverses_runs() {
        let mut buf = [10, 21, 3, 6, 9, 7, 12, 15];
        swap_multiples(&mut buf, 3);
        // 21,3,6,9 reversed; 12,15 reversed; 10 and 7 untouched
        assert_eq!(buf, [10, 9, 6, 3, 21, 7, 15, 12]);

        let mut untouched = buf;
        swap_multiples(&mut untouched, 0);
        assert_eq!(untouched, buf);
    }

    #[test]
    fn test_encode_decode_with_matching_multiples() {
        let original = [0x03, 0x01, 0x4D, 0x06, 0x09, 0x00, 0x80, 0xFE];
        let encryption = Encryption::new(3, 3);

        let mut buf = original;
        encryption.encode(&mut buf);
        assert_ne!(buf, original);
        encryption.decode(&mut buf);
        assert_eq!(buf, original);
    }
}
