//! Frame codec for encoding/decoding packets
//!
//! Handles the length prefix, the (action, family) header, the sequence
//! value and obfuscation of every packet crossing the socket.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::io;
use thiserror::Error;

use super::encrypt::Encryption;
use super::number::{decode_number, encode_number, SHORT_MAX};
use super::sequence::{sequence_bytes, SequenceStart, Sequencer};
use super::{DataError, EoReader, EoWriter, Packet};

/// Header byte value that, in both positions, marks a raw frame
pub const SENTINEL: u8 = 0xFF;

/// Size of the length prefix in bytes
pub const LENGTH_PREFIX_SIZE: usize = 2;

/// Largest body a two-byte length prefix can describe
pub const MAX_FRAME_SIZE: usize = SHORT_MAX as usize - 1;

/// Codec errors
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Frame too large: {0} bytes (max: {1})")]
    FrameTooLarge(usize, usize),

    #[error("Truncated frame: {0} bytes")]
    Truncated(usize),

    #[error("Data error: {0}")]
    Data(#[from] DataError),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

pub type CodecResult<T> = Result<T, CodecError>;

/// Raw frames skip sequencing and obfuscation. Only a header where both
/// bytes are the sentinel qualifies.
pub fn is_raw(action: u8, family: u8) -> bool {
    action == SENTINEL && family == SENTINEL
}

/// A decoded inbound frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub action: u8,
    pub family: u8,
    /// Everything after the header, not yet deserialized
    pub payload: Bytes,
}

impl Frame {
    pub fn reader(&self) -> EoReader<'_> {
        EoReader::new(&self.payload)
    }
}

/// Turns packets into wire frames and back using the session's sequence
/// and encryption state
#[derive(Debug, Default)]
pub struct FrameCodec {
    encryption: Encryption,
    sequencer: Sequencer,
}

impl FrameCodec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn encryption(&self) -> Encryption {
        self.encryption
    }

    pub fn set_encryption(&mut self, encryption: Encryption) {
        self.encryption = encryption;
    }

    pub fn sequence_start(&self) -> SequenceStart {
        self.sequencer.start()
    }

    pub fn reseed(&mut self, start: SequenceStart) {
        self.sequencer.reseed(start);
    }

    /// Advance the sequencer without sending anything
    pub fn prime(&mut self) -> i32 {
        self.sequencer.next_sequence()
    }

    /// Serialize a typed packet and append its frame to `buf`
    pub fn encode_packet<P: Packet>(&mut self, packet: &P, buf: &mut BytesMut) -> CodecResult<()> {
        let mut writer = EoWriter::new();
        packet.serialize(&mut writer)?;
        self.encode(P::ACTION.into(), P::FAMILY.into(), writer.as_slice(), buf)
    }

    /// Frame an already serialized body and append it to `buf`
    pub fn encode(&mut self, action: u8, family: u8, body: &[u8], buf: &mut BytesMut) -> CodecResult<()> {
        let mut packet = Vec::with_capacity(body.len() + 4);
        packet.push(action);
        packet.push(family);

        let raw = is_raw(action, family);
        if !raw {
            let sequence = self.sequencer.next_sequence();
            packet.extend_from_slice(&sequence_bytes(sequence));
        }
        packet.extend_from_slice(body);

        if packet.len() > MAX_FRAME_SIZE {
            return Err(CodecError::FrameTooLarge(packet.len(), MAX_FRAME_SIZE));
        }

        if !raw {
            self.encryption.encode(&mut packet);
        }

        buf.reserve(LENGTH_PREFIX_SIZE + packet.len());
        buf.put_slice(&encode_number(packet.len() as u32)[..LENGTH_PREFIX_SIZE]);
        buf.put_slice(&packet);
        Ok(())
    }

    /// Decode one frame body whose length prefix was already stripped
    pub fn decode(&self, mut body: BytesMut) -> CodecResult<Frame> {
        if body.len() < 2 {
            return Err(CodecError::Truncated(body.len()));
        }

        if !is_raw(body[0], body[1]) {
            self.encryption.decode(&mut body);
        }

        let action = body[0];
        let family = body[1];
        body.advance(2);

        Ok(Frame {
            action,
            family,
            payload: body.freeze(),
        })
    }
}

/// Splits a byte stream into frame bodies on the length prefix
#[derive(Debug, Default)]
pub struct FrameDecoder {
    state: DecodeState,
}

#[derive(Debug, Default)]
enum DecodeState {
    #[default]
    Header,
    Body {
        length: usize,
    },
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when no length prefix has been consumed without its body
    pub fn is_idle(&self) -> bool {
        matches!(self.state, DecodeState::Header)
    }

    /// Forget any partially read frame
    pub fn reset(&mut self) {
        self.state = DecodeState::Header;
    }

    /// Attempt to split one frame body off the front of the buffer.
    /// Returns Ok(None) if more data is needed.
    pub fn decode(&mut self, buf: &mut BytesMut) -> CodecResult<Option<BytesMut>> {
        loop {
            match self.state {
                DecodeState::Header => {
                    if buf.len() < LENGTH_PREFIX_SIZE {
                        return Ok(None);
                    }

                    let length = decode_number(&buf[..LENGTH_PREFIX_SIZE]) as usize;
                    if length > MAX_FRAME_SIZE {
                        return Err(CodecError::FrameTooLarge(length, MAX_FRAME_SIZE));
                    }

                    buf.advance(LENGTH_PREFIX_SIZE);
                    self.state = DecodeState::Body { length };
                }
                DecodeState::Body { length } => {
                    if buf.len() < length {
                        return Ok(None);
                    }

                    self.state = DecodeState::Header;
                    return Ok(Some(buf.split_to(length)));
                }
            }
        }
    }
}
