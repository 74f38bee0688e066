//! Packet channel
//!
//! Owns everything one connection needs to turn packets into frames and
//! frames into handler calls:
//! - Sequence and encryption state (inside the frame codec)
//! - The outbound buffer written by `send`
//! - The handler registry
//!
//! The channel does no I/O itself. The connection driver feeds it frame
//! bodies and flushes whatever handlers queued in response.

use bytes::{Bytes, BytesMut};
use thiserror::Error;

use super::dispatch::{DispatchRegistry, Handler};
use crate::protocol::{
    describe, CodecError, DataError, Encryption, EoReader, FrameCodec, InitReplyCode, Packet,
    SequenceStart,
};

/// Channel errors
#[derive(Error, Debug)]
pub enum ChannelError {
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Malformed packet: {0}")]
    Data(#[from] DataError),

    #[error("Handshake rejected by server: {0}")]
    HandshakeRejected(InitReplyCode),
}

pub type ChannelResult<T> = Result<T, ChannelError>;

/// Result of feeding one frame to the channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// A handler consumed the frame
    Handled { family: u8, action: u8 },
    /// No handler was registered; the frame was dropped
    Unhandled { family: u8, action: u8 },
}

/// Channel statistics
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ChannelStats {
    /// Packets encoded for sending
    pub packets_sent: u64,
    /// Frames dispatched to a handler
    pub packets_handled: u64,
    /// Frames dropped for lack of a handler
    pub packets_unhandled: u64,
}

/// The send side of a channel, handed to handlers so they can reply
#[derive(Debug, Default)]
pub struct Session {
    codec: FrameCodec,
    outbound: BytesMut,
    stats: ChannelStats,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Encode a packet into the outbound buffer
    pub fn send<P: Packet>(&mut self, packet: &P) -> ChannelResult<()> {
        self.codec.encode_packet(packet, &mut self.outbound)?;
        self.stats.packets_sent += 1;
        tracing::trace!("Queued {}", describe(P::FAMILY.into(), P::ACTION.into()));
        Ok(())
    }

    /// Encode a pre-serialized body into the outbound buffer
    pub fn send_raw(&mut self, family: u8, action: u8, body: &[u8]) -> ChannelResult<()> {
        self.codec.encode(action, family, body, &mut self.outbound)?;
        self.stats.packets_sent += 1;
        Ok(())
    }

    /// Replace the sequence seed
    pub fn set_sequence(&mut self, start: SequenceStart) {
        tracing::debug!(?start, "Sequence reseeded");
        self.codec.reseed(start);
    }

    pub fn sequence_start(&self) -> SequenceStart {
        self.codec.sequence_start()
    }

    pub fn set_encryption(&mut self, encode_multiple: u8, decode_multiple: u8) {
        tracing::debug!(encode_multiple, decode_multiple, "Encryption multiples set");
        self.codec
            .set_encryption(Encryption::new(encode_multiple, decode_multiple));
    }

    pub fn encryption(&self) -> Encryption {
        self.codec.encryption()
    }

    /// Whether any frames are waiting to be written
    pub fn has_outbound(&self) -> bool {
        !self.outbound.is_empty()
    }

    /// Take every queued frame, leaving the buffer empty
    pub fn take_outbound(&mut self) -> Bytes {
        self.outbound.split().freeze()
    }

    pub fn stats(&self) -> &ChannelStats {
        &self.stats
    }
}

/// A session plus its handler registry
#[derive(Debug)]
pub struct PacketChannel {
    session: Session,
    registry: DispatchRegistry,
}

impl Default for PacketChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl PacketChannel {
    /// Create a channel. The first sequence value is consumed here so the
    /// first real packet carries the second one, as the server expects.
    pub fn new() -> Self {
        let mut session = Session::new();
        session.codec.prime();

        Self {
            session,
            registry: DispatchRegistry::new(),
        }
    }

    /// Register a handler for raw frames of (family, action)
    pub fn register_handler<F>(&mut self, family: u8, action: u8, handler: F)
    where
        F: FnMut(&mut Session, &mut EoReader<'_>) -> ChannelResult<()> + Send + 'static,
    {
        if self.registry.register(family, action, Box::new(handler) as Handler) {
            tracing::debug!("Replaced handler for {}", describe(family, action));
        }
    }

    /// Register a handler that receives `P` already deserialized
    pub fn on<P, F>(&mut self, mut handler: F)
    where
        P: Packet + 'static,
        F: FnMut(&mut Session, P) -> ChannelResult<()> + Send + 'static,
    {
        self.register_handler(P::FAMILY.into(), P::ACTION.into(), move |session, reader| {
            let packet = P::deserialize(reader)?;
            handler(session, packet)
        });
    }

    pub fn send<P: Packet>(&mut self, packet: &P) -> ChannelResult<()> {
        self.session.send(packet)
    }

    pub fn set_sequence(&mut self, start: SequenceStart) {
        self.session.set_sequence(start);
    }

    pub fn set_encryption(&mut self, encode_multiple: u8, decode_multiple: u8) {
        self.session.set_encryption(encode_multiple, decode_multiple);
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    pub fn take_outbound(&mut self) -> Bytes {
        self.session.take_outbound()
    }

    /// Decode one frame body (length prefix already stripped) and run its
    /// handler to completion
    pub fn receive(&mut self, body: BytesMut) -> ChannelResult<Dispatch> {
        let frame = self.session.codec.decode(body)?;
        let (family, action) = (frame.family, frame.action);

        let Some(handler) = self.registry.resolve(family, action) else {
            tracing::warn!("Unhandled message {}", describe(family, action));
            self.session.stats.packets_unhandled += 1;
            return Ok(Dispatch::Unhandled { family, action });
        };

        let mut reader = frame.reader();
        handler(&mut self.session, &mut reader)?;
        self.session.stats.packets_handled += 1;

        Ok(Dispatch::Handled { family, action })
    }
}
