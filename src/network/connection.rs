//! Connection handling
//!
//! Drives one [`PacketChannel`] over a byte stream:
//! - Splits the stream into frames on the length prefix
//! - Dispatches each frame to completion before reading the next
//! - Flushes whatever the handlers queued in reply

use bytes::BytesMut;
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

use super::channel::{ChannelError, Dispatch, PacketChannel};
use crate::protocol::{CodecError, FrameDecoder, Packet};

/// Connection errors
#[derive(Error, Debug)]
pub enum ConnectionError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Framing error: {0}")]
    Codec(#[from] CodecError),

    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("Connection closed")]
    Closed,

    #[error("Connection timeout")]
    Timeout,
}

pub type ConnectionResult<T> = Result<T, ConnectionError>;

/// State of a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Stream open, frames flowing
    Open,
    /// Connection is closing gracefully
    Closing,
    /// Connection has been closed
    Closed,
}

/// What happened to one inbound frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Received {
    /// The channel routed it (or found no handler)
    Dispatched(Dispatch),
    /// It could not be decoded and was dropped
    Dropped,
}

/// Connection statistics
#[derive(Debug, Default, Clone)]
pub struct ConnectionStats {
    /// Frames read off the stream
    pub frames_received: u64,
    /// Frames dropped as malformed
    pub frames_dropped: u64,
    /// Bytes sent
    pub bytes_sent: u64,
    /// Bytes received
    pub bytes_received: u64,
}

/// A packet channel bound to a stream
pub struct Connection<S = TcpStream> {
    /// Remote peer address, when the stream has one
    remote_addr: Option<SocketAddr>,
    /// The underlying stream
    stream: S,
    /// Codec state and handlers
    channel: PacketChannel,
    /// Stream framing
    decoder: FrameDecoder,
    /// Read buffer
    read_buf: BytesMut,
    /// Connection state
    state: ConnectionState,
    /// Statistics
    stats: ConnectionStats,
}

impl Connection<TcpStream> {
    /// Wrap an established TCP stream
    pub fn from_tcp(stream: TcpStream, channel: PacketChannel) -> Self {
        let remote_addr = stream.peer_addr().ok();
        let mut connection = Self::new(stream, channel);
        connection.remote_addr = remote_addr;
        connection
    }
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S, channel: PacketChannel) -> Self {
        Self {
            remote_addr: None,
            stream,
            channel,
            decoder: FrameDecoder::new(),
            read_buf: BytesMut::with_capacity(4096),
            state: ConnectionState::Open,
            stats: ConnectionStats::default(),
        }
    }

    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.remote_addr
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn stats(&self) -> &ConnectionStats {
        &self.stats
    }

    pub fn channel(&self) -> &PacketChannel {
        &self.channel
    }

    pub fn channel_mut(&mut self) -> &mut PacketChannel {
        &mut self.channel
    }

    /// Encode a packet and write it out immediately
    pub async fn send<P: Packet>(&mut self, packet: &P) -> ConnectionResult<()> {
        self.channel.send(packet)?;
        self.flush().await
    }

    /// Write every frame the channel has queued
    pub async fn flush(&mut self) -> ConnectionResult<()> {
        let outbound = self.channel.take_outbound();
        if outbound.is_empty() {
            return Ok(());
        }

        self.stream.write_all(&outbound).await?;
        self.stream.flush().await?;

        self.stats.bytes_sent += outbound.len() as u64;
        Ok(())
    }

    /// Read the next frame body (returns None on a clean close)
    pub async fn recv_frame(&mut self) -> ConnectionResult<Option<BytesMut>> {
        loop {
            if let Some(body) = self.decoder.decode(&mut self.read_buf)? {
                self.stats.frames_received += 1;
                return Ok(Some(body));
            }

            let mut buf = [0u8; 4096];
            let n = self.stream.read(&mut buf).await?;

            if n == 0 {
                if self.read_buf.is_empty() && self.decoder.is_idle() {
                    return Ok(None);
                } else {
                    return Err(ConnectionError::Closed);
                }
            }

            self.read_buf.extend_from_slice(&buf[..n]);
            self.stats.bytes_received += n as u64;
        }
    }

    /// Read one frame, run its handler and flush any replies.
    ///
    /// Malformed frames are logged and dropped; a rejected handshake ends
    /// the connection with an error. Returns None once the peer closes.
    pub async fn process_next(&mut self) -> ConnectionResult<Option<Received>> {
        let body = match self.recv_frame().await {
            Ok(Some(body)) => body,
            Ok(None) => return Ok(None),
            Err(ConnectionError::Codec(err)) => {
                // framing is lost; skip everything buffered so far
                tracing::warn!("Dropping {} buffered bytes: {}", self.read_buf.len(), err);
                self.read_buf.clear();
                self.decoder.reset();
                self.stats.frames_dropped += 1;
                return Ok(Some(Received::Dropped));
            }
            Err(err) => return Err(err),
        };

        let received = match self.channel.receive(body) {
            Ok(dispatch) => Received::Dispatched(dispatch),
            Err(err @ ChannelError::HandshakeRejected(_)) => return Err(err.into()),
            Err(err) => {
                tracing::warn!("Dropping frame: {}", err);
                self.stats.frames_dropped += 1;
                Received::Dropped
            }
        };

        self.flush().await?;
        Ok(Some(received))
    }

    /// Process frames until the peer closes the stream
    pub async fn run(&mut self) -> ConnectionResult<()> {
        while self.process_next().await?.is_some() {}
        self.state = ConnectionState::Closed;
        Ok(())
    }

    /// Process the next frame, giving up after `timeout`
    pub async fn process_timeout(&mut self, timeout: Duration) -> ConnectionResult<Option<Received>> {
        match tokio::time::timeout(timeout, self.process_next()).await {
            Ok(result) => result,
            Err(_) => Err(ConnectionError::Timeout),
        }
    }

    /// Close the connection gracefully
    pub async fn close(&mut self) -> ConnectionResult<()> {
        self.state = ConnectionState::Closing;
        self.flush().await?;
        self.stream.shutdown().await?;
        self.state = ConnectionState::Closed;
        Ok(())
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, ConnectionState::Open)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::handshake::{HandshakeCoordinator, HandshakeState};
    use crate::network::testing::{client_frames, server_wire};
    use crate::protocol::{
        ConnectionPlayerServerPacket, InitInitServerPacket, InitOk, InitReplyCode, PacketAction,
        CLIENT_VERSION, SENTINEL,
    };
    use tokio::io::{duplex, DuplexStream};
    use tokio_test::{assert_err, assert_ok};

    fn init_ok() -> InitInitServerPacket {
        InitInitServerPacket::Ok(InitOk {
            seq1: 10,
            seq2: 20,
            server_encryption_multiple: 5,
            client_encryption_multiple: 3,
            player_id: 42,
            challenge_response: 0,
        })
    }

    fn connect() -> (Connection<DuplexStream>, DuplexStream, HandshakeCoordinator) {
        let (client_io, server_io) = duplex(8192);
        let mut channel = PacketChannel::new();
        let coordinator = HandshakeCoordinator::new();
        coordinator.install(&mut channel);
        (Connection::new(client_io, channel), server_io, coordinator)
    }

    async fn read_available(server_io: &mut DuplexStream) -> Vec<u8> {
        let mut buf = vec![0u8; 4096];
        let n = server_io.read(&mut buf).await.unwrap();
        buf.truncate(n);
        buf
    }

    #[tokio::test]
    async fn test_full_handshake_over_stream() {
        let (mut conn, mut server_io, coordinator) = connect();

        coordinator
            .request_init(conn.channel_mut(), 77, CLIENT_VERSION, "12345")
            .unwrap();
        assert_ok!(conn.flush().await);

        let request = client_frames(&read_available(&mut server_io).await, 0);
        assert_eq!((request[0].action, request[0].family), (SENTINEL, SENTINEL));

        server_io.write_all(&server_wire(&init_ok(), 0)).await.unwrap();
        let received = assert_ok!(conn.process_next().await);
        assert!(matches!(received, Some(Received::Dispatched(Dispatch::Handled { .. }))));

        let accept = client_frames(&read_available(&mut server_io).await, 3);
        assert_eq!(accept.len(), 1);
        assert_eq!(accept[0].action, u8::from(PacketAction::Accept));

        let challenge = ConnectionPlayerServerPacket { seq1: 7, seq2: 9 };
        server_io.write_all(&server_wire(&challenge, 5)).await.unwrap();
        assert_ok!(conn.process_next().await);

        let ack = client_frames(&read_available(&mut server_io).await, 3);
        assert_eq!(ack.len(), 1);
        assert_eq!(ack[0].action, u8::from(PacketAction::Ping));
        assert_eq!(coordinator.state(), HandshakeState::Ready);
    }

    #[tokio::test]
    async fn test_malformed_frame_is_dropped_not_fatal() {
        let (mut conn, mut server_io, coordinator) = connect();

        // one-byte body: too short for a header
        server_io.write_all(&[2, 0xFE, 0x42]).await.unwrap();
        server_io.write_all(&server_wire(&init_ok(), 0)).await.unwrap();

        assert_eq!(assert_ok!(conn.process_next().await), Some(Received::Dropped));
        assert_ok!(conn.process_next().await);

        assert_eq!(conn.stats().frames_dropped, 1);
        assert_eq!(conn.stats().frames_received, 2);
        assert_eq!(coordinator.state(), HandshakeState::AwaitingWelcomeOrPing);
    }

    #[tokio::test]
    async fn test_rejection_ends_connection() {
        let (mut conn, mut server_io, _coordinator) = connect();

        let reply = InitInitServerPacket::Rejected(InitReplyCode::OutOfDate);
        server_io.write_all(&server_wire(&reply, 0)).await.unwrap();

        let err = assert_err!(conn.run().await);
        assert!(matches!(
            err,
            ConnectionError::Channel(ChannelError::HandshakeRejected(InitReplyCode::OutOfDate))
        ));
    }

    #[tokio::test]
    async fn test_clean_close() {
        let (mut conn, server_io, _coordinator) = connect();
        drop(server_io);

        assert_ok!(conn.run().await);
        assert_eq!(conn.state(), ConnectionState::Closed);
        assert!(!conn.is_active());
    }

    #[tokio::test]
    async fn test_close_mid_frame_is_an_error() {
        let (mut conn, mut server_io, _coordinator) = connect();
        server_io.write_all(&[10, 0xFE, 1, 2]).await.unwrap();
        drop(server_io);

        let err = assert_err!(conn.process_next().await);
        assert!(matches!(err, ConnectionError::Closed));
    }

    #[tokio::test]
    async fn test_close_after_length_prefix_is_an_error() {
        let (mut conn, mut server_io, _coordinator) = connect();
        server_io.write_all(&[10, 0xFE]).await.unwrap();
        drop(server_io);

        let err = assert_err!(conn.process_next().await);
        assert!(matches!(err, ConnectionError::Closed));
    }

    #[tokio::test]
    async fn test_oversized_length_prefix_resyncs() {
        let (mut conn, mut server_io, coordinator) = connect();

        server_io.write_all(&[0xFF, 0xFF, 1, 2, 3]).await.unwrap();
        assert_eq!(assert_ok!(conn.process_next().await), Some(Received::Dropped));
        assert_eq!(conn.stats().frames_dropped, 1);
        assert!(conn.is_active());

        server_io.write_all(&server_wire(&init_ok(), 0)).await.unwrap();
        let received = assert_ok!(conn.process_next().await);
        assert!(matches!(received, Some(Received::Dispatched(Dispatch::Handled { .. }))));
        assert_eq!(coordinator.state(), HandshakeState::AwaitingWelcomeOrPing);
    }

    #[tokio::test]
    async fn test_process_timeout() {
        let (mut conn, _server_io, _coordinator) = connect();
        let err = assert_err!(conn.process_timeout(Duration::from_millis(20)).await);
        assert!(matches!(err, ConnectionError::Timeout));
    }
}
