//! Game client
//!
//! Connects to a game server, runs the handshake and keeps the session
//! alive on a background task.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, RwLock};

use super::channel::{ChannelError, Dispatch, PacketChannel};
use super::connection::{Connection, ConnectionError, Received};
use super::handshake::{HandshakeCoordinator, HandshakeState};
use super::NetworkConfig;

/// Upper bound (exclusive) of the random init challenge
pub const MAX_CHALLENGE: u32 = 11_092_110;

/// Client errors
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),

    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("Already connected")]
    AlreadyConnected,

    #[error("Not connected")]
    NotConnected,

    #[error("Connection timeout")]
    Timeout,
}

pub type ClientResult<T> = Result<T, ClientError>;

/// Events emitted by the client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// TCP connection established and init requested
    Connected { server_addr: SocketAddr },
    /// The handshake moved to a new state
    Handshake { state: HandshakeState },
    /// A frame arrived that no handler claimed
    Unhandled { family: u8, action: u8 },
    /// Disconnected from server
    Disconnected { reason: String },
}

/// Client state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    Disconnected,
    Connecting,
    Connected,
}

/// Random challenge for the init request
pub fn generate_challenge() -> u32 {
    (uuid::Uuid::new_v4().as_u128() % u128::from(MAX_CHALLENGE - 1)) as u32 + 1
}

/// Game client
pub struct Client {
    /// Client configuration
    config: NetworkConfig,
    /// Current state
    state: Arc<RwLock<ClientState>>,
    /// Handshake progress of the current session
    handshake: Arc<RwLock<Option<HandshakeCoordinator>>>,
    /// Event sender
    event_tx: mpsc::Sender<ClientEvent>,
    /// Event receiver (for consumers)
    event_rx: Option<mpsc::Receiver<ClientEvent>>,
    /// Shutdown signal
    shutdown_tx: Arc<RwLock<Option<mpsc::Sender<()>>>>,
}

impl Client {
    /// Create a new client
    pub fn new(config: NetworkConfig) -> Self {
        let (event_tx, event_rx) = mpsc::channel(256);

        Self {
            config,
            state: Arc::new(RwLock::new(ClientState::Disconnected)),
            handshake: Arc::new(RwLock::new(None)),
            event_tx,
            event_rx: Some(event_rx),
            shutdown_tx: Arc::new(RwLock::new(None)),
        }
    }

    /// Take the event receiver (can only be called once)
    pub fn take_event_receiver(&mut self) -> Option<mpsc::Receiver<ClientEvent>> {
        self.event_rx.take()
    }

    /// Connect to a server by address
    pub async fn connect(&self, server_addr: SocketAddr) -> ClientResult<()> {
        self.connect_with(server_addr, PacketChannel::new()).await
    }

    /// Connect using a channel that already has game handlers registered.
    /// The handshake handlers are installed on top of it.
    pub async fn connect_with(&self, server_addr: SocketAddr, mut channel: PacketChannel) -> ClientResult<()> {
        {
            let mut state = self.state.write().await;
            if *state != ClientState::Disconnected {
                return Err(ClientError::AlreadyConnected);
            }
            *state = ClientState::Connecting;
        }

        tracing::info!("Connecting to {}", server_addr);

        let stream = match tokio::time::timeout(
            Duration::from_millis(self.config.connect_timeout_ms),
            TcpStream::connect(server_addr),
        )
        .await
        {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                self.set_state(ClientState::Disconnected).await;
                return Err(ClientError::Io(e));
            }
            Err(_) => {
                self.set_state(ClientState::Disconnected).await;
                return Err(ClientError::Timeout);
            }
        };

        let coordinator = HandshakeCoordinator::new();
        coordinator.install(&mut channel);
        let mut conn = Connection::from_tcp(stream, channel);

        let requested = coordinator.request_init(
            conn.channel_mut(),
            generate_challenge(),
            self.config.version,
            &self.config.hdid,
        );
        if let Err(e) = requested {
            self.set_state(ClientState::Disconnected).await;
            return Err(e.into());
        }
        if let Err(e) = conn.flush().await {
            self.set_state(ClientState::Disconnected).await;
            return Err(e.into());
        }

        *self.handshake.write().await = Some(coordinator.clone());

        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        *self.shutdown_tx.write().await = Some(shutdown_tx);

        self.set_state(ClientState::Connected).await;

        let _ = self.event_tx.send(ClientEvent::Connected { server_addr }).await;

        // Spawn the message loop
        let event_tx = self.event_tx.clone();
        let state = self.state.clone();

        tokio::spawn(async move {
            let mut last_state = coordinator.state();

            let disconnect_reason = loop {
                tokio::select! {
                    result = conn.process_next() => {
                        match result {
                            Ok(Some(received)) => {
                                if let Received::Dispatched(Dispatch::Unhandled { family, action }) = received {
                                    let _ = event_tx.send(ClientEvent::Unhandled { family, action }).await;
                                }

                                let current = coordinator.state();
                                if current != last_state {
                                    last_state = current;
                                    let _ = event_tx.send(ClientEvent::Handshake { state: current }).await;
                                }
                            }
                            Ok(None) => {
                                break "Connection closed".to_string();
                            }
                            Err(e) => {
                                let current = coordinator.state();
                                if current.is_failed() {
                                    let _ = event_tx.send(ClientEvent::Handshake { state: current }).await;
                                }
                                tracing::error!("Connection error: {}", e);
                                break format!("Error: {}", e);
                            }
                        }
                    }

                    // Shutdown signal
                    _ = shutdown_rx.recv() => {
                        break "Client shutdown requested".to_string();
                    }
                }
            };

            {
                let mut s = state.write().await;
                *s = ClientState::Disconnected;
            }

            let _ = conn.close().await;

            let _ = event_tx
                .send(ClientEvent::Disconnected {
                    reason: disconnect_reason,
                })
                .await;
        });

        Ok(())
    }

    /// Connect to a server by hostname
    pub async fn connect_hostname(&self, hostname: &str, port: u16) -> ClientResult<()> {
        let addr = super::resolve_host(hostname, port).await?;
        self.connect(addr).await
    }

    /// Disconnect from the server
    pub async fn disconnect(&self) -> ClientResult<()> {
        if *self.state.read().await == ClientState::Disconnected {
            return Err(ClientError::NotConnected);
        }

        if let Some(tx) = &*self.shutdown_tx.read().await {
            let _ = tx.send(()).await;
        }

        Ok(())
    }

    /// Get the current state
    pub async fn state(&self) -> ClientState {
        *self.state.read().await
    }

    /// Handshake state of the current or last session
    pub async fn handshake_state(&self) -> Option<HandshakeState> {
        self.handshake.read().await.as_ref().map(|h| h.state())
    }

    /// Player id assigned by the server, once the init reply arrived
    pub async fn player_id(&self) -> Option<u16> {
        self.handshake.read().await.as_ref().and_then(|h| h.player_id())
    }

    /// Check if connected
    pub async fn is_connected(&self) -> bool {
        *self.state.read().await == ClientState::Connected
    }

    async fn set_state(&self, new_state: ClientState) {
        *self.state.write().await = new_state;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::testing::{client_frames, server_wire};
    use crate::protocol::{InitInitServerPacket, InitOk, InitReplyCode, PacketAction, SENTINEL};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_client_creation() {
        let client = Client::new(NetworkConfig::default());
        assert!(!client.is_connected().await);
        assert_eq!(client.handshake_state().await, None);
    }

    #[test]
    fn test_challenge_range() {
        for _ in 0..100 {
            let challenge = generate_challenge();
            assert!(challenge >= 1 && challenge < MAX_CHALLENGE);
        }
    }

    #[tokio::test]
    async fn test_disconnect_when_not_connected() {
        let client = Client::new(NetworkConfig::default());
        assert!(matches!(
            client.disconnect().await,
            Err(ClientError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn test_connect_and_negotiate() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 1024];

            let n = socket.read(&mut buf).await.unwrap();
            let request = client_frames(&buf[..n], 0);
            assert_eq!((request[0].action, request[0].family), (SENTINEL, SENTINEL));

            let reply = InitInitServerPacket::Ok(InitOk {
                seq1: 10,
                seq2: 20,
                server_encryption_multiple: 5,
                client_encryption_multiple: 3,
                player_id: 42,
                challenge_response: 0,
            });
            socket.write_all(&server_wire(&reply, 0)).await.unwrap();

            let n = socket.read(&mut buf).await.unwrap();
            let accept = client_frames(&buf[..n], 3);
            assert_eq!(accept[0].action, u8::from(PacketAction::Accept));
        });

        let mut client = Client::new(NetworkConfig::default().with_hdid("1".to_string()));
        let mut events = client.take_event_receiver().unwrap();
        client.connect(addr).await.unwrap();

        assert_eq!(
            events.recv().await,
            Some(ClientEvent::Connected { server_addr: addr })
        );
        assert_eq!(
            events.recv().await,
            Some(ClientEvent::Handshake {
                state: HandshakeState::AwaitingWelcomeOrPing
            })
        );
        assert_eq!(client.player_id().await, Some(42));

        server.await.unwrap();
        assert!(matches!(
            events.recv().await,
            Some(ClientEvent::Disconnected { .. })
        ));
        assert!(!client.is_connected().await);
    }

    #[tokio::test]
    async fn test_rejected_init_reports_failure() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 1024];
            socket.read(&mut buf).await.unwrap();

            let reply = InitInitServerPacket::Rejected(InitReplyCode::OutOfDate);
            socket.write_all(&server_wire(&reply, 0)).await.unwrap();
            // hold the socket until the client hangs up
            let _ = socket.read(&mut buf).await;
        });

        let mut client = Client::new(NetworkConfig::default());
        let mut events = client.take_event_receiver().unwrap();
        client.connect(addr).await.unwrap();

        assert!(matches!(
            events.recv().await,
            Some(ClientEvent::Connected { .. })
        ));
        assert_eq!(
            events.recv().await,
            Some(ClientEvent::Handshake {
                state: HandshakeState::Failed(InitReplyCode::OutOfDate)
            })
        );
        assert!(matches!(
            events.recv().await,
            Some(ClientEvent::Disconnected { .. })
        ));
        assert_eq!(
            client.handshake_state().await,
            Some(HandshakeState::Failed(InitReplyCode::OutOfDate))
        );

        server.await.unwrap();
    }
}
