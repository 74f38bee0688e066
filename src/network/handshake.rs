//! Connection bootstrap
//!
//! Drives the client side of the handshake on top of a [`PacketChannel`]:
//!
//! ```text
//! Uninitialized -> AwaitingInitReply -> AwaitingWelcomeOrPing -> Ready
//!                         |
//!                         +-> Failed (any init reply other than Ok)
//! ```
//!
//! The coordinator only installs handlers; the server's replies move it
//! along. Keep-alive challenges reseed the sequence for the rest of the
//! session.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info, warn};

use super::channel::{ChannelError, ChannelResult, PacketChannel, Session};
use crate::protocol::{
    AccountReplyServerPacket, ConnectionAcceptClientPacket, ConnectionPingClientPacket,
    ConnectionPlayerServerPacket, InitInitClientPacket, InitInitServerPacket, InitOk, InitReplyCode,
    SequenceStart, Version,
};

/// Handshake progress
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HandshakeState {
    #[default]
    Uninitialized,
    AwaitingInitReply,
    AwaitingWelcomeOrPing,
    Ready,
    Failed(InitReplyCode),
}

impl HandshakeState {
    pub fn is_failed(&self) -> bool {
        matches!(self, HandshakeState::Failed(_))
    }
}

#[derive(Debug, Default)]
struct Progress {
    state: HandshakeState,
    player_id: Option<u16>,
    keepalives: u64,
}

/// Shared view of the handshake; clones observe the same progress
#[derive(Debug, Clone, Default)]
pub struct HandshakeCoordinator {
    progress: Arc<Mutex<Progress>>,
}

impl HandshakeCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the handshake handlers on a channel and start waiting for
    /// the init reply. Nothing is sent.
    pub fn install(&self, channel: &mut PacketChannel) {
        let progress = self.progress.clone();
        channel.on(move |session, reply: InitInitServerPacket| {
            on_init_reply(&progress, session, reply)
        });

        let progress = self.progress.clone();
        channel.on(move |session, challenge: ConnectionPlayerServerPacket| {
            on_keepalive(&progress, session, challenge)
        });

        channel.on(|session, reply: AccountReplyServerPacket| {
            if let Some(sequence_start) = reply.sequence_start {
                session.set_sequence(SequenceStart::Account { sequence_start });
            }
            Ok(())
        });

        self.lock().state = HandshakeState::AwaitingInitReply;
        debug!("Handshake handlers installed");
    }

    /// Send the raw init request that opens a session
    pub fn request_init(
        &self,
        channel: &mut PacketChannel,
        challenge: u32,
        version: Version,
        hdid: &str,
    ) -> ChannelResult<()> {
        info!(%version, "Requesting init");
        channel.send(&InitInitClientPacket {
            challenge,
            version,
            hdid: hdid.to_string(),
        })
    }

    pub fn state(&self) -> HandshakeState {
        self.lock().state
    }

    /// Player id assigned by the init reply
    pub fn player_id(&self) -> Option<u16> {
        self.lock().player_id
    }

    /// Keep-alive challenges answered so far
    pub fn keepalives(&self) -> u64 {
        self.lock().keepalives
    }

    fn lock(&self) -> MutexGuard<'_, Progress> {
        lock(&self.progress)
    }
}

fn lock(progress: &Mutex<Progress>) -> MutexGuard<'_, Progress> {
    progress.lock().unwrap_or_else(PoisonError::into_inner)
}

fn on_init_reply(
    progress: &Mutex<Progress>,
    session: &mut Session,
    reply: InitInitServerPacket,
) -> ChannelResult<()> {
    let mut progress = lock(progress);

    let ok: InitOk = match reply {
        InitInitServerPacket::Ok(ok) => ok,
        InitInitServerPacket::Rejected(code) => {
            warn!(%code, "Init rejected");
            progress.state = HandshakeState::Failed(code);
            return Err(ChannelError::HandshakeRejected(code));
        }
    };

    // encryption is never renegotiated within a session
    if progress.state != HandshakeState::AwaitingInitReply {
        warn!(state = ?progress.state, "Ignoring repeated init reply");
        return Ok(());
    }

    session.set_encryption(ok.client_encryption_multiple, ok.server_encryption_multiple);
    session.set_sequence(SequenceStart::Init {
        seq1: ok.seq1,
        seq2: ok.seq2,
    });
    session.send(&ConnectionAcceptClientPacket {
        client_encryption_multiple: ok.client_encryption_multiple,
        server_encryption_multiple: ok.server_encryption_multiple,
        player_id: ok.player_id,
    })?;

    progress.player_id = Some(ok.player_id);
    progress.state = HandshakeState::AwaitingWelcomeOrPing;
    info!(player_id = ok.player_id, "Init accepted");

    Ok(())
}

fn on_keepalive(
    progress: &Mutex<Progress>,
    session: &mut Session,
    challenge: ConnectionPlayerServerPacket,
) -> ChannelResult<()> {
    session.set_sequence(SequenceStart::Ping {
        seq1: challenge.seq1,
        seq2: challenge.seq2,
    });
    session.send(&ConnectionPingClientPacket)?;

    let mut progress = lock(progress);
    progress.keepalives += 1;
    if progress.state == HandshakeState::AwaitingWelcomeOrPing {
        progress.state = HandshakeState::Ready;
        info!("Connection ready");
    }

    Ok(())
}
