//! Protocol packet definitions
//!
//! Only the packets the transport drives itself live here: the init
//! exchange, the connection accept, the keep-alive pair and the account
//! reply that reseeds the sequence. Game packets are handled above this
//! layer through raw handler registration.

use super::{DataResult, EoReader, EoWriter, PacketAction, PacketFamily};

/// A packet with a fixed (family, action) header and a field codec
pub trait Packet: Sized {
    const FAMILY: PacketFamily;
    const ACTION: PacketAction;

    fn serialize(&self, writer: &mut EoWriter) -> DataResult<()>;

    fn deserialize(reader: &mut EoReader<'_>) -> DataResult<Self>;
}

/// Client version reported during init
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Version {
    pub major: u8,
    pub minor: u8,
    pub patch: u8,
}

impl Version {
    pub fn new(major: u8, minor: u8, patch: u8) -> Self {
        Self { major, minor, patch }
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Marker char the server expects between the version and the hdid
const INIT_MARKER: u32 = 112;

/// First packet of a session, sent without sequence or obfuscation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitInitClientPacket {
    pub challenge: u32,
    pub version: Version,
    pub hdid: String,
}

impl Packet for InitInitClientPacket {
    const FAMILY: PacketFamily = PacketFamily::Init;
    const ACTION: PacketAction = PacketAction::Init;

    fn serialize(&self, writer: &mut EoWriter) -> DataResult<()> {
        writer.add_three(self.challenge)?;
        writer.add_char(u32::from(self.version.major))?;
        writer.add_char(u32::from(self.version.minor))?;
        writer.add_char(u32::from(self.version.patch))?;
        writer.add_char(INIT_MARKER)?;
        writer.add_char(self.hdid.len() as u32)?;
        writer.add_string(&self.hdid);
        Ok(())
    }

    fn deserialize(reader: &mut EoReader<'_>) -> DataResult<Self> {
        let challenge = reader.get_three()?;
        let version = Version::new(
            reader.get_char()? as u8,
            reader.get_char()? as u8,
            reader.get_char()? as u8,
        );
        let _marker = reader.get_char()?;
        let hdid_length = reader.get_char()? as usize;
        let hdid = reader.get_fixed_string(hdid_length)?;
        Ok(Self {
            challenge,
            version,
            hdid,
        })
    }
}

/// Outcome of the init request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitReplyCode {
    OutOfDate,
    Ok,
    Banned,
    WarpMap,
    FileEmf,
    FileEif,
    FileEnf,
    FileEsf,
    PlayersList,
    MapMutation,
    PlayersListFriends,
    FileEcf,
    Unrecognized(u8),
}

impl From<u8> for InitReplyCode {
    fn from(value: u8) -> Self {
        match value {
            1 => InitReplyCode::OutOfDate,
            2 => InitReplyCode::Ok,
            3 => InitReplyCode::Banned,
            4 => InitReplyCode::WarpMap,
            5 => InitReplyCode::FileEmf,
            6 => InitReplyCode::FileEif,
            7 => InitReplyCode::FileEnf,
            8 => InitReplyCode::FileEsf,
            9 => InitReplyCode::PlayersList,
            10 => InitReplyCode::MapMutation,
            11 => InitReplyCode::PlayersListFriends,
            12 => InitReplyCode::FileEcf,
            other => InitReplyCode::Unrecognized(other),
        }
    }
}

impl From<InitReplyCode> for u8 {
    fn from(code: InitReplyCode) -> u8 {
        match code {
            InitReplyCode::OutOfDate => 1,
            InitReplyCode::Ok => 2,
            InitReplyCode::Banned => 3,
            InitReplyCode::WarpMap => 4,
            InitReplyCode::FileEmf => 5,
            InitReplyCode::FileEif => 6,
            InitReplyCode::FileEnf => 7,
            InitReplyCode::FileEsf => 8,
            InitReplyCode::PlayersList => 9,
            InitReplyCode::MapMutation => 10,
            InitReplyCode::PlayersListFriends => 11,
            InitReplyCode::FileEcf => 12,
            InitReplyCode::Unrecognized(other) => other,
        }
    }
}

impl std::fmt::Display for InitReplyCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InitReplyCode::Unrecognized(code) => write!(f, "unrecognized ({})", code),
            known => write!(f, "{:?}", known),
        }
    }
}

/// Parameters handed out by a successful init reply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InitOk {
    pub seq1: u8,
    pub seq2: u8,
    pub server_encryption_multiple: u8,
    pub client_encryption_multiple: u8,
    pub player_id: u16,
    pub challenge_response: u32,
}

/// Server's answer to [`InitInitClientPacket`], also sent raw
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitInitServerPacket {
    Ok(InitOk),
    /// Any other reply code; the trailing data is not interpreted
    Rejected(InitReplyCode),
}

impl Packet for InitInitServerPacket {
    const FAMILY: PacketFamily = PacketFamily::Init;
    const ACTION: PacketAction = PacketAction::Init;

    fn serialize(&self, writer: &mut EoWriter) -> DataResult<()> {
        match self {
            InitInitServerPacket::Ok(ok) => {
                writer.add_byte(InitReplyCode::Ok.into());
                writer.add_byte(ok.seq1);
                writer.add_byte(ok.seq2);
                writer.add_byte(ok.server_encryption_multiple);
                writer.add_byte(ok.client_encryption_multiple);
                writer.add_short(u32::from(ok.player_id))?;
                writer.add_three(ok.challenge_response)?;
            }
            InitInitServerPacket::Rejected(code) => {
                writer.add_byte((*code).into());
            }
        }
        Ok(())
    }

    fn deserialize(reader: &mut EoReader<'_>) -> DataResult<Self> {
        match InitReplyCode::from(reader.get_byte()?) {
            InitReplyCode::Ok => Ok(InitInitServerPacket::Ok(InitOk {
                seq1: reader.get_byte()?,
                seq2: reader.get_byte()?,
                server_encryption_multiple: reader.get_byte()?,
                client_encryption_multiple: reader.get_byte()?,
                player_id: reader.get_short()? as u16,
                challenge_response: reader.get_three()?,
            })),
            code => Ok(InitInitServerPacket::Rejected(code)),
        }
    }
}

/// Confirms the negotiated multiples back to the server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionAcceptClientPacket {
    pub client_encryption_multiple: u8,
    pub server_encryption_multiple: u8,
    pub player_id: u16,
}

impl Packet for ConnectionAcceptClientPacket {
    const FAMILY: PacketFamily = PacketFamily::Connection;
    const ACTION: PacketAction = PacketAction::Accept;

    fn serialize(&self, writer: &mut EoWriter) -> DataResult<()> {
        writer.add_short(u32::from(self.client_encryption_multiple))?;
        writer.add_short(u32::from(self.server_encryption_multiple))?;
        writer.add_short(u32::from(self.player_id))
    }

    fn deserialize(reader: &mut EoReader<'_>) -> DataResult<Self> {
        Ok(Self {
            client_encryption_multiple: reader.get_short()? as u8,
            server_encryption_multiple: reader.get_short()? as u8,
            player_id: reader.get_short()? as u16,
        })
    }
}

/// Keep-alive challenge carrying a fresh sequence seed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionPlayerServerPacket {
    pub seq1: u16,
    pub seq2: u8,
}

impl Packet for ConnectionPlayerServerPacket {
    const FAMILY: PacketFamily = PacketFamily::Connection;
    const ACTION: PacketAction = PacketAction::Player;

    fn serialize(&self, writer: &mut EoWriter) -> DataResult<()> {
        writer.add_short(u32::from(self.seq1))?;
        writer.add_char(u32::from(self.seq2))
    }

    fn deserialize(reader: &mut EoReader<'_>) -> DataResult<Self> {
        Ok(Self {
            seq1: reader.get_short()? as u16,
            seq2: reader.get_char()? as u8,
        })
    }
}

/// Keep-alive acknowledgment. Has no fields; the body is a one-byte filler
/// because the server drops empty packets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConnectionPingClientPacket;

impl Packet for ConnectionPingClientPacket {
    const FAMILY: PacketFamily = PacketFamily::Connection;
    const ACTION: PacketAction = PacketAction::Ping;

    fn serialize(&self, writer: &mut EoWriter) -> DataResult<()> {
        writer.add_string("k");
        Ok(())
    }

    fn deserialize(_reader: &mut EoReader<'_>) -> DataResult<Self> {
        Ok(Self)
    }
}

/// Highest account reply code that is an outcome rather than a session id
const ACCOUNT_REPLY_MAX_OUTCOME: u32 = 9;

/// Reply to account requests. Codes above the outcome range are session
/// ids and carry a new sequence start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountReplyServerPacket {
    pub reply_code: u16,
    pub sequence_start: Option<u8>,
}

impl Packet for AccountReplyServerPacket {
    const FAMILY: PacketFamily = PacketFamily::Account;
    const ACTION: PacketAction = PacketAction::Reply;

    fn serialize(&self, writer: &mut EoWriter) -> DataResult<()> {
        writer.add_short(u32::from(self.reply_code))?;
        if let Some(sequence_start) = self.sequence_start {
            writer.add_char(u32::from(sequence_start))?;
            writer.add_string("OK");
        }
        Ok(())
    }

    fn deserialize(reader: &mut EoReader<'_>) -> DataResult<Self> {
        let reply_code = reader.get_short()?;
        let sequence_start = if reply_code > ACCOUNT_REPLY_MAX_OUTCOME {
            Some(reader.get_char()? as u8)
        } else {
            None
        };
        Ok(Self {
            reply_code: reply_code as u16,
            sequence_start,
        })
    }
}
