//! Packet family and action codes
//!
//! A packet's header names its family (the subsystem it belongs to) and its
//! action (what it does within that family).

use std::fmt;

macro_rules! packet_codes {
    ($(#[$meta:meta])* $name:ident { $($variant:ident = $value:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u8)]
        pub enum $name {
            $($variant = $value),+
        }

        impl From<$name> for u8 {
            fn from(code: $name) -> u8 {
                code as u8
            }
        }

        impl TryFrom<u8> for $name {
            type Error = u8;

            fn try_from(value: u8) -> Result<Self, u8> {
                match value {
                    $($value => Ok($name::$variant),)+
                    other => Err(other),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Debug::fmt(self, f)
            }
        }
    };
}

packet_codes! {
    /// Coarse message category
    PacketFamily {
        Connection = 1,
        Account = 2,
        Character = 3,
        Login = 4,
        Welcome = 5,
        Walk = 6,
        Face = 7,
        Chair = 8,
        Emote = 9,
        Attack = 11,
        Spell = 12,
        Shop = 13,
        Item = 14,
        StatSkill = 16,
        Global = 17,
        Talk = 18,
        Warp = 19,
        Jukebox = 21,
        Players = 22,
        Avatar = 23,
        Party = 24,
        Refresh = 25,
        Npc = 26,
        PlayerRange = 27,
        NpcRange = 28,
        Range = 29,
        Paperdoll = 30,
        Effect = 31,
        Trade = 32,
        Chest = 33,
        Door = 34,
        Message = 35,
        Bank = 36,
        Locker = 37,
        Barber = 38,
        Guild = 39,
        Music = 40,
        Sit = 41,
        Recover = 42,
        Board = 43,
        Cast = 44,
        Arena = 45,
        Priest = 46,
        Marriage = 47,
        AdminInteract = 48,
        Citizen = 49,
        Quest = 50,
        Book = 51,
        Error = 250,
        Init = 255,
    }
}

packet_codes! {
    /// Verb within a family
    PacketAction {
        Request = 1,
        Accept = 2,
        Reply = 3,
        Remove = 4,
        Agree = 5,
        Create = 6,
        Add = 7,
        Player = 8,
        Take = 9,
        Use = 10,
        Buy = 11,
        Sell = 12,
        Open = 13,
        Close = 14,
        Msg = 15,
        Spec = 16,
        Admin = 17,
        List = 18,
        Tell = 20,
        Report = 21,
        Announce = 22,
        Server = 23,
        Drop = 24,
        Junk = 25,
        Obtain = 26,
        Get = 27,
        Kick = 28,
        Rank = 29,
        TargetSelf = 30,
        TargetOther = 31,
        TargetGroup = 33,
        Dialog = 34,
        Ping = 240,
        Pong = 241,
        Net242 = 242,
        Net243 = 243,
        Net244 = 244,
        Error = 250,
        Init = 255,
    }
}

/// Render a raw (family, action) pair, naming the codes we know
pub fn describe(family: u8, action: u8) -> String {
    let family = PacketFamily::try_from(family)
        .map(|f| f.to_string())
        .unwrap_or_else(|raw| format!("0x{:02X}", raw));
    let action = PacketAction::try_from(action)
        .map(|a| a.to_string())
        .unwrap_or_else(|raw| format!("0x{:02X}", raw));
    format!("{}/{}", family, action)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_round_trip_through_u8() {
        assert_eq!(u8::from(PacketFamily::Init), 0xFF);
        assert_eq!(PacketFamily::try_from(5), Ok(PacketFamily::Welcome));
        assert_eq!(PacketAction::try_from(240), Ok(PacketAction::Ping));
        assert_eq!(PacketAction::try_from(19), Err(19));
    }

    #[test]
    fn test_describe() {
        assert_eq!(describe(1, 8), "Connection/Player");
        assert_eq!(describe(200, 3), "0xC8/Reply");
    }
}
