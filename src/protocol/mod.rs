//! Protocol module - Defines the wire protocol spoken with the game server
//!
//! Every frame on the socket looks like this:
//! - 2 bytes body length (protocol short)
//! - 1 byte action, 1 byte family
//! - 1 or 2 bytes sequence value (omitted for raw frames)
//! - Variable length payload
//!
//! Everything after the length prefix is obfuscated unless both header
//! bytes are `0xFF`.

mod codec;
mod encrypt;
mod family;
mod message;
mod number;
mod reader;
mod sequence;
mod writer;

pub use codec::*;
pub use encrypt::*;
pub use family::*;
pub use message::*;
pub use number::*;
pub use reader::*;
pub use sequence::*;
pub use writer::*;

use thiserror::Error;

/// Default game server port
pub const DEFAULT_PORT: u16 = 8078;

/// Client version reported in the init request
pub const CLIENT_VERSION: Version = Version {
    major: 0,
    minor: 0,
    patch: 28,
};

/// Field encoding errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DataError {
    #[error("Value {value} out of range (max: {max})")]
    NumberOutOfRange { value: u32, max: u32 },

    #[error("Read past end of data: needed {needed} bytes, {remaining} remaining")]
    Underflow { needed: usize, remaining: usize },
}

pub type DataResult<T> = Result<T, DataError>;
