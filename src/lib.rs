//! eonet - Client packet transport for a real-time multiplayer game
//!
//! Frames, sequences and obfuscates packets for the game server, routes
//! inbound frames to registered handlers and runs the connection
//! handshake.

pub mod config;
pub mod network;
pub mod protocol;
