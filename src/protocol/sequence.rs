//! Outgoing packet sequence numbers
//!
//! The server seeds the client's counter several times during a session.
//! Each seed yields a start value; the client then emits `start + counter`
//! where the counter cycles through ten steps.

use super::number::{encode_number, CHAR_MAX, SHORT_MAX};

/// Number of distinct values emitted per seed before they repeat
pub const SEQUENCE_PERIOD: u32 = 10;

/// Source of the current sequence start value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SequenceStart {
    /// Before any seeding
    #[default]
    Zero,
    /// Seeded by a keep-alive challenge
    Ping { seq1: u16, seq2: u8 },
    /// Seeded by the init reply
    Init { seq1: u8, seq2: u8 },
    /// Seeded by an account reply
    Account { sequence_start: u8 },
}

impl SequenceStart {
    pub fn value(&self) -> i32 {
        match *self {
            SequenceStart::Zero => 0,
            SequenceStart::Ping { seq1, seq2 } => i32::from(seq1) - i32::from(seq2),
            SequenceStart::Init { seq1, seq2 } => i32::from(seq1) * 7 + i32::from(seq2) - 13,
            SequenceStart::Account { sequence_start } => i32::from(sequence_start),
        }
    }
}

/// Produces the sequence value for each outgoing packet
#[derive(Debug, Default)]
pub struct Sequencer {
    start: SequenceStart,
    counter: u32,
}

impl Sequencer {
    pub fn new(start: SequenceStart) -> Self {
        Self { start, counter: 0 }
    }

    /// Replace the active seed. The rolling counter carries on.
    pub fn reseed(&mut self, start: SequenceStart) {
        self.start = start;
    }

    pub fn start(&self) -> SequenceStart {
        self.start
    }

    /// Value for the next outgoing packet
    pub fn next_sequence(&mut self) -> i32 {
        let value = self.start.value() + self.counter as i32;
        self.counter = (self.counter + 1) % SEQUENCE_PERIOD;
        value
    }
}

/// Wire form of a sequence value: one char below 253, otherwise a short.
///
/// Values outside the short range wrap around it.
pub fn sequence_bytes(value: i32) -> Vec<u8> {
    let wrapped = value.rem_euclid(SHORT_MAX as i32) as u32;
    let width = if wrapped < CHAR_MAX { 1 } else { 2 };
    encode_number(wrapped)[..width].to_vec()
}
