//! Handler routing by (family, action)

use std::collections::HashMap;

use super::channel::{ChannelResult, Session};
use crate::protocol::EoReader;

/// Callback for one (family, action) pair. It receives the session so it can
/// reply, and a reader over the still-serialized payload.
pub type Handler = Box<dyn FnMut(&mut Session, &mut EoReader<'_>) -> ChannelResult<()> + Send>;

/// One handler per (family, action); registering again replaces it
#[derive(Default)]
pub struct DispatchRegistry {
    handlers: HashMap<u16, Handler>,
}

#[inline]
fn handler_key(family: u8, action: u8) -> u16 {
    (u16::from(family) << 8) | u16::from(action)
}

impl DispatchRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a handler, returning true if it replaced an existing one
    pub fn register(&mut self, family: u8, action: u8, handler: Handler) -> bool {
        self.handlers
            .insert(handler_key(family, action), handler)
            .is_some()
    }

    pub fn resolve(&mut self, family: u8, action: u8) -> Option<&mut Handler> {
        self.handlers.get_mut(&handler_key(family, action))
    }

    pub fn contains(&self, family: u8, action: u8) -> bool {
        self.handlers.contains_key(&handler_key(family, action))
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl std::fmt::Debug for DispatchRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchRegistry")
            .field("handlers", &self.handlers.len())
            .finish()
    }
}
