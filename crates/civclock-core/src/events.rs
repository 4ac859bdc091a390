//! Asynchronous reply events.
//!
//! A rig channel publishes a [`ReplyEvent`] through a
//! [`tokio::sync::broadcast`] channel whenever the rig answers a command.
//! Events arrive on the channel's own task, outside the caller's control,
//! and may belong to commands or rigs the caller never sent to.

/// A reply observed on the rig channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyEvent {
    /// Rig number the event originates from.
    pub rig: u8,
    /// Raw bytes of the command echo.
    pub command: Vec<u8>,
    /// Raw reply bytes: the command echo followed by the rig's answer.
    pub reply: Vec<u8>,
}

impl ReplyEvent {
    /// Build an event from its parts.
    pub fn new(rig: u8, command: impl Into<Vec<u8>>, reply: impl Into<Vec<u8>>) -> Self {
        ReplyEvent {
            rig,
            command: command.into(),
            reply: reply.into(),
        }
    }
}
