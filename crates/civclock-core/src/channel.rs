//! Rig channel capability.
//!
//! A [`RigChannel`] is what the synchronization engine talks to: it
//! transmits complete frames and publishes the rig's replies as
//! [`ReplyEvent`]s on a broadcast channel. Implementations are selected at
//! configuration time: the CI-V serial link in `civclock-icom` for real
//! hardware, `MockRig` from `civclock-test-harness` for tests and dry runs.

use std::fmt;

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::error::Result;
use crate::events::ReplyEvent;

/// Readiness of a rig as reported by its channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RigStatus {
    /// The rig slot exists but has no rig configured.
    NotConfigured,
    /// The channel has been disabled.
    Disabled,
    /// The serial port is held by another program.
    PortBusy,
    /// The transceiver does not answer (switched off, wrong baud rate).
    NotResponding,
    /// Ready for commands.
    Online,
}

impl fmt::Display for RigStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RigStatus::NotConfigured => write!(f, "not configured"),
            RigStatus::Disabled => write!(f, "disabled"),
            RigStatus::PortBusy => write!(f, "port busy"),
            RigStatus::NotResponding => write!(f, "not responding"),
            RigStatus::Online => write!(f, "online"),
        }
    }
}

/// Identity of one rig slot on a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RigInfo {
    /// Rig type string as the channel knows it (e.g. `"IC-7300-DATA"`).
    pub rig_type: String,
    /// Current readiness.
    pub status: RigStatus,
}

/// Frame-level channel to one or more rigs.
#[async_trait]
pub trait RigChannel: Send + Sync {
    /// Transmit a complete frame to the rig.
    ///
    /// Returns once the frame has been handed to the physical link. The
    /// rig's answer, if any, arrives later as a [`ReplyEvent`].
    async fn transmit(&mut self, frame: &[u8]) -> Result<()>;

    /// Subscribe to reply events.
    ///
    /// Only events published after this call are delivered to the returned
    /// receiver, so subscribe before transmitting.
    fn subscribe(&self) -> broadcast::Receiver<ReplyEvent>;

    /// Describe rig slot `rig` (1-based), or `None` past the last slot.
    async fn rig_info(&self, rig: u8) -> Result<Option<RigInfo>>;

    /// Readiness of rig slot `rig`.
    async fn status(&self, rig: u8) -> Result<RigStatus>;

    /// Number of rig slots this channel can address.
    fn rig_count(&self) -> u8;
}
