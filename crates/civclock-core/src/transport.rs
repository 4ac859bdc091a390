//! Byte-level transport trait.
//!
//! The [`Transport`] trait abstracts over the physical link to a
//! transceiver. `SerialTransport` in `civclock-transport` drives a USB
//! virtual COM port; `MockTransport` in `civclock-test-harness` replays
//! scripted bytes for tests. The CI-V link in `civclock-icom` consumes a
//! `Transport` and turns the byte stream into reply events.

use async_trait::async_trait;
use std::time::Duration;

use crate::error::Result;

/// Asynchronous byte-level transport to a rig.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Write all of `data` to the rig.
    async fn send(&mut self, data: &[u8]) -> Result<()>;

    /// Read available bytes into `buf`, waiting at most `timeout`.
    ///
    /// Returns the number of bytes read, or
    /// [`Error::ReadTimeout`](crate::error::Error::ReadTimeout) when nothing
    /// arrived within the deadline.
    async fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize>;

    /// Close the transport. Later `send`/`receive` calls fail with
    /// [`Error::NotConnected`](crate::error::Error::NotConnected).
    async fn close(&mut self) -> Result<()>;

    /// Whether the transport is open.
    fn is_connected(&self) -> bool;
}
