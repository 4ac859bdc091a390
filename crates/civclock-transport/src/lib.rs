//! Transport implementations for civclock.
//!
//! Provides [`SerialTransport`], the [`Transport`](civclock_core::Transport)
//! used to reach an Icom transceiver over its CI-V serial port.

pub mod serial;

pub use serial::{SerialConfig, SerialTransport, StopBits};
