//! civclock-core: Core traits, types, and error definitions for civclock.
//!
//! This crate defines the abstractions shared by the CI-V clock engine, its
//! transports and its test harness.
//!
//! # Key types
//!
//! - [`RigChannel`] -- transmits frames and publishes [`ReplyEvent`]s
//! - [`Transport`] -- byte-level communication channel
//! - [`Clock`] -- host wall-clock source
//! - [`Operation`] / [`Outcome`] -- what was sent and how the rig answered
//! - [`Error`] / [`Result`] -- error handling

pub mod channel;
pub mod clock;
pub mod error;
pub mod events;
pub mod transport;
pub mod types;

pub use channel::{RigChannel, RigInfo, RigStatus};
pub use clock::{Clock, SystemClock};
pub use error::{Error, Result};
pub use events::ReplyEvent;
pub use transport::Transport;
pub use types::{Operation, Outcome};
