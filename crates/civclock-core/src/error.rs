//! Error types for civclock.
//!
//! All fallible operations across the workspace return [`Result<T>`], which
//! uses [`Error`] as the error type. Configuration, codec, correlation and
//! transport failures are all captured here.

use crate::channel::RigStatus;
use crate::types::Operation;

/// The error type for all civclock operations.
///
/// Every variant is terminal for a synchronization run: nothing is retried
/// once an error has been surfaced.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Unknown model or command, malformed address, rig number out of range,
    /// or a model that does not match the rig. Raised before transmitting.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Malformed hexadecimal input (odd length or non-hex digit).
    #[error("format error: {0}")]
    Format(String),

    /// No matching reply arrived within the response timeout.
    ///
    /// Usually the transceiver model, CI-V address or opcode is wrong, or
    /// the rig is switched off.
    #[error("timeout waiting for {0} acknowledgement")]
    Timeout(Operation),

    /// The rig echoed the command but did not answer with a positive
    /// acknowledgement.
    #[error("protocol error: rig rejected {operation} (reply {reply})")]
    Protocol {
        /// The operation whose command was rejected.
        operation: Operation,
        /// Hex dump of the full reply, including the command echo.
        reply: String,
    },

    /// The rig channel reports that the rig is not usable.
    #[error("rig not ready: {0}")]
    RigStatus(RigStatus),

    /// A transport-level error (serial port open/configure failure).
    #[error("transport error: {0}")]
    Transport(String),

    /// The transport or rig channel is not open.
    #[error("not connected")]
    NotConnected,

    /// The connection to the rig was lost unexpectedly.
    #[error("connection lost")]
    ConnectionLost,

    /// A byte-level read returned no data before its deadline.
    #[error("timeout waiting for data")]
    ReadTimeout,

    /// An underlying I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A convenience `Result` alias using [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;
