//! Icom CI-V clock synchronization for civclock.
//!
//! This crate sets an Icom transceiver's clock, date and UTC offset from the
//! host clock over CI-V. It provides:
//!
//! - **Frame codec** ([`civ`]) -- build CI-V frames as hex strings, convert
//!   between hex and bytes, and split received bytes into frames.
//! - **Model definitions** ([`models`]) -- per-model clock opcodes, default
//!   CI-V addresses, and the rig-type alias table (11 models).
//! - **Clock alignment** ([`clock`]) -- reference time and the wait for the
//!   next minute boundary.
//! - **Reply correlation** ([`tracker`]) -- send one command and match the
//!   rig's asynchronous replies against it.
//! - **ClockSync** ([`sync`]) -- the time, date, UTC offset sequence.
//! - **ClockSyncBuilder** ([`builder`]) -- configuration and rig preflight.
//! - **CivLink** ([`link`]) -- a [`RigChannel`](civclock_core::RigChannel)
//!   over a directly attached CI-V port.
//!
//! # Example
//!
//! ```
//! use civclock_icom::civ::{build_frame, decode_frame, hex_to_bytes, DecodeResult};
//!
//! // IC-7300: set the clock to 13:40
//! let frame = build_frame("94", "E0", "1A050095", "1340");
//! assert_eq!(frame, "FEFE94E01A0500951340FD");
//!
//! // The rig's positive acknowledgement
//! let ack = hex_to_bytes("FEFEE094FBFD").unwrap();
//! if let DecodeResult::Frame(frame, _) = decode_frame(&ack) {
//!     assert!(frame.is_ack());
//! }
//! ```

pub mod builder;
pub mod civ;
pub mod clock;
pub mod link;
pub mod models;
pub mod sync;
pub mod tracker;

pub use builder::ClockSyncBuilder;
pub use link::CivLink;
pub use sync::{ClockSync, SyncReport};
pub use tracker::{PendingCommandTracker, ReplyState};
