//! Test doubles for civclock.
//!
//! - [`MockTransport`]: scripted byte transport for the CI-V link
//! - [`MockRig`]: scripted rig-control channel publishing reply events
//! - [`ScriptedClock`]: host clock replaying fixed local times

pub mod mock_rig;
pub mod mock_serial;
pub mod scripted_clock;

pub use mock_rig::{MockReply, MockRig};
pub use mock_serial::MockTransport;
pub use scripted_clock::ScriptedClock;
