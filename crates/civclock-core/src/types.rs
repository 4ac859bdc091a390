//! Core types shared by the codec, the tracker and the orchestrator.

use std::fmt;

/// One of the three clock operations sent to the transceiver.
///
/// Each operation maps to exactly one opcode in the model table (looked up
/// by [`command_name`](Operation::command_name)) and one payload rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Set the clock to `HHMM`.
    SetTime,
    /// Set the date to `YYYYMMDD`.
    SetDate,
    /// Set the UTC offset to `HHMMPP` (PP = polarity code).
    SetUtcOffset,
}

impl Operation {
    /// All operations in the order they are executed.
    pub const ALL: [Operation; 3] = [
        Operation::SetTime,
        Operation::SetDate,
        Operation::SetUtcOffset,
    ];

    /// Command name used as the key into the model opcode table.
    pub fn command_name(&self) -> &'static str {
        match self {
            Operation::SetTime => "setTimeCommand",
            Operation::SetDate => "setDateCommand",
            Operation::SetUtcOffset => "setUtcOffsetCommand",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::SetTime => write!(f, "time"),
            Operation::SetDate => write!(f, "date"),
            Operation::SetUtcOffset => write!(f, "UTC offset"),
        }
    }
}

/// The caller-observed result of sending one command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The rig answered with the positive acknowledgement.
    Acknowledged,
    /// The rig echoed the command but answered with something else.
    Rejected,
    /// No matching reply arrived before the deadline.
    TimedOut,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Acknowledged => write!(f, "OK"),
            Outcome::Rejected => write!(f, "Error"),
            Outcome::TimedOut => write!(f, "timed out"),
        }
    }
}
