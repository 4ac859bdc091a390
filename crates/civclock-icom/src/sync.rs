//! Clock synchronization run.
//!
//! [`ClockSync`] performs the three clock operations in order: time (sent
//! exactly on a minute boundary), date, UTC offset. The first operation
//! that times out or is rejected ends the run.
//!
//! Construct one with [`ClockSyncBuilder`](crate::builder::ClockSyncBuilder),
//! which also checks that the rig is ready.

use chrono::{DateTime, Datelike, FixedOffset, TimeZone, Timelike};
use civclock_core::{Clock, Error, Operation, Outcome, Result, RigChannel};
use tracing::{debug, info, warn};

use crate::civ::{build_frame, to_bcd_digits};
use crate::clock::ClockAligner;
use crate::models::{lookup_opcode, IcomModel};
use crate::tracker::PendingCommandTracker;

/// `HHMM` payload for `SetTime`.
pub fn time_payload<Tz: TimeZone>(time: &DateTime<Tz>) -> String {
    format!(
        "{}{}",
        to_bcd_digits(time.hour(), 2),
        to_bcd_digits(time.minute(), 2)
    )
}

/// `YYYYMMDD` payload for `SetDate`.
pub fn date_payload<Tz: TimeZone>(time: &DateTime<Tz>) -> String {
    format!(
        "{}{}{}",
        to_bcd_digits(time.year().unsigned_abs(), 4),
        to_bcd_digits(time.month(), 2),
        to_bcd_digits(time.day(), 2)
    )
}

/// `HHMMPP` payload for `SetUtcOffset`.
///
/// Hours and minutes are magnitudes. The polarity code `PP` is `00` when
/// the offset's sign (taken from the hours, truncated toward zero) agrees
/// with `reversed_time_zone`, otherwise `01`: a zone east of UTC is sent as
/// `00` normally and `01` in reversed mode, and the other way round for a
/// zone west of UTC.
pub fn utc_offset_payload(offset: FixedOffset, reversed_time_zone: bool) -> String {
    let seconds = offset.local_minus_utc();
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let is_negative = hours < 0;
    let polarity = if is_negative == reversed_time_zone { "00" } else { "01" };
    format!(
        "{}{}{}",
        to_bcd_digits(hours.unsigned_abs(), 2),
        to_bcd_digits(minutes.unsigned_abs(), 2),
        polarity
    )
}

/// Frames acknowledged during a run, as hex.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub time: String,
    /// One frame, or two when the date rolled over while it was being sent.
    pub date: Vec<String>,
    pub utc_offset: String,
}

/// Runs the clock operations against one rig.
pub struct ClockSync<C, K> {
    channel: C,
    aligner: ClockAligner<K>,
    tracker: PendingCommandTracker,
    model: &'static IcomModel,
    transceiver_address: String,
    controller_address: String,
}

impl<C: RigChannel, K: Clock> ClockSync<C, K> {
    pub(crate) fn new(
        channel: C,
        aligner: ClockAligner<K>,
        tracker: PendingCommandTracker,
        model: &'static IcomModel,
        transceiver_address: String,
        controller_address: String,
    ) -> Self {
        ClockSync {
            channel,
            aligner,
            tracker,
            model,
            transceiver_address,
            controller_address,
        }
    }

    pub fn model(&self) -> &'static IcomModel {
        self.model
    }

    pub fn transceiver_address(&self) -> &str {
        &self.transceiver_address
    }

    pub fn controller_address(&self) -> &str {
        &self.controller_address
    }

    pub fn reversed_time_zone(&self) -> bool {
        self.aligner.reversed_time_zone()
    }

    /// Give the rig channel back, e.g. to shut down a serial link.
    pub fn into_channel(self) -> C {
        self.channel
    }

    /// Hex frame for `operation` carrying `payload`.
    pub fn frame_for(&self, operation: Operation, payload: &str) -> Result<String> {
        let opcode = lookup_opcode(self.model.name, operation.command_name())?;
        Ok(build_frame(
            &self.transceiver_address,
            &self.controller_address,
            opcode,
            payload,
        ))
    }

    /// Run all three operations in order.
    pub async fn run(&mut self) -> Result<SyncReport> {
        let time = self.set_time().await?;
        let date = self.set_date().await?;
        let utc_offset = self.set_utc_offset().await?;
        Ok(SyncReport {
            time,
            date,
            utc_offset,
        })
    }

    /// Wait for the next minute boundary and set the rig's clock.
    pub async fn set_time(&mut self) -> Result<String> {
        let now = self.aligner.wait_for_minute_boundary().await;
        self.execute(Operation::SetTime, &time_payload(&now)).await
    }

    /// Set the rig's date, correcting it once if the day changed while the
    /// first frame was in flight.
    pub async fn set_date(&mut self) -> Result<Vec<String>> {
        let before = self.aligner.reference_time();
        let mut frames = vec![self.execute(Operation::SetDate, &date_payload(&before)).await?];

        let after = self.aligner.reference_time();
        if after.day() != before.day() {
            warn!(date = %after.date_naive(), "date rolled over while sending, correcting");
            frames.push(self.execute(Operation::SetDate, &date_payload(&after)).await?);
        }
        Ok(frames)
    }

    /// Set the rig's UTC offset from the host's local offset.
    pub async fn set_utc_offset(&mut self) -> Result<String> {
        let offset = self.aligner.utc_offset();
        debug!(%offset, reversed = self.aligner.reversed_time_zone(), "local UTC offset");
        let payload = utc_offset_payload(offset, self.aligner.reversed_time_zone());
        self.execute(Operation::SetUtcOffset, &payload).await
    }

    async fn execute(&mut self, operation: Operation, payload: &str) -> Result<String> {
        let frame = self.frame_for(operation, payload)?;
        debug!(%operation, %frame, "sending command");

        let outcome = self.tracker.send(&mut self.channel, &frame).await?;
        match outcome {
            Outcome::Acknowledged => {
                info!(%operation, %frame, "{operation} set");
                Ok(frame)
            }
            Outcome::Rejected => Err(Error::Protocol {
                operation,
                reply: self.tracker.last_reply().unwrap_or_default().to_string(),
            }),
            Outcome::TimedOut => Err(Error::Timeout(operation)),
        }
    }
}
