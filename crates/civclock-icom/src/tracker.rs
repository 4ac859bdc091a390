//! Command/response correlation.
//!
//! [`PendingCommandTracker`] sends one frame at a time and matches the
//! reply events the rig channel publishes against it. A reply belongs to
//! the outstanding command when its echo is byte-for-byte the frame that
//! was sent and the full reply starts with that echo. What follows the echo
//! decides the outcome: the expected acknowledgement frame means
//! [`Outcome::Acknowledged`], anything else means [`Outcome::Rejected`].
//!
//! Events for other rigs, for other commands, duplicates after resolution,
//! and events that show up after the deadline are all dropped. The waiter
//! wakes on every event and on the deadline, and nothing else can touch the
//! reply state while it waits.

use std::time::Duration;

use civclock_core::{Error, Outcome, ReplyEvent, Result, RigChannel};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::time::Instant;
use tracing::{debug, trace, warn};

use crate::civ::{bytes_to_hex, hex_to_bytes};

/// How long to wait for the rig to answer a command.
pub const RESPONSE_TIMEOUT: Duration = Duration::from_millis(4000);

/// Stored state of the outstanding command.
///
/// A timeout is not stored: the waiter infers it from a deadline that
/// passed while the state was still `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyState {
    Pending,
    Acknowledged,
    Rejected,
}

#[derive(Debug)]
struct PendingCommand {
    frame_hex: String,
    state: ReplyState,
    reply_hex: Option<String>,
    deadline: Instant,
}

/// Correlates replies with the single outstanding command.
#[derive(Debug)]
pub struct PendingCommandTracker {
    rig: u8,
    acknowledgement: String,
    response_timeout: Duration,
    events: broadcast::Receiver<ReplyEvent>,
    pending: Option<PendingCommand>,
}

impl PendingCommandTracker {
    /// Track commands for `rig`, succeeding on replies ending in
    /// `acknowledgement` (see [`expected_acknowledgement`](crate::civ::expected_acknowledgement)).
    ///
    /// `events` must be subscribed before the first [`send`](Self::send).
    pub fn new(
        rig: u8,
        acknowledgement: impl Into<String>,
        events: broadcast::Receiver<ReplyEvent>,
    ) -> Self {
        PendingCommandTracker {
            rig,
            acknowledgement: acknowledgement.into().to_ascii_uppercase(),
            response_timeout: RESPONSE_TIMEOUT,
            events,
            pending: None,
        }
    }

    pub fn response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = timeout;
        self
    }

    /// State of the most recently sent command, if any.
    pub fn state(&self) -> Option<ReplyState> {
        self.pending.as_ref().map(|p| p.state)
    }

    /// Hex of the reply that resolved the most recent command.
    pub fn last_reply(&self) -> Option<&str> {
        self.pending.as_ref()?.reply_hex.as_deref()
    }

    /// Send `frame_hex` over `channel` and wait for the rig's answer.
    ///
    /// Returns [`Outcome::TimedOut`] if no matching reply arrives within the
    /// response timeout. Malformed hex is an [`Error::Format`]; transmit
    /// failures and a closed event stream are returned as errors.
    pub async fn send<C>(&mut self, channel: &mut C, frame_hex: &str) -> Result<Outcome>
    where
        C: RigChannel + ?Sized,
    {
        let frame = hex_to_bytes(frame_hex)?;
        self.drop_stale_events();

        let deadline = Instant::now() + self.response_timeout;
        self.pending = Some(PendingCommand {
            frame_hex: bytes_to_hex(&frame),
            state: ReplyState::Pending,
            reply_hex: None,
            deadline,
        });

        if let Err(e) = channel.transmit(&frame).await {
            self.pending = None;
            return Err(e);
        }
        trace!(frame = %frame_hex, "command transmitted");

        loop {
            match self.state() {
                Some(ReplyState::Acknowledged) => return Ok(Outcome::Acknowledged),
                Some(ReplyState::Rejected) => return Ok(Outcome::Rejected),
                _ => {}
            }
            if Instant::now() >= deadline {
                debug!(frame = %frame_hex, "no reply before deadline");
                return Ok(Outcome::TimedOut);
            }

            let received = tokio::select! {
                biased;
                event = self.events.recv() => Some(event),
                _ = tokio::time::sleep_until(deadline) => None,
            };

            match received {
                Some(Ok(event)) => self.on_reply_event(&event),
                Some(Err(RecvError::Lagged(skipped))) => {
                    warn!(skipped, "reply events lagged; some were dropped");
                }
                Some(Err(RecvError::Closed)) => return Err(Error::ConnectionLost),
                // Deadline reached; checked at the top of the loop.
                None => {}
            }
        }
    }

    /// Offer a reply event to the outstanding command.
    ///
    /// Resolves the command at most once. Events that do not belong to it
    /// leave the state untouched.
    pub fn on_reply_event(&mut self, event: &ReplyEvent) {
        if event.rig != self.rig {
            trace!(rig = event.rig, "ignoring reply from another rig");
            return;
        }
        let Some(pending) = self.pending.as_mut() else {
            return;
        };
        if pending.state != ReplyState::Pending {
            debug!("dropping reply for an already resolved command");
            return;
        }
        if Instant::now() > pending.deadline {
            debug!("dropping reply for an abandoned command");
            return;
        }

        let command = bytes_to_hex(&event.command);
        if command != pending.frame_hex {
            trace!(command = %command, "ignoring reply to another command");
            return;
        }
        let reply = bytes_to_hex(&event.reply);
        let Some(answer) = reply.strip_prefix(&command) else {
            trace!(reply = %reply, "reply does not start with the command echo");
            return;
        };

        pending.state = if answer == self.acknowledgement {
            ReplyState::Acknowledged
        } else {
            ReplyState::Rejected
        };
        debug!(reply = %reply, state = ?pending.state, "command resolved");
        pending.reply_hex = Some(reply);
    }

    fn drop_stale_events(&mut self) {
        loop {
            match self.events.try_recv() {
                Ok(event) => trace!(rig = event.rig, "dropping stale reply event"),
                Err(TryRecvError::Lagged(_)) => continue,
                Err(TryRecvError::Empty | TryRecvError::Closed) => break,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::civ::expected_acknowledgement;
    use civclock_test_harness::{MockReply, MockRig};

    const SET_TIME: &str = "FEFE94E01A0500951340FD";

    fn tracker_for(rig: &MockRig) -> PendingCommandTracker {
        PendingCommandTracker::new(1, expected_acknowledgement("E0", "94"), rig.subscribe())
    }

    fn bytes(hex: &str) -> Vec<u8> {
        hex_to_bytes(hex).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn ack_resolves_acknowledged() {
        let mut rig = MockRig::new("IC-7300");
        let mut tracker = tracker_for(&rig);

        let outcome = tracker.send(&mut rig, SET_TIME).await.unwrap();
        assert_eq!(outcome, Outcome::Acknowledged);
        assert_eq!(tracker.state(), Some(ReplyState::Acknowledged));
        assert_eq!(tracker.last_reply(), Some("FEFE94E01A0500951340FDFEFEE094FBFD"));
        assert_eq!(rig.sent_frames(), &[bytes(SET_TIME)]);
    }

    #[tokio::test(start_paused = true)]
    async fn nak_resolves_rejected() {
        let mut rig = MockRig::new("IC-7300");
        rig.expect_reply(MockReply::Nak);
        let mut tracker = tracker_for(&rig);

        assert_eq!(tracker.send(&mut rig, SET_TIME).await.unwrap(), Outcome::Rejected);
        assert_eq!(tracker.state(), Some(ReplyState::Rejected));
    }

    #[tokio::test(start_paused = true)]
    async fn garbage_after_echo_is_rejected() {
        let mut rig = MockRig::new("IC-7300");
        rig.expect_reply(MockReply::Raw(vec![0x00, 0x11]));
        let mut tracker = tracker_for(&rig);

        assert_eq!(tracker.send(&mut rig, SET_TIME).await.unwrap(), Outcome::Rejected);
    }

    #[tokio::test(start_paused = true)]
    async fn silence_times_out_at_deadline() {
        let mut rig = MockRig::new("IC-7300").with_default_reply(MockReply::Silent);
        let mut tracker = tracker_for(&rig);

        let start = Instant::now();
        assert_eq!(tracker.send(&mut rig, SET_TIME).await.unwrap(), Outcome::TimedOut);
        assert_eq!(start.elapsed(), RESPONSE_TIMEOUT);
        assert_eq!(tracker.state(), Some(ReplyState::Pending));
    }

    #[tokio::test(start_paused = true)]
    async fn custom_response_timeout() {
        let mut rig = MockRig::new("IC-7300").with_default_reply(MockReply::Silent);
        let mut tracker = tracker_for(&rig).response_timeout(Duration::from_millis(250));

        let start = Instant::now();
        assert_eq!(tracker.send(&mut rig, SET_TIME).await.unwrap(), Outcome::TimedOut);
        assert_eq!(start.elapsed(), Duration::from_millis(250));
    }

    #[tokio::test(start_paused = true)]
    async fn reply_slower_than_timeout_is_too_late() {
        let mut rig = MockRig::new("IC-7300").with_reply_delay(Duration::from_secs(5));
        let mut tracker = tracker_for(&rig);

        assert_eq!(tracker.send(&mut rig, SET_TIME).await.unwrap(), Outcome::TimedOut);

        // The ACK lands after the command was abandoned.
        tokio::time::sleep(Duration::from_secs(2)).await;
        let late = ReplyEvent::new(
            1,
            bytes(SET_TIME),
            bytes("FEFE94E01A0500951340FDFEFEE094FBFD"),
        );
        tracker.on_reply_event(&late);
        assert_eq!(tracker.state(), Some(ReplyState::Pending));
    }

    #[tokio::test(start_paused = true)]
    async fn other_rigs_and_commands_are_ignored() {
        let mut rig = MockRig::new("IC-7300")
            .with_default_reply(MockReply::Silent)
            .with_reply_delay(Duration::from_millis(10));
        let mut tracker = tracker_for(&rig);
        let sender = rig.event_sender();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            // Right frame, wrong rig.
            let _ = sender.send(ReplyEvent::new(
                2,
                hex_to_bytes(SET_TIME).unwrap(),
                hex_to_bytes("FEFE94E01A0500951340FDFEFEE094FBFD").unwrap(),
            ));
            // Right rig, different command.
            let _ = sender.send(ReplyEvent::new(
                1,
                hex_to_bytes("FEFE94E01A0500951341FD").unwrap(),
                hex_to_bytes("FEFE94E01A0500951341FDFEFEE094FAFD").unwrap(),
            ));
            // Reply that does not start with the echo.
            let _ = sender.send(ReplyEvent::new(
                1,
                hex_to_bytes(SET_TIME).unwrap(),
                hex_to_bytes("FEFEE094FAFD").unwrap(),
            ));
        });

        assert_eq!(tracker.send(&mut rig, SET_TIME).await.unwrap(), Outcome::TimedOut);
    }

    #[tokio::test(start_paused = true)]
    async fn matching_reply_found_among_noise() {
        let mut rig = MockRig::new("IC-7300").with_reply_delay(Duration::from_millis(200));
        let mut tracker = tracker_for(&rig);
        let sender = rig.event_sender();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            let _ = sender.send(ReplyEvent::new(3, vec![0xFE], vec![0xFE]));
        });

        assert_eq!(tracker.send(&mut rig, SET_TIME).await.unwrap(), Outcome::Acknowledged);
    }

    #[tokio::test(start_paused = true)]
    async fn resolution_happens_once() {
        let mut rig = MockRig::new("IC-7300");
        let mut tracker = tracker_for(&rig);
        assert_eq!(tracker.send(&mut rig, SET_TIME).await.unwrap(), Outcome::Acknowledged);

        let nak = ReplyEvent::new(
            1,
            bytes(SET_TIME),
            bytes("FEFE94E01A0500951340FDFEFEE094FAFD"),
        );
        tracker.on_reply_event(&nak);
        assert_eq!(tracker.state(), Some(ReplyState::Acknowledged));
    }

    #[tokio::test(start_paused = true)]
    async fn stale_events_are_dropped_before_send() {
        let mut rig = MockRig::new("IC-7300").with_default_reply(MockReply::Silent);
        let mut tracker = tracker_for(&rig);

        // An ACK for this exact frame, left over from before the send.
        rig.inject(ReplyEvent::new(
            1,
            bytes(SET_TIME),
            bytes("FEFE94E01A0500951340FDFEFEE094FBFD"),
        ));

        assert_eq!(tracker.send(&mut rig, SET_TIME).await.unwrap(), Outcome::TimedOut);
    }

    #[tokio::test(start_paused = true)]
    async fn lowercase_frame_is_normalized() {
        let mut rig = MockRig::new("IC-7300");
        let mut tracker = tracker_for(&rig);
        let outcome = tracker
            .send(&mut rig, &SET_TIME.to_ascii_lowercase())
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::Acknowledged);
    }

    #[tokio::test]
    async fn event_flood_does_not_hold_off_the_deadline() {
        let mut rig = MockRig::new("IC-7300").with_default_reply(MockReply::Silent);
        let mut tracker = tracker_for(&rig).response_timeout(Duration::from_millis(100));
        let sender = rig.event_sender();

        // Another rig chatters without pause for the whole wait.
        let flood = tokio::spawn(async move {
            loop {
                let _ = sender.send(ReplyEvent::new(2, vec![0xFE], vec![0xFE]));
                tokio::task::yield_now().await;
            }
        });

        let outcome = tokio::time::timeout(Duration::from_secs(5), tracker.send(&mut rig, SET_TIME))
            .await
            .expect("send must return once the deadline passes")
            .unwrap();
        flood.abort();
        assert_eq!(outcome, Outcome::TimedOut);
    }

    #[tokio::test]
    async fn malformed_frame_is_not_transmitted() {
        let mut rig = MockRig::new("IC-7300");
        let mut tracker = tracker_for(&rig);
        let err = tracker.send(&mut rig, "FEFE94E0ZZ").await.unwrap_err();
        assert!(matches!(err, Error::Format(_)));
        assert!(rig.sent_frames().is_empty());
        assert_eq!(tracker.state(), None);
    }

    #[tokio::test]
    async fn transmit_failure_propagates() {
        let mut rig = MockRig::new("IC-7300");
        rig.set_connected(false);
        let mut tracker = tracker_for(&rig);
        let err = tracker.send(&mut rig, SET_TIME).await.unwrap_err();
        assert!(matches!(err, Error::NotConnected));
        assert_eq!(tracker.state(), None);
    }

    #[test]
    fn event_without_pending_command_is_inert() {
        let (tx, rx) = broadcast::channel(4);
        let mut tracker = PendingCommandTracker::new(1, "FEFEE094FBFD", rx);
        tracker.on_reply_event(&ReplyEvent::new(1, bytes(SET_TIME), bytes(SET_TIME)));
        assert_eq!(tracker.state(), None);
        drop(tx);
    }
}
