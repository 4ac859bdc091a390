//! Mock rig-control channel.
//!
//! [`MockRig`] stands in for a rig-control server: it records every frame
//! transmitted to it and answers with a scripted reply, published on its
//! reply-event broadcast exactly as a real channel would, after a
//! configurable delay.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use civclock_core::error::{Error, Result};
use civclock_core::{ReplyEvent, RigChannel, RigInfo, RigStatus};
use tokio::sync::broadcast;

const PREAMBLE: u8 = 0xFE;
const TERMINATOR: u8 = 0xFD;
const ACK: u8 = 0xFB;
const NAK: u8 = 0xFA;

/// How the mock answers one transmitted frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockReply {
    /// Echo plus `FE FE <ctl> <trx> FB FD`.
    Ack,
    /// Echo plus `FE FE <ctl> <trx> FA FD`.
    Nak,
    /// No reply at all.
    Silent,
    /// Echo plus these raw bytes.
    Raw(Vec<u8>),
}

/// A scripted [`RigChannel`].
#[derive(Debug)]
pub struct MockRig {
    rig: u8,
    rig_count: u8,
    rig_type: String,
    status: RigStatus,
    connected: bool,
    reply_delay: Duration,
    script: VecDeque<MockReply>,
    default_reply: MockReply,
    events: broadcast::Sender<ReplyEvent>,
    sent: Vec<Vec<u8>>,
}

impl MockRig {
    /// An online rig of `rig_type` in slot 1 that ACKs everything.
    pub fn new(rig_type: impl Into<String>) -> Self {
        let (events, _) = broadcast::channel(64);
        MockRig {
            rig: 1,
            rig_count: 2,
            rig_type: rig_type.into(),
            status: RigStatus::Online,
            connected: true,
            reply_delay: Duration::from_millis(30),
            script: VecDeque::new(),
            default_reply: MockReply::Ack,
            events,
            sent: Vec::new(),
        }
    }

    /// Place the rig in slot `rig` (1-based).
    pub fn with_rig_number(mut self, rig: u8) -> Self {
        self.rig = rig;
        self
    }

    /// Number of slots the channel reports.
    pub fn with_rig_count(mut self, count: u8) -> Self {
        self.rig_count = count;
        self
    }

    pub fn with_status(mut self, status: RigStatus) -> Self {
        self.status = status;
        self
    }

    /// Delay between a transmit and its reply event.
    pub fn with_reply_delay(mut self, delay: Duration) -> Self {
        self.reply_delay = delay;
        self
    }

    /// Reply used once the script runs out.
    pub fn with_default_reply(mut self, reply: MockReply) -> Self {
        self.default_reply = reply;
        self
    }

    /// Queue the reply for the next unscripted transmit.
    pub fn expect_reply(&mut self, reply: MockReply) {
        self.script.push_back(reply);
    }

    /// Publish an arbitrary reply event now.
    pub fn inject(&self, event: ReplyEvent) {
        let _ = self.events.send(event);
    }

    /// Handle for publishing events from another task.
    pub fn event_sender(&self) -> broadcast::Sender<ReplyEvent> {
        self.events.clone()
    }

    /// Every frame transmitted so far.
    pub fn sent_frames(&self) -> &[Vec<u8>] {
        &self.sent
    }

    /// Simulate the channel going away.
    pub fn set_connected(&mut self, connected: bool) {
        self.connected = connected;
    }

    fn reply_bytes(frame: &[u8], reply: &MockReply) -> Option<Vec<u8>> {
        let (&transceiver, &controller) = (frame.get(2)?, frame.get(3)?);
        let answer = match reply {
            MockReply::Ack => vec![PREAMBLE, PREAMBLE, controller, transceiver, ACK, TERMINATOR],
            MockReply::Nak => vec![PREAMBLE, PREAMBLE, controller, transceiver, NAK, TERMINATOR],
            MockReply::Silent => return None,
            MockReply::Raw(bytes) => bytes.clone(),
        };
        let mut full = frame.to_vec();
        full.extend(answer);
        Some(full)
    }
}

#[async_trait]
impl RigChannel for MockRig {
    async fn transmit(&mut self, frame: &[u8]) -> Result<()> {
        if !self.connected {
            return Err(Error::NotConnected);
        }
        self.sent.push(frame.to_vec());

        let reply = self
            .script
            .pop_front()
            .unwrap_or_else(|| self.default_reply.clone());
        if let Some(reply) = Self::reply_bytes(frame, &reply) {
            let event = ReplyEvent::new(self.rig, frame, reply);
            let events = self.events.clone();
            let delay = self.reply_delay;
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                let _ = events.send(event);
            });
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<ReplyEvent> {
        self.events.subscribe()
    }

    async fn rig_info(&self, rig: u8) -> Result<Option<RigInfo>> {
        if rig == 0 || rig > self.rig_count {
            return Ok(None);
        }
        Ok(Some(RigInfo {
            rig_type: if rig == self.rig {
                self.rig_type.clone()
            } else {
                String::new()
            },
            status: self.status(rig).await?,
        }))
    }

    async fn status(&self, rig: u8) -> Result<RigStatus> {
        Ok(if rig == self.rig {
            self.status
        } else {
            RigStatus::NotConfigured
        })
    }

    fn rig_count(&self) -> u8 {
        self.rig_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FRAME: [u8; 11] = [0xFE, 0xFE, 0x94, 0xE0, 0x1A, 0x05, 0x00, 0x95, 0x13, 0x40, 0xFD];

    #[tokio::test(start_paused = true)]
    async fn ack_is_published_after_delay() {
        let mut rig = MockRig::new("IC-7300");
        let mut events = rig.subscribe();
        rig.transmit(&FRAME).await.unwrap();

        let event = events.recv().await.unwrap();
        assert_eq!(event.rig, 1);
        assert_eq!(event.command, FRAME);
        assert_eq!(&event.reply[..FRAME.len()], &FRAME);
        assert_eq!(&event.reply[FRAME.len()..], &[0xFE, 0xFE, 0xE0, 0x94, 0xFB, 0xFD]);
        assert_eq!(rig.sent_frames(), &[FRAME.to_vec()]);
    }

    #[tokio::test(start_paused = true)]
    async fn script_then_default() {
        let mut rig = MockRig::new("IC-7300").with_default_reply(MockReply::Silent);
        rig.expect_reply(MockReply::Nak);
        let mut events = rig.subscribe();

        rig.transmit(&FRAME).await.unwrap();
        let event = events.recv().await.unwrap();
        assert_eq!(event.reply[event.reply.len() - 2], 0xFA);

        rig.transmit(&FRAME).await.unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn slot_reporting() {
        let rig = MockRig::new("IC-9700")
            .with_rig_number(2)
            .with_rig_count(2)
            .with_status(RigStatus::PortBusy);
        assert_eq!(rig.status(2).await.unwrap(), RigStatus::PortBusy);
        assert_eq!(rig.status(1).await.unwrap(), RigStatus::NotConfigured);
        assert_eq!(rig.rig_info(2).await.unwrap().unwrap().rig_type, "IC-9700");
        assert!(rig.rig_info(3).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn disconnected_transmit_fails() {
        let mut rig = MockRig::new("IC-7300");
        rig.set_connected(false);
        assert!(matches!(rig.transmit(&FRAME).await, Err(Error::NotConnected)));
        assert!(rig.sent_frames().is_empty());
    }
}
