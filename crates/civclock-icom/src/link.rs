//! Direct CI-V serial link.
//!
//! [`CivLink`] is the [`RigChannel`] used when the transceiver is wired
//! straight to the host. One spawned IO task owns the [`Transport`]: it
//! writes transmit requests, reassembles frames from whatever the port
//! delivers, and turns "echo of our command, then the rig's answer" into a
//! [`ReplyEvent`] on the broadcast channel.
//!
//! CI-V is a shared bus, so the port hears its own transmission back
//! (unless CI-V echo is switched off in the rig's menu) followed by the
//! answer addressed to the controller. When no echo shows up, the
//! transmitted bytes stand in for it so the event looks the same either
//! way.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use civclock_core::error::{Error, Result};
use civclock_core::{ReplyEvent, RigChannel, RigInfo, RigStatus, Transport};

use crate::civ::{self, CivFrame, DecodeResult};

/// The only rig slot a direct link addresses.
pub const LINK_RIG: u8 = 1;

/// How long each idle read waits before the loop checks for requests.
const IDLE_READ_TIMEOUT: Duration = Duration::from_millis(100);

/// Maximum receive buffer size before reset to prevent unbounded growth.
const MAX_RX_BUF: usize = 4096;

enum Request {
    Transmit {
        frame: Vec<u8>,
        reply: oneshot::Sender<Result<()>>,
    },
    /// Graceful shutdown; hands the transport back.
    Shutdown {
        reply: oneshot::Sender<Box<dyn Transport>>,
    },
}

/// The command on the wire that is still waiting for its answer.
struct Outstanding {
    frame: Vec<u8>,
    transceiver: Option<u8>,
    echo: Option<Vec<u8>>,
}

/// [`RigChannel`] over a CI-V byte transport.
pub struct CivLink {
    cmd_tx: mpsc::Sender<Request>,
    events: broadcast::Sender<ReplyEvent>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
    rig_type: String,
}

impl CivLink {
    /// Spawn the IO task over `transport`.
    ///
    /// `rig_type` is what [`rig_info`](RigChannel::rig_info) reports,
    /// normally the configured model name. Answers are recognised by being
    /// addressed to `controller_address`.
    pub fn spawn(
        transport: Box<dyn Transport>,
        rig_type: impl Into<String>,
        controller_address: u8,
    ) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(8);
        let (events, _) = broadcast::channel(64);
        let cancel = CancellationToken::new();

        let task = tokio::spawn(io_loop(
            transport,
            controller_address,
            events.clone(),
            cmd_rx,
            cancel.clone(),
        ));

        CivLink {
            cmd_tx,
            events,
            cancel,
            task,
            rig_type: rig_type.into(),
        }
    }

    fn is_running(&self) -> bool {
        !self.cancel.is_cancelled() && !self.task.is_finished()
    }

    /// Stop the IO task and recover the transport.
    pub async fn shutdown(self) -> Result<Box<dyn Transport>> {
        let (reply_tx, reply_rx) = oneshot::channel();
        let _ = self
            .cmd_tx
            .send(Request::Shutdown { reply: reply_tx })
            .await;
        let transport = reply_rx.await.map_err(|_| Error::NotConnected)?;
        let _ = self.task.await;
        Ok(transport)
    }

    /// Stop the IO task without waiting for it.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

#[async_trait]
impl RigChannel for CivLink {
    async fn transmit(&mut self, frame: &[u8]) -> Result<()> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.cmd_tx
            .send(Request::Transmit {
                frame: frame.to_vec(),
                reply: reply_tx,
            })
            .await
            .map_err(|_| Error::NotConnected)?;
        reply_rx.await.map_err(|_| Error::NotConnected)?
    }

    fn subscribe(&self) -> broadcast::Receiver<ReplyEvent> {
        self.events.subscribe()
    }

    async fn rig_info(&self, rig: u8) -> Result<Option<RigInfo>> {
        if rig != LINK_RIG {
            return Ok(None);
        }
        Ok(Some(RigInfo {
            rig_type: self.rig_type.clone(),
            status: self.status(rig).await?,
        }))
    }

    async fn status(&self, rig: u8) -> Result<RigStatus> {
        Ok(match rig {
            LINK_RIG if self.is_running() => RigStatus::Online,
            LINK_RIG => RigStatus::NotResponding,
            _ => RigStatus::NotConfigured,
        })
    }

    fn rig_count(&self) -> u8 {
        1
    }
}

async fn io_loop(
    mut transport: Box<dyn Transport>,
    controller_address: u8,
    events: broadcast::Sender<ReplyEvent>,
    mut cmd_rx: mpsc::Receiver<Request>,
    cancel: CancellationToken,
) {
    let mut rx_buf = Vec::new();
    let mut outstanding: Option<Outstanding> = None;

    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                debug!("CI-V link cancelled");
                break;
            }

            request = cmd_rx.recv() => match request {
                Some(Request::Transmit { frame, reply }) => {
                    let result = transport.send(&frame).await;
                    if result.is_ok() {
                        trace!(frame = %civ::bytes_to_hex(&frame), "frame written");
                        outstanding = Some(Outstanding {
                            transceiver: frame.get(2).copied(),
                            frame,
                            echo: None,
                        });
                    }
                    let _ = reply.send(result);
                }
                Some(Request::Shutdown { reply }) => {
                    debug!("CI-V link shutdown requested");
                    let _ = reply.send(transport);
                    return;
                }
                None => {
                    debug!("all link handles dropped, exiting IO task");
                    break;
                }
            },

            read = read_chunk(&mut *transport) => match read {
                Ok(chunk) => {
                    rx_buf.extend_from_slice(&chunk);
                    if rx_buf.len() > MAX_RX_BUF {
                        warn!(len = rx_buf.len(), "receive buffer overflow, resetting");
                        rx_buf.clear();
                        continue;
                    }
                    process_frames(&mut rx_buf, &mut outstanding, controller_address, &events);
                }
                Err(Error::ReadTimeout) => {}
                Err(e @ (Error::ConnectionLost | Error::NotConnected)) => {
                    warn!(error = %e, "CI-V port lost");
                    break;
                }
                Err(e) => {
                    debug!(error = %e, "CI-V read failed");
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
            },
        }
    }
}

async fn read_chunk(transport: &mut dyn Transport) -> Result<Vec<u8>> {
    let mut buf = [0u8; 256];
    let n = transport.receive(&mut buf, IDLE_READ_TIMEOUT).await?;
    Ok(buf[..n].to_vec())
}

/// Split complete frames off `rx_buf` and correlate them with the
/// outstanding command.
fn process_frames(
    rx_buf: &mut Vec<u8>,
    outstanding: &mut Option<Outstanding>,
    controller_address: u8,
    events: &broadcast::Sender<ReplyEvent>,
) {
    loop {
        match civ::decode_frame(rx_buf) {
            DecodeResult::Frame(frame, consumed) => {
                rx_buf.drain(..consumed);
                handle_frame(&frame, outstanding, controller_address, events);
            }
            DecodeResult::Collision(consumed) => {
                debug!("discarding collided CI-V frame");
                rx_buf.drain(..consumed);
            }
            DecodeResult::Incomplete => break,
        }
    }
}

fn handle_frame(
    frame: &CivFrame,
    outstanding: &mut Option<Outstanding>,
    controller_address: u8,
    events: &broadcast::Sender<ReplyEvent>,
) {
    let bytes = civ::encode_civ_frame(frame);
    let Some(command) = outstanding.as_mut() else {
        trace!(frame = %civ::bytes_to_hex(&bytes), "ignoring unsolicited frame");
        return;
    };

    if bytes == command.frame {
        trace!("command echo received");
        command.echo = Some(bytes);
        return;
    }
    if frame.dst_addr != controller_address || Some(frame.src_addr) != command.transceiver {
        trace!(frame = %civ::bytes_to_hex(&bytes), "ignoring bus traffic");
        return;
    }

    let Some(command) = outstanding.take() else {
        return;
    };
    let echo = command.echo.unwrap_or(command.frame);
    let mut reply = echo.clone();
    reply.extend_from_slice(&bytes);
    debug!(reply = %civ::bytes_to_hex(&reply), "rig answered");
    if events.send(ReplyEvent::new(LINK_RIG, echo, reply)).is_err() {
        trace!("no reply subscribers");
    }
}
