//! Mock byte transport for testing the CI-V link without a serial port.
//!
//! [`MockTransport`] answers each `send()` with a pre-loaded response,
//! typically the command echo followed by the rig's ACK, exactly as a USB
//! CI-V port with echo enabled would.
//!
//! # Example
//!
//! ```
//! use civclock_test_harness::MockTransport;
//!
//! let mut mock = MockTransport::new();
//! let set_time = [0xFE, 0xFE, 0x94, 0xE0, 0x1A, 0x05, 0x00, 0x95, 0x13, 0x40, 0xFD];
//! let mut reply = set_time.to_vec();
//! reply.extend_from_slice(&[0xFE, 0xFE, 0xE0, 0x94, 0xFB, 0xFD]);
//! mock.expect(&set_time, &reply);
//! ```

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use civclock_core::error::{Error, Result};
use civclock_core::transport::Transport;

#[derive(Debug, Clone)]
struct Exchange {
    request: Vec<u8>,
    response: Vec<u8>,
}

/// A scripted [`Transport`].
///
/// Exchanges are consumed in order. A `send()` that does not match the next
/// expected request fails with [`Error::Transport`]. When no response bytes
/// are pending, `receive()` waits out its timeout and returns
/// [`Error::ReadTimeout`], like an idle serial line.
#[derive(Debug)]
pub struct MockTransport {
    exchanges: VecDeque<Exchange>,
    incoming: VecDeque<u8>,
    connected: bool,
    sent: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl MockTransport {
    /// Create a connected mock with no expectations.
    pub fn new() -> Self {
        MockTransport {
            exchanges: VecDeque::new(),
            incoming: VecDeque::new(),
            connected: true,
            sent: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Answer the next `send()` of `request` with `response`.
    pub fn expect(&mut self, request: &[u8], response: &[u8]) {
        self.exchanges.push_back(Exchange {
            request: request.to_vec(),
            response: response.to_vec(),
        });
    }

    /// Queue bytes that arrive without being asked for.
    pub fn push_incoming(&mut self, data: &[u8]) {
        self.incoming.extend(data);
    }

    /// Shared log of every `send()`, usable after the mock has been moved
    /// into an IO task.
    pub fn sent_log(&self) -> Arc<Mutex<Vec<Vec<u8>>>> {
        Arc::clone(&self.sent)
    }

    /// Number of exchanges not yet consumed.
    pub fn remaining_expectations(&self) -> usize {
        self.exchanges.len()
    }

    /// Simulate the port going away.
    pub fn set_connected(&mut self, connected: bool) {
        self.connected = connected;
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&mut self, data: &[u8]) -> Result<()> {
        if !self.connected {
            return Err(Error::NotConnected);
        }
        self.sent
            .lock()
            .map_err(|_| Error::Transport("sent log poisoned".into()))?
            .push(data.to_vec());

        let Some(exchange) = self.exchanges.pop_front() else {
            return Err(Error::Transport("no more expectations in mock transport".into()));
        };
        if data != exchange.request.as_slice() {
            return Err(Error::Transport(format!(
                "unexpected send data: expected {:02X?}, got {:02X?}",
                exchange.request, data
            )));
        }
        self.incoming.extend(exchange.response);
        Ok(())
    }

    async fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        if !self.connected {
            return Err(Error::NotConnected);
        }
        if self.incoming.is_empty() {
            tokio::time::sleep(timeout).await;
            return Err(Error::ReadTimeout);
        }
        let n = self.incoming.len().min(buf.len());
        for (slot, byte) in buf.iter_mut().zip(self.incoming.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    async fn close(&mut self) -> Result<()> {
        self.connected = false;
        self.incoming.clear();
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_then_receive_response() {
        let mut mock = MockTransport::new();
        mock.expect(&[0x01, 0x02], &[0xAA, 0xBB, 0xCC]);

        mock.send(&[0x01, 0x02]).await.unwrap();
        let mut buf = [0u8; 8];
        let n = mock.receive(&mut buf, Duration::from_millis(10)).await.unwrap();
        assert_eq!(&buf[..n], &[0xAA, 0xBB, 0xCC]);
        assert_eq!(mock.remaining_expectations(), 0);
    }

    #[tokio::test]
    async fn partial_reads() {
        let mut mock = MockTransport::new();
        mock.push_incoming(&[1, 2, 3, 4]);
        let mut buf = [0u8; 3];
        assert_eq!(mock.receive(&mut buf, Duration::ZERO).await.unwrap(), 3);
        assert_eq!(mock.receive(&mut buf, Duration::ZERO).await.unwrap(), 1);
        assert_eq!(buf[0], 4);
    }

    #[tokio::test(start_paused = true)]
    async fn idle_receive_waits_out_timeout() {
        let mut mock = MockTransport::new();
        let start = tokio::time::Instant::now();
        let mut buf = [0u8; 8];
        let result = mock.receive(&mut buf, Duration::from_millis(100)).await;
        assert!(matches!(result, Err(Error::ReadTimeout)));
        assert_eq!(start.elapsed(), Duration::from_millis(100));
    }

    #[tokio::test]
    async fn unexpected_send_is_rejected() {
        let mut mock = MockTransport::new();
        mock.expect(&[0x01], &[0xFF]);
        assert!(matches!(mock.send(&[0x99]).await, Err(Error::Transport(_))));
        assert_eq!(mock.sent_log().lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn closed_mock_fails() {
        let mut mock = MockTransport::new();
        mock.close().await.unwrap();
        assert!(!mock.is_connected());
        assert!(matches!(mock.send(&[0x01]).await, Err(Error::NotConnected)));
    }
}
