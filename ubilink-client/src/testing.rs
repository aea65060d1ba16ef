//! In-memory transport shared by the engine and session tests.

use std::collections::VecDeque;
use std::time::Duration;

use crate::error::TransportError;
use crate::transport::Transport;

#[derive(Debug, Default)]
pub struct ScriptedTransport {
    pub open: bool,
    /// Chunks handed out by `read`, front first.
    pub inbound: VecDeque<Vec<u8>>,
    /// Report end of stream once `inbound` is drained.
    pub eof: bool,
    /// Every buffer passed to `write`.
    pub written: Vec<Vec<u8>>,
    /// Number of upcoming `connect` calls that fail.
    pub failing_connects: usize,
    pub connect_calls: usize,
    /// Timeout passed to the most recent `connect`.
    pub connect_timeout: Option<Duration>,
    pub disconnect_calls: usize,
}

impl ScriptedTransport {
    pub fn open() -> Self {
        Self {
            open: true,
            ..Default::default()
        }
    }

    pub fn push_inbound(&mut self, bytes: &[u8]) {
        self.inbound.push_back(bytes.to_vec());
    }
}

impl Transport for ScriptedTransport {
    async fn connect(
        &mut self,
        _host: &str,
        _port: u16,
        timeout: Duration,
    ) -> Result<(), TransportError> {
        self.connect_calls += 1;
        self.connect_timeout = Some(timeout);

        if self.open {
            return Err(TransportError::AlreadyOpen);
        }

        if self.failing_connects > 0 {
            self.failing_connects -= 1;
            return Err(TransportError::Timeout);
        }

        self.open = true;
        Ok(())
    }

    async fn read(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, TransportError> {
        if !self.open {
            return Err(TransportError::NotOpen);
        }

        let Some(chunk) = self.inbound.front_mut() else {
            if self.eof {
                return Err(TransportError::Closed);
            }

            tokio::time::sleep(timeout).await;
            return Ok(0);
        };

        let n = buf.len().min(chunk.len());
        buf[..n].copy_from_slice(&chunk[..n]);
        chunk.drain(..n);

        if chunk.is_empty() {
            self.inbound.pop_front();
        }

        Ok(n)
    }

    async fn write(&mut self, buf: &[u8], _timeout: Duration) -> Result<usize, TransportError> {
        if !self.open {
            return Err(TransportError::NotOpen);
        }

        self.written.push(buf.to_vec());
        Ok(buf.len())
    }

    async fn disconnect(&mut self) {
        self.disconnect_calls += 1;
        self.open = false;
    }

    fn is_open(&self) -> bool {
        self.open
    }
}
