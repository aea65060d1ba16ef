//! Byte-stream transports the protocol engine runs over.

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_rustls::client::TlsStream;
use tracing::{debug, trace};

use crate::error::TransportError;
use crate::options::TlsOptions;
use crate::tls::build_tls_connector;

/// A connect/read/write/close byte stream.
#[allow(async_fn_in_trait)]
pub trait Transport {
    /// Open the stream. Fails with [`TransportError::AlreadyOpen`] if a handle is held.
    async fn connect(&mut self, host: &str, port: u16, timeout: Duration)
        -> Result<(), TransportError>;

    /// Read whatever is available into `buf`.
    ///
    /// Returns `Ok(0)` when `timeout` elapses without data and
    /// [`TransportError::Closed`] when the peer has closed the stream.
    async fn read(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, TransportError>;

    /// Write all of `buf`, returning the number of bytes written.
    async fn write(&mut self, buf: &[u8], timeout: Duration) -> Result<usize, TransportError>;

    /// Close the stream and release the handle. Safe to call when already closed.
    async fn disconnect(&mut self);

    /// Whether a stream handle is currently held.
    fn is_open(&self) -> bool;
}

enum Stream {
    Plain(TcpStream),
    Tls(Box<TlsStream<TcpStream>>),
}

impl Stream {
    async fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self {
            Stream::Plain(s) => s.read(buf).await,
            Stream::Tls(s) => s.read(buf).await,
        }
    }

    async fn write_all(&mut self, buf: &[u8]) -> std::io::Result<()> {
        match self {
            Stream::Plain(s) => {
                s.write_all(buf).await?;
                s.flush().await
            }
            Stream::Tls(s) => {
                s.write_all(buf).await?;
                s.flush().await
            }
        }
    }

    async fn shutdown(&mut self) -> std::io::Result<()> {
        match self {
            Stream::Plain(s) => s.shutdown().await,
            Stream::Tls(s) => s.shutdown().await,
        }
    }
}

/// TCP transport, optionally wrapped in TLS. The variant is fixed at construction.
pub struct NetTransport {
    tls: Option<TlsOptions>,
    stream: Option<Stream>,
}

impl NetTransport {
    pub fn plain() -> Self {
        Self {
            tls: None,
            stream: None,
        }
    }

    pub fn tls(options: TlsOptions) -> Self {
        Self {
            tls: Some(options),
            stream: None,
        }
    }

    pub fn is_encrypted(&self) -> bool {
        self.tls.is_some()
    }
}

impl Transport for NetTransport {
    async fn connect(
        &mut self,
        host: &str,
        port: u16,
        connect_timeout: Duration,
    ) -> Result<(), TransportError> {
        if self.stream.is_some() {
            return Err(TransportError::AlreadyOpen);
        }

        let addr = format!("{}:{}", host, port);
        debug!("Connecting to {}", addr);

        let tcp = timeout(connect_timeout, TcpStream::connect(&addr))
            .await
            .map_err(|_| TransportError::Timeout)??;

        let stream = match &self.tls {
            None => Stream::Plain(tcp),
            Some(options) => {
                let (connector, server_name) = build_tls_connector(options, host)?;
                let tls = timeout(connect_timeout, connector.connect(server_name, tcp))
                    .await
                    .map_err(|_| TransportError::Timeout)??;
                Stream::Tls(Box::new(tls))
            }
        };

        debug!(encrypted = self.is_encrypted(), "Connected to {}", addr);
        self.stream = Some(stream);

        Ok(())
    }

    async fn read(&mut self, buf: &mut [u8], read_timeout: Duration) -> Result<usize, TransportError> {
        let stream = self.stream.as_mut().ok_or(TransportError::NotOpen)?;

        match timeout(read_timeout, stream.read(buf)).await {
            Err(_) => Ok(0),
            Ok(Ok(0)) if !buf.is_empty() => Err(TransportError::Closed),
            Ok(Ok(n)) => {
                trace!("Read {} bytes", n);
                Ok(n)
            }
            Ok(Err(e)) => Err(e.into()),
        }
    }

    async fn write(&mut self, buf: &[u8], write_timeout: Duration) -> Result<usize, TransportError> {
        let stream = self.stream.as_mut().ok_or(TransportError::NotOpen)?;

        timeout(write_timeout, stream.write_all(buf))
            .await
            .map_err(|_| TransportError::Timeout)??;

        trace!("Wrote {} bytes", buf.len());
        Ok(buf.len())
    }

    async fn disconnect(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            if let Err(e) = stream.shutdown().await {
                debug!("Error shutting down stream: {}", e);
            }
        }
    }

    fn is_open(&self) -> bool {
        self.stream.is_some()
    }
}
