//! `Connection` over any async byte stream, plus TCP connect/accept helpers.

use crate::connection::{Connection, ConnectionError, ConnectionResult};
use async_trait::async_trait;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;

/// A [`Connection`] backed by any `AsyncRead + AsyncWrite` stream.
///
/// Production sessions use [`TcpConnection`]; tests run the same code over
/// `tokio::io::duplex` pipes.
pub struct StreamConnection<S> {
    stream: S,
    open: bool,
}

impl<S> StreamConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Wrap an open stream.
    pub fn new(stream: S) -> Self {
        Self { stream, open: true }
    }
}

#[async_trait]
impl<S> Connection for StreamConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn receive(&mut self, buf: &mut [u8], deadline: Duration) -> ConnectionResult<usize> {
        if !self.open {
            return Err(ConnectionError::Closed);
        }
        if buf.is_empty() {
            return Ok(0);
        }
        match timeout(deadline, self.stream.read(buf)).await {
            Err(_elapsed) => Err(ConnectionError::Timeout),
            Ok(Ok(n)) => Ok(n),
            Ok(Err(e)) => Err(ConnectionError::Io(e)),
        }
    }

    async fn send(&mut self, buf: &[u8], deadline: Duration) -> ConnectionResult<usize> {
        if !self.open {
            return Err(ConnectionError::Closed);
        }
        if buf.is_empty() {
            return Ok(0);
        }
        match timeout(deadline, self.stream.write(buf)).await {
            Err(_elapsed) => Err(ConnectionError::Timeout),
            Ok(Ok(n)) => Ok(n),
            Ok(Err(e)) => Err(ConnectionError::Io(e)),
        }
    }

    async fn close(&mut self) {
        if self.open {
            let _ = self.stream.shutdown().await;
            self.open = false;
        }
    }

    fn is_open(&self) -> bool {
        self.open
    }
}

/// A TCP-backed connection.
pub type TcpConnection = StreamConnection<TcpStream>;

/// Connect to a remote BinkP node.
pub async fn connect(host: &str, port: u16) -> ConnectionResult<TcpConnection> {
    tracing::debug!(host, port, "connecting");
    let stream = TcpStream::connect((host, port)).await?;
    stream.set_nodelay(true)?;
    Ok(StreamConnection::new(stream))
}

/// Bind to `port` and accept a single inbound connection.
pub async fn accept(port: u16) -> ConnectionResult<TcpConnection> {
    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    tracing::info!(port, "listening");
    let (stream, peer) = listener.accept().await?;
    tracing::info!(%peer, "accepted connection");
    stream.set_nodelay(true)?;
    Ok(StreamConnection::new(stream))
}
