//! The `Connection` trait: a byte channel with per-call deadlines.

use async_trait::async_trait;
use std::io;
use std::time::Duration;
use tokio::time::Instant;

/// Transport-level errors.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// The deadline elapsed before the operation completed.
    #[error("deadline elapsed")]
    Timeout,

    /// The connection is closed (locally or by the peer).
    #[error("connection closed")]
    Closed,

    /// I/O error from the underlying stream.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Result type for connection operations.
pub type ConnectionResult<T> = Result<T, ConnectionError>;

/// A bidirectional byte channel with per-call deadlines.
///
/// Semantics follow the BinkP session's needs:
///
/// - `receive` blocks until at least one byte is available, the peer closes
///   (returns `Ok(0)`), or the deadline elapses (`Timeout`). Short reads are
///   permitted; callers that need an exact count loop via [`receive_exact`].
/// - `send` similarly; a send that cannot make progress within its deadline
///   is a fatal condition for the caller.
/// - After [`close`], every operation fails with `Closed`.
///
/// [`receive_exact`]: Connection::receive_exact
/// [`close`]: Connection::close
#[async_trait]
pub trait Connection: Send {
    /// Read up to `buf.len()` bytes. `Ok(0)` means the peer closed.
    async fn receive(&mut self, buf: &mut [u8], deadline: Duration) -> ConnectionResult<usize>;

    /// Write up to `buf.len()` bytes, returning how many were accepted.
    async fn send(&mut self, buf: &[u8], deadline: Duration) -> ConnectionResult<usize>;

    /// Close the connection. Idempotent.
    async fn close(&mut self);

    /// Whether the connection is still open.
    fn is_open(&self) -> bool;

    /// Read exactly `buf.len()` bytes within `deadline`, looping over short
    /// reads. EOF mid-read is `Closed`.
    ///
    /// At least one receive is always attempted, so a zero deadline acts as
    /// a non-blocking poll for data that has already arrived.
    async fn receive_exact(&mut self, buf: &mut [u8], deadline: Duration) -> ConnectionResult<()> {
        let start = Instant::now();
        let mut filled = 0;
        while filled < buf.len() {
            let remaining = deadline.saturating_sub(start.elapsed());
            let n = self.receive(&mut buf[filled..], remaining).await?;
            if n == 0 {
                return Err(ConnectionError::Closed);
            }
            filled += n;
        }
        Ok(())
    }

    /// Write all of `buf` within `deadline`, looping over short writes.
    async fn send_all(&mut self, buf: &[u8], deadline: Duration) -> ConnectionResult<()> {
        let start = Instant::now();
        let mut sent = 0;
        while sent < buf.len() {
            let remaining = deadline.saturating_sub(start.elapsed());
            let n = self.send(&buf[sent..], remaining).await?;
            if n == 0 {
                return Err(ConnectionError::Closed);
            }
            sent += n;
        }
        Ok(())
    }

    /// Read exactly one byte.
    async fn read_u8(&mut self, deadline: Duration) -> ConnectionResult<u8> {
        let mut byte = [0u8; 1];
        self.receive_exact(&mut byte, deadline).await?;
        Ok(byte[0])
    }

    /// Read a big-endian `u16`.
    async fn read_u16_be(&mut self, deadline: Duration) -> ConnectionResult<u16> {
        let mut bytes = [0u8; 2];
        self.receive_exact(&mut bytes, deadline).await?;
        Ok(u16::from_be_bytes(bytes))
    }
}
