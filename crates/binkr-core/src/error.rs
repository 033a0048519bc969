//! Session error categories.

use crate::config::ConfigError;
use binkr_spool::SpoolError;
use binkr_transport::ConnectionError;

/// Why a session failed.
///
/// The categories mirror how failures propagate: I/O and protocol errors
/// get a best-effort M_ERR while the connection is still writable, remote
/// errors never do (the peer already ended the session), and config errors
/// are diagnosed before any network I/O happens.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Startup configuration problem.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Socket-level failure, including deadline overruns on writes.
    #[error("I/O failure: {0}")]
    Io(#[from] ConnectionError),

    /// The peer violated the protocol.
    #[error("protocol violation: {0}")]
    Protocol(String),

    /// Authentication failed (password mismatch, or M_OK never came).
    #[error("authentication failed: {0}")]
    Auth(String),

    /// The peer ended the session with M_ERR or M_BSY.
    #[error("remote terminated the session: {0}")]
    Remote(String),

    /// Spool or filesystem failure.
    #[error("file system error: {0}")]
    FileSystem(#[from] SpoolError),

    /// The session-wide deadline elapsed.
    #[error("session deadline exceeded")]
    DeadlineExceeded,
}

impl SessionError {
    /// Whether run() should attempt a final M_ERR for this failure. Remote
    /// errors must not be answered and socket failures cannot be.
    pub(crate) fn wants_err_frame(&self) -> bool {
        matches!(self, SessionError::Protocol(_) | SessionError::Auth(_))
    }
}
