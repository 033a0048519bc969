//! # binkr transport
//!
//! Deadline-aware byte channels for the BinkP session. The session layer is
//! a single cooperative task, so every read and write takes an explicit
//! deadline; a read that would block past its deadline reports `Timeout`
//! rather than suspending the whole session.
//!
//! The production channel is a TCP stream, but everything is generic over
//! [`StreamConnection`] so tests can drive a session over an in-memory
//! duplex pipe.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod connection;
pub mod stream;

pub use connection::{Connection, ConnectionError, ConnectionResult};
pub use stream::{StreamConnection, TcpConnection, accept, connect};

/// Well-known BinkP listener port.
pub const DEFAULT_BINKP_PORT: u16 = 24554;
