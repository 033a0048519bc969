//! # binkr core
//!
//! Core protocol implementation for binkr, a BinkP mail-exchange engine.
//!
//! BinkP is a framed, bidirectional, half-duplex file-transfer protocol used
//! by FidoNet-style store-and-forward mail nodes. One TCP connection carries
//! both directions: each side identifies itself, authenticates with a shared
//! per-peer secret, announces and streams its outbound mail bundles in
//! fixed-size chunks, acknowledges the peer's files, and signals end-of-batch.
//!
//! This crate provides:
//! - **Frame codec**: 16-bit length-prefixed command and data frames
//! - **Announcement syntax**: the `name size mtime offset [crc]` file lines
//! - **Address handling**: `zone:net/node@domain` parsing and resolution
//! - **Peer directory**: local identity plus per-peer host/port/password
//! - **Session state machine**: handshake, auth, duplex exchange, teardown
//!
//! ## Module Structure
//!
//! - [`frame`]: frame encoding/decoding over a transport connection
//! - [`commands`]: BinkP command ids
//! - [`announce`]: file announcement parse/format
//! - [`address`]: FTN-style address parsing
//! - [`config`]: local configuration and the peer directory
//! - [`remote`]: what we learn about the peer during a session
//! - [`session`]: the session state machine
//! - [`error`]: session error categories

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod address;
pub mod announce;
pub mod commands;
pub mod config;
pub mod error;
pub mod frame;
pub mod remote;
pub mod session;

pub use address::FtnAddress;
pub use announce::{Announcement, Receipt};
pub use config::{BinkConfig, PeerEntry};
pub use error::SessionError;
pub use frame::Frame;
pub use remote::Remote;
pub use session::{BinkSide, BinkpSession, SessionOptions};

/// Largest frame payload the wire format can carry (15-bit length).
pub const MAX_PAYLOAD_LEN: usize = 0x7FFF;

/// Data chunk size used when streaming files. Within the 32767-byte frame
/// maximum; fixed for the whole session.
pub const DEFAULT_CHUNK_SIZE: usize = 16 * 1024;
