//! # binkr spool
//!
//! File handling for a BinkP node: the [`TransferFile`] capability over
//! sendable payloads (in-memory or file-backed), and the [`FileManager`]
//! that enumerates the outbound spool and assembles inbound files with a
//! temp-file-plus-atomic-rename discipline.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod manager;
pub mod transfer_file;

pub use manager::{FileManager, InboundFile};
pub use transfer_file::{FileTransferFile, InMemoryTransferFile, TransferFile};

use std::path::PathBuf;

/// Spool-level errors.
#[derive(Debug, thiserror::Error)]
pub enum SpoolError {
    /// Underlying filesystem failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A chunk request fell outside the payload.
    #[error("chunk [{start}, {start}+{len}) out of range for {size}-byte file")]
    ChunkOutOfRange {
        /// Requested start offset.
        start: u64,
        /// Requested length.
        len: usize,
        /// Actual payload size.
        size: u64,
    },

    /// An inbound announcement carried an unusable file name.
    #[error("unacceptable inbound file name: {0:?}")]
    BadFileName(String),

    /// An inbound file was committed before reaching its announced size.
    #[error("inbound file {name:?} incomplete: {received} of {expected} bytes")]
    Incomplete {
        /// Announced name.
        name: String,
        /// Bytes actually received.
        received: u64,
        /// Announced size.
        expected: u64,
    },

    /// No unused final name could be derived for an inbound file.
    #[error("no free name for inbound file in {0}")]
    NameSpaceExhausted(PathBuf),
}
