//! Frame encoding and decoding over a [`Connection`].
//!
//! Every frame starts with a 16-bit big-endian header: the top bit
//! distinguishes command (1) from data (0) frames, the low 15 bits carry the
//! payload length. A command payload is the command id byte followed by its
//! ASCII arguments (no trailing NUL); a data payload is opaque bytes of the
//! file currently being received.
//!
//! The codec is strictly a framing layer: it never interprets command
//! arguments.

use crate::commands::command_name;
use crate::MAX_PAYLOAD_LEN;
use binkr_transport::{Connection, ConnectionError};
use std::time::Duration;

/// Header bit distinguishing command frames from data frames.
pub const COMMAND_BIT: u16 = 0x8000;

/// How long the payload of a frame may take to arrive once its header has
/// been read. A stall here means a truncated frame, not an idle line.
const PAYLOAD_DEADLINE: Duration = Duration::from_secs(30);

/// Deadline for pushing a frame into the socket. A peer that cannot accept
/// a frame for this long has wedged the session.
pub const SEND_DEADLINE: Duration = Duration::from_secs(10);

/// One BinkP frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// A command frame: id plus ASCII arguments.
    Command {
        /// Command id (see [`crate::commands`]).
        id: u8,
        /// Argument bytes, without the id and without a NUL terminator.
        args: Vec<u8>,
    },
    /// A data frame belonging to the most recently announced inbound file.
    Data(Vec<u8>),
}

impl Frame {
    /// Command arguments as text (BinkP arguments are ASCII).
    pub fn args_text(&self) -> String {
        match self {
            Frame::Command { args, .. } => String::from_utf8_lossy(args).into_owned(),
            Frame::Data(_) => String::new(),
        }
    }
}

/// Frame codec errors.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// No frame header arrived before the deadline. During the transfer
    /// loop this is the normal "nothing to read right now" outcome.
    #[error("no frame before deadline")]
    Timeout,

    /// A header arrived but its payload did not complete in time.
    #[error("truncated frame: payload did not arrive")]
    Truncated,

    /// A command frame must carry at least its id byte.
    #[error("command frame with empty payload")]
    EmptyCommand,

    /// Data frames carry at least one byte on the wire.
    #[error("refusing to write an empty data frame")]
    EmptyData,

    /// Payload too large for the 15-bit length field.
    #[error("payload of {0} bytes exceeds the {MAX_PAYLOAD_LEN}-byte frame maximum")]
    Oversize(usize),

    /// Transport failure.
    #[error(transparent)]
    Connection(#[from] ConnectionError),
}

/// Read one frame. `deadline` bounds the wait for the frame header; once a
/// header has been seen the payload must complete within a fixed window or
/// the frame is reported truncated.
pub async fn read_frame<C>(conn: &mut C, deadline: Duration) -> Result<Frame, FrameError>
where
    C: Connection + ?Sized,
{
    // The poll deadline covers only the first header byte. Once any of the
    // frame is in, the rest must follow promptly or the stream is broken;
    // bailing out mid-header would desynchronize the framing.
    let first = match conn.read_u8(deadline).await {
        Ok(byte) => byte,
        Err(ConnectionError::Timeout) => return Err(FrameError::Timeout),
        Err(e) => return Err(e.into()),
    };
    let second = conn.read_u8(PAYLOAD_DEADLINE).await.map_err(|e| match e {
        ConnectionError::Timeout => FrameError::Truncated,
        other => FrameError::Connection(other),
    })?;
    let header = u16::from_be_bytes([first, second]);

    let is_command = header & COMMAND_BIT != 0;
    let len = (header & !COMMAND_BIT) as usize;
    if is_command && len == 0 {
        return Err(FrameError::EmptyCommand);
    }

    let mut payload = vec![0u8; len];
    if len > 0 {
        conn.receive_exact(&mut payload, PAYLOAD_DEADLINE)
            .await
            .map_err(|e| match e {
                ConnectionError::Timeout => FrameError::Truncated,
                other => FrameError::Connection(other),
            })?;
    }

    if is_command {
        let args = payload.split_off(1);
        let id = payload[0];
        tracing::trace!(command = command_name(id), len, "frame in");
        Ok(Frame::Command { id, args })
    } else {
        tracing::trace!(len, "data frame in");
        Ok(Frame::Data(payload))
    }
}

/// Write a command frame: header, id byte, then the argument bytes.
pub async fn write_command<C>(conn: &mut C, id: u8, args: &[u8]) -> Result<(), FrameError>
where
    C: Connection + ?Sized,
{
    let payload_len = 1 + args.len();
    if payload_len > MAX_PAYLOAD_LEN {
        return Err(FrameError::Oversize(payload_len));
    }
    let header = COMMAND_BIT | payload_len as u16;

    let mut packet = Vec::with_capacity(2 + payload_len);
    packet.extend_from_slice(&header.to_be_bytes());
    packet.push(id);
    packet.extend_from_slice(args);
    conn.send_all(&packet, SEND_DEADLINE).await?;
    tracing::trace!(
        command = command_name(id),
        args = %String::from_utf8_lossy(args),
        "frame out"
    );
    Ok(())
}

/// Write a data frame. Payloads larger than the frame maximum are split by
/// the caller; empty payloads are refused.
pub async fn write_data<C>(conn: &mut C, bytes: &[u8]) -> Result<(), FrameError>
where
    C: Connection + ?Sized,
{
    if bytes.is_empty() {
        return Err(FrameError::EmptyData);
    }
    if bytes.len() > MAX_PAYLOAD_LEN {
        return Err(FrameError::Oversize(bytes.len()));
    }
    let header = bytes.len() as u16;

    let mut packet = Vec::with_capacity(2 + bytes.len());
    packet.extend_from_slice(&header.to_be_bytes());
    packet.extend_from_slice(bytes);
    conn.send_all(&packet, SEND_DEADLINE).await?;
    tracing::trace!(len = bytes.len(), "data frame out");
    Ok(())
}
