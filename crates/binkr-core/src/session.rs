//! The BinkP session state machine.
//!
//! One session drives one connection from greeting to teardown:
//!
//! ```text
//! ConnInit -> WaitConn -> SendPasswd -> WaitAddr -> AuthRemote -> WaitOk -> TransferFiles -> Done
//!                (answering side skips SendPasswd and WaitOk)
//! ```
//!
//! The transfer phase is a single cooperative loop that alternates outbound
//! work (announce, stream one chunk, end-of-batch) with a timed poll for
//! inbound frames, which yields duplex behavior on one task. A poll timeout
//! is the normal "nothing to read" outcome, not an error.

use crate::announce::{Announcement, Receipt};
use crate::commands::{
    command_name, M_ADR, M_BSY, M_EOB, M_ERR, M_FILE, M_GET, M_GOT, M_NUL, M_OK, M_PWD, M_SKIP,
};
use crate::config::BinkConfig;
use crate::error::SessionError;
use crate::frame::{self, Frame, FrameError};
use crate::remote::Remote;
use crate::{DEFAULT_CHUNK_SIZE, MAX_PAYLOAD_LEN};
use binkr_spool::{FileManager, InboundFile, SpoolError, TransferFile};
use binkr_transport::{Connection, ConnectionError};
use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

/// How long ConnInit waits for already-buffered frames before moving on.
const CONN_INIT_DRAIN: Duration = Duration::from_millis(200);

/// Which end of the TCP connection we are. The roles differ only during
/// the password and M_OK exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinkSide {
    /// We dialed the peer.
    Originating,
    /// We accepted the call.
    Answering,
}

/// Session tuning knobs.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Bytes per data frame, clamped to `[1024, 32767]`. Fixed for the
    /// whole session.
    pub chunk_size: usize,
    /// Poll deadline for inbound frames while the transfer loop is idle.
    pub recv_poll: Duration,
    /// How long to wait for each frame the handshake requires.
    pub handshake_wait: Duration,
    /// Wall-clock budget for the whole session.
    pub session_deadline: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            recv_poll: Duration::from_secs(1),
            handshake_wait: Duration::from_secs(15),
            session_deadline: Duration::from_secs(600),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BinkState {
    ConnInit,
    WaitConn,
    SendPasswd,
    WaitAddr,
    AuthRemote,
    WaitOk,
    TransferFiles,
    Done,
}

/// The outbound file currently being streamed.
struct SendState {
    name: String,
    size: u64,
    offset: u64,
}

/// The inbound file currently being assembled.
struct RecvState {
    sink: InboundFile,
    announced_crc: Option<u32>,
}

/// One BinkP session over one connection.
///
/// The session owns the connection, the spool manager, and every transfer
/// file: a file lives in exactly one place at a time (the outbound queue,
/// the pending-acknowledgement map, or an in-flight slot).
pub struct BinkpSession<C: Connection> {
    conn: C,
    config: BinkConfig,
    files: FileManager,
    side: BinkSide,
    opts: SessionOptions,

    /// The node we dialed (originating side only).
    expected_remote_node: Option<u16>,
    /// The peer's node, resolved during authentication.
    peer_node: Option<u16>,

    remote: Remote,
    received_password: Option<String>,
    ok_received: bool,

    outbound: VecDeque<Box<dyn TransferFile>>,
    pending_ack: HashMap<String, Box<dyn TransferFile>>,
    in_flight_send: Option<SendState>,
    in_flight_recv: Option<RecvState>,
    eob_sent: bool,
    eob_received: bool,

    started: Instant,
}

impl<C: Connection> BinkpSession<C> {
    /// Session for a connection we dialed, expecting `remote_node` on the
    /// other end.
    pub fn originating(
        conn: C,
        config: BinkConfig,
        files: FileManager,
        remote_node: u16,
        opts: SessionOptions,
    ) -> Self {
        Self::new(conn, config, files, BinkSide::Originating, Some(remote_node), opts)
    }

    /// Session for a connection we accepted.
    pub fn answering(conn: C, config: BinkConfig, files: FileManager, opts: SessionOptions) -> Self {
        Self::new(conn, config, files, BinkSide::Answering, None, opts)
    }

    fn new(
        conn: C,
        config: BinkConfig,
        files: FileManager,
        side: BinkSide,
        expected_remote_node: Option<u16>,
        opts: SessionOptions,
    ) -> Self {
        Self {
            conn,
            config,
            files,
            side,
            opts,
            expected_remote_node,
            peer_node: None,
            remote: Remote::new(),
            received_password: None,
            ok_received: false,
            outbound: VecDeque::new(),
            pending_ack: HashMap::new(),
            in_flight_send: None,
            in_flight_recv: None,
            eob_sent: false,
            eob_received: false,
            started: Instant::now(),
        }
    }

    /// What the peer told us about itself.
    pub fn remote(&self) -> &Remote {
        &self.remote
    }

    /// Final paths of inbound files committed this session.
    pub fn received_files(&self) -> &[std::path::PathBuf] {
        self.files.received_files()
    }

    /// Drive the session to completion.
    ///
    /// On a local protocol or authentication failure a final M_ERR is sent
    /// while the connection is still writable; remote failures are never
    /// answered. Either way the connection is closed and any partially
    /// received file is discarded before returning.
    pub async fn run(&mut self) -> Result<(), SessionError> {
        self.started = Instant::now();
        let result = self.drive().await;

        if let Err(e) = &result {
            tracing::warn!(error = %e, "session failed");
            if e.wants_err_frame() && self.conn.is_open() {
                let reason = e.to_string();
                if let Err(send_err) =
                    frame::write_command(&mut self.conn, M_ERR, reason.as_bytes()).await
                {
                    tracing::debug!(error = %send_err, "could not deliver M_ERR");
                }
            }
        }

        if let Some(recv) = self.in_flight_recv.take() {
            tracing::debug!(name = recv.sink.name(), "discarding partial inbound file");
            self.files.discard_inbound(recv.sink);
        }
        self.conn.close().await;
        result
    }

    async fn drive(&mut self) -> Result<(), SessionError> {
        let mut state = BinkState::ConnInit;
        loop {
            state = match state {
                BinkState::ConnInit => self.conn_init().await?,
                BinkState::WaitConn => self.wait_conn().await?,
                BinkState::SendPasswd => self.send_passwd().await?,
                BinkState::WaitAddr => self.wait_addr().await?,
                BinkState::AuthRemote => self.auth_remote().await?,
                BinkState::WaitOk => self.wait_ok().await?,
                BinkState::TransferFiles => self.transfer_files().await?,
                BinkState::Done => {
                    tracing::info!("session complete");
                    return Ok(());
                }
            };
        }
    }

    // ------------------------------------------------------------------
    // Handshake states
    // ------------------------------------------------------------------

    /// Drain any frames the peer pushed before we said anything. Timeouts
    /// here are expected and end the drain.
    async fn conn_init(&mut self) -> Result<BinkState, SessionError> {
        tracing::debug!("ConnInit");
        loop {
            match frame::read_frame(&mut self.conn, CONN_INIT_DRAIN).await {
                Ok(frame) => self.handle_handshake_frame(frame)?,
                Err(FrameError::Timeout) => break,
                Err(e) => return Err(session_err(e)),
            }
        }
        Ok(BinkState::WaitConn)
    }

    /// Introduce ourselves: the informational M_NUL lines plus our address.
    async fn wait_conn(&mut self) -> Result<BinkState, SessionError> {
        tracing::debug!("WaitConn");
        let nuls = [
            format!("SYS {}", self.config.system_name()),
            format!("ZYZ {}", self.config.sysop_name()),
            format!("VER {}", self.config.version_string()),
        ];
        for line in &nuls {
            self.send_command(M_NUL, line.as_bytes()).await?;
        }
        if let Some(location) = self.config.location() {
            let line = format!("LOC {location}");
            self.send_command(M_NUL, line.as_bytes()).await?;
        }
        let adr = self.config.local_address_line();
        self.send_command(M_ADR, adr.as_bytes()).await?;

        Ok(match self.side {
            BinkSide::Originating => BinkState::SendPasswd,
            BinkSide::Answering => BinkState::WaitAddr,
        })
    }

    /// Originating side: present the configured password, `-` for none.
    async fn send_passwd(&mut self) -> Result<BinkState, SessionError> {
        tracing::debug!("SendPasswd");
        let node = self.expected_remote_node.unwrap_or_default();
        let password = self.config.expected_password_for(node).to_string();
        self.send_command(M_PWD, password.as_bytes()).await?;
        Ok(BinkState::WaitAddr)
    }

    /// Read frames until the peer has declared its addresses.
    async fn wait_addr(&mut self) -> Result<BinkState, SessionError> {
        tracing::debug!("WaitAddr");
        while self.remote.address_list().is_empty() {
            self.check_deadline()?;
            match frame::read_frame(&mut self.conn, self.opts.handshake_wait).await {
                Ok(frame) => self.handle_handshake_frame(frame)?,
                Err(FrameError::Timeout) => {
                    return Err(SessionError::Protocol(
                        "peer sent no M_ADR before the data exchange".to_string(),
                    ));
                }
                Err(e) => return Err(session_err(e)),
            }
        }
        Ok(BinkState::AuthRemote)
    }

    /// Resolve and verify the peer's identity; the answering side also
    /// checks the password and confirms with M_OK.
    async fn auth_remote(&mut self) -> Result<BinkState, SessionError> {
        tracing::debug!("AuthRemote");
        let network = self.config.network_name().to_string();
        let node = self.remote.resolve_node(&network).ok_or_else(|| {
            SessionError::Protocol(format!(
                "peer advertised no address in network {network:?}: {:?}",
                self.remote.address_list()
            ))
        })?;
        tracing::info!(
            node,
            system = self.remote.system_name(),
            "peer identified"
        );

        match self.side {
            BinkSide::Originating => {
                if self.expected_remote_node != Some(node) {
                    return Err(SessionError::Protocol(format!(
                        "dialed node {} but peer claims node {node}",
                        self.expected_remote_node.unwrap_or_default()
                    )));
                }
                self.peer_node = Some(node);
                Ok(BinkState::WaitOk)
            }
            BinkSide::Answering => {
                if self.config.node_config_for(node).is_none() {
                    return Err(SessionError::Auth(format!(
                        "no directory entry for node {node}"
                    )));
                }
                while self.received_password.is_none() {
                    self.check_deadline()?;
                    match frame::read_frame(&mut self.conn, self.opts.handshake_wait).await {
                        Ok(frame) => self.handle_handshake_frame(frame)?,
                        Err(FrameError::Timeout) => {
                            return Err(SessionError::Auth(
                                "peer never presented a password".to_string(),
                            ));
                        }
                        Err(e) => return Err(session_err(e)),
                    }
                }
                let supplied = self.received_password.as_deref().unwrap_or("-");
                if supplied != self.config.expected_password_for(node) {
                    return Err(SessionError::Auth(format!(
                        "password mismatch for node {node}"
                    )));
                }
                self.peer_node = Some(node);
                self.send_command(M_OK, b"").await?;
                Ok(BinkState::TransferFiles)
            }
        }
    }

    /// Originating side: wait for the answerer to accept our password.
    async fn wait_ok(&mut self) -> Result<BinkState, SessionError> {
        tracing::debug!("WaitOk");
        while !self.ok_received {
            self.check_deadline()?;
            match frame::read_frame(&mut self.conn, self.opts.handshake_wait).await {
                Ok(frame) => self.handle_handshake_frame(frame)?,
                Err(FrameError::Timeout) => {
                    return Err(SessionError::Auth("M_OK never received".to_string()));
                }
                Err(e) => return Err(session_err(e)),
            }
        }
        Ok(BinkState::TransferFiles)
    }

    /// Frames arriving before the transfer phase. File traffic is not legal
    /// yet; informational and auth frames are recorded.
    fn handle_handshake_frame(&mut self, frame: Frame) -> Result<(), SessionError> {
        let text = frame.args_text();
        match frame {
            Frame::Data(_) => Err(SessionError::Protocol(
                "data frame before the file exchange".to_string(),
            )),
            Frame::Command { id, .. } => match id {
                M_NUL => {
                    tracing::debug!(line = %text, "M_NUL");
                    self.remote.handle_nul(&text);
                    Ok(())
                }
                M_ADR => {
                    tracing::debug!(list = %text, "M_ADR");
                    self.remote.set_address_list(&text);
                    Ok(())
                }
                M_PWD => {
                    self.received_password = Some(text);
                    Ok(())
                }
                M_OK => {
                    self.ok_received = true;
                    Ok(())
                }
                M_EOB => {
                    // A peer with nothing to send may declare end-of-batch
                    // this early; remember it for the transfer loop.
                    self.eob_received = true;
                    Ok(())
                }
                M_ERR => Err(SessionError::Remote(format!("peer error: {text}"))),
                M_BSY => Err(SessionError::Remote(format!("peer busy: {text}"))),
                M_FILE | M_GET | M_GOT | M_SKIP => Err(SessionError::Protocol(format!(
                    "{} before authentication",
                    command_name(id)
                ))),
                other => {
                    tracing::warn!(id = other, args = %text, "ignoring unknown command");
                    Ok(())
                }
            },
        }
    }

    // ------------------------------------------------------------------
    // TransferFiles
    // ------------------------------------------------------------------

    /// The duplex exchange loop.
    async fn transfer_files(&mut self) -> Result<BinkState, SessionError> {
        tracing::debug!("TransferFiles");
        let peer_node = self
            .peer_node
            .ok_or_else(|| SessionError::Protocol("peer node never resolved".to_string()))?;
        self.outbound = self.files.list_outbound(peer_node)?.into();
        tracing::info!(queued = self.outbound.len(), "outbound queue ready");

        let chunk_size = self.opts.chunk_size.clamp(1024, MAX_PAYLOAD_LEN);

        loop {
            self.check_deadline()?;

            // a. Announce the next outbound file.
            if self.in_flight_send.is_none() && !self.eob_sent {
                if let Some(file) = self.outbound.pop_front() {
                    self.announce_file(file).await?;
                }
            }

            // b. Stream one chunk of the in-flight file.
            self.pump_send(chunk_size).await?;

            // c. Nothing left to announce: declare end-of-batch once.
            if self.in_flight_send.is_none() && self.outbound.is_empty() && !self.eob_sent {
                self.send_command(M_EOB, b"").await?;
                self.eob_sent = true;
                tracing::debug!("M_EOB sent");
            }

            // d. Poll for one inbound frame. While outbound work remains the
            // poll is non-blocking; otherwise wait out the configured window.
            let poll = if self.in_flight_send.is_some()
                || (!self.outbound.is_empty() && !self.eob_sent)
            {
                Duration::ZERO
            } else {
                self.opts.recv_poll
            };
            match frame::read_frame(&mut self.conn, poll).await {
                Ok(frame) => self.dispatch_transfer_frame(frame).await?,
                Err(FrameError::Timeout) => {}
                Err(e) => return Err(session_err(e)),
            }

            if self.eob_sent
                && self.eob_received
                && self.outbound.is_empty()
                && self.in_flight_send.is_none()
                && self.in_flight_recv.is_none()
                && self.pending_ack.is_empty()
            {
                return Ok(BinkState::Done);
            }
        }
    }

    /// Send M_FILE for `file` and move it to the pending-acknowledgement
    /// map; it leaves that map only via M_GOT or M_SKIP.
    async fn announce_file(&mut self, mut file: Box<dyn TransferFile>) -> Result<(), SessionError> {
        let name = file.name().to_string();
        let (size, mtime) = match (file.size(), file.mtime()) {
            (Ok(size), Ok(mtime)) => (size, mtime),
            (Err(e), _) | (_, Err(e)) => {
                // Nothing about this file is on the wire yet, so we can
                // still tell the peer why the session is ending.
                let reason = format!("cannot read outbound file {name}");
                let _ = frame::write_command(&mut self.conn, M_ERR, reason.as_bytes()).await;
                return Err(SessionError::FileSystem(e));
            }
        };

        let announcement = Announcement::new(name.clone(), size, mtime, 0, file.crc32());
        tracing::info!(%announcement, "announcing file");
        self.send_command(M_FILE, announcement.to_string().as_bytes())
            .await?;
        self.in_flight_send = Some(SendState {
            name: name.clone(),
            size,
            offset: 0,
        });
        self.pending_ack.insert(name, file);
        Ok(())
    }

    /// Stream at most one chunk of the in-flight outbound file.
    async fn pump_send(&mut self, chunk_size: usize) -> Result<(), SessionError> {
        let (name, size, offset) = match &self.in_flight_send {
            Some(send) => (send.name.clone(), send.size, send.offset),
            None => return Ok(()),
        };

        if offset < size {
            let Some(file) = self.pending_ack.get_mut(&name) else {
                // Acked or skipped out from under us; stop streaming.
                self.in_flight_send = None;
                return Ok(());
            };
            let want = (size - offset).min(chunk_size as u64) as usize;
            let chunk = file.read_chunk(offset, want)?;
            frame::write_data(&mut self.conn, &chunk)
                .await
                .map_err(session_err)?;
            if let Some(send) = self.in_flight_send.as_mut() {
                send.offset += chunk.len() as u64;
            }
        }

        if self
            .in_flight_send
            .as_ref()
            .is_some_and(|send| send.offset >= send.size)
        {
            tracing::debug!(name = %name, size, "file fully streamed, awaiting M_GOT");
            self.in_flight_send = None;
        }
        Ok(())
    }

    /// Dispatch one frame received during the transfer phase.
    async fn dispatch_transfer_frame(&mut self, frame: Frame) -> Result<(), SessionError> {
        match frame {
            Frame::Data(bytes) => self.handle_data(&bytes).await,
            Frame::Command { id, args } => {
                let text = String::from_utf8_lossy(&args).into_owned();
                match id {
                    M_FILE => self.handle_file_announcement(&text).await,
                    M_GOT => self.handle_got(&text),
                    M_GET => self.handle_get(&text).await,
                    M_SKIP => self.handle_skip(&text),
                    M_EOB => {
                        tracing::debug!("M_EOB received");
                        self.eob_received = true;
                        Ok(())
                    }
                    M_ERR => Err(SessionError::Remote(format!("peer error: {text}"))),
                    M_BSY => Err(SessionError::Remote(format!("peer busy: {text}"))),
                    M_NUL => {
                        self.remote.handle_nul(&text);
                        Ok(())
                    }
                    M_ADR | M_PWD | M_OK => {
                        tracing::debug!(command = command_name(id), "handshake command during transfer, ignored");
                        Ok(())
                    }
                    other => {
                        tracing::warn!(id = other, args = %text, "ignoring unknown command");
                        Ok(())
                    }
                }
            }
        }
    }

    /// A data frame belongs to the most recent M_FILE announcement.
    async fn handle_data(&mut self, bytes: &[u8]) -> Result<(), SessionError> {
        let Some(recv) = self.in_flight_recv.as_mut() else {
            return Err(SessionError::Protocol(
                "data frame with no file announced".to_string(),
            ));
        };
        // Check before writing: an overrun must never reach the disk.
        if recv.sink.received() + bytes.len() as u64 > recv.sink.expected_size() {
            return Err(SessionError::Protocol(format!(
                "{} bytes for {} exceed the announced {}",
                recv.sink.received() + bytes.len() as u64,
                recv.sink.name(),
                recv.sink.expected_size()
            )));
        }
        recv.sink.append_chunk(bytes)?;
        if recv.sink.received() == recv.sink.expected_size() {
            self.finish_recv().await?;
        }
        Ok(())
    }

    /// M_FILE: open an inbound sink for the announced file.
    async fn handle_file_announcement(&mut self, text: &str) -> Result<(), SessionError> {
        let announcement = Announcement::parse(text)
            .map_err(|e| SessionError::Protocol(format!("bad M_FILE {text:?}: {e}")))?;
        if self.in_flight_recv.is_some() {
            return Err(SessionError::Protocol(format!(
                "M_FILE {} while another file is open",
                announcement.name
            )));
        }
        if announcement.offset != 0 {
            // We never ask for resumes, so no compliant peer streams to us
            // from a nonzero offset.
            return Err(SessionError::Protocol(format!(
                "unsolicited M_FILE at offset {}",
                announcement.offset
            )));
        }

        tracing::info!(name = %announcement.name, size = announcement.size, "receiving file");
        let sink = match self.files.open_inbound(
            &announcement.name,
            announcement.size,
            announcement.mtime,
        ) {
            Ok(sink) => sink,
            Err(SpoolError::BadFileName(name)) => {
                return Err(SessionError::Protocol(format!(
                    "unacceptable announced file name {name:?}"
                )));
            }
            Err(e) => return Err(e.into()),
        };
        self.in_flight_recv = Some(RecvState {
            sink,
            announced_crc: announcement.crc32,
        });
        if announcement.size == 0 {
            self.finish_recv().await?;
        }
        Ok(())
    }

    /// Commit the completed inbound file and acknowledge it.
    async fn finish_recv(&mut self) -> Result<(), SessionError> {
        let Some(recv) = self.in_flight_recv.take() else {
            return Ok(());
        };
        if let Some(expected) = recv.announced_crc {
            let computed = recv.sink.crc32();
            if computed != expected {
                let name = recv.sink.name().to_string();
                self.files.discard_inbound(recv.sink);
                return Err(SessionError::Protocol(format!(
                    "CRC mismatch for {name}: announced {expected:08X}, computed {computed:08X}"
                )));
            }
        }
        let receipt = Receipt {
            name: recv.sink.name().to_string(),
            size: recv.sink.expected_size(),
            mtime: recv.sink.mtime(),
        };
        self.files.commit_inbound(recv.sink)?;
        self.send_command(M_GOT, receipt.to_string().as_bytes()).await?;
        Ok(())
    }

    /// M_GOT: the peer has the file; it may now leave the outbound spool.
    fn handle_got(&mut self, text: &str) -> Result<(), SessionError> {
        let receipt = match Receipt::parse(text) {
            Ok(receipt) => receipt,
            Err(e) => {
                tracing::warn!(line = %text, error = %e, "ignoring malformed M_GOT");
                return Ok(());
            }
        };
        match self.pending_ack.remove(&receipt.name) {
            Some(mut file) => {
                if self
                    .in_flight_send
                    .as_ref()
                    .is_some_and(|send| send.name == receipt.name)
                {
                    self.in_flight_send = None;
                }
                self.files.mark_outbound_sent(&mut file)?;
                Ok(())
            }
            None => {
                tracing::warn!(name = %receipt.name, "M_GOT for a file we are not sending");
                Ok(())
            }
        }
    }

    /// M_GET: restart (or start) streaming a pending file at an offset.
    async fn handle_get(&mut self, text: &str) -> Result<(), SessionError> {
        let request = Announcement::parse(text)
            .map_err(|e| SessionError::Protocol(format!("bad M_GET {text:?}: {e}")))?;

        let mut resumed = false;
        if let Some(file) = self.pending_ack.get_mut(&request.name) {
            let size = file.size()?;
            if request.offset <= size {
                tracing::info!(name = %request.name, offset = request.offset, "resuming at peer's request");
                self.in_flight_send = Some(SendState {
                    name: request.name.clone(),
                    size,
                    offset: request.offset,
                });
                resumed = true;
            }
        }
        if !resumed {
            tracing::warn!(name = %request.name, "M_GET for a file we cannot serve");
            self.send_command(M_SKIP, text.as_bytes()).await?;
        }
        Ok(())
    }

    /// M_SKIP: stop sending the file this session; it stays spooled for the
    /// next one.
    fn handle_skip(&mut self, text: &str) -> Result<(), SessionError> {
        let Some(name) = text.split_whitespace().next().map(str::to_string) else {
            tracing::warn!("ignoring empty M_SKIP");
            return Ok(());
        };
        if self
            .in_flight_send
            .as_ref()
            .is_some_and(|send| send.name == name)
        {
            self.in_flight_send = None;
        }
        if let Some(mut file) = self.pending_ack.remove(&name) {
            tracing::info!(name = %name, "peer skipped file; leaving it spooled");
            file.close()?;
        }
        self.outbound.retain(|file| file.name() != name);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    async fn send_command(&mut self, id: u8, args: &[u8]) -> Result<(), SessionError> {
        frame::write_command(&mut self.conn, id, args)
            .await
            .map_err(session_err)
    }

    fn check_deadline(&self) -> Result<(), SessionError> {
        if self.started.elapsed() > self.opts.session_deadline {
            return Err(SessionError::DeadlineExceeded);
        }
        Ok(())
    }
}

/// Map codec failures onto session categories. `Timeout` is intercepted by
/// callers that poll; anywhere else it means the line stalled.
fn session_err(e: FrameError) -> SessionError {
    match e {
        FrameError::Timeout => SessionError::Io(ConnectionError::Timeout),
        FrameError::Connection(c) => SessionError::Io(c),
        other => SessionError::Protocol(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{read_frame, write_command};
    use binkr_transport::StreamConnection;
    use std::path::Path;
    use tempfile::tempdir;
    use tokio::io::DuplexStream;

    const WAIT: Duration = Duration::from_secs(5);

    type TestConn = StreamConnection<DuplexStream>;

    fn test_options() -> SessionOptions {
        SessionOptions {
            recv_poll: Duration::from_millis(25),
            handshake_wait: Duration::from_secs(2),
            session_deadline: Duration::from_secs(20),
            ..SessionOptions::default()
        }
    }

    fn test_config(node: u16, dir: &Path, addresses: &str) -> BinkConfig {
        let text = format!(
            "NODE = {node}\n\
             SYSTEM_NAME = Test System {node}\n\
             NETWORK_NAME = testnet\n\
             INBOUND_DIR = in{node}\n\
             OUTBOUND_DIR = out{node}\n"
        );
        let mut cfg = BinkConfig::parse(&text, dir).unwrap();
        cfg.load_addresses(addresses).unwrap();
        cfg
    }

    fn answering_session(dir: &Path, addresses: &str) -> (BinkpSession<TestConn>, TestConn) {
        let (ours, theirs) = tokio::io::duplex(256 * 1024);
        let cfg = test_config(1, dir, addresses);
        let files = FileManager::new(cfg.inbound_dir(), cfg.outbound_dir()).unwrap();
        let session =
            BinkpSession::answering(StreamConnection::new(ours), cfg, files, test_options());
        (session, StreamConnection::new(theirs))
    }

    /// Read the session's frames until it answers with M_ERR.
    async fn saw_m_err(peer: &mut TestConn) -> bool {
        loop {
            match read_frame(peer, WAIT).await {
                Ok(Frame::Command { id: M_ERR, .. }) => break true,
                Ok(_) => continue,
                Err(_) => break false,
            }
        }
    }

    #[tokio::test]
    async fn remote_error_aborts_session() {
        let dir = tempdir().unwrap();
        let (mut session, mut peer) = answering_session(dir.path(), "@2 localhost -");
        let script = async {
            write_command(&mut peer, M_ERR, b"Doh!").await.unwrap();
        };
        let (result, ()) = tokio::join!(session.run(), script);
        assert!(matches!(result.unwrap_err(), SessionError::Remote(_)));
    }

    #[tokio::test]
    async fn password_mismatch_sends_err_and_fails_auth() {
        let dir = tempdir().unwrap();
        let (mut session, mut peer) = answering_session(dir.path(), "@42 localhost secret");
        let script = async {
            write_command(&mut peer, M_ADR, b"20000:20000/42@testnet")
                .await
                .unwrap();
            write_command(&mut peer, M_PWD, b"wrong").await.unwrap();
            saw_m_err(&mut peer).await
        };
        let (result, saw_err) = tokio::join!(session.run(), script);
        assert!(matches!(result.unwrap_err(), SessionError::Auth(_)));
        assert!(saw_err);
    }

    #[tokio::test]
    async fn unknown_peer_node_fails_auth() {
        let dir = tempdir().unwrap();
        let (mut session, mut peer) = answering_session(dir.path(), "@2 localhost -");
        let script = async {
            write_command(&mut peer, M_ADR, b"20000:20000/9@testnet")
                .await
                .unwrap();
            saw_m_err(&mut peer).await
        };
        let (result, saw_err) = tokio::join!(session.run(), script);
        assert!(matches!(result.unwrap_err(), SessionError::Auth(_)));
        assert!(saw_err);
    }

    #[tokio::test]
    async fn peer_address_outside_our_network_is_a_protocol_error() {
        let dir = tempdir().unwrap();
        let (mut session, mut peer) = answering_session(dir.path(), "@2 localhost -");
        let script = async {
            write_command(&mut peer, M_ADR, b"1:369/23@fidonet").await.unwrap();
            saw_m_err(&mut peer).await
        };
        let (result, saw_err) = tokio::join!(session.run(), script);
        assert!(matches!(result.unwrap_err(), SessionError::Protocol(_)));
        assert!(saw_err);
    }

    #[tokio::test]
    async fn silent_peer_fails_waiting_for_addresses() {
        let dir = tempdir().unwrap();
        let (ours, theirs) = tokio::io::duplex(64 * 1024);
        let cfg = test_config(1, dir.path(), "@2 localhost -");
        let files = FileManager::new(cfg.inbound_dir(), cfg.outbound_dir()).unwrap();
        let opts = SessionOptions {
            handshake_wait: Duration::from_millis(100),
            ..test_options()
        };
        let mut session = BinkpSession::answering(StreamConnection::new(ours), cfg, files, opts);
        // Keep the peer end alive but silent.
        let _peer = StreamConnection::new(theirs);
        let result = session.run().await;
        assert!(matches!(result.unwrap_err(), SessionError::Protocol(_)));
    }
}
