//! Test fixtures: spool trees, session options tuned for tests, and a
//! scripted peer that speaks raw frames over an in-memory pipe.

use binkr_core::commands::{M_ADR, M_EOB, M_FILE, M_GOT, M_NUL, M_OK, M_PWD};
use binkr_core::frame::{read_frame, write_command, write_data};
use binkr_core::{BinkConfig, Frame, SessionOptions};
use binkr_spool::FileManager;
use binkr_transport::StreamConnection;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::DuplexStream;

/// Connection type every integration test runs over.
pub type TestConn = StreamConnection<DuplexStream>;

/// Generous deadline for scripted reads; tests fail long before this.
pub const WAIT: Duration = Duration::from_secs(5);

/// Session options with short polls so tests finish quickly.
pub fn fast_options() -> SessionOptions {
    SessionOptions {
        recv_poll: Duration::from_millis(25),
        handshake_wait: Duration::from_secs(2),
        session_deadline: Duration::from_secs(30),
        ..SessionOptions::default()
    }
}

/// An in-memory wire between two endpoints.
pub fn wire() -> (TestConn, TestConn) {
    let (a, b) = tokio::io::duplex(1 << 20);
    (StreamConnection::new(a), StreamConnection::new(b))
}

/// One node's config and spool tree under a temp directory.
pub struct NodeFixture {
    pub config: BinkConfig,
    pub inbound: PathBuf,
    pub outbound: PathBuf,
}

/// Build a node config (network `testnet`) with its spool directories.
pub fn node_fixture(dir: &Path, node: u16, addresses: &str) -> NodeFixture {
    let text = format!(
        "NODE = {node}\n\
         SYSTEM_NAME = Node {node}\n\
         NETWORK_NAME = testnet\n\
         INBOUND_DIR = node{node}/inbound\n\
         OUTBOUND_DIR = node{node}/outbound\n"
    );
    let mut config = BinkConfig::parse(&text, dir).expect("fixture config parses");
    config.load_addresses(addresses).expect("fixture addresses parse");
    let inbound = config.inbound_dir().to_path_buf();
    let outbound = config.outbound_dir().to_path_buf();
    std::fs::create_dir_all(&inbound).unwrap();
    std::fs::create_dir_all(&outbound).unwrap();
    NodeFixture {
        config,
        inbound,
        outbound,
    }
}

impl NodeFixture {
    /// A file manager over this node's spool tree.
    pub fn file_manager(&self) -> FileManager {
        FileManager::new(&self.inbound, &self.outbound).unwrap()
    }
}

/// Drop a file into a spool directory with a fixed mtime.
pub fn spool_file(dir: &Path, name: &str, contents: &[u8], mtime: u64) {
    let path = dir.join(name);
    std::fs::write(&path, contents).unwrap();
    let stamp = std::time::UNIX_EPOCH + Duration::from_secs(mtime);
    std::fs::OpenOptions::new()
        .write(true)
        .open(&path)
        .unwrap()
        .set_modified(stamp)
        .unwrap();
}

/// Sorted file names in a directory.
pub fn dir_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

/// A file's mtime in Unix seconds.
pub fn mtime_of(path: &Path) -> u64 {
    std::fs::metadata(path)
        .unwrap()
        .modified()
        .unwrap()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_secs()
}

/// A hand-driven peer speaking raw frames, standing in for the other mailer.
pub struct ScriptedPeer {
    pub conn: TestConn,
}

impl ScriptedPeer {
    pub fn new(conn: TestConn) -> Self {
        Self { conn }
    }

    pub async fn send(&mut self, id: u8, args: &str) {
        write_command(&mut self.conn, id, args.as_bytes())
            .await
            .expect("scripted command send");
    }

    pub async fn send_data(&mut self, bytes: &[u8]) {
        write_data(&mut self.conn, bytes).await.expect("scripted data send");
    }

    pub async fn read(&mut self) -> Frame {
        read_frame(&mut self.conn, WAIT).await.expect("scripted read")
    }

    /// Read frames until a command with `id` arrives; returns its args.
    /// Data frames and other commands along the way are discarded.
    pub async fn read_until(&mut self, id: u8) -> String {
        loop {
            if let Frame::Command { id: got, args } = self.read().await {
                if got == id {
                    return String::from_utf8_lossy(&args).into_owned();
                }
            }
        }
    }

    /// Play the answering side of the handshake: advertise `address`, wait
    /// for the session's password, accept it.
    pub async fn answer_handshake(&mut self, address: &str) {
        self.send(M_NUL, "SYS scripted peer").await;
        self.send(M_ADR, address).await;
        self.read_until(M_PWD).await;
        self.send(M_OK, "").await;
    }

    /// Play the originating side of the handshake: advertise `address`,
    /// present `password`, wait for M_OK.
    pub async fn originate_handshake(&mut self, address: &str, password: &str) {
        self.send(M_NUL, "SYS scripted peer").await;
        self.send(M_ADR, address).await;
        self.read_until(M_ADR).await;
        self.send(M_PWD, password).await;
        self.read_until(M_OK).await;
    }

    /// Acknowledge a file and declare our end-of-batch.
    pub async fn got_and_eob(&mut self, receipt: &str) {
        self.send(M_GOT, receipt).await;
        self.send(M_EOB, "").await;
    }

    /// Wait for the session to announce a file; returns the announcement
    /// args.
    pub async fn expect_announcement(&mut self) -> String {
        self.read_until(M_FILE).await
    }
}
