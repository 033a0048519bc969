//! Local configuration and the peer directory.
//!
//! The main config is a flat `KEY = VALUE` file:
//!
//! ```text
//! [NETWORK]
//! NODE = 2
//! SYSTEM_NAME = My Test System
//! NETWORK_NAME = wwivnet
//! INBOUND_DIR = spool/inbound
//! OUTBOUND_DIR = spool/outbound
//! ```
//!
//! Section headers are tolerated and ignored; keys are case-insensitive;
//! `#` and `;` start comments. Relative spool directories resolve against
//! the config file's directory.
//!
//! The peer directory (`addresses.binkp`) has one line per peer:
//!
//! ```text
//! # node  host[:port]      password (- for none)
//! @1      example.com:24554 sekret
//! @2      other.example     -
//! ```

use binkr_transport::DEFAULT_BINKP_PORT;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Zone and net used in the local M_ADR advertisement (the WWIVnet
/// convention: zone and net are both 20000).
const LOCAL_ZONE_NET: u16 = 20000;

/// Fallback sysop name when the config does not name one.
const DEFAULT_SYSOP_NAME: &str = "Unknown Sysop";

/// Fallback version advertisement.
const DEFAULT_VERSION: &str = concat!("binkr/", env!("CARGO_PKG_VERSION"), " binkp/1.0");

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A config file could not be read.
    #[error("cannot read {path}: {source}")]
    Io {
        /// The file involved.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// A required key was absent.
    #[error("missing required key {0:?}")]
    MissingKey(&'static str),

    /// A key's value did not parse.
    #[error("bad value {value:?} for key {key:?}")]
    BadValue {
        /// Key name.
        key: String,
        /// Offending value.
        value: String,
    },

    /// A peer line in the address file did not parse.
    #[error("bad peer line {line_no}: {line:?}")]
    BadPeerLine {
        /// 1-based line number.
        line_no: usize,
        /// The offending line.
        line: String,
    },
}

/// One peer in the directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerEntry {
    /// Peer node number.
    pub node: u16,
    /// Host to dial for outbound sessions.
    pub host: String,
    /// TCP port, defaulting to the well-known BinkP port.
    pub port: u16,
    /// Shared session password; `-` means none.
    pub password: String,
}

/// Immutable local configuration plus the peer directory.
#[derive(Debug, Clone)]
pub struct BinkConfig {
    node: u16,
    system_name: String,
    sysop_name: String,
    network_name: String,
    location: Option<String>,
    version_string: String,
    inbound_dir: PathBuf,
    outbound_dir: PathBuf,
    peers: BTreeMap<u16, PeerEntry>,
}

impl BinkConfig {
    /// Load the main config and the peer directory from disk.
    pub fn load(config_path: &Path, addresses_path: &Path) -> Result<Self, ConfigError> {
        let read = |path: &Path| {
            std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })
        };
        let base_dir = config_path.parent().unwrap_or(Path::new(".")).to_path_buf();
        let mut config = Self::parse(&read(config_path)?, &base_dir)?;
        config.load_addresses(&read(addresses_path)?)?;
        Ok(config)
    }

    /// Parse the main config from text. Relative spool directories resolve
    /// against `base_dir`.
    pub fn parse(text: &str, base_dir: &Path) -> Result<Self, ConfigError> {
        let mut node = None;
        let mut system_name = None;
        let mut sysop_name = None;
        let mut network_name = None;
        let mut location = None;
        let mut version_string = None;
        let mut inbound_dir: Option<PathBuf> = None;
        let mut outbound_dir: Option<PathBuf> = None;

        for line in text.lines() {
            let line = strip_comment(line);
            if line.is_empty() || (line.starts_with('[') && line.ends_with(']')) {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let key = key.trim().to_ascii_lowercase();
            let value = value.trim();
            match key.as_str() {
                "node" => {
                    let parsed = value.parse::<u16>().map_err(|_| ConfigError::BadValue {
                        key: "node".to_string(),
                        value: value.to_string(),
                    })?;
                    node = Some(parsed);
                }
                "system_name" => system_name = Some(value.to_string()),
                "sysop_name" => sysop_name = Some(value.to_string()),
                "network_name" => network_name = Some(value.to_string()),
                "location" => location = Some(value.to_string()),
                "version" | "version_string" => version_string = Some(value.to_string()),
                "inbound_dir" => inbound_dir = Some(resolve(base_dir, value)),
                "outbound_dir" => outbound_dir = Some(resolve(base_dir, value)),
                _ => tracing::warn!(key = %key, "ignoring unknown config key"),
            }
        }

        Ok(Self {
            node: node.ok_or(ConfigError::MissingKey("node"))?,
            system_name: system_name.ok_or(ConfigError::MissingKey("system_name"))?,
            sysop_name: sysop_name.unwrap_or_else(|| DEFAULT_SYSOP_NAME.to_string()),
            network_name: network_name.ok_or(ConfigError::MissingKey("network_name"))?,
            location,
            version_string: version_string.unwrap_or_else(|| DEFAULT_VERSION.to_string()),
            inbound_dir: inbound_dir.ok_or(ConfigError::MissingKey("inbound_dir"))?,
            outbound_dir: outbound_dir.ok_or(ConfigError::MissingKey("outbound_dir"))?,
            peers: BTreeMap::new(),
        })
    }

    /// Parse the peer directory (`addresses.binkp`) from text.
    pub fn load_addresses(&mut self, text: &str) -> Result<(), ConfigError> {
        for (idx, raw) in text.lines().enumerate() {
            let line = strip_comment(raw);
            if line.is_empty() {
                continue;
            }
            let bad = || ConfigError::BadPeerLine {
                line_no: idx + 1,
                line: raw.to_string(),
            };

            let mut tokens = line.split_whitespace();
            let node_token = tokens.next().ok_or_else(bad)?;
            let node = node_token
                .strip_prefix('@')
                .and_then(|n| n.parse::<u16>().ok())
                .ok_or_else(bad)?;
            let host_token = tokens.next().ok_or_else(bad)?;
            let (host, port) = match host_token.rsplit_once(':') {
                Some((host, port)) => {
                    let port = port.parse::<u16>().map_err(|_| bad())?;
                    (host.to_string(), port)
                }
                None => (host_token.to_string(), DEFAULT_BINKP_PORT),
            };
            if host.is_empty() {
                return Err(bad());
            }
            let password = tokens.next().unwrap_or("-").to_string();
            if tokens.next().is_some() {
                return Err(bad());
            }

            let entry = PeerEntry {
                node,
                host,
                port,
                password,
            };
            if self.peers.insert(node, entry).is_some() {
                tracing::warn!(node, "duplicate peer entry; later line wins");
            }
        }
        Ok(())
    }

    /// Our node number.
    pub fn node(&self) -> u16 {
        self.node
    }

    /// Advertised system name (the M_NUL `SYS` line).
    pub fn system_name(&self) -> &str {
        &self.system_name
    }

    /// Advertised sysop name (the M_NUL `ZYZ` line).
    pub fn sysop_name(&self) -> &str {
        &self.sysop_name
    }

    /// The network this node exchanges mail within.
    pub fn network_name(&self) -> &str {
        &self.network_name
    }

    /// Advertised location (the M_NUL `LOC` line), when configured.
    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    /// Advertised software version (the M_NUL `VER` line).
    pub fn version_string(&self) -> &str {
        &self.version_string
    }

    /// Where committed inbound files land.
    pub fn inbound_dir(&self) -> &Path {
        &self.inbound_dir
    }

    /// Where outbound files are queued.
    pub fn outbound_dir(&self) -> &Path {
        &self.outbound_dir
    }

    /// Look up a peer. Absence means no outbound call is permitted to that
    /// node; inbound sessions from it cannot authenticate either.
    pub fn node_config_for(&self, node: u16) -> Option<&PeerEntry> {
        self.peers.get(&node)
    }

    /// The password expected from `node`, `-` when none is configured.
    pub fn expected_password_for(&self, node: u16) -> &str {
        self.node_config_for(node)
            .map(|entry| entry.password.as_str())
            .unwrap_or("-")
    }

    /// The local address advertisement sent in M_ADR.
    pub fn local_address_line(&self) -> String {
        format!(
            "{LOCAL_ZONE_NET}:{LOCAL_ZONE_NET}/{}@{}",
            self.node, self.network_name
        )
    }
}

fn strip_comment(line: &str) -> &str {
    let end = line.find(['#', ';']).unwrap_or(line.len());
    line[..end].trim()
}

fn resolve(base_dir: &Path, value: &str) -> PathBuf {
    let path = Path::new(value);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}
