//! binkr CLI
//!
//! Drives one BinkP session per invocation: either answer a single inbound
//! call (`--receive`) or originate a call to a configured peer
//! (`--send --node=N`). Exit codes: 0 on a clean session, 1 for
//! configuration or usage problems, 2 when the peer is not in the
//! directory, 3 for protocol or session failures.

use binkr_core::{BinkConfig, BinkpSession, SessionError, SessionOptions};
use binkr_spool::FileManager;
use binkr_transport::{accept, connect, Connection, DEFAULT_BINKP_PORT};
use clap::error::ErrorKind;
use clap::{ArgGroup, Parser};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

const EXIT_CONFIG: u8 = 1;
const EXIT_LOOKUP: u8 = 2;
const EXIT_PROTOCOL: u8 = 3;

/// BinkP mail exchange over TCP
#[derive(Parser)]
#[command(name = "binkr")]
#[command(version, about, long_about = None)]
#[command(group(ArgGroup::new("mode").required(true).args(["receive", "send"])))]
struct Cli {
    /// Main configuration file
    #[arg(long, value_name = "PATH")]
    config: PathBuf,

    /// Peer directory; defaults to addresses.binkp beside the config
    #[arg(long, value_name = "PATH")]
    addresses: Option<PathBuf>,

    /// Accept one inbound session
    #[arg(long)]
    receive: bool,

    /// Originate a session to the peer named by --node
    #[arg(long, requires = "node")]
    send: bool,

    /// Peer node number to dial
    #[arg(long, value_name = "NODE")]
    node: Option<u16>,

    /// Listening port for --receive
    #[arg(long, default_value_t = DEFAULT_BINKP_PORT)]
    port: u16,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
                _ => ExitCode::from(EXIT_CONFIG),
            };
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(if cli.verbose { "debug" } else { "info" })
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err((code, error)) => {
            eprintln!("binkr: {error:#}");
            ExitCode::from(code)
        }
    }
}

async fn run(cli: Cli) -> Result<(), (u8, anyhow::Error)> {
    let addresses = cli.addresses.clone().unwrap_or_else(|| {
        cli.config
            .parent()
            .unwrap_or(Path::new("."))
            .join("addresses.binkp")
    });

    let config =
        BinkConfig::load(&cli.config, &addresses).map_err(|e| (EXIT_CONFIG, e.into()))?;
    let files = FileManager::new(config.inbound_dir(), config.outbound_dir())
        .map_err(|e| (EXIT_CONFIG, e.into()))?;
    let opts = SessionOptions::default();

    if cli.receive {
        tracing::info!(port = cli.port, "waiting for an inbound call");
        let conn = accept(cli.port)
            .await
            .map_err(|e| (EXIT_PROTOCOL, e.into()))?;
        let mut session = BinkpSession::answering(conn, config, files, opts);
        let result = session.run().await;
        finish(result, &session)
    } else {
        let Some(node) = cli.node else {
            return Err((EXIT_CONFIG, anyhow::anyhow!("--send requires --node")));
        };
        let Some(peer) = config.node_config_for(node).cloned() else {
            return Err((
                EXIT_LOOKUP,
                anyhow::anyhow!("no peer directory entry for node {node}"),
            ));
        };
        tracing::info!(node, host = %peer.host, port = peer.port, "originating call");
        let conn = connect(&peer.host, peer.port)
            .await
            .map_err(|e| (EXIT_PROTOCOL, e.into()))?;
        let mut session = BinkpSession::originating(conn, config, files, node, opts);
        let result = session.run().await;
        finish(result, &session)
    }
}

fn finish<C: Connection>(
    result: Result<(), SessionError>,
    session: &BinkpSession<C>,
) -> Result<(), (u8, anyhow::Error)> {
    match result {
        Ok(()) => {
            for path in session.received_files() {
                tracing::info!(path = %path.display(), "received");
            }
            Ok(())
        }
        Err(e) => {
            let code = match &e {
                SessionError::Config(_) => EXIT_CONFIG,
                _ => EXIT_PROTOCOL,
            };
            Err((code, e.into()))
        }
    }
}
