//! Scripted-peer scenarios: one live session against a hand-driven peer
//! that speaks raw frames, so every protocol corner is reachable.

use binkr_core::commands::{M_EOB, M_ERR, M_FILE, M_GET, M_GOT, M_SKIP};
use binkr_core::{BinkpSession, Frame, SessionError};
use binkr_integration_tests::support::*;
use tempfile::tempdir;

/// Scenario: the peer skips our file; it stays spooled for the next session.
#[tokio::test]
async fn skip_leaves_file_in_outbound_spool() {
    let dir = tempdir().unwrap();
    let orig = node_fixture(dir.path(), 2, "@1 localhost -");
    let payload = vec![0x42u8; 100_000];
    spool_file(&orig.outbound, "big.bin", &payload, 200);

    let (ours, theirs) = wire();
    let mut session = BinkpSession::originating(
        ours,
        orig.config.clone(),
        orig.file_manager(),
        1,
        fast_options(),
    );
    let mut peer = ScriptedPeer::new(theirs);

    let script = async {
        peer.answer_handshake("20000:20000/1@testnet").await;
        let announcement = peer.expect_announcement().await;
        assert!(announcement.starts_with("big.bin 100000 200 0"), "{announcement}");
        peer.send(M_SKIP, &announcement).await;
        peer.send(M_EOB, "").await;
        peer.read_until(M_EOB).await;
    };

    let (result, ()) = tokio::join!(session.run(), script);
    result.unwrap();

    // Still queued for the next session, and never committed anywhere.
    assert_eq!(dir_names(&orig.outbound), ["big.bin"]);
    assert_eq!(dir_names(&orig.inbound), Vec::<String>::new());
}

/// Scenario: the peer answers the announcement with M_GET to resume at an
/// offset; we restart streaming from there.
#[tokio::test]
async fn get_resumes_streaming_at_requested_offset() {
    let dir = tempdir().unwrap();
    let orig = node_fixture(dir.path(), 2, "@1 localhost -");
    spool_file(&orig.outbound, "c.dat", b"ABCD", 300);

    let (ours, theirs) = wire();
    let mut session = BinkpSession::originating(
        ours,
        orig.config.clone(),
        orig.file_manager(),
        1,
        fast_options(),
    );
    let mut peer = ScriptedPeer::new(theirs);

    let script = async {
        peer.answer_handshake("20000:20000/1@testnet").await;
        let announcement = peer.expect_announcement().await;
        assert!(announcement.starts_with("c.dat 4 300 0"), "{announcement}");
        peer.send(M_GET, "c.dat 4 300 2").await;
        // The tail streamed after the resume is exactly the last two bytes.
        loop {
            if let Frame::Data(bytes) = peer.read().await {
                if bytes == b"CD" {
                    break;
                }
                assert_eq!(bytes, b"ABCD", "only the full file precedes the resume");
            }
        }
        peer.got_and_eob("c.dat 4 300").await;
    };

    let (result, ()) = tokio::join!(session.run(), script);
    result.unwrap();

    // Acknowledged, so the spool entry is gone.
    assert_eq!(dir_names(&orig.outbound), Vec::<String>::new());
}

/// Scenario: the answerer rejects our password with M_ERR; the session
/// fails as a remote error and transfers nothing.
#[tokio::test]
async fn peer_rejecting_password_fails_the_session() {
    let dir = tempdir().unwrap();
    let orig = node_fixture(dir.path(), 2, "@1 localhost wrong");
    spool_file(&orig.outbound, "a.txt", b"HELLO", 100);

    let (ours, theirs) = wire();
    let mut session = BinkpSession::originating(
        ours,
        orig.config.clone(),
        orig.file_manager(),
        1,
        fast_options(),
    );
    let mut peer = ScriptedPeer::new(theirs);

    let script = async {
        peer.send(binkr_core::commands::M_ADR, "20000:20000/1@testnet").await;
        peer.read_until(binkr_core::commands::M_PWD).await;
        peer.send(M_ERR, "incorrect password").await;
    };

    let (result, ()) = tokio::join!(session.run(), script);
    assert!(matches!(result.unwrap_err(), SessionError::Remote(_)));
    // Nothing left the spool.
    assert_eq!(dir_names(&orig.outbound), ["a.txt"]);
}

/// Scenario: a malformed M_FILE announcement draws M_ERR and leaves no
/// trace in the inbound spool.
#[tokio::test]
async fn malformed_announcement_fails_without_creating_files() {
    let dir = tempdir().unwrap();
    let answ = node_fixture(dir.path(), 1, "@2 localhost -");

    let (ours, theirs) = wire();
    let mut session = BinkpSession::answering(
        ours,
        answ.config.clone(),
        answ.file_manager(),
        fast_options(),
    );
    let mut peer = ScriptedPeer::new(theirs);

    let script = async {
        peer.originate_handshake("20000:20000/2@testnet", "-").await;
        peer.send(M_FILE, "garbage").await;
        peer.read_until(M_ERR).await;
    };

    let (result, ()) = tokio::join!(session.run(), script);
    assert!(matches!(result.unwrap_err(), SessionError::Protocol(_)));
    assert_eq!(dir_names(&answ.inbound), Vec::<String>::new());
}

/// A data frame with no preceding announcement is a protocol error.
#[tokio::test]
async fn data_frame_without_announcement_is_rejected() {
    let dir = tempdir().unwrap();
    let answ = node_fixture(dir.path(), 1, "@2 localhost -");

    let (ours, theirs) = wire();
    let mut session = BinkpSession::answering(
        ours,
        answ.config.clone(),
        answ.file_manager(),
        fast_options(),
    );
    let mut peer = ScriptedPeer::new(theirs);

    let script = async {
        peer.originate_handshake("20000:20000/2@testnet", "-").await;
        peer.send_data(b"orphan bytes").await;
        peer.read_until(M_ERR).await;
    };

    let (result, ()) = tokio::join!(session.run(), script);
    assert!(matches!(result.unwrap_err(), SessionError::Protocol(_)));
}

/// More bytes than announced must fail before anything hits the disk.
#[tokio::test]
async fn overrun_beyond_announced_size_is_rejected_before_write() {
    let dir = tempdir().unwrap();
    let answ = node_fixture(dir.path(), 1, "@2 localhost -");

    let (ours, theirs) = wire();
    let mut session = BinkpSession::answering(
        ours,
        answ.config.clone(),
        answ.file_manager(),
        fast_options(),
    );
    let mut peer = ScriptedPeer::new(theirs);

    let script = async {
        peer.originate_handshake("20000:20000/2@testnet", "-").await;
        peer.send(M_FILE, "x.bin 3 100 0").await;
        peer.send_data(b"ABCDE").await;
        peer.read_until(M_ERR).await;
    };

    let (result, ()) = tokio::join!(session.run(), script);
    assert!(matches!(result.unwrap_err(), SessionError::Protocol(_)));
    // Neither a final file nor a partial temporary survives.
    assert_eq!(dir_names(&answ.inbound), Vec::<String>::new());
}

/// A zero-byte announcement commits immediately and is acknowledged.
#[tokio::test]
async fn zero_size_file_commits_and_is_acknowledged() {
    let dir = tempdir().unwrap();
    let answ = node_fixture(dir.path(), 1, "@2 localhost -");

    let (ours, theirs) = wire();
    let mut session = BinkpSession::answering(
        ours,
        answ.config.clone(),
        answ.file_manager(),
        fast_options(),
    );
    let mut peer = ScriptedPeer::new(theirs);

    let script = async {
        peer.originate_handshake("20000:20000/2@testnet", "-").await;
        peer.send(M_FILE, "empty.dat 0 50 0").await;
        peer.send(M_EOB, "").await;
        let receipt = peer.read_until(M_GOT).await;
        assert_eq!(receipt, "empty.dat 0 50");
    };

    let (result, ()) = tokio::join!(session.run(), script);
    result.unwrap();

    let path = answ.inbound.join("empty.dat");
    assert_eq!(std::fs::read(&path).unwrap(), b"");
    assert_eq!(mtime_of(&path), 50);
}

/// An announcement carrying a CRC is verified at commit.
#[tokio::test]
async fn announced_crc_is_verified_on_commit() {
    let dir = tempdir().unwrap();
    let answ = node_fixture(dir.path(), 1, "@2 localhost -");

    let (ours, theirs) = wire();
    let mut session = BinkpSession::answering(
        ours,
        answ.config.clone(),
        answ.file_manager(),
        fast_options(),
    );
    let mut peer = ScriptedPeer::new(theirs);

    let crc = crc32fast::hash(b"HELLO");
    let script = async {
        peer.originate_handshake("20000:20000/2@testnet", "-").await;
        peer.send(M_FILE, &format!("c.txt 5 100 0 {crc:08X}")).await;
        peer.send_data(b"HELLO").await;
        peer.send(M_EOB, "").await;
        let receipt = peer.read_until(M_GOT).await;
        assert_eq!(receipt, "c.txt 5 100");
    };

    let (result, ()) = tokio::join!(session.run(), script);
    result.unwrap();
    assert_eq!(std::fs::read(answ.inbound.join("c.txt")).unwrap(), b"HELLO");
}

/// A CRC mismatch discards the file and fails the session.
#[tokio::test]
async fn crc_mismatch_discards_the_file() {
    let dir = tempdir().unwrap();
    let answ = node_fixture(dir.path(), 1, "@2 localhost -");

    let (ours, theirs) = wire();
    let mut session = BinkpSession::answering(
        ours,
        answ.config.clone(),
        answ.file_manager(),
        fast_options(),
    );
    let mut peer = ScriptedPeer::new(theirs);

    let script = async {
        peer.originate_handshake("20000:20000/2@testnet", "-").await;
        peer.send(M_FILE, "c.txt 5 100 0 DEADBEEF").await;
        peer.send_data(b"HELLO").await;
        peer.read_until(M_ERR).await;
    };

    let (result, ()) = tokio::join!(session.run(), script);
    assert!(matches!(result.unwrap_err(), SessionError::Protocol(_)));
    assert_eq!(dir_names(&answ.inbound), Vec::<String>::new());
}

/// A hostile announced name never touches the filesystem.
#[tokio::test]
async fn path_traversal_names_are_rejected() {
    let dir = tempdir().unwrap();
    let answ = node_fixture(dir.path(), 1, "@2 localhost -");

    let (ours, theirs) = wire();
    let mut session = BinkpSession::answering(
        ours,
        answ.config.clone(),
        answ.file_manager(),
        fast_options(),
    );
    let mut peer = ScriptedPeer::new(theirs);

    let script = async {
        peer.originate_handshake("20000:20000/2@testnet", "-").await;
        peer.send(M_FILE, "..\\evil.exe 4 100 0").await;
        peer.read_until(M_ERR).await;
    };

    let (result, ()) = tokio::join!(session.run(), script);
    assert!(matches!(result.unwrap_err(), SessionError::Protocol(_)));
    assert_eq!(dir_names(&answ.inbound), Vec::<String>::new());
}
