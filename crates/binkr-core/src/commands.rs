//! BinkP command ids.

/// Informational key/value line (`SYS`, `ZYZ`, `VER`, `LOC`, `OPT`).
pub const M_NUL: u8 = 0;
/// Space-separated list of the sender's addresses.
pub const M_ADR: u8 = 1;
/// Session password from the originator, `-` for none.
pub const M_PWD: u8 = 2;
/// File announcement: `name size mtime offset`.
pub const M_FILE: u8 = 3;
/// Authentication accepted (answerer to originator).
pub const M_OK: u8 = 4;
/// End-of-batch for the sender's direction.
pub const M_EOB: u8 = 5;
/// File received in full: `name size mtime`.
pub const M_GOT: u8 = 6;
/// Fatal protocol error; the session terminates.
pub const M_ERR: u8 = 7;
/// Busy; the session terminates without a retry penalty.
pub const M_BSY: u8 = 8;
/// Resume request: `name size mtime offset`.
pub const M_GET: u8 = 9;
/// Skip this file for now; it stays queued for a later session.
pub const M_SKIP: u8 = 10;

/// Command mnemonic for logging. Unknown ids are tolerated on the wire, so
/// this never fails.
pub fn command_name(command_id: u8) -> &'static str {
    match command_id {
        M_NUL => "M_NUL",
        M_ADR => "M_ADR",
        M_PWD => "M_PWD",
        M_FILE => "M_FILE",
        M_OK => "M_OK",
        M_EOB => "M_EOB",
        M_GOT => "M_GOT",
        M_ERR => "M_ERR",
        M_BSY => "M_BSY",
        M_GET => "M_GET",
        M_SKIP => "M_SKIP",
        _ => "M_UNKNOWN",
    }
}
