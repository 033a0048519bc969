//! File announcement lines.
//!
//! M_FILE and M_GET carry `name size mtime offset`, optionally followed by
//! an 8-digit uppercase CRC-32; M_GOT carries `name size mtime`. Fields are
//! separated by single spaces and the name itself contains none.

use std::fmt;

/// Largest value the `size` field may carry (decimal, 63 bits).
const MAX_SIZE: u64 = i64::MAX as u64;

/// Announcement parse errors.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AnnounceError {
    /// A required field was absent.
    #[error("missing {0} field")]
    MissingField(&'static str),

    /// The file name is not usable (length or character set).
    #[error("bad file name {0:?}")]
    BadName(String),

    /// A numeric field did not parse or was out of range.
    #[error("bad {field} field {value:?}")]
    BadNumber {
        /// Which field.
        field: &'static str,
        /// Offending token.
        value: String,
    },

    /// The offset points past the announced size.
    #[error("offset {offset} beyond size {size}")]
    OffsetBeyondSize {
        /// Announced offset.
        offset: u64,
        /// Announced size.
        size: u64,
    },

    /// The optional CRC field must be exactly eight hex digits.
    #[error("bad crc field {0:?}")]
    BadCrc(String),

    /// Unexpected trailing tokens.
    #[error("trailing data {0:?}")]
    Trailing(String),
}

/// An M_FILE / M_GET announcement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Announcement {
    /// File name, 1..255 ASCII bytes, no whitespace.
    pub name: String,
    /// File size in bytes.
    pub size: u64,
    /// Modification time, Unix seconds.
    pub mtime: u64,
    /// Starting offset for the transfer.
    pub offset: u64,
    /// Optional CRC-32 of the whole file.
    pub crc32: Option<u32>,
}

impl Announcement {
    /// Build an announcement, treating a zero CRC as "none".
    pub fn new(name: impl Into<String>, size: u64, mtime: u64, offset: u64, crc32: u32) -> Self {
        Self {
            name: name.into(),
            size,
            mtime,
            offset,
            crc32: (crc32 != 0).then_some(crc32),
        }
    }

    /// Parse `name size mtime offset [crc]`.
    pub fn parse(line: &str) -> Result<Self, AnnounceError> {
        let mut tokens = line.split_whitespace();
        let name = parse_name(tokens.next())?;
        let size = parse_number(tokens.next(), "size")?;
        if size > MAX_SIZE {
            return Err(AnnounceError::BadNumber {
                field: "size",
                value: size.to_string(),
            });
        }
        let mtime = parse_number(tokens.next(), "mtime")?;
        let offset = parse_number(tokens.next(), "offset")?;
        if offset > size {
            return Err(AnnounceError::OffsetBeyondSize { offset, size });
        }
        let crc32 = match tokens.next() {
            None => None,
            Some(tok) => Some(parse_crc(tok)?),
        };
        if let Some(extra) = tokens.next() {
            return Err(AnnounceError::Trailing(extra.to_string()));
        }
        Ok(Self {
            name,
            size,
            mtime,
            offset,
            crc32,
        })
    }

    /// The matching receipt line (what M_GOT echoes back).
    pub fn receipt(&self) -> Receipt {
        Receipt {
            name: self.name.clone(),
            size: self.size,
            mtime: self.mtime,
        }
    }
}

impl fmt::Display for Announcement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {} {}", self.name, self.size, self.mtime, self.offset)?;
        if let Some(crc) = self.crc32 {
            write!(f, " {crc:08X}")?;
        }
        Ok(())
    }
}

/// An M_GOT receipt: `name size mtime`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    /// Acknowledged file name.
    pub name: String,
    /// Acknowledged size.
    pub size: u64,
    /// Acknowledged mtime.
    pub mtime: u64,
}

impl Receipt {
    /// Parse `name size mtime`. Extra tokens are tolerated; some mailers
    /// append an offset here too.
    pub fn parse(line: &str) -> Result<Self, AnnounceError> {
        let mut tokens = line.split_whitespace();
        let name = parse_name(tokens.next())?;
        let size = parse_number(tokens.next(), "size")?;
        let mtime = parse_number(tokens.next(), "mtime")?;
        Ok(Self { name, size, mtime })
    }
}

impl fmt::Display for Receipt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.name, self.size, self.mtime)
    }
}

fn parse_name(token: Option<&str>) -> Result<String, AnnounceError> {
    let name = token.ok_or(AnnounceError::MissingField("name"))?;
    if name.is_empty() || name.len() > 255 || !name.is_ascii() {
        return Err(AnnounceError::BadName(name.to_string()));
    }
    Ok(name.to_string())
}

fn parse_number(token: Option<&str>, field: &'static str) -> Result<u64, AnnounceError> {
    let token = token.ok_or(AnnounceError::MissingField(field))?;
    token.parse::<u64>().map_err(|_| AnnounceError::BadNumber {
        field,
        value: token.to_string(),
    })
}

fn parse_crc(token: &str) -> Result<u32, AnnounceError> {
    if token.len() != 8 || !token.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(AnnounceError::BadCrc(token.to_string()));
    }
    u32::from_str_radix(token, 16).map_err(|_| AnnounceError::BadCrc(token.to_string()))
}
