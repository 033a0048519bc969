//! Spool directories: outbound enumeration and inbound assembly.
//!
//! Inbound files are written to a temporary `.bpart` name and renamed into
//! place only once the full announced size has arrived, so a crashed
//! session never leaves a partial file under its final name.

use crate::transfer_file::{FileTransferFile, TransferFile};
use crate::SpoolError;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, UNIX_EPOCH};

/// Suffix marking an inbound file that is still being assembled.
const PARTIAL_SUFFIX: &str = ".bpart";

/// Manages the outbound and inbound spool directories for one network.
pub struct FileManager {
    inbound_dir: PathBuf,
    outbound_dir: PathBuf,
    received: Vec<PathBuf>,
}

impl FileManager {
    /// Create a manager over the two spool directories, creating them if
    /// they do not exist yet.
    pub fn new(
        inbound_dir: impl Into<PathBuf>,
        outbound_dir: impl Into<PathBuf>,
    ) -> Result<Self, SpoolError> {
        let inbound_dir = inbound_dir.into();
        let outbound_dir = outbound_dir.into();
        std::fs::create_dir_all(&inbound_dir)?;
        std::fs::create_dir_all(&outbound_dir)?;
        Ok(Self {
            inbound_dir,
            outbound_dir,
            received: Vec::new(),
        })
    }

    /// Enumerate the outbound spool for `peer_node`, in stable lexicographic
    /// order. Called once per session; files added later are not picked up.
    pub fn list_outbound(
        &self,
        peer_node: u16,
    ) -> Result<Vec<Box<dyn TransferFile>>, SpoolError> {
        let mut names: Vec<(String, PathBuf)> = Vec::new();
        for entry in std::fs::read_dir(&self.outbound_dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.ends_with(PARTIAL_SUFFIX) {
                continue;
            }
            names.push((name, entry.path()));
        }
        names.sort();
        tracing::debug!(peer_node, count = names.len(), "outbound spool scanned");
        Ok(names
            .into_iter()
            .map(|(_, path)| Box::new(FileTransferFile::new(path)) as Box<dyn TransferFile>)
            .collect())
    }

    /// Open an inbound sink for an announced file. The temporary lives in
    /// the inbound spool under a partial marker until committed.
    pub fn open_inbound(
        &self,
        name: &str,
        expected_size: u64,
        mtime: u64,
    ) -> Result<InboundFile, SpoolError> {
        validate_inbound_name(name)?;
        let temp_path = self.inbound_dir.join(format!("{name}{PARTIAL_SUFFIX}"));
        Ok(InboundFile {
            name: name.to_string(),
            expected_size,
            mtime,
            temp_path,
            file: None,
            received: 0,
            crc: crc32fast::Hasher::new(),
        })
    }

    /// Rename a fully received inbound file to its final name, set its
    /// mtime to the announced one, and record it. The received byte count
    /// must equal the announced size.
    pub fn commit_inbound(&mut self, mut inbound: InboundFile) -> Result<PathBuf, SpoolError> {
        if inbound.received != inbound.expected_size {
            let err = SpoolError::Incomplete {
                name: inbound.name.clone(),
                received: inbound.received,
                expected: inbound.expected_size,
            };
            inbound.discard();
            return Err(err);
        }
        // Zero-length announcements never touched the disk; make the temp
        // exist so the rename below is uniform.
        if inbound.file.is_none() && inbound.received == 0 {
            inbound.create()?;
        }
        if let Some(mut file) = inbound.file.take() {
            file.flush()?;
        }

        let final_path = self.free_final_name(&inbound.name)?;
        std::fs::rename(&inbound.temp_path, &final_path)?;

        let stamp = UNIX_EPOCH + Duration::from_secs(inbound.mtime);
        OpenOptions::new()
            .write(true)
            .open(&final_path)?
            .set_modified(stamp)?;

        tracing::info!(path = %final_path.display(), size = inbound.received, "inbound file committed");
        self.received.push(final_path.clone());
        Ok(final_path)
    }

    /// Drop a partially received inbound file, deleting its temporary.
    pub fn discard_inbound(&self, mut inbound: InboundFile) {
        inbound.discard();
    }

    /// Remove an acknowledged outbound file from the spool. Only called
    /// once the peer has confirmed receipt with M_GOT.
    pub fn mark_outbound_sent(
        &self,
        file: &mut Box<dyn TransferFile>,
    ) -> Result<(), SpoolError> {
        tracing::info!(name = file.name(), "outbound file acknowledged");
        file.delete()
    }

    /// Final paths of every inbound file committed this session.
    pub fn received_files(&self) -> &[PathBuf] {
        &self.received
    }

    /// The inbound spool directory.
    pub fn inbound_dir(&self) -> &Path {
        &self.inbound_dir
    }

    /// The outbound spool directory.
    pub fn outbound_dir(&self) -> &Path {
        &self.outbound_dir
    }

    /// First unused final name: the announced name itself, then numeric
    /// suffixes `.001`, `.002`, ...
    fn free_final_name(&self, name: &str) -> Result<PathBuf, SpoolError> {
        let bare = self.inbound_dir.join(name);
        if !bare.exists() {
            return Ok(bare);
        }
        for n in 1..=999u32 {
            let candidate = self.inbound_dir.join(format!("{name}.{n:03}"));
            if !candidate.exists() {
                return Ok(candidate);
            }
        }
        Err(SpoolError::NameSpaceExhausted(self.inbound_dir.clone()))
    }
}

/// An inbound file being assembled in the spool.
///
/// Appends go to a temporary path; the [`FileManager`] owns the commit and
/// discard transitions.
pub struct InboundFile {
    name: String,
    expected_size: u64,
    mtime: u64,
    temp_path: PathBuf,
    file: Option<File>,
    received: u64,
    crc: crc32fast::Hasher,
}

impl InboundFile {
    /// Announced file name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Announced size in bytes.
    pub fn expected_size(&self) -> u64 {
        self.expected_size
    }

    /// Announced mtime, Unix seconds.
    pub fn mtime(&self) -> u64 {
        self.mtime
    }

    /// Bytes appended so far.
    pub fn received(&self) -> u64 {
        self.received
    }

    /// CRC-32 of the bytes appended so far.
    pub fn crc32(&self) -> u32 {
        self.crc.clone().finalize()
    }

    /// Append a chunk, creating the temporary on first write.
    pub fn append_chunk(&mut self, chunk: &[u8]) -> Result<(), SpoolError> {
        if self.file.is_none() {
            self.create()?;
        }
        if let Some(file) = self.file.as_mut() {
            file.write_all(chunk)?;
        }
        self.received += chunk.len() as u64;
        self.crc.update(chunk);
        Ok(())
    }

    fn create(&mut self) -> Result<(), SpoolError> {
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&self.temp_path)?;
        self.file = Some(file);
        Ok(())
    }

    fn discard(&mut self) {
        self.file.take();
        if self.temp_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.temp_path) {
                tracing::warn!(path = %self.temp_path.display(), error = %e, "failed to remove partial inbound file");
            }
        }
    }
}

/// Validate a peer-supplied file name before it touches the filesystem:
/// 1..255 ASCII bytes, printable, no whitespace, no path components.
fn validate_inbound_name(name: &str) -> Result<(), SpoolError> {
    let bad = name.is_empty()
        || name.len() > 255
        || name == "."
        || name == ".."
        || !name.bytes().all(|b| b.is_ascii_graphic())
        || name.contains(['/', '\\', ':']);
    if bad {
        return Err(SpoolError::BadFileName(name.to_string()));
    }
    Ok(())
}
