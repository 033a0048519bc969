//! Sendable payloads: in-memory buffers and spool-backed files.

use crate::SpoolError;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

/// A payload that can be streamed out in chunks or assembled from chunks.
///
/// Exactly one container owns a transfer file at any time: the outbound
/// queue, the pending-acknowledgement map, or an in-flight receive slot.
pub trait TransferFile: Send {
    /// Logical file name as it appears in announcements.
    fn name(&self) -> &str;

    /// Payload size in bytes.
    fn size(&mut self) -> Result<u64, SpoolError>;

    /// Modification time, Unix seconds.
    fn mtime(&mut self) -> Result<u64, SpoolError>;

    /// CRC-32 of the payload, or 0 when not computed.
    fn crc32(&self) -> u32;

    /// Copy out the chunk `[start, start + len)`. Out-of-range requests are
    /// errors, not clamps.
    fn read_chunk(&mut self, start: u64, len: usize) -> Result<Vec<u8>, SpoolError>;

    /// Append a chunk to the payload, creating backing storage on first use.
    fn append_chunk(&mut self, chunk: &[u8]) -> Result<(), SpoolError>;

    /// Flush and release any backing handle.
    fn close(&mut self) -> Result<(), SpoolError>;

    /// Remove the backing storage (an acknowledged outbound file leaves the
    /// spool through this).
    fn delete(&mut self) -> Result<(), SpoolError>;
}

/// A transfer file held entirely in memory.
pub struct InMemoryTransferFile {
    name: String,
    contents: Vec<u8>,
    mtime: u64,
    crc: u32,
}

impl InMemoryTransferFile {
    /// Create from a name, payload, and mtime; the CRC-32 is computed here.
    pub fn new(name: impl Into<String>, contents: impl Into<Vec<u8>>, mtime: u64) -> Self {
        let contents = contents.into();
        let crc = crc32fast::hash(&contents);
        Self {
            name: name.into(),
            contents,
            mtime,
            crc,
        }
    }

    /// Current payload.
    pub fn contents(&self) -> &[u8] {
        &self.contents
    }
}

impl TransferFile for InMemoryTransferFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn size(&mut self) -> Result<u64, SpoolError> {
        Ok(self.contents.len() as u64)
    }

    fn mtime(&mut self) -> Result<u64, SpoolError> {
        Ok(self.mtime)
    }

    fn crc32(&self) -> u32 {
        self.crc
    }

    fn read_chunk(&mut self, start: u64, len: usize) -> Result<Vec<u8>, SpoolError> {
        let size = self.contents.len() as u64;
        let end = start.checked_add(len as u64).filter(|end| *end <= size);
        match end {
            Some(end) => Ok(self.contents[start as usize..end as usize].to_vec()),
            None => Err(SpoolError::ChunkOutOfRange { start, len, size }),
        }
    }

    fn append_chunk(&mut self, chunk: &[u8]) -> Result<(), SpoolError> {
        self.contents.extend_from_slice(chunk);
        self.crc = crc32fast::hash(&self.contents);
        Ok(())
    }

    fn close(&mut self) -> Result<(), SpoolError> {
        Ok(())
    }

    fn delete(&mut self) -> Result<(), SpoolError> {
        self.contents.clear();
        self.crc = 0;
        Ok(())
    }
}

/// A transfer file backed by a spool entry on disk.
///
/// Size and mtime are read from the filesystem when first queried and
/// cached. Reading opens the file lazily; the first append creates it.
pub struct FileTransferFile {
    name: String,
    path: PathBuf,
    file: Option<File>,
    writing: bool,
    meta: Option<(u64, u64)>,
}

impl FileTransferFile {
    /// Wrap a spool path; the logical name is the path's final component.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            name,
            path,
            file: None,
            writing: false,
            meta: None,
        }
    }

    /// The backing path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn stat(&mut self) -> Result<(u64, u64), SpoolError> {
        if let Some(meta) = self.meta {
            return Ok(meta);
        }
        let md = std::fs::metadata(&self.path)?;
        let mtime = md
            .modified()?
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        let meta = (md.len(), mtime);
        self.meta = Some(meta);
        Ok(meta)
    }
}

impl TransferFile for FileTransferFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn size(&mut self) -> Result<u64, SpoolError> {
        Ok(self.stat()?.0)
    }

    fn mtime(&mut self) -> Result<u64, SpoolError> {
        Ok(self.stat()?.1)
    }

    fn crc32(&self) -> u32 {
        0
    }

    fn read_chunk(&mut self, start: u64, len: usize) -> Result<Vec<u8>, SpoolError> {
        let size = self.size()?;
        if start.checked_add(len as u64).is_none_or(|end| end > size) {
            return Err(SpoolError::ChunkOutOfRange { start, len, size });
        }
        let file = match self.file.as_mut() {
            Some(file) => file,
            None => self.file.insert(File::open(&self.path)?),
        };
        file.seek(SeekFrom::Start(start))?;
        let mut chunk = vec![0u8; len];
        file.read_exact(&mut chunk)?;
        Ok(chunk)
    }

    fn append_chunk(&mut self, chunk: &[u8]) -> Result<(), SpoolError> {
        if !self.writing {
            let created = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&self.path)?;
            self.file = Some(created);
            self.writing = true;
            self.meta = None;
        }
        if let Some(file) = self.file.as_mut() {
            file.write_all(chunk)?;
        }
        Ok(())
    }

    fn close(&mut self) -> Result<(), SpoolError> {
        if let Some(mut file) = self.file.take() {
            file.flush()?;
        }
        self.writing = false;
        Ok(())
    }

    fn delete(&mut self) -> Result<(), SpoolError> {
        self.close()?;
        std::fs::remove_file(&self.path)?;
        tracing::debug!(path = %self.path.display(), "removed spool file");
        Ok(())
    }
}
