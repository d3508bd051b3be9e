//! Random-access byte sources.
//!
//! The engine never materialises a whole file unless a format forces
//! it to; decoders ask a [`ByteSource`] for bounded windows by offset
//! and length instead.

use crate::error::{DecodeError, Result};
use std::fmt;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;
use std::time::SystemTime;

/// A file-like byte source supporting random-access reads.
pub trait ByteSource {
    /// Total length in bytes.
    fn len(&self) -> u64;

    /// True when the source holds no bytes.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fill `buf` exactly from `offset`. Reading past the end is an
    /// I/O error, never a silent short read.
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<()>;

    /// Read `length` bytes starting at `offset` into a fresh buffer.
    fn read_range(&mut self, offset: u64, length: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; length];
        self.read_at(offset, &mut buf)?;
        Ok(buf)
    }
}

/// Byte source backed by a file on disk.
pub struct FileSource {
    file: File,
    len: u64,
}

impl FileSource {
    /// Open a file for decoding.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let len = file.metadata()?.len();
        Ok(Self { file, len })
    }
}

impl ByteSource for FileSource {
    fn len(&self) -> u64 {
        self.len
    }

    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<()> {
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.read_exact(buf)?;
        Ok(())
    }
}

/// Byte source over an in-memory buffer. Used by tests and by callers
/// that already hold the file bytes.
pub struct MemorySource {
    bytes: Vec<u8>,
}

impl MemorySource {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }
}

impl ByteSource for MemorySource {
    fn len(&self) -> u64 {
        self.bytes.len() as u64
    }

    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<()> {
        let start = usize::try_from(offset)
            .map_err(|_| DecodeError::Io(io::ErrorKind::UnexpectedEof.into()))?;
        let end = start
            .checked_add(buf.len())
            .filter(|end| *end <= self.bytes.len())
            .ok_or_else(|| DecodeError::Io(io::ErrorKind::UnexpectedEof.into()))?;
        buf.copy_from_slice(&self.bytes[start..end]);
        Ok(())
    }
}

/// Cheap identity of a submitted file, checked before any decoding to
/// short-circuit re-submissions of the file the loader already holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileFingerprint {
    pub name: String,
    pub size: u64,
    pub modified: Option<SystemTime>,
}

impl FileFingerprint {
    /// Fingerprint a file on disk from its metadata.
    pub fn from_path(path: &Path) -> Result<Self> {
        let metadata = std::fs::metadata(path)?;
        Ok(Self {
            name: path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default(),
            size: metadata.len(),
            modified: metadata.modified().ok(),
        })
    }
}

/// `Read + Seek` adapter over a byte source, for collaborators that
/// consume standard I/O traits. The batch LAS reader requires its
/// input to be `Send + Sync`, so the boxed source carries both.
pub struct SourceReader {
    source: Box<dyn ByteSource + Send + Sync>,
    pos: u64,
}

impl SourceReader {
    pub fn new(source: Box<dyn ByteSource + Send + Sync>) -> Self {
        Self { source, pos: 0 }
    }
}

impl fmt::Debug for SourceReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceReader")
            .field("len", &self.source.len())
            .field("pos", &self.pos)
            .finish()
    }
}

impl Read for SourceReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let remaining = self.source.len().saturating_sub(self.pos);
        let take = buf.len().min(usize::try_from(remaining).unwrap_or(usize::MAX));
        if take == 0 {
            return Ok(0);
        }
        self.source
            .read_at(self.pos, &mut buf[..take])
            .map_err(io::Error::other)?;
        self.pos += take as u64;
        Ok(take)
    }
}

impl Seek for SourceReader {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let next = match pos {
            SeekFrom::Start(offset) => Some(offset),
            SeekFrom::End(delta) => self.source.len().checked_add_signed(delta),
            SeekFrom::Current(delta) => self.pos.checked_add_signed(delta),
        };
        match next {
            Some(next) => {
                self.pos = next;
                Ok(next)
            }
            None => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "seek before start of source",
            )),
        }
    }
}
