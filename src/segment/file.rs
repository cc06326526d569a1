//! Segment File
//!
//! An append-only file with positional reads.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use crate::error::{CornError, Result};

use super::SegmentId;

/// Append-only, byte-addressable segment file
///
/// ## Concurrency:
/// - Reads use positional I/O and only take the handle's read lock,
///   so any number of readers can share one `Arc<Segment>`
/// - Appends take the handle's write lock; callers are expected to
///   serialize writers themselves
pub struct Segment {
    id: SegmentId,
    path: PathBuf,
    /// `None` once closed
    file: RwLock<Option<File>>,
    /// Current end of file == next append offset
    len: AtomicU64,
}

impl Segment {
    /// Open a segment for appending, creating it if absent
    pub fn open(path: impl AsRef<Path>, id: SegmentId) -> Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(path)?;
        let len = file.metadata()?.len();

        Ok(Self {
            id,
            path: path.to_path_buf(),
            file: RwLock::new(Some(file)),
            len: AtomicU64::new(len),
        })
    }

    /// Open (or create) the data segment `id` inside `dir`
    pub fn create(dir: &Path, id: SegmentId) -> Result<Self> {
        Self::open(super::data_path(dir, id), id)
    }

    /// Read up to `len` bytes starting at `offset`
    ///
    /// The result is shorter than `len` only when the segment ends first.
    pub fn read_at(&self, offset: u64, len: usize) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.read_into(offset, len, &mut buf)?;
        Ok(buf)
    }

    /// Like `read_at`, reusing the caller's buffer
    pub fn read_into(&self, offset: u64, len: usize, buf: &mut Vec<u8>) -> Result<()> {
        let guard = self.file.read();
        let file = guard.as_ref().ok_or(CornError::SegmentClosed(self.id))?;

        let end = self.len();
        if offset >= end {
            return Err(CornError::EndOfSegment {
                segment: self.id,
                offset,
            });
        }

        let available = (end - offset).min(len as u64) as usize;
        buf.clear();
        buf.resize(available, 0);
        read_exact_at(file, buf, offset)?;
        Ok(())
    }

    /// Append `bytes` at the end of the segment
    ///
    /// Returns (bytes written, new end offset). A failed write is rolled
    /// back so the file never keeps a torn record.
    pub fn append(&self, bytes: &[u8]) -> Result<(usize, u64)> {
        let mut guard = self.file.write();
        let file = guard.as_mut().ok_or(CornError::SegmentClosed(self.id))?;

        let start = self.len();
        if let Err(e) = file.write_all(bytes) {
            if let Err(rollback) = file.set_len(start) {
                tracing::warn!(
                    "Segment {}: failed to roll back torn append at {}: {}",
                    self.id,
                    start,
                    rollback
                );
            }
            return Err(e.into());
        }

        let new_len = start + bytes.len() as u64;
        self.len.store(new_len, Ordering::Release);
        Ok((bytes.len(), new_len))
    }

    /// Flush to stable storage; a closed segment has nothing to flush
    pub fn sync(&self) -> Result<()> {
        match self.file.read().as_ref() {
            Some(file) => Ok(file.sync_data()?),
            None => Ok(()),
        }
    }

    /// Sync and release the file handle; later calls are no-ops
    pub fn close(&self) -> Result<()> {
        let mut guard = self.file.write();
        if let Some(file) = guard.take() {
            file.sync_all()?;
        }
        Ok(())
    }

    /// Cut the file back to `len` bytes (drops a torn tail found by recovery)
    pub(crate) fn truncate(&self, len: u64) -> Result<()> {
        let guard = self.file.write();
        let file = guard.as_ref().ok_or(CornError::SegmentClosed(self.id))?;
        file.set_len(len)?;
        file.sync_all()?;
        self.len.store(len, Ordering::Release);
        Ok(())
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn id(&self) -> SegmentId {
        self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current length in bytes
    pub fn len(&self) -> u64 {
        self.len.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_closed(&self) -> bool {
        self.file.read().is_none()
    }
}

impl std::fmt::Debug for Segment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Segment")
            .field("id", &self.id)
            .field("path", &self.path)
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(unix)]
fn read_exact_at(file: &File, buf: &mut [u8], offset: u64) -> io::Result<()> {
    use std::os::unix::fs::FileExt;
    file.read_exact_at(buf, offset)
}

#[cfg(windows)]
fn read_exact_at(file: &File, mut buf: &mut [u8], mut offset: u64) -> io::Result<()> {
    use std::os::windows::fs::FileExt;
    while !buf.is_empty() {
        match file.seek_read(buf, offset) {
            Ok(0) => {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "short read inside segment",
                ))
            }
            Ok(n) => {
                buf = &mut buf[n..];
                offset += n as u64;
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}
