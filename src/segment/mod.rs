//! Segment Module
//!
//! Append-only log files and the directory layout that names them.
//!
//! ## Responsibilities
//! - Byte-addressable, append-only file handles (`Segment`)
//! - Sequential scans over Data and Hint Records
//! - Segment file naming and discovery
//!
//! ## Directory Layout
//! ```text
//! {data_dir}/
//!   ├── 0000000001.data        sealed segment
//!   ├── 0000000001.hint        hint file for a compacted segment
//!   ├── 0000000003.data        active segment
//!   ├── 0000000002.archive     compaction output, before promotion
//!   └── 0000000002.hint.tmp    compaction hint output, before promotion
//! ```

mod file;
mod iterator;

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{CornError, Result};

pub use file::Segment;
pub use iterator::{resync, HintIter, RecordIter};

/// Segment identifier; ids sort in write order
pub type SegmentId = u64;

pub const DATA_EXT: &str = "data";
pub const HINT_EXT: &str = "hint";
pub const ARCHIVE_EXT: &str = "archive";
pub const HINT_TMP_EXT: &str = "hint.tmp";

/// "{dir}/0000000042.data"
pub fn data_path(dir: &Path, id: SegmentId) -> PathBuf {
    file_path(dir, id, DATA_EXT)
}

/// "{dir}/0000000042.hint"
pub fn hint_path(dir: &Path, id: SegmentId) -> PathBuf {
    file_path(dir, id, HINT_EXT)
}

/// "{dir}/0000000042.archive"
pub fn archive_path(dir: &Path, id: SegmentId) -> PathBuf {
    file_path(dir, id, ARCHIVE_EXT)
}

/// "{dir}/0000000042.hint.tmp"
pub fn hint_tmp_path(dir: &Path, id: SegmentId) -> PathBuf {
    file_path(dir, id, HINT_TMP_EXT)
}

fn file_path(dir: &Path, id: SegmentId, ext: &str) -> PathBuf {
    dir.join(format!("{:010}.{}", id, ext))
}

/// Parse "0000000042.data" → Some(42); anything else → None
pub fn parse_data_id(path: &Path) -> Option<SegmentId> {
    if path.extension()? != DATA_EXT {
        return None;
    }
    path.file_stem()?.to_str()?.parse().ok()
}

/// List the ids of every data segment in `dir`, oldest first
pub fn discover(dir: &Path) -> Result<Vec<SegmentId>> {
    let open_err = |source| CornError::Open {
        path: dir.to_path_buf(),
        source,
    };

    let mut ids = Vec::new();
    for entry in fs::read_dir(dir).map_err(open_err)? {
        let path = entry.map_err(open_err)?.path();
        if !path.is_file() {
            continue;
        }
        if let Some(id) = parse_data_id(&path) {
            ids.push(id);
        }
    }

    ids.sort_unstable();
    Ok(ids)
}

/// Remove a file, treating "already gone" as success
pub(crate) fn remove_if_exists(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
