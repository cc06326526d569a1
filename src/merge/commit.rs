//! Merge Commit Marker
//!
//! Makes installing a compaction crash-safe. Once `merge.commit` is on
//! disk the merge is decided: promotion (renaming the output into the live
//! set) and retirement (deleting the replaced inputs) are re-run on the
//! next open if the process dies part way. Without the marker any
//! leftover compaction output is discarded.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{CornError, Result};
use crate::segment::{self, SegmentId, ARCHIVE_EXT, HINT_TMP_EXT};

pub const COMMIT_FILENAME: &str = "merge.commit";
const COMMIT_TMP_FILENAME: &str = "merge.commit.tmp";

/// Which segments a committed merge replaces, and with what
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeCommit {
    /// Id the compacted segment is promoted to
    pub output: SegmentId,
    /// Every segment folded into the output (includes `output`)
    pub inputs: Vec<SegmentId>,
}

impl MergeCommit {
    pub fn new(output: SegmentId, inputs: Vec<SegmentId>) -> Self {
        Self { output, inputs }
    }

    /// Durably write the marker (temp file + rename)
    pub fn write(&self, dir: &Path) -> Result<()> {
        let bytes =
            bincode::serialize(self).map_err(|e| CornError::Serialization(e.to_string()))?;

        let tmp = dir.join(COMMIT_TMP_FILENAME);
        {
            let mut file = File::create(&tmp)?;
            file.write_all(&bytes)?;
            file.sync_all()?;
        }
        fs::rename(&tmp, commit_path(dir))?;
        sync_dir(dir)
    }

    /// Load the marker if one exists
    pub fn read(dir: &Path) -> Result<Option<Self>> {
        let path = commit_path(dir);
        if !path.is_file() {
            return Ok(None);
        }
        let bytes = fs::read(&path)?;
        let commit =
            bincode::deserialize(&bytes).map_err(|e| CornError::Serialization(e.to_string()))?;
        Ok(Some(commit))
    }

    /// Rename the compaction output into the live set
    pub fn promote(&self, dir: &Path) -> Result<()> {
        let archive = segment::archive_path(dir, self.output);
        if archive.is_file() {
            fs::rename(&archive, segment::data_path(dir, self.output))?;
        }
        let hint_tmp = segment::hint_tmp_path(dir, self.output);
        if hint_tmp.is_file() {
            fs::rename(&hint_tmp, segment::hint_path(dir, self.output))?;
        }
        sync_dir(dir)
    }

    /// Delete the replaced inputs, then the marker itself
    pub fn retire(&self, dir: &Path) -> Result<()> {
        for &id in self.inputs.iter().filter(|&&id| id != self.output) {
            segment::remove_if_exists(&segment::data_path(dir, id))?;
            segment::remove_if_exists(&segment::hint_path(dir, id))?;
        }
        segment::remove_if_exists(&commit_path(dir))?;
        sync_dir(dir)
    }
}

/// Finish or roll back whatever compaction was in flight when the store
/// was last closed. Runs before recovery.
pub fn resume(dir: &Path) -> Result<()> {
    if let Some(commit) = MergeCommit::read(dir)? {
        info!(
            "Completing interrupted merge into segment {} ({} inputs)",
            commit.output,
            commit.inputs.len()
        );
        commit.promote(dir)?;
        return commit.retire(dir);
    }

    for path in stale_outputs(dir)? {
        debug!("Removing uncommitted merge output {:?}", path);
        segment::remove_if_exists(&path)?;
    }
    Ok(())
}

fn commit_path(dir: &Path) -> PathBuf {
    dir.join(COMMIT_FILENAME)
}

fn stale_outputs(dir: &Path) -> Result<Vec<PathBuf>> {
    let archive_suffix = format!(".{}", ARCHIVE_EXT);
    let hint_tmp_suffix = format!(".{}", HINT_TMP_EXT);

    let mut stale = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if name.ends_with(&archive_suffix)
            || name.ends_with(&hint_tmp_suffix)
            || name == COMMIT_TMP_FILENAME
        {
            stale.push(path);
        }
    }
    Ok(stale)
}

#[cfg(unix)]
fn sync_dir(dir: &Path) -> Result<()> {
    File::open(dir)?.sync_all()?;
    Ok(())
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> Result<()> {
    Ok(())
}
