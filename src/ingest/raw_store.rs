use crate::error::{PipelineError, Result};
use crate::utils::filename::is_raw_snapshot_name;
use std::path::{Path, PathBuf};

/// The bronze layer: dated raw snapshots in one directory
pub struct RawStore;

impl RawStore {
    /// Raw snapshots sorted by name, oldest first
    pub fn list(raw_dir: &Path) -> Result<Vec<PathBuf>> {
        if !raw_dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut names: Vec<String> = std::fs::read_dir(raw_dir)?
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_file())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter(|name| is_raw_snapshot_name(name))
            .collect();
        names.sort();

        Ok(names.into_iter().map(|n| raw_dir.join(n)).collect())
    }

    /// The lexicographically greatest snapshot, which is the newest date
    pub fn latest(raw_dir: &Path) -> Result<PathBuf> {
        Self::list(raw_dir)?
            .pop()
            .ok_or_else(|| PipelineError::NoRawFiles(raw_dir.display().to_string()))
    }
}
