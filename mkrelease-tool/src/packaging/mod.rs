use std::path::PathBuf;

use mkrelease_lib::{ArchiveEntry, ReleaseDescriptor};
use tokio::runtime::Builder;

use crate::error::ReleaseError;
use crate::fs_utils::{encode_size, ensure_release_dir};

pub mod zip;

pub use zip::Compressor;

/// Builds `<release-dir>/<project>-<version>.zip`, managing its own async runtime.
///
/// This is the main entrypoint for the synchronous CLI. The runtime is
/// current-thread, so entries are read and written strictly one after another.
pub fn create_release_sync(
    descriptor: &ReleaseDescriptor,
    version: &str,
    compressor: Compressor,
) -> Result<PathBuf, ReleaseError> {
    let rt = Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(ReleaseError::Runtime)?;

    rt.block_on(create_release(descriptor, version, compressor))
}

pub async fn create_release(
    descriptor: &ReleaseDescriptor,
    version: &str,
    compressor: Compressor,
) -> Result<PathBuf, ReleaseError> {
    ensure_release_dir(&descriptor.release_dir).await?;

    let path = descriptor.archive_path(version);
    tracing::info!(path = %path.display(), ?compressor, "writing release archive");

    let size = zip::write_release_archive(&path, descriptor.entries(), compressor).await?;
    tracing::info!(path = %path.display(), size = %encode_size(size), "release archive closed");

    Ok(path)
}

/// One line of a dry-run report.
#[derive(Debug, Clone)]
pub struct PlannedEntry {
    pub entry: ArchiveEntry,
    /// `None` when the source is missing or unreadable.
    pub size: Option<u64>,
}

/// What a release would contain, computed without writing anything.
#[derive(Debug, Clone)]
pub struct ReleasePlan {
    pub output: PathBuf,
    pub overwrites: bool,
    pub entries: Vec<PlannedEntry>,
}

impl ReleasePlan {
    pub fn is_complete(&self) -> bool {
        self.entries.iter().all(|e| e.size.is_some())
    }

    pub fn total_size(&self) -> u64 {
        self.entries.iter().filter_map(|e| e.size).sum()
    }
}

pub fn plan_release(descriptor: &ReleaseDescriptor, version: &str) -> ReleasePlan {
    let output = descriptor.archive_path(version);
    let entries = descriptor
        .entries()
        .iter()
        .map(|entry| PlannedEntry {
            entry: entry.clone(),
            size: std::fs::metadata(&entry.source)
                .ok()
                .filter(|m| m.is_file())
                .map(|m| m.len()),
        })
        .collect();

    ReleasePlan {
        overwrites: output.exists(),
        output,
        entries,
    }
}
