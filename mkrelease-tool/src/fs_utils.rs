use std::path::Path;

use tokio::fs::File;

use crate::error::ReleaseError;

/// Creates the release directory and any missing parents.
/// An existing directory is left alone.
pub async fn ensure_release_dir(dir: &Path) -> Result<(), ReleaseError> {
    if dir.is_dir() {
        return Ok(());
    }
    tracing::info!(dir = %dir.display(), "creating release directory");
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|source| ReleaseError::ReleaseDir {
            path: dir.to_path_buf(),
            source,
        })
}

/// Opens the archive for writing, truncating any previous release with the
/// same name.
pub async fn create_archive_file(path: &Path) -> Result<File, ReleaseError> {
    if path.exists() {
        tracing::warn!(path = %path.display(), "overwriting existing release archive");
    }
    File::create(path).await.map_err(|source| ReleaseError::Write {
        path: path.to_path_buf(),
        source,
    })
}

/// Human-readable size in binary units, e.g. `512 B`, `1.5 KiB`, `3 MiB`.
pub fn encode_size(bytes: u64) -> String {
    const UNITS: [&str; 6] = ["B", "KiB", "MiB", "GiB", "TiB", "PiB"];

    let exp = bytes
        .checked_ilog2()
        .map_or(0, |bits| (bits / 10) as usize)
        .min(UNITS.len() - 1);
    let value = bytes as f64 / (1u64 << (10 * exp)) as f64;

    if value.fract() == 0.0 {
        format!("{value:.0} {}", UNITS[exp])
    } else {
        format!("{value:.1} {}", UNITS[exp])
    }
}
