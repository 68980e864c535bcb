use std::fs::Metadata;
use std::path::Path;

use async_zip::tokio::write::ZipFileWriter;
use async_zip::{Compression, ZipDateTime, ZipEntryBuilder};
use chrono::{DateTime, Utc};
use futures::AsyncWriteExt as _;
use mkrelease_lib::ArchiveEntry;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::error::ReleaseError;
use crate::fs_utils::create_archive_file;

/// Oldest and newest instants an MS-DOS date field can hold
/// (1980-01-01T00:00:00Z and 2107-12-31T23:59:58Z).
const ZIP_EPOCH_MIN: i64 = 315_532_800;
const ZIP_EPOCH_MAX: i64 = 4_354_819_198;

/// Compression algorithm to use when creating the ZIP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Compressor {
    #[default]
    Deflate,
    Stored,
}

impl From<Compressor> for Compression {
    fn from(c: Compressor) -> Self {
        match c {
            Compressor::Deflate => Compression::Deflate,
            Compressor::Stored => Compression::Stored,
        }
    }
}

/// Writes `entries` into a new archive at `path`, in order.
///
/// Sources are streamed in 8 KiB chunks. The first unreadable source aborts
/// the write; whatever has been written up to that point stays on disk.
pub async fn write_release_archive(
    path: &Path,
    entries: &[ArchiveEntry],
    compressor: Compressor,
) -> Result<u64, ReleaseError> {
    let write_err = |source| ReleaseError::Write {
        path: path.to_path_buf(),
        source,
    };

    let mut file = create_archive_file(path).await?;
    let mut writer = ZipFileWriter::with_tokio(&mut file);
    let mut buf = vec![0u8; 8192];

    for entry in entries {
        let source_err = |source| ReleaseError::MissingSource {
            role: entry.role,
            path: entry.source.clone(),
            source,
        };

        let mut src = File::open(&entry.source).await.map_err(source_err)?;
        let meta = src.metadata().await.map_err(source_err)?;

        let builder = entry_builder(entry, &meta, compressor);
        let mut entry_writer = writer
            .write_entry_stream(builder)
            .await
            .map_err(|source| archive_error(path, source))?;

        let mut copied = 0u64;
        loop {
            let n = src.read(&mut buf).await.map_err(source_err)?;
            if n == 0 {
                break;
            }
            entry_writer.write_all(&buf[..n]).await.map_err(write_err)?;
            copied += n as u64;
        }

        entry_writer
            .close()
            .await
            .map_err(|source| archive_error(path, source))?;

        tracing::debug!(
            entry = %entry.name_in_archive,
            source = %entry.source.display(),
            bytes = copied,
            "added entry"
        );
    }

    writer
        .close()
        .await
        .map_err(|source| archive_error(path, source))?;

    file.flush().await.map_err(write_err)?;
    file.sync_all().await.map_err(write_err)?;

    let size = file.metadata().await.map_err(write_err)?.len();
    Ok(size)
}

/// Entry header carrying the source's mtime and, on Unix, its permission
/// bits so the launch script stays executable once extracted.
fn entry_builder(entry: &ArchiveEntry, meta: &Metadata, compressor: Compressor) -> ZipEntryBuilder {
    let builder = ZipEntryBuilder::new(entry.name_in_archive.clone().into(), compressor.into());

    let builder = match meta.modified().ok().and_then(zip_date) {
        Some(date) => builder.last_modification_date(date),
        None => builder,
    };

    #[cfg(unix)]
    let builder = {
        use std::os::unix::fs::PermissionsExt;
        builder.unix_permissions((meta.permissions().mode() & 0o7777) as u16)
    };

    builder
}

/// Clamps into the range a zip header can represent; out-of-range years
/// would otherwise wrap around.
fn zip_date(mtime: std::time::SystemTime) -> Option<ZipDateTime> {
    let mtime: DateTime<Utc> = mtime.into();
    let secs = mtime.timestamp().clamp(ZIP_EPOCH_MIN, ZIP_EPOCH_MAX);
    let clamped = DateTime::<Utc>::from_timestamp(secs, 0)?;
    Some(ZipDateTime::from_chrono(&clamped))
}

fn archive_error(path: &Path, source: async_zip::error::ZipError) -> ReleaseError {
    ReleaseError::Archive {
        path: path.to_path_buf(),
        source,
    }
}
