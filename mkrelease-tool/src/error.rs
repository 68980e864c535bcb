use std::path::PathBuf;

use mkrelease_lib::ReleaseRole;
use thiserror::Error;

/// Failures while producing a release archive. None of them are retried;
/// a partially written archive is left where it is.
#[derive(Debug, Error)]
pub enum ReleaseError {
    #[error("cannot create release directory {path:?}")]
    ReleaseDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot read {role} at {path:?}")]
    MissingSource {
        role: ReleaseRole,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot write archive {path:?}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("archive error in {path:?}")]
    Archive {
        path: PathBuf,
        #[source]
        source: async_zip::error::ZipError,
    },

    #[error("failed to start async runtime")]
    Runtime(#[source] std::io::Error),
}
