//! Error types shared by the archive and job layers.
//!
//! Every public archive operation returns [`ArchiveResult`] and logs its own
//! failure before handing it back, so callers decide what a failure means
//! without ever seeing a panic.

use std::error::Error as StdError;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use zip::result::ZipError;

pub type ArchiveResult<T> = Result<T, ArchiveError>;

type BoxError = Box<dyn StdError + Send + Sync>;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("file not found: {}", .0.display())]
    MissingFile(PathBuf),

    #[error("malformed archive {path}: {source}")]
    MalformedArchive {
        path: String,
        #[source]
        source: BoxError,
    },

    #[error("I/O failure on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("entry not found: {0}")]
    EntryNotFound(String),

    #[error("invalid entry name: {0:?}")]
    InvalidEntryName(String),

    #[error("unsupported archive format: {}", .0.display())]
    UnsupportedFormat(PathBuf),

    #[error("unsupported compression method: {0}")]
    UnsupportedCompression(String),
}

pub type JobResult<T> = Result<T, JobError>;

#[derive(Debug, Error)]
pub enum JobError {
    #[error("no configuration directory available on this platform")]
    NoConfigDir,

    #[error("failed to read job config {}: {source}", path.display())]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse job config {}: {source}", path.display())]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("algorithm not found: {}", .0.display())]
    AlgorithmNotFound(PathBuf),

    #[error("failed to read algorithm {}: {source}", path.display())]
    AlgorithmRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("live mode requires a brokerage name")]
    MissingBrokerage,

    #[error("unknown brokerage: {0}")]
    UnknownBrokerage(String),
}

impl ArchiveError {
    /// Convert a zip error, keeping plain I/O failures distinct from a bad archive.
    pub(crate) fn from_zip(path: impl AsRef<Path>, err: ZipError) -> Self {
        let path = path.as_ref();
        match err {
            ZipError::Io(source) => ArchiveError::Io {
                path: path.to_path_buf(),
                source,
            },
            other => ArchiveError::malformed(path, other),
        }
    }

    pub(crate) fn malformed(path: impl AsRef<Path>, source: impl Into<BoxError>) -> Self {
        ArchiveError::MalformedArchive {
            path: path.as_ref().display().to_string(),
            source: source.into(),
        }
    }
}

/// Attach a path to an `io::Error`, for use with `map_err`.
pub(crate) fn io_at(path: impl AsRef<Path>) -> impl FnOnce(io::Error) -> ArchiveError {
    let path = path.as_ref().to_path_buf();
    move |source| ArchiveError::Io { path, source }
}

/// Whether an `io::Error` from a decoder means the input itself is corrupt or
/// truncated. The tar, gzip and bzip2 readers report bad input this way.
pub(crate) fn is_corrupt_input(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::InvalidInput | io::ErrorKind::InvalidData | io::ErrorKind::UnexpectedEof
    )
}

/// Like [`io_at`], for errors raised while reading a tar stream. Corrupt input
/// becomes [`ArchiveError::MalformedArchive`], and so do the tar crate's own
/// structural errors, which carry `ErrorKind::Other`.
pub(crate) fn tar_io_at(path: impl AsRef<Path>) -> impl FnOnce(io::Error) -> ArchiveError {
    let path = path.as_ref().to_path_buf();
    move |source| {
        if is_corrupt_input(&source) || source.kind() == io::ErrorKind::Other {
            ArchiveError::malformed(path, source)
        } else {
            ArchiveError::Io { path, source }
        }
    }
}
