//! Archive helpers for the market-data pipeline.
//!
//! Writers produce zip files on disk or in memory. Readers consume zip, tar,
//! tar.gz and tar.bz2 archives into folders, memory buffers or lazy line
//! streams. Every operation owns the handles it opens, so they are released on
//! every return path, and every failure is logged at the operation boundary
//! before it is returned.

pub mod lines;
pub mod tar;
pub mod zip;

use std::path::{Path, PathBuf};

use tracing::error;

use crate::error::{ArchiveError, ArchiveResult};

pub use self::lines::{
    FirstEntryReader, ZipLines, open_first_entry, open_first_entry_from_stream, read_lines,
};
pub use self::tar::{extract_tar, extract_tar_bz2, extract_tar_gz, read_tar_entries};
pub use self::zip::{
    entry_names, extract_zip_to_folder, list_entries, read_entry, read_zip_entries,
    unzip_to_folder, write_single_entry, write_zip, write_zip_files, zip_bytes, zip_directory,
    zip_single_file,
};

/// Container formats understood by the readers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    Zip,
    Tar,
    TarGz,
    TarBz2,
}

impl ArchiveFormat {
    /// Detect archive format from file extension
    pub fn from_path(path: impl AsRef<Path>) -> Option<Self> {
        let path_lower = path.as_ref().to_string_lossy().to_lowercase();
        if path_lower.ends_with(".tar.gz") || path_lower.ends_with(".tgz") {
            return Some(ArchiveFormat::TarGz);
        }
        if path_lower.ends_with(".tar.bz2") || path_lower.ends_with(".tbz2") {
            return Some(ArchiveFormat::TarBz2);
        }
        if path_lower.ends_with(".tar") {
            return Some(ArchiveFormat::Tar);
        }
        if path_lower.ends_with(".zip") {
            return Some(ArchiveFormat::Zip);
        }
        None
    }
}

/// Metadata about one entry of an archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub path: String,
    pub size: u64,
    pub is_dir: bool,
}

/// Extract any supported archive into `destination`, preserving its structure.
pub fn extract(
    source: impl AsRef<Path>,
    destination: impl AsRef<Path>,
) -> ArchiveResult<Vec<PathBuf>> {
    let source = source.as_ref();
    let destination = destination.as_ref();
    match ArchiveFormat::from_path(source) {
        Some(ArchiveFormat::Zip) => unzip_to_folder(source, destination),
        Some(ArchiveFormat::Tar) => extract_tar(source, destination),
        Some(ArchiveFormat::TarGz) => extract_tar_gz(source, destination),
        Some(ArchiveFormat::TarBz2) => extract_tar_bz2(source, destination),
        None => logged(
            "extract",
            source,
            Err(ArchiveError::UnsupportedFormat(source.to_path_buf())),
        ),
    }
}

/// Normalize an entry name to forward slashes, rejecting empty names.
pub(crate) fn normalize_entry_name(name: &str) -> ArchiveResult<String> {
    let normalized = name.replace('\\', "/");
    if normalized.trim_matches('/').is_empty() {
        return Err(ArchiveError::InvalidEntryName(name.to_string()));
    }
    Ok(normalized)
}

/// Log a failed operation at its boundary and pass the result through.
pub(crate) fn logged<T>(
    operation: &str,
    path: &Path,
    result: ArchiveResult<T>,
) -> ArchiveResult<T> {
    if let Err(err) = &result {
        error!(operation, path = %path.display(), error = %err, "archive operation failed");
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_path() {
        assert_eq!(
            ArchiveFormat::from_path("a/b/20230501_trade.zip"),
            Some(ArchiveFormat::Zip)
        );
        assert_eq!(
            ArchiveFormat::from_path("bundle.TAR.GZ"),
            Some(ArchiveFormat::TarGz)
        );
        assert_eq!(
            ArchiveFormat::from_path("bundle.tgz"),
            Some(ArchiveFormat::TarGz)
        );
        assert_eq!(
            ArchiveFormat::from_path("bundle.tar.bz2"),
            Some(ArchiveFormat::TarBz2)
        );
        assert_eq!(
            ArchiveFormat::from_path("bundle.tar"),
            Some(ArchiveFormat::Tar)
        );
        assert_eq!(ArchiveFormat::from_path("prices.csv"), None);
    }

    #[test]
    fn test_normalize_entry_name() {
        assert_eq!(normalize_entry_name("sub\\a.csv").unwrap(), "sub/a.csv");
        assert_eq!(normalize_entry_name("b.csv").unwrap(), "b.csv");
        assert!(normalize_entry_name("").is_err());
        assert!(normalize_entry_name("/").is_err());
    }

    #[test]
    fn test_extract_rejects_unknown_extension() {
        let dir = tempfile::tempdir().unwrap();
        let result = extract(dir.path().join("prices.csv"), dir.path());
        assert!(matches!(result, Err(ArchiveError::UnsupportedFormat(_))));
    }
}
