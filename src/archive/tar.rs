use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::{ArchiveFormat, logged};
use crate::error::{ArchiveError, ArchiveResult, io_at, is_corrupt_input, tar_io_at};

/// Open `source` and wrap it in the decoder its format needs.
///
/// The returned reader owns the file; dropping it closes the whole chain.
fn open_decoded(source: &Path, format: ArchiveFormat) -> ArchiveResult<Box<dyn Read>> {
    if !source.exists() {
        return Err(ArchiveError::MissingFile(source.to_path_buf()));
    }
    let reader = BufReader::new(File::open(source).map_err(io_at(source))?);
    let reader: Box<dyn Read> = match format {
        ArchiveFormat::Tar => Box::new(reader),
        ArchiveFormat::TarGz => Box::new(flate2::read::GzDecoder::new(reader)),
        ArchiveFormat::TarBz2 => Box::new(bzip2::read::BzDecoder::new(reader)),
        ArchiveFormat::Zip => return Err(ArchiveError::UnsupportedFormat(source.to_path_buf())),
    };
    Ok(reader)
}

/// Unpack every entry of a tar stream below `destination`, keeping its structure.
///
/// Entries that would land outside `destination` are skipped. Returns the paths
/// of the regular files written, in archive order.
fn unpack(source: &Path, reader: Box<dyn Read>, destination: &Path) -> ArchiveResult<Vec<PathBuf>> {
    fs::create_dir_all(destination).map_err(io_at(destination))?;

    let mut archive = tar::Archive::new(reader);
    let mut unpacked = Vec::new();

    for entry in archive.entries().map_err(tar_io_at(source))? {
        let mut entry = entry.map_err(tar_io_at(source))?;
        let path = entry.path().map_err(tar_io_at(source))?.into_owned();
        let is_file = entry.header().entry_type().is_file();

        let inside = entry.unpack_in(destination).map_err(|e| {
            if is_corrupt_input(&e) {
                ArchiveError::malformed(source, e)
            } else {
                io_at(destination)(e)
            }
        })?;
        if !inside {
            warn!(entry = %path.display(), "skipping tar entry outside the destination");
            continue;
        }
        if is_file {
            unpacked.push(destination.join(&path));
        }
    }

    debug!(
        path = %source.display(),
        destination = %destination.display(),
        files = unpacked.len(),
        "extracted tar archive"
    );
    Ok(unpacked)
}

fn extract_with(
    operation: &str,
    source: &Path,
    destination: &Path,
    format: ArchiveFormat,
) -> ArchiveResult<Vec<PathBuf>> {
    let result = open_decoded(source, format)
        .and_then(|reader| unpack(source, reader, destination));
    logged(operation, source, result)
}

/// Extract a plain tar archive into `destination`.
pub fn extract_tar(
    source: impl AsRef<Path>,
    destination: impl AsRef<Path>,
) -> ArchiveResult<Vec<PathBuf>> {
    extract_with(
        "extract_tar",
        source.as_ref(),
        destination.as_ref(),
        ArchiveFormat::Tar,
    )
}

/// Extract a gzip-compressed tar archive into `destination`.
pub fn extract_tar_gz(
    source: impl AsRef<Path>,
    destination: impl AsRef<Path>,
) -> ArchiveResult<Vec<PathBuf>> {
    extract_with(
        "extract_tar_gz",
        source.as_ref(),
        destination.as_ref(),
        ArchiveFormat::TarGz,
    )
}

/// Extract a bzip2-compressed tar archive into `destination`.
pub fn extract_tar_bz2(
    source: impl AsRef<Path>,
    destination: impl AsRef<Path>,
) -> ArchiveResult<Vec<PathBuf>> {
    extract_with(
        "extract_tar_bz2",
        source.as_ref(),
        destination.as_ref(),
        ArchiveFormat::TarBz2,
    )
}

/// Read every regular file of a tar, tar.gz or tar.bz2 archive into memory.
///
/// The compression is picked from the file extension; anything unrecognised is
/// read as a plain tar.
pub fn read_tar_entries(source: impl AsRef<Path>) -> ArchiveResult<Vec<(String, Vec<u8>)>> {
    let source = source.as_ref();
    let format = match ArchiveFormat::from_path(source) {
        Some(ArchiveFormat::Zip) | None => ArchiveFormat::Tar,
        Some(format) => format,
    };
    let result = open_decoded(source, format)
        .and_then(|reader| read_all(source, reader));
    logged("read_tar_entries", source, result)
}

fn read_all(source: &Path, reader: Box<dyn Read>) -> ArchiveResult<Vec<(String, Vec<u8>)>> {
    let mut archive = tar::Archive::new(reader);
    let mut entries = Vec::new();

    for entry in archive.entries().map_err(tar_io_at(source))? {
        let mut entry = entry.map_err(tar_io_at(source))?;
        if !entry.header().entry_type().is_file() {
            continue;
        }
        let name = entry
            .path()
            .map_err(tar_io_at(source))?
            .to_string_lossy()
            .replace('\\', "/");
        let mut buffer = Vec::new();
        entry.read_to_end(&mut buffer).map_err(tar_io_at(source))?;
        entries.push((name, buffer));
    }

    Ok(entries)
}
