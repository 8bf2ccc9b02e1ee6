use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, Cursor, Read, Write};
use std::path::{Path, PathBuf};

use bytes::Bytes;
use tracing::{debug, info, warn};
use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use super::{ArchiveEntry, logged, normalize_entry_name};
use crate::error::{ArchiveError, ArchiveResult, io_at};

/// Payloads are copied into the archive in chunks of this size to bound peak memory
const WRITE_CHUNK_SIZE: usize = 4096;

/// Label used in logs and errors for archives that only exist in memory
const IN_MEMORY: &str = "<memory>";

fn deflate_options() -> SimpleFileOptions {
    SimpleFileOptions::default().compression_method(CompressionMethod::Deflated)
}

/// Copy a payload into the current entry of a zip writer, one chunk at a time.
fn write_chunked<W: Write>(writer: &mut W, payload: &[u8]) -> io::Result<()> {
    for chunk in payload.chunks(WRITE_CHUNK_SIZE) {
        writer.write_all(chunk)?;
    }
    Ok(())
}

/// Open a zip archive on disk, distinguishing a missing file from a broken one.
pub(crate) fn open_archive(path: &Path) -> ArchiveResult<ZipArchive<File>> {
    if !path.exists() {
        return Err(ArchiveError::MissingFile(path.to_path_buf()));
    }
    let file = File::open(path).map_err(io_at(path))?;
    ZipArchive::new(file).map_err(|e| ArchiveError::from_zip(path, e))
}

// Writer

/// Create (or truncate) a zip at `destination` holding one entry per item, in
/// iteration order.
///
/// Writing is best-effort and non-transactional: if it fails part way, the
/// partially written file is left behind. Callers needing atomicity should
/// write to a temporary path and rename on success.
pub fn write_zip<I, N, B>(destination: impl AsRef<Path>, entries: I) -> ArchiveResult<()>
where
    I: IntoIterator<Item = (N, B)>,
    N: AsRef<str>,
    B: AsRef<[u8]>,
{
    let destination = destination.as_ref();
    logged(
        "write_zip",
        destination,
        write_zip_inner(destination, entries),
    )
}

fn write_zip_inner<I, N, B>(destination: &Path, entries: I) -> ArchiveResult<()>
where
    I: IntoIterator<Item = (N, B)>,
    N: AsRef<str>,
    B: AsRef<[u8]>,
{
    let file = File::create(destination).map_err(io_at(destination))?;
    let mut writer = ZipWriter::new(file);
    let mut count = 0usize;

    for (name, payload) in entries {
        let name = normalize_entry_name(name.as_ref())?;
        writer
            .start_file(name, deflate_options())
            .map_err(|e| ArchiveError::from_zip(destination, e))?;
        write_chunked(&mut writer, payload.as_ref()).map_err(io_at(destination))?;
        count += 1;
    }

    writer
        .finish()
        .map_err(|e| ArchiveError::from_zip(destination, e))?;
    info!(path = %destination.display(), entries = count, "wrote zip archive");
    Ok(())
}

/// Zip the given files, each under its base file name. Paths that do not exist
/// are skipped. Returns the number of entries written.
pub fn write_zip_files<P: AsRef<Path>>(
    destination: impl AsRef<Path>,
    sources: &[P],
) -> ArchiveResult<usize> {
    let destination = destination.as_ref();
    logged(
        "write_zip_files",
        destination,
        write_zip_files_inner(destination, sources),
    )
}

fn write_zip_files_inner<P: AsRef<Path>>(
    destination: &Path,
    sources: &[P],
) -> ArchiveResult<usize> {
    let file = File::create(destination).map_err(io_at(destination))?;
    let mut writer = ZipWriter::new(file);
    let mut written = 0usize;

    for source in sources {
        let source = source.as_ref();
        if !source.is_file() {
            debug!(path = %source.display(), "skipping missing source file");
            continue;
        }
        let Some(name) = source.file_name().map(|n| n.to_string_lossy().into_owned()) else {
            debug!(path = %source.display(), "skipping source without a file name");
            continue;
        };

        let mut input = File::open(source).map_err(io_at(source))?;
        writer
            .start_file(name, deflate_options())
            .map_err(|e| ArchiveError::from_zip(destination, e))?;
        io::copy(&mut input, &mut writer).map_err(io_at(source))?;
        written += 1;
    }

    writer
        .finish()
        .map_err(|e| ArchiveError::from_zip(destination, e))?;
    info!(path = %destination.display(), entries = written, "wrote zip archive");
    Ok(written)
}

/// Zip a single file next to itself, swapping its extension for `.zip`.
///
/// A source that already ends in `.zip` gets `.zip` appended instead, so the
/// input is never truncated by its own output.
pub fn zip_single_file(source: impl AsRef<Path>, delete_original: bool) -> ArchiveResult<PathBuf> {
    let source = source.as_ref();
    logged(
        "zip_single_file",
        source,
        zip_single_file_inner(source, delete_original),
    )
}

fn zip_single_file_inner(source: &Path, delete_original: bool) -> ArchiveResult<PathBuf> {
    if !source.is_file() {
        return Err(ArchiveError::MissingFile(source.to_path_buf()));
    }

    let already_zip = source
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("zip"));
    let destination = if already_zip {
        let mut name = source.as_os_str().to_owned();
        name.push(".zip");
        PathBuf::from(name)
    } else {
        source.with_extension("zip")
    };

    write_zip_files_inner(&destination, &[source])?;

    if delete_original {
        fs::remove_file(source).map_err(io_at(source))?;
        debug!(path = %source.display(), "removed original after zipping");
    }
    Ok(destination)
}

/// Write a one-entry zip from in-memory text.
pub fn write_single_entry(
    data: &str,
    destination: impl AsRef<Path>,
    entry_name: &str,
) -> ArchiveResult<()> {
    let destination = destination.as_ref();
    logged(
        "write_single_entry",
        destination,
        write_zip_inner(destination, [(entry_name, data.as_bytes())]),
    )
}

/// Zip every file below `source_dir`. Entry names are relative to the
/// directory, or to its parent when `include_root` is set. Files are added in
/// sorted path order.
pub fn zip_directory(
    source_dir: impl AsRef<Path>,
    destination: impl AsRef<Path>,
    include_root: bool,
) -> ArchiveResult<usize> {
    let source_dir = source_dir.as_ref();
    let destination = destination.as_ref();
    logged(
        "zip_directory",
        source_dir,
        zip_directory_inner(source_dir, destination, include_root),
    )
}

fn zip_directory_inner(
    source_dir: &Path,
    destination: &Path,
    include_root: bool,
) -> ArchiveResult<usize> {
    if !source_dir.is_dir() {
        return Err(ArchiveError::MissingFile(source_dir.to_path_buf()));
    }

    let mut files = Vec::new();
    collect_files(source_dir, &mut files)?;
    files.sort();

    let root_name = source_dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned());

    let file = File::create(destination).map_err(io_at(destination))?;
    let mut writer = ZipWriter::new(file);
    let mut written = 0usize;

    for path in &files {
        if path == destination {
            continue;
        }
        let Ok(relative) = path.strip_prefix(source_dir) else {
            continue;
        };
        let relative = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        let name = match (&root_name, include_root) {
            (Some(root), true) => format!("{root}/{relative}"),
            _ => relative,
        };

        let mut input = File::open(path).map_err(io_at(path))?;
        writer
            .start_file(name, deflate_options())
            .map_err(|e| ArchiveError::from_zip(destination, e))?;
        io::copy(&mut input, &mut writer).map_err(io_at(path))?;
        written += 1;
    }

    writer
        .finish()
        .map_err(|e| ArchiveError::from_zip(destination, e))?;
    info!(path = %destination.display(), entries = written, "zipped directory");
    Ok(written)
}

fn collect_files(dir: &Path, files: &mut Vec<PathBuf>) -> ArchiveResult<()> {
    for entry in fs::read_dir(dir).map_err(io_at(dir))? {
        let path = entry.map_err(io_at(dir))?.path();
        if path.is_dir() {
            collect_files(&path, files)?;
        } else {
            files.push(path);
        }
    }
    Ok(())
}

/// Build a one-entry zip entirely in memory.
pub fn zip_bytes(data: &[u8], entry_name: &str) -> ArchiveResult<Vec<u8>> {
    logged(
        "zip_bytes",
        Path::new(IN_MEMORY),
        zip_bytes_inner(data, entry_name),
    )
}

fn zip_bytes_inner(data: &[u8], entry_name: &str) -> ArchiveResult<Vec<u8>> {
    let name = normalize_entry_name(entry_name)?;
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    writer
        .start_file(name, deflate_options())
        .map_err(|e| ArchiveError::from_zip(IN_MEMORY, e))?;
    write_chunked(&mut writer, data).map_err(io_at(IN_MEMORY))?;
    let cursor = writer
        .finish()
        .map_err(|e| ArchiveError::from_zip(IN_MEMORY, e))?;
    Ok(cursor.into_inner())
}

// Reader

/// Decode every file entry of an in-memory zip to text, keyed by entry name.
///
/// Invalid UTF-8 is replaced rather than rejected. On failure the error is
/// logged; `unwrap_or_default()` gives callers an empty map to iterate.
pub fn read_zip_entries(zip_bytes: &[u8]) -> ArchiveResult<HashMap<String, String>> {
    logged(
        "read_zip_entries",
        Path::new(IN_MEMORY),
        read_zip_entries_inner(zip_bytes),
    )
}

fn read_zip_entries_inner(zip_bytes: &[u8]) -> ArchiveResult<HashMap<String, String>> {
    let mut archive =
        ZipArchive::new(Cursor::new(zip_bytes)).map_err(|e| ArchiveError::from_zip(IN_MEMORY, e))?;
    let mut entries = HashMap::with_capacity(archive.len());

    for index in 0..archive.len() {
        let mut entry = archive
            .by_index(index)
            .map_err(|e| ArchiveError::from_zip(IN_MEMORY, e))?;
        if entry.is_dir() {
            continue;
        }
        let name = entry.name().to_string();
        let mut buffer = Vec::new();
        entry
            .read_to_end(&mut buffer)
            .map_err(io_at(format!("{IN_MEMORY}/{name}")))?;
        entries.insert(name, String::from_utf8_lossy(&buffer).into_owned());
    }

    Ok(entries)
}

/// List the entries of a zip on disk in central-directory order.
pub fn list_entries(zip_path: impl AsRef<Path>) -> ArchiveResult<Vec<ArchiveEntry>> {
    let zip_path = zip_path.as_ref();
    logged("list_entries", zip_path, list_entries_inner(zip_path))
}

fn list_entries_inner(zip_path: &Path) -> ArchiveResult<Vec<ArchiveEntry>> {
    let mut archive = open_archive(zip_path)?;
    let mut entries = Vec::with_capacity(archive.len());
    for index in 0..archive.len() {
        let entry = archive
            .by_index_raw(index)
            .map_err(|e| ArchiveError::from_zip(zip_path, e))?;
        entries.push(ArchiveEntry {
            path: entry.name().to_string(),
            size: entry.size(),
            is_dir: entry.is_dir(),
        });
    }
    Ok(entries)
}

/// Names of all entries in a zip on disk, in central-directory order.
pub fn entry_names(zip_path: impl AsRef<Path>) -> ArchiveResult<Vec<String>> {
    Ok(list_entries(zip_path)?
        .into_iter()
        .map(|entry| entry.path)
        .collect())
}

/// Read one named entry into memory.
pub fn read_entry(zip_path: impl AsRef<Path>, entry_name: &str) -> ArchiveResult<Bytes> {
    let zip_path = zip_path.as_ref();
    logged(
        "read_entry",
        zip_path,
        read_entry_inner(zip_path, entry_name),
    )
}

fn read_entry_inner(zip_path: &Path, entry_name: &str) -> ArchiveResult<Bytes> {
    let mut archive = open_archive(zip_path)?;
    let mut entry = match archive.by_name(entry_name) {
        Ok(entry) => entry,
        Err(ZipError::FileNotFound) => {
            return Err(ArchiveError::EntryNotFound(entry_name.to_string()));
        }
        Err(e) => return Err(ArchiveError::from_zip(zip_path, e)),
    };
    let mut buffer = Vec::new();
    entry.read_to_end(&mut buffer).map_err(io_at(zip_path))?;
    Ok(Bytes::from(buffer))
}

/// Extract every file entry next to the zip, flattened to its base name.
///
/// Directory entries are skipped and entries sharing a base name overwrite
/// each other in encounter order. An entry that would land on the archive
/// itself is skipped. A zip path without a parent component extracts into the
/// current directory. Returns the absolute paths written.
pub fn extract_zip_to_folder(zip_path: impl AsRef<Path>) -> ArchiveResult<Vec<PathBuf>> {
    let zip_path = zip_path.as_ref();
    logged(
        "extract_zip_to_folder",
        zip_path,
        extract_zip_to_folder_inner(zip_path),
    )
}

fn extract_zip_to_folder_inner(zip_path: &Path) -> ArchiveResult<Vec<PathBuf>> {
    let folder = output_folder(zip_path)?;
    let mut archive = open_archive(zip_path)?;
    let source = fs::canonicalize(zip_path).map_err(io_at(zip_path))?;
    let mut written = Vec::new();

    for index in 0..archive.len() {
        let mut entry = archive
            .by_index(index)
            .map_err(|e| ArchiveError::from_zip(zip_path, e))?;
        if entry.is_dir() {
            continue;
        }
        let Some(base) = flattened_name(entry.name()) else {
            warn!(
                entry = entry.name(),
                "skipping entry without a usable file name"
            );
            continue;
        };

        let target = folder.join(base);
        // The archive is still being read, so it must never be an output.
        if fs::canonicalize(&target).is_ok_and(|existing| existing == source) {
            warn!(
                entry = entry.name(),
                "skipping entry that would overwrite its own archive"
            );
            continue;
        }
        let mut output = File::create(&target).map_err(io_at(&target))?;
        io::copy(&mut entry, &mut output).map_err(io_at(&target))?;
        written.push(target);
    }

    debug!(path = %zip_path.display(), files = written.len(), "extracted zip to folder");
    Ok(written)
}

/// The absolute folder a zip is flattened into: its parent, or the current
/// directory for a bare file name.
fn output_folder(zip_path: &Path) -> ArchiveResult<PathBuf> {
    let parent = match zip_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::path::absolute(parent).map_err(io_at(parent))
}

fn flattened_name(entry_name: &str) -> Option<&str> {
    entry_name
        .rsplit(['/', '\\'])
        .next()
        .filter(|base| !base.is_empty() && *base != "." && *base != "..")
}

/// Extract a zip into `destination`, keeping its internal directory structure.
/// Entries whose names would escape `destination` are skipped.
pub fn unzip_to_folder(
    zip_path: impl AsRef<Path>,
    destination: impl AsRef<Path>,
) -> ArchiveResult<Vec<PathBuf>> {
    let zip_path = zip_path.as_ref();
    let destination = destination.as_ref();
    logged(
        "unzip_to_folder",
        zip_path,
        unzip_to_folder_inner(zip_path, destination),
    )
}

fn unzip_to_folder_inner(zip_path: &Path, destination: &Path) -> ArchiveResult<Vec<PathBuf>> {
    let mut archive = open_archive(zip_path)?;
    fs::create_dir_all(destination).map_err(io_at(destination))?;
    let mut written = Vec::new();

    for index in 0..archive.len() {
        let mut entry = archive
            .by_index(index)
            .map_err(|e| ArchiveError::from_zip(zip_path, e))?;
        let Some(relative) = entry.enclosed_name() else {
            warn!(
                entry = entry.name(),
                "skipping entry outside the destination"
            );
            continue;
        };
        let target = destination.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&target).map_err(io_at(&target))?;
            continue;
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(io_at(parent))?;
        }
        let mut output = File::create(&target).map_err(io_at(&target))?;
        io::copy(&mut entry, &mut output).map_err(io_at(&target))?;
        written.push(target);
    }

    debug!(path = %zip_path.display(), files = written.len(), "unzipped archive");
    Ok(written)
}
