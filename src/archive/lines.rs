//! Streaming access to the first entry of a zip archive.
//!
//! [`FirstEntryReader`] owns the underlying file handle outright instead of
//! borrowing a `ZipArchive`: the archive is only used to locate the entry's
//! compressed bytes, then handed back so the file can be positioned at the
//! entry data and wrapped in a decoder. Dropping the reader closes the file.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Cursor, Read, Seek, SeekFrom};
use std::iter::FusedIterator;
use std::path::Path;

use flate2::CrcReader;
use flate2::read::DeflateDecoder;
use tracing::debug;
use zip::{CompressionMethod, ZipArchive};

use super::logged;
use super::zip::open_archive;
use crate::error::{ArchiveError, ArchiveResult, io_at};

/// Label used in logs and errors for archives read from a caller's stream
const STREAM: &str = "<stream>";

/// Decoded entry data, checked against the CRC-32 recorded in the archive once
/// the end of the entry is reached.
struct ChecksummedEntry<R> {
    inner: CrcReader<R>,
    expected: u32,
}

impl<R: Read> Read for ChecksummedEntry<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let read = self.inner.read(buf)?;
        if read == 0 && !buf.is_empty() && self.inner.crc().sum() != self.expected {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "invalid checksum: expected {:08x}, got {:08x}",
                    self.expected,
                    self.inner.crc().sum()
                ),
            ));
        }
        Ok(read)
    }
}

/// A buffered reader bound to one archive entry. Owns every handle it reads from.
pub struct FirstEntryReader {
    name: String,
    inner: BufReader<Box<dyn Read + Send>>,
}

impl FirstEntryReader {
    /// Name of the entry being read
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Release the underlying handle. Equivalent to dropping the reader.
    pub fn close(self) {
        debug!(entry = %self.name, "closing entry reader");
    }

    /// Turn this reader into a lazy sequence of lines.
    pub fn into_lines(self) -> ZipLines {
        ZipLines { reader: Some(self) }
    }
}

impl std::fmt::Debug for FirstEntryReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FirstEntryReader")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl Read for FirstEntryReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl BufRead for FirstEntryReader {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        self.inner.fill_buf()
    }

    fn consume(&mut self, amt: usize) {
        self.inner.consume(amt)
    }
}

/// Open the first entry of the zip at `path` for streaming reads.
///
/// The entry is decoded on the fly; nothing beyond the reader's buffer is held
/// in memory. The caller owns the returned reader and with it the open file.
/// A corrupted entry fails its CRC-32 check with `InvalidData` once the end of
/// the entry is read.
pub fn open_first_entry(path: impl AsRef<Path>) -> ArchiveResult<FirstEntryReader> {
    let path = path.as_ref();
    logged("open_first_entry", path, open_first_entry_inner(path))
}

fn open_first_entry_inner(path: &Path) -> ArchiveResult<FirstEntryReader> {
    let mut archive = open_archive(path)?;
    if archive.is_empty() {
        return Err(ArchiveError::EntryNotFound(format!(
            "{}: archive has no entries",
            path.display()
        )));
    }

    let (name, data_start, compressed_size, method, crc32) = {
        let entry = archive
            .by_index_raw(0)
            .map_err(|e| ArchiveError::from_zip(path, e))?;
        (
            entry.name().to_string(),
            entry.data_start(),
            entry.compressed_size(),
            entry.compression(),
            entry.crc32(),
        )
    };

    let mut file: File = archive.into_inner();
    file.seek(SeekFrom::Start(data_start))
        .map_err(io_at(path))?;
    let raw = file.take(compressed_size);

    let decoded: Box<dyn Read + Send> = match method {
        CompressionMethod::Stored => Box::new(raw),
        CompressionMethod::Deflated => Box::new(DeflateDecoder::new(raw)),
        other => return Err(ArchiveError::UnsupportedCompression(format!("{other:?}"))),
    };
    let checked: Box<dyn Read + Send> = Box::new(ChecksummedEntry {
        inner: CrcReader::new(decoded),
        expected: crc32,
    });

    debug!(path = %path.display(), entry = %name, "opened first entry");
    Ok(FirstEntryReader {
        name,
        inner: BufReader::new(checked),
    })
}

/// Read the first entry of a zip held in an already-open stream.
///
/// Both the stream and the entry are read fully into memory before the reader
/// is returned, so the stream does not need to be seekable.
pub fn open_first_entry_from_stream<R: Read>(input: R) -> ArchiveResult<FirstEntryReader> {
    logged(
        "open_first_entry_from_stream",
        Path::new(STREAM),
        open_first_entry_from_stream_inner(input),
    )
}

fn open_first_entry_from_stream_inner<R: Read>(mut input: R) -> ArchiveResult<FirstEntryReader> {
    let mut buffer = Vec::new();
    input.read_to_end(&mut buffer).map_err(io_at(STREAM))?;

    let mut archive =
        ZipArchive::new(Cursor::new(buffer)).map_err(|e| ArchiveError::from_zip(STREAM, e))?;
    if archive.is_empty() {
        return Err(ArchiveError::EntryNotFound(format!(
            "{STREAM}: archive has no entries"
        )));
    }

    let mut entry = archive
        .by_index(0)
        .map_err(|e| ArchiveError::from_zip(STREAM, e))?;
    let name = entry.name().to_string();
    let mut content = Vec::new();
    entry.read_to_end(&mut content).map_err(io_at(STREAM))?;

    let inner: Box<dyn Read + Send> = Box::new(Cursor::new(content));
    Ok(FirstEntryReader {
        name,
        inner: BufReader::new(inner),
    })
}

/// Lazily read the lines of the first entry of the zip at `path`.
pub fn read_lines(path: impl AsRef<Path>) -> ArchiveResult<ZipLines> {
    let path = path.as_ref();
    logged(
        "read_lines",
        path,
        open_first_entry_inner(path).map(FirstEntryReader::into_lines),
    )
}

/// Lazy, finite, single-pass sequence of lines from one archive entry.
///
/// The handle is released as soon as the last line has been returned, when a
/// read error is yielded, on [`ZipLines::close`], or when the sequence is
/// dropped part way through. Line terminators (`\n` or `\r\n`) are stripped and
/// invalid UTF-8 is replaced.
#[derive(Debug)]
pub struct ZipLines {
    reader: Option<FirstEntryReader>,
}

impl ZipLines {
    /// Whether the underlying handle is still held
    pub fn is_open(&self) -> bool {
        self.reader.is_some()
    }

    /// Stop enumerating and release the handle.
    pub fn close(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.close();
        }
    }
}

impl Iterator for ZipLines {
    type Item = io::Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        let reader = self.reader.as_mut()?;
        let mut buffer = Vec::new();

        match reader.read_until(b'\n', &mut buffer) {
            Ok(0) => {
                self.close();
                None
            }
            Ok(_) => {
                if buffer.ends_with(b"\n") {
                    buffer.pop();
                    if buffer.ends_with(b"\r") {
                        buffer.pop();
                    }
                }
                // Release eagerly once nothing is left to read.
                if matches!(reader.fill_buf(), Ok(rest) if rest.is_empty()) {
                    self.close();
                }
                Some(Ok(String::from_utf8_lossy(&buffer).into_owned()))
            }
            Err(e) => {
                self.close();
                Some(Err(e))
            }
        }
    }
}

impl FusedIterator for ZipLines {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::zip::{write_zip, zip_bytes};
    use std::io::Write;
    use zip::ZipWriter;
    use zip::write::SimpleFileOptions;

    fn write_sample(dir: &Path, body: &str) -> std::path::PathBuf {
        let path = dir.join("sample.zip");
        write_zip(&path, [("first.csv", body), ("second.csv", "ignored\n")]).unwrap();
        path
    }

    #[test]
    fn test_open_first_entry_reads_first_entry_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_sample(dir.path(), "a,1\nb,2\n");

        let mut reader = open_first_entry(&path).unwrap();
        assert_eq!(reader.name(), "first.csv");
        let mut text = String::new();
        reader.read_to_string(&mut text).unwrap();
        assert_eq!(text, "a,1\nb,2\n");
        reader.close();
    }

    #[test]
    fn test_open_first_entry_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = open_first_entry(dir.path().join("absent.zip"));
        assert!(matches!(result, Err(ArchiveError::MissingFile(_))));
    }

    #[test]
    fn test_open_first_entry_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.zip");
        std::fs::write(&path, b"this is not a zip").unwrap();

        let result = open_first_entry(&path);
        assert!(matches!(result, Err(ArchiveError::MalformedArchive { .. })));
    }

    #[test]
    fn test_open_first_entry_empty_archive() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.zip");
        write_zip(&path, Vec::<(&str, &[u8])>::new()).unwrap();

        let result = open_first_entry(&path);
        assert!(matches!(result, Err(ArchiveError::EntryNotFound(_))));
    }

    #[test]
    fn test_read_lines_yields_every_line_and_releases() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_sample(dir.path(), "l1\nl2\r\nl3");

        let mut lines = read_lines(&path).unwrap();
        assert!(lines.is_open());
        assert_eq!(lines.next().unwrap().unwrap(), "l1");
        assert_eq!(lines.next().unwrap().unwrap(), "l2");
        assert!(lines.is_open());
        assert_eq!(lines.next().unwrap().unwrap(), "l3");
        assert!(!lines.is_open());
        assert!(lines.next().is_none());
        assert!(lines.next().is_none());
    }

    #[test]
    fn test_read_lines_close_early() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_sample(dir.path(), "l1\nl2\nl3\n");

        let mut lines = read_lines(&path).unwrap();
        assert_eq!(lines.next().unwrap().unwrap(), "l1");
        lines.close();
        assert!(!lines.is_open());
        assert!(lines.next().is_none());
    }

    /// Write a one-entry zip without compression, so the payload appears verbatim.
    fn write_stored(path: &Path, name: &str, body: &[u8]) {
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
        let mut writer = ZipWriter::new(File::create(path).unwrap());
        writer.start_file(name, options).unwrap();
        writer.write_all(body).unwrap();
        writer.finish().unwrap();
    }

    fn overwrite_byte(path: &Path, needle: &[u8], replacement: u8) {
        let mut bytes = std::fs::read(path).unwrap();
        let at = bytes
            .windows(needle.len())
            .position(|window| window == needle)
            .unwrap();
        bytes[at] = replacement;
        std::fs::write(path, bytes).unwrap();
    }

    #[test]
    fn test_read_lines_reports_corrupted_entry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stored.zip");
        write_stored(&path, "quotes.csv", b"hello\nworld\n");
        overwrite_byte(&path, b"hello", b'J');

        let mut lines = read_lines(&path).unwrap();
        let results: Vec<io::Result<String>> = lines.by_ref().collect();

        assert!(!lines.is_open());
        let err = results
            .into_iter()
            .find_map(Result::err)
            .expect("corrupted entry should yield an error");
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn test_open_first_entry_rejects_corrupted_entry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stored.zip");
        write_stored(&path, "quotes.csv", b"1.10,1.20\n");
        overwrite_byte(&path, b"1.10", b'7');

        let mut reader = open_first_entry(&path).unwrap();
        let mut text = String::new();
        let err = reader.read_to_string(&mut text).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn test_stored_entry_passes_checksum() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stored.zip");
        write_stored(&path, "quotes.csv", b"hello\nworld\n");

        let lines: Vec<String> = read_lines(&path).unwrap().map(|l| l.unwrap()).collect();
        assert_eq!(lines, vec!["hello", "world"]);
    }

    #[test]
    fn test_read_lines_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_lines(dir.path().join("absent.zip")).is_err());
    }

    #[test]
    fn test_open_first_entry_from_stream() {
        let bytes = zip_bytes(b"x,1\ny,2\n", "stream.csv").unwrap();

        let reader = open_first_entry_from_stream(bytes.as_slice()).unwrap();
        assert_eq!(reader.name(), "stream.csv");
        let lines: Vec<String> = reader.into_lines().map(|l| l.unwrap()).collect();
        assert_eq!(lines, vec!["x,1", "y,2"]);
    }

    #[test]
    fn test_open_first_entry_from_stream_malformed() {
        let result = open_first_entry_from_stream(&b"garbage"[..]);
        assert!(matches!(result, Err(ArchiveError::MalformedArchive { .. })));
    }
}
