use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use colored::*;
use humansize::{DECIMAL, format_size};

use tickzip::archive;

use super::create_spinner;
use super::output::{print_bytes, print_line};

/// Largest prefix of a binary entry shown as hex
const HEX_PREVIEW_LEN: usize = 1024;

pub fn zip(dest: &Path, files: &[PathBuf]) -> Result<()> {
    let written = archive::write_zip_files(dest, files)
        .with_context(|| format!("Failed to write {}", dest.display()))?;
    if written < files.len() {
        eprintln!(
            "{} skipped {} missing file(s)",
            "Warning:".yellow().bold(),
            files.len() - written
        );
    }
    println!("{} ({written} entries)", dest.display());
    Ok(())
}

pub fn zip_file(source: &Path, delete: bool) -> Result<()> {
    let zipped = archive::zip_single_file(source, delete)
        .with_context(|| format!("Failed to zip {}", source.display()))?;
    println!("{}", zipped.display());
    Ok(())
}

pub fn zip_dir(dir: &Path, dest: &Path, include_root: bool) -> Result<()> {
    let spinner = create_spinner(&format!("Zipping {}...", dir.display()));
    let result = archive::zip_directory(dir, dest, include_root);
    spinner.finish_and_clear();

    let written = result.with_context(|| format!("Failed to zip directory {}", dir.display()))?;
    println!("{} ({written} entries)", dest.display());
    Ok(())
}

pub fn unzip(zip: &Path, dest: Option<&Path>) -> Result<()> {
    let filename = zip.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
    let spinner = create_spinner(&format!("Extracting {filename}..."));
    let result = match dest {
        Some(dest) => archive::unzip_to_folder(zip, dest),
        None => archive::extract_zip_to_folder(zip),
    };
    spinner.finish_and_clear();

    let written = result.with_context(|| format!("Failed to extract {}", zip.display()))?;
    for path in written {
        print_line!("{}", path.display());
    }
    Ok(())
}

pub fn extract(source: &Path, dest: &Path) -> Result<()> {
    let filename = source.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
    let spinner = create_spinner(&format!("Extracting {filename}..."));
    let result = archive::extract(source, dest);
    spinner.finish_and_clear();

    let written = result.with_context(|| format!("Failed to extract {}", source.display()))?;
    for path in written {
        print_line!("{}", path.display());
    }
    Ok(())
}

pub fn ls(zip: &Path) -> Result<()> {
    let entries = archive::list_entries(zip)
        .with_context(|| format!("Failed to list {}", zip.display()))?;

    for entry in entries {
        if entry.is_dir {
            print_line!("{:>10}  {}", "-", entry.path.blue().bold());
        } else {
            print_line!("{:>10}  {}", format_size(entry.size, DECIMAL), entry.path);
        }
    }
    Ok(())
}

pub fn cat(zip: &Path, entry: Option<&str>) -> Result<()> {
    let Some(name) = entry else {
        // Stream the first entry line by line; the archive stays open only
        // while lines are being printed.
        let lines = archive::read_lines(zip)
            .with_context(|| format!("Failed to open {}", zip.display()))?;
        for line in lines {
            let line = line.with_context(|| format!("Failed to read {}", zip.display()))?;
            print_line!("{line}");
        }
        return Ok(());
    };

    let bytes = archive::read_entry(zip, name)
        .with_context(|| format!("Failed to read {name} from {}", zip.display()))?;

    if std::str::from_utf8(&bytes).is_ok() {
        print_bytes!(&bytes);
        return Ok(());
    }

    eprintln!("{} entry contains binary data", "Warning:".yellow().bold());
    let display_len = bytes.len().min(HEX_PREVIEW_LEN);
    for (row, chunk) in bytes[..display_len].chunks(16).enumerate() {
        let hex: Vec<String> = chunk.iter().map(|byte| format!("{byte:02x}")).collect();
        print_line!("{:08x}: {}", row * 16, hex.join(" "));
    }
    if bytes.len() > HEX_PREVIEW_LEN {
        eprintln!("... ({} more bytes)", bytes.len() - HEX_PREVIEW_LEN);
    }
    Ok(())
}
