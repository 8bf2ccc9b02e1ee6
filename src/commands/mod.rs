use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use chrono::NaiveDate;
use clap::Subcommand;
use indicatif::{ProgressBar, ProgressStyle};

use tickzip::naming::{Resolution, SecurityType};

pub mod archive;
pub mod info;
pub mod output;

#[derive(Subcommand)]
pub enum Commands {
    /// Zip files into DEST, each under its base name (missing files are skipped)
    Zip {
        dest: PathBuf,
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Zip one file next to itself with a .zip extension
    ZipFile {
        source: PathBuf,
        /// Delete the original after zipping
        #[arg(long)]
        delete: bool,
    },

    /// Zip a whole directory tree
    ZipDir {
        dir: PathBuf,
        dest: PathBuf,
        /// Prefix entry names with the directory's own name
        #[arg(long)]
        include_root: bool,
    },

    /// Extract a zip next to itself, flattening its folders
    Unzip {
        zip: PathBuf,
        /// Extract into DIR keeping the archive's folders instead
        #[arg(short, long, value_name = "DIR")]
        dest: Option<PathBuf>,
    },

    /// Extract a zip, tar, tar.gz or tar.bz2 archive into DEST
    Extract { archive: PathBuf, dest: PathBuf },

    /// List the entries of a zip
    Ls { zip: PathBuf },

    /// Print the first entry of a zip, or a named one
    Cat {
        zip: PathBuf,
        #[arg(short, long)]
        entry: Option<String>,
    },

    /// Print the canonical entry and file names for a data series
    Name {
        symbol: String,
        security_type: SecurityType,
        /// Date as YYYY-MM-DD
        date: NaiveDate,
        resolution: Resolution,
    },

    /// Show the job the dispatcher would hand out
    Job {
        /// Job configuration file (defaults to the user config directory)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

impl Commands {
    pub fn run(self) -> Result<()> {
        match self {
            Commands::Zip { dest, files } => archive::zip(&dest, &files),
            Commands::ZipFile { source, delete } => archive::zip_file(&source, delete),
            Commands::ZipDir {
                dir,
                dest,
                include_root,
            } => archive::zip_dir(&dir, &dest, include_root),
            Commands::Unzip { zip, dest } => archive::unzip(&zip, dest.as_deref()),
            Commands::Extract { archive: source, dest } => archive::extract(&source, &dest),
            Commands::Ls { zip } => archive::ls(&zip),
            Commands::Cat { zip, entry } => archive::cat(&zip, entry.as_deref()),
            Commands::Name {
                symbol,
                security_type,
                date,
                resolution,
            } => info::name(&symbol, security_type, date, resolution),
            Commands::Job { config } => info::job(config.as_deref()),
        }
    }
}

/// Spinner shown on stderr while a long archive operation runs
pub fn create_spinner(message: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
        spinner.set_style(style);
    }
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(Duration::from_millis(80));
    spinner
}
