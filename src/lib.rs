//! Archive helpers and canonical naming for a local market-data pipeline.
//!
//! - [`archive`] writes zip files and reads zip, tar, tar.gz and tar.bz2
//!   archives to folders, memory or lazy line streams.
//! - [`naming`] maps a dated data series to its canonical file and entry names.
//! - [`job`] builds the backtest or live job description handed to the engine.

pub mod archive;
pub mod error;
pub mod job;
pub mod naming;

pub use error::{ArchiveError, ArchiveResult, JobError, JobResult};
