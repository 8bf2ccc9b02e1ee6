//! Job dispatch: turns a local configuration plus one algorithm binary into a
//! backtest or live job description.
//!
//! Configuration is passed in explicitly; nothing here reads global state.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::error::{JobError, JobResult};

fn default_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

/// Settings read from the job configuration file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct JobQueueConfig {
    #[serde(default)]
    pub live_mode: bool,
    pub algorithm_location: PathBuf,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub live_mode_brokerage: Option<String>,
    /// Brokerage registry: settings keyed by brokerage type name
    #[serde(default)]
    pub brokerages: BTreeMap<String, BTreeMap<String, String>>,
}

impl JobQueueConfig {
    /// Default location of the configuration file
    pub fn default_path() -> JobResult<PathBuf> {
        dirs::config_dir()
            .map(|dir| dir.join("tickzip").join("job.json"))
            .ok_or(JobError::NoConfigDir)
    }

    /// Load a configuration from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> JobResult<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| JobError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| JobError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BacktestJob {
    pub version: String,
    pub algorithm_path: PathBuf,
    pub algorithm: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveJob {
    pub version: String,
    pub algorithm_path: PathBuf,
    pub algorithm: Vec<u8>,
    pub brokerage: String,
    pub brokerage_data: BTreeMap<String, String>,
}

/// A unit of work handed to the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobDescriptor {
    Backtest(BacktestJob),
    Live(LiveJob),
}

impl JobDescriptor {
    pub fn version(&self) -> &str {
        match self {
            JobDescriptor::Backtest(job) => &job.version,
            JobDescriptor::Live(job) => &job.version,
        }
    }

    pub fn algorithm(&self) -> &[u8] {
        match self {
            JobDescriptor::Backtest(job) => &job.algorithm,
            JobDescriptor::Live(job) => &job.algorithm,
        }
    }

    pub fn is_live(&self) -> bool {
        matches!(self, JobDescriptor::Live(_))
    }
}

/// Produces jobs from an explicit configuration
pub struct JobQueue {
    config: JobQueueConfig,
}

impl JobQueue {
    pub fn new(config: JobQueueConfig) -> Self {
        JobQueue { config }
    }

    pub fn config(&self) -> &JobQueueConfig {
        &self.config
    }

    /// Build the next job. There is only ever one: the configured algorithm.
    pub fn next_job(&self) -> JobResult<JobDescriptor> {
        let result = self.build_job();
        if let Err(err) = &result {
            error!(error = %err, "failed to build job");
        }
        result
    }

    fn build_job(&self) -> JobResult<JobDescriptor> {
        let algorithm_path = self.config.algorithm_location.clone();
        if !algorithm_path.is_file() {
            return Err(JobError::AlgorithmNotFound(algorithm_path));
        }
        let algorithm = fs::read(&algorithm_path).map_err(|source| JobError::AlgorithmRead {
            path: algorithm_path.clone(),
            source,
        })?;
        let version = self.config.version.clone();

        if !self.config.live_mode {
            info!(
                path = %algorithm_path.display(),
                bytes = algorithm.len(),
                "prepared backtest job"
            );
            return Ok(JobDescriptor::Backtest(BacktestJob {
                version,
                algorithm_path,
                algorithm,
            }));
        }

        let brokerage = self
            .config
            .live_mode_brokerage
            .clone()
            .ok_or(JobError::MissingBrokerage)?;
        let brokerage_data = self
            .config
            .brokerages
            .get(&brokerage)
            .cloned()
            .ok_or_else(|| JobError::UnknownBrokerage(brokerage.clone()))?;

        info!(path = %algorithm_path.display(), brokerage = %brokerage, "prepared live job");
        Ok(JobDescriptor::Live(LiveJob {
            version,
            algorithm_path,
            algorithm,
            brokerage,
            brokerage_data,
        }))
    }
}
