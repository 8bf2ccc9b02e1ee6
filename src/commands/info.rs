use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use colored::*;

use tickzip::job::{JobDescriptor, JobQueue, JobQueueConfig};
use tickzip::naming::{NamingKey, Resolution, SecurityType};

pub fn name(
    symbol: &str,
    security_type: SecurityType,
    date: NaiveDate,
    resolution: Resolution,
) -> Result<()> {
    let key = NamingKey::new(symbol, security_type, date, resolution);
    println!("{} {}", "entry:".cyan(), key.entry_name());
    println!("{} {}", "file: ".cyan(), key.file_name());
    Ok(())
}

pub fn job(config_path: Option<&Path>) -> Result<()> {
    let path = match config_path {
        Some(path) => path.to_path_buf(),
        None => JobQueueConfig::default_path()?,
    };
    let config = JobQueueConfig::load(&path)
        .with_context(|| format!("Failed to load job configuration {}", path.display()))?;
    let job = JobQueue::new(config).next_job()?;

    match &job {
        JobDescriptor::Backtest(backtest) => {
            println!("{} backtest", "mode:".cyan());
            println!("{} {}", "algorithm:".cyan(), backtest.algorithm_path.display());
        }
        JobDescriptor::Live(live) => {
            println!("{} live", "mode:".cyan());
            println!("{} {}", "algorithm:".cyan(), live.algorithm_path.display());
            println!("{} {}", "brokerage:".cyan(), live.brokerage);
            for key in live.brokerage_data.keys() {
                println!("  {key}");
            }
        }
    }
    println!("{} {}", "version:".cyan(), job.version());
    println!("{} {} bytes", "size:".cyan(), job.algorithm().len());
    Ok(())
}
