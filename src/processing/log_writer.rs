//! Append-only, day-partitioned persistence of accepted samples
//!
//! Each accepted sample becomes one line in `<base>/gps_<YYYY-MM-DD>.txt`:
//!
//! ```text
//! 2024-05-01 14:03:27,10.0001,20.0,112.5,4.0
//! ```
//!
//! Every append opens, writes, syncs and closes the file, so a crash between
//! appends leaves the file valid up to the last completed line.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::core::PositionSample;

/// File name prefix shared by all day files
pub const LOG_FILE_PREFIX: &str = "gps_";

/// File name suffix shared by all day files
pub const LOG_FILE_SUFFIX: &str = ".txt";

/// Log I/O errors
#[derive(Debug, Error)]
pub enum LogError {
    #[error("failed to create log directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to append to {path}: {source}")]
    Append {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("background write task failed: {0}")]
    Spawn(String),
}

/// Result type for log operations
pub type LogResult<T> = Result<T, LogError>;

/// Which calendar day a sample is filed under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartitionDate {
    /// Agent-local date at the time of the write
    #[default]
    Processing,
    /// Agent-local date of the fix timestamp
    Sample,
}

/// Writer for the day files under one base directory
#[derive(Debug, Clone)]
pub struct LogWriter {
    base_dir: PathBuf,
    partition: PartitionDate,
}

impl LogWriter {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            partition: PartitionDate::default(),
        }
    }

    pub fn with_partition(mut self, partition: PartitionDate) -> Self {
        self.partition = partition;
        self
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn partition(&self) -> PartitionDate {
        self.partition
    }

    /// Day file name for a date, e.g. `gps_2024-05-01.txt`
    pub fn file_name_for(date: NaiveDate) -> String {
        format!("{}{}{}", LOG_FILE_PREFIX, date.format("%Y-%m-%d"), LOG_FILE_SUFFIX)
    }

    pub fn path_for(&self, date: NaiveDate) -> PathBuf {
        self.base_dir.join(Self::file_name_for(date))
    }

    /// Date the sample will be filed under right now
    pub fn partition_date(&self, sample: &PositionSample) -> NaiveDate {
        match self.partition {
            PartitionDate::Processing => Local::now().date_naive(),
            PartitionDate::Sample => sample.timestamp.with_timezone(&Local).date_naive(),
        }
    }

    /// Create the base directory and its parents. Idempotent.
    pub fn ensure_dir(&self) -> LogResult<()> {
        fs::create_dir_all(&self.base_dir).map_err(|source| LogError::CreateDir {
            path: self.base_dir.clone(),
            source,
        })
    }

    /// Append one record to the sample's day file.
    /// Returns the path written to.
    pub fn append(&self, sample: &PositionSample) -> LogResult<PathBuf> {
        self.append_on(sample, self.partition_date(sample))
    }

    /// [`append`](Self::append) on the blocking pool, keeping the file sync
    /// off the async worker threads
    pub async fn append_async(&self, sample: &PositionSample) -> LogResult<PathBuf> {
        let writer = self.clone();
        let sample = sample.clone();
        tokio::task::spawn_blocking(move || writer.append(&sample))
            .await
            .map_err(|e| LogError::Spawn(e.to_string()))?
    }

    /// Append one record to the day file for `date`
    pub fn append_on(&self, sample: &PositionSample, date: NaiveDate) -> LogResult<PathBuf> {
        self.ensure_dir()?;
        let path = self.path_for(date);
        let record = format_record(sample);

        write_record(&path, record.as_bytes()).map_err(|source| LogError::Append {
            path: path.clone(),
            source,
        })?;

        debug!(path = %path.display(), "Location appended");
        Ok(path)
    }
}

/// Open in append mode, write, and sync. The handle is dropped on every path.
fn write_record(path: &Path, record: &[u8]) -> io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(record)?;
    file.sync_data()
}

/// `timestamp,latitude,longitude,altitude,accuracy\n`
pub fn format_record(sample: &PositionSample) -> String {
    format!(
        "{},{},{},{},{}\n",
        format_timestamp(sample.timestamp),
        format_number(sample.latitude),
        format_number(sample.longitude),
        format_number(sample.altitude),
        format_number(sample.accuracy),
    )
}

/// `YYYY-MM-DD HH:mm:ss` in agent-local time
pub fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp
        .with_timezone(&Local)
        .format("%Y-%m-%d %H:%M:%S")
        .to_string()
}

// shortest round-trip form; whole numbers keep one decimal
fn format_number(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{:.1}", value)
    } else {
        format!("{}", value)
    }
}
