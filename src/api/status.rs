//! Read-only status surface: agent snapshot plus log directory inspection

use std::fmt;
use std::fs;
use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Local, Utc};
use serde::Serialize;

use crate::core::PositionSample;
use crate::processing::log_writer::{LogError, LogResult, LOG_FILE_PREFIX, LOG_FILE_SUFFIX};
use crate::source::ProviderId;

/// Scheduler lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerState {
    #[default]
    Stopped,
    Starting,
    Running,
    Stopping,
}

/// Why the agent stopped on its own
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HaltReason {
    PermissionDenied { provider: ProviderId },
}

/// How recent the last processed fix is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Freshness {
    /// No fix processed since start
    NoData,
    Fresh,
    Stale,
}

/// Consistent view of the running agent, replaced as a whole after each fix
#[derive(Debug, Clone, Default, Serialize)]
pub struct AgentSnapshot {
    pub state: SchedulerState,
    /// Provider currently pushing fixes
    pub active_provider: Option<ProviderId>,
    pub last_accepted: Option<PositionSample>,
    /// Processing time of the last fix seen, accepted or not
    pub last_fix_at: Option<DateTime<Utc>>,
    pub accepted: u64,
    pub rejected: u64,
    pub invalid: u64,
    pub write_failures: u64,
    /// Most recent append error; cleared by the next successful append
    pub last_write_error: Option<String>,
    /// Push events refused because the agent's queue was full
    pub dropped_events: u64,
    /// Most recent provider failure the agent kept running through
    pub last_provider_error: Option<String>,
    pub halt: Option<HaltReason>,
}

impl AgentSnapshot {
    pub fn freshness(&self, now: DateTime<Utc>, stale_after: Duration) -> Freshness {
        let Some(last) = self.last_fix_at else {
            return Freshness::NoData;
        };
        let age = now.signed_duration_since(last).to_std().unwrap_or(Duration::ZERO);
        if age > stale_after {
            Freshness::Stale
        } else {
            Freshness::Fresh
        }
    }

    pub fn is_running(&self) -> bool {
        self.state == SchedulerState::Running
    }
}

/// Details of one day file
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogFileInfo {
    pub name: String,
    pub size_bytes: u64,
    pub modified: DateTime<Local>,
    pub line_count: usize,
}

/// State of the log base directory
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LogDirectoryStatus {
    /// Base directory not created yet
    Missing,
    /// Directory exists but holds no day files
    Empty,
    Files {
        file_count: usize,
        latest: LogFileInfo,
    },
}

impl LogDirectoryStatus {
    pub fn file_count(&self) -> usize {
        match self {
            LogDirectoryStatus::Files { file_count, .. } => *file_count,
            _ => 0,
        }
    }

    pub fn latest(&self) -> Option<&LogFileInfo> {
        match self {
            LogDirectoryStatus::Files { latest, .. } => Some(latest),
            _ => None,
        }
    }
}

impl fmt::Display for LogDirectoryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogDirectoryStatus::Missing => write!(f, "GPS directory not created yet"),
            LogDirectoryStatus::Empty => write!(f, "No GPS files found"),
            LogDirectoryStatus::Files { file_count, latest } => {
                writeln!(f, "GPS Files: {}", file_count)?;
                writeln!(f, "Latest: {}", latest.name)?;
                writeln!(f, "Size: {} bytes", latest.size_bytes)?;
                writeln!(f, "Locations: {}", latest.line_count)?;
                write!(f, "Updated: {}", latest.modified.format("%Y-%m-%d %H:%M:%S"))
            }
        }
    }
}

/// Combined answer to a status query
#[derive(Debug, Clone, Serialize)]
pub struct AgentStatus {
    pub snapshot: AgentSnapshot,
    pub freshness: Freshness,
    pub logs: LogDirectoryStatus,
}

fn is_day_file(name: &str) -> bool {
    name.starts_with(LOG_FILE_PREFIX) && name.ends_with(LOG_FILE_SUFFIX)
}

/// Newline-terminated records plus a trailing partial one, if any.
/// Works on raw bytes so a damaged file can still be reported.
fn count_lines(content: &[u8]) -> usize {
    let complete = content.iter().filter(|&&b| b == b'\n').count();
    match content.last() {
        Some(&last) if last != b'\n' => complete + 1,
        _ => complete,
    }
}

/// Inspect the day files under `dir`.
///
/// The latest file is the most recently modified one; ties go to the later
/// name.
pub fn inspect_log_dir(dir: &Path) -> LogResult<LogDirectoryStatus> {
    if !dir.exists() {
        return Ok(LogDirectoryStatus::Missing);
    }
    let read_err = |source| LogError::Read {
        path: dir.to_path_buf(),
        source,
    };

    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(read_err)? {
        let entry = entry.map_err(read_err)?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if !is_day_file(&name) {
            continue;
        }
        let metadata = entry.metadata().map_err(read_err)?;
        if !metadata.is_file() {
            continue;
        }
        let modified = metadata.modified().map_err(read_err)?;
        files.push((DateTime::<Local>::from(modified), name, metadata.len()));
    }

    let file_count = files.len();
    let Some((modified, name, size_bytes)) = files.into_iter().max() else {
        return Ok(LogDirectoryStatus::Empty);
    };

    let path = dir.join(&name);
    let content = fs::read(&path).map_err(|source| LogError::Read { path, source })?;

    Ok(LogDirectoryStatus::Files {
        file_count,
        latest: LogFileInfo {
            name,
            size_bytes,
            modified,
            line_count: count_lines(&content),
        },
    })
}
