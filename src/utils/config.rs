use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::core::constants::{
    DEFAULT_LOG_DIR, DEFAULT_MIN_DISTANCE_M, DEFAULT_PULL_INTERVAL_MS, DEFAULT_QUEUE_CAPACITY,
    DEFAULT_STALE_AFTER_MS,
};
use crate::processing::filter::SampleFilter;
use crate::processing::log_writer::{LogWriter, PartitionDate};
use crate::source::{ProviderId, SubscriptionRequest};

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Invalid parameter value
    #[error("invalid {parameter} '{value}': {reason}")]
    InvalidParameter {
        parameter: String,
        value: String,
        reason: String,
    },

    /// Configuration file I/O error
    #[error("config file '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON serialization/deserialization error
    #[error("config file '{path}': {source}")]
    Serialization {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Agent tunables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Base directory of the day files
    pub log_dir: PathBuf,
    /// Pull cadence (milliseconds)
    pub pull_interval_ms: u64,
    /// Minimum displacement for a fix to be accepted (meters)
    pub min_distance_m: f64,
    /// Push subscription time hint (milliseconds)
    pub push_min_interval_ms: u64,
    /// Push subscription distance hint (meters)
    pub push_min_distance_m: f64,
    /// Age after which the last fix is reported stale (milliseconds)
    pub stale_after_ms: u64,
    /// Which date selects the day file
    pub partition: PartitionDate,
    /// Provider preference, most accurate first
    pub provider_order: Vec<String>,
    /// Push events held while the agent is busy; further events are dropped
    pub queue_capacity: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from(DEFAULT_LOG_DIR),
            pull_interval_ms: DEFAULT_PULL_INTERVAL_MS,
            min_distance_m: DEFAULT_MIN_DISTANCE_M,
            push_min_interval_ms: DEFAULT_PULL_INTERVAL_MS,
            push_min_distance_m: DEFAULT_MIN_DISTANCE_M,
            stale_after_ms: DEFAULT_STALE_AFTER_MS,
            partition: PartitionDate::default(),
            provider_order: vec![
                ProviderId::gps().as_str().to_string(),
                ProviderId::network().as_str().to_string(),
            ],
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

fn invalid(parameter: &str, value: impl ToString, reason: &str) -> ConfigError {
    ConfigError::InvalidParameter {
        parameter: parameter.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn check_interval(parameter: &str, value_ms: u64) -> ConfigResult<()> {
    if value_ms == 0 {
        return Err(invalid(parameter, value_ms, "must be greater than zero"));
    }
    Ok(())
}

fn check_distance(parameter: &str, value_m: f64) -> ConfigResult<()> {
    if !value_m.is_finite() || value_m <= 0.0 {
        return Err(invalid(parameter, value_m, "must be a positive number of meters"));
    }
    Ok(())
}

impl AgentConfig {
    /// Load and validate a JSON configuration file. Missing fields take
    /// their defaults.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: AgentConfig =
            serde_json::from_str(&content).map_err(|source| ConfigError::Serialization {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Write the configuration as pretty JSON
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> ConfigResult<()> {
        let path = path.as_ref();
        let content =
            serde_json::to_string_pretty(self).map_err(|source| ConfigError::Serialization {
                path: path.to_path_buf(),
                source,
            })?;
        fs::write(path, content).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.log_dir.as_os_str().is_empty() {
            return Err(invalid("log_dir", "", "must not be empty"));
        }
        check_interval("pull_interval_ms", self.pull_interval_ms)?;
        check_interval("push_min_interval_ms", self.push_min_interval_ms)?;
        check_interval("stale_after_ms", self.stale_after_ms)?;
        check_distance("min_distance_m", self.min_distance_m)?;
        check_distance("push_min_distance_m", self.push_min_distance_m)?;
        if self.queue_capacity == 0 {
            return Err(invalid("queue_capacity", 0, "must be greater than zero"));
        }
        if self.provider_order.is_empty() {
            return Err(invalid("provider_order", "[]", "at least one provider is required"));
        }
        if let Some(name) = self.provider_order.iter().find(|name| name.trim().is_empty()) {
            return Err(invalid("provider_order", name, "provider names must not be blank"));
        }
        Ok(())
    }

    /// Set pull cadence
    pub fn set_pull_interval_ms(&mut self, interval_ms: u64) -> ConfigResult<u64> {
        check_interval("pull_interval_ms", interval_ms)?;
        self.pull_interval_ms = interval_ms;
        Ok(interval_ms)
    }

    /// Set the acceptance threshold and keep the push hint in step with it
    pub fn set_min_distance_m(&mut self, distance_m: f64) -> ConfigResult<f64> {
        check_distance("min_distance_m", distance_m)?;
        self.min_distance_m = distance_m;
        self.push_min_distance_m = distance_m;
        Ok(distance_m)
    }

    pub fn pull_interval(&self) -> Duration {
        Duration::from_millis(self.pull_interval_ms)
    }

    pub fn stale_after(&self) -> Duration {
        Duration::from_millis(self.stale_after_ms)
    }

    pub fn subscription_request(&self) -> SubscriptionRequest {
        SubscriptionRequest::new(self.push_min_interval_ms, self.push_min_distance_m)
    }

    pub fn filter(&self) -> SampleFilter {
        SampleFilter::new(self.min_distance_m)
    }

    pub fn writer(&self) -> LogWriter {
        LogWriter::new(&self.log_dir).with_partition(self.partition)
    }
}
