//! Defaults and physical constants

/// Mean Earth radius (IUGG, meters)
pub const MEAN_EARTH_RADIUS_M: f64 = 6_371_008.8;

/// Default pull cadence interval (milliseconds)
pub const DEFAULT_PULL_INTERVAL_MS: u64 = 5000;

/// Default minimum movement before a fix is persisted (meters)
pub const DEFAULT_MIN_DISTANCE_M: f64 = 5.0;

/// Default age after which the last processed fix is considered stale (milliseconds)
pub const DEFAULT_STALE_AFTER_MS: u64 = 30_000;

/// Default base directory for the day files
pub const DEFAULT_LOG_DIR: &str = "gps";

/// Default capacity of the agent's push event queue
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;
