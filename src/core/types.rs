//! Core data types for the location sampling agent

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Rejection reasons for malformed fixes
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SampleError {
    /// Latitude is NaN, infinite or outside [-90, 90]
    #[error("invalid latitude: {0}")]
    InvalidLatitude(f64),
    /// Longitude is NaN, infinite or outside [-180, 180]
    #[error("invalid longitude: {0}")]
    InvalidLongitude(f64),
    /// Altitude is not a finite number
    #[error("invalid altitude: {0}")]
    InvalidAltitude(f64),
    /// Accuracy radius is negative or not a finite number
    #[error("invalid accuracy: {0}")]
    InvalidAccuracy(f64),
}

/// A single position fix as reported by a provider.
///
/// The timestamp is the provider's clock at the time of the fix, not the
/// time the agent processed it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionSample {
    pub timestamp: DateTime<Utc>,
    pub latitude: f64,
    pub longitude: f64,
    /// Meters; zero when the provider has no altitude
    pub altitude: f64,
    /// Horizontal accuracy radius in meters
    pub accuracy: f64,
}

impl PositionSample {
    /// Create a validated sample
    pub fn new(
        timestamp: DateTime<Utc>,
        latitude: f64,
        longitude: f64,
        altitude: f64,
        accuracy: f64,
    ) -> Result<Self, SampleError> {
        let sample = Self {
            timestamp,
            latitude,
            longitude,
            altitude,
            accuracy,
        };
        sample.validate()?;
        Ok(sample)
    }

    /// Convenience constructor for a fix without altitude or accuracy data
    pub fn at(timestamp: DateTime<Utc>, latitude: f64, longitude: f64) -> Result<Self, SampleError> {
        Self::new(timestamp, latitude, longitude, 0.0, 0.0)
    }

    pub fn with_altitude(mut self, altitude: f64) -> Self {
        self.altitude = altitude;
        self
    }

    pub fn with_accuracy(mut self, accuracy: f64) -> Self {
        self.accuracy = accuracy;
        self
    }

    /// Check that every field holds a usable value.
    ///
    /// Fields are public, so samples assembled by provider glue are checked
    /// again before they reach the filter.
    pub fn validate(&self) -> Result<(), SampleError> {
        if !self.latitude.is_finite() || !(-90.0..=90.0).contains(&self.latitude) {
            return Err(SampleError::InvalidLatitude(self.latitude));
        }
        if !self.longitude.is_finite() || !(-180.0..=180.0).contains(&self.longitude) {
            return Err(SampleError::InvalidLongitude(self.longitude));
        }
        if !self.altitude.is_finite() {
            return Err(SampleError::InvalidAltitude(self.altitude));
        }
        if !self.accuracy.is_finite() || self.accuracy < 0.0 {
            return Err(SampleError::InvalidAccuracy(self.accuracy));
        }
        Ok(())
    }

    /// Surface distance to another sample in meters
    pub fn distance_to(&self, other: &PositionSample) -> f64 {
        crate::core::geodesy::surface_distance_m(
            self.latitude,
            self.longitude,
            other.latitude,
            other.longitude,
        )
    }

    /// True when both samples sit on the same coordinates
    pub fn same_position(&self, other: &PositionSample) -> bool {
        self.latitude == other.latitude && self.longitude == other.longitude
    }
}
