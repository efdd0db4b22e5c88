//! Distance-based sample suppression

use crate::core::{PositionSample, SampleError, DEFAULT_MIN_DISTANCE_M};

/// Outcome of evaluating a candidate against the last accepted sample
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FilterDecision {
    /// Nothing accepted yet since start
    First,
    /// Moved at least the threshold
    Moved { distance_m: f64 },
    /// Closer than the threshold
    TooClose { distance_m: f64 },
}

impl FilterDecision {
    pub fn is_accept(&self) -> bool {
        !matches!(self, FilterDecision::TooClose { .. })
    }

    /// Distance from the last accepted sample, if there was one
    pub fn distance_m(&self) -> Option<f64> {
        match self {
            FilterDecision::First => None,
            FilterDecision::Moved { distance_m } | FilterDecision::TooClose { distance_m } => {
                Some(*distance_m)
            }
        }
    }
}

/// Pure accept/reject decision on surface distance
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleFilter {
    min_distance_m: f64,
}

impl SampleFilter {
    /// Non-positive or NaN thresholds are raised to the smallest positive
    /// distance so identical coordinates never pass.
    pub fn new(min_distance_m: f64) -> Self {
        let min_distance_m = if min_distance_m > 0.0 {
            min_distance_m
        } else {
            f64::MIN_POSITIVE
        };
        Self { min_distance_m }
    }

    pub fn min_distance_m(&self) -> f64 {
        self.min_distance_m
    }

    /// Classify `candidate`. Invalid candidates fail instead of passing.
    pub fn evaluate(
        &self,
        candidate: &PositionSample,
        last_accepted: Option<&PositionSample>,
    ) -> Result<FilterDecision, SampleError> {
        candidate.validate()?;
        let Some(last) = last_accepted else {
            return Ok(FilterDecision::First);
        };

        let distance_m = last.distance_to(candidate);
        if distance_m >= self.min_distance_m {
            Ok(FilterDecision::Moved { distance_m })
        } else {
            Ok(FilterDecision::TooClose { distance_m })
        }
    }

    pub fn should_accept(
        &self,
        candidate: &PositionSample,
        last_accepted: Option<&PositionSample>,
    ) -> Result<bool, SampleError> {
        self.evaluate(candidate, last_accepted).map(|d| d.is_accept())
    }
}

impl Default for SampleFilter {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_DISTANCE_M)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn fix(lat: f64, lon: f64) -> PositionSample {
        PositionSample::at(Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap(), lat, lon).unwrap()
    }

    #[test]
    fn test_first_sample_always_accepted() {
        let filter = SampleFilter::default();
        assert_eq!(filter.evaluate(&fix(10.0, 20.0), None), Ok(FilterDecision::First));
        assert!(filter.should_accept(&fix(-45.0, 170.0), None).unwrap());
    }

    #[test]
    fn test_walkthrough_sequence() {
        let filter = SampleFilter::new(5.0);
        let fix1 = fix(10.000000, 20.000000);
        let fix2 = fix(10.000001, 20.000000);
        let fix3 = fix(10.000100, 20.000000);

        assert!(filter.should_accept(&fix1, None).unwrap());

        let decision = filter.evaluate(&fix2, Some(&fix1)).unwrap();
        assert!(!decision.is_accept());
        assert!(decision.distance_m().unwrap() < 0.2);

        let decision = filter.evaluate(&fix3, Some(&fix1)).unwrap();
        assert!(decision.is_accept());
        assert!((decision.distance_m().unwrap() - 11.1).abs() < 0.1);
    }

    #[test]
    fn test_exact_threshold_accepts() {
        let a = fix(51.5, -0.12);
        let b = fix(51.50004, -0.12);
        let filter = SampleFilter::new(a.distance_to(&b));
        assert!(filter.should_accept(&b, Some(&a)).unwrap());
    }

    #[test]
    fn test_identical_coordinates_reject() {
        let a = fix(10.0, 20.0);
        for threshold in [5.0, 0.0, -1.0, f64::NAN] {
            let filter = SampleFilter::new(threshold);
            assert!(!filter.should_accept(&a.clone(), Some(&a)).unwrap());
        }
    }

    #[test]
    fn test_invalid_candidate_fails_fast() {
        let filter = SampleFilter::default();
        let mut bad = fix(10.0, 20.0);
        bad.latitude = f64::NAN;
        assert!(filter.should_accept(&bad, None).is_err());
        assert!(filter.should_accept(&bad, Some(&fix(10.0, 20.0))).is_err());
    }

    #[test]
    fn test_pure_function_of_inputs() {
        let filter = SampleFilter::new(5.0);
        let last = fix(0.0, 0.0);
        let candidate = fix(0.0, 0.00003);
        let first = filter.evaluate(&candidate, Some(&last)).unwrap();
        for _ in 0..10 {
            assert_eq!(filter.evaluate(&candidate, Some(&last)).unwrap(), first);
        }
    }
}
