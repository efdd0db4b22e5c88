//! Filter, persist, remember, notify: the per-fix pipeline.
//!
//! The pipeline owns the agent's only mutable filtering state and is driven
//! by exactly one task, so every fix runs to completion before the next.
//! The append itself runs on the blocking pool and is awaited.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::api::notifier::StatusNotifier;
use crate::core::{PositionSample, SampleError};
use crate::processing::filter::{FilterDecision, SampleFilter};
use crate::processing::log_writer::{LogError, LogWriter};

/// Per-run filtering state. Created empty on start, dropped on stop.
#[derive(Debug, Clone, Default)]
pub struct AgentState {
    last_accepted: Option<PositionSample>,
}

impl AgentState {
    pub fn last_accepted(&self) -> Option<&PositionSample> {
        self.last_accepted.as_ref()
    }
}

/// What happened to one fix
#[derive(Debug)]
pub enum FixOutcome {
    /// Passed the filter. `persisted` carries the append result; the sample
    /// became the new reference point either way.
    Accepted {
        decision: FilterDecision,
        persisted: Result<PathBuf, LogError>,
    },
    /// Suppressed by the distance filter
    Rejected { distance_m: f64 },
    /// Malformed fix, discarded
    Invalid(SampleError),
}

impl FixOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, FixOutcome::Accepted { .. })
    }

    pub fn write_error(&self) -> Option<&LogError> {
        match self {
            FixOutcome::Accepted { persisted: Err(e), .. } => Some(e),
            _ => None,
        }
    }
}

pub struct Pipeline {
    filter: SampleFilter,
    writer: LogWriter,
    notifier: Arc<dyn StatusNotifier>,
    state: AgentState,
}

impl Pipeline {
    pub fn new(filter: SampleFilter, writer: LogWriter, notifier: Arc<dyn StatusNotifier>) -> Self {
        Self {
            filter,
            writer,
            notifier,
            state: AgentState::default(),
        }
    }

    pub fn state(&self) -> &AgentState {
        &self.state
    }

    pub fn writer(&self) -> &LogWriter {
        &self.writer
    }

    /// Run one fix through filter → append → state update → notify
    pub async fn process(&mut self, sample: PositionSample) -> FixOutcome {
        let decision = match self.filter.evaluate(&sample, self.state.last_accepted()) {
            Ok(decision) => decision,
            Err(e) => {
                warn!(error = %e, "Discarding malformed fix");
                return FixOutcome::Invalid(e);
            }
        };

        if let FilterDecision::TooClose { distance_m } = decision {
            debug!(distance_m, threshold_m = self.filter.min_distance_m(), "Fix suppressed");
            return FixOutcome::Rejected { distance_m };
        }

        let persisted = self.writer.append_async(&sample).await;
        if let Err(e) = &persisted {
            warn!(error = %e, "Failed to persist accepted fix");
        }

        // Reference point advances even when the write failed
        self.state.last_accepted = Some(sample.clone());
        self.notifier.notify(&sample);

        FixOutcome::Accepted { decision, persisted }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::notifier::CallbackNotifier;
    use chrono::{NaiveDate, TimeZone, Utc};
    use std::fs;
    use std::sync::Mutex;
    use tempfile::TempDir;

    fn fix(lat: f64, lon: f64) -> PositionSample {
        PositionSample::at(Utc.with_ymd_and_hms(2024, 6, 2, 9, 30, 0).unwrap(), lat, lon).unwrap()
    }

    fn recording() -> (Arc<dyn StatusNotifier>, Arc<Mutex<Vec<PositionSample>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let notifier = CallbackNotifier::new(move |s: &PositionSample| {
            sink.lock().unwrap().push(s.clone());
        });
        (Arc::new(notifier), seen)
    }

    fn read_lines(writer: &LogWriter, sample: &PositionSample) -> Vec<String> {
        let path = writer.path_for(writer.partition_date(sample));
        fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[tokio::test]
    async fn test_walkthrough_writes_two_lines() {
        let dir = TempDir::new().unwrap();
        let (notifier, seen) = recording();
        let writer = LogWriter::new(dir.path());
        let mut pipeline = Pipeline::new(SampleFilter::new(5.0), writer.clone(), notifier);

        let fix1 = fix(10.000000, 20.000000);
        let fix2 = fix(10.000001, 20.000000);
        let fix3 = fix(10.000100, 20.000000);

        assert!(pipeline.process(fix1.clone()).await.is_accepted());
        assert!(matches!(pipeline.process(fix2).await, FixOutcome::Rejected { .. }));
        assert!(pipeline.process(fix3.clone()).await.is_accepted());

        let lines = read_lines(&writer, &fix1);
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains(",10.0,20.0,"));
        assert!(lines[1].contains(",10.0001,20.0,"));
        assert_eq!(*seen.lock().unwrap(), vec![fix1, fix3.clone()]);
        assert_eq!(pipeline.state().last_accepted(), Some(&fix3));
    }

    #[tokio::test]
    async fn test_write_failure_still_advances_state() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "file").unwrap();
        let (notifier, seen) = recording();
        let writer = LogWriter::new(blocker.join("gps"));
        let mut pipeline = Pipeline::new(SampleFilter::new(5.0), writer.clone(), notifier);

        let first = fix(10.0, 20.0);
        let outcome = pipeline.process(first.clone()).await;
        assert!(outcome.is_accepted());
        assert!(outcome.write_error().is_some());
        assert_eq!(pipeline.state().last_accepted(), Some(&first));
        assert_eq!(seen.lock().unwrap().len(), 1);

        // same spot again: no retry of the failed write
        assert!(matches!(pipeline.process(first.clone()).await, FixOutcome::Rejected { .. }));

        fs::remove_file(&blocker).unwrap();
        let moved = fix(10.001, 20.0);
        let outcome = pipeline.process(moved.clone()).await;
        assert!(outcome.write_error().is_none());
        assert_eq!(pipeline.state().last_accepted(), Some(&moved));
        assert_eq!(read_lines(&writer, &moved).len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_fix_leaves_state_untouched() {
        let dir = TempDir::new().unwrap();
        let (notifier, seen) = recording();
        let mut pipeline = Pipeline::new(SampleFilter::default(), LogWriter::new(dir.path()), notifier);

        let mut bad = fix(10.0, 20.0);
        bad.longitude = 500.0;
        assert!(matches!(pipeline.process(bad).await, FixOutcome::Invalid(SampleError::InvalidLongitude(_))));
        assert!(pipeline.state().last_accepted().is_none());
        assert!(seen.lock().unwrap().is_empty());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);

        // next valid fix is still treated as the first
        assert!(pipeline.process(fix(10.0, 20.0)).await.is_accepted());
    }

    #[tokio::test]
    async fn test_uses_sample_partition_when_configured() {
        let dir = TempDir::new().unwrap();
        let (notifier, _) = recording();
        let writer = LogWriter::new(dir.path())
            .with_partition(crate::processing::log_writer::PartitionDate::Sample);
        let mut pipeline = Pipeline::new(SampleFilter::default(), writer.clone(), notifier);

        let sample = fix(1.0, 1.0);
        let FixOutcome::Accepted { persisted, .. } = pipeline.process(sample.clone()).await else {
            panic!("first fix must be accepted");
        };
        let expected_day: NaiveDate = writer.partition_date(&sample);
        assert_eq!(persisted.unwrap(), writer.path_for(expected_day));
    }
}
