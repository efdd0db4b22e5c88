//! Status notifier boundary
//!
//! The agent hands every accepted sample to a [`StatusNotifier`]. What the
//! notifier does with it (tray icon, notification, UI label) is up to the
//! front-end; the agent never depends on it for correctness.

use tracing::info;

use crate::core::PositionSample;

/// Receiver of the latest accepted sample
pub trait StatusNotifier: Send + Sync {
    fn notify(&self, sample: &PositionSample);
}

/// Callback function type for accepted samples
pub type SampleCallback = Box<dyn Fn(&PositionSample) + Send + Sync>;

/// Forwards accepted samples to a closure
pub struct CallbackNotifier {
    callback: SampleCallback,
}

impl CallbackNotifier {
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(&PositionSample) + Send + Sync + 'static,
    {
        Self {
            callback: Box::new(callback),
        }
    }
}

impl StatusNotifier for CallbackNotifier {
    fn notify(&self, sample: &PositionSample) {
        (self.callback)(sample)
    }
}

/// Emits the status line as an INFO event
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl StatusNotifier for TracingNotifier {
    fn notify(&self, sample: &PositionSample) {
        info!(
            altitude_m = sample.altitude,
            accuracy_m = sample.accuracy,
            "{}",
            notification_text(sample)
        );
    }
}

/// One-line status text, e.g. `Last: 47.606200, -122.332100`
pub fn notification_text(sample: &PositionSample) -> String {
    format!("Last: {:.6}, {:.6}", sample.latitude, sample.longitude)
}
