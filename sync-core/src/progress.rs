//! Low-pass filter for completion samples.
//!
//! The agent may emit noisy intermediate figures (a folder rescan can make
//! completion drop for a moment). Rendering only strictly increasing values
//! keeps the display monotone; a lower sample is suppressed, not an error.

use devsync_types::ProgressSample;

/// Tracks the last rendered value and decides what to render next.
#[derive(Debug, Clone, Default)]
pub struct ProgressFilter {
    last: f64,
    finished: bool,
}

impl ProgressFilter {
    /// Create a filter that has rendered nothing yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Offer a sample; returns the value to render, if any.
    ///
    /// A sample is rendered iff it is strictly greater than the last rendered
    /// value. Nothing is rendered after [`finish`](Self::finish).
    pub fn offer(&mut self, sample: ProgressSample) -> Option<f64> {
        let value = sample.percent();
        if self.finished || value <= self.last {
            return None;
        }
        self.last = value;
        Some(value)
    }

    /// Force the terminal value of a successful completion.
    pub fn finish(&mut self) -> f64 {
        self.finished = true;
        self.last = ProgressSample::COMPLETE.percent();
        self.last
    }

    /// Last rendered value (0 before anything was rendered).
    pub fn last(&self) -> f64 {
        self.last
    }
}
