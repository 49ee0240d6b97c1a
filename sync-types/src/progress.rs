//! Completion samples reported by the agent.

use crate::error::InvalidProgress;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Cumulative completion of the initial transfer, in percent.
///
/// Always finite and within `[0, 100]`, including when deserialized.
#[derive(Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(try_from = "f64")]
pub struct ProgressSample(f64);

impl ProgressSample {
    /// A finished transfer.
    pub const COMPLETE: Self = Self(100.0);

    /// Create a sample, clamping into `[0, 100]`.
    ///
    /// Returns `None` for NaN or infinite input; the agent occasionally
    /// reports garbage while its index is still being built.
    pub fn new(percent: f64) -> Option<Self> {
        if percent.is_finite() {
            Some(Self(percent.clamp(0.0, 100.0)))
        } else {
            None
        }
    }

    /// The percentage value.
    pub fn percent(&self) -> f64 {
        self.0
    }

    /// Whether this sample represents full completion.
    pub fn is_complete(&self) -> bool {
        self.0 >= 100.0
    }
}

impl TryFrom<f64> for ProgressSample {
    type Error = InvalidProgress;

    fn try_from(percent: f64) -> Result<Self, Self::Error> {
        Self::new(percent).ok_or(InvalidProgress(percent))
    }
}

impl fmt::Display for ProgressSample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1}%", self.0)
    }
}

impl fmt::Debug for ProgressSample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ProgressSample({})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamps_out_of_range() {
        assert_eq!(ProgressSample::new(-3.0).unwrap().percent(), 0.0);
        assert_eq!(ProgressSample::new(104.2).unwrap().percent(), 100.0);
        assert_eq!(ProgressSample::new(42.5).unwrap().percent(), 42.5);
    }

    #[test]
    fn rejects_non_finite() {
        assert!(ProgressSample::new(f64::NAN).is_none());
        assert!(ProgressSample::new(f64::INFINITY).is_none());
    }

    #[test]
    fn try_from_rejects_non_finite() {
        assert_eq!(
            ProgressSample::try_from(f64::NEG_INFINITY),
            Err(InvalidProgress(f64::NEG_INFINITY))
        );
        assert_eq!(ProgressSample::try_from(12.0).unwrap().percent(), 12.0);
    }

    #[test]
    fn deserialize_keeps_range() {
        let high: ProgressSample = serde_json::from_str("250.0").unwrap();
        let low: ProgressSample = serde_json::from_str("-1").unwrap();

        assert_eq!(high.percent(), 100.0);
        assert_eq!(low.percent(), 0.0);
        assert!(serde_json::from_str::<ProgressSample>("\"fast\"").is_err());
    }

    #[test]
    fn complete_constant() {
        assert!(ProgressSample::COMPLETE.is_complete());
        assert!(!ProgressSample::new(99.9).unwrap().is_complete());
        assert_eq!(ProgressSample::COMPLETE.to_string(), "100.0%");
    }
}
