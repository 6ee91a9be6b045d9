// Status classification from channel thresholds
use super::channel::{ChannelConfig, Polarity, Thresholds};
use serde::{Deserialize, Serialize};

const WARNING_FRACTION: f64 = 0.8;
const CRITICAL_FRACTION: f64 = 0.9;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    #[default]
    Normal,
    Warning,
    Critical,
}

/// How high-bad channels with a full min/max range are judged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThresholdPolicy {
    /// Position inside [low, high]: >= 0.8 warning, >= 0.9 critical.
    #[default]
    Normalized,
    /// Raw comparison against `high_warn` / `high` only.
    Absolute,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Classifier {
    policy: ThresholdPolicy,
}

impl Classifier {
    pub fn new(policy: ThresholdPolicy) -> Self {
        Self { policy }
    }

    pub fn classify(&self, value: f64, config: &ChannelConfig) -> Status {
        match &config.thresholds {
            None => Status::Normal,
            Some(t) => match t.polarity {
                Polarity::HighIsBad => self.classify_high_bad(value, t),
                Polarity::LowIsBad => classify_low_bad(value, t),
            },
        }
    }

    fn classify_high_bad(&self, value: f64, t: &Thresholds) -> Status {
        if let (ThresholdPolicy::Normalized, Some(low), Some(high)) = (self.policy, t.low, t.high) {
            let span = high - low;
            // Degenerate range: nothing meaningful to normalize against
            if span == 0.0 || !span.is_finite() {
                return Status::Normal;
            }
            let position = (value - low) / span;
            return if position >= CRITICAL_FRACTION {
                Status::Critical
            } else if position >= WARNING_FRACTION {
                Status::Warning
            } else {
                Status::Normal
            };
        }

        if t.high.is_some_and(|high| value > high) {
            Status::Critical
        } else if t.high_warn.is_some_and(|warn| value > warn) {
            Status::Warning
        } else {
            Status::Normal
        }
    }
}

fn classify_low_bad(value: f64, t: &Thresholds) -> Status {
    if t.low.is_some_and(|low| value < low) {
        Status::Critical
    } else if t.low_warn.is_some_and(|warn| value < warn) {
        Status::Warning
    } else {
        Status::Normal
    }
}
