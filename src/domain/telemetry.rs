// Telemetry data domain models
use super::channel::ChannelId;
use super::classifier::Status;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// One decoded observation, folded into state and then discarded.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measurement {
    pub channel: ChannelId,
    pub value: f64,
    pub observed_at: DateTime<Utc>,
}

impl Measurement {
    pub fn new(channel: ChannelId, value: f64, observed_at: DateTime<Utc>) -> Self {
        Self {
            channel,
            value,
            observed_at,
        }
    }
}

/// Latest value of a channel with its derived status.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SensorReading {
    pub value: f64,
    pub observed_at: DateTime<Utc>,
    pub status: Status,
}

impl SensorReading {
    pub fn new(value: f64, observed_at: DateTime<Utc>, status: Status) -> Self {
        Self {
            value,
            observed_at,
            status,
        }
    }

    pub fn zero(at: DateTime<Utc>) -> Self {
        Self::new(0.0, at, Status::Normal)
    }
}
