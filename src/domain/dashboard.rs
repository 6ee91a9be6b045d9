// Dashboard state aggregate read by the rendering layer
use super::channel::ChannelId;
use super::connection::ConnectionState;
use super::history::History;
use super::reading_log::ReadingLog;
use super::telemetry::SensorReading;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Histories are shared with earlier snapshots until their channel changes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardState {
    pub readings: BTreeMap<ChannelId, SensorReading>,
    pub histories: BTreeMap<ChannelId, Arc<History>>,
    pub connection: ConnectionState,
    pub log: ReadingLog,
}

impl DashboardState {
    /// Zero readings and empty histories for every channel.
    pub fn new(
        channels: impl IntoIterator<Item = ChannelId>,
        window: usize,
        log_capacity: usize,
        started_at: DateTime<Utc>,
    ) -> Self {
        let mut readings = BTreeMap::new();
        let mut histories = BTreeMap::new();
        for channel in channels {
            readings.insert(channel, SensorReading::zero(started_at));
            histories.insert(channel, Arc::new(History::new(window)));
        }
        Self {
            readings,
            histories,
            connection: ConnectionState::default(),
            log: ReadingLog::new(log_capacity),
        }
    }

    pub fn reading(&self, channel: ChannelId) -> Option<&SensorReading> {
        self.readings.get(&channel)
    }

    pub fn history(&self, channel: ChannelId) -> Option<&History> {
        self.histories.get(&channel).map(Arc::as_ref)
    }

    pub fn is_connected(&self) -> bool {
        self.connection.connected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::classifier::Status;

    #[test]
    fn test_initial_state() {
        let now = Utc::now();
        let state = DashboardState::new([ChannelId::Temperature, ChannelId::Humidity], 20, 100, now);
        let reading = state.reading(ChannelId::Temperature).unwrap();
        assert_eq!(reading.value, 0.0);
        assert_eq!(reading.status, Status::Normal);
        assert!(state.history(ChannelId::Humidity).unwrap().is_empty());
        assert!(state.reading(ChannelId::FanDuty).is_none());
        assert!(!state.is_connected());
        assert!(state.log.is_empty());
    }
}
