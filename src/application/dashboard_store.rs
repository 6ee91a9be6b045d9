// Dashboard state store - single owner of derived state, publishes snapshots
use crate::domain::channel::{ChannelId, ChannelRegistry, RangeError};
use crate::domain::classifier::Classifier;
use crate::domain::dashboard::DashboardState;
use crate::domain::telemetry::{Measurement, SensorReading};
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::watch;

pub struct DashboardStore {
    registry: ChannelRegistry,
    classifier: Classifier,
    state: DashboardState,
    snapshots: watch::Sender<Arc<DashboardState>>,
}

/// Writes staged against the store; published as one snapshot when the
/// enclosing `transaction` returns.
pub struct Transaction<'a> {
    registry: &'a ChannelRegistry,
    classifier: Classifier,
    state: &'a mut DashboardState,
    dirty: bool,
}

impl Transaction<'_> {
    /// Returns false when the channel is not registered.
    pub fn apply_measurement(&mut self, measurement: Measurement) -> bool {
        let Some(config) = self.registry.config(measurement.channel) else {
            return false;
        };
        let status = self.classifier.classify(measurement.value, config);
        let channel = measurement.channel;

        self.state.readings.insert(
            channel,
            SensorReading::new(measurement.value, measurement.observed_at, status),
        );
        let history = self.state.histories.entry(channel).or_default();
        Arc::make_mut(history).append(measurement.value, measurement.observed_at);
        self.state
            .log
            .record(channel, measurement.value, status, measurement.observed_at);

        tracing::trace!(%channel, value = measurement.value, ?status, "Applied measurement");
        self.dirty = true;
        true
    }

    pub fn apply_connection_state(&mut self, connected: bool) {
        if self.state.connection.connected != connected {
            self.state.connection.connected = connected;
            self.dirty = true;
        }
    }
}

impl DashboardStore {
    pub fn new(
        registry: ChannelRegistry,
        classifier: Classifier,
        window: usize,
        log_capacity: usize,
    ) -> Self {
        let state = DashboardState::new(registry.channels(), window, log_capacity, Utc::now());
        let (snapshots, _) = watch::channel(Arc::new(state.clone()));
        Self {
            registry,
            classifier,
            state,
            snapshots,
        }
    }

    /// Read-only view for renderers; notified once per committed change.
    pub fn subscribe(&self) -> watch::Receiver<Arc<DashboardState>> {
        self.snapshots.subscribe()
    }

    pub fn snapshot(&self) -> Arc<DashboardState> {
        self.snapshots.borrow().clone()
    }

    pub fn resolve(&self, topic: &str) -> Option<ChannelId> {
        self.registry.resolve(topic)
    }

    pub fn transaction<R>(&mut self, apply: impl FnOnce(&mut Transaction<'_>) -> R) -> R {
        let mut tx = Transaction {
            registry: &self.registry,
            classifier: self.classifier,
            state: &mut self.state,
            dirty: false,
        };
        let result = apply(&mut tx);
        let dirty = tx.dirty;
        if dirty {
            self.publish();
        }
        result
    }

    pub fn apply_measurement(&mut self, measurement: Measurement) -> bool {
        self.transaction(|tx| tx.apply_measurement(measurement))
    }

    pub fn apply_connection_state(&mut self, connected: bool) {
        self.transaction(|tx| tx.apply_connection_state(connected))
    }

    /// Update a channel's min/max and re-derive its current status.
    pub fn set_range(&mut self, channel: ChannelId, min: f64, max: f64) -> Result<(), RangeError> {
        self.registry.set_range(channel, min, max)?;
        tracing::info!(%channel, min, max, "Range updated");

        if let (Some(config), Some(reading)) = (
            self.registry.config(channel),
            self.state.readings.get_mut(&channel),
        ) {
            let status = self.classifier.classify(reading.value, config);
            if status != reading.status {
                reading.status = status;
                self.publish();
            }
        }
        Ok(())
    }

    /// Shallow for histories and the sealed part of the log.
    fn publish(&self) {
        self.snapshots.send_replace(Arc::new(self.state.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::classifier::{Status, ThresholdPolicy};
    use chrono::{DateTime, TimeZone};

    fn store() -> DashboardStore {
        DashboardStore::new(
            ChannelRegistry::with_defaults(vec!["pmcd".to_string()]),
            Classifier::new(ThresholdPolicy::Normalized),
            20,
            100,
        )
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_714_564_800 + secs, 0).unwrap()
    }

    #[test]
    fn test_measurement_updates_only_its_channel() {
        let mut store = store();
        let before = store.snapshot();

        assert!(store.apply_measurement(Measurement::new(ChannelId::Temperature, 23.4, at(1))));

        let after = store.snapshot();
        let reading = after.reading(ChannelId::Temperature).unwrap();
        assert_eq!(reading.value, 23.4);
        assert_eq!(reading.observed_at, at(1));
        assert_eq!(reading.status, Status::Normal);
        assert_eq!(
            after.history(ChannelId::Temperature).unwrap().values().collect::<Vec<_>>(),
            vec![23.4]
        );

        for channel in ChannelId::ALL.into_iter().filter(|c| *c != ChannelId::Temperature) {
            assert_eq!(after.reading(channel), before.reading(channel));
            assert_eq!(after.history(channel), before.history(channel));
        }
    }

    #[test]
    fn test_status_follows_thresholds() {
        let mut store = store();
        store.apply_measurement(Measurement::new(ChannelId::Humidity, 15.0, at(1)));
        store.apply_measurement(Measurement::new(ChannelId::AbsolutePressure3, 170_000.0, at(1)));

        let snapshot = store.snapshot();
        assert_eq!(snapshot.reading(ChannelId::Humidity).unwrap().status, Status::Critical);
        assert_eq!(
            snapshot.reading(ChannelId::AbsolutePressure3).unwrap().status,
            Status::Warning
        );
        assert_eq!(snapshot.log.len(), 2);
    }

    #[test]
    fn test_unregistered_channel_is_noop() {
        let mut store = DashboardStore::new(
            ChannelRegistry::new(
                vec![],
                [crate::domain::channel::ChannelConfig::default_for(ChannelId::Temperature)],
            ),
            Classifier::default(),
            20,
            100,
        );
        let mut rx = store.subscribe();
        rx.borrow_and_update();
        let before = store.snapshot();

        assert!(!store.apply_measurement(Measurement::new(ChannelId::FanDuty, 40.0, at(1))));

        assert_eq!(*store.snapshot(), *before);
        assert!(!rx.has_changed().unwrap());
    }

    #[test]
    fn test_transaction_publishes_once() {
        let mut store = store();
        let mut rx = store.subscribe();
        rx.borrow_and_update();
        let observer = rx.clone();

        store.transaction(|tx| {
            tx.apply_connection_state(true);
            assert!(!observer.has_changed().unwrap());
            tx.apply_measurement(Measurement::new(ChannelId::Temperature, 21.0, at(2)));
            assert!(!observer.has_changed().unwrap());
        });

        assert!(rx.has_changed().unwrap());
        let snapshot = rx.borrow_and_update().clone();
        assert!(snapshot.is_connected());
        assert_eq!(snapshot.reading(ChannelId::Temperature).unwrap().value, 21.0);
        assert!(!rx.has_changed().unwrap());
    }

    #[test]
    fn test_connection_state_unchanged_does_not_publish() {
        let mut store = store();
        let mut rx = store.subscribe();
        rx.borrow_and_update();
        store.apply_connection_state(false);
        assert!(!rx.has_changed().unwrap());
        store.apply_connection_state(true);
        assert!(rx.has_changed().unwrap());
    }

    #[test]
    fn test_set_range_reclassifies_latest_reading() {
        let mut store = store();
        store.apply_measurement(Measurement::new(ChannelId::AbsolutePressure1, 1_000.0, at(1)));
        assert_eq!(
            store.snapshot().reading(ChannelId::AbsolutePressure1).unwrap().status,
            Status::Normal
        );

        store.set_range(ChannelId::AbsolutePressure1, 0.0, 1_050.0).unwrap();
        assert_eq!(
            store.snapshot().reading(ChannelId::AbsolutePressure1).unwrap().status,
            Status::Critical
        );

        assert!(store.set_range(ChannelId::AbsolutePressure1, 5.0, 1.0).is_err());
    }

    #[test]
    fn test_publish_shares_untouched_histories() {
        let mut store = store();
        store.apply_measurement(Measurement::new(ChannelId::Temperature, 20.0, at(1)));
        let first = store.snapshot();

        store.apply_measurement(Measurement::new(ChannelId::Humidity, 40.0, at(2)));
        let second = store.snapshot();

        assert!(Arc::ptr_eq(
            &first.histories[&ChannelId::Temperature],
            &second.histories[&ChannelId::Temperature]
        ));
        assert!(!Arc::ptr_eq(
            &first.histories[&ChannelId::Humidity],
            &second.histories[&ChannelId::Humidity]
        ));
        assert!(first.history(ChannelId::Humidity).unwrap().is_empty());
        assert_eq!(second.history(ChannelId::Humidity).unwrap().len(), 1);
    }
}
