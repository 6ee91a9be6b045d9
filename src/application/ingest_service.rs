// Ingest service - folds transport events into the dashboard store
use crate::application::dashboard_store::DashboardStore;
use crate::application::decoder::decode;
use crate::application::transport::TransportEvent;
use crate::domain::connection::{ConnectionTracker, LivenessSignal};
use crate::domain::telemetry::Measurement;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;

/// Operator troubleshooting counters; published on their own channel, apart
/// from the dashboard snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Diagnostics {
    pub messages: u64,
    pub dropped: u64,
    pub unrouted: u64,
    pub last_topic: Option<String>,
    pub last_value: Option<f64>,
}

pub struct IngestService {
    store: DashboardStore,
    tracker: ConnectionTracker,
    diagnostics: watch::Sender<Diagnostics>,
}

impl IngestService {
    pub fn new(store: DashboardStore) -> Self {
        Self {
            store,
            tracker: ConnectionTracker::new(),
            diagnostics: watch::Sender::new(Diagnostics::default()),
        }
    }

    pub fn store(&self) -> &DashboardStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut DashboardStore {
        &mut self.store
    }

    pub fn diagnostics(&self) -> Diagnostics {
        self.diagnostics.borrow().clone()
    }

    /// Notified once per received message.
    pub fn subscribe_diagnostics(&self) -> watch::Receiver<Diagnostics> {
        self.diagnostics.subscribe()
    }

    pub fn handle_event(&mut self, event: TransportEvent, transport_connected: bool) {
        self.handle_event_at(event, transport_connected, Utc::now());
    }

    pub fn handle_event_at(
        &mut self,
        event: TransportEvent,
        transport_connected: bool,
        received_at: DateTime<Utc>,
    ) {
        let signal = match event {
            TransportEvent::Message { topic, payload } => {
                self.handle_message(&topic, &payload, transport_connected, received_at);
                return;
            }
            TransportEvent::SubscriptionRejected(e) => {
                tracing::warn!(error = %e, "Subscription rejected");
                return;
            }
            TransportEvent::Error(e) => {
                tracing::warn!(error = %e, transport_connected, "Transport error");
                LivenessSignal::Error
            }
            TransportEvent::Connected => LivenessSignal::Connected,
            TransportEvent::Reconnecting => LivenessSignal::Reconnecting,
            TransportEvent::Offline => LivenessSignal::Offline,
            TransportEvent::Closed => LivenessSignal::Closed,
            TransportEvent::Disconnected => LivenessSignal::Disconnected,
        };

        tracing::debug!(?signal, transport_connected, "Transport event");
        self.observe(signal, transport_connected);
    }

    /// Periodic liveness resync against the transport's own flag.
    pub fn poll(&mut self, transport_connected: bool) {
        self.observe(LivenessSignal::Poll, transport_connected);
    }

    fn observe(&mut self, signal: LivenessSignal, transport_connected: bool) {
        if let Some(connected) = self.tracker.observe(signal, transport_connected) {
            tracing::info!(connected, "Connection indicator updated");
            self.store.apply_connection_state(connected);
        }
    }

    fn handle_message(
        &mut self,
        topic: &str,
        payload: &[u8],
        transport_connected: bool,
        received_at: DateTime<Utc>,
    ) {
        let healed = self
            .tracker
            .observe(LivenessSignal::Message, transport_connected);

        let decoded = decode(payload);
        let channel = self.store.resolve(topic);
        self.diagnostics.send_modify(|d| {
            d.messages += 1;
            d.last_topic = Some(topic.to_string());
            match &decoded {
                Ok(decoded) => {
                    d.last_value = Some(decoded.value);
                    if channel.is_none() {
                        d.unrouted += 1;
                    }
                }
                Err(_) => d.dropped += 1,
            }
        });

        let measurement = match decoded {
            Ok(decoded) => match channel {
                Some(channel) => Some(Measurement::new(
                    channel,
                    decoded.value,
                    decoded.observed_at.unwrap_or(received_at),
                )),
                None => {
                    tracing::debug!(topic, "Ignoring message on unregistered channel");
                    None
                }
            },
            Err(e) => {
                tracing::warn!(
                    topic,
                    error = %e,
                    payload = %String::from_utf8_lossy(payload),
                    "Dropping message"
                );
                None
            }
        };

        if healed.is_none() && measurement.is_none() {
            return;
        }

        self.store.transaction(|tx| {
            if let Some(connected) = healed {
                tx.apply_connection_state(connected);
            }
            if let Some(measurement) = measurement {
                tx.apply_measurement(measurement);
            }
        });
    }
}
