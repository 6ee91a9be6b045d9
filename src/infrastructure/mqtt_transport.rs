// MQTT transport - rumqttc client driven in a background task
use crate::application::transport::{SubscriptionError, Transport, TransportError, TransportEvent};
use async_trait::async_trait;
use rumqttc::{
    AsyncClient, ConnectReturnCode, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS,
    SubscribeFilter, SubscribeReasonCode,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, mpsc, watch};

const REQUEST_CAPACITY: usize = 10;

#[derive(Debug, Clone)]
pub struct MqttSettings {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    pub keep_alive: Duration,
    pub reconnect_delay: Duration,
    pub event_buffer: usize,
}

pub struct MqttTransport {
    client: AsyncClient,
    connected: Arc<AtomicBool>,
    patterns: Arc<Mutex<Vec<String>>>,
    stop: watch::Sender<bool>,
}

impl MqttTransport {
    /// Start the client. The connection is established by the background
    /// task; progress is reported on the returned event channel.
    pub fn connect(settings: &MqttSettings) -> (Self, mpsc::Receiver<TransportEvent>) {
        let mut options = MqttOptions::new(&settings.client_id, &settings.host, settings.port);
        options.set_keep_alive(settings.keep_alive);
        options.set_clean_session(true);

        let (client, eventloop) = AsyncClient::new(options, REQUEST_CAPACITY);
        let (events_tx, events_rx) = mpsc::channel(settings.event_buffer.max(1));
        let connected = Arc::new(AtomicBool::new(false));
        let patterns = Arc::new(Mutex::new(Vec::new()));
        let (stop, stop_rx) = watch::channel(false);

        tracing::info!(
            host = %settings.host,
            port = settings.port,
            client_id = %settings.client_id,
            "Connecting to MQTT broker"
        );

        let pump = EventPump {
            client: client.clone(),
            connected: connected.clone(),
            patterns: patterns.clone(),
            events: events_tx,
            reconnect_delay: settings.reconnect_delay,
            stop: stop_rx,
        };
        tokio::spawn(pump.run(eventloop));

        let transport = Self {
            client,
            connected,
            patterns,
            stop,
        };
        (transport, events_rx)
    }
}

#[async_trait]
impl Transport for MqttTransport {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn subscribe(&self, patterns: &[String]) -> Result<(), SubscriptionError> {
        {
            let mut known = self.patterns.lock().await;
            for pattern in patterns {
                if !known.contains(pattern) {
                    known.push(pattern.clone());
                }
            }
        }

        if !self.is_connected() {
            tracing::debug!(?patterns, "Subscription deferred until connected");
            return Ok(());
        }

        self.client
            .subscribe_many(filters(patterns))
            .await
            .map_err(|e| SubscriptionError::Request(e.to_string()))
    }

    /// Connected: the pump flushes a DISCONNECT and stops on its echo.
    /// Otherwise the pump stops at its next connection attempt or back-off.
    async fn close(&self) -> Result<(), TransportError> {
        self.stop.send_replace(true);
        if !self.is_connected() {
            return Ok(());
        }
        self.client
            .disconnect()
            .await
            .map_err(|e| TransportError::Client(e.to_string()))
    }
}

struct EventPump {
    client: AsyncClient,
    connected: Arc<AtomicBool>,
    patterns: Arc<Mutex<Vec<String>>>,
    events: mpsc::Sender<TransportEvent>,
    reconnect_delay: Duration,
    stop: watch::Receiver<bool>,
}

impl EventPump {
    async fn run(mut self, mut eventloop: EventLoop) {
        loop {
            let polled = tokio::select! {
                polled = eventloop.poll() => polled,
                _ = self.stop.changed(), if !self.connected.load(Ordering::SeqCst) => {
                    self.emit(TransportEvent::Closed).await;
                    break;
                }
            };
            match polled {
                Ok(event) => {
                    let Some(translated) = translate(&event) else {
                        continue;
                    };
                    match &translated {
                        TransportEvent::Connected => {
                            self.connected.store(true, Ordering::SeqCst);
                            self.resubscribe().await;
                        }
                        TransportEvent::Disconnected | TransportEvent::Closed => {
                            self.connected.store(false, Ordering::SeqCst);
                        }
                        _ => {}
                    }
                    let closed = translated == TransportEvent::Closed;
                    if !self.emit(translated).await || closed {
                        break;
                    }
                }
                Err(e) => {
                    self.connected.store(false, Ordering::SeqCst);
                    tracing::warn!(error = %e, "MQTT connection error");
                    let error = TransportEvent::Error(TransportError::Connection(e.to_string()));
                    if !self.emit(error).await || !self.emit(TransportEvent::Offline).await {
                        break;
                    }
                    tokio::select! {
                        _ = tokio::time::sleep(self.reconnect_delay) => {}
                        _ = self.stop.changed() => {
                            self.emit(TransportEvent::Closed).await;
                            break;
                        }
                    }
                    if !self.emit(TransportEvent::Reconnecting).await {
                        break;
                    }
                }
            }
        }
        tracing::debug!("MQTT event pump stopped");
    }

    async fn resubscribe(&self) {
        let patterns = self.patterns.lock().await.clone();
        if patterns.is_empty() {
            return;
        }
        // try_ variant: this task is the one draining the request queue
        if let Err(e) = self.client.try_subscribe_many(filters(&patterns)) {
            let error = SubscriptionError::Request(e.to_string());
            self.emit(TransportEvent::SubscriptionRejected(error)).await;
        }
    }

    /// False once the session has stopped listening.
    async fn emit(&self, event: TransportEvent) -> bool {
        self.events.send(event).await.is_ok()
    }
}

fn filters(patterns: &[String]) -> Vec<SubscribeFilter> {
    patterns
        .iter()
        .map(|p| SubscribeFilter::new(p.clone(), QoS::AtMostOnce))
        .collect()
}

/// Map a raw rumqttc event onto the session's vocabulary.
fn translate(event: &Event) -> Option<TransportEvent> {
    match event {
        Event::Incoming(Packet::ConnAck(ack)) => Some(if ack.code == ConnectReturnCode::Success {
            TransportEvent::Connected
        } else {
            TransportEvent::Error(TransportError::Refused(format!("{:?}", ack.code)))
        }),
        Event::Incoming(Packet::Publish(publish)) => Some(TransportEvent::Message {
            topic: publish.topic.clone(),
            payload: publish.payload.clone(),
        }),
        Event::Incoming(Packet::SubAck(ack)) => {
            let failures = ack
                .return_codes
                .iter()
                .filter(|code| matches!(code, SubscribeReasonCode::Failure))
                .count();
            (failures > 0).then(|| {
                TransportEvent::SubscriptionRejected(SubscriptionError::Rejected {
                    pkid: ack.pkid,
                    failures,
                })
            })
        }
        Event::Incoming(Packet::Disconnect) => Some(TransportEvent::Disconnected),
        Event::Outgoing(Outgoing::Disconnect) => Some(TransportEvent::Closed),
        _ => None,
    }
}
