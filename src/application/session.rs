// Session controller - the single event loop that owns the dashboard state
use crate::application::dashboard_store::DashboardStore;
use crate::application::ingest_service::{Diagnostics, IngestService};
use crate::application::transport::{Transport, TransportEvent};
use crate::domain::channel::{ChannelId, RangeError};
use crate::domain::dashboard::DashboardState;
use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::MissedTickBehavior;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub subscriptions: Vec<String>,
    pub poll_interval: Duration,
}

#[derive(Debug)]
pub enum SessionCommand {
    SetRange {
        channel: ChannelId,
        min: f64,
        max: f64,
        reply: oneshot::Sender<Result<(), RangeError>>,
    },
    Shutdown,
}

/// Cloneable handle for readers and operator input.
#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<SessionCommand>,
    snapshots: watch::Receiver<Arc<DashboardState>>,
    diagnostics: watch::Receiver<Diagnostics>,
}

impl SessionHandle {
    pub fn snapshots(&self) -> watch::Receiver<Arc<DashboardState>> {
        self.snapshots.clone()
    }

    /// Live ingest counters for troubleshooting.
    pub fn diagnostics(&self) -> watch::Receiver<Diagnostics> {
        self.diagnostics.clone()
    }

    /// Operator edit of a channel's min/max bounds.
    pub async fn set_range(&self, channel: ChannelId, min: f64, max: f64) -> anyhow::Result<()> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(SessionCommand::SetRange {
                channel,
                min,
                max,
                reply,
            })
            .await
            .context("session is not running")?;
        response.await.context("session stopped before replying")??;
        Ok(())
    }

    pub async fn shutdown(&self) {
        // A closed channel means the session already ended
        let _ = self.commands.send(SessionCommand::Shutdown).await;
    }
}

pub struct DashboardSession {
    transport: Arc<dyn Transport>,
    events: mpsc::Receiver<TransportEvent>,
    commands: mpsc::Receiver<SessionCommand>,
    ingest: IngestService,
    settings: SessionSettings,
}

impl DashboardSession {
    pub fn new(
        transport: Arc<dyn Transport>,
        events: mpsc::Receiver<TransportEvent>,
        store: DashboardStore,
        settings: SessionSettings,
    ) -> (Self, SessionHandle) {
        let (commands_tx, commands) = mpsc::channel(16);
        let snapshots = store.subscribe();
        let ingest = IngestService::new(store);
        let handle = SessionHandle {
            commands: commands_tx,
            snapshots,
            diagnostics: ingest.subscribe_diagnostics(),
        };
        let session = Self {
            transport,
            events,
            commands,
            ingest,
            settings,
        };
        (session, handle)
    }

    /// Runs until shutdown is requested, every handle is dropped, or the
    /// transport event stream ends. Closes the transport on the way out.
    pub async fn run(mut self) -> Diagnostics {
        if let Err(e) = self.transport.subscribe(&self.settings.subscriptions).await {
            tracing::warn!(error = %e, "Subscription request failed");
        }

        let mut liveness = tokio::time::interval(self.settings.poll_interval);
        liveness.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(SessionCommand::SetRange { channel, min, max, reply }) => {
                        let result = self.ingest.store_mut().set_range(channel, min, max);
                        if let Err(e) = &result {
                            tracing::warn!(%channel, error = %e, "Rejected range update");
                        }
                        let _ = reply.send(result);
                    }
                    Some(SessionCommand::Shutdown) | None => {
                        tracing::info!("Session shutdown requested");
                        break;
                    }
                },
                _ = liveness.tick() => {
                    let connected = self.transport.is_connected();
                    self.ingest.poll(connected);
                }
                event = self.events.recv() => match event {
                    Some(event) => {
                        let connected = self.transport.is_connected();
                        self.ingest.handle_event(event, connected);
                    }
                    None => {
                        tracing::info!("Transport event stream ended");
                        break;
                    }
                },
            }
        }

        if let Err(e) = self.transport.close().await {
            tracing::warn!(error = %e, "Failed to close transport");
        }

        let diagnostics = self.ingest.diagnostics();
        tracing::info!(
            messages = diagnostics.messages,
            dropped = diagnostics.dropped,
            unrouted = diagnostics.unrouted,
            "Session ended"
        );
        diagnostics
    }
}
