// Transport boundary - pub/sub client trait and the events it delivers
use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    Connection(String),
    #[error("broker refused connection: {0}")]
    Refused(String),
    #[error("client request failed: {0}")]
    Client(String),
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum SubscriptionError {
    #[error("broker rejected {failures} filter(s) in subscribe request {pkid}")]
    Rejected { pkid: u16, failures: usize },
    #[error("subscription request failed: {0}")]
    Request(String),
}

/// Everything the session can observe from the transport.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    Connected,
    Reconnecting,
    Offline,
    Closed,
    Disconnected,
    Error(TransportError),
    SubscriptionRejected(SubscriptionError),
    Message { topic: String, payload: Bytes },
}

impl TransportEvent {
    pub fn message(topic: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        TransportEvent::Message {
            topic: topic.into(),
            payload: payload.into(),
        }
    }
}

/// Control surface of a connected pub/sub client.
///
/// Events are delivered separately over a channel so the session loop can
/// select over them alongside its own timers.
#[async_trait]
pub trait Transport: Send + Sync {
    /// The transport's own view of whether the link is up.
    fn is_connected(&self) -> bool;

    /// Subscribe to channel patterns; re-applied by the transport after reconnects.
    async fn subscribe(&self, patterns: &[String]) -> Result<(), SubscriptionError>;

    async fn close(&self) -> Result<(), TransportError>;
}
