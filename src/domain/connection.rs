// Connection state tracker - reconciles transport liveness signals
use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ConnectionState {
    pub connected: bool,
}

/// Observations about transport liveness, as seen by the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LivenessSignal {
    Connected,
    Reconnecting,
    Message,
    Offline,
    Closed,
    Disconnected,
    Error,
    Poll,
}

impl LivenessSignal {
    fn is_disconnect(&self) -> bool {
        matches!(
            self,
            LivenessSignal::Offline
                | LivenessSignal::Closed
                | LivenessSignal::Disconnected
                | LivenessSignal::Error
        )
    }
}

/// Folds liveness signals into a single indicator.
///
/// Precedence within one tick, highest first:
/// 1. explicit connect
/// 2. application traffic while the transport reports connected
/// 3. disconnect-like events, ignored while the transport reports connected
/// 4. the periodic poll, which copies the transport's own flag
#[derive(Debug, Clone, Default)]
pub struct ConnectionTracker {
    connected: bool,
}

impl ConnectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ConnectionState {
        ConnectionState {
            connected: self.connected,
        }
    }

    /// Apply a single signal. Returns the new value when it changed.
    pub fn observe(&mut self, signal: LivenessSignal, transport_connected: bool) -> Option<bool> {
        self.reconcile(&[signal], transport_connected)
    }

    /// Apply every signal seen in one tick. Returns the new value when it changed.
    pub fn reconcile(
        &mut self,
        signals: &[LivenessSignal],
        transport_connected: bool,
    ) -> Option<bool> {
        let resolved = if signals.contains(&LivenessSignal::Connected) {
            Some(true)
        } else if transport_connected && signals.contains(&LivenessSignal::Message) {
            Some(true)
        } else if !transport_connected && signals.iter().any(LivenessSignal::is_disconnect) {
            Some(false)
        } else if signals.contains(&LivenessSignal::Poll) {
            Some(transport_connected)
        } else {
            None
        };

        match resolved {
            Some(next) if next != self.connected => {
                tracing::debug!(
                    ?signals,
                    transport_connected,
                    connected = next,
                    "Connection indicator changed"
                );
                self.connected = next;
                Some(next)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use LivenessSignal::*;

    #[test]
    fn test_message_heals_stale_offline() {
        let mut tracker = ConnectionTracker::new();
        tracker.observe(Offline, true);
        tracker.observe(Message, true);
        assert!(tracker.state().connected);
    }

    #[test]
    fn test_offline_then_message_after_real_outage() {
        let mut tracker = ConnectionTracker::new();
        assert_eq!(tracker.observe(Connected, true), Some(true));
        assert_eq!(tracker.observe(Offline, false), Some(false));
        assert_eq!(tracker.observe(Message, true), Some(true));
    }

    #[test]
    fn test_disconnect_ignored_while_transport_connected() {
        let mut tracker = ConnectionTracker::new();
        tracker.observe(Connected, true);
        assert_eq!(tracker.observe(Error, true), None);
        assert_eq!(tracker.observe(Closed, true), None);
        assert!(tracker.state().connected);
    }

    #[test]
    fn test_message_without_transport_does_not_connect() {
        let mut tracker = ConnectionTracker::new();
        assert_eq!(tracker.observe(Message, false), None);
        assert!(!tracker.state().connected);
    }

    #[test]
    fn test_reconnecting_is_observed_only() {
        let mut tracker = ConnectionTracker::new();
        tracker.observe(Connected, true);
        assert_eq!(tracker.observe(Reconnecting, false), None);
        assert!(tracker.state().connected);
    }

    #[test]
    fn test_poll_resyncs() {
        let mut tracker = ConnectionTracker::new();
        assert_eq!(tracker.observe(Poll, true), Some(true));
        assert_eq!(tracker.observe(Poll, true), None);
        assert_eq!(tracker.observe(Poll, false), Some(false));
    }

    #[test]
    fn test_precedence_within_tick() {
        let mut tracker = ConnectionTracker::new();
        assert_eq!(tracker.reconcile(&[Offline, Connected, Poll], false), Some(true));

        let mut tracker = ConnectionTracker::new();
        assert_eq!(tracker.reconcile(&[Disconnected, Message], true), Some(true));

        let mut tracker = ConnectionTracker::new();
        tracker.observe(Connected, true);
        assert_eq!(tracker.reconcile(&[Message, Offline, Poll], false), Some(false));
    }
}
