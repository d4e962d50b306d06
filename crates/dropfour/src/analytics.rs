//! Best-effort analytics events.
//!
//! Each event is emitted once from a spawned task; a failing sink only
//! produces a warning.

use std::future::Future;

use dropfour_protocol::{Player, SessionId, SessionKind};
use serde::Serialize;
use tokio::sync::mpsc;

/// Errors an analytics sink may report.
#[derive(Debug, thiserror::Error)]
pub enum AnalyticsError {
    /// The event could not be serialized.
    #[error("serialize failed: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The downstream consumer is gone.
    #[error("analytics sink closed")]
    Closed,
}

/// Something worth counting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AnalyticsEvent {
    SessionStarted {
        session_id: SessionId,
        kind: SessionKind,
        players: Vec<String>,
    },
    MovePlayed {
        session_id: SessionId,
        player: String,
        column: usize,
        row: usize,
    },
    SessionFinished {
        session_id: SessionId,
        winner: Option<String>,
        duration_secs: u64,
        kind: SessionKind,
    },
    Forfeit {
        session_id: SessionId,
        player: Player,
    },
}

impl AnalyticsEvent {
    /// The `event` tag, e.g. `"move_played"`.
    pub fn name(&self) -> &'static str {
        match self {
            Self::SessionStarted { .. } => "session_started",
            Self::MovePlayed { .. } => "move_played",
            Self::SessionFinished { .. } => "session_finished",
            Self::Forfeit { .. } => "forfeit",
        }
    }

    pub fn session_id(&self) -> &SessionId {
        match self {
            Self::SessionStarted { session_id, .. }
            | Self::MovePlayed { session_id, .. }
            | Self::SessionFinished { session_id, .. }
            | Self::Forfeit { session_id, .. } => session_id,
        }
    }
}

/// Destination for analytics events.
pub trait AnalyticsSink: Send + Sync + 'static {
    fn emit(&self, event: AnalyticsEvent) -> impl Future<Output = Result<(), AnalyticsError>> + Send;
}

/// Writes one structured log line per event under the
/// `dropfour::analytics` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAnalytics;

impl AnalyticsSink for TracingAnalytics {
    async fn emit(&self, event: AnalyticsEvent) -> Result<(), AnalyticsError> {
        let payload = serde_json::to_string(&event)?;
        tracing::info!(
            target: "dropfour::analytics",
            event = event.name(),
            session_id = %event.session_id(),
            %payload
        );
        Ok(())
    }
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopAnalytics;

impl AnalyticsSink for NoopAnalytics {
    async fn emit(&self, _event: AnalyticsEvent) -> Result<(), AnalyticsError> {
        Ok(())
    }
}

/// Forwards events into a channel for some other task to ship.
#[derive(Debug, Clone)]
pub struct ChannelAnalytics {
    tx: mpsc::UnboundedSender<AnalyticsEvent>,
}

impl ChannelAnalytics {
    /// Creates the sink and the receiving end.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<AnalyticsEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl AnalyticsSink for ChannelAnalytics {
    async fn emit(&self, event: AnalyticsEvent) -> Result<(), AnalyticsError> {
        self.tx.send(event).map_err(|_| AnalyticsError::Closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn started() -> AnalyticsEvent {
        AnalyticsEvent::SessionStarted {
            session_id: SessionId::from("g1"),
            kind: SessionKind::Bot,
            players: vec!["alice".into(), "Bot".into()],
        }
    }

    #[test]
    fn test_event_json_is_tagged() {
        let json = serde_json::to_value(started()).unwrap();
        assert_eq!(json["event"], "session_started");
        assert_eq!(json["kind"], "bot");
        assert_eq!(json["session_id"], "g1");
    }

    #[test]
    fn test_name_matches_serde_tag() {
        let event = AnalyticsEvent::Forfeit {
            session_id: SessionId::from("g1"),
            player: Player::Two,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], event.name());
        assert_eq!(json["player"], 2);
    }

    #[tokio::test]
    async fn test_channel_analytics_forwards() {
        let (sink, mut rx) = ChannelAnalytics::channel();
        sink.emit(started()).await.unwrap();
        assert_eq!(rx.recv().await.unwrap(), started());
    }

    #[tokio::test]
    async fn test_channel_analytics_closed_errors() {
        let (sink, rx) = ChannelAnalytics::channel();
        drop(rx);
        assert!(matches!(sink.emit(started()).await, Err(AnalyticsError::Closed)));
    }

    #[tokio::test]
    async fn test_tracing_and_noop_accept_events() {
        TracingAnalytics.emit(started()).await.unwrap();
        NoopAnalytics.emit(started()).await.unwrap();
    }
}
