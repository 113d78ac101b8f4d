//! Fan-out for the four inbound notifications a client listens for:
//! the three `*/list_changed` signals and `notifications/message` (server
//! logging). Each is a broadcast channel a caller can subscribe to any
//! number of times; a lagging subscriber only misses older signals, it
//! never blocks delivery to the others.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::broadcast;

use mcp_session::NotificationHandler;
use mcp_types::LoggingMessageNotification;

const CHANNEL_CAPACITY: usize = 64;

/// A `*/list_changed` notification carries no params; subscribers are only
/// told that *a* change happened; refreshing is a follow-up `list` call.
#[derive(Debug)]
pub struct ListChangedFeed {
    tx: broadcast::Sender<()>,
}

impl ListChangedFeed {
    pub(crate) fn new() -> Self {
        Self {
            tx: broadcast::channel(CHANNEL_CAPACITY).0,
        }
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    pub(crate) fn handler(self: &Arc<Self>) -> Arc<dyn NotificationHandler> {
        Arc::new(ListChangedHandler {
            tx: self.tx.clone(),
        })
    }
}

struct ListChangedHandler {
    tx: broadcast::Sender<()>,
}

#[async_trait]
impl NotificationHandler for ListChangedHandler {
    async fn handle(&self, _params: Option<Value>) {
        // No receivers is not an error: a client that never subscribed is
        // entitled to ignore the change entirely.
        let _ = self.tx.send(());
    }
}

/// `notifications/message`: server-originated log lines, already filtered
/// server-side to the level the client last requested via `setLevel`.
#[derive(Debug)]
pub struct LogFeed {
    tx: broadcast::Sender<LoggingMessageNotification>,
}

impl LogFeed {
    pub(crate) fn new() -> Self {
        Self {
            tx: broadcast::channel(CHANNEL_CAPACITY).0,
        }
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<LoggingMessageNotification> {
        self.tx.subscribe()
    }

    pub(crate) fn handler(self: &Arc<Self>) -> Arc<dyn NotificationHandler> {
        Arc::new(LogHandler {
            tx: self.tx.clone(),
        })
    }
}

struct LogHandler {
    tx: broadcast::Sender<LoggingMessageNotification>,
}

#[async_trait]
impl NotificationHandler for LogHandler {
    async fn handle(&self, params: Option<Value>) {
        let Some(params) = params else {
            tracing::warn!("notifications/message with no params, dropping");
            return;
        };
        match serde_json::from_value::<LoggingMessageNotification>(params) {
            Ok(note) => {
                let _ = self.tx.send(note);
            }
            Err(err) => tracing::warn!(%err, "dropping unparseable notifications/message"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn list_changed_feed_wakes_subscribers() {
        let feed = Arc::new(ListChangedFeed::new());
        let mut rx = feed.subscribe();
        let handler = feed.handler();
        handler.handle(None).await;
        rx.recv().await.unwrap();
    }

    #[tokio::test]
    async fn log_feed_delivers_parsed_notification() {
        let feed = Arc::new(LogFeed::new());
        let mut rx = feed.subscribe();
        let handler = feed.handler();
        handler
            .handle(Some(serde_json::json!({"level": "warning", "data": "uh oh"})))
            .await;
        let note = rx.recv().await.unwrap();
        assert_eq!(note.level, mcp_protocol::LoggingLevel::Warning);
    }

    #[tokio::test]
    async fn log_feed_drops_unparseable_notification_without_panicking() {
        let feed = Arc::new(LogFeed::new());
        let mut rx = feed.subscribe();
        let handler = feed.handler();
        handler.handle(Some(serde_json::json!({"bogus": true}))).await;
        assert!(rx.try_recv().is_err());
    }
}
