//! [`Exchange`]: the per-invocation handle §4.5 gives every handler —
//! the peer's declared capabilities, a way to issue a server-initiated
//! request (`roots/list`, `sampling/createMessage`), and a logger that
//! emits `notifications/message`.

use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::watch;

use mcp_protocol::{logging, roots, sampling, LoggingLevel, McpResult};
use mcp_session::Session;
use mcp_types::{
    ClientCapabilities, CreateMessageRequest, CreateMessageResult, ListRootsResult,
    LoggingMessageNotification, Root,
};

/// Handed to every tool/resource/prompt/completion handler invocation.
/// Cheap to clone — every field is a shared handle.
#[derive(Clone)]
pub struct Exchange {
    session: Arc<Session>,
    peer_capabilities: Option<ClientCapabilities>,
    logging_level: Arc<RwLock<LoggingLevel>>,
    terminating: watch::Receiver<bool>,
}

impl Exchange {
    pub(crate) fn new(
        session: Arc<Session>,
        peer_capabilities: Option<ClientCapabilities>,
        logging_level: Arc<RwLock<LoggingLevel>>,
        terminating: watch::Receiver<bool>,
    ) -> Self {
        Self {
            session,
            peer_capabilities,
            logging_level,
            terminating,
        }
    }

    /// The capabilities the peer declared during `initialize`, or `None` if
    /// a handler somehow runs before the handshake completed.
    #[must_use]
    pub fn peer_capabilities(&self) -> Option<&ClientCapabilities> {
        self.peer_capabilities.as_ref()
    }

    /// Whether the session this handler is running under has started
    /// closing. Long-running handlers should poll this (or race
    /// [`Exchange::cancelled`]) and wind down early rather than keep
    /// working against a session that's going away.
    #[must_use]
    pub fn is_terminating(&self) -> bool {
        *self.terminating.borrow()
    }

    /// Resolves once the session starts closing. Intended to be raced
    /// against a handler's own work via `tokio::select!`.
    pub async fn cancelled(&self) {
        let mut rx = self.terminating.clone();
        if *rx.borrow() {
            return;
        }
        let _ = rx.changed().await;
    }

    /// Ask the client for its exposed filesystem roots.
    ///
    /// # Errors
    /// Returns [`mcp_protocol::ErrorKind::CapabilityNotSupported`] if the
    /// peer never declared `roots`, or the peer's error/timeout otherwise.
    pub async fn list_roots(&self) -> McpResult<Vec<Root>> {
        let has_roots = self
            .peer_capabilities
            .as_ref()
            .is_some_and(|c| c.roots.is_some());
        let value = self
            .session
            .guarded_request(roots::LIST, None, None, has_roots)
            .await?;
        let result: ListRootsResult = serde_json::from_value(value)?;
        Ok(result.roots)
    }

    /// Delegate a sampling request to the client's local model.
    ///
    /// # Errors
    /// Returns [`mcp_protocol::ErrorKind::CapabilityNotSupported`] if the
    /// peer never declared `sampling`, or the peer's error/timeout otherwise.
    pub async fn create_message(
        &self,
        request: CreateMessageRequest,
    ) -> McpResult<CreateMessageResult> {
        let has_sampling = self
            .peer_capabilities
            .as_ref()
            .is_some_and(|c| c.sampling.is_some());
        let value = self
            .session
            .guarded_request(
                sampling::CREATE_MESSAGE,
                Some(serde_json::to_value(request)?),
                None,
                has_sampling,
            )
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Emit a `notifications/message` log line at `level`, if `level` meets
    /// or exceeds the minimum the peer last set via `logging/setLevel`
    /// (§6: "messages below the threshold are not emitted").
    ///
    /// # Errors
    /// Returns an error if the transport send fails; never fails because of
    /// the level filter (that path simply does nothing).
    pub async fn log(
        &self,
        level: LoggingLevel,
        logger: Option<String>,
        data: serde_json::Value,
    ) -> McpResult<()> {
        if level < *self.logging_level.read() {
            return Ok(());
        }
        let note = LoggingMessageNotification {
            level,
            logger,
            data,
        };
        self.session
            .notify(logging::MESSAGE, Some(serde_json::to_value(note)?))
            .await
    }
}

impl std::fmt::Debug for Exchange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Exchange")
            .field("peer_capabilities", &self.peer_capabilities)
            .finish()
    }
}

/// Builds a fresh [`Exchange`] snapshotting the peer's current capabilities
/// at call time. Cloned into every request-handler closure `McpServer`
/// registers so each inbound call gets its own handle without re-threading
/// the session/capabilities/logging-level triple through every dispatch
/// site by hand.
#[derive(Clone)]
pub(crate) struct ExchangeFactory {
    session: Arc<Session>,
    peer_capabilities: Arc<RwLock<Option<ClientCapabilities>>>,
    logging_level: Arc<RwLock<LoggingLevel>>,
}

impl ExchangeFactory {
    pub(crate) fn new(
        session: Arc<Session>,
        peer_capabilities: Arc<RwLock<Option<ClientCapabilities>>>,
        logging_level: Arc<RwLock<LoggingLevel>>,
    ) -> Self {
        Self {
            session,
            peer_capabilities,
            logging_level,
        }
    }

    pub(crate) fn make(&self) -> Exchange {
        Exchange::new(
            Arc::clone(&self.session),
            self.peer_capabilities.read().clone(),
            Arc::clone(&self.logging_level),
            self.session.termination_signal(),
        )
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::bare_exchange;
    use super::*;

    #[tokio::test]
    async fn list_roots_without_the_capability_is_refused_locally() {
        let exchange = bare_exchange();
        let err = exchange.list_roots().await.unwrap_err();
        assert_eq!(err.kind, mcp_protocol::ErrorKind::CapabilityNotSupported);
    }

    #[tokio::test]
    async fn log_below_threshold_is_a_silent_no_op() {
        let exchange = bare_exchange();
        // Debug is the lowest level, so this is never below threshold; set
        // the threshold above it to exercise the skip path.
        *exchange.logging_level.write() = LoggingLevel::Error;
        exchange
            .log(LoggingLevel::Debug, None, serde_json::json!("quiet"))
            .await
            .unwrap();
    }
}
