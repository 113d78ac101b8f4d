//! The core transport abstraction.

use async_trait::async_trait;
use mcp_protocol::{Envelope, McpResult};

/// Receives envelopes pushed by a [`Transport`] as they arrive, and is
/// notified when the peer closes the connection.
///
/// Implementations must not block for long inside `on_envelope` — a
/// transport's read loop waits for it to return before reading the next
/// frame off the wire (ordering is preserved per originator), so slow
/// handling here delays delivery of subsequent envelopes. Spawn work that
/// can run concurrently rather than awaiting it inline.
#[async_trait]
pub trait TransportHandler: Send + Sync {
    /// Called once per inbound envelope, in the order it was received.
    async fn on_envelope(&self, envelope: Envelope);

    /// Called once when the transport observes the connection close, either
    /// because the peer closed it or because of an unrecoverable I/O error.
    async fn on_closed(&self);
}

/// A bidirectional channel that carries [`Envelope`]s to and from a peer.
///
/// `connect` is push-based: once connected, every inbound envelope is
/// delivered to `handler` without the caller polling for it. This mirrors
/// how both concrete transports actually receive data — stdio's reader
/// task and SSE's event stream are both driven independently of anything
/// a caller does — so the trait doesn't pretend otherwise.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Establish the connection and begin delivering inbound envelopes to
    /// `handler`. Returns once the connection is established; delivery
    /// continues on a background task for the lifetime of the transport.
    ///
    /// # Errors
    /// Returns an error if the connection cannot be established.
    async fn connect(&self, handler: std::sync::Arc<dyn TransportHandler>) -> McpResult<()>;

    /// Send a single envelope. Transports serialize concurrent calls to
    /// this method so that two envelopes sent by different callers are
    /// never interleaved on the wire.
    ///
    /// # Errors
    /// Returns an error if the envelope cannot be serialized or the
    /// underlying connection has failed.
    async fn send(&self, envelope: Envelope) -> McpResult<()>;

    /// Close the connection. Idempotent — closing an already-closed
    /// transport is not an error.
    ///
    /// # Errors
    /// Returns an error if the underlying resource could not be released
    /// cleanly; the transport is considered closed regardless.
    async fn close(&self) -> McpResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn _object_safe(_t: &dyn Transport) {}
    fn _handler_object_safe(_h: &dyn TransportHandler) {}
}
