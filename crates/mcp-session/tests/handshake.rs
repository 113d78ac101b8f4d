//! Exercises the session state machine directly (no role façade) against
//! an in-process duplex transport, covering the literal scenarios this
//! crate is specified against: handshake, a routed call, an unknown
//! method, and deadline-driven cancellation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::{mpsc, Mutex};

use mcp_protocol::{lifecycle, Envelope, McpResult};
use mcp_session::{request_handler_fn, LifecyclePhase, Session, SessionConfig};
use mcp_transport::{Transport, TransportHandler};

/// An in-process pair of transports wired directly to one another, for
/// testing the session layer without a real wire.
struct DuplexTransport {
    tx: mpsc::UnboundedSender<Envelope>,
    rx: Mutex<Option<mpsc::UnboundedReceiver<Envelope>>>,
    closed: AtomicBool,
}

impl DuplexTransport {
    fn pair() -> (Arc<Self>, Arc<Self>) {
        let (tx_a, rx_a) = mpsc::unbounded_channel();
        let (tx_b, rx_b) = mpsc::unbounded_channel();
        let a = Arc::new(Self {
            tx: tx_a,
            rx: Mutex::new(Some(rx_b)),
            closed: AtomicBool::new(false),
        });
        let b = Arc::new(Self {
            tx: tx_b,
            rx: Mutex::new(Some(rx_a)),
            closed: AtomicBool::new(false),
        });
        (a, b)
    }
}

#[async_trait]
impl Transport for DuplexTransport {
    async fn connect(&self, handler: Arc<dyn TransportHandler>) -> McpResult<()> {
        let mut rx = self.rx.lock().await.take().expect("connect called twice");
        tokio::spawn(async move {
            while let Some(envelope) = rx.recv().await {
                let handler = Arc::clone(&handler);
                tokio::spawn(async move {
                    handler.on_envelope(envelope).await;
                });
            }
        });
        Ok(())
    }

    async fn send(&self, envelope: Envelope) -> McpResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(mcp_protocol::McpError::transport("transport closed"));
        }
        self.tx
            .send(envelope)
            .map_err(|_| mcp_protocol::McpError::transport("peer gone"))
    }

    async fn close(&self) -> McpResult<()> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}

async fn connected_pair() -> (Arc<Session>, Arc<Session>) {
    let (transport_a, transport_b) = DuplexTransport::pair();
    let client = Session::new(transport_a, SessionConfig::default());
    let server = Session::new(transport_b, SessionConfig::default());
    client.start().await.unwrap();
    server.start().await.unwrap();
    (client, server)
}

#[tokio::test]
async fn s1_handshake_reaches_ready_on_both_sides() {
    let (client, server) = connected_pair().await;

    server.register_request_handler(
        lifecycle::INITIALIZE,
        request_handler_fn(|_params| async {
            Ok(json!({
                "protocolVersion": "2024-11-05",
                "capabilities": {},
                "serverInfo": {"name": "s", "version": "0"},
            }))
        }),
    );
    server.register_notification_handler(
        lifecycle::INITIALIZED,
        mcp_session::notification_handler_fn(|_params| async {}),
    );

    let result = client
        .request(
            lifecycle::INITIALIZE,
            Some(json!({
                "protocolVersion": "2024-11-05",
                "capabilities": {},
                "clientInfo": {"name": "t", "version": "0"},
            })),
            Some(Duration::from_secs(1)),
        )
        .await
        .unwrap();
    assert_eq!(result["protocolVersion"], "2024-11-05");
    assert_eq!(result["serverInfo"]["name"], "s");

    client.set_phase(LifecyclePhase::Ready);
    client.notify(lifecycle::INITIALIZED, None).await.unwrap();
    // Give the server's dispatch task a beat to run the notification handler.
    tokio::time::sleep(Duration::from_millis(20)).await;
    server.set_phase(LifecyclePhase::Ready);

    assert!(client.phase().is_ready());
    assert!(server.phase().is_ready());
}

#[tokio::test]
async fn s2_tool_call_after_ready_round_trips() {
    let (client, server) = connected_pair().await;
    client.set_phase(LifecyclePhase::Ready);
    server.set_phase(LifecyclePhase::Ready);

    server.register_request_handler(
        "tools/call",
        request_handler_fn(|params| async move {
            let name = params.as_ref().and_then(|p| p["name"].as_str()).unwrap_or_default();
            Ok(json!({"content": [{"type": "text", "text": format!("echo:{name}")}], "isError": false}))
        }),
    );

    let result = client
        .request(
            "tools/call",
            Some(json!({"name": "echo", "arguments": {"text": "hi"}})),
            Some(Duration::from_secs(1)),
        )
        .await
        .unwrap();
    assert_eq!(result["content"][0]["text"], "echo:echo");
    assert_eq!(result["isError"], false);
}

#[tokio::test]
async fn s3_unknown_method_is_method_not_found() {
    let (client, server) = connected_pair().await;
    client.set_phase(LifecyclePhase::Ready);
    server.set_phase(LifecyclePhase::Ready);

    let err = client
        .request("bogus", None, Some(Duration::from_secs(1)))
        .await
        .unwrap_err();
    assert_eq!(err.kind, mcp_protocol::ErrorKind::MethodNotFound);
}

#[tokio::test]
async fn s4_deadline_elapses_into_timeout_and_late_response_is_dropped() {
    let (client, server) = connected_pair().await;
    client.set_phase(LifecyclePhase::Ready);
    server.set_phase(LifecyclePhase::Ready);

    // The server never answers "slow/method" at all (no handler registered,
    // but dispatch takes a moment), simulating a hung peer: the client's
    // own deadline is what fires here, independent of server behavior.
    let err = client
        .request("never/answers", None, Some(Duration::from_millis(50)))
        .await
        .unwrap_err();
    assert_eq!(err.kind, mcp_protocol::ErrorKind::Timeout);

    // The request id has been removed from the pending table; a late
    // response arriving after this point has nowhere to land. Deliver one
    // directly through the session's `TransportHandler` side (bypassing the
    // transport) and confirm it's merely logged and dropped rather than
    // panicking or resolving a (nonexistent) waiter.
    let late = Envelope::success(mcp_protocol::RequestId::Number(1), json!({"late": true}));
    <Session as TransportHandler>::on_envelope(&client, late).await;
}

#[tokio::test]
async fn close_fails_pending_requests_with_session_closed() {
    let (client, _server) = connected_pair().await;

    let client_for_close = Arc::clone(&client);
    let pending = tokio::spawn(async move {
        client_for_close
            .request("roots/list", None, None)
            .await
    });

    tokio::time::sleep(Duration::from_millis(20)).await;
    client.close().await.unwrap();

    let err = pending.await.unwrap().unwrap_err();
    assert_eq!(err.kind, mcp_protocol::ErrorKind::SessionClosed);
}
