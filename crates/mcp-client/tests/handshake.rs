//! Drives a [`Client`] against a bare [`Session`] standing in for the
//! server side, over an in-process duplex transport. Covers initialize
//! (S1), a routed tool call (S2), list_changed fan-out (S6), and the
//! client answering a server-initiated `roots/list` (§4.4).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::{mpsc, Mutex};

use mcp_client::{Client, ClientBuilder, RootsProvider};
use mcp_protocol::{lifecycle, tools, Envelope, McpResult};
use mcp_session::{request_handler_fn, LifecyclePhase, Session, SessionConfig};
use mcp_transport::{Transport, TransportHandler};
use mcp_types::Root;

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

/// A stub server: a bare `Session` with just the handlers a given test
/// needs, playing the role a real `mcp-server` would.
fn stub_server(transport: Arc<dyn Transport>) -> Arc<Session> {
    let server = Session::new(transport, SessionConfig::default());
    server.register_request_handler(
        lifecycle::INITIALIZE,
        request_handler_fn(|_params| async {
            Ok(json!({
                "protocolVersion": "2024-11-05",
                "capabilities": {},
                "serverInfo": {"name": "stub-server", "version": "0"},
            }))
        }),
    );
    server.register_notification_handler(
        lifecycle::INITIALIZED,
        mcp_session::notification_handler_fn(|_params| async {}),
    );
    server
}

async fn connected_client_and_server() -> (Arc<Client>, Arc<Session>) {
    let (client_transport, server_transport) = DuplexTransport::pair();
    let server = stub_server(server_transport);
    server.start().await.unwrap();

    let client = ClientBuilder::new("test-client", "0.1.0").build(client_transport);
    (client, server)
}

#[tokio::test]
async fn initialize_reaches_ready_and_records_peer_info() {
    let (client, server) = connected_client_and_server().await;

    let result = client.initialize().await.unwrap();
    assert_eq!(result.server_info.name, "stub-server");

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(server.phase().is_ready());

    let (_, server_info) = client.peer().expect("peer recorded after initialize");
    assert_eq!(server_info.name, "stub-server");
}

#[tokio::test]
async fn list_tools_round_trips_through_the_session() {
    let (client, server) = connected_client_and_server().await;
    client.initialize().await.unwrap();

    server.register_request_handler(
        tools::LIST,
        request_handler_fn(|_params| async {
            Ok(json!({
                "tools": [{"name": "echo", "inputSchema": {"type": "object"}}],
            }))
        }),
    );

    let result = client.list_tools(None).await.unwrap();
    assert_eq!(result.tools.len(), 1);
    assert_eq!(result.tools[0].name, "echo");
}

#[tokio::test]
async fn tools_list_changed_notification_wakes_the_subscriber() {
    let (client, server) = connected_client_and_server().await;
    client.initialize().await.unwrap();

    let mut changed = client.tools_changed();
    server.notify(tools::LIST_CHANGED, None).await.unwrap();

    tokio::time::timeout(Duration::from_secs(1), changed.recv())
        .await
        .expect("notification delivered before timeout")
        .unwrap();
}

#[tokio::test]
async fn server_initiated_roots_list_is_answered_by_the_provider() {
    struct FixedRoots;
    #[async_trait]
    impl RootsProvider for FixedRoots {
        async fn list_roots(&self) -> Vec<Root> {
            vec![Root {
                uri: "file:///tmp/project".to_string(),
                name: Some("project".to_string()),
            }]
        }
    }

    let (client_transport, server_transport) = DuplexTransport::pair();
    let server = stub_server(server_transport);
    server.start().await.unwrap();

    let client = ClientBuilder::new("test-client", "0.1.0")
        .with_roots(false, Arc::new(FixedRoots))
        .build(client_transport);
    client.initialize().await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    server.set_phase(LifecyclePhase::Ready);

    let result = server
        .request("roots/list", None, Some(Duration::from_secs(1)))
        .await
        .unwrap();
    assert_eq!(result["roots"][0]["uri"], "file:///tmp/project");
}
