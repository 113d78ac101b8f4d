//! The session: correlates outbound requests with inbound responses,
//! dispatches inbound requests/notifications to registered handlers, and
//! enforces the lifecycle (§4.3 of the protocol this crate implements).

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::{oneshot, watch};

use mcp_protocol::{cancellation, Envelope, JsonRpcError, McpError, McpResult, RequestId, ResponsePayload};
use mcp_transport::{Transport, TransportHandler};

use crate::handlers::{NotificationHandler, RequestHandler};
use crate::lifecycle::LifecyclePhase;

/// Construction-time session knobs.
#[derive(Debug, Clone, Default)]
pub struct SessionConfig {
    /// Applied to `request` calls that don't specify their own deadline.
    /// `None` means no default timeout.
    pub default_request_timeout: Option<Duration>,
}

type PendingSlot = oneshot::Sender<Result<Value, McpError>>;

/// The protocol session. One instance per connection; shared by both the
/// caller-facing `request`/`notify` API and the transport's inbound path
/// (via its [`TransportHandler`] implementation).
pub struct Session {
    transport: Arc<dyn Transport>,
    config: SessionConfig,

    next_id: AtomicI64,
    pending: DashMap<RequestId, PendingSlot>,

    request_handlers: DashMap<String, Arc<dyn RequestHandler>>,
    notification_handlers: DashMap<String, Vec<Arc<dyn NotificationHandler>>>,

    phase: RwLock<LifecyclePhase>,
    peer_capabilities: RwLock<Option<Value>>,

    /// Flipped to `true` by [`Session::close`]. In-flight inbound handlers
    /// hold a receiver (via `termination_signal`) so they can tell when the
    /// session they're running under is terminating.
    terminating: watch::Sender<bool>,

    /// Lets the `&self`-bound [`TransportHandler`] callbacks recover an
    /// owned `Arc<Session>` to spawn dispatch tasks that outlive the call.
    weak_self: Weak<Session>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("phase", &*self.phase.read())
            .field("pending", &self.pending.len())
            .finish()
    }
}

impl Session {
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>, config: SessionConfig) -> Arc<Self> {
        let (terminating, _) = watch::channel(false);
        Arc::new_cyclic(|weak_self| Self {
            transport,
            config,
            next_id: AtomicI64::new(1),
            pending: DashMap::new(),
            request_handlers: DashMap::new(),
            notification_handlers: DashMap::new(),
            phase: RwLock::new(LifecyclePhase::Created),
            peer_capabilities: RwLock::new(None),
            terminating,
            weak_self: weak_self.clone(),
        })
    }

    /// A receiver that flips to `true` once this session starts closing.
    /// In-flight inbound handlers (via their `Exchange`) use this to notice
    /// the session terminating out from under them.
    #[must_use]
    pub fn termination_signal(&self) -> watch::Receiver<bool> {
        self.terminating.subscribe()
    }

    /// Convert a previously-parsed JSON value into a typed result.
    ///
    /// # Errors
    /// Returns an error if `value` doesn't deserialize into `T`.
    pub fn decode<T: DeserializeOwned>(&self, value: Value) -> McpResult<T> {
        serde_json::from_value(value).map_err(McpError::from)
    }

    /// Bind a request handler. Handler registry entries are meant to be
    /// configured before [`Session::start`]; registering after is not
    /// forbidden but races with dispatch.
    pub fn register_request_handler(&self, method: impl Into<String>, handler: Arc<dyn RequestHandler>) {
        self.request_handlers.insert(method.into(), handler);
    }

    /// Bind an additional notification handler for `method`. Multiple
    /// handlers for the same method all run, concurrently, on every
    /// matching inbound notification.
    pub fn register_notification_handler(&self, method: impl Into<String>, handler: Arc<dyn NotificationHandler>) {
        self.notification_handlers.entry(method.into()).or_default().push(handler);
    }

    /// Current lifecycle phase.
    #[must_use]
    pub fn phase(&self) -> LifecyclePhase {
        *self.phase.read()
    }

    /// Force a phase transition. Exposed for the client/server role
    /// façades, which drive the `Initializing -> Ready` half of the state
    /// machine differently from one another (§4.3.3).
    pub fn set_phase(&self, phase: LifecyclePhase) {
        *self.phase.write() = phase;
    }

    /// The peer's `capabilities` object as recorded at `initialize`, kept
    /// as a raw `Value` because only the role façade knows how to
    /// interpret client vs. server capability shapes.
    #[must_use]
    pub fn peer_capabilities(&self) -> Option<Value> {
        self.peer_capabilities.read().clone()
    }

    pub fn set_peer_capabilities(&self, capabilities: Value) {
        *self.peer_capabilities.write() = Some(capabilities);
    }

    /// Connect the underlying transport, using this session as the inbound
    /// handler. Transitions `Created -> Initializing`.
    ///
    /// # Errors
    /// Returns an error if the transport fails to connect.
    pub async fn start(self: &Arc<Self>) -> McpResult<()> {
        self.set_phase(LifecyclePhase::Initializing);
        let handler: Arc<dyn TransportHandler> = Arc::clone(self) as Arc<dyn TransportHandler>;
        self.transport.connect(handler).await
    }

    fn next_request_id(&self) -> RequestId {
        RequestId::Number(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Send a request and await its response, subject to `deadline` (falling
    /// back to [`SessionConfig::default_request_timeout`] if `None`).
    ///
    /// # Errors
    /// Returns the peer's error response, [`McpError::timeout`] if the
    /// deadline elapses (also emitting `notifications/cancelled`), or
    /// [`McpError::session_closed`] if the session closes first.
    pub async fn request(&self, method: &str, params: Option<Value>, deadline: Option<Duration>) -> McpResult<Value> {
        if self.phase().is_terminal() {
            return Err(McpError::session_closed());
        }

        let id = self.next_request_id();
        let (tx, rx) = oneshot::channel();
        let previous = self.pending.insert(id.clone(), tx);
        debug_assert!(previous.is_none(), "request id {id} reused within session");

        let envelope = Envelope::request(id.clone(), method, params);
        if let Err(err) = self.transport.send(envelope).await {
            self.pending.remove(&id);
            return Err(err);
        }

        let deadline = deadline.or(self.config.default_request_timeout);
        let resolved = match deadline {
            Some(d) => match tokio::time::timeout(d, rx).await {
                Ok(Ok(payload)) => payload,
                Ok(Err(_)) => Err(McpError::session_closed()),
                Err(_elapsed) => {
                    self.pending.remove(&id);
                    tracing::debug!(%id, method, "request deadline elapsed, sending cancellation");
                    let _ = self
                        .notify(cancellation::CANCELLED, Some(serde_json::json!({"requestId": id})))
                        .await;
                    return Err(McpError::timeout());
                }
            },
            None => match rx.await {
                Ok(payload) => payload,
                Err(_) => Err(McpError::session_closed()),
            },
        };

        resolved
    }

    /// Fire a notification. Completes once the transport flush completes;
    /// never produces a response.
    ///
    /// # Errors
    /// Returns an error if the transport send fails.
    pub async fn notify(&self, method: &str, params: Option<Value>) -> McpResult<()> {
        self.transport.send(Envelope::notification(method, params)).await
    }

    /// As [`Session::request`], but refuses locally (before sending) when
    /// `capability_present` is `false`. Role façades compute
    /// `capability_present` from their own typed capability structures.
    ///
    /// # Errors
    /// Returns [`McpError::capability_not_supported`] without sending
    /// anything if `capability_present` is `false`; otherwise as
    /// [`Session::request`].
    pub async fn guarded_request(
        &self,
        method: &str,
        params: Option<Value>,
        deadline: Option<Duration>,
        capability_present: bool,
    ) -> McpResult<Value> {
        if !capability_present {
            return Err(McpError::capability_not_supported(method));
        }
        self.request(method, params, deadline).await
    }

    /// Transition to `Closing`, fail every pending request with
    /// [`McpError::session_closed`], signal every in-flight inbound handler
    /// via [`Session::termination_signal`] that the session is terminating,
    /// close the transport, transition to `Closed`.
    ///
    /// # Errors
    /// Returns an error if the underlying transport could not be closed
    /// cleanly; the session is considered closed regardless.
    pub async fn close(&self) -> McpResult<()> {
        self.fail_all_pending();
        let _ = self.terminating.send(true);
        self.set_phase(LifecyclePhase::Closing);
        let result = self.transport.close().await;
        self.set_phase(LifecyclePhase::Closed);
        result
    }

    fn fail_all_pending(&self) {
        let ids: Vec<RequestId> = self.pending.iter().map(|entry| entry.key().clone()).collect();
        for id in ids {
            if let Some((_, tx)) = self.pending.remove(&id) {
                let _ = tx.send(Err(McpError::session_closed()));
            }
        }
    }

    fn handle_response(&self, id: RequestId, payload: ResponsePayload) {
        match self.pending.remove(&id) {
            Some((_, tx)) => {
                let resolved = match payload {
                    ResponsePayload::Result(value) => Ok(value),
                    ResponsePayload::Error(error) => Err(McpError::from(error)),
                };
                let _ = tx.send(resolved);
            }
            None => {
                tracing::warn!(%id, "dropping late or duplicate response");
            }
        }
    }

    fn dispatch_request(self: Arc<Self>, id: RequestId, method: String, params: Option<Value>) {
        tokio::spawn(async move {
            let response = if method != mcp_protocol::lifecycle::INITIALIZE && !self.phase().is_ready() {
                Envelope::error(id, JsonRpcError::new(-32600, "session is not ready"))
            } else if let Some(handler) = self.request_handlers.get(&method).map(|h| Arc::clone(h.value())) {
                match handler.handle(params).await {
                    Ok(result) => Envelope::success(id, result),
                    Err(err) => Envelope::error(id, err.into_jsonrpc_error()),
                }
            } else {
                Envelope::error(id, McpError::method_not_found(&method).into_jsonrpc_error())
            };

            if let Err(err) = self.transport.send(response).await {
                tracing::error!(%err, method, "failed to send response");
            }
        });
    }

    fn dispatch_notification(self: Arc<Self>, method: String, params: Option<Value>) {
        let handlers: Vec<Arc<dyn NotificationHandler>> = self
            .notification_handlers
            .get(&method)
            .map(|entry| entry.value().clone())
            .unwrap_or_default();

        for handler in handlers {
            let params = params.clone();
            tokio::spawn(async move {
                handler.handle(params).await;
            });
        }
    }
}

#[async_trait]
impl TransportHandler for Session {
    async fn on_envelope(&self, envelope: Envelope) {
        match envelope {
            Envelope::Response { id, payload } => self.handle_response(id, payload),
            Envelope::Request { id, method, params } => {
                // `on_envelope` takes `&self`; recover an `Arc<Self>` handle
                // to hand to the spawned dispatch task without blocking the
                // read path on handler execution.
                if let Some(this) = self.arc_self() {
                    this.dispatch_request(id, method, params);
                }
            }
            Envelope::Notification { method, params } => {
                if let Some(this) = self.arc_self() {
                    this.dispatch_notification(method, params);
                }
            }
        }
    }

    async fn on_closed(&self) {
        tracing::debug!("transport closed, failing pending requests");
        self.fail_all_pending();
        let _ = self.terminating.send(true);
        if !self.phase().is_terminal() {
            self.set_phase(LifecyclePhase::Closing);
            self.set_phase(LifecyclePhase::Closed);
        }
    }
}

impl Session {
    /// `on_envelope`/`on_closed` are invoked through `&self` (the
    /// `TransportHandler` object safety contract), but dispatch needs an
    /// owned `Arc<Session>` to spawn tasks that outlive the call. A session
    /// is always held behind `Arc` by its owner (constructed via
    /// [`Session::new`]), so this recovers one via a weak self-reference
    /// stashed at construction.
    fn arc_self(&self) -> Option<Arc<Session>> {
        self.weak_self.upgrade()
    }
}
