//! The client role: a typed façade over [`mcp_session::Session`] implementing
//! §4.4 — `initialize` plus one method per MCP client-side operation.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use serde_json::Value;

use mcp_protocol::{completion, lifecycle, logging, prompts, resources, roots, tools, McpError, McpResult, PROTOCOL_VERSION};
use mcp_session::{LifecyclePhase, Session, SessionConfig};
use mcp_transport::Transport;
use mcp_types::{
    CallToolRequest, CallToolResult, ClientCapabilities, CompleteRequest, CompleteResult,
    CompletionArgument, CompletionReference, Cursor, GetPromptRequest, GetPromptResult,
    Implementation, InitializeRequest, InitializeResult, ListPromptsResult,
    ListResourceTemplatesResult, ListResourcesResult, ListToolsResult, ReadResourceResult,
    ServerCapabilities, ServerInfo, SetLevelRequest,
};

use crate::handlers::{RootsProvider, RootsRequestHandler, SamplingHandler, SamplingRequestHandler};
use crate::notifications::{ListChangedFeed, LogFeed};

/// Construction-time knobs threaded through to the underlying session.
#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    pub default_request_timeout: Option<Duration>,
}

/// The client role façade. One instance per connection; built via
/// [`crate::ClientBuilder`].
pub struct Client {
    session: Arc<Session>,
    client_info: Implementation,
    capabilities: ClientCapabilities,
    peer: RwLock<Option<(ServerCapabilities, ServerInfo)>>,

    tools_changed: Arc<ListChangedFeed>,
    resources_changed: Arc<ListChangedFeed>,
    prompts_changed: Arc<ListChangedFeed>,
    log_messages: Arc<LogFeed>,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("client_info", &self.client_info)
            .field("phase", &self.session.phase())
            .finish()
    }
}

impl Client {
    pub(crate) fn new(
        transport: Arc<dyn Transport>,
        client_info: Implementation,
        capabilities: ClientCapabilities,
        roots_provider: Option<Arc<dyn RootsProvider>>,
        sampling_handler: Option<Arc<dyn SamplingHandler>>,
        config: ClientConfig,
    ) -> Arc<Self> {
        let session = Session::new(
            transport,
            SessionConfig {
                default_request_timeout: config.default_request_timeout,
            },
        );

        let tools_changed = Arc::new(ListChangedFeed::new());
        let resources_changed = Arc::new(ListChangedFeed::new());
        let prompts_changed = Arc::new(ListChangedFeed::new());
        let log_messages = Arc::new(LogFeed::new());

        session.register_notification_handler(tools::LIST_CHANGED, tools_changed.handler());
        session.register_notification_handler(resources::LIST_CHANGED, resources_changed.handler());
        session.register_notification_handler(prompts::LIST_CHANGED, prompts_changed.handler());
        session.register_notification_handler(logging::MESSAGE, log_messages.handler());

        // §4.4: these inbound request handlers are registered only when the
        // caller supplied an implementation — i.e. only when the matching
        // capability was declared. An unregistered method falls through to
        // the session's own MethodNotFound response.
        if let Some(provider) = roots_provider {
            session.register_request_handler(roots::LIST, RootsRequestHandler::new(provider));
        }
        if let Some(handler) = sampling_handler {
            session.register_request_handler(
                "sampling/createMessage",
                SamplingRequestHandler::new(handler),
            );
        }

        Arc::new(Self {
            session,
            client_info,
            capabilities,
            peer: RwLock::new(None),
            tools_changed,
            resources_changed,
            prompts_changed,
            log_messages,
        })
    }

    #[must_use]
    pub fn tools_changed(&self) -> tokio::sync::broadcast::Receiver<()> {
        self.tools_changed.subscribe()
    }

    #[must_use]
    pub fn resources_changed(&self) -> tokio::sync::broadcast::Receiver<()> {
        self.resources_changed.subscribe()
    }

    #[must_use]
    pub fn prompts_changed(&self) -> tokio::sync::broadcast::Receiver<()> {
        self.prompts_changed.subscribe()
    }

    #[must_use]
    pub fn log_messages(&self) -> tokio::sync::broadcast::Receiver<mcp_types::LoggingMessageNotification> {
        self.log_messages.subscribe()
    }

    /// The server's declared capabilities and identity, if `initialize` has
    /// completed.
    #[must_use]
    pub fn peer(&self) -> Option<(ServerCapabilities, ServerInfo)> {
        self.peer.read().clone()
    }

    /// Drives §4.3.3's client-side half: connect the transport, send
    /// `initialize`, record the peer's capabilities, send
    /// `notifications/initialized`, and transition to `Ready`.
    ///
    /// # Errors
    /// Returns an error if the transport fails to connect or the server
    /// rejects (or never answers) `initialize`; in both cases the transport
    /// is left closed.
    pub async fn initialize(&self) -> McpResult<InitializeResult> {
        self.session.start().await?;

        let params = InitializeRequest {
            protocol_version: PROTOCOL_VERSION.to_string(),
            capabilities: self.capabilities.clone(),
            client_info: self.client_info.clone(),
        };

        let request = async {
            let value = self
                .session
                .request(
                    lifecycle::INITIALIZE,
                    Some(serde_json::to_value(&params)?),
                    None,
                )
                .await?;
            let result: InitializeResult = serde_json::from_value(value)?;
            Ok::<_, McpError>(result)
        }
        .await;

        let result = match request {
            Ok(result) => result,
            Err(err) => {
                let _ = self.session.close().await;
                return Err(err);
            }
        };

        if result.protocol_version != PROTOCOL_VERSION {
            tracing::warn!(
                server_version = %result.protocol_version,
                our_version = PROTOCOL_VERSION,
                "server replied with a different protocol version than ours"
            );
        }

        *self.peer.write() = Some((result.capabilities.clone(), result.server_info.clone()));
        self.session
            .notify(lifecycle::INITIALIZED, None)
            .await?;
        self.session.set_phase(LifecyclePhase::Ready);

        Ok(result)
    }

    /// Close the session: fails every pending request with `SessionClosed`
    /// and tears down the transport.
    ///
    /// # Errors
    /// Returns an error if the transport failed to close cleanly.
    pub async fn close(&self) -> McpResult<()> {
        self.session.close().await
    }

    async fn call<T: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        params: Option<Value>,
    ) -> McpResult<T> {
        let value = self.session.request(method, params, None).await?;
        self.session.decode(value)
    }

    /// # Errors
    /// Returns the server's error response, or a local error if the
    /// session is not connected.
    pub async fn list_tools(&self, cursor: Option<Cursor>) -> McpResult<ListToolsResult> {
        let params = mcp_types::ListToolsRequest { cursor };
        self.call(tools::LIST, Some(serde_json::to_value(params)?)).await
    }

    /// # Errors
    /// See [`Client::list_tools`].
    pub async fn call_tool(
        &self,
        name: impl Into<String>,
        arguments: Option<HashMap<String, Value>>,
    ) -> McpResult<CallToolResult> {
        let params = CallToolRequest {
            name: name.into(),
            arguments,
        };
        self.call(tools::CALL, Some(serde_json::to_value(params)?)).await
    }

    /// # Errors
    /// See [`Client::list_tools`].
    pub async fn list_resources(&self, cursor: Option<Cursor>) -> McpResult<ListResourcesResult> {
        let params = mcp_types::ListResourcesRequest { cursor };
        self.call(resources::LIST, Some(serde_json::to_value(params)?)).await
    }

    /// # Errors
    /// See [`Client::list_tools`].
    pub async fn read_resource(&self, uri: impl Into<String>) -> McpResult<ReadResourceResult> {
        let params = mcp_types::ReadResourceRequest { uri: uri.into() };
        self.call(resources::READ, Some(serde_json::to_value(params)?)).await
    }

    /// # Errors
    /// See [`Client::list_tools`].
    pub async fn subscribe(&self, uri: impl Into<String>) -> McpResult<()> {
        let params = mcp_types::SubscribeRequest { uri: uri.into() };
        let _: Value = self
            .call(resources::SUBSCRIBE, Some(serde_json::to_value(params)?))
            .await?;
        Ok(())
    }

    /// # Errors
    /// See [`Client::list_tools`].
    pub async fn unsubscribe(&self, uri: impl Into<String>) -> McpResult<()> {
        let params = mcp_types::UnsubscribeRequest { uri: uri.into() };
        let _: Value = self
            .call(resources::UNSUBSCRIBE, Some(serde_json::to_value(params)?))
            .await?;
        Ok(())
    }

    /// # Errors
    /// See [`Client::list_tools`].
    pub async fn list_resource_templates(
        &self,
        cursor: Option<Cursor>,
    ) -> McpResult<ListResourceTemplatesResult> {
        let params = mcp_types::ListResourceTemplatesRequest { cursor };
        self.call(resources::TEMPLATES_LIST, Some(serde_json::to_value(params)?))
            .await
    }

    /// # Errors
    /// See [`Client::list_tools`].
    pub async fn list_prompts(&self, cursor: Option<Cursor>) -> McpResult<ListPromptsResult> {
        let params = mcp_types::ListPromptsRequest { cursor };
        self.call(prompts::LIST, Some(serde_json::to_value(params)?)).await
    }

    /// # Errors
    /// See [`Client::list_tools`].
    pub async fn get_prompt(
        &self,
        name: impl Into<String>,
        arguments: Option<HashMap<String, String>>,
    ) -> McpResult<GetPromptResult> {
        let params = GetPromptRequest {
            name: name.into(),
            arguments,
        };
        self.call(prompts::GET, Some(serde_json::to_value(params)?)).await
    }

    /// # Errors
    /// See [`Client::list_tools`].
    pub async fn set_logging_level(&self, level: mcp_protocol::LoggingLevel) -> McpResult<()> {
        let params = SetLevelRequest { level };
        let _: Value = self
            .call(logging::SET_LEVEL, Some(serde_json::to_value(params)?))
            .await?;
        Ok(())
    }

    /// # Errors
    /// See [`Client::list_tools`].
    pub async fn complete(
        &self,
        reference: CompletionReference,
        argument: CompletionArgument,
    ) -> McpResult<CompleteResult> {
        let params = CompleteRequest { reference, argument };
        self.call(completion::COMPLETE, Some(serde_json::to_value(params)?))
            .await
    }

    /// # Errors
    /// See [`Client::list_tools`].
    pub async fn ping(&self) -> McpResult<()> {
        let _: Value = self.call(lifecycle::PING, None).await?;
        Ok(())
    }
}
