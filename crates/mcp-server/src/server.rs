//! The server role: a typed façade over [`mcp_session::Session`] answering
//! §4.5's method catalog from the tool/resource/prompt/completion registries
//! a [`crate::ServerBuilder`] populated.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashSet;
use parking_lot::RwLock;

use mcp_protocol::{
    completion, lifecycle, logging, prompts, resources, tools as tools_methods, LoggingLevel,
    McpError, McpResult, PROTOCOL_VERSION,
};
use mcp_session::{notification_handler_fn, request_handler_fn, LifecyclePhase, Session, SessionConfig};
use mcp_transport::Transport;
use mcp_types::{
    CallToolRequest, ClientCapabilities, CompleteRequest, GetPromptRequest, InitializeRequest,
    InitializeResult, ListPromptsResult, ListResourceTemplatesResult, ListResourcesResult,
    ListToolsResult, Prompt, ReadResourceRequest, Resource, ResourceTemplate, ServerCapabilities,
    ServerInfo, SetLevelRequest, SubscribeRequest, Tool, UnsubscribeRequest,
};

use crate::exchange::ExchangeFactory;
use crate::handlers::{CompletionHandler, PromptHandler, ResourceHandler, ToolHandler};
use crate::registry::{completion_key, CompletionSpec, PromptSpec, Registry, ResourceSpec, ToolSpec};

/// Construction-time server knobs.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub default_request_timeout: Option<Duration>,
    /// Page size used by `*/list` cursor pagination.
    pub list_page_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            default_request_timeout: None,
            list_page_size: 50,
        }
    }
}

fn paginate<T: Clone>(items: &[T], cursor: Option<&str>, page_size: usize) -> (Vec<T>, Option<String>) {
    let start = cursor.and_then(|c| c.parse::<usize>().ok()).unwrap_or(0);
    let end = items.len().min(start.saturating_add(page_size));
    let page = items.get(start..end).unwrap_or_default().to_vec();
    let next_cursor = if end < items.len() { Some(end.to_string()) } else { None };
    (page, next_cursor)
}

/// The server role façade. One instance per connection; built via
/// [`crate::ServerBuilder`].
pub struct McpServer {
    session: Arc<Session>,
    info: ServerInfo,
    instructions: Option<String>,
    capabilities: ServerCapabilities,
    config: ServerConfig,

    /// Guards against a second `initialize` on the same session (§6:
    /// repeated `initialize` is answered `InvalidRequest`).
    initialized: Arc<AtomicBool>,
    peer_capabilities: Arc<RwLock<Option<ClientCapabilities>>>,

    /// Set once `start()` is called. Registering a tool/resource/prompt/
    /// completion afterward is a programming error (§9): the registries are
    /// read concurrently by in-flight `*/list` and dispatch once the
    /// transport is live, and mutating them after the fact races those
    /// reads. Checked via `debug_assert!` in each `add_*`/`remove_*` method.
    started: AtomicBool,

    tools: Arc<Registry<ToolSpec>>,
    resources: Arc<Registry<ResourceSpec>>,
    prompts: Arc<Registry<PromptSpec>>,
    completions: Arc<Registry<CompletionSpec>>,

    /// Resource URIs the peer has subscribed to. A subscription is removed
    /// on `resources/unsubscribe` or session close (§4.5).
    subscriptions: Arc<DashSet<String>>,
    logging_level: Arc<RwLock<LoggingLevel>>,
}

impl std::fmt::Debug for McpServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("McpServer")
            .field("info", &self.info)
            .field("phase", &self.session.phase())
            .field("tools", &self.tools.len())
            .field("resources", &self.resources.len())
            .finish()
    }
}

impl McpServer {
    pub(crate) fn new(
        transport: Arc<dyn Transport>,
        name: impl Into<String>,
        version: impl Into<String>,
        instructions: Option<String>,
        capabilities: ServerCapabilities,
        config: ServerConfig,
    ) -> Arc<Self> {
        let session = Session::new(
            transport,
            SessionConfig {
                default_request_timeout: config.default_request_timeout,
            },
        );

        let info = ServerInfo::new(name, version);
        let tools: Arc<Registry<ToolSpec>> = Arc::new(Registry::new());
        let resources: Arc<Registry<ResourceSpec>> = Arc::new(Registry::new());
        let prompts: Arc<Registry<PromptSpec>> = Arc::new(Registry::new());
        let completions: Arc<Registry<CompletionSpec>> = Arc::new(Registry::new());
        let subscriptions = Arc::new(DashSet::new());
        let logging_level = Arc::new(RwLock::new(LoggingLevel::Debug));
        let peer_capabilities = Arc::new(RwLock::new(None::<ClientCapabilities>));
        let initialized = Arc::new(AtomicBool::new(false));

        Self::register_handlers(
            &session,
            info.clone(),
            instructions.clone(),
            capabilities.clone(),
            config.list_page_size,
            Arc::clone(&tools),
            Arc::clone(&resources),
            Arc::clone(&prompts),
            Arc::clone(&completions),
            Arc::clone(&subscriptions),
            Arc::clone(&logging_level),
            Arc::clone(&peer_capabilities),
            Arc::clone(&initialized),
        );

        Arc::new(Self {
            session,
            info,
            instructions,
            capabilities,
            config,
            initialized,
            started: AtomicBool::new(false),
            peer_capabilities,
            tools,
            resources,
            prompts,
            completions,
            subscriptions,
            logging_level,
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn register_handlers(
        session: &Arc<Session>,
        info: ServerInfo,
        instructions: Option<String>,
        capabilities: ServerCapabilities,
        page_size: usize,
        tools: Arc<Registry<ToolSpec>>,
        resources: Arc<Registry<ResourceSpec>>,
        prompts: Arc<Registry<PromptSpec>>,
        completions: Arc<Registry<CompletionSpec>>,
        subscriptions: Arc<DashSet<String>>,
        logging_level: Arc<RwLock<LoggingLevel>>,
        peer_capabilities: Arc<RwLock<Option<ClientCapabilities>>>,
        initialized: Arc<AtomicBool>,
    ) {
        let factory = ExchangeFactory::new(
            Arc::clone(session),
            Arc::clone(&peer_capabilities),
            Arc::clone(&logging_level),
        );

        // initialize
        {
            let info = info.clone();
            let capabilities = capabilities.clone();
            let instructions = instructions.clone();
            let peer = Arc::clone(&peer_capabilities);
            let flag = Arc::clone(&initialized);
            session.register_request_handler(
                lifecycle::INITIALIZE,
                request_handler_fn(move |params| {
                    let info = info.clone();
                    let capabilities = capabilities.clone();
                    let instructions = instructions.clone();
                    let peer = Arc::clone(&peer);
                    let flag = Arc::clone(&flag);
                    async move {
                        if flag.swap(true, Ordering::SeqCst) {
                            return Err(McpError::invalid_request("initialize already completed"));
                        }
                        let params = params.ok_or_else(|| McpError::invalid_params("missing params"))?;
                        let request: InitializeRequest = serde_json::from_value(params)
                            .map_err(|err| McpError::invalid_params(err.to_string()))?;
                        if request.protocol_version != PROTOCOL_VERSION {
                            tracing::warn!(
                                client_version = %request.protocol_version,
                                our_version = PROTOCOL_VERSION,
                                "client requested a different protocol version than ours"
                            );
                        }
                        *peer.write() = Some(request.capabilities);
                        let result = InitializeResult {
                            protocol_version: PROTOCOL_VERSION.to_string(),
                            capabilities,
                            server_info: info,
                            instructions,
                        };
                        Ok(serde_json::to_value(result)?)
                    }
                }),
            );
        }

        // notifications/initialized
        {
            let session = Arc::clone(session);
            session.register_notification_handler(
                lifecycle::INITIALIZED,
                notification_handler_fn(move |_params| {
                    let session = Arc::clone(&session);
                    async move {
                        session.set_phase(LifecyclePhase::Ready);
                        tracing::debug!("server session ready");
                    }
                }),
            );
        }

        // ping
        session.register_request_handler(
            lifecycle::PING,
            request_handler_fn(|_params| async { Ok(serde_json::json!({})) }),
        );

        // tools/list
        {
            let tools = Arc::clone(&tools);
            session.register_request_handler(
                tools_methods::LIST,
                request_handler_fn(move |params| {
                    let tools = Arc::clone(&tools);
                    async move {
                        let cursor = params
                            .and_then(|p| serde_json::from_value::<mcp_types::ListToolsRequest>(p).ok())
                            .and_then(|r| r.cursor);
                        let all: Vec<Tool> = tools.values().into_iter().map(|spec| spec.tool.clone()).collect();
                        let (page, next_cursor) = paginate(&all, cursor.as_deref(), page_size);
                        Ok(serde_json::to_value(ListToolsResult { tools: page, next_cursor })?)
                    }
                }),
            );
        }

        // tools/call
        {
            let tools = Arc::clone(&tools);
            let factory = factory.clone();
            session.register_request_handler(
                tools_methods::CALL,
                request_handler_fn(move |params| {
                    let tools = Arc::clone(&tools);
                    let exchange = factory.make();
                    async move {
                        let params = params.ok_or_else(|| McpError::invalid_params("missing params"))?;
                        let request: CallToolRequest = serde_json::from_value(params)
                            .map_err(|err| McpError::invalid_params(err.to_string()))?;
                        let spec = tools
                            .get(&request.name)
                            .ok_or_else(|| McpError::method_not_found(format!("tool {}", request.name)))?;
                        let result = spec.handler.call(exchange, request.arguments).await?;
                        Ok(serde_json::to_value(result)?)
                    }
                }),
            );
        }

        // resources/list
        {
            let resources = Arc::clone(&resources);
            session.register_request_handler(
                resources::LIST,
                request_handler_fn(move |params| {
                    let resources = Arc::clone(&resources);
                    async move {
                        let cursor = params
                            .and_then(|p| serde_json::from_value::<mcp_types::ListResourcesRequest>(p).ok())
                            .and_then(|r| r.cursor);
                        let all: Vec<Resource> =
                            resources.values().into_iter().map(|spec| spec.resource.clone()).collect();
                        let (page, next_cursor) = paginate(&all, cursor.as_deref(), page_size);
                        Ok(serde_json::to_value(ListResourcesResult { resources: page, next_cursor })?)
                    }
                }),
            );
        }

        // resources/templates/list
        {
            let resources = Arc::clone(&resources);
            session.register_request_handler(
                resources::TEMPLATES_LIST,
                request_handler_fn(move |params| {
                    let resources = Arc::clone(&resources);
                    async move {
                        let cursor = params
                            .and_then(|p| {
                                serde_json::from_value::<mcp_types::ListResourceTemplatesRequest>(p).ok()
                            })
                            .and_then(|r| r.cursor);
                        let all: Vec<ResourceTemplate> = resources.templates();
                        let (page, next_cursor) = paginate(&all, cursor.as_deref(), page_size);
                        Ok(serde_json::to_value(ListResourceTemplatesResult {
                            resource_templates: page,
                            next_cursor,
                        })?)
                    }
                }),
            );
        }

        // resources/read
        {
            let resources = Arc::clone(&resources);
            let factory = factory.clone();
            session.register_request_handler(
                resources::READ,
                request_handler_fn(move |params| {
                    let resources = Arc::clone(&resources);
                    let exchange = factory.make();
                    async move {
                        let params = params.ok_or_else(|| McpError::invalid_params("missing params"))?;
                        let request: ReadResourceRequest = serde_json::from_value(params)
                            .map_err(|err| McpError::invalid_params(err.to_string()))?;
                        let spec = resources
                            .get(&request.uri)
                            .ok_or_else(|| McpError::invalid_params(format!("unknown resource: {}", request.uri)))?;
                        let result = spec.handler.read(exchange, request).await?;
                        Ok(serde_json::to_value(result)?)
                    }
                }),
            );
        }

        // resources/subscribe
        {
            let enabled = capabilities.resources.as_ref().and_then(|c| c.subscribe).unwrap_or(false);
            let subscriptions = Arc::clone(&subscriptions);
            session.register_request_handler(
                resources::SUBSCRIBE,
                request_handler_fn(move |params| {
                    let subscriptions = Arc::clone(&subscriptions);
                    async move {
                        if !enabled {
                            return Err(McpError::method_not_found(resources::SUBSCRIBE));
                        }
                        let params = params.ok_or_else(|| McpError::invalid_params("missing params"))?;
                        let request: SubscribeRequest = serde_json::from_value(params)
                            .map_err(|err| McpError::invalid_params(err.to_string()))?;
                        subscriptions.insert(request.uri);
                        Ok(serde_json::json!({}))
                    }
                }),
            );
        }

        // resources/unsubscribe
        {
            let enabled = capabilities.resources.as_ref().and_then(|c| c.subscribe).unwrap_or(false);
            let subscriptions = Arc::clone(&subscriptions);
            session.register_request_handler(
                resources::UNSUBSCRIBE,
                request_handler_fn(move |params| {
                    let subscriptions = Arc::clone(&subscriptions);
                    async move {
                        if !enabled {
                            return Err(McpError::method_not_found(resources::UNSUBSCRIBE));
                        }
                        let params = params.ok_or_else(|| McpError::invalid_params("missing params"))?;
                        let request: UnsubscribeRequest = serde_json::from_value(params)
                            .map_err(|err| McpError::invalid_params(err.to_string()))?;
                        subscriptions.remove(&request.uri);
                        Ok(serde_json::json!({}))
                    }
                }),
            );
        }

        // prompts/list
        {
            let prompts = Arc::clone(&prompts);
            session.register_request_handler(
                prompts::LIST,
                request_handler_fn(move |params| {
                    let prompts = Arc::clone(&prompts);
                    async move {
                        let cursor = params
                            .and_then(|p| serde_json::from_value::<mcp_types::ListPromptsRequest>(p).ok())
                            .and_then(|r| r.cursor);
                        let all: Vec<Prompt> = prompts.values().into_iter().map(|spec| spec.prompt.clone()).collect();
                        let (page, next_cursor) = paginate(&all, cursor.as_deref(), page_size);
                        Ok(serde_json::to_value(ListPromptsResult { prompts: page, next_cursor })?)
                    }
                }),
            );
        }

        // prompts/get
        {
            let prompts = Arc::clone(&prompts);
            let factory = factory.clone();
            session.register_request_handler(
                prompts::GET,
                request_handler_fn(move |params| {
                    let prompts = Arc::clone(&prompts);
                    let exchange = factory.make();
                    async move {
                        let params = params.ok_or_else(|| McpError::invalid_params("missing params"))?;
                        let request: GetPromptRequest = serde_json::from_value(params)
                            .map_err(|err| McpError::invalid_params(err.to_string()))?;
                        let spec = prompts
                            .get(&request.name)
                            .ok_or_else(|| McpError::method_not_found(format!("prompt {}", request.name)))?;
                        let result = spec.handler.get(exchange, request).await?;
                        Ok(serde_json::to_value(result)?)
                    }
                }),
            );
        }

        // completion/complete
        {
            let enabled = capabilities.completions.is_some();
            let completions = Arc::clone(&completions);
            let factory = factory.clone();
            session.register_request_handler(
                completion::COMPLETE,
                request_handler_fn(move |params| {
                    let completions = Arc::clone(&completions);
                    let exchange = factory.make();
                    async move {
                        if !enabled {
                            return Err(McpError::method_not_found(completion::COMPLETE));
                        }
                        let params = params.ok_or_else(|| McpError::invalid_params("missing params"))?;
                        let request: CompleteRequest = serde_json::from_value(params)
                            .map_err(|err| McpError::invalid_params(err.to_string()))?;
                        let key = completion_key(&request.reference);
                        let spec = completions
                            .get(&key)
                            .ok_or_else(|| McpError::invalid_params("no completion provider for this reference"))?;
                        let result = spec.handler.complete(exchange, request).await?;
                        Ok(serde_json::to_value(result)?)
                    }
                }),
            );
        }

        // logging/setLevel
        {
            let enabled = capabilities.logging.is_some();
            let logging_level = Arc::clone(&logging_level);
            session.register_request_handler(
                logging::SET_LEVEL,
                request_handler_fn(move |params| {
                    let logging_level = Arc::clone(&logging_level);
                    async move {
                        if !enabled {
                            return Err(McpError::method_not_found(logging::SET_LEVEL));
                        }
                        let params = params.ok_or_else(|| McpError::invalid_params("missing params"))?;
                        let request: SetLevelRequest = serde_json::from_value(params)
                            .map_err(|err| McpError::invalid_params(err.to_string()))?;
                        *logging_level.write() = request.level;
                        Ok(serde_json::json!({}))
                    }
                }),
            );
        }
    }

    /// This server's declared identity.
    #[must_use]
    pub fn info(&self) -> &ServerInfo {
        &self.info
    }

    /// This server's declared capabilities, fixed at construction (§9).
    #[must_use]
    pub fn capabilities(&self) -> &ServerCapabilities {
        &self.capabilities
    }

    /// The client's capabilities as recorded at `initialize`, or `None`
    /// before the handshake completes.
    #[must_use]
    pub fn peer_capabilities(&self) -> Option<ClientCapabilities> {
        self.peer_capabilities.read().clone()
    }

    #[must_use]
    pub fn phase(&self) -> LifecyclePhase {
        self.session.phase()
    }

    /// Resource URIs currently subscribed by the peer.
    #[must_use]
    pub fn subscriptions(&self) -> Vec<String> {
        self.subscriptions.iter().map(|entry| entry.clone()).collect()
    }

    pub(crate) fn tools(&self) -> &Registry<ToolSpec> {
        &self.tools
    }

    pub(crate) fn resources(&self) -> &Registry<ResourceSpec> {
        &self.resources
    }

    pub(crate) fn prompts(&self) -> &Registry<PromptSpec> {
        &self.prompts
    }

    pub(crate) fn completions(&self) -> &Registry<CompletionSpec> {
        &self.completions
    }

    /// Connect the transport and begin answering requests. Call once, after
    /// registering everything this instance will ever serve.
    ///
    /// # Errors
    /// Returns an error if the transport fails to connect.
    pub async fn start(&self) -> McpResult<()> {
        // `Session::start` needs `&Arc<Session>`; `McpServer` holds the
        // session behind its own `Arc<McpServer>`, so reach for the
        // session's own clone rather than requiring callers hold
        // `Arc<McpServer>` just to start it.
        let session = Arc::clone(&self.session);
        self.started.store(true, Ordering::Release);
        session.start().await
    }

    /// Close the session: fails every pending request and tears down the
    /// transport. Clears all resource subscriptions (§4.5: a subscription
    /// ends at session close).
    ///
    /// # Errors
    /// Returns an error if the transport failed to close cleanly.
    pub async fn close(&self) -> McpResult<()> {
        self.subscriptions.clear();
        self.session.close().await
    }

    async fn notify_list_changed(&self, method: &str, enabled: bool) {
        if !enabled {
            return;
        }
        if let Err(err) = self.session.notify(method, None).await {
            tracing::warn!(%err, method, "failed to publish list_changed notification");
        }
    }

    fn tools_list_changed_enabled(&self) -> bool {
        self.capabilities.tools.as_ref().and_then(|c| c.list_changed).unwrap_or(false)
    }

    fn resources_list_changed_enabled(&self) -> bool {
        self.capabilities.resources.as_ref().and_then(|c| c.list_changed).unwrap_or(false)
    }

    fn prompts_list_changed_enabled(&self) -> bool {
        self.capabilities.prompts.as_ref().and_then(|c| c.list_changed).unwrap_or(false)
    }

    /// Panics in debug builds if called after [`McpServer::start`] (§9):
    /// the registries are read concurrently by dispatch once the transport
    /// is live, so mutating them afterward is a programming error, not a
    /// supported runtime reconfiguration path.
    fn assert_not_started(&self) {
        debug_assert!(
            !self.started.load(Ordering::Acquire),
            "registering or removing a tool/resource/prompt/completion after start() is a programming error"
        );
    }

    /// Register (or replace) a tool. Must be called before [`McpServer::start`];
    /// publishes `notifications/tools/list_changed` if that capability was
    /// declared.
    pub async fn add_tool(&self, tool: Tool, handler: Arc<dyn ToolHandler>) {
        self.assert_not_started();
        self.tools.insert(tool.name.clone(), Arc::new(ToolSpec { tool, handler }));
        let enabled = self.tools_list_changed_enabled();
        self.notify_list_changed(tools_methods::LIST_CHANGED, enabled).await;
    }

    /// Remove a tool. Must be called before [`McpServer::start`]. Returns
    /// whether it was present.
    pub async fn remove_tool(&self, name: &str) -> bool {
        self.assert_not_started();
        let removed = self.tools.remove(name).is_some();
        if removed {
            let enabled = self.tools_list_changed_enabled();
            self.notify_list_changed(tools_methods::LIST_CHANGED, enabled).await;
        }
        removed
    }

    /// Register (or replace) a resource. Must be called before
    /// [`McpServer::start`]; publishes `notifications/resources/list_changed`
    /// if that capability was declared.
    pub async fn add_resource(&self, resource: Resource, handler: Arc<dyn ResourceHandler>) {
        self.assert_not_started();
        self.resources
            .insert(resource.uri.clone(), Arc::new(ResourceSpec { resource, handler }));
        let enabled = self.resources_list_changed_enabled();
        self.notify_list_changed(resources::LIST_CHANGED, enabled).await;
    }

    /// Remove a resource. Must be called before [`McpServer::start`].
    /// Returns whether it was present.
    pub async fn remove_resource(&self, uri: &str) -> bool {
        self.assert_not_started();
        let removed = self.resources.remove(uri).is_some();
        if removed {
            let enabled = self.resources_list_changed_enabled();
            self.notify_list_changed(resources::LIST_CHANGED, enabled).await;
        }
        removed
    }

    /// Register (or replace) a resource template. Must be called before
    /// [`McpServer::start`].
    pub async fn add_resource_template(&self, template: ResourceTemplate) {
        self.assert_not_started();
        self.resources.insert_template(template);
        let enabled = self.resources_list_changed_enabled();
        self.notify_list_changed(resources::LIST_CHANGED, enabled).await;
    }

    /// Register (or replace) a prompt. Must be called before
    /// [`McpServer::start`]; publishes `notifications/prompts/list_changed`
    /// if that capability was declared.
    pub async fn add_prompt(&self, prompt: Prompt, handler: Arc<dyn PromptHandler>) {
        self.assert_not_started();
        self.prompts.insert(prompt.name.clone(), Arc::new(PromptSpec { prompt, handler }));
        let enabled = self.prompts_list_changed_enabled();
        self.notify_list_changed(prompts::LIST_CHANGED, enabled).await;
    }

    /// Remove a prompt. Must be called before [`McpServer::start`]. Returns
    /// whether it was present.
    pub async fn remove_prompt(&self, name: &str) -> bool {
        self.assert_not_started();
        let removed = self.prompts.remove(name).is_some();
        if removed {
            let enabled = self.prompts_list_changed_enabled();
            self.notify_list_changed(prompts::LIST_CHANGED, enabled).await;
        }
        removed
    }

    /// Register (or replace) a completion provider. Must be called before
    /// [`McpServer::start`]. No `list_changed` notification exists for
    /// completions in the method catalog.
    pub fn add_completion(&self, reference: mcp_types::CompletionReference, handler: Arc<dyn CompletionHandler>) {
        self.assert_not_started();
        let key = completion_key(&reference);
        self.completions.insert(key, Arc::new(CompletionSpec { reference, handler }));
    }
}
