//! Server-initiated requests the client may answer: `roots/list` and
//! `sampling/createMessage`. Both are opt-in — a [`Client`](crate::Client)
//! only registers an inbound handler for one of these methods when the
//! caller supplied an implementation, which is how §4.4's "handler
//! registered only when the user provided that capability" reads in code.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use mcp_protocol::McpError;
use mcp_session::RequestHandler;
use mcp_types::{CreateMessageRequest, CreateMessageResult, ListRootsResult, Root};

/// Supplies the filesystem roots this client exposes to the server, in
/// answer to an inbound `roots/list` request.
#[async_trait]
pub trait RootsProvider: Send + Sync {
    async fn list_roots(&self) -> Vec<Root>;
}

/// Answers an inbound `sampling/createMessage` request by delegating to a
/// local model. What "local model" means is entirely up to the caller —
/// this crate only defines the contract.
#[async_trait]
pub trait SamplingHandler: Send + Sync {
    async fn create_message(
        &self,
        request: CreateMessageRequest,
    ) -> Result<CreateMessageResult, McpError>;
}

pub(crate) struct RootsRequestHandler {
    provider: Arc<dyn RootsProvider>,
}

impl RootsRequestHandler {
    pub(crate) fn new(provider: Arc<dyn RootsProvider>) -> Arc<dyn RequestHandler> {
        Arc::new(Self { provider })
    }
}

#[async_trait]
impl RequestHandler for RootsRequestHandler {
    async fn handle(&self, _params: Option<Value>) -> Result<Value, McpError> {
        let roots = self.provider.list_roots().await;
        let result = ListRootsResult { roots };
        serde_json::to_value(result).map_err(McpError::from)
    }
}

pub(crate) struct SamplingRequestHandler {
    handler: Arc<dyn SamplingHandler>,
}

impl SamplingRequestHandler {
    pub(crate) fn new(handler: Arc<dyn SamplingHandler>) -> Arc<dyn RequestHandler> {
        Arc::new(Self { handler })
    }
}

#[async_trait]
impl RequestHandler for SamplingRequestHandler {
    async fn handle(&self, params: Option<Value>) -> Result<Value, McpError> {
        let params = params.ok_or_else(|| McpError::invalid_params("missing params"))?;
        let request: CreateMessageRequest =
            serde_json::from_value(params).map_err(|e| McpError::invalid_params(e.to_string()))?;
        let result = self.handler.create_message(request).await?;
        serde_json::to_value(result).map_err(McpError::from)
    }
}
