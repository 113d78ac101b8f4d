//! The four application-facing handler traits (§4.5): a tool, resource,
//! prompt, or completion spec pairs a descriptor with one of these.
//!
//! Each trait takes the typed request and an [`Exchange`](crate::Exchange)
//! so a handler can report progress, log via `notifications/message`, or
//! issue a server-initiated request back to the client without reaching
//! into session internals.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;

use mcp_protocol::McpError;
use mcp_types::{
    CallToolResult, CompleteRequest, CompleteResult, GetPromptRequest, GetPromptResult,
    ReadResourceRequest, ReadResourceResult,
};

use crate::exchange::Exchange;

/// Answers `tools/call` for one registered tool.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(
        &self,
        exchange: Exchange,
        arguments: Option<HashMap<String, Value>>,
    ) -> Result<CallToolResult, McpError>;
}

/// Answers `resources/read` for one registered resource.
#[async_trait]
pub trait ResourceHandler: Send + Sync {
    async fn read(
        &self,
        exchange: Exchange,
        request: ReadResourceRequest,
    ) -> Result<ReadResourceResult, McpError>;
}

/// Answers `prompts/get` for one registered prompt.
#[async_trait]
pub trait PromptHandler: Send + Sync {
    async fn get(
        &self,
        exchange: Exchange,
        request: GetPromptRequest,
    ) -> Result<GetPromptResult, McpError>;
}

/// Answers `completion/complete` for one registered completion reference.
#[async_trait]
pub trait CompletionHandler: Send + Sync {
    async fn complete(
        &self,
        exchange: Exchange,
        request: CompleteRequest,
    ) -> Result<CompleteResult, McpError>;
}

/// Adapts a plain async closure into a [`ToolHandler`], mirroring
/// `mcp_session::request_handler_fn` so a caller registering a handful of
/// small tools doesn't need to name a type for each.
struct FnToolHandler<F>(F);

#[async_trait]
impl<F, Fut> ToolHandler for FnToolHandler<F>
where
    F: Fn(Exchange, Option<HashMap<String, Value>>) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = Result<CallToolResult, McpError>> + Send,
{
    async fn call(
        &self,
        exchange: Exchange,
        arguments: Option<HashMap<String, Value>>,
    ) -> Result<CallToolResult, McpError> {
        (self.0)(exchange, arguments).await
    }
}

#[must_use]
pub fn tool_handler_fn<F, Fut>(f: F) -> std::sync::Arc<dyn ToolHandler>
where
    F: Fn(Exchange, Option<HashMap<String, Value>>) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = Result<CallToolResult, McpError>> + Send + 'static,
{
    std::sync::Arc::new(FnToolHandler(f))
}

struct FnResourceHandler<F>(F);

#[async_trait]
impl<F, Fut> ResourceHandler for FnResourceHandler<F>
where
    F: Fn(Exchange, ReadResourceRequest) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = Result<ReadResourceResult, McpError>> + Send,
{
    async fn read(
        &self,
        exchange: Exchange,
        request: ReadResourceRequest,
    ) -> Result<ReadResourceResult, McpError> {
        (self.0)(exchange, request).await
    }
}

#[must_use]
pub fn resource_handler_fn<F, Fut>(f: F) -> std::sync::Arc<dyn ResourceHandler>
where
    F: Fn(Exchange, ReadResourceRequest) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = Result<ReadResourceResult, McpError>> + Send + 'static,
{
    std::sync::Arc::new(FnResourceHandler(f))
}

struct FnPromptHandler<F>(F);

#[async_trait]
impl<F, Fut> PromptHandler for FnPromptHandler<F>
where
    F: Fn(Exchange, GetPromptRequest) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = Result<GetPromptResult, McpError>> + Send,
{
    async fn get(
        &self,
        exchange: Exchange,
        request: GetPromptRequest,
    ) -> Result<GetPromptResult, McpError> {
        (self.0)(exchange, request).await
    }
}

#[must_use]
pub fn prompt_handler_fn<F, Fut>(f: F) -> std::sync::Arc<dyn PromptHandler>
where
    F: Fn(Exchange, GetPromptRequest) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = Result<GetPromptResult, McpError>> + Send + 'static,
{
    std::sync::Arc::new(FnPromptHandler(f))
}

struct FnCompletionHandler<F>(F);

#[async_trait]
impl<F, Fut> CompletionHandler for FnCompletionHandler<F>
where
    F: Fn(Exchange, CompleteRequest) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = Result<CompleteResult, McpError>> + Send,
{
    async fn complete(
        &self,
        exchange: Exchange,
        request: CompleteRequest,
    ) -> Result<CompleteResult, McpError> {
        (self.0)(exchange, request).await
    }
}

#[must_use]
pub fn completion_handler_fn<F, Fut>(f: F) -> std::sync::Arc<dyn CompletionHandler>
where
    F: Fn(Exchange, CompleteRequest) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = Result<CompleteResult, McpError>> + Send + 'static,
{
    std::sync::Arc::new(FnCompletionHandler(f))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::test_support::bare_exchange;

    #[tokio::test]
    async fn fn_tool_handler_runs_the_closure() {
        let handler = tool_handler_fn(|_exchange, _args| async { Ok(CallToolResult::text("ok")) });
        let result = handler.call(bare_exchange(), None).await.unwrap();
        assert_eq!(result.content[0].as_text(), Some("ok"));
    }
}
