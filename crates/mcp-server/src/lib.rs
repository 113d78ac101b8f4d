//! The server role: a typed façade over `mcp-session` answering the MCP
//! method catalog from application-registered tools, resources, prompts,
//! and completion providers.
//!
//! Mirrors `mcp-client`'s shape — a builder, a role façade, and the handler
//! traits an application implements — but for the side that serves rather
//! than consumes.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![allow(missing_docs)]

mod builder;
mod exchange;
mod handlers;
mod registry;
mod server;

pub use builder::ServerBuilder;
pub use exchange::Exchange;
pub use handlers::{
    completion_handler_fn, prompt_handler_fn, resource_handler_fn, tool_handler_fn,
    CompletionHandler, PromptHandler, ResourceHandler, ToolHandler,
};
pub use registry::{completion_key, CompletionSpec, PromptSpec, Registry, ResourceSpec, ToolSpec};
pub use server::{McpServer, ServerConfig};
