//! JSON-RPC 2.0 envelope, request ids, the MCP method catalog, and the
//! unified [`McpError`] type shared by every crate in this workspace.

#![warn(missing_docs)]
#![allow(missing_docs)]

mod envelope;
mod error;
mod methods;

pub use envelope::{Envelope, JsonRpcError, RequestId, ResponsePayload, JSONRPC_VERSION};
pub use error::{ErrorKind, McpError, McpResult};
pub use methods::{cancellation, completion, lifecycle, logging, prompts, resources, roots, sampling, tools, LoggingLevel, PROTOCOL_VERSION};
