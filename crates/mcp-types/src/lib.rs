//! Schema types for the Model Context Protocol: content blocks, tool/resource/
//! prompt definitions, capability negotiation structures, and the request/
//! result payload shapes carried inside a JSON-RPC envelope.
//!
//! Envelope framing, request ids, and error types live in `mcp-protocol`;
//! this crate only defines the shapes that ride inside `params` and `result`.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![allow(missing_docs)]

pub mod capabilities;
pub mod content;
pub mod definitions;
pub mod messages;

pub use capabilities::*;
pub use content::*;
pub use definitions::*;
pub use messages::*;
pub use mcp_protocol::PROTOCOL_VERSION;

/// Version of this crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
