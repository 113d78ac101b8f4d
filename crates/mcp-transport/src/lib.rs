//! The [`Transport`] contract shared by every concrete transport
//! (`mcp-stdio`, `mcp-sse`): connect with a handler that inbound envelopes
//! are pushed to, send an outbound envelope, close.
//!
//! A transport never blocks a caller's `send` on handler execution, and
//! never interprets envelope contents — correlation, dispatch, and the
//! session lifecycle all live one layer up in `mcp-session`.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod traits;

pub use config::TransportConfig;
pub use traits::{Transport, TransportHandler};
