//! Newline-delimited JSON transport over stdin/stdout.
//!
//! The simpler of the two transports the session layer ships with: no
//! endpoint discovery, no second channel — just one envelope per line in
//! each direction. See `mcp-sse` for the other variant.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![allow(missing_docs)]

mod transport;

pub use transport::{StdioTransport, StdioTransportConfig};
