//! SSE + HTTP-POST transport: a long-lived server-to-client event stream
//! joined to per-message client-to-server POSTs by a runtime-discovered
//! endpoint URL. See `mcp-stdio` for the simpler newline-delimited variant.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![allow(missing_docs)]

mod transport;

pub use transport::{SseTransport, SseTransportConfig};
