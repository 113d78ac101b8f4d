//! The client role (§4.4): a typed façade over `mcp-session` that speaks
//! the client half of MCP — `initialize`, the `tools`/`resources`/`prompts`
//! list-and-call surface, `completion/complete`, and the notification feeds
//! a client listens on. Server-initiated `roots/list` and
//! `sampling/createMessage` are opt-in, answered by a caller-supplied
//! [`RootsProvider`]/[`SamplingHandler`].
//!
//! ```ignore
//! let client = ClientBuilder::new("demo-client", "0.1.0")
//!     .build(transport);
//! client.initialize().await?;
//! let tools = client.list_tools(None).await?;
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![allow(missing_docs)]

mod builder;
mod client;
mod handlers;
mod notifications;

pub use builder::ClientBuilder;
pub use client::{Client, ClientConfig};
pub use handlers::{RootsProvider, SamplingHandler};
pub use notifications::{ListChangedFeed, LogFeed};
