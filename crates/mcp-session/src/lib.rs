//! The protocol session: correlates outbound requests with inbound
//! responses by id, dispatches inbound requests/notifications to
//! registered handlers, and enforces the MCP lifecycle. The heart of the
//! core — see the component table in the design document this crate
//! implements.
//!
//! This crate is deliberately agnostic to which role (client or server) is
//! using it, and to the shape of MCP's typed payloads — both live one
//! layer up, in `mcp-client`/`mcp-server` and `mcp-types` respectively.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![allow(missing_docs)]

mod handlers;
mod lifecycle;
mod session;

pub use handlers::{notification_handler_fn, request_handler_fn, NotificationHandler, RequestHandler};
pub use lifecycle::LifecyclePhase;
pub use session::{Session, SessionConfig};
