//! A unified error type threaded through every crate in this workspace.
//!
//! `McpError` covers both errors that cross the wire as a JSON-RPC error
//! object and session-local errors that never do (`SessionClosed`,
//! `Timeout`, `Cancelled`). `ErrorKind::jsonrpc_code` is the single place
//! that maps the former onto the JSON-RPC integer code space.

use serde_json::Value;
use std::fmt;

use crate::envelope::JsonRpcError;

pub type McpResult<T> = Result<T, McpError>;

/// Classification of an [`McpError`]. Determines its JSON-RPC code (where
/// one exists) and whether it is ever legal to hand to the wire codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed JSON on the wire. `-32700`.
    ParseError,
    /// Well-formed JSON that did not match any envelope shape. `-32600`.
    InvalidRequest,
    /// No handler registered for the method. `-32601`.
    MethodNotFound,
    /// Handler rejected the supplied params. `-32602`.
    InvalidParams,
    /// Handler failed for a reason not covered by a more specific kind.
    /// `-32603`.
    Internal,
    /// Attempting to use a method tied to a capability neither side has
    /// negotiated. Refused locally before send; never itself crosses the
    /// wire (the peer's own `MethodNotFound` is what a remote peer sees).
    CapabilityNotSupported,
    /// The underlying transport closed or failed. Session-local.
    Transport,
    /// The session was closed while a request was outstanding.
    /// Session-local; never crosses the wire.
    SessionClosed,
    /// A request's deadline elapsed before a response arrived.
    /// Session-local; never crosses the wire (though it triggers a
    /// `notifications/cancelled` send).
    Timeout,
    /// A request was explicitly cancelled. Session-local as experienced by
    /// the caller; the *notification* announcing it does cross the wire.
    Cancelled,
}

impl ErrorKind {
    /// The JSON-RPC error code for kinds that are legal to put on the wire,
    /// or `None` for the three session-local kinds.
    #[must_use]
    pub const fn jsonrpc_code(self) -> Option<i32> {
        match self {
            Self::ParseError => Some(-32700),
            Self::InvalidRequest => Some(-32600),
            Self::MethodNotFound | Self::CapabilityNotSupported => Some(-32601),
            Self::InvalidParams => Some(-32602),
            Self::Internal => Some(-32603),
            Self::Transport => Some(-32603),
            Self::SessionClosed | Self::Timeout | Self::Cancelled => None,
        }
    }

    /// Whether this kind may ever be serialized as a JSON-RPC error object.
    #[must_use]
    pub const fn crosses_wire(self) -> bool {
        self.jsonrpc_code().is_some()
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::ParseError => "parse error",
            Self::InvalidRequest => "invalid request",
            Self::MethodNotFound => "method not found",
            Self::InvalidParams => "invalid params",
            Self::Internal => "internal error",
            Self::CapabilityNotSupported => "capability not supported",
            Self::Transport => "transport error",
            Self::SessionClosed => "session closed",
            Self::Timeout => "timeout",
            Self::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone)]
pub struct McpError {
    pub kind: ErrorKind,
    pub message: String,
    pub data: Option<Value>,
}

impl McpError {
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            data: None,
        }
    }

    #[must_use]
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    #[must_use]
    pub fn parse_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ParseError, message)
    }

    #[must_use]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidRequest, message)
    }

    #[must_use]
    pub fn method_not_found(method: impl AsRef<str>) -> Self {
        Self::new(
            ErrorKind::MethodNotFound,
            format!("Method not found: {}", method.as_ref()),
        )
    }

    #[must_use]
    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidParams, message)
    }

    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    #[must_use]
    pub fn capability_not_supported(method: impl AsRef<str>) -> Self {
        Self::new(
            ErrorKind::CapabilityNotSupported,
            format!(
                "capability not supported for method: {}",
                method.as_ref()
            ),
        )
    }

    #[must_use]
    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Transport, message)
    }

    #[must_use]
    pub fn session_closed() -> Self {
        Self::new(ErrorKind::SessionClosed, "session closed")
    }

    #[must_use]
    pub fn timeout() -> Self {
        Self::new(ErrorKind::Timeout, "request timed out")
    }

    #[must_use]
    pub fn cancelled() -> Self {
        Self::new(ErrorKind::Cancelled, "request cancelled")
    }

    /// Convert to a wire [`JsonRpcError`]. Panics in debug builds if called
    /// on a session-local kind that has no wire representation — those must
    /// be handled inside the session and never reach the codec.
    #[must_use]
    pub fn into_jsonrpc_error(self) -> JsonRpcError {
        debug_assert!(
            self.kind.crosses_wire(),
            "attempted to serialize a session-local error kind ({:?}) onto the wire",
            self.kind
        );
        let code = self.kind.jsonrpc_code().unwrap_or(-32603);
        let mut error = JsonRpcError::new(code, self.message);
        if let Some(data) = self.data {
            error = error.with_data(data);
        }
        error
    }
}

impl fmt::Display for McpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)
    }
}

impl std::error::Error for McpError {}

impl From<serde_json::Error> for McpError {
    fn from(err: serde_json::Error) -> Self {
        use serde_json::error::Category;
        match err.classify() {
            Category::Syntax | Category::Eof => Self::parse_error(err.to_string()),
            Category::Data => Self::invalid_params(err.to_string()),
            Category::Io => Self::transport(err.to_string()),
        }
    }
}

impl From<std::io::Error> for McpError {
    fn from(err: std::io::Error) -> Self {
        Self::transport(err.to_string())
    }
}

impl From<JsonRpcError> for McpError {
    fn from(err: JsonRpcError) -> Self {
        let kind = match err.code {
            -32700 => ErrorKind::ParseError,
            -32600 => ErrorKind::InvalidRequest,
            -32601 => ErrorKind::MethodNotFound,
            -32602 => ErrorKind::InvalidParams,
            _ => ErrorKind::Internal,
        };
        let mut e = McpError::new(kind, err.message);
        e.data = err.data;
        e
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_local_kinds_have_no_wire_code() {
        assert_eq!(ErrorKind::SessionClosed.jsonrpc_code(), None);
        assert_eq!(ErrorKind::Timeout.jsonrpc_code(), None);
        assert_eq!(ErrorKind::Cancelled.jsonrpc_code(), None);
    }

    #[test]
    fn standard_codes_match_spec() {
        assert_eq!(ErrorKind::ParseError.jsonrpc_code(), Some(-32700));
        assert_eq!(ErrorKind::InvalidRequest.jsonrpc_code(), Some(-32600));
        assert_eq!(ErrorKind::MethodNotFound.jsonrpc_code(), Some(-32601));
        assert_eq!(ErrorKind::InvalidParams.jsonrpc_code(), Some(-32602));
        assert_eq!(ErrorKind::Internal.jsonrpc_code(), Some(-32603));
    }

    #[test]
    fn capability_not_supported_maps_to_method_not_found_on_wire() {
        let err = McpError::capability_not_supported("resources/subscribe");
        assert_eq!(err.into_jsonrpc_error().code, -32601);
    }

    #[test]
    #[should_panic]
    fn session_closed_cannot_be_serialized_onto_wire() {
        let _ = McpError::session_closed().into_jsonrpc_error();
    }

    #[test]
    fn from_json_syntax_error_is_parse_error() {
        let err: serde_json::Error = serde_json::from_str::<Value>("{not json").unwrap_err();
        let mcp: McpError = err.into();
        assert_eq!(mcp.kind, ErrorKind::ParseError);
    }
}
