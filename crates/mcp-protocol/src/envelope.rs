//! The JSON-RPC 2.0 envelope shared by every MCP message.
//!
//! Three shapes share `jsonrpc = "2.0"`: [`Request`], [`Notification`], and
//! [`Response`]. On the wire they are not distinguished by an explicit tag —
//! parsing looks at which fields are present, per the discrimination rule
//! below — so [`Envelope`] implements [`Deserialize`] by hand instead of
//! deriving it.

use serde::de::{self, Deserializer};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

pub const JSONRPC_VERSION: &str = "2.0";

/// A JSON-RPC request id: either a string or an integer, unique per
/// originator for the lifetime of a session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    String(String),
    Number(i64),
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => write!(f, "{s}"),
            Self::Number(n) => write!(f, "{n}"),
        }
    }
}

impl From<i64> for RequestId {
    fn from(n: i64) -> Self {
        Self::Number(n)
    }
}

impl From<String> for RequestId {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<&str> for RequestId {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

/// A JSON-RPC error object, the `error` member of a [`Response`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcError {
    #[must_use]
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    #[must_use]
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}

impl fmt::Display for JsonRpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

/// One of the three shapes a JSON-RPC message over this wire can take.
///
/// Discrimination on parse (§3 of the spec this crate implements): both
/// `method` and `id` present ⇒ [`Envelope::Request`]; `method` without `id`
/// ⇒ [`Envelope::Notification`]; `result` or `error` present ⇒
/// [`Envelope::Response`]; anything else is an "unparseable envelope" error.
#[derive(Debug, Clone, PartialEq)]
pub enum Envelope {
    Request {
        id: RequestId,
        method: String,
        params: Option<Value>,
    },
    Notification {
        method: String,
        params: Option<Value>,
    },
    Response {
        id: RequestId,
        payload: ResponsePayload,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResponsePayload {
    Result(Value),
    Error(JsonRpcError),
}

impl Envelope {
    #[must_use]
    pub fn request(id: RequestId, method: impl Into<String>, params: Option<Value>) -> Self {
        Self::Request {
            id,
            method: method.into(),
            params,
        }
    }

    #[must_use]
    pub fn notification(method: impl Into<String>, params: Option<Value>) -> Self {
        Self::Notification {
            method: method.into(),
            params,
        }
    }

    #[must_use]
    pub fn success(id: RequestId, result: Value) -> Self {
        Self::Response {
            id,
            payload: ResponsePayload::Result(result),
        }
    }

    #[must_use]
    pub fn error(id: RequestId, error: JsonRpcError) -> Self {
        Self::Response {
            id,
            payload: ResponsePayload::Error(error),
        }
    }

    #[must_use]
    pub fn is_request(&self) -> bool {
        matches!(self, Self::Request { .. })
    }

    #[must_use]
    pub fn is_notification(&self) -> bool {
        matches!(self, Self::Notification { .. })
    }

    #[must_use]
    pub fn is_response(&self) -> bool {
        matches!(self, Self::Response { .. })
    }

    #[must_use]
    pub fn method(&self) -> Option<&str> {
        match self {
            Self::Request { method, .. } | Self::Notification { method, .. } => Some(method),
            Self::Response { .. } => None,
        }
    }
}

impl Serialize for Envelope {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Request { id, method, params } => {
                let mut map = serializer.serialize_map(Some(4))?;
                map.serialize_entry("jsonrpc", JSONRPC_VERSION)?;
                map.serialize_entry("id", id)?;
                map.serialize_entry("method", method)?;
                if let Some(params) = params {
                    map.serialize_entry("params", params)?;
                }
                map.end()
            }
            Self::Notification { method, params } => {
                let mut map = serializer.serialize_map(Some(3))?;
                map.serialize_entry("jsonrpc", JSONRPC_VERSION)?;
                map.serialize_entry("method", method)?;
                if let Some(params) = params {
                    map.serialize_entry("params", params)?;
                }
                map.end()
            }
            Self::Response { id, payload } => {
                let mut map = serializer.serialize_map(Some(3))?;
                map.serialize_entry("jsonrpc", JSONRPC_VERSION)?;
                map.serialize_entry("id", id)?;
                match payload {
                    ResponsePayload::Result(result) => map.serialize_entry("result", result)?,
                    ResponsePayload::Error(error) => map.serialize_entry("error", error)?,
                }
                map.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for Envelope {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mut value = Value::deserialize(deserializer)?;
        let obj = value
            .as_object_mut()
            .ok_or_else(|| de::Error::custom("unparseable envelope: not a JSON object"))?;

        let method = obj.remove("method");
        let id = obj.remove("id");
        let result = obj.remove("result");
        let error = obj.remove("error");
        let params = obj.remove("params");

        match (method, id) {
            (Some(method), Some(id)) => {
                let method = method
                    .as_str()
                    .ok_or_else(|| de::Error::custom("method must be a string"))?
                    .to_string();
                let id: RequestId =
                    serde_json::from_value(id).map_err(|e| de::Error::custom(e.to_string()))?;
                Ok(Envelope::Request { id, method, params })
            }
            (Some(method), None) => {
                let method = method
                    .as_str()
                    .ok_or_else(|| de::Error::custom("method must be a string"))?
                    .to_string();
                Ok(Envelope::Notification { method, params })
            }
            (None, id_value) => {
                if result.is_none() && error.is_none() {
                    return Err(de::Error::custom("unparseable envelope"));
                }
                let id: RequestId = match id_value {
                    Some(id) => serde_json::from_value(id)
                        .map_err(|e| de::Error::custom(e.to_string()))?,
                    None => {
                        return Err(de::Error::custom(
                            "unparseable envelope: response missing id",
                        ));
                    }
                };
                let payload = if let Some(error) = error {
                    let error: JsonRpcError = serde_json::from_value(error)
                        .map_err(|e| de::Error::custom(e.to_string()))?;
                    ResponsePayload::Error(error)
                } else {
                    ResponsePayload::Result(result.unwrap())
                };
                Ok(Envelope::Response { id, payload })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_round_trips() {
        let env = Envelope::request(
            RequestId::Number(1),
            "initialize",
            Some(serde_json::json!({"a": 1})),
        );
        let json = serde_json::to_string(&env).unwrap();
        let parsed: Envelope = serde_json::from_str(&json).unwrap();
        assert_eq!(env, parsed);
        assert!(parsed.is_request());
    }

    #[test]
    fn notification_has_no_id() {
        let env = Envelope::notification("notifications/initialized", None);
        let json = serde_json::to_value(&env).unwrap();
        assert!(json.get("id").is_none());
        assert!(env.is_notification());
    }

    #[test]
    fn response_discriminates_on_result_or_error() {
        let ok = Envelope::success(RequestId::Number(1), serde_json::json!({"x": 1}));
        let json = serde_json::to_string(&ok).unwrap();
        let parsed: Envelope = serde_json::from_str(&json).unwrap();
        assert!(parsed.is_response());

        let err = Envelope::error(RequestId::Number(2), JsonRpcError::new(-32601, "nope"));
        let json = serde_json::to_string(&err).unwrap();
        let parsed: Envelope = serde_json::from_str(&json).unwrap();
        match parsed {
            Envelope::Response {
                payload: ResponsePayload::Error(e),
                ..
            } => assert_eq!(e.code, -32601),
            _ => panic!("expected an error response"),
        }
    }

    #[test]
    fn method_and_id_together_is_a_request_not_a_notification() {
        let json = serde_json::json!({"jsonrpc": "2.0", "id": 9, "method": "ping"});
        let env: Envelope = serde_json::from_value(json).unwrap();
        assert!(env.is_request());
    }

    #[test]
    fn neither_shape_fails_to_parse() {
        let json = serde_json::json!({"jsonrpc": "2.0", "foo": "bar"});
        let result: Result<Envelope, _> = serde_json::from_value(json);
        assert!(result.is_err());
    }

    #[test]
    fn null_fields_are_omitted_on_output() {
        let env = Envelope::notification("ping", None);
        let json = serde_json::to_string(&env).unwrap();
        assert!(!json.contains("params"));
    }
}
