//! The full catalog of method names a compliant session must route.

pub const PROTOCOL_VERSION: &str = "2024-11-05";

pub mod lifecycle {
    pub const INITIALIZE: &str = "initialize";
    pub const INITIALIZED: &str = "notifications/initialized";
    pub const PING: &str = "ping";
}

pub mod tools {
    pub const LIST: &str = "tools/list";
    pub const CALL: &str = "tools/call";
    pub const LIST_CHANGED: &str = "notifications/tools/list_changed";
}

pub mod resources {
    pub const LIST: &str = "resources/list";
    pub const READ: &str = "resources/read";
    pub const TEMPLATES_LIST: &str = "resources/templates/list";
    pub const SUBSCRIBE: &str = "resources/subscribe";
    pub const UNSUBSCRIBE: &str = "resources/unsubscribe";
    pub const LIST_CHANGED: &str = "notifications/resources/list_changed";
}

pub mod prompts {
    pub const LIST: &str = "prompts/list";
    pub const GET: &str = "prompts/get";
    pub const LIST_CHANGED: &str = "notifications/prompts/list_changed";
}

pub mod completion {
    pub const COMPLETE: &str = "completion/complete";
}

pub mod logging {
    pub const SET_LEVEL: &str = "logging/setLevel";
    pub const MESSAGE: &str = "notifications/message";
}

pub mod roots {
    pub const LIST: &str = "roots/list";
    pub const LIST_CHANGED: &str = "notifications/roots/list_changed";
}

pub mod sampling {
    pub const CREATE_MESSAGE: &str = "sampling/createMessage";
}

pub mod cancellation {
    pub const CANCELLED: &str = "notifications/cancelled";
}

/// Ordered logging levels per the MCP logging capability: lower values are
/// less severe. `logging/setLevel` sets the minimum level emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoggingLevel {
    Debug,
    Info,
    Notice,
    Warning,
    Error,
    Critical,
    Alert,
    Emergency,
}

impl LoggingLevel {
    #[must_use]
    pub const fn rank(self) -> u8 {
        match self {
            Self::Debug => 0,
            Self::Info => 1,
            Self::Notice => 2,
            Self::Warning => 3,
            Self::Error => 4,
            Self::Critical => 5,
            Self::Alert => 6,
            Self::Emergency => 7,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logging_levels_order_by_severity() {
        assert!(LoggingLevel::Debug < LoggingLevel::Info);
        assert!(LoggingLevel::Error < LoggingLevel::Emergency);
        assert_eq!(LoggingLevel::Debug.rank(), 0);
        assert_eq!(LoggingLevel::Emergency.rank(), 7);
    }

    #[test]
    fn logging_level_serde_is_lowercase() {
        let json = serde_json::to_string(&LoggingLevel::Warning).unwrap();
        assert_eq!(json, "\"warning\"");
    }
}
