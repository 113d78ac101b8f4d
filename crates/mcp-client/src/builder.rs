//! Builds a [`Client`] with its declared capabilities and optional
//! server-initiated-request handlers.

use std::sync::Arc;
use std::time::Duration;

use mcp_transport::Transport;
use mcp_types::{ClientCapabilities, Implementation};

use crate::client::{Client, ClientConfig};
use crate::handlers::{RootsProvider, SamplingHandler};

/// Builder for [`Client`]. Mirrors the capability-then-transport shape
/// used by `mcp-server`'s `ServerBuilder`: declare what this side supports,
/// then hand over the transport to connect on.
pub struct ClientBuilder {
    name: String,
    version: String,
    capabilities: ClientCapabilities,
    roots_provider: Option<Arc<dyn RootsProvider>>,
    sampling_handler: Option<Arc<dyn SamplingHandler>>,
    default_request_timeout: Option<Duration>,
}

impl ClientBuilder {
    #[must_use]
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            capabilities: ClientCapabilities::default(),
            roots_provider: None,
            sampling_handler: None,
            default_request_timeout: None,
        }
    }

    /// Declare `roots` support and register the handler that answers
    /// inbound `roots/list`.
    #[must_use]
    pub fn with_roots(mut self, list_changed: bool, provider: Arc<dyn RootsProvider>) -> Self {
        self.capabilities = self.capabilities.with_roots(list_changed);
        self.roots_provider = Some(provider);
        self
    }

    /// Declare `sampling` support and register the handler that answers
    /// inbound `sampling/createMessage`.
    #[must_use]
    pub fn with_sampling(mut self, handler: Arc<dyn SamplingHandler>) -> Self {
        self.capabilities = self.capabilities.with_sampling();
        self.sampling_handler = Some(handler);
        self
    }

    #[must_use]
    pub fn with_experimental(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.capabilities
            .experimental
            .get_or_insert_with(std::collections::HashMap::new)
            .insert(key.into(), value);
        self
    }

    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.default_request_timeout = Some(timeout);
        self
    }

    /// Finish construction, binding the client to `transport`. Does not
    /// connect — call [`Client::initialize`] to drive the handshake.
    #[must_use]
    pub fn build(self, transport: Arc<dyn Transport>) -> Arc<Client> {
        Client::new(
            transport,
            Implementation::new(self.name, self.version),
            self.capabilities,
            self.roots_provider,
            self.sampling_handler,
            ClientConfig {
                default_request_timeout: self.default_request_timeout,
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declaring_roots_sets_the_capability_flag() {
        struct NoRoots;
        #[async_trait::async_trait]
        impl RootsProvider for NoRoots {
            async fn list_roots(&self) -> Vec<mcp_types::Root> {
                vec![]
            }
        }

        let builder = ClientBuilder::new("t", "0").with_roots(true, Arc::new(NoRoots));
        assert!(builder.capabilities.roots.is_some());
        assert_eq!(builder.capabilities.roots.unwrap().list_changed, Some(true));
    }
}
