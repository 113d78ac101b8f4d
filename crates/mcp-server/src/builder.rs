//! Builds an [`McpServer`] with its tool/resource/prompt/completion specs
//! and declared capabilities.
//!
//! Capabilities are computed once, at [`ServerBuilder::build`], from
//! whatever was registered up to that point (§9's "Open question —
//! resolved": capabilities are a fixed session property, not something
//! derived from live registry state mid-session).

use std::sync::Arc;
use std::time::Duration;

use mcp_transport::Transport;
use mcp_types::{CompletionReference, Prompt, Resource, ResourceTemplate, ServerCapabilities, Tool};

use crate::handlers::{CompletionHandler, PromptHandler, ResourceHandler, ToolHandler};
use crate::registry::{completion_key, CompletionSpec, PromptSpec, ResourceSpec, ToolSpec};
use crate::server::{McpServer, ServerConfig};

/// Builder for [`McpServer`]. Mirrors `mcp-client`'s `ClientBuilder`:
/// declare what this side supports by registering specs, then hand over
/// the transport to connect on.
pub struct ServerBuilder {
    name: String,
    version: String,
    instructions: Option<String>,

    tools: Vec<ToolSpec>,
    resources: Vec<ResourceSpec>,
    resource_templates: Vec<ResourceTemplate>,
    prompts: Vec<PromptSpec>,
    completions: Vec<CompletionSpec>,

    tools_list_changed: bool,
    resources_subscribe: bool,
    resources_list_changed: bool,
    prompts_list_changed: bool,
    logging: bool,

    default_request_timeout: Option<Duration>,
    list_page_size: usize,
}

impl ServerBuilder {
    #[must_use]
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            instructions: None,
            tools: Vec::new(),
            resources: Vec::new(),
            resource_templates: Vec::new(),
            prompts: Vec::new(),
            completions: Vec::new(),
            tools_list_changed: false,
            resources_subscribe: false,
            resources_list_changed: false,
            prompts_list_changed: false,
            logging: false,
            default_request_timeout: None,
            list_page_size: 50,
        }
    }

    #[must_use]
    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    /// Register a tool. Declares the `tools` capability.
    #[must_use]
    pub fn with_tool(mut self, tool: Tool, handler: Arc<dyn ToolHandler>) -> Self {
        self.tools.push(ToolSpec { tool, handler });
        self
    }

    #[must_use]
    pub fn with_tools_list_changed(mut self, enabled: bool) -> Self {
        self.tools_list_changed = enabled;
        self
    }

    /// Register a concrete, exact-URI resource. Declares the `resources`
    /// capability.
    #[must_use]
    pub fn with_resource(mut self, resource: Resource, handler: Arc<dyn ResourceHandler>) -> Self {
        self.resources.push(ResourceSpec { resource, handler });
        self
    }

    /// Register a resource template for `resources/templates/list` only
    /// (see [`crate::registry::ResourceSpec`] for why templates carry no
    /// handler of their own).
    #[must_use]
    pub fn with_resource_template(mut self, template: ResourceTemplate) -> Self {
        self.resource_templates.push(template);
        self
    }

    #[must_use]
    pub fn with_resources_subscribe(mut self, enabled: bool) -> Self {
        self.resources_subscribe = enabled;
        self
    }

    #[must_use]
    pub fn with_resources_list_changed(mut self, enabled: bool) -> Self {
        self.resources_list_changed = enabled;
        self
    }

    /// Register a prompt. Declares the `prompts` capability.
    #[must_use]
    pub fn with_prompt(mut self, prompt: Prompt, handler: Arc<dyn PromptHandler>) -> Self {
        self.prompts.push(PromptSpec { prompt, handler });
        self
    }

    #[must_use]
    pub fn with_prompts_list_changed(mut self, enabled: bool) -> Self {
        self.prompts_list_changed = enabled;
        self
    }

    /// Register a completion provider for one `ref/prompt` or
    /// `ref/resource` reference. Declares the `completions` capability.
    #[must_use]
    pub fn with_completion(
        mut self,
        reference: CompletionReference,
        handler: Arc<dyn CompletionHandler>,
    ) -> Self {
        self.completions.push(CompletionSpec { reference, handler });
        self
    }

    /// Declares the `logging` capability and enables `logging/setLevel`.
    #[must_use]
    pub fn with_logging(mut self) -> Self {
        self.logging = true;
        self
    }

    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.default_request_timeout = Some(timeout);
        self
    }

    /// Page size used by `*/list` cursor pagination. Default 50.
    #[must_use]
    pub fn with_list_page_size(mut self, size: usize) -> Self {
        self.list_page_size = size.max(1);
        self
    }

    fn capabilities(&self) -> ServerCapabilities {
        let mut caps = ServerCapabilities::new();
        if !self.tools.is_empty() {
            caps = caps.with_tools(self.tools_list_changed);
        }
        if !self.resources.is_empty() || !self.resource_templates.is_empty() {
            caps = caps.with_resources(self.resources_subscribe, self.resources_list_changed);
        }
        if !self.prompts.is_empty() {
            caps = caps.with_prompts(self.prompts_list_changed);
        }
        if !self.completions.is_empty() {
            caps = caps.with_completions();
        }
        if self.logging {
            caps = caps.with_logging();
        }
        caps
    }

    /// Finish construction and bind to `transport`. Call
    /// [`McpServer::start`](crate::McpServer::start) afterward to connect it
    /// and begin answering requests.
    #[must_use]
    pub fn build(self, transport: Arc<dyn Transport>) -> Arc<McpServer> {
        let capabilities = self.capabilities();
        let config = ServerConfig {
            default_request_timeout: self.default_request_timeout,
            list_page_size: self.list_page_size,
        };

        let server = McpServer::new(
            transport,
            self.name,
            self.version,
            self.instructions,
            capabilities,
            config,
        );

        for spec in self.tools {
            server.tools().insert(spec.tool.name.clone(), Arc::new(spec));
        }
        for spec in self.resources {
            server.resources().insert(spec.resource.uri.clone(), Arc::new(spec));
        }
        for template in self.resource_templates {
            server.resources().insert_template(template);
        }
        for spec in self.prompts {
            server.prompts().insert(spec.prompt.name.clone(), Arc::new(spec));
        }
        for spec in self.completions {
            let key = completion_key(&spec.reference);
            server.completions().insert(key, Arc::new(spec));
        }

        server
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::tool_handler_fn;
    use mcp_types::CallToolResult;

    #[test]
    fn registering_a_tool_declares_the_tools_capability() {
        let builder = ServerBuilder::new("t", "0").with_tool(
            Tool::new("echo", "echoes input"),
            tool_handler_fn(|_ex, _args| async { Ok(CallToolResult::text("ok")) }),
        );
        assert!(builder.capabilities().tools.is_some());
        assert!(builder.capabilities().resources.is_none());
    }

    #[test]
    fn no_specs_means_no_capabilities_declared() {
        let builder = ServerBuilder::new("t", "0");
        let caps = builder.capabilities();
        assert!(caps.tools.is_none());
        assert!(caps.resources.is_none());
        assert!(caps.prompts.is_none());
        assert!(caps.completions.is_none());
        assert!(caps.logging.is_none());
    }
}
