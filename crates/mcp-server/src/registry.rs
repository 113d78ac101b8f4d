//! Concurrent-mutable registries backing `tools/list`, `resources/list`,
//! `resources/templates/list`, and `prompts/list`, plus the completion
//! registry backing `completion/complete`.
//!
//! Mutation happens through [`McpServer`](crate::McpServer)'s own
//! `add_*`/`remove_*` methods, which wrap these registries and fire the
//! matching `notifications/*/list_changed` afterward (§4.5: "a background
//! notifier publishes `notifications/*/list_changed` whenever the owning
//! registry mutates"). The registries themselves are ignorant of
//! notifications — they only hold specs and paginate listings.

use std::sync::Arc;

use dashmap::DashMap;

use mcp_types::{CompletionReference, Prompt, Resource, ResourceTemplate, Tool};

use crate::handlers::{CompletionHandler, PromptHandler, ResourceHandler, ToolHandler};

/// A registered tool: its wire descriptor plus the handler that answers
/// `tools/call` for it.
pub struct ToolSpec {
    pub tool: Tool,
    pub handler: Arc<dyn ToolHandler>,
}

/// A registered concrete resource: its wire descriptor plus the handler
/// that answers `resources/read` for its exact `uri`.
///
/// Dynamically-addressed resources (served from a [`ResourceTemplate`])
/// are listed via [`Registry::templates`] but are not separately
/// dispatchable here — an application that wants to serve reads for a
/// family of URIs registers one [`ResourceSpec`] per resolved URI, or
/// implements its own URI matching inside a single handler it registers
/// under each concrete URI it chooses to accept. This keeps `resources/read`
/// dispatch a plain exact-match lookup, matching the spec's literal
/// contract (a `Resource` descriptor paired with one `read` handler).
pub struct ResourceSpec {
    pub resource: Resource,
    pub handler: Arc<dyn ResourceHandler>,
}

/// A registered prompt: its wire descriptor plus the handler that answers
/// `prompts/get` for it.
pub struct PromptSpec {
    pub prompt: Prompt,
    pub handler: Arc<dyn PromptHandler>,
}

/// A registered completion provider, keyed by the exact
/// [`CompletionReference`] it answers.
pub struct CompletionSpec {
    pub reference: CompletionReference,
    pub handler: Arc<dyn CompletionHandler>,
}

/// Stable string key for a [`CompletionReference`], used as the registry's
/// map key since the reference itself isn't `Hash`.
#[must_use]
pub fn completion_key(reference: &CompletionReference) -> String {
    match reference {
        CompletionReference::Prompt { name } => format!("prompt:{name}"),
        CompletionReference::Resource { uri } => format!("resource:{uri}"),
    }
}

/// A concurrently-mutable, name-keyed registry of `T`, with its
/// matching descriptor kept alongside for listing.
pub struct Registry<T> {
    entries: DashMap<String, Arc<T>>,
    /// Resource templates have no handler of their own (see [`ResourceSpec`]
    /// doc comment) so they're tracked separately, purely for listing.
    templates: DashMap<String, ResourceTemplate>,
}

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Self {
            entries: DashMap::new(),
            templates: DashMap::new(),
        }
    }
}

impl<T> Registry<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, key: impl Into<String>, value: Arc<T>) {
        self.entries.insert(key.into(), value);
    }

    pub fn remove(&self, key: &str) -> Option<Arc<T>> {
        self.entries.remove(key).map(|(_, v)| v)
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<Arc<T>> {
        self.entries.get(key).map(|entry| Arc::clone(entry.value()))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.templates.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn values(&self) -> Vec<Arc<T>> {
        self.entries.iter().map(|entry| Arc::clone(entry.value())).collect()
    }

    pub fn insert_template(&self, template: ResourceTemplate) {
        self.templates.insert(template.uri_template.clone(), template);
    }

    pub fn remove_template(&self, uri_template: &str) -> Option<ResourceTemplate> {
        self.templates.remove(uri_template).map(|(_, v)| v)
    }

    #[must_use]
    pub fn templates(&self) -> Vec<ResourceTemplate> {
        self.templates.iter().map(|entry| entry.value().clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completion_key_discriminates_prompt_and_resource() {
        let prompt = completion_key(&CompletionReference::Prompt { name: "greeting".into() });
        let resource = completion_key(&CompletionReference::Resource { uri: "file:///x".into() });
        assert_ne!(prompt, resource);
    }

    #[test]
    fn registry_insert_get_remove_round_trips() {
        let registry: Registry<u32> = Registry::new();
        registry.insert("a", Arc::new(1));
        assert_eq!(*registry.get("a").unwrap(), 1);
        assert_eq!(registry.remove("a").map(|v| *v), Some(1));
        assert!(registry.get("a").is_none());
    }

    #[test]
    fn template_listing_is_independent_of_entries() {
        let registry: Registry<u32> = Registry::new();
        registry.insert_template(ResourceTemplate::new("file:///{path}", "files"));
        assert_eq!(registry.templates().len(), 1);
        assert!(registry.values().is_empty());
    }
}
