//! Host configuration and the per-run host registry.
//!
//! A `Host` pairs a persona (role, goal, attributes) with the model binding
//! and tool names used to generate its segments. Hosts are defined by the
//! caller before a run and never mutated; the engine only looks them up by
//! id in a `HostRegistry`.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

use crate::types::{HostId, ModelId, ToolName};

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    4000
}

/// Model binding for a host: a single model handle, or an ordered list of
/// handles the task runner tries in sequence as fallbacks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ModelBinding {
    /// One model handle.
    Single(ModelId),
    /// Ordered fallback chain; earlier entries are preferred.
    Fallback(Vec<ModelId>),
}

impl ModelBinding {
    /// The preferred model handle in this binding, if any.
    pub fn primary(&self) -> Option<&ModelId> {
        match self {
            Self::Single(id) => Some(id),
            Self::Fallback(ids) => ids.first(),
        }
    }
}

impl From<ModelId> for ModelBinding {
    fn from(id: ModelId) -> Self {
        Self::Single(id)
    }
}

impl From<&str> for ModelBinding {
    fn from(id: &str) -> Self {
        Self::Single(ModelId::from(id))
    }
}

impl From<Vec<ModelId>> for ModelBinding {
    fn from(ids: Vec<ModelId>) -> Self {
        Self::Fallback(ids)
    }
}

/// An AI host that creates and presents segments of an interactive stream.
///
/// A host is responsible for engaging with viewers through dynamic content
/// generation, storytelling, and real-time interaction. The engine builds a
/// per-segment system message from `role`, `goal` and `attributes`; the
/// remaining fields are carried to the task runner untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Host {
    /// Unique identifier for the AI host.
    pub host_id: HostId,
    /// The persona or character type of the AI host.
    pub role: String,
    /// The objective or purpose of the interactive experience.
    pub goal: String,
    /// Additional personality traits or characteristics, free text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<String>,
    /// The model(s) powering the host. A list is an ordered fallback chain.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub llm: Option<ModelBinding>,
    /// Tools available for enhancing the experience (media handling, data
    /// processing, ...). Names only; implementations live in the runner.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<BTreeSet<ToolName>>,
    /// Creativity level for the model's responses. Higher values (0-1)
    /// increase creativity.
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Maximum length of the model's responses in tokens.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

impl Host {
    /// Create a host with the required fields and default generation
    /// parameters (temperature 0.7, max_tokens 4000).
    pub fn new(
        host_id: impl Into<HostId>,
        role: impl Into<String>,
        goal: impl Into<String>,
    ) -> Self {
        Self {
            host_id: host_id.into(),
            role: role.into(),
            goal: goal.into(),
            attributes: None,
            llm: None,
            tools: None,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }

    /// Set the free-text attributes describing the host's personality.
    pub fn with_attributes(mut self, attributes: impl Into<String>) -> Self {
        self.attributes = Some(attributes.into());
        self
    }

    /// Bind the host to a model or fallback chain.
    pub fn with_llm(mut self, llm: impl Into<ModelBinding>) -> Self {
        self.llm = Some(llm.into());
        self
    }

    /// Set the tools available to this host.
    pub fn with_tools(mut self, tools: impl IntoIterator<Item = ToolName>) -> Self {
        self.tools = Some(tools.into_iter().collect());
        self
    }

    /// Override the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Override the response token limit.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

/// Immutable mapping from host id to host configuration.
///
/// Built once per run from the caller's host definitions. A duplicate
/// `host_id` replaces the earlier definition (last write wins).
#[derive(Debug, Clone, Default)]
pub struct HostRegistry {
    hosts: HashMap<HostId, Host>,
}

impl HostRegistry {
    /// Build a registry from host definitions.
    pub fn new(hosts: impl IntoIterator<Item = Host>) -> Self {
        Self {
            hosts: hosts
                .into_iter()
                .map(|host| (host.host_id.clone(), host))
                .collect(),
        }
    }

    /// Look up a host by id.
    pub fn get(&self, host_id: &str) -> Option<&Host> {
        self.hosts.get(host_id)
    }

    /// Check whether a host with the given id is registered.
    pub fn contains(&self, host_id: &str) -> bool {
        self.hosts.contains_key(host_id)
    }

    /// All registered host ids, sorted.
    pub fn host_ids(&self) -> Vec<HostId> {
        let mut ids: Vec<HostId> = self.hosts.keys().cloned().collect();
        ids.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        ids
    }

    /// Return the number of registered hosts.
    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    /// Return `true` if no hosts are registered.
    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }

    /// Render the registered hosts as a summary block, sorted by id, for
    /// embedding in outer-level tool or prompt descriptions:
    ///
    /// ```text
    /// - narrator
    ///     (narrator's tools: file_read, web_search)
    /// - producer
    ///     (producer's tools: No tools)
    /// ```
    pub fn roster(&self) -> String {
        let mut entries: Vec<(&HostId, &Host)> = self.hosts.iter().collect();
        entries.sort_by(|(a, _), (b, _)| a.as_str().cmp(b.as_str()));

        entries
            .iter()
            .map(|(id, host)| {
                let tools = host
                    .tools
                    .as_ref()
                    .filter(|tools| !tools.is_empty())
                    .map(|tools| {
                        tools
                            .iter()
                            .map(ToolName::as_str)
                            .collect::<Vec<_>>()
                            .join(", ")
                    })
                    .unwrap_or_else(|| "No tools".to_string());
                format!("- {}\n    ({}'s tools: {})", id, id, tools)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_defaults() {
        let host = Host::new("narrator", "Storyteller", "Narrate the stream");
        assert_eq!(host.host_id.as_str(), "narrator");
        assert_eq!(host.temperature, 0.7);
        assert_eq!(host.max_tokens, 4000);
        assert!(host.attributes.is_none());
        assert!(host.llm.is_none());
        assert!(host.tools.is_none());
    }

    #[test]
    fn test_host_builder_chain() {
        let host = Host::new("producer", "Producer", "Plan the show")
            .with_attributes("Calm and structured")
            .with_llm("openai/gpt-4o")
            .with_tools([ToolName::new("web_search"), ToolName::new("file_read")])
            .with_temperature(0.2)
            .with_max_tokens(800);

        assert_eq!(host.attributes.as_deref(), Some("Calm and structured"));
        assert_eq!(
            host.llm,
            Some(ModelBinding::Single(ModelId::new("openai/gpt-4o")))
        );
        assert_eq!(host.tools.as_ref().map(|t| t.len()), Some(2));
        assert_eq!(host.temperature, 0.2);
        assert_eq!(host.max_tokens, 800);
    }

    #[test]
    fn test_model_binding_primary() {
        let single = ModelBinding::Single(ModelId::new("claude-sonnet"));
        assert_eq!(single.primary().map(ModelId::as_str), Some("claude-sonnet"));

        let fallback = ModelBinding::Fallback(vec![
            ModelId::new("openai/gpt-4o"),
            ModelId::new("groq/llama"),
        ]);
        assert_eq!(
            fallback.primary().map(ModelId::as_str),
            Some("openai/gpt-4o")
        );

        let empty = ModelBinding::Fallback(Vec::new());
        assert!(empty.primary().is_none());
    }

    #[test]
    fn test_model_binding_deserializes_string_or_list() {
        let single: ModelBinding = serde_json::from_str("\"openai/gpt-4o\"").unwrap();
        assert_eq!(single, ModelBinding::Single(ModelId::new("openai/gpt-4o")));

        let fallback: ModelBinding =
            serde_json::from_str("[\"openai/gpt-4o\", \"groq/llama\"]").unwrap();
        assert_eq!(
            fallback,
            ModelBinding::Fallback(vec![ModelId::new("openai/gpt-4o"), ModelId::new("groq/llama")])
        );
    }

    #[test]
    fn test_registry_lookup() {
        let registry = HostRegistry::new([
            Host::new("narrator", "Storyteller", "Narrate"),
            Host::new("producer", "Producer", "Plan"),
        ]);

        assert_eq!(registry.len(), 2);
        assert!(registry.contains("narrator"));
        assert!(registry.get("producer").is_some());
        assert!(registry.get("unknown").is_none());
    }

    #[test]
    fn test_registry_duplicate_id_last_wins() {
        let registry = HostRegistry::new([
            Host::new("narrator", "First", "Old goal"),
            Host::new("narrator", "Second", "New goal"),
        ]);

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("narrator").map(|h| h.role.as_str()), Some("Second"));
    }

    #[test]
    fn test_registry_host_ids_sorted() {
        let registry = HostRegistry::new([
            Host::new("zeta", "Z", "Z"),
            Host::new("alpha", "A", "A"),
            Host::new("mid", "M", "M"),
        ]);

        let ids = registry.host_ids();
        let ids: Vec<&str> = ids.iter().map(|id| id.as_str()).collect();
        assert_eq!(ids, vec!["alpha", "mid", "zeta"]);
    }

    #[test]
    fn test_roster_lists_tools_sorted_by_host() {
        let registry = HostRegistry::new([
            Host::new("producer", "Producer", "Plan"),
            Host::new("narrator", "Storyteller", "Narrate")
                .with_tools([ToolName::new("web_search"), ToolName::new("file_read")]),
        ]);

        let roster = registry.roster();
        let expected = "- narrator\n    (narrator's tools: file_read, web_search)\n\
                        - producer\n    (producer's tools: No tools)";
        assert_eq!(roster, expected);
    }

    #[test]
    fn test_roster_empty_tool_set_reads_no_tools() {
        let registry = HostRegistry::new([
            Host::new("narrator", "Storyteller", "Narrate").with_tools(Vec::<ToolName>::new()),
        ]);

        assert!(registry.roster().contains("narrator's tools: No tools"));
    }
}
