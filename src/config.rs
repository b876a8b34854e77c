//! Provider credentials for task runner implementations.
//!
//! The engine itself never talks to a model provider; these settings exist
//! for the runner side, which picks whichever provider backs a host's model
//! binding. Keys are optional at load time and validated at the point of
//! use, so any combination of providers can back a run.

use anyhow::Result;
use std::env;

/// Timezone assumed for scheduled streams when the caller does not override
/// it.
pub const DEFAULT_TIMEZONE: &str = "America/New_York";

/// AI model provider credentials, loaded from the environment.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub openai_api_key: Option<String>,
    pub anthropic_api_key: Option<String>,
    pub groq_api_key: Option<String>,
    pub openrouter_api_key: Option<String>,
    pub togetherai_api_key: Option<String>,
}

impl Config {
    /// Read the provider keys from the environment. Unset keys stay `None`.
    pub fn from_env() -> Self {
        Self {
            openai_api_key: env::var("OPENAI_API_KEY").ok(),
            anthropic_api_key: env::var("ANTHROPIC_API_KEY").ok(),
            groq_api_key: env::var("GROQ_API_KEY").ok(),
            openrouter_api_key: env::var("OPENROUTER_API_KEY").ok(),
            togetherai_api_key: env::var("TOGETHERAI_API_KEY").ok(),
        }
    }

    /// Validate and return the key named `key_name`.
    ///
    /// The stored value wins; an unknown or unset name falls back to a live
    /// environment lookup. Empty values count as unset. Fails with the
    /// variable name so the operator knows what to export.
    pub fn require(&self, key_name: &str) -> Result<String> {
        let stored = match key_name {
            "OPENAI_API_KEY" => self.openai_api_key.clone(),
            "ANTHROPIC_API_KEY" => self.anthropic_api_key.clone(),
            "GROQ_API_KEY" => self.groq_api_key.clone(),
            "OPENROUTER_API_KEY" => self.openrouter_api_key.clone(),
            "TOGETHERAI_API_KEY" => self.togetherai_api_key.clone(),
            _ => None,
        };

        stored
            .filter(|value| !value.is_empty())
            .or_else(|| env::var(key_name).ok().filter(|value| !value.is_empty()))
            .ok_or_else(|| anyhow::anyhow!("{} environment variable is not set", key_name))
    }
}
