use serde::{Deserialize, Serialize};

/// Configuration for the completion provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionConfig {
    /// Base URL of an OpenAI-style API.
    pub base_url: String,
    /// Credential for the provider. Absence is a precondition failure
    /// reported before any request is issued.
    pub api_key: Option<String>,
    /// Model identifier used for generated branches.
    pub model: String,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: None,
            model: "gpt-4o-mini".to_string(),
        }
    }
}

impl CompletionConfig {
    /// Build a config from the environment: `ARBOR_BASE_URL`,
    /// `ARBOR_API_KEY` (falling back to `OPENAI_API_KEY`), `ARBOR_MODEL`.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            base_url: std::env::var("ARBOR_BASE_URL").unwrap_or(defaults.base_url),
            api_key: std::env::var("ARBOR_API_KEY")
                .or_else(|_| std::env::var("OPENAI_API_KEY"))
                .ok(),
            model: std::env::var("ARBOR_MODEL").unwrap_or(defaults.model),
        }
    }
}
