use serde::{Deserialize, Serialize};

use crate::{ChatError, Result};

/// Messages an anonymous visitor may send before signing in.
pub const FREE_MESSAGE_LIMIT: u32 = 5;

/// Top-level client configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the chat API, e.g. `https://example.com/api/chat`
    pub api_base: String,
    /// Storage key of the persisted store snapshot
    pub store_name: String,
    /// localStorage key holding the bearer token
    pub auth_token_key: String,
    pub transport: TransportMode,
    pub generation: GenerationConfig,
    pub free_message_limit: u32,
    pub request_timeout_ms: u64,
    /// Longest silence tolerated between two stream chunks
    pub stream_idle_timeout_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base: "/api/chat".to_string(),
            store_name: "chat-store".to_string(),
            auth_token_key: "auth_token".to_string(),
            transport: TransportMode::Streaming,
            generation: GenerationConfig::default(),
            free_message_limit: FREE_MESSAGE_LIMIT,
            request_timeout_ms: 30_000,
            stream_idle_timeout_ms: 60_000,
        }
    }
}

impl ClientConfig {
    pub fn validate(&self) -> Result<()> {
        if self.store_name.trim().is_empty() {
            return Err(ChatError::Config("store_name must not be empty".to_string()));
        }
        if self.free_message_limit == 0 {
            return Err(ChatError::Config(
                "free_message_limit must be at least 1".to_string(),
            ));
        }
        if !(0.0..=2.0).contains(&self.generation.temperature) {
            return Err(ChatError::Config(format!(
                "temperature {} outside 0.0..=2.0",
                self.generation.temperature
            )));
        }
        if self.generation.max_tokens == 0 {
            return Err(ChatError::Config("max_tokens must be positive".to_string()));
        }
        Ok(())
    }

    /// `api_base` + `path`, without doubled slashes.
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.api_base.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

/// Which backend endpoint carries the assistant reply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportMode {
    /// Event-stream endpoint, reply assembled incrementally
    Streaming,
    /// Single request/response
    Blocking,
}

/// Generation options forwarded with every send
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub temperature: f32,
    pub max_tokens: u32,
    pub use_rag: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 1000,
            use_rag: true,
            model: None,
        }
    }
}
