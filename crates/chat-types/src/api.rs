//! Request and response bodies of the chat backend.

use serde::{Deserialize, Serialize};

use crate::config::GenerationConfig;
use crate::conversation::ConversationSummary;
use crate::message::{ChatMessage, MessageId, MessageStatus, Role, SourceCitation};

/// `GET /conversations[?cursor=]`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationPage {
    pub conversations: Vec<ConversationSummary>,
    #[serde(default)]
    pub next_cursor: Option<String>,
    pub total_count: u64,
}

/// `GET /conversations/{id}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationDetail {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    pub messages: Vec<WireMessage>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl ConversationDetail {
    pub fn into_messages(self) -> Vec<ChatMessage> {
        self.messages.into_iter().map(ChatMessage::from).collect()
    }
}

/// A message as the backend serializes it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireMessage {
    pub id: String,
    pub role: Role,
    pub content: String,
    #[serde(default)]
    pub sources: Vec<SourceCitation>,
    pub created_at: i64,
}

impl From<WireMessage> for ChatMessage {
    fn from(wire: WireMessage) -> Self {
        ChatMessage {
            id: MessageId::Server(wire.id),
            role: wire.role,
            content: wire.content,
            sources: wire.sources.into_iter().map(SourceCitation::normalized).collect(),
            created_at: wire.created_at,
            status: MessageStatus::Complete,
        }
    }
}

/// `POST /conversations`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateConversationBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

/// `PATCH /conversations/{id}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenameConversationBody {
    pub title: String,
}

/// Input for both the blocking and the streaming send endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageRequest {
    pub message: String,
    pub config: GenerationConfig,
}

impl MessageRequest {
    /// Query parameters of `GET /conversations/{id}/stream`.
    pub fn stream_query(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("message", self.message.clone()),
            ("temperature", self.config.temperature.to_string()),
            ("max_tokens", self.config.max_tokens.to_string()),
            ("use_rag", self.config.use_rag.to_string()),
        ];
        if let Some(model) = &self.config.model {
            params.push(("model", model.clone()));
        }
        params
    }
}

/// `POST /conversations/{id}/messages`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageReply {
    pub message_id: String,
    pub conversation_id: String,
    pub role: Role,
    pub content: String,
    #[serde(default)]
    pub sources: Vec<SourceCitation>,
    #[serde(default)]
    pub metrics: Option<ChatMetrics>,
    pub created_at: i64,
}

impl MessageReply {
    /// The server-confirmed message that replaces the local placeholder.
    pub fn to_message(&self) -> ChatMessage {
        ChatMessage {
            id: MessageId::server(&self.message_id),
            role: self.role,
            content: self.content.clone(),
            sources: self.sources.iter().cloned().map(SourceCitation::normalized).collect(),
            created_at: self.created_at,
            status: MessageStatus::Complete,
        }
    }
}

/// Generation statistics reported by the backend
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatMetrics {
    pub tokens_used: i64,
    pub context_tokens: i64,
    pub response_tokens: i64,
    pub latency_ms: f64,
    pub sources_retrieved: i64,
}
