//! Port traits at the hexagonal architecture boundary.
//!
//! These traits are defined here in `chat-core` (pure Rust).
//! Implementations live in `chat-platform` (browser adapters).
//! The core never imports platform code; it only depends on these traits.

use std::pin::Pin;
use async_trait::async_trait;
use futures::Stream;
use chat_types::{
    Result,
    api::{ConversationDetail, ConversationPage, MessageReply, MessageRequest},
    conversation::ConversationSummary,
};

// ─── Chat API Port ───────────────────────────────────────────

/// Raw body of an event-stream response, one network read per item.
/// The stream ends when the server closes the connection.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>>>>>;

#[async_trait(?Send)]
pub trait ChatApiPort {
    /// `GET /conversations[?cursor=]`
    async fn list_conversations(&self, cursor: Option<&str>) -> Result<ConversationPage>;

    /// `GET /conversations/{id}`
    async fn get_conversation(&self, id: &str) -> Result<ConversationDetail>;

    /// `POST /conversations`
    async fn create_conversation(&self, title: Option<&str>) -> Result<ConversationSummary>;

    /// `PATCH /conversations/{id}`
    async fn rename_conversation(&self, id: &str, title: &str) -> Result<ConversationSummary>;

    /// `DELETE /conversations/{id}`
    async fn delete_conversation(&self, id: &str) -> Result<()>;

    /// `POST /conversations/{id}/messages`, blocking reply
    async fn send_message(&self, conversation_id: &str, req: &MessageRequest) -> Result<MessageReply>;

    /// `GET /conversations/{id}/stream`, opens the event stream.
    /// Resolves once response headers arrive; the body is read lazily.
    async fn open_stream(&self, conversation_id: &str, req: &MessageRequest) -> Result<ByteStream>;
}

// ─── Auth Port ───────────────────────────────────────────────

/// Holder of the bearer token. Absence of a token means anonymous usage.
pub trait AuthPort {
    fn bearer_token(&self) -> Option<String>;

    fn is_authenticated(&self) -> bool {
        self.bearer_token().map_or(false, |t| !t.is_empty())
    }
}

// ─── Storage Port ────────────────────────────────────────────

#[async_trait(?Send)]
pub trait StoragePort {
    /// Get a value by key
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Set a value
    async fn set(&self, key: &str, value: &[u8]) -> Result<()>;

    /// Name of this backend (for logging/debug)
    fn backend_name(&self) -> &str;
}
