use serde::{Deserialize, Serialize};

/// Role in a conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// Identifier of a message.
///
/// Messages created optimistically on the client carry a `Local` id until
/// the backend confirms them; reconciliation swaps it for the `Server` id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageId {
    Local(String),
    Server(String),
}

impl MessageId {
    /// Fresh client-side id.
    pub fn local() -> Self {
        MessageId::Local(uuid::Uuid::new_v4().to_string())
    }

    pub fn server(id: impl Into<String>) -> Self {
        MessageId::Server(id.into())
    }

    pub fn as_str(&self) -> &str {
        match self {
            MessageId::Local(id) | MessageId::Server(id) => id,
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(self, MessageId::Local(_))
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of a message's content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    /// Assistant placeholder, nothing received yet
    Pending,
    /// Deltas are being appended
    Streaming,
    Complete,
    /// Generation was cancelled; partial content is kept
    Stopped,
    /// Exchange failed; whatever arrived is kept
    Failed,
}

impl MessageStatus {
    /// Content may still change only while the reply is being produced.
    pub fn is_mutable(&self) -> bool {
        matches!(self, MessageStatus::Pending | MessageStatus::Streaming)
    }
}

impl Default for MessageStatus {
    fn default() -> Self {
        MessageStatus::Complete
    }
}

/// A retrieved chunk of reference material attached to an assistant reply
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceCitation {
    pub chunk_id: String,
    pub document_id: String,
    /// Snippet of the chunk text
    #[serde(default)]
    pub content: String,
    pub relevance_score: f32,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub document_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub source_url: Option<String>,
}

impl SourceCitation {
    /// Clamp the relevance score into [0, 1]. NaN becomes 0.
    pub fn normalized(mut self) -> Self {
        self.relevance_score = if self.relevance_score.is_nan() {
            0.0
        } else {
            self.relevance_score.clamp(0.0, 1.0)
        };
        self
    }
}

/// A single message in a conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: MessageId,
    pub role: Role,
    pub content: String,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub sources: Vec<SourceCitation>,
    pub created_at: i64,
    #[serde(default)]
    pub status: MessageStatus,
}

impl ChatMessage {
    /// Finalized user message with a local id.
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            id: MessageId::local(),
            role: Role::User,
            content: text.into(),
            sources: Vec::new(),
            created_at: crate::now_secs(),
            status: MessageStatus::Complete,
        }
    }

    /// Empty assistant message awaiting the reply.
    pub fn assistant_placeholder() -> Self {
        Self {
            id: MessageId::local(),
            role: Role::Assistant,
            content: String::new(),
            sources: Vec::new(),
            created_at: crate::now_secs(),
            status: MessageStatus::Pending,
        }
    }

    pub fn is_user(&self) -> bool {
        self.role == Role::User
    }
}
