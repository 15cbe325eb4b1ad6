use serde::{Deserialize, Serialize};

/// Prefix marking conversations that only exist on this client.
pub const LOCAL_CONVERSATION_PREFIX: &str = "local-";

/// Title length used when a conversation is named after its first message.
pub const AUTO_TITLE_MAX_CHARS: usize = 50;

/// Summary of a conversation for listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub message_count: u32,
    #[serde(rename = "last_message_preview", default)]
    pub preview: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl ConversationSummary {
    /// A conversation that has not been persisted by the backend.
    pub fn new_local(title: Option<String>) -> Self {
        let now = crate::now_secs();
        Self {
            id: format!("{}{}", LOCAL_CONVERSATION_PREFIX, uuid::Uuid::new_v4()),
            title,
            message_count: 0,
            preview: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_local(&self) -> bool {
        is_local_id(&self.id)
    }
}

pub fn is_local_id(id: &str) -> bool {
    id.starts_with(LOCAL_CONVERSATION_PREFIX)
}

/// Title derived from the first user message.
pub fn auto_title(text: &str) -> String {
    let trimmed = text.trim();
    let mut title: String = trimmed.chars().take(AUTO_TITLE_MAX_CHARS).collect();
    if trimmed.chars().count() > AUTO_TITLE_MAX_CHARS {
        title.push_str("...");
    }
    title
}
