//! Conversation cache. The single source of truth the UI renders from.
//!
//! Every transition consumes the cache and returns the next one. The store
//! applies them through one update function, so concurrent callbacks (a
//! stream event racing a cancellation) can never interleave a
//! read-modify-write.

use std::collections::HashMap;
use serde::{Deserialize, Serialize};

use chat_types::{
    api::ConversationPage,
    conversation::{auto_title, is_local_id, ConversationSummary},
    message::{ChatMessage, MessageId, MessageStatus, Role, SourceCitation},
};

const PREVIEW_MAX_CHARS: usize = 100;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationCache {
    conversations: Vec<ConversationSummary>,
    messages: HashMap<String, Vec<ChatMessage>>,
    active_id: Option<String>,
    next_cursor: Option<String>,
    total_count: Option<u64>,
}

/// What `remove_conversation` took out, enough to put it back.
#[derive(Debug, Clone, PartialEq)]
pub struct RemovedConversation {
    pub index: usize,
    pub summary: ConversationSummary,
    pub messages: Option<Vec<ChatMessage>>,
    pub was_active: bool,
}

impl ConversationCache {
    pub fn new() -> Self {
        Self::default()
    }

    // ─── Reads ───────────────────────────────────────────────

    pub fn conversations(&self) -> &[ConversationSummary] {
        &self.conversations
    }

    pub fn conversation(&self, id: &str) -> Option<&ConversationSummary> {
        self.conversations.iter().find(|c| c.id == id)
    }

    /// Messages of a conversation, empty when nothing is cached.
    pub fn messages(&self, conversation_id: &str) -> &[ChatMessage] {
        self.messages
            .get(conversation_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn message(&self, conversation_id: &str, id: &MessageId) -> Option<&ChatMessage> {
        self.messages(conversation_id).iter().find(|m| &m.id == id)
    }

    pub fn has_messages_for(&self, conversation_id: &str) -> bool {
        self.messages.contains_key(conversation_id)
    }

    pub fn active_id(&self) -> Option<&str> {
        self.active_id.as_deref()
    }

    pub fn next_cursor(&self) -> Option<&str> {
        self.next_cursor.as_deref()
    }

    pub fn total_count(&self) -> Option<u64> {
        self.total_count
    }

    pub fn last_user_message(&self, conversation_id: &str) -> Option<&ChatMessage> {
        self.messages(conversation_id).iter().rev().find(|m| m.is_user())
    }

    // ─── Conversation list ───────────────────────────────────

    /// First page after a reset: cursor and backend listing come from `page`.
    ///
    /// Conversations in `pinned` (the one on screen, the one a reply is
    /// streaming into) and local ones survive even when the page does not
    /// list them; they stay in front with their messages. Everything else
    /// missing from the page is pruned.
    #[must_use]
    pub fn replace_page(mut self, page: ConversationPage, pinned: &[String]) -> Self {
        let listed = |id: &str| page.conversations.iter().any(|c| c.id == id);
        let keep = |id: &str| is_local_id(id) || pinned.iter().any(|p| p == id);

        let mut conversations: Vec<ConversationSummary> = std::mem::take(&mut self.conversations)
            .into_iter()
            .filter(|c| keep(&c.id) && !listed(&c.id))
            .collect();
        conversations.extend(page.conversations.iter().cloned());
        self.messages
            .retain(|id, _| keep(id) || listed(id));

        self.conversations = conversations;
        self.next_cursor = page.next_cursor;
        self.total_count = Some(page.total_count);
        self
    }

    /// A further page. Conversations already listed are skipped, since
    /// local inserts shift the backend's offsets.
    #[must_use]
    pub fn append_page(mut self, page: ConversationPage) -> Self {
        for summary in page.conversations {
            if self.conversation(&summary.id).is_none() {
                self.conversations.push(summary);
            }
        }
        self.next_cursor = page.next_cursor;
        self.total_count = Some(page.total_count);
        self
    }

    /// Put a conversation at the front, whatever the backend ordering.
    #[must_use]
    pub fn prepend_conversation(mut self, summary: ConversationSummary) -> Self {
        self.conversations.retain(|c| c.id != summary.id);
        self.messages.entry(summary.id.clone()).or_default();
        self.conversations.insert(0, summary);
        self
    }

    #[must_use]
    pub fn remove_conversation(mut self, id: &str) -> (Self, Option<RemovedConversation>) {
        let Some(index) = self.conversations.iter().position(|c| c.id == id) else {
            return (self, None);
        };
        let summary = self.conversations.remove(index);
        let messages = self.messages.remove(id);
        let was_active = self.active_id.as_deref() == Some(id);
        if was_active {
            self.active_id = None;
        }
        let removed = RemovedConversation { index, summary, messages, was_active };
        (self, Some(removed))
    }

    /// Undo a `remove_conversation`.
    #[must_use]
    pub fn restore_conversation(mut self, removed: RemovedConversation) -> Self {
        if self.conversation(&removed.summary.id).is_some() {
            return self;
        }
        let index = removed.index.min(self.conversations.len());
        let id = removed.summary.id.clone();
        self.conversations.insert(index, removed.summary);
        if let Some(messages) = removed.messages {
            self.messages.insert(id.clone(), messages);
        }
        if removed.was_active && self.active_id.is_none() {
            self.active_id = Some(id);
        }
        self
    }

    /// Replace a summary in place with a server-confirmed one.
    #[must_use]
    pub fn upsert_summary(mut self, summary: ConversationSummary) -> Self {
        match self.conversations.iter_mut().find(|c| c.id == summary.id) {
            Some(existing) => *existing = summary,
            None => self.conversations.insert(0, summary),
        }
        self
    }

    #[must_use]
    pub fn rename(mut self, id: &str, title: &str) -> Self {
        if let Some(conv) = self.conversations.iter_mut().find(|c| c.id == id) {
            conv.title = Some(title.to_string());
        }
        self
    }

    /// Name an untitled conversation after its first message.
    #[must_use]
    pub fn title_if_untitled(mut self, id: &str, first_message: &str) -> Self {
        if let Some(conv) = self.conversations.iter_mut().find(|c| c.id == id) {
            if conv.title.as_deref().map_or(true, |t| t.trim().is_empty()) {
                conv.title = Some(auto_title(first_message));
            }
        }
        self
    }

    /// Record a finished exchange on the summary.
    #[must_use]
    pub fn touch_summary(mut self, id: &str, added_messages: u32, preview: &str, now: i64) -> Self {
        if let Some(conv) = self.conversations.iter_mut().find(|c| c.id == id) {
            conv.message_count = conv.message_count.saturating_add(added_messages);
            if !preview.is_empty() {
                conv.preview = Some(preview.chars().take(PREVIEW_MAX_CHARS).collect());
            }
            conv.updated_at = now;
        }
        self
    }

    #[must_use]
    pub fn set_active(mut self, id: Option<String>) -> Self {
        self.active_id = id;
        self
    }

    // ─── Messages ────────────────────────────────────────────

    #[must_use]
    pub fn set_messages(mut self, conversation_id: &str, messages: Vec<ChatMessage>) -> Self {
        self.messages.insert(conversation_id.to_string(), messages);
        self
    }

    #[must_use]
    pub fn append_messages(
        mut self,
        conversation_id: &str,
        messages: impl IntoIterator<Item = ChatMessage>,
    ) -> Self {
        self.messages
            .entry(conversation_id.to_string())
            .or_default()
            .extend(messages);
        self
    }

    /// Write the accumulated reply into a placeholder. Finalized messages
    /// are left alone.
    #[must_use]
    pub fn apply_stream_progress(
        self,
        conversation_id: &str,
        id: &MessageId,
        content: &str,
        sources: &[SourceCitation],
    ) -> Self {
        self.update_message(conversation_id, id, |msg| {
            if msg.status.is_mutable() {
                msg.content = content.to_string();
                msg.sources = sources.to_vec();
                msg.status = MessageStatus::Streaming;
            }
        })
    }

    /// Finalize a placeholder (complete, stopped or failed).
    #[must_use]
    pub fn finalize(self, conversation_id: &str, id: &MessageId, status: MessageStatus) -> Self {
        self.update_message(conversation_id, id, |msg| {
            if msg.status.is_mutable() {
                msg.status = status;
            }
        })
    }

    /// Swap the local placeholder `temp_id` for the server record, at the
    /// same position. A placeholder that is gone (deleted conversation,
    /// bulk replace) is not resurrected.
    #[must_use]
    pub fn reconcile(mut self, conversation_id: &str, temp_id: &MessageId, server: ChatMessage) -> Self {
        let Some(list) = self.messages.get_mut(conversation_id) else {
            return self;
        };
        if list.iter().any(|m| m.id == server.id) {
            list.retain(|m| &m.id != temp_id);
            return self;
        }
        if let Some(slot) = list.iter_mut().find(|m| &m.id == temp_id) {
            *slot = server;
        }
        self
    }

    /// Replace the text of a user message.
    #[must_use]
    pub fn edit_content(self, conversation_id: &str, id: &MessageId, content: &str) -> Self {
        self.update_message(conversation_id, id, |msg| {
            if msg.role == Role::User {
                msg.content = content.to_string();
            }
        })
    }

    /// Drop every message after `id`; `id` itself stays.
    #[must_use]
    pub fn truncate_after(mut self, conversation_id: &str, id: &MessageId) -> Self {
        if let Some(list) = self.messages.get_mut(conversation_id) {
            if let Some(pos) = list.iter().position(|m| &m.id == id) {
                list.truncate(pos + 1);
            }
        }
        self
    }

    fn update_message(
        mut self,
        conversation_id: &str,
        id: &MessageId,
        f: impl FnOnce(&mut ChatMessage),
    ) -> Self {
        if let Some(msg) = self
            .messages
            .get_mut(conversation_id)
            .and_then(|list| list.iter_mut().find(|m| &m.id == id))
        {
            f(msg);
        }
        self
    }
}
