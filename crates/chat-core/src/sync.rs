//! Session synchronizer: conversation list and history against the backend.
//!
//! Listing and history are skipped (not attempted) without a token.
//! Failures are recorded on the store; the cache keeps its last good state.

use std::future::Future;

use chat_types::{
    Result,
    conversation::{is_local_id, ConversationSummary},
    event::StoreEvent,
};
use crate::cache::RemovedConversation;
use crate::store::{require_text, ChatStore};

impl ChatStore {
    /// Load conversations. `reset` starts over from the first page;
    /// otherwise the next page after the stored cursor is appended.
    pub async fn fetch_conversations(&self, reset: bool) {
        if !self.is_authenticated() {
            log::debug!("Skipping conversation fetch: not signed in");
            return;
        }

        let cursor = if reset {
            None
        } else {
            let state = self.state.borrow();
            match (state.cache.next_cursor(), state.cache.total_count()) {
                (Some(cursor), _) => Some(cursor.to_string()),
                // A page was loaded and the backend reported no further one
                (None, Some(_)) => {
                    log::debug!("No further conversation page");
                    return;
                }
                (None, None) => None,
            }
        };

        self.set_loading(true);
        let result = self.api.list_conversations(cursor.as_deref()).await;
        self.set_loading(false);

        match result {
            Ok(page) => {
                log::info!(
                    "Fetched {} conversations ({} total)",
                    page.conversations.len(),
                    page.total_count
                );
                if reset || cursor.is_none() {
                    let pinned: Vec<String> = self
                        .active_conversation_id()
                        .into_iter()
                        .chain(self.in_flight_conversation())
                        .collect();
                    self.update(|c| c.replace_page(page, &pinned));
                } else {
                    self.update(|c| c.append_page(page));
                }
                self.event_bus.emit(StoreEvent::ConversationsChanged);
                self.persist().await;
            }
            Err(e) => self.record_error(&e),
        }
    }

    /// Switch to a conversation. The selection happens before this returns;
    /// the returned future loads its history. A failed load keeps the
    /// selection.
    pub fn select_conversation<'a>(&'a self, id: &str) -> impl Future<Output = ()> + 'a {
        let id = id.to_string();
        self.set_active_conversation(&id);
        async move { self.load_history(&id).await }
    }

    /// Synchronous half of `select_conversation`.
    pub fn set_active_conversation(&self, id: &str) {
        self.update(|c| c.set_active(Some(id.to_string())));
        self.event_bus.emit(StoreEvent::ActiveConversationChanged { id: Some(id.to_string()) });
    }

    /// Fetch a conversation's history and replace the cached messages.
    /// Local conversations have no history on the backend.
    pub async fn load_history(&self, id: &str) {
        if !self.is_authenticated() || is_local_id(id) {
            return;
        }
        let result = self.api.get_conversation(id).await;
        match result {
            Ok(detail) => {
                if self.in_flight_conversation().as_deref() == Some(id) {
                    // Replacing now would orphan the reply being assembled
                    log::debug!("History for {} arrived during an exchange, not applied", id);
                    return;
                }
                let messages = detail.into_messages();
                log::debug!("Loaded {} messages for {}", messages.len(), id);
                self.update(|c| c.set_messages(id, messages));
                self.event_bus.emit(StoreEvent::MessagesChanged { conversation_id: id.to_string() });
                self.persist().await;
            }
            Err(e) => self.record_error(&e),
        }
    }

    /// Create a conversation that only exists on this client.
    pub fn create_local_conversation(&self, title: Option<&str>) -> String {
        let summary = ConversationSummary::new_local(title.map(str::to_string));
        let id = summary.id.clone();
        self.insert_new_conversation(summary);
        id
    }

    /// Start a new conversation and make it active. Without a token it is
    /// created locally; otherwise the backend issues the id.
    pub async fn create_new_conversation(&self, title: Option<&str>) -> Result<String> {
        if !self.is_authenticated() {
            let id = self.create_local_conversation(title);
            self.persist().await;
            return Ok(id);
        }
        match self.api.create_conversation(title).await {
            Ok(summary) => {
                let id = summary.id.clone();
                log::info!("Created conversation {}", id);
                self.insert_new_conversation(summary);
                self.persist().await;
                Ok(id)
            }
            Err(e) => {
                self.record_error(&e);
                Err(e)
            }
        }
    }

    fn insert_new_conversation(&self, summary: ConversationSummary) {
        let id = summary.id.clone();
        self.update(|c| c.prepend_conversation(summary).set_active(Some(id.clone())));
        self.event_bus.emit(StoreEvent::ConversationsChanged);
        self.event_bus.emit(StoreEvent::ActiveConversationChanged { id: Some(id) });
    }

    /// Delete a conversation. It disappears from the cache before this
    /// returns; the returned future issues the request and puts the
    /// conversation back if the backend refuses.
    pub fn delete_conversation<'a>(&'a self, id: &str) -> impl Future<Output = ()> + 'a {
        let id = id.to_string();
        let removed = self.remove_conversation(&id);
        async move {
            match removed {
                Some(removed) => self.confirm_removal(&id, removed).await,
                None => log::debug!("Delete of unknown conversation {}", id),
            }
        }
    }

    /// Synchronous half of `delete_conversation`: drop the conversation from
    /// the cache, stopping any exchange still writing into it.
    pub fn remove_conversation(&self, id: &str) -> Option<RemovedConversation> {
        if self.in_flight_conversation().as_deref() == Some(id) {
            self.cancel_in_flight();
            self.set_send_flags(false, false);
        }
        let removed = self.update_with(|c| c.remove_conversation(id));
        if let Some(r) = &removed {
            self.event_bus.emit(StoreEvent::ConversationsChanged);
            if r.was_active {
                self.event_bus.emit(StoreEvent::ActiveConversationChanged { id: None });
            }
        }
        removed
    }

    /// Asynchronous half of `delete_conversation`. Local conversations only
    /// need the snapshot rewritten.
    pub async fn confirm_removal(&self, id: &str, removed: RemovedConversation) {
        if !is_local_id(id) {
            if let Err(e) = self.api.delete_conversation(id).await {
                let was_active = removed.was_active;
                log::warn!("Delete of {} failed, restoring it", id);
                self.update(|c| c.restore_conversation(removed));
                self.event_bus.emit(StoreEvent::ConversationsChanged);
                if was_active {
                    self.event_bus.emit(StoreEvent::ActiveConversationChanged {
                        id: self.active_conversation_id(),
                    });
                }
                self.record_error(&e);
            }
        }
        self.persist().await;
    }

    /// Rename a conversation. Local conversations are renamed in place.
    pub async fn rename_conversation(&self, id: &str, title: &str) -> Result<()> {
        let title = require_text(title, "title")?;
        if !is_local_id(id) {
            match self.api.rename_conversation(id, &title).await {
                // The server's title and timestamps win
                Ok(summary) => self.update(|c| c.upsert_summary(summary)),
                Err(e) => {
                    self.record_error(&e);
                    return Err(e);
                }
            }
        } else {
            self.update(|c| c.rename(id, &title));
        }
        self.event_bus.emit(StoreEvent::ConversationsChanged);
        self.persist().await;
        Ok(())
    }
}
