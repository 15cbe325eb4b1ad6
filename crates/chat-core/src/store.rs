//! Chat store, the service object the UI talks to.
//!
//! Owns the conversation cache, the quota counter and the send flags, and is
//! the only thing that mutates them. Platform adapters are injected as port
//! trait objects so tests can substitute fakes. The operations themselves
//! live in `sync.rs` (conversations) and `exchange.rs` (messages).
//!
//! State sits in a RefCell; no borrow is ever held across an await.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use chat_types::{
    ChatError, Result,
    config::ClientConfig,
    conversation::ConversationSummary,
    event::{ExchangePhase, StoreEvent},
    message::{ChatMessage, MessageId, MessageStatus},
};
use crate::cache::ConversationCache;
use crate::cancel::CancelToken;
use crate::event_bus::EventBus;
use crate::ports::{AuthPort, ChatApiPort, StoragePort};
use crate::quota::QuotaGuard;

pub struct ChatStore {
    pub(crate) config: ClientConfig,
    pub(crate) api: Rc<dyn ChatApiPort>,
    pub(crate) auth: Rc<dyn AuthPort>,
    pub(crate) storage: Rc<dyn StoragePort>,
    pub(crate) event_bus: EventBus,
    pub(crate) state: RefCell<StoreState>,
    next_op: Cell<u64>,
}

#[derive(Debug)]
pub struct StoreState {
    pub cache: ConversationCache,
    pub quota: QuotaGuard,
    pub is_loading: bool,
    pub is_sending: bool,
    /// Waiting for the first token of the reply
    pub is_typing: bool,
    pub phase: ExchangePhase,
    pub error: Option<String>,
    pub(crate) in_flight: Option<InFlight>,
}

/// Bookkeeping of the exchange currently allowed to write to the cache
#[derive(Debug, Clone)]
pub(crate) struct InFlight {
    pub op_id: u64,
    pub conversation_id: String,
    pub placeholder: MessageId,
    pub token: CancelToken,
}

/// What survives a reload
#[derive(Debug, Serialize, Deserialize)]
struct PersistedState {
    cache: ConversationCache,
    #[serde(default)]
    free_messages_used: u32,
}

/// Read-only view handed to the UI
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoreSnapshot {
    pub conversations: Vec<ConversationSummary>,
    pub active_conversation_id: Option<String>,
    pub messages: Vec<ChatMessage>,
    pub has_more: bool,
    pub is_loading: bool,
    pub is_sending: bool,
    pub is_typing: bool,
    pub phase: ExchangePhase,
    pub error: Option<String>,
    pub quota_used: u32,
    pub quota_limit: u32,
    pub authenticated: bool,
}

impl ChatStore {
    pub fn new(
        config: ClientConfig,
        api: Rc<dyn ChatApiPort>,
        auth: Rc<dyn AuthPort>,
        storage: Rc<dyn StoragePort>,
        event_bus: EventBus,
    ) -> Self {
        let quota = QuotaGuard::new(config.free_message_limit);
        Self {
            config,
            api,
            auth,
            storage,
            event_bus,
            state: RefCell::new(StoreState {
                cache: ConversationCache::new(),
                quota,
                is_loading: false,
                is_sending: false,
                is_typing: false,
                phase: ExchangePhase::Idle,
                error: None,
                in_flight: None,
            }),
            next_op: Cell::new(0),
        }
    }

    // ─── Persistence ─────────────────────────────────────────

    /// Load the persisted snapshot. A missing or unreadable snapshot leaves
    /// the store empty.
    pub async fn restore(&self) {
        let data = match self.storage.get(&self.config.store_name).await {
            Ok(Some(data)) => data,
            Ok(None) => return,
            Err(e) => {
                log::warn!("Could not read persisted chat state: {}", e);
                return;
            }
        };
        let persisted: PersistedState = match serde_json::from_slice(&data) {
            Ok(p) => p,
            Err(e) => {
                log::warn!("Discarding unreadable chat state: {}", e);
                return;
            }
        };
        let quota = {
            let mut state = self.state.borrow_mut();
            state.cache = persisted.cache;
            state.quota = QuotaGuard::with_used(self.config.free_message_limit, persisted.free_messages_used);
            state.quota
        };
        log::info!(
            "Chat state restored from {} ({} conversations)",
            self.storage.backend_name(),
            self.state.borrow().cache.conversations().len()
        );
        self.event_bus.emit(StoreEvent::ConversationsChanged);
        self.event_bus.emit(StoreEvent::ActiveConversationChanged {
            id: self.active_conversation_id(),
        });
        self.event_bus.emit(StoreEvent::QuotaChanged {
            used: quota.used(),
            limit: quota.limit(),
        });
    }

    /// Write the snapshot. Failures are logged, never surfaced: the
    /// in-memory state stays authoritative.
    pub async fn persist(&self) {
        let json = {
            let state = self.state.borrow();
            let persisted = PersistedState {
                cache: state.cache.clone(),
                free_messages_used: state.quota.used(),
            };
            serde_json::to_vec(&persisted)
        };
        match json {
            Ok(json) => {
                if let Err(e) = self.storage.set(&self.config.store_name, &json).await {
                    log::warn!("Could not persist chat state: {}", e);
                }
            }
            Err(e) => log::warn!("Could not serialize chat state: {}", e),
        }
    }

    // ─── Serialized cache updates ────────────────────────────

    /// Apply one transition to the cache.
    pub(crate) fn update(&self, f: impl FnOnce(ConversationCache) -> ConversationCache) {
        let mut state = self.state.borrow_mut();
        let cache = std::mem::take(&mut state.cache);
        state.cache = f(cache);
    }

    /// Apply a transition that also hands something back.
    pub(crate) fn update_with<R>(
        &self,
        f: impl FnOnce(ConversationCache) -> (ConversationCache, R),
    ) -> R {
        let mut state = self.state.borrow_mut();
        let cache = std::mem::take(&mut state.cache);
        let (cache, out) = f(cache);
        state.cache = cache;
        out
    }

    // ─── Errors & flags ──────────────────────────────────────

    pub(crate) fn record_error(&self, err: &ChatError) {
        if err.is_cancelled() {
            return;
        }
        log::error!("Chat store error: {}", err);
        let message = err.to_string();
        self.state.borrow_mut().error = Some(message.clone());
        self.event_bus.emit(StoreEvent::Error { message });
    }

    pub fn clear_error(&self) {
        self.state.borrow_mut().error = None;
    }

    pub(crate) fn set_loading(&self, loading: bool) {
        self.state.borrow_mut().is_loading = loading;
    }

    pub(crate) fn set_phase(&self, phase: ExchangePhase) {
        self.state.borrow_mut().phase = phase;
    }

    pub(crate) fn set_send_flags(&self, sending: bool, typing: bool) {
        let changed = {
            let mut state = self.state.borrow_mut();
            let changed = state.is_sending != sending || state.is_typing != typing;
            state.is_sending = sending;
            state.is_typing = typing;
            changed
        };
        if changed {
            self.event_bus.emit(StoreEvent::SendStateChanged { sending, typing });
        }
    }

    // ─── In-flight bookkeeping ───────────────────────────────

    pub(crate) fn begin_operation(
        &self,
        conversation_id: &str,
        placeholder: &MessageId,
        token: CancelToken,
    ) -> u64 {
        let op_id = self.next_op.get() + 1;
        self.next_op.set(op_id);
        self.state.borrow_mut().in_flight = Some(InFlight {
            op_id,
            conversation_id: conversation_id.to_string(),
            placeholder: placeholder.clone(),
            token,
        });
        self.set_send_flags(true, true);
        op_id
    }

    /// Clear bookkeeping, unless a newer exchange has taken over.
    pub(crate) fn end_operation(&self, op_id: u64) {
        let ended = {
            let mut state = self.state.borrow_mut();
            match &state.in_flight {
                Some(f) if f.op_id == op_id => {
                    state.in_flight = None;
                    state.phase = ExchangePhase::Idle;
                    true
                }
                _ => false,
            }
        };
        if ended {
            self.set_send_flags(false, false);
        }
    }

    /// Cancel the current exchange, if any. Its placeholder keeps whatever
    /// content it has and is marked stopped right away.
    pub(crate) fn cancel_in_flight(&self) -> bool {
        let taken = self.state.borrow_mut().in_flight.take();
        let Some(in_flight) = taken else {
            return false;
        };
        in_flight.token.cancel();
        self.update(|c| c.finalize(&in_flight.conversation_id, &in_flight.placeholder, MessageStatus::Stopped));
        self.set_phase(ExchangePhase::Idle);
        log::info!("Cancelled exchange #{}", in_flight.op_id);
        self.event_bus.emit(StoreEvent::MessagesChanged {
            conversation_id: in_flight.conversation_id,
        });
        true
    }

    pub(crate) fn in_flight_conversation(&self) -> Option<String> {
        self.state
            .borrow()
            .in_flight
            .as_ref()
            .map(|f| f.conversation_id.clone())
    }

    // ─── Reads ───────────────────────────────────────────────

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    pub fn is_authenticated(&self) -> bool {
        self.auth.is_authenticated()
    }

    pub fn cache(&self) -> ConversationCache {
        self.state.borrow().cache.clone()
    }

    pub fn conversations(&self) -> Vec<ConversationSummary> {
        self.state.borrow().cache.conversations().to_vec()
    }

    pub fn messages(&self, conversation_id: &str) -> Vec<ChatMessage> {
        self.state.borrow().cache.messages(conversation_id).to_vec()
    }

    pub fn active_conversation_id(&self) -> Option<String> {
        self.state.borrow().cache.active_id().map(str::to_string)
    }

    pub fn active_messages(&self) -> Vec<ChatMessage> {
        match self.active_conversation_id() {
            Some(id) => self.messages(&id),
            None => Vec::new(),
        }
    }

    pub fn is_loading(&self) -> bool {
        self.state.borrow().is_loading
    }

    pub fn is_sending(&self) -> bool {
        self.state.borrow().is_sending
    }

    pub fn is_typing(&self) -> bool {
        self.state.borrow().is_typing
    }

    pub fn phase(&self) -> ExchangePhase {
        self.state.borrow().phase
    }

    pub fn error(&self) -> Option<String> {
        self.state.borrow().error.clone()
    }

    pub fn quota(&self) -> QuotaGuard {
        self.state.borrow().quota
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        let authenticated = self.is_authenticated();
        let state = self.state.borrow();
        let active = state.cache.active_id().map(str::to_string);
        let messages = active
            .as_deref()
            .map(|id| state.cache.messages(id).to_vec())
            .unwrap_or_default();
        StoreSnapshot {
            conversations: state.cache.conversations().to_vec(),
            active_conversation_id: active,
            messages,
            has_more: state.cache.next_cursor().is_some(),
            is_loading: state.is_loading,
            is_sending: state.is_sending,
            is_typing: state.is_typing,
            phase: state.phase,
            error: state.error.clone(),
            quota_used: state.quota.used(),
            quota_limit: state.quota.limit(),
            authenticated,
        }
    }
}

/// Guard used by value-returning operations.
pub(crate) fn require_text(text: &str, what: &str) -> Result<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ChatError::InvalidInput(format!("{} must not be empty", what)));
    }
    Ok(trimmed.to_string())
}
