use serde::{Deserialize, Serialize};

/// Events emitted by the chat store.
/// UI subscribes to these for reactive updates and transient notifications.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum StoreEvent {
    /// The conversation list changed (fetch, create, delete, rename)
    ConversationsChanged,

    /// The active conversation switched
    ActiveConversationChanged { id: Option<String> },

    /// Messages of one conversation changed (send, stream delta, reconcile)
    MessagesChanged { conversation_id: String },

    /// Sending / typing flags toggled
    SendStateChanged { sending: bool, typing: bool },

    /// Free-tier counter moved
    QuotaChanged { used: u32, limit: u32 },

    /// Something failed; show it to the user
    Error { message: String },
}

/// Where a send operation currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExchangePhase {
    Idle,
    QuotaCheck,
    Prepared,
    Streaming,
    AwaitingResponse,
}
