//! Message exchange engine.
//!
//! One send walks
//! `IDLE -> QUOTA_CHECK -> (REJECTED | PREPARED) -> IN_FLIGHT ->
//! (STREAMING | AWAITING_RESPONSE) -> (COMMITTED | ABORTED | FAILED)`.
//!
//! Exchanges are single-flight: starting one cancels the previous one,
//! whose placeholder stays in the cache with the content it had.
//! Optimistic messages are never removed on failure.

use futures::future::Abortable;
use futures::StreamExt;
use serde::Serialize;

use chat_types::{
    ChatError, Result,
    api::{ChatMetrics, MessageRequest},
    config::TransportMode,
    event::{ExchangePhase, StoreEvent},
    message::{ChatMessage, MessageId, MessageStatus, SourceCitation},
    now_secs,
};
use crate::cancel::CancelToken;
use crate::sse::{EventStream, StreamEvent};
use crate::store::{require_text, ChatStore};

/// How a send ended when it did not fail
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SendOutcome {
    /// Reply finalized; `message_id` is the server id in blocking mode and
    /// the placeholder id in streaming mode
    Committed {
        conversation_id: String,
        message_id: MessageId,
        metrics: Option<ChatMetrics>,
    },
    /// Cancelled; the partial reply is kept
    Aborted {
        conversation_id: String,
        message_id: MessageId,
    },
}

/// Reply of a successful exchange, before commit
struct Reply {
    message_id: MessageId,
    preview: String,
    metrics: Option<ChatMetrics>,
}

impl ChatStore {
    /// Send a user message into the active conversation (creating one if
    /// none is active) and assemble the assistant's reply.
    pub async fn send_message(&self, text: &str) -> Result<SendOutcome> {
        let text = require_text(text, "message")?;
        self.check_quota().await?;

        let conversation_id = match self.active_conversation_id() {
            Some(id) => id,
            None => self.create_new_conversation(None).await.map_err(|e| {
                self.set_phase(ExchangePhase::Idle);
                e
            })?,
        };

        // PREPARED: visible before any network call
        let user = ChatMessage::user(text.clone());
        let placeholder = ChatMessage::assistant_placeholder();
        let placeholder_id = placeholder.id.clone();
        self.update(|c| {
            c.append_messages(&conversation_id, [user, placeholder])
                .title_if_untitled(&conversation_id, &text)
        });
        self.set_phase(ExchangePhase::Prepared);
        self.event_bus.emit(StoreEvent::MessagesChanged { conversation_id: conversation_id.clone() });
        self.event_bus.emit(StoreEvent::ConversationsChanged);

        self.run_exchange(conversation_id, text, placeholder_id, 2).await
    }

    /// Re-run the exchange for the last user turn of the active
    /// conversation, replacing whatever followed it.
    pub async fn regenerate_last_response(&self) -> Result<SendOutcome> {
        let conversation_id = self.require_active()?;
        let last_user = self
            .state
            .borrow()
            .cache
            .last_user_message(&conversation_id)
            .cloned()
            .ok_or_else(|| ChatError::NotFound("no user message to regenerate".to_string()))?;
        self.check_quota().await?;

        self.cancel_in_flight();
        let placeholder = ChatMessage::assistant_placeholder();
        let placeholder_id = placeholder.id.clone();
        self.update(|c| {
            c.truncate_after(&conversation_id, &last_user.id)
                .append_messages(&conversation_id, [placeholder])
        });
        self.set_phase(ExchangePhase::Prepared);
        self.event_bus.emit(StoreEvent::MessagesChanged { conversation_id: conversation_id.clone() });

        self.run_exchange(conversation_id, last_user.content, placeholder_id, 0).await
    }

    /// Change the text of an earlier user message and re-run the exchange
    /// from there. Later messages are dropped.
    pub async fn edit_message(&self, message_id: &MessageId, content: &str) -> Result<SendOutcome> {
        let content = require_text(content, "message")?;
        let conversation_id = self.require_active()?;
        let original = self
            .state
            .borrow()
            .cache
            .message(&conversation_id, message_id)
            .cloned()
            .ok_or_else(|| ChatError::NotFound(format!("message {}", message_id)))?;
        if !original.is_user() {
            return Err(ChatError::InvalidInput("only user messages can be edited".to_string()));
        }
        self.check_quota().await?;

        self.cancel_in_flight();
        let placeholder = ChatMessage::assistant_placeholder();
        let placeholder_id = placeholder.id.clone();
        self.update(|c| {
            c.edit_content(&conversation_id, message_id, &content)
                .truncate_after(&conversation_id, message_id)
                .append_messages(&conversation_id, [placeholder])
        });
        self.set_phase(ExchangePhase::Prepared);
        self.event_bus.emit(StoreEvent::MessagesChanged { conversation_id: conversation_id.clone() });

        self.run_exchange(conversation_id, content, placeholder_id, 0).await
    }

    /// Replace the whole message list of a conversation, e.g. with state an
    /// external UI runtime edited.
    pub async fn set_messages(&self, conversation_id: &str, messages: Vec<ChatMessage>) {
        self.update(|c| c.set_messages(conversation_id, messages));
        self.event_bus.emit(StoreEvent::MessagesChanged { conversation_id: conversation_id.to_string() });
        self.persist().await;
    }

    /// Abort the in-flight exchange. Flags are cleared before this returns;
    /// the network layer is not waited for.
    pub fn stop_generation(&self) {
        if self.cancel_in_flight() {
            self.set_send_flags(false, false);
        }
    }

    // ─── Internals ───────────────────────────────────────────

    fn require_active(&self) -> Result<String> {
        self.active_conversation_id()
            .ok_or_else(|| ChatError::NotFound("no active conversation".to_string()))
    }

    /// Anonymous callers spend one free message; at the limit the send is
    /// rejected without touching the backend.
    async fn check_quota(&self) -> Result<()> {
        if self.is_authenticated() {
            return Ok(());
        }
        self.set_phase(ExchangePhase::QuotaCheck);
        let consumed = {
            let mut state = self.state.borrow_mut();
            state.quota.try_consume().map(|_| state.quota)
        };
        match consumed {
            Ok(quota) => {
                log::debug!("Free messages used: {}/{}", quota.used(), quota.limit());
                self.event_bus.emit(StoreEvent::QuotaChanged {
                    used: quota.used(),
                    limit: quota.limit(),
                });
                self.persist().await;
                Ok(())
            }
            Err(e) => {
                self.set_phase(ExchangePhase::Idle);
                self.record_error(&e);
                Err(e)
            }
        }
    }

    async fn run_exchange(
        &self,
        conversation_id: String,
        text: String,
        placeholder_id: MessageId,
        added_messages: u32,
    ) -> Result<SendOutcome> {
        // Single-flight: the previous exchange stops writing from here on
        self.cancel_in_flight();

        let (token, registration) = CancelToken::new();
        let op_id = self.begin_operation(&conversation_id, &placeholder_id, token.clone());
        let request = MessageRequest {
            message: text,
            config: self.config.generation.clone(),
        };
        log::info!("Exchange #{} started in {}", op_id, conversation_id);

        let work = async {
            match self.config.transport {
                TransportMode::Streaming => {
                    self.stream_reply(&conversation_id, &placeholder_id, &request, &token)
                        .await
                }
                TransportMode::Blocking => {
                    self.blocking_reply(&conversation_id, &placeholder_id, &request, &token)
                        .await
                }
            }
        };
        let result = match Abortable::new(work, registration).await {
            Ok(result) => result,
            Err(_aborted) => Err(ChatError::Cancelled),
        };

        match result {
            Ok(reply) => {
                self.update(|c| {
                    c.finalize(&conversation_id, &reply.message_id, MessageStatus::Complete)
                        .touch_summary(&conversation_id, added_messages, &reply.preview, now_secs())
                });
                self.end_operation(op_id);
                log::info!("Exchange #{} committed", op_id);
                self.event_bus.emit(StoreEvent::MessagesChanged { conversation_id: conversation_id.clone() });
                self.event_bus.emit(StoreEvent::ConversationsChanged);
                self.persist().await;
                Ok(SendOutcome::Committed {
                    conversation_id,
                    message_id: reply.message_id,
                    metrics: reply.metrics,
                })
            }
            Err(e) if e.is_cancelled() || token.is_cancelled() => {
                // Whoever cancelled already marked the placeholder stopped
                self.end_operation(op_id);
                log::info!("Exchange #{} aborted", op_id);
                self.persist().await;
                Ok(SendOutcome::Aborted {
                    conversation_id,
                    message_id: placeholder_id,
                })
            }
            Err(e) => {
                self.update(|c| c.finalize(&conversation_id, &placeholder_id, MessageStatus::Failed));
                self.end_operation(op_id);
                self.event_bus.emit(StoreEvent::MessagesChanged { conversation_id });
                self.record_error(&e);
                self.persist().await;
                Err(e)
            }
        }
    }

    /// STREAMING: append deltas and sources to the placeholder as they come.
    async fn stream_reply(
        &self,
        conversation_id: &str,
        placeholder_id: &MessageId,
        request: &MessageRequest,
        token: &CancelToken,
    ) -> Result<Reply> {
        self.set_phase(ExchangePhase::Streaming);
        let body = self.api.open_stream(conversation_id, request).await?;
        let mut events = EventStream::new(body);

        let mut content = String::new();
        let mut sources = Vec::new();
        let mut metrics = None;

        while let Some(event) = events.next().await {
            if token.is_cancelled() {
                return Err(ChatError::Cancelled);
            }
            match event? {
                StreamEvent::Delta(delta) => {
                    content.push_str(&delta);
                    self.set_send_flags(true, false);
                    self.write_progress(conversation_id, placeholder_id, &content, &sources, token);
                }
                StreamEvent::Source(source) => {
                    sources.push(source);
                    self.write_progress(conversation_id, placeholder_id, &content, &sources, token);
                }
                StreamEvent::MalformedSource(reason) => {
                    log::warn!("Skipping malformed source event: {}", reason);
                }
                StreamEvent::Metrics(m) => {
                    log::debug!("Stream metrics: {} tokens, {:.0}ms", m.tokens_used, m.latency_ms);
                    metrics = Some(m);
                }
                StreamEvent::Error { code, message } => {
                    return Err(ChatError::StreamProtocol { code, message });
                }
            }
        }
        if token.is_cancelled() {
            return Err(ChatError::Cancelled);
        }

        Ok(Reply {
            message_id: placeholder_id.clone(),
            preview: content,
            metrics,
        })
    }

    fn write_progress(
        &self,
        conversation_id: &str,
        placeholder_id: &MessageId,
        content: &str,
        sources: &[SourceCitation],
        token: &CancelToken,
    ) {
        if token.is_cancelled() {
            return;
        }
        self.update(|c| c.apply_stream_progress(conversation_id, placeholder_id, content, sources));
        self.event_bus.emit(StoreEvent::MessagesChanged {
            conversation_id: conversation_id.to_string(),
        });
    }

    /// AWAITING_RESPONSE: one request, then the placeholder is swapped for
    /// the server record.
    async fn blocking_reply(
        &self,
        conversation_id: &str,
        placeholder_id: &MessageId,
        request: &MessageRequest,
        token: &CancelToken,
    ) -> Result<Reply> {
        self.set_phase(ExchangePhase::AwaitingResponse);
        let reply = self.api.send_message(conversation_id, request).await?;
        if token.is_cancelled() {
            return Err(ChatError::Cancelled);
        }
        if reply.conversation_id != conversation_id {
            log::debug!(
                "Reply filed under {} for local conversation {}",
                reply.conversation_id,
                conversation_id
            );
        }
        let server = reply.to_message();
        let message_id = server.id.clone();
        let preview = server.content.clone();
        self.update(|c| c.reconcile(conversation_id, placeholder_id, server));
        self.event_bus.emit(StoreEvent::MessagesChanged {
            conversation_id: conversation_id.to_string(),
        });
        Ok(Reply {
            message_id,
            preview,
            metrics: reply.metrics,
        })
    }
}
