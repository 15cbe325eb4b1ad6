//! `ChatClient`, the JS-facing handle on the chat store.
//!
//! Every asynchronous operation returns a Promise. Errors reject with a JS
//! `Error` carrying the message; the same error is also on `snapshot().error`.
//! Events are buffered and pulled with `drainEvents()` when the UI renders.

use std::future::Future;
use std::rc::Rc;

use gloo_utils::format::JsValueSerdeExt;
use js_sys::Promise;
use serde::Serialize;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::future_to_promise;

use chat_core::event_bus::EventBus;
use chat_core::ports::{AuthPort, ChatApiPort};
use chat_core::ChatStore;
use chat_platform::{auto_detect_storage, HttpChatApi, LocalStorageAuth};
use chat_types::{
    ChatError,
    config::ClientConfig,
    message::{ChatMessage, MessageId},
};

#[wasm_bindgen]
pub struct ChatClient {
    store: Rc<ChatStore>,
}

#[wasm_bindgen]
impl ChatClient {
    /// Build a client from a JSON-compatible config object (`undefined`
    /// for defaults) and restore the persisted state.
    pub async fn create(config: JsValue) -> Result<ChatClient, JsValue> {
        let config: ClientConfig = if config.is_undefined() || config.is_null() {
            ClientConfig::default()
        } else {
            config
                .into_serde()
                .map_err(|e| to_js_error(ChatError::Config(e.to_string())))?
        };
        config.validate().map_err(to_js_error)?;

        let auth: Rc<dyn AuthPort> = Rc::new(LocalStorageAuth::new(config.auth_token_key.clone()));
        let api: Rc<dyn ChatApiPort> = Rc::new(HttpChatApi::new(config.clone(), auth.clone()));
        let storage = auto_detect_storage().await;
        log::info!(
            "Chat client using {} at {} ({:?} transport)",
            storage.backend_name(),
            config.api_base,
            config.transport
        );

        let store = ChatStore::new(config, api, auth, storage, EventBus::new());
        store.restore().await;
        Ok(ChatClient { store: Rc::new(store) })
    }

    // ─── Conversations ───────────────────────────────────────

    #[wasm_bindgen(js_name = fetchConversations)]
    pub fn fetch_conversations(&self, reset: bool) -> Promise {
        self.spawn(|store| async move {
            store.fetch_conversations(reset).await;
            Ok(JsValue::UNDEFINED)
        })
    }

    /// The selection is applied before this returns; the Promise settles
    /// once history has loaded.
    #[wasm_bindgen(js_name = selectConversation)]
    pub fn select_conversation(&self, id: String) -> Promise {
        self.store.set_active_conversation(&id);
        self.spawn(|store| async move {
            store.load_history(&id).await;
            Ok(JsValue::UNDEFINED)
        })
    }

    #[wasm_bindgen(js_name = createConversation)]
    pub fn create_conversation(&self, title: Option<String>) -> Promise {
        self.spawn(|store| async move {
            let id = store
                .create_new_conversation(title.as_deref())
                .await
                .map_err(to_js_error)?;
            Ok(JsValue::from_str(&id))
        })
    }

    /// The conversation disappears before this returns.
    #[wasm_bindgen(js_name = deleteConversation)]
    pub fn delete_conversation(&self, id: String) -> Promise {
        let removed = self.store.remove_conversation(&id);
        self.spawn(|store| async move {
            if let Some(removed) = removed {
                store.confirm_removal(&id, removed).await;
            }
            Ok(JsValue::UNDEFINED)
        })
    }

    #[wasm_bindgen(js_name = renameConversation)]
    pub fn rename_conversation(&self, id: String, title: String) -> Promise {
        self.spawn(|store| async move {
            store.rename_conversation(&id, &title).await.map_err(to_js_error)?;
            Ok(JsValue::UNDEFINED)
        })
    }

    // ─── Messages ────────────────────────────────────────────

    /// Resolves with `{ outcome: "committed" | "aborted", ... }`.
    #[wasm_bindgen(js_name = sendMessage)]
    pub fn send_message(&self, text: String) -> Promise {
        self.spawn(|store| async move {
            let outcome = store.send_message(&text).await.map_err(to_js_error)?;
            to_js_value(&outcome)
        })
    }

    #[wasm_bindgen(js_name = regenerateLastResponse)]
    pub fn regenerate_last_response(&self) -> Promise {
        self.spawn(|store| async move {
            let outcome = store.regenerate_last_response().await.map_err(to_js_error)?;
            to_js_value(&outcome)
        })
    }

    /// `message_id` is the id object found on a message in `snapshot()`.
    #[wasm_bindgen(js_name = editMessage)]
    pub fn edit_message(&self, message_id: JsValue, content: String) -> Promise {
        self.spawn(|store| async move {
            let id: MessageId = message_id
                .into_serde()
                .map_err(|e| to_js_error(ChatError::InvalidInput(e.to_string())))?;
            let outcome = store.edit_message(&id, &content).await.map_err(to_js_error)?;
            to_js_value(&outcome)
        })
    }

    #[wasm_bindgen(js_name = setMessages)]
    pub fn set_messages(&self, conversation_id: String, messages: JsValue) -> Promise {
        self.spawn(|store| async move {
            let messages: Vec<ChatMessage> = messages
                .into_serde()
                .map_err(|e| to_js_error(ChatError::InvalidInput(e.to_string())))?;
            store.set_messages(&conversation_id, messages).await;
            Ok(JsValue::UNDEFINED)
        })
    }

    /// Synchronous: `isSending` is false as soon as this returns.
    #[wasm_bindgen(js_name = stopGeneration)]
    pub fn stop_generation(&self) {
        self.store.stop_generation();
    }

    // ─── State ───────────────────────────────────────────────

    pub fn snapshot(&self) -> Result<JsValue, JsValue> {
        to_js_value(&self.store.snapshot())
    }

    #[wasm_bindgen(js_name = drainEvents)]
    pub fn drain_events(&self) -> Result<JsValue, JsValue> {
        to_js_value(&self.store.event_bus().drain())
    }

    #[wasm_bindgen(js_name = hasPendingEvents)]
    pub fn has_pending_events(&self) -> bool {
        self.store.event_bus().has_pending()
    }

    #[wasm_bindgen(js_name = clearError)]
    pub fn clear_error(&self) {
        self.store.clear_error();
    }
}

impl ChatClient {
    fn spawn<F, Fut>(&self, f: F) -> Promise
    where
        F: FnOnce(Rc<ChatStore>) -> Fut,
        Fut: Future<Output = Result<JsValue, JsValue>> + 'static,
    {
        future_to_promise(f(self.store.clone()))
    }
}

fn to_js_error(err: ChatError) -> JsValue {
    js_sys::Error::new(&err.to_string()).into()
}

fn to_js_value<T: Serialize>(value: &T) -> Result<JsValue, JsValue> {
    JsValue::from_serde(value).map_err(|e| to_js_error(ChatError::Serialization(e.to_string())))
}
