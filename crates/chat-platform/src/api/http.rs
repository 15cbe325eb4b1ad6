//! Chat backend adapter over browser `fetch()` via gloo-net.
//!
//! REST calls are bounded by `request_timeout_ms`. The event stream has no
//! overall deadline; instead each network read must arrive within
//! `stream_idle_timeout_ms`. Nothing is retried here.

use std::future::Future;
use std::rc::Rc;

use async_trait::async_trait;
use futures::future::{self, Either};
use gloo_net::http::{Request, RequestBuilder, Response};
use gloo_timers::future::TimeoutFuture;
use js_sys::{Reflect, Uint8Array};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;
use web_sys::ReadableStreamDefaultReader;

use chat_core::ports::*;
use chat_types::{
    ChatError, Result,
    api::{
        ConversationDetail, ConversationPage, CreateConversationBody, MessageReply,
        MessageRequest, RenameConversationBody,
    },
    config::ClientConfig,
    conversation::ConversationSummary,
};

pub struct HttpChatApi {
    config: ClientConfig,
    auth: Rc<dyn AuthPort>,
}

impl HttpChatApi {
    pub fn new(config: ClientConfig, auth: Rc<dyn AuthPort>) -> Self {
        Self { config, auth }
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        match self.auth.bearer_token() {
            Some(token) if !token.is_empty() => {
                builder.header("Authorization", &format!("Bearer {}", token))
            }
            _ => builder,
        }
    }

    fn get(&self, path: &str) -> RequestBuilder {
        self.authorize(Request::get(&self.config.endpoint(path)))
    }

    /// Send and fail on a non-2xx status.
    async fn execute(&self, request: Request) -> Result<Response> {
        let ms = self.config.request_timeout_ms;
        let response = with_timeout(ms, request.send())
            .await?
            .map_err(|e| ChatError::Network(e.to_string()))?;
        ensure_success(response).await
    }

    async fn execute_json<T: DeserializeOwned>(&self, request: Request) -> Result<T> {
        let response = self.execute(request).await?;
        with_timeout(self.config.request_timeout_ms, response.json::<T>())
            .await?
            .map_err(|e| ChatError::Validation(e.to_string()))
    }
}

#[async_trait(?Send)]
impl ChatApiPort for HttpChatApi {
    async fn list_conversations(&self, cursor: Option<&str>) -> Result<ConversationPage> {
        let mut builder = self.get("conversations");
        if let Some(cursor) = cursor {
            builder = builder.query([("cursor", cursor)]);
        }
        let request = builder.build().map_err(|e| ChatError::Network(e.to_string()))?;
        self.execute_json(request).await
    }

    async fn get_conversation(&self, id: &str) -> Result<ConversationDetail> {
        let request = self
            .get(&format!("conversations/{}", id))
            .build()
            .map_err(|e| ChatError::Network(e.to_string()))?;
        self.execute_json(request).await
    }

    async fn create_conversation(&self, title: Option<&str>) -> Result<ConversationSummary> {
        let body = CreateConversationBody {
            title: title.map(str::to_string),
        };
        let request = self
            .authorize(Request::post(&self.config.endpoint("conversations")))
            .json(&body)
            .map_err(|e| ChatError::Serialization(e.to_string()))?;
        self.execute_json(request).await
    }

    async fn rename_conversation(&self, id: &str, title: &str) -> Result<ConversationSummary> {
        let body = RenameConversationBody {
            title: title.to_string(),
        };
        let url = self.config.endpoint(&format!("conversations/{}", id));
        let request = self
            .authorize(Request::patch(&url))
            .json(&body)
            .map_err(|e| ChatError::Serialization(e.to_string()))?;
        self.execute_json(request).await
    }

    async fn delete_conversation(&self, id: &str) -> Result<()> {
        let url = self.config.endpoint(&format!("conversations/{}", id));
        let request = self
            .authorize(Request::delete(&url))
            .build()
            .map_err(|e| ChatError::Network(e.to_string()))?;
        self.execute(request).await?;
        Ok(())
    }

    async fn send_message(&self, conversation_id: &str, req: &MessageRequest) -> Result<MessageReply> {
        let url = self
            .config
            .endpoint(&format!("conversations/{}/messages", conversation_id));
        let request = self
            .authorize(Request::post(&url))
            .json(req)
            .map_err(|e| ChatError::Serialization(e.to_string()))?;
        self.execute_json(request).await
    }

    async fn open_stream(&self, conversation_id: &str, req: &MessageRequest) -> Result<ByteStream> {
        let request = self
            .get(&format!("conversations/{}/stream", conversation_id))
            .header("Accept", "text/event-stream")
            .query(req.stream_query())
            .build()
            .map_err(|e| ChatError::Network(e.to_string()))?;
        let response = self.execute(request).await?;

        let body = response
            .body()
            .ok_or_else(|| ChatError::Validation("Event stream has no body".to_string()))?;
        let reader = BodyReader {
            reader: body.get_reader().unchecked_into::<ReadableStreamDefaultReader>(),
        };
        log::debug!("Event stream opened for {}", conversation_id);
        Ok(body_stream(reader, self.config.stream_idle_timeout_ms))
    }
}

// ─── Streaming body ──────────────────────────────────────────

/// Owns the body reader; dropping it (end of stream or a cancelled
/// exchange) tells the browser to close the connection.
struct BodyReader {
    reader: ReadableStreamDefaultReader,
}

impl BodyReader {
    async fn next_chunk(&self) -> Result<Option<Vec<u8>>> {
        let result = JsFuture::from(self.reader.read())
            .await
            .map_err(|e| ChatError::Network(js_error(&e)))?;
        let done = Reflect::get(&result, &JsValue::from_str("done"))
            .map_err(|e| ChatError::JsInterop(js_error(&e)))?
            .as_bool()
            .unwrap_or(true);
        if done {
            return Ok(None);
        }
        let value = Reflect::get(&result, &JsValue::from_str("value"))
            .map_err(|e| ChatError::JsInterop(js_error(&e)))?;
        Ok(Some(Uint8Array::new(&value).to_vec()))
    }
}

impl Drop for BodyReader {
    fn drop(&mut self) {
        let _ = self.reader.cancel();
    }
}

fn body_stream(reader: BodyReader, idle_timeout_ms: u64) -> ByteStream {
    let chunks = futures::stream::unfold(Some(reader), move |state| async move {
        let reader = state?;
        let next = with_timeout(idle_timeout_ms, reader.next_chunk()).await;
        match next {
            Ok(Ok(Some(bytes))) => Some((Ok(bytes), Some(reader))),
            Ok(Ok(None)) => None,
            Ok(Err(e)) | Err(e) => {
                log::warn!("Event stream read failed: {}", e);
                Some((Err(e), None))
            }
        }
    });
    Box::pin(chunks)
}

// ─── Helpers ─────────────────────────────────────────────────

/// Race `fut` against a timer; the loser is dropped.
async fn with_timeout<F: Future>(ms: u64, fut: F) -> Result<F::Output> {
    let timer = TimeoutFuture::new(u32::try_from(ms).unwrap_or(u32::MAX));
    futures::pin_mut!(fut);
    futures::pin_mut!(timer);
    match future::select(fut, timer).await {
        Either::Left((output, _)) => Ok(output),
        Either::Right(_) => Err(ChatError::Timeout(ms)),
    }
}

/// Error body of the chat gateway
#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

async fn ensure_success(response: Response) -> Result<Response> {
    if response.ok() {
        return Ok(response);
    }
    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    let message = match serde_json::from_str::<ErrorBody>(&text) {
        Ok(body) => body.error,
        Err(_) if !text.trim().is_empty() => text,
        Err(_) => response.status_text(),
    };
    Err(ChatError::Http { status, message })
}

fn js_error(value: &JsValue) -> String {
    value.as_string().unwrap_or_else(|| format!("{:?}", value))
}
