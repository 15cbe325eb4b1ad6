//! Event-stream parsing.
//!
//! `SseParser` is a small buffer + delimiter-scan state machine: bytes go in
//! as they arrive from the network, complete records come out. A record is
//! only parsed once its terminating blank line has been seen, so chunks may
//! split records (or UTF-8 code points) anywhere, and one chunk may carry
//! several records.
//!
//! `EventStream` wraps a [`ByteStream`] and yields typed [`StreamEvent`]s.

use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::{ready, Stream};

use chat_types::{
    Result,
    api::ChatMetrics,
    error::StreamErrorCode,
    message::SourceCitation,
};
use crate::ports::ByteStream;

/// One dispatched record: its `event:` name and joined `data:` lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseFrame {
    pub event: String,
    pub data: String,
}

#[derive(Debug, Default)]
pub struct SseParser {
    buffer: Vec<u8>,
    /// Last byte fed was a CR, so a leading LF belongs to the same terminator
    after_cr: bool,
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one network read; returns every record it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        // CRLF, lone CR and lone LF all end a line; store them as LF
        for &byte in chunk {
            match byte {
                b'\r' => {
                    self.buffer.push(b'\n');
                    self.after_cr = true;
                }
                b'\n' if self.after_cr => self.after_cr = false,
                _ => {
                    self.buffer.push(byte);
                    self.after_cr = false;
                }
            }
        }

        let mut frames = Vec::new();
        while let Some(end) = find_delimiter(&self.buffer) {
            let record: Vec<u8> = self.buffer.drain(..end + 2).collect();
            if let Some(frame) = parse_record(&record[..end]) {
                frames.push(frame);
            }
        }
        frames
    }

    /// Bytes of a record still waiting for its delimiter.
    pub fn pending_len(&self) -> usize {
        self.buffer.len()
    }

    /// Drop an unterminated trailing record. Returns how many bytes were lost.
    pub fn discard(&mut self) -> usize {
        let len = self.buffer.len();
        self.buffer.clear();
        self.after_cr = false;
        len
    }
}

fn find_delimiter(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\n\n")
}

fn parse_record(record: &[u8]) -> Option<SseFrame> {
    let text = String::from_utf8_lossy(record);
    let mut event: Option<String> = None;
    let mut data: Vec<&str> = Vec::new();

    for line in text.split('\n') {
        if line.is_empty() || line.starts_with(':') {
            continue;
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => event = Some(value.to_string()),
            "data" => data.push(value),
            // id / retry carry nothing this client uses
            _ => {}
        }
    }

    if event.is_none() && data.is_empty() {
        return None;
    }
    Some(SseFrame {
        event: event.unwrap_or_else(|| "message".to_string()),
        data: data.join("\n"),
    })
}

// ─── Typed events ────────────────────────────────────────────

/// Event of the chat stream endpoint
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// Text delta to append to the reply
    Delta(String),
    /// A retrieved source for the reply
    Source(SourceCitation),
    /// A `source` event whose payload did not parse; carries the reason
    MalformedSource(String),
    /// Terminal generation statistics
    Metrics(ChatMetrics),
    /// Backend aborted the generation
    Error { code: StreamErrorCode, message: String },
}

impl StreamEvent {
    /// Decode a frame. Keep-alives and unknown event names yield `None`.
    pub fn from_frame(frame: SseFrame) -> Option<Self> {
        match frame.event.as_str() {
            "message" => Some(StreamEvent::Delta(frame.data)),
            "source" => Some(match serde_json::from_str::<SourceCitation>(&frame.data) {
                Ok(source) => StreamEvent::Source(source.normalized()),
                Err(e) => StreamEvent::MalformedSource(e.to_string()),
            }),
            "metrics" => match serde_json::from_str::<ChatMetrics>(&frame.data) {
                Ok(metrics) => Some(StreamEvent::Metrics(metrics)),
                Err(e) => {
                    log::warn!("Ignoring unreadable metrics event: {}", e);
                    None
                }
            },
            "error" => {
                let (code, message) = StreamErrorCode::parse(&frame.data);
                Some(StreamEvent::Error { code, message })
            }
            "ping" => None,
            other => {
                log::debug!("Ignoring stream event '{}'", other);
                None
            }
        }
    }
}

// ─── Stream adapter ──────────────────────────────────────────

/// Turns a raw event-stream body into typed events.
pub struct EventStream {
    body: ByteStream,
    parser: SseParser,
    ready: VecDeque<StreamEvent>,
    done: bool,
}

impl EventStream {
    pub fn new(body: ByteStream) -> Self {
        Self {
            body,
            parser: SseParser::new(),
            ready: VecDeque::new(),
            done: false,
        }
    }
}

impl Stream for EventStream {
    type Item = Result<StreamEvent>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            if let Some(event) = this.ready.pop_front() {
                return Poll::Ready(Some(Ok(event)));
            }
            if this.done {
                return Poll::Ready(None);
            }
            match ready!(this.body.as_mut().poll_next(cx)) {
                Some(Ok(chunk)) => {
                    let events = this
                        .parser
                        .push(&chunk)
                        .into_iter()
                        .filter_map(StreamEvent::from_frame);
                    this.ready.extend(events);
                }
                Some(Err(e)) => {
                    this.done = true;
                    return Poll::Ready(Some(Err(e)));
                }
                None => {
                    this.done = true;
                    let lost = this.parser.discard();
                    if lost > 0 {
                        log::debug!("Stream closed mid-record, dropped {} bytes", lost);
                    }
                }
            }
        }
    }
}
