//! Streaming chat client.
//!
//! Sends one `{prompt, history}` request and turns the event-stream
//! response body into a channel of [`ChatEvent`]s: citation chunks,
//! text fragments, a terminal marker, or an upstream error. Per-event
//! malformation is counted and logged, never surfaced; only
//! whole-stream failures reach the caller.

use futures::StreamExt;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::env;
use tokio::sync::mpsc;
use tokio::task::{AbortHandle, JoinHandle};
use tracing::debug;

use crate::stream::{Delta, SseEvent, SseReader, extract_delta};
use crate::types::Role;

const DEFAULT_CHAT_ENDPOINT: &str = "http://127.0.0.1:3000/api/chat";

// Wire event names used by the chat endpoint.
const EVENT_RETRIEVED_CHUNKS: &str = "retrieved_chunks";
const EVENT_ERROR: &str = "error";

const GENERIC_STREAM_ERROR: &str = "The answer stream reported an error.";

// ============================================
// Error types
// ============================================

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("chat endpoint returned {status}: {body}")]
    Status { status: StatusCode, body: String },
}

pub type ChatResult<T> = Result<T, ChatError>;

// ============================================
// Stream events
// ============================================

/// One decoded occurrence on an answer stream, in arrival order.
#[derive(Clone, Debug, PartialEq)]
pub enum ChatEvent {
    /// Ordered citation sources for the upcoming answer.
    Chunks(Vec<String>),
    /// One incremental text fragment.
    Text(String),
    /// End of stream.
    Done,
    /// Terminal upstream failure; the message should be shown.
    Error(String),
}

/// A live answer stream: the event channel plus the handle that aborts
/// the network task. Aborting stops future reads; events already in
/// the channel still drain so nothing received is lost.
#[derive(Debug)]
pub struct ChatStream {
    pub events: mpsc::Receiver<ChatEvent>,
    task: JoinHandle<()>,
}

impl ChatStream {
    pub fn abort_handle(&self) -> AbortHandle {
        self.task.abort_handle()
    }
}

// ============================================
// Wire shapes
// ============================================

#[derive(Serialize)]
struct ChatRequest<'a> {
    prompt: &'a str,
    history: &'a [HistoryMessage],
}

/// A transcript entry as the chat endpoint expects it.
#[derive(Clone, Debug, Serialize)]
pub struct HistoryMessage {
    pub role: Role,
    pub content: String,
}

#[derive(Deserialize)]
struct ChunksPayload {
    chunks: Vec<String>,
}

#[derive(Deserialize)]
struct ErrorPayload {
    error: String,
}

// ============================================
// Client
// ============================================

pub struct ChatClient {
    http: reqwest::Client,
    endpoint: String,
}

impl ChatClient {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }

    pub fn from_env() -> Self {
        let endpoint =
            env::var("CHAT_ENDPOINT").unwrap_or_else(|_| DEFAULT_CHAT_ENDPOINT.to_string());
        Self::new(endpoint)
    }

    /// Start one answer stream. Transport failures (network error,
    /// non-success status) are returned here; everything after the
    /// headers flows through the returned channel.
    pub async fn stream_chat(
        &self,
        prompt: &str,
        history: &[HistoryMessage],
    ) -> ChatResult<ChatStream> {
        let response = self
            .http
            .post(&self.endpoint)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .json(&ChatRequest { prompt, history })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ChatError::Status { status, body });
        }

        let (tx, rx) = mpsc::channel::<ChatEvent>(64);
        let task = tokio::spawn(read_answer_stream(response, tx));
        Ok(ChatStream { events: rx, task })
    }
}

// ============================================
// Response-body loop
// ============================================

async fn read_answer_stream(response: reqwest::Response, tx: mpsc::Sender<ChatEvent>) {
    let mut reader = SseReader::new();
    let mut body = response.bytes_stream();
    let mut ignored: u64 = 0;

    while let Some(item) = body.next().await {
        let bytes = match item {
            Ok(bytes) => bytes,
            Err(err) => {
                // Mid-stream transport failure; whatever rendered stays.
                let _ = tx.send(ChatEvent::Error(err.to_string())).await;
                return;
            }
        };
        for event in reader.push(&bytes) {
            if dispatch_event(event, &tx, &mut ignored).await {
                log_ignored(ignored);
                return;
            }
        }
    }

    for event in reader.finish() {
        if dispatch_event(event, &tx, &mut ignored).await {
            log_ignored(ignored);
            return;
        }
    }

    // Server closed without a sentinel; treat as a clean end.
    let _ = tx.send(ChatEvent::Done).await;
    log_ignored(ignored);
}

/// Route one wire event. Returns true when the stream is finished.
async fn dispatch_event(
    event: SseEvent,
    tx: &mpsc::Sender<ChatEvent>,
    ignored: &mut u64,
) -> bool {
    match event.event.as_str() {
        EVENT_RETRIEVED_CHUNKS => {
            match serde_json::from_str::<ChunksPayload>(&event.data) {
                Ok(payload) => {
                    let _ = tx.send(ChatEvent::Chunks(payload.chunks)).await;
                }
                Err(_) => *ignored += 1,
            }
            false
        }
        EVENT_ERROR => {
            let message = serde_json::from_str::<ErrorPayload>(&event.data)
                .map(|p| p.error)
                .unwrap_or_else(|_| GENERIC_STREAM_ERROR.to_string());
            let _ = tx.send(ChatEvent::Error(message)).await;
            true
        }
        _ => match extract_delta(&event.data) {
            Some(Delta::Text(text)) => {
                let _ = tx.send(ChatEvent::Text(text)).await;
                false
            }
            Some(Delta::Done) => {
                let _ = tx.send(ChatEvent::Done).await;
                true
            }
            None => {
                *ignored += 1;
                false
            }
        },
    }
}

fn log_ignored(ignored: u64) {
    if ignored > 0 {
        debug!(ignored, "discarded non-conforming stream payloads");
    }
}
