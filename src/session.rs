//! Per-stream session driver: the token aggregator.
//!
//! The network task delivers `ChatEvent`s over a channel; this module
//! owns all per-stream state (pending fragments, early-arriving
//! chunks, the single scheduled flush) and applies transcript
//! mutations through a [`TranscriptSink`], always scoped to one
//! message identifier. Nothing here reaches for ambient "current
//! stream" state, so an abort racing a new send cannot contaminate a
//! different message.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::debug;

use crate::ai::ChatEvent;

/// Minimum interval between visual updates while tokens are arriving,
/// roughly one redraw.
pub const FLUSH_INTERVAL: Duration = Duration::from_millis(33);

static MESSAGE_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Allocate a transcript message identifier. Every send gets a fresh
/// one, which is what keeps two streams from ever targeting the same
/// message.
pub fn next_message_id() -> u64 {
    MESSAGE_COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// How a stream ended.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum StreamOutcome {
    /// The stream delivered its terminal sentinel or closed cleanly.
    Completed,
    /// The stream reported an error; it was surfaced via the sink.
    Failed,
    /// The stream was aborted locally. Not an error.
    Cancelled,
}

/// Transcript mutations the driver is allowed to perform. The UI layer
/// implements this over its signals; tests implement it over plain
/// vectors.
pub trait TranscriptSink {
    /// Create the assistant message for this stream. Called at most
    /// once, on the first text fragment.
    fn begin_message(&mut self, id: u64, text: String, chunks: Option<Vec<String>>);
    /// Append one coalesced batch to the message's content.
    fn append(&mut self, id: u64, text: String);
    /// Attach citation chunks to an already-created message, located
    /// by identifier, never by position.
    fn attach_chunks(&mut self, id: u64, chunks: Vec<String>);
    /// Surface a whole-stream failure. Content already appended stays.
    fn show_error(&mut self, message: String);
}

/// Consume a stream's events, coalescing text fragments into bounded
/// visual updates.
///
/// `seed_chunks` carries citation sources retrieved before the stream
/// was opened; chunks arriving on the wire replace them. The first
/// fragment creates the message immediately; later fragments queue
/// behind a single scheduled flush. Completion, failure, and
/// cancellation all flush synchronously first, so no received token is
/// ever dropped, and fragments are only ever appended in arrival
/// order.
pub async fn drive_stream<S: TranscriptSink>(
    message_id: u64,
    seed_chunks: Option<Vec<String>>,
    mut events: mpsc::Receiver<ChatEvent>,
    sink: &mut S,
) -> StreamOutcome {
    let mut started = false;
    let mut early_chunks: Option<Vec<String>> = seed_chunks;
    let mut pending: Vec<String> = Vec::new();
    let mut flush_at: Option<Instant> = None;

    let mut flush = |pending: &mut Vec<String>, flush_at: &mut Option<Instant>, sink: &mut S| {
        if !pending.is_empty() {
            sink.append(message_id, std::mem::take(pending).concat());
        }
        *flush_at = None;
    };

    loop {
        let event = match flush_at {
            Some(deadline) => tokio::select! {
                event = events.recv() => event,
                _ = tokio::time::sleep_until(deadline) => {
                    flush(&mut pending, &mut flush_at, sink);
                    continue;
                }
            },
            None => events.recv().await,
        };

        match event {
            Some(ChatEvent::Text(fragment)) => {
                if started {
                    pending.push(fragment);
                    if flush_at.is_none() {
                        flush_at = Some(Instant::now() + FLUSH_INTERVAL);
                    }
                } else {
                    // First token: show it with no perceptible delay,
                    // carrying any chunks that beat it here.
                    sink.begin_message(message_id, fragment, early_chunks.take());
                    started = true;
                }
            }
            Some(ChatEvent::Chunks(chunks)) => {
                if started {
                    sink.attach_chunks(message_id, chunks);
                } else {
                    early_chunks = Some(chunks);
                }
            }
            Some(ChatEvent::Done) => {
                flush(&mut pending, &mut flush_at, sink);
                return StreamOutcome::Completed;
            }
            Some(ChatEvent::Error(message)) => {
                flush(&mut pending, &mut flush_at, sink);
                sink.show_error(message);
                return StreamOutcome::Failed;
            }
            None => {
                // Channel closed without a terminal event: the network
                // task was aborted. Flush what was queued and freeze.
                debug!(message_id, "stream channel closed before completion");
                flush(&mut pending, &mut flush_at, sink);
                return StreamOutcome::Cancelled;
            }
        }
    }
}
