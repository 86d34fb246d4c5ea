//! Wire-level decoding for the streaming chat response: a line-oriented
//! event-stream reader plus the delta extractor that interprets chat
//! completion payloads.

mod delta;
mod reader;

pub use delta::{DONE_SENTINEL, Delta, extract_delta};
pub use reader::{SseEvent, SseReader};
