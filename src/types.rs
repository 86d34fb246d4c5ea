use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One entry in the conversation transcript.
///
/// `content` accumulates while the message's stream is active and is
/// frozen once the stream completes or is cancelled. `chunks` is the
/// ordered citation source list (1-based index space) for an assistant
/// answer; it is fixed at the moment it is attached and never
/// renumbered, even if some indices are never cited.
#[derive(Clone, Debug, PartialEq)]
pub struct ChatMessage {
    pub id: u64,
    pub role: Role,
    pub content: String,
    pub chunks: Option<Vec<String>>,
    pub created_at: Option<OffsetDateTime>,
}

impl ChatMessage {
    pub fn user(id: u64, content: impl Into<String>) -> Self {
        Self {
            id,
            role: Role::User,
            content: content.into(),
            chunks: None,
            created_at: Some(OffsetDateTime::now_utc()),
        }
    }

    pub fn assistant(id: u64, content: impl Into<String>, chunks: Option<Vec<String>>) -> Self {
        Self {
            id,
            role: Role::Assistant,
            content: content.into(),
            chunks,
            created_at: Some(OffsetDateTime::now_utc()),
        }
    }
}
