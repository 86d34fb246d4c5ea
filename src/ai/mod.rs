//! Network clients for the three external collaborators: the
//! streaming chat endpoint, the retrieval (semantic search) service,
//! and the study-materials listing.

mod client;
mod materials;
mod search;

pub use client::{ChatClient, ChatError, ChatEvent, ChatStream, HistoryMessage};
pub use materials::{Topic, fetch_topics, materials_endpoint};
pub use search::SearchClient;
