//! Client for the retrieval (semantic search) service.
//!
//! Used to pre-fetch context passages before a send when the chat
//! endpoint does not do retrieval itself. Only the `text` field of
//! each result is consumed; response order is preserved and becomes
//! the 1-based citation index space for the answer.

use serde::{Deserialize, Serialize};
use std::env;
use tracing::warn;

const DEFAULT_TOP_K: usize = 5;

#[derive(Serialize)]
struct SearchRequest<'a> {
    query: &'a str,
    top_k: usize,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchHit>,
}

#[derive(Deserialize)]
struct SearchHit {
    // Raw value: a non-string `text` means the hit is skipped, not
    // that the response is rejected.
    #[serde(default)]
    text: Option<serde_json::Value>,
}

pub struct SearchClient {
    http: reqwest::Client,
    endpoint: String,
    top_k: usize,
}

impl SearchClient {
    pub fn new(endpoint: impl Into<String>, top_k: usize) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: endpoint.into(),
            top_k,
        }
    }

    /// Build a client only when a search endpoint is configured;
    /// retrieval is optional and its absence is not an error.
    pub fn from_env() -> Option<Self> {
        let endpoint = env::var("SEARCH_ENDPOINT").ok()?;
        let top_k = env::var("SEARCH_TOP_K")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_TOP_K);
        Some(Self::new(endpoint, top_k))
    }

    /// Fetch context passages for a query. Retrieval failures degrade
    /// to an uncited answer rather than blocking the send.
    pub async fn retrieve(&self, query: &str) -> Option<Vec<String>> {
        let response = self
            .http
            .post(&self.endpoint)
            .json(&SearchRequest {
                query,
                top_k: self.top_k,
            })
            .send()
            .await;

        let response = match response {
            Ok(r) if r.status().is_success() => r,
            Ok(r) => {
                warn!(status = %r.status(), "search request rejected");
                return None;
            }
            Err(err) => {
                warn!(%err, "search request failed");
                return None;
            }
        };

        let parsed: SearchResponse = match response.json().await {
            Ok(parsed) => parsed,
            Err(err) => {
                warn!(%err, "search response did not parse");
                return None;
            }
        };

        let chunks = collect_chunks(parsed);
        if chunks.is_empty() { None } else { Some(chunks) }
    }
}

fn collect_chunks(response: SearchResponse) -> Vec<String> {
    response
        .results
        .into_iter()
        .filter_map(|hit| {
            hit.text
                .as_ref()
                .and_then(|v| v.as_str())
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        })
        .collect()
}
