//! Read-only client for the study-materials listing endpoint, which
//! populates the side panel.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::env;

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct Topic {
    #[serde(default)]
    pub id: serde_json::Value,
    pub title: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub key_concepts: Vec<String>,
    #[serde(default)]
    pub study_questions: Vec<String>,
}

pub fn materials_endpoint() -> Option<String> {
    env::var("MATERIALS_ENDPOINT").ok()
}

pub async fn fetch_topics(endpoint: &str) -> Result<Vec<Topic>> {
    let response = reqwest::get(endpoint)
        .await
        .context("materials request failed")?;
    let status = response.status();
    if !status.is_success() {
        anyhow::bail!("materials endpoint returned {status}");
    }
    response
        .json::<Vec<Topic>>()
        .await
        .context("materials listing did not parse")
}
