use crate::views::{ChatView, MaterialsPanel};
use dioxus::prelude::*;

const APP_CSS: &str = r#"
:root { font-size: 14px; color-scheme: dark; }
body { margin: 0; background: #141417; color: #e8e8ea; font-family: system-ui, sans-serif; }
.app-header { padding: 0.6rem 1rem; border-bottom: 1px solid #2a2a31; font-weight: 600; }
.app-shell { display: flex; height: calc(100vh - 2.5rem); }
.chat-wrap { flex: 1; display: flex; flex-direction: column; padding: 1rem; }
.chat-list { flex: 1; overflow-y: auto; display: flex; flex-direction: column; gap: 0.75rem; }
.message-row.user { align-self: flex-end; max-width: 70%; }
.message-row.assistant { align-self: flex-start; max-width: 85%; }
.bubble { border-radius: 12px; padding: 0.6rem 0.9rem; }
.bubble.user { background: #2d5bff; color: white; }
.bubble.assistant { background: #222228; }
.message-meta { font-size: 0.75rem; opacity: 0.5; margin-top: 0.15rem; }
.composer-inner { display: flex; gap: 0.5rem; align-items: flex-end; margin-top: 0.75rem; }
.composer-inner textarea { flex: 1; resize: none; border-radius: 8px; padding: 0.5rem; }
.error-banner { background: #5b1f24; color: #ffd7d9; border-radius: 8px; padding: 0.5rem 0.75rem; margin-bottom: 0.5rem; }
.shimmer-text { opacity: 0.6; font-style: italic; }
.bubble-controls { display: flex; gap: 0.4rem; margin-top: 0.35rem; }
.action-btn { font-size: 0.75rem; background: #2a2a31; color: #cfcfd4; border: none; border-radius: 6px; padding: 0.2rem 0.55rem; cursor: pointer; }
.code-block { position: relative; margin: 0.5rem 0; }
.code-block pre { overflow-x: auto; background: #1a1a1f; border-radius: 8px; padding: 0.6rem; }
.citation { border-bottom: 1px dotted #7aa2ff; position: relative; }
.citation-badge { color: #7aa2ff; font-size: 0.7em; margin-left: 0.1em; }
.citation-tooltip { display: none; position: absolute; left: 0; top: 1.4em; z-index: 10;
  background: #2a2a31; color: #e8e8ea; border-radius: 8px; padding: 0.5rem;
  width: 22rem; max-width: 60vw; font-size: 0.8rem; }
.citation:hover .citation-tooltip { display: block; }
.materials-panel { width: 20rem; border-left: 1px solid #2a2a31; padding: 1rem; overflow-y: auto; }
.materials-item { list-style: none; padding: 0.4rem 0.5rem; border-radius: 6px; cursor: pointer; }
.materials-item.active { background: #222228; }
.materials-item-category { font-size: 0.7rem; opacity: 0.6; }
.materials-list { margin: 0; padding: 0; }
.topic-detail { margin-top: 0.75rem; font-size: 0.85rem; }
"#;

#[component]
pub fn App() -> Element {
    rsx! {
        style { dangerous_inner_html: "{APP_CSS}" }
        header { class: "app-header", "Study Chat" }
        div { class: "app-shell",
            ChatView {}
            MaterialsPanel {}
        }
    }
}
