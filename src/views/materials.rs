use crate::ai::{Topic, fetch_topics, materials_endpoint};
use crate::markdown::render_message;
use dioxus::prelude::*;
use tracing::warn;

/// Side panel listing the available study topics. Read-only; content
/// comes from the materials endpoint when one is configured.
#[component]
pub fn MaterialsPanel() -> Element {
    let topics = use_signal(Vec::<Topic>::new);
    let mut selected = use_signal(|| Option::<usize>::None);

    use_effect(move || {
        let mut topics = topics;
        spawn(async move {
            let Some(endpoint) = materials_endpoint() else {
                return;
            };
            match fetch_topics(&endpoint).await {
                Ok(loaded) => topics.set(loaded),
                Err(err) => warn!(%err, "could not load study materials"),
            }
        });
    });

    let topics_snapshot = topics();

    rsx! {
        div { class: "materials-panel",
            h2 { class: "materials-title", "Study materials" }
            if topics_snapshot.is_empty() {
                p { class: "materials-empty", "No materials loaded." }
            }
            ul { class: "materials-list",
                for (i, topic) in topics_snapshot.iter().enumerate() {
                    li {
                        class: if selected() == Some(i) { "materials-item active" } else { "materials-item" },
                        onclick: move |_| {
                            selected.set(if selected() == Some(i) { None } else { Some(i) });
                        },
                        div { class: "materials-item-title", "{topic.title}" }
                        if !topic.category.is_empty() {
                            span { class: "materials-item-category", "{topic.category}" }
                        }
                    }
                }
            }
            if let Some(topic) = selected().and_then(|i| topics_snapshot.get(i)) {
                TopicDetail { topic: topic.clone() }
            }
        }
    }
}

#[component]
fn TopicDetail(topic: Topic) -> Element {
    let rendered = render_message(&topic.content, None);
    rsx! {
        div { class: "topic-detail",
            div { class: "md", dangerous_inner_html: "{rendered.html}" }
            if !topic.key_concepts.is_empty() {
                h3 { "Key concepts" }
                ul {
                    for concept in topic.key_concepts.iter() {
                        li { "{concept}" }
                    }
                }
            }
            if !topic.study_questions.is_empty() {
                h3 { "Study questions" }
                ul {
                    for question in topic.study_questions.iter() {
                        li { "{question}" }
                    }
                }
            }
        }
    }
}
