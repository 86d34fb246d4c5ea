use crate::ai::{ChatClient, ChatError, ChatStream, HistoryMessage, SearchClient};
use crate::markdown::render_message;
use crate::session::{StreamOutcome, TranscriptSink, drive_stream, next_message_id};
use crate::types::{ChatMessage, Role};
use dioxus::prelude::*;
use std::time::Duration;
use time::{OffsetDateTime, UtcOffset, format_description::FormatItem, macros::format_description};
use tokio::task::AbortHandle;
use tracing::debug;

const MESSAGE_TIME_FORMAT: &[FormatItem<'static>] =
    format_description!("[hour repr:12 padding:zero]:[minute padding:zero] [period case:upper]");

/// How long a copy control shows its acknowledgment before reverting.
const COPIED_FLASH: Duration = Duration::from_millis(1500);

fn format_message_timestamp(timestamp: Option<OffsetDateTime>) -> Option<String> {
    let mut datetime = timestamp?;
    if let Ok(offset) = UtcOffset::current_local_offset() {
        datetime = datetime.to_offset(offset);
    }
    datetime.format(MESSAGE_TIME_FORMAT).ok()
}

fn copy_to_clipboard(text: String) {
    spawn(async move {
        if let Ok(mut clipboard) = arboard::Clipboard::new() {
            let _ = clipboard.set_text(text);
        }
    });
}

// ============================================
// Transcript sink over UI signals
// ============================================

/// Applies the stream driver's transcript mutations to the UI. Every
/// mutation is scoped to a message identifier; this struct holds no
/// notion of a "current" stream.
struct SignalSink {
    messages: Signal<Vec<ChatMessage>>,
    error: Signal<Option<String>>,
}

impl TranscriptSink for SignalSink {
    fn begin_message(&mut self, id: u64, text: String, chunks: Option<Vec<String>>) {
        self.messages
            .with_mut(|msgs| msgs.push(ChatMessage::assistant(id, text, chunks)));
    }

    fn append(&mut self, id: u64, text: String) {
        self.messages.with_mut(|msgs| {
            if let Some(msg) = msgs.iter_mut().find(|m| m.id == id) {
                msg.content.push_str(&text);
            }
        });
    }

    fn attach_chunks(&mut self, id: u64, chunks: Vec<String>) {
        self.messages.with_mut(|msgs| {
            if let Some(msg) = msgs.iter_mut().find(|m| m.id == id) {
                msg.chunks = Some(chunks);
            }
        });
    }

    fn show_error(&mut self, message: String) {
        self.error.set(Some(message));
    }
}

// ============================================
// Chat view
// ============================================

#[component]
pub fn ChatView() -> Element {
    let messages = use_signal(Vec::<ChatMessage>::new);
    let mut input = use_signal(String::new);
    let error = use_signal(|| Option::<String>::None);
    // Identifier of the message the active stream writes into; the UI
    // holds this handle instead of any shared stream state.
    let active_id = use_signal(|| Option::<u64>::None);
    let active_abort = use_signal(|| Option::<AbortHandle>::None);

    let mut send_message = {
        let mut messages = messages;
        let mut error = error;
        let mut active_id = active_id;
        let mut active_abort = active_abort;
        let mut input_signal = input;
        move |text: String| {
            let prompt = text.trim().to_string();
            if prompt.is_empty() {
                return;
            }

            // A new send cancels any in-flight stream; its message is
            // frozen at whatever the driver flushes on the way out.
            if let Some(handle) = active_abort.with_mut(|slot| slot.take()) {
                handle.abort();
            }
            error.set(None);
            input_signal.set(String::new());

            let history: Vec<HistoryMessage> = messages.with(|msgs| {
                msgs.iter()
                    .map(|m| HistoryMessage {
                        role: m.role,
                        content: m.content.clone(),
                    })
                    .collect()
            });
            messages.with_mut(|msgs| msgs.push(ChatMessage::user(next_message_id(), prompt.clone())));

            let answer_id = next_message_id();
            active_id.set(Some(answer_id));

            spawn(async move {
                // Client-side retrieval, when configured. Failures
                // degrade to an uncited answer.
                let seed_chunks = match SearchClient::from_env() {
                    Some(search) => search.retrieve(&prompt).await,
                    None => None,
                };

                let started = ChatClient::from_env().stream_chat(&prompt, &history).await;
                let outcome = match started {
                    Ok(stream) => {
                        run_stream(
                            answer_id,
                            seed_chunks,
                            stream,
                            active_id,
                            active_abort,
                            messages,
                            error,
                        )
                        .await
                    }
                    Err(err) => {
                        show_transport_error(answer_id, err, active_id, error);
                        StreamOutcome::Failed
                    }
                };
                debug!(answer_id, ?outcome, "answer stream finished");

                // Only the active session may clear the loading state;
                // an aborted one stays silent.
                if active_id() == Some(answer_id) {
                    active_id.set(None);
                    active_abort.set(None);
                }
            });
        }
    };

    let messages_snapshot = messages();
    let current = active_id();
    let awaiting_first_token = current
        .map(|id| !messages_snapshot.iter().any(|m| m.id == id))
        .unwrap_or(false);

    rsx! {
        div { class: "chat-wrap",
            if let Some(err) = error() {
                div { class: "error-banner", "{err}" }
            }
            div { id: "chat-list", class: "chat-list",
                for msg in messages_snapshot.iter() {
                    MessageRow {
                        message: msg.clone(),
                        is_streaming: current == Some(msg.id),
                    }
                }
                if awaiting_first_token {
                    div { class: "message-row assistant",
                        div { class: "bubble assistant",
                            span { class: "shimmer-text", "Thinking…" }
                        }
                    }
                }
            }

            form { class: "composer",
                div { class: "composer-inner",
                    textarea {
                        rows: "1",
                        placeholder: "Ask about your study materials…",
                        value: "{input}",
                        oninput: move |ev| input.set(ev.value()),
                        onkeydown: move |ev| {
                            if ev.key() == Key::Enter && !ev.modifiers().contains(Modifiers::SHIFT) {
                                ev.prevent_default();
                                let text = input();
                                send_message(text);
                            }
                        },
                        autofocus: true,
                    }
                    button {
                        class: "btn btn-primary",
                        r#type: "button",
                        disabled: input().trim().is_empty(),
                        onclick: move |_| {
                            let text = input();
                            send_message(text);
                        },
                        "Send"
                    }
                }
            }
        }
    }
}

/// Drive one answer stream to completion against the UI signals.
async fn run_stream(
    answer_id: u64,
    seed_chunks: Option<Vec<String>>,
    stream: ChatStream,
    active_id: Signal<Option<u64>>,
    mut active_abort: Signal<Option<AbortHandle>>,
    messages: Signal<Vec<ChatMessage>>,
    error: Signal<Option<String>>,
) -> StreamOutcome {
    // The user may have sent again while the request was connecting;
    // in that case this session is already stale.
    if active_id() != Some(answer_id) {
        stream.abort_handle().abort();
        return StreamOutcome::Cancelled;
    }
    active_abort.set(Some(stream.abort_handle()));

    let mut sink = SignalSink { messages, error };
    drive_stream(answer_id, seed_chunks, stream.events, &mut sink).await
}

/// Surface a transport failure, unless this session was already
/// superseded (cancellation never shows an error banner).
fn show_transport_error(
    answer_id: u64,
    err: ChatError,
    active_id: Signal<Option<u64>>,
    mut error: Signal<Option<String>>,
) {
    if active_id() == Some(answer_id) {
        error.set(Some(err.to_string()));
    }
}

// ============================================
// Message rendering
// ============================================

#[component]
fn MessageRow(message: ChatMessage, is_streaming: bool) -> Element {
    let role_class = match message.role {
        Role::User => "user",
        Role::Assistant => "assistant",
    };
    rsx! {
        div { class: "message-row {role_class}",
            div { class: "message-stack",
                div { class: "bubble {role_class}",
                    if matches!(message.role, Role::Assistant) {
                        AssistantBubble { message: message.clone(), is_streaming }
                    } else {
                        "{message.content}"
                    }
                }
                if let Some(ts) = format_message_timestamp(message.created_at) {
                    div { class: "message-meta",
                        span { class: "message-timestamp", "{ts}" }
                    }
                }
            }
        }
    }
}

#[component]
fn AssistantBubble(message: ChatMessage, is_streaming: bool) -> Element {
    let rendered = render_message(&message.content, message.chunks.as_deref());
    let mut copied = use_signal(|| Option::<usize>::None);

    // Slot 0 is the whole-message control; code blocks start at 1.
    let mut flash_copied = move |slot: usize| {
        copied.set(Some(slot));
        spawn(async move {
            tokio::time::sleep(COPIED_FLASH).await;
            if copied() == Some(slot) {
                copied.set(None);
            }
        });
    };

    let markdown_payload = message.content.clone();

    rsx! {
        div { class: "md", dangerous_inner_html: "{rendered.html}" }
        if !is_streaming {
            div { class: "bubble-controls",
                button {
                    class: "action-btn",
                    title: "Copy markdown",
                    onclick: move |_| {
                        copy_to_clipboard(markdown_payload.clone());
                        flash_copied(0);
                    },
                    if copied() == Some(0) { "Copied" } else { "Copy" }
                }
                for (slot, code) in (1usize..).zip(rendered.code_blocks.iter().cloned()) {
                    button {
                        class: "action-btn",
                        title: "Copy code block {slot}",
                        onclick: move |_| {
                            copy_to_clipboard(code.clone());
                            flash_copied(slot);
                        },
                        if copied() == Some(slot) { "Copied" } else { "Copy code {slot}" }
                    }
                }
            }
        }
    }
}
