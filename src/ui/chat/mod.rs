//! Chat interface components
//!
//! Contains the main chat view, message display, and input components.

pub mod input;
pub mod message;

use std::cell::Cell;
use std::rc::Rc;

use dioxus::prelude::*;
use input::ChatInput;
use message::MessageBubble;

use crate::api::ChatApi;
use crate::app::AppState;
use crate::storage::settings::save_settings;

/// Starter prompts shown on an empty conversation
const SUGGESTIONS: [&str; 3] = ["점심 메뉴 추천해줘", "저렴한 한식 추천", "칼로리 낮은 메뉴"];

/// Sentinel after the last message, scrolled into view on every update
const CHAT_END_ID: &str = "chat-end";

#[component]
pub fn ChatView() -> Element {
    let app_state = use_context::<AppState>();
    let snapshot = app_state.snapshot;
    let mut settings = app_state.settings;

    // the running send, cancelled when the view goes away
    let in_flight = use_hook(|| Rc::new(Cell::new(None::<Task>)));
    {
        let in_flight = in_flight.clone();
        use_drop(move || {
            if let Some(task) = in_flight.take() {
                tracing::debug!("Chat view dropped, cancelling pending request");
                task.cancel();
            }
        });
    }

    // Keep the newest message in view
    use_effect(move || {
        let behavior = if snapshot.read().is_loading { "auto" } else { "smooth" };
        document::eval(&format!(
            "document.getElementById('{CHAT_END_ID}')?.scrollIntoView({{ behavior: '{behavior}', block: 'end' }});"
        ));
    });

    let health = use_resource({
        let session = app_state.session.clone();
        move || {
            let session = session.clone();
            async move {
                match session {
                    Some(session) => session.api().health_check().await,
                    None => false,
                }
            }
        }
    });

    let send = {
        let session = app_state.session.clone();
        let in_flight = in_flight.clone();
        move |text: String| {
            let Some(session) = session.clone() else {
                tracing::warn!("No chat session available, message dropped");
                return;
            };
            let use_streaming = settings.peek().use_streaming;
            let task = spawn(async move {
                let outcome = session.send_message(&text, use_streaming).await;
                tracing::debug!("Send finished: {:?}", outcome);
            });
            in_flight.set(Some(task));
        }
    };

    let clear = {
        let session = app_state.session.clone();
        move |_: MouseEvent| {
            if let Some(session) = session.as_ref() {
                session.clear_messages();
            }
        }
    };

    let toggle_streaming = move |_: MouseEvent| {
        let mut current = settings.write();
        current.use_streaming = !current.use_streaming;
        tracing::info!("Streaming answers: {}", current.use_streaming);
        if let Err(e) = save_settings(&current) {
            tracing::warn!("Failed to save settings: {}", e);
        }
    };

    let send_input = send.clone();
    let state = snapshot.read().clone();
    let use_streaming = settings.read().use_streaming;

    let (health_color, health_label) = match *health.read() {
        Some(true) => ("var(--success)", "Server online"),
        Some(false) => ("var(--error)", "Server offline"),
        None => ("var(--text-tertiary)", "Checking server..."),
    };
    let streaming_label = if use_streaming { "Streaming on" } else { "Streaming off" };
    let startup_failed = app_state.session.is_none();

    rsx! {
        div { class: "flex flex-col h-screen min-h-0 relative bg-[var(--bg-primary)]",

            // Header
            div { class: "flex items-center justify-between px-4 py-3 border-b border-[var(--border-subtle)]",
                div { class: "flex items-center gap-2",
                    span { class: "text-[15px] font-semibold text-[var(--text-primary)]", "Menu Chat" }
                    span {
                        class: "w-2 h-2 rounded-full",
                        style: "background: {health_color};",
                        title: "{health_label}",
                    }
                    span { class: "text-[11px] text-[var(--text-tertiary)]", "{health_label}" }
                }
                div { class: "flex items-center gap-2",
                    button {
                        class: "text-[12px] px-3 py-1 rounded-full border border-[var(--border-subtle)] text-[var(--text-secondary)]",
                        onclick: toggle_streaming,
                        "{streaming_label}"
                    }
                    button {
                        class: "text-[12px] px-3 py-1 rounded-full border border-[var(--border-subtle)] text-[var(--text-secondary)]",
                        disabled: state.messages.is_empty(),
                        onclick: clear,
                        "Clear"
                    }
                }
            }

            if startup_failed {
                div { class: "px-4 py-2 text-[13px] text-[var(--error)]",
                    "The HTTP client could not be started. Check the logs for details."
                }
            }

            // Messages
            div { class: "flex-1 min-h-0 overflow-y-auto px-4 py-4 custom-scrollbar scroll-smooth",
                div { class: "max-w-3xl mx-auto w-full flex flex-col gap-1 pb-4",
                    if state.messages.is_empty() {
                        div { class: "flex flex-col items-center gap-3 mt-16",
                            p { class: "text-[14px] text-[var(--text-secondary)]",
                                "What would you like to eat?"
                            }
                            div { class: "flex flex-wrap justify-center gap-2",
                                for suggestion in SUGGESTIONS {
                                    button {
                                        key: "{suggestion}",
                                        class: "text-[13px] px-3 py-1.5 rounded-full border border-[var(--border-subtle)] text-[var(--text-primary)] hover:bg-[var(--bg-elevated)]",
                                        disabled: state.is_loading,
                                        onclick: {
                                            let send = send.clone();
                                            move |_| send(suggestion.to_string())
                                        },
                                        "{suggestion}"
                                    }
                                }
                            }
                        }
                    }

                    for msg in state.messages.iter().cloned() {
                        MessageBubble { key: "{msg.id}", message: msg }
                    }

                    if let Some(error) = state.error.as_ref() {
                        div { class: "text-[12px] text-[var(--error)] px-2", "{error}" }
                    }

                    div { id: CHAT_END_ID }
                }
            }

            ChatInput {
                is_loading: state.is_loading,
                on_send: send_input,
            }
        }
    }
}
