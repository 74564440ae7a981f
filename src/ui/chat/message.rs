//! Message display components

use chrono::Local;
use dioxus::prelude::*;

use crate::types::message::{Message, Role};
use crate::types::payload::RecommendedMenu;

/// "13000" -> "13,000원"
fn format_price(won: u32) -> String {
    let digits = won.to_string();
    let mut out = String::with_capacity(digits.len() + 4);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out.push('원');
    out
}

/// Three bouncing dots while the answer is pending
#[component]
fn TypingIndicator() -> Element {
    rsx! {
        div { class: "flex items-center gap-1.5 py-2",
            div { class: "w-1.5 h-1.5 rounded-full bg-[var(--accent-primary)] opacity-60 animate-bounce" }
            div { class: "w-1.5 h-1.5 rounded-full bg-[var(--accent-primary)] opacity-60 animate-bounce delay-75" }
            div { class: "w-1.5 h-1.5 rounded-full bg-[var(--accent-primary)] opacity-60 animate-bounce delay-150" }
        }
    }
}

#[component]
fn MenuCard(menu: RecommendedMenu) -> Element {
    let price = menu.price.map(format_price);

    rsx! {
        div {
            class: "rounded-xl px-3 py-2 border border-[var(--border-subtle)] bg-[var(--bg-elevated)]",
            div { class: "flex items-baseline justify-between gap-2",
                span { class: "text-[14px] font-medium text-[var(--text-primary)]", "{menu.menu}" }
                if let Some(price) = price {
                    span { class: "text-[13px] text-[var(--accent-primary)]", "{price}" }
                }
            }
            div { class: "text-[12px] text-[var(--text-secondary)]", "{menu.restaurant}" }
            if let Some(address) = menu.address.as_ref() {
                div { class: "text-[11px] text-[var(--text-tertiary)]", "{address}" }
            }
            if let Some(reason) = menu.reason.as_ref() {
                div { class: "text-[12px] text-[var(--text-secondary)] mt-1", "{reason}" }
            }
        }
    }
}

#[component]
pub fn MessageBubble(message: Message) -> Element {
    let time = message
        .timestamp
        .with_timezone(&Local)
        .format("%H:%M")
        .to_string();

    if message.role == Role::User {
        // right-aligned, accent-tinted
        return rsx! {
            div { class: "message-layout animate-fade-in-up",
                div { class: "flex flex-col items-end mb-4",
                    div {
                        class: "message-user px-4 py-3 max-w-[85%]",
                        div {
                            class: "text-[15px] leading-relaxed text-[var(--text-primary)] whitespace-pre-wrap",
                            "{message.content}"
                        }
                    }
                    span { class: "text-[10px] text-[var(--text-tertiary)] mt-1", "{time}" }
                }
            }
        };
    }

    let waiting = message.is_loading && message.content.is_empty();
    let text_color = if message.is_error { "var(--error)" } else { "var(--text-primary)" };

    rsx! {
        div { class: "message-layout animate-fade-in-up",
            div { class: "flex items-start gap-3 mb-4",
                div {
                    class: "flex-shrink-0 w-6 h-6 rounded-full flex items-center justify-center mt-1",
                    style: "background: var(--accent-primary); box-shadow: 0 4px 12px -4px var(--accent-glow);",
                    svg {
                        class: "w-3 h-3",
                        style: "color: #F2EDE7;",
                        view_box: "0 0 24 24",
                        fill: "none",
                        stroke: "currentColor",
                        stroke_width: "2.5",
                        stroke_linecap: "round",
                        stroke_linejoin: "round",
                        path { d: "M21 15a2 2 0 0 1-2 2H7l-4 4V5a2 2 0 0 1 2-2h14a2 2 0 0 1 2 2z" }
                    }
                }

                div { class: "flex-1 min-w-0",
                    if waiting {
                        TypingIndicator {}
                    } else {
                        div {
                            class: "text-[15px] leading-relaxed whitespace-pre-wrap",
                            style: "color: {text_color};",
                            "{message.content}"
                        }
                    }

                    if !message.recommended_menus.is_empty() {
                        div { class: "grid grid-cols-1 sm:grid-cols-2 gap-2 mt-3",
                            for menu in message.recommended_menus.iter().cloned() {
                                MenuCard { menu }
                            }
                        }
                    }

                    if !waiting {
                        span { class: "text-[10px] text-[var(--text-tertiary)] mt-1 block", "{time}" }
                    }
                }
            }
        }
    }
}
