//! Chat input component, glass style with the send button inside

use dioxus::prelude::*;

/// Estimate how many rows the textarea needs based on content
fn compute_rows(text: &str) -> usize {
    let newlines = text.chars().filter(|&c| c == '\n').count();
    // ~40 wide chars per visual line
    let wrap_lines: usize = text
        .lines()
        .map(|line| line.chars().count().saturating_sub(1) / 40)
        .sum();
    (newlines + wrap_lines + 1).clamp(1, 6)
}

#[component]
pub fn ChatInput(on_send: EventHandler<String>, is_loading: bool) -> Element {
    let mut text = use_signal(String::new);

    let mut submit = move || {
        let value = text();
        if !is_loading && !value.trim().is_empty() {
            on_send.call(value);
            text.set(String::new());
        }
    };

    let handle_keydown = move |evt: KeyboardEvent| {
        if evt.key() == Key::Enter && !evt.modifiers().contains(Modifiers::SHIFT) {
            evt.prevent_default();
            submit();
        }
    };

    let can_send = !is_loading && !text().trim().is_empty();
    let rows = compute_rows(&text());
    let rows_str = rows.to_string();

    let container_class = if rows > 1 {
        "glass-input flex items-end gap-2 pr-2"
    } else {
        "glass-input flex items-center gap-2 pr-2"
    };

    let send_class = if can_send {
        "flex-shrink-0 w-9 h-9 rounded-full flex items-center justify-center transition-all hover:scale-105 active:scale-95"
    } else {
        "flex-shrink-0 w-9 h-9 rounded-full flex items-center justify-center transition-all cursor-not-allowed opacity-30"
    };

    let send_style = if can_send {
        "background: var(--accent-primary); color: #F2EDE7;"
    } else {
        "background: var(--bg-elevated);"
    };

    rsx! {
        div {
            class: "w-full px-4 pb-5 pt-2",

            div {
                class: "relative max-w-3xl mx-auto",

                div {
                    class: "{container_class}",
                    style: "border-radius: 28px; min-height: 52px;",

                    textarea {
                        class: "flex-1 bg-transparent outline-none text-[var(--text-primary)] resize-none placeholder-[var(--text-tertiary)] text-[15px] custom-scrollbar",
                        style: "line-height: 22px; padding: 15px 0 15px 20px; max-height: 160px; overflow-y: auto;",
                        placeholder: "Ask for a menu, e.g. 점심 메뉴 추천해줘",
                        value: "{text}",
                        oninput: move |evt| text.set(evt.value()),
                        onkeydown: handle_keydown,
                        disabled: is_loading,
                        rows: "{rows_str}",
                    }

                    button {
                        onclick: move |_| submit(),
                        disabled: !can_send,
                        class: "{send_class}",
                        style: "{send_style}",
                        title: "Send (Enter)",
                        svg {
                            width: "16",
                            height: "16",
                            view_box: "0 0 24 24",
                            fill: "none",
                            stroke: "currentColor",
                            stroke_width: "2",
                            stroke_linecap: "round",
                            stroke_linejoin: "round",
                            line { x1: "12", y1: "19", x2: "12", y2: "5" }
                            polyline { points: "5 12 12 5 19 12" }
                        }
                    }
                }

                p {
                    class: "text-center text-[11px] text-[var(--text-tertiary)] mt-2 opacity-40",
                    "Enter to send, Shift+Enter for a new line"
                }
            }
        }
    }
}
