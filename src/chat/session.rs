//! Chat session state
//!
//! Owns the transcript, the loading flag, the last error and the
//! conversation id, and turns a user's text into one backend exchange.
//! Every state change is published to the observer synchronously, so a
//! streamed chunk is visible before the next one is parsed.

use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::api::{ApiError, ChatApi, StreamHandler};
use crate::types::config::DEFAULT_HISTORY_LIMIT;
use crate::types::message::Message;
use crate::types::payload::{ChatRequest, CompletedStream, HistoryEntry, RecommendedMenu};

/// Read-only view of the session
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatSnapshot {
    pub messages: Vec<Message>,
    pub is_loading: bool,
    pub error: Option<String>,
    pub conversation_id: Option<String>,
}

/// Notified after every state change, before control returns to the caller
pub trait ChatObserver {
    fn on_change(&self, snapshot: &ChatSnapshot);
}

impl<F: Fn(&ChatSnapshot)> ChatObserver for F {
    fn on_change(&self, snapshot: &ChatSnapshot) {
        self(snapshot)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RejectReason {
    /// Empty or whitespace-only input
    Blank,
    /// Another message is still being answered
    InFlight,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SendOutcome {
    Rejected(RejectReason),
    Completed,
    Failed,
}

struct SessionState {
    snapshot: ChatSnapshot,
    /// Bumped by `clear_messages`; late answers from an older generation are dropped
    generation: u64,
}

/// The in-flight exchange
struct Turn {
    placeholder_id: String,
    generation: u64,
}

/// Final values written into the placeholder
struct Settlement {
    content: String,
    recommended_menus: Vec<RecommendedMenu>,
    conversation_id: Option<String>,
    error: Option<String>,
    /// `content` is the error notice itself
    is_error: bool,
}

pub struct ChatSession<A: ChatApi> {
    api: A,
    state: Mutex<SessionState>,
    observer: Option<Box<dyn ChatObserver>>,
    history_limit: usize,
}

impl<A: ChatApi> ChatSession<A> {
    pub fn new(api: A) -> Self {
        Self {
            api,
            state: Mutex::new(SessionState {
                snapshot: ChatSnapshot::default(),
                generation: 0,
            }),
            observer: None,
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }

    pub fn with_observer(mut self, observer: impl ChatObserver + 'static) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn snapshot(&self) -> ChatSnapshot {
        self.lock().snapshot.clone()
    }

    pub fn messages(&self) -> Vec<Message> {
        self.lock().snapshot.messages.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.lock().snapshot.is_loading
    }

    pub fn error(&self) -> Option<String> {
        self.lock().snapshot.error.clone()
    }

    pub fn conversation_id(&self) -> Option<String> {
        self.lock().snapshot.conversation_id.clone()
    }

    /// Send `content` and wait for the answer
    ///
    /// The user message and an open assistant placeholder are in the
    /// transcript before any network activity starts.
    pub async fn send_message(&self, content: &str, use_streaming: bool) -> SendOutcome {
        let content = content.trim();
        if content.is_empty() {
            tracing::debug!("Ignoring blank message");
            return SendOutcome::Rejected(RejectReason::Blank);
        }

        let Some((request, turn)) = self.begin_turn(content) else {
            tracing::debug!("A message is already being answered, ignoring send");
            return SendOutcome::Rejected(RejectReason::InFlight);
        };
        self.publish();

        tracing::info!(
            "Sending message ({} chars, streaming: {})",
            content.chars().count(),
            use_streaming
        );

        if use_streaming {
            self.run_streaming(&request, &turn).await
        } else {
            self.run_single(&request, &turn).await
        }
    }

    /// Forget the conversation
    pub fn clear_messages(&self) {
        {
            let mut state = self.lock();
            state.snapshot.messages.clear();
            state.snapshot.conversation_id = None;
            state.snapshot.error = None;
            state.generation += 1;
        }
        tracing::info!("Conversation cleared");
        self.publish();
    }

    fn begin_turn(&self, content: &str) -> Option<(ChatRequest, Turn)> {
        let mut state = self.lock();
        if state.snapshot.is_loading {
            return None;
        }

        let request = ChatRequest {
            message: content.to_string(),
            conversation_id: state.snapshot.conversation_id.clone(),
            history: build_history(&state.snapshot.messages, self.history_limit),
        };

        let placeholder = Message::placeholder();
        let turn = Turn {
            placeholder_id: placeholder.id.clone(),
            generation: state.generation,
        };

        state.snapshot.messages.push(Message::user(content));
        state.snapshot.messages.push(placeholder);
        state.snapshot.is_loading = true;
        state.snapshot.error = None;

        Some((request, turn))
    }

    async fn run_streaming(&self, request: &ChatRequest, turn: &Turn) -> SendOutcome {
        let mut writer = PlaceholderWriter {
            session: self,
            turn,
            text: String::new(),
            received: false,
        };
        let result = self.api.stream_chat(request, &mut writer).await;
        let (partial, received) = (writer.text, writer.received);

        match result {
            Ok(done) => {
                self.settle(
                    turn,
                    Settlement {
                        content: done.content,
                        recommended_menus: Vec::new(),
                        conversation_id: done.conversation_id,
                        error: None,
                        is_error: false,
                    },
                );
                SendOutcome::Completed
            }
            Err(err) if !received => {
                tracing::warn!(
                    "Stream failed before any text ({}), falling back to a single request",
                    err
                );
                self.run_single(request, turn).await
            }
            Err(err) => {
                let message = err.user_message();
                let is_error = partial.is_empty();
                let content = if is_error { message.clone() } else { partial };
                self.settle(
                    turn,
                    Settlement {
                        content,
                        recommended_menus: Vec::new(),
                        conversation_id: None,
                        error: Some(message),
                        is_error,
                    },
                );
                SendOutcome::Failed
            }
        }
    }

    async fn run_single(&self, request: &ChatRequest, turn: &Turn) -> SendOutcome {
        match self.api.send_chat(request).await {
            Ok(response) => {
                self.settle(
                    turn,
                    Settlement {
                        content: response.response,
                        recommended_menus: response.recommended_menus,
                        conversation_id: Some(response.conversation_id),
                        error: None,
                        is_error: false,
                    },
                );
                SendOutcome::Completed
            }
            Err(err) => {
                tracing::error!("Chat request failed: {}", err);
                let message = err.user_message();
                self.settle(
                    turn,
                    Settlement {
                        content: message.clone(),
                        recommended_menus: Vec::new(),
                        conversation_id: None,
                        error: Some(message),
                        is_error: true,
                    },
                );
                SendOutcome::Failed
            }
        }
    }

    /// Show streamed text in the placeholder
    fn show_partial(&self, turn: &Turn, text: &str) {
        {
            let mut state = self.lock();
            replace_message(&mut state.snapshot.messages, &turn.placeholder_id, |m| {
                m.with_content(text)
            });
        }
        self.publish();
    }

    /// Put the placeholder back into its waiting state
    fn reopen(&self, turn: &Turn) {
        {
            let mut state = self.lock();
            replace_message(&mut state.snapshot.messages, &turn.placeholder_id, |m| Message {
                content: String::new(),
                is_loading: true,
                ..m.clone()
            });
        }
        self.publish();
    }

    /// Close the turn: final content, loading off
    fn settle(&self, turn: &Turn, settlement: Settlement) {
        {
            let mut state = self.lock();
            state.snapshot.is_loading = false;

            let current = state.generation == turn.generation;
            let Settlement {
                content,
                recommended_menus,
                conversation_id,
                error,
                is_error,
            } = settlement;

            replace_message(&mut state.snapshot.messages, &turn.placeholder_id, |m| Message {
                recommended_menus,
                is_error,
                ..m.with_content(content)
            });

            if current {
                if let Some(id) = conversation_id {
                    state.snapshot.conversation_id = Some(id);
                }
                state.snapshot.error = error;
            }
        }
        self.publish();
    }

    fn publish(&self) {
        if let Some(observer) = &self.observer {
            let snapshot = self.snapshot();
            observer.on_change(&snapshot);
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Merges streamed chunks into the placeholder message
struct PlaceholderWriter<'a, A: ChatApi> {
    session: &'a ChatSession<A>,
    turn: &'a Turn,
    text: String,
    received: bool,
}

impl<A: ChatApi> StreamHandler for PlaceholderWriter<'_, A> {
    fn on_chunk(&mut self, delta: &str) {
        self.text.push_str(delta);
        self.received = true;
        self.session.show_partial(self.turn, &self.text);
    }

    fn on_restart(&mut self) {
        self.text.clear();
        self.session.reopen(self.turn);
    }

    fn on_complete(&mut self, stream: &CompletedStream) {
        self.text = stream.content.clone();
        self.session.show_partial(self.turn, &self.text);
    }

    fn on_error(&mut self, error: &ApiError) {
        tracing::debug!("Stream gave up: {}", error);
    }
}

fn replace_message(messages: &mut [Message], id: &str, update: impl FnOnce(&Message) -> Message) {
    if let Some(slot) = messages.iter_mut().find(|m| m.id == id) {
        *slot = update(slot);
    }
}

/// The last `limit` settled answers and questions, oldest first; error notices are left out
fn build_history(messages: &[Message], limit: usize) -> Vec<HistoryEntry> {
    let settled: Vec<&Message> = messages
        .iter()
        .filter(|m| m.belongs_in_history())
        .collect();
    let skip = settled.len().saturating_sub(limit);

    settled[skip..].iter().map(|m| m.to_history()).collect()
}
