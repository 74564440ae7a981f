//! Root Dioxus application component
//!
//! This module contains the main App component that serves as the root of the UI tree.

use std::rc::Rc;

use dioxus::prelude::*;

use crate::api::ApiClient;
use crate::chat::{ChatObserver, ChatSession, ChatSnapshot};
use crate::storage::settings::{load_settings, AppSettings};
use crate::types::config::ClientConfig;
use crate::ui::chat::ChatView;

/// Mirrors session changes into a signal so the view re-renders
struct SignalObserver(Signal<ChatSnapshot>);

impl ChatObserver for SignalObserver {
    fn on_change(&self, snapshot: &ChatSnapshot) {
        let mut signal = self.0;
        signal.set(snapshot.clone());
    }
}

/// Global application state shared across components
#[derive(Clone)]
pub struct AppState {
    pub settings: Signal<AppSettings>,
    pub snapshot: Signal<ChatSnapshot>,
    /// `None` when the HTTP client could not be built
    pub session: Option<Rc<ChatSession<ApiClient>>>,
}

impl AppState {
    pub fn new(settings: Signal<AppSettings>, snapshot: Signal<ChatSnapshot>) -> Self {
        let config = ClientConfig::from(&*settings.peek());
        let history_limit = config.history_limit;
        tracing::info!("Using recommendation server at {}", config.base_url);

        let session = match ApiClient::new(config) {
            Ok(client) => Some(Rc::new(
                ChatSession::new(client)
                    .with_history_limit(history_limit)
                    .with_observer(SignalObserver(snapshot)),
            )),
            Err(e) => {
                tracing::error!("Failed to create HTTP client: {}", e);
                None
            }
        };

        Self {
            settings,
            snapshot,
            session,
        }
    }
}

#[component]
pub fn App() -> Element {
    let settings = use_signal(load_settings);
    let snapshot = use_signal(ChatSnapshot::default);
    let app_state = use_hook(|| AppState::new(settings, snapshot));
    use_context_provider(|| app_state);

    rsx! {
        ChatView {}
    }
}
