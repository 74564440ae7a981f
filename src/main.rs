#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

use dioxus::desktop::{Config, WindowBuilder};
use menu_chat::app::App;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("menu_chat=info")),
        )
        .init();

    tracing::info!("Starting menu-chat");

    dioxus::LaunchBuilder::desktop()
        .with_cfg(
            Config::new().with_window(
                WindowBuilder::new()
                    .with_title("Menu Chat")
                    .with_resizable(true),
            ),
        )
        .launch(App);
}
