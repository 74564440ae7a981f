//! UI components for Menu Chat
//!
//! This module contains all user interface components built with Dioxus.

pub mod chat;
