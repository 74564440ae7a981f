//! Menu Chat Library
//!
//! Core library for the restaurant menu recommendation chat client.

pub mod api;
pub mod app;
pub mod chat;
pub mod storage;
pub mod types;
pub mod ui;
