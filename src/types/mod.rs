//! Shared type definitions
//!
//! Chat messages, API payloads and client configuration.

pub mod config;
pub mod message;
pub mod payload;
