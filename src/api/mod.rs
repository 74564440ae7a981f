//! Chat backend API
//!
//! This module handles all communication with the recommendation server:
//! single-shot answers, streamed answers and health checks.

pub mod client;
pub mod error;
pub mod sse;
pub mod streaming;

use async_trait::async_trait;

pub use client::ApiClient;
pub use error::ApiError;
pub use streaming::{Backoff, StreamHandler};

use crate::types::payload::{ChatRequest, ChatResponse, CompletedStream};

/// Operations the chat session needs from the backend
#[async_trait(?Send)]
pub trait ChatApi {
    /// One request, one validated answer. No retry.
    async fn send_chat(&self, request: &ChatRequest) -> Result<ChatResponse, ApiError>;

    /// Streamed answer with reconnects; progress goes to `handler`
    async fn stream_chat(
        &self,
        request: &ChatRequest,
        handler: &mut dyn StreamHandler,
    ) -> Result<CompletedStream, ApiError>;

    /// True only when the server answers 200
    async fn health_check(&self) -> bool;
}
