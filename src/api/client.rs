//! HTTP client for the recommendation backend
//!
//! `POST /chat` for single-shot answers, `POST /chat/stream` for SSE answers
//! and `GET /health` for availability.

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::StatusCode;

use crate::api::error::ApiError;
use crate::api::streaming::{
    drive_stream, Backoff, ByteSource, EventTransport, StreamHandler, TokioBackoff,
};
use crate::api::ChatApi;
use crate::types::config::ClientConfig;
use crate::types::payload::{ChatRequest, ChatResponse, CompletedStream};

pub struct ApiClient {
    config: ClientConfig,
    client: reqwest::Client,
    backoff: Box<dyn Backoff>,
}

impl ApiClient {
    pub fn new(config: ClientConfig) -> Result<Self, ApiError> {
        // no overall timeout here: streams may legitimately run long,
        // single-shot requests set their own bound
        let client = reqwest::Client::builder()
            .connect_timeout(config.request_timeout)
            .build()
            .map_err(|e| ApiError::Client(e.to_string()))?;

        Ok(Self {
            config,
            client,
            backoff: Box::new(TokioBackoff),
        })
    }

    /// Replace the timer used between stream reconnects
    pub fn with_backoff(mut self, backoff: impl Backoff + 'static) -> Self {
        self.backoff = Box::new(backoff);
        self
    }

    fn transport_error(&self, err: reqwest::Error) -> ApiError {
        ApiError::from_reqwest(err, self.config.request_timeout)
    }
}

#[async_trait(?Send)]
impl ChatApi for ApiClient {
    async fn send_chat(&self, request: &ChatRequest) -> Result<ChatResponse, ApiError> {
        let url = self.config.endpoint("/chat");
        tracing::info!("POST {} ({} history entries)", url, request.history.len());

        let response = self
            .client
            .post(&url)
            .timeout(self.config.request_timeout)
            .json(request)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| self.transport_error(e))?;

        if !status.is_success() {
            return Err(ApiError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = serde_json::from_str(&body).map_err(|e| {
            tracing::warn!("Rejected malformed chat response: {}", e);
            ApiError::Validation(e.to_string())
        })?;

        tracing::info!(
            "Chat response received: {} chars, {} menus",
            parsed.response.chars().count(),
            parsed.recommended_menus.len()
        );
        Ok(parsed)
    }

    async fn stream_chat(
        &self,
        request: &ChatRequest,
        handler: &mut dyn StreamHandler,
    ) -> Result<CompletedStream, ApiError> {
        drive_stream(
            self,
            self.backoff.as_ref(),
            self.config.retry,
            self.config.stall_warning,
            request,
            handler,
        )
        .await
    }

    async fn health_check(&self) -> bool {
        let url = self.config.endpoint("/health");

        match self
            .client
            .get(&url)
            .timeout(self.config.request_timeout)
            .send()
            .await
        {
            Ok(response) => response.status() == StatusCode::OK,
            Err(e) => {
                tracing::debug!("Health check failed: {}", e);
                false
            }
        }
    }
}

#[async_trait(?Send)]
impl EventTransport for ApiClient {
    async fn open(&self, request: &ChatRequest) -> Result<Box<dyn ByteSource>, ApiError> {
        let url = self.config.endpoint("/chat/stream");
        tracing::debug!("POST {} (event stream)", url);

        let response = self
            .client
            .post(&url)
            .header(ACCEPT, "text/event-stream")
            .json(request)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(Box::new(ResponseBody(response)))
    }
}

/// Body of an open event-stream response
struct ResponseBody(reqwest::Response);

#[async_trait(?Send)]
impl ByteSource for ResponseBody {
    async fn next_bytes(&mut self) -> Option<Result<Vec<u8>, ApiError>> {
        match self.0.chunk().await {
            Ok(Some(bytes)) => Some(Ok(bytes.to_vec())),
            Ok(None) => None,
            Err(e) => Some(Err(ApiError::Network(e.to_string()))),
        }
    }
}
