//! Streaming answer reassembly
//!
//! Drives one `POST /chat/stream` call to a terminal state:
//! - State machine (Idle → Connecting → Streaming → Completed | Failed)
//! - Exponential backoff between connection attempts
//! - Chunk callbacks in byte-arrival order, completion after the last chunk
//! - Exactly one terminal callback per call

use std::time::Duration;

use async_trait::async_trait;

use crate::api::error::ApiError;
use crate::api::sse::{parse_chunk, SseDecoder, SseEvent};
use crate::types::config::RetryPolicy;
use crate::types::payload::{ChatRequest, CompletedStream, Source, StreamChunk};

/// Receives the progress of a streamed answer
pub trait StreamHandler {
    /// A new piece of text; the handler accumulates it
    fn on_chunk(&mut self, delta: &str);
    /// A reconnect has started replaying the answer; drop any partial text.
    /// Fires right before the first payload of the new connection is applied.
    fn on_restart(&mut self) {}
    /// The stream finished; fires at most once
    fn on_complete(&mut self, stream: &CompletedStream);
    /// Retries are exhausted; fires at most once, never together with `on_complete`
    fn on_error(&mut self, error: &ApiError);
}

/// Incremental body of an open stream
#[async_trait(?Send)]
pub trait ByteSource {
    /// Next piece of the body, `None` at end of input
    async fn next_bytes(&mut self) -> Option<Result<Vec<u8>, ApiError>>;
}

/// Opens the event stream for a request
#[async_trait(?Send)]
pub trait EventTransport {
    async fn open(&self, request: &ChatRequest) -> Result<Box<dyn ByteSource>, ApiError>;
}

/// Waits between connection attempts
#[async_trait(?Send)]
pub trait Backoff {
    async fn wait(&self, delay: Duration);
}

/// Backoff on the tokio timer
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioBackoff;

#[async_trait(?Send)]
impl Backoff for TokioBackoff {
    async fn wait(&self, delay: Duration) {
        tokio::time::sleep(delay).await;
    }
}

/// Current phase of a streaming call
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamPhase {
    Idle,
    /// Opening (or reopening) the connection
    Connecting,
    /// Reading the body
    Streaming,
    /// Finished successfully
    Completed,
    /// Gave up
    Failed,
}

/// Outcome of applying one payload
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChunkFlow {
    Continue,
    Done,
}

/// What to do after a failed attempt
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureAction {
    Retry(Duration),
    GiveUp,
}

/// Per-call state: attempt counter, accumulated text, terminal flag
#[derive(Debug)]
pub struct StreamState {
    phase: StreamPhase,
    attempt: u32,
    accumulated: String,
    chunks: usize,
    conversation_id: Option<String>,
    sources: Vec<Source>,
    /// A failed attempt delivered text; reset once the next one produces output
    restart_pending: bool,
}

impl StreamState {
    pub fn new() -> Self {
        Self {
            phase: StreamPhase::Idle,
            attempt: 0,
            accumulated: String::new(),
            chunks: 0,
            conversation_id: None,
            sources: Vec::new(),
            restart_pending: false,
        }
    }

    pub fn phase(&self) -> StreamPhase {
        self.phase
    }

    /// 1-based number of the current attempt
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn accumulated(&self) -> &str {
        &self.accumulated
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.phase, StreamPhase::Completed | StreamPhase::Failed)
    }

    pub fn begin_attempt(&mut self) {
        if self.is_terminal() {
            return;
        }
        self.attempt += 1;
        self.phase = StreamPhase::Connecting;
    }

    pub fn connected(&mut self) {
        if self.phase == StreamPhase::Connecting {
            self.phase = StreamPhase::Streaming;
        }
    }

    /// Apply one parsed payload
    pub fn apply(&mut self, chunk: StreamChunk, handler: &mut dyn StreamHandler) -> ChunkFlow {
        if self.is_terminal() {
            return ChunkFlow::Done;
        }

        let has_content = chunk.content.as_deref().is_some_and(|c| !c.is_empty());
        if has_content || chunk.is_done() {
            self.take_restart(handler);
        }

        if let Some(id) = chunk.conversation_id.as_ref().filter(|id| !id.is_empty()) {
            self.conversation_id = Some(id.clone());
        }
        if let Some(sources) = chunk.sources.as_ref() {
            self.sources = sources.clone();
        }

        if let Some(content) = chunk.content.as_deref().filter(|c| !c.is_empty()) {
            self.accumulated.push_str(content);
            self.chunks += 1;
            tracing::debug!(
                "Stream chunk #{} ({} chars total)",
                self.chunks,
                self.accumulated.chars().count()
            );
            handler.on_chunk(content);
        }

        if chunk.is_done() {
            tracing::debug!("Stream done signal received");
            self.complete(handler);
            return ChunkFlow::Done;
        }

        ChunkFlow::Continue
    }

    /// Enter `Completed` and fire the completion callback, unless already terminal
    pub fn complete(&mut self, handler: &mut dyn StreamHandler) {
        if self.is_terminal() {
            return;
        }
        self.take_restart(handler);
        self.phase = StreamPhase::Completed;
        handler.on_complete(&self.completed());
    }

    /// Decide between another attempt and giving up
    pub fn fail(
        &mut self,
        error: &ApiError,
        policy: &RetryPolicy,
        handler: &mut dyn StreamHandler,
    ) -> FailureAction {
        if self.is_terminal() {
            return FailureAction::GiveUp;
        }

        if error.is_transport() && self.attempt < policy.max_attempts {
            // partial text stays until a reconnect actually replays the answer
            if self.chunks > 0 {
                self.restart_pending = true;
            }
            self.phase = StreamPhase::Connecting;
            return FailureAction::Retry(policy.delay_for(self.attempt));
        }

        self.phase = StreamPhase::Failed;
        handler.on_error(error);
        FailureAction::GiveUp
    }

    fn take_restart(&mut self, handler: &mut dyn StreamHandler) {
        if !std::mem::take(&mut self.restart_pending) {
            return;
        }
        tracing::debug!("Reconnected stream is replaying, dropping partial text");
        self.accumulated.clear();
        self.chunks = 0;
        self.conversation_id = None;
        self.sources.clear();
        handler.on_restart();
    }

    pub fn completed(&self) -> CompletedStream {
        CompletedStream {
            content: self.accumulated.clone(),
            conversation_id: self.conversation_id.clone(),
            sources: self.sources.clone(),
        }
    }
}

impl Default for StreamState {
    fn default() -> Self {
        Self::new()
    }
}

/// Run a streaming call to its terminal state
pub async fn drive_stream<T, B>(
    transport: &T,
    backoff: &B,
    policy: RetryPolicy,
    stall_warning: Duration,
    request: &ChatRequest,
    handler: &mut dyn StreamHandler,
) -> Result<CompletedStream, ApiError>
where
    T: EventTransport + ?Sized,
    B: Backoff + ?Sized,
{
    let mut state = StreamState::new();

    loop {
        state.begin_attempt();
        tracing::info!(
            "Opening chat stream (attempt {}/{})",
            state.attempt(),
            policy.max_attempts
        );

        match read_attempt(transport, request, &mut state, handler, stall_warning).await {
            Ok(()) => {
                state.complete(handler);
                let done = state.completed();
                tracing::info!(
                    "Chat stream completed: {} chars",
                    done.content.chars().count()
                );
                return Ok(done);
            }
            Err(err) => match state.fail(&err, &policy, handler) {
                FailureAction::Retry(delay) => {
                    tracing::warn!(
                        "Chat stream attempt {} failed: {}. Retrying in {}s",
                        state.attempt(),
                        err,
                        delay.as_secs()
                    );
                    backoff.wait(delay).await;
                }
                FailureAction::GiveUp => {
                    tracing::error!(
                        "Chat stream failed after {} attempt(s): {}",
                        state.attempt(),
                        err
                    );
                    return Err(err);
                }
            },
        }
    }
}

/// One connection: open, read until done or end of input
async fn read_attempt<T>(
    transport: &T,
    request: &ChatRequest,
    state: &mut StreamState,
    handler: &mut dyn StreamHandler,
    stall_warning: Duration,
) -> Result<(), ApiError>
where
    T: EventTransport + ?Sized,
{
    // dropped on return, which closes the connection
    let mut source = transport.open(request).await?;
    state.connected();

    let mut decoder = SseDecoder::new();
    loop {
        match next_with_stall_warning(source.as_mut(), stall_warning).await {
            Some(Ok(bytes)) => {
                for event in decoder.push(&bytes) {
                    if dispatch(&event, state, handler) == ChunkFlow::Done {
                        return Ok(());
                    }
                }
            }
            Some(Err(err)) => return Err(err),
            None => {
                if let Some(event) = decoder.finish() {
                    dispatch(&event, state, handler);
                }
                return Ok(());
            }
        }
    }
}

fn dispatch(event: &SseEvent, state: &mut StreamState, handler: &mut dyn StreamHandler) -> ChunkFlow {
    for payload in &event.data {
        match parse_chunk(payload) {
            Ok(chunk) => {
                if state.apply(chunk, handler) == ChunkFlow::Done {
                    return ChunkFlow::Done;
                }
            }
            Err(err) => tracing::warn!("Skipping stream event: {}", err),
        }
    }
    ChunkFlow::Continue
}

async fn next_with_stall_warning(
    source: &mut dyn ByteSource,
    stall_warning: Duration,
) -> Option<Result<Vec<u8>, ApiError>> {
    let next = source.next_bytes();
    tokio::pin!(next);

    tokio::select! {
        item = &mut next => return item,
        _ = tokio::time::sleep(stall_warning) => {}
    }

    tracing::warn!(
        "No stream data for {}s, still waiting",
        stall_warning.as_secs()
    );
    next.await
}
