//! Request lifecycle: send, stream, commit or fail, retry

use futures::StreamExt;
use sage_ai::{ChatRequest, ClientConfig, Turn, decoder};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::{
    conversation::Conversation,
    error::{Error, Result},
    events::{ChatEvent, LifecycleState},
    handle::ChatHandle,
    retry::{RetryPolicy, RetryState},
    transport::{HttpTransport, Transport},
};

/// Assistant text appended to the conversation when a request fails
pub const FAILURE_NOTICE: &str = "Sorry, I encountered an error. Please try again.";

/// Controller configuration
#[derive(Debug, Clone)]
pub struct ChatConfig {
    /// Validated endpoint settings (model and generation parameters)
    pub client: ClientConfig,
    /// Inserted as the first turn on the first send of a conversation
    pub system_prompt: Option<String>,
    /// Upper bound on one round trip, streaming included
    pub request_timeout: Duration,
    pub retry: RetryPolicy,
}

impl ChatConfig {
    pub fn new(client: ClientConfig) -> Self {
        Self {
            client,
            system_prompt: None,
            request_timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
        }
    }
}

/// How a send settled when it did not fail
#[derive(Debug, Clone, PartialEq)]
pub enum SendOutcome {
    /// Blank input or nothing to retry; no request was made
    Ignored,
    /// The assistant turn that was committed
    Completed(Turn),
}

/// Owns the conversation and drives one request at a time
pub struct ChatController {
    config: ChatConfig,
    conversation: Conversation,
    buffer: String,
    state: LifecycleState,
    retry: RetryState,
    last_error: Option<String>,
    transport: Arc<dyn Transport>,
    event_tx: broadcast::Sender<ChatEvent>,
    handle: ChatHandle,
}

impl ChatController {
    pub fn new(config: ChatConfig, transport: Arc<dyn Transport>) -> Self {
        let (event_tx, _) = broadcast::channel(256);
        let retry = RetryState::new(&config.retry);
        Self {
            config,
            conversation: Conversation::default(),
            buffer: String::new(),
            state: LifecycleState::Idle,
            retry,
            last_error: None,
            transport,
            event_tx,
            handle: ChatHandle::new(),
        }
    }

    /// Create a controller that talks to the configured HTTP endpoint
    pub fn connect(config: ChatConfig) -> Self {
        let transport = Arc::new(HttpTransport::new(config.client.clone()));
        Self::new(config, transport)
    }

    /// Subscribe to chat events
    pub fn subscribe(&self) -> broadcast::Receiver<ChatEvent> {
        self.event_tx.subscribe()
    }

    pub fn config(&self) -> &ChatConfig {
        &self.config
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn turns(&self) -> &[Turn] {
        self.conversation.turns()
    }

    /// The in-progress response; empty outside a request
    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// Consecutive failures of the current send
    pub fn retry_count(&self) -> u32 {
        self.retry.count()
    }

    /// Message of the most recent failure, until dismissed
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn dismiss_error(&mut self) {
        self.last_error = None;
    }

    /// Content of one turn, for copying
    pub fn turn_content(&self, index: usize) -> Option<&str> {
        self.conversation.get(index).map(|t| t.content.as_str())
    }

    /// Get a cloneable handle for aborting from outside
    pub fn handle(&self) -> ChatHandle {
        self.handle.clone()
    }

    /// Abort the current request
    pub fn abort(&self) {
        self.handle.abort();
    }

    /// Cancel anything in flight and refuse further sends
    pub fn dispose(&self) {
        self.handle.dispose();
    }

    /// Empty the conversation and the streaming buffer
    pub fn clear(&mut self) {
        self.conversation.clear();
        self.buffer.clear();
        self.last_error = None;
        self.retry.reset();
        self.emit(ChatEvent::Cleared);
    }

    /// Submit user text and run the request lifecycle to completion.
    ///
    /// Blank input is ignored. A request that still fails after the
    /// automatic retries returns its last error; the conversation then ends
    /// with a failure notice.
    pub async fn send(&mut self, text: &str) -> Result<SendOutcome> {
        if text.trim().is_empty() {
            return Ok(SendOutcome::Ignored);
        }

        let (cancel, _running) = self.handle.begin();
        if self.handle.is_disposed() {
            return Err(Error::Disposed);
        }
        // A previous send future may have been dropped mid-flight.
        self.buffer.clear();
        self.set_state(LifecycleState::Idle);

        if self.conversation.is_empty() {
            if let Some(prompt) = self.config.system_prompt.clone() {
                self.conversation.push(Turn::system(prompt))?;
            }
        }
        self.conversation.push(Turn::user(text))?;

        self.run(cancel).await
    }

    /// Drop trailing failure notices and resubmit the unanswered user turn
    pub async fn retry_last(&mut self) -> Result<SendOutcome> {
        if self.handle.is_disposed() {
            return Err(Error::Disposed);
        }
        self.conversation.pop_trailing_failures();
        match self.conversation.pop_trailing_user() {
            Some(turn) => self.send(&turn.content).await,
            None => Ok(SendOutcome::Ignored),
        }
    }

    async fn run(&mut self, cancel: CancellationToken) -> Result<SendOutcome> {
        loop {
            let attempt = self.retry.count() + 1;
            tracing::debug!("Sending request (attempt {})", attempt);
            self.emit(ChatEvent::RequestStart { attempt });

            let error = match self.attempt(&cancel).await {
                Ok(()) => return self.commit().map(SendOutcome::Completed),
                Err(e) => e,
            };

            self.fail(&error)?;
            let will_retry =
                error.is_retryable() && self.retry.can_retry() && !cancel.is_cancelled();
            self.emit(ChatEvent::Failed {
                message: error.to_string(),
                will_retry,
            });

            if !will_retry {
                self.retry.reset();
                self.set_state(LifecycleState::Idle);
                return Err(error);
            }

            let retry = self.retry.record_failure();
            let delay = self.config.retry.delay;
            tracing::warn!(
                "Request failed, retry {} of {} in {:?}: {}",
                retry,
                self.config.retry.max_retries,
                delay,
                error
            );
            self.emit(ChatEvent::RetryScheduled { retry, delay });

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    self.retry.reset();
                    self.set_state(LifecycleState::Idle);
                    return Err(sage_ai::Error::Aborted.into());
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    /// One request: race the round trip against abort and the deadline
    async fn attempt(&mut self, cancel: &CancellationToken) -> Result<()> {
        self.set_state(LifecycleState::Sending);
        let request = ChatRequest::new(
            self.config.client.model(),
            self.conversation.payload_messages(),
            self.config.client.params(),
        );
        let timeout = self.config.request_timeout;

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(sage_ai::Error::Aborted.into()),
            _ = tokio::time::sleep(timeout) => Err(sage_ai::Error::NetworkTimeout(timeout).into()),
            result = self.round_trip(&request) => result,
        }
    }

    async fn round_trip(&mut self, request: &ChatRequest) -> Result<()> {
        let body = self.transport.open(request).await?;
        self.set_state(LifecycleState::Streaming);

        let deltas = decoder::decode(body);
        futures::pin_mut!(deltas);
        while let Some(delta) = deltas.next().await {
            let delta = delta?;
            if delta.markup.is_empty() {
                continue;
            }
            let offset = self.buffer.len();
            self.buffer.push_str(&delta.markup);
            self.emit(ChatEvent::Delta {
                markup: delta.markup,
                offset,
            });
        }

        if self.buffer.trim().is_empty() {
            return Err(Error::EmptyResponse);
        }
        Ok(())
    }

    fn commit(&mut self) -> Result<Turn> {
        self.set_state(LifecycleState::Committing);
        let turn = Turn::assistant(std::mem::take(&mut self.buffer));
        self.conversation.push(turn.clone())?;
        self.retry.reset();
        self.last_error = None;
        self.emit(ChatEvent::TurnCommitted { turn: turn.clone() });
        self.set_state(LifecycleState::Idle);
        Ok(turn)
    }

    fn fail(&mut self, error: &Error) -> Result<()> {
        self.set_state(LifecycleState::Failed);
        self.buffer.clear();
        self.conversation.push(Turn::failure_notice(FAILURE_NOTICE))?;
        self.last_error = Some(error.to_string());
        Ok(())
    }

    fn set_state(&mut self, state: LifecycleState) {
        if self.state != state {
            self.state = state;
            self.emit(ChatEvent::StateChanged { state });
        }
    }

    fn emit(&self, event: ChatEvent) {
        let _ = self.event_tx.send(event);
    }
}

impl Drop for ChatController {
    fn drop(&mut self) {
        self.handle.dispose();
    }
}
