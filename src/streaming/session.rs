//! One request/response exchange
//!
//! A [`Session`] owns the caller's callbacks and guarantees the terminal
//! contract: at most one of `on_complete` / `on_error` fires, exactly once,
//! and never after cancellation. The terminal methods consume the session,
//! so a second terminal notification cannot be expressed.

use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::errors::{ClientError, Result};
use crate::streaming::parser::{LineParser, StreamState};
use crate::streaming::transport::ByteStream;

type TokenFn<'a> = Box<dyn FnMut(&str) + Send + 'a>;
type CompleteFn<'a> = Box<dyn FnOnce(&str) + Send + 'a>;
type ErrorFn<'a> = Box<dyn FnOnce(&ClientError) + Send + 'a>;

/// Caller hooks for one exchange
///
/// All hooks are optional. Without `on_token` the response is fetched in
/// one piece. Without `on_error` failures are returned as `Err` instead.
#[derive(Default)]
pub struct Callbacks<'a> {
    on_token: Option<TokenFn<'a>>,
    on_complete: Option<CompleteFn<'a>>,
    on_error: Option<ErrorFn<'a>>,
}

impl<'a> Callbacks<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called once per streamed token, in arrival order
    pub fn on_token(mut self, f: impl FnMut(&str) + Send + 'a) -> Self {
        self.on_token = Some(Box::new(f));
        self
    }

    /// Called once with the full response on success
    pub fn on_complete(mut self, f: impl FnOnce(&str) + Send + 'a) -> Self {
        self.on_complete = Some(Box::new(f));
        self
    }

    /// Called once on failure
    pub fn on_error(mut self, f: impl FnOnce(&ClientError) + Send + 'a) -> Self {
        self.on_error = Some(Box::new(f));
        self
    }

    pub fn wants_tokens(&self) -> bool {
        self.on_token.is_some()
    }
}

/// How an exchange ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Response finished; `on_complete` has been called
    Completed(String),
    /// Exchange failed; the error went to `on_error`
    Failed,
    /// Cancelled before a terminal state; no terminal callback fired
    Cancelled,
}

impl Outcome {
    /// Final text, when completed
    pub fn text(&self) -> Option<&str> {
        match self {
            Outcome::Completed(text) => Some(text),
            _ => None,
        }
    }
}

pub(crate) struct Session<'a> {
    id: Uuid,
    callbacks: Callbacks<'a>,
    cancel: CancellationToken,
    /// Client-wide token; fires when the owning client is destroyed
    shutdown: CancellationToken,
}

impl<'a> Session<'a> {
    pub(crate) fn new(callbacks: Callbacks<'a>, cancel: CancellationToken) -> Self {
        Self {
            id: Uuid::new_v4(),
            callbacks,
            cancel,
            shutdown: CancellationToken::new(),
        }
    }

    pub(crate) fn with_shutdown(mut self, shutdown: CancellationToken) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub(crate) fn id(&self) -> Uuid {
        self.id
    }

    pub(crate) fn wants_tokens(&self) -> bool {
        self.callbacks.wants_tokens()
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled() || self.shutdown.is_cancelled()
    }

    /// Resolves once either the session or its client is cancelled
    pub(crate) async fn wait_cancelled(&self) {
        tokio::select! {
            _ = self.cancel.cancelled() => {}
            _ = self.shutdown.cancelled() => {}
        }
    }

    /// Terminal success
    pub(crate) fn complete(self, text: String) -> Result<Outcome> {
        if self.is_cancelled() {
            return Ok(self.cancelled());
        }

        info!(session_id = %self.id, chars = text.len(), "session completed");
        if let Some(on_complete) = self.callbacks.on_complete {
            on_complete(&text);
        }
        Ok(Outcome::Completed(text))
    }

    /// Terminal failure; propagates `err` when no error hook is registered
    pub(crate) fn fail(self, err: ClientError) -> Result<Outcome> {
        if self.is_cancelled() {
            return Ok(self.cancelled());
        }

        warn!(session_id = %self.id, error = %err, "session failed");
        match self.callbacks.on_error {
            Some(on_error) => {
                on_error(&err);
                Ok(Outcome::Failed)
            }
            None => Err(err),
        }
    }

    pub(crate) fn cancelled(self) -> Outcome {
        debug!(session_id = %self.id, "session cancelled");
        Outcome::Cancelled
    }

    /// Pull chunks through the parser until a terminal state.
    ///
    /// Reads are strictly sequential: the next read is issued only after
    /// the previous chunk is fully processed. The stream is closed before
    /// any terminal callback runs.
    pub(crate) async fn drive(
        mut self,
        mut stream: ByteStream,
        mut parser: LineParser,
        idle_timeout: Duration,
    ) -> Result<Outcome> {
        loop {
            let read = tokio::select! {
                biased;
                _ = self.wait_cancelled() => {
                    stream.close();
                    parser.abort();
                    return Ok(self.cancelled());
                }
                read = tokio::time::timeout(idle_timeout, stream.read_chunk()) => read,
            };

            let chunk = match read {
                Ok(Ok(chunk)) => chunk,
                Ok(Err(err)) if err.is_peer_closed() => {
                    debug!(session_id = %self.id, error = %err, "stream was closed by remote server");
                    stream.close();
                    let mut sink = self.token_sink();
                    parser.finish(|token: &str| sink.emit(token));
                    return self.complete(parser.into_response());
                }
                Ok(Err(err)) => {
                    stream.close();
                    parser.abort();
                    return self.fail(err);
                }
                Err(_) => {
                    stream.close();
                    parser.abort();
                    return self.fail(ClientError::Timeout {
                        duration_ms: idle_timeout.as_millis() as u64,
                    });
                }
            };

            let fed = {
                let mut sink = self.token_sink();
                parser.feed(&chunk, |token: &str| sink.emit(token))
            };

            match fed {
                Ok(StreamState::Completed) => {
                    stream.close();
                    debug!(
                        session_id = %self.id,
                        token_count = parser.token_count(),
                        "stream closed"
                    );
                    return self.complete(parser.into_response());
                }
                Ok(_) => {}
                Err(err) => {
                    stream.close();
                    return self.fail(err);
                }
            }
        }
    }

    fn token_sink(&mut self) -> TokenSink<'_, 'a> {
        TokenSink {
            cancel: &self.cancel,
            shutdown: &self.shutdown,
            on_token: &mut self.callbacks.on_token,
        }
    }
}

/// Token forwarder that goes quiet once the session is cancelled
struct TokenSink<'s, 'a> {
    cancel: &'s CancellationToken,
    shutdown: &'s CancellationToken,
    on_token: &'s mut Option<TokenFn<'a>>,
}

impl TokenSink<'_, '_> {
    fn emit(&mut self, token: &str) {
        if self.cancel.is_cancelled() || self.shutdown.is_cancelled() {
            return;
        }
        if let Some(f) = self.on_token.as_mut() {
            f(token);
        }
    }
}
