//! Ollama chat/generate client
//!
//! Entry point for the core:
//! - `chat` / `generate` / `send`: one exchange, streamed or buffered
//! - `list_models` / `test_connection`: the listing endpoint
//! - `destroy` (or drop): cancel every in-flight session
//!
//! Settings (base URL, default model, streaming flag) are read from the
//! [`SettingsSource`] at the start of every call.

use reqwest::Method;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, Instrument};

use crate::config::{SettingsSource, SharedConfig};
use crate::errors::{ClientError, Result};
use crate::models::{self, ModelInfo};
use crate::streaming::endpoint;
use crate::streaming::parser::{LineParser, StreamRecord, MAX_BUFFER_SIZE};
use crate::streaming::request::{ApiMode, Exchange, RequestPayload};
use crate::streaming::session::{Callbacks, Outcome, Session};
use crate::streaming::transport::{HttpTransport, ResponseBody, Transport};
use crate::types::Message;

/// Idle timeout between stream chunks (30 seconds)
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(30);

/// Ollama client
///
/// Not `Clone`: dropping the client cancels its sessions, so share it
/// behind an `Arc` instead.
pub struct OllamaClient {
    transport: Arc<dyn Transport>,
    settings: Arc<dyn SettingsSource>,
    idle_timeout: Duration,
    max_line_bytes: usize,
    shutdown: CancellationToken,
}

impl OllamaClient {
    /// Create client over HTTP with default timeouts
    pub fn new(settings: Arc<dyn SettingsSource>) -> Result<Self> {
        let transport = HttpTransport::new(settings.clone())?;
        Ok(Self::with_transport(Arc::new(transport), settings))
    }

    /// Create client from a shared config, taking its timeouts
    pub fn from_config(config: SharedConfig) -> Result<Self> {
        let snapshot = config.snapshot();
        let request_timeout = snapshot.request_timeout();
        let idle_timeout = snapshot.idle_timeout();

        let settings: Arc<dyn SettingsSource> = Arc::new(config);
        let transport = HttpTransport::with_timeout(settings.clone(), request_timeout)?;
        Ok(Self::with_transport(Arc::new(transport), settings).idle_timeout(idle_timeout))
    }

    /// Create client over any transport
    pub fn with_transport(transport: Arc<dyn Transport>, settings: Arc<dyn SettingsSource>) -> Self {
        let client = Self {
            transport,
            settings,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            max_line_bytes: MAX_BUFFER_SIZE,
            shutdown: CancellationToken::new(),
        };
        info!(url = %client.base_url(), "initialized Ollama client");
        client
    }

    /// Override the per-chunk idle timeout for streamed responses
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Override the bound on a single unterminated stream line
    pub fn max_line_bytes(mut self, max: usize) -> Self {
        self.max_line_bytes = max;
        self
    }

    /// Configured base URL without a trailing slash
    pub fn base_url(&self) -> String {
        endpoint::resolve(&self.settings.ollama_url()).to_string()
    }

    /// Check if the server answers the listing endpoint
    pub async fn test_connection(&self) -> bool {
        let reachable = models::test_connection(self.transport.as_ref()).await;
        info!(reachable, "connection test result");
        reachable
    }

    /// Installed model names in server order; empty on any failure
    pub async fn list_models(&self) -> Vec<String> {
        self.list_model_info()
            .await
            .into_iter()
            .map(|m| m.name)
            .collect()
    }

    /// Installed models with size and details; empty on any failure
    pub async fn list_model_info(&self) -> Vec<ModelInfo> {
        models::list_models(self.transport.as_ref()).await
    }

    /// Multi-turn chat over `/api/chat`
    pub async fn chat(
        &self,
        messages: &[Message],
        model: Option<&str>,
        callbacks: Callbacks<'_>,
    ) -> Result<Outcome> {
        self.send(Exchange::Chat(messages.to_vec()), model, callbacks)
            .await
    }

    /// Single prompt completion over `/api/generate`
    pub async fn generate(
        &self,
        prompt: &str,
        model: Option<&str>,
        callbacks: Callbacks<'_>,
    ) -> Result<Outcome> {
        self.send(Exchange::Generate(prompt.to_string()), model, callbacks)
            .await
    }

    /// Run one exchange; cancelled only by [`OllamaClient::destroy`]
    pub async fn send(
        &self,
        exchange: Exchange,
        model: Option<&str>,
        callbacks: Callbacks<'_>,
    ) -> Result<Outcome> {
        self.send_with_cancel(exchange, model, callbacks, self.session_token())
            .await
    }

    /// Token that cancels a single session without destroying the client
    pub fn session_token(&self) -> CancellationToken {
        self.shutdown.child_token()
    }

    /// Run one exchange that `cancel` can abort.
    ///
    /// `model` falls back to the configured current model when `None`. With
    /// streaming enabled and an `on_token` hook, tokens are delivered as
    /// they arrive; otherwise the response is fetched in one piece. Exactly
    /// one of `on_complete` / `on_error` fires unless the session is
    /// cancelled first, in which case neither does. Errors are returned as
    /// `Err` only when no `on_error` hook was given.
    pub async fn send_with_cancel(
        &self,
        exchange: Exchange,
        model: Option<&str>,
        callbacks: Callbacks<'_>,
        cancel: CancellationToken,
    ) -> Result<Outcome> {
        let session = Session::new(callbacks, cancel).with_shutdown(self.shutdown.clone());
        let span = info_span!("session", session_id = %session.id());
        self.run(exchange, model, session).instrument(span).await
    }

    async fn run(
        &self,
        exchange: Exchange,
        model: Option<&str>,
        session: Session<'_>,
    ) -> Result<Outcome> {
        if session.is_cancelled() {
            return Ok(session.cancelled());
        }

        let model = match model {
            Some(name) => name.to_string(),
            None => self.settings.current_model(),
        };
        if model.trim().is_empty() {
            return session.fail(ClientError::NoModelSelected);
        }

        let streaming = self.settings.stream_response() && session.wants_tokens();
        let payload = RequestPayload::build(exchange, model, streaming);
        let mode = payload.mode();
        info!(
            model = payload.model(),
            ?mode,
            streaming,
            "starting exchange"
        );

        if streaming {
            let opened = tokio::select! {
                biased;
                _ = session.wait_cancelled() => return Ok(session.cancelled()),
                opened = self.transport.request_streaming(payload.path(), &payload) => opened,
            };

            let stream = match opened {
                Ok(stream) => stream,
                Err(e) => return session.fail(e),
            };

            let parser = LineParser::with_capacity(mode, self.max_line_bytes);
            session.drive(stream, parser, self.idle_timeout).await
        } else {
            let response = tokio::select! {
                biased;
                _ = session.wait_cancelled() => return Ok(session.cancelled()),
                response = self.transport.request_buffered(Method::POST, payload.path(), Some(&payload)) => response,
            };

            match response.and_then(|r| extract_full_response(mode, r.body)) {
                Ok(text) => {
                    debug!(chars = text.len(), "non-streaming response received");
                    session.complete(text)
                }
                Err(e) => session.fail(e),
            }
        }
    }

    /// Cancel every in-flight session. Idempotent.
    pub fn destroy(&self) {
        if !self.shutdown.is_cancelled() {
            info!("destroying Ollama client");
            self.shutdown.cancel();
        }
    }

    pub fn is_destroyed(&self) -> bool {
        self.shutdown.is_cancelled()
    }
}

impl Drop for OllamaClient {
    fn drop(&mut self) {
        self.destroy();
    }
}

/// Pull the mode's text field out of a buffered reply
fn extract_full_response(mode: ApiMode, body: ResponseBody) -> Result<String> {
    let ResponseBody::Json(json) = body else {
        return Err(ClientError::InvalidResponseFormat);
    };

    let record: StreamRecord =
        serde_json::from_value(json).map_err(|_| ClientError::InvalidResponseFormat)?;
    record
        .content(mode)
        .map(str::to_string)
        .ok_or(ClientError::InvalidResponseFormat)
}
