//! Incremental NDJSON parser for streaming responses
//!
//! Ollama streams one JSON object per line:
//! ```text
//! {"model":"llama3.2","response":"Hel","done":false}
//! {"model":"llama3.2","response":"lo","done":false}
//! {"model":"llama3.2","response":"","done":true,"eval_count":2}
//! ```
//!
//! Chunks arrive at arbitrary byte boundaries. Complete lines are parsed as
//! they appear; the trailing partial line is carried over to the next chunk
//! untouched. Lines are decoded one at a time, so a multi-byte character
//! split across chunks is reassembled before decoding.
//!
//! States: `Idle -> Reading -> {Completed | Errored}`. Terminal states
//! ignore further input.

use memchr::memchr;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::errors::{ClientError, Result};
use crate::streaming::request::ApiMode;

/// Maximum carry buffer size (1MB)
pub const MAX_BUFFER_SIZE: usize = 1_048_576;

/// Parser lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// Nothing received yet
    Idle,
    /// At least one chunk received, no terminal condition yet
    Reading,
    /// `done` flag seen or end of stream reached
    Completed,
    /// Aborted by a read error or buffer overflow
    Errored,
}

impl StreamState {
    pub fn is_terminal(self) -> bool {
        matches!(self, StreamState::Completed | StreamState::Errored)
    }
}

/// One line of a streaming body (also the shape of a buffered reply)
#[derive(Debug, Default, Deserialize)]
pub(crate) struct StreamRecord {
    #[serde(default)]
    response: Option<String>,
    #[serde(default)]
    message: Option<RecordMessage>,
    #[serde(default)]
    done: Option<bool>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RecordMessage {
    #[serde(default)]
    content: Option<String>,
}

impl StreamRecord {
    /// Text field for the given API surface, if present
    pub(crate) fn content(&self, mode: ApiMode) -> Option<&str> {
        match mode {
            ApiMode::Generate => self.response.as_deref(),
            ApiMode::Chat => self.message.as_ref().and_then(|m| m.content.as_deref()),
        }
    }

    fn is_done(&self) -> bool {
        self.done.unwrap_or(false)
    }
}

/// Line-reassembling token extractor for one stream
#[derive(Debug)]
pub struct LineParser {
    mode: ApiMode,
    /// Bytes of the current incomplete line
    carry: Vec<u8>,
    accumulated: String,
    token_count: usize,
    state: StreamState,
    max_buffer_size: usize,
}

impl LineParser {
    /// Create parser with default buffer bound
    pub fn new(mode: ApiMode) -> Self {
        Self::with_capacity(mode, MAX_BUFFER_SIZE)
    }

    /// Create parser with custom carry buffer bound
    pub fn with_capacity(mode: ApiMode, max_buffer_size: usize) -> Self {
        Self {
            mode,
            carry: Vec::with_capacity(4096),
            accumulated: String::new(),
            token_count: 0,
            state: StreamState::Idle,
            max_buffer_size,
        }
    }

    /// Feed one chunk, emitting each extracted token through `on_token`.
    ///
    /// An empty chunk is end of stream. Returns the state after the chunk;
    /// once `Completed` the rest of the chunk is discarded. Overflowing the
    /// carry buffer moves the parser to `Errored`.
    pub fn feed<F>(&mut self, chunk: &[u8], mut on_token: F) -> Result<StreamState>
    where
        F: FnMut(&str),
    {
        if self.state.is_terminal() {
            return Ok(self.state);
        }

        if chunk.is_empty() {
            debug!(
                token_count = self.token_count,
                chars = self.accumulated.len(),
                "stream ended naturally"
            );
            return Ok(self.finish(on_token));
        }

        self.state = StreamState::Reading;

        let mut buffer = std::mem::take(&mut self.carry);
        buffer.extend_from_slice(chunk);

        let mut consumed = 0;
        while let Some(pos) = memchr(b'\n', &buffer[consumed..]) {
            let line = &buffer[consumed..consumed + pos];
            consumed += pos + 1;

            self.process_line(line, &mut on_token);
            if self.state == StreamState::Completed {
                return Ok(self.state);
            }
        }

        buffer.drain(..consumed);
        if buffer.len() > self.max_buffer_size {
            self.state = StreamState::Errored;
            return Err(ClientError::LineOverflow {
                size: buffer.len(),
                max: self.max_buffer_size,
            });
        }

        self.carry = buffer;
        Ok(self.state)
    }

    /// End of stream: flush a final unterminated line, then complete
    pub fn finish<F>(&mut self, mut on_token: F) -> StreamState
    where
        F: FnMut(&str),
    {
        if self.state.is_terminal() {
            return self.state;
        }

        let rest = std::mem::take(&mut self.carry);
        if !rest.is_empty() {
            self.process_line(&rest, &mut on_token);
        }

        self.state = StreamState::Completed;
        self.state
    }

    /// Mark the stream failed and drop any partial line
    pub fn abort(&mut self) {
        if !self.state.is_terminal() {
            self.state = StreamState::Errored;
        }
        self.carry.clear();
    }

    fn process_line<F>(&mut self, raw: &[u8], on_token: &mut F)
    where
        F: FnMut(&str),
    {
        let text = String::from_utf8_lossy(raw);
        let line = text.trim();
        if line.is_empty() {
            return;
        }

        let record: StreamRecord = match serde_json::from_str(line) {
            Ok(record) => record,
            Err(e) => {
                let err = ClientError::LineParse(e.to_string());
                warn!(error = %err, line, "skipping malformed stream line");
                return;
            }
        };

        if let Some(message) = &record.error {
            warn!(error = %message, "server reported an error in stream");
        }

        if let Some(token) = record.content(self.mode).filter(|t| !t.is_empty()) {
            self.accumulated.push_str(token);
            self.token_count += 1;
            on_token(token);
        }

        if record.is_done() {
            debug!(
                token_count = self.token_count,
                chars = self.accumulated.len(),
                "stream completed via done flag"
            );
            self.state = StreamState::Completed;
            self.carry.clear();
        }
    }

    pub fn mode(&self) -> ApiMode {
        self.mode
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    /// Text accumulated so far
    pub fn accumulated(&self) -> &str {
        &self.accumulated
    }

    pub fn token_count(&self) -> usize {
        self.token_count
    }

    /// Size of the carried partial line
    pub fn buffer_size(&self) -> usize {
        self.carry.len()
    }

    /// Check if no partial line is carried
    pub fn is_empty(&self) -> bool {
        self.carry.is_empty()
    }

    /// Consume the parser, returning the accumulated response
    pub fn into_response(self) -> String {
        self.accumulated
    }
}
