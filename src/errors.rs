//! Error types for ollamachat
//!
//! One error enum covers every way a session can end badly. Each variant
//! renders a human-readable message, which the front-end shows in place of
//! the assistant's reply.

use std::error::Error as _;
use thiserror::Error;

/// Main error type for the client
#[derive(Error, Debug)]
pub enum ClientError {
    /// Base URL (plus endpoint path) could not be parsed
    #[error("Invalid URL: {0}")]
    InvalidEndpoint(String),

    /// Server answered with a non-2xx status
    ///
    /// `reason` is the standard phrase for `code` ("Unknown" when the code
    /// has none), not the phrase the server put on its status line.
    #[error("HTTP {code}: {reason}")]
    HttpStatus { code: u16, reason: String },

    /// Network or connection failure
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Non-streaming success response lacked the expected field
    #[error("Invalid response format from Ollama")]
    InvalidResponseFormat,

    /// No model given and none configured
    #[error("No model selected. Please select a model in settings.")]
    NoModelSelected,

    /// One stream line was not valid JSON (recovered locally, never surfaced)
    #[error("JSON parse error: {0}")]
    LineParse(String),

    /// Carry buffer grew past its bound without a newline
    #[error("Stream line overflow: {size} bytes exceeds maximum {max}")]
    LineOverflow { size: usize, max: usize },

    /// Response headers or the next stream chunk did not arrive in time
    #[error("Timed out waiting for Ollama after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, ClientError>;

impl ClientError {
    /// Whether this read error means the remote end closed the connection.
    ///
    /// Some transports cannot tell a peer-closed connection apart from a
    /// normal end of body, so such errors finish the stream successfully.
    /// Only read-level errors qualify; the whole source chain is inspected.
    /// A reqwest error's own message embeds the request URL, so only its
    /// sources are consulted.
    pub fn is_peer_closed(&self) -> bool {
        let mut current: Option<&(dyn std::error::Error + 'static)> = match self {
            ClientError::Transport(e) => e.source(),
            ClientError::Io(e) => Some(e),
            _ => return false,
        };

        while let Some(err) = current {
            if err.to_string().to_lowercase().contains("closed") {
                return true;
            }
            current = err.source();
        }
        false
    }
}
