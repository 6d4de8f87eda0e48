//! Streaming client module
//!
//! Provides the Ollama client, the HTTP transport and the incremental
//! NDJSON line parser.

pub mod client;
pub mod endpoint;
pub mod parser;
pub mod request;
pub mod session;
pub mod transport;

// Re-export commonly used types
pub use client::{OllamaClient, DEFAULT_IDLE_TIMEOUT};
pub use endpoint::{endpoint_url, CHAT_PATH, GENERATE_PATH, TAGS_PATH};
pub use parser::{LineParser, StreamState, MAX_BUFFER_SIZE};
pub use request::{ApiMode, Exchange, RequestPayload};
pub use session::{Callbacks, Outcome};
pub use transport::{
    BufferedResponse, ByteStream, HttpTransport, ResponseBody, Transport, DEFAULT_REQUEST_TIMEOUT,
};
