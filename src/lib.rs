//! ollamachat - streaming chat client for a local Ollama server
//!
//! Talks to the Ollama HTTP API in two modes:
//!
//! - **generate**: single prompt completion (`/api/generate`)
//! - **chat**: multi-turn conversation (`/api/chat`)
//!
//! Responses arrive either as one JSON body or as newline-delimited JSON
//! records that are parsed incrementally and delivered token by token.

pub mod config;
pub mod errors;
pub mod models;
pub mod streaming;
pub mod types;

// Terminal front-end
pub mod cli;
pub mod repl;

// Re-export commonly used types
pub use config::{Config, SettingsSource, SharedConfig};
pub use errors::{ClientError, Result};
pub use models::ModelInfo;
pub use streaming::{Callbacks, Exchange, OllamaClient, Outcome};
pub use types::{Conversation, Message, Role};
