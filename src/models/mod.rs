//! Ollama model listing module
//!
//! - Listing installed models
//! - Checking the server is reachable

pub mod client;
pub mod types;

// Re-export key types for convenience
pub use client::{fetch_models, list_models, test_connection};
pub use types::{format_size, ModelDetails, ModelInfo, TagsResponse};
