//! Type definitions module
//!
//! Chat messages and conversation history.

pub mod messages;

// Re-export commonly used types
pub use messages::{Conversation, Message, Role};
