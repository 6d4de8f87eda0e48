//! Request payloads for the generate and chat endpoints
//!
//! The two API surfaces are separate variants, so token extraction can
//! match on the mode exhaustively instead of sniffing response fields.

use serde::Serialize;

use crate::streaming::endpoint::{CHAT_PATH, GENERATE_PATH};
use crate::types::Message;

/// Which API surface a request targets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiMode {
    Generate,
    Chat,
}

impl ApiMode {
    pub fn path(self) -> &'static str {
        match self {
            ApiMode::Generate => GENERATE_PATH,
            ApiMode::Chat => CHAT_PATH,
        }
    }
}

/// What the caller wants answered
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Exchange {
    /// Single prompt completion
    Generate(String),
    /// Multi-turn chat over a message list
    Chat(Vec<Message>),
}

impl Exchange {
    pub fn mode(&self) -> ApiMode {
        match self {
            Exchange::Generate(_) => ApiMode::Generate,
            Exchange::Chat(_) => ApiMode::Chat,
        }
    }
}

/// JSON body posted to `/api/generate` or `/api/chat`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum RequestPayload {
    Generate {
        model: String,
        prompt: String,
        stream: bool,
    },
    Chat {
        model: String,
        messages: Vec<Message>,
        stream: bool,
    },
}

impl RequestPayload {
    /// Build the payload for an exchange.
    ///
    /// The model must already be validated as non-empty by the caller.
    pub fn build(exchange: Exchange, model: impl Into<String>, stream: bool) -> Self {
        let model = model.into();
        match exchange {
            Exchange::Generate(prompt) => RequestPayload::Generate {
                model,
                prompt,
                stream,
            },
            Exchange::Chat(messages) => RequestPayload::Chat {
                model,
                messages,
                stream,
            },
        }
    }

    pub fn mode(&self) -> ApiMode {
        match self {
            RequestPayload::Generate { .. } => ApiMode::Generate,
            RequestPayload::Chat { .. } => ApiMode::Chat,
        }
    }

    pub fn model(&self) -> &str {
        match self {
            RequestPayload::Generate { model, .. } | RequestPayload::Chat { model, .. } => model,
        }
    }

    pub fn is_streaming(&self) -> bool {
        match self {
            RequestPayload::Generate { stream, .. } | RequestPayload::Chat { stream, .. } => {
                *stream
            }
        }
    }

    /// Endpoint path for this payload's mode
    pub fn path(&self) -> &'static str {
        self.mode().path()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_generate_payload_shape() {
        let payload = RequestPayload::build(Exchange::Generate("Why?".into()), "llama3.2", true);
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(
            value,
            json!({"model": "llama3.2", "prompt": "Why?", "stream": true})
        );
        assert_eq!(payload.path(), "/api/generate");
    }

    #[test]
    fn test_chat_payload_shape() {
        let messages = vec![Message::user("Hi"), Message::assistant("Hello")];
        let payload = RequestPayload::build(Exchange::Chat(messages), "mistral", false);
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(
            value,
            json!({
                "model": "mistral",
                "messages": [
                    {"role": "user", "content": "Hi"},
                    {"role": "assistant", "content": "Hello"}
                ],
                "stream": false
            })
        );
        assert!(value.get("prompt").is_none());
        assert_eq!(payload.path(), "/api/chat");
    }

    #[test]
    fn test_accessors() {
        let payload = RequestPayload::build(Exchange::Chat(vec![]), "m", true);
        assert_eq!(payload.mode(), ApiMode::Chat);
        assert_eq!(payload.model(), "m");
        assert!(payload.is_streaming());
    }
}
