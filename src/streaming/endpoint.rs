//! Endpoint resolution
//!
//! The base URL comes from configuration on every call; only a single
//! trailing slash is normalized away. Anything else is left to the
//! transport, which reports unparsable URLs as `InvalidEndpoint`.

/// Model listing endpoint
pub const TAGS_PATH: &str = "/api/tags";

/// Single-prompt completion endpoint
pub const GENERATE_PATH: &str = "/api/generate";

/// Multi-turn chat endpoint
pub const CHAT_PATH: &str = "/api/chat";

/// Strip exactly one trailing slash from a configured base URL
pub fn resolve(base_url: &str) -> &str {
    base_url.strip_suffix('/').unwrap_or(base_url)
}

/// Full URL for an API path under the configured base
pub fn endpoint_url(base_url: &str, path: &str) -> String {
    format!("{}{}", resolve(base_url), path)
}
