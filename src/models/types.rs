//! Type definitions for the model listing endpoint
//!
//! Only `name` is required; every other field is decoded when the server
//! sends it and used for display.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Information about an installed model
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelInfo {
    /// Model name (e.g., "llama3.1:8b")
    pub name: String,

    /// Model size in bytes
    #[serde(default, deserialize_with = "lenient")]
    pub size: Option<u64>,

    /// Last modification time
    #[serde(default, deserialize_with = "lenient")]
    pub modified_at: Option<DateTime<Utc>>,

    /// Model digest/hash
    #[serde(default, deserialize_with = "lenient")]
    pub digest: Option<String>,

    #[serde(default, deserialize_with = "lenient")]
    pub details: Option<ModelDetails>,
}

/// Detailed model information
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ModelDetails {
    /// Model family (e.g., "llama", "qwen2")
    #[serde(default)]
    pub family: Option<String>,

    /// Parameter size (e.g., "7B", "13B")
    #[serde(default)]
    pub parameter_size: Option<String>,

    /// Quantization level (e.g., "Q4_0", "Q4_K_M")
    #[serde(default)]
    pub quantization_level: Option<String>,
}

/// Decode an optional display field, treating a malformed value as absent
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

/// Response from the `/api/tags` endpoint
#[derive(Debug, Default, Deserialize)]
pub struct TagsResponse {
    #[serde(default)]
    pub models: Vec<ModelInfo>,
}

impl ModelInfo {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            size: None,
            modified_at: None,
            digest: None,
            details: None,
        }
    }

    /// Format the model size in human-readable format
    pub fn formatted_size(&self) -> Option<String> {
        self.size.map(format_size)
    }

    /// Short description: parameter size and quantization, else file size
    pub fn description(&self) -> String {
        if let Some(ref details) = self.details {
            let parts: Vec<&str> = [&details.parameter_size, &details.quantization_level]
                .into_iter()
                .filter_map(|p| p.as_deref())
                .collect();

            if !parts.is_empty() {
                return parts.join(" ");
            }
        }

        self.formatted_size().unwrap_or_default()
    }
}

impl fmt::Display for ModelInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.formatted_size() {
            Some(size) => write!(f, "{} ({})", self.name, size),
            None => write!(f, "{}", self.name),
        }
    }
}

/// Format bytes into human-readable size
pub fn format_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];

    if bytes == 0 {
        return "0 B".to_string();
    }

    let base: f64 = 1024.0;
    let exponent = (bytes as f64).log(base).floor() as usize;
    let exponent = exponent.min(UNITS.len() - 1);

    let size = bytes as f64 / base.powi(exponent as i32);

    format!("{:.2} {}", size, UNITS[exponent])
}
