//! Model listing over the `/api/tags` endpoint
//!
//! Listing is the one place failures are swallowed: callers get an empty
//! list and decide themselves how to show that nothing is available.

use reqwest::Method;
use tracing::{debug, info, warn};

use crate::errors::{ClientError, Result};
use crate::models::types::{ModelInfo, TagsResponse};
use crate::streaming::endpoint::TAGS_PATH;
use crate::streaming::transport::{ResponseBody, Transport};

/// Fetch installed models, surfacing every failure
pub async fn fetch_models(transport: &dyn Transport) -> Result<Vec<ModelInfo>> {
    debug!("fetching models from Ollama server");
    let response = transport
        .request_buffered(Method::GET, TAGS_PATH, None)
        .await?;

    match response.body {
        ResponseBody::Json(json) => {
            let tags: TagsResponse = serde_json::from_value(json)?;
            Ok(tags.models)
        }
        ResponseBody::Text(_) => Err(ClientError::InvalidResponseFormat),
    }
}

/// Installed models in server order; empty on any failure
pub async fn list_models(transport: &dyn Transport) -> Vec<ModelInfo> {
    match fetch_models(transport).await {
        Ok(models) => {
            if models.is_empty() {
                info!("no models found in response");
            } else {
                info!(count = models.len(), "found models");
            }
            models
        }
        Err(e) => {
            warn!(error = %e, "error fetching models");
            Vec::new()
        }
    }
}

/// Whether the server answers the listing endpoint with a 2xx status
pub async fn test_connection(transport: &dyn Transport) -> bool {
    debug!("testing connection to Ollama server");
    match transport.request_buffered(Method::GET, TAGS_PATH, None).await {
        Ok(_) => true,
        Err(e) => {
            warn!(error = %e, "Ollama connection test failed");
            false
        }
    }
}
