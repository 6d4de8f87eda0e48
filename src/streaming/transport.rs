//! HTTP transport for the Ollama API
//!
//! Two ways to issue a request:
//! - buffered: read the whole body, decode JSON when possible
//! - streaming: hand back a [`ByteStream`] as soon as the status line is in
//!
//! A non-2xx status is classified from the status line alone and reported
//! before any body bytes are read.

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::{BoxStream, Stream, StreamExt};
use reqwest::{Client, Method, Url};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::SettingsSource;
use crate::errors::{ClientError, Result};
use crate::streaming::endpoint::endpoint_url;
use crate::streaming::request::RequestPayload;

/// Buffered request timeout (60 seconds)
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Decoded body of a buffered response
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    Json(serde_json::Value),
    Text(String),
}

/// Status and body of a completed buffered request
#[derive(Debug, Clone, PartialEq)]
pub struct BufferedResponse {
    pub status: u16,
    pub body: ResponseBody,
}

/// Pull-based handle over a response body
///
/// `read_chunk` yields non-empty chunks while the body lasts and an empty
/// chunk at end of stream. Closing drops the underlying connection; a
/// closed handle reports end of stream forever after.
pub struct ByteStream {
    inner: Option<BoxStream<'static, Result<Bytes>>>,
}

impl ByteStream {
    pub fn new<S>(stream: S) -> Self
    where
        S: Stream<Item = Result<Bytes>> + Send + 'static,
    {
        Self {
            inner: Some(stream.boxed()),
        }
    }

    /// Wrap a successful HTTP response body
    pub fn from_response(response: reqwest::Response) -> Self {
        Self::new(
            response
                .bytes_stream()
                .map(|chunk| chunk.map_err(ClientError::from)),
        )
    }

    /// Read the next chunk; empty means the body is exhausted
    pub async fn read_chunk(&mut self) -> Result<Bytes> {
        let Some(inner) = self.inner.as_mut() else {
            return Ok(Bytes::new());
        };

        loop {
            match inner.next().await {
                // An empty frame is not end of body on HTTP; keep reading.
                Some(Ok(chunk)) if chunk.is_empty() => continue,
                Some(Ok(chunk)) => return Ok(chunk),
                Some(Err(err)) => return Err(err),
                None => return Ok(Bytes::new()),
            }
        }
    }

    /// Close the stream. Returns `true` only for the call that closed it.
    pub fn close(&mut self) -> bool {
        self.inner.take().is_some()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.is_none()
    }
}

impl fmt::Debug for ByteStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ByteStream")
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Request issuing seam between the session controller and the network
#[async_trait]
pub trait Transport: Send + Sync {
    /// Issue a request and read the full body
    async fn request_buffered(
        &self,
        method: Method,
        path: &str,
        body: Option<&RequestPayload>,
    ) -> Result<BufferedResponse>;

    /// POST and return the body as a byte stream once a 2xx status arrives
    async fn request_streaming(&self, path: &str, body: &RequestPayload) -> Result<ByteStream>;
}

/// [`Transport`] over a pooled `reqwest` client
pub struct HttpTransport {
    client: Client,
    settings: Arc<dyn SettingsSource>,
    request_timeout: Duration,
}

impl HttpTransport {
    /// Create a transport with the default request timeout
    pub fn new(settings: Arc<dyn SettingsSource>) -> Result<Self> {
        Self::with_timeout(settings, DEFAULT_REQUEST_TIMEOUT)
    }

    /// Create a transport with a custom request timeout
    ///
    /// Buffered requests get the whole exchange bounded. Streaming requests
    /// get the wait for response headers bounded; the stream body itself is
    /// bounded by the session's idle timeout.
    pub fn with_timeout(settings: Arc<dyn SettingsSource>, request_timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(request_timeout)
            .build()
            .map_err(ClientError::Transport)?;

        Ok(Self {
            client,
            settings,
            request_timeout,
        })
    }

    /// Resolve `path` against the base URL configured right now
    fn url(&self, path: &str) -> Result<Url> {
        let full = endpoint_url(&self.settings.ollama_url(), path);
        match Url::parse(&full) {
            Ok(url) if url.has_host() => Ok(url),
            Ok(_) => {
                warn!(url = %full, "endpoint URL has no host");
                Err(ClientError::InvalidEndpoint(full))
            }
            Err(e) => {
                warn!(url = %full, error = %e, "invalid endpoint URL");
                Err(ClientError::InvalidEndpoint(full))
            }
        }
    }
}

/// Turn a non-2xx status into an error, without touching the body
///
/// The reason is the canonical phrase for the code; reqwest does not
/// expose the server's own phrase.
fn check_status(response: &reqwest::Response) -> Result<()> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }

    Err(ClientError::HttpStatus {
        code: status.as_u16(),
        reason: status.canonical_reason().unwrap_or("Unknown").to_string(),
    })
}

#[async_trait]
impl Transport for HttpTransport {
    async fn request_buffered(
        &self,
        method: Method,
        path: &str,
        body: Option<&RequestPayload>,
    ) -> Result<BufferedResponse> {
        let url = self.url(path)?;
        debug!(%method, %url, "sending request");

        let mut request = self
            .client
            .request(method, url)
            .timeout(self.request_timeout);
        if let Some(payload) = body {
            request = request.json(payload);
        }

        let response = request.send().await?;
        debug!(status = response.status().as_u16(), "response status");
        check_status(&response)?;

        let status = response.status().as_u16();
        let bytes = response.bytes().await?;
        let text = String::from_utf8_lossy(&bytes).into_owned();
        debug!(chars = text.len(), "response received");

        let body = match serde_json::from_str(&text) {
            Ok(json) => ResponseBody::Json(json),
            Err(_) => {
                debug!("response is not JSON, returning as text");
                ResponseBody::Text(text)
            }
        };

        Ok(BufferedResponse { status, body })
    }

    async fn request_streaming(&self, path: &str, body: &RequestPayload) -> Result<ByteStream> {
        let url = self.url(path)?;
        debug!(%url, model = body.model(), "starting stream request");

        let send = self.client.post(url).json(body).send();
        let response = match tokio::time::timeout(self.request_timeout, send).await {
            Ok(response) => response?,
            Err(_) => {
                let duration_ms = self.request_timeout.as_millis() as u64;
                warn!(duration_ms, "no response headers before timeout");
                return Err(ClientError::Timeout { duration_ms });
            }
        };
        debug!(status = response.status().as_u16(), "stream request started");
        check_status(&response)?;

        Ok(ByteStream::from_response(response))
    }
}
