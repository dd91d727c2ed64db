//! Streaming completion client for the llama-server HTTP interface.
//!
//! `POST /completion` returns server-sent events, one JSON object per `data:`
//! line, ending with a final object carrying `stop: true`.

use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll, ready};
use std::time::Duration;

use eventsource_stream::{Event, EventStreamError, Eventsource};
use futures_util::Stream;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

/// Covers the whole request, including a long generation.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(3 * 60);

/// One completion call. The wire payload always forces streaming and
/// disables prompt caching, so every call is a fresh generation.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub prompt: String,
    pub temperature: f32,
    pub n_predict: u32,
}

#[derive(Serialize)]
struct WireRequest<'a> {
    prompt: &'a str,
    temp: f32,
    n_predict: u32,
    stream: bool,
    cache_prompt: bool,
}

impl<'a> From<&'a CompletionRequest> for WireRequest<'a> {
    fn from(request: &'a CompletionRequest) -> Self {
        Self {
            prompt: &request.prompt,
            temp: request.temperature,
            n_predict: request.n_predict,
            stream: true,
            cache_prompt: false,
        }
    }
}

/// One streamed fragment of the generation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CompletionChunk {
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub stop: bool,
}

#[derive(Debug)]
pub enum CompletionError {
    /// Request could not be sent or the connection dropped mid-stream.
    Transport(reqwest::Error),
    /// The server answered with a non-success status.
    Status { code: u16, body: String },
    /// The event stream itself was malformed beyond recovery.
    Stream(String),
}

impl fmt::Display for CompletionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompletionError::Transport(e) => write!(f, "completion request failed: {e}"),
            CompletionError::Status { code, body } => {
                if body.is_empty() {
                    write!(f, "completion request failed: HTTP {code}")
                } else {
                    write!(f, "completion request failed: HTTP {code}: {body}")
                }
            }
            CompletionError::Stream(msg) => write!(f, "completion stream error: {msg}"),
        }
    }
}

impl std::error::Error for CompletionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CompletionError::Transport(e) => Some(e),
            CompletionError::Status { .. } | CompletionError::Stream(_) => None,
        }
    }
}

/// Client bound to one server's base URL.
#[derive(Clone)]
pub struct CompletionClient {
    http: reqwest::Client,
    base_url: String,
}

impl CompletionClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    /// Sends a completion request and returns the chunk stream.
    ///
    /// The stream yields chunks in generation order and ends after the chunk
    /// with `stop: true`, or earlier if the connection drops. Malformed
    /// chunks are skipped.
    pub async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> Result<CompletionStream, CompletionError> {
        let url = format!("{}/completion", self.base_url);
        debug!(
            url,
            temperature = request.temperature,
            n_predict = request.n_predict,
            "Sending completion request"
        );

        let response = self
            .http
            .post(&url)
            .timeout(REQUEST_TIMEOUT)
            .json(&WireRequest::from(request))
            .send()
            .await
            .map_err(CompletionError::Transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CompletionError::Status {
                code: status.as_u16(),
                body,
            });
        }

        Ok(CompletionStream {
            inner: Box::pin(response.bytes_stream().eventsource()),
            done: false,
        })
    }
}

type InnerStream =
    Pin<Box<dyn Stream<Item = Result<Event, EventStreamError<reqwest::Error>>> + Send>>;

/// Chunk stream for one completion call. Fused: once the stop chunk or an
/// error has been yielded, the stream stays finished even if the server
/// keeps the connection open.
pub struct CompletionStream {
    inner: InnerStream,
    done: bool,
}

impl std::fmt::Debug for CompletionStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionStream")
            .field("done", &self.done)
            .finish_non_exhaustive()
    }
}

impl Stream for CompletionStream {
    type Item = Result<CompletionChunk, CompletionError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.done {
            return Poll::Ready(None);
        }
        loop {
            match ready!(self.inner.as_mut().poll_next(cx)) {
                None => {
                    self.done = true;
                    return Poll::Ready(None);
                }
                Some(Err(EventStreamError::Transport(e))) => {
                    self.done = true;
                    return Poll::Ready(Some(Err(CompletionError::Transport(e))));
                }
                Some(Err(e)) => {
                    self.done = true;
                    return Poll::Ready(Some(Err(CompletionError::Stream(e.to_string()))));
                }
                Some(Ok(event)) => match serde_json::from_str::<CompletionChunk>(&event.data) {
                    Ok(chunk) => {
                        if chunk.stop {
                            self.done = true;
                        }
                        return Poll::Ready(Some(Ok(chunk)));
                    }
                    Err(e) => {
                        trace!(error = %e, data = event.data, "Skipping malformed chunk");
                    }
                },
            }
        }
    }
}
