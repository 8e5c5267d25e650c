//! Text-generation backend seam and the Ollama HTTP client.

use std::collections::VecDeque;
use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use futures::{stream, Stream, StreamExt};
use serde::{Deserialize, Serialize};

use studymate_core::config::{GenerationSettings, Sampling};

use crate::error::{ChatError, Result};

/// Finite, non-restartable sequence of generated text chunks. Dropping it
/// stops reading from the backend.
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub model: String,
    pub prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl GenerationRequest {
    pub fn new(model: impl Into<String>, prompt: impl Into<String>, sampling: Sampling) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            temperature: sampling.temperature,
            max_tokens: sampling.max_tokens,
        }
    }
}

#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Single completion string.
    async fn complete(&self, request: &GenerationRequest) -> Result<String>;

    /// Streamed completion. Errors before the first byte are returned
    /// directly; later ones arrive as stream items.
    async fn stream(&self, request: &GenerationRequest) -> Result<TextStream>;
}

/// A stream holding exactly one chunk.
pub fn single_chunk(text: impl Into<String>) -> TextStream {
    Box::pin(stream::once(futures::future::ready(Ok::<String, ChatError>(text.into()))))
}

#[derive(Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OllamaChunk {
    #[serde(default)]
    response: String,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

/// Client for Ollama's `/api/generate`.
pub struct OllamaBackend {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl OllamaBackend {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().connect_timeout(timeout).build()?;
        Ok(Self { client, base_url: base_url.into(), timeout })
    }

    pub fn from_settings(settings: &GenerationSettings) -> Result<Self> {
        Self::new(settings.base_url.clone(), Duration::from_secs(settings.timeout_secs.max(1)))
    }

    fn endpoint(&self) -> String {
        format!("{}/api/generate", self.base_url.trim_end_matches('/'))
    }

    async fn send(&self, request: &GenerationRequest, stream: bool) -> Result<reqwest::Response> {
        let body = OllamaRequest {
            model: &request.model,
            prompt: &request.prompt,
            stream,
            options: OllamaOptions { temperature: request.temperature, num_predict: request.max_tokens },
        };
        let pending = self.client.post(self.endpoint()).json(&body).send();
        let response = tokio::time::timeout(self.timeout, pending)
            .await
            .map_err(|_| ChatError::Timeout)?
            .map_err(ChatError::from_request)?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ChatError::Status { status: status.as_u16(), body });
        }
        Ok(response)
    }
}

#[async_trait]
impl GenerationBackend for OllamaBackend {
    async fn complete(&self, request: &GenerationRequest) -> Result<String> {
        let response = self.send(request, false).await?;
        let chunk: OllamaChunk = tokio::time::timeout(self.timeout, response.json())
            .await
            .map_err(|_| ChatError::Timeout)?
            .map_err(|e| ChatError::Decode(e.to_string()))?;
        if let Some(message) = chunk.error {
            return Err(ChatError::Remote(message));
        }
        Ok(chunk.response)
    }

    async fn stream(&self, request: &GenerationRequest) -> Result<TextStream> {
        let response = self.send(request, true).await?;
        tracing::debug!(model = %request.model, "streaming generation");
        Ok(decode_ndjson(response.bytes_stream(), self.timeout))
    }
}

/// Splits a byte stream into newline-terminated JSON records.
#[derive(Default)]
pub(crate) struct NdjsonDecoder {
    buf: Vec<u8>,
}

impl NdjsonDecoder {
    pub(crate) fn push(&mut self, bytes: &[u8]) -> Vec<Result<OllamaChunk>> {
        self.buf.extend_from_slice(bytes);
        let mut out = Vec::new();
        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buf.drain(..=pos).collect();
            if let Some(record) = parse_line(&line) {
                out.push(record);
            }
        }
        out
    }

    /// Whatever is left once the body ends without a trailing newline.
    pub(crate) fn finish(&mut self) -> Option<Result<OllamaChunk>> {
        let rest = std::mem::take(&mut self.buf);
        parse_line(&rest)
    }
}

fn parse_line(line: &[u8]) -> Option<Result<OllamaChunk>> {
    let text = String::from_utf8_lossy(line);
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    Some(serde_json::from_str(text).map_err(|e| ChatError::Decode(e.to_string())))
}

struct DecodeState<S> {
    body: Pin<Box<S>>,
    decoder: NdjsonDecoder,
    pending: VecDeque<Result<String>>,
    finished: bool,
    timeout: Duration,
}

impl<S> DecodeState<S> {
    fn accept(&mut self, record: Result<OllamaChunk>) {
        if self.finished {
            return;
        }
        match record {
            Ok(chunk) => {
                if let Some(message) = chunk.error {
                    self.pending.push_back(Err(ChatError::Remote(message)));
                    self.finished = true;
                    return;
                }
                if !chunk.response.is_empty() {
                    self.pending.push_back(Ok(chunk.response));
                }
                if chunk.done {
                    self.finished = true;
                }
            }
            Err(e) => {
                self.pending.push_back(Err(e));
                self.finished = true;
            }
        }
    }
}

/// Turn an NDJSON body into text chunks. Each read from `body` is bounded by
/// `timeout`; the stream ends after `done`, an in-band error, or a read error.
pub(crate) fn decode_ndjson<S, B, E>(body: S, timeout: Duration) -> TextStream
where
    S: Stream<Item = std::result::Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Into<ChatError> + Send + 'static,
{
    let state = DecodeState {
        body: Box::pin(body),
        decoder: NdjsonDecoder::default(),
        pending: VecDeque::new(),
        finished: false,
        timeout,
    };
    Box::pin(stream::unfold(state, |mut st| async move {
        loop {
            if let Some(item) = st.pending.pop_front() {
                return Some((item, st));
            }
            if st.finished {
                return None;
            }
            match tokio::time::timeout(st.timeout, st.body.next()).await {
                Err(_) => {
                    st.pending.push_back(Err(ChatError::Timeout));
                    st.finished = true;
                }
                Ok(None) => {
                    if let Some(record) = st.decoder.finish() {
                        st.accept(record);
                    }
                    st.finished = true;
                }
                Ok(Some(Err(e))) => {
                    st.pending.push_back(Err(e.into()));
                    st.finished = true;
                }
                Ok(Some(Ok(bytes))) => {
                    for record in st.decoder.push(bytes.as_ref()) {
                        st.accept(record);
                    }
                }
            }
        }
    }))
}
