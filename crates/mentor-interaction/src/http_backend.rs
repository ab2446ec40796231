//! OpenAI-compatible streaming backend.
//!
//! Talks to a `/chat/completions` endpoint with `stream: true` and decodes
//! the SSE response body into raw text chunks. Transient HTTP failures are
//! retried with exponential backoff before the stream is opened; once the
//! stream is running, failures surface as `Err` items.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use mentor_core::config::BackendConfig;
use mentor_core::{MentorError, Result};
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};

use crate::backend::{ChatRequest, ChatTurn, ChunkStream, ModelBackend};

/// Base delay before the first retry.
const BASE_DELAY_MS: u64 = 1000;

/// Transient statuses worth retrying.
fn is_retryable_status(status: StatusCode) -> bool {
    matches!(status.as_u16(), 429 | 500 | 502 | 503 | 504)
}

/// Exponential backoff delay for a retry attempt.
fn retry_delay(attempt: u32) -> Duration {
    Duration::from_millis(BASE_DELAY_MS * 2u64.saturating_pow(attempt.min(8)))
}

fn chat_endpoint(base_url: &str) -> String {
    format!("{}/chat/completions", base_url.trim_end_matches('/'))
}

#[derive(Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    messages: &'a [ChatTurn],
    stream: bool,
}

#[derive(Deserialize)]
struct WireChunk {
    #[serde(default)]
    choices: Vec<WireChoice>,
}

#[derive(Deserialize)]
struct WireChoice {
    #[serde(default)]
    delta: WireDelta,
}

#[derive(Deserialize, Default)]
struct WireDelta {
    #[serde(default)]
    content: Option<String>,
}

/// Incremental decoder for `data:`-framed SSE lines.
#[derive(Default)]
struct SseLineDecoder {
    buffer: String,
    done: bool,
}

impl SseLineDecoder {
    /// Feeds raw body bytes and drains decoded content fragments.
    fn feed(&mut self, bytes: &[u8]) -> Vec<String> {
        let mut fragments = Vec::new();
        if self.done {
            return fragments;
        }
        self.buffer.push_str(&String::from_utf8_lossy(bytes));

        while let Some(split) = self.buffer.find('\n') {
            let line = self.buffer[..split].to_string();
            self.buffer.drain(..=split);

            let trimmed = line.trim();
            let Some(payload) = trimmed.strip_prefix("data:") else {
                continue;
            };
            let payload = payload.trim();
            if payload.is_empty() {
                continue;
            }
            if payload == "[DONE]" {
                self.done = true;
                break;
            }

            match serde_json::from_str::<WireChunk>(payload) {
                Ok(chunk) => {
                    let content = chunk
                        .choices
                        .into_iter()
                        .next()
                        .and_then(|choice| choice.delta.content);
                    if let Some(content) = content {
                        if !content.is_empty() {
                            fragments.push(content);
                        }
                    }
                }
                Err(e) => {
                    log::debug!("Skipping malformed SSE payload: {}", e);
                }
            }
        }

        fragments
    }

    fn is_done(&self) -> bool {
        self.done
    }
}

struct DecodeState<S> {
    body: S,
    decoder: SseLineDecoder,
    queued: VecDeque<String>,
    failed: bool,
}

/// [`ModelBackend`] over an OpenAI-compatible HTTP API.
pub struct HttpModelBackend {
    http: Client,
    base_url: String,
    model: String,
    api_key: String,
    max_retries: u32,
}

impl HttpModelBackend {
    /// Builds a backend from configuration, reading the API key from the
    /// environment variable named in `config.api_key_env`.
    ///
    /// # Errors
    ///
    /// Returns `Config` if the API key variable is unset, `Backend` if the
    /// HTTP client cannot be built.
    pub fn from_config(config: &BackendConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env).map_err(|_| {
            MentorError::config(format!(
                "API key not set; export {} to use the HTTP backend",
                config.api_key_env
            ))
        })?;
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| MentorError::backend(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: config.base_url.clone(),
            model: config.model.clone(),
            api_key,
            max_retries: config.max_retries,
        })
    }

    fn endpoint(&self) -> String {
        chat_endpoint(&self.base_url)
    }

    async fn send_with_retry(&self, body: &WireRequest<'_>) -> Result<Response> {
        let mut last_error = String::new();

        for attempt in 0..=self.max_retries {
            let sent = self
                .http
                .post(self.endpoint())
                .bearer_auth(&self.api_key)
                .json(body)
                .send()
                .await;

            match sent {
                Ok(response) if response.status().is_success() => return Ok(response),
                Ok(response) => {
                    let status = response.status();
                    let detail = response.text().await.unwrap_or_else(|_| {
                        status
                            .canonical_reason()
                            .unwrap_or("request failed")
                            .to_string()
                    });
                    last_error = format!("{}: {}", status, detail);
                    if attempt < self.max_retries && is_retryable_status(status) {
                        log::warn!(
                            "Model request failed ({}), retrying in {:?}",
                            status,
                            retry_delay(attempt)
                        );
                        tokio::time::sleep(retry_delay(attempt)).await;
                        continue;
                    }
                    return Err(MentorError::backend(last_error));
                }
                Err(e) => {
                    last_error = e.to_string();
                    if attempt < self.max_retries {
                        log::warn!(
                            "Model request failed ({}), retrying in {:?}",
                            last_error,
                            retry_delay(attempt)
                        );
                        tokio::time::sleep(retry_delay(attempt)).await;
                        continue;
                    }
                    return Err(MentorError::backend(last_error));
                }
            }
        }

        Err(MentorError::backend(last_error))
    }
}

#[async_trait]
impl ModelBackend for HttpModelBackend {
    async fn stream_chat(&self, request: ChatRequest) -> Result<ChunkStream> {
        let body = WireRequest {
            model: &self.model,
            messages: &request.turns,
            stream: true,
        };
        let response = self.send_with_retry(&body).await?;

        let state = DecodeState {
            body: response.bytes_stream().boxed(),
            decoder: SseLineDecoder::default(),
            queued: VecDeque::new(),
            failed: false,
        };
        let chunks = stream::unfold(state, |mut state| async move {
            loop {
                if state.failed {
                    return None;
                }
                if let Some(fragment) = state.queued.pop_front() {
                    return Some((Ok(fragment), state));
                }
                if state.decoder.is_done() {
                    return None;
                }
                match state.body.next().await {
                    Some(Ok(bytes)) => {
                        let fragments = state.decoder.feed(&bytes);
                        state.queued.extend(fragments);
                    }
                    Some(Err(e)) => {
                        state.failed = true;
                        return Some((
                            Err(MentorError::stream(format!("model stream interrupted: {}", e))),
                            state,
                        ));
                    }
                    None => return None,
                }
            }
        });

        Ok(chunks.boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_endpoint_normalizes_trailing_slash() {
        assert_eq!(
            chat_endpoint("https://api.openai.com/v1"),
            "https://api.openai.com/v1/chat/completions"
        );
        assert_eq!(
            chat_endpoint("http://localhost:8080/v1/"),
            "http://localhost:8080/v1/chat/completions"
        );
    }

    #[test]
    fn test_retryable_statuses() {
        assert!(is_retryable_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(is_retryable_status(StatusCode::INTERNAL_SERVER_ERROR));
        assert!(is_retryable_status(StatusCode::BAD_GATEWAY));
        assert!(is_retryable_status(StatusCode::SERVICE_UNAVAILABLE));
        assert!(is_retryable_status(StatusCode::GATEWAY_TIMEOUT));
        assert!(!is_retryable_status(StatusCode::UNAUTHORIZED));
        assert!(!is_retryable_status(StatusCode::BAD_REQUEST));
    }

    #[test]
    fn test_retry_delay_grows_and_caps() {
        assert_eq!(retry_delay(0), Duration::from_millis(1000));
        assert_eq!(retry_delay(1), Duration::from_millis(2000));
        assert_eq!(retry_delay(2), Duration::from_millis(4000));
        assert_eq!(retry_delay(100), retry_delay(8));
    }

    #[test]
    fn test_decoder_extracts_content_deltas() {
        let mut decoder = SseLineDecoder::default();
        let fragments = decoder.feed(
            b"data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n\
              data: {\"choices\":[{\"delta\":{\"content\":\"lo\"}}]}\n",
        );
        assert_eq!(fragments, vec!["Hel".to_string(), "lo".to_string()]);
    }

    #[test]
    fn test_decoder_buffers_partial_lines() {
        let mut decoder = SseLineDecoder::default();
        assert!(decoder
            .feed(b"data: {\"choices\":[{\"delta\":{\"content\":")
            .is_empty());
        let fragments = decoder.feed(b"\"Hello\"}}]}\n");
        assert_eq!(fragments, vec!["Hello".to_string()]);
    }

    #[test]
    fn test_decoder_stops_at_done_marker() {
        let mut decoder = SseLineDecoder::default();
        let fragments = decoder.feed(
            b"data: {\"choices\":[{\"delta\":{\"content\":\"a\"}}]}\n\
              data: [DONE]\n\
              data: {\"choices\":[{\"delta\":{\"content\":\"b\"}}]}\n",
        );
        assert_eq!(fragments, vec!["a".to_string()]);
        assert!(decoder.is_done());
        assert!(decoder.feed(b"data: anything\n").is_empty());
    }

    #[test]
    fn test_decoder_skips_non_data_and_malformed_lines() {
        let mut decoder = SseLineDecoder::default();
        let fragments = decoder.feed(
            b": keep-alive\n\
              event: message\n\
              data: not json\n\
              data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n\
              data: {\"choices\":[{\"delta\":{\"content\":\"ok\"}}]}\n",
        );
        assert_eq!(fragments, vec!["ok".to_string()]);
    }

    #[test]
    fn test_decoder_accepts_data_prefix_without_space() {
        let mut decoder = SseLineDecoder::default();
        let fragments =
            decoder.feed(b"data:{\"choices\":[{\"delta\":{\"content\":\"tight\"}}]}\n");
        assert_eq!(fragments, vec!["tight".to_string()]);
    }

    #[test]
    fn test_from_config_requires_api_key() {
        let config = BackendConfig {
            api_key_env: "MENTOR_HTTP_BACKEND_TEST_UNSET_KEY".to_string(),
            ..BackendConfig::default()
        };
        // SAFETY: test-local variable name, not read concurrently
        unsafe {
            std::env::remove_var("MENTOR_HTTP_BACKEND_TEST_UNSET_KEY");
        }
        let err = match HttpModelBackend::from_config(&config) {
            Ok(_) => panic!("backend built without an API key"),
            Err(e) => e,
        };
        assert!(err.is_config());
    }
}
