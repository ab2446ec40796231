//! Model backend port.
//!
//! The orchestrator only sees a stream of raw text chunks; where those
//! chunks come from (an HTTP SSE endpoint, a scripted test double) is an
//! implementation detail behind [`ModelBackend`].

use async_trait::async_trait;
use futures::stream::BoxStream;
use mentor_core::Result;
use serde::{Deserialize, Serialize};

/// A stream of raw protocol text chunks from the model.
///
/// Chunk boundaries are arbitrary; a mid-stream failure is surfaced as an
/// `Err` item, after which the stream ends.
pub type ChunkStream = BoxStream<'static, Result<String>>;

/// Role of one conversation turn, in wire form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

/// One turn of conversation context sent to the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub content: String,
}

impl ChatTurn {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// A complete streaming request: system prompt plus prior conversation.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ChatRequest {
    pub turns: Vec<ChatTurn>,
}

impl ChatRequest {
    pub fn new(turns: Vec<ChatTurn>) -> Self {
        Self { turns }
    }
}

/// An opaque producer of protocol text streams.
#[async_trait]
pub trait ModelBackend: Send + Sync {
    /// Opens one streaming chat call.
    ///
    /// # Errors
    ///
    /// Returns `Backend` if the request cannot be opened (after retries);
    /// failures after the stream starts arrive as `Err` items on the
    /// returned stream.
    async fn stream_chat(&self, request: ChatRequest) -> Result<ChunkStream>;
}
