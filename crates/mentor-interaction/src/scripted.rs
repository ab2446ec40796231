//! Scripted backend for tests and offline runs.
//!
//! Each queued script becomes the response to one `stream_chat` call, in
//! FIFO order. Scripts can end cleanly, end with a stream error, or hang
//! forever after their chunks (to exercise cancellation).

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use mentor_core::{MentorError, Result};
use tokio::sync::Mutex;

use crate::backend::{ChatRequest, ChunkStream, ModelBackend};

enum ScriptTail {
    /// Stream ends after the last chunk.
    End,
    /// Stream never yields again after the last chunk.
    Hang,
}

struct Script {
    chunks: Vec<Result<String>>,
    tail: ScriptTail,
}

/// In-memory [`ModelBackend`] that replays pre-seeded chunk sequences.
#[derive(Default)]
pub struct ScriptedBackend {
    scripts: Mutex<VecDeque<Script>>,
    calls: AtomicUsize,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a script that streams `chunks` and then ends cleanly.
    pub async fn push_chunks<I, S>(&self, chunks: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let chunks = chunks.into_iter().map(|c| Ok(c.into())).collect();
        self.scripts.lock().await.push_back(Script {
            chunks,
            tail: ScriptTail::End,
        });
    }

    /// Queues a script that streams `chunks` and then fails with a stream
    /// error carrying `error_message`.
    pub async fn push_failing<I, S>(&self, chunks: I, error_message: impl Into<String>)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut chunks: Vec<Result<String>> =
            chunks.into_iter().map(|c| Ok(c.into())).collect();
        chunks.push(Err(MentorError::stream(error_message)));
        self.scripts.lock().await.push_back(Script {
            chunks,
            tail: ScriptTail::End,
        });
    }

    /// Queues a script that streams `chunks` and then stays pending until
    /// the caller drops or cancels the stream.
    pub async fn push_hanging<I, S>(&self, chunks: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let chunks = chunks.into_iter().map(|c| Ok(c.into())).collect();
        self.scripts.lock().await.push_back(Script {
            chunks,
            tail: ScriptTail::Hang,
        });
    }

    /// Number of `stream_chat` calls seen so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ModelBackend for ScriptedBackend {
    async fn stream_chat(&self, _request: ChatRequest) -> Result<ChunkStream> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let script = self
            .scripts
            .lock()
            .await
            .pop_front()
            .ok_or_else(|| MentorError::backend("no scripted response queued"))?;

        let base = stream::iter(script.chunks);
        let stream: ChunkStream = match script.tail {
            ScriptTail::End => base.boxed(),
            ScriptTail::Hang => base.chain(stream::pending()).boxed(),
        };
        Ok(stream)
    }
}
