//! Model interaction layer of the Mentor chat engine.
//!
//! Owns everything between the orchestrator and the raw model output: the
//! [`ModelBackend`] port with its HTTP and scripted implementations, and the
//! [`ChatStreamParser`] that splits the streamed protocol text into prose
//! deltas and structured events.

pub mod backend;
pub mod http_backend;
pub mod parser;
pub mod scripted;

pub use backend::{ChatRequest, ChatRole, ChatTurn, ChunkStream, ModelBackend};
pub use http_backend::HttpModelBackend;
pub use parser::{ChatStreamParser, EventKind, StreamUnit, StructuredEvent};
pub use scripted::ScriptedBackend;
