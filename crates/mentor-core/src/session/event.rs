//! Session change notifications.

use crate::session::message::Message;
use serde::{Deserialize, Serialize};

/// Events published by the chat service as a session changes.
///
/// Consumers subscribe to observe progress, most importantly the
/// `MessageUpdated` stream that shows an AI reply "typing" while its content
/// grows.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// A new session was created.
    SessionCreated { session_id: String },
    /// A message was appended to the log.
    MessageAppended { message: Message },
    /// A streaming TEXT message's content was replaced.
    MessageUpdated {
        session_id: String,
        message_id: String,
        content: String,
    },
    /// A model response stream finished normally.
    StreamCompleted { session_id: String },
    /// A model response stream failed; partial content is retained.
    StreamFailed { session_id: String, error: String },
    /// A model response stream was cancelled by the caller.
    StreamCancelled { session_id: String },
    /// A pending QUESTION/ACTION was resolved.
    PendingResolved {
        session_id: String,
        message_id: String,
    },
    /// All pending entries of a session were force-cleared.
    PendingCleared { session_id: String, removed: usize },
    /// An ACTION message's side effect executed.
    ActionExecuted {
        session_id: String,
        message_id: String,
    },
    /// An executed action was reversed.
    ActionUndone { message_id: String },
    /// A session's log and auxiliary records were reset.
    SessionReset { session_id: String },
}
