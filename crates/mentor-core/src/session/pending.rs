//! Pending queue entries.

use crate::session::message::MessageKind;
use serde::{Deserialize, Serialize};

/// A record that a QUESTION or ACTION message has not yet been acknowledged
/// by the user.
///
/// Entries live inside their [`Session`](crate::session::Session) so that a
/// message and its pending marker are always persisted together. The only
/// transition is removal on explicit resolution; entries never expire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingEntry {
    /// The referenced message id
    pub message_id: String,
    /// The referenced message's kind (QUESTION or ACTION)
    pub kind: MessageKind,
    /// Timestamp when the entry was created (ISO 8601 format)
    pub created_at: String,
}

impl PendingEntry {
    /// Creates an entry for a message that requires resolution.
    pub fn new(message_id: impl Into<String>, kind: MessageKind) -> Self {
        Self {
            message_id: message_id.into(),
            kind,
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}
