//! Chat message types.
//!
//! A session log is an ordered sequence of [`Message`] values. Plain text
//! flows as `TEXT` messages; the model's structured protocol lines become
//! immutable `QUESTION`/`ACTION` messages.

use crate::error::{MentorError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Who produced a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Sender {
    /// The human user.
    User,
    /// The model backend.
    Ai,
}

/// The kind of a message in the session log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MessageKind {
    /// Free-form text. The only kind whose content may grow while streaming.
    Text,
    /// A question from the model requiring user acknowledgment.
    Question,
    /// An actionable proposal from the model; may carry a side effect.
    Action,
}

impl MessageKind {
    /// Whether messages of this kind enter the pending queue on append.
    pub fn requires_resolution(&self) -> bool {
        matches!(self, Self::Question | Self::Action)
    }
}

/// A primitive value inside an action payload.
///
/// The wire protocol only permits flat, primitive-valued payload fields;
/// nested objects or arrays fail deserialization, which in turn degrades the
/// whole line to prose in the stream parser.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PayloadValue {
    Null,
    Bool(bool),
    Number(serde_json::Number),
    String(String),
}

impl PayloadValue {
    /// Returns the contained string, if this value is one.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }
}

/// A flat map of primitive payload fields attached to an ACTION message.
pub type ActionPayload = HashMap<String, PayloadValue>;

/// A single message in a session log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Unique message identifier (UUID format)
    pub id: String,
    /// The session this message belongs to
    pub session_id: String,
    /// Who sent the message
    pub sender: Sender,
    /// Message kind
    pub kind: MessageKind,
    /// Textual content (may be empty while a TEXT message is streaming)
    pub content: String,
    /// Raw action type string, meaningful only when kind is ACTION
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_type: Option<String>,
    /// Primitive-valued action payload, only for ACTION messages
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_payload: Option<ActionPayload>,
    /// Timestamp when the message was created (ISO 8601 format)
    pub created_at: String,
}

impl Message {
    fn new(session_id: &str, sender: Sender, kind: MessageKind, content: String) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            session_id: session_id.to_string(),
            sender,
            kind,
            content,
            action_type: None,
            action_payload: None,
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Creates a USER TEXT message.
    pub fn user_text(session_id: &str, content: impl Into<String>) -> Self {
        Self::new(session_id, Sender::User, MessageKind::Text, content.into())
    }

    /// Creates an AI TEXT message. Starts empty when used as the running
    /// target of streaming deltas.
    pub fn ai_text(session_id: &str, content: impl Into<String>) -> Self {
        Self::new(session_id, Sender::Ai, MessageKind::Text, content.into())
    }

    /// Creates an immutable AI QUESTION or ACTION message.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if `kind` is TEXT (use [`Message::ai_text`]) or
    /// if an ACTION is missing its action type.
    pub fn ai_structured(
        session_id: &str,
        kind: MessageKind,
        content: impl Into<String>,
        action_type: Option<String>,
        action_payload: Option<ActionPayload>,
    ) -> Result<Self> {
        if !kind.requires_resolution() {
            return Err(MentorError::invalid_input(
                "structured messages must be QUESTION or ACTION",
            ));
        }
        if kind == MessageKind::Action && action_type.as_deref().unwrap_or("").is_empty() {
            return Err(MentorError::invalid_input(
                "ACTION messages require a non-empty action type",
            ));
        }
        let mut message = Self::new(session_id, Sender::Ai, kind, content.into());
        if kind == MessageKind::Action {
            message.action_type = action_type;
            message.action_payload = action_payload;
        }
        Ok(message)
    }
}
