//! Session domain model.

use crate::session::message::Message;
use crate::session::pending::PendingEntry;
use serde::{Deserialize, Serialize};

/// One conversation thread between a user and the model backend.
///
/// A session owns its ordered message log and the pending index derived from
/// it. Keeping the index inline means a single save persists a message and
/// its pending marker as one unit, so the two can never drift apart.
///
/// Sessions are created on first interaction for a `(owner, goal)` pair and
/// are never destroyed by this subsystem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Unique session identifier (UUID format)
    pub id: String,
    /// The owning user's id
    pub owner_id: String,
    /// Optional goal/topic this session is attached to. `None` marks a
    /// general-purpose chat.
    #[serde(default)]
    pub goal_id: Option<String>,
    /// Human-readable session title
    pub title: String,
    /// Ordered message log (insertion order, never reordered)
    #[serde(default)]
    pub messages: Vec<Message>,
    /// Unresolved QUESTION/ACTION markers
    #[serde(default)]
    pub pending: Vec<PendingEntry>,
    /// Timestamp when the session was created (ISO 8601 format)
    pub created_at: String,
    /// Timestamp when the session was last updated (ISO 8601 format)
    pub updated_at: String,
}

impl Session {
    /// Creates an empty session for an owner and optional goal.
    pub fn new(owner_id: impl Into<String>, goal_id: Option<String>) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        let goal_id = goal_id.filter(|g| !g.is_empty());
        let title = match &goal_id {
            Some(goal) => format!("Goal chat ({goal})"),
            None => "General chat".to_string(),
        };
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            owner_id: owner_id.into(),
            goal_id,
            title,
            messages: Vec::new(),
            pending: Vec::new(),
            created_at: now.clone(),
            updated_at: now,
        }
    }

    /// Appends a message, inserting the matching pending entry in the same
    /// step when the kind requires resolution.
    pub fn push_message(&mut self, message: Message) {
        if message.kind.requires_resolution() {
            self.pending
                .push(PendingEntry::new(message.id.clone(), message.kind));
        }
        self.messages.push(message);
        self.touch();
    }

    /// Looks up a message by id.
    pub fn find_message(&self, message_id: &str) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == message_id)
    }

    /// Mutable lookup, used by the store while a TEXT message streams.
    pub fn find_message_mut(&mut self, message_id: &str) -> Option<&mut Message> {
        self.messages.iter_mut().find(|m| m.id == message_id)
    }

    /// Whether any QUESTION/ACTION is still unresolved.
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Removes the pending entry for `message_id` if present.
    ///
    /// Returns `false` when no entry existed; resolving twice is a no-op,
    /// not an error.
    pub fn resolve_pending(&mut self, message_id: &str) -> bool {
        let before = self.pending.len();
        self.pending.retain(|entry| entry.message_id != message_id);
        let removed = self.pending.len() < before;
        if removed {
            self.touch();
        }
        removed
    }

    /// Removes every pending entry, returning how many were dropped.
    pub fn clear_pending(&mut self) -> usize {
        let removed = self.pending.len();
        if removed > 0 {
            self.pending.clear();
            self.touch();
        }
        removed
    }

    /// Empties the message log and the pending index.
    pub fn reset(&mut self) {
        self.messages.clear();
        self.pending.clear();
        self.touch();
    }

    /// Derives a title from the first words of the opening user message.
    pub fn retitle_from(&mut self, text: &str) {
        const MAX_TITLE_LEN: usize = 48;
        let line = text.lines().next().unwrap_or("").trim();
        if line.is_empty() {
            return;
        }
        let mut title: String = line.chars().take(MAX_TITLE_LEN).collect();
        if line.chars().count() > MAX_TITLE_LEN {
            title.push('…');
        }
        self.title = title;
        self.touch();
    }

    fn touch(&mut self) {
        self.updated_at = chrono::Utc::now().to_rfc3339();
    }
}
