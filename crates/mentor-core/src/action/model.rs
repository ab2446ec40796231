//! Action domain models.
//!
//! Side effects proposed by the model arrive as ACTION messages carrying a
//! raw `action_type` string. Execution dispatches on the finite
//! [`ActionKind`] enum; an unparseable string is a logged no-op, never an
//! error. Undo data is a serializable [`UndoStep`], not a captured closure,
//! so the executed-action ledger can be inspected, stored, and tested.

use crate::session::{ActionPayload, Message};
use serde::{Deserialize, Serialize};

/// The finite set of actions the engine knows how to execute and reverse.
///
/// Wire names are the snake_case form (`create_task`, `record_note`,
/// `set_goal_status`).
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum_macros::Display,
    strum_macros::EnumString,
    strum_macros::EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ActionKind {
    /// Add a task to the owner's planner board.
    CreateTask,
    /// Attach a free-form note to the planner board.
    RecordNote,
    /// Move a goal to a new status, remembering the previous one.
    SetGoalStatus,
}

/// Everything a handler needs to execute one ACTION message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRequest {
    /// The originating ACTION message id
    pub message_id: String,
    /// The session the message belongs to
    pub session_id: String,
    /// Raw action type string as sent by the model
    pub action_type: String,
    /// Primitive-valued payload fields, if any
    pub payload: Option<ActionPayload>,
}

impl ActionRequest {
    /// Builds a request from an ACTION message.
    ///
    /// Returns `None` for messages without an action type (non-ACTION kinds).
    pub fn from_message(message: &Message) -> Option<Self> {
        let action_type = message.action_type.clone()?;
        Some(Self {
            message_id: message.id.clone(),
            session_id: message.session_id.clone(),
            action_type,
            payload: message.action_payload.clone(),
        })
    }

    /// Returns a payload field as a string slice, if present and a string.
    pub fn payload_str(&self, key: &str) -> Option<&str> {
        self.payload.as_ref()?.get(key)?.as_str()
    }
}

/// Serializable description of how to reverse one executed action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum UndoStep {
    /// Remove the task created by `create_task`.
    RemoveTask { task_id: String },
    /// Remove the note created by `record_note`.
    RemoveNote { note_id: String },
    /// Restore a goal to its previous status (`None` means the goal had no
    /// status before the action ran).
    RestoreGoalStatus {
        goal_id: String,
        previous: Option<String>,
    },
}

/// Ledger record: an ACTION message's side effect has run and can be
/// reversed with the stored step.
///
/// Exactly one record exists per successfully-executed ACTION message. The
/// record is removed when undo succeeds; no undo history is archived.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutedAction {
    /// The originating ACTION message id
    pub message_id: String,
    /// The session the message belongs to
    pub session_id: String,
    /// Which handler executed the action
    pub kind: ActionKind,
    /// Timestamp when the side effect ran (ISO 8601 format)
    pub executed_at: String,
    /// The reversal step the handler recorded
    pub undo: UndoStep,
}

impl ExecutedAction {
    /// Creates a ledger record for a just-executed action.
    pub fn new(request: &ActionRequest, kind: ActionKind, undo: UndoStep) -> Self {
        Self {
            message_id: request.message_id.clone(),
            session_id: request.session_id.clone(),
            kind,
            executed_at: chrono::Utc::now().to_rfc3339(),
            undo,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{MessageKind, PayloadValue};
    use std::str::FromStr;

    #[test]
    fn test_action_kind_wire_names() {
        assert_eq!(ActionKind::CreateTask.to_string(), "create_task");
        assert_eq!(
            ActionKind::from_str("set_goal_status").unwrap(),
            ActionKind::SetGoalStatus
        );
        assert!(ActionKind::from_str("delete_everything").is_err());
    }

    #[test]
    fn test_request_from_message() {
        let mut payload = ActionPayload::new();
        payload.insert("title".to_string(), PayloadValue::String("essay".to_string()));
        let message = Message::ai_structured(
            "session-1",
            MessageKind::Action,
            "creating a task",
            Some("create_task".to_string()),
            Some(payload),
        )
        .unwrap();

        let request = ActionRequest::from_message(&message).unwrap();
        assert_eq!(request.action_type, "create_task");
        assert_eq!(request.payload_str("title"), Some("essay"));
        assert_eq!(request.payload_str("missing"), None);
    }

    #[test]
    fn test_request_requires_action_type() {
        let message =
            Message::ai_structured("s", MessageKind::Question, "ok?", None, None).unwrap();
        assert!(ActionRequest::from_message(&message).is_none());
    }

    #[test]
    fn test_undo_step_serde_round_trip() {
        let step = UndoStep::RestoreGoalStatus {
            goal_id: "goal-1".to_string(),
            previous: None,
        };
        let json = serde_json::to_string(&step).unwrap();
        assert!(json.contains("restore_goal_status"));
        let back: UndoStep = serde_json::from_str(&json).unwrap();
        assert_eq!(back, step);
    }
}
