//! Built-in action handlers over the planner board.

use std::sync::Arc;

use async_trait::async_trait;
use mentor_core::action::{ActionKind, ActionRequest, UndoStep};
use mentor_core::{MentorError, Result};

use crate::handler::ActionHandler;
use crate::planner::PlannerBoard;

fn required_field<'a>(request: &'a ActionRequest, key: &str) -> Result<&'a str> {
    request.payload_str(key).ok_or_else(|| {
        MentorError::invalid_input(format!(
            "{} requires a '{}' payload field",
            request.action_type, key
        ))
    })
}

fn mismatched_step(kind: ActionKind) -> MentorError {
    MentorError::invalid_input(format!("undo step does not belong to {}", kind))
}

/// Handles `create_task`: adds a task titled by the `title` payload field.
pub struct CreateTaskHandler {
    board: Arc<PlannerBoard>,
}

impl CreateTaskHandler {
    pub fn new(board: Arc<PlannerBoard>) -> Self {
        Self { board }
    }
}

#[async_trait]
impl ActionHandler for CreateTaskHandler {
    fn kind(&self) -> ActionKind {
        ActionKind::CreateTask
    }

    async fn execute(&self, request: &ActionRequest) -> Result<UndoStep> {
        let title = required_field(request, "title")?;
        let task_id = self.board.add_task(title).await;
        Ok(UndoStep::RemoveTask { task_id })
    }

    async fn compensate(&self, undo: &UndoStep) -> Result<()> {
        match undo {
            UndoStep::RemoveTask { task_id } => {
                // Already-removed tasks make undo a no-op
                self.board.remove_task(task_id).await;
                Ok(())
            }
            _ => Err(mismatched_step(self.kind())),
        }
    }
}

/// Handles `record_note`: records the `text` payload field on the board.
pub struct RecordNoteHandler {
    board: Arc<PlannerBoard>,
}

impl RecordNoteHandler {
    pub fn new(board: Arc<PlannerBoard>) -> Self {
        Self { board }
    }
}

#[async_trait]
impl ActionHandler for RecordNoteHandler {
    fn kind(&self) -> ActionKind {
        ActionKind::RecordNote
    }

    async fn execute(&self, request: &ActionRequest) -> Result<UndoStep> {
        let text = required_field(request, "text")?;
        let note_id = self.board.add_note(text).await;
        Ok(UndoStep::RemoveNote { note_id })
    }

    async fn compensate(&self, undo: &UndoStep) -> Result<()> {
        match undo {
            UndoStep::RemoveNote { note_id } => {
                self.board.remove_note(note_id).await;
                Ok(())
            }
            _ => Err(mismatched_step(self.kind())),
        }
    }
}

/// Handles `set_goal_status`: moves a goal to a new status, remembering the
/// one it replaced so undo can put it back.
pub struct SetGoalStatusHandler {
    board: Arc<PlannerBoard>,
}

impl SetGoalStatusHandler {
    pub fn new(board: Arc<PlannerBoard>) -> Self {
        Self { board }
    }
}

#[async_trait]
impl ActionHandler for SetGoalStatusHandler {
    fn kind(&self) -> ActionKind {
        ActionKind::SetGoalStatus
    }

    async fn execute(&self, request: &ActionRequest) -> Result<UndoStep> {
        let goal_id = required_field(request, "goal_id")?;
        let status = required_field(request, "status")?;
        let previous = self.board.set_goal_status(goal_id, status).await;
        Ok(UndoStep::RestoreGoalStatus {
            goal_id: goal_id.to_string(),
            previous,
        })
    }

    async fn compensate(&self, undo: &UndoStep) -> Result<()> {
        match undo {
            UndoStep::RestoreGoalStatus { goal_id, previous } => {
                self.board
                    .restore_goal_status(goal_id, previous.clone())
                    .await;
                Ok(())
            }
            _ => Err(mismatched_step(self.kind())),
        }
    }
}

/// Returns one handler per built-in [`ActionKind`], all sharing `board`.
pub fn builtin_handlers(board: Arc<PlannerBoard>) -> Vec<Arc<dyn ActionHandler>> {
    vec![
        Arc::new(CreateTaskHandler::new(board.clone())),
        Arc::new(RecordNoteHandler::new(board.clone())),
        Arc::new(SetGoalStatusHandler::new(board)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use mentor_core::session::PayloadValue;
    use std::collections::HashMap;

    fn request(action_type: &str, fields: &[(&str, &str)]) -> ActionRequest {
        let mut payload = HashMap::new();
        for (key, value) in fields {
            payload.insert(key.to_string(), PayloadValue::String(value.to_string()));
        }
        ActionRequest {
            message_id: "msg-1".to_string(),
            session_id: "session-1".to_string(),
            action_type: action_type.to_string(),
            payload: Some(payload),
        }
    }

    #[tokio::test]
    async fn test_create_task_requires_title() {
        let handler = CreateTaskHandler::new(Arc::new(PlannerBoard::new()));
        let err = handler
            .execute(&request("create_task", &[]))
            .await
            .unwrap_err();
        assert!(err.is_invalid_input());
    }

    #[tokio::test]
    async fn test_create_task_round_trip() {
        let board = Arc::new(PlannerBoard::new());
        let handler = CreateTaskHandler::new(board.clone());

        let undo = handler
            .execute(&request("create_task", &[("title", "draft outline")]))
            .await
            .unwrap();
        assert_eq!(board.snapshot().await.tasks.len(), 1);

        handler.compensate(&undo).await.unwrap();
        assert!(board.snapshot().await.tasks.is_empty());
    }

    #[tokio::test]
    async fn test_record_note_round_trip() {
        let board = Arc::new(PlannerBoard::new());
        let handler = RecordNoteHandler::new(board.clone());

        let undo = handler
            .execute(&request("record_note", &[("text", "cite two sources")]))
            .await
            .unwrap();
        assert_eq!(board.snapshot().await.notes.len(), 1);

        handler.compensate(&undo).await.unwrap();
        assert!(board.snapshot().await.notes.is_empty());
    }

    #[tokio::test]
    async fn test_set_goal_status_restores_previous() {
        let board = Arc::new(PlannerBoard::new());
        let handler = SetGoalStatusHandler::new(board.clone());
        board.set_goal_status("goal-1", "active").await;

        let undo = handler
            .execute(&request(
                "set_goal_status",
                &[("goal_id", "goal-1"), ("status", "done")],
            ))
            .await
            .unwrap();
        assert_eq!(
            board.snapshot().await.goal_statuses.get("goal-1"),
            Some(&"done".to_string())
        );

        handler.compensate(&undo).await.unwrap();
        assert_eq!(
            board.snapshot().await.goal_statuses.get("goal-1"),
            Some(&"active".to_string())
        );
    }

    #[tokio::test]
    async fn test_set_goal_status_undo_removes_fresh_entry() {
        let board = Arc::new(PlannerBoard::new());
        let handler = SetGoalStatusHandler::new(board.clone());

        let undo = handler
            .execute(&request(
                "set_goal_status",
                &[("goal_id", "goal-2"), ("status", "active")],
            ))
            .await
            .unwrap();

        handler.compensate(&undo).await.unwrap();
        assert!(board.snapshot().await.goal_statuses.is_empty());
    }

    #[tokio::test]
    async fn test_compensate_rejects_foreign_step() {
        let handler = CreateTaskHandler::new(Arc::new(PlannerBoard::new()));
        let err = handler
            .compensate(&UndoStep::RemoveNote {
                note_id: "note-1".to_string(),
            })
            .await
            .unwrap_err();
        assert!(err.is_invalid_input());
    }

    #[tokio::test]
    async fn test_builtin_handlers_cover_every_kind() {
        use strum::IntoEnumIterator;
        let handlers = builtin_handlers(Arc::new(PlannerBoard::new()));
        for kind in ActionKind::iter() {
            assert!(handlers.iter().any(|handler| handler.kind() == kind));
        }
    }
}
