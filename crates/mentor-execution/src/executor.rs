//! Action executor and undo ledger.

use std::collections::HashMap;
use std::sync::Arc;

use mentor_core::action::{ActionKind, ActionRequest, ExecutedAction};
use tokio::sync::RwLock;

use crate::handler::ActionHandler;

/// Dispatches ACTION messages to handlers and keeps the undo ledger.
///
/// Execution is deliberately forgiving: an unknown action type, a missing
/// handler, or a handler failure is logged and skipped, never surfaced as
/// an error. The ACTION message and its pending entry stay in the session
/// either way; only the side effect is affected.
pub struct ActionExecutor {
    handlers: HashMap<ActionKind, Arc<dyn ActionHandler>>,
    /// Executed-action records keyed by message id
    records: RwLock<HashMap<String, ExecutedAction>>,
}

impl ActionExecutor {
    /// Creates an executor dispatching to the given handlers.
    ///
    /// A later handler for the same kind replaces an earlier one.
    pub fn new(handlers: Vec<Arc<dyn ActionHandler>>) -> Self {
        let handlers = handlers
            .into_iter()
            .map(|handler| (handler.kind(), handler))
            .collect();
        Self {
            handlers,
            records: RwLock::new(HashMap::new()),
        }
    }

    /// Executes one ACTION request if its type is known.
    ///
    /// Re-executing a message id that already has a ledger record returns
    /// the existing record without running the handler again.
    ///
    /// # Returns
    ///
    /// * `Some(ExecutedAction)` if the side effect ran (or already had)
    /// * `None` if the type is unknown, unhandled, or the handler failed
    pub async fn execute(&self, request: &ActionRequest) -> Option<ExecutedAction> {
        if let Some(existing) = self.records.read().await.get(&request.message_id) {
            return Some(existing.clone());
        }

        let Ok(kind) = request.action_type.parse::<ActionKind>() else {
            tracing::warn!(
                target: "action_executor",
                "Unknown action type '{}' on message {}, skipping",
                request.action_type,
                request.message_id
            );
            return None;
        };
        let Some(handler) = self.handlers.get(&kind) else {
            tracing::warn!(
                target: "action_executor",
                "No handler registered for {}, skipping message {}",
                kind,
                request.message_id
            );
            return None;
        };

        match handler.execute(request).await {
            Ok(undo) => {
                let record = ExecutedAction::new(request, kind, undo);
                self.records
                    .write()
                    .await
                    .insert(record.message_id.clone(), record.clone());
                tracing::info!(
                    target: "action_executor",
                    "Executed {} for message {}",
                    kind,
                    record.message_id
                );
                Some(record)
            }
            Err(e) => {
                tracing::warn!(
                    target: "action_executor",
                    "Handler for {} failed on message {}: {}",
                    kind,
                    request.message_id,
                    e
                );
                None
            }
        }
    }

    /// Reverses the executed action recorded for `message_id`.
    ///
    /// The record is removed only after compensation succeeds; a failed
    /// compensation keeps it so undo can be retried.
    ///
    /// # Returns
    ///
    /// * `true` if the side effect was reversed and the record removed
    /// * `false` if no record exists or compensation failed
    pub async fn undo(&self, message_id: &str) -> bool {
        let mut records = self.records.write().await;
        let Some(record) = records.get(message_id).cloned() else {
            tracing::warn!(
                target: "action_executor",
                "No executed action recorded for message {}",
                message_id
            );
            return false;
        };
        let Some(handler) = self.handlers.get(&record.kind) else {
            tracing::warn!(
                target: "action_executor",
                "No handler registered for {}, cannot undo message {}",
                record.kind,
                message_id
            );
            return false;
        };

        match handler.compensate(&record.undo).await {
            Ok(()) => {
                records.remove(message_id);
                tracing::info!(
                    target: "action_executor",
                    "Undid {} for message {}",
                    record.kind,
                    message_id
                );
                true
            }
            Err(e) => {
                tracing::warn!(
                    target: "action_executor",
                    "Compensation for {} failed on message {}: {}",
                    record.kind,
                    message_id,
                    e
                );
                false
            }
        }
    }

    /// Returns the ledger record for a message, if one exists.
    pub async fn executed(&self, message_id: &str) -> Option<ExecutedAction> {
        self.records.read().await.get(message_id).cloned()
    }

    /// Drops all ledger records belonging to a session.
    ///
    /// # Returns
    ///
    /// The number of records removed.
    pub async fn purge_session(&self, session_id: &str) -> usize {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|_, record| record.session_id != session_id);
        before - records.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtin::builtin_handlers;
    use crate::planner::PlannerBoard;
    use mentor_core::session::PayloadValue;

    fn executor_with_board() -> (ActionExecutor, Arc<PlannerBoard>) {
        let board = Arc::new(PlannerBoard::new());
        let executor = ActionExecutor::new(builtin_handlers(board.clone()));
        (executor, board)
    }

    fn create_task_request(message_id: &str, title: &str) -> ActionRequest {
        let mut payload = HashMap::new();
        payload.insert("title".to_string(), PayloadValue::String(title.to_string()));
        ActionRequest {
            message_id: message_id.to_string(),
            session_id: "session-1".to_string(),
            action_type: "create_task".to_string(),
            payload: Some(payload),
        }
    }

    #[tokio::test]
    async fn test_execute_records_and_mutates_board() {
        let (executor, board) = executor_with_board();

        let record = executor
            .execute(&create_task_request("msg-1", "draft outline"))
            .await
            .unwrap();
        assert_eq!(record.kind, ActionKind::CreateTask);
        assert_eq!(board.snapshot().await.tasks.len(), 1);
        assert!(executor.executed("msg-1").await.is_some());
    }

    #[tokio::test]
    async fn test_execute_is_idempotent_per_message() {
        let (executor, board) = executor_with_board();
        let request = create_task_request("msg-1", "draft outline");

        let first = executor.execute(&request).await.unwrap();
        let second = executor.execute(&request).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(board.snapshot().await.tasks.len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_action_type_is_skipped() {
        let (executor, board) = executor_with_board();
        let request = ActionRequest {
            message_id: "msg-1".to_string(),
            session_id: "session-1".to_string(),
            action_type: "fly_to_moon".to_string(),
            payload: None,
        };

        assert!(executor.execute(&request).await.is_none());
        assert!(executor.executed("msg-1").await.is_none());
        assert_eq!(board.snapshot().await, Default::default());
    }

    #[tokio::test]
    async fn test_handler_failure_leaves_no_record() {
        let (executor, board) = executor_with_board();
        // create_task without a title payload
        let request = ActionRequest {
            message_id: "msg-1".to_string(),
            session_id: "session-1".to_string(),
            action_type: "create_task".to_string(),
            payload: None,
        };

        assert!(executor.execute(&request).await.is_none());
        assert!(executor.executed("msg-1").await.is_none());
        assert!(board.snapshot().await.tasks.is_empty());
    }

    #[tokio::test]
    async fn test_undo_restores_prior_board_state() {
        let (executor, board) = executor_with_board();
        let before = board.snapshot().await;

        executor
            .execute(&create_task_request("msg-1", "draft outline"))
            .await
            .unwrap();
        assert_ne!(board.snapshot().await, before);

        assert!(executor.undo("msg-1").await);
        assert_eq!(board.snapshot().await, before);
        assert!(executor.executed("msg-1").await.is_none());
    }

    #[tokio::test]
    async fn test_undo_without_record_returns_false() {
        let (executor, _board) = executor_with_board();
        assert!(!executor.undo("msg-ghost").await);
    }

    #[tokio::test]
    async fn test_undo_twice_second_returns_false() {
        let (executor, _board) = executor_with_board();
        executor
            .execute(&create_task_request("msg-1", "draft outline"))
            .await
            .unwrap();

        assert!(executor.undo("msg-1").await);
        assert!(!executor.undo("msg-1").await);
    }

    #[tokio::test]
    async fn test_purge_session_only_touches_that_session() {
        let (executor, _board) = executor_with_board();
        executor
            .execute(&create_task_request("msg-1", "task one"))
            .await
            .unwrap();

        let mut other = create_task_request("msg-2", "task two");
        other.session_id = "session-2".to_string();
        executor.execute(&other).await.unwrap();

        assert_eq!(executor.purge_session("session-1").await, 1);
        assert!(executor.executed("msg-1").await.is_none());
        assert!(executor.executed("msg-2").await.is_some());
    }
}
