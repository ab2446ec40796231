//! Planner board state.
//!
//! The built-in action handlers mutate this board: tasks and notes are
//! appended, goal statuses are keyed by goal id. The whole state can be
//! snapshotted, which the tests use to check that undo restores the exact
//! prior state.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

/// A task created by the `create_task` action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannerTask {
    pub id: String,
    pub title: String,
    /// Timestamp when the task was created (ISO 8601 format)
    pub created_at: String,
}

/// A note recorded by the `record_note` action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannerNote {
    pub id: String,
    pub text: String,
    /// Timestamp when the note was recorded (ISO 8601 format)
    pub created_at: String,
}

/// Full board state at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BoardSnapshot {
    pub tasks: Vec<PlannerTask>,
    pub notes: Vec<PlannerNote>,
    /// Current status per goal id
    pub goal_statuses: HashMap<String, String>,
}

/// Shared, concurrency-safe planner board.
#[derive(Default)]
pub struct PlannerBoard {
    inner: RwLock<BoardSnapshot>,
}

impl PlannerBoard {
    /// Creates an empty board.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a task and returns its generated id.
    pub async fn add_task(&self, title: &str) -> String {
        let task = PlannerTask {
            id: Uuid::new_v4().to_string(),
            title: title.to_string(),
            created_at: chrono::Utc::now().to_rfc3339(),
        };
        let id = task.id.clone();
        self.inner.write().await.tasks.push(task);
        id
    }

    /// Removes the task with the given id.
    ///
    /// # Returns
    ///
    /// * `true` if a task was removed
    /// * `false` if no task had that id
    pub async fn remove_task(&self, task_id: &str) -> bool {
        let mut board = self.inner.write().await;
        let before = board.tasks.len();
        board.tasks.retain(|task| task.id != task_id);
        board.tasks.len() != before
    }

    /// Appends a note and returns its generated id.
    pub async fn add_note(&self, text: &str) -> String {
        let note = PlannerNote {
            id: Uuid::new_v4().to_string(),
            text: text.to_string(),
            created_at: chrono::Utc::now().to_rfc3339(),
        };
        let id = note.id.clone();
        self.inner.write().await.notes.push(note);
        id
    }

    /// Removes the note with the given id.
    ///
    /// # Returns
    ///
    /// * `true` if a note was removed
    /// * `false` if no note had that id
    pub async fn remove_note(&self, note_id: &str) -> bool {
        let mut board = self.inner.write().await;
        let before = board.notes.len();
        board.notes.retain(|note| note.id != note_id);
        board.notes.len() != before
    }

    /// Sets a goal's status and returns the status it replaced.
    ///
    /// # Returns
    ///
    /// * `Some(previous)` if the goal already had a status
    /// * `None` if the goal had no status before
    pub async fn set_goal_status(&self, goal_id: &str, status: &str) -> Option<String> {
        self.inner
            .write()
            .await
            .goal_statuses
            .insert(goal_id.to_string(), status.to_string())
    }

    /// Puts a goal's status back to an earlier value.
    ///
    /// `None` means the goal had no status, so its entry is removed.
    pub async fn restore_goal_status(&self, goal_id: &str, previous: Option<String>) {
        let mut board = self.inner.write().await;
        match previous {
            Some(status) => {
                board.goal_statuses.insert(goal_id.to_string(), status);
            }
            None => {
                board.goal_statuses.remove(goal_id);
            }
        }
    }

    /// Returns a copy of the current board state.
    pub async fn snapshot(&self) -> BoardSnapshot {
        self.inner.read().await.clone()
    }
}
