//! Session repository trait.
//!
//! Defines the interface for session persistence operations.

use super::model::Session;
use crate::error::Result;
use async_trait::async_trait;

/// An abstract repository for session persistence.
///
/// This trait decouples the session store from the specific storage
/// mechanism (in-memory map, JSON files, a database). Implementations are
/// the writer of record for persisted sessions; atomicity of a message plus
/// its pending marker comes for free because both travel inside one
/// [`Session`] save.
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Finds a session by its ID.
    ///
    /// # Arguments
    ///
    /// * `session_id` - The ID of the session to find
    ///
    /// # Returns
    ///
    /// - `Ok(Some(Session))`: Session found
    /// - `Ok(None)`: Session not found
    /// - `Err(_)`: Error occurred during retrieval
    async fn find_by_id(&self, session_id: &str) -> Result<Option<Session>>;

    /// Finds the canonical session for an owner and optional goal.
    ///
    /// # Arguments
    ///
    /// * `owner_id` - The owning user's id
    /// * `goal_id` - The goal reference, or `None` for the general chat
    ///
    /// # Returns
    ///
    /// - `Ok(Some(Session))`: An existing session for the pair
    /// - `Ok(None)`: No session stored for the pair
    /// - `Err(_)`: Error occurred during retrieval
    async fn find_by_owner_and_goal(
        &self,
        owner_id: &str,
        goal_id: Option<&str>,
    ) -> Result<Option<Session>>;

    /// Saves a session to storage, replacing any previous version.
    ///
    /// # Arguments
    ///
    /// * `session` - The session to save
    ///
    /// # Returns
    ///
    /// - `Ok(())`: Session saved successfully
    /// - `Err(_)`: Error occurred during save
    async fn save(&self, session: &Session) -> Result<()>;

    /// Lists all stored sessions.
    ///
    /// # Returns
    ///
    /// - `Ok(Vec<Session>)`: All stored sessions
    /// - `Err(_)`: Error occurred during listing
    async fn list_all(&self) -> Result<Vec<Session>>;
}
