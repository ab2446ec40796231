//! Session store service.
//!
//! [`SessionStore`] owns every live session and is the only writer of the
//! message log. Each session sits behind its own async mutex which is held
//! across mutation *and* repository save, so log order, pending markers, and
//! persistence always agree. Sessions are independent of each other and may
//! be driven concurrently.

use super::message::{Message, MessageKind, Sender};
use super::model::Session;
use super::repository::SessionRepository;
use crate::error::{MentorError, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// A live session entry.
///
/// Owner and goal are immutable after creation and are duplicated here so
/// the idempotent-create index can be scanned without locking each session.
struct SessionHandle {
    owner_id: String,
    goal_id: Option<String>,
    cell: Arc<Mutex<Session>>,
}

/// Manages chat sessions and their lifecycle.
///
/// `SessionStore` is responsible for:
/// - Creating sessions (idempotent per owner and goal)
/// - Appending messages, with pending markers inserted atomically
/// - Streaming-time content updates of the running AI TEXT message
/// - Pending-queue queries, resolution, and the administrative force-clear
/// - Persisting every change through the injected repository
pub struct SessionStore {
    /// Live sessions, keyed by session id
    sessions: RwLock<HashMap<String, SessionHandle>>,
    /// Persistent storage backend for session data
    repository: Arc<dyn SessionRepository>,
}

impl SessionStore {
    /// Creates a new `SessionStore` on top of a repository backend.
    pub fn new(repository: Arc<dyn SessionRepository>) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            repository,
        }
    }

    /// Returns the canonical session for `(owner_id, goal_id)`, creating it
    /// on first use.
    ///
    /// Calling this twice with the same pair returns the same session; the
    /// live map is consulted first, then the repository, and only then is a
    /// new session created and saved.
    ///
    /// # Errors
    ///
    /// Returns an error if repository access fails.
    pub async fn create_session(&self, owner_id: &str, goal_id: Option<&str>) -> Result<Session> {
        let (session, _created) = self.open_session(owner_id, goal_id).await?;
        Ok(session)
    }

    /// Like [`SessionStore::create_session`], additionally reporting whether
    /// this call created the session (`true`) or found an existing one.
    pub async fn open_session(
        &self,
        owner_id: &str,
        goal_id: Option<&str>,
    ) -> Result<(Session, bool)> {
        let goal_id = goal_id.filter(|g| !g.is_empty());

        // The map write lock is held across the repository lookups so two
        // concurrent creates for the same pair cannot both miss.
        let mut sessions = self.sessions.write().await;

        for handle in sessions.values() {
            if handle.owner_id == owner_id && handle.goal_id.as_deref() == goal_id {
                return Ok((handle.cell.lock().await.clone(), false));
            }
        }

        if let Some(existing) = self
            .repository
            .find_by_owner_and_goal(owner_id, goal_id)
            .await?
        {
            let snapshot = existing.clone();
            Self::insert_handle(&mut sessions, existing);
            return Ok((snapshot, false));
        }

        let session = Session::new(owner_id, goal_id.map(String::from));
        self.repository.save(&session).await?;
        tracing::info!(
            target: "session_store",
            session_id = %session.id,
            owner_id = %owner_id,
            goal_id = ?goal_id,
            "created session"
        );
        let snapshot = session.clone();
        Self::insert_handle(&mut sessions, session);
        Ok((snapshot, true))
    }

    /// Returns a snapshot of a session.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the session does not exist.
    pub async fn get_session(&self, session_id: &str) -> Result<Session> {
        let cell = self.handle_for(session_id).await?;
        let session = cell.lock().await;
        Ok(session.clone())
    }

    /// Returns a session's messages in insertion order.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the session does not exist.
    pub async fn messages(&self, session_id: &str) -> Result<Vec<Message>> {
        let cell = self.handle_for(session_id).await?;
        let session = cell.lock().await;
        Ok(session.messages.clone())
    }

    /// Appends a message to a session's log.
    ///
    /// When the message kind is QUESTION or ACTION the matching pending
    /// entry is inserted in the same critical section, and both reach the
    /// repository in one save.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if the message belongs to another session or a
    /// non-AI sender carries a QUESTION/ACTION kind; `NotFound` if the
    /// session does not exist.
    pub async fn append_message(&self, session_id: &str, message: Message) -> Result<Message> {
        if message.session_id != session_id {
            return Err(MentorError::invalid_input(format!(
                "message belongs to session '{}', not '{}'",
                message.session_id, session_id
            )));
        }
        if message.kind.requires_resolution() && message.sender != Sender::Ai {
            return Err(MentorError::invalid_input(
                "only AI messages may have kind QUESTION or ACTION",
            ));
        }

        let appended = message.clone();
        self.with_session_mut(session_id, |session| {
            if session.messages.is_empty() && message.sender == Sender::User {
                session.retitle_from(&message.content);
            }
            session.push_message(message);
            Ok(())
        })
        .await?;
        Ok(appended)
    }

    /// Replaces the content of an actively-streaming AI TEXT message.
    ///
    /// The message keeps its position in the log; only its content changes.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if session or message is missing, `InvalidInput`
    /// if the target is not an AI TEXT message (QUESTION/ACTION content is
    /// immutable).
    pub async fn update_message_content(
        &self,
        session_id: &str,
        message_id: &str,
        new_content: &str,
    ) -> Result<()> {
        self.with_session_mut(session_id, |session| {
            let message = session
                .find_message_mut(message_id)
                .ok_or_else(|| MentorError::not_found("message", message_id))?;
            if message.kind != MessageKind::Text || message.sender != Sender::Ai {
                return Err(MentorError::invalid_input(
                    "only AI TEXT messages may be updated while streaming",
                ));
            }
            message.content = new_content.to_string();
            Ok(())
        })
        .await
    }

    /// Whether the session has unresolved QUESTION/ACTION entries.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the session does not exist.
    pub async fn has_pending(&self, session_id: &str) -> Result<bool> {
        let cell = self.handle_for(session_id).await?;
        let session = cell.lock().await;
        Ok(session.has_pending())
    }

    /// Resolves the pending entry for `message_id`, wherever it lives.
    ///
    /// Returns the id of the session whose queue held the entry, or `None`
    /// when nothing was pending for that message (resolving twice is a
    /// no-op, not an error).
    ///
    /// # Errors
    ///
    /// Returns an error only if repository access fails.
    pub async fn resolve_pending(&self, message_id: &str) -> Result<Option<String>> {
        let Some(session_id) = self.find_session_with_pending(message_id).await? else {
            return Ok(None);
        };
        let removed = self
            .with_session_mut(&session_id, |session| Ok(session.resolve_pending(message_id)))
            .await?;
        Ok(removed.then_some(session_id))
    }

    /// Administrative escape hatch: drops every pending entry of a session.
    ///
    /// Returns the number of entries removed. The blocked-session policy is
    /// otherwise permanent by design; there is no automatic timeout.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the session does not exist.
    pub async fn force_clear_pending(&self, session_id: &str) -> Result<usize> {
        let removed = self
            .with_session_mut(session_id, |session| Ok(session.clear_pending()))
            .await?;
        if removed > 0 {
            tracing::info!(
                target: "session_store",
                session_id = %session_id,
                removed,
                "force-cleared pending entries"
            );
        }
        Ok(removed)
    }

    /// Empties a session's log and pending index. The session itself
    /// survives; executed-action records are purged by the caller.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the session does not exist.
    pub async fn reset_session(&self, session_id: &str) -> Result<()> {
        self.with_session_mut(session_id, |session| {
            session.reset();
            Ok(())
        })
        .await
    }

    /// Lists all stored sessions, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage cannot be accessed.
    pub async fn list_sessions(&self) -> Result<Vec<Session>> {
        let mut sessions = self.repository.list_all().await?;
        sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(sessions)
    }

    fn insert_handle(sessions: &mut HashMap<String, SessionHandle>, session: Session) {
        let id = session.id.clone();
        let handle = SessionHandle {
            owner_id: session.owner_id.clone(),
            goal_id: session.goal_id.clone(),
            cell: Arc::new(Mutex::new(session)),
        };
        sessions.entry(id).or_insert(handle);
    }

    /// Returns the live cell for a session, loading it from the repository
    /// on first access.
    async fn handle_for(&self, session_id: &str) -> Result<Arc<Mutex<Session>>> {
        {
            let sessions = self.sessions.read().await;
            if let Some(handle) = sessions.get(session_id) {
                return Ok(handle.cell.clone());
            }
        }

        let loaded = self
            .repository
            .find_by_id(session_id)
            .await?
            .ok_or_else(|| MentorError::not_found("session", session_id))?;

        let mut sessions = self.sessions.write().await;
        let handle = sessions.entry(session_id.to_string()).or_insert_with(|| {
            SessionHandle {
                owner_id: loaded.owner_id.clone(),
                goal_id: loaded.goal_id.clone(),
                cell: Arc::new(Mutex::new(loaded)),
            }
        });
        Ok(handle.cell.clone())
    }

    /// Runs a mutation under the session's lock, then persists the result
    /// before releasing it. Holding the lock across the save keeps each
    /// session single-writer all the way to storage.
    async fn with_session_mut<R>(
        &self,
        session_id: &str,
        mutate: impl FnOnce(&mut Session) -> Result<R>,
    ) -> Result<R> {
        let cell = self.handle_for(session_id).await?;
        let mut session = cell.lock().await;
        let result = mutate(&mut session)?;
        let snapshot = session.clone();
        self.repository.save(&snapshot).await?;
        Ok(result)
    }

    /// Scans live sessions, then the repository, for the session whose
    /// pending queue references `message_id`.
    async fn find_session_with_pending(&self, message_id: &str) -> Result<Option<String>> {
        {
            let sessions = self.sessions.read().await;
            for handle in sessions.values() {
                let session = handle.cell.lock().await;
                if session.pending.iter().any(|e| e.message_id == message_id) {
                    return Ok(Some(session.id.clone()));
                }
            }
        }

        for session in self.repository.list_all().await? {
            if session.pending.iter().any(|e| e.message_id == message_id) {
                let session_id = session.id.clone();
                // Pull it into the live map so the resolve goes through the
                // session's own lock.
                self.handle_for(&session_id).await?;
                return Ok(Some(session_id));
            }
        }
        Ok(None)
    }
}
