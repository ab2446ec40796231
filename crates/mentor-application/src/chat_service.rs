//! Chat orchestration service.
//!
//! [`ChatService`] is the consumer-facing surface of the engine. One send
//! drives the full cycle: backpressure check, user message append, backend
//! stream, parser routing into the session log and the action executor, and
//! finalization. Progress is observable through a broadcast event channel.

use std::collections::HashMap;
use std::sync::Arc;

use futures::StreamExt;
use mentor_core::action::ActionRequest;
use mentor_core::session::{Message, MessageKind, Session, SessionEvent, SessionStore};
use mentor_core::{MentorError, Result};
use mentor_execution::ActionExecutor;
use mentor_interaction::{ChatStreamParser, ChunkStream, EventKind, ModelBackend, StreamUnit, StructuredEvent};
use tokio::sync::{Mutex, broadcast};
use tokio_util::sync::CancellationToken;

use crate::prompt;

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Notice appended instead of contacting the model while pending entries
/// block the session.
const PENDING_BLOCK_NOTICE: &str = "There are unresolved items in this conversation. \
    Please resolve the pending question or action before sending a new message.";

/// Notice appended when a send arrives while a reply is still streaming.
const STREAM_BUSY_NOTICE: &str = "I'm still working on the previous reply. \
    Please wait for it to finish before sending a new message.";

/// Orchestrates chat sessions end to end.
///
/// `ChatService` is responsible for:
/// - Opening sessions (idempotent per owner and goal)
/// - The send cycle: backpressure, streaming, routing, finalization
/// - Resolving pending entries and undoing executed actions
/// - Broadcasting [`SessionEvent`]s to observers
pub struct ChatService {
    store: Arc<SessionStore>,
    backend: Arc<dyn ModelBackend>,
    executor: Arc<ActionExecutor>,
    events: broadcast::Sender<SessionEvent>,
    /// Cancellation token per session with a stream in flight
    active: Mutex<HashMap<String, CancellationToken>>,
}

impl ChatService {
    /// Creates a service over a session store, model backend, and executor.
    pub fn new(
        store: Arc<SessionStore>,
        backend: Arc<dyn ModelBackend>,
        executor: Arc<ActionExecutor>,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            store,
            backend,
            executor,
            events,
            active: Mutex::new(HashMap::new()),
        }
    }

    /// Subscribes to session change events.
    ///
    /// Slow subscribers may observe lagged receives; the log in the store is
    /// always the source of truth.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Opens the canonical session for an owner and optional goal, creating
    /// it on first use.
    ///
    /// # Errors
    ///
    /// Returns an error if repository access fails.
    pub async fn start_session(&self, owner_id: &str, goal_id: Option<&str>) -> Result<Session> {
        let (session, created) = self.store.open_session(owner_id, goal_id).await?;
        if created {
            self.emit(SessionEvent::SessionCreated {
                session_id: session.id.clone(),
            });
        }
        Ok(session)
    }

    /// Sends one user message and drives the model reply to completion.
    ///
    /// Returns the AI TEXT message produced for this send: the streamed
    /// reply on success, the partial reply when the stream is cancelled, or
    /// the informational notice when the session is blocked (by pending
    /// entries or by a reply already in flight). Blocked sends append
    /// exactly that one notice and never contact the model.
    ///
    /// # Errors
    ///
    /// Returns `Backend` if the streaming call cannot be opened, `Stream` if
    /// it fails mid-flight (content routed so far is kept, not rolled back),
    /// or a storage error if persistence fails.
    pub async fn send_user_message(&self, session_id: &str, text: &str) -> Result<Message> {
        if self.store.has_pending(session_id).await? {
            tracing::info!(
                target: "chat_service",
                session_id = %session_id,
                "send blocked by pending entries"
            );
            return self.append_notice(session_id, PENDING_BLOCK_NOTICE).await;
        }

        let cancel = CancellationToken::new();
        {
            let mut active = self.active.lock().await;
            if active.contains_key(session_id) {
                drop(active);
                tracing::info!(
                    target: "chat_service",
                    session_id = %session_id,
                    "send blocked by stream in flight"
                );
                return self.append_notice(session_id, STREAM_BUSY_NOTICE).await;
            }
            active.insert(session_id.to_string(), cancel.clone());
        }

        // A stream that finished between the first check and the claim may
        // have persisted new pending entries; only a check made while
        // holding the slot is authoritative.
        match self.store.has_pending(session_id).await {
            Ok(false) => {}
            Ok(true) => {
                self.active.lock().await.remove(session_id);
                tracing::info!(
                    target: "chat_service",
                    session_id = %session_id,
                    "send blocked by pending entries"
                );
                return self.append_notice(session_id, PENDING_BLOCK_NOTICE).await;
            }
            Err(e) => {
                self.active.lock().await.remove(session_id);
                return Err(e);
            }
        }

        let result = self.run_turn(session_id, text, cancel).await;
        self.active.lock().await.remove(session_id);

        match result {
            Ok(message) => Ok(message),
            Err(e) => {
                self.emit(SessionEvent::StreamFailed {
                    session_id: session_id.to_string(),
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }

    /// Resolves the pending entry for a QUESTION/ACTION message.
    ///
    /// Returns the id of the session that held the entry, or `None` when
    /// nothing was pending for that message (resolving twice is a no-op).
    ///
    /// # Errors
    ///
    /// Returns an error only if repository access fails.
    pub async fn resolve_pending(&self, message_id: &str) -> Result<Option<String>> {
        let resolved = self.store.resolve_pending(message_id).await?;
        if let Some(session_id) = &resolved {
            self.emit(SessionEvent::PendingResolved {
                session_id: session_id.clone(),
                message_id: message_id.to_string(),
            });
        }
        Ok(resolved)
    }

    /// Reverses the side effect of an executed ACTION message.
    ///
    /// The ACTION message stays in the log, and its pending entry (if any)
    /// stays in the queue; resolution and reversal are independent and may
    /// be invoked in either order. Undoing a message with no executed-action
    /// record returns `false`.
    pub async fn undo_action(&self, message_id: &str) -> bool {
        let undone = self.executor.undo(message_id).await;
        if undone {
            self.emit(SessionEvent::ActionUndone {
                message_id: message_id.to_string(),
            });
        }
        undone
    }

    /// Returns a session's messages in insertion order.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the session does not exist.
    pub async fn list_messages(&self, session_id: &str) -> Result<Vec<Message>> {
        self.store.messages(session_id).await
    }

    /// Whether the session is blocked by unresolved QUESTION/ACTION entries.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the session does not exist.
    pub async fn has_pending(&self, session_id: &str) -> Result<bool> {
        self.store.has_pending(session_id).await
    }

    /// Administrative escape hatch: drops every pending entry of a session,
    /// returning how many were removed.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the session does not exist.
    pub async fn force_clear_pending(&self, session_id: &str) -> Result<usize> {
        let removed = self.store.force_clear_pending(session_id).await?;
        if removed > 0 {
            self.emit(SessionEvent::PendingCleared {
                session_id: session_id.to_string(),
                removed,
            });
        }
        Ok(removed)
    }

    /// Clears a session's log, pending entries, and executed-action records.
    /// The session itself survives and keeps its identity.
    ///
    /// Side effects already applied by actions are not reversed; undo them
    /// first if that matters.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the session does not exist.
    pub async fn reset_session(&self, session_id: &str) -> Result<()> {
        self.executor.purge_session(session_id).await;
        self.store.reset_session(session_id).await?;
        self.emit(SessionEvent::SessionReset {
            session_id: session_id.to_string(),
        });
        Ok(())
    }

    /// Cancels the in-flight stream of a session, if any.
    ///
    /// Content routed before the cancel stays in place. Returns `false`
    /// when no stream is running for the session.
    pub async fn cancel_stream(&self, session_id: &str) -> bool {
        let active = self.active.lock().await;
        match active.get(session_id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Lists all stored sessions, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage cannot be accessed.
    pub async fn list_sessions(&self) -> Result<Vec<Session>> {
        self.store.list_sessions().await
    }

    fn emit(&self, event: SessionEvent) {
        // A send with no subscribers is fine
        let _ = self.events.send(event);
    }

    async fn append_notice(&self, session_id: &str, text: &str) -> Result<Message> {
        let appended = self
            .store
            .append_message(session_id, Message::ai_text(session_id, text))
            .await?;
        self.emit(SessionEvent::MessageAppended {
            message: appended.clone(),
        });
        Ok(appended)
    }

    /// One full send turn: user message, backend call, reply stream.
    async fn run_turn(
        &self,
        session_id: &str,
        text: &str,
        cancel: CancellationToken,
    ) -> Result<Message> {
        let appended = self
            .store
            .append_message(session_id, Message::user_text(session_id, text))
            .await?;
        self.emit(SessionEvent::MessageAppended { message: appended });

        let session = self.store.get_session(session_id).await?;
        let request = prompt::build_request(&session);
        // Open failures propagate before any reply message exists
        let chunks = self.backend.stream_chat(request).await?;

        let running = self
            .store
            .append_message(session_id, Message::ai_text(session_id, ""))
            .await?;
        self.emit(SessionEvent::MessageAppended {
            message: running.clone(),
        });

        self.stream_reply(session_id, &running.id, chunks, cancel)
            .await
    }

    /// Drives one reply stream, routing parsed units into the session.
    async fn stream_reply(
        &self,
        session_id: &str,
        running_id: &str,
        mut chunks: ChunkStream,
        cancel: CancellationToken,
    ) -> Result<Message> {
        let mut parser = ChatStreamParser::new();
        let mut prose = String::new();

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    // Stop parsing; everything routed so far stays
                    tracing::info!(
                        target: "chat_service",
                        session_id = %session_id,
                        "stream cancelled"
                    );
                    self.emit(SessionEvent::StreamCancelled {
                        session_id: session_id.to_string(),
                    });
                    return self.final_message(session_id, running_id).await;
                }
                next = chunks.next() => match next {
                    Some(Ok(chunk)) => {
                        for unit in parser.feed(&chunk) {
                            self.route_unit(session_id, running_id, &mut prose, unit)
                                .await?;
                        }
                    }
                    Some(Err(e)) => {
                        // Partial content is kept, not rolled back
                        return Err(e);
                    }
                    None => break,
                }
            }
        }

        for unit in parser.finish() {
            self.route_unit(session_id, running_id, &mut prose, unit)
                .await?;
        }

        // Finalize: trailing whitespace from line breaks before structured
        // events is trimmed, then the text message is never touched again
        let finalized = prose.trim_end();
        if finalized.len() != prose.len() {
            self.store
                .update_message_content(session_id, running_id, finalized)
                .await?;
            self.emit(SessionEvent::MessageUpdated {
                session_id: session_id.to_string(),
                message_id: running_id.to_string(),
                content: finalized.to_string(),
            });
        }

        self.emit(SessionEvent::StreamCompleted {
            session_id: session_id.to_string(),
        });
        self.final_message(session_id, running_id).await
    }

    /// Routes one parsed unit: prose grows the running TEXT message,
    /// structured events become their own messages.
    async fn route_unit(
        &self,
        session_id: &str,
        running_id: &str,
        prose: &mut String,
        unit: StreamUnit,
    ) -> Result<()> {
        match unit {
            StreamUnit::TextDelta(delta) => {
                prose.push_str(&delta);
                self.store
                    .update_message_content(session_id, running_id, prose)
                    .await?;
                self.emit(SessionEvent::MessageUpdated {
                    session_id: session_id.to_string(),
                    message_id: running_id.to_string(),
                    content: prose.clone(),
                });
            }
            StreamUnit::Structured(event) => {
                let message = self.append_structured(session_id, event).await?;
                if message.kind == MessageKind::Action {
                    if let Some(request) = ActionRequest::from_message(&message) {
                        if self.executor.execute(&request).await.is_some() {
                            self.emit(SessionEvent::ActionExecuted {
                                session_id: session_id.to_string(),
                                message_id: message.id.clone(),
                            });
                        }
                    }
                }
            }
        }
        Ok(())
    }

    async fn append_structured(
        &self,
        session_id: &str,
        event: StructuredEvent,
    ) -> Result<Message> {
        let kind = match event.kind {
            EventKind::Question => MessageKind::Question,
            EventKind::Action => MessageKind::Action,
        };
        let message = Message::ai_structured(
            session_id,
            kind,
            event.content,
            event.action_type,
            event.action_payload,
        )?;
        let appended = self.store.append_message(session_id, message).await?;
        self.emit(SessionEvent::MessageAppended {
            message: appended.clone(),
        });
        Ok(appended)
    }

    async fn final_message(&self, session_id: &str, message_id: &str) -> Result<Message> {
        let session = self.store.get_session(session_id).await?;
        session
            .find_message(message_id)
            .cloned()
            .ok_or_else(|| MentorError::not_found("message", message_id))
    }
}
