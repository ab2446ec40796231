//! Action handler interface.

use async_trait::async_trait;
use mentor_core::Result;
use mentor_core::action::{ActionKind, ActionRequest, UndoStep};

/// One executable, reversible action kind.
///
/// Handlers perform the side effect for their [`ActionKind`] and describe
/// how to reverse it as a serializable [`UndoStep`]. They never touch the
/// session transcript; the executor owns the ledger and the orchestrator
/// owns the messages.
#[async_trait]
pub trait ActionHandler: Send + Sync {
    /// The action kind this handler serves.
    fn kind(&self) -> ActionKind;

    /// Performs the side effect described by `request`.
    ///
    /// # Arguments
    ///
    /// * `request` - The originating ACTION message's id, session, and payload
    ///
    /// # Returns
    ///
    /// * `Ok(UndoStep)` describing how to reverse the effect
    /// * `Err(MentorError)` if the payload is invalid or the effect fails
    async fn execute(&self, request: &ActionRequest) -> Result<UndoStep>;

    /// Reverses a previously executed action.
    ///
    /// # Arguments
    ///
    /// * `undo` - The step recorded when the action executed
    ///
    /// # Returns
    ///
    /// * `Ok(())` if the effect was reversed
    /// * `Err(MentorError)` if the step belongs to another kind or fails
    async fn compensate(&self, undo: &UndoStep) -> Result<()>;
}
