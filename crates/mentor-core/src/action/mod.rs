//! Action domain module.
//!
//! Types shared between the stream routing layer and the action executor:
//! the finite action kinds, execution requests, and the serializable undo
//! ledger records.

mod model;

pub use model::{ActionKind, ActionRequest, ExecutedAction, UndoStep};
