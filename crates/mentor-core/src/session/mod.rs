//! Session domain module.
//!
//! This module contains all session-related domain models, repository
//! interfaces, and the session store service.
//!
//! # Module Structure
//!
//! - `model`: Core session domain model (`Session`)
//! - `message`: Chat message types (`Message`, `Sender`, `MessageKind`)
//! - `pending`: Pending queue entries (`PendingEntry`)
//! - `event`: Session change notifications (`SessionEvent`)
//! - `repository`: Repository trait for session persistence
//! - `store`: Session store service (`SessionStore`)

mod event;
mod message;
mod model;
mod pending;
mod repository;
mod store;

// Re-export public API
pub use event::SessionEvent;
pub use message::{ActionPayload, Message, MessageKind, PayloadValue, Sender};
pub use model::Session;
pub use pending::PendingEntry;
pub use repository::SessionRepository;
pub use store::SessionStore;
