//! Core domain layer of the Mentor chat engine.
//!
//! Everything here is storage- and transport-agnostic: the session model
//! and store, the pending-queue discipline, the action/undo domain types,
//! configuration, and the shared error type. Persistence and model-backend
//! concerns live in the infrastructure and interaction crates.

pub mod action;
pub mod config;
pub mod error;
pub mod session;

// Re-export common error type
pub use error::{MentorError, Result};
