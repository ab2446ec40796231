//! Application layer of the Mentor engine.
//!
//! Ties the other layers together: [`ChatService`] orchestrates sessions,
//! streaming, and action execution; [`prompt`] renders the system prompt
//! and replayed conversation context; [`bootstrap`] assembles an engine
//! from configuration; [`telemetry`] wires up structured logging.

pub mod bootstrap;
pub mod chat_service;
pub mod prompt;
pub mod telemetry;

pub use bootstrap::{Engine, build_engine};
pub use chat_service::ChatService;
pub use telemetry::init_telemetry;
