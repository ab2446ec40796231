//! Infrastructure layer of the Mentor chat engine.
//!
//! Concrete [`SessionRepository`](mentor_core::session::SessionRepository)
//! implementations and path resolution. The JSON repository is the default
//! for real runs; the in-memory one backs tests and ephemeral sessions.

pub mod in_memory_session_repository;
pub mod json_session_repository;
pub mod paths;

pub use in_memory_session_repository::InMemorySessionRepository;
pub use json_session_repository::JsonSessionRepository;
pub use paths::MentorPaths;
