//! Engine assembly.
//!
//! Wires configuration into a running engine: JSON session storage, the
//! HTTP model backend, the planner board with its builtin action handlers,
//! and the [`ChatService`] on top.

use std::sync::Arc;

use anyhow::{Context, Result};
use mentor_core::config::EngineConfig;
use mentor_core::session::SessionStore;
use mentor_execution::{ActionExecutor, PlannerBoard, builtin_handlers};
use mentor_infrastructure::{JsonSessionRepository, MentorPaths};
use mentor_interaction::HttpModelBackend;

use crate::chat_service::ChatService;

/// A fully wired engine.
///
/// The board is exposed alongside the service so embedders can render the
/// planner that actions mutate.
pub struct Engine {
    pub service: Arc<ChatService>,
    pub board: Arc<PlannerBoard>,
}

/// Builds an [`Engine`] from configuration.
///
/// Sessions persist as JSON files under the configured data directory
/// (platform default when unset); replies stream from the OpenAI-compatible
/// HTTP backend.
///
/// # Errors
///
/// Returns an error when the data directory cannot be prepared or the
/// backend is misconfigured (for example a missing API key).
pub fn build_engine(config: &EngineConfig) -> Result<Engine> {
    let data_dir = match &config.storage.data_dir {
        Some(dir) => dir.clone(),
        None => MentorPaths::data_dir().context("resolving the data directory")?,
    };
    let repository = JsonSessionRepository::new(&data_dir)
        .with_context(|| format!("opening session storage at {}", data_dir.display()))?;
    let store = Arc::new(SessionStore::new(Arc::new(repository)));

    let backend =
        HttpModelBackend::from_config(&config.backend).context("configuring the model backend")?;

    let board = Arc::new(PlannerBoard::new());
    let executor = Arc::new(ActionExecutor::new(builtin_handlers(board.clone())));

    let service = Arc::new(ChatService::new(store, Arc::new(backend), executor));
    Ok(Engine { service, board })
}
