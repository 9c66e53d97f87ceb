//! Server module for the play-action surface.
//!
//! This module provides:
//! - JSON-RPC 2.0 server over stdio
//! - Play action handlers and routing
//! - Shared application state management

mod handlers;
mod rpc;

pub use handlers::*;
pub use rpc::*;

use std::sync::Arc;

use crate::config::Config;
use crate::play::PlayEngine;
use crate::storage::SqliteStorage;

/// Application state shared across handlers.
pub struct AppState {
    /// Application configuration.
    pub config: Config,
    /// SQLite storage backend.
    pub storage: SqliteStorage,
    /// The play-session engine.
    pub engine: PlayEngine,
}

impl AppState {
    /// Create new application state
    pub fn new(config: Config, storage: SqliteStorage) -> Self {
        let engine = PlayEngine::new(Arc::new(storage.clone()), config.game.clone());

        Self {
            config,
            storage,
            engine,
        }
    }
}

/// Shared application state handle
pub type SharedState = Arc<AppState>;
